//! The dispatch pipeline: one push event in, ledger records and chat
//! notifications out.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use mailgram_classifier::{generate_digest, ChatTransport, Classifier, DigestPeriod, Tier, UserContext};
use mailgram_models::{
    Account, Classification, DeliverUpdate, NormalizedMail, PushEvent, SkipUpdate,
};
use mailgram_persistence::{AccountStore, HistoryLedger, KvStore};

use crate::address::extract_address;
use crate::channel::NotificationChannel;
use crate::error::{PipelineError, Result};
use crate::gateway::MailboxGateway;

/// Suppression window for duplicate push and delivery keys.
pub const RATE_LIMIT_WINDOW_MINUTES: i64 = 5;

/// How an event left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event was processed (possibly with per-message skips).
    Handled { delivered: usize, skipped: usize },
    /// Duplicate of an already-seen checkpoint; dropped without work.
    Duplicate,
    /// The mailbox is not tracked by any account; intentional no-op.
    UnknownMailbox,
}

enum MessageOutcome {
    Delivered,
    Skipped,
    /// Suppressed by a rate-limit or ledger gate; no trace written.
    Suppressed,
    /// Subscription gate: stop the rest of the batch.
    Halt,
}

/// Result counters for a resubscription sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub renewed: usize,
    pub failed: usize,
}

/// The event-processing pipeline with its injected collaborators.
pub struct Pipeline {
    ledger: Arc<HistoryLedger>,
    kv: Arc<KvStore>,
    accounts: Arc<AccountStore>,
    gateway: Arc<dyn MailboxGateway>,
    channel: Arc<dyn NotificationChannel>,
    classifier: Arc<Classifier>,
    digest_transport: Arc<dyn ChatTransport>,
    digest_model: String,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<HistoryLedger>,
        kv: Arc<KvStore>,
        accounts: Arc<AccountStore>,
        gateway: Arc<dyn MailboxGateway>,
        channel: Arc<dyn NotificationChannel>,
        classifier: Arc<Classifier>,
        digest_transport: Arc<dyn ChatTransport>,
        digest_model: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            kv,
            accounts,
            gateway,
            channel,
            classifier,
            digest_transport,
            digest_model: digest_model.into(),
        }
    }

    fn window() -> Duration {
        Duration::minutes(RATE_LIMIT_WINDOW_MINUTES)
    }

    /// Handles one push event end to end.
    ///
    /// Persistence and fetch failures abort the whole event (the caller
    /// answers 5xx so the push is redelivered); everything per-message is
    /// contained and recorded in the ledger.
    pub async fn handle_push(&self, event: PushEvent) -> Result<EventOutcome> {
        // Intake: collapse duplicate deliveries of the same checkpoint.
        if !self.kv.set_if_absent(&event.intake_key(), Some(Self::window()))? {
            debug!(mailbox = %event.mailbox, checkpoint = event.checkpoint, "Duplicate push suppressed");
            return Ok(EventOutcome::Duplicate);
        }

        // Ledger gate: catches re-deliveries that outlive the rate-limit
        // window but reference the same checkpoint.
        let checkpoint_key = event.checkpoint.to_string();
        if !self
            .ledger
            .create_if_absent(&event.mailbox, &checkpoint_key)?
            .is_created()
        {
            debug!(mailbox = %event.mailbox, checkpoint = event.checkpoint, "Checkpoint already in ledger");
            return Ok(EventOutcome::Duplicate);
        }

        // Account resolution. A push for an untracked address is a no-op,
        // not an error.
        let Some(account) = self.accounts.find_by_mailbox(&event.mailbox)? else {
            info!(mailbox = %event.mailbox, "Push for untracked mailbox");
            return Ok(EventOutcome::UnknownMailbox);
        };
        let Some(linked) = account.mailbox(&event.mailbox).cloned() else {
            return Ok(EventOutcome::UnknownMailbox);
        };

        let mails = self.gateway.fetch_since(&linked).await?;
        self.accounts
            .update_checkpoint(account.telegram_id, &event.mailbox, event.checkpoint)?;
        info!(
            mailbox = %event.mailbox,
            checkpoint = event.checkpoint,
            count = mails.len(),
            "Fetched new mail"
        );

        let mut delivered = 0;
        let mut skipped = 0;
        for mail in &mails {
            match self.process_message(&account, &event.mailbox, mail).await {
                Ok(MessageOutcome::Delivered) => delivered += 1,
                Ok(MessageOutcome::Skipped) => skipped += 1,
                Ok(MessageOutcome::Suppressed) => {}
                Ok(MessageOutcome::Halt) => {
                    skipped += 1;
                    break;
                }
                Err(PipelineError::Persistence(e)) => return Err(e.into()),
                Err(e) => {
                    // Contained: trace it, tell the user, move on.
                    warn!(message_id = %mail.id, error = %e, "Unexpected error processing message");
                    let _ = self
                        .channel
                        .notify(account.telegram_id, &error_notice(mail, &e.to_string()))
                        .await;
                    self.ledger.mark_skipped(
                        &event.mailbox,
                        &mail.id,
                        SkipUpdate::reason(format!("Error in processing email: {}", e)),
                    )?;
                    skipped += 1;
                }
            }
        }

        self.ledger.mark_skipped(
            &event.mailbox,
            &checkpoint_key,
            SkipUpdate::reason("Push event handled"),
        )?;

        Ok(EventOutcome::Handled { delivered, skipped })
    }

    async fn process_message(
        &self,
        account: &Account,
        mailbox: &str,
        mail: &NormalizedMail,
    ) -> Result<MessageOutcome> {
        // Per-message suppression inside the retry window.
        let message_key = format!("{}:{}", mailbox, mail.id);
        if !self.kv.set_if_absent(&message_key, Some(Self::window()))? {
            debug!(message_id = %mail.id, "Message rate-limited, skipping silently");
            return Ok(MessageOutcome::Suppressed);
        }

        if !self.ledger.create_if_absent(mailbox, &mail.id)?.is_created() {
            debug!(message_id = %mail.id, "Message already in ledger");
            return Ok(MessageOutcome::Suppressed);
        }
        self.ledger.record_mail_facts(
            mailbox,
            &mail.id,
            &mail.from,
            &mail.subject,
            mail.unsubscribe_url.as_deref(),
        )?;

        let sender = extract_address(&mail.from);

        if let Some(sender) = sender.as_deref() {
            if account.is_blacklisted(sender) {
                self.ledger
                    .mark_skipped(mailbox, &mail.id, SkipUpdate::reason("Blacklisted sender"))?;
                return Ok(MessageOutcome::Skipped);
            }
            if sender == mailbox {
                self.ledger
                    .mark_skipped(mailbox, &mail.id, SkipUpdate::reason("Email from self"))?;
                return Ok(MessageOutcome::Skipped);
            }
        }

        let now = Utc::now();
        if !account.has_access(now) {
            self.ledger
                .mark_skipped(mailbox, &mail.id, SkipUpdate::reason("User is not subscribed"))?;
            let _ = self
                .channel
                .notify(
                    account.telegram_id,
                    "Your subscription is inactive and the trial period has ended. \
                    Incoming mail is no longer being processed - use /subscribe to renew.",
                )
                .await;
            // Hard stop: one unsubscribed user must not burn further
            // classification calls in this batch.
            return Ok(MessageOutcome::Halt);
        }

        let context = UserContext {
            timezone_utc_diff: account.timezone_utc_diff,
            tier: if account.subscription.is_active(now) {
                Tier::Paid
            } else {
                Tier::Trial
            },
        };

        let classification = match self.classifier.classify(mail, &context).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(message_id = %mail.id, error = %e, "Classification failed terminally");
                let _ = self
                    .channel
                    .notify(account.telegram_id, &error_notice(mail, &e.to_string()))
                    .await;
                self.ledger.mark_skipped(
                    mailbox,
                    &mail.id,
                    SkipUpdate::reason(format!("Error in processing email: {}", e)),
                )?;
                return Ok(MessageOutcome::Skipped);
            }
        };

        if classification.importance == 0 {
            self.ledger.mark_skipped(
                mailbox,
                &mail.id,
                SkipUpdate::with_classification("Email is not important", classification),
            )?;
            return Ok(MessageOutcome::Skipped);
        }

        self.fan_out(account, mailbox, mail, classification).await
    }

    /// Delivers one classified mail to every destination chat.
    ///
    /// Destinations are independent: sends run concurrently, the first
    /// success becomes the canonical delivery snapshot, and a failure on one
    /// destination never aborts the others.
    async fn fan_out(
        &self,
        account: &Account,
        mailbox: &str,
        mail: &NormalizedMail,
        classification: Classification,
    ) -> Result<MessageOutcome> {
        let mut eligible = Vec::new();
        for &chat_id in &account.chat_ids {
            let delivery_key = format!("{}:{}:{}", mailbox, mail.id, chat_id);
            if self.kv.set_if_absent(&delivery_key, Some(Self::window()))? {
                eligible.push(chat_id);
            } else {
                debug!(message_id = %mail.id, chat_id, "Delivery already attempted, suppressed");
            }
        }

        if eligible.is_empty() {
            self.ledger.mark_skipped(
                mailbox,
                &mail.id,
                SkipUpdate::with_classification("No destination chats to deliver to", classification),
            )?;
            return Ok(MessageOutcome::Skipped);
        }

        let sends = eligible.iter().map(|&chat_id| {
            let channel = Arc::clone(&self.channel);
            let classification = &classification;
            async move {
                (
                    chat_id,
                    channel.deliver(chat_id, mailbox, mail, classification).await,
                )
            }
        });
        let results = join_all(sends).await;

        let mut first_success = None;
        let mut failures = Vec::new();
        for (chat_id, result) in results {
            match result {
                Ok(snapshot) => {
                    info!(message_id = %mail.id, chat_id, "Notification delivered");
                    if first_success.is_none() {
                        first_success = Some(snapshot);
                    }
                }
                Err(e) => {
                    warn!(message_id = %mail.id, chat_id, error = %e, "Delivery failed");
                    failures.push((chat_id, e));
                }
            }
        }

        // Chat-health remediation: drop destinations that are gone for good
        // so future events stop retrying them.
        for (chat_id, _) in &failures {
            if !self
                .channel
                .destination_healthy(*chat_id, account.telegram_id)
                .await
            {
                info!(chat_id, telegram_id = account.telegram_id, "Removing dead destination");
                self.accounts
                    .remove_destination(account.telegram_id, *chat_id)?;
            }
        }

        match first_success {
            Some(delivery) => {
                self.ledger.mark_delivered(
                    mailbox,
                    &mail.id,
                    DeliverUpdate {
                        classification,
                        delivery,
                    },
                )?;
                Ok(MessageOutcome::Delivered)
            }
            None => {
                let reason = failures
                    .first()
                    .map(|(_, e)| e.to_string())
                    .unwrap_or_else(|| "delivery failed".to_string());
                self.ledger.mark_skipped(
                    mailbox,
                    &mail.id,
                    SkipUpdate::with_classification(reason, classification),
                )?;
                Ok(MessageOutcome::Skipped)
            }
        }
    }

    /// Re-validates credentials and re-establishes the push subscription for
    /// every tracked mailbox.
    ///
    /// Per-mailbox failures notify the owner and continue; only store
    /// failures abort the sweep.
    pub async fn resubscribe_all(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for account in self.accounts.list()? {
            for mailbox in &account.mailboxes {
                if let Err(e) = self.gateway.check_authorization(mailbox).await {
                    warn!(mailbox = %mailbox.address, error = %e, "Credentials rejected");
                    report.failed += 1;
                    let _ = self
                        .channel
                        .notify(
                            account.telegram_id,
                            &format!(
                                "Your connected account {} needs to be reconnected: the stored \
                                credentials are no longer valid.",
                                mailbox.address
                            ),
                        )
                        .await;
                    continue;
                }

                match self.gateway.renew_watch(mailbox).await {
                    Ok(checkpoint) => {
                        self.accounts.update_checkpoint(
                            account.telegram_id,
                            &mailbox.address,
                            checkpoint,
                        )?;
                        info!(mailbox = %mailbox.address, checkpoint, "Watch renewed");
                        report.renewed += 1;
                    }
                    Err(e) => {
                        warn!(mailbox = %mailbox.address, error = %e, "Watch renewal failed");
                        report.failed += 1;
                        let _ = self
                            .channel
                            .notify(
                                account.telegram_id,
                                &format!(
                                    "Could not renew the mail subscription for {}. Please \
                                    reconnect the account.",
                                    mailbox.address
                                ),
                            )
                            .await;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Generates and sends a digest summary to every account.
    ///
    /// Accounts with no processed mail in the period are skipped quietly.
    pub async fn send_digests(&self, period: DigestPeriod) -> Result<usize> {
        let (start, end) = period.bounds(Utc::now());
        let mut sent = 0;

        for account in self.accounts.list()? {
            let mailboxes: Vec<String> =
                account.mailboxes.iter().map(|m| m.address.clone()).collect();
            if mailboxes.is_empty() {
                continue;
            }

            let records = self.ledger.find_processed_between(&mailboxes, start, end)?;
            if records.is_empty() {
                continue;
            }

            match generate_digest(
                self.digest_transport.as_ref(),
                &self.digest_model,
                &records,
                period,
            )
            .await
            {
                Ok(summary) => {
                    if self
                        .channel
                        .notify(account.telegram_id, &summary)
                        .await
                        .is_ok()
                    {
                        sent += 1;
                    }
                }
                Err(e) => {
                    warn!(telegram_id = account.telegram_id, error = %e, "Digest generation failed");
                }
            }
        }

        Ok(sent)
    }
}

/// User-facing diagnostic for a message that could not be processed.
fn error_notice(mail: &NormalizedMail, error: &str) -> String {
    let date = mail
        .date
        .map(|d| d.to_rfc2822())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Error occurred while processing email: {error}\n\
        From: {from}\n\
        Date: {date}\n\
        Subject: {subject}\n\n\
        {preview}",
        error = error,
        from = mail.from,
        date = date,
        subject = mail.subject,
        preview = mail.body_preview(200),
    )
}
