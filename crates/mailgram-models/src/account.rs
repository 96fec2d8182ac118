//! User accounts: who owns a mailbox, where notifications go, and whether
//! the subscription still admits processing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::mail::normalize_mailbox;

/// Length of the free trial, measured from first account creation.
pub const TRIAL_PERIOD_HOURS: i64 = 24;

/// One linked mailbox under an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedMailbox {
    /// Mailbox address (normalized lowercase).
    pub address: String,
    /// Opaque credentials token for the mail provider.
    pub credentials: String,
    /// Last consumed history checkpoint.
    pub checkpoint: u64,
}

/// Paid subscription state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    /// End of the paid period; `None` means never subscribed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_until: Option<DateTime<Utc>>,
    /// When the current period was purchased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Whether the paid period covers `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.active_until.is_some_and(|until| until > now)
    }
}

/// A user account with its destinations, blacklist and linked mailboxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Telegram user id owning this account.
    pub telegram_id: i64,
    /// Hour offset from UTC used when rendering times for this user.
    pub timezone_utc_diff: i32,
    /// Destination chats that receive notifications.
    #[serde(default)]
    pub chat_ids: Vec<i64>,
    /// Blacklisted sender addresses (normalized lowercase).
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Linked mailboxes.
    #[serde(default)]
    pub mailboxes: Vec<LinkedMailbox>,
    /// Paid subscription state.
    #[serde(default)]
    pub subscription: Subscription,
    /// Account creation time; the trial window counts from here.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates an account with an empty configuration.
    pub fn new(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            timezone_utc_diff: 0,
            chat_ids: Vec::new(),
            blacklist: Vec::new(),
            mailboxes: Vec::new(),
            subscription: Subscription::default(),
            created_at: Utc::now(),
        }
    }

    /// Finds a linked mailbox by normalized address.
    pub fn mailbox(&self, address: &str) -> Option<&LinkedMailbox> {
        let wanted = normalize_mailbox(address);
        self.mailboxes.iter().find(|m| m.address == wanted)
    }

    /// Whether the trial window is still open.
    pub fn in_trial(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::hours(TRIAL_PERIOD_HOURS)
    }

    /// Whether mail processing is admitted: paid, or still in trial.
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.subscription.is_active(now) || self.in_trial(now)
    }

    /// Whether a sender address is blacklisted.
    pub fn is_blacklisted(&self, sender: &str) -> bool {
        let wanted = normalize_mailbox(sender);
        self.blacklist.iter().any(|b| normalize_mailbox(b) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_account_in_trial() {
        let account = Account::new(1);
        let now = Utc::now();
        assert!(account.in_trial(now));
        assert!(account.has_access(now));
    }

    #[test]
    fn test_trial_elapses() {
        let mut account = Account::new(1);
        account.created_at = Utc::now() - Duration::hours(TRIAL_PERIOD_HOURS + 1);
        let now = Utc::now();
        assert!(!account.in_trial(now));
        assert!(!account.has_access(now));
    }

    #[test]
    fn test_subscription_grants_access() {
        let mut account = Account::new(1);
        account.created_at = Utc::now() - Duration::days(30);
        account.subscription.active_until = Some(Utc::now() + Duration::days(10));
        assert!(account.has_access(Utc::now()));

        account.subscription.active_until = Some(Utc::now() - Duration::days(1));
        assert!(!account.has_access(Utc::now()));
    }

    #[test]
    fn test_blacklist_is_case_insensitive() {
        let mut account = Account::new(1);
        account.blacklist.push("Spam@Ads.com".to_string());
        assert!(account.is_blacklisted("spam@ads.com"));
        assert!(account.is_blacklisted(" SPAM@ADS.COM "));
        assert!(!account.is_blacklisted("other@ads.com"));
    }

    #[test]
    fn test_mailbox_lookup_normalizes() {
        let mut account = Account::new(1);
        account.mailboxes.push(LinkedMailbox {
            address: "u@x.com".to_string(),
            credentials: "tok".to_string(),
            checkpoint: 90,
        });
        assert!(account.mailbox(" U@X.COM ").is_some());
        assert!(account.mailbox("v@x.com").is_none());
    }
}
