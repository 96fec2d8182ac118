//! History ledger: one JSON file per (mailbox, message) processing record.
//!
//! Records are stored as `history/{mailbox}/{message_id}.json`. The ledger
//! is the pipeline's de-duplication gate: `create_if_absent` hands out the
//! right to process a pair exactly once, and every later mutation is a keyed
//! upsert on that same pair.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

use mailgram_models::{DeliverUpdate, ProcessingRecord, SkipUpdate};

use crate::atomic::{atomic_write_json, read_json, read_json_optional};
use crate::error::{PersistenceError, Result};

/// Outcome of the creation gate.
#[derive(Debug)]
pub enum CreateOutcome {
    /// No record existed; this caller owns the processing pass.
    Created(ProcessingRecord),
    /// A record already existed (in-flight or terminal); back off.
    Existing(ProcessingRecord),
}

impl CreateOutcome {
    /// Whether this call created the record.
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// File-backed ledger of processing records.
pub struct HistoryLedger {
    base_path: PathBuf,
    // Serializes the read-check-write in create_if_absent and the
    // load-mutate-store upserts against in-process races.
    gate: Mutex<()>,
}

impl HistoryLedger {
    /// Creates a ledger rooted at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            gate: Mutex::new(()),
        }
    }

    fn history_dir(&self) -> PathBuf {
        self.base_path.join("history")
    }

    fn record_path(&self, mailbox: &str, message_id: &str) -> PathBuf {
        self.history_dir()
            .join(sanitize(mailbox))
            .join(format!("{}.json", sanitize(message_id)))
    }

    /// Creates a record for the pair unless one already exists.
    ///
    /// Existence alone gates: a terminal record blocks re-creation just as
    /// an in-flight one does, which is what keeps the pair-uniqueness
    /// invariant.
    pub fn create_if_absent(&self, mailbox: &str, message_id: &str) -> Result<CreateOutcome> {
        let _guard = self.gate.lock().expect("ledger lock poisoned");
        let path = self.record_path(mailbox, message_id);
        if let Some(existing) = read_json_optional::<ProcessingRecord>(&path)? {
            return Ok(CreateOutcome::Existing(existing));
        }
        let record = ProcessingRecord::new(mailbox, message_id);
        atomic_write_json(&path, &record)?;
        Ok(CreateOutcome::Created(record))
    }

    /// Attaches sender/subject/unsubscribe facts to the in-flight record.
    pub fn record_mail_facts(
        &self,
        mailbox: &str,
        message_id: &str,
        from: &str,
        subject: &str,
        unsubscribe_url: Option<&str>,
    ) -> Result<ProcessingRecord> {
        self.upsert(mailbox, message_id, |record| {
            record.from = Some(from.to_string());
            record.subject = Some(subject.to_string());
            record.unsubscribe_url = unsubscribe_url.map(str::to_string);
        })
    }

    /// Marks the record terminal without delivery.
    pub fn mark_skipped(
        &self,
        mailbox: &str,
        message_id: &str,
        update: SkipUpdate,
    ) -> Result<ProcessingRecord> {
        warn!(
            mailbox = %mailbox,
            message_id = %message_id,
            reason = %update.reason,
            "Not processing email"
        );
        self.upsert(mailbox, message_id, |record| record.apply_skip(update))
    }

    /// Marks the record terminal with its classification and delivery
    /// snapshot.
    pub fn mark_delivered(
        &self,
        mailbox: &str,
        message_id: &str,
        update: DeliverUpdate,
    ) -> Result<ProcessingRecord> {
        self.upsert(mailbox, message_id, |record| record.apply_deliver(update))
    }

    /// Loads a record by its pair key.
    pub fn find(&self, mailbox: &str, message_id: &str) -> Result<Option<ProcessingRecord>> {
        read_json_optional(&self.record_path(mailbox, message_id))
    }

    /// Reverse lookup from a delivery id to the record it belongs to.
    ///
    /// Supports edit/back navigation from chat buttons; scans the ledger,
    /// which is acceptable at per-user mailbox volumes.
    pub fn find_by_delivery_id(&self, delivery_id: i64) -> Result<Option<ProcessingRecord>> {
        for record in self.all_records()? {
            if record
                .delivery
                .as_ref()
                .is_some_and(|d| d.delivery_id == delivery_id)
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// All terminal records for the given mailboxes whose `processed_at`
    /// falls inside `[start, end]`, chronological.
    pub fn find_processed_between(
        &self,
        mailboxes: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProcessingRecord>> {
        let mut records: Vec<ProcessingRecord> = self
            .all_records()?
            .into_iter()
            .filter(|r| mailboxes.iter().any(|m| *m == r.mailbox))
            .filter(|r| {
                r.processed_at
                    .is_some_and(|at| at >= start && at <= end)
            })
            .collect();
        records.sort_by_key(|r| r.processed_at);
        Ok(records)
    }

    fn all_records(&self) -> Result<Vec<ProcessingRecord>> {
        let dir = self.history_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for mailbox_entry in list_dir(&dir)? {
            if !mailbox_entry.is_dir() {
                continue;
            }
            for path in list_dir(&mailbox_entry)? {
                if path.extension().is_some_and(|ext| ext == "json") {
                    match read_json::<ProcessingRecord>(&path) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                        }
                    }
                }
            }
        }
        Ok(records)
    }

    fn upsert<F>(&self, mailbox: &str, message_id: &str, mutate: F) -> Result<ProcessingRecord>
    where
        F: FnOnce(&mut ProcessingRecord),
    {
        let _guard = self.gate.lock().expect("ledger lock poisoned");
        let path = self.record_path(mailbox, message_id);
        let mut record = read_json_optional(&path)?
            .unwrap_or_else(|| ProcessingRecord::new(mailbox, message_id));
        mutate(&mut record);
        atomic_write_json(&path, &record)?;
        Ok(record)
    }
}

fn list_dir(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| PersistenceError::ReadError {
        path: dir.clone(),
        source,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PersistenceError::ReadError {
            path: dir.clone(),
            source,
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

/// Keeps pair keys usable as file names.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mailgram_models::{Classification, DeliverySnapshot};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn classification(importance: u8) -> Classification {
        Classification {
            category: "Work".to_string(),
            summary: "summary".to_string(),
            importance,
            deadline: None,
            action_steps: vec![],
            important_urls: vec![],
        }
    }

    #[test]
    fn test_create_if_absent_creates_once() {
        let dir = tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path());

        assert!(ledger.create_if_absent("u@x.com", "m1").unwrap().is_created());
        assert!(!ledger.create_if_absent("u@x.com", "m1").unwrap().is_created());
    }

    #[test]
    fn test_terminal_record_still_gates() {
        let dir = tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path());

        ledger.create_if_absent("u@x.com", "m1").unwrap();
        ledger
            .mark_skipped("u@x.com", "m1", SkipUpdate::reason("Email from self"))
            .unwrap();
        assert!(!ledger.create_if_absent("u@x.com", "m1").unwrap().is_created());
    }

    #[test]
    fn test_concurrent_create_single_winner() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(HistoryLedger::new(dir.path()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                ledger.create_if_absent("u@x.com", "race").unwrap().is_created()
            }));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_mark_skipped_keeps_classification() {
        let dir = tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path());

        ledger.create_if_absent("u@x.com", "m1").unwrap();
        let record = ledger
            .mark_skipped(
                "u@x.com",
                "m1",
                SkipUpdate::with_classification("Email is not important", classification(0)),
            )
            .unwrap();
        assert!(record.is_terminal());
        assert_eq!(record.classification.unwrap().importance, 0);
    }

    #[test]
    fn test_mark_delivered_and_reverse_lookup() {
        let dir = tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path());

        ledger.create_if_absent("u@x.com", "m1").unwrap();
        ledger
            .mark_delivered(
                "u@x.com",
                "m1",
                DeliverUpdate {
                    classification: classification(5),
                    delivery: DeliverySnapshot {
                        message_text: "text".to_string(),
                        buttons: vec![],
                        delivery_id: 777,
                        chat_id: 1,
                    },
                },
            )
            .unwrap();

        let found = ledger.find_by_delivery_id(777).unwrap().unwrap();
        assert_eq!(found.message_id, "m1");
        assert!(ledger.find_by_delivery_id(778).unwrap().is_none());
    }

    #[test]
    fn test_find_processed_between() {
        let dir = tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path());

        ledger.create_if_absent("u@x.com", "m1").unwrap();
        ledger
            .mark_skipped("u@x.com", "m1", SkipUpdate::reason("Blacklisted sender"))
            .unwrap();
        ledger.create_if_absent("other@x.com", "m2").unwrap();
        ledger
            .mark_skipped("other@x.com", "m2", SkipUpdate::reason("Blacklisted sender"))
            .unwrap();

        let now = Utc::now();
        let records = ledger
            .find_processed_between(
                &["u@x.com".to_string()],
                now - Duration::hours(1),
                now + Duration::hours(1),
            )
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mailbox, "u@x.com");
    }

    #[test]
    fn test_sanitize_keys() {
        let dir = tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path());

        assert!(ledger
            .create_if_absent("u@x.com", "weird/../id")
            .unwrap()
            .is_created());
        assert!(ledger.find("u@x.com", "weird/../id").unwrap().is_some());
    }
}
