//! Account store: one JSON file per Telegram user.
//!
//! The pipeline resolves accounts by linked-mailbox address, so the store
//! keeps a full scan cheap by holding one small document per account under
//! `accounts/{telegram_id}.json`.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use mailgram_models::{normalize_mailbox, Account};

use crate::atomic::{atomic_write_json, read_json, read_json_optional};
use crate::error::{PersistenceError, Result};

/// File-backed store of user accounts.
pub struct AccountStore {
    base_path: PathBuf,
}

impl AccountStore {
    /// Creates a store rooted at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn accounts_dir(&self) -> PathBuf {
        self.base_path.join("accounts")
    }

    fn account_path(&self, telegram_id: i64) -> PathBuf {
        self.accounts_dir().join(format!("{}.json", telegram_id))
    }

    /// Saves an account.
    pub fn save(&self, account: &Account) -> Result<()> {
        atomic_write_json(&self.account_path(account.telegram_id), account)
    }

    /// Loads an account by Telegram id.
    pub fn load(&self, telegram_id: i64) -> Result<Account> {
        let path = self.account_path(telegram_id);
        if !path.exists() {
            return Err(PersistenceError::NotFound {
                kind: "account".to_string(),
                id: telegram_id.to_string(),
            });
        }
        read_json(&path)
    }

    /// Lists every stored account.
    pub fn list(&self) -> Result<Vec<Account>> {
        let dir = self.accounts_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| PersistenceError::ReadError {
            path: dir.clone(),
            source,
        })?;

        let mut accounts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::ReadError {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match read_json::<Account>(&path) {
                    Ok(account) => accounts.push(account),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable account");
                    }
                }
            }
        }
        Ok(accounts)
    }

    /// Finds the account owning a mailbox, by normalized address.
    pub fn find_by_mailbox(&self, address: &str) -> Result<Option<Account>> {
        let wanted = normalize_mailbox(address);
        Ok(self
            .list()?
            .into_iter()
            .find(|account| account.mailboxes.iter().any(|m| m.address == wanted)))
    }

    /// Advances the stored checkpoint for one linked mailbox.
    pub fn update_checkpoint(&self, telegram_id: i64, address: &str, checkpoint: u64) -> Result<()> {
        let wanted = normalize_mailbox(address);
        let mut account = self.load(telegram_id)?;
        for mailbox in account.mailboxes.iter_mut() {
            if mailbox.address == wanted {
                mailbox.checkpoint = checkpoint;
            }
        }
        self.save(&account)
    }

    /// Removes a destination chat from an account (chat-health remediation).
    pub fn remove_destination(&self, telegram_id: i64, chat_id: i64) -> Result<()> {
        let mut account = self.load(telegram_id)?;
        account.chat_ids.retain(|&id| id != chat_id);
        self.save(&account)
    }

    /// Adds a sender address to the account's blacklist.
    pub fn add_to_blacklist(&self, telegram_id: i64, sender: &str) -> Result<()> {
        let mut account = self.load(telegram_id)?;
        let normalized = normalize_mailbox(sender);
        if !account.blacklist.contains(&normalized) {
            account.blacklist.push(normalized);
        }
        self.save(&account)
    }
}
