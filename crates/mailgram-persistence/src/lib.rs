//! File-backed persistence for Mailgram.
//!
//! All stores write JSON through an atomic temp-file-and-rename step, so a
//! crash never leaves a half-written document behind. Layout under the base
//! path:
//!
//! ```text
//! base_path/
//! ├── kv.json
//! ├── history/
//! │   └── {mailbox}/
//! │       └── {message_id}.json
//! └── accounts/
//!     └── {telegram_id}.json
//! ```

pub mod accounts;
pub mod atomic;
pub mod error;
pub mod kv;
pub mod ledger;

pub use accounts::AccountStore;
pub use error::{PersistenceError, Result};
pub use kv::KvStore;
pub use ledger::{CreateOutcome, HistoryLedger};
