//! Telegram notification channel for Mailgram.
//!
//! Renders classified mail into the one text+buttons message format the
//! product uses, and delivers it with teloxide. Also exposes the
//! callback-command codec the chat front-end decodes button presses with.

pub mod callback;
pub mod channel;
pub mod template;

pub use callback::{CallbackCommand, CallbackParseError};
pub use channel::TelegramChannel;
pub use template::{build_buttons, escape_html, importance_info, is_valid_url, render_message, Button};
