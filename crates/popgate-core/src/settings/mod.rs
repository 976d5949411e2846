//! Per-account curation settings.
//!
//! Each POP3 account has a row of settings that drives the mailbox
//! reorganizer:
//! - `to_whitelist`: destination addresses whose mail is curated
//! - `from_whitelist`: senders whose mail is curated
//! - `blacklist`: terms that keep a message out unless it is whitelisted
//! - `workmail`: the user's institutional address, always blacklisted
//!
//! # Example
//!
//! ```ignore
//! use popgate_core::settings::{AccountNamePolicy, SettingsStore, SqliteSettingsStore};
//!
//! let store = SqliteSettingsStore::new("popgate.db", AccountNamePolicy::any()).await?;
//!
//! match store.get_settings("bcd123").await? {
//!     Some(settings) => println!("{} whitelist terms", settings.to_whitelist.len()),
//!     None => println!("account not registered"),
//! }
//! ```

mod model;
mod policy;
mod repository;

pub use model::Settings;
pub use policy::AccountNamePolicy;
pub use repository::{SettingsStore, SqliteSettingsStore};
