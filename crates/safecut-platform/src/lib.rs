//! safecut-platform — Concrete adapters for the SafeCut session core.
//!
//! SQLite-backed key-value storage, the system clipboard, and an external
//! command acting as the native share sheet.

pub mod clipboard;
pub mod share_command;
pub mod sqlite;

pub use clipboard::SystemClipboard;
pub use share_command::CommandShare;
pub use sqlite::{open_usage_store, SqliteStore};
