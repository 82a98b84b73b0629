//! Shared primitives for the Magpie workspace.
//!
//! Small filesystem and clock helpers used by every crate that persists
//! state: atomic text replacement, unix-time reads, and JSONL read-back.

pub mod atomic_io;
pub mod jsonl;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use jsonl::read_jsonl_lines;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix};
