//! Activity event recording: bounded ring, day-partitioned JSONL log,
//! and live subscriber fan-out.
//!
//! Every component that observes activity builds an [`Event`] and hands
//! it to the [`EventRecorder`]. The recorder caches the most recent
//! thousand events for queries, appends each event to the current UTC
//! day's `events-YYYY-MM-DD.jsonl` file (best-effort; append failures
//! are logged and swallowed), and pushes it to every live subscriber in
//! registration order.

pub mod event;
pub mod recorder;

pub use event::{Event, EventKind};
pub use recorder::{
    EventQuery, EventRecorder, RecorderStats, DEFAULT_QUERY_LIMIT, EVENT_RING_CAPACITY,
    STREAM_OPENED_NOTICE,
};
