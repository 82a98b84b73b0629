//! The recorder itself: ring cache, exclusive day-file handle, and
//! subscriber registry.

use std::{
    collections::{BTreeMap, VecDeque},
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::event::{Event, EventKind};
use magpie_core::read_jsonl_lines;

/// Maximum events retained in the in-memory ring.
pub const EVENT_RING_CAPACITY: usize = 1000;

/// Query cap applied when the caller does not provide a limit.
pub const DEFAULT_QUERY_LIMIT: usize = 200;

/// Content of the synthetic info event a new subscriber receives first.
pub const STREAM_OPENED_NOTICE: &str = "stream opened";

const DAY_FILE_PREFIX: &str = "events-";
const DAY_FILE_SUFFIX: &str = ".jsonl";

#[derive(Debug, Clone, Default)]
/// Ring-buffer query filter; every provided predicate must match.
pub struct EventQuery {
    pub kind: Option<EventKind>,
    pub guild_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
/// Counters surfaced by the dashboard status report.
pub struct RecorderStats {
    pub events_recorded: u64,
    pub append_failures: u64,
    pub active_subscribers: usize,
    pub subscribers_dropped: u64,
}

struct OpenDayLog {
    stamp: String,
    path: PathBuf,
    file: File,
}

/// Public struct `EventRecorder` used across Magpie components.
pub struct EventRecorder {
    log_dir: PathBuf,
    ring: VecDeque<Event>,
    open_day: Option<OpenDayLog>,
    subscribers: BTreeMap<u64, UnboundedSender<Event>>,
    next_subscriber_id: u64,
    events_recorded: u64,
    append_failures: u64,
    subscribers_dropped: u64,
}

impl EventRecorder {
    /// Creates the recorder, ensuring the log directory exists.
    pub fn new(log_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("failed to create {}", log_dir.display()))?;
        Ok(Self {
            log_dir: log_dir.to_path_buf(),
            ring: VecDeque::with_capacity(EVENT_RING_CAPACITY),
            open_day: None,
            subscribers: BTreeMap::new(),
            next_subscriber_id: 1,
            events_recorded: 0,
            append_failures: 0,
            subscribers_dropped: 0,
        })
    }

    /// Records one event: ring append (FIFO eviction), best-effort file
    /// append, then synchronous fan-out in registration order.
    pub fn record(&mut self, event: Event) {
        self.ring.push_back(event.clone());
        while self.ring.len() > EVENT_RING_CAPACITY {
            self.ring.pop_front();
        }
        self.events_recorded = self.events_recorded.saturating_add(1);

        // The file append must never fail the operation that produced
        // the event; durability here is best-effort.
        match serde_json::to_string(&event) {
            Ok(line) => {
                let stamp = event.day_stamp();
                if let Err(error) = self.append_line(&stamp, &line) {
                    self.append_failures = self.append_failures.saturating_add(1);
                    tracing::warn!("event log append failed: {error:#}");
                }
            }
            Err(error) => {
                self.append_failures = self.append_failures.saturating_add(1);
                tracing::warn!("event encode failed: {error:#}");
            }
        }

        let mut dead: Vec<u64> = Vec::new();
        for (id, sender) in &self.subscribers {
            if sender.send(event.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
            self.subscribers_dropped = self.subscribers_dropped.saturating_add(1);
        }
    }

    /// Most recent matching events from the ring, most-recent-last.
    pub fn query(&self, query: &EventQuery) -> Vec<Event> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .min(EVENT_RING_CAPACITY);
        let mut matched: Vec<Event> = self
            .ring
            .iter()
            .rev()
            .filter(|event| query_matches(query, event))
            .take(limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    /// Registers a live subscriber; the receiver immediately holds the
    /// stream-opened notice. The channel is unbounded: a stalled
    /// consumer accumulates events until it disconnects.
    pub fn subscribe(&mut self) -> (u64, UnboundedReceiver<Event>) {
        let id = self.next_subscriber_id;
        self.next_subscriber_id = self.next_subscriber_id.saturating_add(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(Event::info(STREAM_OPENED_NOTICE));
        self.subscribers.insert(id, sender);
        (id, receiver)
    }

    /// Deregisters a subscriber; unknown ids are ignored. A dropped
    /// receiver is also pruned lazily at the next fan-out.
    pub fn unsubscribe(&mut self, id: u64) {
        self.subscribers.remove(&id);
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            events_recorded: self.events_recorded,
            append_failures: self.append_failures,
            active_subscribers: self.subscribers.len(),
            subscribers_dropped: self.subscribers_dropped,
        }
    }

    /// Days with a log file present, ascending.
    pub fn list_days(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.log_dir)
            .with_context(|| format!("failed to read {}", self.log_dir.display()))?;
        let mut days = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed listing {}", self.log_dir.display()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stamp) = name
                .strip_prefix(DAY_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(DAY_FILE_SUFFIX))
            {
                if is_day_stamp(stamp) {
                    days.push(stamp.to_string());
                }
            }
        }
        days.sort();
        Ok(days)
    }

    /// Raw JSONL lines for one day; `None` when no such file exists.
    pub fn read_day(&self, date: &str) -> Result<Option<Vec<String>>> {
        let date = date.trim();
        if !is_day_stamp(date) {
            return Ok(None);
        }
        let path = self.day_file_path(date);
        if !path.exists() {
            return Ok(None);
        }
        read_jsonl_lines(&path).map(Some)
    }

    fn day_file_path(&self, stamp: &str) -> PathBuf {
        self.log_dir
            .join(format!("{DAY_FILE_PREFIX}{stamp}{DAY_FILE_SUFFIX}"))
    }

    fn append_line(&mut self, stamp: &str, line: &str) -> Result<()> {
        if !matches!(&self.open_day, Some(open) if open.stamp == stamp) {
            // Close the previous day's handle fully before opening the
            // next; at most one handle is ever live.
            self.open_day = None;
            let path = self.day_file_path(stamp);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            self.open_day = Some(OpenDayLog {
                stamp: stamp.to_string(),
                path,
                file,
            });
        }
        if let Some(open) = self.open_day.as_mut() {
            writeln!(open.file, "{line}")
                .with_context(|| format!("failed to append to {}", open.path.display()))?;
            open.file
                .flush()
                .with_context(|| format!("failed to flush {}", open.path.display()))?;
        }
        Ok(())
    }
}

fn query_matches(query: &EventQuery, event: &Event) -> bool {
    if let Some(kind) = query.kind {
        if event.kind != kind {
            return false;
        }
    }
    if let Some(guild_id) = query.guild_id.as_deref() {
        if event.guild_id != guild_id {
            return false;
        }
    }
    if let Some(user_id) = query.user_id.as_deref() {
        if event.user_id != user_id {
            return false;
        }
    }
    true
}

/// `YYYY-MM-DD` shape check; keeps day lookups inside the log directory.
fn is_day_stamp(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    bytes.iter().enumerate().all(|(index, byte)| match index {
        4 | 7 => *byte == b'-',
        _ => byte.is_ascii_digit(),
    })
}
