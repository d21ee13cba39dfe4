//! Tracing setup plus an in-memory ring of recent log lines.
//!
//! `init` installs the global subscriber once at startup and hands back the
//! `LogBuffer` so the front end can show recent entries with `/logs`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const MAX_LOG_ENTRIES: usize = 1000;

#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self
            .timestamp
            .format(format_description!("[hour]:[minute]:[second].[subsecond digits:3]"))
            .unwrap_or_default();
        write!(f, "{clock} {:>5} {}: {}", self.level, self.target, self.message)
    }
}

/// Bounded, shared log history. Cloning shares the same buffer.
#[derive(Clone, Debug)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The last `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogEntry> {
        let all = self.snapshot();
        let skip = all.len().saturating_sub(count);
        all.into_iter().skip(skip).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogBuffer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields.join(" "));
        }

        let metadata = event.metadata();
        self.push(LogEntry {
            timestamp: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message,
        });
    }
}

/// Installs the global subscriber: env filter, stderr fmt output and the
/// in-memory buffer. A second call keeps the first subscriber.
pub fn init(filter: &str) -> LogBuffer {
    let buffer = LogBuffer::default();
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?}: {err}, using \"info\"");
        EnvFilter::new("info")
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(buffer.clone())
        .try_init()
    {
        eprintln!("logging already initialized: {err}");
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_entries() {
        let buffer = LogBuffer::with_capacity(2);
        for n in 0..3 {
            buffer.push(LogEntry {
                timestamp: OffsetDateTime::UNIX_EPOCH,
                level: Level::INFO,
                target: "exodus".into(),
                message: format!("entry {n}"),
            });
        }
        let messages: Vec<String> = buffer.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 1", "entry 2"]);
        assert_eq!(buffer.recent(1)[0].message, "entry 2");

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn captures_events_through_the_layer() {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::registry().with(buffer.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(model = "llava", "switched");
        });

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::WARN);
        assert_eq!(entries[0].message, "switched model=llava");
    }

    #[test]
    fn formats_entries_for_display() {
        let entry = LogEntry {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            level: Level::ERROR,
            target: "exodus::repository".into(),
            message: "boom".into(),
        };
        assert_eq!(entry.to_string(), "00:00:00.000 ERROR exodus::repository: boom");
    }
}
