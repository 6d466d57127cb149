//! Ingestion progress reporting.
//!
//! Progress goes to **stderr** so stdout stays reserved for the summary and
//! query responses. Human output is one line per file:
//!
//! ```text
//! ingest codebase_memory  12 / 340 files  57 chunks  src/app.ts
//! ```

use std::io::Write;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Walking the project tree; total unknown.
    Discovering { collection: String },
    /// `n` of `total` files done; `chunks` created so far in this run.
    Ingesting {
        collection: String,
        n: u64,
        total: u64,
        chunks: u64,
        path: String,
    },
}

pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Discovering { collection } => {
                format!("ingest {}  discovering files...\n", collection)
            }
            IngestProgressEvent::Ingesting {
                collection,
                n,
                total,
                chunks,
                path,
            } => format!(
                "ingest {}  {} / {} files  {} chunks  {}\n",
                collection,
                group_thousands(*n),
                group_thousands(*total),
                group_thousands(*chunks),
                path
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Discovering { collection } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "discovering"
            }),
            IngestProgressEvent::Ingesting {
                collection,
                n,
                total,
                chunks,
                path,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "ingesting",
                "n": n,
                "total": total,
                "chunks": chunks,
                "path": path
            }),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", obj);
        let _ = stderr.flush();
    }
}

pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// Keeps every event in memory, for callers that inspect progress after
/// the run.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<IngestProgressEvent>>,
}

impl CollectingProgress {
    pub fn events(&self) -> Vec<IngestProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl IngestProgressReporter for CollectingProgress {
    fn report(&self, event: IngestProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// `1234567` → `"1,234,567"`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Human output when stderr is a terminal, otherwise off.
    Auto,
    Human,
    Json,
    Off,
}

impl ProgressMode {
    pub fn resolve(self) -> Self {
        match self {
            ProgressMode::Auto if atty::is(atty::Stream::Stderr) => ProgressMode::Human,
            ProgressMode::Auto => ProgressMode::Off,
            other => other,
        }
    }

    pub fn reporter(self) -> Box<dyn IngestProgressReporter> {
        match self.resolve() {
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
            ProgressMode::Off | ProgressMode::Auto => Box::new(NoProgress),
        }
    }
}
