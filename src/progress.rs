//! Import progress reporting.
//!
//! Reports what the importer is doing while it runs: scanning the data
//! directory, parsing files, and loading each collection. Progress is emitted
//! on **stderr** so stdout remains parseable for scripts.

use std::io::Write;
use std::sync::Arc;

/// A single progress event for an import run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportProgressEvent {
    /// Walking the data directory. Total unknown.
    Discovering { dir: String },
    /// Parsing files: n files processed out of total.
    Grouping { n: u64, total: u64 },
    /// A collection import started.
    Loading { collection: String, documents: u64 },
    /// A collection import finished; `ok` is false when any step failed.
    Loaded { collection: String, ok: bool },
}

/// Reports import progress. Shared between concurrent collection imports.
pub trait ImportProgressReporter: Send + Sync {
    fn report(&self, event: ImportProgressEvent);
}

/// Human-friendly progress on stderr: "import  parsing  1,234 / 5,000 files".
pub struct StderrProgress;

impl ImportProgressReporter for StderrProgress {
    fn report(&self, event: ImportProgressEvent) {
        let line = match &event {
            ImportProgressEvent::Discovering { dir } => {
                format!("import {}  discovering...\n", dir)
            }
            ImportProgressEvent::Grouping { n, total } => {
                // Only every 100th file and the last one, to keep stderr readable.
                if n % 100 != 0 && n != total {
                    return;
                }
                format!(
                    "import  parsing  {} / {} files\n",
                    format_number(*n),
                    format_number(*total)
                )
            }
            ImportProgressEvent::Loading {
                collection,
                documents,
            } => format!(
                "import {}  loading  {} documents\n",
                collection,
                format_number(*documents)
            ),
            ImportProgressEvent::Loaded { collection, ok } => {
                let status = if *ok { "done" } else { "done with errors" };
                format!("import {}  {}\n", collection, status)
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ImportProgressReporter for JsonProgress {
    fn report(&self, event: ImportProgressEvent) {
        let obj = match &event {
            ImportProgressEvent::Discovering { dir } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "dir": dir
            }),
            ImportProgressEvent::Grouping { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "parsing",
                "n": n,
                "total": total
            }),
            ImportProgressEvent::Loading {
                collection,
                documents,
            } => serde_json::json!({
                "event": "progress",
                "phase": "loading",
                "collection": collection,
                "documents": documents
            }),
            ImportProgressEvent::Loaded { collection, ok } => serde_json::json!({
                "event": "progress",
                "phase": "loaded",
                "collection": collection,
                "ok": ok
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ImportProgressReporter for NoProgress {
    fn report(&self, _event: ImportProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn ImportProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn reporter_per_mode() {
        for mode in [ProgressMode::Off, ProgressMode::Human, ProgressMode::Json] {
            mode.reporter().report(ImportProgressEvent::Loaded {
                collection: "airline".to_string(),
                ok: true,
            });
        }
    }
}
