//! Local output sink.
//!
//! # Responsibilities
//! - Write finished records to stdout (success) or stderr (error)
//! - Color the line by status code when enabled
//! - Provide the always-available fallback for everything else

use std::io::Write;
use std::sync::Arc;

use crate::sink::{FinishedRecord, Sink, SinkError};

const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Process stream a line is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A line-oriented output the local sink writes through.
pub trait LocalOutput: Send + Sync {
    /// Write `line` followed by a newline.
    fn write_line(&self, stream: Stream, line: &str) -> std::io::Result<()>;
}

/// The process's stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdOutput;

impl LocalOutput for StdOutput {
    fn write_line(&self, stream: Stream, line: &str) -> std::io::Result<()> {
        match stream {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{line}")
            }
            Stream::Stderr => {
                let mut err = std::io::stderr().lock();
                writeln!(err, "{line}")
            }
        }
    }
}

/// Sink that prints records locally.
#[derive(Clone)]
pub struct LocalSink {
    colors: bool,
    output: Arc<dyn LocalOutput>,
}

impl LocalSink {
    pub fn new(colors: bool, output: Arc<dyn LocalOutput>) -> Self {
        Self { colors, output }
    }

    /// Format a record line as it will be printed.
    pub fn format_line(&self, record: &FinishedRecord) -> String {
        if !self.colors {
            return record.text.clone();
        }
        let color = if (200..300).contains(&record.status_code) {
            CYAN
        } else {
            RED
        };
        format!("{color}{}{RESET}", record.text)
    }

    /// Best-effort write of a diagnostic line to stderr; failures are dropped.
    pub fn diagnostic(&self, message: &str) {
        let _ = self.output.write_line(Stream::Stderr, message);
    }
}

impl Sink for LocalSink {
    fn emit(&self, record: FinishedRecord) -> Result<(), SinkError> {
        let stream = if record.outcome.is_error() {
            Stream::Stderr
        } else {
            Stream::Stdout
        };
        let line = self.format_line(&record);
        self.output.write_line(stream, &line)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

impl std::fmt::Debug for LocalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSink")
            .field("colors", &self.colors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Labels;
    use crate::sink::Outcome;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<(Stream, String)>>,
    }

    impl LocalOutput for Capture {
        fn write_line(&self, stream: Stream, line: &str) -> std::io::Result<()> {
            self.lines.lock().push((stream, line.to_string()));
            Ok(())
        }
    }

    struct Broken;

    impl LocalOutput for Broken {
        fn write_line(&self, _stream: Stream, _line: &str) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn record(outcome: Outcome, status_code: u16) -> FinishedRecord {
        FinishedRecord {
            document: json!({}),
            text: "{}".to_string(),
            outcome,
            status_code,
            request_id: "r".into(),
            url: "/".into(),
            method: "GET".into(),
            labels: Labels {
                domain: "d".into(),
                service: "s".into(),
                module: "m".into(),
            },
        }
    }

    #[test]
    fn test_streams_follow_outcome() {
        let capture = Arc::new(Capture::default());
        let sink = LocalSink::new(false, capture.clone());

        sink.emit(record(Outcome::Success, 200)).unwrap();
        sink.emit(record(Outcome::Error, 400)).unwrap();

        let lines = capture.lines.lock();
        assert_eq!(lines[0], (Stream::Stdout, "{}".to_string()));
        assert_eq!(lines[1], (Stream::Stderr, "{}".to_string()));
    }

    #[test]
    fn test_colors_by_status_range() {
        let sink = LocalSink::new(true, Arc::new(Capture::default()));
        assert_eq!(sink.format_line(&record(Outcome::Success, 204)), "\x1b[36m{}\x1b[0m");
        assert_eq!(sink.format_line(&record(Outcome::Success, 302)), "\x1b[31m{}\x1b[0m");
        assert_eq!(sink.format_line(&record(Outcome::Error, 500)), "\x1b[31m{}\x1b[0m");
    }

    #[test]
    fn test_write_failure_is_reported() {
        let sink = LocalSink::new(false, Arc::new(Broken));
        let err = sink.emit(record(Outcome::Success, 200)).unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
        // Diagnostics never fail.
        sink.diagnostic("ignored");
    }
}
