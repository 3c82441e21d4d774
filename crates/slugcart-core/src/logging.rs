//! Logging init: a log file under the XDG state dir, with stderr standing
//! in whenever the file sink is unavailable.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Hands out writers for the subscriber. A failed file clone degrades that
/// one event to stderr instead of dropping it.
struct LogSink {
    file: Option<File>,
}

enum SinkWriter {
    File(File),
    Stderr,
}

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SinkWriter::File(f) => f.write(buf),
            SinkWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SinkWriter::File(f) => f.flush(),
            SinkWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match &self.file {
            Some(f) => f
                .try_clone()
                .map(SinkWriter::File)
                .unwrap_or(SinkWriter::Stderr),
            None => SinkWriter::Stderr,
        }
    }
}

/// `RUST_LOG` wins; otherwise both crates log at debug over an info floor.
fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,slugcart_core=debug,slugcart_cli=debug"))
}

/// Initialize logging to `rewrite.log` under
/// `~/.local/state/slugcart/`, returning the path written to. Err when the
/// state dir cannot be prepared (e.g. unwritable), so the caller can retry
/// with [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("slugcart")?;
    let log_dir = dirs.get_state_home().join("slugcart");
    fs::create_dir_all(&log_dir)?;

    let path = log_dir.join("rewrite.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(LogSink { file: Some(file) })
        .with_ansi(false)
        .init();

    tracing::info!(path = %path.display(), "logging to file");
    Ok(path)
}

/// Stderr-only logging, for when the state dir is unusable.
pub fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(LogSink { file: None })
        .with_ansi(false)
        .init();
}
