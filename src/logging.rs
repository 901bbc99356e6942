//! Tracing setup.
//!
//! Console output goes to stderr and respects `RUST_LOG` (default `warn`,
//! `debug` with `-v`). A debug-level copy is written to
//! `<data dir>/pvkeys/logs/pvkeys.log` with daily rotation.

use directories::ProjectDirs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Stderr writer that emits `\r\n` line endings, so log lines stay readable
/// while the terminal is in raw mode.
struct RawStderr;

impl Write for RawStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut err = io::stderr().lock();
        for chunk in buf.split_inclusive(|b| *b == b'\n') {
            match chunk.strip_suffix(b"\n") {
                Some(line) => {
                    err.write_all(line)?;
                    err.write_all(b"\r\n")?;
                }
                None => err.write_all(chunk)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_writer(|| RawStderr)
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = match ensure_logs_dir() {
        Ok(logs_dir) => {
            let file_appender = tracing_appender::rolling::daily(logs_dir, "pvkeys.log");
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        Err(e) => {
            eprintln!("Warning: Could not initialize file logging: {}", e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn ensure_logs_dir() -> io::Result<PathBuf> {
    let proj = ProjectDirs::from("", "", "pvkeys")
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
    let dir = proj.data_local_dir().join("logs");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
