//! Process-wide panic hook.
//!
//! Tick panics are caught by the monitor, so most panics here are reported
//! and then survived. The hook makes sure they still reach the log.

use chrono::Local;
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fs::OpenOptions,
    io::Write,
    panic::{PanicHookInfo, take_hook},
    path::{Path, PathBuf},
    thread,
};

use crate::logging::LOG_FILE_PREFIX;

/// Install a panic hook that logs through `tracing` before running the
/// previously installed hook.
///
/// In `panic = "abort"` builds the record is also appended straight to the
/// current daily log file in `log_dir`, since the non-blocking writer may
/// not flush before the process dies.
pub fn install(log_dir: impl AsRef<Path>) {
    let log_dir = log_dir.as_ref().to_path_buf();
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let record = PanicRecord::capture(panic_info);
            tracing::error!(
                target: "unturned_monitor::panic",
                thread = %record.thread,
                location = %record.location,
                "{}",
                record.payload
            );

            if cfg!(panic = "abort") {
                let _ = append_to_log_file(&log_dir, &record.to_line());
            }
        }));

        previous_hook(panic_info);
    }));
}

struct PanicRecord {
    thread: String,
    location: String,
    payload: String,
    backtrace: Backtrace,
}

impl PanicRecord {
    fn capture(panic_info: &PanicHookInfo<'_>) -> Self {
        Self {
            thread: thread::current()
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| "<unnamed>".to_string()),
            location: panic_info
                .location()
                .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
                .unwrap_or_else(|| "<unknown>".to_string()),
            payload: payload_to_string(panic_info),
            backtrace: Backtrace::capture(),
        }
    }

    fn to_line(&self) -> String {
        let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
        let mut line = format!(
            "{ts} PANIC thread={} location={} payload={}",
            self.thread, self.location, self.payload
        );
        if self.backtrace.status() == BacktraceStatus::Captured {
            line.push_str(&format!("\nBacktrace:\n{}", self.backtrace));
        }
        line
    }
}

fn append_to_log_file(log_dir: &Path, line: &str) -> std::io::Result<()> {
    // Matches the tracing_appender daily file name.
    let filename = format!("{}.{}", LOG_FILE_PREFIX, Local::now().format("%Y-%m-%d"));
    let path = PathBuf::from(log_dir).join(filename);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.flush()
}

fn payload_to_string(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = panic_info.payload();
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        panic_info.to_string()
    }
}
