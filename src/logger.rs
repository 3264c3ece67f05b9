//! Engine log. Nothing is written until the host opens a log with [`init`]
//! or [`init_at`]; before that the `log_*!` macros do nothing.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

/// Location of the open log, if any.
pub fn log_path() -> Option<&'static Path> {
    LOG_PATH.get().map(PathBuf::as_path)
}

pub fn is_enabled() -> bool {
    LOG_FILE.get().is_some()
}

fn append(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// `[HH:MM:SS] [LEVEL] message`
fn format_line(clock: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", clock, level, msg)
}

/// Backend of the logging macros.
pub fn write(level: Level, msg: &str) {
    if is_enabled() {
        append(&format_line(&clock(), level, msg));
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {{
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    }};
}

/// Opens `rasterpad.log` under the platform data directory. Failure leaves
/// logging off.
pub fn init() {
    let path = default_log_path();
    if let Err(e) = init_at(&path) {
        eprintln!("[rasterpad] cannot open log {}: {}", path.display(), e);
    }
}

/// Truncates `path` and routes the macros to it. A panic hook copies panic
/// messages into the log. Only the first successful call takes effect.
pub fn init_at(path: &Path) -> io::Result<()> {
    if is_enabled() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    if LOG_FILE.set(Mutex::new(file)).is_err() {
        return Ok(());
    }
    let _ = LOG_PATH.set(path.to_path_buf());

    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    append(&format!("--- rasterpad {} log opened at unix {} ---", env!("CARGO_PKG_VERSION"), started));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        append(&format_line(&clock(), Level::Error, &format!("panic: {}", info)));
        prev(info);
    }));
    Ok(())
}

fn default_log_path() -> PathBuf {
    data_dir().join("RasterPad").join("rasterpad.log")
}

fn data_dir() -> PathBuf {
    let var = |k: &str| std::env::var_os(k).map(PathBuf::from);
    if cfg!(target_os = "windows")
        && let Some(appdata) = var("APPDATA")
    {
        return appdata;
    }
    if cfg!(target_os = "macos")
        && let Some(home) = var("HOME")
    {
        return home.join("Library").join("Application Support");
    }
    var("XDG_DATA_HOME")
        .or_else(|| var("HOME").map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// UTC wall clock, `HH:MM:SS`.
fn clock() -> String {
    let Ok(d) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return "--:--:--".to_string();
    };
    let secs = d.as_secs() % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_are_silent_before_init() {
        if !is_enabled() {
            log_info!("ignored {}", 1);
            log_warn!("ignored");
            log_err!("ignored");
            assert!(log_path().is_none());
        }
    }

    #[test]
    fn macros_work_in_expression_position() {
        let n = 3;
        let () = if n > 2 { log_info!("big {}", n) } else { log_warn!("small") };
        match n {
            0 => log_err!("zero"),
            _ => log_info!("nonzero"),
        }
    }

    #[test]
    fn line_layout() {
        assert_eq!(format_line("12:00:01", Level::Warn, "x"), "[12:00:01] [WARN] x");
        let c = clock();
        assert_eq!(c.len(), 8);
        assert_eq!(&c[2..3], ":");
    }
}
