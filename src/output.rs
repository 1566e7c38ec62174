//! Log sinks and their per-command composition.
//!
//! Each subcommand builds its own sink tree once at startup and installs it as
//! the `log` facade's logger. Two wrappers make the tree composable:
//! [`LoggerStack`] fans a record out to several sinks and
//! [`ConditionalLogger`] forwards only selected levels.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{SecondsFormat, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A `log` sink that can report the most verbose level it will accept.
pub trait Sink: Log {
    fn max_level(&self) -> LevelFilter;
}

/// Console sink, configured like the rest of the env_logger ecosystem.
pub struct Console(env_logger::Logger);

impl Console {
    /// `info` by default, overridable through `RUST_LOG`.
    pub fn new() -> Self {
        Self(
            env_logger::Builder::new()
                .filter_level(LevelFilter::Info)
                .parse_default_env()
                .format_target(false)
                .build(),
        )
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for Console {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.0.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.0.log(record);
    }

    fn flush(&self) {
        self.0.flush();
    }
}

impl Sink for Console {
    fn max_level(&self) -> LevelFilter {
        self.0.filter()
    }
}

/// Appends `<timestamp>: <LEVEL>: <message>` lines to a file.
pub struct FileLogger {
    file: Mutex<File>,
    level: LevelFilter,
}

impl FileLogger {
    pub fn open(path: &Path, level: LevelFilter) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }

    /// `<state dir>/aws-credentials/aws-credentials.log`
    pub fn default_path() -> Option<PathBuf> {
        let name = env!("CARGO_PKG_NAME");
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join(name).join(format!("{name}.log")))
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(
                file,
                "{}: {}: {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

impl Sink for FileLogger {
    fn max_level(&self) -> LevelFilter {
        self.level
    }
}

/// Sends every record to each sink that accepts it.
#[derive(Default)]
pub struct LoggerStack {
    sinks: Vec<Box<dyn Sink>>,
}

impl LoggerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Log for LoggerStack {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.sinks.iter().any(|sink| sink.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        for sink in &self.sinks {
            if sink.enabled(record.metadata()) {
                sink.log(record);
            }
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

impl Sink for LoggerStack {
    fn max_level(&self) -> LevelFilter {
        self.sinks
            .iter()
            .map(|sink| sink.max_level())
            .max()
            .unwrap_or(LevelFilter::Off)
    }
}

/// Forwards only the listed levels to the wrapped sink.
pub struct ConditionalLogger<S> {
    inner: S,
    levels: Vec<Level>,
}

impl<S: Sink> ConditionalLogger<S> {
    pub fn new(inner: S, levels: &[Level]) -> Self {
        Self {
            inner,
            levels: levels.to_vec(),
        }
    }
}

impl<S: Sink> Log for ConditionalLogger<S> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.levels.contains(&metadata.level()) && self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

impl<S: Sink> Sink for ConditionalLogger<S> {
    fn max_level(&self) -> LevelFilter {
        self.levels
            .iter()
            .map(|level| level.to_level_filter())
            .max()
            .map_or(LevelFilter::Off, |level| level.min(self.inner.max_level()))
    }
}

/// Installs the composed sink for the rest of the process.
pub fn install(sink: impl Sink + 'static) -> Result<(), SetLoggerError> {
    let level = sink.max_level();
    log::set_boxed_logger(Box::new(sink))?;
    log::set_max_level(level);
    Ok(())
}
