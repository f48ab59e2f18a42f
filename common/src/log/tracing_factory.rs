use std::io;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;

static INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone)]
pub enum OutputType {
    Stdout,
    Log,
}

#[derive(Debug, Clone)]
pub struct TracingFactoryOptions {
    debug: bool,
    output_type: OutputType,
    level: Level,
    log_dir: Option<String>,
}

impl TracingFactoryOptions {
    pub fn new(debug: bool, output_type: OutputType, log_dir: Option<String>) -> Self {
        let level = if debug { Level::DEBUG } else { Level::INFO };
        TracingFactoryOptions { debug, output_type, level, log_dir }
    }

    pub fn new_with_debug(debug: bool) -> Self {
        Self::new(debug, OutputType::Stdout, None)
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn log_dir(&self) -> &str {
        self.log_dir.as_deref().unwrap_or("")
    }
}

impl Default for TracingFactoryOptions {
    fn default() -> Self {
        Self::new_with_debug(false)
    }
}

/// Installs the process-wide tracing subscriber exactly once. Mirrors the
/// teacher's `TracingFactory`, minus the `static mut` init flag.
#[derive(Debug, Clone, Default)]
pub struct TracingFactory {
    options: TracingFactoryOptions,
}

impl TracingFactory {
    pub fn init_log(debug: bool) -> Self {
        Self::init_log_with_options(TracingFactoryOptions::new_with_debug(debug))
    }

    pub fn init_log_with_options(opts: TracingFactoryOptions) -> Self {
        INIT.get_or_init(|| {
            let format = fmt::format()
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_thread_ids(true)
                .compact();

            match &opts.output_type {
                OutputType::Stdout => {
                    let _ = tracing_subscriber::fmt()
                        .with_max_level(opts.level)
                        .event_format(format)
                        .try_init();
                }
                OutputType::Log => {
                    let dir = opts.log_dir.clone().unwrap_or_else(|| "/tmp/cache-server/logs".to_string());
                    let file_appender = rolling::daily(&dir, "cache-server.log");
                    let writer = file_appender.and(io::stdout);
                    let _ = tracing_subscriber::fmt()
                        .with_max_level(opts.level)
                        .event_format(format)
                        .with_writer(writer)
                        .try_init();
                }
            }
        });

        TracingFactory { options: opts }
    }

    pub fn options(&self) -> &TracingFactoryOptions {
        &self.options
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn init_is_idempotent() {
        TracingFactory::init_log(true);
        TracingFactory::init_log(true);
        debug!("tracing factory test");
        info!("tracing factory test");
    }
}
