use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use rill_config::{LogFormat, LoggingConfig};

/// Initialize global tracing from the `[logging]` config section.
///
/// Builds one stdout layer (plain or JSON per config) and, when a log file
/// is configured, a second non-blocking plain file layer. Relative file
/// paths resolve against `base_dir` (the config file's parent directory).
///
/// The returned guard must be held for the process lifetime — dropping it
/// stops the background log writer.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let stdout_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Plain => fmt::layer().with_filter(build_filter(config)?).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_filter(build_filter(config)?)
            .boxed(),
    };

    let (file_layer, guard) = match &config.file {
        Some(file) => {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };
            let dir = path.parent().unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log file path {:?} has no file name", path))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(build_filter(config)?)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}

/// `EnvFilter` from the global level plus per-module overrides.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow::anyhow!("invalid logging.level {:?}: {e}", config.level))?;
    for (module, level) in &config.modules {
        let directive = format!("{module}={level}")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid logging.modules entry {module:?}: {e}"))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}
