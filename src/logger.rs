use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured output with module targets.
    Pretty,
    /// One line per event, no colours or targets.
    Compact,
}

impl LogFormat {
    pub fn for_environment(environment: &str) -> Self {
        match environment {
            "production" | "staging" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_logger(environment: &str) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let output: Box<dyn Layer<Registry> + Send + Sync> = match LogFormat::for_environment(environment) {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).with_ansi(false).boxed(),
    };
    if let Err(err) = tracing_subscriber::registry().with(output).with(filter).try_init() {
        eprintln!("tracing subscriber already installed - {err}");
    }
}
