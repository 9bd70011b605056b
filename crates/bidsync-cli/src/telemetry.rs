//! Telemetry initialization.
//!
//! Controlled by `BIDSYNC_LOG_FORMAT`:
//! - unset or `"compact"` → human-readable events to stderr
//! - `"json"` → JSON spans/events to stderr, one object per line
//!
//! Filtering follows `RUST_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Output format for log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Read the format from `BIDSYNC_LOG_FORMAT`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("BIDSYNC_LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            None | Some("" | "compact") => Self::Compact,
            Some(other) => {
                eprintln!("warning: unknown BIDSYNC_LOG_FORMAT {other:?}, using compact");
                Self::Compact
            }
        }
    }
}

/// Install the global subscriber. Call once, first thing in `main()`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
