//! Tracing initialisation for the `changeplan` binary.
//!
//! Call [`init_tracing`] once at program start. Log lines go to stderr so
//! that a plan written to stdout stays machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` emits newline-delimited JSON log lines, one object per event,
///   with the `event` field of each planning stage as a top-level key.
/// * `level` is the default verbosity when `RUST_LOG` is not set.
///
/// `RUST_LOG` takes precedence over `level` and accepts the usual
/// `EnvFilter` directives, so `RUST_LOG=changeplan_core=debug` raises only
/// the library's verbosity while the CLI stays at its default.
///
/// Only the first call in a process takes effect; later calls are ignored
/// because the global subscriber can be set once.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
        tracing::info!(event = "test.after_init");
    }
}
