//! Log output on stderr
//!
//! Stdout carries only render and diff output, so every log line goes to
//! stderr. `RUST_LOG` takes precedence over `--debug`.

use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "warn";
const DEBUG_LEVEL: &str = "debug";

pub fn init(debug: bool) {
    let fallback = if debug { DEBUG_LEVEL } else { DEFAULT_LEVEL };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
