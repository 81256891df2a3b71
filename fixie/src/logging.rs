//! Diagnostic tracing for debugging fixie itself.
//!
//! Run output and warnings go to stdout through [`crate::report`]; the shell's
//! own stderr is forwarded by the session. This module only covers fixie's
//! internal `tracing` events, which are off unless `RUST_LOG` asks for them.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Route fixie's diagnostics to stderr, where they interleave with the
/// forwarded shell stderr but never with fragment output on stdout.
///
/// `RUST_LOG` selects the level; unset means only warnings such as a dropped
/// incomplete fragment or a shell that died mid-fragment.
///
/// # Example
/// ```bash
/// RUST_LOG=fixie=debug fixie build
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
