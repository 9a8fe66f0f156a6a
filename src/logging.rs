use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber for binaries and tests.
///
/// Filter defaults to `info` for this crate and can be overridden with
/// `DOORSTEP_LOG`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env("DOORSTEP_LOG")
        .unwrap_or_else(|_| EnvFilter::new("doorstep=info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
