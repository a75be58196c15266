//! Process-wide tracing setup shared by the binaries.

pub mod logging;

pub use logging::LogFormat;

/// Initialize tracing from `LOG_FORMAT` and `RUST_LOG`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
