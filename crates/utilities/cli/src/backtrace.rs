//! Helper to set the backtrace env var.

/// Sets `RUST_BACKTRACE=1` unless a value was already provided.
///
/// Must be called at the very start of `main`, before the async runtime or any other thread
/// is started.
pub fn enable() {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: the process is still single threaded, so nothing reads the environment
        // concurrently.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
}
