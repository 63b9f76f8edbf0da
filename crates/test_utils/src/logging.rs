/// Initializes logging for tests
///
/// Output is captured by the test harness, and can be enabled with `RUST_LOG`,
/// e.g. `RUST_LOG=sharedptr=trace`. It's safe to call this from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
