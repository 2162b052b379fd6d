use env_logger::Env;

/// Install the `env_logger` backend, `info` unless `RUST_LOG` says otherwise.
/// Later calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
}

pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
