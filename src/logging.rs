use env_logger::{Builder, Env};

/// stderr logger, `info` unless `RUST_LOG` says otherwise. stdout is kept
/// for the annotation stream.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
