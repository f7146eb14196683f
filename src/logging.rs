//! Logger setup for native and web targets.

/// Installs the platform logger.
///
/// Natively this is `env_logger` filtered through `RUST_LOG` (default
/// `info`); on wasm32 log records go to the browser console. Calling it more
/// than once is harmless.
pub fn init() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
    #[cfg(target_arch = "wasm32")]
    {
        let _ = console_log::init_with_level(log::Level::Info);
    }
}
