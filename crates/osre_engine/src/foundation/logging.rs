//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with an explicit filter string
///
/// The filter uses the `env_logger` syntax (`"info"`, `"osre_engine=debug"`).
/// A `RUST_LOG` value set in the environment takes precedence. Calling this
/// more than once is harmless; later calls keep the first logger.
pub fn init_with_filter(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized, keeping existing configuration");
    }
}

/// Initialize the logging system with the filter of a render configuration
pub fn init_from_config(config: &crate::config::RenderCoreConfig) {
    init_with_filter(&config.log_filter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        let config = crate::config::RenderCoreConfig::default();
        init_from_config(&config);
        init_with_filter("debug");
        log::info!("logger still usable");
    }
}
