use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax. At the default `info`
/// level a run shows worker start-up, each merge placement and score, and any
/// failure (`warn` for a failed request, `error` for a lost module). Bridge
/// traffic, memory growth and progress ticks are `debug`; the KiB required
/// against KiB available on each memory request is `trace`. A typical
/// debugging filter is `"stitch_engine=debug,stitch::module=off"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Config with an explicit filter; `None` falls back to `RUST_LOG`.
    pub fn with_filter(filter: Option<String>) -> Self {
        Self {
            env_filter: filter,
            ..Self::default()
        }
    }
}

/// Log target for the compute module's own dumps.
///
/// Carries the pyramid depth, per-level search windows and the final score,
/// all at `debug`. They stay silent unless the filter enables `debug` for
/// this target, e.g. `stitch::module=debug`.
pub const MODULE_TARGET: &str = "stitch::module";

static INIT: Once = Once::new();

/// Installs `env_logger` behind the `log` facade, once per process.
///
/// Filter precedence is the config, then `RUST_LOG`, then `info`. Later calls
/// are ignored, and an already installed logger (a test harness's) is kept.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_filter_keeps_default_style() {
        let config = LoggingConfig::with_filter(Some("stitch::module=debug".into()));
        assert_eq!(config.env_filter.as_deref(), Some("stitch::module=debug"));
        assert!(matches!(config.write_style, env_logger::WriteStyle::Auto));
        assert!(LoggingConfig::with_filter(None).env_filter.is_none());
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LoggingConfig::with_filter(Some("warn".into())));
        init_logging(LoggingConfig::default());
        log::debug!(target: MODULE_TARGET, "after init");
    }
}
