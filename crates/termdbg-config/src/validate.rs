use crate::config::Config;
use crate::error::ConfigError;

const CLOSE_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=60_000;

/// Validate a [`Config`], returning every violation found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !CLOSE_TIMEOUT_RANGE_MS.contains(&config.session.close_timeout_ms) {
        errors.push(ConfigError::Validation {
            field: "session.close_timeout_ms".to_string(),
            message: format!(
                "must be 100..=60000, got {}",
                config.session.close_timeout_ms
            ),
        });
    }

    if config.session.request_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "session.request_timeout_ms".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    for (alias, expansion) in &config.aliases {
        if alias.trim().is_empty() || alias.contains(char::is_whitespace) {
            errors.push(ConfigError::Validation {
                field: format!("aliases.{alias}"),
                message: "alias names must be a single non-empty word".to_string(),
            });
        }
        if expansion.trim().is_empty() {
            errors.push(ConfigError::Validation {
                field: format!("aliases.{alias}"),
                message: "expansion must not be empty".to_string(),
            });
        }
    }

    for (name, preset) in &config.presets {
        if preset.args.iter().any(|a| a == "--preset") {
            errors.push(ConfigError::Validation {
                field: format!("presets.{name}.args"),
                message: "presets cannot reference other presets".to_string(),
            });
        }
    }

    for (kind, entry) in &config.adapters {
        if entry.command.trim().is_empty() {
            errors.push(ConfigError::Validation {
                field: format!("adapters.{kind}.command"),
                message: "must not be empty".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdapterEntry, Preset};

    #[test]
    fn valid_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn close_timeout_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.session.close_timeout_ms = 50;
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().contains("session.close_timeout_ms"));
    }

    #[test]
    fn zero_request_timeout_rejected() {
        let mut cfg = Config::default();
        cfg.session.request_timeout_ms = 0;
        let errs = validate(&cfg).unwrap_err();
        assert!(errs[0].to_string().contains("session.request_timeout_ms"));
    }

    #[test]
    fn alias_with_space_rejected() {
        let mut cfg = Config::default();
        cfg.aliases.insert("two words".into(), "help".into());
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn nested_preset_rejected() {
        let mut cfg = Config::default();
        cfg.presets.insert(
            "loop".into(),
            Preset {
                args: vec!["--preset".into(), "loop".into()],
                description: None,
            },
        );
        let errs = validate(&cfg).unwrap_err();
        assert!(errs[0].to_string().contains("presets.loop.args"));
    }

    #[test]
    fn multiple_errors_returned() {
        let mut cfg = Config::default();
        cfg.session.close_timeout_ms = 0;
        cfg.aliases.insert("x".into(), "  ".into());
        cfg.adapters.insert(
            "python".into(),
            AdapterEntry {
                command: String::new(),
                args: vec![],
            },
        );
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 3);
    }
}
