use crate::config::Config;
use crate::error::ConfigError;

/// Merge an overlay TOML fragment on top of a base [`Config`].
///
/// Both sides are converted to [`toml::Value`] tables and deep-merged, so a
/// project file can add one alias without discarding the global ones.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let base_str = toml::to_string(base).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut base_val: toml::Value =
        toml::from_str(&base_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let overlay_val: toml::Value =
        toml::from_str(overlay_toml).map_err(|e| ConfigError::Parse(e.to_string()))?;

    merge_values(&mut base_val, &overlay_val);

    base_val
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
}

/// Tables merge key-by-key; every other value type is replaced outright.
/// Arrays (preset args, adapter args) are replaced, not concatenated.
fn merge_values(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, val) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_val) => merge_values(base_val, val),
                    None => {
                        base_table.insert(key.clone(), val.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn merge_empty_overlay_returns_base() {
        let base = Config::default();
        let merged = merge_configs(&base, "").expect("merge empty");
        assert_eq!(merged, base);
    }

    #[test]
    fn merge_adds_alias_and_keeps_existing() {
        let mut base = Config::default();
        base.aliases.insert("ll".into(), "breakpoints".into());
        let merged = merge_configs(&base, "[aliases]\nw = \"backtrace\"\n").expect("merge");
        assert_eq!(merged.aliases.len(), 2);
        assert_eq!(merged.aliases["ll"], "breakpoints");
        assert_eq!(merged.aliases["w"], "backtrace");
    }

    #[test]
    fn merge_replaces_preset_args_wholesale() {
        let base: Config =
            toml::from_str("[presets.web]\nargs = [\"--type\", \"node\", \"a.js\"]\n").unwrap();
        let merged = merge_configs(&base, "[presets.web]\nargs = [\"b.js\"]\n").expect("merge");
        assert_eq!(merged.presets["web"].args, vec!["b.js"]);
    }

    #[test]
    fn merge_preserves_unrelated_sections() {
        let base = Config::default();
        let merged = merge_configs(&base, "[log]\nlevel = \"trace\"\n").expect("merge");
        assert_eq!(merged.log.level, LogLevel::Trace);
        assert_eq!(merged.session, base.session);
    }

    #[test]
    fn merge_invalid_overlay_returns_parse_error() {
        let result = merge_configs(&Config::default(), "{{invalid}}");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
