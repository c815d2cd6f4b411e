//! `statehub settings` — Read and write `settings.json`.

use crate::output::StyledOutput;
use anyhow::{bail, Result};
use clap::Subcommand;
use serde_json::Value;
use statehub_pm::{PmConfig, SettingsStore};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show every setting
    List,

    /// Show one setting
    Get {
        /// Setting key
        key: String,
    },

    /// Set a value; JSON literals are stored as-is, anything else as a string
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },

    /// Remove a setting
    Unset {
        /// Setting key
        key: String,
    },
}

pub fn execute(config: &PmConfig, action: SettingsAction, out: &mut StyledOutput) -> Result<()> {
    let store = SettingsStore::new(config.settings_file());

    match action {
        SettingsAction::List => {
            let settings = store.load()?;
            if settings.is_empty() {
                out.warning("No settings defined");
                out.newline();
                return Ok(());
            }
            for (key, value) in &settings {
                out.info(key);
                out.plain(&format!(" = {}", value));
                out.newline();
            }
        }

        SettingsAction::Get { key } => match store.get(&key)? {
            Some(value) => {
                out.plain(&value.to_string());
                out.newline();
            }
            None => bail!("Setting '{}' is not defined", key),
        },

        SettingsAction::Set { key, value } => {
            let value = parse_value(&value);
            store.set(&key, value.clone())?;
            out.success("Set ");
            out.info(&key);
            out.plain(&format!(" = {}", value));
            out.newline();
        }

        SettingsAction::Unset { key } => {
            if store.remove(&key)?.is_none() {
                bail!("Setting '{}' is not defined", key);
            }
            out.success("Removed ");
            out.info(&key);
            out.newline();
        }
    }

    Ok(())
}

/// `true`, `3`, `{"a":1}` keep their JSON type; `hello` becomes a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_value("hello"), json!("hello"));
        assert_eq!(parse_value(""), json!(""));
    }
}
