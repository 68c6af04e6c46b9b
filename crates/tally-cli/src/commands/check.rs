//! Check-config command implementation.

use crate::config::AppConfig;
use crate::error::Result;

/// Execute the check-config command.
///
/// The configuration was already validated on load; this prints the
/// effective values and whether the provider's API key is available.
pub fn execute_check_config(config: &AppConfig) -> Result<()> {
    println!("{}", config.to_toml()?);
    println!("# {}", key_status(config));
    if config.categories.is_empty() {
        println!("# warning: no categories configured, category checks are disabled");
    }
    Ok(())
}

/// One-line description of API key availability, never the key itself.
pub fn key_status(config: &AppConfig) -> String {
    let provider = &config.provider;
    match (provider.api_key_env(), provider.resolve_api_key()) {
        (None, _) => format!("provider '{}' needs no API key", provider.kind),
        (Some(var), Ok(Some(_))) => format!("API key found in ${}", var),
        (Some(var), Ok(None)) => format!("${} not set, continuing without a key", var),
        (Some(_), Err(e)) => format!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_llm::{ProviderConfig, ProviderKind};

    #[test]
    fn test_key_status_for_missing_key() {
        let config = AppConfig {
            provider: ProviderConfig {
                api_key_env: Some("TALLY_TEST_KEY_THAT_IS_NEVER_SET".into()),
                ..ProviderConfig::for_kind(ProviderKind::Anthropic)
            },
            ..AppConfig::default()
        };
        let status = key_status(&config);
        assert!(status.contains("TALLY_TEST_KEY_THAT_IS_NEVER_SET"), "{}", status);
    }

    #[test]
    fn test_check_config_prints_defaults() {
        assert!(execute_check_config(&AppConfig::default()).is_ok());
    }
}
