use std::path::Path;

use anyhow::bail;
use indoc::indoc;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::Config;

/// Load and validate a RouteCodex configuration file, expanding
/// `${ENV_VAR}` references against the process environment (spec §6
/// `config.json`/`config.toml`).
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate_has_providers(&config)?;

    Ok(config)
}

/// Validates that the configuration has at least one usable provider
/// (spec §1 "the core" requires at least one configured target to route
/// to).
pub(crate) fn validate_has_providers(config: &Config) -> anyhow::Result<()> {
    if config.providers.is_empty() {
        bail!(indoc! {r#"
            No providers configured. RouteCodex requires at least one upstream
            provider to function.

            Example configuration:

              [providers.openai]
              type = "openai-compatible"
              base_url = "https://api.openai.com/v1"

              [providers.openai.auth]
              kind = "api-key"
              keys = ["${OPENAI_API_KEY}"]

              [providers.openai.models.gpt-4]
        "#});
    }

    for (provider_id, provider) in &config.providers {
        if let crate::AuthConfig::ApiKey(keys) = &provider.auth
            && keys.keys.is_empty()
        {
            bail!("Provider '{provider_id}' has auth.kind = \"api-key\" but no keys configured");
        }
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::expand(s) {
            Ok(out) => *s = out,
            Err(reason) => {
                let mut p = String::new();

                for segment in path.iter() {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!(crate::Error::EnvVarSubstitution { path: p, reason });
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::Config;

    #[test]
    fn fails_with_no_providers() {
        let config = Config::default();
        let result = super::validate_has_providers(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No providers configured"));
    }

    #[test]
    fn passes_with_one_provider() {
        let config_str = indoc! {r#"
            [providers.openai]
            type = "openai-compatible"
            base_url = "https://api.openai.com/v1"

            [providers.openai.auth]
            kind = "api-key"
            keys = ["sk-test"]

            [providers.openai.models.gpt-4]
        "#};

        let config: Config = toml::from_str(config_str).unwrap();
        assert!(super::validate_has_providers(&config).is_ok());
    }

    #[test]
    fn fails_with_empty_key_list() {
        let config_str = indoc! {r#"
            [providers.openai]
            type = "openai-compatible"
            base_url = "https://api.openai.com/v1"

            [providers.openai.auth]
            kind = "api-key"
            keys = []
        "#};

        let config: Config = toml::from_str(config_str).unwrap();
        let result = super::validate_has_providers(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no keys configured"));
    }

    #[test]
    fn expands_env_vars_in_place() {
        // SAFETY: single-threaded test, no concurrent env access.
        unsafe { std::env::set_var("ROUTECODEX_TEST_KEY", "expanded-value") };

        let config_str = indoc! {r#"
            [providers.openai]
            type = "openai-compatible"
            base_url = "https://api.openai.com/v1"

            [providers.openai.auth]
            kind = "api-key"
            keys = ["${ROUTECODEX_TEST_KEY}"]
        "#};

        let mut raw: toml::Value = toml::from_str(config_str).unwrap();
        super::expand_dynamic_strings(&mut Vec::new(), &mut raw).unwrap();
        let config: Config = serde::Deserialize::deserialize(raw).unwrap();

        use secrecy::ExposeSecret;
        let crate::AuthConfig::ApiKey(keys) = &config.providers["openai"].auth else {
            panic!("expected api-key auth");
        };
        assert_eq!(keys.keys[0].expose_secret(), "expanded-value");
    }
}
