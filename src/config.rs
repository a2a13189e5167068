use crate::provider::ProviderConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// `groq`, `ollama` or `claude`.
    pub ai_provider: Option<String>,

    pub ai_model: Option<String>,

    /// API key for the cloud providers.
    pub api_key: Option<String>,

    /// Ollama server address (default: http://localhost:11434).
    pub ollama_host: Option<String>,

    /// Alternative endpoint URL for the cloud providers.
    pub api_base: Option<String>,
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }
}

/// Values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub host: Option<String>,
}

impl Overrides {
    /// `GLYPH_PROVIDER`, `GLYPH_MODEL`, `GLYPH_API_KEY` and `OLLAMA_HOST`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            provider: get("GLYPH_PROVIDER"),
            model: get("GLYPH_MODEL"),
            api_key: get("GLYPH_API_KEY"),
            host: get("OLLAMA_HOST"),
        }
    }

    /// Fill unset values from `fallback`.
    pub fn or(self, fallback: Overrides) -> Self {
        Self {
            provider: self.provider.or(fallback.provider),
            model: self.model.or(fallback.model),
            api_key: self.api_key.or(fallback.api_key),
            host: self.host.or(fallback.host),
        }
    }
}

/// Merge overrides and the (optional) config file into a [`ProviderConfig`].
pub fn resolve(cfg: Option<&Config>, overrides: Overrides) -> ProviderConfig {
    let file = cfg.cloned().unwrap_or_default();
    ProviderConfig {
        provider: overrides.provider.or(file.ai_provider).unwrap_or_default(),
        model: overrides.model.or(file.ai_model).unwrap_or_default(),
        api_key: overrides.api_key.or(file.api_key),
        host: overrides.host.or(file.ollama_host),
        api_base: file.api_base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("glyph-config-{}-{name}", std::process::id()))
    }

    #[test]
    fn missing_file_is_none() {
        let got = Config::load_optional(temp_path("missing.toml")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn parses_all_keys() {
        let path = temp_path("full.toml");
        std::fs::write(
            &path,
            r#"
ai_provider = "claude"
ai_model = "claude-sonnet-4-6"
api_key = "sk-ant"
ollama_host = "http://box:11434"
api_base = "http://proxy/v1/messages"
"#,
        )
        .unwrap();

        let cfg = Config::load_optional(&path).unwrap().unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.ai_provider.as_deref(), Some("claude"));
        assert_eq!(cfg.ai_model.as_deref(), Some("claude-sonnet-4-6"));
        assert_eq!(cfg.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(cfg.ollama_host.as_deref(), Some("http://box:11434"));
        assert_eq!(cfg.api_base.as_deref(), Some("http://proxy/v1/messages"));
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let path = temp_path("bad.toml");
        std::fs::write(&path, "ai_provider = ").unwrap();
        let err = Config::load_optional(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(format!("{err:#}").contains("failed to parse TOML"));
    }

    #[test]
    fn overrides_beat_file_values() {
        let file = Config {
            ai_provider: Some("groq".into()),
            ai_model: Some("llama".into()),
            api_key: Some("file-key".into()),
            ..Default::default()
        };
        let overrides = Overrides {
            provider: Some("ollama".into()),
            host: Some("http://gpu:11434".into()),
            ..Default::default()
        };

        let pc = resolve(Some(&file), overrides);
        assert_eq!(pc.provider, "ollama");
        assert_eq!(pc.model, "llama");
        assert_eq!(pc.api_key.as_deref(), Some("file-key"));
        assert_eq!(pc.host.as_deref(), Some("http://gpu:11434"));
    }

    #[test]
    fn no_file_and_no_overrides_is_empty() {
        assert_eq!(resolve(None, Overrides::default()), ProviderConfig::default());
    }

    #[test]
    fn env_lookup_ignores_blank_values() {
        let env = |key: &str| match key {
            "GLYPH_API_KEY" => Some("env-key".to_string()),
            "GLYPH_MODEL" => Some("  ".to_string()),
            _ => None,
        };
        let o = Overrides::from_lookup(env);
        assert_eq!(o.api_key.as_deref(), Some("env-key"));
        assert!(o.model.is_none());

        let flags = Overrides {
            api_key: Some("flag-key".into()),
            ..Default::default()
        };
        assert_eq!(flags.or(o).api_key.as_deref(), Some("flag-key"));
    }
}
