use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Refresh interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub source: SourceConfig,
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub selectors: Selectors,
}

fn default_base_url() -> String {
    "https://www.cartamz.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "CartamzDigest/1.0 (News Ingester)".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            selectors: Selectors::default(),
        }
    }
}

/// CSS selectors describing where the listing page keeps each field.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Selectors {
    pub category_block: String,
    pub category_heading: String,
    pub article_block: String,
    pub title_link: String,
    pub date: String,
    pub excerpt: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            category_block: "div.moduletablecolunade3".to_string(),
            category_heading: "h3:not(.allmode-title)".to_string(),
            article_block: "div.allmode-wrapper".to_string(),
            title_link: "h3.allmode-title a".to_string(),
            date: "div.allmode-date".to_string(),
            excerpt: "div.allmode-text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            listen_addr: default_listen_addr(),
            source: SourceConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_refresh_interval() {
        assert_eq!(default_refresh_interval(), 10);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            refresh_interval = 30
            listen_addr = "127.0.0.1:8080"

            [source]
            base_url = "https://news.example.com"
            timeout_secs = 5
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.refresh_interval, 30);
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.source.base_url, "https://news.example.com");
        assert_eq!(config.source.timeout_secs, 5);
        assert_eq!(config.source.user_agent, default_user_agent());
        assert_eq!(config.source.selectors, Selectors::default());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();

        assert_eq!(config.refresh_interval, 10);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.source.base_url, "https://www.cartamz.com");
        assert_eq!(config.source.timeout_secs, 30);
    }

    #[test]
    fn test_partial_selector_override() {
        let content = r#"
            [source.selectors]
            article_block = "article.news"
        "#;

        let config = Config::from_str(content).unwrap();

        assert_eq!(config.source.selectors.article_block, "article.news");
        assert_eq!(
            config.source.selectors.category_block,
            "div.moduletablecolunade3"
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.refresh_interval, 10);
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let result = Config::from_str(r#"refresh_interval = "often""#);
        assert!(result.is_err());
    }
}
