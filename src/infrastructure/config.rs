use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::error::DiffError;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub diff: DiffOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Database driver: "postgres" (default) or "mysql".
    #[serde(default = "default_driver")]
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub schema: String,
}

fn default_driver() -> String {
    "postgres".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiffOptions {
    /// Permit DROP TABLE / DROP COLUMN statements. When false, a vanished
    /// table or column aborts the diff instead of producing a changeset.
    #[serde(default)]
    pub allow_destructive: bool,
    /// Collation applied to newly created tables, e.g. "utf8mb4_unicode_ci".
    #[serde(default)]
    pub collation: Option<String>,
    /// Charset override; derived from the collation prefix when absent.
    #[serde(default)]
    pub charset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
}

impl DbConfig {
    /// Build a sqlx-compatible connection URL from this config.
    pub fn url(&self) -> String {
        match self.driver.as_str() {
            "mysql" => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let cfg: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        Ok(cfg)
    }
}

// ─── Collation ───

/// A validated charset + collation pair for CREATE TABLE statements.
///
/// Both parts must match `[a-z0-9_]+`; anything else is rejected at
/// configuration time, long before any SQL is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation {
    pub charset: String,
    pub collation: String,
}

impl Collation {
    /// Parse a collation specifier, deriving the charset from the token
    /// before the first underscore when no explicit charset is given
    /// ("utf8mb4_unicode_ci" → charset "utf8mb4").
    pub fn parse(collation: &str, charset: Option<&str>) -> Result<Self, DiffError> {
        if !is_valid_token(collation) {
            return Err(DiffError::InvalidCollation(collation.to_string()));
        }

        let charset = match charset {
            Some(cs) => {
                if !is_valid_token(cs) {
                    return Err(DiffError::InvalidCollation(cs.to_string()));
                }
                cs.to_string()
            }
            None => collation
                .split('_')
                .next()
                .unwrap_or(collation)
                .to_string(),
        };

        Ok(Collation {
            charset,
            collation: collation.to_string(),
        })
    }

    /// Resolve the optional collation settings of [`DiffOptions`].
    pub fn from_options(opts: &DiffOptions) -> Result<Option<Self>, DiffError> {
        match &opts.collation {
            Some(c) => Ok(Some(Self::parse(c, opts.charset.as_deref())?)),
            None => Ok(None),
        }
    }
}

fn is_valid_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collation_derives_charset_from_prefix() {
        let c = Collation::parse("utf8mb4_unicode_ci", None).unwrap();
        assert_eq!(c.charset, "utf8mb4");
        assert_eq!(c.collation, "utf8mb4_unicode_ci");
    }

    #[test]
    fn collation_accepts_explicit_charset() {
        let c = Collation::parse("utf8mb4_unicode_ci", Some("utf8mb4")).unwrap();
        assert_eq!(c.charset, "utf8mb4");
    }

    #[test]
    fn collation_rejects_invalid_characters() {
        assert!(Collation::parse("utf8mb4_unicode_ci; DROP TABLE x", None).is_err());
        assert!(Collation::parse("", None).is_err());
        assert!(Collation::parse("UTF8", None).is_err());
        assert!(Collation::parse("utf8mb4_unicode_ci", Some("bad charset")).is_err());
    }

    #[test]
    fn from_options_none_when_unset() {
        let opts = DiffOptions::default();
        assert!(Collation::from_options(&opts).unwrap().is_none());
    }

    #[test]
    fn url_per_driver() {
        let mut cfg = DbConfig {
            driver: "postgres".into(),
            host: "localhost".into(),
            port: 5432,
            dbname: "app".into(),
            user: "u".into(),
            password: "p".into(),
            schema: "public".into(),
        };
        assert_eq!(cfg.url(), "postgres://u:p@localhost:5432/app");

        cfg.driver = "mysql".into();
        cfg.port = 3306;
        assert_eq!(cfg.url(), "mysql://u:p@localhost:3306/app");
    }
}
