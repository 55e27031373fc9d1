//! Site configuration (`.s3_website.yaml`).
//!
//! # Example
//!
//! ```text
//! s3_bucket: example.com
//! site: _site
//! cloudfront_distribution_id: E2ABCDEF123456
//! index_document: index.html
//! cache_rules:
//!   - match: "/assets/*"
//!     maxage: 1 year
//!   - match: "*.html"
//!     cache_control: public
//!     maxage: 300
//! ```
//!
//! # API pattern
//!
//! [`load_at`] accepts either the config file itself or a directory holding
//! `.s3_website.yaml` / `.s3_website.yml`. The returned [`LoadedConfig`]
//! remembers the directory the file lives in; `site` is resolved against it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache_rules::{CacheRuleSpec, CacheRules};
use crate::error::{io_err, ConfigError};

/// File names searched for, in order, when given a directory.
pub const CONFIG_FILE_NAMES: [&str; 2] = [".s3_website.yaml", ".s3_website.yml"];

/// CloudFront accepts at most this many paths per invalidation request.
pub const DEFAULT_INVALIDATION_BATCH_SIZE: usize = 3000;

/// Deserialized site configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub s3_bucket: String,
    /// Site directory, relative to the config file's directory.
    pub site: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudfront_distribution_id: Option<String>,
    /// Object name served for directory URLs (e.g. `index.html`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_document: Option<String>,
    #[serde(default)]
    pub cache_rules: Vec<CacheRuleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidation_batch_size: Option<usize>,
}

impl SiteConfig {
    pub fn invalidation_batch_size(&self) -> usize {
        self.invalidation_batch_size
            .unwrap_or(DEFAULT_INVALIDATION_BATCH_SIZE)
            .max(1)
    }
}

/// A parsed config together with where it was found.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: SiteConfig,
    /// Directory containing the config file.
    pub base_path: PathBuf,
    /// Compiled `cache_rules`.
    pub cache_rules: CacheRules,
}

impl LoadedConfig {
    /// Absolute (or base-relative) path of the site directory.
    pub fn site_dir(&self) -> PathBuf {
        self.base_path.join(&self.config.site)
    }
}

/// Load the site config from a file or a directory containing one.
///
/// Returns `ConfigError::NotFound` if a directory holds neither file name,
/// `ConfigError::Parse` (with path + line context) if the YAML is malformed.
pub fn load_at(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let (file, base_path) = if path.is_dir() {
        let found = CONFIG_FILE_NAMES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::NotFound {
                path: path.to_path_buf(),
            })?;
        (found, path.to_path_buf())
    } else {
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        (path.to_path_buf(), base)
    };

    let contents = match std::fs::read_to_string(&file) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::NotFound { path: file });
        }
        Err(e) => return Err(io_err(&file, e)),
    };
    let config = parse(&contents).map_err(|source| ConfigError::Parse {
        path: file.clone(),
        source,
    })?;
    let cache_rules = CacheRules::compile(&config.cache_rules)?;

    Ok(LoadedConfig {
        config,
        base_path,
        cache_rules,
    })
}

/// Parse config YAML without touching the filesystem.
pub fn parse(yaml: &str) -> Result<SiteConfig, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_rules::MaxAge;
    use crate::types::ObjectKey;
    use tempfile::TempDir;

    const FULL: &str = r#"
s3_bucket: example.com
site: _site
cloudfront_distribution_id: E123
index_document: index.html
cache_rules:
  - match: "/assets/*"
    maxage: 1 year
  - match_regexp: '\.html$'
    cache_control: public
    maxage: 300
"#;

    #[test]
    fn parses_all_fields() {
        let cfg = parse(FULL).expect("parse");
        assert_eq!(cfg.s3_bucket, "example.com");
        assert_eq!(cfg.site, PathBuf::from("_site"));
        assert_eq!(cfg.cloudfront_distribution_id.as_deref(), Some("E123"));
        assert_eq!(cfg.index_document.as_deref(), Some("index.html"));
        assert_eq!(cfg.cache_rules.len(), 2);
        assert_eq!(
            cfg.cache_rules[0].maxage,
            Some(MaxAge::Duration("1 year".to_string()))
        );
        assert_eq!(cfg.cache_rules[1].maxage, Some(MaxAge::Seconds(300)));
        assert_eq!(cfg.invalidation_batch_size(), DEFAULT_INVALIDATION_BATCH_SIZE);
    }

    #[test]
    fn minimal_config_defaults() {
        let cfg = parse("s3_bucket: b\nsite: out\n").expect("parse");
        assert!(cfg.cloudfront_distribution_id.is_none());
        assert!(cfg.cache_rules.is_empty());
    }

    #[test]
    fn load_from_directory_prefers_yaml_extension() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".s3_website.yml"), "s3_bucket: yml\nsite: s\n").unwrap();
        std::fs::write(tmp.path().join(".s3_website.yaml"), "s3_bucket: yaml\nsite: s\n").unwrap();

        let loaded = load_at(tmp.path()).expect("load");
        assert_eq!(loaded.config.s3_bucket, "yaml");
        assert_eq!(loaded.base_path, tmp.path());
        assert_eq!(loaded.site_dir(), tmp.path().join("s"));
    }

    #[test]
    fn load_from_file_uses_parent_as_base() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("deploy.yaml");
        std::fs::write(&file, FULL).unwrap();

        let loaded = load_at(&file).expect("load");
        assert_eq!(loaded.base_path, tmp.path());
        assert_eq!(loaded.cache_rules.len(), 2);
        let key = ObjectKey::parse("assets/app.js").unwrap();
        assert_eq!(loaded.cache_rules.resolve(&key), Some("max-age=31536000"));
    }

    #[test]
    fn missing_config_in_directory() {
        let tmp = TempDir::new().unwrap();
        let err = load_at(tmp.path()).expect_err("no config");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(".s3_website.yaml");
        std::fs::write(&file, "s3_bucket: [unclosed\n").unwrap();
        match load_at(tmp.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
