mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./mediasync.toml",
        "~/.config/mediasync/config.toml",
        "/etc/mediasync/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    match config.store.kind {
        StoreKind::Http => {
            if config.store.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                anyhow::bail!("HTTP store selected but no store base_url configured");
            }
        }
        StoreKind::File => {
            if config.store.path.is_none() {
                anyhow::bail!("File store selected but no store path configured");
            }
        }
    }

    if config.rate_limit.max_attempts == 0 {
        anyhow::bail!("rate_limit.max_attempts must be at least 1");
    }

    if config.cover.width == 0 || config.cover.height == 0 {
        anyhow::bail!("Cover dimensions must be non-zero");
    }

    if config.cover.jpeg_quality == 0 || config.cover.jpeg_quality > 100 {
        anyhow::bail!("cover.jpeg_quality must be between 1 and 100");
    }

    if config.providers.tmdb.requests_per_second == 0 {
        anyhow::bail!("providers.tmdb.requests_per_second must be at least 1");
    }

    if config.defaults.preferred_sources.is_empty() {
        anyhow::bail!("defaults.preferred_sources must name at least one provider");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediasync_common::{CoverImageMode, Provider};
    use std::time::Duration;

    /// Prefix `rest` with the store section every valid config needs.
    fn with_store(rest: &str) -> String {
        format!("[store]\nbase_url = \"http://store.local\"\n\n{rest}")
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config(&with_store("")).unwrap();
        assert_eq!(config.rate_limit.max_attempts, 3);
        assert_eq!(config.batch.item_delay(), Duration::from_millis(500));
        assert_eq!(config.cover.width, 600);
        assert_eq!(
            config.defaults.preferred_sources,
            vec![Provider::Omdb, Provider::Tmdb, Provider::Trakt]
        );
        assert_eq!(config.store.kind, StoreKind::Http);
    }

    #[test]
    fn provider_backoff_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.backoff_for(Provider::Omdb), Duration::from_secs(86_400));
        assert_eq!(config.backoff_for(Provider::Tmdb), Duration::from_secs(10));
        assert_eq!(config.backoff_for(Provider::Trakt), Duration::from_secs(60));
    }

    #[test]
    fn partial_backoff_table_uses_fallback() {
        let config = parse_config(&with_store(
            r#"
            [rate_limit]
            fallback_backoff_secs = 5

            [rate_limit.backoff_secs]
            tmdb = 2
            "#,
        ))
        .unwrap();
        assert_eq!(config.rate_limit.backoff_for(Provider::Tmdb), Duration::from_secs(2));
        assert_eq!(config.rate_limit.backoff_for(Provider::Omdb), Duration::from_secs(5));
    }

    #[test]
    fn defaults_section_overrides_options() {
        let config = parse_config(&with_store(
            r#"
            [defaults]
            only_missing = false
            update_titles = false
            preferred_sources = ["tmdb", "omdb"]
            cover_image_mode = "binary"
            "#,
        ))
        .unwrap();
        assert!(!config.defaults.only_missing);
        assert!(!config.defaults.update_titles);
        assert!(config.defaults.update_descriptions);
        assert_eq!(config.defaults.preferred_sources, vec![Provider::Tmdb, Provider::Omdb]);
        assert_eq!(config.defaults.cover_image_mode, CoverImageMode::Binary);
    }

    #[test]
    fn file_store_requires_path() {
        let err = parse_config("[store]\nkind = \"file\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("no store path"));

        let config = parse_config("[store]\nkind = \"file\"\npath = \"records.json\"\n").unwrap();
        assert_eq!(config.store.kind, StoreKind::File);
    }

    #[test]
    fn http_store_requires_base_url() {
        let err = parse_config("").unwrap_err();
        assert!(format!("{err:#}").contains("no store base_url"));
        assert!(parse_config("[store]\nbase_url = \"  \"\n").is_err());
        assert!(parse_config(&with_store("")).is_ok());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse_config(&with_store("[rate_limit]\nmax_attempts = 0\n")).is_err());
        assert!(parse_config(&with_store("[cover]\nwidth = 0\n")).is_err());
        assert!(parse_config(&with_store("[cover]\njpeg_quality = 0\n")).is_err());
        assert!(parse_config(&with_store("[defaults]\npreferred_sources = []\n")).is_err());
        assert!(parse_config(&with_store("[defaults]\npreferred_sources = [\"tvdb\"]\n")).is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediasync.toml");
        std::fs::write(&path, with_store("[batch]\nitem_delay_ms = 0\n")).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.batch.item_delay(), Duration::ZERO);
    }
}
