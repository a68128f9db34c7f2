//! Application configuration for LicenseGraph.
//!
//! User config lives at `~/.licensegraph/licensegraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LicenseGraphError, Result};
use crate::types::ComparisonMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "licensegraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".licensegraph";

/// Microsoft's published "product names and service plan identifiers" CSV.
pub const DEFAULT_SOURCE_URL: &str = "https://download.microsoft.com/download/e/3/e/e3e9faf2-f28b-490a-9ada-c6089a1fc5b0/Product%20names%20and%20service%20plan%20identifiers%20for%20licensing.csv";

// ---------------------------------------------------------------------------
// Config structs (matching licensegraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the source catalog comes from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Generation behaviour.
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Known family upgrades applied after set comparison.
    #[serde(default = "default_upgrades")]
    pub upgrades: Vec<UpgradeRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            generation: GenerationSettings::default(),
            upgrades: default_upgrades(),
        }
    }
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Download URL of the catalog CSV.
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Read this local CSV instead of downloading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_csv: Option<String>,

    /// HTTP timeout for the download.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            local_csv: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Compare raw or expanded entitlement sets.
    #[serde(default)]
    pub mode: ComparisonMode,

    /// What to do when two products share a `string_id`.
    #[serde(default)]
    pub duplicate_string_ids: DuplicateStringIdPolicy,

    /// Default JSON output path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            mode: ComparisonMode::default(),
            duplicate_string_ids: DuplicateStringIdPolicy::default(),
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "o365_licenses_simple.json".into()
}

/// How the aliasing index treats a `string_id` seen on two different products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateStringIdPolicy {
    /// Later product wins the alias; a warning is logged.
    #[default]
    LastWriteWins,
    /// Fail the generation run.
    Reject,
}

/// `[[upgrades]]` entry: `upgrade` supersedes `base` regardless of plan ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRule {
    /// `string_id` of the lower tier.
    pub base: String,
    /// `string_id` of the higher tier.
    pub upgrade: String,
}

impl UpgradeRule {
    pub fn new(base: impl Into<String>, upgrade: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            upgrade: upgrade.into(),
        }
    }
}

/// Microsoft 365 tier upgrades whose plan ids differ between tiers.
pub fn default_upgrades() -> Vec<UpgradeRule> {
    [
        ("SPE_E3", "SPE_E5"),
        ("ENTERPRISEPACK", "ENTERPRISEPREMIUM"),
        ("STANDARDPACK", "ENTERPRISEPACK"),
        ("AAD_PREMIUM", "AAD_PREMIUM_P2"),
        ("EMS", "EMSPREMIUM"),
        ("O365_BUSINESS_ESSENTIALS", "O365_BUSINESS_PREMIUM"),
        ("O365_BUSINESS_PREMIUM", "SPB"),
    ]
    .into_iter()
    .map(|(base, upgrade)| UpgradeRule::new(base, upgrade))
    .collect()
}

// ---------------------------------------------------------------------------
// Generation config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime generation configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Recorded in metadata as the catalog origin.
    pub source_url: String,
    /// Comparison mode for the supersedence pass.
    pub mode: ComparisonMode,
    /// Duplicate `string_id` handling.
    pub duplicate_string_ids: DuplicateStringIdPolicy,
    /// Upgrade overrides applied last.
    pub upgrades: Vec<UpgradeRule>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for GenerationConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source_url: config.source.url.clone(),
            mode: config.generation.mode,
            duplicate_string_ids: config.generation.duplicate_string_ids,
            upgrades: config.upgrades.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.licensegraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LicenseGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.licensegraph/licensegraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LicenseGraphError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LicenseGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LicenseGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LicenseGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LicenseGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs that cannot drive a generation run.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.source.local_csv.is_none() {
        url::Url::parse(&config.source.url).map_err(|e| {
            LicenseGraphError::config(format!("invalid source url '{}': {e}", config.source.url))
        })?;
    }

    for rule in &config.upgrades {
        if rule.base.trim().is_empty() || rule.upgrade.trim().is_empty() {
            return Err(LicenseGraphError::config(
                "upgrade rules need non-empty `base` and `upgrade`",
            ));
        }
        if rule.base == rule.upgrade {
            return Err(LicenseGraphError::config(format!(
                "upgrade rule maps {} onto itself",
                rule.base
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("download.microsoft.com"));
        assert!(toml_str.contains("SPE_E5"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.timeout_secs, 60);
        assert_eq!(parsed.generation.mode, ComparisonMode::Transitive);
        assert_eq!(parsed.upgrades, default_upgrades());
    }

    #[test]
    fn config_with_custom_upgrades() {
        let toml_str = r#"
[generation]
mode = "direct"
duplicate_string_ids = "reject"

[[upgrades]]
base = "VISIOONLINE_PLAN1"
upgrade = "VISIOCLIENT"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.upgrades.len(), 1);
        assert_eq!(config.upgrades[0].upgrade, "VISIOCLIENT");
        assert_eq!(config.generation.mode, ComparisonMode::Direct);
        assert_eq!(
            config.generation.duplicate_string_ids,
            DuplicateStringIdPolicy::Reject
        );
    }

    #[test]
    fn missing_upgrades_section_uses_default_table() {
        let config: AppConfig = toml::from_str("[source]\ntimeout_secs = 5\n").expect("parse");
        assert_eq!(config.source.timeout_secs, 5);
        assert!(config.upgrades.contains(&UpgradeRule::new("SPE_E3", "SPE_E5")));
    }

    #[test]
    fn generation_config_from_app_config() {
        let app = AppConfig::default();
        let generation = GenerationConfig::from(&app);
        assert_eq!(generation.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(generation.mode, ComparisonMode::Transitive);
        assert_eq!(
            generation.duplicate_string_ids,
            DuplicateStringIdPolicy::LastWriteWins
        );
        assert_eq!(generation.upgrades.len(), app.upgrades.len());
    }

    #[test]
    fn self_upgrade_rejected() {
        let mut config = AppConfig::default();
        config.upgrades.push(UpgradeRule::new("SPB", "SPB"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("onto itself"));
    }

    #[test]
    fn bad_url_rejected_unless_local() {
        let mut config = AppConfig::default();
        config.source.url = "not a url".into();
        assert!(validate_config(&config).is_err());

        config.source.local_csv = Some("catalog.csv".into());
        assert!(validate_config(&config).is_ok());
    }
}
