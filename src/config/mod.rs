//! Environment-driven run configuration.
//!
//! Every knob has a default, so an empty environment runs the first target
//! with all consumption levels and contract types in a visible browser.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{ConsumptionLevel, ContractType, GeoTarget};
use crate::targets;

/// Waits used by the wizard, the harvester and the detail extractor
#[derive(Debug, Clone)]
pub struct Timing {
    pub navigation_timeout: Duration,
    pub entry_settle: Duration,
    pub cookie_wait: Duration,
    pub cookie_settle: Duration,
    pub wizard_step_settle: Duration,
    pub contract_wait: Duration,
    pub contract_settle: Duration,
    pub fixed_price_wait: Duration,
    pub fixed_price_settle: Duration,
    pub pre_continue_settle: Duration,
    pub continue_wait: Duration,
    /// Results are fetched asynchronously with no completion signal
    pub results_settle: Duration,
    pub show_more_probe: Duration,
    pub scroll_settle: Duration,
    pub show_more_settle: Duration,
    pub detail_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            entry_settle: Duration::from_secs(3),
            cookie_wait: Duration::from_secs(10),
            cookie_settle: Duration::from_secs(1),
            wizard_step_settle: Duration::from_secs(2),
            contract_wait: Duration::from_secs(10),
            contract_settle: Duration::from_millis(1500),
            fixed_price_wait: Duration::from_secs(10),
            fixed_price_settle: Duration::from_secs(1),
            pre_continue_settle: Duration::from_secs(1),
            continue_wait: Duration::from_secs(10),
            results_settle: Duration::from_secs(18),
            show_more_probe: Duration::from_secs(3),
            scroll_settle: Duration::from_millis(500),
            show_more_settle: Duration::from_secs(2),
            detail_settle: Duration::from_millis(2500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<GeoTarget>,
    pub headless: bool,
    pub consumption_levels: Vec<ConsumptionLevel>,
    pub contract_types: Vec<ContractType>,
    pub output_dir: PathBuf,
    /// `None` disables the sheet store upload
    pub sheet_database_url: Option<String>,
    /// `None` disables the Discord run summary
    pub discord_webhook_url: Option<String>,
    /// Cron expression; `None` runs a single sweep
    pub schedule: Option<String>,
    pub chrome_path: Option<PathBuf>,
    pub timing: Timing,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        build_config(|key| std::env::var(key))
    }
}

fn invalid(var: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.into(),
    }
}

/// Split a comma separated list, dropping empty items
fn list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_targets(raw: &str) -> Result<Vec<GeoTarget>, ConfigError> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(targets::TARGETS.to_vec());
    }

    let max = targets::TARGETS.len() - 1;
    let selected = list(raw)
        .map(|item| {
            let index = item
                .parse::<usize>()
                .map_err(|e| invalid("ZIP_INDEX", format!("{item}: {e}")))?;
            targets::get(index)
                .ok_or_else(|| invalid("ZIP_INDEX", format!("{index} out of range, must be 0-{max}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if selected.is_empty() {
        return Err(invalid("ZIP_INDEX", "no target selected"));
    }
    Ok(selected)
}

fn parse_consumption(raw: &str) -> Result<Vec<ConsumptionLevel>, ConfigError> {
    let levels = list(raw)
        .map(|item| match item.parse::<u32>() {
            Ok(0) => Err(invalid("CONSUMPTION_LEVELS", "consumption must be positive")),
            Ok(kwh) => Ok(ConsumptionLevel(kwh)),
            Err(e) => Err(invalid("CONSUMPTION_LEVELS", format!("{item}: {e}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if levels.is_empty() {
        return Err(invalid("CONSUMPTION_LEVELS", "no consumption level given"));
    }
    Ok(levels)
}

fn parse_contracts(raw: &str) -> Result<Vec<ContractType>, ConfigError> {
    let contracts = list(raw)
        .map(|item| {
            ContractType::parse(item)
                .ok_or_else(|| invalid("CONTRACT_TYPES", format!("unknown contract type {item}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if contracts.is_empty() {
        return Err(invalid("CONTRACT_TYPES", "no contract type given"));
    }
    Ok(contracts)
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(invalid(var, format!("expected true/false, got {other}"))),
    }
}

/// Build the configuration from an env-var lookup function so tests can pass a map
fn build_config<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    };

    let targets = match optional("ZIP_INDEX") {
        Some(raw) => parse_targets(&raw)?,
        None => parse_targets("0")?,
    };

    let headless = match optional("HEADLESS") {
        Some(raw) => parse_bool("HEADLESS", &raw)?,
        None => false,
    };

    let consumption_levels = match optional("CONSUMPTION_LEVELS") {
        Some(raw) => parse_consumption(&raw)?,
        None => ConsumptionLevel::DEFAULTS.to_vec(),
    };

    let contract_types = match optional("CONTRACT_TYPES") {
        Some(raw) => parse_contracts(&raw)?,
        None => ContractType::ALL.to_vec(),
    };

    let output_dir = optional("OUTPUT_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from);

    // Set-but-empty disables the store; unset falls back to the default file
    let sheet_database_url = match lookup("SHEET_DATABASE_URL") {
        Ok(url) if url.trim().is_empty() => None,
        Ok(url) => Some(url.trim().to_string()),
        Err(_) => Some("sqlite:database/offers.db".to_string()),
    };

    let mut timing = Timing::default();
    if let Some(raw) = optional("RESULTS_SETTLE_SECS") {
        let secs = raw
            .parse::<u64>()
            .map_err(|e| invalid("RESULTS_SETTLE_SECS", e.to_string()))?;
        timing.results_settle = Duration::from_secs(secs);
    }

    Ok(Config {
        targets,
        headless,
        consumption_levels,
        contract_types,
        output_dir,
        sheet_database_url,
        discord_webhook_url: optional("DISCORD_WEBHOOK_URL"),
        schedule: optional("SCHEDULE"),
        chrome_path: optional("CHROME_PATH").map(PathBuf::from),
        timing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        build_config(|key| map.get(key).cloned().ok_or(std::env::VarError::NotPresent))
    }

    #[test]
    fn defaults_cover_first_target_and_full_matrix() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].postal_code, "11121");
        assert!(!config.headless);
        assert_eq!(config.consumption_levels, ConsumptionLevel::DEFAULTS.to_vec());
        assert_eq!(config.contract_types, ContractType::ALL.to_vec());
        assert_eq!(
            config.sheet_database_url.as_deref(),
            Some("sqlite:database/offers.db")
        );
        assert!(config.schedule.is_none());
        assert!(config.discord_webhook_url.is_none());
        assert_eq!(config.timing.results_settle, Duration::from_secs(18));
    }

    #[test]
    fn zip_index_accepts_list_and_all() {
        let config = config_from(&[("ZIP_INDEX", "9, 20")]).unwrap();
        let towns: Vec<_> = config.targets.iter().map(|t| t.town).collect();
        assert_eq!(towns, vec!["Malmö", "Luleå"]);

        let config = config_from(&[("ZIP_INDEX", "all")]).unwrap();
        assert_eq!(config.targets.len(), 21);
    }

    #[test]
    fn zip_index_out_of_range_is_rejected() {
        let err = config_from(&[("ZIP_INDEX", "21")]).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn headless_parses_booleans() {
        assert!(config_from(&[("HEADLESS", "TRUE")]).unwrap().headless);
        assert!(!config_from(&[("HEADLESS", "false")]).unwrap().headless);
        assert!(config_from(&[("HEADLESS", "maybe")]).is_err());
    }

    #[test]
    fn consumption_and_contract_overrides() {
        let config = config_from(&[
            ("CONSUMPTION_LEVELS", "2000,20000"),
            ("CONTRACT_TYPES", "5, timpris"),
        ])
        .unwrap();
        assert_eq!(
            config.consumption_levels,
            vec![ConsumptionLevel(2000), ConsumptionLevel(20000)]
        );
        assert_eq!(
            config.contract_types,
            vec![ContractType::FastPris, ContractType::Timpris]
        );

        assert!(config_from(&[("CONSUMPTION_LEVELS", "0")]).is_err());
        assert!(config_from(&[("CONTRACT_TYPES", "spot")]).is_err());
    }

    #[test]
    fn empty_sheet_database_url_disables_store() {
        let config = config_from(&[("SHEET_DATABASE_URL", "")]).unwrap();
        assert!(config.sheet_database_url.is_none());
    }

    #[test]
    fn discord_webhook_is_read_from_lookup() {
        let config = config_from(&[(
            "DISCORD_WEBHOOK_URL",
            " https://discord.com/api/webhooks/1/abc ",
        )])
        .unwrap();
        assert_eq!(
            config.discord_webhook_url.as_deref(),
            Some("https://discord.com/api/webhooks/1/abc")
        );
        assert!(
            config_from(&[("DISCORD_WEBHOOK_URL", "  ")])
                .unwrap()
                .discord_webhook_url
                .is_none()
        );
    }

    #[test]
    fn results_settle_override() {
        let config = config_from(&[("RESULTS_SETTLE_SECS", "30")]).unwrap();
        assert_eq!(config.timing.results_settle, Duration::from_secs(30));
        assert!(config_from(&[("RESULTS_SETTLE_SECS", "soon")]).is_err());
    }
}
