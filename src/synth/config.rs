use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::amount::{amounts_bounded, MAX_AMOUNT};
use super::fraud::{FraudRules, PatternWeights};

/// Smallest account pool a job may draw from.
pub const MIN_ACCOUNT_POOL: u64 = 10;

/// Most rows one batch (`chunk_size * parallel_chunks`) may hold in memory.
pub const MAX_BATCH_ROWS: u64 = 1_000_000;

/// `start + range`, or `None` past the last date chrono can represent.
pub fn window_end(start: DateTime<Utc>, range: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(range)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
}

/// Generation section of the config file.
///
/// Example YAML:
/// ```yaml
/// generation:
///   max_transactions_per_request: 1000000
///   chunk_size: 10000
///   parallel_chunks: 4
///   start_time: "2024-01-01T00:00:00Z"
///   date_range: "365d"
///   fraud:
///     amount_multiplier: 8.0
///     velocity_window: "10m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub max_transactions_per_request: u64,
    pub chunk_size: u64,
    pub parallel_chunks: usize,
    pub amount_mu: f64,
    pub amount_sigma: f64,
    pub fraud_rate: f64,
    pub account_pool_size: u64,
    /// RFC 3339 instant of the earliest possible timestamp
    pub start_time: String,
    /// Width of the timestamp window. Format: humantime ("365d", "12w")
    pub date_range: String,
    pub fraud: FraudConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_transactions_per_request: 1_000_000,
            chunk_size: 10_000,
            parallel_chunks: 4,
            amount_mu: 3.5,
            amount_sigma: 1.1,
            fraud_rate: 0.02,
            account_pool_size: 1000,
            start_time: "2024-01-01T00:00:00Z".to_string(),
            date_range: "365d".to_string(),
            fraud: FraudConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FraudConfig {
    pub amount_multiplier: f64,
    /// Format: humantime ("10m", "90s")
    pub velocity_window: String,
    pub velocity_burst_size: u64,
    pub pattern_weights: PatternWeights,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            amount_multiplier: 8.0,
            velocity_window: "10m".to_string(),
            velocity_burst_size: 4,
            pattern_weights: PatternWeights::default(),
        }
    }
}

/// Generation limits and shape after parsing, as handed to the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_transactions_per_request: u64,
    pub chunk_size: u64,
    pub parallel_chunks: usize,
    pub amount_mu: f64,
    pub amount_sigma: f64,
    pub fraud_rate: f64,
    pub account_pool_size: u64,
    pub start_time: DateTime<Utc>,
    pub date_range: Duration,
    pub fraud: FraudRules,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_transactions_per_request: 1_000_000,
            chunk_size: 10_000,
            parallel_chunks: 4,
            amount_mu: 3.5,
            amount_sigma: 1.1,
            fraud_rate: 0.02,
            account_pool_size: 1000,
            start_time: DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default(),
            date_range: Duration::from_secs(365 * 86_400),
            fraud: FraudRules::default(),
        }
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    Ok(humantime::parse_duration(raw.trim())?)
}

impl GenerationConfig {
    /// Parse the string fields. Range checks live in `validate_generation`.
    pub fn settings(&self) -> Result<GenerationSettings> {
        let start_time = DateTime::parse_from_rfc3339(self.start_time.trim())
            .with_context(|| format!("generation.start_time: invalid '{}'", self.start_time))?
            .with_timezone(&Utc);
        let date_range = parse_duration(&self.date_range)
            .with_context(|| format!("generation.date_range: invalid '{}'", self.date_range))?;
        let velocity_window = parse_duration(&self.fraud.velocity_window).with_context(|| {
            format!(
                "generation.fraud.velocity_window: invalid '{}'",
                self.fraud.velocity_window
            )
        })?;

        Ok(GenerationSettings {
            max_transactions_per_request: self.max_transactions_per_request,
            chunk_size: self.chunk_size,
            parallel_chunks: self.parallel_chunks,
            amount_mu: self.amount_mu,
            amount_sigma: self.amount_sigma,
            fraud_rate: self.fraud_rate,
            account_pool_size: self.account_pool_size,
            start_time,
            date_range,
            fraud: FraudRules {
                amount_multiplier: self.fraud.amount_multiplier,
                velocity_window,
                velocity_burst_size: self.fraud.velocity_burst_size,
                pattern_weights: self.fraud.pattern_weights.clone(),
            },
        })
    }
}

/// Validate the generation section.
/// Returns all validation errors at once (not just the first).
pub fn validate_generation(config: &GenerationConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.max_transactions_per_request == 0 {
        errors.push("generation.max_transactions_per_request: must be at least 1".to_string());
    }
    if config.chunk_size == 0 {
        errors.push("generation.chunk_size: must be at least 1".to_string());
    }
    if config.parallel_chunks == 0 {
        errors.push("generation.parallel_chunks: must be at least 1".to_string());
    }
    if config.chunk_size.saturating_mul(config.parallel_chunks as u64) > MAX_BATCH_ROWS {
        errors.push(format!(
            "generation.chunk_size: chunk_size * parallel_chunks must not exceed {} (got {} x {})",
            MAX_BATCH_ROWS, config.chunk_size, config.parallel_chunks
        ));
    }
    if !config.amount_mu.is_finite() {
        errors.push(format!(
            "generation.amount_mu: must be finite (got {})",
            config.amount_mu
        ));
    }
    if !(config.amount_sigma.is_finite() && config.amount_sigma > 0.0) {
        errors.push(format!(
            "generation.amount_sigma: must be positive (got {})",
            config.amount_sigma
        ));
    }
    if !(0.0..=1.0).contains(&config.fraud_rate) {
        errors.push(format!(
            "generation.fraud_rate: must be within [0, 1] (got {})",
            config.fraud_rate
        ));
    }
    if config.account_pool_size < MIN_ACCOUNT_POOL {
        errors.push(format!(
            "generation.account_pool_size: must be at least {} (got {})",
            MIN_ACCOUNT_POOL, config.account_pool_size
        ));
    }
    let start_time = match DateTime::parse_from_rfc3339(config.start_time.trim()) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            errors.push(format!(
                "generation.start_time: invalid '{}' - {}",
                config.start_time, e
            ));
            None
        }
    };

    let date_range = match parse_duration(&config.date_range) {
        Ok(d) if d.as_secs() == 0 => {
            errors.push("generation.date_range: must be at least one second".to_string());
            None
        }
        Ok(d) => {
            if let Some(start) = start_time {
                if window_end(start, d).is_none() {
                    errors.push(format!(
                        "generation.date_range: '{}' from start_time '{}' ends past the last representable date",
                        config.date_range, config.start_time
                    ));
                }
            }
            Some(d)
        }
        Err(e) => {
            errors.push(format!(
                "generation.date_range: invalid '{}' - {}",
                config.date_range, e
            ));
            None
        }
    };

    let fraud = &config.fraud;
    if !(fraud.amount_multiplier.is_finite() && fraud.amount_multiplier > 0.0) {
        errors.push(format!(
            "generation.fraud.amount_multiplier: must be positive (got {})",
            fraud.amount_multiplier
        ));
    }
    if fraud.velocity_burst_size == 0 {
        errors.push("generation.fraud.velocity_burst_size: must be at least 1".to_string());
    }
    let multiplier_valid = fraud.amount_multiplier.is_finite() && fraud.amount_multiplier > 0.0;
    let amount_params_valid = config.amount_mu.is_finite()
        && config.amount_sigma.is_finite()
        && config.amount_sigma > 0.0;
    if multiplier_valid
        && amount_params_valid
        && !amounts_bounded(config.amount_mu, config.amount_sigma, fraud.amount_multiplier)
    {
        errors.push(format!(
            "generation.amount_mu: with amount_sigma {} and fraud.amount_multiplier {} amounts could exceed {}",
            config.amount_sigma, fraud.amount_multiplier, MAX_AMOUNT
        ));
    }
    match parse_duration(&fraud.velocity_window) {
        Ok(window) if window.as_secs() == 0 => errors.push(format!(
            "generation.fraud.velocity_window: must be at least one second (got '{}')",
            fraud.velocity_window
        )),
        Ok(window) => {
            if let Some(range) = date_range {
                if window > range {
                    errors.push(format!(
                        "generation.fraud.velocity_window: '{}' is longer than date_range '{}'",
                        fraud.velocity_window, config.date_range
                    ));
                }
            }
        }
        Err(e) => errors.push(format!(
            "generation.fraud.velocity_window: invalid '{}' - {}",
            fraud.velocity_window, e
        )),
    }

    let w = &fraud.pattern_weights;
    for (name, weight) in [
        ("amount_spike", w.amount_spike),
        ("merchant_swap", w.merchant_swap),
        ("velocity_burst", w.velocity_burst),
    ] {
        if !(weight.is_finite() && weight >= 0.0) {
            errors.push(format!(
                "generation.fraud.pattern_weights.{}: must be a non-negative number (got {})",
                name, weight
            ));
        }
    }
    if !(w.total() > 0.0) {
        errors.push(
            "generation.fraud.pattern_weights: at least one weight must be positive".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_generation(&GenerationConfig::default()).is_ok());
    }

    #[test]
    fn test_default_config_matches_default_settings() {
        let settings = GenerationConfig::default().settings().unwrap();
        assert_eq!(settings, GenerationSettings::default());
        assert_eq!(settings.fraud.velocity_window, Duration::from_secs(600));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
chunk_size: 500
fraud:
  velocity_burst_size: 6
"#;
        let config: GenerationConfig = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.max_transactions_per_request, 1_000_000);
        assert_eq!(config.fraud.velocity_burst_size, 6);
        assert_eq!(config.fraud.amount_multiplier, 8.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_saphyr::from_str::<GenerationConfig>("batch_size: 10").is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let config = GenerationConfig {
            chunk_size: 0,
            fraud_rate: 1.5,
            account_pool_size: 3,
            date_range: "forever".to_string(),
            ..GenerationConfig::default()
        };
        let errors = validate_generation(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.starts_with("generation.chunk_size")));
        assert!(errors.iter().any(|e| e.starts_with("generation.fraud_rate")));
        assert!(errors.iter().any(|e| e.starts_with("generation.account_pool_size")));
        assert!(errors.iter().any(|e| e.contains("invalid 'forever'")));
    }

    #[test]
    fn test_window_longer_than_range() {
        let config = GenerationConfig {
            date_range: "5m".to_string(),
            ..GenerationConfig::default()
        };
        let errors = validate_generation(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("velocity_window"));
    }

    #[test]
    fn test_date_range_past_calendar_end() {
        let config = GenerationConfig {
            date_range: "1000000y".to_string(),
            ..GenerationConfig::default()
        };
        let errors = validate_generation(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("generation.date_range"));
        assert!(errors[0].contains("past the last representable date"));

        let settings = config.settings().unwrap();
        assert!(window_end(settings.start_time, settings.date_range).is_none());
    }

    #[test]
    fn test_sub_second_velocity_window() {
        for window in ["0s", "500ms"] {
            let config = GenerationConfig {
                fraud: FraudConfig {
                    velocity_window: window.to_string(),
                    ..FraudConfig::default()
                },
                ..GenerationConfig::default()
            };
            let errors = validate_generation(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "{:?}", errors);
            assert!(errors[0].contains("at least one second"));
        }
    }

    #[test]
    fn test_batch_size_capped() {
        let config = GenerationConfig {
            chunk_size: 500_000,
            parallel_chunks: 4,
            ..GenerationConfig::default()
        };
        let errors = validate_generation(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("chunk_size * parallel_chunks"));

        let huge = GenerationConfig {
            chunk_size: u64::MAX,
            ..GenerationConfig::default()
        };
        assert!(validate_generation(&huge).is_err());

        let at_cap = GenerationConfig {
            chunk_size: 250_000,
            parallel_chunks: 4,
            ..GenerationConfig::default()
        };
        assert!(validate_generation(&at_cap).is_ok());
    }

    #[test]
    fn test_amount_ceiling_includes_spike() {
        let config = GenerationConfig {
            amount_mu: 20.0,
            ..GenerationConfig::default()
        };
        let errors = validate_generation(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("generation.amount_mu"));

        let lower_spike = GenerationConfig {
            fraud: FraudConfig {
                amount_multiplier: 1.0,
                ..FraudConfig::default()
            },
            ..config
        };
        assert!(validate_generation(&lower_spike).is_ok());
    }

    #[test]
    fn test_bad_start_time() {
        let config = GenerationConfig {
            start_time: "yesterday".to_string(),
            ..GenerationConfig::default()
        };
        assert!(validate_generation(&config).is_err());
        assert!(config.settings().is_err());
    }
}
