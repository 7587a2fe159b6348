use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::amount::{amounts_bounded, MAX_AMOUNT};
use super::config::GenerationSettings;
use crate::error::{ensure_unit_interval, EngineError, EngineResult};

/// A generation request as submitted. Unset parameters fall back to the
/// configured defaults when resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tenant_id: String,
    /// Caller's job identifier; feeds the default seed.
    pub job_id: String,
    pub count: u64,
    #[serde(default)]
    pub fraud_rate: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub amount_mu: Option<f64>,
    #[serde(default)]
    pub amount_sigma: Option<f64>,
}

impl GenerationRequest {
    /// Fill gaps from `settings` and validate the result.
    pub fn resolve(&self, settings: &GenerationSettings) -> EngineResult<GenerationSpec> {
        let spec = GenerationSpec {
            tenant_id: self.tenant_id.clone(),
            job_id: self.job_id.clone(),
            count: self.count,
            fraud_rate: self.fraud_rate.unwrap_or(settings.fraud_rate),
            seed: self.seed,
            amount_mu: self.amount_mu.unwrap_or(settings.amount_mu),
            amount_sigma: self.amount_sigma.unwrap_or(settings.amount_sigma),
        };
        spec.validate(settings.max_transactions_per_request)?;
        Ok(spec)
    }
}

/// Immutable description of one generation job. Together with the seed it
/// fixes every output byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSpec {
    pub tenant_id: String,
    pub job_id: String,
    pub count: u64,
    pub fraud_rate: f64,
    pub seed: Option<u64>,
    pub amount_mu: f64,
    pub amount_sigma: f64,
}

impl GenerationSpec {
    /// Checks run before any row is produced.
    pub fn validate(&self, max_count: u64) -> EngineResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(EngineError::validation("tenant_id", "must not be empty"));
        }
        if self.count == 0 {
            return Err(EngineError::validation("count", "must be a positive integer (got 0)"));
        }
        if self.count > max_count {
            return Err(EngineError::ResourceLimit {
                requested: self.count,
                max: max_count,
            });
        }
        ensure_unit_interval("fraud_rate", self.fraud_rate)?;
        if !self.amount_mu.is_finite() {
            return Err(EngineError::validation(
                "amount_mu",
                format!("must be finite (got {})", self.amount_mu),
            ));
        }
        if !(self.amount_sigma.is_finite() && self.amount_sigma > 0.0) {
            return Err(EngineError::validation(
                "amount_sigma",
                format!("must be positive (got {})", self.amount_sigma),
            ));
        }
        if !amounts_bounded(self.amount_mu, self.amount_sigma, 1.0) {
            return Err(EngineError::validation(
                "amount_mu",
                format!(
                    "with amount_sigma {} amounts could exceed {} (got {})",
                    self.amount_sigma, MAX_AMOUNT, self.amount_mu
                ),
            ));
        }
        Ok(())
    }

    /// The explicit seed, or one derived from tenant and job.
    pub fn effective_seed(&self) -> u64 {
        self.seed
            .unwrap_or_else(|| derive_seed(&self.tenant_id, &self.job_id))
    }
}

/// First 8 bytes (little-endian) of `SHA-256("{tenant_id}:{job_id}")`.
pub fn derive_seed(tenant_id: &str, job_id: &str) -> u64 {
    let digest = Sha256::digest(format!("{}:{}", tenant_id, job_id).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

/// Hex form of a seed, for logs and reports.
pub fn seed_hex(seed: u64) -> String {
    hex::encode(seed.to_be_bytes())
}
