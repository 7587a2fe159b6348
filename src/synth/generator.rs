//! Ordered, chunked, resumable transaction generation.
//!
//! Rows are pure functions of `(seed, index)`. Chunks of a batch are computed
//! on the rayon pool and handed out strictly in index order, so the output is
//! the same whatever the chunk size or worker count.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::amount::{amounts_bounded, sample_raw, to_cents, MAX_AMOUNT};
use super::config::{window_end, GenerationSettings, MAX_BATCH_ROWS, MIN_ACCOUNT_POOL};
use super::fraud::{pattern_for, FraudPattern, FraudPlan};
use super::identity::{account_id, account_slot, high_risk_mcc, normal_mcc, transaction_id};
use super::sink::TransactionSink;
use super::spec::{seed_hex, GenerationSpec};
use super::stream::{DeterministicStream, Lane};
use crate::error::{EngineError, EngineResult};

/// One generated row. Never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTransaction {
    pub index: u64,
    pub transaction_id: Uuid,
    pub account_id: String,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub merchant_category: String,
    pub is_fraud: bool,
    pub fraud_pattern: Option<FraudPattern>,
}

/// Outcome of `TransactionGenerator::run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub requested: u64,
    pub start_index: u64,
    pub emitted: u64,
    pub fraud_emitted: u64,
    pub last_emitted_index: Option<u64>,
    pub cancelled: bool,
}

impl GenerationReport {
    /// Where a follow-up run should start.
    pub fn next_index(&self) -> u64 {
        self.last_emitted_index
            .map(|i| i + 1)
            .unwrap_or(self.start_index)
    }

    pub fn is_complete(&self) -> bool {
        self.next_index() >= self.requested
    }
}

/// Map a draw in (0, 1] onto `[0, n)`. Zero when `n` is zero.
fn scaled(u: f64, n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    ((u * n as f64) as u64).min(n - 1)
}

fn check_settings(settings: &GenerationSettings) -> EngineResult<()> {
    if settings.chunk_size == 0 {
        return Err(EngineError::validation("chunk_size", "must be at least 1"));
    }
    if settings.parallel_chunks == 0 {
        return Err(EngineError::validation("parallel_chunks", "must be at least 1"));
    }
    if settings.chunk_size.saturating_mul(settings.parallel_chunks as u64) > MAX_BATCH_ROWS {
        return Err(EngineError::validation(
            "chunk_size",
            format!("chunk_size * parallel_chunks must not exceed {}", MAX_BATCH_ROWS),
        ));
    }
    if settings.account_pool_size < MIN_ACCOUNT_POOL {
        return Err(EngineError::validation(
            "account_pool_size",
            format!(
                "must be at least {} (got {})",
                MIN_ACCOUNT_POOL, settings.account_pool_size
            ),
        ));
    }
    if settings.date_range.as_secs() == 0 {
        return Err(EngineError::validation("date_range", "must be at least one second"));
    }
    if window_end(settings.start_time, settings.date_range).is_none() {
        return Err(EngineError::validation(
            "date_range",
            "ends past the last representable date",
        ));
    }
    let fraud = &settings.fraud;
    if fraud.velocity_window.as_secs() == 0 {
        return Err(EngineError::validation(
            "fraud.velocity_window",
            "must be at least one second",
        ));
    }
    if fraud.velocity_window > settings.date_range {
        return Err(EngineError::validation(
            "fraud.velocity_window",
            "must not be longer than date_range",
        ));
    }
    if fraud.velocity_burst_size == 0 {
        return Err(EngineError::validation("fraud.velocity_burst_size", "must be at least 1"));
    }
    if !(fraud.amount_multiplier.is_finite() && fraud.amount_multiplier > 0.0) {
        return Err(EngineError::validation(
            "fraud.amount_multiplier",
            format!("must be positive (got {})", fraud.amount_multiplier),
        ));
    }
    let weights = &fraud.pattern_weights;
    let all_valid = [weights.amount_spike, weights.merchant_swap, weights.velocity_burst]
        .iter()
        .all(|w| w.is_finite() && *w >= 0.0);
    if !(all_valid && weights.total() > 0.0) {
        return Err(EngineError::validation(
            "fraud.pattern_weights",
            "must be non-negative with a positive total",
        ));
    }
    Ok(())
}

/// A validated generation job. Cheap to clone; clones share the fraud plan.
#[derive(Debug, Clone)]
pub struct TransactionGenerator {
    spec: GenerationSpec,
    settings: GenerationSettings,
    stream: DeterministicStream,
    fraud: Arc<FraudPlan>,
    /// Indices of velocity-burst rows, ascending. A row's position here
    /// decides which burst it joins.
    velocity: Arc<Vec<u64>>,
}

impl TransactionGenerator {
    /// Validates everything up front; no row exists before this returns `Ok`.
    pub fn new(spec: GenerationSpec, settings: GenerationSettings) -> EngineResult<Self> {
        spec.validate(settings.max_transactions_per_request)?;
        check_settings(&settings)?;
        let multiplier = settings.fraud.amount_multiplier;
        if !amounts_bounded(spec.amount_mu, spec.amount_sigma, multiplier) {
            return Err(EngineError::validation(
                "amount_mu",
                format!(
                    "with amount_sigma {} and amount_multiplier {} amounts could exceed {}",
                    spec.amount_sigma, multiplier, MAX_AMOUNT
                ),
            ));
        }

        let seed = spec.effective_seed();
        let stream = DeterministicStream::new(seed);
        let fraud = FraudPlan::new(seed, spec.count, spec.fraud_rate);
        let velocity: Vec<u64> = fraud
            .indices()
            .iter()
            .copied()
            .filter(|&i| {
                pattern_for(&stream, i, &settings.fraud.pattern_weights)
                    == FraudPattern::VelocityBurst
            })
            .collect();

        tracing::debug!(
            seed = %seed_hex(seed),
            count = spec.count,
            fraud_rows = fraud.len(),
            velocity_rows = velocity.len(),
            "generation plan ready"
        );

        Ok(Self {
            spec,
            settings,
            stream,
            fraud: Arc::new(fraud),
            velocity: Arc::new(velocity),
        })
    }

    pub fn spec(&self) -> &GenerationSpec {
        &self.spec
    }

    pub fn seed(&self) -> u64 {
        self.stream.seed()
    }

    pub fn count(&self) -> u64 {
        self.spec.count
    }

    pub fn fraud_plan(&self) -> &FraudPlan {
        &self.fraud
    }

    /// Build row `index`. Depends on nothing but the seed, the generation parameters and `index`.
    pub fn row(&self, index: u64) -> SyntheticTransaction {
        let s = &self.stream;
        let pool = self.settings.account_pool_size;
        let range_secs = self.settings.date_range.as_secs();
        let rules = &self.settings.fraud;

        let pattern = if self.fraud.contains(index) {
            Some(pattern_for(s, index, &rules.pattern_weights))
        } else {
            None
        };

        let mut amount = sample_raw(s, index, self.spec.amount_mu, self.spec.amount_sigma);
        let mut merchant = normal_mcc(s, index);
        let mut slot = account_slot(s, index, pool);
        let mut offset = scaled(s.uniform(index, Lane::Timestamp), range_secs);

        match pattern {
            Some(FraudPattern::AmountSpike) => amount *= rules.amount_multiplier,
            Some(FraudPattern::MerchantSwap) => merchant = high_risk_mcc(s, index),
            Some(FraudPattern::VelocityBurst) => {
                // Consecutive burst rows share an account and a window
                let ordinal = self.velocity.binary_search(&index).unwrap_or_default() as u64;
                let burst = ordinal / rules.velocity_burst_size;
                let window = rules.velocity_window.as_secs();
                slot = s.below(burst, Lane::BurstAccount, pool);
                let anchor = scaled(s.uniform(burst, Lane::BurstAnchor), range_secs - window + 1);
                offset = anchor + scaled(s.uniform(index, Lane::Timestamp), window);
            }
            None => {}
        }

        SyntheticTransaction {
            index,
            transaction_id: transaction_id(s, index),
            account_id: account_id(s, slot),
            timestamp: self.timestamp_at(offset),
            amount: to_cents(amount),
            merchant_category: merchant.to_string(),
            is_fraud: pattern.is_some(),
            fraud_pattern: pattern,
        }
    }

    fn timestamp_at(&self, offset_secs: u64) -> DateTime<Utc> {
        let start = self.settings.start_time;
        // new() checked start_time + date_range, and offsets stay below date_range
        chrono::Duration::try_seconds(offset_secs as i64)
            .and_then(|d| start.checked_add_signed(d))
            .unwrap_or(start)
    }

    /// Rows for `range`, in order.
    pub fn chunk(&self, range: Range<u64>) -> Vec<SyntheticTransaction> {
        range.map(|i| self.row(i)).collect()
    }

    /// Chunk ranges of the batch starting at `start`.
    fn batch_ranges(&self, start: u64) -> Vec<Range<u64>> {
        let size = self.settings.chunk_size;
        let end = self.spec.count;
        (0..self.settings.parallel_chunks as u64)
            .map(|k| start.saturating_add(k.saturating_mul(size)))
            .take_while(|&from| from < end)
            .map(|from| from..from.saturating_add(size).min(end))
            .collect()
    }

    /// Compute one batch of chunks in parallel, returned in index order.
    fn compute_batch(&self, start: u64) -> Vec<Vec<SyntheticTransaction>> {
        self.batch_ranges(start)
            .into_par_iter()
            .map(|range| self.chunk(range))
            .collect()
    }

    /// Lazy, ordered rows from index 0.
    pub fn iter(&self) -> Transactions {
        self.iter_from(0)
    }

    /// Lazy, ordered rows from `start`. Identical to the matching suffix of `iter()`.
    pub fn iter_from(&self, start: u64) -> Transactions {
        Transactions {
            generator: self.clone(),
            next_start: start.min(self.spec.count),
            pending: VecDeque::new(),
        }
    }

    /// Stream rows `[start, count)` into `sink`, chunk by chunk.
    ///
    /// `cancel` is checked before every chunk. On cancellation the report
    /// carries the last index the sink accepted. A sink failure becomes
    /// `PartialGeneration` with the index to resume from.
    pub fn run<S: TransactionSink + ?Sized>(
        &self,
        start: u64,
        sink: &mut S,
        cancel: &AtomicBool,
    ) -> EngineResult<GenerationReport> {
        if start > self.spec.count {
            return Err(EngineError::validation(
                "resume_from",
                format!("must not exceed count {} (got {})", self.spec.count, start),
            ));
        }

        let mut report = GenerationReport {
            seed: self.seed(),
            requested: self.spec.count,
            start_index: start,
            emitted: 0,
            fraud_emitted: 0,
            last_emitted_index: None,
            cancelled: false,
        };

        tracing::info!(
            tenant = %self.spec.tenant_id,
            job = %self.spec.job_id,
            seed = %seed_hex(self.seed()),
            count = self.spec.count,
            start,
            "generation started"
        );

        let mut next = start;
        while next < self.spec.count {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            for rows in self.compute_batch(next) {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                let first = next;
                let len = rows.len() as u64;
                if let Err(source) = sink.write_chunk(first, &rows) {
                    tracing::warn!(next_index = first, error = %source, "sink rejected chunk");
                    return Err(EngineError::PartialGeneration {
                        last_emitted_index: report.last_emitted_index,
                        next_index: first,
                        source,
                    });
                }
                report.emitted += len;
                report.fraud_emitted += rows.iter().filter(|r| r.is_fraud).count() as u64;
                report.last_emitted_index = Some(first + len - 1);
                next = first + len;
                tracing::debug!(first, len, "chunk emitted");
            }
        }

        if next < self.spec.count {
            report.cancelled = true;
            tracing::warn!(next_index = next, "generation cancelled");
        } else {
            tracing::info!(
                emitted = report.emitted,
                fraud = report.fraud_emitted,
                "generation finished"
            );
        }
        Ok(report)
    }
}

/// Lazy ordered sequence of rows. Holds at most one batch in memory.
pub struct Transactions {
    generator: TransactionGenerator,
    next_start: u64,
    pending: VecDeque<SyntheticTransaction>,
}

impl Iterator for Transactions {
    type Item = SyntheticTransaction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() && self.next_start < self.generator.count() {
            for rows in self.generator.compute_batch(self.next_start) {
                self.next_start += rows.len() as u64;
                self.pending.extend(rows);
            }
        }
        self.pending.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.generator.count() - self.next_start) as usize + self.pending.len();
        (left, Some(left))
    }
}

/// `generate(spec)`: validate and return the ordered lazy row sequence.
pub fn generate(spec: GenerationSpec, settings: GenerationSettings) -> EngineResult<Transactions> {
    Ok(TransactionGenerator::new(spec, settings)?.iter())
}
