//! Sigmoid fitness normalisation and weighted aggregation.
//!
//! Each metric is squashed through a logistic sigmoid rather than a hard
//! threshold, so every objective carries gradient even for extreme
//! individuals; flat regions would leave the survival operator unable to
//! discriminate. Do not replace these with clamped linear cuts.

use crate::scoring::Report;

/// Per-metric aggregation weights; must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub utr5_accessibility: f64,
    pub manufacturability: f64,
    pub stability: f64,
    pub specificity: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            utr5_accessibility: 0.15,
            manufacturability: 0.30,
            stability: 0.20,
            specificity: 0.35,
        }
    }
}

/// Logistic sigmoid: `1 / (1 + exp(-k * (x - midpoint)))`.
///
/// Values stay strictly inside (0, 1). `k > 0` rewards higher x; `k < 0`
/// rewards lower x (violation counts).
pub fn sigmoid(x: f64, midpoint: f64, k: f64) -> f64 {
    1.0 / (1.0 + (-k * (x - midpoint)).exp())
}

/// Normalised per-metric values and the weighted overall score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricValues {
    pub utr5_accessibility: f64,
    pub manufacturability: f64,
    pub stability: f64,
    pub specificity: f64,
    pub overall: f64,
}

impl MetricValues {
    /// Objective vector for the minimiser: `1 - value` per metric, so a
    /// lower vector dominates.
    pub fn objectives(&self) -> [f64; 4] {
        [
            1.0 - self.utr5_accessibility,
            1.0 - self.manufacturability,
            1.0 - self.stability,
            1.0 - self.specificity,
        ]
    }

    /// The worst possible outcome, assigned to candidates that fail scoring.
    pub fn worst() -> Self {
        MetricValues {
            utr5_accessibility: 0.0,
            manufacturability: 0.0,
            stability: 0.0,
            specificity: 0.0,
            overall: 0.0,
        }
    }
}

/// Sigmoid on MFE/nt of the 5'UTR (less negative = more accessible).
///
/// Midpoint -0.2 kcal/mol/nt: roughly 0.9 at -0.05 and 0.1 at -0.35.
/// Missing data is neutral (0.5).
fn normalise_utr5(report: &Report) -> f64 {
    match report.structure.utr5_accessibility.mfe_per_nt {
        Some(mfe_per_nt) => sigmoid(mfe_per_nt, -0.2, 15.0),
        None => 0.5,
    }
}

/// Sigmoid on the 5'UTR-only violation count (fewer = better).
///
/// Midpoint at 1 violation: about 0.88 at 0, 0.12 at 2 or more.
fn normalise_manufacturing(report: &Report) -> f64 {
    sigmoid(report.manufacturing.utr5_violations as f64, 1.0, -2.0)
}

/// Sigmoid on the combined stability score (higher = better).
fn normalise_stability(report: &Report) -> f64 {
    sigmoid(report.stability.stability_score, 0.6, 8.0)
}

/// Sigmoid on absolute target-tissue TE.
///
/// Midpoint 1.0 with k = 6 gives a strong directional signal across the
/// practically achievable 5'UTR-tuning range (about 0.8-1.6 TE units):
/// roughly 0.27 at 0.8, 0.5 at 1.0, 0.73 at 1.2. A sequence the oracle could
/// not score carries the null result and maps to exactly 0.
fn normalise_specificity(report: &Report) -> f64 {
    match &report.te {
        Some(te) if te.available => sigmoid(te.target_te, 1.0, 6.0),
        _ => 0.0,
    }
}

/// Compute normalised per-metric values and the weighted overall score.
pub fn compute_fitness(report: &Report, weights: &Weights) -> MetricValues {
    let utr5_accessibility = normalise_utr5(report);
    let manufacturability = normalise_manufacturing(report);
    let stability = normalise_stability(report);
    let specificity = normalise_specificity(report);

    let overall = utr5_accessibility * weights.utr5_accessibility
        + manufacturability * weights.manufacturability
        + stability * weights.stability
        + specificity * weights.specificity;

    MetricValues {
        utr5_accessibility,
        manufacturability,
        stability,
        specificity,
        overall,
    }
}
