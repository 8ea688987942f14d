//! Run configuration and validation.

use crate::codec::ORACLE_UTR5_MAX;
use crate::error::{Error, Result};
use crate::scoring::Weights;
use crate::sequence::KOZAK;

/// Full configuration for one design run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Minimum evolvable 5'UTR length (excluding the Kozak consensus).
    pub utr5_min: usize,
    /// Maximum evolvable 5'UTR length.
    pub utr5_max: usize,
    /// Centre of the Gaussian length prior for the initial population;
    /// `None` samples lengths uniformly.
    pub initial_length: Option<usize>,
    pub pop_size: usize,
    pub n_gen: usize,
    /// Per-gene point-mutation probability.
    pub mutation_rate: f64,
    /// Largest single length-walk step.
    pub max_length_delta: i64,
    /// RNG seed; fixed seed + deterministic oracle = reproducible front.
    pub seed: u64,
    /// Target cell type, as named in the expression matrix.
    pub target_cell_type: String,
    /// Warm-start from the empirical TE dataset.
    pub seed_from_data: bool,
    /// Gradient-ascent steps per restart; 0 disables gradient seeds.
    pub gradient_seed_steps: usize,
    /// Max mean RPM in the target for a miRNA to be a sponge candidate.
    pub target_threshold: f64,
    /// Min mean RPM elsewhere for a cell type to count as covered.
    pub cover_threshold: f64,
    pub max_mirnas: usize,
    /// Sponge sites in the generated 3'UTR cassette.
    pub num_sponge_sites: usize,
    pub weights: Weights,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            utr5_min: 20,
            utr5_max: 200,
            initial_length: Some(100),
            pop_size: 128,
            n_gen: 50,
            mutation_rate: 0.01,
            max_length_delta: 10,
            seed: 0,
            target_cell_type: String::new(),
            seed_from_data: true,
            gradient_seed_steps: 0,
            target_threshold: 10.0,
            cover_threshold: 1000.0,
            max_mirnas: 20,
            num_sponge_sites: 16,
            weights: Weights::default(),
        }
    }
}

impl RunConfig {
    /// Validate bounds before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.utr5_min == 0 {
            return Err(Error::InvalidConfig(
                "utr5_min must be at least 1".into(),
            ));
        }
        if self.utr5_min > self.utr5_max {
            return Err(Error::InvalidConfig(format!(
                "utr5_min ({}) > utr5_max ({})",
                self.utr5_min, self.utr5_max
            )));
        }
        if self.utr5_max + KOZAK.len() > ORACLE_UTR5_MAX {
            return Err(Error::InvalidConfig(format!(
                "utr5_max ({}) plus the Kozak consensus exceeds the oracle \
                 5'UTR limit of {}",
                self.utr5_max, ORACLE_UTR5_MAX
            )));
        }
        if let Some(init) = self.initial_length {
            if !(self.utr5_min..=self.utr5_max).contains(&init) {
                return Err(Error::InvalidConfig(format!(
                    "initial length ({}) outside [{}, {}]",
                    init, self.utr5_min, self.utr5_max
                )));
            }
        }
        if self.pop_size == 0 {
            return Err(Error::InvalidConfig("pop_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(Error::InvalidConfig(format!(
                "mutation_rate ({}) outside [0, 1]",
                self.mutation_rate
            )));
        }
        if self.max_length_delta < 0 {
            return Err(Error::InvalidConfig(
                "max_length_delta cannot be negative".into(),
            ));
        }
        if self.target_cell_type.is_empty() {
            return Err(Error::InvalidConfig("no target cell type given".into()));
        }
        if self.num_sponge_sites == 0 {
            return Err(Error::InvalidConfig(
                "num_sponge_sites must be positive".into(),
            ));
        }
        Ok(())
    }
}
