//! Warm-start seed generation.
//!
//! Two sources feed the initial population: 5'UTRs of empirically
//! high-TE transcripts from a ribosome-profiling dataset, and sequences
//! designed by gradient ascent through the TE oracle. Both are optional;
//! a run proceeds with a purely random population when neither is
//! available.

use anyhow::Context;
use log::warn;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::io::BufRead;
use std::path::Path;

use crate::codec::{self, ORACLE_UTR5_MAX, OPT_TO_ORACLE};
use crate::error::Result;
use crate::evolve::chromosome::{row_from_codes, ChromosomeLayout};
use crate::oracle::TeEnsemble;
use crate::sequence::{MrnaSequence, KOZAK};
use crate::table::open_table;

// ── Empirical seeds ─────────────────────────────────────────────────────────

/// Top-TE 5'UTR sequences from the empirical TE dataset.
///
/// The table is tab-separated with header columns `mean_te`, `tx_sequence`,
/// and `utr5_size`; `mean_te` is the arithmetic mean across all profiled
/// cell types, so these seeds are universally strong rather than
/// tissue-specific. Only 5'UTRs whose length falls inside
/// `[min_len, max_len]` (and the oracle's 1381-nt ceiling) qualify.
///
/// A missing or unreadable file yields an empty list; the run continues
/// unseeded.
pub fn top_utr5_seeds(path: &Path, n: usize, min_len: usize, max_len: usize) -> Vec<String> {
    match load_seed_candidates(path, min_len, max_len.min(ORACLE_UTR5_MAX)) {
        Ok(mut candidates) => {
            candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).expect("finite TE values"));
            candidates.into_iter().take(n).map(|(_, seq)| seq).collect()
        }
        Err(err) => {
            warn!("empirical seed dataset unavailable: {err:#}");
            Vec::new()
        }
    }
}

fn load_seed_candidates(
    path: &Path,
    min_len: usize,
    max_len: usize,
) -> anyhow::Result<Vec<(f64, String)>> {
    let reader = open_table(path)?;
    let mut lines = reader.lines();

    let header = lines
        .next()
        .context("empty TE dataset")?
        .context("Failed to read TE dataset header")?;
    let columns: Vec<&str> = header.split('\t').map(|c| c.trim()).collect();
    let col = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .with_context(|| format!("TE dataset lacks column '{name}'"))
    };
    let te_idx = col("mean_te")?;
    let seq_idx = col("tx_sequence")?;
    let size_idx = col("utr5_size")?;

    let mut candidates = Vec::new();
    for line in lines {
        let line = line.context("Failed to read TE dataset line")?;
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() <= te_idx.max(seq_idx).max(size_idx) {
            continue;
        }

        let (Ok(mean_te), Ok(utr5_size)) = (
            fields[te_idx].trim().parse::<f64>(),
            fields[size_idx].trim().parse::<usize>(),
        ) else {
            continue;
        };
        if utr5_size < min_len.max(1) || utr5_size > max_len {
            continue;
        }

        let tx = fields[seq_idx].trim();
        if tx.len() < utr5_size {
            continue;
        }
        let utr5: String = tx[..utr5_size]
            .chars()
            .map(|c| match c.to_ascii_uppercase() {
                'T' => 'U',
                other => other,
            })
            .collect();
        if utr5.chars().any(|c| !"ACGU".contains(c)) {
            continue;
        }

        candidates.push((mean_te, utr5));
    }

    Ok(candidates)
}

/// Encode empirical seed strings into chromosome rows.
pub fn seed_rows_from_strings(layout: &ChromosomeLayout, seeds: &[String]) -> Vec<Array1<u16>> {
    seeds
        .iter()
        .filter_map(|seq| match codec::encode_utr5(seq) {
            Ok(codes) => Some(row_from_codes(layout, &codes)),
            Err(err) => {
                warn!("skipping unencodable seed: {err}");
                None
            }
        })
        .collect()
}

// ── Gradient seeds ──────────────────────────────────────────────────────────

/// Gradient-ascent design parameters.
#[derive(Debug, Clone, Copy)]
pub struct GradientSettings {
    /// Length of the 5'UTR to design (clipped to the oracle ceiling and the
    /// chromosome layout).
    pub utr5_len: usize,
    pub n_steps: usize,
    pub n_restarts: usize,
    pub n_seeds: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
}

impl Default for GradientSettings {
    fn default() -> Self {
        GradientSettings {
            utr5_len: 100,
            n_steps: 200,
            n_restarts: 4,
            n_seeds: 16,
            learning_rate: 0.05,
        }
    }
}

/// Design high-TE 5'UTR chromosome rows by gradient ascent through the
/// oracle.
///
/// Continuous nucleotide logits are softmaxed into per-position
/// probabilities, spliced into the fixed CDS/3'UTR input tensor at the
/// right-aligned 5'UTR positions, and pushed through the ensemble; the
/// negative target-tissue prediction is the loss. After `n_steps` Adam
/// updates the logits are discretised by argmax and the resulting sequence
/// is rescored through the oracle once. The best `n_seeds` restarts are
/// returned, highest scored TE first.
pub fn gradient_seeds(
    oracle: &TeEnsemble,
    cds: &str,
    utr3: &str,
    target_cell_type: &str,
    layout: &ChromosomeLayout,
    settings: &GradientSettings,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Array1<u16>>> {
    let target_idx = oracle.tissue_index(target_cell_type)?;
    let utr5_len = settings
        .utr5_len
        .clamp(1, ORACLE_UTR5_MAX.min(layout.utr5_max));

    // Fixed CDS/3'UTR portion of the input, built once without a 5'UTR.
    let context = MrnaSequence::new("", cds, utr3)?;
    let batch = codec::encode_batch(std::slice::from_ref(&context));
    if !batch.valid[0] {
        warn!("CDS + 3'UTR exceeds the oracle length budget; skipping gradient seeds");
        return Ok(Vec::new());
    }
    let fixed = batch.tensor.index_axis(ndarray::Axis(0), 0).to_owned();
    let pad_start = ORACLE_UTR5_MAX - utr5_len;

    let mut scored: Vec<(f64, Array1<u16>)> = Vec::with_capacity(settings.n_restarts);

    for _restart in 0..settings.n_restarts {
        let mut logits = Array2::<f64>::zeros((utr5_len, 4));
        for v in logits.iter_mut() {
            // Standard-normal initialisation via Box-Muller on the run RNG.
            let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = rng.gen();
            *v = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        }

        let mut adam = Adam::new(utr5_len, settings.learning_rate);

        for _step in 0..settings.n_steps {
            let probs = softmax_rows(&logits);

            // Splice the soft 5'UTR into a copy of the fixed tensor.
            let mut x = fixed.clone();
            for p in 0..utr5_len {
                for c in 0..4 {
                    x[[OPT_TO_ORACLE[c], pad_start + p]] = probs[[p, c]] as f32;
                }
            }

            // dTE/dx, ensemble mean; loss is -TE.
            let input_grad = oracle.gradient_mean(x.view(), target_idx);
            let mut grad_probs = Array2::<f64>::zeros((utr5_len, 4));
            for p in 0..utr5_len {
                for c in 0..4 {
                    grad_probs[[p, c]] = -f64::from(input_grad[[OPT_TO_ORACLE[c], pad_start + p]]);
                }
            }

            // Softmax backward, row by row.
            let mut grad_logits = Array2::<f64>::zeros((utr5_len, 4));
            for p in 0..utr5_len {
                let dot: f64 = (0..4).map(|c| probs[[p, c]] * grad_probs[[p, c]]).sum();
                for c in 0..4 {
                    grad_logits[[p, c]] = probs[[p, c]] * (grad_probs[[p, c]] - dot);
                }
            }

            adam.step(&mut logits, &grad_logits);
        }

        // Discretise and rescore through the oracle.
        let codes: Vec<u16> = logits
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0usize;
                for c in 1..4 {
                    if row[c] > row[best] {
                        best = c;
                    }
                }
                best as u16
            })
            .collect();
        let utr5: String = codes
            .iter()
            .map(|&c| codec::NUCLEOTIDES[c as usize])
            .collect();

        let mut full_utr5 = utr5;
        full_utr5.push_str(KOZAK);
        let te = match MrnaSequence::new(&full_utr5, cds, utr3)
            .and_then(|seq| oracle.predict_one(&seq, target_cell_type))
        {
            Ok(result) => result.target_te,
            Err(err) => {
                warn!("gradient seed rescoring failed: {err}");
                0.0
            }
        };

        let mut row = row_from_codes(layout, &codes);
        row[0] = layout.clamp_length(utr5_len as i64);
        scored.push((te, row));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).expect("finite TE values"));
    Ok(scored
        .into_iter()
        .take(settings.n_seeds)
        .map(|(_, row)| row)
        .collect())
}

fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(logits.raw_dim());
    for (i, row) in logits.rows().into_iter().enumerate() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for (j, &v) in row.iter().enumerate() {
            let e = (v - max).exp();
            out[[i, j]] = e;
            sum += e;
        }
        for j in 0..row.len() {
            out[[i, j]] /= sum;
        }
    }
    out
}

/// Minimal Adam optimiser over the logit matrix.
struct Adam {
    m: Array2<f64>,
    v: Array2<f64>,
    t: i32,
    lr: f64,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPS: f64 = 1e-8;

    fn new(rows: usize, lr: f64) -> Self {
        Adam {
            m: Array2::zeros((rows, 4)),
            v: Array2::zeros((rows, 4)),
            t: 0,
            lr,
        }
    }

    fn step(&mut self, params: &mut Array2<f64>, grad: &Array2<f64>) {
        self.t += 1;
        let bias1 = 1.0 - Self::BETA1.powi(self.t);
        let bias2 = 1.0 - Self::BETA2.powi(self.t);
        for (idx, g) in grad.indexed_iter() {
            self.m[idx] = Self::BETA1 * self.m[idx] + (1.0 - Self::BETA1) * g;
            self.v[idx] = Self::BETA2 * self.v[idx] + (1.0 - Self::BETA2) * g * g;
            let m_hat = self.m[idx] / bias1;
            let v_hat = self.v[idx] / bias2;
            params[idx] -= self.lr * m_hat / (v_hat.sqrt() + Self::EPS);
        }
    }
}
