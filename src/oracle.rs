//! Translation-efficiency oracle: ensemble driver and batch predictor.
//!
//! The oracle proper is an external deep-CNN ensemble (RiboNN-style: K
//! cross-validation folds, top-k checkpoints per fold) that maps the one-hot
//! mRNA tensor to per-tissue TE predictions. This module owns everything
//! around it: the [`TeModel`] trait the external models implement, the
//! fold-then-ensemble averaging, the batch prediction path, and the
//! process-wide singleton that keeps the multi-gigabyte weight load to a
//! single occurrence.
//!
//! [`LinearTeModel`] is a bundled surrogate implementing the same trait from
//! a plain weight matrix, so the binary and the tests can exercise the full
//! path without the external ensemble.

use indexmap::IndexMap;
use ndarray::{Array1, Array2, ArrayView2, ArrayView3, Axis};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::codec::{self, ORACLE_CHANNELS, ORACLE_WIDTH};
use crate::error::{Error, Result};
use crate::scoring::Status;
use crate::sequence::MrnaSequence;

/// One ensemble member: a model mapping oracle input tensors to per-tissue
/// TE predictions.
///
/// Implementations must be thread-safe and must not mutate weights at
/// runtime.
pub trait TeModel: Send + Sync {
    /// Forward pass over a whole batch: `(N, 5, 13318)` -> `(N, T)`.
    fn forward(&self, batch: ArrayView3<f32>) -> Array2<f32>;

    /// Gradient of one tissue's prediction with respect to a single input
    /// plane: `(5, 13318)` -> `(5, 13318)`.
    fn input_gradient(&self, input: ArrayView2<f32>, tissue: usize) -> Array2<f32>;
}

/// Per-sequence oracle prediction.
#[derive(Debug, Clone)]
pub struct TeResult {
    /// False for the null result (sequence exceeded the encoding budget or
    /// no prediction was possible).
    pub available: bool,
    /// Predicted TE in the target tissue.
    pub target_te: f64,
    /// Mean predicted TE across all tissues.
    pub mean_te: f64,
    /// Mean predicted TE across non-target tissues.
    pub mean_off_target_te: f64,
    /// Tissue name -> predicted TE, in oracle column order.
    pub per_tissue: IndexMap<String, f64>,
    pub status: Status,
}

impl TeResult {
    /// The null result substituted for rows the oracle could not score.
    pub fn null() -> Self {
        TeResult {
            available: false,
            target_te: 0.0,
            mean_te: 0.0,
            mean_off_target_te: 0.0,
            per_tissue: IndexMap::new(),
            status: Status::Red,
        }
    }
}

/// Traffic light for a TE prediction, from target TE and off-target mean.
pub fn te_status(target_te: f64, mean_off_target_te: f64) -> Status {
    let margin = target_te - mean_off_target_te;
    if target_te >= 1.5 && margin >= 0.5 {
        Status::Green
    } else if target_te >= 1.0 && margin >= 0.0 {
        Status::Amber
    } else {
        Status::Red
    }
}

/// The TE oracle ensemble: models grouped by cross-validation fold.
///
/// Predictions are averaged within each fold first, then across folds, so an
/// unevenly populated fold does not dominate the ensemble mean.
pub struct TeEnsemble {
    fold_models: Vec<Vec<Arc<dyn TeModel>>>,
    tissues: Vec<String>,
}

impl TeEnsemble {
    pub fn new(fold_models: Vec<Vec<Arc<dyn TeModel>>>, tissues: Vec<String>) -> Result<Self> {
        if tissues.is_empty() {
            return Err(Error::ResourceMissing(
                "oracle ensemble has no tissue columns".into(),
            ));
        }
        if fold_models.iter().all(|fold| fold.is_empty()) {
            return Err(Error::ResourceMissing(
                "oracle ensemble has no models".into(),
            ));
        }
        Ok(TeEnsemble {
            fold_models,
            tissues,
        })
    }

    pub fn tissues(&self) -> &[String] {
        &self.tissues
    }

    pub fn num_models(&self) -> usize {
        self.fold_models.iter().map(|f| f.len()).sum()
    }

    /// Resolve a tissue column name, failing before any work is done.
    pub fn tissue_index(&self, name: &str) -> Result<usize> {
        self.tissues
            .iter()
            .position(|t| t == name)
            .ok_or_else(|| Error::unknown_cell_type(name, &self.tissues))
    }

    /// Ensemble-mean forward pass: `(N, 5, 13318)` -> `(N, T)`.
    ///
    /// One pass per model over the whole batch; never per-sequence.
    pub fn forward_mean(&self, batch: ArrayView3<f32>) -> Array2<f32> {
        let n = batch.shape()[0];
        let t = self.tissues.len();
        let mut total = Array2::<f32>::zeros((n, t));
        let mut populated_folds = 0usize;

        for fold in &self.fold_models {
            if fold.is_empty() {
                continue;
            }
            let mut fold_sum = Array2::<f32>::zeros((n, t));
            for model in fold {
                fold_sum += &model.forward(batch);
            }
            fold_sum /= fold.len() as f32;
            total += &fold_sum;
            populated_folds += 1;
        }

        total / populated_folds as f32
    }

    /// Ensemble-mean input gradient for one sample and one tissue column.
    pub fn gradient_mean(&self, input: ArrayView2<f32>, tissue: usize) -> Array2<f32> {
        let mut total = Array2::<f32>::zeros((ORACLE_CHANNELS, ORACLE_WIDTH));
        let mut populated_folds = 0usize;

        for fold in &self.fold_models {
            if fold.is_empty() {
                continue;
            }
            let mut fold_sum = Array2::<f32>::zeros((ORACLE_CHANNELS, ORACLE_WIDTH));
            for model in fold {
                fold_sum += &model.input_gradient(input, tissue);
            }
            fold_sum /= fold.len() as f32;
            total += &fold_sum;
            populated_folds += 1;
        }

        total / populated_folds as f32
    }

    /// Predict TE for a batch of sequences.
    ///
    /// Encodes the whole batch once, runs one forward pass per ensemble
    /// member, and aggregates tissue-wise. Rows that exceed the encoding
    /// budget receive [`TeResult::null`].
    pub fn predict_batch(
        &self,
        sequences: &[MrnaSequence],
        target_cell_type: &str,
    ) -> Result<Vec<TeResult>> {
        let target_idx = self.tissue_index(target_cell_type)?;
        if sequences.is_empty() {
            return Ok(Vec::new());
        }

        let batch = codec::encode_batch(sequences);
        let preds = self.forward_mean(batch.tensor.view());
        let t = self.tissues.len();

        let mut results = Vec::with_capacity(sequences.len());
        for (i, &valid) in batch.valid.iter().enumerate() {
            if !valid {
                results.push(TeResult::null());
                continue;
            }

            let row = preds.index_axis(Axis(0), i);
            let target_te = row[target_idx] as f64;
            let sum: f64 = row.iter().map(|&v| v as f64).sum();
            let mean_te = sum / t as f64;
            let mean_off_target_te = if t > 1 {
                (sum - target_te) / (t - 1) as f64
            } else {
                0.0
            };

            let per_tissue: IndexMap<String, f64> = self
                .tissues
                .iter()
                .zip(row.iter())
                .map(|(name, &v)| (name.clone(), v as f64))
                .collect();

            results.push(TeResult {
                available: true,
                target_te,
                mean_te,
                mean_off_target_te,
                per_tissue,
                status: te_status(target_te, mean_off_target_te),
            });
        }

        Ok(results)
    }

    /// Predict TE for a single sequence.
    pub fn predict_one(&self, sequence: &MrnaSequence, target_cell_type: &str) -> Result<TeResult> {
        let mut results = self.predict_batch(std::slice::from_ref(sequence), target_cell_type)?;
        Ok(results.remove(0))
    }
}

// ── Process-wide singleton ──────────────────────────────────────────────────

static ORACLE: OnceLock<Arc<TeEnsemble>> = OnceLock::new();

/// Install the process-wide oracle. The first installation wins; later calls
/// return the already-installed ensemble. The oracle is never re-initialised
/// mid-run.
pub fn install(ensemble: TeEnsemble) -> Arc<TeEnsemble> {
    ORACLE.get_or_init(|| Arc::new(ensemble)).clone()
}

/// The installed oracle, if any.
pub fn global() -> Option<Arc<TeEnsemble>> {
    ORACLE.get().cloned()
}

// ── Linear surrogate adapter ────────────────────────────────────────────────

/// A linear readout over the one-hot input: `y[t] = b[t] + <W[t], x>`.
///
/// Stands in for one CNN checkpoint; useful for end-to-end runs and tests.
/// Its input gradient is exactly its weight plane.
pub struct LinearTeModel {
    /// `(T, 5 * 13318)` weights, flattened for the batched dot product.
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl LinearTeModel {
    pub fn new(weights: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        let d = ORACLE_CHANNELS * ORACLE_WIDTH;
        if weights.ncols() != d || weights.nrows() != bias.len() {
            return Err(Error::ResourceMissing(format!(
                "linear oracle weights have shape ({}, {}), expected (T, {})",
                weights.nrows(),
                weights.ncols(),
                d
            )));
        }
        Ok(LinearTeModel { weights, bias })
    }
}

impl TeModel for LinearTeModel {
    fn forward(&self, batch: ArrayView3<f32>) -> Array2<f32> {
        let n = batch.shape()[0];
        let d = ORACLE_CHANNELS * ORACLE_WIDTH;
        let flat = batch
            .to_shape((n, d))
            .expect("oracle batch is contiguous");
        let mut out = flat.dot(&self.weights.t());
        out += &self.bias;
        out
    }

    fn input_gradient(&self, _input: ArrayView2<f32>, tissue: usize) -> Array2<f32> {
        self.weights
            .index_axis(Axis(0), tissue)
            .to_shape((ORACLE_CHANNELS, ORACLE_WIDTH))
            .expect("weight row is contiguous")
            .to_owned()
    }
}

/// Load a surrogate ensemble from a weights directory.
///
/// Layout: `tissues.txt` with one tissue column name per line, plus one
/// little-endian f32 file per member named `fold<F>_model<M>.bin` holding
/// `(T, 5, 13318)` weights. Unreadable or misshapen files are fatal.
pub fn load_ensemble(dir: &Path) -> Result<TeEnsemble> {
    let read_err = |what: &str| Error::ResourceMissing(format!("{} in {}", what, dir.display()));

    let tissues_raw = std::fs::read_to_string(dir.join("tissues.txt"))
        .map_err(|_| read_err("cannot read tissues.txt"))?;
    let tissues: Vec<String> = tissues_raw
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if tissues.is_empty() {
        return Err(read_err("tissues.txt names no tissues"));
    }

    // Collect fold/model indices from the file names.
    let mut members: Vec<(u32, u32, std::path::PathBuf)> = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|_| read_err("cannot list weights"))?;
    for entry in entries {
        let entry = entry.map_err(|_| read_err("cannot list weights"))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some((fold, model)) = parse_member_name(&name) {
            members.push((fold, model, entry.path()));
        }
    }
    if members.is_empty() {
        return Err(read_err("no fold<F>_model<M>.bin weight files"));
    }
    members.sort();

    let d = ORACLE_CHANNELS * ORACLE_WIDTH;
    let expected_bytes = tissues.len() * d * 4;
    let max_fold = members.iter().map(|(f, _, _)| *f).max().unwrap_or(0);
    let mut fold_models: Vec<Vec<Arc<dyn TeModel>>> = vec![Vec::new(); max_fold as usize + 1];

    for (fold, _, path) in members {
        let bytes = std::fs::read(&path)
            .map_err(|_| Error::ResourceMissing(format!("cannot read {}", path.display())))?;
        if bytes.len() != expected_bytes {
            return Err(Error::ResourceMissing(format!(
                "{} holds {} bytes, expected {}",
                path.display(),
                bytes.len(),
                expected_bytes
            )));
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let weights = Array2::from_shape_vec((tissues.len(), d), values)
            .expect("weight byte count already validated");
        let model = LinearTeModel::new(weights, Array1::zeros(tissues.len()))?;
        fold_models[fold as usize].push(Arc::new(model));
    }

    fold_models.retain(|fold| !fold.is_empty());
    TeEnsemble::new(fold_models, tissues)
}

fn parse_member_name(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix("fold")?;
    let (fold_str, rest) = rest.split_once("_model")?;
    let model_str = rest.strip_suffix(".bin")?;
    Some((fold_str.parse().ok()?, model_str.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// Model returning a fixed prediction row for every sequence.
    pub struct ConstModel(pub Vec<f32>);

    impl TeModel for ConstModel {
        fn forward(&self, batch: ArrayView3<f32>) -> Array2<f32> {
            let n = batch.shape()[0];
            let mut out = Array2::zeros((n, self.0.len()));
            for i in 0..n {
                for (j, &v) in self.0.iter().enumerate() {
                    out[[i, j]] = v;
                }
            }
            out
        }

        fn input_gradient(&self, _input: ArrayView2<f32>, _tissue: usize) -> Array2<f32> {
            Array2::zeros((ORACLE_CHANNELS, ORACLE_WIDTH))
        }
    }

    fn ensemble(rows: Vec<Vec<Vec<f32>>>) -> TeEnsemble {
        let folds = rows
            .into_iter()
            .map(|fold| {
                fold.into_iter()
                    .map(|r| Arc::new(ConstModel(r)) as Arc<dyn TeModel>)
                    .collect()
            })
            .collect();
        TeEnsemble::new(folds, vec!["fibroblast".into(), "neurons".into()]).unwrap()
    }

    fn seq() -> MrnaSequence {
        MrnaSequence::new("ACGU", "AUGCCCAAGUAA", "GAGCCC").unwrap()
    }

    #[test]
    fn test_te_status_thresholds() {
        assert_eq!(te_status(1.6, 1.0), Status::Green);
        assert_eq!(te_status(1.5, 1.0), Status::Green);
        assert_eq!(te_status(1.6, 1.2), Status::Amber); // margin < 0.5
        assert_eq!(te_status(1.0, 1.0), Status::Amber);
        assert_eq!(te_status(1.2, 1.3), Status::Red); // negative margin
        assert_eq!(te_status(0.8, 0.1), Status::Red);
    }

    #[test]
    fn test_fold_then_ensemble_averaging() {
        // Fold 0 has two models (mean [1.0, 2.0]); fold 1 has one ([3.0, 4.0]).
        // Ensemble mean is [2.0, 3.0], not the flat model mean [5/3, 8/3].
        let ens = ensemble(vec![
            vec![vec![0.0, 0.0], vec![2.0, 4.0]],
            vec![vec![3.0, 4.0]],
        ]);
        let batch = Array3::<f32>::zeros((1, ORACLE_CHANNELS, ORACLE_WIDTH));
        let preds = ens.forward_mean(batch.view());
        assert!((preds[[0, 0]] - 2.0).abs() < 1e-6);
        assert!((preds[[0, 1]] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_batch_aggregates() {
        let ens = ensemble(vec![vec![vec![1.8, 0.6]]]);
        let results = ens.predict_batch(&[seq(), seq()], "fibroblast").unwrap();
        assert_eq!(results.len(), 2);

        let r = &results[0];
        assert!(r.available);
        assert!((r.target_te - 1.8).abs() < 1e-6);
        assert!((r.mean_te - 1.2).abs() < 1e-6);
        assert!((r.mean_off_target_te - 0.6).abs() < 1e-6);
        assert_eq!(r.status, Status::Green);
        assert_eq!(r.per_tissue["neurons"], 0.6f32 as f64);
    }

    #[test]
    fn test_predict_batch_unknown_tissue_fails_before_work() {
        let ens = ensemble(vec![vec![vec![1.0, 1.0]]]);
        let err = ens.predict_batch(&[seq()], "liver");
        assert!(matches!(err, Err(Error::UnknownCellType { .. })));
    }

    #[test]
    fn test_oversized_sequence_gets_null_result() {
        let ens = ensemble(vec![vec![vec![1.8, 0.6]]]);
        let long = MrnaSequence::new(&"A".repeat(1400), "AUGUAA", "").unwrap();
        let results = ens.predict_batch(&[long, seq()], "fibroblast").unwrap();

        assert!(!results[0].available);
        assert_eq!(results[0].status, Status::Red);
        assert_eq!(results[0].target_te, 0.0);
        assert!(results[1].available);
    }

    #[test]
    fn test_linear_model_forward_and_gradient() {
        let d = ORACLE_CHANNELS * ORACLE_WIDTH;
        let mut weights = Array2::<f32>::zeros((2, d));
        // Tissue 0 counts channel 0 (A) occupancy; tissue 1 counts channel 3 (G).
        for pos in 0..ORACLE_WIDTH {
            weights[[0, pos]] = 1.0;
            weights[[1, 3 * ORACLE_WIDTH + pos]] = 1.0;
        }
        let model = LinearTeModel::new(weights, Array1::zeros(2)).unwrap();

        let s = MrnaSequence::new("AAAA", "AUGGGGUAA", "").unwrap();
        let batch = codec::encode_batch(std::slice::from_ref(&s));
        let out = model.forward(batch.tensor.view());
        // A appears 4 (utr5) + 1 (AUG) + 2 (UAA) = 7 times; G 4 times.
        assert_eq!(out[[0, 0]], 7.0);
        assert_eq!(out[[0, 1]], 4.0);

        let grad = model.input_gradient(
            batch.tensor.index_axis(Axis(0), 0),
            1,
        );
        assert_eq!(grad[[3, 0]], 1.0);
        assert_eq!(grad[[0, 0]], 0.0);
    }

    #[test]
    fn test_singleton_installs_once() {
        let first = install(ensemble(vec![vec![vec![1.0, 1.0]]]));
        // A second installation is ignored; the first ensemble stays.
        let second = install(ensemble(vec![vec![vec![2.0, 2.0]]]));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(global().is_some());
    }

    #[test]
    fn test_member_name_parsing() {
        assert_eq!(parse_member_name("fold0_model1.bin"), Some((0, 1)));
        assert_eq!(parse_member_name("fold10_model3.bin"), Some((10, 3)));
        assert_eq!(parse_member_name("weights.bin"), None);
        assert_eq!(parse_member_name("fold0_model1.txt"), None);
    }
}
