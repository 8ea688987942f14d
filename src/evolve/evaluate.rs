//! Batched fitness evaluation: one oracle pass, CPU scorers in parallel.
//!
//! Each generation drives exactly one oracle batch for the whole offspring
//! matrix, then fans the three CPU-bound scorers (structure, manufacturing,
//! stability) across the rayon pool. Objective rows are written per index so
//! the result is deterministic with respect to the input chromosome matrix.
//!
//! A scorer failure on a single candidate never aborts the generation: the
//! candidate receives the worst possible objective vector and stays in the
//! population where mutation can still act on it.

use log::warn;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::codec;
use crate::error::Result;
use crate::fold::RnaFold;
use crate::oracle::{TeEnsemble, TeResult};
use crate::scoring::{compute_fitness, score_parsed, MetricValues, Weights};
use crate::sequence::MrnaSequence;

/// Number of objectives the optimiser minimises.
pub const N_OBJ: usize = 4;

/// A population with its aligned objective matrix and normalised metric
/// values.
#[derive(Debug, Clone)]
pub struct EvaluatedPopulation {
    pub genes: Array2<u16>,
    /// `(n, 4)` objectives, each `1 - normalised_metric`; lower dominates.
    pub objectives: Array2<f64>,
    /// Normalised metric values (including the weighted overall), row-aligned
    /// with `genes`.
    pub values: Vec<MetricValues>,
}

impl EvaluatedPopulation {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Evaluator shared across a run: fixed CDS/3'UTR context, the folding
/// engine, the oracle, and the fitness weights.
pub struct BatchEvaluator<'a> {
    pub cds: String,
    pub utr3: String,
    pub target_cell_type: String,
    pub folder: &'a dyn RnaFold,
    pub oracle: &'a TeEnsemble,
    pub weights: Weights,
    /// Capped extrapolated global fold: ranking-quality only.
    pub fast_fold: bool,
}

impl<'a> BatchEvaluator<'a> {
    /// Decode one chromosome row into an mRNA record.
    pub fn decode(&self, row: ArrayView1<u16>) -> Result<MrnaSequence> {
        codec::decode_mrna(row, &self.cds, &self.utr3)
    }

    /// Evaluate a chromosome matrix into an [`EvaluatedPopulation`].
    pub fn evaluate(&self, genes: Array2<u16>) -> Result<EvaluatedPopulation> {
        let sequences: Vec<Result<MrnaSequence>> = genes
            .rows()
            .into_iter()
            .map(|row| self.decode(row))
            .collect();

        // One accelerator batch for every decodable sequence. Undecodable
        // rows are scored as failures below; a placeholder keeps the batch
        // index-aligned.
        let placeholder = MrnaSequence::new("", &self.cds, &self.utr3)?;
        let batch: Vec<MrnaSequence> = sequences
            .iter()
            .map(|s| s.as_ref().cloned().unwrap_or_else(|_| placeholder.clone()))
            .collect();
        let te_results = self.oracle.predict_batch(&batch, &self.target_cell_type)?;

        let values: Vec<MetricValues> = sequences
            .par_iter()
            .zip(te_results.into_par_iter())
            .map(|(seq, te)| self.score_one(seq, te))
            .collect();

        let mut objectives = Array2::<f64>::zeros((values.len(), N_OBJ));
        for (i, v) in values.iter().enumerate() {
            let row = v.objectives();
            for (j, &obj) in row.iter().enumerate() {
                objectives[[i, j]] = obj;
            }
        }

        Ok(EvaluatedPopulation {
            genes,
            objectives,
            values,
        })
    }

    fn score_one(&self, seq: &Result<MrnaSequence>, te: TeResult) -> MetricValues {
        let seq = match seq {
            Ok(seq) => seq,
            Err(err) => {
                warn!("candidate could not be decoded: {err}");
                return MetricValues::worst();
            }
        };
        match score_parsed(seq, Some(te), self.fast_fold, self.folder) {
            Ok(report) => compute_fitness(&report, &self.weights),
            Err(err) => {
                warn!("candidate scoring failed: {err}");
                MetricValues::worst()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolve::chromosome::{self, ChromosomeLayout};
    use crate::oracle::TeModel;
    use ndarray::{ArrayView2, ArrayView3};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    struct FlatFold;

    impl RnaFold for FlatFold {
        fn fold(&self, seq: &str) -> Result<(String, f64)> {
            Ok((".".repeat(seq.len()), -0.2 * seq.len() as f64))
        }
    }

    fn oracle() -> TeEnsemble {
        struct Const;
        impl TeModel for Const {
            fn forward(&self, batch: ArrayView3<f32>) -> Array2<f32> {
                let n = batch.shape()[0];
                let mut out = Array2::zeros((n, 2));
                for i in 0..n {
                    out[[i, 0]] = 1.4;
                    out[[i, 1]] = 0.7;
                }
                out
            }
            fn input_gradient(&self, _i: ArrayView2<f32>, _t: usize) -> Array2<f32> {
                Array2::zeros((codec::ORACLE_CHANNELS, codec::ORACLE_WIDTH))
            }
        }
        TeEnsemble::new(
            vec![vec![Arc::new(Const) as Arc<dyn TeModel>]],
            vec!["fibroblast".into(), "neurons".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_evaluate_shapes_and_ranges() {
        let layout = ChromosomeLayout::new(4, 20).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let genes = chromosome::sample(&layout, 12, None, &[], &mut rng);

        let ens = oracle();
        let folder = FlatFold;
        let evaluator = BatchEvaluator {
            cds: "AUGCCCAAGUAA".into(),
            utr3: "GAGCCCUAA".into(),
            target_cell_type: "fibroblast".into(),
            folder: &folder,
            oracle: &ens,
            weights: Weights::default(),
            fast_fold: true,
        };

        let evaluated = evaluator.evaluate(genes).unwrap();
        assert_eq!(evaluated.objectives.shape(), &[12, N_OBJ]);
        assert_eq!(evaluated.values.len(), 12);
        for row in evaluated.objectives.rows() {
            assert!(row.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
        for v in &evaluated.values {
            assert!((0.0..=1.0).contains(&v.overall));
        }
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let layout = ChromosomeLayout::new(4, 20).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let genes = chromosome::sample(&layout, 8, None, &[], &mut rng);

        let ens = oracle();
        let folder = FlatFold;
        let evaluator = BatchEvaluator {
            cds: "AUGCCCAAGUAA".into(),
            utr3: "GAGCCCUAA".into(),
            target_cell_type: "fibroblast".into(),
            folder: &folder,
            oracle: &ens,
            weights: Weights::default(),
            fast_fold: true,
        };

        let a = evaluator.evaluate(genes.clone()).unwrap();
        let b = evaluator.evaluate(genes).unwrap();
        assert_eq!(a.objectives, b.objectives);
    }

    #[test]
    fn test_unknown_tissue_is_fatal() {
        let layout = ChromosomeLayout::new(4, 20).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let genes = chromosome::sample(&layout, 4, None, &[], &mut rng);

        let ens = oracle();
        let folder = FlatFold;
        let evaluator = BatchEvaluator {
            cds: "AUGCCCAAGUAA".into(),
            utr3: "GAGCCCUAA".into(),
            target_cell_type: "liver".into(),
            folder: &folder,
            oracle: &ens,
            weights: Weights::default(),
            fast_fold: true,
        };

        assert!(evaluator.evaluate(genes).is_err());
    }
}
