//! End-to-end orchestration: sponge 3'UTR design, seed assembly, and the
//! generation loop.

use log::{info, warn};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;

use crate::config::RunConfig;
use crate::cover::{greedy_cover, CoverOutcome};
use crate::error::{Error, Result};
use crate::evolve::chromosome::ChromosomeLayout;
use crate::evolve::engine::{EngineSettings, HistoryRow, Nsga3Engine};
use crate::evolve::evaluate::BatchEvaluator;
use crate::evolve::seeds::{
    gradient_seeds, seed_rows_from_strings, top_utr5_seeds, GradientSettings,
};
use crate::expression::{ExpressionMatrix, MatureMirna};
use crate::fold::RnaFold;
use crate::oracle::TeEnsemble;
use crate::scoring::MetricValues;
use crate::sponge::{build_sponge, SpongeUtr};

/// Expression-matrix cell-type names mapped onto oracle tissue columns.
///
/// The two databases use different naming conventions; only cell types
/// present in both can be used end-to-end. Names absent from this map fall
/// back to their lowercased form.
const CELL_TYPE_TO_TISSUE: [(&str, &str); 2] =
    [("Fibroblast", "fibroblast"), ("Neuron", "neurons")];

/// Oracle tissue column for an expression-matrix cell-type name.
pub fn oracle_tissue_for(cell_type: &str) -> String {
    CELL_TYPE_TO_TISSUE
        .iter()
        .find(|(name, _)| *name == cell_type)
        .map(|(_, tissue)| tissue.to_string())
        .unwrap_or_else(|| cell_type.to_lowercase())
}

/// A designed sponge 3'UTR together with the covering miRNA selection.
#[derive(Debug, Clone)]
pub struct Utr3Design {
    pub cover: CoverOutcome,
    pub sponge: SpongeUtr,
}

/// Design the 3'UTR: pick a covering miRNA set, then build the sponge
/// cassette from their mature sequences.
pub fn design_utr3(
    matrix: &ExpressionMatrix,
    mature: &ahash::AHashMap<String, MatureMirna>,
    config: &RunConfig,
) -> Result<Utr3Design> {
    let cover = greedy_cover(
        matrix,
        &config.target_cell_type,
        config.target_threshold,
        config.cover_threshold,
        config.max_mirnas,
    )?;

    if cover.selected.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no sponge buildable for '{}': no miRNA is silent in the target \
             under the current thresholds",
            config.target_cell_type
        )));
    }
    if !cover.success {
        warn!(
            "{} cell type(s) remain uncovered: {}",
            cover.uncovered.len(),
            cover
                .uncovered
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let sequences: Vec<String> = cover
        .selected
        .iter()
        .map(|id| {
            mature
                .get(id)
                .map(|m| m.mature_sequence.clone())
                .ok_or_else(|| {
                    Error::ResourceMissing(format!("no mature sequence for miRNA '{id}'"))
                })
        })
        .collect::<Result<_>>()?;

    let sponge = build_sponge(&sequences, config.num_sponge_sites)?;
    Ok(Utr3Design { cover, sponge })
}

/// Result of a full design run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Pareto front as chromosome rows `[K x (utr5_max + 1)]`.
    pub front_genes: Array2<u16>,
    /// Objective matrix `[K x 4]`, rescored with full folds.
    pub front_objectives: Array2<f64>,
    pub front_values: Vec<MetricValues>,
    /// Full assembled mRNA per front row.
    pub front_sequences: Vec<String>,
    pub history: Vec<HistoryRow>,
}

/// Run the optimiser end to end.
///
/// The oracle must already be installed; the target tissue is resolved
/// before any work starts. Seeds are assembled (about `pop_size / 8` rows
/// from each enabled source), the engine drives `n_gen` generations with
/// fast folding, and the final archive is rescored with full folds before
/// being returned.
pub fn run(
    config: &RunConfig,
    cds: &str,
    utr3: &str,
    folder: &dyn RnaFold,
    oracle: &TeEnsemble,
    te_data: Option<&Path>,
    observer: impl FnMut(usize, f64),
) -> Result<RunOutcome> {
    config.validate()?;

    let tissue = oracle_tissue_for(&config.target_cell_type);
    oracle.tissue_index(&tissue)?;

    let layout = ChromosomeLayout::new(config.utr5_min, config.utr5_max)?;
    let n_seed_rows = (config.pop_size / 8).max(1);
    let mut seed_rows: Vec<Array1<u16>> = Vec::new();

    if config.gradient_seed_steps > 0 {
        info!(
            "designing {} gradient seeds ({} steps each)",
            n_seed_rows, config.gradient_seed_steps
        );
        let settings = GradientSettings {
            utr5_len: config.initial_length.unwrap_or(config.utr5_max),
            n_steps: config.gradient_seed_steps,
            n_restarts: n_seed_rows,
            n_seeds: n_seed_rows,
            ..GradientSettings::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed ^ 0x6772_6164);
        seed_rows.extend(gradient_seeds(
            oracle, cds, utr3, &tissue, &layout, &settings, &mut rng,
        )?);
    }

    if config.seed_from_data {
        match te_data {
            Some(path) => {
                let seeds =
                    top_utr5_seeds(path, n_seed_rows, config.utr5_min, config.utr5_max);
                info!("loaded {} empirical seed 5'UTRs", seeds.len());
                seed_rows.extend(seed_rows_from_strings(&layout, &seeds));
            }
            None => warn!("seed_from_data set but no TE dataset available"),
        }
    }

    let evaluator = BatchEvaluator {
        cds: cds.to_string(),
        utr3: utr3.to_string(),
        target_cell_type: tissue.clone(),
        folder,
        oracle,
        weights: config.weights,
        fast_fold: true,
    };

    let settings = EngineSettings {
        pop_size: config.pop_size,
        n_gen: config.n_gen,
        mutation_rate: config.mutation_rate,
        max_length_delta: config.max_length_delta,
        initial_length: config.initial_length,
        seed: config.seed,
    };

    let mut engine = Nsga3Engine::new(layout, settings, &evaluator)?;
    let outcome = engine.run(&seed_rows, observer)?;

    // The optimisation loop ranks with capped folds; the exported front is
    // always rescored with the real thing.
    let final_evaluator = BatchEvaluator {
        fast_fold: false,
        cds: evaluator.cds.clone(),
        utr3: evaluator.utr3.clone(),
        target_cell_type: evaluator.target_cell_type.clone(),
        folder,
        oracle,
        weights: config.weights,
    };
    let front = final_evaluator.evaluate(outcome.front_genes)?;

    let front_sequences = front
        .genes
        .rows()
        .into_iter()
        .map(|row| Ok(final_evaluator.decode(row)?.full_sequence()))
        .collect::<Result<Vec<_>>>()?;

    Ok(RunOutcome {
        front_genes: front.genes,
        front_objectives: front.objectives,
        front_values: front.values,
        front_sequences,
        history: outcome.history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExpressionMatrix;

    #[test]
    fn test_oracle_tissue_mapping() {
        assert_eq!(oracle_tissue_for("Fibroblast"), "fibroblast");
        assert_eq!(oracle_tissue_for("Neuron"), "neurons");
        assert_eq!(oracle_tissue_for("Hepatocyte"), "hepatocyte");
    }

    fn matrix() -> ExpressionMatrix {
        ExpressionMatrix::from_rows(
            vec!["Fibroblast".into(), "Neuron".into(), "Hepatocyte".into()],
            vec![
                ("hsa-miR-1".into(), vec![1.0, 2000.0, 1.0]),
                ("hsa-miR-2".into(), vec![1.0, 1.0, 2000.0]),
            ],
        )
        .unwrap()
    }

    fn mature() -> ahash::AHashMap<String, MatureMirna> {
        let mut map = ahash::AHashMap::new();
        for id in ["hsa-miR-1", "hsa-miR-2"] {
            map.insert(
                id.to_string(),
                MatureMirna {
                    mature_sequence: "UAGCUUAUCAGACUGAUGUUGA".into(),
                    seed: "AGCUUAU".into(),
                },
            );
        }
        map
    }

    fn config() -> RunConfig {
        RunConfig {
            target_cell_type: "Fibroblast".into(),
            num_sponge_sites: 4,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_design_utr3_builds_cassette() {
        let design = design_utr3(&matrix(), &mature(), &config()).unwrap();
        assert!(design.cover.success);
        assert_eq!(design.cover.selected.len(), 2);
        assert!(design.sponge.utr3.starts_with("UAA"));
    }

    #[test]
    fn test_design_utr3_no_candidates() {
        let cfg = RunConfig {
            target_threshold: 0.0, // nothing is silent enough
            ..config()
        };
        let err = design_utr3(&matrix(), &mature(), &cfg);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_design_utr3_missing_mature_sequence() {
        let empty = ahash::AHashMap::new();
        let err = design_utr3(&matrix(), &empty, &config());
        assert!(matches!(err, Err(Error::ResourceMissing(_))));
    }
}
