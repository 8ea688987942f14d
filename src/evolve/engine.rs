//! Elitist NSGA-III generation loop.
//!
//! Each generation breeds `pop_size` offspring by tournament selection on
//! (non-domination rank, niche count), evaluates them in one batch, and
//! applies reference-direction survival to the pool
//! `population ∪ offspring ∪ archive`. The archive (the survivors'
//! non-dominated front, bounded by `pop_size`) is merged back into every
//! survival pool, so a solution that was non-dominated once stays eligible
//! and the best weighted overall score never decreases between generations.

use log::warn;
use ndarray::{concatenate, Array2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::evolve::chromosome::{self, ChromosomeLayout};
use crate::evolve::evaluate::{BatchEvaluator, EvaluatedPopulation, N_OBJ};
use crate::evolve::nsga3::{self, N_PARTITIONS};
use crate::scoring::MetricValues;

/// Engine knobs, validated by [`crate::config::RunConfig`] upstream.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub pop_size: usize,
    pub n_gen: usize,
    pub mutation_rate: f64,
    pub max_length_delta: i64,
    pub initial_length: Option<usize>,
    pub seed: u64,
}

/// One exported history row: a candidate at a given generation.
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub generation: usize,
    /// Full assembled mRNA, 5' cap and poly-A tail included.
    pub sequence: String,
    pub values: MetricValues,
}

/// Final result of an engine run.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    /// The elitist archive: the Pareto front, one chromosome row each.
    pub front_genes: Array2<u16>,
    /// Objective matrix aligned with `front_genes`.
    pub front_objectives: Array2<f64>,
    pub front_values: Vec<MetricValues>,
    pub history: Vec<HistoryRow>,
}

pub struct Nsga3Engine<'a> {
    layout: ChromosomeLayout,
    settings: EngineSettings,
    ref_dirs: Array2<f64>,
    evaluator: &'a BatchEvaluator<'a>,
    rng: ChaCha8Rng,
}

impl<'a> Nsga3Engine<'a> {
    pub fn new(
        layout: ChromosomeLayout,
        settings: EngineSettings,
        evaluator: &'a BatchEvaluator<'a>,
    ) -> Result<Self> {
        if settings.pop_size == 0 {
            return Err(Error::InvalidConfig("population size must be positive".into()));
        }
        let rng = ChaCha8Rng::seed_from_u64(settings.seed);
        Ok(Nsga3Engine {
            layout,
            settings,
            ref_dirs: nsga3::reference_directions(N_OBJ, N_PARTITIONS),
            evaluator,
            rng,
        })
    }

    /// Drive the full run. `observer` receives `(generation, best_overall)`
    /// after every evaluated generation, from this thread only.
    pub fn run(
        &mut self,
        seeds: &[ndarray::Array1<u16>],
        observer: impl FnMut(usize, f64),
    ) -> Result<EngineOutcome> {
        self.run_cancellable(seeds, &AtomicBool::new(false), observer)
    }

    /// Like [`Nsga3Engine::run`], but checks `token` at every generation
    /// boundary and stops early once it is set. There is no cancellation
    /// point inside a generation.
    pub fn run_cancellable(
        &mut self,
        seeds: &[ndarray::Array1<u16>],
        token: &AtomicBool,
        mut observer: impl FnMut(usize, f64),
    ) -> Result<EngineOutcome> {
        let pop_size = self.settings.pop_size;

        let genes = chromosome::sample(
            &self.layout,
            pop_size,
            self.settings.initial_length,
            seeds,
            &mut self.rng,
        );
        let evaluated = self.evaluator.evaluate(genes)?;

        let survival =
            nsga3::survive(evaluated.objectives.view(), self.ref_dirs.view(), pop_size);
        let mut population = select_rows(&evaluated, &survival.selected);
        let mut rank = survival.rank;
        let mut niche_count = survival.niche_count;

        let mut archive = self.rebuild_archive(&population, &rank, None)?;

        let mut history = Vec::new();
        self.record_history(&mut history, 0, &population)?;
        observer(0, best_overall(&population, &archive));

        for generation in 1..=self.settings.n_gen {
            if token.load(Ordering::Relaxed) {
                warn!("run cancelled at generation {}", generation);
                break;
            }

            let offspring_genes = self.make_offspring(&population, &rank, &niche_count);
            let offspring = self.evaluator.evaluate(offspring_genes)?;

            let pool = concat_populations(&[&population, &offspring, &archive]);
            let survival = nsga3::survive(pool.objectives.view(), self.ref_dirs.view(), pop_size);
            let survivors = select_rows(&pool, &survival.selected);
            rank = survival.rank;
            niche_count = survival.niche_count;

            let pool_best = best_row(&pool);
            archive = self.rebuild_archive(&survivors, &rank, pool_best.as_ref())?;
            population = survivors;

            self.record_history(&mut history, generation, &population)?;
            observer(generation, best_overall(&population, &archive));
        }

        Ok(EngineOutcome {
            front_genes: archive.genes,
            front_objectives: archive.objectives,
            front_values: archive.values,
            history,
        })
    }

    /// Breed up to `pop_size` offspring, rejecting duplicates of the current
    /// population and of already-accepted offspring.
    fn make_offspring(
        &mut self,
        population: &EvaluatedPopulation,
        rank: &[usize],
        niche_count: &[usize],
    ) -> Array2<u16> {
        let pop_size = self.settings.pop_size;
        let width = self.layout.row_width();
        let mut accepted: Vec<ndarray::Array1<u16>> = Vec::with_capacity(pop_size);

        let max_attempts = 100 * pop_size.max(1);
        let mut attempts = 0;
        while accepted.len() < pop_size && attempts < max_attempts {
            attempts += 1;

            let first = self.tournament(population.len(), rank, niche_count);
            let second = self.tournament(population.len(), rank, niche_count);
            let (child_a, child_b) = chromosome::crossover(
                population.genes.row(first),
                population.genes.row(second),
                &mut self.rng,
            );

            let mut pair = Array2::<u16>::zeros((2, width));
            pair.row_mut(0).assign(&child_a);
            pair.row_mut(1).assign(&child_b);
            chromosome::mutate(
                &self.layout,
                &mut pair,
                self.settings.mutation_rate,
                self.settings.max_length_delta,
                &mut self.rng,
            );

            for child in pair.rows() {
                if accepted.len() >= pop_size {
                    break;
                }
                let duplicate = chromosome::duplicates_any(child, &population.genes.view())
                    || accepted
                        .iter()
                        .any(|row| chromosome::rows_duplicate(child, row.view()));
                if !duplicate {
                    accepted.push(child.to_owned());
                }
            }
        }

        if accepted.len() < pop_size {
            warn!(
                "offspring generation saturated after {} attempts: {} of {} bred",
                attempts,
                accepted.len(),
                pop_size
            );
        }

        let mut genes = Array2::<u16>::zeros((accepted.len(), width));
        for (i, row) in accepted.iter().enumerate() {
            genes.row_mut(i).assign(row);
        }
        genes
    }

    /// Binary tournament: lower rank wins, then lower niche count, then a
    /// coin flip.
    fn tournament(&mut self, n: usize, rank: &[usize], niche_count: &[usize]) -> usize {
        let a = self.rng.gen_range(0..n);
        let b = self.rng.gen_range(0..n);
        if rank[a] != rank[b] {
            if rank[a] < rank[b] { a } else { b }
        } else if niche_count[a] != niche_count[b] {
            if niche_count[a] < niche_count[b] { a } else { b }
        } else if self.rng.gen_bool(0.5) {
            a
        } else {
            b
        }
    }

    /// Archive = the survivors' non-dominated front, pruned to `pop_size`
    /// with the same niching operator; the pool-wide best overall individual
    /// is always retained.
    fn rebuild_archive(
        &self,
        survivors: &EvaluatedPopulation,
        rank: &[usize],
        pool_best: Option<&(ndarray::Array1<u16>, [f64; N_OBJ], MetricValues)>,
    ) -> Result<EvaluatedPopulation> {
        let front: Vec<usize> = (0..survivors.len()).filter(|&i| rank[i] == 0).collect();
        let mut archive = select_rows(survivors, &front);

        if let Some((best_genes, best_objectives, best_values)) = pool_best {
            let present = archive
                .genes
                .rows()
                .into_iter()
                .any(|row| chromosome::rows_duplicate(row, best_genes.view()));
            if !present {
                let mut obj_row = Array2::<f64>::zeros((1, N_OBJ));
                for (j, &v) in best_objectives.iter().enumerate() {
                    obj_row[[0, j]] = v;
                }
                let genes = concatenate(
                    Axis(0),
                    &[archive.genes.view(), best_genes.view().insert_axis(Axis(0))],
                )
                .map_err(|e| Error::Infrastructure(e.to_string()))?;
                let objectives =
                    concatenate(Axis(0), &[archive.objectives.view(), obj_row.view()])
                        .map_err(|e| Error::Infrastructure(e.to_string()))?;
                let mut values = archive.values;
                values.push(*best_values);
                archive = EvaluatedPopulation {
                    genes,
                    objectives,
                    values,
                };
            }
        }

        if archive.len() > self.settings.pop_size {
            let survival = nsga3::survive(
                archive.objectives.view(),
                self.ref_dirs.view(),
                self.settings.pop_size,
            );
            archive = select_rows(&archive, &survival.selected);
        }

        Ok(archive)
    }

    fn record_history(
        &self,
        history: &mut Vec<HistoryRow>,
        generation: usize,
        population: &EvaluatedPopulation,
    ) -> Result<()> {
        for (row, values) in population.genes.rows().into_iter().zip(&population.values) {
            let sequence = self.evaluator.decode(row)?.full_sequence();
            history.push(HistoryRow {
                generation,
                sequence,
                values: *values,
            });
        }
        Ok(())
    }
}

/// Highest weighted overall score across the population and archive.
fn best_overall(population: &EvaluatedPopulation, archive: &EvaluatedPopulation) -> f64 {
    population
        .values
        .iter()
        .chain(archive.values.iter())
        .map(|v| v.overall)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// The pool's best-overall row, cloned out for archive retention.
fn best_row(
    pool: &EvaluatedPopulation,
) -> Option<(ndarray::Array1<u16>, [f64; N_OBJ], MetricValues)> {
    let best = pool
        .values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.overall
                .partial_cmp(&b.overall)
                .expect("finite overall scores")
        })?
        .0;
    let mut objectives = [0.0; N_OBJ];
    for (j, slot) in objectives.iter_mut().enumerate() {
        *slot = pool.objectives[[best, j]];
    }
    Some((
        pool.genes.row(best).to_owned(),
        objectives,
        pool.values[best],
    ))
}

/// Materialise a subset of a population, in index order.
fn select_rows(population: &EvaluatedPopulation, indices: &[usize]) -> EvaluatedPopulation {
    let width = population.genes.ncols();
    let mut genes = Array2::<u16>::zeros((indices.len(), width));
    let mut objectives = Array2::<f64>::zeros((indices.len(), N_OBJ));
    let mut values = Vec::with_capacity(indices.len());

    for (out, &i) in indices.iter().enumerate() {
        genes.row_mut(out).assign(&population.genes.row(i));
        objectives.row_mut(out).assign(&population.objectives.row(i));
        values.push(population.values[i]);
    }

    EvaluatedPopulation {
        genes,
        objectives,
        values,
    }
}

/// Concatenate populations into one pool (rebuilt, never mutated in place).
fn concat_populations(parts: &[&EvaluatedPopulation]) -> EvaluatedPopulation {
    let non_empty: Vec<&&EvaluatedPopulation> =
        parts.iter().filter(|p| !p.is_empty()).collect();
    if non_empty.is_empty() {
        let width = parts[0].genes.ncols();
        return EvaluatedPopulation {
            genes: Array2::zeros((0, width)),
            objectives: Array2::zeros((0, N_OBJ)),
            values: Vec::new(),
        };
    }

    let genes = concatenate(
        Axis(0),
        &non_empty.iter().map(|p| p.genes.view()).collect::<Vec<_>>(),
    )
    .expect("equal-width populations");
    let objectives = concatenate(
        Axis(0),
        &non_empty
            .iter()
            .map(|p| p.objectives.view())
            .collect::<Vec<_>>(),
    )
    .expect("equal-width objective matrices");
    let values = non_empty
        .iter()
        .flat_map(|p| p.values.iter().copied())
        .collect();

    EvaluatedPopulation {
        genes,
        objectives,
        values,
    }
}
