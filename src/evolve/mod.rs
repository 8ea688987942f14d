//! Evolutionary optimiser: chromosome operators, NSGA-III survival, batch
//! evaluation, and warm-start seed generation.

pub mod chromosome;
pub mod engine;
pub mod evaluate;
pub mod nsga3;
pub mod seeds;

pub use chromosome::ChromosomeLayout;
pub use engine::{EngineOutcome, EngineSettings, HistoryRow, Nsga3Engine};
pub use evaluate::{BatchEvaluator, EvaluatedPopulation, N_OBJ};
