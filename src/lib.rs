//! utrevo - cell-type-selective mRNA 5'UTR design.
//!
//! This library evolves candidate 5'UTRs for a fixed protein-coding sequence
//! under four competing objectives (5'UTR accessibility, manufacturability,
//! stability, and cell-type-selective translation efficiency) and returns a
//! Pareto front of mRNA designs.
//!
//! # Features
//!
//! - Variable-length chromosome encoding with bounded length-walk mutation
//!   and uniform crossover
//! - Elitist NSGA-III survival with a reference-direction archive
//! - Batched TE-oracle scoring (one accelerator batch per generation) plus
//!   rayon-parallel CPU scorers
//! - Greedy miRNA set cover and bulged sponge cassette generation for the
//!   3'UTR
//! - Warm starts from empirical high-TE 5'UTRs and gradient-ascent designs
//!   through the oracle
//!
//! # Example
//!
//! ```ignore
//! use utrevo::config::RunConfig;
//! use utrevo::expression::{parse_expression_matrix, parse_mature_table};
//! use utrevo::fold::PairingFold;
//! use utrevo::run::{design_utr3, run};
//!
//! let matrix = parse_expression_matrix(Path::new("expression_matrix.csv"))?;
//! let mature = parse_mature_table(Path::new("miR_Family_Info.txt"))?;
//! let config = RunConfig { target_cell_type: "Fibroblast".into(), ..Default::default() };
//!
//! let utr3 = design_utr3(&matrix, &mature, &config)?;
//! let oracle = utrevo::oracle::load_ensemble(Path::new("oracle/"))?;
//! let outcome = run(&config, &cds, &utr3.sponge.utr3, &PairingFold, &oracle, None, |gen, best| {
//!     eprintln!("generation {gen}: best overall {best:.4}");
//! })?;
//! ```

pub mod codec;
pub mod config;
pub mod cover;
pub mod error;
pub mod evolve;
pub mod expression;
pub mod fold;
pub mod genes;
pub mod oracle;
pub mod output;
pub mod run;
pub mod scoring;
pub mod sequence;
pub mod sponge;
pub mod table;

pub use config::RunConfig;
pub use error::Error;
pub use run::{design_utr3, run, RunOutcome};
pub use sequence::MrnaSequence;
