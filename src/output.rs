//! Output formatting for design results.
//!
//! This module handles the per-generation history CSV and the Pareto-front
//! summary table, with fixed column ordering and number formatting.

use anyhow::Result;

use std::io::Write;

use crate::evolve::engine::HistoryRow;
use crate::run::RunOutcome;

/// History CSV column order.
pub const HISTORY_HEADER: &str =
    "generation,sequence,utr5_accessibility,manufacturability,stability,specificity,overall";

/// Write the optimisation history as CSV, one row per (generation,
/// individual), metric values at 4 decimals.
pub fn write_history_csv<W: Write>(writer: &mut W, history: &[HistoryRow]) -> Result<()> {
    writeln!(writer, "{}", HISTORY_HEADER)?;
    for row in history {
        writeln!(
            writer,
            "{},{},{:.4},{:.4},{:.4},{:.4},{:.4}",
            row.generation,
            row.sequence,
            row.values.utr5_accessibility,
            row.values.manufacturability,
            row.values.stability,
            row.values.specificity,
            row.values.overall,
        )?;
    }
    Ok(())
}

/// Write the Pareto front as a tab-separated ranking table, best overall
/// first.
pub fn write_front_table<W: Write>(writer: &mut W, outcome: &RunOutcome) -> Result<()> {
    writeln!(
        writer,
        "rank\tutr5_len\tutr5_accessibility\tmanufacturability\tstability\tspecificity\toverall\tsequence"
    )?;

    let mut order: Vec<usize> = (0..outcome.front_values.len()).collect();
    order.sort_by(|&a, &b| {
        outcome.front_values[b]
            .overall
            .partial_cmp(&outcome.front_values[a].overall)
            .expect("finite overall scores")
    });

    for (rank, &i) in order.iter().enumerate() {
        let values = &outcome.front_values[i];
        writeln!(
            writer,
            "{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}\t{:.4}\t{}",
            rank + 1,
            outcome.front_genes[[i, 0]],
            values.utr5_accessibility,
            values.manufacturability,
            values.stability,
            values.specificity,
            values.overall,
            outcome.front_sequences[i],
        )?;
    }
    Ok(())
}
