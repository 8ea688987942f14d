//! Greedy miRNA set cover for sponge design.
//!
//! Finds a small set of miRNAs that are silent in the target cell type
//! (mean RPM below `target_threshold`) while every other cell type is covered
//! by at least one selected miRNA (mean RPM at or above `cover_threshold`).
//! A transcript carrying sponge sites for that set is repressed everywhere
//! the miRNAs are expressed, leaving translation active only in the target.
//!
//! Greedy set cover is an ln(n)-approximation, which is adequate here:
//! candidate counts are small and the goal is an empirical sponge design,
//! not an optimal covering.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::expression::ExpressionMatrix;

/// Outcome of the greedy cover selection.
#[derive(Debug, Clone)]
pub struct CoverOutcome {
    /// Selected miRNA IDs, in selection order.
    pub selected: Vec<String>,
    /// Cell types newly covered at each selection step.
    pub covered_per_step: Vec<BTreeSet<String>>,
    /// Non-target cell types no candidate could cover.
    pub uncovered: BTreeSet<String>,
    /// True when every non-target cell type is covered.
    pub success: bool,
}

/// Run greedy weighted set cover over the expression matrix.
///
/// Candidates are miRNAs silent in `target_cell` (mean RPM <
/// `target_threshold`). At each step the candidate covering the most
/// still-uncovered cell types is taken; ties break lexicographically on the
/// miRNA ID so the selection is deterministic. Stops when everything is
/// covered, no candidate adds coverage, or `max_mirnas` are selected.
pub fn greedy_cover(
    matrix: &ExpressionMatrix,
    target_cell: &str,
    target_threshold: f64,
    cover_threshold: f64,
    max_mirnas: usize,
) -> Result<CoverOutcome> {
    if !matrix.contains_cell_type(target_cell) {
        return Err(Error::unknown_cell_type(target_cell, matrix.cell_types()));
    }

    let other_cells: Vec<&str> = matrix
        .cell_types()
        .iter()
        .map(|c| c.as_str())
        .filter(|c| *c != target_cell)
        .collect();

    // Candidates silent in the target, with their coverage sets. Sorted by
    // ID so the greedy tie-break below is deterministic.
    let mut candidates: Vec<(String, BTreeSet<String>)> = matrix
        .mirnas()
        .filter(|m| {
            matrix
                .mean(m, target_cell)
                .is_some_and(|rpm| rpm < target_threshold)
        })
        .map(|m| {
            let covers: BTreeSet<String> = other_cells
                .iter()
                .filter(|c| matrix.mean(m, c).is_some_and(|rpm| rpm >= cover_threshold))
                .map(|c| c.to_string())
                .collect();
            (m.to_string(), covers)
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut uncovered: BTreeSet<String> = other_cells.iter().map(|c| c.to_string()).collect();
    let mut selected: Vec<String> = Vec::new();
    let mut covered_per_step: Vec<BTreeSet<String>> = Vec::new();

    while !uncovered.is_empty() && selected.len() < max_mirnas {
        let mut best: Option<(usize, BTreeSet<String>)> = None;
        for (i, (mirna, covers)) in candidates.iter().enumerate() {
            if selected.iter().any(|s| s == mirna) {
                continue;
            }
            let new_cover: BTreeSet<String> = covers.intersection(&uncovered).cloned().collect();
            // Strictly-greater keeps the first (lexicographically smallest)
            // candidate on ties.
            if best
                .as_ref()
                .map_or(true, |(_, b)| new_cover.len() > b.len())
            {
                best = Some((i, new_cover));
            }
        }

        match best {
            Some((i, new_cover)) if !new_cover.is_empty() => {
                selected.push(candidates[i].0.clone());
                for cell in &new_cover {
                    uncovered.remove(cell);
                }
                covered_per_step.push(new_cover);
            }
            _ => break,
        }
    }

    Ok(CoverOutcome {
        success: uncovered.is_empty(),
        selected,
        covered_per_step,
        uncovered,
    })
}
