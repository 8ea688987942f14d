//! miRNA expression data: mean-RPM matrix and mature-sequence table.
//!
//! The expression matrix maps each miRNA to its mean expression (reads per
//! million) across a panel of cell types. It is built once from CSV and
//! immutable afterwards; the sponge selector queries it heavily.

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use std::io::BufRead;
use std::path::Path;

use crate::table::open_table;

/// Human species identifier in miRBase family tables.
const HUMAN_SPECIES_ID: &str = "9606";

/// miRNA x cell-type mean-expression matrix.
///
/// Rows keep file order (`IndexMap`) so iteration is deterministic.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    cell_types: Vec<String>,
    rows: IndexMap<String, Vec<f64>>,
}

impl ExpressionMatrix {
    /// Build a matrix from explicit rows. Every row must have one value per
    /// cell type.
    pub fn from_rows(cell_types: Vec<String>, rows: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut map = IndexMap::with_capacity(rows.len());
        for (mirna, values) in rows {
            if values.len() != cell_types.len() {
                bail!(
                    "expression row '{}' has {} values for {} cell types",
                    mirna,
                    values.len(),
                    cell_types.len()
                );
            }
            map.insert(mirna, values);
        }
        Ok(ExpressionMatrix {
            cell_types,
            rows: map,
        })
    }

    pub fn cell_types(&self) -> &[String] {
        &self.cell_types
    }

    pub fn mirnas(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|s| s.as_str())
    }

    pub fn num_mirnas(&self) -> usize {
        self.rows.len()
    }

    pub fn contains_cell_type(&self, cell_type: &str) -> bool {
        self.cell_types.iter().any(|c| c == cell_type)
    }

    /// Mean RPM of `mirna` in `cell_type`, if both are known.
    pub fn mean(&self, mirna: &str, cell_type: &str) -> Option<f64> {
        let col = self.cell_types.iter().position(|c| c == cell_type)?;
        self.rows.get(mirna).map(|values| values[col])
    }
}

/// Parse an expression matrix CSV.
///
/// The first header field names the miRNA-ID column; the remaining header
/// fields are cell-type names. Each data row is a miRNA ID followed by one
/// mean-RPM float per cell type. Malformed rows are skipped.
pub fn parse_expression_matrix(path: &Path) -> Result<ExpressionMatrix> {
    let reader = open_table(path)?;
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line.context("Failed to read expression matrix header")?,
        None => bail!("expression matrix {} is empty", path.display()),
    };
    let mut fields = header.split(',');
    fields.next(); // miRNA-ID column label
    let cell_types: Vec<String> = fields.map(|f| f.trim().to_string()).collect();
    if cell_types.is_empty() {
        bail!(
            "expression matrix {} has no cell-type columns",
            path.display()
        );
    }

    let mut rows: IndexMap<String, Vec<f64>> = IndexMap::new();
    for line in lines {
        let line = line.context("Failed to read expression matrix line")?;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let mirna = match fields.next() {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => continue,
        };

        let values: Vec<f64> = fields
            .map(|f| f.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .unwrap_or_default();
        if values.len() != cell_types.len() {
            continue;
        }

        rows.insert(mirna, values);
    }

    Ok(ExpressionMatrix { cell_types, rows })
}

/// A mature miRNA entry from a miRBase-style family table.
#[derive(Debug, Clone)]
pub struct MatureMirna {
    pub mature_sequence: String,
    pub seed: String,
}

/// Parse a miRBase-style mature-sequence table (tab-separated).
///
/// Keeps human entries only (species 9606) and the first occurrence per
/// MiRBase ID. The header row names at least `Species ID`, `MiRBase ID`,
/// `Mature sequence`, and optionally `Seed+m8`.
pub fn parse_mature_table(path: &Path) -> Result<AHashMap<String, MatureMirna>> {
    let reader = open_table(path)?;
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line.context("Failed to read mature table header")?,
        None => bail!("mature table {} is empty", path.display()),
    };
    let columns: Vec<&str> = header.split('\t').map(|c| c.trim()).collect();
    let col = |name: &str| columns.iter().position(|c| *c == name);

    let species_idx = col("Species ID")
        .with_context(|| format!("mature table {} lacks 'Species ID'", path.display()))?;
    let id_idx = col("MiRBase ID")
        .with_context(|| format!("mature table {} lacks 'MiRBase ID'", path.display()))?;
    let seq_idx = col("Mature sequence")
        .with_context(|| format!("mature table {} lacks 'Mature sequence'", path.display()))?;
    let seed_idx = col("Seed+m8");

    let mut mirnas: AHashMap<String, MatureMirna> = AHashMap::new();
    for line in lines {
        let line = line.context("Failed to read mature table line")?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() <= seq_idx.max(id_idx).max(species_idx) {
            continue;
        }
        if fields[species_idx].trim() != HUMAN_SPECIES_ID {
            continue;
        }

        let id = fields[id_idx].trim().to_string();
        if id.is_empty() || mirnas.contains_key(&id) {
            continue;
        }

        let seed = seed_idx
            .and_then(|i| fields.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        mirnas.insert(
            id,
            MatureMirna {
                mature_sequence: fields[seq_idx].trim().to_string(),
                seed,
            },
        );
    }

    Ok(mirnas)
}
