//! Gene-symbol to CDS resolution.
//!
//! The canonical-transcript lookup service is an external collaborator; this
//! module consumes its contract from a local registry table so runs are
//! reproducible offline. The table is tab-separated `symbol<TAB>cds` lines,
//! optionally gzipped.

use ahash::AHashMap;
use anyhow::Context;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};
use crate::table::open_table;

/// Symbol -> CDS registry.
#[derive(Debug, Clone, Default)]
pub struct GeneRegistry {
    genes: AHashMap<String, String>,
}

impl GeneRegistry {
    /// Load a registry table. Lines without both columns are skipped; the
    /// first entry per symbol wins. Symbol matching is case-insensitive.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = open_table(path).map_err(|e| Error::ResourceMissing(e.to_string()))?;

        let mut genes = AHashMap::new();
        for line in reader.lines() {
            let line = line
                .context("Failed to read gene registry line")
                .map_err(|e| Error::ResourceMissing(e.to_string()))?;
            let mut fields = line.split('\t');
            let (Some(symbol), Some(cds)) = (fields.next(), fields.next()) else {
                continue;
            };
            let symbol = symbol.trim().to_uppercase();
            let cds = cds.trim().to_string();
            if symbol.is_empty() || cds.is_empty() {
                continue;
            }
            genes.entry(symbol).or_insert(cds);
        }

        Ok(GeneRegistry { genes })
    }

    /// Canonical CDS for a gene symbol.
    pub fn canonical_cds(&self, symbol: &str) -> Result<&str> {
        self.genes
            .get(&symbol.to_uppercase())
            .map(|s| s.as_str())
            .ok_or_else(|| Error::GeneNotFound(symbol.to_string()))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}
