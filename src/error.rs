//! Error types for the design pipeline.
//!
//! Fatal kinds (`InvalidConfig`, `UnknownCellType`, `GeneNotFound`,
//! `ResourceMissing`, `Infrastructure`) abort a run before or between
//! generations. Recoverable conditions (a single candidate failing a scorer,
//! a sequence exceeding the oracle length budget) are absorbed inside the
//! evaluator and never surface as these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Target cell type does not resolve to a known column.
    #[error("unknown cell type '{name}' (available: {available})")]
    UnknownCellType { name: String, available: String },

    /// Gene symbol absent from the registry.
    #[error("gene '{0}' not found")]
    GeneNotFound(String),

    /// A required external resource (dataset, oracle weights) is unreadable.
    #[error("resource missing: {0}")]
    ResourceMissing(String),

    /// Caller-supplied data violates a structural requirement.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Accelerator transfer or allocation failure; not recoverable.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an `UnknownCellType` from the offending name and the known set.
    pub fn unknown_cell_type<S: AsRef<str>>(name: &str, known: &[S]) -> Self {
        let mut names: Vec<&str> = known.iter().map(|s| s.as_ref()).collect();
        names.sort_unstable();
        Error::UnknownCellType {
            name: name.to_string(),
            available: names.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_cell_type_lists_sorted_names() {
        let err = Error::unknown_cell_type("liver", &["Neuron", "Fibroblast"]);
        let msg = err.to_string();
        assert!(msg.contains("'liver'"));
        assert!(msg.contains("Fibroblast, Neuron"));
    }

    #[test]
    fn test_display_invalid_config() {
        let err = Error::InvalidConfig("utr5_min (30) > utr5_max (20)".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: utr5_min (30) > utr5_max (20)"
        );
    }
}
