//! Secondary-structure scoring: 5'UTR accessibility and global MFE.

use crate::error::Result;
use crate::fold::{windowed_mfe_values, RnaFold, FOLD_WINDOW};
use crate::scoring::Status;
use crate::sequence::MrnaSequence;

/// How much of the 5'UTR tail is folded for the accessibility check.
pub const UTR5_FOLD_SPAN: usize = 200;

/// Prefix length folded in fast mode; the result is linearly extrapolated.
pub const FAST_FOLD_CAP: usize = 150;

/// Sequences longer than this are folded in windows instead of whole.
pub const FULL_FOLD_MAX: usize = 2000;

/// Accessibility of the 5'UTR for ribosome loading.
///
/// Strong secondary structure near the cap blocks the 43S pre-initiation
/// complex scanning towards the start codon.
#[derive(Debug, Clone)]
pub struct Utr5Accessibility {
    pub mfe: Option<f64>,
    pub mfe_per_nt: Option<f64>,
    /// Number of nucleotides actually folded.
    pub folded_len: usize,
    pub status: Status,
}

/// Fold the last [`UTR5_FOLD_SPAN`] nt of the 5'UTR (or all of it, if
/// shorter) and grade the MFE density.
pub fn check_utr5_accessibility(
    seq: &MrnaSequence,
    folder: &dyn RnaFold,
) -> Result<Utr5Accessibility> {
    let utr5 = seq.utr5();
    if utr5.len() < 10 {
        return Ok(Utr5Accessibility {
            mfe: None,
            mfe_per_nt: None,
            folded_len: 0,
            status: Status::Grey,
        });
    }

    let start = utr5.len().saturating_sub(UTR5_FOLD_SPAN);
    let tail = &utr5[start..];
    let (_, mfe) = folder.fold(tail)?;
    let mfe_per_nt = mfe / tail.len() as f64;

    let status = if mfe_per_nt >= -0.1 {
        Status::Green
    } else if mfe_per_nt >= -0.3 {
        Status::Amber
    } else {
        Status::Red
    };

    Ok(Utr5Accessibility {
        mfe: Some(mfe),
        mfe_per_nt: Some(mfe_per_nt),
        folded_len: tail.len(),
        status,
    })
}

/// How a global MFE estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldMethod {
    /// Single fold over the whole sequence.
    Full,
    /// Mean of overlapping window folds, scaled to the full length.
    Windowed,
    /// Fold of the first [`FAST_FOLD_CAP`] nt, linearly extrapolated.
    /// Ranking-only; never used for a final report.
    Capped,
}

/// Global MFE of the core transcript.
#[derive(Debug, Clone)]
pub struct GlobalMfe {
    pub mfe: f64,
    pub mfe_per_nt: f64,
    pub length: usize,
    pub method: FoldMethod,
}

/// Compute the global MFE, folding the sequence exactly once.
///
/// The result is shared between the structure and stability scorers; callers
/// must pass it through rather than refolding.
pub fn compute_global_mfe(
    core: &str,
    fast_fold: bool,
    folder: &dyn RnaFold,
) -> Result<GlobalMfe> {
    let len = core.len();
    if len == 0 {
        return Ok(GlobalMfe {
            mfe: 0.0,
            mfe_per_nt: 0.0,
            length: 0,
            method: FoldMethod::Full,
        });
    }

    if fast_fold && len > FAST_FOLD_CAP {
        let (_, mfe) = folder.fold(&core[..FAST_FOLD_CAP])?;
        let scaled = mfe * len as f64 / FAST_FOLD_CAP as f64;
        return Ok(GlobalMfe {
            mfe: scaled,
            mfe_per_nt: scaled / len as f64,
            length: len,
            method: FoldMethod::Capped,
        });
    }

    if len > FULL_FOLD_MAX {
        let values = windowed_mfe_values(folder, core)?;
        let avg = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        let total = avg * len as f64 / FOLD_WINDOW as f64;
        return Ok(GlobalMfe {
            mfe: total,
            mfe_per_nt: total / len as f64,
            length: len,
            method: FoldMethod::Windowed,
        });
    }

    let (_, mfe) = folder.fold(core)?;
    Ok(GlobalMfe {
        mfe,
        mfe_per_nt: mfe / len as f64,
        length: len,
        method: FoldMethod::Full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Folder returning a fixed energy density per nucleotide.
    struct FixedDensity(f64);

    impl RnaFold for FixedDensity {
        fn fold(&self, seq: &str) -> Result<(String, f64)> {
            Ok((".".repeat(seq.len()), self.0 * seq.len() as f64))
        }
    }

    fn seq_with_utr5(utr5: &str) -> MrnaSequence {
        MrnaSequence::new(utr5, "AUGCCCAAGUAA", "GAGCCC").unwrap()
    }

    #[test]
    fn test_accessibility_status_bands() {
        let seq = seq_with_utr5(&"ACGU".repeat(10));
        let green = check_utr5_accessibility(&seq, &FixedDensity(-0.05)).unwrap();
        assert_eq!(green.status, Status::Green);

        let amber = check_utr5_accessibility(&seq, &FixedDensity(-0.2)).unwrap();
        assert_eq!(amber.status, Status::Amber);

        let red = check_utr5_accessibility(&seq, &FixedDensity(-0.5)).unwrap();
        assert_eq!(red.status, Status::Red);
    }

    #[test]
    fn test_accessibility_folds_tail_only() {
        let utr5 = "A".repeat(500);
        let seq = seq_with_utr5(&utr5);
        let result = check_utr5_accessibility(&seq, &FixedDensity(-0.1)).unwrap();
        assert_eq!(result.folded_len, UTR5_FOLD_SPAN);
    }

    #[test]
    fn test_accessibility_short_utr5_is_grey() {
        let seq = seq_with_utr5("ACGUA");
        let result = check_utr5_accessibility(&seq, &FixedDensity(-0.5)).unwrap();
        assert_eq!(result.status, Status::Grey);
        assert!(result.mfe.is_none());
    }

    #[test]
    fn test_global_mfe_full_fold() {
        let out = compute_global_mfe(&"ACGU".repeat(100), false, &FixedDensity(-0.3)).unwrap();
        assert_eq!(out.method, FoldMethod::Full);
        assert!((out.mfe - (-120.0)).abs() < 1e-9);
        assert!((out.mfe_per_nt - (-0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_global_mfe_fast_fold_extrapolates() {
        let out = compute_global_mfe(&"ACGU".repeat(100), true, &FixedDensity(-0.3)).unwrap();
        assert_eq!(out.method, FoldMethod::Capped);
        // Density is uniform, so the extrapolation lands on the same totals.
        assert!((out.mfe - (-120.0)).abs() < 1e-9);
        assert!((out.mfe_per_nt - (-0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_global_mfe_windowed_for_long_sequences() {
        let out = compute_global_mfe(&"ACGU".repeat(700), false, &FixedDensity(-0.2)).unwrap();
        assert_eq!(out.method, FoldMethod::Windowed);
        assert!((out.mfe_per_nt - (-0.2)).abs() < 1e-9);
    }
}
