//! Scoring pipeline: run the four metric scorers over a parsed mRNA.
//!
//! [`score_parsed`] is the canonical entry point when the 5'UTR / CDS /
//! 3'UTR boundaries are already known (which they always are inside the
//! optimiser). The full-sequence fold happens exactly once here and is
//! shared between the structure and stability scorers.

pub mod fitness;
pub mod manufacturing;
pub mod stability;
pub mod structure;

use std::fmt;

use crate::error::Result;
use crate::fold::RnaFold;
use crate::oracle::TeResult;
use crate::sequence::MrnaSequence;

pub use fitness::{compute_fitness, MetricValues, Weights};
pub use manufacturing::{score_manufacturing, ManufacturingScores};
pub use stability::{score_stability, StabilityScores};
pub use structure::{
    check_utr5_accessibility, compute_global_mfe, FoldMethod, GlobalMfe, Utr5Accessibility,
};

/// Traffic-light grade for a metric. GREY means no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Green,
    Amber,
    Red,
    Grey,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Green => "GREEN",
            Status::Amber => "AMBER",
            Status::Red => "RED",
            Status::Grey => "GREY",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Basic dimensions of the scored transcript.
#[derive(Debug, Clone)]
pub struct SequenceInfo {
    pub total_length: usize,
    pub utr5_length: usize,
    pub cds_length: usize,
    pub utr3_length: usize,
    pub num_codons: usize,
}

/// Structure section of the report.
#[derive(Debug, Clone)]
pub struct StructureScores {
    pub utr5_accessibility: Utr5Accessibility,
    pub global_mfe: GlobalMfe,
}

/// Four-way traffic-light summary, one entry per optimised metric.
#[derive(Debug, Clone)]
pub struct Summary {
    pub utr5_accessibility: Status,
    pub manufacturability: Status,
    pub stability: Status,
    pub specificity: Status,
}

/// Full scoring report for one candidate.
#[derive(Debug, Clone)]
pub struct Report {
    pub sequence_info: SequenceInfo,
    pub structure: StructureScores,
    pub manufacturing: ManufacturingScores,
    pub stability: StabilityScores,
    /// Oracle prediction, when one was computed for this candidate.
    pub te: Option<TeResult>,
    pub summary: Summary,
}

/// Run all four scorers on an already-parsed mRNA.
///
/// `te` is the precomputed oracle result for this sequence (the oracle runs
/// batched, upstream of this call). `fast_fold` substitutes the capped
/// extrapolated fold for the global MFE, a ranking-only shortcut that must
/// never feed a final per-candidate report.
pub fn score_parsed(
    seq: &MrnaSequence,
    te: Option<TeResult>,
    fast_fold: bool,
    folder: &dyn RnaFold,
) -> Result<Report> {
    let utr5_accessibility = check_utr5_accessibility(seq, folder)?;

    let core = seq.core_sequence();
    let global_mfe = compute_global_mfe(&core, fast_fold, folder)?;

    let manufacturing = score_manufacturing(seq);
    let stability = score_stability(seq, global_mfe.mfe_per_nt);

    let summary = Summary {
        utr5_accessibility: utr5_accessibility.status,
        manufacturability: manufacturing_status(manufacturing.total_violations),
        stability: stability.status,
        specificity: te.as_ref().map_or(Status::Grey, |t| t.status),
    };

    Ok(Report {
        sequence_info: SequenceInfo {
            total_length: seq.len(),
            utr5_length: seq.utr5().len(),
            cds_length: seq.cds().len(),
            utr3_length: seq.utr3().len(),
            num_codons: seq.cds().len() / 3,
        },
        structure: StructureScores {
            utr5_accessibility,
            global_mfe,
        },
        manufacturing,
        stability,
        te,
        summary,
    })
}

/// Manufacturability traffic light from the full-sequence violation count.
fn manufacturing_status(total_violations: usize) -> Status {
    if total_violations <= 3 {
        Status::Green
    } else {
        Status::Amber
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Folder with a fixed energy density that counts its invocations.
    struct CountingFold {
        density: f64,
        calls: AtomicUsize,
    }

    impl CountingFold {
        fn new(density: f64) -> Self {
            CountingFold {
                density,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RnaFold for CountingFold {
        fn fold(&self, seq: &str) -> Result<(String, f64)> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok((".".repeat(seq.len()), self.density * seq.len() as f64))
        }
    }

    fn sample() -> MrnaSequence {
        MrnaSequence::new(&"ACGU".repeat(10), "AUGCCCAAGUAA", "GAGCCC").unwrap()
    }

    #[test]
    fn test_report_sections_populated() {
        let folder = CountingFold::new(-0.2);
        let report = score_parsed(&sample(), None, false, &folder).unwrap();

        assert_eq!(report.sequence_info.utr5_length, 40);
        assert_eq!(report.sequence_info.num_codons, 4);
        assert!(report.structure.utr5_accessibility.mfe.is_some());
        assert_eq!(report.structure.global_mfe.method, FoldMethod::Full);
        assert_eq!(report.summary.specificity, Status::Grey);
    }

    #[test]
    fn test_global_fold_happens_once() {
        let folder = CountingFold::new(-0.2);
        score_parsed(&sample(), None, false, &folder).unwrap();
        // One fold for 5'UTR accessibility, one for the shared global MFE.
        assert_eq!(folder.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_fast_fold_marks_method() {
        let folder = CountingFold::new(-0.2);
        let seq = MrnaSequence::new(&"ACGU".repeat(50), "AUGCCCAAGUAA", "GAGCCC").unwrap();
        let report = score_parsed(&seq, None, true, &folder).unwrap();
        assert_eq!(report.structure.global_mfe.method, FoldMethod::Capped);
    }

    #[test]
    fn test_stability_shares_global_fold() {
        let folder = CountingFold::new(-0.3);
        let report = score_parsed(&sample(), None, false, &folder).unwrap();
        assert_eq!(
            report.stability.mfe_per_nt,
            report.structure.global_mfe.mfe_per_nt
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Green.to_string(), "GREEN");
        assert_eq!(Status::Grey.to_string(), "GREY");
    }
}
