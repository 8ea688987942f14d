//! mRNA stability scoring: GC3 wobble content and thermodynamic density.

use crate::scoring::Status;
use crate::sequence::MrnaSequence;

/// AU-rich element pentamer. AREs in the 3'UTR recruit exosome-mediated
/// decay; fewer is more stable.
const ARE_MOTIF: &str = "AUUUA";

/// GC fraction at the third (wobble) codon position.
///
/// Higher GC3 correlates with greater mRNA stability in mammalian cells.
pub fn compute_gc3(seq: &MrnaSequence) -> f64 {
    let mut total = 0usize;
    let mut gc = 0usize;
    for codon in seq.codons() {
        let bytes = codon.as_bytes();
        if bytes.len() == 3 {
            total += 1;
            if bytes[2] == b'G' || bytes[2] == b'C' {
                gc += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        gc as f64 / total as f64
    }
}

/// Count AU-rich elements in the 3'UTR.
pub fn count_au_rich_elements(utr3: &str) -> usize {
    utr3.match_indices(ARE_MOTIF).count()
}

/// Stability metrics and the combined score.
#[derive(Debug, Clone)]
pub struct StabilityScores {
    pub gc3: f64,
    pub mfe_per_nt: f64,
    pub au_rich_elements: usize,
    /// Combined 0-1 score, higher = more stable.
    pub stability_score: f64,
    pub status: Status,
}

/// Compute stability metrics from the parsed mRNA and a precomputed global
/// MFE density (shared with the structure scorer; never refolded here).
pub fn score_stability(seq: &MrnaSequence, mfe_per_nt: f64) -> StabilityScores {
    let gc3 = compute_gc3(seq);
    let au_rich_elements = count_au_rich_elements(seq.utr3());

    // GC3: optimal band 0.5-0.7, penalise both extremes.
    let gc3_norm = if (0.5..=0.7).contains(&gc3) {
        1.0
    } else if gc3 < 0.5 {
        (gc3 / 0.5).max(0.0)
    } else {
        ((1.0 - gc3) / 0.3).max(0.0)
    };

    // MFE/nt: -0.4 or below is very stable, above -0.1 is unstable.
    let mfe_norm = if mfe_per_nt <= -0.4 {
        1.0
    } else if mfe_per_nt >= -0.1 {
        0.0
    } else {
        (-mfe_per_nt - 0.1) / 0.3
    };

    let stability_score = 0.5 * gc3_norm + 0.5 * mfe_norm;

    let status = if stability_score >= 0.7 {
        Status::Green
    } else if stability_score >= 0.4 {
        Status::Amber
    } else {
        Status::Red
    };

    StabilityScores {
        gc3,
        mfe_per_nt,
        au_rich_elements,
        stability_score,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gc3() {
        // Codons AUG CCC AAG UAA: wobble positions G, C, G, A -> 3/4.
        let seq = MrnaSequence::new("", "AUGCCCAAGUAA", "").unwrap();
        assert_relative_eq!(compute_gc3(&seq), 0.75);
    }

    #[test]
    fn test_count_au_rich_elements() {
        assert_eq!(count_au_rich_elements("GCGCGC"), 0);
        assert_eq!(count_au_rich_elements("AUUUAGGAUUUA"), 2);
    }

    #[test]
    fn test_stability_score_optimal_inputs() {
        // GC3 AUG CCG AAG UAA -> G,G,G,A = 0.75 -> above band: (1-0.75)/0.3
        let seq = MrnaSequence::new("", "AUGCCGAAGUAA", "").unwrap();
        let scores = score_stability(&seq, -0.5);
        let expected_gc3_norm = (1.0 - 0.75) / 0.3;
        assert_relative_eq!(
            scores.stability_score,
            0.5 * expected_gc3_norm + 0.5 * 1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_stability_status_bands() {
        // Codons AUG UUU AGU UAA: GC3 = 0.25, so the GC3 term is 0.5.
        let seq = MrnaSequence::new("", "AUGUUUAGUUAA", "").unwrap();
        assert_eq!(score_stability(&seq, -0.5).status, Status::Green);
        assert_eq!(score_stability(&seq, -0.25).status, Status::Amber);
        assert_eq!(score_stability(&seq, -0.05).status, Status::Red);
    }

    #[test]
    fn test_unstable_fold_scores_zero_mfe_term() {
        // Codons AUG UUC AGU UAA: GC3 = 0.5, inside the optimal band.
        let seq = MrnaSequence::new("", "AUGUUCAGUUAA", "").unwrap();
        let scores = score_stability(&seq, 0.0);
        // GC3 term is 1.0 (in band), MFE term 0.0.
        assert_relative_eq!(scores.stability_score, 0.5);
    }
}
