//! RNA secondary-structure folding interface.
//!
//! [`RnaFold`] is the seam to an external thermodynamic folding engine
//! (dot-bracket structure + minimum free energy in kcal/mol). The scorers
//! only ever talk to the trait, so a ViennaRNA binding can be plugged in
//! without touching them.
//!
//! [`PairingFold`] is the built-in stand-in: Nussinov-style base-pair
//! maximisation with fixed per-pair energies. It is deterministic and fast
//! enough for optimisation-time ranking, but its absolute energies are
//! cruder than a nearest-neighbour model.

use crate::error::Result;

/// Folding window length for long sequences.
pub const FOLD_WINDOW: usize = 500;

/// Stride between consecutive folding windows.
pub const FOLD_STEP: usize = 250;

/// Secondary-structure prediction for an RNA sequence.
pub trait RnaFold: Send + Sync {
    /// Fold a sequence. Returns the dot-bracket structure and the MFE in
    /// kcal/mol (more negative = more stable).
    fn fold(&self, seq: &str) -> Result<(String, f64)>;
}

/// Fold a sequence in overlapping windows and return each window's MFE.
///
/// Used when the sequence is too long for a single cubic-time fold.
pub fn windowed_mfe_values(folder: &dyn RnaFold, seq: &str) -> Result<Vec<f64>> {
    if seq.len() < FOLD_WINDOW {
        return Ok(vec![folder.fold(seq)?.1]);
    }
    let mut values = Vec::new();
    let mut start = 0;
    while start + FOLD_WINDOW <= seq.len() {
        values.push(folder.fold(&seq[start..start + FOLD_WINDOW])?.1);
        start += FOLD_STEP;
    }
    Ok(values)
}

/// Base-pair-maximisation folding model.
///
/// Watson-Crick and wobble pairs carry fixed energies (GC -3, AU -2, GU -1
/// kcal/mol); hairpin loops must span at least 3 unpaired nucleotides.
pub struct PairingFold;

/// Minimum unpaired nucleotides inside a hairpin loop.
const MIN_LOOP: usize = 3;

fn pair_energy(a: u8, b: u8) -> f64 {
    match (a, b) {
        (b'G', b'C') | (b'C', b'G') => -3.0,
        (b'A', b'U') | (b'U', b'A') => -2.0,
        (b'G', b'U') | (b'U', b'G') => -1.0,
        _ => 0.0,
    }
}

impl RnaFold for PairingFold {
    fn fold(&self, seq: &str) -> Result<(String, f64)> {
        let bytes = seq.as_bytes();
        let n = bytes.len();
        if n < MIN_LOOP + 2 {
            return Ok((".".repeat(n), 0.0));
        }

        // energy[i][j]: best energy of subsequence i..=j.
        // partner[i][j]: pairing partner of i in the optimum, or -1 if i is
        // unpaired (flattened n*n tables).
        let mut energy = vec![0.0f64; n * n];
        let mut partner = vec![-1i32; n * n];
        let at = |i: usize, j: usize| i * n + j;

        for span in (MIN_LOOP + 1)..n {
            for i in 0..n - span {
                let j = i + span;
                // i unpaired
                let mut best = energy[at(i + 1, j)];
                let mut best_k = -1i32;
                // i paired with some k
                for k in (i + MIN_LOOP + 1)..=j {
                    let e_pair = pair_energy(bytes[i], bytes[k]);
                    if e_pair >= 0.0 {
                        continue;
                    }
                    let inner = if k > i + 1 { energy[at(i + 1, k - 1)] } else { 0.0 };
                    let rest = if k < j { energy[at(k + 1, j)] } else { 0.0 };
                    let e = e_pair + inner + rest;
                    if e < best {
                        best = e;
                        best_k = k as i32;
                    }
                }
                energy[at(i, j)] = best;
                partner[at(i, j)] = best_k;
            }
        }

        // Traceback via the partner table.
        let mut structure = vec![b'.'; n];
        let mut stack = vec![(0usize, n - 1)];
        while let Some((i, j)) = stack.pop() {
            if i >= j || j - i <= MIN_LOOP {
                continue;
            }
            match partner[at(i, j)] {
                -1 => stack.push((i + 1, j)),
                k => {
                    let k = k as usize;
                    structure[i] = b'(';
                    structure[k] = b')';
                    if k > i + 1 {
                        stack.push((i + 1, k - 1));
                    }
                    if k < j {
                        stack.push((k + 1, j));
                    }
                }
            }
        }

        let mfe = energy[at(0, n - 1)];
        Ok((String::from_utf8(structure).expect("dot-bracket is ASCII"), mfe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sequence_is_unpaired() {
        let (structure, mfe) = PairingFold.fold("ACGU").unwrap();
        assert_eq!(structure, "....");
        assert_eq!(mfe, 0.0);
    }

    #[test]
    fn test_hairpin_is_found() {
        // GGGG AAAA CCCC folds into a 4-pair stem with an A4 loop.
        let (structure, mfe) = PairingFold.fold("GGGGAAAACCCC").unwrap();
        assert_eq!(structure, "((((....))))");
        assert!((mfe - (-12.0)).abs() < 1e-9);
    }

    #[test]
    fn test_homopolymer_has_no_structure() {
        let (structure, mfe) = PairingFold.fold(&"A".repeat(40)).unwrap();
        assert!(structure.chars().all(|c| c == '.'));
        assert_eq!(mfe, 0.0);
    }

    #[test]
    fn test_balanced_brackets() {
        let (structure, _) = PairingFold
            .fold("GGCGCAAUAGCUAGCGGAUCCGAUUUAGCGCC")
            .unwrap();
        let open = structure.matches('(').count();
        let close = structure.matches(')').count();
        assert_eq!(open, close);
        let mut depth = 0i32;
        for c in structure.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_min_loop_enforced() {
        // A 2-nt loop cannot close; nothing shorter than MIN_LOOP pairs.
        let (structure, _) = PairingFold.fold("GAAC").unwrap();
        assert_eq!(structure, "....");
    }

    #[test]
    fn test_windowed_mfe_short_sequence_single_value() {
        let values = windowed_mfe_values(&PairingFold, "GGGGAAAACCCC").unwrap();
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_windowed_mfe_covers_long_sequence() {
        let seq = "GC".repeat(600); // 1200 nt
        let values = windowed_mfe_values(&PairingFold, &seq).unwrap();
        // Window starts at 0, 250, 500.
        assert_eq!(values.len(), (1200 - FOLD_WINDOW) / FOLD_STEP + 1);
    }

    #[test]
    fn test_fold_is_deterministic() {
        let seq = "GGCAGCUAGCUAGCAUCGAUGGCCAUUAGC";
        let a = PairingFold.fold(seq).unwrap();
        let b = PairingFold.fold(seq).unwrap();
        assert_eq!(a, b);
    }
}
