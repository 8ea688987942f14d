//! Core mRNA sequence record and sequence constants.
//!
//! An [`MrnaSequence`] owns the three functional regions of a transcript
//! (5'UTR, CDS, 3'UTR) over the RNA alphabet {A, C, G, U}. The CDS invariants
//! (starts with AUG, length divisible by 3, ends on a stop codon) are checked
//! at construction so every downstream scorer can rely on them.

use crate::error::{Error, Result};

/// Kozak consensus inserted between the 5'UTR and the CDS start codon.
pub const KOZAK: &str = "GCCACC";

/// 5' cap analogue (CleanCap-AG / ARCA) in sequence notation.
pub const CAP5: &str = "GGG";

/// Poly-A tail length standard for human mRNA therapeutics.
pub const POLY_A_LENGTH: usize = 120;

/// Stop codons in the standard genetic code.
pub const STOP_CODONS: [&str; 3] = ["UAA", "UAG", "UGA"];

/// Normalise a sequence: uppercase, strip whitespace, T -> U.
///
/// Returns an error if any character outside {A, C, G, U} remains.
pub fn clean_sequence(seq: &str) -> Result<String> {
    let mut out = String::with_capacity(seq.len());
    for ch in seq.chars() {
        if ch.is_ascii_whitespace() {
            continue;
        }
        let nt = match ch.to_ascii_uppercase() {
            'T' => 'U',
            c @ ('A' | 'C' | 'G' | 'U') => c,
            c => {
                return Err(Error::InvalidInput(format!(
                    "sequence contains invalid character '{}'",
                    c
                )))
            }
        };
        out.push(nt);
    }
    Ok(out)
}

/// Reverse complement of an RNA sequence (A<->U, C<->G).
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|nt| match nt {
            'A' => 'U',
            'U' => 'A',
            'G' => 'C',
            'C' => 'G',
            other => other,
        })
        .collect()
}

/// An mRNA sequence split into its three functional regions.
///
/// `core_sequence` / `len` cover only 5'UTR + CDS + 3'UTR, which is the
/// region used for structure prediction and all scoring metrics. Use
/// [`MrnaSequence::full_sequence`] for the complete molecule including the
/// 5' cap and poly-A tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MrnaSequence {
    utr5: String,
    cds: String,
    utr3: String,
}

impl MrnaSequence {
    /// Build a record from already-clean RNA regions, checking CDS invariants.
    pub fn new(utr5: &str, cds: &str, utr3: &str) -> Result<Self> {
        let utr5 = clean_sequence(utr5)?;
        let cds = clean_sequence(cds)?;
        let utr3 = clean_sequence(utr3)?;

        if !cds.starts_with("AUG") {
            return Err(Error::InvalidInput(format!(
                "CDS does not start with AUG: starts with {}",
                &cds[..cds.len().min(3)]
            )));
        }
        if cds.len() % 3 != 0 {
            return Err(Error::InvalidInput(format!(
                "CDS length ({}) is not divisible by 3",
                cds.len()
            )));
        }
        let last = &cds[cds.len() - 3..];
        if !STOP_CODONS.contains(&last) {
            return Err(Error::InvalidInput(format!(
                "CDS does not end with a stop codon: ends with {}",
                last
            )));
        }

        Ok(MrnaSequence { utr5, cds, utr3 })
    }

    pub fn utr5(&self) -> &str {
        &self.utr5
    }

    pub fn cds(&self) -> &str {
        &self.cds
    }

    pub fn utr3(&self) -> &str {
        &self.utr3
    }

    /// Codons of the CDS, in order.
    pub fn codons(&self) -> impl Iterator<Item = &str> {
        self.cds.as_bytes().chunks(3).map(|c| {
            // CDS length is validated to a multiple of 3 at construction
            std::str::from_utf8(c).expect("CDS is ASCII")
        })
    }

    /// 0-indexed position of the first CDS nucleotide in the core transcript.
    pub fn cds_start(&self) -> usize {
        self.utr5.len()
    }

    /// 0-indexed position one past the last CDS nucleotide.
    pub fn cds_end(&self) -> usize {
        self.utr5.len() + self.cds.len()
    }

    /// Core transcript: 5'UTR + CDS + 3'UTR.
    pub fn core_sequence(&self) -> String {
        let mut s = String::with_capacity(self.len());
        s.push_str(&self.utr5);
        s.push_str(&self.cds);
        s.push_str(&self.utr3);
        s
    }

    /// Complete molecule: 5' cap + core transcript + poly-A tail.
    pub fn full_sequence(&self) -> String {
        let mut s = String::with_capacity(CAP5.len() + self.len() + POLY_A_LENGTH);
        s.push_str(CAP5);
        s.push_str(&self.utr5);
        s.push_str(&self.cds);
        s.push_str(&self.utr3);
        for _ in 0..POLY_A_LENGTH {
            s.push('A');
        }
        s
    }

    /// Length of the core transcript.
    pub fn len(&self) -> usize {
        self.utr5.len() + self.cds.len() + self.utr3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total length including 5' cap and poly-A tail.
    pub fn full_length(&self) -> usize {
        CAP5.len() + self.len() + POLY_A_LENGTH
    }
}
