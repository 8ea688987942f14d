//! 3'UTR miRNA sponge cassette generator.
//!
//! A sponge site is the reverse complement of a mature miRNA with a 4-nt
//! mismatched bulge between the seed match and the 3' match. The bulge
//! prevents Ago2 slicer cleavage so the bound RISC represses translation
//! instead of degrading the transcript.

use crate::error::{Error, Result};
use crate::sequence::{clean_sequence, reverse_complement};

/// Fixed 4-nt spacers inserted between consecutive sponge sites, used
/// cyclically.
pub const SPACERS: [&str; 16] = [
    "aauu", "ucga", "caag", "auac", "gaau", "cuua", "uuca", "agcu", "uacg", "gaua", "cuac", "acuc",
    "uguu", "caua", "ucuu", "agau",
];

/// Synthetic poly-A signal with upstream regulatory elements; sequence
/// derived from empirical mRNA stabilisation constructs.
pub const POLY_A_SIGNAL: &str = "CUCAGGUGCAGGCUGCCUAUCAGAAGGUGGUGGCUGGUGUGGCCAAUGCCCUGGCUCACAAAUACCACUGAGAUC\
UUUUUCCCUCUGCCAAAAAUUAUGGGGACAUCAUGAAGCCCCUUGAGCAUCUGACUUCUGGCUAAUAAAGGAAAU\
UUAUUUUCAUUGCAAUAGUGUGUUGGAAUUUUUUGUGUCUCUCACUCGGAAGGACAUAUGGGAGGGCAAAUCAUU\
UAAAACAUCAGAAUGAGUAUUUGGUUUAGAGUUUGGCA";

const STOP_CODON: &str = "UAA";
const LEAD_IN: &str = "gcauac";
const LEAD_OUT: &str = "gauc";

/// A generated sponge 3'UTR: per-miRNA bulged sites plus the assembled
/// cassette.
#[derive(Debug, Clone)]
pub struct SpongeUtr {
    /// One bulged site per input miRNA, each exactly |miRNA| nt long.
    pub sites: Vec<String>,
    /// Full 3'UTR: stop codon + lead-in + cassette + lead-out + poly-A
    /// signal (RNA, mixed case).
    pub utr3: String,
}

/// Replace every nucleotide with its mismatched partner (A->C, U->G, G->U,
/// C->A).
fn mismatch(seq: &str) -> String {
    seq.chars()
        .map(|nt| match nt {
            'A' => 'C',
            'U' => 'G',
            'G' => 'U',
            'C' => 'A',
            other => other,
        })
        .collect()
}

/// Build one bulged sponge site from a mature miRNA sequence.
///
/// The reverse complement is partitioned into
/// `3'-match | bulge (4 nt) | seed match (8 nt)` and the bulge nucleotides
/// are mismatched.
fn sponge_site(mirna: &str) -> Result<String> {
    let mirna = clean_sequence(mirna)?;
    if mirna.len() < 12 {
        return Err(Error::InvalidInput(format!(
            "miRNA sequence too short ({} nt): '{}'; at least 12 nucleotides \
             are required to form seed, bulge, and 3'-match regions",
            mirna.len(),
            mirna
        )));
    }

    let rc = reverse_complement(&mirna);
    let n = rc.len();
    let seed_match = &rc[n - 8..];
    let bulge = &rc[n - 12..n - 8];
    let three_prime_match = &rc[..n - 12];

    Ok(format!(
        "{}{}{}",
        three_prime_match,
        mismatch(bulge),
        seed_match
    ))
}

/// Generate a 3'UTR with alternating, bulged miRNA sponge sites.
///
/// Sites rotate through the input miRNAs; `num_sites` repeats are separated
/// by the fixed 4-nt [`SPACERS`], then wrapped with the stop codon, lead
/// sequences, and [`POLY_A_SIGNAL`].
pub fn build_sponge(mirna_sequences: &[String], num_sites: usize) -> Result<SpongeUtr> {
    if mirna_sequences.is_empty() {
        return Err(Error::InvalidInput(
            "at least one miRNA sequence is required".into(),
        ));
    }

    let sites: Vec<String> = mirna_sequences
        .iter()
        .map(|m| sponge_site(m))
        .collect::<Result<_>>()?;

    let mut cassette = String::new();
    for i in 0..num_sites {
        cassette.push_str(&sites[i % sites.len()]);
        if i + 1 < num_sites {
            cassette.push_str(SPACERS[i % SPACERS.len()]);
        }
    }

    let utr3 = format!(
        "{}{}{}{}{}",
        STOP_CODON, LEAD_IN, cassette, LEAD_OUT, POLY_A_SIGNAL
    );

    Ok(SpongeUtr { sites, utr3 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIR21_5P: &str = "UAGCUUAUCAGACUGAUGUUGA";
    const MIR122_3P: &str = "AACGCCAUUAUCACACUAAAUA";

    #[test]
    fn test_poly_a_signal_length() {
        assert_eq!(POLY_A_SIGNAL.len(), 263);
    }

    #[test]
    fn test_site_is_mirna_length() {
        let sponge = build_sponge(&[MIR21_5P.to_string()], 1).unwrap();
        assert_eq!(sponge.sites.len(), 1);
        assert_eq!(sponge.sites[0].len(), MIR21_5P.len());
    }

    #[test]
    fn test_seed_match_is_reverse_complement_tail() {
        let sponge = build_sponge(&[MIR21_5P.to_string()], 1).unwrap();
        let rc = reverse_complement(MIR21_5P);
        let site = &sponge.sites[0];
        let n = site.len();
        // seed match (last 8) and 3' match (first n-12) survive untouched
        assert_eq!(&site[n - 8..], &rc[n - 8..]);
        assert_eq!(&site[..n - 12], &rc[..n - 12]);
        // the 4-nt bulge differs at every position
        for (a, b) in site[n - 12..n - 8].chars().zip(rc[n - 12..n - 8].chars()) {
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_cassette_layout_and_total_length() {
        let n_sites = 4;
        let sponge = build_sponge(&[MIR21_5P.to_string()], n_sites).unwrap();

        assert!(sponge.utr3.starts_with("UAA"));
        assert!(sponge.utr3.ends_with(POLY_A_SIGNAL));
        assert_eq!(sponge.utr3.matches(&sponge.sites[0]).count(), n_sites);

        let expected =
            3 + 6 + n_sites * MIR21_5P.len() + (n_sites - 1) * 4 + 4 + POLY_A_SIGNAL.len();
        assert_eq!(sponge.utr3.len(), expected);
    }

    #[test]
    fn test_sites_alternate() {
        let sponge =
            build_sponge(&[MIR122_3P.to_string(), MIR21_5P.to_string()], 4).unwrap();
        assert_eq!(sponge.sites.len(), 2);
        // Each site appears twice in the alternating cassette.
        assert_eq!(sponge.utr3.matches(&sponge.sites[0]).count(), 2);
        assert_eq!(sponge.utr3.matches(&sponge.sites[1]).count(), 2);
    }

    #[test]
    fn test_short_mirna_rejected() {
        let err = build_sponge(&["AUGCAUGCAUG".to_string()], 2);
        assert!(err.is_err());
    }

    #[test]
    fn test_accepts_dna_input() {
        let dna = "TAGCTTATCAGACTGATGTTGA";
        let sponge = build_sponge(&[dna.to_string()], 1).unwrap();
        assert_eq!(sponge.sites[0].len(), dna.len());
        assert!(!sponge.sites[0].contains('T'));
    }
}
