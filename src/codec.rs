//! Nucleotide codec: chromosome rows and the oracle input tensor.
//!
//! Two integer alphabets coexist and must not be confused:
//!
//! * the **optimiser code** used in chromosome rows (A=0, C=1, G=2, U=3), and
//! * the **oracle channel** used in the one-hot input tensor
//!   (A=0, T/U=1, C=2, G=3).
//!
//! [`OPT_TO_ORACLE`] maps the former onto the latter. The oracle geometry is
//! fixed: the 5'UTR is right-aligned inside a 1381-column pad, the CDS+3'UTR
//! follows for up to 11937 columns, and channel 4 flags the first nucleotide
//! of every CDS codon.

use ndarray::{Array3, ArrayView1};

use crate::error::{Error, Result};
use crate::sequence::{KOZAK, MrnaSequence};

/// Optimiser nucleotide alphabet, indexed by gene value.
pub const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'U'];

/// Optimiser code -> oracle one-hot channel.
pub const OPT_TO_ORACLE: [usize; 4] = [0, 2, 3, 1];

/// Maximum 5'UTR length the oracle encoding supports.
pub const ORACLE_UTR5_MAX: usize = 1381;

/// Maximum CDS + 3'UTR length the oracle encoding supports.
pub const ORACLE_CDS_UTR3_MAX: usize = 11937;

/// Total padded width of the oracle input tensor.
pub const ORACLE_WIDTH: usize = ORACLE_UTR5_MAX + ORACLE_CDS_UTR3_MAX;

/// Channels: 4 one-hot nucleotide channels + 1 codon-start channel.
pub const ORACLE_CHANNELS: usize = 5;

/// ASCII byte -> oracle channel. Unknown bytes map to -1.
const BYTE_TO_CHANNEL: [i8; 256] = build_byte_lut();

const fn build_byte_lut() -> [i8; 256] {
    let mut lut = [-1i8; 256];
    lut[b'A' as usize] = 0;
    lut[b'a' as usize] = 0;
    lut[b'T' as usize] = 1;
    lut[b't' as usize] = 1;
    lut[b'U' as usize] = 1;
    lut[b'u' as usize] = 1;
    lut[b'C' as usize] = 2;
    lut[b'c' as usize] = 2;
    lut[b'G' as usize] = 3;
    lut[b'g' as usize] = 3;
    lut
}

/// Encode a nucleotide string into optimiser codes (A=0, C=1, G=2, U=3).
///
/// DNA thymine is accepted and mapped to U.
pub fn encode_utr5(seq: &str) -> Result<Vec<u16>> {
    seq.chars()
        .map(|ch| match ch.to_ascii_uppercase() {
            'A' => Ok(0),
            'C' => Ok(1),
            'G' => Ok(2),
            'U' | 'T' => Ok(3),
            other => Err(Error::InvalidInput(format!(
                "cannot encode nucleotide '{}'",
                other
            ))),
        })
        .collect()
}

/// Active 5'UTR length stored in a chromosome row's header gene.
pub fn row_length(row: ArrayView1<u16>) -> usize {
    row[0] as usize
}

/// Decode the active nucleotide genes of a chromosome row to a 5'UTR string.
///
/// Only indices `1..=length` are read; padding beyond the active length never
/// affects the output.
pub fn decode_utr5(row: ArrayView1<u16>) -> String {
    let len = row_length(row);
    (1..=len)
        .map(|i| NUCLEOTIDES[(row[i] as usize) & 3])
        .collect()
}

/// Decode a chromosome row into a full mRNA record.
///
/// The decoded transcript is `nt(1..=len) + KOZAK + cds + utr3`; the Kozak
/// consensus sits immediately upstream of the start codon and is never
/// evolved.
pub fn decode_mrna(row: ArrayView1<u16>, cds: &str, utr3: &str) -> Result<MrnaSequence> {
    let mut utr5 = decode_utr5(row);
    utr5.push_str(KOZAK);
    MrnaSequence::new(&utr5, cds, utr3)
}

/// A batch of oracle inputs: one `(5, 13318)` plane per sequence.
///
/// The tensor is a single contiguous allocation so the accelerator adapter
/// can stage it for transfer without re-layout. Rows whose sequence exceeds
/// either length budget stay all-zero and are flagged in `valid`; their
/// prediction is substituted with the null result downstream.
pub struct OracleBatch {
    pub tensor: Array3<f32>,
    pub valid: Vec<bool>,
}

impl OracleBatch {
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}

/// Vectorised batch encoder for the oracle.
///
/// Writes one-hot nucleotides and the codon-start mask directly into a
/// pre-allocated `(N, 5, 13318)` float tensor via the byte lookup table.
pub fn encode_batch(sequences: &[MrnaSequence]) -> OracleBatch {
    let n = sequences.len();
    let mut tensor = Array3::<f32>::zeros((n, ORACLE_CHANNELS, ORACLE_WIDTH));
    let mut valid = vec![true; n];

    for (i, seq) in sequences.iter().enumerate() {
        let utr5 = seq.utr5().as_bytes();
        let cds_len = seq.cds().len();
        let tail_len = cds_len + seq.utr3().len();

        if utr5.len() > ORACLE_UTR5_MAX || tail_len > ORACLE_CDS_UTR3_MAX {
            valid[i] = false;
            continue;
        }

        let mut plane = tensor.index_axis_mut(ndarray::Axis(0), i);
        let pad_offset = ORACLE_UTR5_MAX - utr5.len();

        let mut ok = true;
        for (pos, &byte) in utr5.iter().enumerate() {
            let ch = BYTE_TO_CHANNEL[byte as usize];
            if ch < 0 {
                ok = false;
                break;
            }
            plane[[ch as usize, pad_offset + pos]] = 1.0;
        }
        if ok {
            for (pos, &byte) in seq
                .cds()
                .as_bytes()
                .iter()
                .chain(seq.utr3().as_bytes())
                .enumerate()
            {
                let ch = BYTE_TO_CHANNEL[byte as usize];
                if ch < 0 {
                    ok = false;
                    break;
                }
                plane[[ch as usize, ORACLE_UTR5_MAX + pos]] = 1.0;
            }
        }

        if !ok {
            plane.fill(0.0);
            valid[i] = false;
            continue;
        }

        // Codon-start channel: every third position across the CDS.
        let mut k = 0;
        while k + 3 <= cds_len {
            plane[[4, ORACLE_UTR5_MAX + k]] = 1.0;
            k += 3;
        }
    }

    OracleBatch { tensor, valid }
}
