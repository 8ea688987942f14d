//! Variable-length chromosome layout and variation operators.
//!
//! One individual is a fixed-width integer row: gene 0 holds the active
//! 5'UTR length, genes `1..=len` hold nucleotide codes (A=0, C=1, G=2, U=3),
//! and the remaining genes are padding whose values are undefined and must
//! never influence decoding. The fixed width keeps sampling, mutation, and
//! crossover as dense matrix operations; decoding slices by the header so
//! padding cannot leak.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};

/// Bounds and width of the chromosome encoding.
#[derive(Debug, Clone, Copy)]
pub struct ChromosomeLayout {
    pub utr5_min: usize,
    pub utr5_max: usize,
}

impl ChromosomeLayout {
    pub fn new(utr5_min: usize, utr5_max: usize) -> Result<Self> {
        if utr5_min == 0 || utr5_min > utr5_max {
            return Err(Error::InvalidConfig(format!(
                "5'UTR length bounds [{}, {}] are invalid",
                utr5_min, utr5_max
            )));
        }
        Ok(ChromosomeLayout { utr5_min, utr5_max })
    }

    /// Row width: one length gene plus `utr5_max` nucleotide genes.
    pub fn row_width(&self) -> usize {
        self.utr5_max + 1
    }

    pub fn clamp_length(&self, length: i64) -> u16 {
        length.clamp(self.utr5_min as i64, self.utr5_max as i64) as u16
    }
}

/// Sample an initial population matrix of shape `(n_samples, row_width)`.
///
/// Lengths are drawn uniformly from the layout bounds, or, when
/// `initial_length` is given, from a Gaussian centred there with a 10%
/// relative spread, clamped into bounds. Nucleotide genes are uniform.
/// The first `min(seeds.len(), n_samples)` rows are replaced by the supplied
/// seed rows.
pub fn sample(
    layout: &ChromosomeLayout,
    n_samples: usize,
    initial_length: Option<usize>,
    seeds: &[Array1<u16>],
    rng: &mut ChaCha8Rng,
) -> Array2<u16> {
    let width = layout.row_width();
    let mut genes = Array2::<u16>::zeros((n_samples, width));

    let normal = initial_length.map(|init| {
        let mu = init as f64;
        // A degenerate sigma would panic; fall back to the exact length.
        Normal::new(mu, (0.1 * mu).max(f64::MIN_POSITIVE)).expect("finite Gaussian parameters")
    });

    for mut row in genes.rows_mut() {
        row[0] = match &normal {
            Some(dist) => layout.clamp_length(dist.sample(rng).round() as i64),
            None => rng.gen_range(layout.utr5_min..=layout.utr5_max) as u16,
        };
        for gene in row.iter_mut().skip(1) {
            *gene = rng.gen_range(0..4);
        }
    }

    for (i, seed) in seeds.iter().take(n_samples).enumerate() {
        copy_seed_row(layout, seed.view(), genes.row_mut(i));
    }

    genes
}

/// Copy a seed row into a population row, clipping to the layout width and
/// clamping the length gene into bounds. Missing genes keep the sampled
/// values already present in the target row.
fn copy_seed_row(layout: &ChromosomeLayout, seed: ArrayView1<u16>, mut row: ArrayViewMut1<u16>) {
    if seed.is_empty() {
        return;
    }
    row[0] = layout.clamp_length(seed[0] as i64);
    let n = (seed.len() - 1).min(layout.utr5_max);
    for i in 1..=n {
        row[i] = seed[i] & 3;
    }
}

/// Build a chromosome row from encoded nucleotide codes.
///
/// The length gene is the clamped sequence length; codes beyond `utr5_max`
/// are clipped, and padding is zeroed.
pub fn row_from_codes(layout: &ChromosomeLayout, codes: &[u16]) -> Array1<u16> {
    let mut row = Array1::<u16>::zeros(layout.row_width());
    row[0] = layout.clamp_length(codes.len() as i64);
    for (i, &code) in codes.iter().take(layout.utr5_max).enumerate() {
        row[i + 1] = code & 3;
    }
    row
}

/// Per-gene point mutation with a bounded random walk on the length gene.
///
/// Nucleotide genes are independently resampled uniformly with probability
/// `mutation_rate`. The length gene instead takes a uniform step in
/// `[-max_length_delta, +max_length_delta]` with the same probability;
/// resampling the length uniformly would be far too disruptive.
pub fn mutate(
    layout: &ChromosomeLayout,
    genes: &mut Array2<u16>,
    mutation_rate: f64,
    max_length_delta: i64,
    rng: &mut ChaCha8Rng,
) {
    for mut row in genes.rows_mut() {
        if rng.gen::<f64>() < mutation_rate {
            let delta = rng.gen_range(-max_length_delta..=max_length_delta);
            row[0] = layout.clamp_length(row[0] as i64 + delta);
        }
        for gene in row.iter_mut().skip(1) {
            if rng.gen::<f64>() < mutation_rate {
                *gene = rng.gen_range(0..4);
            }
        }
    }
}

/// Uniform crossover over the full row; each gene, the length gene
/// included, is inherited from either parent with probability one half.
pub fn crossover(
    parent_a: ArrayView1<u16>,
    parent_b: ArrayView1<u16>,
    rng: &mut ChaCha8Rng,
) -> (Array1<u16>, Array1<u16>) {
    let mut child_a = parent_a.to_owned();
    let mut child_b = parent_b.to_owned();
    for i in 0..parent_a.len() {
        if rng.gen_bool(0.5) {
            child_a[i] = parent_b[i];
            child_b[i] = parent_a[i];
        }
    }
    (child_a, child_b)
}

/// Two chromosomes are duplicates iff their lengths match and the active
/// nucleotide genes match; padding is ignored.
pub fn rows_duplicate(a: ArrayView1<u16>, b: ArrayView1<u16>) -> bool {
    if a[0] != b[0] {
        return false;
    }
    let len = a[0] as usize;
    (1..=len).all(|i| a[i] == b[i])
}

/// True if `row` duplicates any row of `matrix`.
pub fn duplicates_any(row: ArrayView1<u16>, matrix: &ArrayView2<u16>) -> bool {
    matrix.rows().into_iter().any(|r| rows_duplicate(row, r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn layout() -> ChromosomeLayout {
        ChromosomeLayout::new(4, 20).unwrap()
    }

    #[test]
    fn test_layout_rejects_bad_bounds() {
        assert!(ChromosomeLayout::new(30, 20).is_err());
        assert!(ChromosomeLayout::new(0, 20).is_err());
        assert_eq!(layout().row_width(), 21);
    }

    #[test]
    fn test_sample_respects_bounds() {
        let genes = sample(&layout(), 50, None, &[], &mut rng());
        assert_eq!(genes.shape(), &[50, 21]);
        for row in genes.rows() {
            assert!((4..=20).contains(&(row[0] as usize)));
            assert!(row.iter().skip(1).all(|&g| g < 4));
        }
    }

    #[test]
    fn test_sample_gaussian_lengths_cluster() {
        let genes = sample(&layout(), 200, Some(12), &[], &mut rng());
        let mean: f64 =
            genes.rows().into_iter().map(|r| r[0] as f64).sum::<f64>() / 200.0;
        assert!((mean - 12.0).abs() < 1.5, "mean length {}", mean);
    }

    #[test]
    fn test_sample_injects_seeds() {
        let seed = row_from_codes(&layout(), &[0, 1, 2, 3, 0, 1]);
        let genes = sample(&layout(), 10, None, std::slice::from_ref(&seed), &mut rng());
        assert!(rows_duplicate(genes.row(0), seed.view()));
    }

    #[test]
    fn test_seed_length_is_clamped() {
        let codes = vec![1u16; 50]; // longer than utr5_max
        let row = row_from_codes(&layout(), &codes);
        assert_eq!(row[0], 20);

        let short = row_from_codes(&layout(), &[1, 2]);
        assert_eq!(short[0], 4); // clamped up to utr5_min
    }

    #[test]
    fn test_mutation_rate_zero_is_identity() {
        let mut genes = sample(&layout(), 20, None, &[], &mut rng());
        let before = genes.clone();
        mutate(&layout(), &mut genes, 0.0, 3, &mut rng());
        assert_eq!(genes, before);
    }

    #[test]
    fn test_mutation_length_walk_is_bounded() {
        let layout = ChromosomeLayout::new(4, 100).unwrap();
        let mut genes = sample(&layout, 100, Some(50), &[], &mut rng());
        let before: Vec<u16> = genes.rows().into_iter().map(|r| r[0]).collect();

        // Rate 1.0 forces a length step on every row.
        mutate(&layout, &mut genes, 1.0, 2, &mut rng());

        for (row, &old) in genes.rows().into_iter().zip(&before) {
            let delta = (row[0] as i64 - old as i64).abs();
            assert!(delta <= 2, "length moved by {}", delta);
            assert!((4..=100).contains(&(row[0] as usize)));
        }
    }

    #[test]
    fn test_mutation_clamps_at_bounds() {
        let layout = ChromosomeLayout::new(4, 6).unwrap();
        let mut genes = Array2::<u16>::zeros((10, layout.row_width()));
        for mut row in genes.rows_mut() {
            row[0] = 6;
        }
        mutate(&layout, &mut genes, 1.0, 5, &mut rng());
        for row in genes.rows() {
            assert!((4..=6).contains(&(row[0] as usize)));
        }
    }

    #[test]
    fn test_crossover_mixes_genes() {
        let layout = layout();
        let a = row_from_codes(&layout, &[0; 20]);
        let b = row_from_codes(&layout, &[3; 20]);
        let (child_a, child_b) = crossover(a.view(), b.view(), &mut rng());

        // Every gene of each child comes from one of the parents.
        for i in 0..a.len() {
            assert!(child_a[i] == a[i] || child_a[i] == b[i]);
            // Swapped pairs: the two children partition the parents' genes.
            assert_eq!(child_a[i] + child_b[i], a[i] + b[i]);
        }
    }

    #[test]
    fn test_duplicate_detection_ignores_padding() {
        let layout = layout();
        let mut a = row_from_codes(&layout, &[0, 1, 2, 3]);
        let mut b = a.clone();
        // Different padding, same active genes.
        a[10] = 3;
        b[10] = 1;
        assert!(rows_duplicate(a.view(), b.view()));

        // Different active gene breaks the duplicate.
        b[2] = (b[2] + 1) & 3;
        assert!(!rows_duplicate(a.view(), b.view()));

        // Different length breaks the duplicate.
        let mut c = a.clone();
        c[0] = 5;
        assert!(!rows_duplicate(a.view(), c.view()));
    }
}
