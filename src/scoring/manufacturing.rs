//! Manufacturability checks for DNA template synthesis.

use crate::sequence::{reverse_complement, MrnaSequence};

/// Common restriction enzyme recognition sites to avoid (RNA alphabet).
pub const RESTRICTION_SITES: [(&str, &str); 6] = [
    ("BsaI", "GGUCUC"),
    ("BsmBI", "CGUCUC"),
    ("EcoRI", "GAAUUC"),
    ("BamHI", "GGAUCC"),
    ("HindIII", "AAGCUU"),
    ("NotI", "GCGGCCGC"),
];

/// GC-content sliding window length.
pub const GC_WINDOW: usize = 50;
/// Acceptable GC fraction range per window.
pub const GC_MIN: f64 = 0.30;
pub const GC_MAX: f64 = 0.70;
/// Longest tolerated homopolymer run.
pub const MAX_HOMOPOLYMER: usize = 8;

#[derive(Debug, Clone)]
pub struct GcViolation {
    pub position: usize,
    pub gc_fraction: f64,
    pub too_high: bool,
}

#[derive(Debug, Clone)]
pub struct GcWindows {
    pub violations: Vec<GcViolation>,
    pub windows_checked: usize,
}

/// Check GC content in sliding windows across the sequence.
///
/// Overlapping out-of-range windows are deduplicated at window stride: after
/// a violation is recorded, further violations are ignored until a full
/// window has passed.
pub fn check_gc_windows(seq: &str) -> GcWindows {
    let bytes = seq.as_bytes();

    if bytes.len() < GC_WINDOW {
        if bytes.is_empty() {
            return GcWindows {
                violations: Vec::new(),
                windows_checked: 0,
            };
        }
        let gc = bytes.iter().filter(|&&b| b == b'G' || b == b'C').count() as f64
            / bytes.len() as f64;
        let violations = if (GC_MIN..=GC_MAX).contains(&gc) {
            Vec::new()
        } else {
            vec![GcViolation {
                position: 0,
                gc_fraction: gc,
                too_high: gc > GC_MAX,
            }]
        };
        return GcWindows {
            violations,
            windows_checked: 1,
        };
    }

    // Prefix sums of GC counts: windows are O(1) lookups.
    let mut cumsum = vec![0u32; bytes.len() + 1];
    for (i, &b) in bytes.iter().enumerate() {
        cumsum[i + 1] = cumsum[i] + u32::from(b == b'G' || b == b'C');
    }

    let n_windows = bytes.len() - GC_WINDOW + 1;
    let mut violations = Vec::new();
    let mut last_pos = -(GC_WINDOW as i64);

    for i in 0..n_windows {
        let gc = (cumsum[i + GC_WINDOW] - cumsum[i]) as f64 / GC_WINDOW as f64;
        if (gc < GC_MIN || gc > GC_MAX) && i as i64 - last_pos >= GC_WINDOW as i64 {
            violations.push(GcViolation {
                position: i,
                gc_fraction: gc,
                too_high: gc > GC_MAX,
            });
            last_pos = i as i64;
        }
    }

    GcWindows {
        violations,
        windows_checked: n_windows,
    }
}

#[derive(Debug, Clone)]
pub struct HomopolymerRun {
    pub position: usize,
    pub nucleotide: char,
    pub length: usize,
}

/// Find homopolymer runs longer than [`MAX_HOMOPOLYMER`].
pub fn check_homopolymers(seq: &str) -> Vec<HomopolymerRun> {
    let bytes = seq.as_bytes();
    let mut runs = Vec::new();

    let mut start = 0;
    while start < bytes.len() {
        let nt = bytes[start];
        let mut end = start + 1;
        while end < bytes.len() && bytes[end] == nt {
            end += 1;
        }
        if end - start > MAX_HOMOPOLYMER {
            runs.push(HomopolymerRun {
                position: start,
                nucleotide: nt as char,
                length: end - start,
            });
        }
        start = end;
    }

    runs
}

#[derive(Debug, Clone)]
pub struct RestrictionHit {
    pub position: usize,
    pub enzyme: &'static str,
    pub site: String,
    pub reverse_strand: bool,
}

/// Scan for restriction enzyme recognition sites on both strands.
///
/// Palindromic sites are skipped on the reverse strand since the forward
/// scan already found them.
pub fn check_restriction_sites(seq: &str) -> Vec<RestrictionHit> {
    let mut hits = Vec::new();

    for (enzyme, site) in RESTRICTION_SITES {
        for (position, _) in seq.match_indices(site) {
            hits.push(RestrictionHit {
                position,
                enzyme,
                site: site.to_string(),
                reverse_strand: false,
            });
        }

        let rc = reverse_complement(site);
        if rc != site {
            for (position, _) in seq.match_indices(rc.as_str()) {
                hits.push(RestrictionHit {
                    position,
                    enzyme,
                    site: rc.clone(),
                    reverse_strand: true,
                });
            }
        }
    }

    hits
}

/// Count upstream AUGs in the 5'UTR. Each one opens a potential uORF that
/// competes with the main open reading frame for initiating ribosomes.
pub fn count_uorfs(utr5: &str) -> usize {
    utr5.match_indices("AUG").count()
}

/// Aggregated manufacturability report.
#[derive(Debug, Clone)]
pub struct ManufacturingScores {
    pub gc_windows: GcWindows,
    pub homopolymers: Vec<HomopolymerRun>,
    pub restriction_sites: Vec<RestrictionHit>,
    pub uorfs: usize,
    /// Violations over the full core transcript.
    pub total_violations: usize,
    /// Violations within the 5'UTR only, the region the optimiser actually
    /// controls. This count feeds the fitness normaliser.
    pub utr5_violations: usize,
    pub overall_pass: bool,
}

/// Run all manufacturability checks on a parsed mRNA.
pub fn score_manufacturing(seq: &MrnaSequence) -> ManufacturingScores {
    let core = seq.core_sequence();

    let gc_windows = check_gc_windows(&core);
    let homopolymers = check_homopolymers(&core);
    let restriction_sites = check_restriction_sites(&core);
    let total_violations =
        gc_windows.violations.len() + homopolymers.len() + restriction_sites.len();

    let utr5 = seq.utr5();
    let utr5_violations = if utr5.is_empty() {
        0
    } else {
        check_gc_windows(utr5).violations.len()
            + check_homopolymers(utr5).len()
            + check_restriction_sites(utr5).len()
    };

    ManufacturingScores {
        gc_windows,
        homopolymers,
        restriction_sites,
        uorfs: count_uorfs(utr5),
        total_violations,
        utr5_violations,
        overall_pass: total_violations == 0,
    }
}
