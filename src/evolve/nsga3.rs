//! Reference-direction survival (Deb & Jain 2014).
//!
//! NSGA-III replaces crowding distance with association to a fixed set of
//! reference directions on the unit simplex: non-dominated sorting decides
//! which fronts survive whole, and the splitting front is filled by niching:
//! repeatedly taking a member for the reference direction with the lowest
//! niche count. All tie-breaks here are deterministic (smallest perpendicular
//! distance, then smallest index) so a seeded run reproduces exactly.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Das-Dennis simplex lattice partitions used for the reference set.
pub const N_PARTITIONS: usize = 3;

/// Generate the Das-Dennis reference directions for `n_obj` objectives.
///
/// All points with coordinates `k / n_partitions` (k non-negative integers
/// summing to `n_partitions`), enumerated lexicographically. Computed once
/// at algorithm construction and never mutated.
pub fn reference_directions(n_obj: usize, n_partitions: usize) -> Array2<f64> {
    let mut points: Vec<Vec<f64>> = Vec::new();
    let mut current = vec![0usize; n_obj];
    fill_directions(n_obj, n_partitions, 0, n_partitions, &mut current, &mut points);

    let mut dirs = Array2::<f64>::zeros((points.len(), n_obj));
    for (i, p) in points.iter().enumerate() {
        for (j, &v) in p.iter().enumerate() {
            dirs[[i, j]] = v;
        }
    }
    dirs
}

fn fill_directions(
    n_obj: usize,
    n_partitions: usize,
    index: usize,
    remaining: usize,
    current: &mut Vec<usize>,
    out: &mut Vec<Vec<f64>>,
) {
    if index == n_obj - 1 {
        current[index] = remaining;
        out.push(
            current
                .iter()
                .map(|&k| k as f64 / n_partitions as f64)
                .collect(),
        );
        return;
    }
    for k in (0..=remaining).rev() {
        current[index] = k;
        fill_directions(n_obj, n_partitions, index + 1, remaining - k, current, out);
    }
}

/// True if objective vector `a` Pareto-dominates `b` (minimisation).
pub fn dominates(a: ArrayView1<f64>, b: ArrayView1<f64>) -> bool {
    let mut strictly_better = false;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Fast non-dominated sort. Returns fronts as index lists, best first.
pub fn fast_non_dominated_sort(objectives: ArrayView2<f64>) -> Vec<Vec<usize>> {
    let n = objectives.nrows();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(objectives.row(i), objectives.row(j)) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(objectives.row(j), objectives.row(i)) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(std::mem::take(&mut current));
        current = next;
    }

    fronts
}

/// Survival outcome: which rows survive, plus the rank and final niche count
/// of each survivor (used by tournament selection).
#[derive(Debug, Clone)]
pub struct SurvivalResult {
    /// Indices into the input objective matrix, in selection order.
    pub selected: Vec<usize>,
    /// Non-domination rank per survivor.
    pub rank: Vec<usize>,
    /// Niche count of the reference direction owning each survivor.
    pub niche_count: Vec<usize>,
}

/// Perpendicular distance from point `p` to the ray through direction `w`.
fn perpendicular_distance(p: ArrayView1<f64>, w: ArrayView1<f64>) -> f64 {
    let ww: f64 = w.dot(&w);
    if ww <= f64::EPSILON {
        return p.dot(&p).sqrt();
    }
    let t = p.dot(&w) / ww;
    let mut dist2 = 0.0;
    for (&pi, &wi) in p.iter().zip(w.iter()) {
        let d = pi - t * wi;
        dist2 += d * d;
    }
    dist2.sqrt()
}

/// Normalise the pooled objectives onto the unit simplex.
///
/// Translate by the ideal point, find extreme points via the achievement
/// scalarising function, and divide by the hyperplane intercepts. Falls back
/// to the nadir spread when the hyperplane is degenerate.
fn normalize(objectives: ArrayView2<f64>, members: &[usize]) -> Array2<f64> {
    let n_obj = objectives.ncols();

    let mut ideal = Array1::<f64>::from_elem(n_obj, f64::INFINITY);
    let mut nadir = Array1::<f64>::from_elem(n_obj, f64::NEG_INFINITY);
    for &i in members {
        for j in 0..n_obj {
            ideal[j] = ideal[j].min(objectives[[i, j]]);
            nadir[j] = nadir[j].max(objectives[[i, j]]);
        }
    }

    // Extreme point per axis: minimiser of the ASF with axis weights.
    let mut extremes: Vec<usize> = Vec::with_capacity(n_obj);
    for axis in 0..n_obj {
        let mut best = members[0];
        let mut best_asf = f64::INFINITY;
        for &i in members {
            let mut asf = f64::NEG_INFINITY;
            for j in 0..n_obj {
                let w = if j == axis { 1.0 } else { 1e-6 };
                asf = asf.max((objectives[[i, j]] - ideal[j]) / w);
            }
            if asf < best_asf {
                best_asf = asf;
                best = i;
            }
        }
        extremes.push(best);
    }

    // Intercepts of the hyperplane through the extreme points.
    let mut matrix = Array2::<f64>::zeros((n_obj, n_obj));
    for (r, &e) in extremes.iter().enumerate() {
        for j in 0..n_obj {
            matrix[[r, j]] = objectives[[e, j]] - ideal[j];
        }
    }
    let intercepts = solve_unit_rhs(matrix).and_then(|plane| {
        let mut intercepts = Array1::<f64>::zeros(n_obj);
        for j in 0..n_obj {
            if plane[j].abs() <= f64::EPSILON {
                return None;
            }
            intercepts[j] = 1.0 / plane[j];
            if intercepts[j] <= 1e-9 || !intercepts[j].is_finite() {
                return None;
            }
        }
        Some(intercepts)
    });

    let span = intercepts.unwrap_or_else(|| {
        let mut span = &nadir - &ideal;
        span.mapv_inplace(|v| if v <= 1e-12 { 1.0 } else { v });
        span
    });

    let mut normalized = Array2::<f64>::zeros(objectives.raw_dim());
    for &i in members {
        for j in 0..n_obj {
            normalized[[i, j]] = (objectives[[i, j]] - ideal[j]) / span[j];
        }
    }
    normalized
}

/// Solve `A x = 1` by Gaussian elimination with partial pivoting.
fn solve_unit_rhs(mut a: Array2<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut b = Array1::<f64>::ones(n);

    for col in 0..n {
        let pivot = (col..n).max_by(|&p, &q| {
            a[[p, col]]
                .abs()
                .partial_cmp(&a[[q, col]].abs())
                .expect("finite pivots")
        })?;
        if a[[pivot, col]].abs() <= 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                a.swap([pivot, j], [col, j]);
            }
            b.swap(pivot, col);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for j in (row + 1)..n {
            sum -= a[[row, j]] * x[j];
        }
        x[row] = sum / a[[row, row]];
    }
    Some(x)
}

/// NSGA-III survival: keep `n_survive` rows of the pooled objective matrix.
///
/// Whole fronts are taken while they fit; the splitting front is filled by
/// reference-direction niching. Returns rank and niche-count information for
/// the survivors so selection can run tournaments on them.
pub fn survive(
    objectives: ArrayView2<f64>,
    ref_dirs: ArrayView2<f64>,
    n_survive: usize,
) -> SurvivalResult {
    let n = objectives.nrows();
    let n_survive = n_survive.min(n);
    if n_survive == 0 {
        return SurvivalResult {
            selected: Vec::new(),
            rank: Vec::new(),
            niche_count: Vec::new(),
        };
    }
    let fronts = fast_non_dominated_sort(objectives);

    let mut rank_of = vec![0usize; n];
    for (r, front) in fronts.iter().enumerate() {
        for &i in front {
            rank_of[i] = r;
        }
    }

    // Take whole fronts while they fit.
    let mut survivors: Vec<usize> = Vec::with_capacity(n_survive);
    let mut splitting: Vec<usize> = Vec::new();
    for front in &fronts {
        if survivors.len() + front.len() <= n_survive {
            survivors.extend_from_slice(front);
        } else {
            splitting = front.clone();
            break;
        }
    }

    let mut considered: Vec<usize> = survivors.clone();
    considered.extend_from_slice(&splitting);

    // Associate every considered member with its closest reference direction.
    let normalized = normalize(objectives, &considered);
    let n_dirs = ref_dirs.nrows();
    let mut assoc_dir = vec![0usize; n];
    let mut assoc_dist = vec![0.0f64; n];
    for &i in &considered {
        let point = normalized.row(i);
        let mut best_dir = 0;
        let mut best_dist = f64::INFINITY;
        for d in 0..n_dirs {
            let dist = perpendicular_distance(point, ref_dirs.row(d));
            if dist < best_dist {
                best_dist = dist;
                best_dir = d;
            }
        }
        assoc_dir[i] = best_dir;
        assoc_dist[i] = best_dist;
    }

    let mut niche_count = vec![0usize; n_dirs];
    for &i in &survivors {
        niche_count[assoc_dir[i]] += 1;
    }

    // Niching over the splitting front.
    let mut remaining: Vec<usize> = splitting;
    while survivors.len() < n_survive && !remaining.is_empty() {
        // Directions that still have candidates, lowest niche count first.
        let mut candidate_dirs: Vec<usize> = remaining.iter().map(|&i| assoc_dir[i]).collect();
        candidate_dirs.sort_unstable();
        candidate_dirs.dedup();
        let min_dir = candidate_dirs
            .into_iter()
            .min_by_key(|&d| (niche_count[d], d))
            .expect("remaining is non-empty");

        // Closest remaining member of that niche; ties on distance fall to
        // the smallest index.
        let (pos, &pick) = remaining
            .iter()
            .enumerate()
            .filter(|(_, &i)| assoc_dir[i] == min_dir)
            .min_by(|(_, &a), (_, &b)| {
                assoc_dist[a]
                    .partial_cmp(&assoc_dist[b])
                    .expect("finite distances")
                    .then(a.cmp(&b))
            })
            .expect("niche has a candidate");

        survivors.push(pick);
        niche_count[min_dir] += 1;
        remaining.swap_remove(pos);
    }

    let rank = survivors.iter().map(|&i| rank_of[i]).collect();
    let niche = survivors.iter().map(|&i| niche_count[assoc_dir[i]]).collect();

    SurvivalResult {
        selected: survivors,
        rank,
        niche_count: niche,
    }
}
