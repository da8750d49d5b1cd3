//! 2-D layout of a small token set for display.
//!
//! The pipeline is: center every dimension, find the two principal
//! components, project onto them, then min-max scale each axis into
//! `[-1, 1]` independently.
//!
//! Inputs are small (a query plus its neighbours), so the components are
//! taken from the `n × n` Gram matrix of the centered rows rather than the
//! `d × d` covariance matrix. Its eigenvectors, scaled by the square root of
//! their eigenvalues, are exactly the PCA scores. The eigen-decomposition is
//! a cyclic Jacobi sweep, which is exact and deterministic for symmetric
//! matrices of this size.
//!
//! Coordinates are only meaningful relative to the rest of the set they
//! were projected with.

/// A point in the output layout, each coordinate in `[-1, 1]`.
pub type Point = [f32; 2];

const MAX_SWEEPS: usize = 64;

/// Eigenvalues this small relative to the largest are treated as zero
/// variance, so round-off never gets stretched across the output range.
const RELATIVE_VARIANCE_FLOOR: f64 = 1e-9;

/// Project `vectors` onto their first two principal components and scale
/// each axis into `[-1, 1]`.
///
/// Fewer than two inputs, or inputs that are all identical, map every point
/// to the origin. An axis with no spread maps to `0` on that axis.
pub fn project<V: AsRef<[f32]>>(vectors: &[V]) -> Vec<Point> {
    let scores = principal_scores(vectors);
    let xs = min_max_scale(scores.iter().map(|p| p[0]));
    let ys = min_max_scale(scores.iter().map(|p| p[1]));
    xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect()
}

/// Unscaled coordinates of every input on the first two principal
/// components.
pub fn principal_scores<V: AsRef<[f32]>>(vectors: &[V]) -> Vec<[f64; 2]> {
    let n = vectors.len();
    if n < 2 {
        return vec![[0.0, 0.0]; n];
    }
    let dim = vectors[0].as_ref().len();

    let mut mean = vec![0.0f64; dim];
    for v in vectors {
        for (m, &x) in mean.iter_mut().zip(v.as_ref()) {
            *m += x as f64;
        }
    }
    for m in mean.iter_mut() {
        *m /= n as f64;
    }

    let centered: Vec<Vec<f64>> = vectors
        .iter()
        .map(|v| {
            v.as_ref()
                .iter()
                .zip(&mean)
                .map(|(&x, m)| x as f64 - m)
                .collect()
        })
        .collect();

    let mut gram = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in i..n {
            let dot: f64 = centered[i]
                .iter()
                .zip(&centered[j])
                .map(|(a, b)| a * b)
                .sum();
            gram[i][j] = dot;
            gram[j][i] = dot;
        }
    }

    // Identical inputs leave nothing but round-off after centering.
    let total_variance: f64 = (0..n).map(|i| gram[i][i]).sum();
    let magnitude: f64 = vectors
        .iter()
        .flat_map(|v| v.as_ref().iter())
        .map(|&x| (x as f64) * (x as f64))
        .sum();
    if total_variance <= f64::EPSILON * magnitude {
        return vec![[0.0, 0.0]; n];
    }

    let (eigenvalues, eigenvectors) = jacobi_eigen(gram);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
    let largest = eigenvalues[order[0]].max(0.0);

    let mut scores = vec![[0.0f64; 2]; n];
    for (axis, &k) in order.iter().take(2).enumerate() {
        let lambda = eigenvalues[k];
        if lambda <= RELATIVE_VARIANCE_FLOOR * largest {
            continue;
        }
        let scale = lambda.sqrt();

        // Deterministic sign: the largest-magnitude score is positive.
        let pivot = (0..n)
            .max_by(|&a, &b| eigenvectors[a][k].abs().total_cmp(&eigenvectors[b][k].abs()))
            .unwrap_or(0);
        let sign = if eigenvectors[pivot][k] < 0.0 { -1.0 } else { 1.0 };

        for (i, point) in scores.iter_mut().enumerate() {
            point[axis] = sign * eigenvectors[i][k] * scale;
        }
    }
    scores
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns the eigenvalues and a matrix whose column `k` is the unit
/// eigenvector for eigenvalue `k`.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v = vec![vec![0.0f64; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let norm_sq: f64 = a.iter().flatten().map(|x| x * x).sum();
    let tolerance = f64::EPSILON * f64::EPSILON * norm_sq;

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off <= tolerance {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }

                let tau = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                // A <- A J
                for row in a.iter_mut() {
                    let (rp, rq) = (row[p], row[q]);
                    row[p] = c * rp - s * rq;
                    row[q] = s * rp + c * rq;
                }
                // A <- J^T A
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                a[p][q] = 0.0;
                a[q][p] = 0.0;

                for row in v.iter_mut() {
                    let (rp, rq) = (row[p], row[q]);
                    row[p] = c * rp - s * rq;
                    row[q] = s * rp + c * rq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

/// Rescale values into `[-1, 1]` with `-1 + 2 * (x - min) / (max - min)`.
/// When every value is the same the whole axis maps to `0`.
pub fn min_max_scale(values: impl Iterator<Item = f64> + Clone) -> Vec<f32> {
    let (min, max) = values
        .clone()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });

    if max == min {
        return values.map(|_| 0.0).collect();
    }

    let range = max - min;
    values
        .map(|x| (-1.0 + 2.0 * (x - min) / range).clamp(-1.0, 1.0) as f32)
        .collect()
}
