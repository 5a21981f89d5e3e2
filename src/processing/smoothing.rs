//! Savitzky–Golay smoothing.
//!
//! Each output point is the value at that point of a degree-P polynomial
//! least-squares fitted over an L-point window. Points within `L/2` of either
//! end use the polynomial fitted to the first (or last) full window,
//! evaluated at the point's offset, so the output keeps the input length and
//! no padding values are invented.

use super::ProcessingError;

/// Smooth `data` with window length `window` and polynomial order `polyorder`.
///
/// Fails when `window` is even or not smaller than `data.len()`, or when
/// `polyorder >= window`.
pub fn savgol_filter(
    data: &[f64],
    window: usize,
    polyorder: usize,
) -> Result<Vec<f64>, ProcessingError> {
    let n = data.len();
    if window % 2 == 0 || window >= n {
        return Err(ProcessingError::InvalidSmoothingWindow { window, len: n });
    }
    if polyorder >= window {
        return Err(ProcessingError::InvalidPolyOrder {
            order: polyorder,
            window,
        });
    }

    let half = window / 2;
    let mut out = vec![0.0; n];

    let centre = savgol_coefficients(window, polyorder, 0)?;
    for i in half..n - half {
        out[i] = dot(&centre, &data[i - half..i + half + 1]);
    }

    let head = &data[..window];
    let tail = &data[n - window..];
    for k in 0..half {
        // Offsets -half..-1 relative to the first window's centre
        let left = savgol_coefficients(window, polyorder, k as isize - half as isize)?;
        out[k] = dot(&left, head);

        // Offsets 1..=half relative to the last window's centre
        let right = savgol_coefficients(window, polyorder, (k + 1) as isize)?;
        out[n - half + k] = dot(&right, tail);
    }

    Ok(out)
}

/// Weights that evaluate, at offset `at` from the window centre, the
/// degree-`polyorder` least-squares fit over `window` equally spaced points.
///
/// `at = 0` gives the classic centred smoothing kernel.
pub fn savgol_coefficients(
    window: usize,
    polyorder: usize,
    at: isize,
) -> Result<Vec<f64>, ProcessingError> {
    if polyorder >= window {
        return Err(ProcessingError::InvalidPolyOrder {
            order: polyorder,
            window,
        });
    }

    let half = (window / 2) as f64;
    // Positions scaled into [-1, 1] keep the normal equations well conditioned
    let scale = if half > 0.0 { half } else { 1.0 };
    let xs: Vec<f64> = (0..window)
        .map(|j| (j as f64 - half) / scale)
        .collect();
    let t = at as f64 / scale;
    let m = polyorder + 1;

    // Normal equations (AᵀA) y = v, with A[j][k] = x_j^k and v[k] = t^k
    let mut normal = vec![vec![0.0; m]; m];
    for (r, row) in normal.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = xs.iter().map(|x| x.powi((r + c) as i32)).sum();
        }
    }
    let rhs: Vec<f64> = (0..m).map(|k| t.powi(k as i32)).collect();

    let y = solve(normal, rhs).ok_or(ProcessingError::InvalidPolyOrder {
        order: polyorder,
        window,
    })?;

    Ok(xs
        .iter()
        .map(|x| {
            y.iter()
                .enumerate()
                .map(|(k, yk)| yk * x.powi(k as i32))
                .sum()
        })
        .collect())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting. None if singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
