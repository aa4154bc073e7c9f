//! Dense square linear solve with partial pivoting.

use tracing::trace;

use crate::{CalibrationError, CalibrationResult};

/// A pivot smaller than this fraction of the largest matrix entry is treated
/// as zero and the system reported singular.
pub const SINGULAR_PIVOT_RATIO: f64 = 1e-12;

/// Square system `A·x = b`, `A` stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSystem {
    n: usize,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl DenseSystem {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            a: vec![0.0; n * n],
            b: vec![0.0; n],
        }
    }

    pub fn from_rows(rows: &[Vec<f64>], rhs: &[f64]) -> CalibrationResult<Self> {
        let n = rows.len();
        if rhs.len() != n {
            return Err(CalibrationError::Dimension {
                what: format!("{n} rows but {} right-hand values", rhs.len()),
            });
        }
        let mut system = Self::zeros(n);
        for (i, row) in rows.iter().enumerate() {
            system.set_row(i, row, rhs[i])?;
        }
        Ok(system)
    }

    pub fn set_row(&mut self, i: usize, coefficients: &[f64], rhs: f64) -> CalibrationResult<()> {
        if i >= self.n || coefficients.len() != self.n {
            return Err(CalibrationError::Dimension {
                what: format!(
                    "row {i} with {} entries in a {n}x{n} system",
                    coefficients.len(),
                    n = self.n
                ),
            });
        }
        self.a[i * self.n..(i + 1) * self.n].copy_from_slice(coefficients);
        self.b[i] = rhs;
        Ok(())
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.n + col]
    }
}

/// Solve `A·x = b` by Gaussian elimination with partial pivoting.
///
/// Consumes the system (elimination happens in place). Fails with
/// [`CalibrationError::SingularSystem`] instead of producing non-finite
/// values.
pub fn solve_dense(mut system: DenseSystem) -> CalibrationResult<Vec<f64>> {
    let n = system.n;
    if n == 0 {
        return Err(CalibrationError::Dimension {
            what: "empty system".to_string(),
        });
    }

    let scale = system.a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !scale.is_finite() || scale == 0.0 {
        return Err(CalibrationError::SingularSystem { column: 0 });
    }
    let threshold = SINGULAR_PIVOT_RATIO * scale;

    for k in 0..n {
        let (pivot_row, pivot) = (k..n)
            .map(|i| (i, system.at(i, k)))
            .max_by(|(_, x), (_, y)| x.abs().total_cmp(&y.abs()))
            .unwrap_or((k, 0.0));
        if pivot.abs() <= threshold {
            return Err(CalibrationError::SingularSystem { column: k });
        }
        trace!(column = k, pivot_row, pivot, "pivot selected");

        if pivot_row != k {
            for col in 0..n {
                system.a.swap(k * n + col, pivot_row * n + col);
            }
            system.b.swap(k, pivot_row);
        }

        for i in (k + 1)..n {
            let factor = system.at(i, k) / pivot;
            if factor == 0.0 {
                continue;
            }
            for col in k..n {
                system.a[i * n + col] -= factor * system.a[k * n + col];
            }
            system.b[i] -= factor * system.b[k];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = ((i + 1)..n).map(|j| system.at(i, j) * x[j]).sum();
        x[i] = (system.b[i] - tail) / system.at(i, i);
    }

    if let Some(column) = x.iter().position(|v| !v.is_finite()) {
        return Err(CalibrationError::SingularSystem { column });
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_two_by_two() {
        // x + 2y = 5, 3x + 4y = 6 -> x = -4, y = 4.5
        let system =
            DenseSystem::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], &[5.0, 6.0]).unwrap();
        let x = solve_dense(system).unwrap();
        assert!((x[0] + 4.0).abs() < 1e-12);
        assert!((x[1] - 4.5).abs() < 1e-12);
    }

    #[test]
    fn needs_row_swap_for_zero_leading_entry() {
        let system = DenseSystem::from_rows(
            &[vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 2.0]],
            &[3.0, 7.0, 8.0],
        )
        .unwrap();
        let x = solve_dense(system).unwrap();
        assert_eq!(x, vec![7.0, 3.0, 4.0]);
    }

    #[test]
    fn duplicate_rows_are_singular() {
        let system = DenseSystem::from_rows(
            &[vec![1.0, 2.0, 1.0], vec![1.0, 2.0, 1.0], vec![0.5, 0.1, 1.0]],
            &[1.0, 1.0, 0.0],
        )
        .unwrap();
        assert!(matches!(
            solve_dense(system),
            Err(CalibrationError::SingularSystem { .. })
        ));
    }

    #[test]
    fn zero_matrix_is_singular() {
        let system = DenseSystem::zeros(3);
        assert_eq!(
            solve_dense(system),
            Err(CalibrationError::SingularSystem { column: 0 })
        );
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = DenseSystem::from_rows(&[vec![1.0, 2.0], vec![3.0]], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CalibrationError::Dimension { .. }));
    }
}
