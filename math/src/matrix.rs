use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, Axis};
use rand::Rng;

use crate::vector::{Storage, Vector};

/// A dense 2-D matrix of `f64` values, used as the weight block between two
/// adjacent layers: one row per receiving unit, one column per sending unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Array2<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
        }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
        }
    }

    /// A matrix of uniform samples from [-0.5, 0.5).
    pub fn random(rows: usize, cols: usize) -> Self {
        let mut rng = rand::rng();
        Self {
            data: Array2::from_shape_fn((rows, cols), |_| rng.random_range(-0.5..0.5)),
        }
    }

    pub fn from_array(data: Array2<f64>) -> Self {
        Self { data }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// # Panics
    /// If `row` or `col` is out of range.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    /// # Panics
    /// If `row` or `col` is out of range.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[[row, col]] = value;
    }

    /// Returns row `row` as a dense vector.
    ///
    /// # Panics
    /// If `row` is out of range.
    pub fn row(&self, row: usize) -> Vector {
        Vector::from_array(self.data.row(row).to_owned())
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    /// Matrix-vector product; the result is always dense. A sparse operand
    /// contributes its default through the per-row sums and its stored
    /// entries through the matching columns, without being densified.
    ///
    /// # Panics
    /// If `v.dimension() != cols`.
    pub fn mul_vec(&self, v: &Vector) -> Vector {
        assert_eq!(
            self.cols(),
            v.dimension(),
            "cannot multiply a {}x{} matrix with a vector of dimension {}",
            self.rows(),
            self.cols(),
            v.dimension()
        );
        match v.storage() {
            Storage::Dense(x) => Vector::from_array(self.data.dot(x)),
            Storage::Sparse { default, entries } => {
                let mut out: Array1<f64> = self.data.sum_axis(Axis(1)) * *default;
                for (&col, &value) in entries {
                    out.scaled_add(value - default, &self.data.column(col));
                }
                Vector::from_array(out)
            }
        }
    }

    /// Transposed matrix-vector product (`M^T . v`); the result is dense.
    ///
    /// # Panics
    /// If `v.dimension() != rows`.
    pub fn t_mul_vec(&self, v: &Vector) -> Vector {
        assert_eq!(
            self.rows(),
            v.dimension(),
            "cannot multiply the transpose of a {}x{} matrix with a vector of dimension {}",
            self.rows(),
            self.cols(),
            v.dimension()
        );
        match v.storage() {
            Storage::Dense(x) => Vector::from_array(self.data.t().dot(x)),
            Storage::Sparse { default, entries } => {
                let mut out: Array1<f64> = self.data.sum_axis(Axis(0)) * *default;
                for (&row, &value) in entries {
                    out.scaled_add(value - default, &self.data.row(row));
                }
                Vector::from_array(out)
            }
        }
    }

    /// Outer product: `result[r][c] = u.get(r) * v.get(c)`.
    pub fn outer(u: &Vector, v: &Vector) -> Self {
        let a = u.to_array();
        let b = v.to_array();
        Self {
            data: Array2::from_shape_fn((a.len(), b.len()), |(r, c)| a[r] * b[c]),
        }
    }

    /// # Panics
    /// If the shapes differ.
    pub fn add_assign(&mut self, other: &Matrix) {
        self.data += &other.data;
    }

    pub fn div_assign(&mut self, divisor: f64) {
        self.data /= divisor;
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.mapv(f),
        }
    }

    /// A zero matrix with this matrix's shape.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.rows(), self.cols())
    }
}
