//! Row-major `f64` matrix.
//!
//! Parameters, activations and gradients are all stored as `Matrix`. Batched
//! activations have shape `(batch_size, features)`; weights have shape
//! `(in_dim, out_dim)` so a layer computes `x * W + b`.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap a flat row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::ShapeMismatch(format!("shape ({rows}, {cols}) overflows")))?;
        if data.len() != expected {
            return Err(Error::ShapeMismatch(format!(
                "buffer of len {} cannot be viewed as ({rows}, {cols})",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Independent `N(0, 1) * scale` entries.
    pub fn gaussian<R: Rng + ?Sized>(rows: usize, cols: usize, scale: f64, rng: &mut R) -> Self {
        let data = (0..rows * cols)
            .map(|_| scale * rng.sample::<f64, _>(StandardNormal))
            .collect();
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Panics if `row >= rows`.
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Panics if out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(col < self.cols, "col {col} out of bounds for {} cols", self.cols);
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(col < self.cols, "col {col} out of bounds for {} cols", self.cols);
        self.data[row * self.cols + col] = value;
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum()
    }

    /// Change the number of rows, keeping `cols`. Contents are unspecified afterwards.
    pub(crate) fn reshape_rows(&mut self, rows: usize) {
        self.rows = rows;
        self.data.resize(rows * self.cols, 0.0);
    }

    /// Add `bias` to every row.
    pub(crate) fn add_row_vector(&mut self, bias: &[f64]) {
        assert_eq!(
            bias.len(),
            self.cols,
            "bias len {} does not match cols {}",
            bias.len(),
            self.cols
        );
        for row in self.data.chunks_exact_mut(self.cols) {
            for (v, b) in row.iter_mut().zip(bias) {
                *v += b;
            }
        }
    }

    /// Column sums, written into `out`.
    pub(crate) fn column_sums_into(&self, out: &mut [f64]) {
        assert_eq!(
            out.len(),
            self.cols,
            "out len {} does not match cols {}",
            out.len(),
            self.cols
        );
        out.fill(0.0);
        for row in self.data.chunks_exact(self.cols) {
            for (o, v) in out.iter_mut().zip(row) {
                *o += v;
            }
        }
    }
}
