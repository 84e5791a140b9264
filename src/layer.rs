use rand::Rng;

use crate::{Activation, Error, Matrix, Result};

/// One affine layer followed by an element-wise activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Shape `(in_dim, out_dim)`.
    weights: Matrix,
    biases: Vec<f64>,
    activation: Activation,
}

impl Layer {
    /// Gaussian weights scaled by `weight_scale`, zero biases.
    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        weight_scale: f64,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        if !(weight_scale.is_finite() && weight_scale >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight scale must be finite and >= 0, got {weight_scale}"
            )));
        }

        Ok(Self {
            weights: Matrix::gaussian(in_dim, out_dim, weight_scale, rng),
            biases: vec![0.0; out_dim],
            activation,
        })
    }

    /// Build a layer from explicit parameters.
    ///
    /// `weights` is row-major `(in_dim, out_dim)`.
    pub fn from_parts(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        weights: Vec<f64>,
        biases: Vec<f64>,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidData(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        if biases.len() != out_dim {
            return Err(Error::ShapeMismatch(format!(
                "biases length {} does not match out_dim {out_dim}",
                biases.len()
            )));
        }
        let weights = Matrix::from_vec(in_dim, out_dim, weights)?;
        if weights.as_slice().iter().chain(&biases).any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "layer parameters must be finite".to_owned(),
            ));
        }

        Ok(Self {
            weights,
            biases,
            activation,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.weights.rows()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.weights.cols()
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }

    #[inline]
    pub fn biases_mut(&mut self) -> &mut [f64] {
        &mut self.biases
    }

    /// Batched forward pass: `outputs = activation(inputs * W + b)`.
    ///
    /// Shape contract:
    /// - `inputs.len() == rows * in_dim`
    /// - `outputs` is reshaped to `(rows, out_dim)`
    pub(crate) fn forward_batch(&self, inputs: &[f64], rows: usize, outputs: &mut Matrix) {
        assert_eq!(
            outputs.cols(),
            self.out_dim(),
            "outputs cols {} do not match layer out_dim {}",
            outputs.cols(),
            self.out_dim()
        );
        outputs.reshape_rows(rows);

        crate::matmul::matmul(
            inputs,
            self.weights.as_slice(),
            outputs.as_mut_slice(),
            rows,
            self.in_dim(),
            self.out_dim(),
        );
        outputs.add_row_vector(&self.biases);
        self.activation.forward_in_place(outputs.as_mut_slice());
    }

    /// Batched backward pass through the affine part of the layer.
    ///
    /// `d_z` is the gradient w.r.t. this layer's pre-activation output (the
    /// activation derivative has already been applied by the caller).
    ///
    /// Overwrite semantics:
    /// - `d_weights = inputs^T * d_z`
    /// - `d_biases = colsum(d_z)`
    /// - `d_inputs = d_z * W^T` when requested
    pub(crate) fn backward_batch(
        &self,
        inputs: &[f64],
        d_z: &Matrix,
        d_weights: &mut Matrix,
        d_biases: &mut [f64],
        d_inputs: Option<&mut Matrix>,
    ) {
        let rows = d_z.rows();
        assert_eq!(
            d_z.cols(),
            self.out_dim(),
            "d_z cols {} do not match layer out_dim {}",
            d_z.cols(),
            self.out_dim()
        );
        assert_eq!(
            d_weights.shape(),
            self.weights.shape(),
            "d_weights shape {:?} does not match weights shape {:?}",
            d_weights.shape(),
            self.weights.shape()
        );

        crate::matmul::matmul_tn(
            inputs,
            d_z.as_slice(),
            d_weights.as_mut_slice(),
            rows,
            self.in_dim(),
            self.out_dim(),
        );
        d_z.column_sums_into(d_biases);

        if let Some(d_inputs) = d_inputs {
            d_inputs.reshape_rows(rows);
            crate::matmul::matmul_nt(
                d_z.as_slice(),
                self.weights.as_slice(),
                d_inputs.as_mut_slice(),
                rows,
                self.out_dim(),
                self.in_dim(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Layer {
        // W = [[1, -1],
        //      [2,  0]]
        Layer::from_parts(2, 2, Activation::ReLU, vec![1.0, -1.0, 2.0, 0.0], vec![0.5, 0.0]).unwrap()
    }

    #[test]
    fn from_parts_validates() {
        assert!(Layer::from_parts(2, 2, Activation::ReLU, vec![0.0; 3], vec![0.0; 2]).is_err());
        assert!(Layer::from_parts(2, 2, Activation::ReLU, vec![0.0; 4], vec![0.0; 1]).is_err());
        assert!(
            Layer::from_parts(1, 1, Activation::ReLU, vec![f64::NAN], vec![0.0]).is_err()
        );
    }

    #[test]
    fn forward_batch_applies_affine_then_relu() {
        let layer = tiny();
        let mut out = Matrix::zeros(0, 2);
        // x0 = [1, 1] -> z = [3.5, -1] -> h = [3.5, 0]
        // x1 = [0, 1] -> z = [2.5,  0] -> h = [2.5, 0]
        layer.forward_batch(&[1.0, 1.0, 0.0, 1.0], 2, &mut out);
        assert_eq!(out.as_slice(), &[3.5, 0.0, 2.5, 0.0]);
    }

    #[test]
    fn backward_batch_computes_affine_gradients() {
        let layer = tiny();
        let inputs = [1.0, 1.0, 0.0, 1.0];
        let d_z = Matrix::from_vec(2, 2, vec![1.0, 0.0, 2.0, 1.0]).unwrap();
        let mut d_w = Matrix::zeros(2, 2);
        let mut d_b = [0.0; 2];
        let mut d_in = Matrix::zeros(0, 2);

        layer.backward_batch(&inputs, &d_z, &mut d_w, &mut d_b, Some(&mut d_in));

        // x^T = [[1, 0], [1, 1]], so x^T * d_z = [[1, 0], [3, 1]].
        assert_eq!(d_w.as_slice(), &[1.0, 0.0, 3.0, 1.0]);
        assert_eq!(d_b, [3.0, 1.0]);
        // d_z * W^T: row0 = [1*1 + 0*-1, 1*2 + 0*0] = [1, 2]
        //            row1 = [2*1 + 1*-1, 2*2 + 1*0] = [1, 4]
        assert_eq!(d_in.as_slice(), &[1.0, 2.0, 1.0, 4.0]);
    }
}
