//! Activation functions.
//!
//! A layer computes a pre-activation `z = x W + b` and then applies an
//! activation element-wise: `h = activation(z)`.
//!
//! Only the post-activation outputs are cached during the forward pass. For the
//! rectifier, `h <= 0` exactly when `z <= 0`, so the derivative can be read off
//! the cached output without keeping `z` around.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// `max(0, x)`, used between hidden layers.
    ReLU,
    /// No nonlinearity; the output layer produces raw class scores.
    Identity,
}

impl Activation {
    #[inline]
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Identity => x,
        }
    }

    pub(crate) fn forward_in_place(self, xs: &mut [f64]) {
        match self {
            Activation::ReLU => {
                for x in xs {
                    *x = x.max(0.0);
                }
            }
            Activation::Identity => {}
        }
    }

    /// Derivative with respect to the input, from the cached output `y`.
    ///
    /// The rectifier's derivative is 0 for non-positive input.
    #[inline]
    pub fn grad_from_output(self, y: f64) -> f64 {
        match self {
            Activation::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }

    /// Multiply `d_outputs` by the derivative in place (masks dead rectifier units).
    pub(crate) fn backward_in_place(self, outputs: &[f64], d_outputs: &mut [f64]) {
        assert_eq!(
            outputs.len(),
            d_outputs.len(),
            "outputs len {} does not match d_outputs len {}",
            outputs.len(),
            d_outputs.len()
        );
        if self == Activation::Identity {
            return;
        }
        for (d, &y) in d_outputs.iter_mut().zip(outputs) {
            if self.grad_from_output(y) == 0.0 {
                *d = 0.0;
            }
        }
    }
}
