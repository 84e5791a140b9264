//! Small GEMM wrapper used by the batched forward and backward passes.
//!
//! One abstraction over matrix multiplication:
//! - default: a simple, safe triple-loop implementation
//! - optional: a faster backend via the `matrixmultiply` feature
//!
//! Both backends are single-threaded and sum in a fixed order, so repeated runs
//! produce bit-identical results.

#[allow(clippy::too_many_arguments)]
#[inline]
fn gemm_f64(
    m: usize,
    n: usize,
    k: usize,
    a: &[f64],
    rsa: usize,
    csa: usize,
    b: &[f64],
    rsb: usize,
    csb: usize,
    c: &mut [f64],
    rsc: usize,
    csc: usize,
) {
    debug_assert!(m > 0 && n > 0 && k > 0);

    #[cfg(feature = "matrixmultiply")]
    {
        // SAFETY: callers check that every buffer covers its (rows, cols, strides)
        // extent; beta = 0 means `c` is write-only.
        unsafe {
            matrixmultiply::dgemm(
                m,
                k,
                n,
                1.0,
                a.as_ptr(),
                rsa as isize,
                csa as isize,
                b.as_ptr(),
                rsb as isize,
                csb as isize,
                0.0,
                c.as_mut_ptr(),
                rsc as isize,
                csc as isize,
            );
        }
    }

    #[cfg(not(feature = "matrixmultiply"))]
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0_f64;
            let a0 = i * rsa;
            let b0 = j * csb;

            for p in 0..k {
                acc = a[a0 + p * csa].mul_add(b[p * rsb + b0], acc);
            }

            c[i * rsc + j * csc] = acc;
        }
    }
}

/// `out (m, n) = a (m, k) * b (k, n)`, all row-major.
pub(crate) fn matmul(a: &[f64], b: &[f64], out: &mut [f64], m: usize, k: usize, n: usize) {
    assert_eq!(a.len(), m * k, "lhs len {} is not {m} x {k}", a.len());
    assert_eq!(b.len(), k * n, "rhs len {} is not {k} x {n}", b.len());
    assert_eq!(out.len(), m * n, "out len {} is not {m} x {n}", out.len());
    gemm_f64(m, n, k, a, k, 1, b, n, 1, out, n, 1);
}

/// `out (m, n) = a^T * b` where `a` is `(k, m)` and `b` is `(k, n)`, row-major.
pub(crate) fn matmul_tn(a: &[f64], b: &[f64], out: &mut [f64], k: usize, m: usize, n: usize) {
    assert_eq!(a.len(), k * m, "lhs len {} is not {k} x {m}", a.len());
    assert_eq!(b.len(), k * n, "rhs len {} is not {k} x {n}", b.len());
    assert_eq!(out.len(), m * n, "out len {} is not {m} x {n}", out.len());
    gemm_f64(m, n, k, a, 1, m, b, n, 1, out, n, 1);
}

/// `out (m, n) = a * b^T` where `a` is `(m, k)` and `b` is `(n, k)`, row-major.
pub(crate) fn matmul_nt(a: &[f64], b: &[f64], out: &mut [f64], m: usize, k: usize, n: usize) {
    assert_eq!(a.len(), m * k, "lhs len {} is not {m} x {k}", a.len());
    assert_eq!(b.len(), n * k, "rhs len {} is not {n} x {k}", b.len());
    assert_eq!(out.len(), m * n, "out len {} is not {m} x {n}", out.len());
    gemm_f64(m, n, k, a, k, 1, b, 1, k, out, n, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // a = [[1, 2, 3],
    //      [4, 5, 6]]
    const A: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

    #[test]
    fn matmul_matches_hand_computed_product() {
        // b = [[1, 0], [0, 1], [1, 1]]
        let b = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut out = [0.0; 4];
        matmul(&A, &b, &mut out, 2, 3, 2);
        assert_eq!(out, [4.0, 5.0, 10.0, 11.0]);
    }

    #[test]
    fn transposed_variants_agree_with_explicit_transpose() {
        // a^T * a is (3, 3).
        let mut tn = [0.0; 9];
        matmul_tn(&A, &A, &mut tn, 2, 3, 3);
        assert_eq!(tn, [17.0, 22.0, 27.0, 22.0, 29.0, 36.0, 27.0, 36.0, 45.0]);

        // a * a^T is (2, 2).
        let mut nt = [0.0; 4];
        matmul_nt(&A, &A, &mut nt, 2, 3, 2);
        assert_eq!(nt, [14.0, 32.0, 32.0, 77.0]);
    }

    #[test]
    #[should_panic]
    fn matmul_panics_on_shape_mismatch() {
        let mut out = [0.0; 3];
        matmul(&A, &A, &mut out, 2, 3, 2);
    }
}
