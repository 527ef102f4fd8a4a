//! Radial normalization of Gaussian-type orbitals.
//!
//! libcint expects the contraction coefficients in `env` to already carry
//! the radial normalization of every primitive `r^l exp(-alpha r^2)` as well
//! as the normalization of the contracted function as a whole. The angular
//! factor (1/sqrt(4 pi) for s, ...) is applied by the integral library.

use itertools::iproduct;
use libm::tgamma;
use nalgebra::{DMatrix, DVector};

use crate::error::{MoleError, MoleResult};

/// int_0^inf x^n exp(-alpha x^2) dx
pub fn gaussian_int(n: i32, alpha: f64) -> f64 {
    let n1 = (n as f64 + 1.0) * 0.5;
    tgamma(n1) / (2.0 * alpha.powf(n1))
}

/// Normalization factor of the radial part g = r^l exp(-alpha r^2):
///
///   1 / sqrt( int g^2 r^2 dr )
///   = sqrt( 2^(2l+3) (l+1)! (2a)^(l+1.5) / ((2l+2)! sqrt(pi)) )
///
/// Ref: H. B. Schlegel and M. J. Frisch, Int. J. Quant. Chem., 54(1995), 83-87.
pub fn gto_norm(l: i32, expnt: f64) -> MoleResult<f64> {
    if l < 0 {
        return Err(MoleError::InvalidAngularMomentum(l));
    }
    Ok(1.0 / gaussian_int(l * 2 + 2, 2.0 * expnt).sqrt())
}

/// Radial overlap of every contracted column with itself:
/// sum_pq c_p c_q I(2l+2, a_p + a_q).
pub fn contracted_self_overlap(l: i32, exps: &[f64], coeffs: &DMatrix<f64>) -> DVector<f64> {
    let nprim = exps.len();
    // ee[p, q] = I(2l+2, a_p + a_q)
    let ee = DMatrix::from_fn(nprim, nprim, |p, q| gaussian_int(l * 2 + 2, exps[p] + exps[q]));
    DVector::from_iterator(
        coeffs.ncols(),
        coeffs.column_iter().map(|c| {
            iproduct!(0..nprim, 0..nprim)
                .map(|(p, q)| c[p] * ee[(p, q)] * c[q])
                .sum::<f64>()
        }),
    )
}

/// Absorb normalization into a contraction.
///
/// `coeffs` is `nprim x nctr`, one column per contracted function. Each
/// primitive row is first scaled by `gto_norm(l, a_p)`, then every column is
/// rescaled to unit self-overlap.
pub fn normalize_contracted(l: i32, exps: &[f64], coeffs: &DMatrix<f64>) -> MoleResult<DMatrix<f64>> {
    if exps.len() != coeffs.nrows() {
        return Err(MoleError::InvalidParameter {
            name: "coeffs",
            reason: format!(
                "{} exponents but {} coefficient rows",
                exps.len(),
                coeffs.nrows()
            ),
        });
    }

    let mut cs = coeffs.clone();
    for (p, &e) in exps.iter().enumerate() {
        let n = gto_norm(l, e)?;
        cs.row_mut(p).scale_mut(n);
    }

    let s = contracted_self_overlap(l, exps, &cs);
    for (i, mut col) in cs.column_iter_mut().enumerate() {
        col.scale_mut(1.0 / s[i].sqrt());
    }
    Ok(cs)
}

/// Undo the per-primitive factor of `normalize_contracted`. The contracted
/// rescaling is kept, so the result is the coefficient matrix a user would
/// pass in to reproduce the same shell.
pub fn unnormalize_primitives(l: i32, exps: &[f64], coeffs: &DMatrix<f64>) -> MoleResult<DMatrix<f64>> {
    let mut cs = coeffs.clone();
    for (p, &e) in exps.iter().enumerate() {
        let n = gto_norm(l, e)?;
        cs.row_mut(p).scale_mut(1.0 / n);
    }
    Ok(cs)
}
