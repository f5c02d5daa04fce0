//! Natural cubic spline interpolation of array-sampled (continuous) functions.
//!
//! ```
//! use ndarray as nd;
//! use xcontrol::interp::CubicSpline;
//!
//! let x: nd::Array1<f64> = nd::Array::linspace(-5.0, 5.0, 1000);
//! let y = x.mapv(|xk| (-xk.powi(2)).exp());
//! let spline = CubicSpline::new(&x, &y).unwrap();
//! assert!((spline.eval(0.123) - (-0.123_f64.powi(2)).exp()).abs() < 1e-6);
//! ```

use ndarray as nd;
use crate::{ Arr1, error::*, vectors::RVec };

pub type InterpResult<T> = Result<T, InterpError>;

/// Piecewise cubic interpolant with zero curvature at both ends.
///
/// Outside the knot range the spline continues linearly with the slope at the
/// nearest end.
#[derive(Clone, Debug, PartialEq)]
pub struct CubicSpline {
    x: RVec,
    y: RVec,
    b: RVec,
    c: RVec,
    d: RVec,
}

impl CubicSpline {
    /// Fit a spline through the points `(x[i], y[i])`.
    ///
    /// `x` must be strictly increasing and hold at least three points.
    pub fn new<S, T>(x: &Arr1<S>, y: &Arr1<T>) -> InterpResult<Self>
    where
        S: nd::Data<Elem = f64>,
        T: nd::Data<Elem = f64>,
    {
        LengthError::check(x, y)?;
        let n = x.len();
        if n < 3 { return Err(InterpError::TooFewKnots(n)); }
        if x.iter().zip(x.iter().skip(1)).any(|(xk, xkp1)| xkp1 <= xk) {
            return Err(InterpError::Unordered);
        }
        let h: RVec
            = x.iter().zip(x.iter().skip(1))
            .map(|(xk, xkp1)| xkp1 - xk)
            .collect();
        let slope: RVec
            = (0..n - 1)
            .map(|k| (y[k + 1] - y[k]) / h[k])
            .collect();

        // tridiagonal system for the interior second derivatives, solved with
        // the Thomas algorithm
        let m = n - 2;
        let mut diag: Vec<f64> = (0..m).map(|k| 2.0 * (h[k] + h[k + 1])).collect();
        let mut rhs: Vec<f64>
            = (0..m).map(|k| 6.0 * (slope[k + 1] - slope[k])).collect();
        for k in 1..m {
            let w = h[k] / diag[k - 1];
            diag[k] -= w * h[k];
            rhs[k] -= w * rhs[k - 1];
        }
        let mut M: RVec = nd::Array1::zeros(n);
        for k in (0..m).rev() {
            let upper = if k + 1 < m { h[k + 1] * M[k + 2] } else { 0.0 };
            M[k + 1] = (rhs[k] - upper) / diag[k];
        }

        let mut b: RVec = nd::Array1::zeros(n);
        let mut d: RVec = nd::Array1::zeros(n);
        for k in 0..n - 1 {
            b[k] = slope[k] - h[k] * (2.0 * M[k] + M[k + 1]) / 6.0;
            d[k] = (M[k + 1] - M[k]) / (6.0 * h[k]);
        }
        b[n - 1] = slope[n - 2] + h[n - 2] * (M[n - 2] + 2.0 * M[n - 1]) / 6.0;
        let c: RVec = M / 2.0;
        Ok(Self { x: x.to_owned(), y: y.to_owned(), b, c, d })
    }

    /// Number of knots.
    pub fn len(&self) -> usize { self.x.len() }

    /// Always `false`; a spline holds at least three knots.
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    /// Knot positions.
    pub fn knots(&self) -> &RVec { &self.x }

    /// Evaluate the spline at a single point.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x <= self.x[0] {
            return self.y[0] + self.b[0] * (x - self.x[0]);
        }
        if x >= self.x[n - 1] {
            return self.y[n - 1] + self.b[n - 1] * (x - self.x[n - 1]);
        }
        let k
            = self.x.as_slice()
            .map(|xs| xs.partition_point(|xk| *xk <= x))
            .unwrap_or_else(|| self.x.iter().take_while(|xk| **xk <= x).count())
            .saturating_sub(1)
            .min(n - 2);
        let t = x - self.x[k];
        self.y[k] + t * (self.b[k] + t * (self.c[k] + t * self.d[k]))
    }

    /// Evaluate the spline at many points.
    pub fn eval_many<S>(&self, x: &Arr1<S>) -> RVec
    where S: nd::Data<Elem = f64>
    {
        x.mapv(|xk| self.eval(xk))
    }
}
