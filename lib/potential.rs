//! Position-space potentials driven by a single real control parameter.
//!
//! A [`Potential`] maps a control value `u` to a potential sampled on a
//! [`HilbertSpace`] grid:
//! - [`Constant`][Potential::Constant]: `V(x)` regardless of `u`
//! - [`Amplitude`][Potential::Amplitude]: `u V(x)`
//! - [`Shaken`][Potential::Shaken]: `V(x - u)`, i.e. the potential translated
//!   by `u`
//! - [`Custom`][Potential::Custom]: any `Fn(f64) -> RVec`

use std::{ fmt, sync::Arc };
use ndarray as nd;
use crate::{
    Arr1,
    error::{ LengthError, PotentialError },
    hilbert::HilbertSpace,
    interp::CubicSpline,
    vectors::{ RVec, box_fn },
};

pub type PotentialResult<T> = Result<T, PotentialError>;

/// Callback type for [`Potential::Custom`].
pub type PotentialFn = Arc<dyn Fn(f64) -> RVec + Send + Sync>;

/// A potential as a function of one control parameter.
#[derive(Clone)]
pub enum Potential {
    /// Always `V`.
    Constant(RVec),
    /// `u * V`.
    Amplitude(RVec),
    /// `V(x - u)`.
    Shaken {
        /// Grid positions.
        x: RVec,
        /// Untranslated potential.
        V: RVec,
        /// Interpolant over the tripled domain.
        spline: CubicSpline,
    },
    /// Arbitrary callback.
    Custom(PotentialFn),
}

impl fmt::Debug for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(V) => f.debug_tuple("Constant").field(V).finish(),
            Self::Amplitude(V) => f.debug_tuple("Amplitude").field(V).finish(),
            Self::Shaken { V, .. }
                => f.debug_struct("Shaken").field("V", V).finish_non_exhaustive(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Potential {
    /// Create a control-independent potential.
    pub fn constant<S>(hs: &HilbertSpace, V: &Arr1<S>) -> PotentialResult<Self>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check_len(hs.dim(), V.len())?;
        Ok(Self::Constant(V.to_owned()))
    }

    /// Create an amplitude-modulated potential.
    pub fn amplitude<S>(hs: &HilbertSpace, V: &Arr1<S>) -> PotentialResult<Self>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check_len(hs.dim(), V.len())?;
        Ok(Self::Amplitude(V.to_owned()))
    }

    /// Create a translated ("shaken") potential.
    ///
    /// The interpolant spans three copies of the grid laid end to end, with the
    /// outer copies held at the edge values of `V`, so that translations of up
    /// to a full grid width stay inside the knot range.
    pub fn shaken<S>(hs: &HilbertSpace, V: &Arr1<S>) -> PotentialResult<Self>
    where S: nd::Data<Elem = f64>
    {
        let n = hs.dim();
        LengthError::check_len(n, V.len())?;
        let x = hs.x().clone();
        let range = hs.extent() + hs.dx();
        let knots: RVec
            = x.iter().map(|xk| xk - range)
            .chain(x.iter().copied())
            .chain(x.iter().map(|xk| xk + range))
            .collect();
        let values: RVec
            = std::iter::repeat(V[0]).take(n)
            .chain(V.iter().copied())
            .chain(std::iter::repeat(V[n - 1]).take(n))
            .collect();
        let spline = CubicSpline::new(&knots, &values)?;
        Ok(Self::Shaken { x, V: V.to_owned(), spline })
    }

    /// Wrap an arbitrary callback.
    pub fn custom<F>(f: F) -> Self
    where F: Fn(f64) -> RVec + Send + Sync + 'static
    {
        Self::Custom(Arc::new(f))
    }

    /// Evaluate the potential at control value `u`.
    pub fn at(&self, u: f64) -> RVec {
        match self {
            Self::Constant(V) => V.clone(),
            Self::Amplitude(V) => V * u,
            Self::Shaken { x, spline, .. }
                => x.mapv(|xk| snap_zero(spline.eval(xk - u))),
            Self::Custom(f) => f(u),
        }
    }

    /// Return the base (unmodulated) potential, if there is one.
    pub fn base(&self) -> Option<&RVec> {
        match self {
            Self::Constant(V) | Self::Amplitude(V) | Self::Shaken { V, .. }
                => Some(V),
            Self::Custom(_) => None,
        }
    }

    /// Smallest value of the base potential (of the potential at `u = 0` for
    /// custom potentials).
    pub fn minimum(&self) -> f64 {
        let min = |V: &RVec| V.iter().copied().fold(f64::INFINITY, f64::min);
        match self.base() {
            Some(V) => min(V),
            None => min(&self.at(0.0)),
        }
    }
}

// interpolation noise on flat regions should read as exactly zero
fn snap_zero(v: f64) -> f64 { if v.abs() < 1e-16 { 0.0 } else { v } }

/// Sample a single cosine well on the grid `x`.
///
/// One period of `depth - depth/2 (cos 2kx + 1)` is cut out over
/// `(-π/2k, π/2k)`, giving a well of the given depth with its minimum of zero
/// at the origin; outside the cut the potential is flat at `depth`.
pub fn cosine_well<S>(x: &Arr1<S>, depth: f64, k: f64) -> RVec
where S: nd::Data<Elem = f64>
{
    let half = std::f64::consts::PI / (2.0 * k);
    let inside = box_fn(x, -half, half);
    nd::Zip::from(x).and(&inside)
        .map_collect(|xk, bk| {
            depth - 0.5 * depth * ((2.0 * k * xk).cos() + 1.0) * bk
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> HilbertSpace { HilbertSpace::symmetric(128, 4.0).unwrap() }

    #[test]
    fn constant_and_amplitude() {
        let hs = grid();
        let V = hs.x().mapv(|x| x.powi(2));
        let c = Potential::constant(&hs, &V).unwrap();
        let a = Potential::amplitude(&hs, &V).unwrap();
        assert_eq!(c.at(3.0), V);
        assert_eq!(a.at(-2.0), &V * -2.0);
        assert_eq!(c.minimum(), V[63].min(V[64]));
        assert!(Potential::constant(&hs, &nd::array![1.0]).is_err());
    }

    #[test]
    fn shaken_translates() {
        let hs = grid();
        let V = hs.x().mapv(|x| (-x.powi(2)).exp());
        let p = Potential::shaken(&hs, &V).unwrap();
        let V0 = p.at(0.0);
        V0.iter().zip(&V).for_each(|(a, b)| assert!((a - b).abs() < 1e-12));
        let u = 0.37;
        let expected = hs.x().mapv(|x| (-(x - u).powi(2)).exp());
        p.at(u).iter().zip(&expected)
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-4));
    }

    #[test]
    fn shaken_holds_edge_values() {
        let hs = grid();
        let V = hs.x().mapv(|x| x + 10.0);
        let p = Potential::shaken(&hs, &V).unwrap();
        let shifted = p.at(4.0);
        assert!((shifted[0] - V[0]).abs() < 1e-9);
        let shifted = p.at(-4.0);
        assert!((shifted[127] - V[127]).abs() < 1e-9);
    }

    #[test]
    fn custom_callback() {
        let p = Potential::custom(|u| nd::array![u, 2.0 * u]);
        assert_eq!(p.at(1.5), nd::array![1.5, 3.0]);
        assert!(p.base().is_none());
        assert_eq!(p.minimum(), 0.0);
        assert_eq!(format!("{:?}", p), "Custom(..)");
    }

    #[test]
    fn cosine_well_shape() {
        let k = 2.0_f64.sqrt();
        let half = std::f64::consts::PI / (2.0 * k);
        let x: RVec = nd::array![-2.0 * half, -half / 2.0, 0.0, half / 2.0, 1.5 * half];
        let V = cosine_well(&x, 400.0, k);
        assert_eq!(V[0], 400.0);
        assert!((V[1] - 200.0).abs() < 1e-10);
        assert!(V[2].abs() < 1e-10);
        assert!((V[3] - 200.0).abs() < 1e-10);
        assert_eq!(V[4], 400.0);
        // continuous across the edges of the cut
        let edge: RVec = nd::array![half - 1e-9, half + 1e-9];
        let V = cosine_well(&edge, 400.0, k);
        assert!((V[0] - V[1]).abs() < 1e-6);
    }
}
