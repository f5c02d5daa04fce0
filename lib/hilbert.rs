//! Uniform one-dimensional position grids and their kinetic-energy operator.

use std::f64::consts::TAU;
use ndarray as nd;
use crate::{
    error::HilbertError,
    sparse::CsrMatrix,
    utils::fft_freq,
    vectors::RVec,
};

pub type HilbertResult<T> = Result<T, HilbertError>;

// fourth-order central difference stencil for d²/dx², in units of 1 / (12 dx²)
static LAPLACE_STENCIL: [(isize, f64); 5] = [
    (-2, -1.0),
    (-1, 16.0),
    ( 0, -30.0),
    ( 1, 16.0),
    ( 2, -1.0),
];

/// A fixed spatial grid with periodic boundaries and the matching
/// finite-difference kinetic operator `T = -½ d²/dx²` (`ħ = m = 1`).
#[derive(Clone, Debug)]
pub struct HilbertSpace {
    x: RVec,
    dx: f64,
    dim: usize,
    kinetic: CsrMatrix,
}

impl HilbertSpace {
    /// Build a grid of `dim` points spanning `[xmin, xmax]` inclusive.
    ///
    /// Fails if `dim` is odd or smaller than the five-point stencil, or if the
    /// bounds are not ordered.
    pub fn new(dim: usize, xmin: f64, xmax: f64) -> HilbertResult<Self> {
        HilbertError::check_dim(dim)?;
        if xmin >= xmax || !xmin.is_finite() || !xmax.is_finite() {
            return Err(HilbertError::BadBounds(xmin, xmax));
        }
        let x: RVec = nd::Array1::linspace(xmin, xmax, dim);
        let dx = x[1] - x[0];
        let scale = -0.5 / (12.0 * dx.powi(2));
        let n = dim as isize;
        let triplets
            = (0..n)
            .flat_map(|i| {
                LAPLACE_STENCIL.iter()
                    .map(move |(off, c)| {
                        let j = (i + off).rem_euclid(n);
                        (i as usize, j as usize, scale * c)
                    })
            });
        let kinetic = CsrMatrix::from_triplets(dim, triplets);
        Ok(Self { x, dx, dim, kinetic })
    }

    /// Build a grid of `dim` points spanning `[-half_width, half_width]`.
    pub fn symmetric(dim: usize, half_width: f64) -> HilbertResult<Self> {
        Self::new(dim, -half_width, half_width)
    }

    /// Grid positions.
    pub fn x(&self) -> &RVec { &self.x }

    /// Grid spacing.
    pub fn dx(&self) -> f64 { self.dx }

    /// Number of grid points.
    pub fn dim(&self) -> usize { self.dim }

    /// Distance between the first and last grid points.
    pub fn extent(&self) -> f64 { self.x[self.dim - 1] - self.x[0] }

    /// Kinetic-energy operator in the position representation.
    pub fn kinetic(&self) -> &CsrMatrix { &self.kinetic }

    /// Momenta conjugate to the grid, in the ordering produced by a forward
    /// FFT (non-negative first, then negative).
    pub fn momenta(&self) -> RVec {
        fft_freq(self.dim, self.dx) * TAU
    }

    /// Kinetic energies `p² / 2` on the momentum grid.
    pub fn kinetic_momentum(&self) -> RVec {
        self.momenta().mapv(|p| p.powi(2) / 2.0)
    }
}
