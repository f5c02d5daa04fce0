//! Uniform time grids for control sequences.

use ndarray as nd;
use crate::vectors::RVec;

/// A series of `num_steps` steps of size `dt`, starting at zero.
///
/// `num_steps` counts steps, not points; the grid runs from `0` to
/// `num_steps * dt` inclusive and therefore holds `num_steps + 1` points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Time {
    /// Time step.
    pub dt: f64,
    /// Number of steps.
    pub num_steps: usize,
}

impl Time {
    /// Create a new time grid.
    pub fn new(dt: f64, num_steps: usize) -> Self { Self { dt, num_steps } }

    /// Total duration `num_steps * dt`.
    pub fn duration(&self) -> f64 { self.dt * self.num_steps as f64 }

    /// All `num_steps + 1` grid points.
    pub fn points(&self) -> RVec {
        nd::Array1::linspace(0.0, self.duration(), self.num_steps + 1)
    }

    /// The `num_steps` times at which a control value is applied, i.e. the
    /// start of each step.
    pub fn controls(&self) -> RVec {
        (0..self.num_steps).map(|k| k as f64 * self.dt).collect()
    }
}
