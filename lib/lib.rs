#![allow(non_snake_case)]

//! Provides functions and higher-level constructs for simulating a single
//! quantum particle in a controllable one-dimensional potential and for
//! optimizing the control to drive state-to-state transfers.
//!
//! Provides implementations for the following numerical routines:
//! - Time-independent:
//!     - Fourth-order finite-difference Hamiltonians on periodic grids
//!     - Shift-invert block subspace iteration for the low-lying spectrum,
//!       with a cached, sign-canonicalized eigenbasis
//! - Time-dependent:
//!     - Pseudo-spectral split-operator propagation with optional absorbing
//!       boundaries
//! - Optimal control:
//!     - Random tapered Fourier bases
//!     - State-transfer fidelities with control penalties
//!     - Dressed chopped random basis (dCRAB) search over Nelder-Mead simplices
//!
//! See [`docs`] for theoretical background.

pub mod error;
pub mod vectors;
pub mod utils;
pub mod sparse;
pub mod interp;
pub mod time;
pub mod hilbert;
pub mod potential;
pub mod eigs;
pub mod hamiltonian;
pub mod stepper;
pub mod basis;
pub mod cost;
pub mod stopper;
pub mod optimiser;
pub mod config;

pub mod docs;

pub(crate) const DEF_MAXITERS: usize = 1000;

pub type Arr1<S> = ndarray::ArrayBase<S, ndarray::Ix1>;
