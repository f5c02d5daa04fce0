//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use ndarray as nd;
use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Returned when an operation requiring equal-length arrays encounters arrays
/// with unequal length.
#[derive(Debug, Error)]
#[error("encountered arrays with incompatible lengths; got {0} and {1}")]
pub struct LengthError(pub usize, pub usize);

impl LengthError {
    pub(crate) fn check<S, A, T, B>(
        a: &nd::ArrayBase<S, nd::Ix1>,
        b: &nd::ArrayBase<T, nd::Ix1>,
    ) -> Result<(), Self>
    where
        S: nd::Data<Elem = A>,
        T: nd::Data<Elem = B>,
    {
        Self::check_len(a.len(), b.len())
    }

    pub(crate) fn check_len(na: usize, nb: usize) -> Result<(), Self> {
        (na == nb).then_some(()).ok_or(Self(na, nb))
    }
}

/// Returned from functions in [`interp`][crate::interp].
#[derive(Debug, Error)]
pub enum InterpError {
    /// Returned when fewer than three knots are given to a spline.
    #[error("spline interpolation requires at least 3 knots; got {0}")]
    TooFewKnots(usize),

    /// Returned when spline knots are not strictly increasing.
    #[error("spline knots must be strictly increasing")]
    Unordered,

    /// [`LengthError`]
    #[error("length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from [`HilbertSpace`][crate::hilbert::HilbertSpace] constructors.
#[derive(Debug, Error)]
pub enum HilbertError {
    /// Returned when the grid dimension is odd or too small for the
    /// five-point stencil.
    #[error("grid dimension must be even and at least 5; got {0}")]
    BadDimension(usize),

    /// Returned when the spatial bounds are empty or inverted.
    #[error("spatial bounds must satisfy xmin < xmax; got ({0}, {1})")]
    BadBounds(f64, f64),
}

impl HilbertError {
    pub(crate) fn check_dim(dim: usize) -> Result<(), Self> {
        (dim % 2 == 0 && dim >= 5).then_some(()).ok_or(Self::BadDimension(dim))
    }
}

/// Returned from [`Potential`][crate::potential::Potential] constructors.
#[derive(Debug, Error)]
pub enum PotentialError {
    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// [`InterpError`]
    #[error("interpolation error: {0}")]
    Interp(#[from] InterpError),
}

/// Returned from [`Hamiltonian`][crate::hamiltonian::Hamiltonian] spectrum
/// routines.
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// Returned when an eigenpair index lies beyond the matrix dimension.
    #[error("eigen index {index} out of range for dimension {dim}")]
    Index { index: usize, dim: usize },

    /// Returned when the requested eigenpair could not be computed.
    #[error("eigenpair {index} unavailable; only {available} converged")]
    Unavailable { index: usize, available: usize },

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// [`LinalgError`]
    #[error("linalg error: {0}")]
    Linalg(#[from] LinalgError),
}

/// Returned from [`Propagate`][crate::stepper::Propagate] implementors.
#[derive(Debug, Error)]
pub enum PropagateError {
    /// Returned when stepping before a state has been loaded.
    #[error("stepper holds no state; call reset first")]
    Uninitialized,

    /// Returned when an initial state has zero norm.
    #[error("initial state has zero norm")]
    ZeroNorm,

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),
}

/// Returned from [`Basis`][crate::basis::Basis] construction and evaluation.
#[derive(Debug, Error)]
pub enum BasisError {
    /// Returned when a coefficient vector has the wrong number of entries.
    #[error("basis expects {expected} coefficients; got {got}")]
    Arity { expected: usize, got: usize },

    /// Returned when asked for an empty basis.
    #[error("basis must contain at least one function")]
    BadCount,

    /// Returned when the sample times are empty.
    #[error("basis sample times must be non-empty")]
    BadTimes,

    /// Returned when a non-positive or non-finite frequency or amplitude is
    /// encountered.
    #[error("basis {0} must be finite and greater than 0; got {1}")]
    BadScale(&'static str, f64),
}

/// Returned from [`Cost`][crate::cost::Cost] construction and evaluation.
#[derive(Debug, Error)]
pub enum CostError {
    /// Returned when a new state transfer overlaps an existing one.
    #[error("simultaneous state transfers must be orthogonal; found overlap {overlap:.3e}")]
    NonOrthogonal { overlap: f64 },

    /// Returned when evaluating a cost holding no state transfers.
    #[error("cost holds no state transfers")]
    NoTransfers,

    /// [`LengthError`]
    #[error("array length error: {0}")]
    Length(#[from] LengthError),

    /// [`PropagateError`]
    #[error("propagation error: {0}")]
    Propagate(#[from] PropagateError),
}

/// Returned from [`Dcrab`][crate::optimiser::Dcrab].
#[derive(Debug, Error)]
pub enum OptimError {
    /// [`BasisError`]
    #[error("basis error: {0}")]
    Basis(#[from] BasisError),

    /// [`CostError`]
    #[error("cost error: {0}")]
    Cost(#[from] CostError),
}

/// Returned from [`RunConfig`][crate::config::RunConfig] loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when a configuration value is out of range.
    #[error("bad value for `{field}`: {reason}")]
    BadValue { field: &'static str, reason: String },

    /// [`toml::de::Error`]
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// [`std::io::Error`]
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn check(field: &'static str, ok: bool, reason: &str)
        -> Result<(), Self>
    {
        ok.then_some(())
            .ok_or_else(|| Self::BadValue { field, reason: reason.into() })
    }
}
