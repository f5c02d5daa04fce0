//! Hamiltonians on a [`HilbertSpace`] grid and their lazily computed spectra.
//!
//! A [`Hamiltonian`] is the sparse matrix `T + diag(V)` for one fixed
//! potential. Its eigenpairs are computed on demand and cached in a
//! [`Spectrum`] that only ever grows: asking for a state beyond the cache
//! triggers a larger shift-invert solve, whose result replaces the cache only
//! if it holds at least as many pairs.
//!
//! A [`HamiltonianFn`] pairs a grid with a controllable [`Potential`] and
//! evaluates to a [`Hamiltonian`] at any control value.

use ndarray as nd;
use ndarray_linalg::{ self as la, EigValshInto };
use tracing::{ error, info, warn };
use crate::{
    Arr1,
    eigs::{ self, EigsParams },
    error::{ LengthError, SpectrumError },
    hilbert::HilbertSpace,
    potential::Potential,
    sparse::CsrMatrix,
    vectors::RVec,
};

pub type SpectrumResult<T> = Result<T, SpectrumError>;

/// Result of a sparse eigensolve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EigenOutcome {
    /// All requested eigenpairs converged.
    Converged(usize),
    /// Only some of the requested eigenpairs converged; these were still
    /// merged into the cache.
    Partial(usize),
    /// Nothing converged, even after retrying with a larger subspace.
    Failed,
}

impl EigenOutcome {
    /// Number of eigenpairs obtained.
    pub fn count(&self) -> usize {
        match self {
            Self::Converged(n) | Self::Partial(n) => *n,
            Self::Failed => 0,
        }
    }
}

/// Cached eigenvalues and eigenvectors, in ascending order of energy.
///
/// Eigenvalues and eigenvectors are tracked separately, since a dense
/// eigenvalue-only decomposition can supply many more values than the sparse
/// solver supplies vectors.
#[derive(Clone, Debug)]
pub struct Spectrum {
    eigenvalues: RVec,
    eigenvectors: nd::Array2<f64>,
}

impl Spectrum {
    fn new(dim: usize) -> Self {
        Self {
            eigenvalues: nd::Array1::zeros(0),
            eigenvectors: nd::Array2::zeros((dim, 0)),
        }
    }

    /// Number of cached eigenvalues.
    pub fn num_eigenvalues(&self) -> usize { self.eigenvalues.len() }

    /// Number of cached eigenvectors.
    pub fn num_eigenvectors(&self) -> usize { self.eigenvectors.ncols() }

    /// All cached eigenvalues.
    pub fn eigenvalues(&self) -> &RVec { &self.eigenvalues }

    /// Cached eigenvalue `i`, if present.
    pub fn eigenvalue(&self, i: usize) -> Option<f64> {
        self.eigenvalues.get(i).copied()
    }

    /// Cached eigenvector `i`, if present.
    pub fn eigenvector(&self, i: usize) -> Option<nd::ArrayView1<'_, f64>> {
        (i < self.num_eigenvectors()).then(|| self.eigenvectors.column(i))
    }

    // flip eigenvectors so that the mean over the first half of the grid is
    // non-negative for even states and non-positive for odd ones
    fn canonicalize(&mut self) {
        let half = self.eigenvectors.nrows() / 2;
        self.eigenvectors.columns_mut().into_iter().enumerate()
            .for_each(|(i, mut v)| {
                let bias = v.slice(nd::s![..half]).mean().unwrap_or(0.0);
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                if bias * sign < 0.0 { v *= -1.0; }
            });
    }
}

/// Sparse Hamiltonian `H = T + diag(V)` for a fixed potential.
#[derive(Clone, Debug)]
pub struct Hamiltonian {
    H: CsrMatrix,
    V: RVec,
    spectrum: Spectrum,
}

impl Hamiltonian {
    /// Assemble the Hamiltonian for potential `V` on grid `hs`.
    pub fn new<S>(hs: &HilbertSpace, V: &Arr1<S>) -> SpectrumResult<Self>
    where S: nd::Data<Elem = f64>
    {
        let H = hs.kinetic().add_diag(V)?;
        Ok(Self { H, V: V.to_owned(), spectrum: Spectrum::new(hs.dim()) })
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize { self.H.dim() }

    /// The sparse matrix itself.
    pub fn matrix(&self) -> &CsrMatrix { &self.H }

    /// The potential on the diagonal.
    pub fn potential(&self) -> &RVec { &self.V }

    /// Read-only view of the eigenpair cache.
    pub fn spectrum(&self) -> &Spectrum { &self.spectrum }

    /// Get eigenvector `i`, computing and caching eigenpairs up to `i` if
    /// needed.
    pub fn try_eigenvector(&mut self, i: usize) -> SpectrumResult<RVec> {
        let dim = self.dim();
        if i >= dim { return Err(SpectrumError::Index { index: i, dim }); }
        if i >= self.spectrum.num_eigenvectors() {
            let hint = self.spectrum.eigenvalue(0);
            self.calc_spectrum(i + 1, hint)?;
        }
        self.spectrum.eigenvector(i)
            .map(|v| v.to_owned())
            .ok_or(SpectrumError::Unavailable {
                index: i,
                available: self.spectrum.num_eigenvectors(),
            })
    }

    /// Like [`Self::try_eigenvector`], but log any error and return a zero
    /// vector instead.
    pub fn eigenvector(&mut self, i: usize) -> RVec {
        self.try_eigenvector(i)
            .unwrap_or_else(|err| {
                error!("invalid eigenvector: {err}");
                nd::Array1::zeros(self.dim())
            })
    }

    /// Get eigenvalue `i`.
    ///
    /// If `i` lies beyond the cache, **all** eigenvalues are computed by dense
    /// decomposition (see [`Self::calc_eigenvalues`]). This scales as the cube
    /// of the grid dimension; prefer [`Self::eigenvalues`] for the low-lying
    /// states of large grids.
    pub fn try_eigenvalue(&mut self, i: usize) -> SpectrumResult<f64> {
        let dim = self.dim();
        if i >= dim { return Err(SpectrumError::Index { index: i, dim }); }
        if i >= self.spectrum.num_eigenvalues() {
            info!("calculating all {dim} eigenvalues; this may be slow");
            self.calc_eigenvalues()?;
        }
        self.spectrum.eigenvalue(i)
            .ok_or(SpectrumError::Unavailable {
                index: i,
                available: self.spectrum.num_eigenvalues(),
            })
    }

    /// Like [`Self::try_eigenvalue`], but log any error and return zero
    /// instead.
    pub fn eigenvalue(&mut self, i: usize) -> f64 {
        self.try_eigenvalue(i)
            .unwrap_or_else(|err| {
                error!("invalid eigenvalue: {err}");
                0.0
            })
    }

    /// Return the lowest `n` eigenvalues using the sparse solver, or as many as
    /// are available.
    pub fn eigenvalues(&mut self, n: usize) -> RVec {
        let n = n.min(self.dim());
        if n > self.spectrum.num_eigenvalues() {
            let hint = self.spectrum.eigenvalue(0);
            if let Err(err) = self.calc_spectrum(n, hint) {
                error!("failed to compute eigenvalues: {err}");
            }
        }
        let m = n.min(self.spectrum.num_eigenvalues());
        self.spectrum.eigenvalues.slice(nd::s![..m]).to_owned()
    }

    /// Compute all eigenvalues (no eigenvectors) by dense decomposition,
    /// replacing the cached eigenvalues.
    pub fn calc_eigenvalues(&mut self) -> SpectrumResult<()> {
        let evals: RVec = self.H.to_dense().eigvalsh_into(la::UPLO::Lower)?;
        self.spectrum.eigenvalues = evals;
        Ok(())
    }

    /// Compute at least `num` of the lowest eigenpairs with the sparse
    /// shift-invert solver and merge them into the cache.
    ///
    /// `hint` should be a lower estimate of the ground-state energy, e.g. a
    /// previously computed one; the potential minimum is used otherwise. At
    /// least four pairs are always requested, with a subspace four times as
    /// large. If nothing converges, the solve is retried once with roughly
    /// twice as many pairs. The cache is replaced only by results at least as
    /// large as itself, so it never shrinks.
    pub fn calc_spectrum(&mut self, num: usize, hint: Option<f64>)
        -> SpectrumResult<EigenOutcome>
    {
        let dim = self.dim();
        let hint = hint.unwrap_or_else(|| {
            self.V.iter().copied().fold(f64::INFINITY, f64::min)
        });
        let sigma = hint - 1e-3 * hint.abs().max(1.0);
        let mut nev = num.max(4).min(dim - 1);
        let mut retried = false;
        loop {
            let ncv = (4 * nev).min(dim);
            let res = eigs::shift_invert(&self.H, EigsParams::new(nev, ncv, sigma))?;
            let nconv = res.len();
            if nconv == 0 {
                error!("eigensolve did not converge (nev: {nev}, ncv: {ncv})");
                if retried { return Ok(EigenOutcome::Failed); }
                let next = (2 * nev + 5).min(dim - 1);
                info!("recalculating eigenspectrum with {next} states instead of {nev}");
                nev = next;
                retried = true;
                continue;
            }
            if nconv < nev {
                error!(
                    "eigensolve did not converge (nev: {nev}, ncv: {ncv}); \
                    only {nconv} eigenpairs"
                );
            }
            self.merge(res.values, res.vectors);
            return if nconv < nev {
                Ok(EigenOutcome::Partial(nconv))
            } else {
                Ok(EigenOutcome::Converged(nconv))
            };
        }
    }

    fn merge(&mut self, values: RVec, vectors: nd::Array2<f64>) {
        if values.len() >= self.spectrum.num_eigenvalues() {
            self.spectrum.eigenvalues = values;
        }
        if vectors.ncols() >= self.spectrum.num_eigenvectors() {
            self.spectrum.eigenvectors = vectors;
        } else {
            warn!("discarding smaller eigenvector set");
        }
        self.spectrum.canonicalize();
    }
}

/// A grid plus a controllable potential, evaluating to a [`Hamiltonian`] at
/// each control value.
///
/// Also carries the momentum-space kinetic energies needed by split-operator
/// propagation.
#[derive(Clone, Debug)]
pub struct HamiltonianFn {
    hs: HilbertSpace,
    potential: Potential,
    p: RVec,
    T_p: RVec,
}

impl HamiltonianFn {
    /// Pair a grid with a potential.
    pub fn new(hs: &HilbertSpace, potential: Potential) -> Self {
        let p = hs.momenta();
        let T_p = hs.kinetic_momentum();
        Self { hs: hs.clone(), potential, p, T_p }
    }

    /// Free particle (`V = 0`).
    pub fn free(hs: &HilbertSpace) -> Self {
        Self::new(hs, Potential::Constant(nd::Array1::zeros(hs.dim())))
    }

    /// Evaluate to a concrete Hamiltonian at control value `u`.
    pub fn at(&self, u: f64) -> SpectrumResult<Hamiltonian> {
        Hamiltonian::new(&self.hs, &self.potential_at(u)?)
    }

    /// Potential at control value `u`, checked against the grid size.
    pub fn potential_at(&self, u: f64) -> Result<RVec, LengthError> {
        let V = self.potential.at(u);
        LengthError::check_len(self.hs.dim(), V.len())?;
        Ok(V)
    }

    /// Underlying grid.
    pub fn hilbert(&self) -> &HilbertSpace { &self.hs }

    /// Underlying potential.
    pub fn potential(&self) -> &Potential { &self.potential }

    /// Momentum grid in FFT ordering.
    pub fn momenta(&self) -> &RVec { &self.p }

    /// Kinetic energies `p² / 2` in FFT ordering.
    pub fn T_p(&self) -> &RVec { &self.T_p }
}
