//! Time propagation of wavefunctions under a controlled potential.
//!
//! [`SplitStepper`] implements the symmetric split-operator scheme
//! ```text
//! ψ(t + dt) ≈ exp(-i T dt/2) exp(-i V(u) dt) exp(-i T dt/2) ψ(t)
//! ```
//! where the kinetic factors are applied in the momentum representation
//! (reached by FFT) and the potential factor in the position representation.
//! Over a whole control sequence the trailing half kinetic step of one step and
//! the leading half step of the next are fused into a single full step.
//!
//! In all 2D arrays, the first (or zero-th) axis indexes time.

use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::warn;
use crate::{
    error::{ LengthError, PropagateError },
    hamiltonian::HamiltonianFn,
    potential::Potential,
    utils::{ Fourier, fft_shift },
    vectors::{ CVec, RVec, abs2, expi, norm, planck_taper },
};

pub type PropagateResult<T> = Result<T, PropagateError>;

// strength of the absorbing boundary potential
const ABSORB_STRENGTH: f64 = 100.0;

// fraction of the grid over which the absorber ramps in
const ABSORB_TAPER: f64 = 1.0 / 8.0;

// tolerated deviation from unit norm before an initial state is reported
const NORM_TOL: f64 = 1e-10;

/// Plottable parts of a state vector.
#[derive(Clone, Debug, PartialEq)]
pub struct StateComponents {
    /// Real part.
    pub re: RVec,
    /// Imaginary part.
    pub im: RVec,
    /// Probability density `|ψ|²`.
    pub abs2: RVec,
}

/// Common interface for wavefunction propagators.
///
/// A propagator is either uninitialized (holding no state) or primed with a
/// normalized state, which [`step`][Self::step] advances in place.
pub trait Propagate {
    /// Load a new initial state, normalizing it.
    fn reset(&mut self, psi_0: &CVec) -> PropagateResult<()>;

    /// Advance the held state by one time step under control value `u`.
    fn step(&mut self, u: f64) -> PropagateResult<()>;

    /// Reset to `psi_0` and advance through the whole control sequence, one
    /// step per entry.
    ///
    /// The result must match repeated calls to [`step`][Self::step]; an empty
    /// control leaves the normalized `psi_0`.
    fn evolve(&mut self, psi_0: &CVec, control: &RVec) -> PropagateResult<()>;

    /// The current state, if initialized.
    fn state(&self) -> Option<&CVec>;

    /// Grid dimension.
    fn dim(&self) -> usize;

    /// Time step.
    fn dt(&self) -> f64;

    /// Grid spacing.
    fn dx(&self) -> f64;

    /// Real part, imaginary part and density of the current state.
    fn state_components(&self) -> Option<StateComponents> {
        self.state()
            .map(|psi| {
                StateComponents {
                    re: psi.mapv(|z| z.re),
                    im: psi.mapv(|z| z.im),
                    abs2: abs2(psi),
                }
            })
    }
}

/// Split-operator Fourier propagator.
#[derive(Clone, Debug)]
pub struct SplitStepper {
    dt: f64,
    dx: f64,
    potential: Potential,
    p: RVec,
    T_exp_2: CVec,
    T_exp: CVec,
    absorber: RVec,
    fourier: Fourier,
    psi: Option<CVec>,
}

impl SplitStepper {
    /// Precompute the kinetic phase factors for time step `dt` from the
    /// momentum-space energies of `H`.
    ///
    /// With `absorbing = true`, every potential step also damps the state by
    /// `exp(-100 dt)` in the outer eighths of the grid, ramping in smoothly.
    pub fn new(dt: f64, H: &HamiltonianFn, absorbing: bool) -> Self {
        let hs = H.hilbert();
        let n = hs.dim();
        let T_exp_2 = expi(&(H.T_p() * (-dt / 2.0)));
        let T_exp = expi(&(H.T_p() * (-dt)));
        let absorber: RVec
            = if absorbing {
                planck_taper(&RVec::ones(n), ABSORB_TAPER)
                    .mapv(|w| (-dt * ABSORB_STRENGTH * (1.0 - w)).exp())
            } else {
                RVec::ones(n)
            };
        Self {
            dt,
            dx: hs.dx(),
            potential: H.potential().clone(),
            p: H.momenta().clone(),
            T_exp_2,
            T_exp,
            absorber,
            fourier: Fourier::new(n),
            psi: None,
        }
    }

    /// Return `true` if a state is loaded.
    pub fn is_primed(&self) -> bool { self.psi.is_some() }

    /// Propagate `psi_0` through `control`, recording every intermediate
    /// state.
    ///
    /// Row `k` of the output holds the state after `k` steps, so the output
    /// has `control.len() + 1` rows.
    pub fn trajectory(&mut self, psi_0: &CVec, control: &RVec)
        -> PropagateResult<nd::Array2<C64>>
    {
        self.reset(psi_0)?;
        let mut q: nd::Array2<C64>
            = nd::Array2::zeros((control.len() + 1, self.dim()));
        if let Some(psi) = self.psi.as_ref() {
            q.row_mut(0).assign(psi);
        }
        for (&u, mut qk) in control.iter().zip(q.outer_iter_mut().skip(1)) {
            self.step(u)?;
            if let Some(psi) = self.psi.as_ref() { qk.assign(psi); }
        }
        Ok(q)
    }

    /// Momentum-space probability density of the current state, paired with
    /// the momenta in ascending order.
    pub fn momentum_density(&mut self) -> Option<(RVec, RVec)> {
        let Self { fourier, psi, p, .. } = self;
        let mut phi = psi.as_ref()?.clone();
        fourier.forward(&mut phi);
        let density = abs2(&phi) / phi.len() as f64;
        Some((fft_shift(&*p), fft_shift(&density)))
    }

    // position-space potential phase at control `u`, including the absorber
    fn potential_phase(&self, u: f64) -> PropagateResult<CVec> {
        let V = self.potential.at(u);
        LengthError::check_len(self.absorber.len(), V.len())?;
        let dt = self.dt;
        Ok(
            nd::Zip::from(&V).and(&self.absorber)
                .map_collect(|Vk, ak| C64::cis(-dt * Vk) * *ak)
        )
    }
}

// multiply by a phase factor in momentum space
fn apply_kinetic(fourier: &mut Fourier, psi: &mut CVec, phase: &CVec) {
    fourier.forward(psi);
    *psi *= phase;
    fourier.inverse(psi);
}

impl Propagate for SplitStepper {
    fn reset(&mut self, psi_0: &CVec) -> PropagateResult<()> {
        LengthError::check_len(self.dim(), psi_0.len())?;
        let nrm = norm(psi_0);
        if nrm == 0.0 || !nrm.is_finite() { return Err(PropagateError::ZeroNorm); }
        if (nrm - 1.0).abs() > NORM_TOL {
            warn!("initial state has norm {nrm:.6e}; renormalizing");
        }
        self.psi = Some(psi_0 / C64::from(nrm));
        Ok(())
    }

    fn step(&mut self, u: f64) -> PropagateResult<()> {
        let V_exp = self.potential_phase(u)?;
        let Self { fourier, psi, T_exp_2, .. } = self;
        let psi = psi.as_mut().ok_or(PropagateError::Uninitialized)?;
        apply_kinetic(fourier, psi, T_exp_2);
        *psi *= &V_exp;
        apply_kinetic(fourier, psi, T_exp_2);
        Ok(())
    }

    fn evolve(&mut self, psi_0: &CVec, control: &RVec) -> PropagateResult<()> {
        self.reset(psi_0)?;
        let Some((&u_last, rest)) = control.as_slice().and_then(|c| c.split_last())
        else {
            if control.is_empty() { return Ok(()); }
            // non-contiguous control; fall back to plain steps
            return control.iter().try_for_each(|&u| self.step(u));
        };
        let mut V_exp: CVec;
        let Some(mut psi) = self.psi.take() else {
            return Err(PropagateError::Uninitialized);
        };
        self.fourier.forward(&mut psi);
        psi *= &self.T_exp_2;
        for &u in rest.iter() {
            V_exp = self.potential_phase(u)?;
            self.fourier.inverse(&mut psi);
            psi *= &V_exp;
            self.fourier.forward(&mut psi);
            psi *= &self.T_exp;
        }
        V_exp = self.potential_phase(u_last)?;
        self.fourier.inverse(&mut psi);
        psi *= &V_exp;
        apply_kinetic(&mut self.fourier, &mut psi, &self.T_exp_2);
        self.psi = Some(psi);
        Ok(())
    }

    fn state(&self) -> Option<&CVec> { self.psi.as_ref() }

    fn dim(&self) -> usize { self.absorber.len() }

    fn dt(&self) -> f64 { self.dt }

    fn dx(&self) -> f64 { self.dx }
}

#[cfg(test)]
mod tests {
    use rand::{ Rng, SeedableRng, rngs::StdRng };
    use crate::{ hilbert::HilbertSpace, vectors::{ fidelity, promote } };
    use super::*;

    fn harmonic(dim: usize, half_width: f64) -> HamiltonianFn {
        let hs = HilbertSpace::symmetric(dim, half_width).unwrap();
        let V = hs.x().mapv(|x| 0.5 * x.powi(2));
        HamiltonianFn::new(&hs, Potential::amplitude(&hs, &V).unwrap())
    }

    fn gaussian(H: &HamiltonianFn, x0: f64) -> CVec {
        H.hilbert().x().mapv(|x| C64::from((-(x - x0).powi(2)).exp()))
    }

    #[test]
    fn uninitialized_step_fails() {
        let H = harmonic(64, 5.0);
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        assert!(!stepper.is_primed());
        assert!(matches!(stepper.step(1.0), Err(PropagateError::Uninitialized)));
        assert!(stepper.state().is_none());
        assert!(matches!(
            stepper.reset(&CVec::zeros(64)),
            Err(PropagateError::ZeroNorm),
        ));
        assert!(matches!(
            stepper.reset(&CVec::ones(3)),
            Err(PropagateError::Length(_)),
        ));
    }

    #[test]
    fn reset_normalizes() {
        let H = harmonic(64, 5.0);
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        stepper.reset(&(gaussian(&H, 0.5) * C64::from(3.0))).unwrap();
        assert!((norm(stepper.state().unwrap()) - 1.0).abs() < 1e-14);
        let parts = stepper.state_components().unwrap();
        let total: f64 = parts.abs2.sum();
        assert!((total - 1.0).abs() < 1e-14);
        assert!(parts.im.iter().all(|im| *im == 0.0));
    }

    #[test]
    fn norm_preserved_for_random_controls() {
        let H = harmonic(64, 5.0);
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        let psi_0 = gaussian(&H, 0.3);
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..100 {
            let len: usize = rng.gen_range(1..=10_000);
            let control: RVec
                = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
            stepper.evolve(&psi_0, &control).unwrap();
            assert!((norm(stepper.state().unwrap()) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn step_matches_evolve() {
        let H = harmonic(64, 5.0);
        let psi_0 = gaussian(&H, -0.7);
        let mut a = SplitStepper::new(2e-3, &H, false);
        let mut b = a.clone();
        for n in [1_usize, 2, 10, 1000] {
            let u = 0.8;
            a.reset(&psi_0).unwrap();
            (0..n).for_each(|_| a.step(u).unwrap());
            b.evolve(&psi_0, &RVec::from_elem(n, u)).unwrap();
            let (sa, sb) = (a.state().unwrap(), b.state().unwrap());
            assert!(sa.iter().zip(sb).all(|(x, y)| (x - y).norm() < 1e-9));
        }
    }

    #[test]
    fn empty_control_keeps_initial_state() {
        let H = harmonic(64, 5.0);
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        let psi_0 = gaussian(&H, 0.0);
        stepper.evolve(&psi_0, &RVec::zeros(0)).unwrap();
        let expected = &psi_0 / C64::from(norm(&psi_0));
        assert_eq!(stepper.state().unwrap(), &expected);
    }

    #[test]
    fn eigenstate_is_stationary() {
        let H = harmonic(128, 8.0);
        let mut Hs = H.at(1.0).unwrap();
        let psi_0 = promote(&Hs.eigenvector(0));
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        stepper.evolve(&psi_0, &RVec::ones(100)).unwrap();
        assert!(fidelity(&psi_0, stepper.state().unwrap()) > 1.0 - 1e-5);
    }

    #[test]
    fn trajectory_records_every_step() {
        let H = harmonic(64, 5.0);
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        let psi_0 = gaussian(&H, 1.0);
        let control: RVec = nd::array![0.5, 1.0, 1.5];
        let q = stepper.trajectory(&psi_0, &control).unwrap();
        assert_eq!(q.dim(), (4, 64));
        let last = stepper.state().unwrap().clone();
        let mut other = stepper.clone();
        other.evolve(&psi_0, &control).unwrap();
        assert!(q.row(3).iter().zip(other.state().unwrap()).all(|(x, y)| (x - y).norm() < 1e-12));
        assert!(q.row(3).iter().zip(&last).all(|(x, y)| x == y));
    }

    #[test]
    fn absorber_removes_edge_density() {
        let H = harmonic(128, 8.0);
        let mut stepper = SplitStepper::new(1e-3, &H, true);
        stepper.evolve(&gaussian(&H, 7.5), &RVec::zeros(200)).unwrap();
        assert!(norm(stepper.state().unwrap()) < 0.99);
        let mut clean = SplitStepper::new(1e-3, &H, true);
        clean.evolve(&gaussian(&H, 0.0), &RVec::zeros(200)).unwrap();
        assert!((norm(clean.state().unwrap()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn momentum_density_is_normalized_and_sorted() {
        let H = harmonic(64, 5.0);
        let mut stepper = SplitStepper::new(1e-3, &H, false);
        assert!(stepper.momentum_density().is_none());
        stepper.reset(&gaussian(&H, 0.0)).unwrap();
        let (p, rho) = stepper.momentum_density().unwrap();
        assert!(p.iter().zip(p.iter().skip(1)).all(|(a, b)| a < b));
        assert!((rho.sum() - 1.0).abs() < 1e-12);
    }
}
