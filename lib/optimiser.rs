//! Dressed chopped random basis (dCRAB) optimization.
//!
//! [`Dcrab`] searches the coefficients of a [`Basis`] with the Nelder-Mead
//! simplex method, scoring each coefficient vector by the [`Cost`] of the
//! control it selects. When the search stalls (any [`Stopper`] component
//! fires, the simplex collapses, or the cost landscape goes flat) the best
//! coefficients are frozen together with their basis, a fresh basis is drawn,
//! and the search restarts on top of the frozen control. After the requested
//! number of such dressings the next stall terminates the run.
//!
//! The control evaluated for coefficients `c` is
//! ```text
//! u = basis.control(c) + Σ_k dressed_basis_k.control(dressed_coeffs_k)
//! ```

use std::fmt;
use ndarray as nd;
use rand::{ SeedableRng, rngs::StdRng };
use tracing::{ debug, info };
use crate::{
    basis::Basis,
    cost::{ Cost, EvaluatedControl },
    error::OptimError,
    stepper::{ Propagate, SplitStepper },
    stopper::Stopper,
    vectors::{ RVec, norm },
};

pub type OptimResult<T> = Result<T, OptimError>;

// Nelder-Mead reflection, expansion, contraction and shrink coefficients
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

// mean distance to the centroid below which the simplex is degenerate
const SIZE_EPSILON: f64 = 1e-3;

// best-to-worst cost gap below which the landscape is flat
const COST_EPSILON: f64 = 1e-5;

/// Read-only view of optimizer progress, passed to stoppers and savers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimiserState {
    /// Number of simplex steps taken.
    pub num_iterations: usize,
    /// Number of steps since the best cost last improved.
    pub steps_since_improvement: usize,
    /// Number of full-path propagations performed.
    pub fpp: usize,
    /// Best control found so far.
    pub best: EvaluatedControl,
    /// Number of dressings performed.
    pub dressings: usize,
}

/// Callback invoked once per iteration with the current state.
pub type SaveFn = Box<dyn FnMut(&OptimiserState) + Send>;

/// Lifecycle of a [`Dcrab`] run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No simplex has been generated.
    Initializing,
    /// Stepping the simplex.
    Searching,
    /// Freezing the best control and drawing a new basis.
    Dressing,
    /// The final stop condition has been met.
    Terminated,
}

/// Outcome of a single Nelder-Mead step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimplexMove {
    /// The reflected point replaced the worst point.
    Reflect,
    /// The expanded point replaced the worst point.
    Expand,
    /// A contraction toward the reflected point replaced the worst point.
    ContractReflection,
    /// A contraction toward the worst point replaced it.
    ContractWorst,
    /// All points moved halfway toward the best point.
    Shrink,
}

/// Why an optimization run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A stopper component fired; holds its description.
    Stopper(String),
    /// The simplex collapsed to a point.
    Degenerate,
    /// All simplex points have nearly equal cost.
    Flat,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopper(text) => write!(f, "{text}"),
            Self::Degenerate => write!(f, "simplex degenerate"),
            Self::Flat => write!(f, "cost landscape flat"),
        }
    }
}

/// Summary of a finished [`Dcrab::optimise`] run.
#[derive(Clone, Debug)]
pub struct OptimiseOutcome {
    /// Final stop condition.
    pub reason: StopReason,
    /// Best control found.
    pub best: EvaluatedControl,
    /// Total number of simplex steps.
    pub num_iterations: usize,
    /// Total number of full-path propagations.
    pub fpp: usize,
    /// Number of dressings performed.
    pub dressings: usize,
}

#[derive(Clone, Debug)]
struct SimplexPoint {
    coeffs: RVec,
    cost: f64,
}

/// dCRAB optimizer.
pub struct Dcrab<P = SplitStepper> {
    basis: Basis,
    dressed: Vec<(RVec, Basis)>,
    offset: RVec,
    stopper: Stopper,
    cost: Cost<P>,
    saver: SaveFn,
    rng: StdRng,
    simplex: Vec<SimplexPoint>,
    state: OptimiserState,
    phase: Phase,
}

impl<P> fmt::Debug for Dcrab<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dcrab")
            .field("basis", &self.basis)
            .field("dressings", &self.dressed.len())
            .field("stopper", &self.stopper)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

fn log_progress(state: &OptimiserState) {
    info!(
        iteration = state.num_iterations,
        fid = state.best.fid,
        cost = state.best.cost,
        "dCRAB",
    );
}

impl<P> Dcrab<P>
where P: Propagate
{
    /// Create a new optimizer drawing its random numbers from a generator
    /// seeded with `seed`.
    ///
    /// No cost is evaluated until [`init`][Self::init], [`step`][Self::step]
    /// or [`optimise`][Self::optimise] is called.
    pub fn new(basis: Basis, stopper: Stopper, cost: Cost<P>, seed: u64) -> Self {
        let offset = nd::Array1::zeros(basis.num_samples());
        Self {
            basis,
            dressed: Vec::new(),
            offset,
            stopper,
            cost,
            saver: Box::new(log_progress),
            rng: StdRng::seed_from_u64(seed),
            simplex: Vec::new(),
            state: OptimiserState::default(),
            phase: Phase::Initializing,
        }
    }

    /// Replace the default saver, which logs progress at `info` level.
    pub fn with_saver<F>(mut self, saver: F) -> Self
    where F: FnMut(&OptimiserState) + Send + 'static
    {
        self.saver = Box::new(saver);
        self
    }

    /// Current progress.
    pub fn state(&self) -> &OptimiserState { &self.state }

    /// Best control found so far.
    pub fn best(&self) -> &EvaluatedControl { &self.state.best }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase { self.phase }

    /// Basis currently searched.
    pub fn basis(&self) -> &Basis { &self.basis }

    /// Number of dressings performed.
    pub fn num_dressings(&self) -> usize { self.dressed.len() }

    /// Number of points in the simplex.
    pub fn simplex_size(&self) -> usize { self.simplex.len() }

    /// The cost function.
    pub fn cost(&self) -> &Cost<P> { &self.cost }

    /// Full control selected by `coeffs` in the current basis, including all
    /// frozen dressed controls.
    pub fn control(&self, coeffs: &RVec) -> OptimResult<RVec> {
        Ok(self.basis.control(coeffs)? + &self.offset)
    }

    fn evaluate(&mut self, coeffs: &RVec) -> OptimResult<EvaluatedControl> {
        let control = self.control(coeffs)?;
        Ok(self.cost.evaluate(&control)?)
    }

    fn update_best(&mut self, eval: EvaluatedControl) {
        if eval.improves_on(&self.state.best) {
            self.state.best = eval;
            self.state.steps_since_improvement = 0;
        }
    }

    fn sort_simplex(&mut self) {
        self.simplex.sort_by(|l, r| l.cost.total_cmp(&r.cost));
    }

    // evaluate `coeffs` and wrap it as a simplex point, updating the best
    // control
    fn point(&mut self, coeffs: RVec) -> OptimResult<SimplexPoint> {
        let eval = self.evaluate(&coeffs)?;
        let cost = eval.cost;
        self.update_best(eval);
        Ok(SimplexPoint { coeffs, cost })
    }

    // zero point plus one random point per coefficient
    fn generate_simplex(&mut self) -> OptimResult<()> {
        let dim = self.basis.num_coeffs();
        let mut simplex: Vec<SimplexPoint> = Vec::with_capacity(dim + 1);
        simplex.push(self.point(nd::Array1::zeros(dim))?);
        for _ in 0..dim {
            let coeffs = self.basis.random_coeffs(&mut self.rng);
            simplex.push(self.point(coeffs)?);
        }
        self.simplex = simplex;
        self.sort_simplex();
        self.state.fpp = self.cost.fpp();
        Ok(())
    }

    /// Reset the iteration counters and generate a new simplex in the current
    /// basis.
    pub fn init(&mut self) -> OptimResult<()> {
        self.state.num_iterations = 0;
        self.state.steps_since_improvement = 0;
        self.generate_simplex()?;
        self.phase = Phase::Searching;
        Ok(())
    }

    // centroid of all points but the worst
    fn centroid(&self) -> RVec {
        let n = self.simplex.len() - 1;
        let mut c: RVec = nd::Array1::zeros(self.basis.num_coeffs());
        self.simplex.iter().take(n).for_each(|pt| { c += &pt.coeffs; });
        c / n as f64
    }

    fn is_degenerate(&self) -> bool {
        let c = self.centroid();
        let n = self.simplex.len() - 1;
        let mean_dist: f64
            = self.simplex.iter().take(n)
            .map(|pt| norm(&(&c - &pt.coeffs)))
            .sum::<f64>() / n as f64;
        mean_dist < SIZE_EPSILON
    }

    fn is_flat(&self) -> bool {
        match (self.simplex.first(), self.simplex.last()) {
            (Some(best), Some(worst)) => worst.cost - best.cost < COST_EPSILON,
            _ => true,
        }
    }

    fn replace_worst(&mut self, point: SimplexPoint) {
        if let Some(worst) = self.simplex.last_mut() { *worst = point; }
    }

    /// Perform a single Nelder-Mead step, generating the simplex first if
    /// necessary.
    pub fn step(&mut self) -> OptimResult<SimplexMove> {
        if self.phase == Phase::Initializing { self.init()?; }
        self.state.num_iterations += 1;
        self.state.steps_since_improvement += 1;
        self.sort_simplex();

        let n = self.simplex.len();
        let best_cost = self.simplex[0].cost;
        let second_cost = self.simplex[n - 2].cost;
        let worst = self.simplex[n - 1].clone();
        let centroid = self.centroid();

        let reflection: RVec = &centroid + &((&centroid - &worst.coeffs) * ALPHA);
        let reflected = self.point(reflection.clone())?;

        if best_cost < reflected.cost && reflected.cost < second_cost {
            self.replace_worst(reflected);
            return Ok(SimplexMove::Reflect);
        }

        if reflected.cost < best_cost {
            let expansion: RVec = &centroid + &((&reflection - &centroid) * GAMMA);
            let expanded = self.point(expansion)?;
            return if expanded.cost < reflected.cost {
                self.replace_worst(expanded);
                Ok(SimplexMove::Expand)
            } else {
                self.replace_worst(reflected);
                Ok(SimplexMove::Reflect)
            };
        }

        if reflected.cost < worst.cost {
            let contraction: RVec = &centroid + &((&reflection - &centroid) * RHO);
            let contracted = self.point(contraction)?;
            if contracted.cost < reflected.cost {
                self.replace_worst(contracted);
                return Ok(SimplexMove::ContractReflection);
            }
        } else if worst.cost < reflected.cost {
            let contraction: RVec = &centroid + &((&worst.coeffs - &centroid) * RHO);
            let contracted = self.point(contraction)?;
            if contracted.cost < worst.cost {
                self.replace_worst(contracted);
                return Ok(SimplexMove::ContractWorst);
            }
        }

        let best = self.simplex[0].coeffs.clone();
        for k in 1..n {
            let shrunk: RVec = &best + &((&self.simplex[k].coeffs - &best) * SIGMA);
            self.simplex[k] = self.point(shrunk)?;
        }
        Ok(SimplexMove::Shrink)
    }

    // freeze the best coefficients with the current basis and restart the
    // search in a fresh one
    fn dress(&mut self) -> OptimResult<()> {
        self.phase = Phase::Dressing;
        info!("dressing the basis ({} times)", self.dressed.len());
        let new_basis = self.basis.generate_new_basis(&mut self.rng);
        let old_basis = std::mem::replace(&mut self.basis, new_basis);
        let frozen = self.simplex[0].coeffs.clone();
        self.offset += &old_basis.control(&frozen)?;
        self.dressed.push((frozen, old_basis));
        self.state.dressings = self.dressed.len();
        self.generate_simplex()?;
        self.state.steps_since_improvement = 0;
        self.phase = Phase::Searching;
        Ok(())
    }

    // first satisfied stop condition, if any
    fn stop_reason(&self) -> Option<StopReason> {
        if let Some(text) = self.stopper.check(&self.state) {
            Some(StopReason::Stopper(text.to_owned()))
        } else if self.is_degenerate() {
            info!("stopping: simplex degenerate");
            Some(StopReason::Degenerate)
        } else if self.is_flat() {
            info!("stopping: cost landscape flat");
            Some(StopReason::Flat)
        } else {
            None
        }
    }

    /// Run the optimization, dressing the basis up to `dressings` times.
    ///
    /// Every iteration sorts the simplex, passes the current state to the
    /// saver and checks the stop conditions before stepping. A satisfied
    /// stop condition triggers a dressing while fewer than `dressings` have
    /// been performed, and ends the run otherwise.
    pub fn optimise(&mut self, dressings: usize) -> OptimResult<OptimiseOutcome> {
        if self.phase == Phase::Initializing { self.init()?; }
        info!(
            basis_size = self.basis.num_basis_vectors(),
            dressings,
            "dCRAB optimise",
        );
        self.phase = Phase::Searching;
        let reason
            = loop {
                self.sort_simplex();
                self.state.fpp = self.cost.fpp();
                self.state.dressings = self.dressed.len();
                (self.saver)(&self.state);
                if let Some(reason) = self.stop_reason() {
                    if self.dressed.len() < dressings {
                        self.dress()?;
                    } else {
                        break reason;
                    }
                }
                let mv = self.step()?;
                debug!(iteration = self.state.num_iterations, ?mv, "simplex step");
            };
        self.phase = Phase::Terminated;
        let best = self.state.best.clone();
        info!(
            iterations = self.state.num_iterations,
            fpp = self.state.fpp,
            fid = best.fid,
            norm = best.norm,
            cost = best.cost,
            "dCRAB finished: {reason}",
        );
        Ok(OptimiseOutcome {
            reason,
            best,
            num_iterations: self.state.num_iterations,
            fpp: self.state.fpp,
            dressings: self.dressed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{ Arc, Mutex };
    use crate::{
        basis::BasisMode,
        cost::{ ControlCost, StateTransfer },
        hamiltonian::HamiltonianFn,
        hilbert::HilbertSpace,
        potential::Potential,
        stopper::StopComponent,
        time::Time,
    };
    use super::*;

    // transfer between the two lowest states of a shaken harmonic trap on a
    // coarse grid
    fn problem(stopper: Stopper) -> Dcrab {
        let hs = HilbertSpace::symmetric(64, 6.0).unwrap();
        let V = hs.x().mapv(|x| 0.5 * x * x);
        let H = HamiltonianFn::new(&hs, Potential::shaken(&hs, &V).unwrap());
        let mut H0 = H.at(0.0).unwrap();
        let (e0, e1) = (H0.eigenvector(0), H0.eigenvector(1));
        let time = Time::new(1e-2, 200);
        let stepper = SplitStepper::new(time.dt, &H, false);
        let cost
            = Cost::from(StateTransfer::new(stepper, &e0, &e1).unwrap())
            + 1e-4 * ControlCost::regularisation();
        let mut rng = StdRng::seed_from_u64(3);
        let basis
            = Basis::trig(&time.controls(), 3.0, BasisMode::AmpFreq, 2, &mut rng)
            .unwrap()
            .with_max_amp(1.0)
            .unwrap();
        Dcrab::new(basis, stopper, cost, 11)
    }

    #[test]
    fn simplex_has_one_more_point_than_coefficients() {
        let mut opt = problem(Stopper::new());
        assert_eq!(opt.phase(), Phase::Initializing);
        assert_eq!(opt.simplex_size(), 0);
        opt.init().unwrap();
        assert_eq!(opt.phase(), Phase::Searching);
        assert_eq!(opt.simplex_size(), opt.basis().num_coeffs() + 1);
        assert_eq!(opt.cost().fpp(), 6);
        assert!(opt.best().cost.is_finite());
    }

    #[test]
    fn steps_count_iterations() {
        let mut opt = problem(Stopper::new());
        let mut last = f64::INFINITY;
        for k in 1..=10 {
            opt.step().unwrap();
            assert_eq!(opt.state().num_iterations, k);
            assert!(opt.best().cost <= last);
            last = opt.best().cost;
            assert_eq!(opt.simplex_size(), 6);
        }
    }

    #[test]
    fn best_cost_never_increases() {
        let costs: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let record = costs.clone();
        let mut opt
            = problem(StopComponent::iterations(30).into())
            .with_saver(move |state| {
                record.lock().unwrap().push(state.best.cost);
            });
        let outcome = opt.optimise(0).unwrap();
        assert_eq!(opt.phase(), Phase::Terminated);
        assert_eq!(outcome.dressings, 0);
        let costs = costs.lock().unwrap();
        assert!(!costs.is_empty());
        assert!(costs.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*costs.last().unwrap(), outcome.best.cost);
        assert!(outcome.best.fid >= 0.0 && outcome.best.fid <= 1.0 + 1e-9);
    }

    #[test]
    fn dresses_before_stopping() {
        let mut opt = problem(StopComponent::iterations(5).into());
        let outcome = opt.optimise(2).unwrap();
        assert_eq!(outcome.dressings, 2);
        assert_eq!(opt.num_dressings(), 2);
        assert_eq!(opt.phase(), Phase::Terminated);
        assert!(outcome.num_iterations >= 2);
        assert_eq!(outcome.fpp, opt.cost().fpp());
        assert_eq!(outcome.best.control.len(), 200);
    }

    // a rigidly displaced harmonic trap only ever produces coherent states,
    // whose overlap with the first excited level is |α|² exp(-|α|²) ≤ 1/e
    #[test]
    fn approaches_coherent_state_bound() {
        let hs = HilbertSpace::symmetric(64, 6.0).unwrap();
        let V = hs.x().mapv(|x| 0.5 * x * x);
        let H = HamiltonianFn::new(&hs, Potential::shaken(&hs, &V).unwrap());
        let mut H0 = H.at(0.0).unwrap();
        let (e0, e1) = (H0.eigenvector(0), H0.eigenvector(1));
        let time = Time::new(2e-2, 300);
        let stepper = SplitStepper::new(time.dt, &H, false);
        let mut cost = Cost::from(StateTransfer::new(stepper, &e0, &e1).unwrap());
        let zero_fid = cost.evaluate(&RVec::zeros(time.num_steps)).unwrap().fid;
        assert!(zero_fid < 1e-10);

        let mut rng = StdRng::seed_from_u64(5);
        let basis
            = Basis::sin(&time.controls(), 1.0, BasisMode::AmpFreq, 2, &mut rng)
            .unwrap()
            .with_max_amp(3.0)
            .unwrap();
        let stopper
            = StopComponent::fidelity(0.34)
            + StopComponent::iterations(80);
        let mut opt = Dcrab::new(basis, stopper, cost, 7);
        let outcome = opt.optimise(2).unwrap();
        let bound = (-1.0_f64).exp();
        assert!(outcome.best.fid > 0.3);
        assert!(outcome.best.fid < bound + 1e-2);
        assert!(outcome.best.fid > 100.0 * zero_fid);
    }
}
