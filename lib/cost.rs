//! Cost functions scoring a control sequence.
//!
//! A [`Cost`] is built from one or more [`StateTransfer`]s, each propagating
//! an initial state under the control and comparing the result to a target,
//! plus any number of weighted [`ControlCost`] penalties that depend on the
//! control alone. For `n` simultaneous transfers with overlaps
//! `⟨ψ_t,j|ψ_f,j⟩`, the fidelity is
//! ```text
//! F = |Σ_j ⟨ψ_t,j|ψ_f,j⟩|² / n²
//! ```
//! and the cost to be minimized is `-F` plus the penalties.

use std::{ cmp::Ordering, fmt, ops::{ Add, Mul }, sync::Arc };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Arr1,
    error::{ CostError, LengthError, PropagateError },
    stepper::{ Propagate, SplitStepper },
    vectors::{ CVec, Promote, RVec, dot, fidelity, mean, norm, normalized, promote },
};

pub type CostResult<T> = Result<T, CostError>;

// largest squared overlap allowed between the states of two simultaneous
// transfers
const ORTHO_TOL: f64 = 1e-6;

/// Result of evaluating a single control.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluatedControl {
    /// The control sequence.
    pub control: RVec,
    /// Total cost.
    pub cost: f64,
    /// Transfer fidelity.
    pub fid: f64,
    /// Smallest final-state norm over all transfers.
    pub norm: f64,
}

impl Default for EvaluatedControl {
    fn default() -> Self { Self::unevaluated() }
}

impl EvaluatedControl {
    /// Placeholder worse than every real evaluation.
    pub fn unevaluated() -> Self {
        Self {
            control: nd::Array1::zeros(0),
            cost: f64::INFINITY,
            fid: 0.0,
            norm: 0.0,
        }
    }

    /// Order by cost.
    pub fn cmp_cost(&self, other: &Self) -> Ordering {
        self.cost.total_cmp(&other.cost)
    }

    /// Return `true` if `self` has strictly lower cost than `other`.
    pub fn improves_on(&self, other: &Self) -> bool { self.cost < other.cost }
}

/// Transfer of one initial state toward one target state.
#[derive(Clone, Debug)]
pub struct StateTransfer<P = SplitStepper> {
    stepper: P,
    psi_0: CVec,
    psi_t: CVec,
}

impl<P> StateTransfer<P>
where P: Propagate
{
    /// Create a new transfer, normalizing both states.
    ///
    /// Fails if either state has zero norm or a length different from the
    /// stepper's grid.
    pub fn new<S, T, A, B>(stepper: P, psi_0: &Arr1<S>, psi_t: &Arr1<T>)
        -> CostResult<Self>
    where
        S: nd::Data<Elem = A>,
        T: nd::Data<Elem = B>,
        A: Promote<C64, Output = C64>,
        B: Promote<C64, Output = C64>,
    {
        LengthError::check_len(stepper.dim(), psi_0.len())?;
        LengthError::check_len(stepper.dim(), psi_t.len())?;
        let psi_0 = normalized(&promote(psi_0)).ok_or(PropagateError::ZeroNorm)?;
        let psi_t = normalized(&promote(psi_t)).ok_or(PropagateError::ZeroNorm)?;
        Ok(Self { stepper, psi_0, psi_t })
    }

    /// Normalized initial state.
    pub fn psi_0(&self) -> &CVec { &self.psi_0 }

    /// Normalized target state.
    pub fn psi_t(&self) -> &CVec { &self.psi_t }

    /// The owned stepper, holding the final state of the last evaluation.
    pub fn stepper(&self) -> &P { &self.stepper }

    /// Evolve the initial state under `control`, returning the overlap
    /// `⟨ψ_t|ψ_f⟩` and the norm of the final state `ψ_f`.
    pub fn evaluate(&mut self, control: &RVec) -> CostResult<(C64, f64)> {
        self.stepper.evolve(&self.psi_0, control)?;
        let psi_f = self.stepper.state().ok_or(PropagateError::Uninitialized)?;
        Ok((dot(&self.psi_t, psi_f), norm(psi_f)))
    }

    /// Evolve the initial state under `control` and return `|⟨ψ_t|ψ_f⟩|²`.
    pub fn fidelity(&mut self, control: &RVec) -> CostResult<f64> {
        self.evaluate(control).map(|(overlap, _)| overlap.norm_sqr())
    }
}

/// Callback type for [`ControlCost`].
pub type ControlCostFn = Arc<dyn Fn(&RVec) -> f64 + Send + Sync>;

/// Weighted penalty depending only on the control.
///
/// The empty control always costs zero. Weights scale by multiplication:
/// ```
/// use ndarray as nd;
/// use xcontrol::cost::ControlCost;
///
/// let reg = 0.5 * ControlCost::regularisation();
/// assert_eq!(reg.weight(), 0.5);
/// assert_eq!(reg.eval(&nd::array![1.0, -3.0]), 2.5);
/// ```
#[derive(Clone)]
pub struct ControlCost {
    weight: f64,
    name: &'static str,
    f: ControlCostFn,
}

impl fmt::Debug for ControlCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlCost")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

impl ControlCost {
    /// Wrap an arbitrary penalty with unit weight.
    pub fn new<F>(name: &'static str, f: F) -> Self
    where F: Fn(&RVec) -> f64 + Send + Sync + 'static
    {
        Self { weight: 1.0, name, f: Arc::new(f) }
    }

    /// Mean square of the control.
    pub fn regularisation() -> Self {
        Self::new("regularisation", |u| mean(&u.mapv(|uk| uk * uk)))
    }

    /// Mean square of the amount by which the control leaves `[min, max]`.
    pub fn boundaries(min: f64, max: f64) -> Self {
        Self::new(
            "boundaries",
            move |u| {
                mean(&u.mapv(|uk| {
                    let excess = (uk - max).max(0.0) + (uk - min).min(0.0);
                    excess * excess
                }))
            },
        )
    }

    /// [`Self::boundaries`] over `[-bound, bound]`.
    pub fn symmetric_boundaries(bound: f64) -> Self {
        Self::boundaries(-bound, bound)
    }

    /// Penalty weight.
    pub fn weight(&self) -> f64 { self.weight }

    /// Descriptive name.
    pub fn name(&self) -> &'static str { self.name }

    /// Weighted penalty for `u`.
    pub fn eval(&self, u: &RVec) -> f64 {
        if u.is_empty() { 0.0 } else { self.weight * (self.f)(u) }
    }
}

impl Mul<f64> for ControlCost {
    type Output = ControlCost;

    fn mul(mut self, weight: f64) -> ControlCost {
        self.weight *= weight;
        self
    }
}

impl Mul<ControlCost> for f64 {
    type Output = ControlCost;

    fn mul(self, cost: ControlCost) -> ControlCost { cost * self }
}

/// Aggregate cost over simultaneous state transfers and control penalties.
#[derive(Clone, Debug)]
pub struct Cost<P = SplitStepper> {
    transfers: Vec<StateTransfer<P>>,
    components: Vec<ControlCost>,
    fpp: usize,
}

impl<P> Default for Cost<P> {
    fn default() -> Self {
        Self { transfers: Vec::new(), components: Vec::new(), fpp: 0 }
    }
}

impl<P> From<StateTransfer<P>> for Cost<P> {
    fn from(transfer: StateTransfer<P>) -> Self {
        Self { transfers: vec![transfer], components: Vec::new(), fpp: 0 }
    }
}

impl<P> Cost<P>
where P: Propagate
{
    /// Create an empty cost.
    pub fn new() -> Self { Self::default() }

    /// Add a state transfer.
    ///
    /// The new initial state must be orthogonal to every existing initial
    /// state, and likewise for the target states.
    pub fn add_transfer(&mut self, transfer: StateTransfer<P>) -> CostResult<()> {
        for other in self.transfers.iter() {
            LengthError::check(&other.psi_0, &transfer.psi_0)?;
            let overlap
                = fidelity(&other.psi_0, &transfer.psi_0)
                .max(fidelity(&other.psi_t, &transfer.psi_t));
            if overlap > ORTHO_TOL {
                return Err(CostError::NonOrthogonal { overlap });
            }
        }
        self.transfers.push(transfer);
        Ok(())
    }

    /// [`Self::add_transfer`], by value.
    pub fn with_transfer(mut self, transfer: StateTransfer<P>) -> CostResult<Self> {
        self.add_transfer(transfer)?;
        Ok(self)
    }

    /// Add a control penalty.
    pub fn add_control_cost(&mut self, component: ControlCost) {
        self.components.push(component);
    }

    /// Absorb all transfers and penalties of `other`, summing the
    /// propagation counts.
    pub fn merge(mut self, other: Self) -> CostResult<Self> {
        for transfer in other.transfers.into_iter() {
            self.add_transfer(transfer)?;
        }
        self.components.extend(other.components);
        self.fpp += other.fpp;
        Ok(self)
    }

    /// State transfers.
    pub fn transfers(&self) -> &[StateTransfer<P>] { &self.transfers }

    /// Control penalties.
    pub fn components(&self) -> &[ControlCost] { &self.components }

    /// Number of full-path propagations performed so far.
    pub fn fpp(&self) -> usize { self.fpp }

    /// Score `control`.
    pub fn evaluate(&mut self, control: &RVec) -> CostResult<EvaluatedControl> {
        if self.transfers.is_empty() { return Err(CostError::NoTransfers); }
        let mut overlap = C64::from(0.0);
        let mut min_norm: f64 = 1.0;
        for transfer in self.transfers.iter_mut() {
            let (o, n) = transfer.evaluate(control)?;
            overlap += o;
            min_norm = min_norm.min(n);
            self.fpp += 1;
        }
        let n = self.transfers.len() as f64;
        let fid = overlap.norm_sqr() / (n * n);
        let penalty: f64 = self.components.iter().map(|c| c.eval(control)).sum();
        Ok(EvaluatedControl {
            control: control.clone(),
            cost: penalty - fid,
            fid,
            norm: min_norm,
        })
    }
}

impl<P> Add<ControlCost> for Cost<P> {
    type Output = Cost<P>;

    fn add(mut self, component: ControlCost) -> Cost<P> {
        self.components.push(component);
        self
    }
}

impl<P> Add<Cost<P>> for ControlCost {
    type Output = Cost<P>;

    fn add(self, cost: Cost<P>) -> Cost<P> { cost + self }
}
