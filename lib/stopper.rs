//! Stopping criteria for optimization runs.
//!
//! A [`Stopper`] is the logical OR of a list of [`StopComponent`]s, each a
//! named predicate over the [`OptimiserState`]. Components combine with `+`:
//! ```
//! use xcontrol::stopper::StopComponent;
//!
//! let stopper
//!     = StopComponent::fidelity(0.99)
//!     + StopComponent::iterations(100)
//!     + StopComponent::stall(50);
//! assert_eq!(stopper.len(), 3);
//! ```

use std::{ fmt, ops::Add, sync::Arc };
use tracing::info;
use crate::optimiser::OptimiserState;

/// Callback type for [`StopComponent`].
pub type StopFn = Arc<dyn Fn(&OptimiserState) -> bool + Send + Sync>;

/// A single named stopping predicate.
#[derive(Clone)]
pub struct StopComponent {
    text: String,
    criterion: StopFn,
}

impl fmt::Debug for StopComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StopComponent").field(&self.text).finish()
    }
}

impl StopComponent {
    /// Wrap an arbitrary predicate.
    pub fn custom<F>(text: impl Into<String>, criterion: F) -> Self
    where F: Fn(&OptimiserState) -> bool + Send + Sync + 'static
    {
        Self { text: text.into(), criterion: Arc::new(criterion) }
    }

    /// Stop once the best fidelity exceeds `fid`.
    pub fn fidelity(fid: f64) -> Self {
        Self::custom(
            format!("fidelity criterion reached ({fid})"),
            move |state| state.best.fid > fid,
        )
    }

    /// Stop once more than `iters` iterations have been performed.
    pub fn iterations(iters: usize) -> Self {
        Self::custom(
            format!("max iterations reached ({iters})"),
            move |state| state.num_iterations > iters,
        )
    }

    /// Stop once more than `steps` steps have passed without improving the
    /// best cost.
    pub fn stall(steps: usize) -> Self {
        Self::custom(
            format!("no improvement for {steps} steps"),
            move |state| state.steps_since_improvement > steps,
        )
    }

    /// Description of the criterion.
    pub fn text(&self) -> &str { &self.text }

    /// Evaluate the predicate.
    pub fn check(&self, state: &OptimiserState) -> bool { (self.criterion)(state) }
}

/// Logical OR of stopping predicates.
#[derive(Clone, Debug, Default)]
pub struct Stopper {
    components: Vec<StopComponent>,
}

impl From<StopComponent> for Stopper {
    fn from(component: StopComponent) -> Self {
        Self { components: vec![component] }
    }
}

impl Stopper {
    /// Create a stopper that never fires.
    pub fn new() -> Self { Self::default() }

    /// Number of components.
    pub fn len(&self) -> usize { self.components.len() }

    /// Return `true` if there are no components.
    pub fn is_empty(&self) -> bool { self.components.is_empty() }

    /// Components in evaluation order.
    pub fn components(&self) -> &[StopComponent] { &self.components }

    /// Return the description of the first satisfied component, if any.
    pub fn check(&self, state: &OptimiserState) -> Option<&str> {
        let fired = self.components.iter().find(|c| c.check(state))?;
        info!("stopping: {}", fired.text);
        Some(fired.text())
    }
}

impl Add<StopComponent> for Stopper {
    type Output = Stopper;

    fn add(mut self, component: StopComponent) -> Stopper {
        self.components.push(component);
        self
    }
}

impl Add<StopComponent> for StopComponent {
    type Output = Stopper;

    fn add(self, rhs: StopComponent) -> Stopper { Stopper::from(self) + rhs }
}

impl Add<Stopper> for StopComponent {
    type Output = Stopper;

    fn add(self, mut rhs: Stopper) -> Stopper {
        rhs.components.insert(0, self);
        rhs
    }
}

impl Add for Stopper {
    type Output = Stopper;

    fn add(mut self, rhs: Stopper) -> Stopper {
        self.components.extend(rhs.components);
        self
    }
}
