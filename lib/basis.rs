//! Random bases of smooth, tapered control waveforms.
//!
//! A [`Basis`] holds `count` sinusoids with randomly drawn frequencies (and,
//! for [`Basis::trig`], phases), each windowed by a Planck taper so that every
//! generated control starts and ends at zero. A coefficient vector selects a
//! control from the basis:
//! ```text
//! [ c0, (a_1, f_1, p_1), (a_2, f_2, p_2), ... ]
//! ```
//! where `c0` sets the overall amplitude and each group weights (`a`), detunes
//! (`f`) and dephases (`p`) one basis function. Which of `f` and `p` are
//! present depends on the [`BasisMode`].
//!
//! ```
//! use rand::{ SeedableRng, rngs::StdRng };
//! use xcontrol::{ basis::{ Basis, BasisMode }, time::Time };
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let t = Time::new(1e-3, 2000).controls();
//! let basis = Basis::trig(&t, 8.5, BasisMode::AmpFreqPhase, 10, &mut rng)
//!     .unwrap()
//!     .with_max_amp(2.0)
//!     .unwrap();
//! assert_eq!(basis.num_coeffs(), 31);
//! let mut coeffs = basis.random_coeffs(&mut rng);
//! coeffs[0] = 1.0;
//! let control = basis.control(&coeffs).unwrap();
//! assert_eq!(control.iter().fold(0.0_f64, |acc, u| acc.max(u.abs())), 2.0);
//! ```

use std::f64::consts::{ PI, TAU };
use ndarray as nd;
use rand::Rng;
use serde::Deserialize;
use crate::{
    Arr1,
    error::BasisError,
    vectors::{ RVec, planck_taper },
};

pub type BasisResult<T> = Result<T, BasisError>;

// exponent of the power law mapping uniform samples onto frequencies; values
// below 1 weight the draw toward the maximum frequency
const FREQ_EXPONENT: f64 = 0.5;

// fraction of the time series over which each basis function ramps in and out
const TAPER_RATIO: f64 = 1.0 / 8.0;

/// Shape of each basis function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BasisFamily {
    /// `sin(f t)`.
    Sin,
    /// `cos(f t)`.
    Cos,
    /// `sin(f t + φ)` with random phase `φ`.
    Trig,
}

/// Which per-function parameters a coefficient vector controls.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisMode {
    /// Amplitude only.
    Amp,
    /// Amplitude and frequency detuning.
    AmpFreq,
    /// Amplitude and phase offset.
    AmpPhase,
    /// Amplitude, frequency detuning and phase offset.
    AmpFreqPhase,
}

impl BasisMode {
    /// Number of coefficients per basis function.
    pub fn arity(&self) -> usize {
        match self {
            Self::Amp => 1,
            Self::AmpFreq | Self::AmpPhase => 2,
            Self::AmpFreqPhase => 3,
        }
    }

    fn has_freq(&self) -> bool { matches!(self, Self::AmpFreq | Self::AmpFreqPhase) }

    fn has_phase(&self) -> bool { matches!(self, Self::AmpPhase | Self::AmpFreqPhase) }
}

/// A fixed set of randomly drawn, tapered sinusoids sampled on a time grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Basis {
    family: BasisFamily,
    mode: BasisMode,
    t: RVec,
    window: RVec,
    max_freq: f64,
    max_amp: f64,
    freqs: RVec,
    phases: RVec,
}

impl Basis {
    fn build<S, R>(
        family: BasisFamily,
        t: &Arr1<S>,
        max_freq: f64,
        mode: BasisMode,
        count: usize,
        rng: &mut R,
    ) -> BasisResult<Self>
    where
        S: nd::Data<Elem = f64>,
        R: Rng + ?Sized,
    {
        if t.is_empty() { return Err(BasisError::BadTimes); }
        if count == 0 { return Err(BasisError::BadCount); }
        if !(max_freq.is_finite() && max_freq > 0.0) {
            return Err(BasisError::BadScale("frequency", max_freq));
        }
        let window = planck_taper(&RVec::ones(t.len()), TAPER_RATIO);
        let mut new = Self {
            family,
            mode,
            t: t.to_owned(),
            window,
            max_freq,
            max_amp: 1.0,
            freqs: nd::Array1::zeros(count),
            phases: nd::Array1::zeros(count),
        };
        new.resample(rng);
        Ok(new)
    }

    /// Build a basis of `count` sine functions of the times `t`.
    pub fn sin<S, R>(t: &Arr1<S>, max_freq: f64, mode: BasisMode, count: usize, rng: &mut R)
        -> BasisResult<Self>
    where
        S: nd::Data<Elem = f64>,
        R: Rng + ?Sized,
    {
        Self::build(BasisFamily::Sin, t, max_freq, mode, count, rng)
    }

    /// Build a basis of `count` cosine functions of the times `t`.
    pub fn cos<S, R>(t: &Arr1<S>, max_freq: f64, mode: BasisMode, count: usize, rng: &mut R)
        -> BasisResult<Self>
    where
        S: nd::Data<Elem = f64>,
        R: Rng + ?Sized,
    {
        Self::build(BasisFamily::Cos, t, max_freq, mode, count, rng)
    }

    /// Build a basis of `count` sine functions of the times `t` with random
    /// phases.
    pub fn trig<S, R>(t: &Arr1<S>, max_freq: f64, mode: BasisMode, count: usize, rng: &mut R)
        -> BasisResult<Self>
    where
        S: nd::Data<Elem = f64>,
        R: Rng + ?Sized,
    {
        Self::build(BasisFamily::Trig, t, max_freq, mode, count, rng)
    }

    /// Set the amplitude reached by controls with `|c0| ≥ 1`.
    pub fn with_max_amp(mut self, max_amp: f64) -> BasisResult<Self> {
        if !(max_amp.is_finite() && max_amp > 0.0) {
            return Err(BasisError::BadScale("amplitude", max_amp));
        }
        self.max_amp = max_amp;
        Ok(self)
    }

    // redraw frequencies and phases
    fn resample<R>(&mut self, rng: &mut R)
    where R: Rng + ?Sized
    {
        let max_freq = self.max_freq;
        self.freqs.mapv_inplace(|_| max_freq * rng.gen::<f64>().powf(FREQ_EXPONENT));
        let random_phase = self.family == BasisFamily::Trig;
        self.phases.mapv_inplace(|_| if random_phase { TAU * rng.gen::<f64>() } else { 0.0 });
    }

    /// Draw an independent basis of the same family, mode, size and time grid.
    ///
    /// Used to dress the basis during optimization.
    pub fn generate_new_basis<R>(&self, rng: &mut R) -> Self
    where R: Rng + ?Sized
    {
        let mut new = self.clone();
        new.resample(rng);
        new
    }

    /// Basis function family.
    pub fn family(&self) -> BasisFamily { self.family }

    /// Coefficient mode.
    pub fn mode(&self) -> BasisMode { self.mode }

    /// Number of basis functions.
    pub fn num_basis_vectors(&self) -> usize { self.freqs.len() }

    /// Length of a coefficient vector: `1 + arity * num_basis_vectors`.
    pub fn num_coeffs(&self) -> usize {
        1 + self.mode.arity() * self.num_basis_vectors()
    }

    /// Number of time samples in each control.
    pub fn num_samples(&self) -> usize { self.t.len() }

    /// Amplitude reached by controls with `|c0| ≥ 1`.
    pub fn max_amp(&self) -> f64 { self.max_amp }

    /// Drawn frequencies.
    pub fn frequencies(&self) -> &RVec { &self.freqs }

    /// Drawn phases (all zero unless the family is [`BasisFamily::Trig`]).
    pub fn phases(&self) -> &RVec { &self.phases }

    /// Coefficient vector of uniform samples in `[-1, 1]`.
    pub fn random_coeffs<R>(&self, rng: &mut R) -> RVec
    where R: Rng + ?Sized
    {
        (0..self.num_coeffs()).map(|_| rng.gen_range(-1.0..=1.0)).collect()
    }

    /// Compute the control selected by `coeffs`.
    ///
    /// The weighted sum of basis functions is rescaled so that its peak
    /// absolute value is `clamp(c0, -1, 1) * max_amp`. If the sum vanishes
    /// identically, the zero control is returned.
    pub fn control<S>(&self, coeffs: &Arr1<S>) -> BasisResult<RVec>
    where S: nd::Data<Elem = f64>
    {
        let expected = self.num_coeffs();
        if coeffs.len() != expected {
            return Err(BasisError::Arity { expected, got: coeffs.len() });
        }
        let arity = self.mode.arity();
        let mut raw: RVec = nd::Array1::zeros(self.t.len());
        let groups = coeffs.slice(nd::s![1..]);
        let iter
            = groups.exact_chunks(arity).into_iter()
            .zip(self.freqs.iter().zip(&self.phases));
        for (group, (&f, &phi)) in iter {
            let amp = group[0];
            if amp == 0.0 { continue; }
            let (detune, k_phase)
                = if self.mode.has_freq() { (group[1], 2) } else { (0.0, 1) };
            let shift = if self.mode.has_phase() { group[k_phase] * PI } else { 0.0 };
            let freq = f * (1.0 + detune);
            nd::Zip::from(&mut raw).and(&self.t)
                .for_each(|r, &tk| {
                    let arg = freq * tk + phi + shift;
                    *r += amp * match self.family {
                        BasisFamily::Cos => arg.cos(),
                        BasisFamily::Sin | BasisFamily::Trig => arg.sin(),
                    };
                });
        }
        raw *= &self.window;
        let peak = raw.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));
        if peak == 0.0 || !peak.is_finite() {
            return Ok(nd::Array1::zeros(self.t.len()));
        }
        // divide first so that the peak sample is exactly ±1 before scaling
        raw /= peak;
        raw *= coeffs[0].clamp(-1.0, 1.0) * self.max_amp;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use rand::{ SeedableRng, rngs::StdRng };
    use crate::time::Time;
    use super::*;

    fn basis(mode: BasisMode) -> Basis {
        let mut rng = StdRng::seed_from_u64(42);
        let t = Time::new(1e-3, 1000).controls();
        Basis::trig(&t, 8.5, mode, 10, &mut rng).unwrap()
    }

    fn peak(u: &RVec) -> f64 { u.iter().fold(0.0_f64, |acc, uk| acc.max(uk.abs())) }

    #[test]
    fn coefficient_arity() {
        assert_eq!(basis(BasisMode::Amp).num_coeffs(), 11);
        assert_eq!(basis(BasisMode::AmpFreq).num_coeffs(), 21);
        assert_eq!(basis(BasisMode::AmpPhase).num_coeffs(), 21);
        let b = basis(BasisMode::AmpFreqPhase);
        assert_eq!(b.num_coeffs(), 31);
        assert!(matches!(
            b.control(&RVec::ones(30)),
            Err(BasisError::Arity { expected: 31, got: 30 }),
        ));
    }

    #[test]
    fn bad_construction() {
        let mut rng = StdRng::seed_from_u64(0);
        let t = Time::new(1e-3, 10).controls();
        assert!(matches!(
            Basis::sin(&t, 1.0, BasisMode::Amp, 0, &mut rng),
            Err(BasisError::BadCount),
        ));
        assert!(matches!(
            Basis::sin(&RVec::zeros(0), 1.0, BasisMode::Amp, 3, &mut rng),
            Err(BasisError::BadTimes),
        ));
        assert!(matches!(
            Basis::cos(&t, -1.0, BasisMode::Amp, 3, &mut rng),
            Err(BasisError::BadScale(..)),
        ));
        let b = Basis::cos(&t, 1.0, BasisMode::Amp, 3, &mut rng).unwrap();
        assert!(b.with_max_amp(0.0).is_err());
    }

    #[test]
    fn control_is_deterministic() {
        let b = basis(BasisMode::AmpFreqPhase);
        let mut rng = StdRng::seed_from_u64(7);
        let c = b.random_coeffs(&mut rng);
        assert_eq!(b.control(&c).unwrap(), b.control(&c).unwrap());
        assert_eq!(basis(BasisMode::AmpFreqPhase), b);
    }

    #[test]
    fn peak_equals_max_amp() {
        let b = basis(BasisMode::AmpFreqPhase).with_max_amp(1.1107).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for c0 in [1.0, 2.5, -1.0, -7.0] {
            for _ in 0..20 {
                let mut c = b.random_coeffs(&mut rng);
                c[0] = c0;
                assert_eq!(peak(&b.control(&c).unwrap()), 1.1107);
            }
        }
        let mut c = b.random_coeffs(&mut rng);
        c[0] = 0.25;
        let u = b.control(&c).unwrap();
        assert!(peak(&u) <= 1.1107 * 0.25 + 1e-15);
    }

    #[test]
    fn zero_sum_gives_zero_control() {
        let b = basis(BasisMode::AmpPhase);
        let mut c = RVec::zeros(b.num_coeffs());
        c[0] = 1.0;
        assert_eq!(b.control(&c).unwrap(), RVec::zeros(1000));
        let c = RVec::zeros(b.num_coeffs());
        assert_eq!(b.control(&c).unwrap(), RVec::zeros(1000));
    }

    #[test]
    fn controls_vanish_at_endpoints() {
        let b = basis(BasisMode::Amp);
        let mut rng = StdRng::seed_from_u64(11);
        let mut c = b.random_coeffs(&mut rng);
        c[0] = 1.0;
        let u = b.control(&c).unwrap();
        assert_eq!(u[0], 0.0);
        assert_eq!(u[999], 0.0);
        assert!(peak(&u) > 0.0);
    }

    #[test]
    fn new_basis_keeps_shape() {
        let b = basis(BasisMode::AmpFreq);
        let mut rng = StdRng::seed_from_u64(5);
        let n = b.generate_new_basis(&mut rng);
        assert_eq!(n.num_coeffs(), b.num_coeffs());
        assert_eq!(n.num_samples(), b.num_samples());
        assert_eq!(n.family(), BasisFamily::Trig);
        assert_ne!(n.frequencies(), b.frequencies());
        assert!(n.frequencies().iter().all(|f| (0.0..=8.5).contains(f)));
        let s = Basis::sin(&Time::new(1e-3, 10).controls(), 2.0, BasisMode::Amp, 4, &mut rng)
            .unwrap();
        assert!(s.phases().iter().all(|p| *p == 0.0));
    }
}
