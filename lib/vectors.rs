//! Arithmetic on real and complex vectors.
//!
//! Vectors are plain one-dimensional [`ndarray`] arrays. Mixed operations
//! follow a single promotion rule: real ⊕ real stays real, and the result is
//! complex as soon as either operand is complex.
//!
//! ```
//! use ndarray as nd;
//! use num_complex::Complex64 as C64;
//! use xcontrol::vectors::{ add, mul };
//!
//! let x: nd::Array1<f64> = nd::array![1.0, 2.0];
//! let r: nd::Array1<f64> = add(&x, 1.0);
//! let z: nd::Array1<C64> = mul(&x, C64::i());
//! assert_eq!(r, nd::array![2.0, 3.0]);
//! assert_eq!(z, nd::array![C64::new(0.0, 1.0), C64::new(0.0, 2.0)]);
//! ```

use std::{ f64::consts::TAU, ops::{ Add, Mul, Sub } };
use ndarray as nd;
use ndarray_linalg::Scalar;
use num_complex::Complex64 as C64;
use crate::{ Arr1, error::LengthError };

/// Real vector.
pub type RVec = nd::Array1<f64>;

/// Complex vector.
pub type CVec = nd::Array1<C64>;

/// Scalar promotion between a vector element type and a second operand.
pub trait Promote<B>: Copy {
    /// Element type of the result.
    type Output:
        Copy
        + Add<Output = Self::Output>
        + Sub<Output = Self::Output>
        + Mul<Output = Self::Output>;

    /// Lift `self` into the output type.
    fn lift(self) -> Self::Output;

    /// Lift the second operand into the output type.
    fn lift_other(other: B) -> Self::Output;
}

impl Promote<f64> for f64 {
    type Output = f64;

    fn lift(self) -> f64 { self }

    fn lift_other(other: f64) -> f64 { other }
}

impl Promote<C64> for f64 {
    type Output = C64;

    fn lift(self) -> C64 { C64::from(self) }

    fn lift_other(other: C64) -> C64 { other }
}

impl Promote<f64> for C64 {
    type Output = C64;

    fn lift(self) -> C64 { self }

    fn lift_other(other: f64) -> C64 { C64::from(other) }
}

impl Promote<C64> for C64 {
    type Output = C64;

    fn lift(self) -> C64 { self }

    fn lift_other(other: C64) -> C64 { other }
}

/// Lift a real or complex vector to a complex one.
pub fn promote<S, A>(v: &Arr1<S>) -> CVec
where
    S: nd::Data<Elem = A>,
    A: Promote<C64, Output = C64>,
{
    v.mapv(|vk| vk.lift())
}

/// Compute `v + s` elementwise.
pub fn add<S, A, B>(v: &Arr1<S>, s: B) -> nd::Array1<A::Output>
where
    S: nd::Data<Elem = A>,
    A: Promote<B>,
{
    let s = A::lift_other(s);
    v.mapv(|vk| vk.lift() + s)
}

/// Compute `v - s` elementwise.
pub fn sub<S, A, B>(v: &Arr1<S>, s: B) -> nd::Array1<A::Output>
where
    S: nd::Data<Elem = A>,
    A: Promote<B>,
{
    let s = A::lift_other(s);
    v.mapv(|vk| vk.lift() - s)
}

/// Compute `s - v` elementwise.
pub fn sub_from<S, A, B>(s: B, v: &Arr1<S>) -> nd::Array1<A::Output>
where
    S: nd::Data<Elem = A>,
    A: Promote<B>,
{
    let s = A::lift_other(s);
    v.mapv(|vk| s - vk.lift())
}

/// Compute `v * s` elementwise.
pub fn mul<S, A, B>(v: &Arr1<S>, s: B) -> nd::Array1<A::Output>
where
    S: nd::Data<Elem = A>,
    A: Promote<B>,
{
    let s = A::lift_other(s);
    v.mapv(|vk| vk.lift() * s)
}

/// Combine two vectors elementwise after promoting both to a common type.
pub fn zip_with<S, T, A, B, F>(a: &Arr1<S>, b: &Arr1<T>, f: F)
    -> Result<nd::Array1<A::Output>, LengthError>
where
    S: nd::Data<Elem = A>,
    T: nd::Data<Elem = B>,
    A: Promote<B>,
    B: Copy,
    F: Fn(A::Output, A::Output) -> A::Output,
{
    LengthError::check(a, b)?;
    Ok(
        nd::Zip::from(a).and(b)
            .map_collect(|ak, bk| f(ak.lift(), A::lift_other(*bk)))
    )
}

/// Elementwise vector product with promotion.
pub fn hadamard<S, T, A, B>(a: &Arr1<S>, b: &Arr1<T>)
    -> Result<nd::Array1<A::Output>, LengthError>
where
    S: nd::Data<Elem = A>,
    T: nd::Data<Elem = B>,
    A: Promote<B>,
    B: Copy,
{
    zip_with(a, b, |ak, bk| ak * bk)
}

/// Elementwise exponential.
pub fn exp<S, A>(v: &Arr1<S>) -> nd::Array1<A>
where
    S: nd::Data<Elem = A>,
    A: Scalar,
{
    v.mapv(|vk| vk.exp())
}

/// Elementwise phase factor `exp(i θ)` of a real vector.
pub fn expi<S>(theta: &Arr1<S>) -> CVec
where S: nd::Data<Elem = f64>
{
    theta.mapv(C64::cis)
}

/// Elementwise sine.
pub fn sin<S>(v: &Arr1<S>) -> RVec
where S: nd::Data<Elem = f64>
{
    v.mapv(f64::sin)
}

/// Elementwise cosine.
pub fn cos<S>(v: &Arr1<S>) -> RVec
where S: nd::Data<Elem = f64>
{
    v.mapv(f64::cos)
}

/// Elementwise real power.
pub fn pow<S>(v: &Arr1<S>, exponent: f64) -> RVec
where S: nd::Data<Elem = f64>
{
    v.mapv(|vk| vk.powf(exponent))
}

/// Elementwise squared modulus.
pub fn abs2<S, A>(v: &Arr1<S>) -> RVec
where
    S: nd::Data<Elem = A>,
    A: Scalar<Real = f64>,
{
    v.mapv(|vk| vk.square())
}

/// Arithmetic mean; zero for an empty vector.
pub fn mean<S>(v: &Arr1<S>) -> f64
where S: nd::Data<Elem = f64>
{
    v.mean().unwrap_or(0.0)
}

/// Euclidean norm.
pub fn norm<S, A>(v: &Arr1<S>) -> f64
where
    S: nd::Data<Elem = A>,
    A: Scalar<Real = f64>,
{
    v.iter().map(|vk| vk.square()).sum::<f64>().sqrt()
}

/// Return a unit-norm copy of `v`, or `None` if `v` has zero norm.
pub fn normalized<S, A>(v: &Arr1<S>) -> Option<nd::Array1<A>>
where
    S: nd::Data<Elem = A>,
    A: Scalar<Real = f64>,
{
    let n = norm(v);
    (n > 0.0).then(|| {
        let n = A::from_real(n);
        v.mapv(|vk| vk / n)
    })
}

/// Inner product `⟨a|b⟩`, conjugating the left argument.
///
/// Only the overlapping part of unequal-length arrays is used.
pub fn dot<S, T, A>(a: &Arr1<S>, b: &Arr1<T>) -> A
where
    S: nd::Data<Elem = A>,
    T: nd::Data<Elem = A>,
    A: Scalar,
{
    a.iter().zip(b)
        .fold(A::zero(), |acc, (ak, bk)| acc + ak.conj() * *bk)
}

/// Squared overlap magnitude `|⟨a|b⟩|²` of two states.
///
/// Both states are assumed normalized, in which case the result lies in
/// `[0, 1]`.
pub fn fidelity<S, T, A>(a: &Arr1<S>, b: &Arr1<T>) -> f64
where
    S: nd::Data<Elem = A>,
    T: nd::Data<Elem = A>,
    A: Scalar<Real = f64>,
{
    dot(a, b).square()
}

/// Indicator function: 1 where `min < x < max` and 0 elsewhere.
pub fn box_fn<S>(x: &Arr1<S>, min: f64, max: f64) -> RVec
where S: nd::Data<Elem = f64>
{
    x.mapv(|xk| if xk > min && xk < max { 1.0 } else { 0.0 })
}

/// Multiply `v` by a Planck-style window that ramps from 0 to 1 with a
/// half-cosine over the first and last `taper_ratio * N / 2` samples.
pub fn planck_taper<S>(v: &Arr1<S>, taper_ratio: f64) -> RVec
where S: nd::Data<Elem = f64>
{
    let n = v.len();
    let width = taper_ratio * n as f64;
    let mut window: RVec = nd::Array1::ones(n);
    let mut i: usize = 0;
    while (i as f64) < width / 2.0 && i < n {
        let w = 0.5 * (1.0 - (TAU * i as f64 / width).cos());
        window[i] = w;
        window[n - 1 - i] = w;
        i += 1;
    }
    window * v
}
