//! Miscellaneous tools.

use std::{ fmt, sync::Arc };
use ndarray::{ self as nd, Ix1, concatenate };
use num_complex::Complex64 as C64;
use rustfft::{ self as fft, Fft };

/// Generate an array of frequency-space coordinates to accompany a FFT of `n`
/// points for sampling interval `dt`.
///
/// Non-negative frequencies come first, followed by the negative ones, so the
/// ordering matches the output of the forward transform.
pub fn fft_freq(n: usize, dt: f64) -> nd::Array1<f64> {
    let m = if n % 2 == 0 { n / 2 } else { (n + 1) / 2 };
    let fp: nd::Array1<f64>
        = (0..m)
        .map(|k| k as f64 / (n as f64 * dt))
        .collect();
    let fm: nd::Array1<f64>
        = (1..n - m + 1).rev()
        .map(|k| -(k as f64) / (n as f64 * dt))
        .collect();
    concatenate!(nd::Axis(0), fp, fm)
}

/// Return a copy of `x` with indices shifted to map super-Nyquist frequency
/// components to negative frequencies.
pub fn fft_shift<S, A>(x: &nd::ArrayBase<S, Ix1>) -> nd::Array1<A>
where
    S: nd::Data<Elem = A>,
    A: Clone,
{
    let n = x.len();
    let (p, m)
        = if n % 2 == 0 {
            x.view().split_at(nd::Axis(0), n / 2)
        } else {
            x.view().split_at(nd::Axis(0), n / 2 + 1)
        };
    concatenate!(nd::Axis(0), m.into_owned(), p.into_owned())
}

/// Planned forward/inverse FFT pair of fixed length with its own scratch
/// space.
///
/// The inverse transform is normalized by `1 / n`, so that a forward transform
/// followed by an inverse one is the identity.
#[derive(Clone)]
pub struct Fourier {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    scratch: Vec<C64>,
}

impl fmt::Debug for Fourier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fourier").field("n", &self.n).finish()
    }
}

impl Fourier {
    /// Plan transforms for arrays of length `n`.
    pub fn new(n: usize) -> Self {
        let mut planner = fft::FftPlanner::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        let len
            = forward.get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let scratch = vec![C64::default(); len];
        Self { n, forward, inverse, scratch }
    }

    /// Transform length.
    pub fn len(&self) -> usize { self.n }

    /// Return `true` if the transform length is zero.
    pub fn is_empty(&self) -> bool { self.n == 0 }

    /// Perform the forward transform in place.
    pub fn forward<S>(&mut self, x: &mut nd::ArrayBase<S, Ix1>)
    where S: nd::DataMut<Elem = C64>
    {
        let Self { forward, scratch, .. } = &mut *self;
        with_slice(x, |buf| forward.process_with_scratch(buf, scratch));
    }

    /// Perform the normalized inverse transform in place.
    pub fn inverse<S>(&mut self, x: &mut nd::ArrayBase<S, Ix1>)
    where S: nd::DataMut<Elem = C64>
    {
        let Self { inverse, scratch, .. } = &mut *self;
        with_slice(x, |buf| inverse.process_with_scratch(buf, scratch));
        let n = self.n as f64;
        x.map_inplace(|xk| { *xk /= n; });
    }
}

// run `f` over the contiguous data of `x`, copying through a temporary buffer
// if the array is not in standard layout
fn with_slice<S, F>(x: &mut nd::ArrayBase<S, Ix1>, f: F)
where
    S: nd::DataMut<Elem = C64>,
    F: FnOnce(&mut [C64]),
{
    if let Some(buf) = x.as_slice_mut() {
        f(buf);
        return;
    }
    let mut buf: Vec<C64> = x.iter().copied().collect();
    f(&mut buf);
    x.iter_mut().zip(buf).for_each(|(xk, bk)| { *xk = bk; });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freq_ordering() {
        let f = fft_freq(6, 0.5);
        assert_eq!(
            f.to_vec(),
            vec![0.0, 1.0 / 3.0, 2.0 / 3.0, -1.0, -2.0 / 3.0, -1.0 / 3.0],
        );
        let g = fft_freq(5, 1.0);
        assert_eq!(g.to_vec(), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
        let s = fft_shift(&f);
        assert_eq!(s[0], -1.0);
        assert_eq!(s[3], 0.0);
    }

    #[test]
    fn forward_inverse_identity() {
        let mut plan = Fourier::new(16);
        let x: nd::Array1<C64>
            = (0..16).map(|k| C64::new((k as f64).sin(), 0.1 * k as f64))
            .collect();
        let mut y = x.clone();
        plan.forward(&mut y);
        assert!((y[0] - x.sum()).norm() < 1e-12);
        plan.inverse(&mut y);
        assert!(x.iter().zip(&y).all(|(a, b)| (a - b).norm() < 1e-12));
    }
}
