//! Minimal compressed sparse row (CSR) storage for the real, symmetric
//! operators built on a spatial grid, and a direct solver for the periodic
//! band structure those operators have.

use ndarray as nd;
use ndarray_linalg::Inverse;
use crate::{ Arr1, error::LengthError, vectors::RVec };

// pivots smaller than this fraction of the largest entry abort the band
// factorization
const PIVOT_TOL: f64 = 1e-13;

/// Square real matrix in compressed sparse row form.
///
/// Column indices within each row are sorted and unique.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    n: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build an `n × n` matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries are summed; entries outside the matrix are dropped.
    pub fn from_triplets<I>(n: usize, triplets: I) -> Self
    where I: IntoIterator<Item = (usize, usize, f64)>
    {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        triplets.into_iter()
            .filter(|(i, j, _)| *i < n && *j < n)
            .for_each(|(i, j, a)| { rows[i].push((j, a)); });
        let mut indptr: Vec<usize> = Vec::with_capacity(n + 1);
        let mut indices: Vec<usize> = Vec::new();
        let mut data: Vec<f64> = Vec::new();
        indptr.push(0);
        for mut row in rows.into_iter() {
            row.sort_by_key(|(j, _)| *j);
            let mut last: Option<usize> = None;
            for (j, a) in row.into_iter() {
                if last == Some(j) {
                    if let Some(d) = data.last_mut() { *d += a; }
                } else {
                    indices.push(j);
                    data.push(a);
                    last = Some(j);
                }
            }
            indptr.push(indices.len());
        }
        Self { n, indptr, indices, data }
    }

    /// Build a diagonal matrix.
    pub fn from_diag<S>(diag: &Arr1<S>) -> Self
    where S: nd::Data<Elem = f64>
    {
        Self::from_triplets(
            diag.len(),
            diag.iter().enumerate().map(|(i, d)| (i, i, *d)),
        )
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize { self.n }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize { self.data.len() }

    /// Iterate over the stored entries of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (a, b) = (self.indptr[i], self.indptr[i + 1]);
        self.indices[a..b].iter().copied().zip(self.data[a..b].iter().copied())
    }

    /// Get a single element (zero if not stored).
    ///
    /// *Panics if `i` is out of bounds*.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (a, b) = (self.indptr[i], self.indptr[i + 1]);
        self.indices[a..b].binary_search(&j)
            .map(|k| self.data[a + k])
            .unwrap_or(0.0)
    }

    /// Main diagonal as a dense vector.
    pub fn diag(&self) -> RVec {
        (0..self.n).map(|i| self.get(i, i)).collect()
    }

    /// Compute the matrix-vector product `A x`.
    pub fn dot<S>(&self, x: &Arr1<S>) -> Result<RVec, LengthError>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check_len(self.n, x.len())?;
        let y: RVec
            = (0..self.n)
            .map(|i| self.row(i).map(|(j, a)| a * x[j]).sum())
            .collect();
        Ok(y)
    }

    /// Return `A + diag(d)`.
    pub fn add_diag<S>(&self, d: &Arr1<S>) -> Result<Self, LengthError>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check_len(self.n, d.len())?;
        let triplets
            = (0..self.n)
            .flat_map(|i| self.row(i).map(move |(j, a)| (i, j, a)))
            .chain(d.iter().enumerate().map(|(i, dk)| (i, i, *dk)));
        Ok(Self::from_triplets(self.n, triplets))
    }

    /// Return `a A`.
    pub fn scaled(&self, a: f64) -> Self {
        let mut new = self.clone();
        new.data.iter_mut().for_each(|d| { *d *= a; });
        new
    }

    /// Convert to a dense array.
    pub fn to_dense(&self) -> nd::Array2<f64> {
        let mut A: nd::Array2<f64> = nd::Array2::zeros((self.n, self.n));
        for i in 0..self.n {
            self.row(i).for_each(|(j, a)| { A[[i, j]] = a; });
        }
        A
    }

    /// Largest distance from the diagonal of any stored entry, measured
    /// cyclically so that the corner entries of a periodic stencil count as
    /// near-diagonal.
    pub fn cyclic_bandwidth(&self) -> usize {
        let n = self.n;
        (0..n)
            .flat_map(|i| {
                self.row(i).map(move |(j, _)| {
                    let d = i.abs_diff(j);
                    d.min(n - d)
                })
            })
            .max()
            .unwrap_or(0)
    }

    /// Return `true` if `|A[i, j] - A[j, i]| <= tol` for all stored entries.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.n).all(|i| {
            self.row(i).all(|(j, a)| (a - self.get(j, i)).abs() <= tol)
        })
    }
}

/// LU factorization of a matrix with cyclic bandwidth `p`, i.e. a band
/// matrix whose band wraps around the corners.
///
/// Writing the matrix as
/// ```text
/// [ A  B ]
/// [ C  D ]
/// ```
/// with `D` the trailing `p × p` block, `A` is an ordinary band matrix of
/// half-width `p` and every wraparound entry lies in `B`, `C`, or `D`. `A` is
/// factorized in band storage without pivoting and the system is closed with
/// the dense `p × p` Schur complement `D - C A⁻¹ B`, so that factorization and
/// solves cost `O(n p²)` and `O(n p)`.
///
/// Skipping pivoting is safe for the positive-definite systems of a
/// shift-invert below the spectrum; [`CyclicBandLu::factorize`] gives up on
/// anything else and leaves it to a general solver.
#[derive(Clone, Debug)]
pub struct CyclicBandLu {
    n: usize,
    p: usize,
    // unit-lower and upper factors of `A`; row `i` holds columns
    // `i - p..=i + p`
    band: nd::Array2<f64>,
    // A⁻¹ B
    fill: nd::Array2<f64>,
    // C
    lower: nd::Array2<f64>,
    // (D - C A⁻¹ B)⁻¹
    schur_inv: nd::Array2<f64>,
}

impl CyclicBandLu {
    /// Factorize `M`.
    ///
    /// Returns `None` if the band is too wide to gain anything over a dense
    /// factorization (`n ≤ 4p`) or if elimination without pivoting meets a
    /// vanishing pivot.
    pub fn factorize(M: &CsrMatrix) -> Option<Self> {
        let n = M.dim();
        let p = M.cyclic_bandwidth().max(1);
        if n <= 4 * p { return None; }
        let m = n - p;
        let scale = M.data.iter().fold(0.0_f64, |acc, a| acc.max(a.abs()));
        if scale == 0.0 || !scale.is_finite() { return None; }

        let mut band: nd::Array2<f64> = nd::Array2::zeros((m, 2 * p + 1));
        let mut upper: nd::Array2<f64> = nd::Array2::zeros((m, p));
        let mut lower: nd::Array2<f64> = nd::Array2::zeros((p, m));
        let mut corner: nd::Array2<f64> = nd::Array2::zeros((p, p));
        for i in 0..n {
            for (j, a) in M.row(i) {
                match (i < m, j < m) {
                    (true, true) => { band[[i, j + p - i]] = a; },
                    (true, false) => { upper[[i, j - m]] = a; },
                    (false, true) => { lower[[i - m, j]] = a; },
                    (false, false) => { corner[[i - m, j - m]] = a; },
                }
            }
        }

        for k in 0..m {
            let piv = band[[k, p]];
            if !(piv.abs() > PIVOT_TOL * scale) { return None; }
            let end = (k + p + 1).min(m);
            for i in k + 1..end {
                let l = band[[i, k + p - i]] / piv;
                band[[i, k + p - i]] = l;
                if l == 0.0 { continue; }
                for j in k + 1..end {
                    band[[i, j + p - i]] -= l * band[[k, j + p - k]];
                }
            }
        }

        let mut new = Self {
            n,
            p,
            band,
            fill: upper,
            lower,
            schur_inv: nd::Array2::zeros((p, p)),
        };
        for mut col in new.fill.columns_mut() {
            let mut z = col.to_owned();
            band_solve(&new.band, p, &mut z);
            col.assign(&z);
        }
        let schur = corner - new.lower.dot(&new.fill);
        new.schur_inv = schur.inv().ok()?;
        if new.schur_inv.iter().any(|s| !s.is_finite()) { return None; }
        Some(new)
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize { self.n }

    /// Cyclic bandwidth used for the factorization.
    pub fn bandwidth(&self) -> usize { self.p }

    /// Solve `M x = y`.
    pub fn solve<S>(&self, y: &Arr1<S>) -> Result<RVec, LengthError>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check_len(self.n, y.len())?;
        let m = self.n - self.p;
        let mut z: RVec = y.slice(nd::s![..m]).to_owned();
        band_solve(&self.band, self.p, &mut z);
        let rhs: RVec = &y.slice(nd::s![m..]) - &self.lower.dot(&z);
        let x2: RVec = self.schur_inv.dot(&rhs);
        let x1: RVec = z - self.fill.dot(&x2);
        let mut x: RVec = nd::Array1::zeros(self.n);
        x.slice_mut(nd::s![..m]).assign(&x1);
        x.slice_mut(nd::s![m..]).assign(&x2);
        Ok(x)
    }
}

// forward and back substitution through the packed band factors, in place
fn band_solve<S>(band: &nd::ArrayBase<S, nd::Ix2>, p: usize, z: &mut RVec)
where S: nd::Data<Elem = f64>
{
    let m = z.len();
    for i in 0..m {
        let acc: f64
            = (i.saturating_sub(p)..i)
            .map(|j| band[[i, j + p - i]] * z[j])
            .sum();
        z[i] -= acc;
    }
    for i in (0..m).rev() {
        let acc: f64
            = (i + 1..(i + p + 1).min(m))
            .map(|j| band[[i, j + p - i]] * z[j])
            .sum();
        z[i] = (z[i] - acc) / band[[i, p]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplets_sum_duplicates() {
        let A = CsrMatrix::from_triplets(
            3,
            [(0, 0, 1.0), (0, 2, 2.0), (0, 0, 0.5), (2, 1, -1.0), (5, 0, 9.0)],
        );
        assert_eq!(A.nnz(), 3);
        assert_eq!(A.get(0, 0), 1.5);
        assert_eq!(A.get(1, 1), 0.0);
        assert!(!A.is_symmetric(0.0));
        let y = A.dot(&nd::array![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(y, nd::array![7.5, 0.0, -2.0]);
        let dense = A.to_dense();
        assert_eq!(dense.dot(&nd::array![1.0, 2.0, 3.0]), y);
    }

    #[test]
    fn diagonal_shift() {
        let A = CsrMatrix::from_triplets(2, [(0, 1, 1.0), (1, 0, 1.0)]);
        let B = A.add_diag(&nd::array![2.0, 3.0]).unwrap();
        assert!(B.is_symmetric(0.0));
        assert_eq!(B.diag(), nd::array![2.0, 3.0]);
        assert_eq!(B.scaled(2.0).get(0, 1), 2.0);
        assert!(A.add_diag(&nd::array![1.0]).is_err());
        assert_eq!(CsrMatrix::from_diag(&nd::array![4.0, 5.0]).diag(), nd::array![4.0, 5.0]);
    }

    // periodic five-point stencil with a positive shift on the diagonal
    fn periodic_pentadiagonal(n: usize) -> CsrMatrix {
        CsrMatrix::from_triplets(
            n,
            (0..n).flat_map(|i| {
                let diag = 3.0 + 0.1 * i as f64;
                [
                    (i, i, diag),
                    (i, (i + 1) % n, -1.0),
                    (i, (i + n - 1) % n, -1.0),
                    (i, (i + 2) % n, 0.25),
                    (i, (i + n - 2) % n, 0.25),
                ]
            }),
        )
    }

    #[test]
    fn cyclic_band_solve() {
        let n: usize = 24;
        let A = periodic_pentadiagonal(n);
        assert!(A.is_symmetric(0.0));
        assert_eq!(A.cyclic_bandwidth(), 2);
        let lu = CyclicBandLu::factorize(&A).unwrap();
        assert_eq!(lu.bandwidth(), 2);
        assert_eq!(lu.dim(), n);
        let x: RVec = (0..n).map(|i| (0.7 * i as f64).sin() + 0.1).collect();
        let y = A.dot(&x).unwrap();
        let sol = lu.solve(&y).unwrap();
        sol.iter().zip(&x).for_each(|(s, e)| assert!((s - e).abs() < 1e-12));
        assert!(lu.solve(&RVec::zeros(3)).is_err());
    }

    #[test]
    fn cyclic_band_gives_up() {
        // zero leading pivot
        let mut A = periodic_pentadiagonal(24);
        A = A.add_diag(&nd::Array1::from_shape_fn(24, |i| if i == 0 { -3.0 } else { 0.0 }))
            .unwrap();
        assert!(CyclicBandLu::factorize(&A).is_none());
        // band too wide for its size
        assert!(CyclicBandLu::factorize(&periodic_pentadiagonal(8)).is_none());
        assert_eq!(CsrMatrix::from_diag(&nd::array![1.0, 2.0]).cyclic_bandwidth(), 0);
    }
}
