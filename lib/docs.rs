//! Theoretical background.
//!
//! # Contents
//! - [Background](#background)
//! - [Discretization](#discretization)
//! - [Eigenstates](#eigenstates)
//! - [Time dependence](#time-dependence)
//! - [Optimal control](#optimal-control)
//!
//! # Background
//! Everything in this crate works in natural units with *ħ* = *m* = 1, where a
//! single particle in one dimension is governed by the Hamiltonian
//! ```text
//!         1 ∂²
//! H(u) = - - --- + V(x; u)
//!         2 ∂x²
//! ```
//! The potential depends on a single real control parameter *u*, which is in
//! turn a function of time. Three kinds of dependence are built in: a fixed
//! potential, an amplitude-modulated one *u* *V*(*x*), and a "shaken" one
//! *V*(*x* - *u*) where the control translates the potential rigidly. The
//! last is the case of most experimental interest, e.g. an optical lattice
//! whose phase is modulated.
//!
//! The goal is a control sequence *u*(*t*) on `[0, T]` that carries a given
//! initial state *ψ*₀ to a given target *ψ*<sub>*t*</sub>, as measured by the
//! fidelity
//! ```text
//! F = |⟨ψ_t|ψ(T)⟩|²
//! ```
//!
//! # Discretization
//! Positions are sampled on a uniform grid of *N* points (*N* even),
//! ```text
//! x[i] = x_min + i δx, i ∊ {0, ..., N - 1}
//! ```
//! and the second derivative is replaced by the fourth-order central
//! difference
//! ```text
//!           -f[i - 2] + 16 f[i - 1] - 30 f[i] + 16 f[i + 1] - f[i + 2]
//! f''[i] ≈ ----------------------------------------------------------
//!                                   12 δx²
//! ```
//! with indices wrapped periodically. The resulting matrix is real, symmetric
//! and pentadiagonal (plus four corner entries), and is stored in compressed
//! sparse row form.
//!
//! Momentum-space quantities use the same grid through the discrete Fourier
//! transform, whose frequencies are ordered non-negative first:
//! ```text
//! p[k] = 2π k / (N δx)          for k < N/2
//! p[k] = 2π (k - N) / (N δx)    for k ≥ N/2
//! ```
//!
//! # Eigenstates
//! Initial and target states are typically low-lying eigenstates of *H*(*u*)
//! at some fixed control value, so only the bottom of the spectrum of a large
//! sparse matrix is needed. These are found by shift-invert iteration: for a
//! shift *σ* just below the wanted eigenvalues, the eigenvalues *λ* of *H*
//! closest to *σ* become the largest (in magnitude) eigenvalues
//! ```text
//!       1
//! θ = -----
//!     λ - σ
//! ```
//! of (*H* - *σ*)⁻¹, which any power-type method finds first. The inverse is
//! applied through a single LU factorization. The periodic stencil makes *H*
//! a band matrix whose band wraps around the corners, so the factorization
//! eliminates the ordinary band first and closes the system with a small dense
//! block for the wrapped corners, at a cost linear in *N*. With *σ* below the
//! spectrum, *H* - *σ* is positive definite and needs no pivoting. A whole
//! block of vectors is iterated at once, with a Rayleigh-Ritz projection at
//! each step, since nearly degenerate levels (tunnelling doublets, or the
//! paired momentum states above a flat potential) are resolved only very
//! slowly by single-vector methods.
//!
//! Eigenvectors are only defined up to sign. To make results reproducible,
//! the sign of the *n*-th eigenvector is chosen so that the mean of its first
//! half is non-negative for even *n* and non-positive for odd *n*.
//!
//! # Time dependence
//! Over a step *dt* during which the control is held at *u*, the Hamiltonian
//! splits into kinetic and potential parts that are each diagonal in a known
//! basis:
//! ```text
//! H = T + V(u)
//! T = p²/2       (diagonal in momentum space)
//! V = V(x; u)    (diagonal in position space)
//! ```
//! By the Baker-Campbell-Hausdorff formula, the symmetric splitting
//! ```text
//!               -i T dt/2  -i V dt  -i T dt/2
//! ψ(t + dt) = [e          e        e         ] ψ(t) + O(dt³)
//! ```
//! is accurate to third order per step. Each factor is a pointwise phase in
//! its own basis, so a step costs two pairs of FFTs. Over many steps, the
//! trailing half kinetic step of one step and the leading half step of the
//! next combine into a single full kinetic step,
//! ```text
//!       -i T dt/2 -i V_n dt  -i T dt  -i V_{n-1} dt  -i T dt       -i V_1 dt  -i T dt/2
//! ψ_n = e         e          e        e              e       ... e          e         ψ_0
//! ```
//! leaving one pair of FFTs per step.
//!
//! Density reaching the edges of the grid would otherwise wrap around through
//! the periodic boundary. An optional absorber multiplies the state by
//! ```text
//!  -100 dt (1 - w(x))
//! e
//! ```
//! at every potential step, where *w* is a window that is 1 in the interior
//! and falls smoothly to 0 over the outer sixteenth of the grid on each side.
//!
//! # Optimal control
//! Controls are searched with the dressed chopped random basis (dCRAB)
//! method[^1][^2]. Instead of optimizing every sample of *u*(*t*), the control
//! is restricted to a small random basis of smooth functions,
//! ```text
//!                   M
//! u(t) ∝ c₀ w(t)    Σ  a_j sin(f_j (1 + δ_j) t + φ_j + π ε_j)
//!                  j=1
//! ```
//! where the frequencies *f*<sub>*j*</sub> and phases *φ*<sub>*j*</sub> are
//! drawn at random, *w*(*t*) tapers the control to zero at both ends, and the
//! coefficients (*c*₀, *a*<sub>*j*</sub>, *δ*<sub>*j*</sub>,
//! *ε*<sub>*j*</sub>) are found by the Nelder-Mead simplex method[^3], which
//! needs only cost evaluations. The sum is rescaled so that its peak
//! magnitude is min(|*c*₀|, 1) times a fixed maximum amplitude.
//!
//! A small random basis rarely contains the optimal control, and the search
//! tends to stall. Whenever it does, the best control found so far is frozen
//! and a new random basis is drawn, with all further controls taken relative
//! to the frozen one. This "dressing" makes the search space effectively
//! unbounded while keeping each individual search low-dimensional.
//!
//! [^1]: T. Caneva, T. Calarco, and S. Montangero, "Chopped random-basis
//! quantum optimization." Phys. Rev. A **84** 022326 (2011).
//!
//! [^2]: N. Rach, M. M. Müller, T. Calarco, and S. Montangero, "Dressing the
//! chopped-random-basis optimization: A bandwidth-limited access to the
//! trap-free landscape." Phys. Rev. A **92** 062343 (2015).
//!
//! [^3]: J. A. Nelder and R. Mead, "A simplex method for function
//! minimization." The Computer Journal **7** 4 308-313 (1965).
