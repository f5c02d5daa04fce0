//! Scalar run configuration, loaded from TOML.
//!
//! Every field has a default, so a configuration file only needs to list the
//! values it changes:
//! ```
//! use xcontrol::config::RunConfig;
//!
//! let config = RunConfig::from_toml_str("dim = 512\nnum_steps = 2000").unwrap();
//! assert_eq!(config.dim, 512);
//! assert_eq!(config.num_steps, 2000);
//! assert_eq!(config.target_fidelity, 0.99);
//! ```

use std::{ f64::consts::{ PI, SQRT_2 }, path::Path };
use serde::Deserialize;
use crate::{
    basis::BasisMode,
    error::{ ConfigError, HilbertError },
    hilbert::HilbertSpace,
    time::Time,
};

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parameters of a shaken-well state transfer run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of grid points.
    pub dim: usize,
    /// Grid spans `[-half_width, half_width]`.
    pub half_width: f64,
    /// Time step.
    pub dt: f64,
    /// Number of time steps in a control.
    pub num_steps: usize,
    /// Depth of the cosine well.
    pub depth: f64,
    /// Wavenumber of the cosine well; its edges sit at `±π/2k`.
    pub k: f64,
    /// Stop once the fidelity exceeds this value.
    pub target_fidelity: f64,
    /// Stop after this many iterations.
    pub max_iterations: usize,
    /// Stop after this many iterations without improvement.
    pub stall: usize,
    /// Number of basis functions.
    pub basis_size: usize,
    /// Largest basis frequency.
    pub max_freq: f64,
    /// Per-function coefficient mode.
    pub mode: BasisMode,
    /// Peak control amplitude.
    pub max_amp: f64,
    /// Number of basis dressings.
    pub dressings: usize,
    /// Weight of the mean-square control penalty.
    pub regularisation: f64,
    /// Weight of the penalty for leaving `[-max_amp, max_amp]`.
    pub boundary: f64,
    /// Damp the state near the grid edges.
    pub absorbing: bool,
    /// Seed for basis and simplex generation.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        let k = SQRT_2;
        Self {
            dim: 2048,
            half_width: PI / (k * 2.0) * 4.0,
            dt: 1e-3,
            num_steps: 5000,
            depth: 400.0,
            k,
            target_fidelity: 0.99,
            max_iterations: 100,
            stall: 50,
            basis_size: 10,
            max_freq: 8.5,
            mode: BasisMode::AmpFreqPhase,
            max_amp: PI / k / 2.0,
            dressings: 3,
            regularisation: 1e-5,
            boundary: 0.0,
            absorbing: true,
            seed: 0,
        }
    }
}

fn positive(x: f64) -> bool { x.is_finite() && x > 0.0 }

fn non_negative(x: f64) -> bool { x.is_finite() && x >= 0.0 }

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file<P>(path: P) -> ConfigResult<Self>
    where P: AsRef<Path>
    {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check that all values are in range.
    pub fn validate(&self) -> ConfigResult<()> {
        ConfigError::check(
            "dim",
            HilbertError::check_dim(self.dim).is_ok(),
            "must be even and at least 6",
        )?;
        ConfigError::check("half_width", positive(self.half_width), "must be > 0")?;
        ConfigError::check("dt", positive(self.dt), "must be > 0")?;
        ConfigError::check("num_steps", self.num_steps > 0, "must be > 0")?;
        ConfigError::check("depth", self.depth.is_finite(), "must be finite")?;
        ConfigError::check("k", positive(self.k), "must be > 0")?;
        ConfigError::check(
            "target_fidelity",
            (0.0..=1.0).contains(&self.target_fidelity),
            "must be in [0, 1]",
        )?;
        ConfigError::check("max_iterations", self.max_iterations > 0, "must be > 0")?;
        ConfigError::check("basis_size", self.basis_size > 0, "must be > 0")?;
        ConfigError::check("max_freq", positive(self.max_freq), "must be > 0")?;
        ConfigError::check("max_amp", positive(self.max_amp), "must be > 0")?;
        ConfigError::check(
            "regularisation", non_negative(self.regularisation), "must be >= 0")?;
        ConfigError::check("boundary", non_negative(self.boundary), "must be >= 0")?;
        Ok(())
    }

    /// Time grid of a control.
    pub fn time(&self) -> Time { Time::new(self.dt, self.num_steps) }

    /// Position grid.
    pub fn hilbert(&self) -> Result<HilbertSpace, HilbertError> {
        HilbertSpace::symmetric(self.dim, self.half_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(RunConfig::from_toml_str("").unwrap(), config);
        assert!((config.half_width - PI * SQRT_2).abs() < 1e-12);
        assert_eq!(config.time().num_steps, 5000);
    }

    #[test]
    fn parses_overrides() {
        let config = RunConfig::from_toml_str(
            r#"
            dim = 256
            dt = 2e-3
            mode = "amp_phase"
            absorbing = false
            seed = 42
            "#,
        ).unwrap();
        assert_eq!(config.dim, 256);
        assert_eq!(config.dt, 2e-3);
        assert_eq!(config.mode, BasisMode::AmpPhase);
        assert!(!config.absorbing);
        assert_eq!(config.seed, 42);
        assert_eq!(config.hilbert().unwrap().dim(), 256);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            RunConfig::from_toml_str("dim = 255"),
            Err(ConfigError::BadValue { field: "dim", .. }),
        ));
        assert!(matches!(
            RunConfig::from_toml_str("target_fidelity = 1.5"),
            Err(ConfigError::BadValue { field: "target_fidelity", .. }),
        ));
        assert!(matches!(
            RunConfig::from_toml_str("dt = -1.0"),
            Err(ConfigError::BadValue { field: "dt", .. }),
        ));
        assert!(matches!(
            RunConfig::from_toml_str("unknown = 1"),
            Err(ConfigError::Parse(_)),
        ));
        assert!(matches!(
            RunConfig::from_toml_str("mode = \"everything\""),
            Err(ConfigError::Parse(_)),
        ));
        assert!(matches!(
            RunConfig::from_file("/nonexistent/run.toml"),
            Err(ConfigError::Io(_)),
        ));
    }
}
