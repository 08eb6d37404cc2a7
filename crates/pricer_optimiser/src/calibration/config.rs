//! Solver configuration management.
//!
//! Handles loading configuration from TOML files and environment variables.
//! Every field has a default, so a partial file or an empty environment
//! yields a usable configuration.

use pricer_core::types::AdOrder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Tolerance must be positive and finite.
    #[error("Invalid tolerance: {0}. Must be positive and finite")]
    InvalidTolerance(f64),

    /// At least one iteration is required.
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(usize),

    /// Damping must lie in (0, 1].
    #[error("Invalid damping: {0}. Must be in (0, 1]")]
    InvalidDamping(f64),

    /// Unrecognised algorithm name.
    #[error("Invalid algorithm: {0}. Must be one of: gauss_newton, levenberg_marquardt, gradient_descent")]
    InvalidAlgorithm(String),

    /// Calibration needs derivatives.
    #[error("Invalid ad_order: {0:?}. Calibration requires first or second order")]
    InvalidAdOrder(AdOrder),

    /// Instrument weights must be positive and finite.
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Levenberg-Marquardt parameters out of range.
    #[error("Invalid Levenberg-Marquardt parameters: {0}")]
    InvalidLmParameters(String),

    /// File could not be read or parsed.
    #[error("Configuration file error: {0}")]
    FileError(String),

    /// Environment variable could not be parsed.
    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Step algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Least-squares Newton step via the SVD pseudo-inverse; Newton-Raphson
    /// on a square system.
    #[default]
    GaussNewton,
    /// Damped normal equations `(J'WJ + lambda I) dx = -J'Wr`.
    LevenbergMarquardt,
    /// Steepest descent with the exact step length of the linearised
    /// objective.
    GradientDescent,
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "gauss_newton" | "gn" | "newton" => Ok(Algorithm::GaussNewton),
            "levenberg_marquardt" | "lm" => Ok(Algorithm::LevenbergMarquardt),
            "gradient_descent" | "gd" => Ok(Algorithm::GradientDescent),
            _ => Err(ConfigError::InvalidAlgorithm(s.to_string())),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::GaussNewton => write!(f, "gauss_newton"),
            Algorithm::LevenbergMarquardt => write!(f, "levenberg_marquardt"),
            Algorithm::GradientDescent => write!(f, "gradient_descent"),
        }
    }
}

/// Levenberg-Marquardt damping schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmParameters {
    /// Starting lambda
    pub initial_lambda: f64,
    /// Multiplier applied after a rejected step (> 1)
    pub lambda_up: f64,
    /// Multiplier applied after an accepted step (in (0, 1))
    pub lambda_down: f64,
    /// Lower bound on lambda
    pub min_lambda: f64,
    /// Upper bound on lambda
    pub max_lambda: f64,
}

impl Default for LmParameters {
    fn default() -> Self {
        Self {
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
        }
    }
}

/// Solver configuration.
///
/// # Examples
///
/// ```
/// use pricer_optimiser::calibration::{Algorithm, SolverConfig};
///
/// let config = SolverConfig::from_toml_str(
///     r#"
///     algorithm = "levenberg_marquardt"
///     tolerance = 1e-12
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.algorithm, Algorithm::LevenbergMarquardt);
/// assert_eq!(config.max_iterations, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Step algorithm
    pub algorithm: Algorithm,
    /// Converged when the weighted residual norm falls below this
    pub tolerance: f64,
    /// Stop as stationary when the objective changes by less than this
    pub conv_tolerance: Option<f64>,
    /// Maximum number of steps
    pub max_iterations: usize,
    /// Step scale alpha in (0, 1]
    pub damping: f64,
    /// Halve the step while the objective does not decrease
    pub line_search: bool,
    /// Maximum halvings (or lambda increases for LM) per iteration
    pub max_backtracks: usize,
    /// Relative singular value threshold for the rank check
    pub singular_tolerance: f64,
    /// Derivative order the nodes are seeded at during the run
    pub ad_order: AdOrder,
    /// Per-instrument weights; `None` weighs every instrument 1
    pub weights: Option<Vec<f64>>,
    /// Levenberg-Marquardt schedule
    pub lm: LmParameters,
    /// Keep the state of every iteration in the result
    pub record_jacobians: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::GaussNewton,
            tolerance: 1e-10,
            conv_tolerance: None,
            max_iterations: 100,
            damping: 1.0,
            line_search: true,
            max_backtracks: 8,
            singular_tolerance: 1e-12,
            ad_order: AdOrder::First,
            weights: None,
            lm: LmParameters::default(),
            record_jacobians: false,
        }
    }
}

impl SolverConfig {
    /// Create a SolverConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight tolerance and a generous iteration budget.
    pub fn high_precision() -> Self {
        Self {
            tolerance: 1e-14,
            max_iterations: 500,
            max_backtracks: 16,
            ..Self::default()
        }
    }

    /// Loose tolerance and a short iteration budget, for indicative runs.
    pub fn fast() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 20,
            line_search: false,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `CALIBRATION_TOLERANCE`, `CALIBRATION_MAX_ITERATIONS`,
    /// `CALIBRATION_ALGORITHM` and `CALIBRATION_DAMPING`; unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(tol) = lookup("CALIBRATION_TOLERANCE") {
            config.tolerance = tol.trim().parse().map_err(|_| {
                ConfigError::EnvError(format!("CALIBRATION_TOLERANCE is not a number: {}", tol))
            })?;
        }

        if let Some(iters) = lookup("CALIBRATION_MAX_ITERATIONS") {
            config.max_iterations = iters.trim().parse().map_err(|_| {
                ConfigError::EnvError(format!(
                    "CALIBRATION_MAX_ITERATIONS is not an integer: {}",
                    iters
                ))
            })?;
        }

        if let Some(algorithm) = lookup("CALIBRATION_ALGORITHM") {
            config.algorithm = Algorithm::from_str(algorithm.trim())?;
        }

        if let Some(damping) = lookup("CALIBRATION_DAMPING") {
            config.damping = damping.trim().parse().map_err(|_| {
                ConfigError::EnvError(format!("CALIBRATION_DAMPING is not a number: {}", damping))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SolverConfig = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if let Some(ct) = self.conv_tolerance {
            if !(ct > 0.0 && ct.is_finite()) {
                return Err(ConfigError::InvalidTolerance(ct));
            }
        }
        if !(self.singular_tolerance > 0.0 && self.singular_tolerance < 1.0) {
            return Err(ConfigError::InvalidTolerance(self.singular_tolerance));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(self.max_iterations));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(ConfigError::InvalidDamping(self.damping));
        }
        if self.ad_order == AdOrder::Zero {
            return Err(ConfigError::InvalidAdOrder(self.ad_order));
        }
        if let Some(weights) = &self.weights {
            if let Some(w) = weights.iter().find(|w| !(**w > 0.0 && w.is_finite())) {
                return Err(ConfigError::InvalidWeights(format!(
                    "weight {} is not positive and finite",
                    w
                )));
            }
        }
        let lm = &self.lm;
        if !(lm.initial_lambda > 0.0
            && lm.lambda_up > 1.0
            && lm.lambda_down > 0.0
            && lm.lambda_down < 1.0
            && lm.min_lambda > 0.0
            && lm.min_lambda <= lm.max_lambda)
        {
            return Err(ConfigError::InvalidLmParameters(format!("{:?}", lm)));
        }
        Ok(())
    }

    /// Set the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the convergence tolerance on the residual norm.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the stationarity tolerance on the objective change.
    pub fn with_conv_tolerance(mut self, conv_tolerance: f64) -> Self {
        self.conv_tolerance = Some(conv_tolerance);
        self
    }

    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the step scale.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Enable or disable backtracking.
    pub fn with_line_search(mut self, line_search: bool) -> Self {
        self.line_search = line_search;
        self
    }

    /// Set the derivative order of the run.
    pub fn with_ad_order(mut self, ad_order: AdOrder) -> Self {
        self.ad_order = ad_order;
        self
    }

    /// Set per-instrument weights.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Set the Levenberg-Marquardt schedule.
    pub fn with_lm_parameters(mut self, lm: LmParameters) -> Self {
        self.lm = lm;
        self
    }

    /// Keep every iteration's state in the result.
    pub fn with_recorded_jacobians(mut self, record: bool) -> Self {
        self.record_jacobians = record;
        self
    }
}
