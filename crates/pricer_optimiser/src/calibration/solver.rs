//! Newton-type calibration of curve node values.
//!
//! ## Algorithm
//!
//! Each iteration prices every instrument against the graph, reads the
//! residuals `r_i = price_i - quote_i` and the Jacobian
//! `J[i][j] = d price_i / d x_j` straight from the dual numbers, and takes a
//! step on the weighted system `min |W^1/2 (r + J dx)|`:
//!
//! - Gauss-Newton: `dx = -(W^1/2 J)^+ W^1/2 r`, scaled by the damping and
//!   halved while the objective increases
//! - Levenberg-Marquardt: damped normal equations, lambda adapted per step
//! - Gradient descent: exact step length along `-J'W r`, with the same
//!   backtracking as Gauss-Newton
//!
//! ## Failure policy
//!
//! The solver holds the graph exclusively for the whole run. On any error
//! every curve is restored to its node values and AD order from before the
//! run; on success the curves keep the converged, sensitivity-carrying
//! values.

use super::config::{Algorithm, SolverConfig};
use super::instrument::CalibrationInstrument;
use super::linalg::{self, RankDeficiency};
use crate::error::CalibrationError;
use crate::graph::{Assembly, CurveGraph};
use nalgebra::{DMatrix, DVector};
use pricer_core::types::{AdOrder, DualNumber, VariableId};
use tracing::{debug, info, trace, warn};

/// Where an iteration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Still iterating
    Running,
    /// Weighted residual norm below `tolerance`
    Converged,
    /// Objective change below `conv_tolerance`
    Stationary,
}

/// Snapshot of one iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverState {
    /// Number of steps taken before this iterate
    pub iteration: usize,
    /// Free variable values in column order
    pub variables: DVector<f64>,
    /// Unweighted residuals `price - quote`
    pub residuals: DVector<f64>,
    /// Unweighted Jacobian, instruments by variables
    pub jacobian: DMatrix<f64>,
    /// Weighted residual norm
    pub objective: f64,
    /// Status at this iterate
    pub status: SolverStatus,
}

/// Result of a successful calibration.
///
/// `quote_sensitivity[(j, i)]` is `d x_j / d quote_i` at the solution, the
/// weighted pseudo-inverse of the Jacobian. `upstream_sensitivity[(j, k)]`
/// is `d x_j / d u_k` for the node variables `u` of frozen curves the
/// instruments also depend on.
///
/// Runs at [`AdOrder::Second`] also keep each instrument's Hessian over the
/// free variables followed by the upstream ones, which quote gamma needs.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Final iterate
    pub state: SolverState,
    /// Objective at every iterate, initial point included
    pub objective_history: Vec<f64>,
    /// Every iterate, when `record_jacobians` is set
    pub history: Vec<SolverState>,
    /// Free variable ids in column order
    pub variable_ids: Vec<VariableId>,
    /// Free variable labels in column order
    pub variable_labels: Vec<String>,
    /// Instrument labels in row order
    pub instrument_labels: Vec<String>,
    /// `d x / d quote`, variables by instruments
    pub quote_sensitivity: DMatrix<f64>,
    /// Node variables of frozen curves
    pub upstream_ids: Vec<VariableId>,
    /// Labels of the frozen-curve variables
    pub upstream_labels: Vec<String>,
    /// `d x / d u`, variables by upstream variables
    pub upstream_sensitivity: DMatrix<f64>,
    /// Per instrument, `d² price / d w²` with `w` the free then upstream
    /// variables; empty below second order
    pub instrument_hessians: Vec<DMatrix<f64>>,
}

impl Calibration {
    /// Final status.
    pub fn status(&self) -> SolverStatus {
        self.state.status
    }

    /// Whether the residual norm reached the tolerance.
    pub fn converged(&self) -> bool {
        self.state.status == SolverStatus::Converged
    }

    /// Steps taken.
    pub fn iterations(&self) -> usize {
        self.state.iteration
    }

    /// Final weighted residual norm.
    pub fn objective(&self) -> f64 {
        self.state.objective
    }

    /// Column of a free variable.
    pub fn column(&self, id: VariableId) -> Option<usize> {
        self.variable_ids.iter().position(|v| *v == id)
    }

    /// Converged value of a free variable.
    pub fn value(&self, id: VariableId) -> Option<f64> {
        self.column(id).map(|j| self.state.variables[j])
    }
}

/// Multi-curve calibration solver.
///
/// # Examples
///
/// ```
/// use pricer_core::market_data::curves::Curve;
/// use pricer_core::types::VariableSpace;
/// use pricer_optimiser::calibration::{
///     CalibrationInstrument, ParSwapQuote, Solver, SolverConfig,
/// };
/// use pricer_optimiser::graph::CurveGraph;
///
/// let mut space = VariableSpace::new();
/// let ois = Curve::builder("ois")
///     .nodes([(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0)])
///     .build(&mut space)
///     .unwrap();
/// let mut graph = CurveGraph::new();
/// graph.add_curve(ois, &[]).unwrap();
///
/// let swaps: Vec<Box<dyn CalibrationInstrument>> = [(1.0, 0.030), (2.0, 0.032), (3.0, 0.034)]
///     .into_iter()
///     .map(|(t, r)| Box::new(ParSwapQuote::new("ois", t, r)) as Box<dyn CalibrationInstrument>)
///     .collect();
///
/// let result = Solver::new(SolverConfig::default())
///     .calibrate(&mut graph, &swaps)
///     .unwrap();
/// assert!(result.converged());
/// assert!(result.state.residuals.amax() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

struct Evaluation {
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
    upstream: DMatrix<f64>,
    hessians: Vec<DMatrix<f64>>,
    objective: f64,
}

struct Step {
    x: DVector<f64>,
    evaluation: Evaluation,
    scale: f64,
    accepted: bool,
}

/// Instruments, targets and the assembled variable index of one run.
struct Problem<'p> {
    instruments: &'p [Box<dyn CalibrationInstrument>],
    labels: Vec<String>,
    targets: DVector<f64>,
    sqrt_weights: DVector<f64>,
    assembly: Assembly,
    second_order: bool,
}

impl<'p> Problem<'p> {
    fn new(
        graph: &CurveGraph,
        instruments: &'p [Box<dyn CalibrationInstrument>],
        config: &SolverConfig,
    ) -> Result<Self, CalibrationError> {
        if instruments.is_empty() {
            return Err(CalibrationError::invalid_construction("no instruments"));
        }
        let assembly = graph.assemble()?;
        if assembly.variables().is_empty() {
            return Err(CalibrationError::invalid_construction(
                "the graph has no free variables",
            ));
        }
        let m = instruments.len();
        let sqrt_weights = match &config.weights {
            Some(w) if w.len() != m => {
                return Err(CalibrationError::invalid_construction(format!(
                    "{} weights for {} instruments",
                    w.len(),
                    m
                )))
            }
            Some(w) => DVector::from_iterator(m, w.iter().map(|w| w.sqrt())),
            None => DVector::from_element(m, 1.0),
        };
        let labels = instruments
            .iter()
            .enumerate()
            .map(|(i, inst)| {
                inst.label()
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("instrument{}", i))
            })
            .collect();
        let targets = DVector::from_iterator(m, instruments.iter().map(|i| i.target_quote()));
        Ok(Self {
            instruments,
            labels,
            targets,
            sqrt_weights,
            assembly,
            second_order: config.ad_order == AdOrder::Second,
        })
    }

    fn evaluate(&self, graph: &CurveGraph) -> Result<Evaluation, CalibrationError> {
        let prices = price_all(graph, self.instruments);
        let variables = self.assembly.variables();
        let upstream_index = self.assembly.upstream();
        let m = prices.len();

        let mut residuals = DVector::zeros(m);
        let mut jacobian = DMatrix::zeros(m, variables.len());
        let mut upstream = DMatrix::zeros(m, upstream_index.len());
        let mut hessians = Vec::new();
        for (i, price) in prices.into_iter().enumerate() {
            let price = price.map_err(|e| CalibrationError::Instrument {
                index: i,
                label: self.labels[i].clone(),
                source: Box::new(e),
            })?;
            residuals[i] = price.real() - self.targets[i];
            for (&id, &d) in price.gradient() {
                if let Some(j) = variables.column(id) {
                    jacobian[(i, j)] = d;
                } else if let Some(k) = upstream_index.column(id) {
                    upstream[(i, k)] = d;
                }
            }
            if self.second_order {
                hessians.push(self.hessian(&price));
            }
        }
        let objective = linalg::weighted_norm(&residuals, &self.sqrt_weights);
        Ok(Evaluation {
            residuals,
            jacobian,
            upstream,
            hessians,
            objective,
        })
    }

    /// Dense Hessian of one price over the free then upstream variables.
    fn hessian(&self, price: &DualNumber) -> DMatrix<f64> {
        let variables = self.assembly.variables();
        let upstream = self.assembly.upstream();
        let position = |id: VariableId| {
            variables
                .column(id)
                .or_else(|| upstream.column(id).map(|k| variables.len() + k))
        };
        let width = variables.len() + upstream.len();
        let mut h = DMatrix::zeros(width, width);
        for (&(a, b), &v) in price.hessian().into_iter().flatten() {
            if let (Some(i), Some(j)) = (position(a), position(b)) {
                h[(i, j)] = v;
                h[(j, i)] = v;
            }
        }
        h
    }

    fn write(&self, graph: &mut CurveGraph, x: &DVector<f64>) -> Result<(), CalibrationError> {
        graph.write_free_values(&self.assembly, x.as_slice())
    }

    fn singular(&self, a: &DMatrix<f64>, iteration: usize, d: RankDeficiency) -> CalibrationError {
        let labels = self.assembly.variables().labels();
        CalibrationError::SingularJacobian {
            iteration,
            rank: d.rank,
            expected: d.expected,
            variables: linalg::zero_columns(a)
                .into_iter()
                .map(|j| labels[j].clone())
                .collect(),
        }
    }
}

#[cfg(feature = "parallel")]
fn price_all(
    graph: &CurveGraph,
    instruments: &[Box<dyn CalibrationInstrument>],
) -> Vec<Result<DualNumber, CalibrationError>> {
    use rayon::prelude::*;
    instruments.par_iter().map(|inst| inst.price(graph)).collect()
}

#[cfg(not(feature = "parallel"))]
fn price_all(
    graph: &CurveGraph,
    instruments: &[Box<dyn CalibrationInstrument>],
) -> Vec<Result<DualNumber, CalibrationError>> {
    instruments.iter().map(|inst| inst.price(graph)).collect()
}

impl Solver {
    /// Create a solver with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Get the configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Calibrate the free nodes of `graph` to the instruments' quotes.
    ///
    /// # Errors
    ///
    /// * `Config` - the configuration does not validate
    /// * `InvalidConstruction` - no instruments, no free variables, or a
    ///   weight vector of the wrong length
    /// * `CyclicDependency` / `UnknownCurve` - the graph does not assemble
    /// * `Instrument` - an instrument failed to price at an accepted point
    /// * `SingularJacobian` - the Jacobian lost rank
    /// * `NonConvergence` - `max_iterations` steps did not reach tolerance
    ///
    /// On error the graph is rolled back to its state before the call.
    pub fn calibrate(
        &self,
        graph: &mut CurveGraph,
        instruments: &[Box<dyn CalibrationInstrument>],
    ) -> Result<Calibration, CalibrationError> {
        self.config.validate()?;
        let problem = Problem::new(graph, instruments, &self.config)?;
        debug!(
            instruments = instruments.len(),
            variables = problem.assembly.variables().len(),
            upstream = problem.assembly.upstream().len(),
            algorithm = %self.config.algorithm,
            "starting calibration"
        );

        let checkpoint = graph.checkpoint();
        match self.run(graph, &problem) {
            Ok(calibration) => {
                info!(
                    iterations = calibration.iterations(),
                    objective = calibration.objective(),
                    status = ?calibration.status(),
                    "calibration finished"
                );
                Ok(calibration)
            }
            Err(e) => {
                graph.restore(checkpoint);
                warn!(error = %e, "calibration failed; node values rolled back");
                Err(e)
            }
        }
    }

    fn run(
        &self,
        graph: &mut CurveGraph,
        problem: &Problem<'_>,
    ) -> Result<Calibration, CalibrationError> {
        let config = &self.config;
        graph.set_ad_order(config.ad_order)?;

        let mut x = DVector::from_vec(graph.free_values(&problem.assembly));
        let mut current = problem.evaluate(graph)?;
        let mut objective_history = vec![current.objective];
        let mut history = Vec::new();
        let mut lambda = config.lm.initial_lambda;
        let mut iteration = 0;
        let mut last_accepted = false;

        let status = loop {
            if config.record_jacobians {
                history.push(snapshot(&x, &current, iteration, SolverStatus::Running));
            }
            if current.objective < config.tolerance {
                break SolverStatus::Converged;
            }
            if let (Some(conv), true) = (config.conv_tolerance, last_accepted) {
                let previous = objective_history[objective_history.len() - 2];
                if (previous - current.objective).abs() < conv {
                    break SolverStatus::Stationary;
                }
            }
            if iteration >= config.max_iterations {
                return Err(CalibrationError::NonConvergence {
                    iterations: iteration,
                    residual_norm: current.objective,
                });
            }

            let a = linalg::weight_rows(&current.jacobian, &problem.sqrt_weights);
            let b = current.residuals.component_mul(&problem.sqrt_weights);
            let step = match config.algorithm {
                Algorithm::GaussNewton => {
                    let dx = linalg::gauss_newton_step(&a, &b, config.singular_tolerance)
                        .map_err(|d| problem.singular(&a, iteration, d))?;
                    self.line_search(graph, problem, &x, &dx, &current)?
                }
                Algorithm::GradientDescent => {
                    let dx = linalg::gradient_descent_step(&a, &b).ok_or_else(|| {
                        let rank = RankDeficiency {
                            rank: 0,
                            expected: a.nrows().min(a.ncols()),
                        };
                        problem.singular(&a, iteration, rank)
                    })?;
                    self.line_search(graph, problem, &x, &dx, &current)?
                }
                Algorithm::LevenbergMarquardt => {
                    self.levenberg_marquardt(graph, problem, &x, &a, &b, current, &mut lambda)?
                }
            };

            iteration += 1;
            debug!(
                iteration,
                objective = step.evaluation.objective,
                step = step.scale,
                accepted = step.accepted,
                "calibration step"
            );
            x = step.x;
            current = step.evaluation;
            last_accepted = step.accepted;
            objective_history.push(current.objective);
        };

        let a = linalg::weight_rows(&current.jacobian, &problem.sqrt_weights);
        let pinv = linalg::pseudo_inverse(&a, config.singular_tolerance).ok_or_else(|| {
            let rank = RankDeficiency {
                rank: 0,
                expected: a.nrows().min(a.ncols()),
            };
            problem.singular(&a, iteration, rank)
        })?;
        let quote_sensitivity = pinv * DMatrix::from_diagonal(&problem.sqrt_weights);
        let upstream_sensitivity = -(&quote_sensitivity * &current.upstream);
        let instrument_hessians = std::mem::take(&mut current.hessians);

        let state = snapshot(&x, &current, iteration, status);
        if config.record_jacobians {
            if let Some(last) = history.last_mut() {
                last.status = status;
            }
        }
        let variables = problem.assembly.variables();
        let upstream = problem.assembly.upstream();
        Ok(Calibration {
            state,
            objective_history,
            history,
            variable_ids: variables.ids().to_vec(),
            variable_labels: variables.labels().to_vec(),
            instrument_labels: problem.labels.clone(),
            quote_sensitivity,
            upstream_ids: upstream.ids().to_vec(),
            upstream_labels: upstream.labels().to_vec(),
            upstream_sensitivity,
            instrument_hessians,
        })
    }

    /// Try `x + alpha dx`, halving alpha while the objective increases or
    /// the trial point fails to price.
    fn line_search(
        &self,
        graph: &mut CurveGraph,
        problem: &Problem<'_>,
        x: &DVector<f64>,
        dx: &DVector<f64>,
        current: &Evaluation,
    ) -> Result<Step, CalibrationError> {
        let config = &self.config;
        let mut alpha = config.damping;
        let mut backtracks = 0;
        loop {
            let trial = x + dx * alpha;
            let outcome = problem
                .write(graph, &trial)
                .and_then(|_| problem.evaluate(graph));
            let can_backtrack = config.line_search && backtracks < config.max_backtracks;
            match outcome {
                Ok(evaluation) if evaluation.objective <= current.objective || !can_backtrack => {
                    return Ok(Step {
                        x: trial,
                        evaluation,
                        scale: alpha,
                        accepted: true,
                    });
                }
                Ok(evaluation) => {
                    trace!(alpha, objective = evaluation.objective, "objective increased; halving step");
                }
                Err(e) if !can_backtrack => return Err(e),
                Err(e) => {
                    trace!(alpha, error = %e, "trial point failed to price; halving step");
                }
            }
            alpha *= 0.5;
            backtracks += 1;
        }
    }

    /// One Levenberg-Marquardt iteration: raise lambda until the objective
    /// decreases, lower it after an accepted step. Without an improving
    /// step the iterate stays put.
    #[allow(clippy::too_many_arguments)]
    fn levenberg_marquardt(
        &self,
        graph: &mut CurveGraph,
        problem: &Problem<'_>,
        x: &DVector<f64>,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        current: Evaluation,
        lambda: &mut f64,
    ) -> Result<Step, CalibrationError> {
        let lm = &self.config.lm;
        for _ in 0..=self.config.max_backtracks {
            if let Some(dx) = linalg::levenberg_marquardt_step(a, b, *lambda) {
                let trial = x + dx;
                match problem
                    .write(graph, &trial)
                    .and_then(|_| problem.evaluate(graph))
                {
                    Ok(evaluation) if evaluation.objective < current.objective => {
                        let used = *lambda;
                        *lambda = (*lambda * lm.lambda_down).max(lm.min_lambda);
                        return Ok(Step {
                            x: trial,
                            evaluation,
                            scale: used,
                            accepted: true,
                        });
                    }
                    Ok(evaluation) => {
                        trace!(lambda = *lambda, objective = evaluation.objective, "step rejected");
                    }
                    Err(e) => {
                        trace!(lambda = *lambda, error = %e, "trial point failed to price");
                    }
                }
            }
            if *lambda >= lm.max_lambda {
                break;
            }
            *lambda = (*lambda * lm.lambda_up).min(lm.max_lambda);
        }

        problem.write(graph, x)?;
        Ok(Step {
            x: x.clone(),
            evaluation: current,
            scale: *lambda,
            accepted: false,
        })
    }
}

fn snapshot(
    x: &DVector<f64>,
    evaluation: &Evaluation,
    iteration: usize,
    status: SolverStatus,
) -> SolverState {
    SolverState {
        iteration,
        variables: x.clone(),
        residuals: evaluation.residuals.clone(),
        jacobian: evaluation.jacobian.clone(),
        objective: evaluation.objective,
        status,
    }
}
