//! Core types: the objective capability trait, analysis options, results,
//! cancellation, and the crate error enum.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Floor applied to every relative tolerance so flat landscapes never
/// degenerate to a zero tolerance.
pub const MIN_EPS: f64 = 1e-12;

/// A box-bounded, differentiable scalar objective.
///
/// The engine only ever talks to the objective through this capability set:
/// a value, a gradient, and the two bound vectors. `Send + Sync` because
/// evaluations may run on rayon workers when parallelism is enabled.
pub trait Objective: Send + Sync {
    /// Objective value at `x`. May return NaN/Inf; the engine treats
    /// non-finite values as disqualifying, never as fatal.
    fn value(&self, x: &[f64]) -> f64;

    /// Gradient of the objective at `x`, one component per dimension.
    fn gradient(&self, x: &[f64]) -> Vec<f64>;

    /// Lower bounds of the search box, one per dimension.
    fn lower_bounds(&self) -> Vec<f64>;

    /// Upper bounds of the search box, one per dimension.
    fn upper_bounds(&self) -> Vec<f64>;

    /// Dimensionality of the domain.
    fn dim(&self) -> usize {
        self.lower_bounds().len()
    }
}

/// Options for [`analyze`](crate::analyze), with the documented defaults.
#[derive(Debug, Clone)]
pub struct LandscapeOptions {
    /// Starting grid divisions per axis.
    pub n_div_initial: usize,
    /// Maximum grid divisions per axis before the refinement loop gives up.
    pub n_div_max: usize,
    /// Consecutive iterations of equal positive basin count required to
    /// declare convergence.
    pub stability_count: usize,
    /// Basin-merge value tolerance as a fraction of the cache value range.
    pub threshold_ratio: f64,
    /// Minimum L2 distance between distinct reported minima.
    pub min_distance_tolerance: f64,
    /// Iteration cap handed to the local optimizer.
    pub local_maxiters: u64,
    /// Enable gradient-hull pruning of Kuhn simplices.
    pub use_gradient_pruning: bool,
    /// Relative tolerance for the star-minimum comparison.
    pub rel_tol_star: f64,
    /// Run cache population, pruning, and polishing on rayon workers.
    pub parallel: bool,
    /// Promote per-iteration progress from `debug!` to `info!`.
    pub verbose: bool,
    /// Optional cancellation token, checked between refinement iterations
    /// and between basins while polishing.
    pub cancel: Option<CancelToken>,
}

impl Default for LandscapeOptions {
    fn default() -> Self {
        Self {
            n_div_initial: 8,
            n_div_max: 25,
            stability_count: 2,
            threshold_ratio: 0.1,
            min_distance_tolerance: 0.05,
            local_maxiters: 500,
            use_gradient_pruning: false,
            rel_tol_star: 1e-10,
            parallel: false,
            verbose: false,
            cancel: None,
        }
    }
}

impl LandscapeOptions {
    /// Fail-fast validation of the option set, before any evaluation.
    pub fn validate(&self) -> Result<(), ShgoError> {
        if self.n_div_initial < 1 {
            return Err(ShgoError::InvalidOption {
                name: "n_div_initial",
                reason: "must be at least 1".into(),
            });
        }
        if self.n_div_max < self.n_div_initial {
            return Err(ShgoError::InvalidOption {
                name: "n_div_max",
                reason: format!(
                    "must be >= n_div_initial ({} < {})",
                    self.n_div_max, self.n_div_initial
                ),
            });
        }
        if self.stability_count < 1 {
            return Err(ShgoError::InvalidOption {
                name: "stability_count",
                reason: "must be at least 1".into(),
            });
        }
        if !self.threshold_ratio.is_finite() || self.threshold_ratio < 0.0 {
            return Err(ShgoError::InvalidOption {
                name: "threshold_ratio",
                reason: format!("must be finite and non-negative, got {}", self.threshold_ratio),
            });
        }
        if !self.min_distance_tolerance.is_finite() || self.min_distance_tolerance < 0.0 {
            return Err(ShgoError::InvalidOption {
                name: "min_distance_tolerance",
                reason: format!(
                    "must be finite and non-negative, got {}",
                    self.min_distance_tolerance
                ),
            });
        }
        if !self.rel_tol_star.is_finite() || self.rel_tol_star < 0.0 {
            return Err(ShgoError::InvalidOption {
                name: "rel_tol_star",
                reason: format!("must be finite and non-negative, got {}", self.rel_tol_star),
            });
        }
        Ok(())
    }
}

/// One polished local minimum: the minimizer and its objective value.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumPoint {
    /// Location of the minimum, inside the search box.
    pub minimizer: Vec<f64>,
    /// Objective value at `minimizer`.
    pub objective: f64,
}

/// Outcome of a landscape analysis.
#[derive(Debug, Clone)]
pub struct LandscapeResult {
    /// One representative minimum per basin, sorted by objective ascending.
    pub local_minima: Vec<MinimumPoint>,
    /// Number of distinct basins after deduplication; always equals
    /// `local_minima.len()`.
    pub num_basins: usize,
    /// Completed refinement iterations.
    pub iterations: usize,
    /// Whether the basin count stabilized before the grid budget ran out.
    pub converged: bool,
    /// Objective value calls charged to the point caches across all
    /// iterations (polishing calls are not charged).
    pub evaluation_count: usize,
}

/// Cloneable cancellation flag shared between the caller and the engine.
///
/// Cancellation is cooperative: the engine checks the token between
/// refinement iterations and between basins in the polisher; an in-flight
/// objective evaluation always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Errors surfaced by the analyzer.
#[derive(Debug, Error)]
pub enum ShgoError {
    /// The bound vectors are empty.
    #[error("domain has no dimensions")]
    EmptyDomain,

    /// Lower and upper bound vectors disagree in length.
    #[error("bound vectors have mismatched lengths: {lower} vs {upper}")]
    MismatchedBounds {
        /// Length of the lower bound vector.
        lower: usize,
        /// Length of the upper bound vector.
        upper: usize,
    },

    /// A lower bound is not strictly below its upper bound, or a bound is
    /// not finite.
    #[error("axis {axis}: invalid bounds [{lower}, {upper}]")]
    InvalidBounds {
        /// Offending axis.
        axis: usize,
        /// Lower bound on that axis.
        lower: f64,
        /// Upper bound on that axis.
        upper: f64,
    },

    /// An option failed validation.
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption {
        /// Option name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The objective produced a non-finite value where a finite one was
    /// required to make progress.
    #[error("objective produced a non-finite value at {position:?}")]
    ObjectiveFailure {
        /// Evaluation point.
        position: Vec<f64>,
    },

    /// Every stage of the local solver chain failed.
    #[error("local solver failed: {0}")]
    LocalSolver(String),

    /// The cancellation token fired before any iteration completed.
    #[error("analysis cancelled")]
    Cancelled,
}
