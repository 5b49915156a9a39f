//! The refinement driver: re-run the sampling pipeline on progressively
//! finer grids until the basin count stabilizes.
//!
//! The basin count at one resolution is the 0th Betti number of the
//! sampled sublevel structure; stability of that count under refinement is
//! the discrete analogue of Cauchy convergence, and is the only stopping
//! criterion. No scalar tolerance is involved.

use tracing::{debug, info, warn};

use crate::cache::PointCache;
use crate::cluster::{cluster_basins, Basin};
use crate::grid::Grid;
use crate::hull::admissible_vertices;
use crate::optimizer::{deduplicate, polish_basins};
use crate::star::collect_candidates;
use crate::types::{LandscapeOptions, LandscapeResult, Objective, ShgoError};

/// One completed refinement iteration, retained so the polisher can run on
/// the final grid whether the loop converged or exhausted its budget.
struct Iteration<'a> {
    cache: PointCache<'a>,
    candidates: Vec<Vec<usize>>,
    basins: Vec<Basin>,
}

/// Analyze the full landscape of `objective`: enumerate its basins and
/// return one polished minimum per basin.
///
/// Invalid bounds or options are rejected before any evaluation. See
/// [`LandscapeOptions`] for the knobs and their defaults.
pub fn analyze(
    objective: &dyn Objective,
    options: &LandscapeOptions,
) -> Result<LandscapeResult, ShgoError> {
    options.validate()?;
    let lower = objective.lower_bounds();
    let upper = objective.upper_bounds();
    let dim = lower.len();
    // Fail fast on a bad box before any evaluation or cancellation check.
    Grid::new(lower.clone(), upper.clone(), vec![1; dim.max(1)])?;

    let mut prev_count: Option<usize> = None;
    let mut streak = 0usize;
    let mut converged = false;
    let mut iterations = 0usize;
    let mut total_evaluations = 0usize;
    let mut last: Option<Iteration<'_>> = None;

    let mut k = options.n_div_initial;
    while k <= options.n_div_max {
        if options.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            if iterations == 0 {
                return Err(ShgoError::Cancelled);
            }
            warn!(iterations, "cancelled; keeping the last completed iteration");
            break;
        }

        let grid = Grid::new(lower.clone(), upper.clone(), vec![k; dim])?;
        let cache = PointCache::new(grid, objective);

        let admissible = options
            .use_gradient_pruning
            .then(|| admissible_vertices(&cache, options.parallel));
        let candidates =
            collect_candidates(&cache, options.rel_tol_star, admissible.as_ref(), options.parallel);
        let basins = cluster_basins(&cache, &candidates, options.threshold_ratio);
        let count = basins.len();

        iterations += 1;
        total_evaluations += cache.evaluations();

        if options.verbose {
            info!(
                k,
                candidates = candidates.len(),
                basins = count,
                evaluations = cache.evaluations(),
                "refinement iteration"
            );
        } else {
            debug!(
                k,
                candidates = candidates.len(),
                basins = count,
                evaluations = cache.evaluations(),
                "refinement iteration"
            );
        }

        if prev_count == Some(count) && count > 0 {
            streak += 1;
        } else {
            streak = 0;
        }
        prev_count = Some(count);
        last = Some(Iteration { cache, candidates, basins });

        if streak >= options.stability_count {
            converged = true;
            break;
        }
        k += 2;
    }

    let local_minima = match &last {
        Some(iteration) => {
            let polished = polish_basins(
                &iteration.cache,
                &iteration.candidates,
                &iteration.basins,
                objective,
                options,
            );
            deduplicate(polished, options.min_distance_tolerance)
        }
        None => Vec::new(),
    };
    let num_basins = local_minima.len();

    Ok(LandscapeResult {
        local_minima,
        num_basins,
        iterations,
        converged,
        evaluation_count: total_evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Sphere;
    use crate::types::CancelToken;

    #[test]
    fn rejects_invalid_options_before_evaluating() {
        struct Untouchable;
        impl Objective for Untouchable {
            fn value(&self, _x: &[f64]) -> f64 {
                panic!("objective must not be evaluated");
            }
            fn gradient(&self, _x: &[f64]) -> Vec<f64> {
                panic!("gradient must not be evaluated");
            }
            fn lower_bounds(&self) -> Vec<f64> {
                vec![0.0]
            }
            fn upper_bounds(&self) -> Vec<f64> {
                vec![1.0]
            }
        }
        let options = LandscapeOptions { stability_count: 0, ..Default::default() };
        assert!(analyze(&Untouchable, &options).is_err());
    }

    #[test]
    fn rejects_inverted_bounds() {
        struct Backwards;
        impl Objective for Backwards {
            fn value(&self, _x: &[f64]) -> f64 {
                0.0
            }
            fn gradient(&self, _x: &[f64]) -> Vec<f64> {
                vec![0.0]
            }
            fn lower_bounds(&self) -> Vec<f64> {
                vec![1.0]
            }
            fn upper_bounds(&self) -> Vec<f64> {
                vec![-1.0]
            }
        }
        assert!(matches!(
            analyze(&Backwards, &LandscapeOptions::default()),
            Err(ShgoError::InvalidBounds { axis: 0, .. })
        ));
    }

    #[test]
    fn pre_cancelled_run_reports_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let options = LandscapeOptions { cancel: Some(token), ..Default::default() };
        let objective = Sphere::new(vec![-1.0, -1.0], vec![1.0, 1.0]);
        assert!(matches!(analyze(&objective, &options), Err(ShgoError::Cancelled)));
    }

    #[test]
    fn sphere_converges_to_one_basin() {
        let objective = Sphere::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let result = analyze(&objective, &LandscapeOptions::default()).unwrap();
        assert!(result.converged);
        assert_eq!(result.num_basins, 1);
        assert_eq!(result.local_minima.len(), 1);
        assert_eq!(result.iterations, 3); // k = 8, 10, 12 with two equal repeats
        assert!(result.evaluation_count >= 81);
    }

    #[test]
    fn coarse_unit_box_sphere_still_hits_the_origin() {
        let objective = Sphere::new(vec![-1.0, -1.0], vec![1.0, 1.0]);
        let options = LandscapeOptions { n_div_initial: 4, ..Default::default() };
        let result = analyze(&objective, &options).unwrap();
        assert!(result.converged);
        assert_eq!(result.num_basins, 1);
        let minimum = &result.local_minima[0];
        assert!(minimum.minimizer.iter().all(|c| c.abs() < 1e-6));
        assert!(minimum.objective.abs() < 1e-10);
    }

    #[test]
    fn parallel_and_serial_results_agree() {
        let objective = Sphere::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let serial = analyze(&objective, &LandscapeOptions::default()).unwrap();
        let parallel = analyze(
            &objective,
            &LandscapeOptions { parallel: true, ..Default::default() },
        )
        .unwrap();
        assert_eq!(serial.num_basins, parallel.num_basins);
        assert_eq!(serial.iterations, parallel.iterations);
        assert_eq!(serial.evaluation_count, parallel.evaluation_count);
        assert_eq!(serial.local_minima, parallel.local_minima);
    }
}
