//! Simplicial homology global optimisation (SHGO).
//!
//! Unlike a classical global optimizer, which stops at one lowest point,
//! this crate enumerates *every* basin of attraction of a continuous,
//! box-bounded, differentiable objective and returns one polished
//! minimizer per basin.
//!
//! The pipeline: a uniform grid over the box is triangulated into Kuhn
//! simplices; grid vertices that undercut all 3^N − 1 neighbours (with
//! out-of-box lookups padded to `+∞`) become candidate minima; a
//! value-tolerant union-find groups candidates into basins; each basin's
//! best candidate is polished with an L-BFGS-led local solver chain; and
//! an outer loop refines the grid until the basin count is stable for a
//! configured streak.
//!
//! ```no_run
//! use shgo::{analyze, functions::Himmelblau, LandscapeOptions};
//!
//! let objective = Himmelblau::default();
//! let options = LandscapeOptions { n_div_initial: 20, ..Default::default() };
//! let result = analyze(&objective, &options)?;
//! for minimum in &result.local_minima {
//!     println!("{:?} -> {}", minimum.minimizer, minimum.objective);
//! }
//! # Ok::<(), shgo::ShgoError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Memoized concurrent objective evaluation over grid vertices.
pub mod cache;
/// Union-find clustering of star candidates into basins.
pub mod cluster;
/// Benchmark objectives with hand-coded gradients.
pub mod functions;
/// The uniform rectilinear lattice over the search box.
pub mod grid;
/// Gradient-hull pruning of simplices.
pub mod hull;
/// Axis permutations and the streaming Kuhn simplex set.
pub mod kuhn;
/// Local polishing of basin representatives and deduplication.
pub mod optimizer;
/// The basin-count stability refinement loop and public entry point.
pub mod refine;
/// Star-minimum detection over the 3^N neighbourhood.
pub mod star;
/// Objective trait, options, results, and errors.
pub mod types;

pub use cache::PointCache;
pub use cluster::{cluster_basins, Basin, DisjointSet};
pub use grid::Grid;
pub use hull::{admissible_vertices, origin_in_gradient_hull};
pub use kuhn::{Permutations, Simplex, SimplexStream};
pub use optimizer::{deduplicate, polish, polish_basins};
pub use refine::analyze;
pub use star::{collect_candidates, is_star_minimum, neighbour_deltas};
pub use types::{
    CancelToken, LandscapeOptions, LandscapeResult, MinimumPoint, Objective, ShgoError, MIN_EPS,
};
