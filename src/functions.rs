//! Benchmark objectives with hand-coded gradients.
//!
//! The analyzer's main consumers are benchmarking harnesses, so the usual
//! multimodality test functions ship with the crate, each carrying its own
//! box and the literature minima where those are fixed.

use crate::types::Objective;

/// `f(x) = Σ x_i²`; one basin, minimum at the origin.
#[derive(Debug, Clone)]
pub struct Sphere {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Sphere {
    /// Sphere over an arbitrary box.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }
}

impl Objective for Sphere {
    fn value(&self, x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }
    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| 2.0 * v).collect()
    }
    fn lower_bounds(&self) -> Vec<f64> {
        self.lower.clone()
    }
    fn upper_bounds(&self) -> Vec<f64> {
        self.upper.clone()
    }
}

/// The N-dimensional Rosenbrock valley; one basin, minimum at `(1, …, 1)`.
#[derive(Debug, Clone)]
pub struct Rosenbrock {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Rosenbrock {
    /// Rosenbrock over an arbitrary box.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }
}

impl Objective for Rosenbrock {
    fn value(&self, x: &[f64]) -> f64 {
        x.windows(2)
            .map(|w| {
                let (a, b) = (w[0], w[1]);
                100.0 * (b - a * a).powi(2) + (1.0 - a).powi(2)
            })
            .sum()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        let mut g = vec![0.0; n];
        for i in 0..n {
            if i + 1 < n {
                g[i] += -400.0 * x[i] * (x[i + 1] - x[i] * x[i]) - 2.0 * (1.0 - x[i]);
            }
            if i > 0 {
                g[i] += 200.0 * (x[i] - x[i - 1] * x[i - 1]);
            }
        }
        g
    }

    fn lower_bounds(&self) -> Vec<f64> {
        self.lower.clone()
    }
    fn upper_bounds(&self) -> Vec<f64> {
        self.upper.clone()
    }
}

/// Himmelblau's function, four equal global minima of value 0.
#[derive(Debug, Clone)]
pub struct Himmelblau {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Himmelblau {
    /// The four literature minimizers.
    pub const MINIMA: [[f64; 2]; 4] = [
        [3.0, 2.0],
        [-2.805118, 3.131312],
        [-3.779310, -3.283186],
        [3.584428, -1.848126],
    ];

    /// Himmelblau over an arbitrary 2-d box.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }
}

impl Default for Himmelblau {
    /// The canonical `[-5, 5]²` box.
    fn default() -> Self {
        Self::new(vec![-5.0, -5.0], vec![5.0, 5.0])
    }
}

impl Objective for Himmelblau {
    fn value(&self, x: &[f64]) -> f64 {
        let (a, b) = (x[0], x[1]);
        (a * a + b - 11.0).powi(2) + (a + b * b - 7.0).powi(2)
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let (a, b) = (x[0], x[1]);
        let p = a * a + b - 11.0;
        let q = a + b * b - 7.0;
        vec![4.0 * a * p + 2.0 * q, 2.0 * p + 4.0 * b * q]
    }

    fn lower_bounds(&self) -> Vec<f64> {
        self.lower.clone()
    }
    fn upper_bounds(&self) -> Vec<f64> {
        self.upper.clone()
    }
}

/// The six-hump camelback function: six local minima, two global.
#[derive(Debug, Clone)]
pub struct SixHumpCamel {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl SixHumpCamel {
    /// The two global minimizers, value ≈ −1.0316.
    pub const GLOBAL_MINIMA: [[f64; 2]; 2] = [[-0.0898, 0.7126], [0.0898, -0.7126]];

    /// Camelback over an arbitrary 2-d box.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }
}

impl Default for SixHumpCamel {
    /// The canonical `[-3, 3] × [-2, 2]` box.
    fn default() -> Self {
        Self::new(vec![-3.0, -2.0], vec![3.0, 2.0])
    }
}

impl Objective for SixHumpCamel {
    fn value(&self, x: &[f64]) -> f64 {
        let (a, b) = (x[0], x[1]);
        (4.0 - 2.1 * a * a + a.powi(4) / 3.0) * a * a + a * b + (-4.0 + 4.0 * b * b) * b * b
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        let (a, b) = (x[0], x[1]);
        vec![
            8.0 * a - 8.4 * a.powi(3) + 2.0 * a.powi(5) + b,
            a - 8.0 * b + 16.0 * b.powi(3),
        ]
    }

    fn lower_bounds(&self) -> Vec<f64> {
        self.lower.clone()
    }
    fn upper_bounds(&self) -> Vec<f64> {
        self.upper.clone()
    }
}
