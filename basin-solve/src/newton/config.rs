/// Configuration for the Newton solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub max_iters: usize,
    /// Convergence threshold on the largest scaled residual.
    pub residual_tol: f64,
    /// Sufficient-decrease coefficient for the backtracking line search.
    pub armijo: f64,
    /// Smallest step fraction tried before the line search gives up.
    pub min_step: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 100,
            residual_tol: 1e-8,
            armijo: 1e-4,
            min_step: 1e-3,
        }
    }
}

impl Config {
    /// Validates tolerances and line-search parameters.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_iters == 0 {
            return Err("max_iters must be at least 1");
        }
        if !self.residual_tol.is_finite() || self.residual_tol <= 0.0 {
            return Err("residual_tol must be finite and positive");
        }
        if !(0.0..1.0).contains(&self.armijo) {
            return Err("armijo must lie in [0, 1)");
        }
        if !(self.min_step > 0.0 && self.min_step <= 1.0) {
            return Err("min_step must lie in (0, 1]");
        }
        Ok(())
    }
}
