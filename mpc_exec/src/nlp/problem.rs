//! NLP problem container and feasibility checking

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::{eval_f64, FgEval, NlpError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A bounded NLP instance: initial guess plus variable and constraint bounds.
///
/// The cost and constraint functions are supplied separately as an
/// [`FgEval`] when solving.
#[derive(Debug, Clone)]
pub struct NlpProblem {
    x0: Vec<f64>,
    x_lower: Vec<f64>,
    x_upper: Vec<f64>,
    g_lower: Vec<f64>,
    g_upper: Vec<f64>
}

/// The result of checking a point against the bounds of a problem.
#[derive(Debug, Clone, Default)]
pub struct FeasibilityReport {
    /// Every bound violated by more than the tolerance.
    pub violations: Vec<Violation>,

    /// Largest bound violation, regardless of tolerance.
    pub max_violation: f64
}

/// A single violated bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub index: usize,
    pub value: f64,
    pub lower: f64,
    pub upper: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Whether a violation concerns a variable or a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    Variable,
    Constraint
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NlpProblem {
    /// Create a new problem.
    ///
    /// The initial guess and variable bounds must have the same length, as
    /// must the two constraint bound vectors. Lower bounds may not be above
    /// their upper bounds.
    pub fn new(
        x0: Vec<f64>,
        x_lower: Vec<f64>,
        x_upper: Vec<f64>,
        g_lower: Vec<f64>,
        g_upper: Vec<f64>
    ) -> Result<Self, NlpError> {
        let n = x0.len();

        check_len("variable lower bounds", n, x_lower.len())?;
        check_len("variable upper bounds", n, x_upper.len())?;
        check_len("constraint upper bounds", g_lower.len(), g_upper.len())?;

        check_order("variable", &x_lower, &x_upper)?;
        check_order("constraint", &g_lower, &g_upper)?;

        Ok(Self {
            x0,
            x_lower,
            x_upper,
            g_lower,
            g_upper
        })
    }

    /// Number of decision variables.
    pub fn n_vars(&self) -> usize {
        self.x0.len()
    }

    /// Number of constraints.
    pub fn n_constraints(&self) -> usize {
        self.g_lower.len()
    }

    pub fn x0(&self) -> &[f64] {
        &self.x0
    }

    pub fn x_lower(&self) -> &[f64] {
        &self.x_lower
    }

    pub fn x_upper(&self) -> &[f64] {
        &self.x_upper
    }

    pub fn g_lower(&self) -> &[f64] {
        &self.g_lower
    }

    pub fn g_upper(&self) -> &[f64] {
        &self.g_upper
    }

    /// Check a decision vector against the variable and constraint bounds.
    ///
    /// The constraints are evaluated with `eval`. Every bound exceeded by
    /// more than `tol` is listed in the report.
    pub fn check_point<E: FgEval>(
        &self,
        eval: &E,
        x: &[f64],
        tol: f64
    ) -> Result<FeasibilityReport, NlpError> {
        check_len("decision vector", self.n_vars(), x.len())?;

        let mut fg = vec![0.0; 1 + self.n_constraints()];
        eval_f64(eval, x, &mut fg);

        let mut report = FeasibilityReport::default();

        report.scan(
            ViolationKind::Variable, x, &self.x_lower, &self.x_upper, tol
        );
        report.scan(
            ViolationKind::Constraint, &fg[1..], &self.g_lower, &self.g_upper, tol
        );

        Ok(report)
    }

    /// Largest bound violation of `x` given its constraint values `g`.
    pub(crate) fn max_violation(&self, x: &[f64], g: &[f64]) -> f64 {
        let vars = x.iter()
            .zip(self.x_lower.iter().zip(self.x_upper.iter()))
            .map(|(&v, (&l, &u))| bound_violation(v, l, u));
        let cons = g.iter()
            .zip(self.g_lower.iter().zip(self.g_upper.iter()))
            .map(|(&v, (&l, &u))| bound_violation(v, l, u));

        vars.chain(cons).fold(0.0, f64_max_nan)
    }
}

impl FeasibilityReport {
    /// Returns true if no bound is violated.
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    fn scan(
        &mut self,
        kind: ViolationKind,
        values: &[f64],
        lower: &[f64],
        upper: &[f64],
        tol: f64
    ) {
        for (index, ((&value, &l), &u)) in values.iter()
            .zip(lower.iter())
            .zip(upper.iter())
            .enumerate()
        {
            let viol = bound_violation(value, l, u);
            self.max_violation = f64_max_nan(self.max_violation, viol);

            // NaN compares false, so check for it explicitly
            if viol > tol || viol.is_nan() {
                self.violations.push(Violation {
                    kind,
                    index,
                    value,
                    lower: l,
                    upper: u
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), NlpError> {
    if expected != found {
        Err(NlpError::DimensionMismatch { what, expected, found })
    }
    else {
        Ok(())
    }
}

fn check_order(what: &'static str, lower: &[f64], upper: &[f64]) -> Result<(), NlpError> {
    for (index, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
        if l > u {
            return Err(NlpError::InvertedBounds { what, index, lower: l, upper: u })
        }
    }

    Ok(())
}

/// Distance of a value outside of `[lower, upper]`, NaN for a NaN value.
fn bound_violation(value: f64, lower: f64, upper: f64) -> f64 {
    if value.is_nan() {
        std::f64::NAN
    }
    else {
        (lower - value).max(value - upper).max(0.0)
    }
}

/// Maximum which propagates NaN, unlike `f64::max`.
fn f64_max_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        std::f64::NAN
    }
    else {
        a.max(b)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use num_dual::DualNum;

    /// Cost x0^2 + x1^2, single constraint x0 + x1.
    struct SumEval;

    impl FgEval for SumEval {
        fn eval<T: DualNum<f64> + Copy>(&self, fg: &mut [T], vars: &[T]) {
            fg[0] = vars[0] * vars[0] + vars[1] * vars[1];
            fg[1] = vars[0] + vars[1];
        }
    }

    fn problem() -> NlpProblem {
        NlpProblem::new(
            vec![0.0, 0.0],
            vec![-1.0, -1.0],
            vec![1.0, 1.0],
            vec![1.0],
            vec![1.0]
        ).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let p = problem();
        assert_eq!(p.n_vars(), 2);
        assert_eq!(p.n_constraints(), 1);

        let e = NlpProblem::new(
            vec![0.0; 3], vec![0.0; 2], vec![0.0; 3], vec![], vec![]
        );
        assert!(matches!(
            e,
            Err(NlpError::DimensionMismatch { expected: 3, found: 2, .. })
        ));

        let e = NlpProblem::new(
            vec![0.0], vec![0.0], vec![0.0], vec![1.0, 0.0], vec![1.0]
        );
        assert!(matches!(e, Err(NlpError::DimensionMismatch { .. })));

        let e = NlpProblem::new(
            vec![0.0], vec![1.0], vec![-1.0], vec![], vec![]
        );
        assert!(matches!(e, Err(NlpError::InvertedBounds { index: 0, .. })));
    }

    #[test]
    fn test_check_point() {
        let p = problem();

        let r = p.check_point(&SumEval, &[0.5, 0.5], 1e-9).unwrap();
        assert!(r.is_feasible());
        assert_eq!(r.max_violation, 0.0);

        // Variable out of bounds, constraint still satisfied
        let r = p.check_point(&SumEval, &[1.5, -0.5], 1e-9).unwrap();
        assert_eq!(r.violations.len(), 1);
        assert_eq!(r.violations[0].kind, ViolationKind::Variable);
        assert_eq!(r.violations[0].index, 0);
        assert!((r.max_violation - 0.5).abs() < 1e-12);

        // Constraint violated only
        let r = p.check_point(&SumEval, &[0.0, 0.0], 1e-9).unwrap();
        assert_eq!(r.violations.len(), 1);
        assert_eq!(r.violations[0].kind, ViolationKind::Constraint);
        assert!((r.max_violation - 1.0).abs() < 1e-12);

        // NaN is always a violation
        let r = p.check_point(&SumEval, &[std::f64::NAN, 0.0], 1e-9).unwrap();
        assert!(!r.is_feasible());
        assert!(r.max_violation.is_nan());

        assert!(p.check_point(&SumEval, &[0.0], 1e-9).is_err());
    }
}
