//! Symbolic expressions over model variables and parameters.
//!
//! An [`Expr`] is a small expression tree. It can be evaluated against any
//! [`Values`] source and differentiated analytically with respect to a single
//! variable, which is all a Newton-type solver needs to build a Jacobian.
//!
//! Arithmetic operators are implemented for [`Expr`], [`VarId`], [`ParamId`],
//! and `f64`, so constraint bodies read like the equations they encode:
//!
//! ```
//! use basin_core::{
//!     expr::Expr,
//!     model::{Model, Variable},
//!     units::Units,
//! };
//!
//! let mut model = Model::steady_state("tank");
//! let v_liq = Variable::new("volume_liquid", Units::cubic_meter()).with_value(3400.0);
//! let v_liq = model.add_var(v_liq);
//! let v_vap = Variable::new("volume_vapor", Units::cubic_meter()).with_value(300.0);
//! let v_vap = model.add_var(v_vap);
//!
//! let total: Expr = v_liq + v_vap;
//! assert_eq!(total.eval(&model), 3700.0);
//! ```

use std::{
    collections::BTreeSet,
    iter::Sum,
    ops::{Add, Div, Mul, Neg, Sub},
};

use crate::model::{ParamId, VarId};

/// A source of numeric values for variables and parameters.
pub trait Values {
    /// Returns the current value of a variable.
    fn var(&self, id: VarId) -> f64;

    /// Returns the current value of a parameter.
    fn param(&self, id: ParamId) -> f64;
}

/// A symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Var(VarId),
    Param(ParamId),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Exp(Box<Expr>),
    Powi(Box<Expr>, i32),
    Sum(Vec<Expr>),
}

impl Expr {
    /// The constant zero.
    pub const ZERO: Expr = Expr::Const(0.0);

    /// Returns `e` raised to this expression.
    #[must_use]
    pub fn exp(self) -> Self {
        Expr::Exp(Box::new(self))
    }

    /// Raises this expression to an integer power.
    #[must_use]
    pub fn powi(self, power: i32) -> Self {
        Expr::Powi(Box::new(self), power)
    }

    /// Sums a sequence of expressions.
    pub fn sum<I>(terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Expr::Sum(terms.into_iter().map(Into::into).collect())
    }

    /// Evaluates the expression.
    pub fn eval<V: Values + ?Sized>(&self, values: &V) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(id) => values.var(*id),
            Expr::Param(id) => values.param(*id),
            Expr::Neg(a) => -a.eval(values),
            Expr::Add(a, b) => a.eval(values) + b.eval(values),
            Expr::Sub(a, b) => a.eval(values) - b.eval(values),
            Expr::Mul(a, b) => a.eval(values) * b.eval(values),
            Expr::Div(a, b) => a.eval(values) / b.eval(values),
            Expr::Exp(a) => a.eval(values).exp(),
            Expr::Powi(a, n) => a.eval(values).powi(*n),
            Expr::Sum(terms) => terms.iter().map(|t| t.eval(values)).sum(),
        }
    }

    /// Returns the partial derivative with respect to `wrt`.
    pub fn derivative<V: Values + ?Sized>(&self, wrt: VarId, values: &V) -> f64 {
        self.eval_with_derivative(wrt, values).1
    }

    /// Evaluates the expression and its partial derivative with respect to
    /// `wrt` in a single forward pass.
    pub fn eval_with_derivative<V: Values + ?Sized>(&self, wrt: VarId, values: &V) -> (f64, f64) {
        match self {
            Expr::Const(c) => (*c, 0.0),
            Expr::Var(id) => (values.var(*id), if *id == wrt { 1.0 } else { 0.0 }),
            Expr::Param(id) => (values.param(*id), 0.0),
            Expr::Neg(a) => {
                let (v, d) = a.eval_with_derivative(wrt, values);
                (-v, -d)
            }
            Expr::Add(a, b) => {
                let (va, da) = a.eval_with_derivative(wrt, values);
                let (vb, db) = b.eval_with_derivative(wrt, values);
                (va + vb, da + db)
            }
            Expr::Sub(a, b) => {
                let (va, da) = a.eval_with_derivative(wrt, values);
                let (vb, db) = b.eval_with_derivative(wrt, values);
                (va - vb, da - db)
            }
            Expr::Mul(a, b) => {
                let (va, da) = a.eval_with_derivative(wrt, values);
                let (vb, db) = b.eval_with_derivative(wrt, values);
                (va * vb, da * vb + va * db)
            }
            Expr::Div(a, b) => {
                let (va, da) = a.eval_with_derivative(wrt, values);
                let (vb, db) = b.eval_with_derivative(wrt, values);
                (va / vb, (da * vb - va * db) / (vb * vb))
            }
            Expr::Exp(a) => {
                let (v, d) = a.eval_with_derivative(wrt, values);
                let e = v.exp();
                (e, e * d)
            }
            Expr::Powi(a, n) => {
                let (v, d) = a.eval_with_derivative(wrt, values);
                if *n == 0 {
                    (1.0, 0.0)
                } else {
                    (v.powi(*n), f64::from(*n) * v.powi(*n - 1) * d)
                }
            }
            Expr::Sum(terms) => terms.iter().fold((0.0, 0.0), |(v, d), term| {
                let (vt, dt) = term.eval_with_derivative(wrt, values);
                (v + vt, d + dt)
            }),
        }
    }

    /// Returns the set of variables referenced by the expression.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<VarId> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    /// Returns `true` if the expression references `id`.
    #[must_use]
    pub fn contains(&self, id: VarId) -> bool {
        match self {
            Expr::Const(_) | Expr::Param(_) => false,
            Expr::Var(v) => *v == id,
            Expr::Neg(a) | Expr::Exp(a) | Expr::Powi(a, _) => a.contains(id),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.contains(id) || b.contains(id)
            }
            Expr::Sum(terms) => terms.iter().any(|t| t.contains(id)),
        }
    }

    fn collect_variables(&self, vars: &mut BTreeSet<VarId>) {
        match self {
            Expr::Const(_) | Expr::Param(_) => {}
            Expr::Var(v) => {
                vars.insert(*v);
            }
            Expr::Neg(a) | Expr::Exp(a) | Expr::Powi(a, _) => a.collect_variables(vars),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
            Expr::Sum(terms) => terms.iter().for_each(|t| t.collect_variables(vars)),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::Var(id)
    }
}

impl From<ParamId> for Expr {
    fn from(id: ParamId) -> Self {
        Expr::Param(id)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

impl Sum for Expr {
    fn sum<I: Iterator<Item = Expr>>(iter: I) -> Self {
        Expr::Sum(iter.collect())
    }
}

macro_rules! impl_operators {
    ($($lhs:ty),* $(,)?) => {
        $(
            impl<R: Into<Expr>> Add<R> for $lhs {
                type Output = Expr;

                fn add(self, rhs: R) -> Expr {
                    Expr::Add(Box::new(self.into()), Box::new(rhs.into()))
                }
            }

            impl<R: Into<Expr>> Sub<R> for $lhs {
                type Output = Expr;

                fn sub(self, rhs: R) -> Expr {
                    Expr::Sub(Box::new(self.into()), Box::new(rhs.into()))
                }
            }

            impl<R: Into<Expr>> Mul<R> for $lhs {
                type Output = Expr;

                fn mul(self, rhs: R) -> Expr {
                    Expr::Mul(Box::new(self.into()), Box::new(rhs.into()))
                }
            }

            impl<R: Into<Expr>> Div<R> for $lhs {
                type Output = Expr;

                fn div(self, rhs: R) -> Expr {
                    Expr::Div(Box::new(self.into()), Box::new(rhs.into()))
                }
            }

            impl Neg for $lhs {
                type Output = Expr;

                fn neg(self) -> Expr {
                    Expr::Neg(Box::new(self.into()))
                }
            }
        )*
    };
}

impl_operators!(Expr, VarId, ParamId);

macro_rules! impl_scalar_lhs_operators {
    ($($rhs:ty),* $(,)?) => {
        $(
            impl Add<$rhs> for f64 {
                type Output = Expr;

                fn add(self, rhs: $rhs) -> Expr {
                    Expr::Const(self) + rhs
                }
            }

            impl Sub<$rhs> for f64 {
                type Output = Expr;

                fn sub(self, rhs: $rhs) -> Expr {
                    Expr::Const(self) - rhs
                }
            }

            impl Mul<$rhs> for f64 {
                type Output = Expr;

                fn mul(self, rhs: $rhs) -> Expr {
                    Expr::Const(self) * rhs
                }
            }

            impl Div<$rhs> for f64 {
                type Output = Expr;

                fn div(self, rhs: $rhs) -> Expr {
                    Expr::Const(self) / rhs
                }
            }
        )*
    };
}

impl_scalar_lhs_operators!(Expr, VarId, ParamId);

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    /// Fixed values: variable `i` has value `i + 1`, parameter `i` has `10 * (i + 1)`.
    struct Indexed;

    impl Values for Indexed {
        fn var(&self, id: VarId) -> f64 {
            id.index() as f64 + 1.0
        }

        fn param(&self, id: ParamId) -> f64 {
            10.0 * (id.index() as f64 + 1.0)
        }
    }

    fn x() -> VarId {
        VarId::new(0)
    }

    fn y() -> VarId {
        VarId::new(1)
    }

    #[test]
    fn evaluates_mixed_operators() {
        let k = ParamId::new(0);
        let expr = 2.0 * x() + y() * k - 1.0 / y();
        assert_relative_eq!(expr.eval(&Indexed), 2.0 + 20.0 - 0.5);
    }

    #[test]
    fn product_and_quotient_rules() {
        let expr = x() * y() / (x() + 1.0);
        // d/dx [x y / (x + 1)] = y / (x + 1)^2
        assert_relative_eq!(expr.derivative(x(), &Indexed), 2.0 / 4.0);
        // d/dy = x / (x + 1)
        assert_relative_eq!(expr.derivative(y(), &Indexed), 0.5);
    }

    #[test]
    fn exponential_chain_rule() {
        let expr = (Expr::from(x()) * 0.5).exp();
        let (value, slope) = expr.eval_with_derivative(x(), &Indexed);
        assert_relative_eq!(value, 0.5_f64.exp());
        assert_relative_eq!(slope, 0.5 * 0.5_f64.exp());
    }

    #[test]
    fn integer_powers() {
        let expr = Expr::from(y()).powi(3);
        assert_relative_eq!(expr.eval(&Indexed), 8.0);
        assert_relative_eq!(expr.derivative(y(), &Indexed), 12.0);
        assert_relative_eq!(Expr::from(y()).powi(0).derivative(y(), &Indexed), 0.0);
    }

    #[test]
    fn parameters_are_constants_for_differentiation() {
        let expr = ParamId::new(0) * x();
        assert_relative_eq!(expr.derivative(x(), &Indexed), 10.0);
        assert!(!expr.contains(y()));
    }

    #[test]
    fn sums_collect_variables() {
        let expr: Expr = [x(), y()].into_iter().map(Expr::from).sum();
        assert_relative_eq!(expr.eval(&Indexed), 3.0);
        assert_eq!(expr.variables().into_iter().collect::<Vec<_>>(), vec![x(), y()]);
        assert_relative_eq!(Expr::sum(Vec::<Expr>::new()).eval(&Indexed), 0.0);
    }
}
