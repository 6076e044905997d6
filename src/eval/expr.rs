//! Expression evaluation functions

use crate::ast::{BinaryOp, Expr};
use crate::errors::EvalError;
use crate::parse::parse_expression;
use crate::types::Unit;

use super::context::{EvalContext, ScopeId, Value};

/// Evaluates expressions against one scope of an [`EvalContext`].
///
/// Lengths come back in centimetres. Trigonometric functions work in degrees.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    ctx: &'a EvalContext,
    scope: ScopeId,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a EvalContext, scope: ScopeId) -> Self {
        Self { ctx, scope }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Parse and evaluate `text`. Units convert to centimetres.
    pub fn eval_str(&self, text: &str) -> Result<f64, EvalError> {
        let expr = parse_expression(text)?;
        self.finite(text, self.eval(&expr)?)
    }

    /// Evaluate a length, reading unitless values in `default` units.
    /// The result is in centimetres.
    pub fn eval_length(&self, text: &str, default: Unit) -> Result<f64, EvalError> {
        let expr = parse_expression(text)?;
        let value = self.eval(&expr)?;
        let value = if expr.has_unit() {
            value
        } else {
            value * default.to_cm()
        };
        self.finite(text, value)
    }

    fn finite(&self, text: &str, value: f64) -> Result<f64, EvalError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite {
                expression: text.trim().to_string(),
            })
        }
    }

    pub fn eval(&self, expr: &Expr) -> Result<f64, EvalError> {
        match expr {
            Expr::Number(n) | Expr::Constant(n) => Ok(*n),
            Expr::Variable(name) => match self.ctx.lookup(self.scope, name)? {
                Value::Number(n) => Ok(*n),
                Value::Text(text) => text.trim().parse::<f64>().map_err(|_| EvalError::NotANumber {
                    name: name.clone(),
                    value: text.clone(),
                }),
            },
            Expr::Neg(inner) => Ok(-self.eval(inner)?),
            Expr::WithUnit(inner, unit) => Ok(self.eval(inner)? * unit.to_cm()),
            Expr::Binary(lhs, op, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                Ok(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Pow => l.powf(r),
                })
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                call(name, &args)
            }
        }
    }

    /// Replace every bound `\name` in `text` with its value. Unbound control
    /// words and `\\` are left alone.
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains('\\') {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find('\\') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let word_len = after
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(after.len());
            if word_len == 0 {
                // control symbol such as `\\` or `\%`
                let symbol_len = after.chars().next().map_or(0, char::len_utf8);
                out.push('\\');
                out.push_str(&after[..symbol_len]);
                rest = &after[symbol_len..];
                continue;
            }
            let word = &after[..word_len];
            match self.ctx.get(self.scope, word) {
                Some(value) => out.push_str(&value.to_string()),
                None => {
                    out.push('\\');
                    out.push_str(word);
                }
            }
            rest = &after[word_len..];
        }
        out.push_str(rest);
        out
    }

    /// The numeric value of `text` if it has one, otherwise its substituted
    /// literal. Loop items and option values go through here.
    pub fn value_of(&self, text: &str) -> Value {
        match self.eval_str(text) {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Text(self.substitute(text.trim())),
        }
    }
}

fn arity(name: &str, args: &[f64], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::WrongArity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, EvalError> {
    let unary = |f: fn(f64) -> f64| -> Result<f64, EvalError> {
        arity(name, args, 1)?;
        Ok(f(args[0]))
    };
    let binary = |f: fn(f64, f64) -> f64| -> Result<f64, EvalError> {
        arity(name, args, 2)?;
        Ok(f(args[0], args[1]))
    };

    match name {
        "sqrt" => unary(f64::sqrt),
        "sin" => unary(|d| d.to_radians().sin()),
        "cos" => unary(|d| d.to_radians().cos()),
        "tan" => unary(|d| d.to_radians().tan()),
        "asin" => unary(|v| v.asin().to_degrees()),
        "acos" => unary(|v| v.acos().to_degrees()),
        "atan" => unary(|v| v.atan().to_degrees()),
        "atan2" => binary(|y, x| y.atan2(x).to_degrees()),
        "abs" => unary(f64::abs),
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "log" => unary(f64::log10),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "round" => unary(f64::round),
        "int" => unary(f64::trunc),
        "deg" => unary(f64::to_degrees),
        "rad" => unary(f64::to_radians),
        "mod" => binary(|a, b| a % b),
        "pow" => binary(f64::powf),
        "veclen" => binary(f64::hypot),
        "min" | "max" => {
            if args.is_empty() {
                return arity(name, args, 1).map(|_| 0.0);
            }
            let pick: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().fold(args[0], |acc, &v| pick(acc, v)))
        }
        _ => Err(EvalError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}
