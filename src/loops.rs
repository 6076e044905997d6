//! `\foreach` iteration
//!
//! The header is expanded into one tuple of values per iteration. The
//! renderer then binds each tuple in a fresh child scope and walks the body.

use crate::ast::ForeachHeader;
use crate::errors::LoopError;
use crate::eval::{EvalContext, Evaluator, ScopeId, Value};
use crate::log::trace;
use crate::parse::strip_braces;

const ELLIPSIS: &str = "...";

/// One list entry after range expansion
enum Item {
    Literal(String),
    Number(f64),
}

/// Expand the header's list into per-iteration value tuples.
///
/// Every tuple has exactly one value per loop variable.
pub fn iterations(header: &ForeachHeader, eval: &Evaluator) -> Result<Vec<Vec<Value>>, LoopError> {
    let items = expand_ranges(&header.items, eval)?;
    let arity = header.variables.len().max(1);

    let mut tuples = Vec::with_capacity(items.len());
    for item in items {
        let tuple = match item {
            Item::Number(n) if arity == 1 => vec![Value::Number(n)],
            Item::Number(n) => {
                return Err(LoopError::ArityMismatch {
                    expected: arity,
                    found: 1,
                    item: crate::eval::format_number(n),
                });
            }
            Item::Literal(text) if arity == 1 => vec![eval.value_of(strip_braces(&text))],
            Item::Literal(text) => {
                let parts: Vec<&str> = text.split('/').collect();
                if parts.len() != arity {
                    return Err(LoopError::ArityMismatch {
                        expected: arity,
                        found: parts.len(),
                        item: text,
                    });
                }
                parts
                    .into_iter()
                    .map(|p| eval.value_of(strip_braces(p.trim())))
                    .collect()
            }
        };
        tuples.push(tuple);
    }

    trace!(iterations = tuples.len(), "expanded loop list");
    Ok(tuples)
}

/// Replace each `a,...,b` or `a,b,...,c` run with the numbers it denotes.
fn expand_ranges(raw: &[String], eval: &Evaluator) -> Result<Vec<Item>, LoopError> {
    let mut out = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut iter = raw.iter().map(|s| s.trim()).peekable();

    while let Some(item) = iter.next() {
        if item != ELLIPSIS {
            pending.push(item);
            continue;
        }
        let end = iter.next().ok_or(LoopError::MalformedRange)?;
        if end == ELLIPSIS {
            return Err(LoopError::MalformedRange);
        }
        let first = pending.pop().ok_or(LoopError::MalformedRange)?;

        let (start, step) = match pending.pop() {
            Some(before) => {
                let a = eval.eval_str(before)?;
                let b = eval.eval_str(first)?;
                (a, b - a)
            }
            None => {
                let a = eval.eval_str(first)?;
                let e = eval.eval_str(end)?;
                (a, if e >= a { 1.0 } else { -1.0 })
            }
        };
        let end_value = eval.eval_str(end)?;
        if step == 0.0 {
            return Err(LoopError::ZeroStep {
                range: raw.join(","),
            });
        }

        out.extend(pending.drain(..).map(|s| Item::Literal(s.to_string())));
        let count = ((end_value - start) / step + 1e-9).floor() + 1.0;
        let count = if count > 0.0 { count as usize } else { 0 };
        out.extend((0..count).map(|i| Item::Number(snap(start + i as f64 * step))));
    }

    out.extend(pending.into_iter().map(|s| Item::Literal(s.to_string())));
    Ok(out)
}

/// Clean up float drift so `0.1` steps print as `0.3`, not `0.30000000000000004`.
fn snap(value: f64) -> f64 {
    let rounded = (value * 1e9).round() / 1e9;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Open the scope for iteration `index` and bind its variables, the
/// `count` counter and every `evaluate` clause.
///
/// The caller releases the returned scope with [`EvalContext::leave`].
pub fn bind_iteration(
    ctx: &mut EvalContext,
    parent: ScopeId,
    header: &ForeachHeader,
    index: usize,
    values: &[Value],
) -> Result<ScopeId, LoopError> {
    let scope = ctx.enter(parent);
    match bind_into(ctx, scope, header, index, values) {
        Ok(()) => Ok(scope),
        Err(err) => {
            ctx.leave(scope);
            Err(err)
        }
    }
}

fn bind_into(
    ctx: &mut EvalContext,
    scope: ScopeId,
    header: &ForeachHeader,
    index: usize,
    values: &[Value],
) -> Result<(), LoopError> {
    for (name, value) in header.variables.iter().zip(values) {
        ctx.set(scope, name.clone(), value.clone());
    }

    if let Some(count) = &header.count {
        let start = match &count.start {
            Some(expr) => Evaluator::new(ctx, scope).eval_str(expr)?,
            None => 1.0,
        };
        ctx.set(scope, count.variable.clone(), Value::Number(start + index as f64));
    }

    for clause in &header.evaluate {
        let value = Evaluator::new(ctx, scope).eval_str(&clause.expression)?;
        ctx.set(scope, clause.target.clone(), Value::Number(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CountClause, EvaluateClause};
    use crate::errors::EvalError;

    fn header(vars: &[&str], items: &[&str]) -> ForeachHeader {
        ForeachHeader {
            variables: vars.iter().map(|s| s.to_string()).collect(),
            items: items.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn numbers(h: &ForeachHeader) -> Vec<f64> {
        let ctx = EvalContext::new();
        let ev = Evaluator::new(&ctx, ctx.root());
        iterations(h, &ev)
            .unwrap()
            .into_iter()
            .map(|t| t[0].as_number().unwrap())
            .collect()
    }

    fn run(h: &ForeachHeader) -> Result<Vec<Vec<Value>>, LoopError> {
        let ctx = EvalContext::new();
        iterations(h, &Evaluator::new(&ctx, ctx.root()))
    }

    #[test]
    fn unit_step_range() {
        assert_eq!(numbers(&header(&["i"], &["0", "...", "4"])), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn descending_range() {
        assert_eq!(numbers(&header(&["i"], &["3", "...", "1"])), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn inferred_step() {
        assert_eq!(
            numbers(&header(&["i"], &["0", "2", "...", "8"])),
            vec![0.0, 2.0, 4.0, 6.0, 8.0]
        );
        assert_eq!(
            numbers(&header(&["i"], &["0", "0.1", "...", "0.3"])),
            vec![0.0, 0.1, 0.2, 0.3]
        );
    }

    #[test]
    fn items_before_the_pair_are_verbatim() {
        assert_eq!(
            numbers(&header(&["i"], &["-5", "1", "3", "...", "7", "10"])),
            vec![-5.0, 1.0, 3.0, 5.0, 7.0, 10.0]
        );
    }

    #[test]
    fn range_that_never_reaches_the_end_is_empty() {
        assert!(numbers(&header(&["i"], &["5", "6", "...", "1"])).is_empty());
    }

    #[test]
    fn zero_step_fails() {
        assert!(matches!(
            run(&header(&["i"], &["1", "1", "...", "5"])),
            Err(LoopError::ZeroStep { .. })
        ));
    }

    #[test]
    fn ellipsis_needs_both_bounds() {
        assert_eq!(run(&header(&["i"], &["...", "5"])).unwrap_err(), LoopError::MalformedRange);
        assert_eq!(run(&header(&["i"], &["1", "..."])).unwrap_err(), LoopError::MalformedRange);
    }

    #[test]
    fn non_numeric_bound_is_fatal() {
        assert!(matches!(
            run(&header(&["i"], &["a", "...", "e"])),
            Err(LoopError::Eval(EvalError::Syntax { .. }))
        ));
    }

    #[test]
    fn literals_are_kept() {
        let tuples = run(&header(&["c"], &["red", "{blue!50}", "2*3"])).unwrap();
        assert_eq!(
            tuples,
            vec![
                vec![Value::Text("red".into())],
                vec![Value::Text("blue!50".into())],
                vec![Value::Number(6.0)],
            ]
        );
    }

    #[test]
    fn parallel_variables() {
        let tuples = run(&header(&["x", "c"], &["1/red", "2/blue"])).unwrap();
        assert_eq!(tuples[1], vec![Value::Number(2.0), Value::Text("blue".into())]);
    }

    #[test]
    fn tuple_arity_must_match() {
        let err = run(&header(&["x", "y"], &["1/2", "3"])).unwrap_err();
        assert_eq!(
            err,
            LoopError::ArityMismatch {
                expected: 2,
                found: 1,
                item: "3".into()
            }
        );
    }

    #[test]
    fn evaluate_and_count_are_bound_per_iteration() {
        let mut h = header(&["i"], &["0", "1", "2"]);
        h.evaluate.push(EvaluateClause {
            source: "i".into(),
            target: "j".into(),
            expression: r"\i*2".into(),
        });
        h.count = Some(CountClause {
            variable: "n".into(),
            start: None,
        });

        let mut ctx = EvalContext::new();
        let root = ctx.root();
        let tuples = iterations(&h, &Evaluator::new(&ctx, root)).unwrap();
        let mut seen = Vec::new();
        for (index, values) in tuples.iter().enumerate() {
            let scope = bind_iteration(&mut ctx, root, &h, index, values).unwrap();
            let get = |name: &str| ctx.get(scope, name).and_then(Value::as_number).unwrap();
            seen.push((get("i"), get("j"), get("n")));
            ctx.leave(scope);
        }
        assert_eq!(seen, vec![(0.0, 0.0, 1.0), (1.0, 2.0, 2.0), (2.0, 4.0, 3.0)]);
        assert!(ctx.get(root, "i").is_none());
    }

    #[test]
    fn failing_evaluate_clause_releases_the_scope() {
        let mut h = header(&["c"], &["red"]);
        h.evaluate.push(EvaluateClause {
            source: "c".into(),
            target: "d".into(),
            expression: r"\c+1".into(),
        });
        let mut ctx = EvalContext::new();
        let root = ctx.root();
        let err = bind_iteration(&mut ctx, root, &h, 0, &[Value::Text("red".into())]).unwrap_err();
        assert!(matches!(err, LoopError::Eval(EvalError::NotANumber { .. })));
        assert_eq!(ctx.live_scopes(), 1);
    }

    #[test]
    fn large_ranges_are_not_capped() {
        let values = numbers(&header(&["i"], &["1", "...", "20000"]));
        assert_eq!(values.len(), 20000);
        assert_eq!(values.last(), Some(&20000.0));
    }
}
