//! Compiled expressions and their evaluator.

use serde_json::{Map, Value};

use crate::parser::{self, BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::value::{is_truthy, loose_eq, strict_eq, to_display_string, to_number};
use crate::{ExprError, Scope, number_value};

/// How undefined top-level identifiers behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Undefined {
    /// Unknown identifiers are an error.
    Error,
    /// Unknown identifiers evaluate to `null`.
    Null,
}

/// A parsed expression ready for repeated evaluation.
///
/// Obtain one through [`compile_expression`](crate::compile_expression) or,
/// with memoization, through [`ExpressionCache`](crate::ExpressionCache).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    expr: Expr,
}

impl CompiledExpression {
    pub(crate) fn compile(source: &str) -> Result<Self, ExprError> {
        Ok(Self {
            source: source.to_owned(),
            expr: parser::parse(source)?,
        })
    }

    /// Original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `scope`. Identifiers the scope does not define are errors.
    pub fn eval(&self, scope: &dyn Scope) -> Result<Value, ExprError> {
        Evaluator {
            scope,
            undefined: Undefined::Error,
        }
        .eval(&self.expr)
    }

    /// Evaluate against `scope`, reading undefined identifiers as `null`.
    ///
    /// Conditions use this so that `visited_cellar` reads as false before the
    /// key was ever set.
    pub fn eval_lenient(&self, scope: &dyn Scope) -> Result<Value, ExprError> {
        Evaluator {
            scope,
            undefined: Undefined::Null,
        }
        .eval(&self.expr)
    }
}

struct Evaluator<'a> {
    scope: &'a dyn Scope,
    undefined: Undefined,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => match self.scope.lookup(name) {
                Some(value) => Ok(value),
                None if self.undefined == Undefined::Null => Ok(Value::Null),
                None => Err(ExprError::UndefinedVariable(name.clone())),
            },
            Expr::Member(object, property) => Ok(member(&self.eval(object)?, property)),
            Expr::Index(object, index) => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                Ok(match (&object, &index) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| items.get(usize::try_from(i).ok()?))
                        .cloned()
                        .unwrap_or(Value::Null),
                    _ => member(&object, &to_display_string(&index)),
                })
            }
            Expr::Call(callee, args) => {
                let name = callee_name(callee)
                    .ok_or_else(|| ExprError::UnknownFunction("<expression>".to_owned()))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                call_builtin(&name, &args)
            }
            Expr::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOp::Neg => finite("-", to_number(&value).map(|n| -n)),
                    UnaryOp::Plus => finite("+", to_number(&value)),
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !is_truthy(&left),
                    LogicalOp::Or => is_truthy(&left),
                    LogicalOp::Nullish => !left.is_null(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional(test, consequent, alternate) => {
                if is_truthy(&self.eval(test)?) {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }
}

fn member(object: &Value, property: &str) -> Value {
    match object {
        Value::Array(items) if property == "length" => Value::from(items.len()),
        Value::String(s) if property == "length" => Value::from(s.chars().count()),
        Value::Array(items) => property
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn callee_name(callee: &Expr) -> Option<String> {
    match callee {
        Expr::Ident(name) => Some(name.clone()),
        Expr::Member(object, method) => match object.as_ref() {
            Expr::Ident(ns) => Some(format!("{ns}.{method}")),
            _ => None,
        },
        _ => None,
    }
}

fn finite(op: &str, n: Option<f64>) -> Result<Value, ExprError> {
    match n {
        Some(n) if n.is_finite() => Ok(number_value(n)),
        _ => Err(ExprError::NonFinite(op.to_owned())),
    }
}

fn numbers(op: &str, left: &Value, right: &Value) -> Result<(f64, f64), ExprError> {
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExprError::NonFinite(op.to_owned())),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add => {
            if left.is_string() || right.is_string() {
                return Ok(Value::String(format!(
                    "{}{}",
                    to_display_string(left),
                    to_display_string(right)
                )));
            }
            let (a, b) = numbers("+", left, right)?;
            finite("+", Some(a + b))
        }
        BinaryOp::Sub => {
            let (a, b) = numbers("-", left, right)?;
            finite("-", Some(a - b))
        }
        BinaryOp::Mul => {
            let (a, b) = numbers("*", left, right)?;
            finite("*", Some(a * b))
        }
        BinaryOp::Div => {
            let (a, b) = numbers("/", left, right)?;
            finite("/", Some(a / b))
        }
        BinaryOp::Rem => {
            let (a, b) = numbers("%", left, right)?;
            finite("%", Some(a % b))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => match (to_number(left), to_number(right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            };
            Ok(Value::Bool(ordering.is_some_and(|ord| match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })))
        }
        BinaryOp::LooseEq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::LooseNe => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::StrictEq => Ok(Value::Bool(strict_eq(left, right))),
        BinaryOp::StrictNe => Ok(Value::Bool(!strict_eq(left, right))),
    }
}

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let name = name.strip_prefix("Math.").unwrap_or(name);
    let nums = || {
        args.iter()
            .map(|arg| to_number(arg).ok_or_else(|| ExprError::NonFinite(name.to_owned())))
            .collect::<Result<Vec<f64>, _>>()
    };
    let first = || -> Result<f64, ExprError> {
        nums()?
            .first()
            .copied()
            .ok_or_else(|| ExprError::NonFinite(name.to_owned()))
    };
    match name {
        "min" => finite(name, nums()?.into_iter().reduce(f64::min)),
        "max" => finite(name, nums()?.into_iter().reduce(f64::max)),
        "abs" => finite(name, Some(first()?.abs())),
        "floor" => finite(name, Some(first()?.floor())),
        "ceil" => finite(name, Some(first()?.ceil())),
        "round" => finite(name, Some(first()?.round())),
        "Number" => finite(name, args.first().map_or(Some(0.0), to_number)),
        "String" => Ok(Value::String(
            args.first().map(to_display_string).unwrap_or_default(),
        )),
        _ => Err(ExprError::UnknownFunction(name.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmptyScope;
    use serde_json::json;

    fn eval(src: &str, scope: &Value) -> Result<Value, ExprError> {
        CompiledExpression::compile(src)?.eval(scope)
    }

    #[test]
    fn test_arithmetic() {
        let scope = json!({"hp": 7});
        assert_eq!(eval("hp * 2 + 1", &scope), Ok(json!(15)));
        assert_eq!(eval("hp / 2", &scope), Ok(json!(3.5)));
        assert_eq!(eval("hp % 4", &scope), Ok(json!(3)));
    }

    #[test]
    fn test_comparisons_and_ternary() {
        let scope = json!({"health": 3});
        assert_eq!(eval("health > 5", &scope), Ok(json!(false)));
        assert_eq!(eval("health > 5 ? 'high' : 'low'", &scope), Ok(json!("low")));
        assert_eq!(eval("'b' > 'a'", &scope), Ok(json!(true)));
    }

    #[test]
    fn test_member_access() {
        let scope = json!({"player": {"name": "Ada", "items": ["lamp", "key"]}});
        assert_eq!(eval("player.name", &scope), Ok(json!("Ada")));
        assert_eq!(eval("player.items[1]", &scope), Ok(json!("key")));
        assert_eq!(eval("player.items.length", &scope), Ok(json!(2)));
        assert_eq!(eval("player.missing.deeper", &scope), Ok(Value::Null));
    }

    #[test]
    fn test_string_concatenation() {
        let scope = json!({"name": "Ada", "gold": 3});
        assert_eq!(
            eval("name + ' has ' + gold", &scope),
            Ok(json!("Ada has 3"))
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let scope = json!({"a": 0, "b": "x"});
        assert_eq!(eval("a || b", &scope), Ok(json!("x")));
        assert_eq!(eval("a && b", &scope), Ok(json!(0)));
        assert_eq!(eval("null ?? b", &scope), Ok(json!("x")));
        assert_eq!(eval("!a", &scope), Ok(json!(true)));
    }

    #[test]
    fn test_undefined_variable_strict_and_lenient() {
        let compiled = CompiledExpression::compile("visited").unwrap();
        assert_eq!(
            compiled.eval(&EmptyScope),
            Err(ExprError::UndefinedVariable("visited".to_owned()))
        );
        assert_eq!(compiled.eval_lenient(&EmptyScope), Ok(Value::Null));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert_eq!(
            eval("1 / 0", &json!({})),
            Err(ExprError::NonFinite("/".to_owned()))
        );
    }

    #[test]
    fn test_builtins() {
        let scope = json!({"hp": -4.6});
        assert_eq!(eval("Math.abs(hp)", &scope), Ok(json!(4.6)));
        assert_eq!(eval("round(hp)", &scope), Ok(json!(-5)));
        assert_eq!(eval("max(1, 9, 3)", &scope), Ok(json!(9)));
        assert_eq!(
            eval("launch()", &scope),
            Err(ExprError::UnknownFunction("launch".to_owned()))
        );
    }

    #[test]
    fn test_array_and_object_literals() {
        let scope = json!({"x": 2});
        assert_eq!(eval("[1, x, 'a']", &scope), Ok(json!([1, 2, "a"])));
        assert_eq!(eval("{a: x + 1}", &scope), Ok(json!({"a": 3})));
    }
}
