use serde_json::{json, Map, Value};

use crate::ast::*;
use crate::error::CompileError;
use crate::pref;
use crate::traverse::rename_identifier;

/// Name the runtime binds the received input value to inside `input` branches.
pub const INPUT_BINDING: &str = "_nlu";
/// Name the runtime binds a sub-program's return value to after `run`.
pub const RETURN_BINDING: &str = "_return";

/// Lower a parsed program to IR.
///
/// The program is consumed: binding fixups rename identifiers inside it, so a
/// tree is only ever compiled once.
pub fn compile_program(mut program: Program) -> Result<Value, CompileError> {
    let ir = compile_statement_list(&mut program.body)?;
    log::debug!("compiled {} top-level statements", program.body.list.len());
    Ok(Value::Object(ir))
}

/// Collapse `{"@do": [{"@fork": ...}]}` to the fork itself.
pub fn simplify(ir: Value) -> Value {
    let Value::Object(mut root) = ir else {
        return ir;
    };
    let is_single_fork = root.len() == 1
        && matches!(
            root.get("@do"),
            Some(Value::Array(list)) if list.len() == 1 && list[0].get("@fork").is_some()
        );
    if !is_single_fork {
        return Value::Object(root);
    }
    match root.remove("@do") {
        Some(Value::Array(mut list)) => list.pop().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

// ── Statements ──────────────────────────────────────────────────────

fn compile_statement_list(list: &mut StatementList) -> Result<Map<String, Value>, CompileError> {
    let statements = list
        .list
        .iter_mut()
        .map(compile_statement)
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = Map::new();
    out.insert("@do".to_string(), Value::Array(statements));
    Ok(out)
}

fn compile_statement(stmt: &mut Statement) -> Result<Value, CompileError> {
    match stmt {
        Statement::Fork(fork) => compile_fork(fork).map(Value::Object),
        Statement::Input(input) => {
            rename_identifier(&mut input.fork, &input.result.name, INPUT_BINDING);
            let mut body = compile_fork(&mut input.fork)?;
            body.insert("await".to_string(), json!(["input"]));
            Ok(Value::Object(body))
        }
        Statement::Await { condition, body } => {
            let mut out = compile_statement_list(body)?;
            out.insert("await".to_string(), compile_expression(condition)?);
            Ok(Value::Object(out))
        }
        Statement::Once { body } => {
            let mut out = compile_statement_list(body)?;
            out.insert("once".to_string(), Value::Bool(true));
            Ok(Value::Object(out))
        }
        Statement::Act(value) => Ok(json!({ "@act": compile_expression(value)? })),
        Statement::Hop(value) => Ok(json!({ "@hop": compile_expression(value)? })),
        Statement::Pop(value) => Ok(json!({ "@pop": compile_expression(value)? })),
        Statement::Set { target, value } => compile_set(target, value),
        Statement::Run(run) => compile_run(run),
        Statement::Use { name, imports } => Ok(json!({
            "@use": compile_expression(name)?,
            "import": imports.iter().map(compile_literal).collect::<Vec<_>>(),
        })),
        Statement::Def { name, args, body } => {
            let mut header = vec![Value::String(quote(&name.name))];
            header.extend(args.iter().map(|arg| Value::String(quote(&arg.name))));
            Ok(json!({
                "@def": header,
                "val": Value::Object(compile_statement_list(body)?),
            }))
        }
    }
}

fn compile_fork(fork: &mut Fork) -> Result<Map<String, Value>, CompileError> {
    let mut branches = Vec::with_capacity(fork.conditions.len());
    for branch in &mut fork.conditions {
        let mut compiled = compile_statement_list(&mut branch.body)?;
        if let Some(condition) = &branch.condition {
            compiled.insert("if".to_string(), compile_expression(condition)?);
        }
        branches.push(Value::Object(compiled));
    }

    let mut out = Map::new();
    out.insert("@fork".to_string(), Value::Array(branches));
    if let Some(scheme) = &fork.scheme {
        out.insert("scheme".to_string(), compile_object(scheme)?);
    }
    Ok(out)
}

fn compile_set(target: &SetTarget, value: &Expression) -> Result<Value, CompileError> {
    let (target, val) = match target {
        SetTarget::Identifier(ident) => (
            Value::String(quote(&ident.name)),
            compile_expression(value)?,
        ),
        SetTarget::EditReference { target, keys } => {
            let compiled_target = compile_expression(target)?;
            let Value::String(name) = &compiled_target else {
                return Err(CompileError::UnsupportedTarget {
                    message: format!(
                        "indexed assignment must start from a variable name, got {}",
                        compiled_target
                    ),
                });
            };
            let quoted = quote(name);
            let mut edit = vec![
                Value::String("`edit`".to_string()),
                compiled_target,
                compile_expression(value)?,
            ];
            for key in keys {
                edit.push(compile_expression(key)?);
            }
            (Value::String(quoted), Value::Array(edit))
        }
        SetTarget::CSArray(elements) => {
            let mut names = elements
                .iter()
                .map(|el| -> Result<Value, CompileError> {
                    match el {
                        Expression::Identifier(ident) => Ok(Value::String(quote(&ident.name))),
                        other => Err(CompileError::UnsupportedTarget {
                            message: format!("cannot assign to {}", compile_expression(other)?),
                        }),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            let target = if names.len() == 1 {
                names.pop().unwrap_or(Value::Null)
            } else {
                Value::Array(names)
            };
            (target, compile_expression(value)?)
        }
    };

    let mut out = Map::new();
    out.insert("@set".to_string(), target);
    out.insert("val".to_string(), val);
    Ok(Value::Object(out))
}

/// `run` and its optional result handling. Both result forms end up as a
/// fork over the reserved return binding.
fn compile_run(run: &mut Run) -> Result<Value, CompileError> {
    let mut call = Map::new();
    call.insert("@run".to_string(), compile_expression(&run.name)?);
    call.insert("args".to_string(), compile_array(&run.args)?);
    let mut steps = vec![Value::Object(call)];

    if let Some(result) = &run.result {
        let mut fork = match run.fork.take() {
            Some(mut fork) => {
                rename_identifier(&mut fork, &result.name, RETURN_BINDING);
                fork
            }
            None => assign_return_to(result),
        };
        let mut body = compile_fork(&mut fork)?;
        body.insert("await".to_string(), json!(["return"]));
        steps.push(Value::Object(body));
        run.fork = Some(fork);
    }

    Ok(json!({ "@do": steps }))
}

/// `_ { result = _return }`
fn assign_return_to(result: &Identifier) -> Fork {
    Fork {
        scheme: None,
        conditions: vec![ForkBranch {
            condition: None,
            body: StatementList {
                list: vec![Statement::Set {
                    target: SetTarget::Identifier(result.clone()),
                    value: Expression::Identifier(Identifier::new(RETURN_BINDING)),
                }],
            },
        }],
    }
}

// ── Expressions ─────────────────────────────────────────────────────

pub fn compile_expression(expr: &Expression) -> Result<Value, CompileError> {
    match expr {
        Expression::BinOp { op, left, right } => {
            let op = match op {
                BinaryOperator::Is => BinaryOperator::Eq.as_str(),
                other => other.as_str(),
            };
            Ok(json!([
                op,
                compile_expression(left)?,
                compile_expression(right)?
            ]))
        }
        Expression::UnaryOp { op, target } => {
            Ok(json!([op.as_str(), compile_expression(target)?]))
        }
        Expression::FunCall { callee, args } => compile_call(callee, args),
        Expression::Member { target, property } => Ok(json!([
            "get",
            compile_expression(property)?,
            compile_expression(target)?
        ])),
        Expression::Identifier(ident) => Ok(compile_identifier(ident)),
        Expression::Literal(lit) => Ok(compile_literal(lit)),
        Expression::Array(elements) => compile_array(elements),
        Expression::Object(object) => compile_object(object),
        // Outside an array there is nothing to splice into.
        Expression::Spread(elements) => elements
            .iter()
            .map(compile_expression)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

fn compile_call(callee: &Expression, args: &[Expression]) -> Result<Value, CompileError> {
    if let Expression::Identifier(ident) = callee {
        match ident.name.as_str() {
            "exists" => {
                let Some(arg) = args.first() else {
                    return Err(CompileError::Malformed {
                        message: "exists expects one argument".to_string(),
                    });
                };
                return Ok(json!(["?", compile_expression(arg)?]));
            }
            pref::PREF => return compile_expression(&pref::expand(args)?),
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(args.len() + 1);
    out.push(compile_expression(callee)?);
    for arg in args {
        out.push(compile_expression(arg)?);
    }
    Ok(Value::Array(out))
}

/// `["", elements...]`. The empty-string head marks a literal list for the
/// runtime; spread elements are spliced in place.
fn compile_array(elements: &[Expression]) -> Result<Value, CompileError> {
    let mut out = vec![Value::String(String::new())];
    for el in elements {
        let expanded = pref::expand_call(el)?;
        match expanded.as_ref().unwrap_or(el) {
            Expression::Spread(items) => {
                for item in items {
                    out.push(compile_expression(item)?);
                }
            }
            other => out.push(compile_expression(other)?),
        }
    }
    Ok(Value::Array(out))
}

fn compile_object(object: &Object) -> Result<Value, CompileError> {
    let mut out = Map::new();
    for prop in &object.properties {
        out.insert(quote(&prop.name.name), compile_expression(&prop.value)?);
    }
    Ok(Value::Object(out))
}

fn compile_identifier(ident: &Identifier) -> Value {
    // `null` is the literal null, not a variable.
    if ident.name == "null" {
        Value::Null
    } else {
        Value::String(ident.name.clone())
    }
}

fn compile_literal(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(quote(s)),
        Literal::Number(n) => number_value(*n),
        Literal::Boolean(b) => Value::Bool(*b),
    }
}

/// Integral numbers are written as JSON integers.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Backticks mark literal text, as opposed to a bare variable name.
fn quote(text: &str) -> String {
    format!("`{}`", text)
}
