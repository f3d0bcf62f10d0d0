//! The `pref` builtin: expands a preference object into weighted variants
//! for the runtime's utility scoring.
//!
//! `pref({polite: true, refuse_counter: 0}, ["refuse_counter"])` pairs the
//! object with copies whose listed fields are pushed in each direction.
//! Booleans flip; numbers move by `3 * v` (or by 1 when `v` is 0).

use crate::ast::*;
use crate::error::CompileError;

pub const PREF: &str = "pref";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// If `expr` is a call to `pref`, return its expansion.
pub fn expand_call(expr: &Expression) -> Result<Option<Expression>, CompileError> {
    match expr {
        Expression::FunCall { callee, args } => match callee.as_ref() {
            Expression::Identifier(ident) if ident.name == PREF => expand(args).map(Some),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Expand the arguments of a `pref(...)` call.
///
/// With any numeric field the result is a `Spread` of two pairs (original
/// with the up-flipped copy, original with the down-flipped copy) so an
/// enclosing array takes both pairs as elements. A purely boolean object
/// yields a single pair.
pub fn expand(args: &[Expression]) -> Result<Expression, CompileError> {
    let object = match args {
        [Expression::Object(object)] | [Expression::Object(object), _] => object,
        [] | [_] | [_, _] => {
            return Err(CompileError::Malformed {
                message: "pref expects an object literal as its first argument".to_string(),
            })
        }
        _ => {
            return Err(CompileError::Malformed {
                message: format!("pref takes at most two arguments, got {}", args.len()),
            })
        }
    };

    let flip_keys = match args.get(1) {
        Some(Expression::Array(elements)) => elements
            .iter()
            .map(|el| match el {
                Expression::Literal(Literal::String(name)) => Ok(name.clone()),
                _ => Err(CompileError::Type {
                    message: "pref array must only contain strings".to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(CompileError::Type {
                message: "pref expects an array of field names as its second argument"
                    .to_string(),
            })
        }
        None => object
            .properties
            .iter()
            .map(|prop| prop.name.name.clone())
            .collect(),
    };

    let mut has_number = false;
    for prop in &object.properties {
        match prop.value {
            Expression::Literal(Literal::Number(_)) => has_number = true,
            Expression::Literal(Literal::Boolean(_)) => {}
            _ => {
                return Err(CompileError::Type {
                    message:
                        "pref must be passed an object with static true/false values or numbers"
                            .to_string(),
                })
            }
        }
    }

    let pair = |direction: Direction| {
        Expression::Array(vec![
            Expression::Object(object.clone()),
            Expression::Object(flip_object(object, &flip_keys, direction)),
        ])
    };

    if has_number {
        log::trace!("pref: numeric fields, expanding to an up/down spread");
        Ok(Expression::Spread(vec![
            pair(Direction::Up),
            pair(Direction::Down),
        ]))
    } else {
        log::trace!("pref: boolean fields, expanding to a single pair");
        Ok(pair(Direction::Up))
    }
}

fn flip_object(object: &Object, flip_keys: &[String], direction: Direction) -> Object {
    let properties = object
        .properties
        .iter()
        .map(|prop| {
            let value = match &prop.value {
                Expression::Literal(lit) if flip_keys.contains(&prop.name.name) => {
                    Expression::Literal(flip(lit, direction))
                }
                other => other.clone(),
            };
            Property {
                name: prop.name.clone(),
                value,
            }
        })
        .collect();
    Object { properties }
}

/// Flip one field. Direction only matters for numbers.
pub fn flip(literal: &Literal, direction: Direction) -> Literal {
    match *literal {
        Literal::Boolean(b) => Literal::Boolean(!b),
        Literal::Number(v) => {
            let spread = if v == 0.0 { 1.0 } else { v * 3.0 };
            Literal::Number(match direction {
                Direction::Up => v + spread,
                Direction::Down => v - spread,
            })
        }
        Literal::String(ref s) => Literal::String(s.clone()),
    }
}
