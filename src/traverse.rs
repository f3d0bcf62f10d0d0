//! Depth-first mutable walk over the syntax tree.

use crate::ast::*;

/// A mutable handle to one node, handed to the walk callback.
pub enum NodeMut<'a> {
    StatementList(&'a mut StatementList),
    Statement(&'a mut Statement),
    Fork(&'a mut Fork),
    ForkBranch(&'a mut ForkBranch),
    Expression(&'a mut Expression),
    Identifier(&'a mut Identifier),
    Literal(&'a mut Literal),
}

/// Visit `fork` and every node below it. The callback sees each node
/// before its children.
pub fn walk_fork_mut<F: FnMut(NodeMut<'_>)>(fork: &mut Fork, f: &mut F) {
    f(NodeMut::Fork(fork));
    if let Some(scheme) = &mut fork.scheme {
        walk_object_mut(scheme, f);
    }
    for branch in &mut fork.conditions {
        f(NodeMut::ForkBranch(branch));
        if let Some(condition) = &mut branch.condition {
            walk_expression_mut(condition, f);
        }
        walk_statement_list_mut(&mut branch.body, f);
    }
}

pub fn walk_statement_list_mut<F: FnMut(NodeMut<'_>)>(list: &mut StatementList, f: &mut F) {
    f(NodeMut::StatementList(list));
    for stmt in &mut list.list {
        walk_statement_mut(stmt, f);
    }
}

pub fn walk_statement_mut<F: FnMut(NodeMut<'_>)>(stmt: &mut Statement, f: &mut F) {
    f(NodeMut::Statement(stmt));
    match stmt {
        Statement::Fork(fork) => walk_fork_mut(fork, f),
        Statement::Input(input) => {
            walk_identifier_mut(&mut input.result, f);
            walk_fork_mut(&mut input.fork, f);
        }
        Statement::Await { condition, body } => {
            walk_expression_mut(condition, f);
            walk_statement_list_mut(body, f);
        }
        Statement::Once { body } => walk_statement_list_mut(body, f),
        Statement::Act(value) | Statement::Hop(value) | Statement::Pop(value) => {
            walk_expression_mut(value, f)
        }
        Statement::Set { target, value } => {
            match target {
                SetTarget::Identifier(ident) => walk_identifier_mut(ident, f),
                SetTarget::CSArray(elements) => {
                    for el in elements {
                        walk_expression_mut(el, f);
                    }
                }
                SetTarget::EditReference { target, keys } => {
                    walk_expression_mut(target, f);
                    for key in keys {
                        walk_expression_mut(key, f);
                    }
                }
            }
            walk_expression_mut(value, f);
        }
        Statement::Run(run) => {
            walk_expression_mut(&mut run.name, f);
            for arg in &mut run.args {
                walk_expression_mut(arg, f);
            }
            if let Some(result) = &mut run.result {
                walk_identifier_mut(result, f);
            }
            if let Some(fork) = &mut run.fork {
                walk_fork_mut(fork, f);
            }
        }
        Statement::Use { name, imports } => {
            walk_expression_mut(name, f);
            for import in imports {
                f(NodeMut::Literal(import));
            }
        }
        Statement::Def { name, args, body } => {
            walk_identifier_mut(name, f);
            for arg in args {
                walk_identifier_mut(arg, f);
            }
            walk_statement_list_mut(body, f);
        }
    }
}

pub fn walk_expression_mut<F: FnMut(NodeMut<'_>)>(expr: &mut Expression, f: &mut F) {
    f(NodeMut::Expression(expr));
    match expr {
        Expression::BinOp { left, right, .. } => {
            walk_expression_mut(left, f);
            walk_expression_mut(right, f);
        }
        Expression::UnaryOp { target, .. } => walk_expression_mut(target, f),
        Expression::FunCall { callee, args } => {
            walk_expression_mut(callee, f);
            for arg in args {
                walk_expression_mut(arg, f);
            }
        }
        Expression::Member { target, property } => {
            walk_expression_mut(target, f);
            walk_expression_mut(property, f);
        }
        Expression::Identifier(ident) => walk_identifier_mut(ident, f),
        Expression::Literal(lit) => f(NodeMut::Literal(lit)),
        Expression::Array(elements) | Expression::Spread(elements) => {
            for el in elements {
                walk_expression_mut(el, f);
            }
        }
        Expression::Object(obj) => walk_object_mut(obj, f),
    }
}

// Property names are labels, so only the values are walked.
fn walk_object_mut<F: FnMut(NodeMut<'_>)>(obj: &mut Object, f: &mut F) {
    for prop in &mut obj.properties {
        walk_expression_mut(&mut prop.value, f);
    }
}

fn walk_identifier_mut<F: FnMut(NodeMut<'_>)>(ident: &mut Identifier, f: &mut F) {
    f(NodeMut::Identifier(ident));
}

/// Rename every identifier called `from` inside `fork` to `to`, in place.
pub fn rename_identifier(fork: &mut Fork, from: &str, to: &str) {
    log::trace!("renaming `{}` to `{}` in fork scope", from, to);
    walk_fork_mut(fork, &mut |node: NodeMut<'_>| {
        if let NodeMut::Identifier(ident) = node {
            if ident.name == from {
                ident.name = to.to_string();
            }
        }
    });
}
