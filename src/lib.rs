pub mod ast;
pub mod compiler;
pub mod error;
pub mod json;
pub mod parser;
pub mod pref;
pub mod traverse;

use serde_json::Value;

pub use error::{CompileError, Error, ParseError, Position};

// ── Core API ───────────────────────────────────────────────────────

/// Parse DMPL source into a syntax tree without compiling it.
pub fn parse(source: &str) -> Result<ast::Program, ParseError> {
    parser::parse(source)
}

/// Compile DMPL source to the runtime's JSON IR.
///
/// Each call parses afresh, so compiling the same text twice yields equal
/// IR. A program that is a single fork compiles to the bare fork object.
pub fn compile(source: &str) -> Result<Value, Error> {
    let program = parser::parse(source)?;
    let ir = compiler::compile_program(program)?;
    Ok(compiler::simplify(ir))
}

#[cfg(test)]
mod tests;
