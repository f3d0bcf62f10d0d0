use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::*;
use crate::error::{ParseError, IF_IN_CONDITION};

static SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*").expect("symbol pattern is valid"));
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9.]+").expect("number pattern is valid"));

const KEYWORDS: &[&str] = &[
    "if", "fork", "input", "await", "once", "act", "hop", "pop", "run", "use", "def",
];

/// Binary operators grouped by precedence, loosest first. The flag marks
/// word operators, which must be followed by whitespace.
const OPERATOR_LEVELS: &[&[(&str, BinaryOperator, bool)]] = &[
    &[("||", BinaryOperator::Or, false)],
    &[("&&", BinaryOperator::And, false)],
    &[("is", BinaryOperator::Is, true), ("in", BinaryOperator::In, true)],
    &[
        ("<=", BinaryOperator::Le, false),
        (">=", BinaryOperator::Ge, false),
        ("==", BinaryOperator::Eq, false),
        ("<", BinaryOperator::Lt, false),
        (">", BinaryOperator::Gt, false),
        ("!=", BinaryOperator::Ne, false),
    ],
    &[
        ("++", BinaryOperator::Concat, false),
        ("+", BinaryOperator::Add, false),
        ("-", BinaryOperator::Sub, false),
        ("%", BinaryOperator::Mod, false),
    ],
    &[("*", BinaryOperator::Mul, false), ("/", BinaryOperator::Div, false)],
];

/// Parser state: tracks position in the input string.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

/// Parse DMPL source into a syntax tree.
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let mut parser = Parser { input, pos: 0 };
    let body = parser.parse_statement_list()?;

    parser.skip_ws();
    if parser.pos < parser.input.len() {
        return Err(parser.error(format!(
            "Unexpected '{}'",
            parser.peek_char().unwrap_or_default()
        )));
    }

    log::debug!("parsed {} top-level statements", body.list.len());
    Ok(Program { body })
}

impl<'a> Parser<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, ch: char) -> Result<(), ParseError> {
        if self.eat_char(ch) {
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}'", ch)))
        }
    }

    fn expect_str(&mut self, s: &str) -> Result<(), ParseError> {
        if self.starts_with(s) {
            self.advance(s.len());
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}'", s)))
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError::syntax_error(message, self.input, self.pos)
    }

    /// The symbol starting at the current position, if any.
    fn peek_word(&self) -> Option<&'a str> {
        SYMBOL.find(self.remaining()).map(|m| m.as_str())
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.peek_word() == Some(keyword) {
            self.advance(keyword.len());
            Ok(())
        } else {
            Err(self.error(format!("Expected `{}`", keyword)))
        }
    }

    // ── Whitespace & Comments ───────────────────────────────────────

    fn skip_ws(&mut self) {
        loop {
            while let Some(ch) = self.peek_char() {
                if ch.is_whitespace() {
                    self.advance(ch.len_utf8());
                } else {
                    break;
                }
            }
            // Line comments: // to end of line
            if self.starts_with("//") {
                while let Some(ch) = self.peek_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance(ch.len_utf8());
                }
            } else {
                break;
            }
        }
    }

    /// Require at least one whitespace character, then skip the rest
    /// (comments included).
    fn expect_ws(&mut self, after: &str) -> Result<(), ParseError> {
        match self.peek_char() {
            Some(ch) if ch.is_whitespace() => {
                self.skip_ws();
                Ok(())
            }
            _ => Err(self.error(format!("Expected whitespace after `{}`", after))),
        }
    }

    // ── Statements ──────────────────────────────────────────────────

    fn parse_statement_list(&mut self) -> Result<StatementList, ParseError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() || self.peek_char() == Some('}') {
                break;
            }
            list.push(self.parse_statement()?);
        }
        Ok(StatementList { list })
    }

    fn parse_block(&mut self) -> Result<StatementList, ParseError> {
        self.expect_char('{')?;
        let body = self.parse_statement_list()?;
        self.skip_ws();
        self.expect_char('}')?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.peek_char() == Some('#') {
            let scheme = self.parse_scheme()?;
            return match self.peek_word() {
                Some("if") => self.parse_if(Some(scheme)).map(Statement::Fork),
                Some("fork") => self.parse_fork(Some(scheme)).map(Statement::Fork),
                _ => Err(self.error("Expected `if` or `fork` after a scheme".to_string())),
            };
        }

        let keyword = match self.peek_word() {
            Some(word) if KEYWORDS.contains(&word) && !self.is_assignment_after(word.len()) => {
                word
            }
            _ => return self.parse_set(),
        };

        match keyword {
            "if" => self.parse_if(None).map(Statement::Fork),
            "fork" => self.parse_fork(None).map(Statement::Fork),
            "input" => self.parse_input().map(Statement::Input),
            "await" => {
                self.advance(keyword.len());
                self.expect_ws(keyword)?;
                let condition = self.parse_expression()?;
                self.skip_ws();
                let body = self.parse_block()?;
                Ok(Statement::Await { condition, body })
            }
            "once" => {
                self.advance(keyword.len());
                self.skip_ws();
                let body = self.parse_block()?;
                Ok(Statement::Once { body })
            }
            "act" | "hop" | "pop" => {
                self.advance(keyword.len());
                self.expect_ws(keyword)?;
                let value = self.parse_expression()?;
                Ok(match keyword {
                    "act" => Statement::Act(value),
                    "hop" => Statement::Hop(value),
                    _ => Statement::Pop(value),
                })
            }
            "run" => self.parse_run().map(Statement::Run),
            "use" => self.parse_use(),
            _ => self.parse_def(),
        }
    }

    /// True when the keyword-shaped word at the cursor is really the start
    /// of an assignment, e.g. `act = 5` or `act, hop = 1`.
    fn is_assignment_after(&self, word_len: usize) -> bool {
        let rest = self.remaining()[word_len..].trim_start();
        rest.starts_with(',') || (rest.starts_with('=') && !rest.starts_with("=="))
    }

    /// `#{ ... }` in front of `if` or `fork`.
    fn parse_scheme(&mut self) -> Result<Object, ParseError> {
        self.expect_char('#')?;
        let scheme = self.parse_object()?;
        self.skip_ws();
        Ok(scheme)
    }

    /// `if COND { } else if COND { } else { }`, flattened into one fork.
    fn parse_if(&mut self, scheme: Option<Object>) -> Result<Fork, ParseError> {
        self.expect_keyword("if")?;
        self.expect_ws("if")?;
        let condition = self.parse_expression()?;
        self.skip_ws();
        let body = self.parse_block()?;

        let mut conditions = vec![ForkBranch {
            condition: Some(condition),
            body,
        }];

        let saved = self.pos;
        self.skip_ws();
        if self.peek_word() == Some("else") {
            self.advance(4);
            self.skip_ws();
            if self.peek_char() == Some('{') {
                let body = self.parse_block()?;
                conditions.push(ForkBranch {
                    condition: None,
                    body,
                });
            } else if self.peek_word() == Some("if") {
                let nested = self.parse_if(None)?;
                conditions.extend(nested.conditions);
            } else {
                return Err(self.error("Expected `{` or `if` after `else`".to_string()));
            }
        } else {
            self.pos = saved;
        }

        Ok(Fork { scheme, conditions })
    }

    /// `fork { COND { } _ { } }`
    fn parse_fork(&mut self, scheme: Option<Object>) -> Result<Fork, ParseError> {
        self.expect_keyword("fork")?;
        self.skip_ws();
        let conditions = self.parse_branches()?;
        Ok(Fork { scheme, conditions })
    }

    /// `{ BRANCH* }`, shared by `fork`, `input` and `run`.
    fn parse_branches(&mut self) -> Result<Vec<ForkBranch>, ParseError> {
        self.expect_char('{')?;
        let mut branches = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() || self.peek_char() == Some('}') {
                break;
            }
            branches.push(self.parse_branch()?);
        }
        self.expect_char('}')?;
        Ok(branches)
    }

    fn parse_branch(&mut self) -> Result<ForkBranch, ParseError> {
        let is_default = self.peek_char() == Some('_')
            && !self
                .peek_char_at(1)
                .map_or(false, |ch| ch.is_ascii_alphanumeric() || ch == '_');

        let condition = if is_default {
            self.advance(1);
            self.skip_ws();
            if self.peek_char() != Some('{') {
                return Err(self.error(
                    "Expected `{` after `_`; a default branch takes no condition".to_string(),
                ));
            }
            None
        } else {
            if self.peek_word() == Some("if") {
                return Err(ParseError::new(
                    IF_IN_CONDITION,
                    "conditions do not need an `if`, remove it".to_string(),
                    self.input,
                    self.pos,
                ));
            }
            Some(self.parse_expression()?)
        };

        self.skip_ws();
        let body = self.parse_block()?;
        Ok(ForkBranch { condition, body })
    }

    /// `input -> name { BRANCH* }`
    fn parse_input(&mut self) -> Result<Input, ParseError> {
        self.expect_keyword("input")?;
        self.skip_ws();
        self.expect_str("->")?;
        self.skip_ws();
        let result = self.parse_symbol()?;
        self.skip_ws();
        let conditions = self.parse_branches()?;
        Ok(Input {
            result,
            fork: Fork {
                scheme: None,
                conditions,
            },
        })
    }

    /// `run NAME (args) [-> name [{ BRANCH* }]]`
    fn parse_run(&mut self) -> Result<Run, ParseError> {
        self.expect_keyword("run")?;
        self.skip_ws();
        let mut name = self.parse_expression()?;

        let saved = self.pos;
        self.skip_ws();
        let args = if self.eat_char('(') {
            self.parse_arguments(')')?
        } else {
            self.pos = saved;
            // `run Name(a, b)` reads the parens as a call postfix.
            match name {
                Expression::FunCall { callee, args } => {
                    name = *callee;
                    args
                }
                other => {
                    name = other;
                    Vec::new()
                }
            }
        };

        let saved = self.pos;
        self.skip_ws();
        if !self.starts_with("->") {
            self.pos = saved;
            return Ok(Run {
                name,
                args,
                result: None,
                fork: None,
            });
        }
        self.advance(2);
        self.skip_ws();
        let result = self.parse_symbol()?;

        let saved = self.pos;
        self.skip_ws();
        let fork = if self.peek_char() == Some('{') {
            Some(Fork {
                scheme: None,
                conditions: self.parse_branches()?,
            })
        } else {
            self.pos = saved;
            None
        };

        Ok(Run {
            name,
            args,
            result: Some(result),
            fork,
        })
    }

    /// `use "module" import a, b`
    fn parse_use(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword("use")?;
        self.expect_ws("use")?;
        if self.peek_char() != Some('"') {
            return Err(self.error("Expected a module name string".to_string()));
        }
        let name = Expression::Literal(Literal::String(self.parse_string()?));
        self.expect_ws("module name")?;
        self.expect_keyword("import")?;

        let mut imports = Vec::new();
        loop {
            self.skip_ws();
            let symbol = self.parse_symbol()?;
            imports.push(Literal::String(symbol.name));
            let saved = self.pos;
            self.skip_ws();
            if !self.eat_char(',') {
                self.pos = saved;
                break;
            }
        }

        Ok(Statement::Use { name, imports })
    }

    /// `def NAME(args) { body }`
    fn parse_def(&mut self) -> Result<Statement, ParseError> {
        self.expect_keyword("def")?;
        self.expect_ws("def")?;
        let name = self.parse_symbol()?;
        self.skip_ws();
        self.expect_char('(')?;

        let mut args = Vec::new();
        self.skip_ws();
        if !self.eat_char(')') {
            loop {
                self.skip_ws();
                args.push(self.parse_symbol()?);
                self.skip_ws();
                if self.eat_char(',') {
                    continue;
                }
                self.expect_char(')')?;
                break;
            }
        }

        self.skip_ws();
        let body = self.parse_block()?;
        Ok(Statement::Def { name, args, body })
    }

    /// `TARGET, TARGET = VALUE`
    fn parse_set(&mut self) -> Result<Statement, ParseError> {
        let mut elements = Vec::new();
        loop {
            self.skip_ws();
            elements.push(self.parse_expression()?);
            self.skip_ws();
            if !self.eat_char(',') {
                break;
            }
        }

        if self.starts_with("==") || !self.eat_char('=') {
            return Err(self.error("Expected '='".to_string()));
        }
        self.skip_ws();
        let value = self.parse_expression()?;

        Ok(Statement::Set {
            target: set_target(elements),
            value,
        })
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expression, ParseError> {
        let Some(operators) = OPERATOR_LEVELS.get(level) else {
            return self.parse_unary();
        };

        let mut left = self.parse_binary(level + 1)?;
        loop {
            let saved = self.pos;
            self.skip_ws();
            let Some((text, op)) = self.match_operator(operators) else {
                self.pos = saved;
                break;
            };
            self.advance(text.len());
            self.skip_ws();
            let right = self.parse_binary(level + 1)?;
            left = Expression::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn match_operator(
        &self,
        operators: &[(&'static str, BinaryOperator, bool)],
    ) -> Option<(&'static str, BinaryOperator)> {
        // `->` introduces a result binding, never a subtraction.
        if self.starts_with("->") {
            return None;
        }
        operators
            .iter()
            .find(|(text, _, word)| {
                self.starts_with(text)
                    && (!*word
                        || self
                            .remaining()
                            .get(text.len()..)
                            .and_then(|rest| rest.chars().next())
                            .map_or(false, char::is_whitespace))
            })
            .map(|(text, op, _)| (*text, *op))
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.peek_char() == Some('!') && self.peek_char_at(1) != Some('=') {
            self.advance(1);
            self.skip_ws();
            let target = self.parse_unary()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Not,
                target: Box::new(target),
            });
        }
        self.parse_postfix()
    }

    /// A primary followed by `[expr]` and `(args)` postfixes, folded left.
    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_char('[') {
                self.skip_ws();
                let property = self.parse_expression()?;
                self.skip_ws();
                self.expect_char(']')?;
                expr = Expression::Member {
                    target: Box::new(expr),
                    property: Box::new(property),
                };
            } else if self.eat_char('(') {
                let args = self.parse_arguments(')')?;
                expr = Expression::FunCall {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`. The opening
    /// bracket has already been consumed.
    fn parse_arguments(&mut self, close: char) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat_char(close) {
            return Ok(args);
        }
        loop {
            self.skip_ws();
            args.push(self.parse_expression()?);
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            self.expect_char(close)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.peek_char() {
            Some('"') => self
                .parse_string()
                .map(|s| Expression::Literal(Literal::String(s))),
            Some(ch) if ch == '-' || ch == '.' || ch.is_ascii_digit() => self
                .parse_number()
                .map(|n| Expression::Literal(Literal::Number(n))),
            Some('{') => self.parse_object().map(Expression::Object),
            Some('[') => {
                self.advance(1);
                self.parse_arguments(']').map(Expression::Array)
            }
            Some('(') => {
                self.advance(1);
                self.skip_ws();
                let expr = self.parse_expression()?;
                self.skip_ws();
                self.expect_char(')')?;
                Ok(expr)
            }
            _ => match self.peek_word() {
                Some("true") => {
                    self.advance(4);
                    Ok(Expression::Literal(Literal::Boolean(true)))
                }
                Some("false") => {
                    self.advance(5);
                    Ok(Expression::Literal(Literal::Boolean(false)))
                }
                Some(_) => self.parse_symbol().map(Expression::Identifier),
                None => Err(self.error("Expected an expression".to_string())),
            },
        }
    }

    /// `{ key: value, ... }`
    fn parse_object(&mut self) -> Result<Object, ParseError> {
        self.expect_char('{')?;
        let mut properties = Vec::new();
        loop {
            self.skip_ws();
            if self.eat_char('}') {
                break;
            }
            let name = self.parse_property_name()?;
            self.skip_ws();
            self.expect_char(':')?;
            self.skip_ws();
            let value = self.parse_expression()?;
            properties.push(Property { name, value });
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            self.expect_char('}')?;
            break;
        }
        Ok(Object { properties })
    }

    /// Object keys may be written as symbols, strings or numbers.
    fn parse_property_name(&mut self) -> Result<Identifier, ParseError> {
        match self.peek_char() {
            Some('"') => self.parse_string().map(Identifier::new),
            Some(ch) if ch == '-' || ch == '.' || ch.is_ascii_digit() => {
                let start = self.pos;
                self.parse_number()?;
                Ok(Identifier::new(&self.input[start..self.pos]))
            }
            _ => self.parse_symbol(),
        }
    }

    // ── Literals ────────────────────────────────────────────────────

    fn parse_symbol(&mut self) -> Result<Identifier, ParseError> {
        match self.peek_word() {
            Some(word) => {
                self.advance(word.len());
                Ok(Identifier::new(word))
            }
            None => Err(self.error("Expected an identifier".to_string())),
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let Some(m) = NUMBER.find(self.remaining()) else {
            return Err(self.error("Expected a number".to_string()));
        };
        let text = m.as_str();
        let n: f64 = text
            .parse()
            .map_err(|_| self.error(format!("Invalid number: {}", text)))?;
        self.advance(text.len());
        Ok(n)
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        let begin = self.pos;
        self.expect_char('"')?;
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    return Err(ParseError::syntax_error(
                        "Unterminated string".to_string(),
                        self.input,
                        begin,
                    ));
                }
                Some('"') => {
                    self.advance(1);
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance(1);
                    result.push(self.parse_escape_char()?);
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    result.push(ch);
                }
            }
        }
    }

    fn parse_escape_char(&mut self) -> Result<char, ParseError> {
        let Some(ch) = self.peek_char() else {
            return Err(self.error("Unterminated string".to_string()));
        };
        self.advance(ch.len_utf8());
        match ch {
            'b' => Ok('\u{0008}'),
            'f' => Ok('\u{000C}'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'u' => {
                let hex = self
                    .remaining()
                    .get(..4)
                    .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
                    .ok_or_else(|| self.error("Invalid unicode escape".to_string()))?;
                let code = u32::from_str_radix(hex, 16)
                    .map_err(|_| self.error("Invalid unicode escape".to_string()))?;
                self.advance(4);
                Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
            }
            other => Ok(other),
        }
    }
}

/// Turn the parsed left-hand side of `=` into an assignment target. A lone
/// indexed chain such as `a[0]["b"]` becomes an indexed write into `a`.
fn set_target(mut elements: Vec<Expression>) -> SetTarget {
    if elements.len() == 1 && matches!(elements.first(), Some(Expression::Member { .. })) {
        let mut keys = Vec::new();
        let mut current = elements.remove(0);
        while let Expression::Member { target, property } = current {
            keys.push(*property);
            current = *target;
        }
        keys.reverse();
        return SetTarget::EditReference {
            target: current,
            keys,
        };
    }
    SetTarget::CSArray(elements)
}
