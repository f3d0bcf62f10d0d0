use std::fmt;

/// A position in the source text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// 1-based line number
    pub line: usize,
    /// 0-based column (character offset within the line)
    pub column: usize,
    /// 0-based absolute byte offset from the start of input
    pub offset: usize,
}

impl Position {
    /// Compute the position of a byte offset within `input`.
    pub fn at(input: &str, offset: usize) -> Self {
        let consumed = &input[..offset.min(input.len())];
        let line = consumed.matches('\n').count() + 1;
        let line_start = consumed.rfind('\n').map(|i| i + 1).unwrap_or(0);
        Position {
            line,
            column: consumed[line_start..].chars().count(),
            offset,
        }
    }
}

pub const SYNTAX_ERROR: &str = "dmpl-parse-syntax-error";
pub const IF_IN_CONDITION: &str = "dmpl-parse-if-in-condition";

/// A grammar mismatch, reported with the line it happened on.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub code: &'static str,
    pub message: String,
    pub position: Position,
    /// The offending line with leading whitespace trimmed.
    pub snippet: String,
}

impl ParseError {
    pub fn new(code: &'static str, message: String, input: &str, offset: usize) -> Self {
        let position = Position::at(input, offset);
        let line_start = input[..position.offset.min(input.len())]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line_end = input[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(input.len());
        ParseError {
            code,
            message,
            position,
            snippet: input[line_start..line_end].trim_start().to_string(),
        }
    }

    pub fn syntax_error(message: String, input: &str, offset: usize) -> Self {
        Self::new(SYNTAX_ERROR, message, input, offset)
    }

    pub fn line(&self) -> usize {
        self.position.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n  Line {}: {}",
            self.message, self.position.line, self.snippet
        )
    }
}

impl std::error::Error for ParseError {}

/// A failure while lowering a parsed tree to IR.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A node whose shape the compiler cannot lower (e.g. a builtin call
    /// missing its arguments).
    Malformed { message: String },
    /// An assignment target that is neither a name, a name list nor an
    /// indexed write.
    UnsupportedTarget { message: String },
    /// `pref` called with literals of the wrong kind.
    Type { message: String },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Malformed { .. } => "dmpl-compile-malformed-node",
            CompileError::UnsupportedTarget { .. } => "dmpl-compile-unsupported-target",
            CompileError::Type { .. } => "dmpl-compile-type-error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CompileError::Malformed { message }
            | CompileError::UnsupportedTarget { message }
            | CompileError::Type { message } => message,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Malformed { message } => write!(f, "Invalid node: {}", message),
            CompileError::UnsupportedTarget { message } => {
                write!(f, "Unsupported assignment target: {}", message)
            }
            CompileError::Type { message } => write!(f, "TypeError: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Either failure class of [`crate::compile`].
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse(err) => err.code,
            Error::Compile(err) => err.code(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Compile(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Compile(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Error::Compile(err)
    }
}
