//! Syntax tree produced by the parser and consumed by the compiler.

/// The root of a parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: StatementList,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatementList {
    pub list: Vec<Statement>,
}

/// A multi-branch conditional. `if`/`else` chains desugar to this too.
#[derive(Debug, Clone, PartialEq)]
pub struct Fork {
    /// `#{ ... }` metadata, passed through to the runtime untouched.
    pub scheme: Option<Object>,
    pub conditions: Vec<ForkBranch>,
}

/// One branch of a fork. `condition: None` is the default (`_` / `else`) branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkBranch {
    pub condition: Option<Expression>,
    pub body: StatementList,
}

/// `input -> name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub result: Identifier,
    pub fork: Fork,
}

/// `run NAME (args) -> name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub name: Expression,
    pub args: Vec<Expression>,
    /// The name bound to the sub-program's return value.
    pub result: Option<Identifier>,
    /// Branches keyed on the returned value, if the source wrote them.
    pub fork: Option<Fork>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Fork(Fork),
    Input(Input),
    Await {
        condition: Expression,
        body: StatementList,
    },
    Once {
        body: StatementList,
    },
    Act(Expression),
    Hop(Expression),
    Pop(Expression),
    Set {
        target: SetTarget,
        value: Expression,
    },
    Run(Run),
    /// `use "module" import a, b`
    Use {
        name: Expression,
        imports: Vec<Literal>,
    },
    /// `def NAME(args) { body }`
    Def {
        name: Identifier,
        args: Vec<Identifier>,
        body: StatementList,
    },
}

/// Left-hand side of `=`.
#[derive(Debug, Clone, PartialEq)]
pub enum SetTarget {
    Identifier(Identifier),
    /// `X, Y, Z = ...`
    CSArray(Vec<Expression>),
    /// `a[0]["b"] = ...`: write through `keys` into the value named by `target`.
    EditReference {
        target: Expression,
        keys: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Is,
    In,
    Le,
    Ge,
    Eq,
    Lt,
    Gt,
    Ne,
    Concat,
    Add,
    Sub,
    Mod,
    Mul,
    Div,
}

impl BinaryOperator {
    /// The operator as written in source.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Is => "is",
            BinaryOperator::In => "in",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Concat => "++",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mod => "%",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    BinOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        target: Box<Expression>,
    },
    FunCall {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    /// `target[property]`
    Member {
        target: Box<Expression>,
        property: Box<Expression>,
    },
    Identifier(Identifier),
    Literal(Literal),
    Array(Vec<Expression>),
    Object(Object),
    /// Elements that splice into the enclosing array instead of nesting.
    /// Only produced by macro expansion, never by the parser.
    Spread(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub properties: Vec<Property>,
}

/// `name: value` inside an object literal. The name is a label, not a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: Identifier,
    pub value: Expression,
}
