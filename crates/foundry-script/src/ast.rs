//! Tagged-variant AST. Every node kind required by the grammar gets its own
//! enum variant with typed child slots rather than an untyped
//! `(kind, payload)` tuple.

use foundry_core::value::Value;

/// Infix/`not` operators, each tagged with the operand-coercion group its
/// evaluator dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // string group
    Concat, // '.'
    // numeric group
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    BitAnd,
    BitOr,
    // logical group
    And,
    Or,
    Eq,
    NotEq,
    Lte,
    Gte,
    Lt,
    Gt,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandGroup {
    String,
    Numeric,
    Logical,
}

impl Operator {
    pub fn group(self) -> OperandGroup {
        match self {
            Operator::Concat => OperandGroup::String,
            Operator::Pow
            | Operator::Mul
            | Operator::Div
            | Operator::Mod
            | Operator::Add
            | Operator::Sub
            | Operator::BitAnd
            | Operator::BitOr => OperandGroup::Numeric,
            Operator::And
            | Operator::Or
            | Operator::Eq
            | Operator::NotEq
            | Operator::Lte
            | Operator::Gte
            | Operator::Lt
            | Operator::Gt
            | Operator::Not => OperandGroup::Logical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtherKind {
    Continue,
    Break,
    Pass,
}

/// A conditional branch in an `IfElse` chain. `condition = None` marks the
/// trailing `else` branch.
#[derive(Debug, Clone)]
pub struct Branch {
    pub condition: Option<Node>,
    pub expression: Node,
}

/// Scope options parsed from a `begin(k=v,...)` block's constant parameter
/// map. Only these three named options are given meaning; any other name is
/// a parse error (see `parser::parse_scope_options`).
#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    pub description: Option<String>,
    pub expected_time: Option<i64>,
    pub max_time: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub options: ScopeOptions,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    /// Wraps a single statement/expression with its originating source line.
    Line { line_no: u32, child: Box<Node> },
    Scope(Scope),
    JumpPoint { label: String },
    Goto { label: String, line_no: u32 },
    Constant(Value),
    Infix {
        operator: Operator,
        left: Box<Node>,
        right: Box<Node>,
    },
    While {
        condition: Box<Node>,
        expression: Box<Node>,
    },
    IfElse(Vec<Branch>),
    Variable {
        module: Option<String>,
        name: String,
    },
    /// `var[expr]` or `module.var[expr]`.
    ArrayMapItem {
        module: Option<String>,
        name: String,
        index: Box<Node>,
    },
    Array(Vec<Node>),
    /// Key order is the declaration order, not lexical order — evaluated in
    /// that order per the concurrency model's map-iteration-order rule.
    Map(Vec<(String, Node)>),
    Function {
        module: Option<String>,
        name: String,
        parameters: Vec<(String, Node)>,
    },
    Assignment {
        target: Box<Node>,
        value: Box<Node>,
    },
    Other(OtherKind),
    Exists(Box<Node>),
}
