use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complete Pigeon compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Top-level variable and function declarations in source order
    pub declarations: Vec<Node>,
}

/// A syntax tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Where the node starts in the source
    pub location: Location,
    /// What the node is
    pub kind: NodeKind,
}

/// Binary operators, in precedence groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinaryOp {
    /// `+` or `-`
    pub fn is_additive(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub)
    }

    /// `*` or `/`
    pub fn is_multiplicative(self) -> bool {
        matches!(self, BinaryOp::Mul | BinaryOp::Div)
    }

    /// Any of the six comparisons
    pub fn is_comparison(self) -> bool {
        !self.is_additive() && !self.is_multiplicative()
    }

    /// The comparison that holds when the operands are swapped (`a < b` iff `b > a`)
    pub fn swapped(self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Node variants
///
/// Type positions (`ty`, `return_type`) hold `Identifier` nodes naming the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Declarations
    /// Global variable: `<ty> <name> = <value>;`
    VariableDeclaration {
        /// Declared type
        ty: Box<Node>,
        /// Variable name
        name: String,
        /// Initializer expression
        value: Box<Node>,
    },

    /// Function: `<return_type|void> <name>(<parameters>) { <body> }`
    FunctionDeclaration {
        /// Declared return type, `None` for `void`
        return_type: Option<Box<Node>>,
        /// Function name
        name: String,
        /// `Parameter` nodes in declaration order
        parameters: Vec<Node>,
        /// Statements of the body
        body: Vec<Node>,
    },

    /// Function parameter: `<ty> <name>`
    Parameter {
        /// Declared type
        ty: Box<Node>,
        /// Parameter name
        name: String,
    },

    // Expressions
    /// Variable, parameter, function or type name
    Identifier(String),

    /// Integer literal
    Integer(i64),

    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Node>,
        /// Right operand
        right: Box<Node>,
    },

    /// Unary minus
    Negation(Box<Node>),

    /// Explicit cast: `<value> : <ty>`
    TypeCast {
        /// Value being converted
        value: Box<Node>,
        /// Target type
        ty: Box<Node>,
    },

    /// Function call
    Call {
        /// Called expression
        callee: Box<Node>,
        /// Arguments in source order
        arguments: Vec<Node>,
    },

    // Statements
    /// `<target> = <value>;`
    Assignment {
        /// Destination
        target: Box<Node>,
        /// Assigned expression
        value: Box<Node>,
    },

    /// `return <value>?;`
    Return(Option<Box<Node>>),

    /// `{ ... }`
    Block(Vec<Node>),

    /// `if (<condition>) <then_branch> else <else_branch>`
    If {
        /// Branch condition
        condition: Box<Node>,
        /// Taken when the condition holds
        then_branch: Box<Node>,
        /// Taken otherwise
        else_branch: Option<Box<Node>>,
    },

    /// `while (<condition>) <body>`
    While {
        /// Loop condition
        condition: Box<Node>,
        /// Loop body
        body: Box<Node>,
    },
}

impl Node {
    /// Creates a node
    pub fn new(location: Location, kind: NodeKind) -> Self {
        Node { location, kind }
    }

    /// Integer literal node
    pub fn integer(location: Location, value: i64) -> Self {
        Node::new(location, NodeKind::Integer(value))
    }

    /// Identifier node
    pub fn identifier(location: Location, name: impl Into<String>) -> Self {
        Node::new(location, NodeKind::Identifier(name.into()))
    }

    /// Binary node located at its left operand
    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::new(
            left.location.clone(),
            NodeKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    /// Negation node
    pub fn negation(location: Location, inner: Node) -> Self {
        Node::new(location, NodeKind::Negation(Box::new(inner)))
    }

    /// The literal value, if this node is an integer literal
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// True for `+`/`-` binary nodes
    pub fn is_additive(&self) -> bool {
        matches!(&self.kind, NodeKind::Binary { op, .. } if op.is_additive())
    }
}

impl fmt::Display for Node {
    /// Renders expressions back to source form, fully parenthesized
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Identifier(name) => write!(f, "{}", name),
            NodeKind::Integer(value) => write!(f, "{}", value),
            NodeKind::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            NodeKind::Negation(inner) => write!(f, "-{}", inner),
            NodeKind::TypeCast { value, ty } => write!(f, "{}:{}", value, ty),
            NodeKind::Call { callee, arguments } => {
                write!(f, "{}(", callee)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ")")
            }
            NodeKind::VariableDeclaration { name, .. } => write!(f, "<variable {}>", name),
            NodeKind::FunctionDeclaration { name, .. } => write!(f, "<function {}>", name),
            NodeKind::Parameter { name, .. } => write!(f, "<parameter {}>", name),
            NodeKind::Assignment { target, value } => write!(f, "{} = {};", target, value),
            NodeKind::Return(Some(value)) => write!(f, "return {};", value),
            NodeKind::Return(None) => write!(f, "return;"),
            NodeKind::Block(_) => write!(f, "<block>"),
            NodeKind::If { condition, .. } => write!(f, "<if {}>", condition),
            NodeKind::While { condition, .. } => write!(f, "<while {}>", condition),
        }
    }
}
