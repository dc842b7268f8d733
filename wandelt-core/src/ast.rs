//! Syntax tree for Wandelt.
//!
//! Nodes live in a single arena (`Ast`) and refer to their children by
//! `NodeId`. The tree is built once by the parser, read by later phases and
//! dropped as a whole.

use std::fmt::{self, Write as _};
use std::ops::Index;

use crate::span::SourceLocation;

/// Index of a node inside an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Negate => f.write_str("-"),
        }
    }
}

/// Whether an identifier was written with the variable sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Variable,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    NumberLiteral(i32),
    BinaryExpression {
        left: NodeId,
        right: NodeId,
        op: BinaryOp,
    },
    UnaryExpression {
        operand: NodeId,
        op: UnaryOp,
    },
    /// `base ** exponent`, kept apart from binary expressions because it is
    /// right-associative and may lower to a loop.
    PowerExpression {
        base: NodeId,
        exponent: NodeId,
    },
    GroupingExpression(NodeId),
    Scope(Vec<NodeId>),
    /// `else_scope` is `None` without an else branch. `else if` is a scope
    /// holding exactly one if statement.
    IfStatement {
        condition: NodeId,
        then_scope: NodeId,
        else_scope: Option<NodeId>,
    },
    /// `None` means `return 0`.
    ReturnStatement(Option<NodeId>),
    Declaration {
        identifier: String,
        kind: IdentifierKind,
    },
    CallExpression {
        declaration: NodeId,
        arguments: Vec<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: SourceLocation,
}

/// Arena owning every node of one compilation.
#[derive(Debug, Default, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Children must already be in the arena.
    pub fn push(&mut self, kind: NodeKind, location: SourceLocation) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, location });
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self[id].kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indented textual tree for a single node.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.dump_into(&mut out, id, 0);
        out
    }

    /// Dump a list of statements, one tree after another.
    pub fn dump_statements(&self, statements: &[NodeId]) -> String {
        let mut out = String::new();
        for &statement in statements {
            let _ = self.dump_into(&mut out, statement, 0);
        }
        out
    }

    fn dump_into(&self, out: &mut String, id: NodeId, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match self.kind(id) {
            NodeKind::NumberLiteral(value) => writeln!(out, "{indent}NumberLiteral: '{value}'")?,
            NodeKind::BinaryExpression { left, right, op } => {
                writeln!(out, "{indent}BinaryExpression: '{op}'")?;
                self.dump_into(out, *left, depth + 1)?;
                self.dump_into(out, *right, depth + 1)?;
            }
            NodeKind::UnaryExpression { operand, op } => {
                writeln!(out, "{indent}UnaryExpression: '{op}'")?;
                self.dump_into(out, *operand, depth + 1)?;
            }
            NodeKind::PowerExpression { base, exponent } => {
                writeln!(out, "{indent}PowerExpression:")?;
                self.dump_into(out, *base, depth + 1)?;
                self.dump_into(out, *exponent, depth + 1)?;
            }
            NodeKind::GroupingExpression(inner) => {
                writeln!(out, "{indent}GroupingExpression:")?;
                self.dump_into(out, *inner, depth + 1)?;
            }
            NodeKind::Scope(statements) => {
                writeln!(out, "{indent}Scope:")?;
                for &statement in statements {
                    self.dump_into(out, statement, depth + 1)?;
                }
            }
            NodeKind::IfStatement {
                condition,
                then_scope,
                else_scope,
            } => {
                writeln!(out, "{indent}IfStatement:")?;
                self.dump_into(out, *condition, depth + 1)?;
                self.dump_into(out, *then_scope, depth + 1)?;
                if let Some(else_scope) = else_scope {
                    writeln!(out, "{indent}  Else:")?;
                    self.dump_into(out, *else_scope, depth + 2)?;
                }
            }
            NodeKind::ReturnStatement(expression) => {
                writeln!(out, "{indent}ReturnStatement:")?;
                match expression {
                    Some(expression) => self.dump_into(out, *expression, depth + 1)?,
                    None => writeln!(out, "{indent}  (implicit 0)")?,
                }
            }
            NodeKind::Declaration { identifier, .. } => {
                writeln!(out, "{indent}Declaration: '{identifier}'")?
            }
            NodeKind::CallExpression {
                declaration,
                arguments,
            } => {
                writeln!(out, "{indent}CallExpression:")?;
                self.dump_into(out, *declaration, depth + 1)?;
                for &argument in arguments {
                    self.dump_into(out, argument, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}
