//! # Expression Optimizer
//!
//! Tree-to-tree simplification applied to every expression before code
//! generation:
//! - Additive normalization: `+`/`-`/unary minus chains are flattened into
//!   signed terms, literal terms are summed, and the chain is rebuilt
//!   left-associated with the folded constant last
//! - Constant folding of `*` and `/` between literals
//! - Identities: `x*0`, `x*1`, `0/x`, `x/1`
//!
//! `optimize` is idempotent: optimizing an optimized tree returns it unchanged.

use crate::location::Location;
use crate::parser::{BinaryOp, Node, NodeKind};

/// One signed term of an additive chain
#[derive(Debug, Clone)]
struct Mononom {
    negative: bool,
    node: Node,
}

/// Flattened additive chain
#[derive(Debug, Default)]
struct Polynomial {
    terms: Vec<Mononom>,
    /// Folded literal sum and the location of the first literal seen
    constant: Option<(i64, Location)>,
}

impl Polynomial {
    fn add_constant(&mut self, value: i64, location: &Location) {
        match &mut self.constant {
            Some((sum, _)) => *sum = sum.wrapping_add(value),
            None => self.constant = Some((value, location.clone())),
        }
    }

    /// Adds `node` with the given sign, flattening nested chains
    fn collect(&mut self, node: &Node, negative: bool) {
        match &node.kind {
            NodeKind::Binary { op, left, right } if op.is_additive() => {
                self.collect(left, negative);
                self.collect(right, negative ^ (*op == BinaryOp::Sub));
            }
            NodeKind::Negation(inner) => self.collect(inner, !negative),
            NodeKind::Integer(value) => {
                let value = if negative { value.wrapping_neg() } else { *value };
                self.add_constant(value, &node.location);
            }
            _ => {
                // `x * 1` may reduce to a literal or to another chain
                let optimized = optimize(node);
                let flattens = optimized.is_additive()
                    || matches!(optimized.kind, NodeKind::Integer(_) | NodeKind::Negation(_));
                if flattens {
                    self.collect(&optimized, negative);
                } else {
                    self.terms.push(Mononom {
                        negative,
                        node: optimized,
                    });
                }
            }
        }
    }

    /// Rebuilds the chain: first positive term, remaining terms in order, constant last
    fn rebuild(mut self, fallback: &Location) -> Node {
        let constant = self.constant.take();

        if self.terms.is_empty() {
            let (value, location) = constant.unwrap_or((0, fallback.clone()));
            return Node::integer(location, value);
        }

        let mut pending_constant = constant.filter(|(value, _)| *value != 0);

        let head = match self.terms.iter().position(|term| !term.negative) {
            Some(index) => self.terms.remove(index).node,
            None => match pending_constant.take() {
                Some((value, location)) => Node::integer(location, value),
                None => {
                    let first = self.terms.remove(0).node;
                    Node::negation(first.location.clone(), first)
                }
            },
        };

        let mut chain = self.terms.into_iter().fold(head, |chain, term| {
            let op = if term.negative {
                BinaryOp::Sub
            } else {
                BinaryOp::Add
            };
            Node::binary(op, chain, term.node)
        });

        if let Some((value, location)) = pending_constant {
            chain = if value < 0 && value != i64::MIN {
                Node::binary(BinaryOp::Sub, chain, Node::integer(location, -value))
            } else {
                Node::binary(BinaryOp::Add, chain, Node::integer(location, value))
            };
        }

        chain
    }
}

/// Returns a simplified, semantically equivalent expression
pub fn optimize(node: &Node) -> Node {
    match &node.kind {
        NodeKind::Binary { op, .. } if op.is_additive() => optimize_additive(node),
        NodeKind::Negation(_) => optimize_additive(node),
        NodeKind::Binary { op, left, right } if op.is_multiplicative() => {
            optimize_multiplicative(*op, left, right, &node.location)
        }
        NodeKind::Binary { op, left, right } => Node::new(
            node.location.clone(),
            NodeKind::Binary {
                op: *op,
                left: Box::new(optimize(left)),
                right: Box::new(optimize(right)),
            },
        ),
        NodeKind::TypeCast { value, ty } => Node::new(
            node.location.clone(),
            NodeKind::TypeCast {
                value: Box::new(optimize(value)),
                ty: ty.clone(),
            },
        ),
        NodeKind::Call { callee, arguments } => Node::new(
            node.location.clone(),
            NodeKind::Call {
                callee: Box::new(optimize(callee)),
                arguments: arguments.iter().map(optimize).collect(),
            },
        ),
        _ => node.clone(),
    }
}

fn optimize_additive(node: &Node) -> Node {
    let mut polynomial = Polynomial::default();
    polynomial.collect(node, false);
    polynomial.rebuild(&node.location)
}

fn optimize_multiplicative(op: BinaryOp, left: &Node, right: &Node, location: &Location) -> Node {
    let left = optimize(left);
    let right = optimize(right);
    let literal = |value: i64| Node::integer(location.clone(), value);

    match (op, left.as_integer(), right.as_integer()) {
        (BinaryOp::Mul, Some(a), Some(b)) => return literal(a.wrapping_mul(b)),
        (BinaryOp::Div, Some(a), Some(b)) => {
            if let Some(quotient) = a.checked_div(b) {
                return literal(quotient);
            }
        }
        (BinaryOp::Mul, _, Some(0)) | (BinaryOp::Mul, Some(0), _) => return literal(0),
        (BinaryOp::Mul, _, Some(1)) => return left,
        (BinaryOp::Mul, Some(1), _) => return right,
        (BinaryOp::Div, Some(0), _) => return literal(0),
        (BinaryOp::Div, _, Some(1)) => return left,
        _ => {}
    }

    Node::new(
        location.clone(),
        NodeKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )
}
