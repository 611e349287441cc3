/*
 * Copyright Warden Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Expression nodes and opcodes consumed by the evaluator.

use smol_str::SmolStr;

use crate::token::Position;
use crate::value::Value;

/// A request variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    /// `principal`
    Principal,
    /// `action`
    Action,
    /// `resource`
    Resource,
    /// `context`
    Context,
    /// `?principal`, filled from the request's principal slot
    PrincipalSlot,
    /// `?resource`, filled from the request's resource slot
    ResourceSlot,
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Var::Principal => "principal",
            Var::Action => "action",
            Var::Resource => "resource",
            Var::Context => "context",
            Var::PrincipalSlot => "?principal",
            Var::ResourceSlot => "?resource",
        })
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation of a long
    Neg,
    /// Logical negation of a bool
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

/// Infix operators. `e.x` and `e["x"]` both lower to [`BinaryOp::Lookup`];
/// `unless` bodies are negated during lowering rather than given an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `&&` (short-circuiting)
    And,
    /// `||` (short-circuiting)
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// Entity-hierarchy membership
    In,
    /// Entity type test
    Is,
    /// Glob match on strings
    Like,
    /// Attribute presence test
    Has,
    /// Attribute access
    Lookup,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::In => "in",
            BinaryOp::Is => "is",
            BinaryOp::Like => "like",
            BinaryOp::Has => "has",
            BinaryOp::Lookup => ".",
        })
    }
}

/// An expression: its start position and node kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Start position of the expression's first token
    pub pos: Position,
    /// The node itself
    pub kind: ExprKind,
}

/// The expression node sum.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// An embedded literal value
    Value(Value),
    /// A request variable
    Var(Var),
    /// A bare name, consumed by `has`/`Lookup`
    Ident(SmolStr),
    /// Prefix operator application
    Unary {
        /// The operator
        op: UnaryOp,
        /// The operand
        expr: Box<Expr>,
    },
    /// Infix operator application
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `if c then t else e`; only the taken branch is evaluated
    If {
        /// The condition (must evaluate to a bool)
        cond: Box<Expr>,
        /// Taken when true
        then: Box<Expr>,
        /// Taken when false
        els: Box<Expr>,
    },
    /// A list of expressions evaluating to a set
    List {
        /// Kept from the source form; evaluation always yields a set
        is_set: bool,
        /// Element expressions
        elems: Vec<Expr>,
    },
    /// A record literal; duplicate keys resolve to the last one written
    Record {
        /// `(key, value)` pairs in written order
        pairs: Vec<(SmolStr, Expr)>,
    },
    /// An extension function or method call
    Call {
        /// Function name
        name: SmolStr,
        /// Receiver for method-style calls (`e.isIpv4()`)
        receiver: Option<Box<Expr>>,
        /// Argument expressions
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Build an expression at `pos`.
    pub fn new(pos: Position, kind: ExprKind) -> Self {
        Expr { pos, kind }
    }

    /// An embedded value.
    pub fn val(pos: Position, v: impl Into<Value>) -> Self {
        Expr::new(pos, ExprKind::Value(v.into()))
    }

    /// A variable reference.
    pub fn var(pos: Position, v: Var) -> Self {
        Expr::new(pos, ExprKind::Var(v))
    }

    /// A binary application; the node position is the left operand's.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::new(
            left.pos.clone(),
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    /// `left && right`.
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::And, left, right)
    }

    /// `!expr`.
    pub fn not(expr: Expr) -> Self {
        Expr::new(
            expr.pos.clone(),
            ExprKind::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            },
        )
    }

    /// `if cond then then else els`.
    pub fn ite(pos: Position, cond: Expr, then: Expr, els: Expr) -> Self {
        Expr::new(
            pos,
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            },
        )
    }

    /// True if this node is the literal `true` (used when folding the scope).
    pub fn is_literal_true(&self) -> bool {
        matches!(&self.kind, ExprKind::Value(Value::Bool(true)))
    }
}
