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

//! Concrete syntax nodes produced by the parser.
//!
//! The CST stays close to the written form of a policy: scope clauses keep
//! their relational operator and `is` check separately, member access chains
//! are unresolved, and string literals are still quoted and escaped. Lowering
//! (`ast::lower`) turns this into the uniform expression tree the evaluator
//! walks.
//!
//! Nodes that could not be parsed are represented by `Bad*` placeholders so
//! that one syntax error does not discard the rest of the input.

use smol_str::SmolStr;

use crate::token::{Position, TokenKind};

/// A literal token captured in the tree: string, integer, identifier, or one
/// of the keyword tokens that can appear in expression position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lit {
    /// Start position of the literal
    pub pos: Position,
    /// Token kind as scanned
    pub kind: TokenKind,
    /// Raw token text (strings keep quotes and escapes)
    pub value: SmolStr,
}

/// A `Path::To::Type::"id"` entity reference. The last element is the quoted
/// id string; everything before it is the type path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityName {
    /// Path components followed by the id literal
    pub parts: Vec<Lit>,
}

impl EntityName {
    /// Position of the first path component.
    pub fn pos(&self) -> &Position {
        &self.parts[0].pos
    }
}

/// An expression as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Placeholder for an expression that failed to parse
    Bad {
        /// Where the unparsable expression started
        pos: Position,
    },
    /// A literal or variable token
    Lit(Lit),
    /// An entity reference
    Entity(EntityName),
    /// A prefix operator application (`!` or `-`)
    Unary {
        /// Operator position
        pos: Position,
        /// [`TokenKind::Not`] or [`TokenKind::Sub`]
        op: TokenKind,
        /// Operand
        expr: Box<Expr>,
    },
    /// An infix operator application
    Binary {
        /// Operator position
        pos: Position,
        /// The infix operator token
        op: TokenKind,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `if c then t else e`
    If {
        /// Position of `if`
        pos: Position,
        /// Condition
        cond: Box<Expr>,
        /// Taken when the condition is true
        then: Box<Expr>,
        /// Taken when the condition is false
        els: Box<Expr>,
    },
    /// A parenthesized expression
    Paren {
        /// Position of `(`
        pos: Position,
        /// The inner expression
        expr: Box<Expr>,
    },
    /// `[ ... ]` set literal
    Set {
        /// Position of `[`
        pos: Position,
        /// Elements in written order
        elems: Vec<Expr>,
    },
    /// `{ key: value, ... }` record literal
    Record {
        /// Position of `{`
        pos: Position,
        /// Field initializers in written order
        inits: Vec<RecordInit>,
    },
    /// A primary expression followed by `.x`, `.x(...)`, or `["k"]` accesses
    Member {
        /// The expression being accessed
        primary: Box<Expr>,
        /// Accesses in written order
        access: Vec<MemberAccess>,
    },
    /// A free function call such as `ip("10.0.0.1")`
    Call {
        /// Position of the function name
        pos: Position,
        /// Function name (last path component as written)
        name: SmolStr,
        /// Arguments in written order
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Start position of the expression's first token.
    pub fn pos(&self) -> &Position {
        match self {
            Expr::Bad { pos } => pos,
            Expr::Lit(lit) => &lit.pos,
            Expr::Entity(name) => name.pos(),
            Expr::Unary { pos, .. } => pos,
            Expr::Binary { left, .. } => left.pos(),
            Expr::If { pos, .. } => pos,
            Expr::Paren { pos, .. } => pos,
            Expr::Set { pos, .. } => pos,
            Expr::Record { pos, .. } => pos,
            Expr::Member { primary, .. } => primary.pos(),
            Expr::Call { pos, .. } => pos,
        }
    }
}

/// One `key: value` pair in a record literal. The key is an identifier or a
/// string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInit {
    /// The field name literal
    pub key: Lit,
    /// The field value
    pub value: Expr,
}

/// One step of a member access chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberAccess {
    /// `.ident`
    Attr {
        /// The accessed attribute
        ident: Lit,
    },
    /// `.ident( args )` method call
    Call {
        /// The method name
        ident: Lit,
        /// Arguments in written order
        args: Vec<Expr>,
    },
    /// `[ "key" ]` indexing
    Index {
        /// The string key literal
        key: Lit,
    },
}

/// The target of a scope clause's `==` or `in` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTarget {
    /// A single entity
    Entity(EntityName),
    /// `?principal` or `?resource`
    Slot {
        /// Slot position
        pos: Position,
        /// [`TokenKind::PrincipalSlot`] or [`TokenKind::ResourceSlot`]
        kind: TokenKind,
    },
    /// `[ Entity, ... ]`, only valid after `action in`
    Set {
        /// Position of `[`
        pos: Position,
        /// The listed entities
        entities: Vec<EntityName>,
    },
}

/// One of the three scope clauses: the variable keyword, an optional
/// `is Path` check, and an optional `==`/`in` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeClause {
    /// The `principal`/`action`/`resource` keyword literal
    pub name: Lit,
    /// `is` type path components, when present
    pub is_check: Option<Vec<Lit>>,
    /// The relational operator and its target, when present
    pub rel: Option<(TokenKind, ScopeTarget)>,
}

impl ScopeClause {
    /// A bare clause: just the variable keyword.
    pub fn empty(name: Lit) -> Self {
        ScopeClause {
            name,
            is_check: None,
            rel: None,
        }
    }
}

/// The parenthesized `(principal..., action..., resource...)` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// The `principal` clause
    pub principal: ScopeClause,
    /// The `action` clause
    pub action: ScopeClause,
    /// The `resource` clause
    pub resource: ScopeClause,
}

/// A `when { ... }` or `unless { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Position of the `when`/`unless` keyword
    pub pos: Position,
    /// [`TokenKind::When`] or [`TokenKind::Unless`]
    pub kind: TokenKind,
    /// The block's expression
    pub expr: Expr,
}

/// An `@key("value")` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Position of `@`
    pub pos: Position,
    /// The annotation name
    pub key: Lit,
    /// The quoted annotation value
    pub value: Lit,
}

/// One parsed policy statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStmt {
    /// Start position (the first annotation or the effect keyword)
    pub pos: Position,
    /// Leading annotations in written order
    pub annotations: Vec<Annotation>,
    /// [`TokenKind::Permit`] or [`TokenKind::Forbid`]
    pub effect: TokenKind,
    /// The scope triple
    pub scope: Scope,
    /// Trailing `when`/`unless` blocks in written order
    pub conditions: Vec<Condition>,
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// A parsed policy
    Policy(PolicyStmt),
    /// A statement that failed to parse
    Bad(Position),
}

/// A parsed source file: the policy statements in written order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFile {
    /// Statements, including `Bad` placeholders where recovery kicked in
    pub statements: Vec<Stmt>,
}
