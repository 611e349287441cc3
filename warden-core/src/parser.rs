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

//! Recursive-descent parser: tokens to the concrete syntax tree.
//!
//! One method per grammar production, one token of lookahead. On an
//! unexpected token the parser reports a located diagnostic and keeps going
//! where it can, leaving `Bad` placeholder nodes behind; it gives up after
//! [`MAX_ERRORS`] errors and discards follow-on errors reported on the same
//! line as a recorded one.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::ast;
use crate::cst;
use crate::err::{ParseError, ParseErrors};
use crate::scanner::{CommentMode, Scanner};
use crate::token::{Position, Token, TokenKind};

/// The parser stops recording and bails out after this many errors.
pub const MAX_ERRORS: usize = 10;

/// Parse a policy source file into a [`ast::PolicySet`].
///
/// All syntax errors found (up to [`MAX_ERRORS`]) are returned together.
pub fn parse_policy_set(filename: &str, src: &str) -> Result<ast::PolicySet, ParseErrors> {
    let (file, src, mut errors) = parse_file(filename, src);
    let pset = ast::lower::lower_policy_file(&file, &src, &mut errors);
    if errors.is_empty() {
        Ok(pset)
    } else {
        Err(errors)
    }
}

/// Parse a single expression, mainly for tests and tools.
pub fn parse_expr(src: &str) -> Result<ast::Expr, ParseErrors> {
    let mut parser = Parser::new("<expr>", src);
    let expr = parser.parse_expr();
    let eof = parser.tok.pos.clone();
    if parser.tok.kind != TokenKind::Eof {
        parser.error(eof, "expected end of expression");
    }
    let source = parser.source();
    let mut errors = parser.into_errors();
    let lowered = ast::lower::lower_expr(&expr, &source, &mut errors);
    if errors.is_empty() {
        Ok(lowered)
    } else {
        Err(errors)
    }
}

/// Parse a source file into its concrete syntax tree, returning the tree,
/// the shared source text, and any errors.
pub fn parse_file(filename: &str, src: &str) -> (cst::PolicyFile, Arc<str>, ParseErrors) {
    let mut parser = Parser::new(filename, src);
    let file = parser.parse_policy_file();
    let source = parser.source();
    (file, source, parser.into_errors())
}

/// Parser state over one source text.
#[derive(Debug)]
pub struct Parser {
    scanner: Scanner,
    src: Arc<str>,
    /// One-token lookahead
    tok: Token,
    errors: ParseErrors,
    /// Set when the error threshold was hit; parsing unwinds quickly
    bail: bool,
}

impl Parser {
    /// Set up a parser over `src`.
    pub fn new(filename: &str, src: &str) -> Self {
        let src: Arc<str> = Arc::from(src);
        let mut scanner = Scanner::new(filename, Arc::clone(&src), CommentMode::Skip);
        let tok = scanner.scan();
        Parser {
            scanner,
            src,
            tok,
            errors: ParseErrors::new(),
            bail: false,
        }
    }

    /// The source text being parsed.
    pub fn source(&self) -> Arc<str> {
        Arc::clone(&self.src)
    }

    /// All errors recorded by the scanner and the parser, in source order,
    /// capped at [`MAX_ERRORS`].
    pub fn into_errors(mut self) -> ParseErrors {
        let mut all: Vec<ParseError> = self.scanner.take_errors().into_iter().collect();
        all.extend(self.errors);
        all.sort_by_key(|e| e.position().offset);
        all.truncate(MAX_ERRORS);
        let mut errors = ParseErrors::new();
        for err in all {
            errors.push(err);
        }
        errors
    }

    fn next(&mut self) {
        self.tok = self.scanner.scan();
    }

    /// Record an error unless it is on the same line as the previous one
    /// (likely spurious) or the threshold has been reached.
    fn error(&mut self, pos: Position, msg: impl Into<String>) {
        if let Some(last) = self.errors.last() {
            if last.position().filename == pos.filename && last.position().line == pos.line {
                return;
            }
        }
        if self.errors.len() >= MAX_ERRORS {
            self.bail = true;
            return;
        }
        self.errors
            .push(ParseError::new(msg, pos, Arc::clone(&self.src)));
    }

    fn error_expected(&mut self, pos: Position, what: &str) {
        let mut msg = format!("expected {what}");
        if pos == self.tok.pos {
            match self.tok.kind {
                TokenKind::Eof => msg += ", found end of input",
                kind if kind.is_literal() => {
                    msg += &format!(", found {}", self.tok.lit);
                }
                kind => msg += &format!(", found '{kind}'"),
            }
        }
        self.error(pos, msg);
    }

    /// Consume the current token, reporting an error if it is not `kind`.
    /// Always advances, so the parser keeps making progress.
    fn expect(&mut self, kind: TokenKind) -> Position {
        let pos = self.tok.pos.clone();
        if self.tok.kind != kind {
            self.error_expected(pos.clone(), &format!("'{kind}'"));
        }
        self.next();
        pos
    }

    fn lit_here(&self) -> cst::Lit {
        cst::Lit {
            pos: self.tok.pos.clone(),
            kind: self.tok.kind,
            value: if self.tok.lit.is_empty() {
                SmolStr::from(self.tok.kind.as_str())
            } else {
                self.tok.lit.clone()
            },
        }
    }

    // ------------------------------------------------------------------
    // File ::= Policy*

    /// Parse the whole input as a sequence of policy statements.
    pub fn parse_policy_file(&mut self) -> cst::PolicyFile {
        let mut statements = Vec::new();
        while self.tok.kind != TokenKind::Eof && !self.bail {
            statements.push(self.parse_policy());
        }
        cst::PolicyFile { statements }
    }

    // ------------------------------------------------------------------
    // Policy ::= Annotation* ('permit'|'forbid') '(' Scope ')' Condition* ';'

    fn parse_policy(&mut self) -> cst::Stmt {
        let pos = self.tok.pos.clone();
        let annotations = self.parse_annotations();

        let effect = self.tok.kind;
        if effect != TokenKind::Permit && effect != TokenKind::Forbid {
            let at = self.tok.pos.clone();
            self.error(at, "expected either 'permit' or 'forbid'");
            self.next();
            self.sync_to_policy_start();
            return cst::Stmt::Bad(pos);
        }
        self.next();

        let scope = self.parse_scope();
        let conditions = self.parse_conditions();
        self.expect_policy_end();

        cst::Stmt::Policy(cst::PolicyStmt {
            pos,
            annotations,
            effect,
            scope,
            conditions,
        })
    }

    /// Consume the `;` ending a policy. If it is missing, report it and skip
    /// ahead to the next token that can start or end a policy, so one missing
    /// semicolon does not swallow the following statement.
    fn expect_policy_end(&mut self) {
        if self.tok.kind == TokenKind::Semicolon {
            self.next();
            return;
        }
        let pos = self.tok.pos.clone();
        self.error_expected(pos, "';'");
        self.sync_to_policy_start();
    }

    /// Skip to the next likely policy boundary for error recovery.
    fn sync_to_policy_start(&mut self) {
        while !matches!(
            self.tok.kind,
            TokenKind::Semicolon
                | TokenKind::Permit
                | TokenKind::Forbid
                | TokenKind::At
                | TokenKind::Eof
        ) {
            self.next();
        }
        if self.tok.kind == TokenKind::Semicolon {
            self.next();
        }
    }

    // ------------------------------------------------------------------
    // Annotation ::= '@' IDENT '(' STR ')'

    fn parse_annotations(&mut self) -> Vec<cst::Annotation> {
        let mut annotations = Vec::new();
        while self.tok.kind == TokenKind::At {
            let pos = self.tok.pos.clone();
            self.next();
            let key = self.parse_ident();
            self.expect(TokenKind::LParen);
            let value = self.parse_string();
            self.expect(TokenKind::RParen);
            annotations.push(cst::Annotation { pos, key, value });
        }
        annotations
    }

    // ------------------------------------------------------------------
    // Scope ::= PrincipalClause ',' ActionClause ',' ResourceClause

    fn parse_scope(&mut self) -> cst::Scope {
        self.expect(TokenKind::LParen);
        let principal = self.parse_principal_resource(TokenKind::Principal);
        self.expect(TokenKind::Comma);
        let action = self.parse_action();
        self.expect(TokenKind::Comma);
        let resource = self.parse_principal_resource(TokenKind::Resource);
        self.expect(TokenKind::RParen);
        cst::Scope {
            principal,
            action,
            resource,
        }
    }

    // ------------------------------------------------------------------
    // PrincipalClause ::= 'principal' ( ['is' Path] ['in' (Entity|Slot)]
    //                                 | '==' (Entity|Slot) )?
    // ResourceClause mirrors it with '?resource'.

    fn parse_principal_resource(&mut self, keyword: TokenKind) -> cst::ScopeClause {
        let pos = self.expect(keyword);
        let name = cst::Lit {
            pos,
            kind: keyword,
            value: SmolStr::from(keyword.as_str()),
        };
        let slot_kind = if keyword == TokenKind::Principal {
            TokenKind::PrincipalSlot
        } else {
            TokenKind::ResourceSlot
        };

        let mut clause = cst::ScopeClause::empty(name);

        if self.tok.kind == TokenKind::Is {
            self.next();
            clause.is_check = self.parse_path();
            if self.tok.kind != TokenKind::In {
                if self.tok.kind == TokenKind::Eq {
                    let at = self.tok.pos.clone();
                    self.error(at, "'==' cannot follow an 'is' check (use 'in')");
                    self.next();
                }
                return clause;
            }
        }

        if self.tok.kind != TokenKind::In && self.tok.kind != TokenKind::Eq {
            return clause;
        }
        let op = self.tok.kind;
        self.next();

        if self.tok.kind == slot_kind {
            let target = cst::ScopeTarget::Slot {
                pos: self.tok.pos.clone(),
                kind: self.tok.kind,
            };
            self.next();
            clause.rel = Some((op, target));
        } else if let Some(entity) = self.parse_entity() {
            clause.rel = Some((op, cst::ScopeTarget::Entity(entity)));
        }
        clause
    }

    // ------------------------------------------------------------------
    // ActionClause ::= 'action' ( '==' Entity | 'in' ('[' EntList ']' | Entity) )?

    fn parse_action(&mut self) -> cst::ScopeClause {
        let pos = self.expect(TokenKind::Action);
        let name = cst::Lit {
            pos,
            kind: TokenKind::Action,
            value: SmolStr::from(TokenKind::Action.as_str()),
        };
        let mut clause = cst::ScopeClause::empty(name);

        if self.tok.kind != TokenKind::In && self.tok.kind != TokenKind::Eq {
            return clause;
        }
        let op = self.tok.kind;
        self.next();

        if op == TokenKind::Eq || self.tok.kind != TokenKind::LBracket {
            if let Some(entity) = self.parse_entity() {
                clause.rel = Some((op, cst::ScopeTarget::Entity(entity)));
            }
            return clause;
        }

        let lbrack = self.expect(TokenKind::LBracket);
        let mut entities = Vec::new();
        if self.tok.kind != TokenKind::RBracket {
            if let Some(entity) = self.parse_entity() {
                entities.push(entity);
            }
            while self.tok.kind == TokenKind::Comma {
                self.next();
                if let Some(entity) = self.parse_entity() {
                    entities.push(entity);
                }
            }
        }
        self.expect(TokenKind::RBracket);
        clause.rel = Some((
            op,
            cst::ScopeTarget::Set {
                pos: lbrack,
                entities,
            },
        ));
        clause
    }

    // ------------------------------------------------------------------
    // Condition ::= ('when'|'unless') '{' Expr '}'

    fn parse_conditions(&mut self) -> Vec<cst::Condition> {
        let mut conditions = Vec::new();
        while matches!(self.tok.kind, TokenKind::When | TokenKind::Unless) {
            let pos = self.tok.pos.clone();
            let kind = self.tok.kind;
            self.next();
            self.expect(TokenKind::LBrace);
            let expr = self.parse_expr();
            self.expect(TokenKind::RBrace);
            conditions.push(cst::Condition { pos, kind, expr });
        }
        conditions
    }

    // ------------------------------------------------------------------
    // Expr ::= Or | 'if' Expr 'then' Expr 'else' Expr

    fn parse_expr(&mut self) -> cst::Expr {
        if self.tok.kind == TokenKind::If {
            let pos = self.tok.pos.clone();
            self.next();
            let cond = self.parse_expr();
            self.expect(TokenKind::Then);
            let then = self.parse_expr();
            self.expect(TokenKind::Else);
            let els = self.parse_expr();
            cst::Expr::If {
                pos,
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            }
        } else {
            self.parse_or()
        }
    }

    // Or ::= And ('||' And)*
    fn parse_or(&mut self) -> cst::Expr {
        let mut lhs = self.parse_and();
        while self.tok.kind == TokenKind::Or {
            let pos = self.tok.pos.clone();
            self.next();
            let rhs = self.parse_and();
            lhs = cst::Expr::Binary {
                pos,
                op: TokenKind::Or,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        lhs
    }

    // And ::= Rel ('&&' Rel)*
    fn parse_and(&mut self) -> cst::Expr {
        let mut lhs = self.parse_relation();
        while self.tok.kind == TokenKind::And {
            let pos = self.tok.pos.clone();
            self.next();
            let rhs = self.parse_relation();
            lhs = cst::Expr::Binary {
                pos,
                op: TokenKind::And,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        lhs
    }

    // Rel ::= Add ( RELOP Add | 'has' (IDENT|STR) | 'like' STR | 'is' Path )?
    fn parse_relation(&mut self) -> cst::Expr {
        let lhs = self.parse_add();
        let pos = self.tok.pos.clone();
        let op = self.tok.kind;

        match op {
            TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::In => {
                self.next();
                let rhs = self.parse_add();
                cst::Expr::Binary {
                    pos,
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                }
            }
            TokenKind::Has => {
                self.next();
                if self.tok.kind != TokenKind::Str && self.tok.kind != TokenKind::Ident {
                    let at = self.tok.pos.clone();
                    self.error_expected(at.clone(), "attribute name");
                    self.next();
                    return cst::Expr::Bad { pos: at };
                }
                let key = self.lit_here();
                self.next();
                cst::Expr::Binary {
                    pos,
                    op,
                    left: Box::new(lhs),
                    right: Box::new(cst::Expr::Lit(key)),
                }
            }
            TokenKind::Like => {
                self.next();
                if self.tok.kind != TokenKind::Str {
                    let at = self.tok.pos.clone();
                    self.error_expected(at.clone(), "pattern string");
                    self.next();
                    return cst::Expr::Bad { pos: at };
                }
                let pattern = self.lit_here();
                self.next();
                cst::Expr::Binary {
                    pos,
                    op,
                    left: Box::new(lhs),
                    right: Box::new(cst::Expr::Lit(pattern)),
                }
            }
            TokenKind::Is => {
                self.next();
                match self.parse_path() {
                    Some(mut parts) => {
                        // the type path is represented as an entity name with
                        // an empty id
                        parts.push(cst::Lit {
                            pos: self.tok.pos.clone(),
                            kind: TokenKind::Str,
                            value: SmolStr::from("\"\""),
                        });
                        cst::Expr::Binary {
                            pos,
                            op,
                            left: Box::new(lhs),
                            right: Box::new(cst::Expr::Entity(cst::EntityName { parts })),
                        }
                    }
                    None => cst::Expr::Bad { pos },
                }
            }
            _ => lhs,
        }
    }

    // Add ::= Mul (('+'|'-') Mul)*
    fn parse_add(&mut self) -> cst::Expr {
        let mut lhs = self.parse_mult();
        while matches!(self.tok.kind, TokenKind::Add | TokenKind::Sub) {
            let pos = self.tok.pos.clone();
            let op = self.tok.kind;
            self.next();
            let rhs = self.parse_mult();
            lhs = cst::Expr::Binary {
                pos,
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        lhs
    }

    // Mul ::= Unary (('*'|'/'|'%') Unary)*
    fn parse_mult(&mut self) -> cst::Expr {
        let mut lhs = self.parse_unary();
        while matches!(self.tok.kind, TokenKind::Mul | TokenKind::Div | TokenKind::Mod) {
            let pos = self.tok.pos.clone();
            let op = self.tok.kind;
            self.next();
            let rhs = self.parse_unary();
            lhs = cst::Expr::Binary {
                pos,
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        lhs
    }

    // Unary ::= ('!'|'-')* Member
    fn parse_unary(&mut self) -> cst::Expr {
        if matches!(self.tok.kind, TokenKind::Not | TokenKind::Sub) {
            let pos = self.tok.pos.clone();
            let op = self.tok.kind;
            self.next();
            cst::Expr::Unary {
                pos,
                op,
                expr: Box::new(self.parse_unary()),
            }
        } else {
            self.parse_member()
        }
    }

    // Member ::= Primary ('.' IDENT ['(' ExprList? ')'] | '[' STR ']')*
    fn parse_member(&mut self) -> cst::Expr {
        let primary = self.parse_primary();
        if self.tok.kind != TokenKind::Period && self.tok.kind != TokenKind::LBracket {
            return primary;
        }

        let mut access = Vec::new();
        loop {
            match self.tok.kind {
                TokenKind::Period => {
                    self.next();
                    let ident = self.parse_ident();
                    if self.tok.kind == TokenKind::LParen {
                        self.next();
                        let args = self.parse_expr_list(TokenKind::RParen);
                        access.push(cst::MemberAccess::Call { ident, args });
                    } else {
                        access.push(cst::MemberAccess::Attr { ident });
                    }
                }
                TokenKind::LBracket => {
                    self.next();
                    let key = self.parse_string();
                    self.expect(TokenKind::RBracket);
                    access.push(cst::MemberAccess::Index { key });
                }
                _ => break,
            }
        }

        cst::Expr::Member {
            primary: Box::new(primary),
            access,
        }
    }

    // Primary ::= Literal | VarToken | Entity | ExtFun '(' ExprList? ')'
    //           | '(' Expr ')' | '[' ExprList? ']' | '{' RecInits? '}'
    fn parse_primary(&mut self) -> cst::Expr {
        match self.tok.kind {
            TokenKind::True
            | TokenKind::False
            | TokenKind::Str
            | TokenKind::Int
            | TokenKind::Principal
            | TokenKind::Action
            | TokenKind::Resource
            | TokenKind::Context
            | TokenKind::PrincipalSlot
            | TokenKind::ResourceSlot => {
                let lit = self.lit_here();
                self.next();
                cst::Expr::Lit(lit)
            }
            TokenKind::LParen => {
                let pos = self.expect(TokenKind::LParen);
                let expr = self.parse_expr();
                self.expect(TokenKind::RParen);
                cst::Expr::Paren {
                    pos,
                    expr: Box::new(expr),
                }
            }
            TokenKind::LBracket => {
                let pos = self.expect(TokenKind::LBracket);
                let elems = self.parse_expr_list(TokenKind::RBracket);
                cst::Expr::Set { pos, elems }
            }
            TokenKind::LBrace => {
                let pos = self.expect(TokenKind::LBrace);
                let inits = self.parse_record_inits();
                self.expect(TokenKind::RBrace);
                cst::Expr::Record { pos, inits }
            }
            TokenKind::Ident => match self.parse_entity_or_path() {
                Some(EntityOrPath::Entity(entity)) => cst::Expr::Entity(entity),
                Some(EntityOrPath::Path(parts)) => {
                    // a bare path in expression position is a function call
                    let pos = parts[0].pos.clone();
                    let name = parts[parts.len() - 1].value.clone();
                    self.expect(TokenKind::LParen);
                    let args = self.parse_expr_list(TokenKind::RParen);
                    cst::Expr::Call { pos, name, args }
                }
                None => cst::Expr::Bad {
                    pos: self.tok.pos.clone(),
                },
            },
            _ => {
                let pos = self.tok.pos.clone();
                self.error_expected(pos.clone(), "expression");
                cst::Expr::Bad { pos }
            }
        }
    }

    // ExprList ::= Expr (',' Expr)*  -- consumes the closing token
    fn parse_expr_list(&mut self, end: TokenKind) -> Vec<cst::Expr> {
        if self.tok.kind == end {
            self.next();
            return Vec::new();
        }
        let mut exprs = vec![self.parse_expr()];
        while self.tok.kind == TokenKind::Comma {
            self.next();
            exprs.push(self.parse_expr());
        }
        self.expect(end);
        exprs
    }

    // RecInits ::= (IDENT|STR) ':' Expr (',' (IDENT|STR) ':' Expr)*
    fn parse_record_inits(&mut self) -> Vec<cst::RecordInit> {
        let mut inits = Vec::new();
        while matches!(self.tok.kind, TokenKind::Str | TokenKind::Ident) {
            let key = self.lit_here();
            self.next();
            self.expect(TokenKind::Colon);
            let value = self.parse_expr();
            inits.push(cst::RecordInit { key, value });
            if self.tok.kind == TokenKind::Comma {
                self.next();
            }
        }
        inits
    }

    // ------------------------------------------------------------------
    // Path ::= IDENT ('::' IDENT)*
    // Entity ::= Path '::' STR

    /// Parse a bare type path; a string literal in the path is an error.
    fn parse_path(&mut self) -> Option<Vec<cst::Lit>> {
        match self.parse_entity_or_path() {
            Some(EntityOrPath::Path(parts)) => Some(parts),
            Some(EntityOrPath::Entity(entity)) => {
                let pos = entity.pos().clone();
                self.error(pos, "unexpected string literal in type path");
                None
            }
            None => None,
        }
    }

    /// Parse an entity reference; a bare path with no id is an error.
    fn parse_entity(&mut self) -> Option<cst::EntityName> {
        match self.parse_entity_or_path() {
            Some(EntityOrPath::Entity(entity)) => Some(entity),
            Some(EntityOrPath::Path(_)) => {
                let pos = self.tok.pos.clone();
                self.error_expected(pos, "string literal");
                None
            }
            None => None,
        }
    }

    fn parse_entity_or_path(&mut self) -> Option<EntityOrPath> {
        if self.tok.kind != TokenKind::Ident {
            let pos = self.tok.pos.clone();
            self.error_expected(pos, "identifier");
            return None;
        }
        let mut parts = vec![self.lit_here()];
        self.next();

        while self.tok.kind == TokenKind::PathSep {
            self.next();
            if self.tok.kind == TokenKind::Ident {
                parts.push(self.lit_here());
                self.next();
            } else {
                break;
            }
        }

        if self.tok.kind == TokenKind::Str {
            parts.push(self.lit_here());
            self.next();
            Some(EntityOrPath::Entity(cst::EntityName { parts }))
        } else {
            Some(EntityOrPath::Path(parts))
        }
    }

    fn parse_ident(&mut self) -> cst::Lit {
        if self.tok.kind == TokenKind::Ident {
            let lit = self.lit_here();
            self.next();
            lit
        } else {
            let pos = self.expect(TokenKind::Ident);
            cst::Lit {
                pos,
                kind: TokenKind::Ident,
                value: SmolStr::from("_"),
            }
        }
    }

    fn parse_string(&mut self) -> cst::Lit {
        if self.tok.kind == TokenKind::Str {
            let lit = self.lit_here();
            self.next();
            lit
        } else {
            let pos = self.expect(TokenKind::Str);
            cst::Lit {
                pos,
                kind: TokenKind::Str,
                value: SmolStr::from("\"\""),
            }
        }
    }
}

enum EntityOrPath {
    Entity(cst::EntityName),
    Path(Vec<cst::Lit>),
}

#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;

    fn parse_ok(src: &str) -> cst::PolicyFile {
        let (file, _, errors) = parse_file("test.cedar", src);
        assert!(errors.is_empty(), "unexpected errors: {errors}");
        file
    }

    fn first_policy(file: &cst::PolicyFile) -> &cst::PolicyStmt {
        match &file.statements[0] {
            cst::Stmt::Policy(p) => p,
            cst::Stmt::Bad(pos) => panic!("bad statement at {pos}"),
        }
    }

    #[test]
    fn parses_empty_scope() {
        let file = parse_ok("permit (principal, action, resource);");
        let policy = first_policy(&file);
        assert_eq!(policy.effect, TokenKind::Permit);
        assert!(policy.scope.principal.rel.is_none());
        assert!(policy.scope.action.rel.is_none());
        assert!(policy.scope.resource.rel.is_none());
        assert!(policy.conditions.is_empty());
    }

    #[test]
    fn parses_scope_relations() {
        let file = parse_ok(
            r#"permit (
                principal == User::"alice",
                action in Action::"readOnly",
                resource in Album::"vacation"
            );"#,
        );
        let policy = first_policy(&file);
        assert_matches!(
            &policy.scope.principal.rel,
            Some((TokenKind::Eq, cst::ScopeTarget::Entity(e))) => {
                assert_eq!(e.parts.len(), 2);
                assert_eq!(e.parts[0].value, "User");
                assert_eq!(e.parts[1].value, "\"alice\"");
            }
        );
        assert_matches!(
            &policy.scope.action.rel,
            Some((TokenKind::In, cst::ScopeTarget::Entity(_)))
        );
        assert_matches!(
            &policy.scope.resource.rel,
            Some((TokenKind::In, cst::ScopeTarget::Entity(_)))
        );
    }

    #[test]
    fn parses_action_in_list() {
        let file = parse_ok(
            r#"permit (principal, action in [Action::"view", Action::"edit"], resource);"#,
        );
        let policy = first_policy(&file);
        assert_matches!(
            &policy.scope.action.rel,
            Some((TokenKind::In, cst::ScopeTarget::Set { entities, .. })) => {
                assert_eq!(entities.len(), 2);
            }
        );
    }

    #[test]
    fn parses_is_and_slot_clauses() {
        let file = parse_ok(
            r#"permit (principal is PhotoApp::User in ?principal, action, resource == ?resource);"#,
        );
        let policy = first_policy(&file);
        let is_check = policy.scope.principal.is_check.as_ref().expect("is check");
        assert_eq!(is_check.len(), 2);
        assert_eq!(is_check[1].value, "User");
        assert_matches!(
            &policy.scope.principal.rel,
            Some((TokenKind::In, cst::ScopeTarget::Slot { kind: TokenKind::PrincipalSlot, .. }))
        );
        assert_matches!(
            &policy.scope.resource.rel,
            Some((TokenKind::Eq, cst::ScopeTarget::Slot { kind: TokenKind::ResourceSlot, .. }))
        );
    }

    #[test]
    fn parses_annotations() {
        let file = parse_ok(r#"@id("policy-one") @note("hi") permit (principal, action, resource);"#);
        let policy = first_policy(&file);
        assert_eq!(policy.annotations.len(), 2);
        assert_eq!(policy.annotations[0].key.value, "id");
        assert_eq!(policy.annotations[0].value.value, "\"policy-one\"");
    }

    #[test]
    fn parses_conditions_and_precedence() {
        let file = parse_ok(
            "permit (principal, action, resource) when { 1 + 2 * 3 == 7 && !false };",
        );
        let policy = first_policy(&file);
        assert_eq!(policy.conditions.len(), 1);
        assert_eq!(policy.conditions[0].kind, TokenKind::When);
        // top node is &&, its left is ==, whose left is +, whose right is *
        assert_matches!(&policy.conditions[0].expr, cst::Expr::Binary { op: TokenKind::And, left, .. } => {
            assert_matches!(left.as_ref(), cst::Expr::Binary { op: TokenKind::Eq, left, .. } => {
                assert_matches!(left.as_ref(), cst::Expr::Binary { op: TokenKind::Add, right, .. } => {
                    assert_matches!(right.as_ref(), cst::Expr::Binary { op: TokenKind::Mul, .. });
                });
            });
        });
    }

    #[test]
    fn addition_is_left_associative() {
        let expr = {
            let mut parser = Parser::new("test", "1 - 2 - 3");
            parser.parse_expr()
        };
        // (1 - 2) - 3
        assert_matches!(expr, cst::Expr::Binary { op: TokenKind::Sub, left, right, .. } => {
            assert_matches!(left.as_ref(), cst::Expr::Binary { op: TokenKind::Sub, .. });
            assert_matches!(right.as_ref(), cst::Expr::Lit(lit) => assert_eq!(lit.value, "3"));
        });
    }

    #[test]
    fn parses_has_like_is_relations() {
        let file = parse_ok(
            r#"permit (principal, action, resource) when {
                resource has owner
                && resource.name like "*.jpg"
                && principal is PhotoApp::User
            };"#,
        );
        let policy = first_policy(&file);
        assert_eq!(policy.conditions.len(), 1);
    }

    #[test]
    fn parses_member_chains() {
        let mut parser = Parser::new("test", r#"context.device.ip.isInRange(ip("10.0.0.0/8"))"#);
        let expr = parser.parse_expr();
        assert_matches!(expr, cst::Expr::Member { access, .. } => {
            assert_eq!(access.len(), 3);
            assert_matches!(&access[0], cst::MemberAccess::Attr { ident } => assert_eq!(ident.value, "device"));
            assert_matches!(&access[2], cst::MemberAccess::Call { ident, args } => {
                assert_eq!(ident.value, "isInRange");
                assert_eq!(args.len(), 1);
            });
        });
    }

    #[test]
    fn parses_bracket_index() {
        let mut parser = Parser::new("test", r#"context["ip address"]"#);
        let expr = parser.parse_expr();
        assert_matches!(expr, cst::Expr::Member { access, .. } => {
            assert_matches!(&access[0], cst::MemberAccess::Index { key } => {
                assert_eq!(key.value, "\"ip address\"");
            });
        });
    }

    #[test]
    fn parses_if_then_else() {
        let mut parser = Parser::new("test", "if principal has tier then principal.tier else 0");
        assert_matches!(parser.parse_expr(), cst::Expr::If { .. });
    }

    #[test]
    fn parses_sets_and_records() {
        let mut parser = Parser::new("test", r#"{name: "box", tags: [1, 2, 3], "spaced key": true}"#);
        let expr = parser.parse_expr();
        assert_matches!(expr, cst::Expr::Record { inits, .. } => {
            assert_eq!(inits.len(), 3);
            assert_matches!(&inits[1].value, cst::Expr::Set { elems, .. } => assert_eq!(elems.len(), 3));
        });
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let (file, _, errors) = parse_file(
            "test.cedar",
            "permit (principal, action, resource)\npermit (principal, action, resource);",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors.last().unwrap().message().contains("';'"));
        // both statements are still present
        assert_eq!(file.statements.len(), 2);
    }

    #[test]
    fn recovery_produces_bad_statement() {
        let (file, _, errors) = parse_file(
            "test.cedar",
            "allow (principal, action, resource);\npermit (principal, action, resource);",
        );
        assert!(!errors.is_empty());
        assert_matches!(&file.statements[0], cst::Stmt::Bad(_));
        assert_matches!(file.statements.last().unwrap(), cst::Stmt::Policy(_));
    }

    #[test]
    fn error_threshold_stops_the_parser() {
        // every line is wrong; the parser must give up rather than loop
        let src = "???\n".repeat(50);
        let (_, _, errors) = parse_file("test.cedar", &src);
        assert!(!errors.is_empty());
        assert!(errors.len() <= MAX_ERRORS);
    }

    #[test]
    fn errors_on_same_line_are_deduplicated() {
        let (_, _, errors) = parse_file("test.cedar", "permit (principal action resource);");
        assert_eq!(errors.len(), 1);
    }
}
