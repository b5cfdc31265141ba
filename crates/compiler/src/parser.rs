//! Recursive-descent parser with operator precedence climbing.
//!
//! Consumes the token stream and produces a fully typed [`Program`].
//! Types are stamped on expressions as they are built: literals get
//! their natural type, identifiers take the declared type from the
//! symbol table (or an `int` placeholder the generator resolves for
//! names declared later in the file), and binary operators apply the
//! numeric promotion rule. The first error wins; nothing is recovered.

use std::collections::HashSet;

use crate::arena::Arena;
use crate::ast::{
    AssignOp, BinaryOp, Decl, DeclKind, Expr, ExprKind, Pos, Program, Stmt, StmtKind, Storage,
    UnaryOp,
};
use crate::error::{CompileError, SemanticErrorKind, SourcePos};
use crate::lexer::{Keyword, Lexer, Punct, Token, TokenKind};
use crate::symtab::SymbolTable;
use crate::types::{self, common, Type, TypeKind};

pub struct Parser<'a, 't, 's> {
    arena: &'a Arena,
    symtab: &'t mut SymbolTable<'a>,
    lexer: Lexer<'s>,
    /// Functions whose bodies have been seen, for duplicate-definition
    /// detection (a prototype followed by a definition is fine).
    defined_bodies: HashSet<&'a str>,
}

/// Result of parsing one declarator: the full type, the declared name,
/// and parameter names when the declarator was a function.
struct Declarator<'a> {
    ty: &'a Type<'a>,
    name: &'a str,
    name_pos: Pos,
    params: Option<Vec<&'a str>>,
}

impl<'a, 't, 's> Parser<'a, 't, 's> {
    pub fn new(
        arena: &'a Arena,
        symtab: &'t mut SymbolTable<'a>,
        file: &str,
        source: &'s str,
    ) -> Parser<'a, 't, 's> {
        Parser {
            arena,
            symtab,
            lexer: Lexer::new(file, source),
            defined_bodies: HashSet::new(),
        }
    }

    /// Parse a whole translation unit. The global scope stays entered
    /// so the code generator can resolve every top-level name.
    pub fn parse(mut self) -> Result<Program<'a>, CompileError> {
        let mut decls = Vec::new();
        while !self.at_eof()? {
            decls.push(self.parse_top_decl()?);
        }
        Ok(Program { decls })
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn at_eof(&mut self) -> Result<bool, CompileError> {
        Ok(self.lexer.peek()?.kind == TokenKind::Eof)
    }

    fn peek_pos(&mut self) -> Result<Pos, CompileError> {
        let t = self.lexer.peek()?;
        Ok(Pos::new(t.line, t.col))
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        self.lexer.next()
    }

    fn at_punct(&mut self, p: Punct) -> Result<bool, CompileError> {
        Ok(matches!(self.lexer.peek()?.kind, TokenKind::Punct(q) if q == p))
    }

    fn at_keyword(&mut self, k: Keyword) -> Result<bool, CompileError> {
        Ok(matches!(self.lexer.peek()?.kind, TokenKind::Keyword(q) if q == k))
    }

    fn eat_punct(&mut self, p: Punct) -> Result<bool, CompileError> {
        if self.at_punct(p)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> Result<bool, CompileError> {
        if self.at_keyword(k)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, p: Punct, expected: &str) -> Result<Token, CompileError> {
        if self.at_punct(p)? {
            self.advance()
        } else {
            let pos = self.peek_pos()?;
            let got = self.describe_next()?;
            Err(self.syntax_error(pos, format!("expected {}, got {}", expected, got)))
        }
    }

    fn describe_next(&mut self) -> Result<String, CompileError> {
        let t = self.lexer.peek()?;
        Ok(if t.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("'{}'", t.lexeme)
        })
    }

    fn source_pos(&self, pos: Pos) -> SourcePos {
        SourcePos::new(self.lexer.file(), pos.line, pos.col)
    }

    fn syntax_error(&self, pos: Pos, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            pos: self.source_pos(pos),
            message: message.into(),
        }
    }

    fn type_error(&self, pos: Pos, message: impl Into<String>) -> CompileError {
        CompileError::Type {
            pos: self.source_pos(pos),
            message: message.into(),
        }
    }

    fn semantic_error(&self, pos: Pos, kind: SemanticErrorKind) -> CompileError {
        CompileError::Semantic {
            pos: self.source_pos(pos),
            kind,
        }
    }

    fn at_type_start(&mut self) -> Result<bool, CompileError> {
        Ok(match self.lexer.peek()?.kind {
            TokenKind::Keyword(k) => is_type_keyword(k),
            _ => false,
        })
    }

    fn at_decl_start(&mut self) -> Result<bool, CompileError> {
        Ok(match self.lexer.peek()?.kind {
            TokenKind::Keyword(k) => {
                is_type_keyword(k) || matches!(k, Keyword::Static | Keyword::Extern)
            }
            _ => false,
        })
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_top_decl(&mut self) -> Result<&'a Decl<'a>, CompileError> {
        let pos = self.peek_pos()?;
        if !self.at_decl_start()? {
            let got = self.describe_next()?;
            return Err(self.syntax_error(pos, format!("expected a declaration, got {}", got)));
        }
        let (storage, base) = self.parse_decl_specifiers()?;
        let d = self.parse_declarator(base)?;

        if d.params.is_some() {
            return self.finish_function(pos, storage, d);
        }

        if d.ty.is_void() {
            return Err(self.type_error(d.name_pos, "variable has incomplete type 'void'"));
        }
        let init = if self.eat_punct(Punct::Assign)? {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        self.expect_punct(Punct::Semi, "';' after declaration")?;
        if self.symtab.define(d.name, d.ty, None).is_none() {
            return Err(self.semantic_error(
                d.name_pos,
                SemanticErrorKind::Redefinition(d.name.to_string()),
            ));
        }
        Ok(self.arena.alloc(Decl {
            name: d.name,
            ty: d.ty,
            storage,
            kind: DeclKind::Var { init },
            pos,
        }))
    }

    fn finish_function(
        &mut self,
        pos: Pos,
        storage: Storage,
        d: Declarator<'a>,
    ) -> Result<&'a Decl<'a>, CompileError> {
        let param_names = d.params.unwrap_or_default();

        // A prototype followed by a definition with an equal type is
        // legal; anything else sharing the name is a redefinition.
        match self.symtab.lookup_current(d.name) {
            Some(existing) if existing.ty.equals(d.ty) => {}
            Some(_) => {
                return Err(self.semantic_error(
                    d.name_pos,
                    SemanticErrorKind::Redefinition(d.name.to_string()),
                ));
            }
            None => {
                self.symtab.define(d.name, d.ty, None);
            }
        }

        if self.eat_punct(Punct::Semi)? {
            let params = self.arena.alloc_slice(&param_names);
            return Ok(self.arena.alloc(Decl {
                name: d.name,
                ty: d.ty,
                storage,
                kind: DeclKind::Func {
                    params,
                    body: None,
                },
                pos,
            }));
        }
        if !self.at_punct(Punct::LBrace)? {
            let got = self.describe_next()?;
            return Err(self.syntax_error(
                pos,
                format!("expected ';' or function body, got {}", got),
            ));
        }

        if !self.defined_bodies.insert(d.name) {
            return Err(self.semantic_error(
                d.name_pos,
                SemanticErrorKind::Redefinition(d.name.to_string()),
            ));
        }

        let param_types = match d.ty.kind {
            TypeKind::Function { params, .. } => params,
            _ => {
                return Err(CompileError::Internal(
                    "function declarator without function type".to_string(),
                ));
            }
        };

        // Parameters and the body block share one scope.
        self.symtab.enter_scope();
        for (&name, &ty) in param_names.iter().zip(param_types.iter()) {
            if name.is_empty() {
                return Err(self.syntax_error(
                    d.name_pos,
                    format!("parameter name omitted in definition of '{}'", d.name),
                ));
            }
            if self.symtab.define(name, ty, None).is_none() {
                return Err(self.semantic_error(
                    d.name_pos,
                    SemanticErrorKind::Redefinition(name.to_string()),
                ));
            }
        }
        let body_pos = self.peek_pos()?;
        let stmts = self.parse_braced_statements()?;
        self.symtab.exit_scope();

        let body = self.arena.alloc(Stmt {
            kind: StmtKind::Block(stmts),
            pos: body_pos,
        });
        let params = self.arena.alloc_slice(&param_names);
        Ok(self.arena.alloc(Decl {
            name: d.name,
            ty: d.ty,
            storage,
            kind: DeclKind::Func {
                params,
                body: Some(body),
            },
            pos,
        }))
    }

    /// Storage classes, qualifiers, signedness and base type keywords,
    /// in any order (`unsigned long`, `static const int`, …).
    fn parse_decl_specifiers(&mut self) -> Result<(Storage, &'a Type<'a>), CompileError> {
        let pos = self.peek_pos()?;
        let mut storage = Storage::default();
        let mut is_const = false;
        let mut is_volatile = false;
        let mut signed: Option<bool> = None;
        let mut base: Option<Keyword> = None;
        let mut short = false;
        let mut long = false;

        loop {
            let k = match self.lexer.peek()?.kind {
                TokenKind::Keyword(k) => k,
                _ => break,
            };
            match k {
                Keyword::Static => storage.is_static = true,
                Keyword::Extern => storage.is_extern = true,
                Keyword::Const => is_const = true,
                Keyword::Volatile => is_volatile = true,
                Keyword::Signed => signed = Some(true),
                Keyword::Unsigned => signed = Some(false),
                Keyword::Short => short = true,
                Keyword::Long => long = true,
                Keyword::Void
                | Keyword::Char
                | Keyword::Int
                | Keyword::Float
                | Keyword::Double => {
                    if base.is_some() {
                        return Err(
                            self.syntax_error(pos, "two or more data types in declaration")
                        );
                    }
                    base = Some(k);
                }
                _ => break,
            }
            self.advance()?;
        }

        let kind = match base {
            Some(Keyword::Void) => {
                if signed.is_some() || short || long {
                    return Err(self.syntax_error(pos, "invalid specifiers with 'void'"));
                }
                TypeKind::Void
            }
            Some(Keyword::Float) | Some(Keyword::Double) => {
                if signed.is_some() || short || long {
                    return Err(
                        self.syntax_error(pos, "invalid specifiers with floating-point type")
                    );
                }
                TypeKind::Float {
                    width: if base == Some(Keyword::Float) { 4 } else { 8 },
                }
            }
            Some(Keyword::Char) => {
                if short || long {
                    return Err(self.syntax_error(pos, "invalid specifiers with 'char'"));
                }
                TypeKind::Int {
                    signed: signed.unwrap_or(true),
                    width: 1,
                }
            }
            // `int`, bare `short`/`long`, bare `signed`/`unsigned`, or
            // a storage class alone (C89 implicit int).
            _ => {
                if short && long {
                    return Err(self.syntax_error(pos, "cannot combine 'short' and 'long'"));
                }
                TypeKind::Int {
                    signed: signed.unwrap_or(true),
                    width: if short {
                        2
                    } else if long {
                        8
                    } else {
                        4
                    },
                }
            }
        };

        let ty: &'a Type<'a> = if is_const || is_volatile {
            self.arena.alloc(Type {
                kind,
                is_const,
                is_volatile,
            })
        } else {
            match kind {
                TypeKind::Void => types::VOID,
                TypeKind::Float { width } => types::float_type(width),
                TypeKind::Int { signed, width } => types::int_type(signed, width),
                _ => self.arena.alloc(Type::plain(kind)),
            }
        };
        Ok((storage, ty))
    }

    /// Leading `*`s (with optional qualifiers), then qualifiers bind to
    /// the pointer they follow.
    fn parse_pointers(&mut self, mut ty: &'a Type<'a>) -> Result<&'a Type<'a>, CompileError> {
        while self.eat_punct(Punct::Star)? {
            let mut pointer = Type::plain(TypeKind::Pointer(ty));
            loop {
                if self.eat_keyword(Keyword::Const)? {
                    pointer.is_const = true;
                } else if self.eat_keyword(Keyword::Volatile)? {
                    pointer.is_volatile = true;
                } else {
                    break;
                }
            }
            ty = self.arena.alloc(pointer);
        }
        Ok(ty)
    }

    fn parse_declarator(&mut self, base: &'a Type<'a>) -> Result<Declarator<'a>, CompileError> {
        let ty = self.parse_pointers(base)?;

        let name_pos = self.peek_pos()?;
        let token = self.advance()?;
        let name = match token.kind {
            TokenKind::Ident => self.arena.alloc_str(&token.lexeme),
            _ => {
                return Err(self.syntax_error(
                    name_pos,
                    format!("expected identifier in declaration, got '{}'", token.lexeme),
                ));
            }
        };

        if self.at_punct(Punct::LParen)? {
            self.advance()?;
            let (param_types, param_names, variadic) = self.parse_params()?;
            let params = self.arena.alloc_slice(&param_types);
            let fn_ty = self.arena.alloc(Type::plain(TypeKind::Function {
                ret: ty,
                params,
                variadic,
            }));
            return Ok(Declarator {
                ty: fn_ty,
                name,
                name_pos,
                params: Some(param_names),
            });
        }

        let ty = self.parse_array_suffix(ty)?;
        Ok(Declarator {
            ty,
            name,
            name_pos,
            params: None,
        })
    }

    fn parse_array_suffix(&mut self, ty: &'a Type<'a>) -> Result<&'a Type<'a>, CompileError> {
        if !self.eat_punct(Punct::LBracket)? {
            return Ok(ty);
        }
        if self.eat_punct(Punct::RBracket)? {
            return Ok(self.arena.alloc(Type::plain(TypeKind::Array {
                elem: ty,
                len: None,
            })));
        }
        let pos = self.peek_pos()?;
        let token = self.advance()?;
        let len = match token.kind {
            TokenKind::IntLit(v) if v >= 0 => v as u32,
            TokenKind::IntLit(_) => {
                return Err(self.syntax_error(pos, "array size must be non-negative"));
            }
            _ => {
                return Err(self.syntax_error(
                    pos,
                    format!("expected array size, got '{}'", token.lexeme),
                ));
            }
        };
        self.expect_punct(Punct::RBracket, "']' after array size")?;
        Ok(self.arena.alloc(Type::plain(TypeKind::Array {
            elem: ty,
            len: Some(len),
        })))
    }

    /// Parameter list after `(`. Array parameters decay to pointers.
    #[allow(clippy::type_complexity)]
    fn parse_params(
        &mut self,
    ) -> Result<(Vec<&'a Type<'a>>, Vec<&'a str>, bool), CompileError> {
        let mut param_types = Vec::new();
        let mut param_names = Vec::new();

        if self.eat_punct(Punct::RParen)? {
            return Ok((param_types, param_names, false));
        }
        // `(void)` means no parameters.
        if self.at_keyword(Keyword::Void)?
            && matches!(self.lexer.peek2()?.kind, TokenKind::Punct(Punct::RParen))
        {
            self.advance()?;
            self.advance()?;
            return Ok((param_types, param_names, false));
        }

        loop {
            if self.eat_punct(Punct::Ellipsis)? {
                self.expect_punct(Punct::RParen, "')' after '...'")?;
                return Ok((param_types, param_names, true));
            }
            let pos = self.peek_pos()?;
            if !self.at_type_start()? {
                let got = self.describe_next()?;
                return Err(
                    self.syntax_error(pos, format!("expected parameter type, got {}", got))
                );
            }
            let (storage, base) = self.parse_decl_specifiers()?;
            if storage != Storage::default() {
                return Err(self.syntax_error(pos, "storage class specified for parameter"));
            }
            let mut ty = self.parse_pointers(base)?;

            let name = if matches!(self.lexer.peek()?.kind, TokenKind::Ident) {
                let token = self.advance()?;
                self.arena.alloc_str(&token.lexeme)
            } else {
                ""
            };

            ty = self.parse_array_suffix(ty)?;
            if let TypeKind::Array { elem, .. } = ty.kind {
                // Array parameters decay to pointers.
                ty = self.arena.alloc(Type::plain(TypeKind::Pointer(elem)));
            }
            if ty.is_void() {
                return Err(self.type_error(pos, "parameter has incomplete type 'void'"));
            }

            param_types.push(ty);
            param_names.push(name);

            if self.eat_punct(Punct::Comma)? {
                continue;
            }
            self.expect_punct(Punct::RParen, "')' after parameters")?;
            return Ok((param_types, param_names, false));
        }
    }

    /// A type name for casts and `sizeof`: specifiers, pointers, and an
    /// optional array suffix. No declarator name.
    fn parse_type_name(&mut self) -> Result<&'a Type<'a>, CompileError> {
        let pos = self.peek_pos()?;
        let (storage, base) = self.parse_decl_specifiers()?;
        if storage != Storage::default() {
            return Err(self.syntax_error(pos, "storage class specified in type name"));
        }
        let ty = self.parse_pointers(base)?;
        self.parse_array_suffix(ty)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<&'a Stmt<'a>, CompileError> {
        let pos = self.peek_pos()?;

        if self.at_decl_start()? {
            return self.parse_local_decl(pos);
        }

        let kind = self.lexer.peek()?.kind.clone();
        match kind {
            TokenKind::Keyword(Keyword::If) => self.parse_if(pos),
            TokenKind::Keyword(Keyword::While) => self.parse_while(pos),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_while(pos),
            TokenKind::Keyword(Keyword::For) => self.parse_for(pos),
            TokenKind::Keyword(Keyword::Return) => {
                self.advance()?;
                let value = if self.at_punct(Punct::Semi)? {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_punct(Punct::Semi, "';' after return")?;
                Ok(self.alloc_stmt(StmtKind::Return(value), pos))
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance()?;
                self.expect_punct(Punct::Semi, "';' after break")?;
                Ok(self.alloc_stmt(StmtKind::Break, pos))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance()?;
                self.expect_punct(Punct::Semi, "';' after continue")?;
                Ok(self.alloc_stmt(StmtKind::Continue, pos))
            }
            TokenKind::Keyword(Keyword::Goto) => {
                self.advance()?;
                let token = self.advance()?;
                let name = match token.kind {
                    TokenKind::Ident => self.arena.alloc_str(&token.lexeme),
                    _ => {
                        return Err(self.syntax_error(
                            pos,
                            format!("expected label after 'goto', got '{}'", token.lexeme),
                        ));
                    }
                };
                self.expect_punct(Punct::Semi, "';' after goto")?;
                Ok(self.alloc_stmt(StmtKind::Goto(name), pos))
            }
            TokenKind::Punct(Punct::LBrace) => self.parse_block(pos),
            TokenKind::Punct(Punct::Semi) => {
                // Empty statement.
                self.advance()?;
                Ok(self.alloc_stmt(StmtKind::Block(&[]), pos))
            }
            TokenKind::Ident => {
                // `name:` introduces a labeled statement.
                if matches!(self.lexer.peek2()?.kind, TokenKind::Punct(Punct::Colon)) {
                    let token = self.advance()?;
                    let name = self.arena.alloc_str(&token.lexeme);
                    self.advance()?; // ':'
                    let stmt = self.parse_statement()?;
                    return Ok(self.alloc_stmt(StmtKind::Label { name, stmt }, pos));
                }
                let expr = self.parse_expr()?;
                self.expect_punct(Punct::Semi, "';' after expression")?;
                Ok(self.alloc_stmt(StmtKind::Expr(expr), pos))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect_punct(Punct::Semi, "';' after expression")?;
                Ok(self.alloc_stmt(StmtKind::Expr(expr), pos))
            }
        }
    }

    fn alloc_stmt(&self, kind: StmtKind<'a>, pos: Pos) -> &'a Stmt<'a> {
        self.arena.alloc(Stmt { kind, pos })
    }

    fn parse_block(&mut self, pos: Pos) -> Result<&'a Stmt<'a>, CompileError> {
        self.symtab.enter_scope();
        let stmts = self.parse_braced_statements()?;
        self.symtab.exit_scope();
        Ok(self.alloc_stmt(StmtKind::Block(stmts), pos))
    }

    fn parse_braced_statements(&mut self) -> Result<&'a [&'a Stmt<'a>], CompileError> {
        self.expect_punct(Punct::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        loop {
            if self.eat_punct(Punct::RBrace)? {
                break;
            }
            if self.at_eof()? {
                let pos = self.peek_pos()?;
                return Err(self.syntax_error(pos, "unexpected end of input in block"));
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(self.arena.alloc_slice(&stmts))
    }

    fn parse_local_decl(&mut self, pos: Pos) -> Result<&'a Stmt<'a>, CompileError> {
        let (storage, base) = self.parse_decl_specifiers()?;
        let d = self.parse_declarator(base)?;
        if d.params.is_some() {
            return Err(self.syntax_error(
                d.name_pos,
                "function declarations are not supported inside a function",
            ));
        }
        if d.ty.is_void() {
            return Err(self.type_error(d.name_pos, "variable has incomplete type 'void'"));
        }
        let init = if self.eat_punct(Punct::Assign)? {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        self.expect_punct(Punct::Semi, "';' after declaration")?;
        if self.symtab.define(d.name, d.ty, None).is_none() {
            return Err(self.semantic_error(
                d.name_pos,
                SemanticErrorKind::Redefinition(d.name.to_string()),
            ));
        }
        let decl = self.arena.alloc(Decl {
            name: d.name,
            ty: d.ty,
            storage,
            kind: DeclKind::Var { init },
            pos,
        });
        Ok(self.alloc_stmt(StmtKind::Decl(decl), pos))
    }

    fn parse_if(&mut self, pos: Pos) -> Result<&'a Stmt<'a>, CompileError> {
        self.advance()?;
        self.expect_punct(Punct::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect_punct(Punct::RParen, "')' after condition")?;
        let then_stmt = self.parse_statement()?;
        let else_stmt = if self.eat_keyword(Keyword::Else)? {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(self.alloc_stmt(
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            },
            pos,
        ))
    }

    fn parse_while(&mut self, pos: Pos) -> Result<&'a Stmt<'a>, CompileError> {
        self.advance()?;
        self.expect_punct(Punct::LParen, "'(' after 'while'")?;
        let cond = self.parse_expr()?;
        self.expect_punct(Punct::RParen, "')' after condition")?;
        let body = self.parse_statement()?;
        Ok(self.alloc_stmt(StmtKind::While { cond, body }, pos))
    }

    fn parse_do_while(&mut self, pos: Pos) -> Result<&'a Stmt<'a>, CompileError> {
        self.advance()?;
        let body = self.parse_statement()?;
        if !self.eat_keyword(Keyword::While)? {
            let got = self.describe_next()?;
            return Err(self.syntax_error(pos, format!("expected 'while' after do body, got {}", got)));
        }
        self.expect_punct(Punct::LParen, "'(' after 'while'")?;
        let cond = self.parse_expr()?;
        self.expect_punct(Punct::RParen, "')' after condition")?;
        self.expect_punct(Punct::Semi, "';' after do-while")?;
        Ok(self.alloc_stmt(StmtKind::DoWhile { body, cond }, pos))
    }

    /// `for` with either a C89 expression initializer or a C99
    /// declaration. The declaration form is wrapped, together with the
    /// loop, in a synthesized block so the name scopes to the loop.
    fn parse_for(&mut self, pos: Pos) -> Result<&'a Stmt<'a>, CompileError> {
        self.advance()?;
        self.expect_punct(Punct::LParen, "'(' after 'for'")?;

        if self.at_decl_start()? {
            let decl_pos = self.peek_pos()?;
            self.symtab.enter_scope();
            let decl_stmt = self.parse_local_decl(decl_pos)?;
            let for_stmt = self.parse_for_rest(pos, None)?;
            self.symtab.exit_scope();
            let stmts = self.arena.alloc_slice(&[decl_stmt, for_stmt]);
            return Ok(self.alloc_stmt(StmtKind::Block(stmts), pos));
        }

        let init = if self.at_punct(Punct::Semi)? {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(Punct::Semi, "';' after for initializer")?;
        self.parse_for_rest(pos, init)
    }

    fn parse_for_rest(
        &mut self,
        pos: Pos,
        init: Option<&'a Expr<'a>>,
    ) -> Result<&'a Stmt<'a>, CompileError> {
        let cond = if self.at_punct(Punct::Semi)? {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(Punct::Semi, "';' after for condition")?;
        let update = if self.at_punct(Punct::RParen)? {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(Punct::RParen, "')' after for clauses")?;
        let body = self.parse_statement()?;
        Ok(self.alloc_stmt(
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            pos,
        ))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<&'a Expr<'a>, CompileError> {
        self.parse_assignment()
    }

    fn alloc_expr(&self, kind: ExprKind<'a>, ty: &'a Type<'a>, pos: Pos) -> &'a Expr<'a> {
        self.arena.alloc(Expr { kind, ty, pos })
    }

    fn parse_assignment(&mut self) -> Result<&'a Expr<'a>, CompileError> {
        let lhs = self.parse_conditional()?;
        let op = match self.lexer.peek()?.kind {
            TokenKind::Punct(p) => match assign_op(p) {
                Some(op) => op,
                None => return Ok(lhs),
            },
            _ => return Ok(lhs),
        };
        let op_pos = self.peek_pos()?;
        self.advance()?;
        if !lhs.is_assignable() {
            return Err(self.syntax_error(op_pos, "invalid assignment target"));
        }
        let value = self.parse_assignment()?;
        if !assign_compatible(lhs.ty, value.ty) {
            return Err(self.type_error(
                op_pos,
                format!(
                    "incompatible types in assignment ('{}' from '{}')",
                    lhs.ty, value.ty
                ),
            ));
        }
        Ok(self.alloc_expr(
            ExprKind::Assign {
                op,
                target: lhs,
                value,
            },
            lhs.ty,
            lhs.pos,
        ))
    }

    fn parse_conditional(&mut self) -> Result<&'a Expr<'a>, CompileError> {
        let cond = self.parse_binary(1)?;
        if !self.eat_punct(Punct::Question)? {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect_punct(Punct::Colon, "':' in conditional expression")?;
        let else_expr = self.parse_conditional()?;
        let ty = if then_expr.ty.is_numeric() && else_expr.ty.is_numeric() {
            common(then_expr.ty, else_expr.ty)
        } else {
            then_expr.ty
        };
        Ok(self.alloc_expr(
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            },
            ty,
            cond.pos,
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<&'a Expr<'a>, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let (op, prec) = match self.lexer.peek()?.kind {
                TokenKind::Punct(p) => match binary_prec(p) {
                    Some((op, prec)) if prec >= min_prec => (op, prec),
                    _ => break,
                },
                _ => break,
            };
            let op_pos = self.peek_pos()?;
            self.advance()?;
            let rhs = self.parse_binary(prec + 1)?;
            let ty = self.binary_result_type(op, lhs, rhs, op_pos)?;
            lhs = self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, ty, lhs.pos);
        }
        Ok(lhs)
    }

    fn binary_result_type(
        &self,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        pos: Pos,
    ) -> Result<&'a Type<'a>, CompileError> {
        if op.is_comparison() || op.is_logical() {
            // The implementation's boolean: a signed 32-bit 0/1.
            return Ok(types::INT32);
        }
        if lhs.ty.is_numeric() && rhs.ty.is_numeric() {
            return Ok(common(lhs.ty, rhs.ty));
        }
        match op {
            BinaryOp::Add | BinaryOp::Sub if lhs.ty.is_pointer() && rhs.ty.is_integral() => {
                return Ok(lhs.ty);
            }
            BinaryOp::Add if lhs.ty.is_integral() && rhs.ty.is_pointer() => {
                return Ok(rhs.ty);
            }
            BinaryOp::Sub if lhs.ty.is_pointer() && rhs.ty.is_pointer() => {
                return Ok(types::INT64);
            }
            _ => {}
        }
        Err(self.type_error(
            pos,
            format!(
                "invalid operands to binary '{}' ('{}' and '{}')",
                op.symbol(),
                lhs.ty,
                rhs.ty
            ),
        ))
    }

    fn parse_unary(&mut self) -> Result<&'a Expr<'a>, CompileError> {
        let pos = self.peek_pos()?;
        let kind = self.lexer.peek()?.kind.clone();
        match kind {
            TokenKind::Punct(Punct::Plus) => {
                self.advance()?;
                self.parse_unary()
            }
            TokenKind::Punct(Punct::Minus) => {
                self.advance()?;
                let operand = self.parse_unary()?;
                if !operand.ty.is_numeric() {
                    return Err(
                        self.type_error(pos, format!("cannot negate value of type '{}'", operand.ty))
                    );
                }
                Ok(self.alloc_expr(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand,
                    },
                    operand.ty,
                    pos,
                ))
            }
            TokenKind::Punct(Punct::Tilde) => {
                self.advance()?;
                let operand = self.parse_unary()?;
                if !operand.ty.is_integral() {
                    return Err(self.type_error(
                        pos,
                        format!("bitwise complement of non-integer type '{}'", operand.ty),
                    ));
                }
                Ok(self.alloc_expr(
                    ExprKind::Unary {
                        op: UnaryOp::BitNot,
                        operand,
                    },
                    operand.ty,
                    pos,
                ))
            }
            TokenKind::Punct(Punct::Bang) => {
                self.advance()?;
                let operand = self.parse_unary()?;
                Ok(self.alloc_expr(
                    ExprKind::Unary {
                        op: UnaryOp::LogNot,
                        operand,
                    },
                    types::INT32,
                    pos,
                ))
            }
            TokenKind::Punct(Punct::PlusPlus) => self.parse_incdec(pos, UnaryOp::PreInc),
            TokenKind::Punct(Punct::MinusMinus) => self.parse_incdec(pos, UnaryOp::PreDec),
            TokenKind::Punct(Punct::Star) => {
                self.advance()?;
                let operand = self.parse_unary()?;
                let ty = operand.ty.element().ok_or_else(|| {
                    self.type_error(
                        pos,
                        format!("dereference of non-pointer type '{}'", operand.ty),
                    )
                })?;
                Ok(self.alloc_expr(
                    ExprKind::Unary {
                        op: UnaryOp::Deref,
                        operand,
                    },
                    ty,
                    pos,
                ))
            }
            TokenKind::Punct(Punct::Amp) => {
                self.advance()?;
                let operand = self.parse_unary()?;
                if !operand.is_assignable() {
                    return Err(
                        self.type_error(pos, "cannot take the address of this expression")
                    );
                }
                let ty = self.arena.alloc(Type::plain(TypeKind::Pointer(operand.ty)));
                Ok(self.alloc_expr(
                    ExprKind::Unary {
                        op: UnaryOp::Addr,
                        operand,
                    },
                    ty,
                    pos,
                ))
            }
            TokenKind::Keyword(Keyword::Sizeof) => {
                self.advance()?;
                self.expect_punct(Punct::LParen, "'(' after 'sizeof'")?;
                if !self.at_type_start()? {
                    let got = self.describe_next()?;
                    return Err(
                        self.syntax_error(pos, format!("expected type name in sizeof, got {}", got))
                    );
                }
                let ty = self.parse_type_name()?;
                self.expect_punct(Punct::RParen, "')' after sizeof type")?;
                Ok(self.alloc_expr(ExprKind::SizeOf(ty), types::UINT64, pos))
            }
            TokenKind::Punct(Punct::LParen) => {
                // A parenthesized type is a cast; anything else is a
                // grouped expression handled by the primary parser.
                let is_cast = match self.lexer.peek2()?.kind {
                    TokenKind::Keyword(k) => is_type_keyword(k),
                    _ => false,
                };
                if !is_cast {
                    return self.parse_postfix();
                }
                self.advance()?;
                let to = self.parse_type_name()?;
                self.expect_punct(Punct::RParen, "')' after cast type")?;
                let operand = self.parse_unary()?;
                let valid = (to.is_numeric() && operand.ty.is_numeric())
                    || (to.is_pointer() && operand.ty.is_pointer())
                    || (to.is_pointer() && operand.ty.is_integral())
                    || (to.is_integral() && operand.ty.is_pointer())
                    || to.is_void();
                if !valid {
                    return Err(self.type_error(
                        pos,
                        format!("invalid cast from '{}' to '{}'", operand.ty, to),
                    ));
                }
                Ok(self.alloc_expr(ExprKind::Cast { to, operand }, to, pos))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_incdec(&mut self, pos: Pos, op: UnaryOp) -> Result<&'a Expr<'a>, CompileError> {
        self.advance()?;
        let operand = self.parse_unary()?;
        if !operand.is_assignable() {
            return Err(self.syntax_error(pos, "invalid assignment target"));
        }
        Ok(self.alloc_expr(ExprKind::Unary { op, operand }, operand.ty, pos))
    }

    fn parse_postfix(&mut self) -> Result<&'a Expr<'a>, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            let pos = self.peek_pos()?;
            let kind = self.lexer.peek()?.kind.clone();
            match kind {
                TokenKind::Punct(Punct::LParen) => {
                    self.advance()?;
                    let mut args = Vec::new();
                    if !self.eat_punct(Punct::RParen)? {
                        loop {
                            args.push(self.parse_assignment()?);
                            if self.eat_punct(Punct::Comma)? {
                                continue;
                            }
                            self.expect_punct(Punct::RParen, "')' after arguments")?;
                            break;
                        }
                    }
                    let ty = match expr.ty.kind {
                        TypeKind::Function {
                            ret,
                            params,
                            variadic,
                        } => {
                            let ok = if variadic {
                                args.len() >= params.len()
                            } else {
                                args.len() == params.len()
                            };
                            if !ok {
                                let name = match expr.kind {
                                    ExprKind::Ident(n) => n.to_string(),
                                    _ => "<expression>".to_string(),
                                };
                                return Err(self.semantic_error(
                                    expr.pos,
                                    SemanticErrorKind::ArityMismatch {
                                        name,
                                        expected: params.len(),
                                        got: args.len(),
                                    },
                                ));
                            }
                            ret
                        }
                        // Callee not yet declared; the generator resolves it.
                        _ => types::INT32,
                    };
                    let args = self.arena.alloc_slice(&args);
                    expr = self.alloc_expr(ExprKind::Call { callee: expr, args }, ty, expr.pos);
                }
                TokenKind::Punct(Punct::LBracket) => {
                    self.advance()?;
                    let index = self.parse_expr()?;
                    self.expect_punct(Punct::RBracket, "']' after subscript")?;
                    let ty = expr.ty.element().ok_or_else(|| {
                        self.type_error(
                            pos,
                            format!("subscript of non-array type '{}'", expr.ty),
                        )
                    })?;
                    if !index.ty.is_integral() {
                        return Err(self.type_error(pos, "array subscript is not an integer"));
                    }
                    expr = self.alloc_expr(ExprKind::Index { base: expr, index }, ty, expr.pos);
                }
                TokenKind::Punct(Punct::Dot) | TokenKind::Punct(Punct::Arrow) => {
                    let arrow = matches!(self.lexer.peek()?.kind, TokenKind::Punct(Punct::Arrow));
                    self.advance()?;
                    let token = self.advance()?;
                    let name = match token.kind {
                        TokenKind::Ident => self.arena.alloc_str(&token.lexeme),
                        _ => {
                            return Err(self.syntax_error(
                                pos,
                                format!("expected field name, got '{}'", token.lexeme),
                            ));
                        }
                    };
                    expr = self.alloc_expr(
                        ExprKind::Field {
                            base: expr,
                            name,
                            arrow,
                        },
                        types::INT32,
                        expr.pos,
                    );
                }
                TokenKind::Punct(Punct::PlusPlus) => {
                    self.advance()?;
                    if !expr.is_assignable() {
                        return Err(self.syntax_error(pos, "invalid assignment target"));
                    }
                    expr = self.alloc_expr(
                        ExprKind::Unary {
                            op: UnaryOp::PostInc,
                            operand: expr,
                        },
                        expr.ty,
                        expr.pos,
                    );
                }
                TokenKind::Punct(Punct::MinusMinus) => {
                    self.advance()?;
                    if !expr.is_assignable() {
                        return Err(self.syntax_error(pos, "invalid assignment target"));
                    }
                    expr = self.alloc_expr(
                        ExprKind::Unary {
                            op: UnaryOp::PostDec,
                            operand: expr,
                        },
                        expr.ty,
                        expr.pos,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<&'a Expr<'a>, CompileError> {
        let pos = self.peek_pos()?;
        let token = self.advance()?;
        match token.kind {
            TokenKind::IntLit(v) => Ok(self.alloc_expr(ExprKind::IntLit(v), types::INT32, pos)),
            TokenKind::FloatLit(v) => {
                Ok(self.alloc_expr(ExprKind::FloatLit(v), types::FLOAT32, pos))
            }
            TokenKind::CharLit(c) => Ok(self.alloc_expr(ExprKind::CharLit(c), types::INT8, pos)),
            TokenKind::StrLit(ref s) => {
                let s = self.arena.alloc_str(s);
                Ok(self.alloc_expr(ExprKind::StrLit(s), types::PTR_INT8, pos))
            }
            TokenKind::Ident => {
                let name = self.arena.alloc_str(&token.lexeme);
                // Placeholder int for names the generator resolves later.
                let ty = self
                    .symtab
                    .lookup(name)
                    .map(|sym| sym.ty)
                    .unwrap_or(types::INT32);
                Ok(self.alloc_expr(ExprKind::Ident(name), ty, pos))
            }
            TokenKind::Punct(Punct::LParen) => {
                let expr = self.parse_expr()?;
                self.expect_punct(Punct::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(self.syntax_error(pos, "unexpected end of input")),
            TokenKind::Unknown(_) => Err(self.syntax_error(
                pos,
                format!("unexpected character '{}'", token.lexeme),
            )),
            _ => Err(self.syntax_error(
                pos,
                format!("expected expression, got '{}'", token.lexeme),
            )),
        }
    }
}

fn is_type_keyword(k: Keyword) -> bool {
    matches!(
        k,
        Keyword::Void
            | Keyword::Char
            | Keyword::Short
            | Keyword::Int
            | Keyword::Long
            | Keyword::Float
            | Keyword::Double
            | Keyword::Signed
            | Keyword::Unsigned
            | Keyword::Const
            | Keyword::Volatile
    )
}

fn assign_op(p: Punct) -> Option<AssignOp> {
    Some(match p {
        Punct::Assign => AssignOp::Assign,
        Punct::PlusAssign => AssignOp::Add,
        Punct::MinusAssign => AssignOp::Sub,
        Punct::StarAssign => AssignOp::Mul,
        Punct::SlashAssign => AssignOp::Div,
        Punct::PercentAssign => AssignOp::Mod,
        Punct::AmpAssign => AssignOp::And,
        Punct::PipeAssign => AssignOp::Or,
        Punct::CaretAssign => AssignOp::Xor,
        Punct::ShlAssign => AssignOp::Shl,
        Punct::ShrAssign => AssignOp::Shr,
        _ => return None,
    })
}

/// Precedence table, lowest to highest; unary and postfix bind tighter
/// and are handled structurally.
fn binary_prec(p: Punct) -> Option<(BinaryOp, u8)> {
    Some(match p {
        Punct::OrOr => (BinaryOp::LogOr, 1),
        Punct::AndAnd => (BinaryOp::LogAnd, 2),
        Punct::Pipe => (BinaryOp::BitOr, 3),
        Punct::Caret => (BinaryOp::BitXor, 4),
        Punct::Amp => (BinaryOp::BitAnd, 5),
        Punct::EqEq => (BinaryOp::Eq, 6),
        Punct::NotEq => (BinaryOp::Ne, 6),
        Punct::Lt => (BinaryOp::Lt, 7),
        Punct::Le => (BinaryOp::Le, 7),
        Punct::Gt => (BinaryOp::Gt, 7),
        Punct::Ge => (BinaryOp::Ge, 7),
        Punct::Shl => (BinaryOp::Shl, 8),
        Punct::Shr => (BinaryOp::Shr, 8),
        Punct::Plus => (BinaryOp::Add, 9),
        Punct::Minus => (BinaryOp::Sub, 9),
        Punct::Star => (BinaryOp::Mul, 10),
        Punct::Slash => (BinaryOp::Div, 10),
        Punct::Percent => (BinaryOp::Mod, 10),
        _ => return None,
    })
}

fn assign_compatible(target: &Type, value: &Type) -> bool {
    if target.is_numeric() && value.is_numeric() {
        return true;
    }
    if target.equals(value) {
        return true;
    }
    if target.is_pointer() && value.is_pointer() {
        let (a, b) = match (target.element(), value.element()) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        return a.equals(b) || a.is_void() || b.is_void();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> String {
        let arena = Arena::new();
        let mut symtab = SymbolTable::new(&arena);
        let parser = Parser::new(&arena, &mut symtab, "test.c", source);
        let program = parser.parse().expect("parse");
        program.dump()
    }

    fn parse_err(source: &str) -> CompileError {
        let arena = Arena::new();
        let mut symtab = SymbolTable::new(&arena);
        let parser = Parser::new(&arena, &mut symtab, "test.c", source);
        match parser.parse() {
            Ok(_) => panic!("expected a parse error"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_minimal_function() {
        let dump = parse_ok("int main() { return 0; }");
        assert!(dump.contains("func main"));
        assert!(dump.contains("return 0"));
    }

    #[test]
    fn test_precedence() {
        // a + b * 2 parses as a + (b * 2)
        let dump = parse_ok("int f(int a, int b) { return a + b * 2; }");
        assert!(dump.contains("(a + (b * 2))"), "got: {}", dump);
        // (a + b) * 2 keeps the grouping
        let dump = parse_ok("int g(int a, int b) { return (a + b) * 2; }");
        assert!(dump.contains("((a + b) * 2)"), "got: {}", dump);
    }

    #[test]
    fn test_comparison_and_logical_precedence() {
        let dump = parse_ok("int f(int a, int b) { return a < b && b < 10 || a == 0; }");
        assert!(
            dump.contains("(((a < b) && (b < 10)) || (a == 0))"),
            "got: {}",
            dump
        );
    }

    #[test]
    fn test_assignment_right_associative() {
        let dump = parse_ok("int f() { int a; int b; a = b = 1; return a; }");
        assert!(dump.contains("(a = (b = 1))"), "got: {}", dump);
    }

    #[test]
    fn test_conditional_expression() {
        let dump = parse_ok("int f(int a) { return a ? 1 : 2; }");
        assert!(dump.contains("(a ? 1 : 2)"), "got: {}", dump);
    }

    #[test]
    fn test_unary_and_postfix() {
        let dump = parse_ok("int f(int a) { a++; ++a; return -a + !a; }");
        assert!(dump.contains("(a++)"), "got: {}", dump);
        assert!(dump.contains("(++a)"), "got: {}", dump);
        assert!(dump.contains("((-a) + (!a))"), "got: {}", dump);
    }

    #[test]
    fn test_literal_types() {
        let arena = Arena::new();
        let mut symtab = SymbolTable::new(&arena);
        let parser = Parser::new(
            &arena,
            &mut symtab,
            "test.c",
            "int f() { return 0; }",
        );
        let program = parser.parse().expect("parse");
        // Dig out the return expression and check its type.
        let body = match program.decls[0].kind {
            DeclKind::Func { body: Some(b), .. } => b,
            _ => panic!("expected function"),
        };
        let stmts = match body.kind {
            StmtKind::Block(s) => s,
            _ => panic!("expected block"),
        };
        let ret = match stmts[0].kind {
            StmtKind::Return(Some(e)) => e,
            _ => panic!("expected return"),
        };
        assert!(ret.ty.equals(types::INT32));
    }

    #[test]
    fn test_string_and_float_literal_types() {
        let arena = Arena::new();
        let mut symtab = SymbolTable::new(&arena);
        let parser = Parser::new(
            &arena,
            &mut symtab,
            "test.c",
            "double f() { 3.5; \"hi\"; return 0.5; }",
        );
        let program = parser.parse().expect("parse");
        let body = match program.decls[0].kind {
            DeclKind::Func { body: Some(b), .. } => b,
            _ => panic!("expected function"),
        };
        let stmts = match body.kind {
            StmtKind::Block(s) => s,
            _ => panic!("expected block"),
        };
        let float_expr = match stmts[0].kind {
            StmtKind::Expr(e) => e,
            _ => panic!("expected expression statement"),
        };
        assert!(float_expr.ty.equals(types::FLOAT32));
        let str_expr = match stmts[1].kind {
            StmtKind::Expr(e) => e,
            _ => panic!("expected expression statement"),
        };
        assert!(str_expr.ty.equals(types::PTR_INT8));
    }

    #[test]
    fn test_promotion_on_binary() {
        let arena = Arena::new();
        let mut symtab = SymbolTable::new(&arena);
        let parser = Parser::new(
            &arena,
            &mut symtab,
            "test.c",
            "double f(double d, int i) { return d + i; }",
        );
        let program = parser.parse().expect("parse");
        let body = match program.decls[0].kind {
            DeclKind::Func { body: Some(b), .. } => b,
            _ => panic!("expected function"),
        };
        let stmts = match body.kind {
            StmtKind::Block(s) => s,
            _ => panic!("expected block"),
        };
        let ret = match stmts[0].kind {
            StmtKind::Return(Some(e)) => e,
            _ => panic!("expected return"),
        };
        assert!(ret.ty.equals(types::FLOAT64));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_err("int f() { 1 = 2; return 0; }");
        match err {
            CompileError::Syntax { message, .. } => {
                assert!(message.contains("invalid assignment target"), "{}", message);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_redefinition_same_scope() {
        let err = parse_err("int f() { int x; int x; return 0; }");
        match err {
            CompileError::Semantic {
                kind: SemanticErrorKind::Redefinition(name),
                pos,
            } => {
                assert_eq!(name, "x");
                assert_eq!(pos.line, 1);
                // Reported at the second declarator.
                assert!(pos.col > 15, "reported at col {}", pos.col);
            }
            other => panic!("expected redefinition error, got {:?}", other),
        }
    }

    #[test]
    fn test_shadowing_in_nested_blocks_allowed() {
        parse_ok("int f() { int x; { int x; } { int x; } return 0; }");
    }

    #[test]
    fn test_global_redefinition() {
        let err = parse_err("int x; int x;");
        assert!(matches!(
            err,
            CompileError::Semantic {
                kind: SemanticErrorKind::Redefinition(_),
                ..
            }
        ));
    }

    #[test]
    fn test_prototype_then_definition_allowed() {
        parse_ok("int f(int a); int f(int a) { return a; }");
    }

    #[test]
    fn test_two_bodies_rejected() {
        let err = parse_err("int f() { return 0; } int f() { return 1; }");
        assert!(matches!(
            err,
            CompileError::Semantic {
                kind: SemanticErrorKind::Redefinition(_),
                ..
            }
        ));
    }

    #[test]
    fn test_pointer_declarators() {
        let dump = parse_ok("int f(char *s, int **pp) { return 0; }");
        assert!(dump.contains("char*"), "got: {}", dump);
        assert!(dump.contains("int**"), "got: {}", dump);
    }

    #[test]
    fn test_array_declaration_and_subscript() {
        let dump = parse_ok("int f() { int a[10]; a[3] = 7; return a[3]; }");
        assert!(dump.contains("int[10]"), "got: {}", dump);
        assert!(dump.contains("a[3]"), "got: {}", dump);
    }

    #[test]
    fn test_for_with_declaration_synthesizes_block() {
        let dump = parse_ok("int f() { for (int i = 0; i < 3; i = i + 1) { } return 0; }");
        // The declaration is hoisted into a block wrapping the loop, so
        // besides the function body and loop body there is a third block.
        assert!(dump.matches("block").count() >= 3, "got: {}", dump);
        assert!(dump.contains("var int i"), "got: {}", dump);
        let decl_at = dump.find("var int i").expect("declaration");
        let for_at = dump.find("for").expect("for statement");
        assert!(decl_at < for_at, "got: {}", dump);
    }

    #[test]
    fn test_for_loop_scope_ends_with_loop() {
        // The loop variable is out of scope after the for, so a second
        // loop may redeclare it.
        parse_ok("int f() { for (int i = 0; i < 3; i = i + 1) { } for (int i = 0; i < 3; i = i + 1) { } return 0; }");
    }

    #[test]
    fn test_infinite_for_accepted() {
        parse_ok("int f() { for (;;) { break; } return 0; }");
    }

    #[test]
    fn test_dereference_of_non_pointer_rejected() {
        let err = parse_err("int f(int a) { return *a; }");
        assert!(matches!(err, CompileError::Type { .. }));
    }

    #[test]
    fn test_deref_and_address_of() {
        let dump = parse_ok("int f(int *p) { int x; x = *p; p = &x; return x; }");
        assert!(dump.contains("(*p)"), "got: {}", dump);
        assert!(dump.contains("(&x)"), "got: {}", dump);
    }

    #[test]
    fn test_sizeof_type() {
        let dump = parse_ok("int f() { return sizeof(int); }");
        assert!(dump.contains("sizeof(int)"), "got: {}", dump);
    }

    #[test]
    fn test_cast_expression() {
        let dump = parse_ok("int f(double d) { return (int)d; }");
        assert!(dump.contains("(int)d"), "got: {}", dump);
    }

    #[test]
    fn test_call_arity_checked() {
        let err = parse_err("int f(int a, int b) { return a; } int g() { return f(1); }");
        match err {
            CompileError::Semantic {
                kind:
                    SemanticErrorKind::ArityMismatch {
                        name,
                        expected,
                        got,
                    },
                ..
            } => {
                assert_eq!(name, "f");
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("expected arity error, got {:?}", other),
        }
    }

    #[test]
    fn test_variadic_call_accepts_extra_args() {
        parse_ok("int printf(char *fmt, ...); int f() { return printf(\"%d\", 3); }");
    }

    #[test]
    fn test_call_before_declaration_allowed() {
        // Resolution happens at code generation.
        parse_ok("int main() { return f(); } int f() { return 3; }");
    }

    #[test]
    fn test_labels_and_goto() {
        let dump = parse_ok("int f() { goto out; out: return 1; }");
        assert!(dump.contains("goto out"), "got: {}", dump);
        assert!(dump.contains("label out"), "got: {}", dump);
    }

    #[test]
    fn test_do_while() {
        let dump = parse_ok("int f(int n) { do { n = n - 1; } while (n > 0); return n; }");
        assert!(dump.contains("do"), "got: {}", dump);
    }

    #[test]
    fn test_unknown_character_is_syntax_error() {
        let err = parse_err("int f() { return 0 @ 1; }");
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_err("int f() { return 0 }");
        match err {
            CompileError::Syntax { message, .. } => {
                assert!(message.contains("';'"), "{}", message);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_void_variable_rejected() {
        let err = parse_err("int f() { void x; return 0; }");
        assert!(matches!(err, CompileError::Type { .. }));
    }

    #[test]
    fn test_incompatible_assignment() {
        let err = parse_err("int f(int *p) { p = 3.5; return 0; }");
        assert!(matches!(err, CompileError::Type { .. }));
    }

    #[test]
    fn test_string_escape_in_program() {
        parse_ok("int f(char *s) { return 0; } int g() { return f(\"a\\n\"); }");
    }

    #[test]
    fn test_error_position_reported() {
        let err = parse_err("int f() {\n  return @;\n}");
        match err {
            CompileError::Syntax { pos, .. } => {
                assert_eq!(pos.line, 2);
                assert_eq!(pos.file, "test.c");
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
