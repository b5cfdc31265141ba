//! Abstract syntax tree.
//!
//! Every node lives in the compile arena; cross-node references are
//! shared borrows bounded by the arena lifetime, never cycles. Each
//! expression carries the result type the parser stamped on it, and
//! each statement carries its source position.

use crate::types::Type;

/// A source position: 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Pos {
        Pos { line, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogAnd | BinaryOp::LogOr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogAnd => "&&",
            BinaryOp::LogOr => "||",
        }
    }
}

/// Unary operators; prefix/postfix increment and decrement are
/// distinct variants rather than a separate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    BitNot,
    LogNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Addr,
    Deref,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::LogNot => "!",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
            UnaryOp::Addr => "&",
            UnaryOp::Deref => "*",
        }
    }
}

/// Assignment operators: plain `=` or a compound form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl AssignOp {
    /// The arithmetic half of a compound assignment, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Mod => BinaryOp::Mod,
            AssignOp::And => BinaryOp::BitAnd,
            AssignOp::Or => BinaryOp::BitOr,
            AssignOp::Xor => BinaryOp::BitXor,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ExprKind<'a> {
    IntLit(i64),
    FloatLit(f64),
    CharLit(u8),
    StrLit(&'a str),
    Ident(&'a str),
    Binary {
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
    Assign {
        op: AssignOp,
        target: &'a Expr<'a>,
        value: &'a Expr<'a>,
    },
    Call {
        callee: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
    },
    Index {
        base: &'a Expr<'a>,
        index: &'a Expr<'a>,
    },
    Field {
        base: &'a Expr<'a>,
        name: &'a str,
        arrow: bool,
    },
    Conditional {
        cond: &'a Expr<'a>,
        then_expr: &'a Expr<'a>,
        else_expr: &'a Expr<'a>,
    },
    Cast {
        to: &'a Type<'a>,
        operand: &'a Expr<'a>,
    },
    SizeOf(&'a Type<'a>),
}

/// An expression with its parser-assigned result type.
#[derive(Debug, Clone, Copy)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub ty: &'a Type<'a>,
    pub pos: Pos,
}

impl<'a> Expr<'a> {
    /// Whether this expression is a syntactically valid assignment
    /// target: identifier, dereference, subscript, or field access.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_)
                | ExprKind::Index { .. }
                | ExprKind::Field { .. }
                | ExprKind::Unary {
                    op: UnaryOp::Deref,
                    ..
                }
        )
    }
}

/// Storage-class bits on a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Storage {
    pub is_static: bool,
    pub is_extern: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum DeclKind<'a> {
    Var { init: Option<&'a Expr<'a>> },
    Func {
        /// Parameter names, parallel to the function type's parameter
        /// list. Empty strings for unnamed prototype parameters.
        params: &'a [&'a str],
        /// Absent body means this is a prototype.
        body: Option<&'a Stmt<'a>>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Decl<'a> {
    pub name: &'a str,
    pub ty: &'a Type<'a>,
    pub storage: Storage,
    pub kind: DeclKind<'a>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy)]
pub enum StmtKind<'a> {
    Expr(&'a Expr<'a>),
    Block(&'a [&'a Stmt<'a>]),
    If {
        cond: &'a Expr<'a>,
        then_stmt: &'a Stmt<'a>,
        else_stmt: Option<&'a Stmt<'a>>,
    },
    While {
        cond: &'a Expr<'a>,
        body: &'a Stmt<'a>,
    },
    DoWhile {
        body: &'a Stmt<'a>,
        cond: &'a Expr<'a>,
    },
    For {
        init: Option<&'a Expr<'a>>,
        cond: Option<&'a Expr<'a>>,
        update: Option<&'a Expr<'a>>,
        body: &'a Stmt<'a>,
    },
    Return(Option<&'a Expr<'a>>),
    Break,
    Continue,
    Goto(&'a str),
    Label {
        name: &'a str,
        stmt: &'a Stmt<'a>,
    },
    Decl(&'a Decl<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct Stmt<'a> {
    pub kind: StmtKind<'a>,
    pub pos: Pos,
}

/// Ordered sequence of top-level declarations.
#[derive(Debug)]
pub struct Program<'a> {
    pub decls: Vec<&'a Decl<'a>>,
}

impl<'a> Program<'a> {
    /// Render the tree as indented text, for `--ast`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for decl in &self.decls {
            dump_decl(decl, 0, &mut out);
        }
        out
    }
}

fn pad(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_decl(decl: &Decl<'_>, depth: usize, out: &mut String) {
    pad(depth, out);
    let storage = match (decl.storage.is_static, decl.storage.is_extern) {
        (true, _) => "static ",
        (_, true) => "extern ",
        _ => "",
    };
    match decl.kind {
        DeclKind::Var { init } => {
            out.push_str(&format!("var {}{} {}\n", storage, decl.ty, decl.name));
            if let Some(e) = init {
                pad(depth + 1, out);
                out.push_str("init ");
                dump_expr(e, depth + 1, out);
                out.push('\n');
            }
        }
        DeclKind::Func { params, body } => {
            out.push_str(&format!(
                "{} {}{} ({})\n",
                if body.is_some() { "func" } else { "proto" },
                storage,
                decl.name,
                params.join(", ")
            ));
            pad(depth + 1, out);
            out.push_str(&format!("type {}\n", decl.ty));
            if let Some(b) = body {
                dump_stmt(b, depth + 1, out);
            }
        }
    }
}

fn dump_stmt(stmt: &Stmt<'_>, depth: usize, out: &mut String) {
    match stmt.kind {
        StmtKind::Expr(e) => {
            pad(depth, out);
            out.push_str("expr ");
            dump_expr(e, depth, out);
            out.push('\n');
        }
        StmtKind::Block(stmts) => {
            pad(depth, out);
            out.push_str("block\n");
            for s in stmts {
                dump_stmt(s, depth + 1, out);
            }
        }
        StmtKind::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            pad(depth, out);
            out.push_str("if ");
            dump_expr(cond, depth, out);
            out.push('\n');
            dump_stmt(then_stmt, depth + 1, out);
            if let Some(e) = else_stmt {
                pad(depth, out);
                out.push_str("else\n");
                dump_stmt(e, depth + 1, out);
            }
        }
        StmtKind::While { cond, body } => {
            pad(depth, out);
            out.push_str("while ");
            dump_expr(cond, depth, out);
            out.push('\n');
            dump_stmt(body, depth + 1, out);
        }
        StmtKind::DoWhile { body, cond } => {
            pad(depth, out);
            out.push_str("do\n");
            dump_stmt(body, depth + 1, out);
            pad(depth, out);
            out.push_str("while ");
            dump_expr(cond, depth, out);
            out.push('\n');
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            pad(depth, out);
            out.push_str("for");
            for (label, part) in [("init", init), ("cond", cond), ("update", update)] {
                if let Some(e) = part {
                    out.push_str(&format!(" {}=", label));
                    dump_expr(e, depth, out);
                }
            }
            out.push('\n');
            dump_stmt(body, depth + 1, out);
        }
        StmtKind::Return(value) => {
            pad(depth, out);
            out.push_str("return");
            if let Some(e) = value {
                out.push(' ');
                dump_expr(e, depth, out);
            }
            out.push('\n');
        }
        StmtKind::Break => {
            pad(depth, out);
            out.push_str("break\n");
        }
        StmtKind::Continue => {
            pad(depth, out);
            out.push_str("continue\n");
        }
        StmtKind::Goto(name) => {
            pad(depth, out);
            out.push_str(&format!("goto {}\n", name));
        }
        StmtKind::Label { name, stmt } => {
            pad(depth, out);
            out.push_str(&format!("label {}\n", name));
            dump_stmt(stmt, depth + 1, out);
        }
        StmtKind::Decl(decl) => dump_decl(decl, depth, out),
    }
}

fn dump_expr(expr: &Expr<'_>, depth: usize, out: &mut String) {
    match expr.kind {
        ExprKind::IntLit(v) => out.push_str(&v.to_string()),
        ExprKind::FloatLit(v) => out.push_str(&format!("{:?}", v)),
        ExprKind::CharLit(c) => out.push_str(&format!("{:?}", c as char)),
        ExprKind::StrLit(s) => out.push_str(&format!("{:?}", s)),
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::Binary { op, lhs, rhs } => {
            out.push('(');
            dump_expr(lhs, depth, out);
            out.push_str(&format!(" {} ", op.symbol()));
            dump_expr(rhs, depth, out);
            out.push(')');
        }
        ExprKind::Unary { op, operand } => {
            match op {
                UnaryOp::PostInc | UnaryOp::PostDec => {
                    out.push('(');
                    dump_expr(operand, depth, out);
                    out.push_str(op.symbol());
                    out.push(')');
                }
                _ => {
                    out.push('(');
                    out.push_str(op.symbol());
                    dump_expr(operand, depth, out);
                    out.push(')');
                }
            };
        }
        ExprKind::Assign { op, target, value } => {
            out.push('(');
            dump_expr(target, depth, out);
            match op.binary_op() {
                Some(b) => out.push_str(&format!(" {}= ", b.symbol())),
                None => out.push_str(" = "),
            }
            dump_expr(value, depth, out);
            out.push(')');
        }
        ExprKind::Call { callee, args } => {
            dump_expr(callee, depth, out);
            out.push('(');
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                dump_expr(a, depth, out);
            }
            out.push(')');
        }
        ExprKind::Index { base, index } => {
            dump_expr(base, depth, out);
            out.push('[');
            dump_expr(index, depth, out);
            out.push(']');
        }
        ExprKind::Field { base, name, arrow } => {
            dump_expr(base, depth, out);
            out.push_str(if arrow { "->" } else { "." });
            out.push_str(name);
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            out.push('(');
            dump_expr(cond, depth, out);
            out.push_str(" ? ");
            dump_expr(then_expr, depth, out);
            out.push_str(" : ");
            dump_expr(else_expr, depth, out);
            out.push(')');
        }
        ExprKind::Cast { to, operand } => {
            out.push_str(&format!("({})", to));
            dump_expr(operand, depth, out);
        }
        ExprKind::SizeOf(ty) => out.push_str(&format!("sizeof({})", ty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::INT32;

    #[test]
    fn test_assignable_targets() {
        let ident = Expr {
            kind: ExprKind::Ident("x"),
            ty: INT32,
            pos: Pos::new(1, 1),
        };
        assert!(ident.is_assignable());

        let lit = Expr {
            kind: ExprKind::IntLit(3),
            ty: INT32,
            pos: Pos::new(1, 1),
        };
        assert!(!lit.is_assignable());

        let deref = Expr {
            kind: ExprKind::Unary {
                op: UnaryOp::Deref,
                operand: &ident,
            },
            ty: INT32,
            pos: Pos::new(1, 1),
        };
        assert!(deref.is_assignable());

        let neg = Expr {
            kind: ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: &ident,
            },
            ty: INT32,
            pos: Pos::new(1, 1),
        };
        assert!(!neg.is_assignable());
    }

    #[test]
    fn test_compound_op_mapping() {
        assert_eq!(AssignOp::Assign.binary_op(), None);
        assert_eq!(AssignOp::Add.binary_op(), Some(BinaryOp::Add));
        assert_eq!(AssignOp::Shl.binary_op(), Some(BinaryOp::Shl));
    }
}
