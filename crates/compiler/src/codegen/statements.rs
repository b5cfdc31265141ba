//! Statement lowering: blocks, declarations, returns.

use coil_object::instr::Operand;
use coil_object::opcode::Opcode;

use crate::ast::{Decl, DeclKind, Pos, Stmt, StmtKind};
use crate::error::{CompileError, SemanticErrorKind};

use super::CodeGen;

impl<'a> CodeGen<'a, '_> {
    pub(super) fn gen_stmt(&mut self, stmt: &'a Stmt<'a>) -> Result<(), CompileError> {
        match stmt.kind {
            StmtKind::Expr(e) => {
                self.gen_expr(e)?;
                Ok(())
            }
            StmtKind::Block(stmts) => self.gen_block(stmts),
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.gen_if(cond, then_stmt, else_stmt),
            StmtKind::While { cond, body } => self.gen_while(cond, body),
            StmtKind::DoWhile { body, cond } => self.gen_do_while(body, cond),
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self.gen_for(init, cond, update, body),
            StmtKind::Return(value) => self.gen_return(value, stmt.pos),
            StmtKind::Break => self.gen_break(stmt.pos),
            StmtKind::Continue => self.gen_continue(stmt.pos),
            StmtKind::Goto(name) => self.gen_goto(name),
            StmtKind::Label { name, stmt } => self.gen_label(name, stmt),
            StmtKind::Decl(decl) => self.gen_local_decl(decl),
        }
    }

    /// Blocks bracket their contents with `VARSC`/`VAREND` and a
    /// symbol-table scope.
    pub(super) fn gen_block(&mut self, stmts: &'a [&'a Stmt<'a>]) -> Result<(), CompileError> {
        self.enter_scope();
        self.emit_plain(Opcode::VarSc);
        for stmt in stmts {
            self.gen_stmt(stmt)?;
        }
        self.emit_plain(Opcode::VarEnd);
        self.exit_scope();
        Ok(())
    }

    fn gen_local_decl(&mut self, decl: &'a Decl<'a>) -> Result<(), CompileError> {
        let init = match decl.kind {
            DeclKind::Var { init } => init,
            DeclKind::Func { .. } => {
                return Err(self.codegen_error(decl.pos, "nested functions are not supported"));
            }
        };
        let var_id = self.fresh_reg();
        self.define_local(decl.name, decl.ty, var_id, decl.pos)?;
        let (t, w) = decl.ty.encode(self.word_size());
        self.emit(Opcode::VarCr, 0, vec![Operand::var(var_id, t, w)]);
        if let Some(init) = init {
            let v = self.gen_expr(init)?;
            let v = self.convert(v, decl.ty);
            let r = self.reg_op(v);
            self.emit(Opcode::VarSet, 0, vec![Operand::var(var_id, t, w), r]);
        }
        Ok(())
    }

    fn gen_return(
        &mut self,
        value: Option<&'a crate::ast::Expr<'a>>,
        pos: Pos,
    ) -> Result<(), CompileError> {
        let ret = self.current_ret().ok_or_else(|| {
            CompileError::Internal("return statement outside of a function".to_string())
        })?;
        match value {
            Some(e) => {
                if ret.is_void() {
                    return Err(self.semantic_error(
                        pos,
                        SemanticErrorKind::ReturnTypeMismatch(
                            "returning a value from a void function".to_string(),
                        ),
                    ));
                }
                let v = self.gen_expr(e)?;
                let compatible = (v.ty.is_numeric() && ret.is_numeric())
                    || v.ty.equals(ret)
                    || (v.ty.is_pointer() && ret.is_pointer());
                if !compatible {
                    return Err(self.semantic_error(
                        pos,
                        SemanticErrorKind::ReturnTypeMismatch(format!(
                            "cannot return '{}' from a function returning '{}'",
                            v.ty, ret
                        )),
                    ));
                }
                let v = self.convert(v, ret);
                let r = self.reg_op(v);
                self.emit(Opcode::Result, 0, vec![r]);
            }
            None => {
                if !ret.is_void() {
                    return Err(self.semantic_error(
                        pos,
                        SemanticErrorKind::ReturnTypeMismatch(format!(
                            "non-void function returning '{}' must return a value",
                            ret
                        )),
                    ));
                }
            }
        }
        self.emit_plain(Opcode::Leave);
        self.emit_plain(Opcode::Ret);
        Ok(())
    }
}
