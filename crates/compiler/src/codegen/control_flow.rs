//! Control-flow lowering: conditionals, loops, goto and labels.
//!
//! Every construct compares its condition against a typed zero and
//! branches with `BRC EQ` past the protected region, so "truthy" is
//! simply non-zero.

use coil_object::instr::Operand;
use coil_object::opcode::{BranchCond, Opcode};

use crate::ast::{Expr, Pos, Stmt};
use crate::error::{CompileError, SemanticErrorKind};

use super::{CodeGen, LoopLabels};

impl<'a> CodeGen<'a, '_> {
    pub(super) fn gen_if(
        &mut self,
        cond: &'a Expr<'a>,
        then_stmt: &'a Stmt<'a>,
        else_stmt: Option<&'a Stmt<'a>>,
    ) -> Result<(), CompileError> {
        let vc = self.gen_expr(cond)?;
        self.cmp_zero(vc);
        let l_false = self.fresh_label();
        self.emit(
            Opcode::Brc,
            BranchCond::Eq as u8,
            vec![Operand::label(l_false)],
        );
        self.gen_stmt(then_stmt)?;
        match else_stmt {
            Some(else_stmt) => {
                let l_end = self.fresh_label();
                self.emit(Opcode::Br, 0, vec![Operand::label(l_end)]);
                self.emit_label_def(l_false);
                self.gen_stmt(else_stmt)?;
                self.emit_label_def(l_end);
            }
            None => self.emit_label_def(l_false),
        }
        Ok(())
    }

    pub(super) fn gen_while(
        &mut self,
        cond: &'a Expr<'a>,
        body: &'a Stmt<'a>,
    ) -> Result<(), CompileError> {
        let l_start = self.fresh_label();
        let l_end = self.fresh_label();
        self.emit_label_def(l_start);
        let vc = self.gen_expr(cond)?;
        self.cmp_zero(vc);
        self.emit(
            Opcode::Brc,
            BranchCond::Eq as u8,
            vec![Operand::label(l_end)],
        );
        self.push_loop(LoopLabels {
            break_label: l_end,
            continue_label: l_start,
        });
        self.gen_stmt(body)?;
        self.pop_loop();
        self.emit(Opcode::Br, 0, vec![Operand::label(l_start)]);
        self.emit_label_def(l_end);
        Ok(())
    }

    /// The body runs at least once; the loop re-enters while the
    /// condition compares non-zero.
    pub(super) fn gen_do_while(
        &mut self,
        body: &'a Stmt<'a>,
        cond: &'a Expr<'a>,
    ) -> Result<(), CompileError> {
        let l_start = self.fresh_label();
        let l_cond = self.fresh_label();
        let l_end = self.fresh_label();
        self.emit_label_def(l_start);
        self.push_loop(LoopLabels {
            break_label: l_end,
            continue_label: l_cond,
        });
        self.gen_stmt(body)?;
        self.pop_loop();
        self.emit_label_def(l_cond);
        let vc = self.gen_expr(cond)?;
        self.cmp_zero(vc);
        self.emit(
            Opcode::Brc,
            BranchCond::Ne as u8,
            vec![Operand::label(l_start)],
        );
        self.emit_label_def(l_end);
        Ok(())
    }

    /// An absent condition never exits: `for (;;)` loops forever.
    pub(super) fn gen_for(
        &mut self,
        init: Option<&'a Expr<'a>>,
        cond: Option<&'a Expr<'a>>,
        update: Option<&'a Expr<'a>>,
        body: &'a Stmt<'a>,
    ) -> Result<(), CompileError> {
        if let Some(e) = init {
            self.gen_expr(e)?;
        }
        let l_cond = self.fresh_label();
        let l_incr = self.fresh_label();
        let l_end = self.fresh_label();
        self.emit_label_def(l_cond);
        if let Some(c) = cond {
            let vc = self.gen_expr(c)?;
            self.cmp_zero(vc);
            self.emit(
                Opcode::Brc,
                BranchCond::Eq as u8,
                vec![Operand::label(l_end)],
            );
        }
        self.push_loop(LoopLabels {
            break_label: l_end,
            continue_label: l_incr,
        });
        self.gen_stmt(body)?;
        self.pop_loop();
        self.emit_label_def(l_incr);
        if let Some(u) = update {
            self.gen_expr(u)?;
        }
        self.emit(Opcode::Br, 0, vec![Operand::label(l_cond)]);
        self.emit_label_def(l_end);
        Ok(())
    }

    pub(super) fn gen_break(&mut self, pos: Pos) -> Result<(), CompileError> {
        let target = match self.current_loop() {
            Some(labels) => labels.break_label,
            None => return Err(self.codegen_error(pos, "break outside of a loop")),
        };
        self.emit(Opcode::Br, 0, vec![Operand::label(target)]);
        Ok(())
    }

    pub(super) fn gen_continue(&mut self, pos: Pos) -> Result<(), CompileError> {
        let target = match self.current_loop() {
            Some(labels) => labels.continue_label,
            None => return Err(self.codegen_error(pos, "continue outside of a loop")),
        };
        self.emit(Opcode::Br, 0, vec![Operand::label(target)]);
        Ok(())
    }

    pub(super) fn gen_goto(&mut self, name: &'a str) -> Result<(), CompileError> {
        let id = self.user_label(name);
        self.emit(Opcode::Br, 0, vec![Operand::label(id)]);
        Ok(())
    }

    pub(super) fn gen_label(
        &mut self,
        name: &'a str,
        stmt: &'a Stmt<'a>,
    ) -> Result<(), CompileError> {
        let id = self.user_label(name);
        if !self.define_user_label(name) {
            return Err(self.semantic_error(
                stmt.pos,
                SemanticErrorKind::Redefinition(name.to_string()),
            ));
        }
        self.emit_label_def(id);
        self.gen_stmt(stmt)
    }
}
