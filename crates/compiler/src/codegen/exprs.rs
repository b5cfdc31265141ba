//! Expression lowering.
//!
//! `gen_expr` returns the fresh register holding the result together
//! with its effective type. Types are recomputed bottom-up here (the
//! parser's placeholder stamps are only advisory for names it could
//! not resolve yet).

use coil_object::instr::Operand;
use coil_object::opcode::{BranchCond, Opcode, TYPE_UINT};

use crate::ast::{AssignOp, BinaryOp, Expr, ExprKind, Pos, UnaryOp};
use crate::error::{CompileError, SemanticErrorKind};
use crate::types::{common, Type, TypeKind, INT32, INT64};

use super::{CodeGen, Value};

impl<'a> CodeGen<'a, '_> {
    pub(super) fn gen_expr(&mut self, e: &'a Expr<'a>) -> Result<Value<'a>, CompileError> {
        match e.kind {
            ExprKind::IntLit(v) => Ok(self.movi_int(e.ty, v)),
            ExprKind::CharLit(c) => Ok(self.movi_int(e.ty, c as i64)),
            ExprKind::FloatLit(v) => {
                let reg = self.fresh_reg();
                let (t, w) = e.ty.encode(self.word_size());
                let bits = (v as f32).to_bits() as u64;
                self.emit(
                    Opcode::Movi,
                    0,
                    vec![Operand::reg(reg, t, w), Operand::imm(t, w, bits)],
                );
                Ok(Value { reg, ty: e.ty })
            }
            ExprKind::StrLit(s) => {
                let offset = self.intern(s);
                let reg = self.fresh_reg();
                let (t, w) = e.ty.encode(self.word_size());
                let word = self.word_size();
                self.emit(
                    Opcode::Movi,
                    0,
                    vec![Operand::reg(reg, t, w), Operand::strref(offset, word)],
                );
                Ok(Value { reg, ty: e.ty })
            }
            ExprKind::Ident(name) => {
                let sym = self.resolve(name, e.pos)?;
                let handle = self.sym_handle(sym)?;
                let reg = self.fresh_reg();
                let (t, w) = sym.ty.encode(self.word_size());
                self.emit(Opcode::VarGet, 0, vec![Operand::reg(reg, t, w), handle]);
                Ok(Value { reg, ty: sym.ty })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_logical() {
                    self.gen_logical(op, lhs, rhs)
                } else if op.is_comparison() {
                    self.gen_comparison(op, lhs, rhs)
                } else {
                    let vl = self.gen_expr(lhs)?;
                    let vr = self.gen_expr(rhs)?;
                    self.arith_apply(op, vl, vr, e.pos)
                }
            }
            ExprKind::Unary { op, operand } => self.gen_unary(e, op, operand),
            ExprKind::Assign { op, target, value } => self.gen_assign(e, op, target, value),
            ExprKind::Call { callee, args } => self.gen_call(callee, args),
            ExprKind::Index { base, index } => {
                let (addr, elem) = self.gen_index_addr(base, index, e.pos)?;
                let reg = self.fresh_reg();
                let (t, w) = elem.encode(self.word_size());
                let a = self.reg_op(addr);
                self.emit(Opcode::Load, 0, vec![Operand::reg(reg, t, w), a]);
                Ok(Value { reg, ty: elem })
            }
            ExprKind::Field { .. } => {
                Err(self.codegen_error(e.pos, "struct field access is not supported"))
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.gen_conditional(e, cond, then_expr, else_expr),
            ExprKind::Cast { to, operand } => {
                let v = self.gen_expr(operand)?;
                if (v.ty.is_floating() && to.is_integral())
                    || (v.ty.is_integral() && to.is_floating())
                {
                    let converted = self.convert(v, to);
                    Ok(converted)
                } else {
                    let dst = Value {
                        reg: self.fresh_reg(),
                        ty: to,
                    };
                    let d = self.reg_op(dst);
                    let s = self.reg_op(v);
                    self.emit(Opcode::Mov, 0, vec![d, s]);
                    Ok(dst)
                }
            }
            ExprKind::SizeOf(ty) => {
                let size = ty.size_of(self.word_size());
                Ok(self.movi_int(e.ty, size as i64))
            }
        }
    }

    /// Apply an arithmetic/bitwise/shift operator to two computed
    /// values, inserting numeric conversions where the promotion
    /// requires them.
    pub(super) fn arith_apply(
        &mut self,
        op: BinaryOp,
        vl: Value<'a>,
        vr: Value<'a>,
        pos: Pos,
    ) -> Result<Value<'a>, CompileError> {
        if vl.ty.is_numeric() && vr.ty.is_numeric() {
            let ty = common(vl.ty, vr.ty);
            if !ty.is_integral() && requires_integral(op) {
                return Err(self.type_error(
                    pos,
                    format!(
                        "invalid operands to binary '{}' ('{}' and '{}')",
                        op.symbol(),
                        vl.ty,
                        vr.ty
                    ),
                ));
            }
            let vl = self.convert(vl, ty);
            let vr = self.convert(vr, ty);
            let opcode = arith_opcode(op, ty)?;
            let dst = Value {
                reg: self.fresh_reg(),
                ty,
            };
            let d = self.reg_op(dst);
            let l = self.reg_op(vl);
            let r = self.reg_op(vr);
            self.emit(opcode, 0, vec![d, l, r]);
            return Ok(dst);
        }

        // Pointer arithmetic, unscaled (subscripts scale explicitly).
        let (opcode, dst_ty) = match op {
            BinaryOp::Add if vl.ty.is_pointer() && vr.ty.is_integral() => (Opcode::Add, vl.ty),
            BinaryOp::Add if vl.ty.is_integral() && vr.ty.is_pointer() => (Opcode::Add, vr.ty),
            BinaryOp::Sub if vl.ty.is_pointer() && vr.ty.is_integral() => (Opcode::Sub, vl.ty),
            BinaryOp::Sub if vl.ty.is_pointer() && vr.ty.is_pointer() => (Opcode::Sub, INT64),
            _ => {
                return Err(self.type_error(
                    pos,
                    format!(
                        "invalid operands to binary '{}' ('{}' and '{}')",
                        op.symbol(),
                        vl.ty,
                        vr.ty
                    ),
                ));
            }
        };
        let dst = Value {
            reg: self.fresh_reg(),
            ty: dst_ty,
        };
        let d = self.reg_op(dst);
        let l = self.reg_op(vl);
        let r = self.reg_op(vr);
        self.emit(opcode, 0, vec![d, l, r]);
        Ok(dst)
    }

    /// `CMP l, r` followed by a conditional branch over the zero/one
    /// materialization. The condition comes straight from the operator
    /// table, never negated.
    fn gen_comparison(
        &mut self,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    ) -> Result<Value<'a>, CompileError> {
        let vl = self.gen_expr(lhs)?;
        let vr = self.gen_expr(rhs)?;
        let (vl, vr) = if vl.ty.is_numeric() && vr.ty.is_numeric() {
            let ty = common(vl.ty, vr.ty);
            (self.convert(vl, ty), self.convert(vr, ty))
        } else {
            (vl, vr)
        };
        let l = self.reg_op(vl);
        let r = self.reg_op(vr);
        self.emit(Opcode::Cmp, 0, vec![l, r]);

        let dst = self.fresh_reg();
        let (t, w) = INT32.encode(self.word_size());
        let l_true = self.fresh_label();
        let l_end = self.fresh_label();
        self.emit(
            Opcode::Brc,
            compare_cond(op) as u8,
            vec![Operand::label(l_true)],
        );
        self.emit(
            Opcode::Movi,
            0,
            vec![Operand::reg(dst, t, w), Operand::imm(t, w, 0)],
        );
        self.emit(Opcode::Br, 0, vec![Operand::label(l_end)]);
        self.emit_label_def(l_true);
        self.emit(
            Opcode::Movi,
            0,
            vec![Operand::reg(dst, t, w), Operand::imm(t, w, 1)],
        );
        self.emit_label_def(l_end);
        Ok(Value { reg: dst, ty: INT32 })
    }

    /// Short-circuit `&&`/`||`; the right operand only evaluates when
    /// the left side does not decide the result.
    fn gen_logical(
        &mut self,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    ) -> Result<Value<'a>, CompileError> {
        let dst = self.fresh_reg();
        let (t, w) = INT32.encode(self.word_size());
        let l_decided = self.fresh_label();
        let l_end = self.fresh_label();

        // For &&, branch to "decided" on zero (result 0); for ||,
        // branch on non-zero (result 1).
        let (cond, decided, fallthrough) = match op {
            BinaryOp::LogAnd => (BranchCond::Eq, 0u64, 1u64),
            _ => (BranchCond::Ne, 1, 0),
        };

        let vl = self.gen_expr(lhs)?;
        self.cmp_zero(vl);
        self.emit(Opcode::Brc, cond as u8, vec![Operand::label(l_decided)]);

        let vr = self.gen_expr(rhs)?;
        self.cmp_zero(vr);
        self.emit(Opcode::Brc, cond as u8, vec![Operand::label(l_decided)]);

        self.emit(
            Opcode::Movi,
            0,
            vec![Operand::reg(dst, t, w), Operand::imm(t, w, fallthrough)],
        );
        self.emit(Opcode::Br, 0, vec![Operand::label(l_end)]);
        self.emit_label_def(l_decided);
        self.emit(
            Opcode::Movi,
            0,
            vec![Operand::reg(dst, t, w), Operand::imm(t, w, decided)],
        );
        self.emit_label_def(l_end);
        Ok(Value { reg: dst, ty: INT32 })
    }

    fn gen_unary(
        &mut self,
        e: &'a Expr<'a>,
        op: UnaryOp,
        operand: &'a Expr<'a>,
    ) -> Result<Value<'a>, CompileError> {
        match op {
            UnaryOp::Neg | UnaryOp::BitNot => {
                let v = self.gen_expr(operand)?;
                let opcode = if op == UnaryOp::Neg {
                    Opcode::Neg
                } else {
                    Opcode::Not
                };
                let dst = Value {
                    reg: self.fresh_reg(),
                    ty: v.ty,
                };
                let d = self.reg_op(dst);
                let s = self.reg_op(v);
                self.emit(opcode, 0, vec![d, s]);
                Ok(dst)
            }
            UnaryOp::LogNot => {
                let v = self.gen_expr(operand)?;
                self.cmp_zero(v);
                let dst = self.fresh_reg();
                let (t, w) = INT32.encode(self.word_size());
                let l_true = self.fresh_label();
                let l_end = self.fresh_label();
                self.emit(
                    Opcode::Brc,
                    BranchCond::Eq as u8,
                    vec![Operand::label(l_true)],
                );
                self.emit(
                    Opcode::Movi,
                    0,
                    vec![Operand::reg(dst, t, w), Operand::imm(t, w, 0)],
                );
                self.emit(Opcode::Br, 0, vec![Operand::label(l_end)]);
                self.emit_label_def(l_true);
                self.emit(
                    Opcode::Movi,
                    0,
                    vec![Operand::reg(dst, t, w), Operand::imm(t, w, 1)],
                );
                self.emit_label_def(l_end);
                Ok(Value { reg: dst, ty: INT32 })
            }
            UnaryOp::PreInc => self.gen_incdec(operand, Opcode::Inc, true, e.pos),
            UnaryOp::PreDec => self.gen_incdec(operand, Opcode::Dec, true, e.pos),
            UnaryOp::PostInc => self.gen_incdec(operand, Opcode::Inc, false, e.pos),
            UnaryOp::PostDec => self.gen_incdec(operand, Opcode::Dec, false, e.pos),
            UnaryOp::Addr => match operand.kind {
                ExprKind::Ident(name) => {
                    let sym = self.resolve(name, operand.pos)?;
                    let handle = self.sym_handle(sym)?;
                    let reg = self.fresh_reg();
                    let (t, w) = e.ty.encode(self.word_size());
                    self.emit(Opcode::VarRef, 0, vec![Operand::reg(reg, t, w), handle]);
                    Ok(Value { reg, ty: e.ty })
                }
                // &*p is p itself.
                ExprKind::Unary {
                    op: UnaryOp::Deref,
                    operand: inner,
                } => {
                    let v = self.gen_expr(inner)?;
                    Ok(Value { reg: v.reg, ty: e.ty })
                }
                ExprKind::Index { base, index } => {
                    let (addr, _) = self.gen_index_addr(base, index, e.pos)?;
                    Ok(Value {
                        reg: addr.reg,
                        ty: e.ty,
                    })
                }
                _ => Err(self.codegen_error(e.pos, "cannot take the address of this expression")),
            },
            UnaryOp::Deref => {
                let v = self.gen_expr(operand)?;
                let elem = v.ty.element().ok_or_else(|| {
                    self.type_error(e.pos, format!("dereference of non-pointer type '{}'", v.ty))
                })?;
                let reg = self.fresh_reg();
                let (t, w) = elem.encode(self.word_size());
                let p = self.reg_op(v);
                self.emit(Opcode::Load, 0, vec![Operand::reg(reg, t, w), p]);
                Ok(Value { reg, ty: elem })
            }
        }
    }

    /// Prefix forms yield the updated value, postfix forms a copy of
    /// the original; both write the new value back to the operand.
    fn gen_incdec(
        &mut self,
        target: &'a Expr<'a>,
        opcode: Opcode,
        prefix: bool,
        pos: Pos,
    ) -> Result<Value<'a>, CompileError> {
        match target.kind {
            ExprKind::Ident(name) => {
                let sym = self.resolve(name, target.pos)?;
                let handle = self.sym_handle(sym)?;
                let cur = Value {
                    reg: self.fresh_reg(),
                    ty: sym.ty,
                };
                let cur_op = self.reg_op(cur);
                self.emit(Opcode::VarGet, 0, vec![cur_op, handle]);
                let result = self.incdec_update(cur, opcode, prefix);
                let cur_op = self.reg_op(cur);
                self.emit(Opcode::VarSet, 0, vec![handle, cur_op]);
                Ok(result)
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let addr = self.gen_expr(operand)?;
                let elem = addr.ty.element().ok_or_else(|| {
                    self.type_error(pos, format!("dereference of non-pointer type '{}'", addr.ty))
                })?;
                self.incdec_through(addr, elem, opcode, prefix)
            }
            ExprKind::Index { base, index } => {
                let (addr, elem) = self.gen_index_addr(base, index, pos)?;
                self.incdec_through(addr, elem, opcode, prefix)
            }
            _ => Err(self.codegen_error(pos, "invalid increment target")),
        }
    }

    fn incdec_through(
        &mut self,
        addr: Value<'a>,
        elem: &'a Type<'a>,
        opcode: Opcode,
        prefix: bool,
    ) -> Result<Value<'a>, CompileError> {
        let cur = Value {
            reg: self.fresh_reg(),
            ty: elem,
        };
        let cur_op = self.reg_op(cur);
        let addr_op = self.reg_op(addr);
        self.emit(Opcode::Load, 0, vec![cur_op, addr_op]);
        let result = self.incdec_update(cur, opcode, prefix);
        let cur_op = self.reg_op(cur);
        let addr_op = self.reg_op(addr);
        self.emit(Opcode::Store, 0, vec![addr_op, cur_op]);
        Ok(result)
    }

    fn incdec_update(&mut self, cur: Value<'a>, opcode: Opcode, prefix: bool) -> Value<'a> {
        let result = if prefix {
            cur
        } else {
            let copy = Value {
                reg: self.fresh_reg(),
                ty: cur.ty,
            };
            let c = self.reg_op(copy);
            let s = self.reg_op(cur);
            self.emit(Opcode::Mov, 0, vec![c, s]);
            copy
        };
        let cur_op = self.reg_op(cur);
        self.emit(opcode, 0, vec![cur_op]);
        result
    }

    /// The right-hand side computes first; compound forms read the
    /// current value, apply the operator, then write back.
    fn gen_assign(
        &mut self,
        e: &'a Expr<'a>,
        op: AssignOp,
        target: &'a Expr<'a>,
        value: &'a Expr<'a>,
    ) -> Result<Value<'a>, CompileError> {
        let rhs = self.gen_expr(value)?;
        match target.kind {
            ExprKind::Ident(name) => {
                let sym = self.resolve(name, target.pos)?;
                let handle = self.sym_handle(sym)?;
                let result = match op.binary_op() {
                    None => self.convert(rhs, sym.ty),
                    Some(bop) => {
                        let cur = Value {
                            reg: self.fresh_reg(),
                            ty: sym.ty,
                        };
                        let cur_op = self.reg_op(cur);
                        self.emit(Opcode::VarGet, 0, vec![cur_op, handle]);
                        let applied = self.arith_apply(bop, cur, rhs, e.pos)?;
                        self.convert(applied, sym.ty)
                    }
                };
                let r = self.reg_op(result);
                self.emit(Opcode::VarSet, 0, vec![handle, r]);
                Ok(Value {
                    reg: result.reg,
                    ty: sym.ty,
                })
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let addr = self.gen_expr(operand)?;
                let elem = addr.ty.element().ok_or_else(|| {
                    self.type_error(
                        e.pos,
                        format!("dereference of non-pointer type '{}'", addr.ty),
                    )
                })?;
                self.store_through(e, op, addr, elem, rhs)
            }
            ExprKind::Index { base, index } => {
                let (addr, elem) = self.gen_index_addr(base, index, e.pos)?;
                self.store_through(e, op, addr, elem, rhs)
            }
            ExprKind::Field { .. } => {
                Err(self.codegen_error(e.pos, "struct field access is not supported"))
            }
            _ => Err(self.codegen_error(e.pos, "invalid assignment target")),
        }
    }

    fn store_through(
        &mut self,
        e: &'a Expr<'a>,
        op: AssignOp,
        addr: Value<'a>,
        elem: &'a Type<'a>,
        rhs: Value<'a>,
    ) -> Result<Value<'a>, CompileError> {
        let result = match op.binary_op() {
            None => self.convert(rhs, elem),
            Some(bop) => {
                let cur = Value {
                    reg: self.fresh_reg(),
                    ty: elem,
                };
                let cur_op = self.reg_op(cur);
                let addr_op = self.reg_op(addr);
                self.emit(Opcode::Load, 0, vec![cur_op, addr_op]);
                let applied = self.arith_apply(bop, cur, rhs, e.pos)?;
                self.convert(applied, elem)
            }
        };
        let addr_op = self.reg_op(addr);
        let r = self.reg_op(result);
        self.emit(Opcode::Store, 0, vec![addr_op, r]);
        Ok(Value {
            reg: result.reg,
            ty: elem,
        })
    }

    /// Arguments evaluate left to right, each passed with `PARAM i`,
    /// then `CALL` by symbol and `RESULT` for non-void returns.
    fn gen_call(
        &mut self,
        callee: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
    ) -> Result<Value<'a>, CompileError> {
        let name = match callee.kind {
            ExprKind::Ident(name) => name,
            _ => return Err(self.codegen_error(callee.pos, "indirect calls are not supported")),
        };
        let sym = self.resolve(name, callee.pos)?;
        let (ret, params, variadic) = match sym.ty.kind {
            TypeKind::Function {
                ret,
                params,
                variadic,
            } => (ret, params, variadic),
            _ => {
                return Err(self.type_error(
                    callee.pos,
                    format!("called object '{}' is not a function", name),
                ));
            }
        };
        let arity_ok = if variadic {
            args.len() >= params.len()
        } else {
            args.len() == params.len()
        };
        if !arity_ok {
            return Err(self.semantic_error(
                callee.pos,
                SemanticErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: params.len(),
                    got: args.len(),
                },
            ));
        }

        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let v = self.gen_expr(arg)?;
            let v = if i < params.len() {
                self.convert(v, params[i])
            } else {
                v
            };
            values.push(v);
        }
        for (i, v) in values.iter().enumerate() {
            let r = self.reg_op(*v);
            self.emit(
                Opcode::Param,
                0,
                vec![Operand::imm(TYPE_UINT, 1, i as u64), r],
            );
        }
        let offset = self.intern(name);
        self.emit(Opcode::Call, 0, vec![Operand::sym(offset)]);

        if ret.is_void() {
            Ok(Value {
                reg: self.fresh_reg(),
                ty: ret,
            })
        } else {
            let reg = self.fresh_reg();
            let (t, w) = ret.encode(self.word_size());
            self.emit(Opcode::Result, 0, vec![Operand::reg(reg, t, w)]);
            Ok(Value { reg, ty: ret })
        }
    }

    fn gen_conditional(
        &mut self,
        e: &'a Expr<'a>,
        cond: &'a Expr<'a>,
        then_expr: &'a Expr<'a>,
        else_expr: &'a Expr<'a>,
    ) -> Result<Value<'a>, CompileError> {
        let result = Value {
            reg: self.fresh_reg(),
            ty: e.ty,
        };
        let l_else = self.fresh_label();
        let l_end = self.fresh_label();

        let vc = self.gen_expr(cond)?;
        self.cmp_zero(vc);
        self.emit(
            Opcode::Brc,
            BranchCond::Eq as u8,
            vec![Operand::label(l_else)],
        );

        let vt = self.gen_expr(then_expr)?;
        let vt = self.convert(vt, e.ty);
        let d = self.reg_op(result);
        let s = self.reg_op(vt);
        self.emit(Opcode::Mov, 0, vec![d, s]);
        self.emit(Opcode::Br, 0, vec![Operand::label(l_end)]);

        self.emit_label_def(l_else);
        let vf = self.gen_expr(else_expr)?;
        let vf = self.convert(vf, e.ty);
        let d = self.reg_op(result);
        let s = self.reg_op(vf);
        self.emit(Opcode::Mov, 0, vec![d, s]);
        self.emit_label_def(l_end);
        Ok(result)
    }

    /// Base plus index scaled by the element size in bytes.
    pub(super) fn gen_index_addr(
        &mut self,
        base: &'a Expr<'a>,
        index: &'a Expr<'a>,
        pos: Pos,
    ) -> Result<(Value<'a>, &'a Type<'a>), CompileError> {
        let vb = self.gen_expr(base)?;
        let elem = vb.ty.element().ok_or_else(|| {
            self.type_error(pos, format!("subscript of non-array type '{}'", vb.ty))
        })?;
        let vi = self.gen_expr(index)?;
        if !vi.ty.is_integral() {
            return Err(self.type_error(pos, "array subscript is not an integer"));
        }
        let size = self.movi_int(INT64, elem.size_of(self.word_size()) as i64);
        let scaled = Value {
            reg: self.fresh_reg(),
            ty: INT64,
        };
        let d = self.reg_op(scaled);
        let i = self.reg_op(vi);
        let s = self.reg_op(size);
        self.emit(Opcode::Mul, 0, vec![d, i, s]);
        let addr = Value {
            reg: self.fresh_reg(),
            ty: vb.ty,
        };
        let d = self.reg_op(addr);
        let b = self.reg_op(vb);
        let o = self.reg_op(scaled);
        self.emit(Opcode::Add, 0, vec![d, b, o]);
        Ok((addr, elem))
    }
}

/// Fixed operator-to-condition table.
fn compare_cond(op: BinaryOp) -> BranchCond {
    match op {
        BinaryOp::Eq => BranchCond::Eq,
        BinaryOp::Ne => BranchCond::Ne,
        BinaryOp::Lt => BranchCond::Lt,
        BinaryOp::Le => BranchCond::Le,
        BinaryOp::Gt => BranchCond::Gt,
        BinaryOp::Ge => BranchCond::Ge,
        _ => BranchCond::Always,
    }
}

fn requires_integral(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Mod
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr
    )
}

fn arith_opcode(op: BinaryOp, ty: &Type<'_>) -> Result<Opcode, CompileError> {
    let signed = matches!(ty.kind, TypeKind::Int { signed: true, .. });
    Ok(match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::BitAnd => Opcode::And,
        BinaryOp::BitOr => Opcode::Or,
        BinaryOp::BitXor => Opcode::Xor,
        BinaryOp::Shl => Opcode::Shl,
        // Arithmetic shift preserves the sign bit.
        BinaryOp::Shr if signed => Opcode::Sar,
        BinaryOp::Shr => Opcode::Shr,
        _ => {
            return Err(CompileError::Internal(format!(
                "operator '{}' is not arithmetic",
                op.symbol()
            )));
        }
    })
}
