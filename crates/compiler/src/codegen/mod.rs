//! Code generation: typed AST to virtual ISA instruction stream.
//!
//! The generator walks the program in source order, consulting the
//! symbol table and emitting instructions through the object writer.
//! Virtual registers and variable ids come from one object-global
//! counter, label ids from another; every expression gets a fresh
//! register (no reuse). Branch targets are symbolic: definitions are
//! `SYMB` instructions with a label operand, so nothing in the code
//! stream needs offset patching.

mod control_flow;
mod exprs;
mod statements;

use std::collections::{HashMap, HashSet};

use coil_object::instr::{Instruction, Operand};
use coil_object::opcode::{Opcode, SYM_FUNC, SYM_LABEL, SYM_OBJECT, TYPE_UINT};
use coil_object::writer::ObjectWriter;
use tracing::debug;

use crate::ast::{Decl, DeclKind, Pos, Program, Stmt, StmtKind};
use crate::error::{CompileError, SemanticErrorKind, SourcePos};
use crate::symtab::{Symbol, SymbolTable};
use crate::types::Type;
use crate::CompileOptions;

/// Break/continue targets for the innermost loop.
pub(super) struct LoopLabels {
    pub break_label: i32,
    pub continue_label: i32,
}

/// A value produced by expression lowering: the register holding it
/// and its effective type.
#[derive(Clone, Copy)]
pub(super) struct Value<'a> {
    pub reg: u32,
    pub ty: &'a Type<'a>,
}

pub struct CodeGen<'a, 't> {
    symtab: &'t mut SymbolTable<'a>,
    writer: ObjectWriter,
    file: String,
    word_size: u8,
    opt_level: u8,
    /// Shared counter for virtual registers and variable ids.
    next_reg: u32,
    next_label: i32,
    current_ret: Option<&'a Type<'a>>,
    loop_stack: Vec<LoopLabels>,
    /// Named `goto` labels of the current function.
    user_labels: HashMap<&'a str, i32>,
    defined_labels: HashSet<&'a str>,
    entry_offset: Option<u32>,
}

impl<'a, 't> CodeGen<'a, 't> {
    pub fn new(
        symtab: &'t mut SymbolTable<'a>,
        file: &str,
        options: &CompileOptions,
    ) -> CodeGen<'a, 't> {
        CodeGen {
            symtab,
            writer: ObjectWriter::new(coil_object::writer::ARCH_VIRT64),
            file: file.to_string(),
            word_size: options.word_size,
            opt_level: options.opt_level,
            next_reg: 0,
            next_label: 0,
            current_ret: None,
            loop_stack: Vec::new(),
            user_labels: HashMap::new(),
            defined_labels: HashSet::new(),
            entry_offset: None,
        }
    }

    /// Lower a whole program and return the finished object bytes.
    pub fn generate(mut self, program: &Program<'a>) -> Result<Vec<u8>, CompileError> {
        self.emit_preamble();
        for &decl in &program.decls {
            match decl.kind {
                DeclKind::Func {
                    params,
                    body: Some(body),
                } => self.gen_function(decl, params, body)?,
                // Prototypes exist only as bindings.
                DeclKind::Func { .. } => {}
                DeclKind::Var { .. } => self.gen_global(decl)?,
            }
        }
        if let Some(offset) = self.entry_offset {
            self.writer.set_entrypoint(offset);
        }
        debug!(
            code_bytes = self.writer.code_size(),
            registers = self.next_reg,
            labels = self.next_label,
            "code generation finished"
        );
        Ok(self.writer.finish())
    }

    fn emit_preamble(&mut self) {
        // Format version, matching the object header.
        self.emit(
            Opcode::DirVersion,
            0,
            vec![
                Operand::imm(TYPE_UINT, 1, 1),
                Operand::imm(TYPE_UINT, 1, 0),
                Operand::imm(TYPE_UINT, 1, 0),
            ],
        );
        self.emit(
            Opcode::DirTarget,
            0,
            vec![Operand::imm(
                TYPE_UINT,
                2,
                coil_object::writer::ARCH_VIRT64 as u64,
            )],
        );
        self.emit(
            Opcode::DirOptimize,
            0,
            vec![Operand::imm(TYPE_UINT, 1, self.opt_level as u64)],
        );
    }

    /// Globals are realized as symbol directives; their storage is the
    /// consumer's concern and initializers are not emitted.
    fn gen_global(&mut self, decl: &'a Decl<'a>) -> Result<(), CompileError> {
        let name_offset = self.writer.intern(decl.name);
        self.emit(
            Opcode::DirSymbol,
            SYM_OBJECT,
            vec![Operand::sym(name_offset)],
        );
        Ok(())
    }

    fn gen_function(
        &mut self,
        decl: &'a Decl<'a>,
        param_names: &'a [&'a str],
        body: &'a Stmt<'a>,
    ) -> Result<(), CompileError> {
        let (ret, param_types) = match decl.ty.kind {
            crate::types::TypeKind::Function { ret, params, .. } => (ret, params),
            _ => {
                return Err(CompileError::Internal(format!(
                    "function '{}' without function type",
                    decl.name
                )));
            }
        };

        if decl.name == "main" {
            self.entry_offset = Some(self.writer.offset());
        }
        let name_offset = self.writer.intern(decl.name);
        self.emit(Opcode::Symb, SYM_FUNC, vec![Operand::sym(name_offset)]);

        self.current_ret = Some(ret);
        self.user_labels.clear();
        self.defined_labels.clear();
        self.symtab.enter_scope();

        // Frame size is a placeholder; the VM does not require exact sizing.
        self.emit(Opcode::Enter, 0, vec![Operand::imm(TYPE_UINT, 8, 0)]);

        for (i, (&name, &ty)) in param_names.iter().zip(param_types.iter()).enumerate() {
            let var_id = self.fresh_reg();
            self.define_local(name, ty, var_id, decl.pos)?;
            let (t, w) = ty.encode(self.word_size);
            self.emit(Opcode::VarCr, 0, vec![Operand::var(var_id, t, w)]);
            self.emit(
                Opcode::Param,
                0,
                vec![
                    Operand::imm(TYPE_UINT, 1, i as u64),
                    Operand::var(var_id, t, w),
                ],
            );
        }

        // Parameters and body share one scope, so the body's statements
        // are lowered without the block's own VARSC/VAREND bracket.
        let stmts = match body.kind {
            StmtKind::Block(stmts) => stmts,
            _ => {
                return Err(CompileError::Internal(
                    "function body is not a block".to_string(),
                ));
            }
        };
        for stmt in stmts {
            self.gen_stmt(stmt)?;
        }
        if !ends_with_return(stmts) {
            self.emit_plain(Opcode::Leave);
            self.emit_plain(Opcode::Ret);
        }

        if let Some(missing) = self
            .user_labels
            .keys()
            .find(|name| !self.defined_labels.contains(*name))
        {
            return Err(self.semantic_error(
                decl.pos,
                SemanticErrorKind::UndefinedLabel(missing.to_string()),
            ));
        }

        self.symtab.exit_scope();
        self.current_ret = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    pub(super) fn emit(&mut self, opcode: Opcode, qualifier: u8, operands: Vec<Operand>) {
        self.writer
            .emit(&Instruction::new(opcode, qualifier, operands));
    }

    pub(super) fn emit_plain(&mut self, opcode: Opcode) {
        self.writer.emit(&Instruction::plain(opcode));
    }

    pub(super) fn fresh_reg(&mut self) -> u32 {
        let reg = self.next_reg;
        self.next_reg += 1;
        reg
    }

    pub(super) fn fresh_label(&mut self) -> i32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Emit a label definition: `SYMB` with a label operand.
    pub(super) fn emit_label_def(&mut self, id: i32) {
        self.emit(Opcode::Symb, SYM_LABEL, vec![Operand::label(id)]);
    }

    pub(super) fn word_size(&self) -> u8 {
        self.word_size
    }

    pub(super) fn intern(&mut self, s: &str) -> u32 {
        self.writer.intern(s)
    }

    pub(super) fn reg_op(&self, v: Value<'a>) -> Operand {
        let (t, w) = v.ty.encode(self.word_size);
        Operand::reg(v.reg, t, w)
    }

    /// The operand referring to a symbol: globals by name through the
    /// string table, locals by virtual-variable id.
    pub(super) fn sym_handle(&mut self, sym: &Symbol<'a>) -> Result<Operand, CompileError> {
        if sym.is_global {
            let offset = self.writer.intern(sym.name);
            Ok(Operand::sym(offset))
        } else {
            let id = sym.var_id.ok_or_else(|| {
                CompileError::Internal(format!("local '{}' has no variable id", sym.name))
            })?;
            let (t, w) = sym.ty.encode(self.word_size);
            Ok(Operand::var(id, t, w))
        }
    }

    pub(super) fn resolve(&self, name: &str, pos: Pos) -> Result<&'a Symbol<'a>, CompileError> {
        self.symtab.lookup(name).ok_or_else(|| {
            self.semantic_error(pos, SemanticErrorKind::Undefined(name.to_string()))
        })
    }

    pub(super) fn define_local(
        &mut self,
        name: &'a str,
        ty: &'a Type<'a>,
        var_id: u32,
        pos: Pos,
    ) -> Result<&'a Symbol<'a>, CompileError> {
        match self.symtab.define(name, ty, Some(var_id)) {
            Some(symbol) => Ok(symbol),
            None => {
                Err(self.semantic_error(pos, SemanticErrorKind::Redefinition(name.to_string())))
            }
        }
    }

    pub(super) fn enter_scope(&mut self) {
        self.symtab.enter_scope();
    }

    pub(super) fn exit_scope(&mut self) {
        self.symtab.exit_scope();
    }

    pub(super) fn push_loop(&mut self, labels: LoopLabels) {
        self.loop_stack.push(labels);
    }

    pub(super) fn pop_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub(super) fn current_loop(&self) -> Option<&LoopLabels> {
        self.loop_stack.last()
    }

    pub(super) fn current_ret(&self) -> Option<&'a Type<'a>> {
        self.current_ret
    }

    pub(super) fn user_label(&mut self, name: &'a str) -> i32 {
        if let Some(&id) = self.user_labels.get(name) {
            return id;
        }
        let id = self.fresh_label();
        self.user_labels.insert(name, id);
        id
    }

    /// Record a user label definition; false if it was already defined.
    pub(super) fn define_user_label(&mut self, name: &'a str) -> bool {
        self.defined_labels.insert(name)
    }

    /// Materialize an integer constant into a fresh register.
    pub(super) fn movi_int(&mut self, ty: &'a Type<'a>, value: i64) -> Value<'a> {
        let reg = self.fresh_reg();
        let (t, w) = ty.encode(self.word_size);
        self.emit(
            Opcode::Movi,
            0,
            vec![Operand::reg(reg, t, w), Operand::imm(t, w, value as u64)],
        );
        Value { reg, ty }
    }

    /// Compare a value against a typed zero; the following `BRC`
    /// consumes the result.
    pub(super) fn cmp_zero(&mut self, v: Value<'a>) {
        let zero = self.movi_int(v.ty, 0);
        let a = self.reg_op(v);
        let b = self.reg_op(zero);
        self.emit(Opcode::Cmp, 0, vec![a, b]);
    }

    /// Bridge integral and floating values with `ITOF`/`FTOI`; other
    /// mismatches are left to the VM's width handling.
    pub(super) fn convert(&mut self, v: Value<'a>, target: &'a Type<'a>) -> Value<'a> {
        if v.ty.is_floating() && target.is_integral() {
            let dst = Value {
                reg: self.fresh_reg(),
                ty: target,
            };
            let d = self.reg_op(dst);
            let s = self.reg_op(v);
            self.emit(Opcode::Ftoi, 0, vec![d, s]);
            dst
        } else if v.ty.is_integral() && target.is_floating() {
            let dst = Value {
                reg: self.fresh_reg(),
                ty: target,
            };
            let d = self.reg_op(dst);
            let s = self.reg_op(v);
            self.emit(Opcode::Itof, 0, vec![d, s]);
            dst
        } else {
            v
        }
    }

    // ------------------------------------------------------------------
    // Error helpers
    // ------------------------------------------------------------------

    fn source_pos(&self, pos: Pos) -> SourcePos {
        SourcePos::new(self.file.clone(), pos.line, pos.col)
    }

    pub(super) fn semantic_error(&self, pos: Pos, kind: SemanticErrorKind) -> CompileError {
        CompileError::Semantic {
            pos: self.source_pos(pos),
            kind,
        }
    }

    pub(super) fn type_error(&self, pos: Pos, message: impl Into<String>) -> CompileError {
        CompileError::Type {
            pos: self.source_pos(pos),
            message: message.into(),
        }
    }

    pub(super) fn codegen_error(&self, pos: Pos, message: impl Into<String>) -> CompileError {
        CompileError::Codegen {
            pos: self.source_pos(pos),
            message: message.into(),
        }
    }
}

fn ends_with_return(stmts: &[&Stmt<'_>]) -> bool {
    matches!(
        stmts.last(),
        Some(Stmt {
            kind: StmtKind::Return(_),
            ..
        })
    )
}
