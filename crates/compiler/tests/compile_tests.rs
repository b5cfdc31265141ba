//! End-to-end compile tests: source text in, decoded object out.

use coil_object::instr::OperandKind;
use coil_object::opcode::{BranchCond, Opcode, SYM_FUNC, SYM_LABEL, SYM_OBJECT, TYPE_FLOAT};
use coil_object::writer::{FLAG_EXECUTABLE, FLAG_LINKABLE, HEADER_SIZE, MAGIC, SECTION_HEADER_SIZE};
use coil_object::{Instruction, ObjectFile};
use coilc::{compile_source, CompileError, CompileOptions, SemanticErrorKind};

fn compile(source: &str) -> ObjectFile {
    let bytes =
        compile_source("test.c", source, &CompileOptions::default()).expect("compile failed");
    ObjectFile::parse(bytes).expect("object did not parse")
}

fn compile_err(source: &str) -> CompileError {
    match compile_source("test.c", source, &CompileOptions::default()) {
        Ok(_) => panic!("expected a compile error"),
        Err(e) => e,
    }
}

fn instructions(obj: &ObjectFile) -> Vec<Instruction> {
    obj.instructions().expect("instruction decode failed")
}

/// Indices of the instructions matching `pattern` as an in-order
/// (not necessarily contiguous) subsequence.
fn find_subsequence(ins: &[Instruction], pattern: &[Opcode]) -> Option<Vec<usize>> {
    let mut found = Vec::new();
    let mut next = 0;
    for (i, instruction) in ins.iter().enumerate() {
        if next < pattern.len() && instruction.opcode == pattern[next] {
            found.push(i);
            next += 1;
        }
    }
    (next == pattern.len()).then_some(found)
}

fn imm_value(ins: &Instruction, operand: usize) -> Option<u64> {
    match ins.operands.get(operand)?.kind {
        OperandKind::Imm(bits) => Some(bits),
        _ => None,
    }
}

fn reg_id(ins: &Instruction, operand: usize) -> Option<u32> {
    match ins.operands.get(operand)?.kind {
        OperandKind::Reg(id) => Some(id),
        _ => None,
    }
}

/// Function symbols defined in the object, in order.
fn function_symbols(obj: &ObjectFile) -> Vec<String> {
    instructions(obj)
        .iter()
        .filter(|i| i.opcode == Opcode::Symb && i.qualifier == SYM_FUNC)
        .filter_map(|i| match i.operands[0].kind {
            OperandKind::Sym(offset) => obj.string_at(offset).map(str::to_string),
            _ => None,
        })
        .collect()
}

// ----------------------------------------------------------------------
// Scenario 1: minimal program
// ----------------------------------------------------------------------

#[test]
fn test_minimal_program() {
    let obj = compile("int main() { return 0; }");

    assert_eq!(&obj.header.version.0, &1);
    assert!(obj.header.section_count >= 1);
    assert_ne!(obj.header.flags & FLAG_EXECUTABLE, 0);
    assert_ne!(obj.header.flags & FLAG_LINKABLE, 0);
    assert!(
        obj.header.entrypoint as usize > HEADER_SIZE + 2 * SECTION_HEADER_SIZE - 1,
        "entrypoint {} not past the headers",
        obj.header.entrypoint
    );

    assert_eq!(function_symbols(&obj), vec!["main"]);

    let ins = instructions(&obj);
    let found = find_subsequence(
        &ins,
        &[
            Opcode::Symb,
            Opcode::Enter,
            Opcode::Movi,
            Opcode::Result,
            Opcode::Leave,
            Opcode::Ret,
        ],
    )
    .expect("function skeleton missing");
    // The returned constant is zero.
    let movi = &ins[found[2]];
    assert_eq!(imm_value(movi, 1), Some(0));
}

#[test]
fn test_magic_bytes() {
    let bytes = compile_source(
        "test.c",
        "int main() { return 0; }",
        &CompileOptions::default(),
    )
    .expect("compile");
    assert_eq!(&bytes[0..4], &MAGIC);
    assert_eq!(&bytes[0..4], b"COIL");
}

// ----------------------------------------------------------------------
// Scenario 2: arithmetic with promotion of the register graph
// ----------------------------------------------------------------------

#[test]
fn test_arithmetic_register_flow() {
    let obj = compile("int f(int a, int b) { return a + b * 2; }");
    let ins = instructions(&obj);

    // Parameters are received in order.
    let params: Vec<&Instruction> = ins.iter().filter(|i| i.opcode == Opcode::Param).collect();
    assert_eq!(params.len(), 2);
    assert_eq!(imm_value(params[0], 0), Some(0));
    assert_eq!(imm_value(params[1], 0), Some(1));

    // MOVI V_two, 2 feeds the MUL, whose result feeds the ADD, whose
    // result is returned.
    let (movi_at, two_reg) = ins
        .iter()
        .enumerate()
        .find_map(|(i, ins)| {
            (ins.opcode == Opcode::Movi && imm_value(ins, 1) == Some(2))
                .then(|| (i, reg_id(ins, 0).expect("movi dest")))
        })
        .expect("constant 2 not materialized");

    let (mul_at, mul_dst) = ins
        .iter()
        .enumerate()
        .find_map(|(i, ins)| (ins.opcode == Opcode::Mul).then(|| (i, reg_id(ins, 0).expect("mul dest"))))
        .expect("MUL missing");
    assert!(mul_at > movi_at);
    assert_eq!(reg_id(&ins[mul_at], 2), Some(two_reg));

    let (add_at, add_dst) = ins
        .iter()
        .enumerate()
        .find_map(|(i, ins)| (ins.opcode == Opcode::Add).then(|| (i, reg_id(ins, 0).expect("add dest"))))
        .expect("ADD missing");
    assert!(add_at > mul_at);
    assert_eq!(reg_id(&ins[add_at], 2), Some(mul_dst));

    let result = ins
        .iter()
        .find(|i| i.opcode == Opcode::Result)
        .expect("RESULT missing");
    assert_eq!(reg_id(result, 0), Some(add_dst));
}

// ----------------------------------------------------------------------
// Scenario 3: while loop shape
// ----------------------------------------------------------------------

#[test]
fn test_while_loop_labels() {
    let obj = compile(
        "int f(int i, int n) {\n\
         \x20 int sum;\n\
         \x20 sum = 0;\n\
         \x20 while (i < n) { sum = sum + i; i = i + 1; }\n\
         \x20 return sum;\n\
         }",
    );
    let ins = instructions(&obj);

    // Label definitions by id -> instruction index.
    let mut label_defs = std::collections::HashMap::new();
    for (i, instruction) in ins.iter().enumerate() {
        if instruction.opcode == Opcode::Symb && instruction.qualifier == SYM_LABEL {
            if let OperandKind::Label(id) = instruction.operands[0].kind {
                label_defs.insert(id, i);
            }
        }
    }
    assert!(label_defs.len() >= 2, "expected loop labels");

    // A conditional exit: BRC EQ jumping forward to the end label.
    let has_forward_exit = ins.iter().enumerate().any(|(i, instruction)| {
        instruction.opcode == Opcode::Brc
            && instruction.qualifier == BranchCond::Eq as u8
            && matches!(
                instruction.operands[0].kind,
                OperandKind::Label(id) if label_defs.get(&id).is_some_and(|&at| at > i)
            )
    });
    assert!(has_forward_exit, "no conditional loop exit");

    // A back edge: BR to a label defined earlier.
    let has_back_edge = ins.iter().enumerate().any(|(i, instruction)| {
        instruction.opcode == Opcode::Br
            && matches!(
                instruction.operands[0].kind,
                OperandKind::Label(id) if label_defs.get(&id).is_some_and(|&at| at < i)
            )
    });
    assert!(has_back_edge, "no loop back edge");

    assert!(
        find_subsequence(&ins, &[Opcode::Cmp, Opcode::Brc]).is_some(),
        "comparison missing"
    );
}

// ----------------------------------------------------------------------
// Scenario 4: recursion
// ----------------------------------------------------------------------

#[test]
fn test_recursion() {
    let obj = compile(
        "int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }",
    );
    let ins = instructions(&obj);

    let call = ins
        .iter()
        .find(|i| i.opcode == Opcode::Call)
        .expect("recursive CALL missing");
    let callee = match call.operands[0].kind {
        OperandKind::Sym(offset) => obj.string_at(offset),
        _ => None,
    };
    assert_eq!(callee, Some("fact"));

    // n - 1 materializes the constant and subtracts.
    let sub_at = ins
        .iter()
        .position(|i| i.opcode == Opcode::Sub)
        .expect("SUB missing");
    let movi_one_before = ins[..sub_at]
        .iter()
        .any(|i| i.opcode == Opcode::Movi && imm_value(i, 1) == Some(1));
    assert!(movi_one_before, "constant 1 not materialized before SUB");

    assert!(
        find_subsequence(&ins, &[Opcode::Param, Opcode::Call, Opcode::Result]).is_some(),
        "call sequence missing"
    );
}

// ----------------------------------------------------------------------
// Scenario 5: block scoping
// ----------------------------------------------------------------------

#[test]
fn test_sibling_blocks_get_distinct_var_ids() {
    let obj = compile("int f() { { int x; x = 1; } { int x; x = 2; } return 0; }");
    let ins = instructions(&obj);

    let var_ids: Vec<u32> = ins
        .iter()
        .filter(|i| i.opcode == Opcode::VarCr)
        .filter_map(|i| match i.operands[0].kind {
            OperandKind::Var(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(var_ids.len(), 2);
    assert_ne!(var_ids[0], var_ids[1]);

    // Each declaration sits inside its own VARSC/VAREND bracket.
    assert!(
        find_subsequence(
            &ins,
            &[
                Opcode::VarSc,
                Opcode::VarCr,
                Opcode::VarEnd,
                Opcode::VarSc,
                Opcode::VarCr,
                Opcode::VarEnd,
            ],
        )
        .is_some(),
        "blocks not bracketed"
    );
}

// ----------------------------------------------------------------------
// Scenario 6: redefinition
// ----------------------------------------------------------------------

#[test]
fn test_redefinition_in_same_scope_fails() {
    let err = compile_err("int f() { int x; int x; return 0; }");
    match err {
        CompileError::Semantic {
            kind: SemanticErrorKind::Redefinition(name),
            pos,
        } => {
            assert_eq!(name, "x");
            assert_eq!(pos.line, 1);
        }
        other => panic!("expected redefinition, got: {}", other),
    }
}

#[test]
fn test_global_redefinition_fails() {
    let err = compile_err("int x; int x;");
    assert!(matches!(
        err,
        CompileError::Semantic {
            kind: SemanticErrorKind::Redefinition(_),
            ..
        }
    ));
}

// ----------------------------------------------------------------------
// Boundary behaviors
// ----------------------------------------------------------------------

#[test]
fn test_empty_source() {
    let obj = compile("");
    assert_eq!(obj.header.entrypoint, 0);
    assert_eq!(obj.header.flags & FLAG_EXECUTABLE, 0);
    assert!(function_symbols(&obj).is_empty());
}

#[test]
fn test_implicit_return_emitted() {
    let obj = compile("void f() { }");
    let ins = instructions(&obj);
    let leave_at = ins
        .iter()
        .position(|i| i.opcode == Opcode::Leave)
        .expect("implicit LEAVE missing");
    assert_eq!(ins[leave_at + 1].opcode, Opcode::Ret);
}

#[test]
fn test_unterminated_comment_fails() {
    let err = compile_err("int main() { return 0; } /* dangling");
    assert!(
        matches!(err, CompileError::Lex { .. }),
        "expected lex error, got: {}",
        err
    );
}

#[test]
fn test_infinite_for_has_no_conditional_exit() {
    let obj = compile("int f() { for (;;) { break; } return 0; }");
    let ins = instructions(&obj);
    // No condition, so nothing compares or conditionally branches.
    assert!(ins.iter().all(|i| i.opcode != Opcode::Brc));
    // The loop still closes with a back edge.
    let mut label_defs = std::collections::HashMap::new();
    for (i, instruction) in ins.iter().enumerate() {
        if instruction.opcode == Opcode::Symb && instruction.qualifier == SYM_LABEL {
            if let OperandKind::Label(id) = instruction.operands[0].kind {
                label_defs.insert(id, i);
            }
        }
    }
    let has_back_edge = ins.iter().enumerate().any(|(i, instruction)| {
        instruction.opcode == Opcode::Br
            && matches!(
                instruction.operands[0].kind,
                OperandKind::Label(id) if label_defs.get(&id).is_some_and(|&at| at < i)
            )
    });
    assert!(has_back_edge);
}

#[test]
fn test_label_ids_pairwise_distinct() {
    let obj = compile(
        "int f(int n) {\n\
         \x20 int i; int sum;\n\
         \x20 sum = 0;\n\
         \x20 for (i = 0; i < n; i = i + 1) { if (i % 2 == 0) { sum = sum + i; } }\n\
         \x20 while (sum > 100) { sum = sum - 1; }\n\
         \x20 return sum;\n\
         }",
    );
    let ins = instructions(&obj);
    let mut seen = std::collections::HashSet::new();
    for instruction in &ins {
        if instruction.opcode == Opcode::Symb && instruction.qualifier == SYM_LABEL {
            if let OperandKind::Label(id) = instruction.operands[0].kind {
                assert!(seen.insert(id), "label {} defined twice", id);
            }
        }
    }
    assert!(seen.len() >= 6);
}

// ----------------------------------------------------------------------
// Further behavior
// ----------------------------------------------------------------------

#[test]
fn test_string_literals_deduplicated() {
    let obj = compile(
        "char *a() { return \"hi\"; }\n\
         char *b() { return \"hi\"; }\n\
         char *c() { return \"other\"; }",
    );
    let ins = instructions(&obj);
    let str_offsets: Vec<u32> = ins
        .iter()
        .filter(|i| i.opcode == Opcode::Movi)
        .filter_map(|i| match i.operands.get(1).map(|o| o.kind) {
            Some(OperandKind::Str(offset)) => Some(offset),
            _ => None,
        })
        .collect();
    assert_eq!(str_offsets.len(), 3);
    assert_eq!(str_offsets[0], str_offsets[1]);
    assert_ne!(str_offsets[0], str_offsets[2]);
    assert_eq!(obj.string_at(str_offsets[0]), Some("hi"));
    assert_eq!(obj.string_at(str_offsets[2]), Some("other"));
}

#[test]
fn test_globals_are_symbol_directives() {
    let obj = compile("int counter; int main() { counter = 5; return counter; }");
    let ins = instructions(&obj);

    let global = ins
        .iter()
        .find(|i| i.opcode == Opcode::DirSymbol && i.qualifier == SYM_OBJECT)
        .expect("global symbol directive missing");
    let name = match global.operands[0].kind {
        OperandKind::Sym(offset) => obj.string_at(offset),
        _ => None,
    };
    assert_eq!(name, Some("counter"));

    // Assignment to the global goes through its name, not a var id.
    let varset = ins
        .iter()
        .find(|i| i.opcode == Opcode::VarSet)
        .expect("VARSET missing");
    match varset.operands[0].kind {
        OperandKind::Sym(offset) => assert_eq!(obj.string_at(offset), Some("counter")),
        other => panic!("global store used {:?}", other),
    }
}

#[test]
fn test_float_literal_bit_pattern() {
    let obj = compile("double f() { return 1.5; }");
    let ins = instructions(&obj);
    let movi = ins
        .iter()
        .find(|i| i.opcode == Opcode::Movi && i.operands[0].ty == TYPE_FLOAT)
        .expect("float MOVI missing");
    assert_eq!(imm_value(movi, 1), Some(1.5f32.to_bits() as u64));
}

#[test]
fn test_int_to_float_conversion_emitted() {
    let obj = compile("double f() { return 1; }");
    let ins = instructions(&obj);
    assert!(ins.iter().any(|i| i.opcode == Opcode::Itof));
}

#[test]
fn test_float_to_int_cast_emitted() {
    let obj = compile("int f(double d) { return (int)d; }");
    let ins = instructions(&obj);
    assert!(ins.iter().any(|i| i.opcode == Opcode::Ftoi));
}

#[test]
fn test_array_subscript_scales_by_element_size() {
    let obj = compile("int f() { int a[4]; a[2] = 9; return a[2]; }");
    let ins = instructions(&obj);
    // Scaling materializes the element size (4 bytes for int).
    let has_scale = ins
        .iter()
        .any(|i| i.opcode == Opcode::Movi && imm_value(i, 1) == Some(4));
    assert!(has_scale, "element size not materialized");
    assert!(find_subsequence(&ins, &[Opcode::Mul, Opcode::Add, Opcode::Store]).is_some());
    assert!(find_subsequence(&ins, &[Opcode::Mul, Opcode::Add, Opcode::Load]).is_some());
}

#[test]
fn test_mutual_recursion_resolves() {
    let obj = compile(
        "int is_even(int n);\n\
         int is_odd(int n) { if (n == 0) return 0; return is_even(n - 1); }\n\
         int is_even(int n) { if (n == 0) return 1; return is_odd(n - 1); }",
    );
    let calls = instructions(&obj)
        .iter()
        .filter(|i| i.opcode == Opcode::Call)
        .count();
    assert_eq!(calls, 2);
    assert_eq!(function_symbols(&obj), vec!["is_odd", "is_even"]);
}

#[test]
fn test_short_circuit_evaluates_rhs_conditionally() {
    let obj = compile("int f(int a, int b) { return a && b; }");
    let ins = instructions(&obj);
    // Two zero-comparisons, each followed by a conditional branch to
    // the same decided label.
    let brcs: Vec<&Instruction> = ins.iter().filter(|i| i.opcode == Opcode::Brc).collect();
    assert!(brcs.len() >= 2);
    assert_eq!(brcs[0].qualifier, BranchCond::Eq as u8);
    assert_eq!(brcs[0].operands[0].kind, brcs[1].operands[0].kind);
}

#[test]
fn test_goto_and_label() {
    let obj = compile("int f() { goto out; out: return 1; }");
    let ins = instructions(&obj);
    let br = ins
        .iter()
        .position(|i| i.opcode == Opcode::Br)
        .expect("goto BR missing");
    let target = match ins[br].operands[0].kind {
        OperandKind::Label(id) => id,
        other => panic!("goto through {:?}", other),
    };
    let defined = ins.iter().any(|i| {
        i.opcode == Opcode::Symb
            && i.qualifier == SYM_LABEL
            && i.operands[0].kind == OperandKind::Label(target)
    });
    assert!(defined, "goto target never defined");
}

#[test]
fn test_goto_undefined_label_fails() {
    let err = compile_err("int f() { goto nowhere; return 0; }");
    assert!(matches!(
        err,
        CompileError::Semantic {
            kind: SemanticErrorKind::UndefinedLabel(_),
            ..
        }
    ));
}

#[test]
fn test_break_outside_loop_fails() {
    let err = compile_err("int f() { break; return 0; }");
    assert!(
        matches!(err, CompileError::Codegen { .. }),
        "expected codegen error, got: {}",
        err
    );
}

#[test]
fn test_undefined_identifier_fails() {
    let err = compile_err("int f() { return missing; }");
    match err {
        CompileError::Semantic {
            kind: SemanticErrorKind::Undefined(name),
            ..
        } => assert_eq!(name, "missing"),
        other => panic!("expected undefined identifier, got: {}", other),
    }
}

#[test]
fn test_arity_mismatch_fails() {
    let err = compile_err("int f(int a) { return a; } int g() { return f(1, 2); }");
    assert!(matches!(
        err,
        CompileError::Semantic {
            kind: SemanticErrorKind::ArityMismatch { .. },
            ..
        }
    ));
}

#[test]
fn test_return_type_mismatch_fails() {
    let err = compile_err("void f() { return 3; }");
    assert!(matches!(
        err,
        CompileError::Semantic {
            kind: SemanticErrorKind::ReturnTypeMismatch(_),
            ..
        }
    ));
}

#[test]
fn test_field_access_unsupported() {
    let err = compile_err("int f(int *p) { return p->x; }");
    assert!(
        matches!(err, CompileError::Codegen { .. }),
        "expected codegen error, got: {}",
        err
    );
}

#[test]
fn test_compile_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("prog.c");
    let output = dir.path().join("prog.cof");
    std::fs::write(&input, "int main() { return 2 + 3; }").expect("write source");

    coilc::compile_file(&input, &output, &CompileOptions::default()).expect("compile_file");

    let bytes = std::fs::read(&output).expect("read object");
    assert_eq!(&bytes[0..4], &MAGIC);
    let obj = ObjectFile::parse(bytes).expect("parse");
    assert_eq!(function_symbols(&obj), vec!["main"]);
}

#[test]
fn test_compile_file_missing_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = coilc::compile_file(
        &dir.path().join("no-such.c"),
        &dir.path().join("out.cof"),
        &CompileOptions::default(),
    )
    .expect_err("must fail");
    assert!(matches!(err, CompileError::Io { .. }));
}
