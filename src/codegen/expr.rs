//! Expression-by-expression emitter.
//!
//! Every expression leaves its result in `a0` when it's done; this is the
//! one invariant the rest of the emitter can always rely on. Temporaries
//! that must survive a call are pushed onto the frame and popped back out
//! immediately after, never left live across a `jal`.

use crate::class_table::ClassTable;
use crate::constant_pool::ConstantPool;
use crate::typecheck::{TypedCaseBranch, TypedExpr, TypedExprKind, TypedLetBinding, SELF_TYPE};

use super::emitter::{Emitter, Frame, FRAME_POINTER, RESULT, SELF_REG, TEMP_REGISTERS, VALUE_REG, ZERO};

pub struct ExprContext<'a> {
    pub emitter: &'a mut Emitter,
    pub frame: &'a mut Frame,
    pub table: &'a ClassTable,
    pub pool: &'a mut ConstantPool,
    pub current_class: String,
    /// Label of the source file's own interned `String` object, used by
    /// `case` abort calls to report where the failing case lives.
    pub file_name_label: String,
}

/// Every call site pushes the caller's `fp` as a control-link word right
/// before transferring control, and drops it the instant control returns;
/// nothing downstream ever reads it back, since the callee's own epilogue
/// is what consumes it.
fn emit_call(ctx: &mut ExprContext, target: &str) {
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    ctx.emitter.instr(&format!("jal {}", target));
    ctx.frame.forget_words(1);
}

fn emit_call_indirect(ctx: &mut ExprContext, reg: &str) {
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    ctx.emitter.instr(&format!("jalr ra, {}, 0", reg));
    ctx.frame.forget_words(1);
}

pub fn emit_expr(e: &TypedExpr, ctx: &mut ExprContext) {
    match &e.kind {
        TypedExprKind::IntConstant(v) => {
            let label = ctx.pool.intern_int(*v);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, label));
        }
        TypedExprKind::BoolConstant(v) => {
            let label = ctx.pool.bool_label(*v);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, label));
        }
        TypedExprKind::StringConstant(bytes) => {
            let label = ctx.pool.intern_string(bytes);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, label));
        }
        TypedExprKind::ObjectReference(name) => {
            emit_load_variable(name, ctx);
        }
        TypedExprKind::Assignment(name, value) => {
            emit_expr(value, ctx);
            emit_store_variable(name, ctx);
        }
        TypedExprKind::Sequence(exprs) => {
            for sub in exprs {
                emit_expr(sub, ctx);
            }
        }
        TypedExprKind::IfThenElseFi {
            cond,
            then_branch,
            else_branch,
        } => {
            emit_expr(cond, ctx);
            let else_label = ctx.frame.fresh_label("if_else");
            let end_label = ctx.frame.fresh_label("if_end");
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[0], RESULT));
            ctx.emitter.instr(&format!("beq {}, {}, {}", TEMP_REGISTERS[0], ZERO, else_label));
            emit_expr(then_branch, ctx);
            ctx.emitter.instr(&format!("j {}", end_label));
            ctx.emitter.label(&else_label);
            emit_expr(else_branch, ctx);
            ctx.emitter.label(&end_label);
        }
        TypedExprKind::WhileLoopPool { cond, body } => {
            let loop_label = ctx.frame.fresh_label("while_top");
            let end_label = ctx.frame.fresh_label("while_end");
            ctx.emitter.label(&loop_label);
            emit_expr(cond, ctx);
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[0], RESULT));
            ctx.emitter.instr(&format!("beq {}, {}, {}", TEMP_REGISTERS[0], ZERO, end_label));
            emit_expr(body, ctx);
            ctx.emitter.instr(&format!("j {}", loop_label));
            ctx.emitter.label(&end_label);
            ctx.emitter.instr(&format!("mv {}, {}", RESULT, ZERO));
        }
        TypedExprKind::LetIn { bindings, body } => {
            ctx.frame.begin_scope();
            let mut pushed = 0;
            for binding in bindings {
                emit_let_binding(binding, ctx);
                pushed += 1;
            }
            emit_expr(body, ctx);
            ctx.frame.end_scope();
            ctx.frame.pop_words(ctx.emitter, pushed);
        }
        TypedExprKind::CaseOfEsac { subject, arms } => {
            emit_case(subject, arms, e.line, ctx);
        }
        TypedExprKind::NewObject(ty) => {
            emit_new_object(ty, ctx);
        }
        TypedExprKind::IsVoid(inner) => {
            emit_expr(inner, ctx);
            let true_label = ctx.frame.fresh_label("isvoid_true");
            let end_label = ctx.frame.fresh_label("isvoid_end");
            ctx.emitter.instr(&format!("beq {}, {}, {}", RESULT, ZERO, true_label));
            let false_const = ctx.pool.bool_label(false);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, false_const));
            ctx.emitter.instr(&format!("j {}", end_label));
            ctx.emitter.label(&true_label);
            let true_const = ctx.pool.bool_label(true);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, true_const));
            ctx.emitter.label(&end_label);
        }
        TypedExprKind::IntegerNegation(inner) => {
            emit_expr(inner, ctx);
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[0], RESULT));
            ctx.emitter.instr(&format!("sub {}, {}, {}", TEMP_REGISTERS[0], ZERO, TEMP_REGISTERS[0]));
            emit_box_int(TEMP_REGISTERS[0], ctx);
        }
        TypedExprKind::BooleanNegation(inner) => {
            emit_expr(inner, ctx);
            let false_label = ctx.frame.fresh_label("not_false");
            let end_label = ctx.frame.fresh_label("not_end");
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[0], RESULT));
            ctx.emitter.instr(&format!("beq {}, {}, {}", TEMP_REGISTERS[0], ZERO, false_label));
            let false_const = ctx.pool.bool_label(false);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, false_const));
            ctx.emitter.instr(&format!("j {}", end_label));
            ctx.emitter.label(&false_label);
            let true_const = ctx.pool.bool_label(true);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, true_const));
            ctx.emitter.label(&end_label);
        }
        TypedExprKind::Arithmetic(op, lhs, rhs) => {
            emit_expr(lhs, ctx);
            let offset = ctx.frame.push_register(ctx.emitter, RESULT);
            emit_expr(rhs, ctx);
            ctx.emitter.instr(&format!("lw {}, {}({})", TEMP_REGISTERS[0], offset, FRAME_POINTER));
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[0], TEMP_REGISTERS[0]));
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[1], RESULT));
            let opcode = match op {
                crate::ast::ArithOp::Add => "add",
                crate::ast::ArithOp::Sub => "sub",
                crate::ast::ArithOp::Mul => "mul",
                crate::ast::ArithOp::Div => "div",
            };
            ctx.emitter.instr(&format!(
                "{} {}, {}, {}",
                opcode, TEMP_REGISTERS[2], TEMP_REGISTERS[0], TEMP_REGISTERS[1]
            ));
            ctx.frame.pop_words(ctx.emitter, 1);
            emit_box_int(TEMP_REGISTERS[2], ctx);
        }
        TypedExprKind::IntegerComparison(op, lhs, rhs) => {
            emit_expr(lhs, ctx);
            let offset = ctx.frame.push_register(ctx.emitter, RESULT);
            emit_expr(rhs, ctx);
            ctx.emitter.instr(&format!("lw {}, {}({})", TEMP_REGISTERS[0], offset, FRAME_POINTER));
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[0], TEMP_REGISTERS[0]));
            ctx.emitter.instr(&format!("lw {}, 12({})", TEMP_REGISTERS[1], RESULT));
            ctx.frame.pop_words(ctx.emitter, 1);
            match op {
                crate::ast::CompareOp::Lt => {
                    ctx.emitter.instr(&format!("slt {}, {}, {}", TEMP_REGISTERS[2], TEMP_REGISTERS[0], TEMP_REGISTERS[1]));
                }
                crate::ast::CompareOp::Le => {
                    // a <= b  <=>  !(b < a)
                    ctx.emitter.instr(&format!("slt {}, {}, {}", TEMP_REGISTERS[2], TEMP_REGISTERS[1], TEMP_REGISTERS[0]));
                    ctx.emitter.instr(&format!("xori {}, {}, 1", TEMP_REGISTERS[2], TEMP_REGISTERS[2]));
                }
            }
            let true_label = ctx.frame.fresh_label("cmp_true");
            let end_label = ctx.frame.fresh_label("cmp_end");
            ctx.emitter.instr(&format!("bne {}, {}, {}", TEMP_REGISTERS[2], ZERO, true_label));
            let false_const = ctx.pool.bool_label(false);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, false_const));
            ctx.emitter.instr(&format!("j {}", end_label));
            ctx.emitter.label(&true_label);
            let true_const = ctx.pool.bool_label(true);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, true_const));
            ctx.emitter.label(&end_label);
        }
        TypedExprKind::EqualityComparison(lhs, rhs) => {
            emit_equality_comparison(lhs, rhs, ctx);
        }
        TypedExprKind::MethodInvocation { name, args } => {
            let current_class = ctx.current_class.clone();
            emit_dispatch_implicit(&current_class, name, args, ctx);
        }
        TypedExprKind::DynamicDispatch { target, name, args } => {
            let lookup_class = resolve_self(&target.static_type, &ctx.current_class);
            emit_expr(target, ctx);
            emit_dispatch_explicit(&lookup_class, name, args, ctx);
        }
        TypedExprKind::StaticDispatch {
            target,
            dispatch_type,
            name,
            args,
        } => {
            emit_expr(target, ctx);
            emit_dispatch_static(dispatch_type, name, args, ctx);
        }
        TypedExprKind::ParenthesizedExpr(inner) => emit_expr(inner, ctx),
    }
}

fn resolve_self(ty: &str, current_class: &str) -> String {
    if ty == SELF_TYPE {
        current_class.to_string()
    } else {
        ty.to_string()
    }
}

fn emit_load_variable(name: &str, ctx: &mut ExprContext) {
    if name == "self" {
        ctx.emitter.instr(&format!("mv {}, {}", RESULT, SELF_REG));
        return;
    }
    if let Some(offset) = ctx.frame.lookup_var(name) {
        ctx.emitter.instr(&format!("lw {}, {}({})", RESULT, offset, FRAME_POINTER));
        return;
    }
    let record = ctx.table.get(&ctx.current_class).expect("current class is in the table");
    let attr = record.attributes.iter().find(|a| a.name == name).expect("attribute resolved by the type checker");
    ctx.emitter.instr(&format!("lw {}, {}({})", RESULT, attr.offset_words * 4, SELF_REG));
}

fn emit_store_variable(name: &str, ctx: &mut ExprContext) {
    if let Some(offset) = ctx.frame.lookup_var(name) {
        ctx.emitter.instr(&format!("sw {}, {}({})", RESULT, offset, FRAME_POINTER));
        return;
    }
    let record = ctx.table.get(&ctx.current_class).expect("current class is in the table");
    let attr = record.attributes.iter().find(|a| a.name == name).expect("attribute resolved by the type checker");
    ctx.emitter.instr(&format!("sw {}, {}({})", RESULT, attr.offset_words * 4, SELF_REG));
}

/// `=` compares by pointer identity first, then (for `Int`/`Bool`/`String`)
/// by value; any other pair of distinct objects compares unequal. Inlined
/// here rather than delegated to a runtime helper, since nothing outside
/// the compiler's own static-constant pool knows the `Int`/`Bool`/`String`
/// class tags.
fn emit_equality_comparison(lhs: &TypedExpr, rhs: &TypedExpr, ctx: &mut ExprContext) {
    emit_expr(lhs, ctx);
    let offset = ctx.frame.push_register(ctx.emitter, RESULT);
    emit_expr(rhs, ctx);
    ctx.emitter.instr(&format!("mv {}, {}", TEMP_REGISTERS[1], RESULT));
    ctx.emitter.instr(&format!("lw {}, {}({})", TEMP_REGISTERS[0], offset, FRAME_POINTER));
    ctx.frame.pop_words(ctx.emitter, 1);

    let ret_true = ctx.frame.fresh_label("eq_true");
    let ret_false = ctx.frame.fresh_label("eq_false");
    let end_label = ctx.frame.fresh_label("eq_end");
    let lhs_void = ctx.frame.fresh_label("eq_lhs_void");
    let after_void = ctx.frame.fresh_label("eq_after_void");
    let check_int = ctx.frame.fresh_label("eq_check_int");
    let check_bool = ctx.frame.fresh_label("eq_check_bool");
    let check_string = ctx.frame.fresh_label("eq_check_string");
    let str_loop = ctx.frame.fresh_label("eq_str_loop");
    let str_ok = ctx.frame.fresh_label("eq_str_ok");

    let (t0, t1, t2, t3, t4, t5, t6) = (
        TEMP_REGISTERS[0],
        TEMP_REGISTERS[1],
        TEMP_REGISTERS[2],
        TEMP_REGISTERS[3],
        TEMP_REGISTERS[4],
        TEMP_REGISTERS[5],
        TEMP_REGISTERS[6],
    );

    // pointer equality short-circuits everything below
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t0, t1));
    ctx.emitter.instr(&format!("seqz {}, {}", t4, t4));
    ctx.emitter.instr(&format!("bnez {}, {}", t4, ret_true));

    // exactly one side void => unequal; both void was caught above
    ctx.emitter.instr(&format!("beqz {}, {}", t0, lhs_void));
    ctx.emitter.instr(&format!("beqz {}, {}", t1, ret_false));
    ctx.emitter.instr(&format!("j {}", after_void));
    ctx.emitter.label(&lhs_void);
    ctx.emitter.instr(&format!("beqz {}, {}", t1, ret_true));
    ctx.emitter.instr(&format!("j {}", ret_false));
    ctx.emitter.label(&after_void);

    // different dynamic types are never equal
    ctx.emitter.instr(&format!("lw {}, 0({})", t2, t0));
    ctx.emitter.instr(&format!("lw {}, 0({})", t3, t1));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t2, t3));
    ctx.emitter.instr(&format!("bnez {}, {}", t4, ret_false));

    let int_tag = ctx.table.get("Int").expect("Int is always in the table").tag;
    let bool_tag = ctx.table.get("Bool").expect("Bool is always in the table").tag;
    let string_tag = ctx.table.get("String").expect("String is always in the table").tag;

    ctx.emitter.instr(&format!("li {}, {}", t4, int_tag));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t2, t4));
    ctx.emitter.instr(&format!("beqz {}, {}", t4, check_int));
    ctx.emitter.instr(&format!("li {}, {}", t4, bool_tag));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t2, t4));
    ctx.emitter.instr(&format!("beqz {}, {}", t4, check_bool));
    ctx.emitter.instr(&format!("li {}, {}", t4, string_tag));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t2, t4));
    ctx.emitter.instr(&format!("beqz {}, {}", t4, check_string));
    ctx.emitter.instr(&format!("j {}", ret_false));

    ctx.emitter.label(&check_int);
    ctx.emitter.instr(&format!("lw {}, 12({})", t5, t0));
    ctx.emitter.instr(&format!("lw {}, 12({})", t6, t1));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t5, t6));
    ctx.emitter.instr(&format!("beqz {}, {}", t4, ret_true));
    ctx.emitter.instr(&format!("j {}", ret_false));

    ctx.emitter.label(&check_bool);
    ctx.emitter.instr(&format!("lw {}, 12({})", t5, t0));
    ctx.emitter.instr(&format!("lw {}, 12({})", t6, t1));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t5, t6));
    ctx.emitter.instr(&format!("beqz {}, {}", t4, ret_true));
    ctx.emitter.instr(&format!("j {}", ret_false));

    ctx.emitter.label(&check_string);
    ctx.emitter.instr(&format!("lw {}, 12({})", t5, t0));
    ctx.emitter.instr(&format!("lw {}, 12({})", t6, t1));
    ctx.emitter.instr(&format!("lw {}, 12({})", t5, t5));
    ctx.emitter.instr(&format!("lw {}, 12({})", t6, t6));
    ctx.emitter.instr(&format!("sub {}, {}, {}", t4, t5, t6));
    ctx.emitter.instr(&format!("bnez {}, {}", t4, ret_false));
    ctx.emitter.instr(&format!("add {}, {}, {}", t2, t5, ZERO));
    ctx.emitter.instr(&format!("addi {}, {}, 16", t5, t0));
    ctx.emitter.instr(&format!("addi {}, {}, 16", t6, t1));
    ctx.emitter.label(&str_loop);
    ctx.emitter.instr(&format!("beqz {}, {}", t2, str_ok));
    ctx.emitter.instr(&format!("lb {}, 0({})", t3, t5));
    ctx.emitter.instr(&format!("lb {}, 0({})", t4, t6));
    ctx.emitter.instr(&format!("bne {}, {}, {}", t3, t4, ret_false));
    ctx.emitter.instr(&format!("addi {}, {}, 1", t5, t5));
    ctx.emitter.instr(&format!("addi {}, {}, 1", t6, t6));
    ctx.emitter.instr(&format!("addi {}, {}, -1", t2, t2));
    ctx.emitter.instr(&format!("j {}", str_loop));
    ctx.emitter.label(&str_ok);
    ctx.emitter.instr(&format!("j {}", ret_true));

    ctx.emitter.label(&ret_true);
    let true_const = ctx.pool.bool_label(true);
    ctx.emitter.instr(&format!("la {}, {}", RESULT, true_const));
    ctx.emitter.instr(&format!("j {}", end_label));

    ctx.emitter.label(&ret_false);
    let false_const = ctx.pool.bool_label(false);
    ctx.emitter.instr(&format!("la {}, {}", RESULT, false_const));

    ctx.emitter.label(&end_label);
}

/// Boxes a raw value into a fresh `Int`. The value is stashed in the saved
/// register `s2` (not a temp) because it must survive the `Object.copy`
/// call, which clobbers every temp register.
fn emit_box_int(temp_reg: &str, ctx: &mut ExprContext) {
    ctx.emitter.instr(&format!("mv {}, {}", VALUE_REG, temp_reg));
    ctx.emitter.instr(&format!("la {}, Int_protObj", RESULT));
    emit_call(ctx, "Object.copy");
    ctx.emitter.instr(&format!("sw {}, 12({})", VALUE_REG, RESULT));
}

fn emit_default_value(declared_type: &str, ctx: &mut ExprContext) {
    match declared_type {
        "Int" => {
            let label = ctx.pool.intern_int(0);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, label));
        }
        "Bool" => {
            let label = ctx.pool.bool_label(false);
            ctx.emitter.instr(&format!("la {}, {}", RESULT, label));
        }
        "String" => {
            let label = ctx.pool.intern_string(b"");
            ctx.emitter.instr(&format!("la {}, {}", RESULT, label));
        }
        _ => ctx.emitter.instr(&format!("mv {}, {}", RESULT, ZERO)),
    }
}

fn emit_let_binding(binding: &TypedLetBinding, ctx: &mut ExprContext) {
    match &binding.init {
        Some(init) => emit_expr(init, ctx),
        None => emit_default_value(&binding.declared_type, ctx),
    }
    let offset = ctx.frame.push_register(ctx.emitter, RESULT);
    ctx.frame.bind_var(&binding.name, offset);
}

/// `self`, not the case subject, is the object an abort reports against —
/// matching the runtime's expectation that the first abort argument names
/// the object whose method is currently executing.
fn emit_case(subject: &TypedExpr, arms: &[TypedCaseBranch], line: u32, ctx: &mut ExprContext) {
    emit_expr(subject, ctx);
    ctx.emitter.instr(&format!("mv {}, {}", TEMP_REGISTERS[0], RESULT));

    let void_label = ctx.frame.fresh_label("case_void");
    let no_match_label = ctx.frame.fresh_label("case_no_match");
    let end_label = ctx.frame.fresh_label("case_end");

    ctx.emitter.instr(&format!("beqz {}, {}", TEMP_REGISTERS[0], void_label));
    ctx.emitter.instr(&format!("lw {}, 0({})", TEMP_REGISTERS[1], TEMP_REGISTERS[0]));

    // more-derived branches tested first; ties broken by tag ascending
    let mut annotated: Vec<(&TypedCaseBranch, u32, u32)> = arms
        .iter()
        .map(|arm| {
            let record = ctx.table.get(&arm.declared_type).expect("case branch type resolved by the type checker");
            (arm, ancestor_depth(ctx.table, &arm.declared_type), record.tag)
        })
        .collect();
    annotated.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let mut branch_labels = Vec::with_capacity(annotated.len());
    for (arm, _, _) in &annotated {
        let record = ctx.table.get(&arm.declared_type).expect("case branch type resolved by the type checker");
        let branch_label = ctx.frame.fresh_label("case_branch");
        let next_label = ctx.frame.fresh_label("case_next");
        ctx.emitter.instr(&format!("li {}, {}", TEMP_REGISTERS[2], record.tag));
        ctx.emitter.instr(&format!("sub {}, {}, {}", TEMP_REGISTERS[3], TEMP_REGISTERS[1], TEMP_REGISTERS[2]));
        ctx.emitter.instr(&format!("bltz {}, {}", TEMP_REGISTERS[3], next_label));
        ctx.emitter.instr(&format!("li {}, {}", TEMP_REGISTERS[2], record.max_descendant_tag));
        ctx.emitter.instr(&format!("sub {}, {}, {}", TEMP_REGISTERS[3], TEMP_REGISTERS[1], TEMP_REGISTERS[2]));
        ctx.emitter.instr(&format!("bgtz {}, {}", TEMP_REGISTERS[3], next_label));
        ctx.emitter.instr(&format!("j {}", branch_label));
        ctx.emitter.label(&next_label);
        branch_labels.push(branch_label);
    }
    ctx.emitter.instr(&format!("j {}", no_match_label));

    for ((arm, _, _), branch_label) in annotated.iter().zip(branch_labels.iter()) {
        ctx.emitter.label(branch_label);
        ctx.emitter.instr(&format!("mv {}, {}", RESULT, TEMP_REGISTERS[0]));
        let offset = ctx.frame.push_register(ctx.emitter, RESULT);
        ctx.frame.begin_scope();
        ctx.frame.bind_var(&arm.name, offset);
        emit_expr(&arm.body, ctx);
        ctx.frame.end_scope();
        ctx.frame.pop_words(ctx.emitter, 1);
        ctx.emitter.instr(&format!("j {}", end_label));
    }

    // Neither abort call returns, so the pushes below never need popping at
    // runtime; `pre_abort_depth` just keeps the emitter's own bookkeeping
    // honest for whatever code follows the case expression in program order.
    let pre_abort_depth = ctx.frame.depth_bytes;
    let line_label = ctx.pool.intern_int(line as i32);

    ctx.emitter.label(&void_label);
    ctx.emitter.instr(&format!("mv {}, {}", RESULT, SELF_REG));
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    ctx.emitter.instr(&format!("la {}, {}", TEMP_REGISTERS[2], ctx.file_name_label));
    ctx.frame.push_register(ctx.emitter, TEMP_REGISTERS[2]);
    ctx.emitter.instr(&format!("la {}, {}", TEMP_REGISTERS[2], line_label));
    ctx.frame.push_register(ctx.emitter, TEMP_REGISTERS[2]);
    ctx.emitter.instr("jal _case_abort_on_void");
    ctx.emitter.instr(&format!("j {}", end_label));
    ctx.frame.depth_bytes = pre_abort_depth;

    ctx.emitter.label(&no_match_label);
    ctx.emitter.instr(&format!("mv {}, {}", RESULT, SELF_REG));
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    ctx.emitter.instr(&format!("la {}, {}", TEMP_REGISTERS[2], ctx.file_name_label));
    ctx.frame.push_register(ctx.emitter, TEMP_REGISTERS[2]);
    ctx.emitter.instr(&format!("la {}, {}", TEMP_REGISTERS[2], line_label));
    ctx.frame.push_register(ctx.emitter, TEMP_REGISTERS[2]);
    ctx.emitter.instr(&format!("la {}, class_nameTab", TEMP_REGISTERS[2]));
    ctx.emitter.instr(&format!("slli {}, {}, 2", TEMP_REGISTERS[3], TEMP_REGISTERS[1]));
    ctx.emitter.instr(&format!("add {}, {}, {}", TEMP_REGISTERS[2], TEMP_REGISTERS[2], TEMP_REGISTERS[3]));
    ctx.emitter.instr(&format!("lw {}, 0({})", TEMP_REGISTERS[2], TEMP_REGISTERS[2]));
    ctx.frame.push_register(ctx.emitter, TEMP_REGISTERS[2]);
    ctx.emitter.instr("jal _case_abort_no_match");
    ctx.emitter.instr(&format!("j {}", end_label));
    ctx.frame.depth_bytes = pre_abort_depth;

    ctx.emitter.label(&end_label);
}

fn ancestor_depth(table: &ClassTable, class_name: &str) -> u32 {
    let mut depth = 0;
    let mut current = table.get(class_name).and_then(|r| r.parent.clone());
    while let Some(p) = current {
        depth += 1;
        current = table.get(&p).and_then(|r| r.parent.clone());
    }
    depth
}

fn emit_new_object(ty: &str, ctx: &mut ExprContext) {
    if ty != SELF_TYPE {
        ctx.emitter.instr(&format!("la {}, {}_protObj", RESULT, ty));
        emit_call(ctx, "Object.copy");
        emit_call(ctx, &format!("{}_init", ty));
        return;
    }
    ctx.emitter.comment("new SELF_TYPE: look the actual class up in class_objTab by self's tag");
    ctx.emitter.instr(&format!("lw {}, 0({})", TEMP_REGISTERS[0], SELF_REG));
    ctx.emitter.instr(&format!("li {}, 8", TEMP_REGISTERS[1]));
    ctx.emitter.instr(&format!("mul {}, {}, {}", TEMP_REGISTERS[0], TEMP_REGISTERS[0], TEMP_REGISTERS[1]));
    ctx.emitter.instr(&format!("la {}, class_objTab", TEMP_REGISTERS[1]));
    ctx.emitter.instr(&format!("add {}, {}, {}", TEMP_REGISTERS[1], TEMP_REGISTERS[1], TEMP_REGISTERS[0]));
    ctx.emitter.instr(&format!("lw {}, 4({})", TEMP_REGISTERS[2], TEMP_REGISTERS[1]));
    let init_offset = ctx.frame.push_register(ctx.emitter, TEMP_REGISTERS[2]);
    ctx.emitter.instr(&format!("lw {}, 0({})", RESULT, TEMP_REGISTERS[1]));
    emit_call(ctx, "Object.copy");
    ctx.emitter.instr(&format!("lw {}, {}({})", TEMP_REGISTERS[2], init_offset, FRAME_POINTER));
    ctx.frame.pop_words(ctx.emitter, 1);
    emit_call_indirect(ctx, TEMP_REGISTERS[2]);
}

/// Implicit-self dispatch (a bare `f(args)`): the receiver is always `self`,
/// which lives in the callee-saved `s1` and survives argument evaluation
/// untouched, so there's nothing to push and reload for it. The control
/// link is pushed before any argument, and arguments are pushed
/// right-to-left so the first declared formal ends up closest to the
/// callee's `fp` (see `formal_offset`).
fn emit_dispatch_implicit(lookup_class: &str, name: &str, args: &[TypedExpr], ctx: &mut ExprContext) {
    let n = args.len();
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    for arg in args.iter().rev() {
        emit_expr(arg, ctx);
        ctx.frame.push_register(ctx.emitter, RESULT);
    }
    ctx.emitter.instr(&format!("mv {}, {}", RESULT, SELF_REG));
    emit_dispatch_through_vtable(lookup_class, name, ctx);
    // The callee's epilogue already walked `sp` back past the control link
    // and every argument; nothing physically remains to pop here.
    ctx.frame.forget_words((n + 1) as i32);
}

/// Explicit-receiver dispatch (`e.f(args)`): the receiver's value is
/// already in `a0` on entry; it's pushed before the control link (which
/// would otherwise clobber it) and reloaded right before the call.
fn emit_dispatch_explicit(lookup_class: &str, name: &str, args: &[TypedExpr], ctx: &mut ExprContext) {
    let n = args.len();
    let receiver_offset = ctx.frame.push_register(ctx.emitter, RESULT);
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    for arg in args.iter().rev() {
        emit_expr(arg, ctx);
        ctx.frame.push_register(ctx.emitter, RESULT);
    }
    ctx.emitter.instr(&format!("lw {}, {}({})", RESULT, receiver_offset, FRAME_POINTER));
    emit_dispatch_through_vtable(lookup_class, name, ctx);
    // The callee's epilogue already walked `sp` back past the control link
    // and every argument, leaving only the saved receiver still pushed.
    ctx.frame.forget_words((n + 1) as i32);
    ctx.frame.pop_words(ctx.emitter, 1);
}

/// The control link and every argument are already on the stack by the
/// time this runs (pushed by the caller in the right order); all that's
/// left is the vtable lookup and the indirect jump.
fn emit_dispatch_through_vtable(lookup_class: &str, name: &str, ctx: &mut ExprContext) {
    let record = ctx.table.get(lookup_class).expect("dispatch target resolved by the type checker");
    let method = record.methods.iter().find(|m| m.name == name).expect("method resolved by the type checker");
    ctx.emitter.instr(&format!("lw {}, 8({})", TEMP_REGISTERS[0], RESULT));
    ctx.emitter.instr(&format!("lw {}, {}({})", TEMP_REGISTERS[0], method.dispatch_index * 4, TEMP_REGISTERS[0]));
    ctx.emitter.instr(&format!("jalr ra, {}, 0", TEMP_REGISTERS[0]));
}

fn emit_dispatch_static(dispatch_type: &str, name: &str, args: &[TypedExpr], ctx: &mut ExprContext) {
    let n = args.len();
    let receiver_offset = ctx.frame.push_register(ctx.emitter, RESULT);
    ctx.frame.push_register(ctx.emitter, FRAME_POINTER);
    for arg in args.iter().rev() {
        emit_expr(arg, ctx);
        ctx.frame.push_register(ctx.emitter, RESULT);
    }
    ctx.emitter.instr(&format!("lw {}, {}({})", RESULT, receiver_offset, FRAME_POINTER));

    let record = ctx.table.get(dispatch_type).expect("static dispatch target resolved by the type checker");
    let method = record.methods.iter().find(|m| m.name == name).expect("method resolved by the type checker");
    ctx.emitter.instr(&format!("jal {}.{}", method.defining_class, name));
    // The callee's epilogue already walked `sp` back past the control link
    // and every argument, leaving only the saved receiver still pushed.
    ctx.frame.forget_words((n + 1) as i32);
    ctx.frame.pop_words(ctx.emitter, 1);
}
