//! Top-level code generator.
//!
//! Ties the per-expression emitter ([`expr`]) to the class table and
//! produces a complete assembly file: method bodies and a single
//! infinite-loop label under `.text`, then every data table — class names,
//! prototypes, dispatch tables, per-class `_init` routines, the class-object
//! table, and the static-constant pool — under `.data`.

pub mod emitter;
pub mod expr;

use std::collections::HashMap;

use crate::class_table::ClassTable;
use crate::constant_pool::{escape_for_assembler_string, ConstantPool};
use crate::typecheck::TypedClass;

use emitter::{Emitter, Frame, FRAME_POINTER, RESULT, SELF_REG};
use expr::ExprContext;

/// Classes whose prototype layout isn't driven by [`ClassRecord::attributes`]
/// — their one payload word (or, for `String`, length pointer + bytes) is
/// runtime machinery rather than a COOL-level attribute.
const BUILTIN_TAGS_WITH_GLOBAL_DISPTAB: [&str; 5] = ["Object", "IO", "Int", "Bool", "String"];

/// Generates the complete `.s` file for a fully checked program.
pub fn generate(table: &ClassTable, typed_classes: &HashMap<String, TypedClass>, source_file: &str) -> String {
    let mut out = Emitter::new();
    let mut pool = ConstantPool::new();

    // The class-name table is just an array of interned-string labels, so
    // intern every class's name up front; the pool is flushed once at the
    // very end, after everything else has had a chance to intern its own
    // strings, ints and bools too.
    let name_labels: HashMap<String, String> = table
        .tag_order
        .iter()
        .map(|name| (name.clone(), pool.intern_string(name.as_bytes())))
        .collect();
    let file_name_label = pool.intern_string(source_file.as_bytes());
    let empty_string_length_label = pool.intern_string(b"").replace(".content", ".length");
    let zero_int_label = pool.intern_int(0);
    let false_bool_label = pool.bool_label(false);

    out.directive(".text");
    out.label("_halt_loop");
    out.comment("runtime error stubs jump here after reporting; never returns");
    out.instr("j _halt_loop");

    emit_method_bodies(&mut out, table, typed_classes, &mut pool, &file_name_label);

    out.blank();
    out.directive(".data");
    out.directive(".align 2");

    emit_name_table(&mut out, table, &name_labels);
    emit_prototype_tables(&mut out, table, &mut pool, &empty_string_length_label, &zero_int_label, &false_bool_label);
    emit_dispatch_tables(&mut out, table);
    emit_init_methods(&mut out, table, typed_classes, &mut pool, &file_name_label);
    emit_class_object_table(&mut out, table);
    emit_constant_pool(&mut out, &pool, table);

    out.finish()
}

fn emit_name_table(out: &mut Emitter, table: &ClassTable, name_labels: &HashMap<String, String>) {
    out.blank();
    out.directive(".globl class_nameTab");
    out.label("class_nameTab");
    for name in &table.tag_order {
        out.directive(&format!(".word {}", name_labels[name]));
    }
}

/// `size`, `value`/length-pointer defaults for the five runtime-known
/// classes; every other class's prototype is built generically from its
/// resolved attribute list.
fn emit_prototype_tables(
    out: &mut Emitter,
    table: &ClassTable,
    pool: &mut ConstantPool,
    empty_string_length_label: &str,
    zero_int_label: &str,
    false_bool_label: &str,
) {
    for name in &table.tag_order {
        let record = table.get(name).expect("tag_order entries are always in the table");
        out.blank();
        if BUILTIN_TAGS_WITH_GLOBAL_DISPTAB.contains(&name.as_str()) {
            out.directive(&format!(".globl {}_protObj", name));
        }
        out.directive(".word -1");
        out.label(&format!("{}_protObj", name));
        out.directive(&format!(".word {}", record.tag));

        match name.as_str() {
            "Object" | "IO" => {
                out.directive(&format!(".word {}", record.size_words()));
                out.directive(&format!(".word {}_dispTab", name));
            }
            "Int" | "Bool" => {
                // header (3) + one value word, initialised to the type's default.
                out.directive(".word 4");
                out.directive(&format!(".word {}_dispTab", name));
                let default = if name == "Int" { zero_int_label.to_string() } else { false_bool_label.to_string() };
                out.directive(&format!(".word {}", default));
            }
            "String" => {
                // header (3) + length-pointer word + one word of empty payload.
                out.directive(".word 5");
                out.directive(&format!(".word {}_dispTab", name));
                out.directive(&format!(".word {}", empty_string_length_label));
            }
            _ => {
                out.directive(&format!(".word {}", record.size_words()));
                out.directive(&format!(".word {}_dispTab", name));
                for attr in &record.attributes {
                    out.directive(&format!(".word {}", prototype_default_word(&attr.declared_type, pool)));
                }
            }
        }
    }
}

/// The literal (or `0` for void) an attribute's slot holds in a freshly
/// copied prototype, before `_init` runs its initialiser expression.
fn prototype_default_word(declared_type: &str, pool: &mut ConstantPool) -> String {
    match declared_type {
        "Int" => pool.intern_int(0),
        "Bool" => pool.bool_label(false).to_string(),
        "String" => pool.intern_string(b""),
        _ => "0".to_string(),
    }
}

fn emit_dispatch_tables(out: &mut Emitter, table: &ClassTable) {
    for name in &table.tag_order {
        let record = table.get(name).expect("tag_order entries are always in the table");
        out.blank();
        if BUILTIN_TAGS_WITH_GLOBAL_DISPTAB.contains(&name.as_str()) {
            out.directive(&format!(".globl {}_dispTab", name));
        }
        out.label(&format!("{}_dispTab", name));
        for method in &record.methods {
            out.directive(&format!(".word {}.{}", method.defining_class, method.name));
        }
    }
}

fn emit_class_object_table(out: &mut Emitter, table: &ClassTable) {
    out.blank();
    out.directive(".globl class_objTab");
    out.label("class_objTab");
    for name in &table.tag_order {
        out.directive(&format!(".word {}_protObj", name));
        out.directive(&format!(".word {}_init", name));
    }
}

fn emit_constant_pool(out: &mut Emitter, pool: &ConstantPool, table: &ClassTable) {
    let int_tag = table.get("Int").expect("Int is always in the table").tag;
    let bool_tag = table.get("Bool").expect("Bool is always in the table").tag;
    let string_tag = table.get("String").expect("String is always in the table").tag;

    out.blank();
    for (stem, bytes) in pool.strings() {
        emit_string_object(out, &stem, bytes, int_tag, string_tag);
    }
    if pool.true_used() {
        out.blank();
        out.label("bool_const_true");
        out.directive(".word -1");
        out.directive(&format!(".word {}", bool_tag));
        out.directive(".word 4");
        out.directive(".word Bool_dispTab");
        out.directive(".word 1");
    }
    if pool.false_used() {
        out.blank();
        out.label("bool_const_false");
        out.directive(".word -1");
        out.directive(&format!(".word {}", bool_tag));
        out.directive(".word 4");
        out.directive(".word Bool_dispTab");
        out.directive(".word 0");
    }
    for (label, value) in pool.ints() {
        out.blank();
        out.label(&label);
        out.directive(".word -1");
        out.directive(&format!(".word {}", int_tag));
        out.directive(".word 4");
        out.directive(".word Int_dispTab");
        out.directive(&format!(".word {}", value));
    }
}

/// A string constant is two objects: an `Int` holding its length, and the
/// `String` itself (pointing at that length object) with its bytes packed
/// word-aligned right after the header.
fn emit_string_object(out: &mut Emitter, stem: &str, bytes: &[u8], int_tag: u32, string_tag: u32) {
    let len = bytes.len();
    let payload_words = (len + 4) / 4;
    let size_words = 4 + payload_words;

    out.label(&format!("{}.length", stem));
    out.directive(".word -1");
    out.directive(&format!(".word {}", int_tag));
    out.directive(".word 4");
    out.directive(".word Int_dispTab");
    out.directive(&format!(".word {}", len));

    out.directive(".word -1");
    out.label(&format!("{}.content", stem));
    out.directive(&format!(".word {}", string_tag));
    out.directive(&format!(".word {}", size_words));
    out.directive(".word String_dispTab");
    out.directive(&format!(".word {}.length", stem));
    out.directive(&format!(".string \"{}\"", escape_for_assembler_string(bytes)));
    out.directive(".align 2");
}

fn emit_method_bodies(
    out: &mut Emitter,
    table: &ClassTable,
    typed_classes: &HashMap<String, TypedClass>,
    pool: &mut ConstantPool,
    file_name_label: &str,
) {
    for name in &table.tag_order {
        let Some(typed_class) = typed_classes.get(name) else {
            continue; // built-in: method bodies live in the runtime
        };
        for method in &typed_class.methods {
            out.blank();
            out.label(&format!("{}.{}", name, method.name));
            let mut frame = Frame::new();
            emit_prologue(out);
            out.instr(&format!("mv {}, {}", SELF_REG, RESULT));

            frame.begin_scope();
            for (i, formal) in method.formals.iter().enumerate() {
                frame.bind_var(&formal.name, emitter::formal_offset(i));
            }
            let mut ctx = ExprContext {
                emitter: out,
                frame: &mut frame,
                table,
                pool,
                current_class: name.clone(),
                file_name_label: file_name_label.to_string(),
            };
            expr::emit_expr(&method.body, &mut ctx);

            emit_epilogue(out, method.formals.len());
        }
    }
}

fn emit_init_methods(
    out: &mut Emitter,
    table: &ClassTable,
    typed_classes: &HashMap<String, TypedClass>,
    pool: &mut ConstantPool,
    file_name_label: &str,
) {
    for name in &table.tag_order {
        let record = table.get(name).expect("tag_order entries are always in the table");
        out.blank();
        if BUILTIN_TAGS_WITH_GLOBAL_DISPTAB.contains(&name.as_str()) {
            out.directive(&format!(".globl {}_init", name));
        }
        out.label(&format!("{}_init", name));
        let mut frame = Frame::new();
        emit_prologue(out);
        out.instr(&format!("mv {}, {}", SELF_REG, RESULT));

        if let Some(parent) = &record.parent {
            out.instr(&format!("mv {}, {}", RESULT, SELF_REG));
            frame.push_register(out, FRAME_POINTER);
            out.instr(&format!("jal {}_init", parent));
            frame.pop_words(out, 1);
        }

        if let Some(typed_class) = typed_classes.get(name) {
            for attr in &typed_class.attributes {
                let mut ctx = ExprContext {
                    emitter: out,
                    frame: &mut frame,
                    table,
                    pool,
                    current_class: name.clone(),
                    file_name_label: file_name_label.to_string(),
                };
                match &attr.init {
                    Some(init) => expr::emit_expr(init, &mut ctx),
                    None => emit_attribute_default(&mut ctx, &attr.declared_type),
                }
                let offset = record
                    .attributes
                    .iter()
                    .find(|a| a.name == attr.name && a.defining_class == *name)
                    .expect("attribute defined in this class is in its own resolved list")
                    .offset_words
                    * 4;
                out.instr(&format!("sw {}, {}({})", RESULT, offset, SELF_REG));
            }
        }

        out.instr(&format!("mv {}, {}", RESULT, SELF_REG));
        emit_epilogue(out, 0);
    }
}

fn emit_attribute_default(ctx: &mut ExprContext, declared_type: &str) {
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
        _ => ctx.emitter.instr(&format!("mv {}, {}", RESULT, emitter::ZERO)),
    }
}

/// Saves `ra` at `fp+0` and the caller's `self` one word below; `fp` ends up
/// one word below `arg0` (see [`emitter::formal_offset`]), with one spare
/// word underneath reserved by `Frame`'s 8-byte starting depth.
fn emit_prologue(out: &mut Emitter) {
    out.instr(&format!("addi {}, {}, -8", emitter::STACK_POINTER, emitter::STACK_POINTER));
    out.instr(&format!("sw {}, 4({})", emitter::RETURN_ADDR, emitter::STACK_POINTER));
    out.instr(&format!("sw {}, 0({})", SELF_REG, emitter::STACK_POINTER));
    out.instr(&format!("addi {}, {}, 4", FRAME_POINTER, emitter::STACK_POINTER));
}

/// Restores `ra`/self, then walks `sp` up past the arguments to the
/// control-link slot, restores the caller's `fp` from it, and returns.
fn emit_epilogue(out: &mut Emitter, argc: usize) {
    out.instr(&format!("lw {}, 0({})", emitter::RETURN_ADDR, FRAME_POINTER));
    out.instr(&format!("lw {}, -4({})", SELF_REG, FRAME_POINTER));
    out.instr(&format!("mv {}, {}", emitter::STACK_POINTER, FRAME_POINTER));
    out.instr(&format!(
        "addi {}, {}, {}",
        emitter::STACK_POINTER,
        emitter::STACK_POINTER,
        emitter::WORD * (argc as i32 + 1)
    ));
    out.instr(&format!("lw {}, 0({})", FRAME_POINTER, emitter::STACK_POINTER));
    out.instr(&format!("addi {}, {}, {}", emitter::STACK_POINTER, emitter::STACK_POINTER, emitter::WORD));
    out.instr(&format!("jr {}", emitter::RETURN_ADDR));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_table::build_class_table;
    use crate::diagnostics::Diagnostics;
    use crate::features::collect_features;
    use crate::hierarchy::build_class_graph;
    use crate::parser::Parser;
    use crate::typecheck::typecheck_program;

    fn compile(src: &str) -> String {
        let mut p = Parser::new(src).unwrap();
        let program = p.parse_program().unwrap();
        let mut diags = Diagnostics::new();
        let (graph, fatal) = build_class_graph(&program, &mut diags);
        assert!(!fatal);
        let classes = collect_features(&graph, &mut diags);
        let typed = typecheck_program(&classes, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags.located);
        let table = build_class_table(&classes);
        generate(&table, &typed, "test.cl")
    }

    #[test]
    fn emits_main_method_label() {
        let asm = compile("class Main { main() : Int { 42 }; };");
        assert!(asm.contains("Main.main:"));
    }

    #[test]
    fn emits_class_name_and_object_tables() {
        let asm = compile("class Main { main() : Int { 42 }; };");
        assert!(asm.contains("class_nameTab:"));
        assert!(asm.contains("class_objTab:"));
        assert!(asm.contains("Main_protObj:"));
        assert!(asm.contains("Main_init:"));
        assert!(asm.contains("Main_dispTab:"));
    }

    #[test]
    fn user_attribute_gets_a_prototype_slot_and_init_store() {
        let asm = compile("class Main inherits IO { x : Int <- 7; main() : Int { x }; };");
        assert!(asm.contains("Main_init:"));
        assert!(asm.contains("int_const_7"));
    }

    #[test]
    fn builtin_prototypes_declared_global() {
        let asm = compile("class Main { main() : Int { 42 }; };");
        assert!(asm.contains(".globl Int_protObj"));
        assert!(asm.contains(".globl String_dispTab"));
    }

    #[test]
    fn derived_class_dispatch_table_keeps_override_slot() {
        let asm = compile(
            "class A { f() : Int { 0 }; }; class B inherits A { f() : Int { 1 }; g() : Int { f() }; }; \
             class Main { main() : Int { (new B).g() }; };",
        );
        assert!(asm.contains("B_dispTab:"));
        assert!(asm.contains(".word B.f"));
    }
}
