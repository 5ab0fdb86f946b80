//! Low-level assembly text assembly and the register/frame conventions
//! every higher-level emitter function builds on.

use std::collections::HashMap;

/// Holds the method result and the current receiver across an entire
/// method body; never spilled, restored by the caller's own prologue.
pub const RESULT: &str = "a0";
pub const SELF_REG: &str = "s1";
/// Transient scratch for a raw unboxed value that must survive a call (e.g.
/// `Object.copy`, whose result clobbers every temp register); never spilled
/// by this compiler's own prologue/epilogue since nothing holds it across
/// one of *our* method calls.
pub const VALUE_REG: &str = "s2";
pub const FRAME_POINTER: &str = "fp";
pub const STACK_POINTER: &str = "sp";
pub const RETURN_ADDR: &str = "ra";
pub const ZERO: &str = "zero";
pub const WORD: i32 = 4;

/// Scratch registers available to expression emission; none of them
/// survive a method call, so nothing here is live across a dispatch.
pub const TEMP_REGISTERS: [&str; 7] = ["t0", "t1", "t2", "t3", "t4", "t5", "t6"];

/// Word offset, from the start of any object, of its own payload — for
/// `Int`/`Bool` the raw value, for `String` the length pointer's successor.
pub const OBJECT_HEADER_WORDS: i32 = 3;

#[derive(Default)]
pub struct Emitter {
    buf: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&mut self, name: &str) {
        self.buf.push_str(name);
        self.buf.push_str(":\n");
    }

    pub fn directive(&mut self, text: &str) {
        self.buf.push('\t');
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn instr(&mut self, text: &str) {
        self.buf.push('\t');
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn comment(&mut self, text: &str) {
        self.buf.push_str("\t# ");
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// Per-method activation record: tracks where each visible local (formal,
/// let-binding or case-arm binding) lives relative to `fp`, plus how many
/// bytes of the frame are currently in use so pushes and pops stay balanced.
pub struct Frame {
    scopes: Vec<HashMap<String, i32>>,
    pub depth_bytes: i32,
    label_counter: u32,
}

impl Frame {
    /// `ra` and the caller's `fp` are pushed before the body starts
    /// executing, so the frame begins 8 bytes deep.
    pub fn new() -> Self {
        Frame {
            scopes: vec![HashMap::new()],
            depth_bytes: 8,
            label_counter: 0,
        }
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn end_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn bind_var(&mut self, name: &str, offset: i32) {
        self.scopes.last_mut().expect("scope stack never empty").insert(name.to_string(), offset);
    }

    pub fn lookup_var(&self, name: &str) -> Option<i32> {
        for scope in self.scopes.iter().rev() {
            if let Some(&offset) = scope.get(name) {
                return Some(offset);
            }
        }
        None
    }

    /// Pushes `reg` onto the stack and returns its new offset from `fp`.
    pub fn push_register(&mut self, emitter: &mut Emitter, reg: &str) -> i32 {
        emitter.instr(&format!("addi {}, {}, -{}", STACK_POINTER, STACK_POINTER, WORD));
        emitter.instr(&format!("sw {}, 0({})", reg, STACK_POINTER));
        let offset = -self.depth_bytes;
        self.depth_bytes += WORD;
        offset
    }

    pub fn pop_words(&mut self, emitter: &mut Emitter, count: i32) {
        if count == 0 {
            return;
        }
        emitter.instr(&format!("addi {}, {}, {}", STACK_POINTER, STACK_POINTER, count * WORD));
        self.depth_bytes -= count * WORD;
    }

    /// A call's own epilogue already walks `sp` back up past its control
    /// link and every argument before it returns (see `emit_epilogue`), so
    /// the caller must not emit a second `addi` to drop those same words —
    /// doing so leaves `sp` one word too high for the rest of the frame.
    /// This only corrects the depth tracker to match what the callee's
    /// epilogue already did physically.
    pub fn forget_words(&mut self, count: i32) {
        self.depth_bytes -= count * WORD;
    }

    pub fn fresh_label(&mut self, hint: &str) -> String {
        self.label_counter += 1;
        format!("{}_{}", hint, self.label_counter)
    }
}

/// The caller pushes the control link, then `arg{N-1}, ..., arg1, arg0`
/// (right-to-left), then `jal`s; the callee's `fp` ends up pointing one
/// word below `arg0` (the last thing pushed). So `arg0` sits at `fp+4`,
/// `arg1` at `fp+8`, and so on — `formal_offset(index)` for the formal
/// declared at position `index` (0-based, left-to-right).
pub fn formal_offset(index: usize) -> i32 {
    WORD * (index as i32 + 1)
}
