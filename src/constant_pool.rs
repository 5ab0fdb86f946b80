//! Static-constant pool.
//!
//! Every string, integer and boolean literal used anywhere in a program —
//! plus the handful the compiler needs for its own purposes, like class
//! names and empty strings — is interned once and referenced by label.
//! Strings are deduplicated by value and labelled sequentially; integers
//! are deduplicated by value and labelled by that value directly; the two
//! booleans are singletons emitted only if actually used.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ConstantPool {
    strings: Vec<Vec<u8>>,
    string_labels: HashMap<Vec<u8>, usize>,
    ints: Vec<i32>,
    int_labels: HashMap<i32, usize>,
    true_used: bool,
    false_used: bool,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string's raw (already-unescaped) bytes; returns the label
    /// used at the use site, which points at the `String` object itself —
    /// the `.length` sub-object is an implementation detail of `flush`.
    pub fn intern_string(&mut self, value: &[u8]) -> String {
        let idx = *self.string_labels.entry(value.to_vec()).or_insert_with(|| {
            self.strings.push(value.to_vec());
            self.strings.len() - 1
        });
        format!("str_const_{}.content", idx)
    }

    /// Interns an integer value; the label encodes the value itself, so no
    /// separate sequence counter is needed.
    pub fn intern_int(&mut self, value: i32) -> String {
        let idx = *self.int_labels.entry(value).or_insert_with(|| {
            self.ints.push(value);
            self.ints.len() - 1
        });
        let _ = idx;
        int_label(value)
    }

    pub fn bool_label(&mut self, value: bool) -> &'static str {
        if value {
            self.true_used = true;
            "bool_const_true"
        } else {
            self.false_used = true;
            "bool_const_false"
        }
    }

    /// Strings in first-use order, paired with the label stem (without
    /// `.content`) and the raw bytes to emit.
    pub fn strings(&self) -> impl Iterator<Item = (String, &[u8])> + '_ {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("str_const_{}", i), s.as_slice()))
    }

    /// Integers in first-use order, paired with their label.
    pub fn ints(&self) -> impl Iterator<Item = (String, i32)> + '_ {
        self.ints.iter().map(|&v| (int_label(v), v))
    }

    pub fn true_used(&self) -> bool {
        self.true_used
    }

    pub fn false_used(&self) -> bool {
        self.false_used
    }
}

fn int_label(value: i32) -> String {
    format!("int_const_{}", value)
}

/// Escapes raw bytes back into the form a GAS `.string` directive accepts.
/// The lexer already un-escaped the literal into raw bytes as it was read;
/// this is the inverse step, applied once at pool-flush time.
pub fn escape_for_assembler_string(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &b in raw {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x08 => out.push_str("\\b"),
            0x0c => out.push_str("\\f"),
            0 => out.push_str("\\000"),
            b if b.is_ascii_graphic() || b == b' ' => out.push(b as char),
            b => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_identical_strings() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_string(b"hello");
        let b = pool.intern_string(b"hello");
        assert_eq!(a, b);
        assert_eq!(pool.strings().count(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_labels() {
        let mut pool = ConstantPool::new();
        let a = pool.intern_string(b"hello");
        let b = pool.intern_string(b"world");
        assert_ne!(a, b);
    }

    #[test]
    fn string_label_points_at_content_sub_object() {
        let mut pool = ConstantPool::new();
        let label = pool.intern_string(b"hi");
        assert_eq!(label, "str_const_0.content");
    }

    #[test]
    fn int_label_encodes_the_value() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.intern_int(42), "int_const_42");
        assert_eq!(pool.intern_int(0), "int_const_0");
    }

    #[test]
    fn bool_labels_are_fixed_and_track_usage() {
        let mut pool = ConstantPool::new();
        assert!(!pool.true_used());
        assert_eq!(pool.bool_label(true), "bool_const_true");
        assert!(pool.true_used());
        assert!(!pool.false_used());
    }

    #[test]
    fn escape_quotes_and_backslashes() {
        let escaped = escape_for_assembler_string(b"say \"hi\"\\done");
        assert!(escaped.contains("\\\""));
        assert!(escaped.contains("\\\\"));
    }
}
