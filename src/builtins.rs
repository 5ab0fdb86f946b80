//! Fixed shape of the five pre-registered built-in classes.
//!
//! Bodies of built-in methods live in the runtime, not here; this module
//! only needs their name, parent, and method signatures so the feature
//! collector and type checker can validate user overrides against them.

use crate::ast::Formal;

pub struct BuiltinMethod {
    pub name: &'static str,
    pub formals: &'static [(&'static str, &'static str)],
    pub return_type: &'static str,
}

pub struct BuiltinClass {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub methods: &'static [BuiltinMethod],
}

pub const OBJECT_METHODS: &[BuiltinMethod] = &[
    BuiltinMethod {
        name: "abort",
        formals: &[],
        return_type: "Object",
    },
    BuiltinMethod {
        name: "type_name",
        formals: &[],
        return_type: "String",
    },
    BuiltinMethod {
        name: "copy",
        formals: &[],
        return_type: "SELF_TYPE",
    },
];

pub const IO_METHODS: &[BuiltinMethod] = &[
    BuiltinMethod {
        name: "out_string",
        formals: &[("x", "String")],
        return_type: "SELF_TYPE",
    },
    BuiltinMethod {
        name: "out_int",
        formals: &[("x", "Int")],
        return_type: "SELF_TYPE",
    },
    BuiltinMethod {
        name: "in_string",
        formals: &[],
        return_type: "String",
    },
    BuiltinMethod {
        name: "in_int",
        formals: &[],
        return_type: "Int",
    },
];

pub const STRING_METHODS: &[BuiltinMethod] = &[
    BuiltinMethod {
        name: "length",
        formals: &[],
        return_type: "Int",
    },
    BuiltinMethod {
        name: "concat",
        formals: &[("s", "String")],
        return_type: "String",
    },
    BuiltinMethod {
        name: "substr",
        formals: &[("i", "Int"), ("l", "Int")],
        return_type: "String",
    },
];

/// Names that may never be used as a user class name or as the target of
/// `inherits` save for `Object`/`IO`.
pub const BUILTIN_CLASS_NAMES: &[&str] = &["Object", "IO", "Int", "Bool", "String"];

/// The three primitive classes a user class may never inherit from.
pub const FORBIDDEN_PARENTS: &[&str] = &["Int", "Bool", "String"];

pub fn builtin_classes() -> [BuiltinClass; 5] {
    [
        BuiltinClass {
            name: "Object",
            parent: None,
            methods: OBJECT_METHODS,
        },
        BuiltinClass {
            name: "IO",
            parent: Some("Object"),
            methods: IO_METHODS,
        },
        BuiltinClass {
            name: "Int",
            parent: Some("Object"),
            methods: &[],
        },
        BuiltinClass {
            name: "Bool",
            parent: Some("Object"),
            methods: &[],
        },
        BuiltinClass {
            name: "String",
            parent: Some("Object"),
            methods: STRING_METHODS,
        },
    ]
}

impl BuiltinMethod {
    pub fn formal_list(&self) -> Vec<Formal> {
        self.formals
            .iter()
            .map(|(n, t)| Formal {
                name: n.to_string(),
                declared_type: t.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_has_three_methods() {
        assert_eq!(OBJECT_METHODS.len(), 3);
    }

    #[test]
    fn builtin_classes_are_five() {
        assert_eq!(builtin_classes().len(), 5);
    }

    #[test]
    fn int_bool_have_no_methods() {
        let classes = builtin_classes();
        let int_class = classes.iter().find(|c| c.name == "Int").unwrap();
        assert!(int_class.methods.is_empty());
    }
}
