//! Feature collector.
//!
//! Builds the per-class attribute/method records from the parse tree,
//! diagnosing duplicate features, undefined argument types, signature
//! mismatches on override, and attribute redefinition. Method bodies and
//! attribute initialisers are recorded but not type-checked here — that's
//! [`crate::typecheck`]'s job.

use std::collections::{HashMap, HashSet};

use crate::ast::{Formal, ParsedExpr, ParsedFeature};
use crate::builtins::{builtin_classes, BUILTIN_CLASS_NAMES};
use crate::diagnostics::Diagnostics;
use crate::hierarchy::ClassGraph;

#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    pub declared_type: String,
    pub init: Option<ParsedExpr>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub formals: Vec<Formal>,
    pub return_type: String,
    /// `None` for the built-in classes that define methods — their bodies
    /// live in the runtime, not in user source.
    pub body: Option<ParsedExpr>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<String>,
    pub attributes: Vec<AttributeDef>,
    pub methods: Vec<MethodDef>,
    pub line: u32,
}

pub fn collect_features(
    graph: &ClassGraph,
    diags: &mut Diagnostics,
) -> HashMap<String, ClassDef> {
    let mut classes: HashMap<String, ClassDef> = HashMap::new();

    for b in builtin_classes() {
        classes.insert(
            b.name.to_string(),
            ClassDef {
                name: b.name.to_string(),
                parent: b.parent.map(|s| s.to_string()),
                attributes: Vec::new(),
                methods: b
                    .methods
                    .iter()
                    .map(|m| MethodDef {
                        name: m.name.to_string(),
                        formals: m.formal_list(),
                        return_type: m.return_type.to_string(),
                        body: None,
                        line: 0,
                    })
                    .collect(),
                line: 0,
            },
        );
    }

    for name in &graph.user_order {
        let parsed = &graph.user_classes[name];
        let mut attributes = Vec::new();
        let mut methods = Vec::new();
        let mut seen_attrs: HashSet<String> = HashSet::new();
        let mut seen_methods: HashSet<String> = HashSet::new();

        for feature in &parsed.features {
            match feature {
                ParsedFeature::Attribute {
                    name: fname,
                    declared_type,
                    init,
                    line,
                } => {
                    if !seen_attrs.insert(fname.clone()) {
                        diags.push(*line, format!("Attribute {} is multiply defined in class", fname));
                        continue;
                    }
                    if fname == "self" {
                        diags.push(*line, "'self' cannot be the name of an attribute");
                        continue;
                    }
                    attributes.push(AttributeDef {
                        name: fname.clone(),
                        declared_type: declared_type.clone(),
                        init: init.clone(),
                        line: *line,
                    });
                }
                ParsedFeature::Method {
                    name: fname,
                    formals,
                    return_type,
                    body,
                    line,
                } => {
                    if !seen_methods.insert(fname.clone()) {
                        diags.push(*line, format!("Method {} is multiply defined", fname));
                        continue;
                    }
                    methods.push(MethodDef {
                        name: fname.clone(),
                        formals: formals.clone(),
                        return_type: return_type.clone(),
                        body: Some(body.clone()),
                        line: *line,
                    });
                }
            }
        }

        classes.insert(
            name.clone(),
            ClassDef {
                name: name.clone(),
                parent: Some(parsed.parent.clone().unwrap_or_else(|| "Object".to_string())),
                attributes,
                methods,
                line: parsed.line,
            },
        );
    }

    // Cross-class checks require every class to be present first.
    for name in &graph.user_order {
        check_undefined_arg_types(&classes, name, diags);
        check_attribute_redefinition(&classes, name, diags);
        check_method_override(&classes, name, diags);
    }

    classes
}

fn ancestors_nearest_first(classes: &HashMap<String, ClassDef>, name: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = classes.get(name).and_then(|c| c.parent.clone());
    let mut guard = 0;
    while let Some(p) = current {
        chain.push(p.clone());
        current = classes.get(&p).and_then(|c| c.parent.clone());
        guard += 1;
        if guard > classes.len() + 1 {
            break; // defensive: a cycle should already have been rejected upstream
        }
    }
    chain
}

fn check_undefined_arg_types(classes: &HashMap<String, ClassDef>, name: &str, diags: &mut Diagnostics) {
    let class = &classes[name];
    for method in &class.methods {
        for formal in &method.formals {
            let known = classes.contains_key(&formal.declared_type)
                || BUILTIN_CLASS_NAMES.contains(&formal.declared_type.as_str());
            if !known {
                diags.push(
                    method.line,
                    format!(
                        "Method {} in class {} declared to have an argument of type {} which is undefined",
                        method.name, name, formal.declared_type
                    ),
                );
                break;
            }
        }
    }
}

fn check_attribute_redefinition(classes: &HashMap<String, ClassDef>, name: &str, diags: &mut Diagnostics) {
    let class = &classes[name];
    let ancestors = ancestors_nearest_first(classes, name);
    for attr in &class.attributes {
        for anc in &ancestors {
            if let Some(anc_class) = classes.get(anc) {
                if let Some(_existing) = anc_class.attributes.iter().find(|a| a.name == attr.name) {
                    diags.push(
                        attr.line,
                        format!(
                            "Attribute {} in class {} redefines attribute with the same name in ancestor {}",
                            attr.name, name, anc
                        ),
                    );
                    break;
                }
            }
        }
    }
}

fn check_method_override(classes: &HashMap<String, ClassDef>, name: &str, diags: &mut Diagnostics) {
    let class = &classes[name];
    let ancestors = ancestors_nearest_first(classes, name);
    for method in &class.methods {
        for anc in &ancestors {
            let Some(anc_class) = classes.get(anc) else { continue };
            let Some(anc_method) = anc_class.methods.iter().find(|m| m.name == method.name) else {
                continue;
            };
            let types_match = method.formals.len() == anc_method.formals.len()
                && method
                    .formals
                    .iter()
                    .zip(anc_method.formals.iter())
                    .all(|(a, b)| a.declared_type == b.declared_type)
                && method.return_type == anc_method.return_type;
            if !types_match {
                diags.push(
                    method.line,
                    format!(
                        "Override for method {} in class {} has different signature than method in ancestor {}",
                        method.name, name, anc
                    ),
                );
            }
            break; // only the nearest ancestor defining this name governs the override check
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_class_graph;
    use crate::parser::Parser;

    fn collect(src: &str) -> (HashMap<String, ClassDef>, Diagnostics) {
        let mut p = Parser::new(src).unwrap();
        let program = p.parse_program().unwrap();
        let mut diags = Diagnostics::new();
        let (graph, fatal) = build_class_graph(&program, &mut diags);
        assert!(!fatal);
        let classes = collect_features(&graph, &mut diags);
        (classes, diags)
    }

    #[test]
    fn builtins_are_present_with_no_bodies() {
        let (classes, _diags) = collect("class Main { main() : Object { 0 }; };");
        let object = &classes["Object"];
        assert_eq!(object.methods.len(), 3);
        assert!(object.methods.iter().all(|m| m.body.is_none()));
    }

    #[test]
    fn flags_duplicate_method() {
        let (_classes, diags) = collect(
            "class A { f() : Int { 0 }; f() : Int { 1 }; };",
        );
        assert!(diags.located.iter().any(|d| d.message.contains("multiply defined")));
    }

    #[test]
    fn flags_override_mismatch() {
        let (_classes, diags) = collect(
            "class A { f(x : Int) : Int { x }; }; class B inherits A { f(x : Bool) : Int { 0 }; };",
        );
        assert!(diags
            .located
            .iter()
            .any(|d| d.message.contains("Override for method f in class B")));
    }

    #[test]
    fn flags_attribute_redefinition() {
        let (_classes, diags) = collect(
            "class A { x : Int; }; class B inherits A { x : Int; };",
        );
        assert!(diags.located.iter().any(|d| d.message.contains("redefines attribute")));
    }

    #[test]
    fn flags_undefined_argument_type() {
        let (_classes, diags) = collect("class A { f(x : Ghost) : Int { 0 }; };");
        assert!(diags.located.iter().any(|d| d.message.contains("which is undefined")));
    }

    #[test]
    fn accepts_clean_override() {
        let (_classes, diags) = collect(
            "class A { f(x : Int) : Int { x }; }; class B inherits A { f(x : Int) : Int { x }; };",
        );
        assert!(diags.is_empty());
    }
}
