//! Class-table finaliser.
//!
//! Takes the per-class attribute/method records and lays them out for code
//! generation: a contiguous pre-order tag assignment (so `is_subclass_of`
//! reduces to a tag-range comparison), flattened ancestor-first attribute
//! lists with stable slot offsets, and dispatch-table method lists where an
//! override keeps its ancestor's slot index.

use std::collections::{BTreeMap, HashMap};

use crate::ast::Formal;
use crate::builtins::BUILTIN_CLASS_NAMES;
use crate::features::ClassDef;

#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    pub name: String,
    pub declared_type: String,
    /// Word offset from the start of the object, including the 3-word header.
    pub offset_words: u32,
    pub defining_class: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    pub name: String,
    pub defining_class: String,
    pub dispatch_index: u32,
    pub formals: Vec<Formal>,
    pub return_type: String,
}

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub name: String,
    pub tag: u32,
    /// Inclusive tag range spanning this class and every descendant.
    pub max_descendant_tag: u32,
    pub parent: Option<String>,
    pub attributes: Vec<ResolvedAttribute>,
    pub methods: Vec<ResolvedMethod>,
}

impl ClassRecord {
    /// Object size in words: 3-word header plus one word per attribute.
    pub fn size_words(&self) -> u32 {
        3 + self.attributes.len() as u32
    }

    pub fn is_subclass_of(&self, other: &ClassRecord) -> bool {
        self.tag >= other.tag && self.tag <= other.max_descendant_tag
    }
}

pub struct ClassTable {
    pub records: HashMap<String, ClassRecord>,
    /// Every class name in tag order, for table emission.
    pub tag_order: Vec<String>,
}

impl ClassTable {
    pub fn get(&self, name: &str) -> Option<&ClassRecord> {
        self.records.get(name)
    }
}

pub fn build_class_table(classes: &HashMap<String, ClassDef>) -> ClassTable {
    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, class) in classes {
        if let Some(parent) = &class.parent {
            children.entry(parent.clone()).or_default().push(name.clone());
        }
    }
    for kids in children.values_mut() {
        kids.sort();
    }

    let mut tag_order = Vec::new();
    let mut tags = HashMap::new();
    let mut next_tag = 0u32;
    assign_tags("Object", &children, &mut tags, &mut tag_order, &mut next_tag);

    let mut max_descendant_tag: HashMap<String, u32> = HashMap::new();
    for name in &tag_order {
        let subtree_max = subtree_max_tag(name, &children, &tags);
        max_descendant_tag.insert(name.clone(), subtree_max);
    }

    let mut records = HashMap::new();
    for name in &tag_order {
        let attributes = flatten_attributes(classes, name);
        let methods = flatten_methods(classes, name);
        records.insert(
            name.clone(),
            ClassRecord {
                name: name.clone(),
                tag: tags[name],
                max_descendant_tag: max_descendant_tag[name],
                parent: classes[name].parent.clone(),
                attributes,
                methods,
            },
        );
    }

    ClassTable { records, tag_order }
}

fn assign_tags(
    name: &str,
    children: &BTreeMap<String, Vec<String>>,
    tags: &mut HashMap<String, u32>,
    tag_order: &mut Vec<String>,
    next_tag: &mut u32,
) {
    let tag = *next_tag;
    *next_tag += 1;
    tags.insert(name.to_string(), tag);
    tag_order.push(name.to_string());
    if let Some(kids) = children.get(name) {
        for child in kids {
            assign_tags(child, children, tags, tag_order, next_tag);
        }
    }
}

fn subtree_max_tag(name: &str, children: &BTreeMap<String, Vec<String>>, tags: &HashMap<String, u32>) -> u32 {
    let mut max = tags[name];
    if let Some(kids) = children.get(name) {
        for child in kids {
            max = max.max(subtree_max_tag(child, children, tags));
        }
    }
    max
}

fn ancestor_chain_root_first(classes: &HashMap<String, ClassDef>, name: &str) -> Vec<String> {
    let mut chain = vec![name.to_string()];
    let mut current = classes[name].parent.clone();
    while let Some(p) = current {
        chain.push(p.clone());
        current = classes.get(&p).and_then(|c| c.parent.clone());
    }
    chain.reverse();
    chain
}

fn flatten_attributes(classes: &HashMap<String, ClassDef>, name: &str) -> Vec<ResolvedAttribute> {
    let mut out = Vec::new();
    for anc in ancestor_chain_root_first(classes, name) {
        for attr in &classes[&anc].attributes {
            out.push(ResolvedAttribute {
                name: attr.name.clone(),
                declared_type: attr.declared_type.clone(),
                offset_words: 3 + out.len() as u32,
                defining_class: anc.clone(),
            });
        }
    }
    out
}

fn flatten_methods(classes: &HashMap<String, ClassDef>, name: &str) -> Vec<ResolvedMethod> {
    let mut out: Vec<ResolvedMethod> = Vec::new();
    for anc in ancestor_chain_root_first(classes, name) {
        for method in &classes[&anc].methods {
            if let Some(existing) = out.iter_mut().find(|m| m.name == method.name) {
                existing.defining_class = anc.clone();
                existing.formals = method.formals.clone();
                existing.return_type = method.return_type.clone();
            } else {
                out.push(ResolvedMethod {
                    name: method.name.clone(),
                    defining_class: anc.clone(),
                    dispatch_index: out.len() as u32,
                    formals: method.formals.clone(),
                    return_type: method.return_type.clone(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::features::collect_features;
    use crate::hierarchy::build_class_graph;
    use crate::parser::Parser;

    fn table_for(src: &str) -> ClassTable {
        let mut p = Parser::new(src).unwrap();
        let program = p.parse_program().unwrap();
        let mut diags = Diagnostics::new();
        let (graph, fatal) = build_class_graph(&program, &mut diags);
        assert!(!fatal);
        let classes = collect_features(&graph, &mut diags);
        build_class_table(&classes)
    }

    #[test]
    fn object_is_tag_zero() {
        let table = table_for("class Main { main() : Object { 0 }; };");
        assert_eq!(table.get("Object").unwrap().tag, 0);
    }

    #[test]
    fn subclass_tag_falls_within_parent_range() {
        let table = table_for("class A {}; class B inherits A {}; class Main { main() : Object { 0 }; };");
        let a = table.get("A").unwrap().clone();
        let b = table.get("B").unwrap().clone();
        assert!(b.is_subclass_of(&a));
        assert!(!a.is_subclass_of(&b));
    }

    #[test]
    fn attribute_offsets_are_ancestor_first() {
        let table = table_for(
            "class A { x : Int; }; class B inherits A { y : Int; }; class Main { main() : Object { 0 }; };",
        );
        let b = table.get("B").unwrap();
        assert_eq!(b.attributes.len(), 2);
        assert_eq!(b.attributes[0].name, "x");
        assert_eq!(b.attributes[0].offset_words, 3);
        assert_eq!(b.attributes[1].name, "y");
        assert_eq!(b.attributes[1].offset_words, 4);
    }

    #[test]
    fn override_keeps_dispatch_index() {
        let table = table_for(
            "class A { f() : Int { 0 }; }; class B inherits A { f() : Int { 1 }; }; class Main { main() : Object { 0 }; };",
        );
        let a_index = table.get("A").unwrap().methods.iter().find(|m| m.name == "f").unwrap().dispatch_index;
        let b_method = table.get("B").unwrap().methods.iter().find(|m| m.name == "f").unwrap();
        assert_eq!(b_method.dispatch_index, a_index);
        assert_eq!(b_method.defining_class, "B");
    }
}
