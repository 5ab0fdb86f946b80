//! Class collector and hierarchy validator.
//!
//! Registers every class (built-in and user-defined) and its parent, then
//! walks the resulting graph with a path-indexed DFS: a vertex seen twice
//! within the current path closes a cycle, and every participant is marked
//! globally seen so each cycle is reported exactly once even when several
//! classes funnel into it.

use std::collections::{HashMap, HashSet};

use crate::ast::{ParsedClass, ParsedProgram};
use crate::builtins::{builtin_classes, BUILTIN_CLASS_NAMES, FORBIDDEN_PARENTS};
use crate::diagnostics::Diagnostics;

/// Class registrations after redefinition-of-builtin checking: the parent
/// map (every class, user and built-in, maps to its parent name; `Object`
/// has no entry), the source-order list of user class names, and the
/// parsed class bodies for the feature collector to walk.
pub struct ClassGraph {
    pub parent_of: HashMap<String, String>,
    pub user_order: Vec<String>,
    pub user_classes: HashMap<String, ParsedClass>,
}

/// Returns the graph plus whether a fatal hierarchy error (a cycle) was
/// found; a cycle means later passes are skipped entirely.
pub fn build_class_graph(program: &ParsedProgram, diags: &mut Diagnostics) -> (ClassGraph, bool) {
    let mut parent_of = HashMap::new();
    for b in builtin_classes() {
        if let Some(p) = b.parent {
            parent_of.insert(b.name.to_string(), p.to_string());
        }
    }

    let mut user_order = Vec::new();
    let mut user_classes = HashMap::new();

    for class in &program.classes {
        if BUILTIN_CLASS_NAMES.contains(&class.name.as_str()) {
            diags.push(class.line, format!("Redefinition of basic class {}", class.name));
            continue;
        }
        if user_classes.contains_key(&class.name) {
            diags.push(class.line, format!("Class {} was previously defined", class.name));
            continue;
        }
        let parent = class.parent.clone().unwrap_or_else(|| "Object".to_string());
        parent_of.insert(class.name.clone(), parent);
        user_order.push(class.name.clone());
        user_classes.insert(class.name.clone(), class.clone());
    }

    let graph = ClassGraph {
        parent_of,
        user_order,
        user_classes,
    };

    let cycles = detect_cycles(&graph.parent_of, &graph.user_order);
    let has_cycle = !cycles.is_empty();
    if has_cycle {
        diags.push_freeform(format_cycle_report(&cycles));
    }

    detect_undefined_and_forbidden_parents(&graph, diags);

    (graph, has_cycle)
}

/// Path-indexed DFS: walk each class's parent chain; a vertex seen twice
/// within the current path closes a cycle, whose members are removed from
/// further consideration so each cycle is reported exactly once.
fn detect_cycles(parent_of: &HashMap<String, String>, user_order: &[String]) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut globally_visited: HashSet<String> = HashSet::new();
    let mut loop_members: HashSet<String> = HashSet::new();

    for start in user_order {
        if globally_visited.contains(start) {
            continue;
        }
        let mut index_in_path: HashMap<String, usize> = HashMap::new();
        let mut path: Vec<String> = Vec::new();
        let mut current = start.clone();

        while let Some(parent) = parent_of.get(&current) {
            if let Some(&idx) = index_in_path.get(&current) {
                let mut already_in = false;
                let mut cycle = Vec::new();
                for name in &path[idx..] {
                    if loop_members.contains(name) {
                        already_in = true;
                        break;
                    }
                    cycle.push(name.clone());
                    loop_members.insert(name.clone());
                }
                if !already_in {
                    cycles.push(cycle);
                }
                break;
            }
            index_in_path.insert(current.clone(), path.len());
            path.push(current.clone());
            globally_visited.insert(current.clone());
            current = parent.clone();
        }
    }

    cycles
}

fn format_cycle_report(cycles: &[Vec<String>]) -> String {
    let mut out = format!("Detected {} loops in the type hierarchy:\n", cycles.len());
    for (i, cycle) in cycles.iter().enumerate() {
        out.push_str(&format!("{}) ", i + 1));
        for name in cycle {
            out.push_str(name);
            out.push_str(" <- ");
        }
        out.push('\n');
    }
    out
}

fn detect_undefined_and_forbidden_parents(graph: &ClassGraph, diags: &mut Diagnostics) {
    let mut globally_visited: HashSet<String> = HashSet::new();

    for class_name in &graph.user_order {
        let mut current = class_name.clone();
        let class_line = graph.user_classes.get(class_name).map(|c| c.line).unwrap_or(0);

        while let Some(parent) = graph.parent_of.get(&current) {
            if globally_visited.contains(&current) {
                break;
            }
            let is_builtin = BUILTIN_CLASS_NAMES.contains(&parent.as_str());
            if !graph.user_classes.contains_key(parent) && !is_builtin {
                diags.push(
                    class_line,
                    format!("Class {} inherits from an undefined class {}", current, parent),
                );
            }
            if FORBIDDEN_PARENTS.contains(&parent.as_str()) {
                diags.push(
                    class_line,
                    format!("Class {} cannot inherit class {}", current, parent),
                );
            }
            globally_visited.insert(current.clone());
            current = parent.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn graph_for(src: &str) -> (ClassGraph, bool, Diagnostics) {
        let mut p = Parser::new(src).unwrap();
        let program = p.parse_program().unwrap();
        let mut diags = Diagnostics::new();
        let (graph, fatal) = build_class_graph(&program, &mut diags);
        (graph, fatal, diags)
    }

    #[test]
    fn defaults_missing_inherits_to_object() {
        let (graph, fatal, diags) = graph_for("class A {};");
        assert!(!fatal);
        assert!(diags.is_empty());
        assert_eq!(graph.parent_of.get("A"), Some(&"Object".to_string()));
    }

    #[test]
    fn detects_two_class_cycle() {
        let (_graph, fatal, diags) =
            graph_for("class A inherits B {}; class B inherits A {};");
        assert!(fatal);
        assert_eq!(diags.freeform.len(), 1);
        assert!(diags.freeform[0].0.starts_with("Detected 1 loops"));
    }

    #[test]
    fn rejects_builtin_redefinition() {
        let (_graph, _fatal, diags) = graph_for("class Int {};");
        assert_eq!(diags.located.len(), 1);
        assert!(diags.located[0].message.contains("Redefinition"));
    }

    #[test]
    fn rejects_inheriting_from_int() {
        let (_graph, _fatal, diags) = graph_for("class A inherits Int {};");
        assert!(diags.located.iter().any(|d| d.message.contains("cannot inherit")));
    }

    #[test]
    fn rejects_undefined_parent() {
        let (_graph, _fatal, diags) = graph_for("class A inherits Ghost {};");
        assert!(diags
            .located
            .iter()
            .any(|d| d.message.contains("undefined class Ghost")));
    }
}
