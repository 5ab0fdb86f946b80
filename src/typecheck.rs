//! Typed AST and type checker.
//!
//! Walks the parse tree class by class, resolving every subexpression's
//! static type under COOL's subtyping rules (including `SELF_TYPE`), and
//! produces a [`TypedExpr`] tree the code generator can read types off of
//! without re-deriving them. Type errors never abort the pass: an
//! ill-typed subexpression is given the poison type, which is considered
//! compatible with everything so a single mistake doesn't cascade into a
//! wall of unrelated-looking errors.

use std::collections::HashMap;

use crate::ast::{ArithOp, CaseBranch, CompareOp, Formal, LetBinding, ParsedExpr};
use crate::diagnostics::Diagnostics;
use crate::features::ClassDef;

/// Stands in for "couldn't be typed"; compatible with every other type in
/// both subtyping directions so one error doesn't trigger a dozen more.
pub const POISON: &str = "#error";
pub const SELF_TYPE: &str = "SELF_TYPE";

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub static_type: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    IntConstant(i32),
    BoolConstant(bool),
    StringConstant(Vec<u8>),
    ObjectReference(String),
    Assignment(String, Box<TypedExpr>),
    Sequence(Vec<TypedExpr>),
    IfThenElseFi {
        cond: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Box<TypedExpr>,
    },
    WhileLoopPool {
        cond: Box<TypedExpr>,
        body: Box<TypedExpr>,
    },
    LetIn {
        bindings: Vec<TypedLetBinding>,
        body: Box<TypedExpr>,
    },
    CaseOfEsac {
        subject: Box<TypedExpr>,
        arms: Vec<TypedCaseBranch>,
    },
    NewObject(String),
    IsVoid(Box<TypedExpr>),
    IntegerNegation(Box<TypedExpr>),
    BooleanNegation(Box<TypedExpr>),
    Arithmetic(ArithOp, Box<TypedExpr>, Box<TypedExpr>),
    IntegerComparison(CompareOp, Box<TypedExpr>, Box<TypedExpr>),
    EqualityComparison(Box<TypedExpr>, Box<TypedExpr>),
    MethodInvocation {
        name: String,
        args: Vec<TypedExpr>,
    },
    DynamicDispatch {
        target: Box<TypedExpr>,
        name: String,
        args: Vec<TypedExpr>,
    },
    StaticDispatch {
        target: Box<TypedExpr>,
        dispatch_type: String,
        name: String,
        args: Vec<TypedExpr>,
    },
    ParenthesizedExpr(Box<TypedExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedLetBinding {
    pub name: String,
    pub declared_type: String,
    pub init: Option<Box<TypedExpr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedCaseBranch {
    pub name: String,
    pub declared_type: String,
    pub body: Box<TypedExpr>,
}

#[derive(Debug, Clone)]
pub struct TypedAttribute {
    pub name: String,
    pub declared_type: String,
    pub init: Option<TypedExpr>,
}

#[derive(Debug, Clone)]
pub struct TypedMethod {
    pub name: String,
    pub formals: Vec<Formal>,
    pub return_type: String,
    pub body: TypedExpr,
}

#[derive(Debug, Clone)]
pub struct TypedClass {
    pub name: String,
    pub attributes: Vec<TypedAttribute>,
    pub methods: Vec<TypedMethod>,
}

/// `A <= B` for two concrete class names, walking `A`'s ancestor chain.
fn is_ancestor(classes: &HashMap<String, ClassDef>, descendant: &str, ancestor: &str) -> bool {
    if descendant == ancestor {
        return true;
    }
    let mut current = descendant.to_string();
    let mut guard = 0;
    while let Some(parent) = classes.get(&current).and_then(|c| c.parent.clone()) {
        if parent == ancestor {
            return true;
        }
        current = parent;
        guard += 1;
        if guard > classes.len() + 1 {
            break;
        }
    }
    false
}

/// Resolves `SELF_TYPE` to the enclosing class for subtyping purposes.
fn resolve(ty: &str, current_class: &str) -> String {
    if ty == SELF_TYPE {
        current_class.to_string()
    } else {
        ty.to_string()
    }
}

pub fn is_subtype(classes: &HashMap<String, ClassDef>, current_class: &str, a: &str, b: &str) -> bool {
    if a == POISON || b == POISON {
        return true;
    }
    if b == SELF_TYPE {
        return a == SELF_TYPE;
    }
    let a_resolved = resolve(a, current_class);
    is_ancestor(classes, &a_resolved, b)
}

/// Deepest common ancestor of two (possibly `SELF_TYPE`) types.
pub fn lub(classes: &HashMap<String, ClassDef>, current_class: &str, a: &str, b: &str) -> String {
    if a == POISON {
        return b.to_string();
    }
    if b == POISON {
        return a.to_string();
    }
    if a == SELF_TYPE && b == SELF_TYPE {
        return SELF_TYPE.to_string();
    }
    let a = resolve(a, current_class);
    let b = resolve(b, current_class);
    if a == b {
        return a;
    }
    let mut a_chain = vec![a.clone()];
    let mut current = a.clone();
    while let Some(parent) = classes.get(&current).and_then(|c| c.parent.clone()) {
        a_chain.push(parent.clone());
        current = parent;
    }
    let mut current = b.clone();
    if a_chain.contains(&current) {
        return current;
    }
    loop {
        let Some(parent) = classes.get(&current).and_then(|c| c.parent.clone()) else {
            return "Object".to_string();
        };
        if a_chain.contains(&parent) {
            return parent;
        }
        current = parent;
    }
}

struct MethodLookup {
    formals: Vec<Formal>,
    return_type: String,
}

fn lookup_method(
    classes: &HashMap<String, ClassDef>,
    start_class: &str,
    method_name: &str,
) -> Option<MethodLookup> {
    let mut current = Some(start_class.to_string());
    let mut guard = 0;
    while let Some(name) = current {
        let class = classes.get(&name)?;
        if let Some(m) = class.methods.iter().find(|m| m.name == method_name) {
            return Some(MethodLookup {
                formals: m.formals.clone(),
                return_type: m.return_type.clone(),
            });
        }
        current = class.parent.clone();
        guard += 1;
        if guard > classes.len() + 1 {
            return None;
        }
    }
    None
}

fn lookup_attribute(
    classes: &HashMap<String, ClassDef>,
    start_class: &str,
    attr_name: &str,
) -> Option<String> {
    let mut current = Some(start_class.to_string());
    let mut guard = 0;
    while let Some(name) = current {
        let class = classes.get(&name)?;
        if let Some(a) = class.attributes.iter().find(|a| a.name == attr_name) {
            return Some(a.declared_type.clone());
        }
        current = class.parent.clone();
        guard += 1;
        if guard > classes.len() + 1 {
            return None;
        }
    }
    None
}

struct Checker<'a> {
    classes: &'a HashMap<String, ClassDef>,
    current_class: String,
    scopes: Vec<HashMap<String, String>>,
    diags: &'a mut Diagnostics,
}

impl<'a> Checker<'a> {
    fn poison(&self, line: u32, kind: TypedExprKind) -> TypedExpr {
        TypedExpr {
            kind,
            static_type: POISON.to_string(),
            line,
        }
    }

    fn lookup_var(&self, name: &str) -> Option<String> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty.clone());
            }
        }
        lookup_attribute(self.classes, &self.current_class, name)
    }

    fn known_type(&self, ty: &str) -> bool {
        ty == SELF_TYPE || self.classes.contains_key(ty)
    }

    fn check(&mut self, expr: &ParsedExpr) -> TypedExpr {
        match expr {
            ParsedExpr::IntConstant(v, line) => TypedExpr {
                kind: TypedExprKind::IntConstant(*v),
                static_type: "Int".to_string(),
                line: *line,
            },
            ParsedExpr::BoolConstant(v, line) => TypedExpr {
                kind: TypedExprKind::BoolConstant(*v),
                static_type: "Bool".to_string(),
                line: *line,
            },
            ParsedExpr::StringConstant(v, line) => TypedExpr {
                kind: TypedExprKind::StringConstant(v.clone()),
                static_type: "String".to_string(),
                line: *line,
            },
            ParsedExpr::ObjectReference(name, line) => {
                if name == "self" {
                    return TypedExpr {
                        kind: TypedExprKind::ObjectReference(name.clone()),
                        static_type: SELF_TYPE.to_string(),
                        line: *line,
                    };
                }
                match self.lookup_var(name) {
                    Some(ty) => TypedExpr {
                        kind: TypedExprKind::ObjectReference(name.clone()),
                        static_type: ty,
                        line: *line,
                    },
                    None => {
                        self.diags.push(*line, format!("Undeclared identifier {}", name));
                        self.poison(*line, TypedExprKind::ObjectReference(name.clone()))
                    }
                }
            }
            ParsedExpr::Assignment(name, value, line) => {
                let value_t = self.check(value);
                if name == "self" {
                    self.diags.push(*line, "Cannot assign to self");
                    return self.poison(*line, TypedExprKind::Assignment(name.clone(), Box::new(value_t)));
                }
                let Some(target_ty) = self.lookup_var(name) else {
                    self.diags.push(*line, format!("Undeclared identifier {}", name));
                    return self.poison(*line, TypedExprKind::Assignment(name.clone(), Box::new(value_t)));
                };
                if !is_subtype(self.classes, &self.current_class, &value_t.static_type, &target_ty) {
                    self.diags.push(
                        *line,
                        format!(
                            "Type {} of assigned expression does not conform to declared type {} of identifier {}",
                            value_t.static_type, target_ty, name
                        ),
                    );
                }
                TypedExpr {
                    static_type: value_t.static_type.clone(),
                    kind: TypedExprKind::Assignment(name.clone(), Box::new(value_t)),
                    line: *line,
                }
            }
            ParsedExpr::Sequence(exprs, line) => {
                let typed: Vec<TypedExpr> = exprs.iter().map(|e| self.check(e)).collect();
                let ty = typed.last().map(|t| t.static_type.clone()).unwrap_or_else(|| "Object".to_string());
                TypedExpr {
                    static_type: ty,
                    kind: TypedExprKind::Sequence(typed),
                    line: *line,
                }
            }
            ParsedExpr::IfThenElseFi {
                cond,
                then_branch,
                else_branch,
                line,
            } => {
                let cond_t = self.check(cond);
                if cond_t.static_type != "Bool" && cond_t.static_type != POISON {
                    self.diags.push(*line, "If condition must have type Bool");
                }
                let then_t = self.check(then_branch);
                let else_t = self.check(else_branch);
                let ty = lub(self.classes, &self.current_class, &then_t.static_type, &else_t.static_type);
                TypedExpr {
                    static_type: ty,
                    kind: TypedExprKind::IfThenElseFi {
                        cond: Box::new(cond_t),
                        then_branch: Box::new(then_t),
                        else_branch: Box::new(else_t),
                    },
                    line: *line,
                }
            }
            ParsedExpr::WhileLoopPool { cond, body, line } => {
                let cond_t = self.check(cond);
                if cond_t.static_type != "Bool" && cond_t.static_type != POISON {
                    self.diags.push(*line, "Loop condition must have type Bool");
                }
                let body_t = self.check(body);
                TypedExpr {
                    static_type: "Object".to_string(),
                    kind: TypedExprKind::WhileLoopPool {
                        cond: Box::new(cond_t),
                        body: Box::new(body_t),
                    },
                    line: *line,
                }
            }
            ParsedExpr::LetIn { bindings, body, line } => {
                let mut typed_bindings = Vec::with_capacity(bindings.len());
                let mut pushed = 0;
                for b in bindings {
                    let init_t = b.init.as_ref().map(|e| Box::new(self.check(e)));
                    if !self.known_type(&b.declared_type) {
                        self.diags.push(
                            *line,
                            format!("Class {} of let-bound identifier {} is undefined", b.declared_type, b.name),
                        );
                    } else if let Some(init) = &init_t {
                        if !is_subtype(self.classes, &self.current_class, &init.static_type, &b.declared_type) {
                            self.diags.push(
                                *line,
                                format!(
                                    "Inferred type {} of initialization of {} does not conform to identifier's declared type {}",
                                    init.static_type, b.name, b.declared_type
                                ),
                            );
                        }
                    }
                    self.scopes.push(HashMap::from([(b.name.clone(), b.declared_type.clone())]));
                    pushed += 1;
                    typed_bindings.push(TypedLetBinding {
                        name: b.name.clone(),
                        declared_type: b.declared_type.clone(),
                        init: init_t,
                    });
                }
                let body_t = self.check(body);
                for _ in 0..pushed {
                    self.scopes.pop();
                }
                TypedExpr {
                    static_type: body_t.static_type.clone(),
                    kind: TypedExprKind::LetIn {
                        bindings: typed_bindings,
                        body: Box::new(body_t),
                    },
                    line: *line,
                }
            }
            ParsedExpr::CaseOfEsac { subject, arms, line } => {
                let subject_t = self.check(subject);
                let mut seen_types = std::collections::HashSet::new();
                let mut typed_arms = Vec::with_capacity(arms.len());
                let mut result_ty: Option<String> = None;
                for arm in arms {
                    self.check_case_arm(arm, *line, &mut seen_types, &mut typed_arms, &mut result_ty);
                }
                TypedExpr {
                    static_type: result_ty.unwrap_or_else(|| "Object".to_string()),
                    kind: TypedExprKind::CaseOfEsac {
                        subject: Box::new(subject_t),
                        arms: typed_arms,
                    },
                    line: *line,
                }
            }
            ParsedExpr::NewObject(ty, line) => {
                if !self.known_type(ty) {
                    self.diags.push(*line, format!("'new' used with undefined class {}", ty));
                    return self.poison(*line, TypedExprKind::NewObject(ty.clone()));
                }
                TypedExpr {
                    static_type: ty.clone(),
                    kind: TypedExprKind::NewObject(ty.clone()),
                    line: *line,
                }
            }
            ParsedExpr::IsVoid(inner, line) => {
                let inner_t = self.check(inner);
                TypedExpr {
                    static_type: "Bool".to_string(),
                    kind: TypedExprKind::IsVoid(Box::new(inner_t)),
                    line: *line,
                }
            }
            ParsedExpr::IntegerNegation(inner, line) => {
                let inner_t = self.check(inner);
                if inner_t.static_type != "Int" && inner_t.static_type != POISON {
                    self.diags.push(*line, "Argument of '~' has non-Int type");
                }
                TypedExpr {
                    static_type: "Int".to_string(),
                    kind: TypedExprKind::IntegerNegation(Box::new(inner_t)),
                    line: *line,
                }
            }
            ParsedExpr::BooleanNegation(inner, line) => {
                let inner_t = self.check(inner);
                if inner_t.static_type != "Bool" && inner_t.static_type != POISON {
                    self.diags.push(*line, "Argument of 'not' has non-Bool type");
                }
                TypedExpr {
                    static_type: "Bool".to_string(),
                    kind: TypedExprKind::BooleanNegation(Box::new(inner_t)),
                    line: *line,
                }
            }
            ParsedExpr::Arithmetic(op, lhs, rhs, line) => {
                let lhs_t = self.check(lhs);
                let rhs_t = self.check(rhs);
                if lhs_t.static_type != "Int" && lhs_t.static_type != POISON {
                    self.diags.push(*line, "non-Int argument to arithmetic operator");
                }
                if rhs_t.static_type != "Int" && rhs_t.static_type != POISON {
                    self.diags.push(*line, "non-Int argument to arithmetic operator");
                }
                TypedExpr {
                    static_type: "Int".to_string(),
                    kind: TypedExprKind::Arithmetic(*op, Box::new(lhs_t), Box::new(rhs_t)),
                    line: *line,
                }
            }
            ParsedExpr::IntegerComparison(op, lhs, rhs, line) => {
                let lhs_t = self.check(lhs);
                let rhs_t = self.check(rhs);
                if lhs_t.static_type != "Int" && lhs_t.static_type != POISON {
                    self.diags.push(*line, "non-Int argument to comparison operator");
                }
                if rhs_t.static_type != "Int" && rhs_t.static_type != POISON {
                    self.diags.push(*line, "non-Int argument to comparison operator");
                }
                TypedExpr {
                    static_type: "Bool".to_string(),
                    kind: TypedExprKind::IntegerComparison(*op, Box::new(lhs_t), Box::new(rhs_t)),
                    line: *line,
                }
            }
            ParsedExpr::EqualityComparison(lhs, rhs, line) => {
                let lhs_t = self.check(lhs);
                let rhs_t = self.check(rhs);
                let basic = ["Int", "Bool", "String"];
                let lhs_basic = basic.contains(&lhs_t.static_type.as_str());
                let rhs_basic = basic.contains(&rhs_t.static_type.as_str());
                let either_poison = lhs_t.static_type == POISON || rhs_t.static_type == POISON;
                if !either_poison && (lhs_basic || rhs_basic) && lhs_t.static_type != rhs_t.static_type {
                    self.diags.push(*line, "Comparison requires both sides to be Int, Bool, or String of the same type");
                }
                TypedExpr {
                    static_type: "Bool".to_string(),
                    kind: TypedExprKind::EqualityComparison(Box::new(lhs_t), Box::new(rhs_t)),
                    line: *line,
                }
            }
            ParsedExpr::MethodInvocation { name, args, line } => {
                let args_t: Vec<TypedExpr> = args.iter().map(|a| self.check(a)).collect();
                let current_class = self.current_class.clone();
                self.check_dispatch(&current_class, SELF_TYPE, name, &args_t, *line);
                let (ret_ty, resolved) = self.resolved_dispatch_return(&current_class, name);
                TypedExpr {
                    static_type: if resolved { ret_ty } else { POISON.to_string() },
                    kind: TypedExprKind::MethodInvocation {
                        name: name.clone(),
                        args: args_t,
                    },
                    line: *line,
                }
            }
            ParsedExpr::DynamicDispatch { target, name, args, line } => {
                let target_t = self.check(target);
                let args_t: Vec<TypedExpr> = args.iter().map(|a| self.check(a)).collect();
                let lookup_class = resolve(&target_t.static_type, &self.current_class);
                self.check_dispatch(&lookup_class, &target_t.static_type, name, &args_t, *line);
                let (ret_ty, resolved) = self.resolved_dispatch_return(&lookup_class, name);
                let static_type = if !resolved {
                    POISON.to_string()
                } else if ret_ty == SELF_TYPE {
                    target_t.static_type.clone()
                } else {
                    ret_ty
                };
                TypedExpr {
                    static_type,
                    kind: TypedExprKind::DynamicDispatch {
                        target: Box::new(target_t),
                        name: name.clone(),
                        args: args_t,
                    },
                    line: *line,
                }
            }
            ParsedExpr::StaticDispatch {
                target,
                dispatch_type,
                name,
                args,
                line,
            } => {
                let target_t = self.check(target);
                let args_t: Vec<TypedExpr> = args.iter().map(|a| self.check(a)).collect();
                if !self.known_type(dispatch_type) {
                    self.diags.push(*line, format!("Static dispatch to undefined class {}", dispatch_type));
                } else if !is_subtype(self.classes, &self.current_class, &target_t.static_type, dispatch_type) {
                    self.diags.push(
                        *line,
                        format!(
                            "Expression type {} does not conform to declared static dispatch type {}",
                            target_t.static_type, dispatch_type
                        ),
                    );
                }
                self.check_dispatch(dispatch_type, dispatch_type, name, &args_t, *line);
                let (ret_ty, resolved) = self.resolved_dispatch_return(dispatch_type, name);
                let static_type = if !resolved {
                    POISON.to_string()
                } else if ret_ty == SELF_TYPE {
                    target_t.static_type.clone()
                } else {
                    ret_ty
                };
                TypedExpr {
                    static_type,
                    kind: TypedExprKind::StaticDispatch {
                        target: Box::new(target_t),
                        dispatch_type: dispatch_type.clone(),
                        name: name.clone(),
                        args: args_t,
                    },
                    line: *line,
                }
            }
            ParsedExpr::ParenthesizedExpr(inner, line) => {
                let inner_t = self.check(inner);
                TypedExpr {
                    static_type: inner_t.static_type.clone(),
                    kind: TypedExprKind::ParenthesizedExpr(Box::new(inner_t)),
                    line: *line,
                }
            }
        }
    }

    fn check_case_arm(
        &mut self,
        arm: &CaseBranch,
        line: u32,
        seen_types: &mut std::collections::HashSet<String>,
        typed_arms: &mut Vec<TypedCaseBranch>,
        result_ty: &mut Option<String>,
    ) {
        if !self.known_type(&arm.declared_type) || arm.declared_type == SELF_TYPE {
            self.diags.push(line, format!("Class {} of case branch is undefined", arm.declared_type));
        } else if !seen_types.insert(arm.declared_type.clone()) {
            self.diags.push(line, format!("Duplicate branch {} in case statement", arm.declared_type));
        }
        self.scopes.push(HashMap::from([(arm.name.clone(), arm.declared_type.clone())]));
        let body_t = self.check(&arm.body);
        self.scopes.pop();
        *result_ty = Some(match result_ty.take() {
            None => body_t.static_type.clone(),
            Some(prev) => lub(self.classes, &self.current_class, &prev, &body_t.static_type),
        });
        typed_arms.push(TypedCaseBranch {
            name: arm.name.clone(),
            declared_type: arm.declared_type.clone(),
            body: Box::new(body_t),
        });
    }

    /// Validates arity and argument conformance for a call resolved against
    /// `lookup_class`; `receiver_display` only affects diagnostic wording.
    fn check_dispatch(
        &mut self,
        lookup_class: &str,
        receiver_display: &str,
        name: &str,
        args_t: &[TypedExpr],
        line: u32,
    ) {
        if lookup_class == POISON {
            return;
        }
        let Some(method) = lookup_method(self.classes, lookup_class, name) else {
            self.diags.push(
                line,
                format!("Dispatch to undefined method {} on type {}", name, receiver_display),
            );
            return;
        };
        if method.formals.len() != args_t.len() {
            self.diags.push(
                line,
                format!("Method {} called with wrong number of arguments", name),
            );
            return;
        }
        for (formal, arg) in method.formals.iter().zip(args_t.iter()) {
            if !is_subtype(self.classes, &self.current_class, &arg.static_type, &formal.declared_type) {
                self.diags.push(
                    line,
                    format!(
                        "In call to {}, type {} of parameter {} does not conform to declared type {}",
                        name, arg.static_type, formal.name, formal.declared_type
                    ),
                );
            }
        }
    }

    fn resolved_dispatch_return(&self, lookup_class: &str, name: &str) -> (String, bool) {
        if lookup_class == POISON {
            return (POISON.to_string(), true);
        }
        match lookup_method(self.classes, lookup_class, name) {
            Some(m) => (m.return_type, true),
            None => (POISON.to_string(), false),
        }
    }
}

pub fn typecheck_program(
    classes: &HashMap<String, ClassDef>,
    diags: &mut Diagnostics,
) -> HashMap<String, TypedClass> {
    let mut result = HashMap::new();
    for (name, class) in classes {
        if class.line == 0 {
            continue; // built-in: no user-written body to check
        }
        let mut checker = Checker {
            classes,
            current_class: name.clone(),
            scopes: vec![HashMap::new()],
            diags,
        };

        let attributes: Vec<TypedAttribute> = class
            .attributes
            .iter()
            .map(|a| {
                let init = a.init.as_ref().map(|e| checker.check(e));
                if let Some(init) = &init {
                    if !is_subtype(classes, name, &init.static_type, &a.declared_type) {
                        checker.diags.push(
                            a.line,
                            format!(
                                "Inferred type {} of initialization of attribute {} does not conform to declared type {}",
                                init.static_type, a.name, a.declared_type
                            ),
                        );
                    }
                }
                TypedAttribute {
                    name: a.name.clone(),
                    declared_type: a.declared_type.clone(),
                    init,
                }
            })
            .collect();

        let methods: Vec<TypedMethod> = class
            .methods
            .iter()
            .filter(|m| m.body.is_some())
            .map(|m| {
                checker.scopes = vec![HashMap::from_iter(
                    m.formals.iter().map(|f| (f.name.clone(), f.declared_type.clone())),
                )];
                let body = checker.check(m.body.as_ref().unwrap());
                if !is_subtype(classes, name, &body.static_type, &m.return_type) {
                    checker.diags.push(
                        m.line,
                        format!(
                            "Inferred return type {} of method {} does not conform to declared return type {}",
                            body.static_type, m.name, m.return_type
                        ),
                    );
                }
                TypedMethod {
                    name: m.name.clone(),
                    formals: m.formals.clone(),
                    return_type: m.return_type.clone(),
                    body,
                }
            })
            .collect();

        result.insert(
            name.clone(),
            TypedClass {
                name: name.clone(),
                attributes,
                methods,
            },
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::features::collect_features;
    use crate::hierarchy::build_class_graph;
    use crate::parser::Parser;

    fn run(src: &str) -> (HashMap<String, TypedClass>, Diagnostics) {
        let mut p = Parser::new(src).unwrap();
        let program = p.parse_program().unwrap();
        let mut diags = Diagnostics::new();
        let (graph, fatal) = build_class_graph(&program, &mut diags);
        assert!(!fatal);
        let classes = collect_features(&graph, &mut diags);
        let typed = typecheck_program(&classes, &mut diags);
        (typed, diags)
    }

    #[test]
    fn simple_arithmetic_types_as_int() {
        let (typed, diags) = run("class Main { main() : Int { 1 + 2 }; };");
        assert!(diags.is_empty());
        assert_eq!(typed["Main"].methods[0].body.static_type, "Int");
    }

    #[test]
    fn if_lubs_branches() {
        let (typed, diags) = run(
            "class A {}; class B inherits A {}; class Main { main() : A { if true then (new A) else (new B) fi }; };",
        );
        assert!(diags.is_empty());
        assert_eq!(typed["Main"].methods[0].body.static_type, "A");
    }

    #[test]
    fn undeclared_identifier_is_poison_and_diagnosed() {
        let (typed, diags) = run("class Main { main() : Int { x }; };");
        assert!(!diags.is_empty());
        assert_eq!(typed["Main"].methods[0].body.static_type, POISON);
    }

    #[test]
    fn bad_return_type_is_flagged() {
        let (_typed, diags) = run("class Main { main() : Bool { 1 }; };");
        assert!(diags.located.iter().any(|d| d.message.contains("does not conform to declared return type")));
    }

    #[test]
    fn dispatch_on_poison_receiver_does_not_cascade() {
        let (typed, diags) = run("class Main { main() : Int { x.length() }; };");
        assert_eq!(diags.located.len(), 1);
        assert_eq!(typed["Main"].methods[0].body.static_type, POISON);
    }

    #[test]
    fn self_type_dispatch_preserves_dynamic_type() {
        // Implicit self-dispatch of a SELF_TYPE method stays SELF_TYPE: the
        // call's static type tracks the *receiver's* dynamic type, which at
        // this call site is still unresolved (self), not `Main` outright.
        let (typed, diags) = run(
            "class Main { f() : SELF_TYPE { self }; g() : Main { f() }; };",
        );
        assert!(diags.is_empty());
        assert_eq!(typed["Main"].methods[1].body.static_type, SELF_TYPE);
    }
}
