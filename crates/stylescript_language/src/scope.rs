//! Scope analysis run before a function body is compiled.
//!
//! Variables are function scoped (`let` and `const` included). A local that
//! a nested function refers to must live in a heap cell so that every
//! closure observes later assignments; the compiler asks this module which
//! locals those are.

use std::collections::HashSet;

use crate::ast::{DeclKind, Expr, FunctionNode, Stmt};

/// Declarations hoisted to the top of a function body.
#[derive(Debug, Default)]
pub(crate) struct Hoisted<'a> {
    /// Variable names with their declaration keyword, in source order.
    pub vars: Vec<(&'a str, DeclKind)>,
    /// Function declarations, in source order.
    pub functions: Vec<&'a FunctionNode>,
}

impl Hoisted<'_> {
    /// Returns every name the body declares.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars
            .iter()
            .map(|(name, _)| *name)
            .chain(self.functions.iter().filter_map(|f| f.name.as_deref()))
    }
}

/// Collects the declarations of a body without entering nested functions.
pub(crate) fn hoist(body: &[Stmt]) -> Hoisted<'_> {
    let mut hoisted = Hoisted::default();
    for stmt in body {
        hoist_stmt(stmt, &mut hoisted);
    }
    hoisted
}

fn hoist_stmt<'a>(stmt: &'a Stmt, out: &mut Hoisted<'a>) {
    match stmt {
        Stmt::Var(kind, decls, _) => {
            out.vars.extend(decls.iter().map(|d| (d.name.as_str(), *kind)));
        }
        Stmt::Function(node) => out.functions.push(node),
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            hoist_stmt(consequent, out);
            if let Some(alternate) = alternate {
                hoist_stmt(alternate, out);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => hoist_stmt(body, out),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                hoist_stmt(init, out);
            }
            hoist_stmt(body, out);
        }
        Stmt::Block(stmts, _) => {
            for s in stmts {
                hoist_stmt(s, out);
            }
        }
        Stmt::Expr(..)
        | Stmt::Return(..)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Throw(..)
        | Stmt::Empty(_) => {}
    }
}

/// Names declared by a function itself: parameters, hoisted declarations,
/// and its own name when it is a named function expression.
pub(crate) fn declared_names(node: &FunctionNode, is_expression: bool) -> HashSet<String> {
    let mut declared: HashSet<String> = node.params.iter().cloned().collect();
    declared.extend(hoist(&node.body).names().map(str::to_string));
    if is_expression {
        if let Some(name) = &node.name {
            declared.insert(name.clone());
        }
    }
    declared
}

/// Names a function refers to without declaring them, including names its
/// nested functions leave free.
pub(crate) fn free_names(node: &FunctionNode, is_expression: bool) -> HashSet<String> {
    let mut refs = References::default();
    refs.visit_body(&node.body);
    let declared = declared_names(node, is_expression);
    let mut free: HashSet<String> = refs.names;
    for (nested, nested_is_expression) in refs.nested {
        free.extend(free_names(nested, nested_is_expression));
    }
    free.retain(|name| !declared.contains(name));
    free
}

/// Names that functions nested in `body` use without declaring them.
///
/// A local of the enclosing function must be stored in a cell exactly when
/// its name is in this set.
pub(crate) fn closure_references(body: &[Stmt]) -> HashSet<String> {
    let mut refs = References::default();
    refs.visit_body(body);
    let mut used = HashSet::new();
    for (nested, is_expression) in refs.nested {
        used.extend(free_names(nested, is_expression));
    }
    used
}

/// Identifier references of one function body, stopping at nested functions.
#[derive(Default)]
struct References<'a> {
    names: HashSet<String>,
    nested: Vec<(&'a FunctionNode, bool)>,
}

impl<'a> References<'a> {
    fn visit_body(&mut self, body: &'a [Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Var(_, decls, _) => {
                for decl in decls {
                    self.names.insert(decl.name.clone());
                    if let Some(init) = &decl.init {
                        self.visit_expr(init);
                    }
                }
            }
            Stmt::Function(node) => {
                if let Some(name) = &node.name {
                    self.names.insert(name.clone());
                }
                self.nested.push((node.as_ref(), false));
            }
            Stmt::Expr(expr, _) | Stmt::Throw(expr, _) => self.visit_expr(expr),
            Stmt::Return(expr, _) => {
                if let Some(expr) = expr {
                    self.visit_expr(expr);
                }
            }
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.visit_expr(test);
                self.visit_stmt(consequent);
                if let Some(alternate) = alternate {
                    self.visit_stmt(alternate);
                }
            }
            Stmt::While { test, body, .. } | Stmt::DoWhile { body, test, .. } => {
                self.visit_expr(test);
                self.visit_stmt(body);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.visit_stmt(init);
                }
                for expr in [test, update].into_iter().flatten() {
                    self.visit_expr(expr);
                }
                self.visit_stmt(body);
            }
            Stmt::Block(stmts, _) => self.visit_body(stmts),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) => {}
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Ident(name, _) => {
                self.names.insert(name.clone());
            }
            Expr::Function(node) => self.nested.push((node.as_ref(), true)),
            Expr::Array(items, _) | Expr::Sequence(items, _) => {
                for item in items {
                    self.visit_expr(item);
                }
            }
            Expr::Object(entries, _) => {
                for (_, value) in entries {
                    self.visit_expr(value);
                }
            }
            Expr::Unary(_, operand, _) | Expr::Member(operand, _, _) => self.visit_expr(operand),
            Expr::Update { target, .. } => self.visit_expr(target),
            Expr::Binary(_, left, right, _)
            | Expr::Logical(_, left, right, _)
            | Expr::Index(left, right, _) => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Assign { target, value, .. } => {
                self.visit_expr(target);
                self.visit_expr(value);
            }
            Expr::Conditional(test, consequent, alternate, _) => {
                self.visit_expr(test);
                self.visit_expr(consequent);
                self.visit_expr(alternate);
            }
            Expr::Call(callee, args, _) => {
                self.visit_expr(callee);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            Expr::Number(..)
            | Expr::String(..)
            | Expr::Bool(..)
            | Expr::Null(_)
            | Expr::This(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    fn sorted(set: HashSet<String>) -> Vec<String> {
        let mut v: Vec<_> = set.into_iter().collect();
        v.sort();
        v
    }

    #[test]
    fn hoist_finds_nested_declarations() {
        let node = parse_function(
            "function(a) { if (a) { var x = 1 } for (let i = 0; i < 2; i++) {} function g() {} }",
        )
        .expect("parse");
        let hoisted = hoist(&node.body);
        let names: Vec<_> = hoisted.names().collect();
        assert_eq!(names, vec!["x", "i", "g"]);
    }

    #[test]
    fn free_names_exclude_declarations() {
        let node = parse_function(
            "function f(a) { var b = a + c; return function() { return b + d + f } }",
        )
        .expect("parse");
        assert_eq!(sorted(free_names(&node, true)), vec!["c", "d"]);
    }

    #[test]
    fn closure_references_cover_nested_levels() {
        let node = parse_function(
            "function(a, unused) { var b = 1; var local = 2; \
             return function() { return function() { return a + b + g } } }",
        )
        .expect("parse");
        let used = closure_references(&node.body);
        assert!(used.contains("a"));
        assert!(used.contains("b"));
        assert!(used.contains("g"));
        assert!(!used.contains("local"));
        assert!(!used.contains("unused"));
    }
}
