//! Compiler for transforming AST into bytecode.
//!
//! Every function literal becomes a [`FunctionProto`]: bytecode, a constant
//! pool, nested prototypes, and the table of variables it captures from
//! enclosing functions. A program compiles to a parameterless prototype
//! whose top-level declarations are globals and whose return value is the
//! completion value of its last expression statement.
//!
//! # Variables
//!
//! Variables are function scoped. Locals that no nested function touches
//! live in stack slots; captured locals live in heap cells shared with the
//! closures that capture them.

#![allow(clippy::too_many_lines)]

use std::collections::{HashMap, HashSet};
use std::mem;
use std::rc::Rc;

use stylescript_foundation::{Error, Result};

use crate::ast::{BinaryOp, DeclKind, Expr, FunctionNode, LogicalOp, Program, Stmt, UnaryOp};
use crate::opcode::{Bytecode, Opcode, jump_offset};
use crate::parser;
use crate::scope;
use crate::span::Span;
use crate::value::Value;

/// Name reported for code compiled by [`compile_program`].
pub const PROGRAM_NAME: &str = "<eval>";

/// A compiled function ready for instantiation.
#[derive(Debug, Default)]
pub struct FunctionProto {
    /// Function name, if the literal had one.
    pub name: Option<Rc<str>>,
    /// Number of declared parameters.
    pub arity: u16,
    /// Number of local slots, parameters included.
    pub locals_count: u16,
    /// Number of heap cells for captured locals.
    pub cells_count: u16,
    /// Parameters that live in cells: `(parameter slot, cell index)`.
    pub param_cells: Vec<(u16, u16)>,
    /// Where each upvalue comes from in the enclosing function.
    pub upvalues: Vec<UpvalueSource>,
    /// Function bytecode.
    pub code: Bytecode,
    /// Constants pool (numbers and strings).
    pub constants: Vec<Value>,
    /// Nested function prototypes, referenced by `MakeClosure`.
    pub functions: Vec<Rc<FunctionProto>>,
}

impl FunctionProto {
    /// Returns the name used in stack traces.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// Source of a captured variable, relative to the function creating the closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpvalueSource {
    /// A cell of the creating frame.
    Cell(u16),
    /// An upvalue of the creating closure.
    Upvalue(u16),
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Local(u16),
    Cell(u16),
}

#[derive(Clone, Copy, Debug)]
struct Binding {
    slot: Slot,
    constant: bool,
}

#[derive(Clone, Copy, Debug)]
enum Resolved {
    Local(u16),
    Cell(u16),
    Upvalue(u16),
    Global,
}

/// Key for constant deduplication.
/// Floats are keyed by their bit pattern so that NaN and -0 dedupe safely.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ConstKey {
    Number(u64),
    String(Rc<str>),
}

#[derive(Debug, Default)]
struct LoopLabels {
    breaks: Vec<usize>,
    continues: Vec<usize>,
    continue_target: Option<usize>,
}

/// Per-function compilation state.
#[derive(Debug, Default)]
struct FunctionState {
    name: Option<Rc<str>>,
    arity: u16,
    is_program: bool,
    code: Bytecode,
    constants: Vec<Value>,
    constant_map: HashMap<ConstKey, u16>,
    functions: Vec<Rc<FunctionProto>>,
    bindings: HashMap<String, Binding>,
    /// Names nested functions use freely; locals with these names get cells.
    captured: HashSet<String>,
    upvalues: Vec<UpvalueSource>,
    upvalue_names: HashMap<String, u16>,
    param_cells: Vec<(u16, u16)>,
    next_local: u16,
    next_cell: u16,
    loops: Vec<LoopLabels>,
    line: u32,
}

impl FunctionState {
    fn program() -> Self {
        Self {
            name: Some(Rc::from(PROGRAM_NAME)),
            is_program: true,
            line: 1,
            ..Self::default()
        }
    }

    fn finish(self) -> FunctionProto {
        FunctionProto {
            name: self.name,
            arity: self.arity,
            locals_count: self.next_local,
            cells_count: self.next_cell,
            param_cells: self.param_cells,
            upvalues: self.upvalues,
            code: self.code,
            constants: self.constants,
            functions: self.functions,
        }
    }
}

/// Compiler state for transforming AST to bytecode.
///
/// The outermost level is always a program scope, so names that no
/// function declares resolve to globals.
pub struct Compiler {
    /// The function being compiled.
    current: FunctionState,
    /// Enclosing functions, outermost first.
    enclosing: Vec<FunctionState>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Creates a new compiler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: FunctionState::program(),
            enclosing: Vec::new(),
        }
    }

    /// Compiles a single function literal.
    ///
    /// Free names in the function resolve to globals.
    ///
    /// # Errors
    /// Returns a syntax error for constructs rejected at compile time
    /// (assignment to a constant, stray `break`, limits exceeded).
    pub fn compile_function(&mut self, node: &FunctionNode) -> Result<Rc<FunctionProto>> {
        self.current = FunctionState::program();
        self.enclosing.clear();
        self.function(node, true)
    }

    /// Compiles a program.
    ///
    /// # Errors
    /// Returns a syntax error for constructs rejected at compile time.
    pub fn compile_program(&mut self, program: &Program) -> Result<Rc<FunctionProto>> {
        self.current = FunctionState::program();
        self.enclosing.clear();
        // Slot 0 holds the completion value.
        self.current.next_local = 1;

        let hoisted = scope::hoist(&program.body);
        for (name, _) in &hoisted.vars {
            let k = self.string_constant(name, Span::default())?;
            self.emit(Opcode::DeclareGlobal(k));
        }
        for node in &hoisted.functions {
            let idx = self.nested_function(node, false)?;
            self.emit(Opcode::MakeClosure(idx));
            if let Some(name) = &node.name {
                let k = self.string_constant(name, node.span)?;
                self.emit(Opcode::StoreGlobal(k));
            }
            self.emit(Opcode::Pop);
        }

        for stmt in &program.body {
            self.compile_stmt(stmt)?;
        }
        self.emit(Opcode::LoadLocal(0));
        self.emit(Opcode::Return);

        let state = mem::replace(&mut self.current, FunctionState::program());
        Ok(Rc::new(state.finish()))
    }

    // === Functions ===

    fn function(&mut self, node: &FunctionNode, is_expression: bool) -> Result<Rc<FunctionProto>> {
        if node.params.len() > usize::from(u8::MAX) {
            return Err(self.error(node.span, "too many parameters"));
        }
        let state = FunctionState {
            name: node.name.as_deref().map(Rc::from),
            captured: scope::closure_references(&node.body),
            line: node.span.line,
            ..FunctionState::default()
        };
        let parent = mem::replace(&mut self.current, state);
        self.enclosing.push(parent);

        let result = self.function_body(node, is_expression);

        let parent = self.enclosing.pop().unwrap_or_else(FunctionState::program);
        let state = mem::replace(&mut self.current, parent);
        result?;
        Ok(Rc::new(state.finish()))
    }

    fn function_body(&mut self, node: &FunctionNode, is_expression: bool) -> Result<()> {
        for (i, param) in node.params.iter().enumerate() {
            let slot = u16::try_from(i).map_err(|_| self.error(node.span, "too many parameters"))?;
            let binding = if self.current.captured.contains(param) {
                let cell = self.next_cell(node.span)?;
                self.current.param_cells.push((slot, cell));
                Slot::Cell(cell)
            } else {
                Slot::Local(slot)
            };
            self.current.bindings.insert(
                param.clone(),
                Binding {
                    slot: binding,
                    constant: false,
                },
            );
        }
        self.current.arity = u16::try_from(node.params.len()).unwrap_or(u16::MAX);
        self.current.next_local = self.current.arity;

        let hoisted = scope::hoist(&node.body);

        // A named function expression can refer to itself unless a parameter
        // or declaration shadows the name.
        if is_expression {
            if let Some(name) = &node.name {
                let shadowed = self.current.bindings.contains_key(name)
                    || hoisted.names().any(|n| n == name);
                if !shadowed {
                    self.declare(name, false, node.span)?;
                    self.emit(Opcode::LoadCallee);
                    self.store_name(name, node.span)?;
                    self.emit(Opcode::Pop);
                }
            }
        }

        for (name, kind) in &hoisted.vars {
            if !self.current.bindings.contains_key(*name) {
                self.declare(name, *kind == DeclKind::Const, node.span)?;
            }
        }
        for nested in &hoisted.functions {
            if let Some(name) = &nested.name {
                if !self.current.bindings.contains_key(name) {
                    self.declare(name, false, nested.span)?;
                }
            }
        }
        for nested in &hoisted.functions {
            let idx = self.nested_function(nested, false)?;
            self.emit(Opcode::MakeClosure(idx));
            if let Some(name) = &nested.name {
                self.store_name(name, nested.span)?;
            }
            self.emit(Opcode::Pop);
        }

        for stmt in &node.body {
            self.compile_stmt(stmt)?;
        }
        self.emit(Opcode::Undefined);
        self.emit(Opcode::Return);
        Ok(())
    }

    /// Compiles a nested function and returns its prototype index.
    fn nested_function(&mut self, node: &FunctionNode, is_expression: bool) -> Result<u16> {
        let proto = self.function(node, is_expression)?;
        let idx = u16::try_from(self.current.functions.len())
            .map_err(|_| self.error(node.span, "too many nested functions"))?;
        self.current.functions.push(proto);
        Ok(idx)
    }

    fn declare(&mut self, name: &str, constant: bool, span: Span) -> Result<()> {
        let slot = if self.current.captured.contains(name) {
            Slot::Cell(self.next_cell(span)?)
        } else {
            Slot::Local(self.alloc_local(span)?)
        };
        self.current
            .bindings
            .insert(name.to_string(), Binding { slot, constant });
        Ok(())
    }

    fn next_cell(&mut self, span: Span) -> Result<u16> {
        let cell = self.current.next_cell;
        self.current.next_cell = cell
            .checked_add(1)
            .ok_or_else(|| self.error(span, "too many captured variables"))?;
        Ok(cell)
    }

    fn alloc_local(&mut self, span: Span) -> Result<u16> {
        let slot = self.current.next_local;
        self.current.next_local = slot
            .checked_add(1)
            .ok_or_else(|| self.error(span, "too many local variables"))?;
        Ok(slot)
    }

    // === Name resolution ===

    fn level(&mut self, level: usize) -> &mut FunctionState {
        if level >= self.enclosing.len() {
            &mut self.current
        } else {
            &mut self.enclosing[level]
        }
    }

    fn resolve(&mut self, level: usize, name: &str) -> Resolved {
        let state = self.level(level);
        if state.is_program {
            return Resolved::Global;
        }
        if let Some(binding) = state.bindings.get(name) {
            return match binding.slot {
                Slot::Local(slot) => Resolved::Local(slot),
                Slot::Cell(cell) => Resolved::Cell(cell),
            };
        }
        if let Some(&idx) = state.upvalue_names.get(name) {
            return Resolved::Upvalue(idx);
        }
        if level == 0 {
            return Resolved::Global;
        }
        let source = match self.resolve(level - 1, name) {
            Resolved::Cell(cell) => UpvalueSource::Cell(cell),
            Resolved::Upvalue(idx) => UpvalueSource::Upvalue(idx),
            // Scope analysis puts every captured local in a cell.
            Resolved::Local(_) | Resolved::Global => return Resolved::Global,
        };
        let state = self.level(level);
        #[allow(clippy::cast_possible_truncation)]
        let idx = state.upvalues.len() as u16;
        state.upvalues.push(source);
        state.upvalue_names.insert(name.to_string(), idx);
        Resolved::Upvalue(idx)
    }

    fn resolve_current(&mut self, name: &str) -> Resolved {
        self.resolve(self.enclosing.len(), name)
    }

    fn is_constant(&self, name: &str) -> bool {
        for state in std::iter::once(&self.current).chain(self.enclosing.iter().rev()) {
            if state.is_program {
                return false;
            }
            if let Some(binding) = state.bindings.get(name) {
                return binding.constant;
            }
        }
        false
    }

    fn load_name(&mut self, name: &str, span: Span) -> Result<()> {
        match self.resolve_current(name) {
            Resolved::Local(slot) => self.emit(Opcode::LoadLocal(slot)),
            Resolved::Cell(cell) => self.emit(Opcode::LoadCell(cell)),
            Resolved::Upvalue(idx) => self.emit(Opcode::LoadUpvalue(idx)),
            Resolved::Global => {
                let k = self.string_constant(name, span)?;
                self.emit(Opcode::LoadGlobal(k))
            }
        };
        Ok(())
    }

    fn store_name(&mut self, name: &str, span: Span) -> Result<()> {
        match self.resolve_current(name) {
            Resolved::Local(slot) => self.emit(Opcode::StoreLocal(slot)),
            Resolved::Cell(cell) => self.emit(Opcode::StoreCell(cell)),
            Resolved::Upvalue(idx) => self.emit(Opcode::StoreUpvalue(idx)),
            Resolved::Global => {
                let k = self.string_constant(name, span)?;
                self.emit(Opcode::StoreGlobal(k))
            }
        };
        Ok(())
    }

    fn check_assignable(&self, name: &str, span: Span) -> Result<()> {
        if self.is_constant(name) {
            return Err(self.error(span, &format!("assignment to constant variable '{name}'")));
        }
        Ok(())
    }

    // === Statements ===

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.current.line = stmt.span().line;
        match stmt {
            Stmt::Var(kind, decls, _) => {
                for decl in decls {
                    match &decl.init {
                        Some(init) => self.compile_expr(init)?,
                        // `var x;` keeps any previous value.
                        None if *kind == DeclKind::Var => continue,
                        None => {
                            self.emit(Opcode::Undefined);
                        }
                    }
                    self.store_name(&decl.name, decl.span)?;
                    self.emit(Opcode::Pop);
                }
            }
            // Hoisted when the enclosing function starts.
            Stmt::Function(_) | Stmt::Empty(_) => {}
            Stmt::Expr(expr, _) => {
                self.compile_expr(expr)?;
                if self.current.is_program {
                    self.emit(Opcode::StoreLocal(0));
                }
                self.emit(Opcode::Pop);
            }
            Stmt::Return(value, _) => {
                match value {
                    Some(value) => self.compile_expr(value)?,
                    None => {
                        self.emit(Opcode::Undefined);
                    }
                }
                self.emit(Opcode::Return);
            }
            Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.compile_expr(test)?;
                let skip_consequent = self.emit(Opcode::JumpIfFalse(0));
                self.compile_stmt(consequent)?;
                if let Some(alternate) = alternate {
                    let skip_alternate = self.emit(Opcode::Jump(0));
                    self.patch_here(skip_consequent);
                    self.compile_stmt(alternate)?;
                    self.patch_here(skip_alternate);
                } else {
                    self.patch_here(skip_consequent);
                }
            }
            Stmt::While { test, body, .. } => {
                let start = self.current.code.len();
                self.compile_expr(test)?;
                let exit = self.emit(Opcode::JumpIfFalse(0));
                self.current.loops.push(LoopLabels {
                    continue_target: Some(start),
                    ..LoopLabels::default()
                });
                self.compile_stmt(body)?;
                self.emit_jump_back(start);
                self.patch_here(exit);
                self.finish_loop();
            }
            Stmt::DoWhile { body, test, .. } => {
                let start = self.current.code.len();
                self.current.loops.push(LoopLabels::default());
                self.compile_stmt(body)?;
                self.patch_continues();
                self.compile_expr(test)?;
                let back = self.emit(Opcode::JumpIfTrue(0));
                self.current.code.patch_jump(back, start);
                self.finish_loop();
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                match init.as_deref() {
                    Some(Stmt::Expr(expr, _)) => {
                        self.compile_expr(expr)?;
                        self.emit(Opcode::Pop);
                    }
                    Some(other) => self.compile_stmt(other)?,
                    None => {}
                }
                let start = self.current.code.len();
                let exit = match test {
                    Some(test) => {
                        self.compile_expr(test)?;
                        Some(self.emit(Opcode::JumpIfFalse(0)))
                    }
                    None => None,
                };
                self.current.loops.push(LoopLabels::default());
                self.compile_stmt(body)?;
                self.patch_continues();
                if let Some(update) = update {
                    self.compile_expr(update)?;
                    self.emit(Opcode::Pop);
                }
                self.emit_jump_back(start);
                if let Some(exit) = exit {
                    self.patch_here(exit);
                }
                self.finish_loop();
            }
            Stmt::Break(span) => {
                if self.current.loops.is_empty() {
                    return Err(self.error(*span, "illegal break statement"));
                }
                let jump = self.emit(Opcode::Jump(0));
                if let Some(labels) = self.current.loops.last_mut() {
                    labels.breaks.push(jump);
                }
            }
            Stmt::Continue(span) => {
                let target = match self.current.loops.last() {
                    Some(labels) => labels.continue_target,
                    None => return Err(self.error(*span, "illegal continue statement")),
                };
                match target {
                    Some(target) => self.emit_jump_back(target),
                    None => {
                        let jump = self.emit(Opcode::Jump(0));
                        if let Some(labels) = self.current.loops.last_mut() {
                            labels.continues.push(jump);
                        }
                    }
                }
            }
            Stmt::Throw(value, _) => {
                self.compile_expr(value)?;
                self.emit(Opcode::Throw);
            }
            Stmt::Block(stmts, _) => {
                for stmt in stmts {
                    self.compile_stmt(stmt)?;
                }
            }
        }
        Ok(())
    }

    fn patch_continues(&mut self) {
        let here = self.current.code.len();
        let pending = self
            .current
            .loops
            .last_mut()
            .map(|labels| mem::take(&mut labels.continues))
            .unwrap_or_default();
        for jump in pending {
            self.current.code.patch_jump(jump, here);
        }
    }

    fn finish_loop(&mut self) {
        if let Some(labels) = self.current.loops.pop() {
            let here = self.current.code.len();
            for jump in labels.breaks {
                self.current.code.patch_jump(jump, here);
            }
        }
    }

    // === Expressions ===

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        self.current.line = expr.span().line;
        match expr {
            Expr::Number(n, span) => {
                let k = self.constant(Value::Number(*n), *span)?;
                self.emit(Opcode::Const(k));
            }
            Expr::String(s, span) => {
                let k = self.string_constant(s, *span)?;
                self.emit(Opcode::Const(k));
            }
            Expr::Bool(true, _) => {
                self.emit(Opcode::True);
            }
            Expr::Bool(false, _) => {
                self.emit(Opcode::False);
            }
            Expr::Null(_) => {
                self.emit(Opcode::Null);
            }
            Expr::This(_) => {
                self.emit(Opcode::LoadThis);
            }
            Expr::Ident(name, span) => self.load_name(name, *span)?,
            Expr::Array(items, span) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                let count = u16::try_from(items.len())
                    .map_err(|_| self.error(*span, "array literal too large"))?;
                self.emit(Opcode::NewArray(count));
            }
            Expr::Object(entries, _) => {
                self.emit(Opcode::NewObject);
                for (key, value) in entries {
                    self.compile_expr(value)?;
                    let k = self.string_constant(key, value.span())?;
                    self.emit(Opcode::InitProp(k));
                }
            }
            Expr::Function(node) => {
                let idx = self.nested_function(node, true)?;
                self.current.line = node.span.line;
                self.emit(Opcode::MakeClosure(idx));
            }
            Expr::Unary(op, operand, span) => self.compile_unary(*op, operand, *span)?,
            Expr::Update {
                increment,
                prefix,
                target,
                span,
            } => self.compile_update(*increment, *prefix, target, *span)?,
            Expr::Binary(op, left, right, _) => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(binary_opcode(*op));
            }
            Expr::Logical(op, left, right, _) => {
                self.compile_expr(left)?;
                let short_circuit = match op {
                    LogicalOp::And => self.emit(Opcode::JumpIfFalseKeep(0)),
                    LogicalOp::Or => self.emit(Opcode::JumpIfTrueKeep(0)),
                };
                self.emit(Opcode::Pop);
                self.compile_expr(right)?;
                self.patch_here(short_circuit);
            }
            Expr::Conditional(test, consequent, alternate, _) => {
                self.compile_expr(test)?;
                let to_alternate = self.emit(Opcode::JumpIfFalse(0));
                self.compile_expr(consequent)?;
                let to_end = self.emit(Opcode::Jump(0));
                self.patch_here(to_alternate);
                self.compile_expr(alternate)?;
                self.patch_here(to_end);
            }
            Expr::Assign {
                op,
                target,
                value,
                span,
            } => self.compile_assign(*op, target, value, *span)?,
            Expr::Member(object, name, span) => {
                self.compile_expr(object)?;
                let k = self.string_constant(name, *span)?;
                self.emit(Opcode::GetProp(k));
            }
            Expr::Index(object, index, _) => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Opcode::GetIndex);
            }
            Expr::Call(callee, args, span) => self.compile_call(callee, args, *span)?,
            Expr::Sequence(items, _) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.emit(Opcode::Pop);
                    }
                    self.compile_expr(item)?;
                }
            }
        }
        Ok(())
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> Result<()> {
        if op == UnaryOp::Typeof {
            if let Expr::Ident(name, _) = operand {
                if let Resolved::Global = self.resolve_current(name) {
                    let k = self.string_constant(name, span)?;
                    self.emit(Opcode::TypeOfGlobal(k));
                    return Ok(());
                }
            }
        }
        self.compile_expr(operand)?;
        self.current.line = span.line;
        match op {
            UnaryOp::Neg => self.emit(Opcode::Neg),
            UnaryOp::Plus => self.emit(Opcode::ToNumber),
            UnaryOp::Not => self.emit(Opcode::Not),
            UnaryOp::BitNot => self.emit(Opcode::BitNot),
            UnaryOp::Typeof => self.emit(Opcode::TypeOf),
            UnaryOp::Void => {
                self.emit(Opcode::Pop);
                self.emit(Opcode::Undefined)
            }
        };
        Ok(())
    }

    fn compile_update(
        &mut self,
        increment: bool,
        prefix: bool,
        target: &Expr,
        span: Span,
    ) -> Result<()> {
        let step = if increment { Opcode::Add } else { Opcode::Sub };
        let one = self.constant(Value::Number(1.0), span)?;
        match target {
            Expr::Ident(name, name_span) => {
                self.check_assignable(name, *name_span)?;
                self.load_name(name, *name_span)?;
                self.emit(Opcode::ToNumber);
                if !prefix {
                    self.emit(Opcode::Dup);
                }
                self.emit(Opcode::Const(one));
                self.emit(step);
                self.store_name(name, *name_span)?;
                if !prefix {
                    self.emit(Opcode::Pop);
                }
            }
            Expr::Member(object, name, _) => {
                let k = self.string_constant(name, span)?;
                self.compile_expr(object)?;
                self.emit(Opcode::Dup);
                self.emit(Opcode::GetProp(k));
                self.emit(Opcode::ToNumber);
                let saved = self.save_old_value(prefix, span)?;
                self.emit(Opcode::Const(one));
                self.emit(step);
                self.emit(Opcode::SetProp(k));
                self.restore_old_value(saved);
            }
            Expr::Index(object, index, _) => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Opcode::Dup2);
                self.emit(Opcode::GetIndex);
                self.emit(Opcode::ToNumber);
                let saved = self.save_old_value(prefix, span)?;
                self.emit(Opcode::Const(one));
                self.emit(step);
                self.emit(Opcode::SetIndex);
                self.restore_old_value(saved);
            }
            _ => return Err(self.error(span, "invalid update target")),
        }
        Ok(())
    }

    /// For postfix updates, copies the old value into a hidden local.
    fn save_old_value(&mut self, prefix: bool, span: Span) -> Result<Option<u16>> {
        if prefix {
            return Ok(None);
        }
        let temp = self.alloc_local(span)?;
        self.emit(Opcode::StoreLocal(temp));
        Ok(Some(temp))
    }

    fn restore_old_value(&mut self, saved: Option<u16>) {
        if let Some(temp) = saved {
            self.emit(Opcode::Pop);
            self.emit(Opcode::LoadLocal(temp));
        }
    }

    fn compile_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
        span: Span,
    ) -> Result<()> {
        match target {
            Expr::Ident(name, name_span) => {
                self.check_assignable(name, *name_span)?;
                if let Some(op) = op {
                    self.load_name(name, *name_span)?;
                    self.compile_expr(value)?;
                    self.emit(binary_opcode(op));
                } else {
                    self.compile_expr(value)?;
                }
                self.store_name(name, *name_span)?;
            }
            Expr::Member(object, name, _) => {
                let k = self.string_constant(name, span)?;
                self.compile_expr(object)?;
                if let Some(op) = op {
                    self.emit(Opcode::Dup);
                    self.emit(Opcode::GetProp(k));
                    self.compile_expr(value)?;
                    self.emit(binary_opcode(op));
                } else {
                    self.compile_expr(value)?;
                }
                self.current.line = span.line;
                self.emit(Opcode::SetProp(k));
            }
            Expr::Index(object, index, _) => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                if let Some(op) = op {
                    self.emit(Opcode::Dup2);
                    self.emit(Opcode::GetIndex);
                    self.compile_expr(value)?;
                    self.emit(binary_opcode(op));
                } else {
                    self.compile_expr(value)?;
                }
                self.current.line = span.line;
                self.emit(Opcode::SetIndex);
            }
            _ => return Err(self.error(span, "invalid assignment target")),
        }
        Ok(())
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<()> {
        // Stack layout for a call: [callee, this, args...]
        match callee {
            Expr::Member(object, name, _) => {
                let k = self.string_constant(name, span)?;
                self.compile_expr(object)?;
                self.emit(Opcode::Dup);
                self.emit(Opcode::GetProp(k));
                self.emit(Opcode::Swap);
            }
            Expr::Index(object, index, _) => {
                self.compile_expr(object)?;
                self.emit(Opcode::Dup);
                self.compile_expr(index)?;
                self.emit(Opcode::GetIndex);
                self.emit(Opcode::Swap);
            }
            other => {
                self.compile_expr(other)?;
                self.emit(Opcode::Undefined);
            }
        }
        for arg in args {
            self.compile_expr(arg)?;
        }
        let argc = u8::try_from(args.len()).map_err(|_| self.error(span, "too many arguments"))?;
        self.current.line = span.line;
        self.emit(Opcode::Call(argc));
        Ok(())
    }

    // === Emission helpers ===

    fn emit(&mut self, op: Opcode) -> usize {
        let line = self.current.line;
        self.current.code.emit(op, line)
    }

    fn patch_here(&mut self, jump: usize) {
        let here = self.current.code.len();
        self.current.code.patch_jump(jump, here);
    }

    fn emit_jump_back(&mut self, target: usize) {
        let from = self.current.code.len();
        self.emit(Opcode::Jump(jump_offset(from, target)));
    }

    fn constant(&mut self, value: Value, span: Span) -> Result<u16> {
        let key = match &value {
            Value::Number(n) => ConstKey::Number(n.to_bits()),
            Value::String(s) => ConstKey::String(Rc::clone(s)),
            _ => return Err(Error::internal("only numbers and strings are pooled")),
        };
        if let Some(&idx) = self.current.constant_map.get(&key) {
            return Ok(idx);
        }
        let idx = u16::try_from(self.current.constants.len())
            .map_err(|_| self.error(span, "too many constants"))?;
        self.current.constants.push(value);
        self.current.constant_map.insert(key, idx);
        Ok(idx)
    }

    fn string_constant(&mut self, s: &str, span: Span) -> Result<u16> {
        self.constant(Value::string(s), span)
    }

    fn error(&self, span: Span, message: &str) -> Error {
        Error::syntax(message, span.line, span.column)
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::StrictEq => Opcode::StrictEq,
        BinaryOp::StrictNe => Opcode::StrictNe,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::BitAnd => Opcode::BitAnd,
        BinaryOp::BitOr => Opcode::BitOr,
        BinaryOp::BitXor => Opcode::BitXor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
        BinaryOp::UShr => Opcode::UShr,
        BinaryOp::In => Opcode::In,
    }
}

/// Parses and compiles source consisting of exactly one function expression.
///
/// # Errors
/// Returns a syntax error if the source does not compile.
pub fn compile_function(source: &str) -> Result<Rc<FunctionProto>> {
    let node = parser::parse_function(source)?;
    Compiler::new().compile_function(&node)
}

/// Parses and compiles a program.
///
/// # Errors
/// Returns a syntax error if the source does not compile.
pub fn compile_program(source: &str) -> Result<Rc<FunctionProto>> {
    let program = parser::parse_program(source)?;
    Compiler::new().compile_program(&program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_fn(source: &str) -> Rc<FunctionProto> {
        compile_function(source).expect("compile failed")
    }

    #[test]
    fn compile_simple_function() {
        let proto = compile_fn("function(a, b) { return a + b }");
        assert_eq!(proto.arity, 2);
        assert_eq!(proto.locals_count, 2);
        assert_eq!(
            &proto.code.ops[..4],
            &[
                Opcode::LoadLocal(0),
                Opcode::LoadLocal(1),
                Opcode::Add,
                Opcode::Return,
            ]
        );
    }

    #[test]
    fn compile_free_names_are_globals() {
        let proto = compile_fn("function() { return feature }");
        assert!(matches!(proto.code.ops[0], Opcode::LoadGlobal(_)));
        assert_eq!(proto.constants[0], Value::from("feature"));
    }

    #[test]
    fn compile_constants_are_deduplicated() {
        let proto = compile_fn("function() { return 'a' + 'a' + 1 + 1 }");
        assert_eq!(proto.constants.len(), 2);
    }

    #[test]
    fn compile_captured_locals_use_cells() {
        let proto = compile_fn("function(x) { var y = 1; return function() { return x + y } }");
        assert_eq!(proto.cells_count, 2);
        assert_eq!(proto.param_cells, vec![(0, 0)]);
        let inner = &proto.functions[0];
        assert_eq!(
            inner.upvalues,
            vec![UpvalueSource::Cell(0), UpvalueSource::Cell(1)]
        );
    }

    #[test]
    fn compile_transitive_captures_chain_upvalues() {
        let proto =
            compile_fn("function(x) { return function() { return function() { return x } } }");
        let middle = &proto.functions[0];
        let inner = &middle.functions[0];
        assert_eq!(middle.upvalues, vec![UpvalueSource::Cell(0)]);
        assert_eq!(inner.upvalues, vec![UpvalueSource::Upvalue(0)]);
    }

    #[test]
    fn compile_named_expression_binds_itself() {
        let proto = compile_fn("function fact(n) { return n <= 1 ? 1 : n * fact(n - 1) }");
        assert_eq!(proto.code.ops[0], Opcode::LoadCallee);
        assert_eq!(proto.name.as_deref(), Some("fact"));
    }

    #[test]
    fn compile_typeof_undeclared_global() {
        let proto = compile_fn("function() { return typeof nothing }");
        assert!(matches!(proto.code.ops[0], Opcode::TypeOfGlobal(_)));
    }

    #[test]
    fn compile_rejects_const_assignment() {
        let err = compile_function("function() { const a = 1; a = 2 }").expect_err("const");
        assert!(err.to_string().contains("constant"));
    }

    #[test]
    fn compile_rejects_stray_break() {
        assert!(compile_function("function() { break }").is_err());
        assert!(compile_function("function() { while (1) { break } }").is_ok());
    }

    #[test]
    fn compile_program_declares_globals() {
        let proto = compile_program("var a = 1; function f() {} a").expect("compile");
        assert!(matches!(proto.code.ops[0], Opcode::DeclareGlobal(_)));
        assert_eq!(proto.name.as_deref(), Some(PROGRAM_NAME));
        assert_eq!(proto.code.ops.last(), Some(&Opcode::Return));
    }

    #[test]
    fn compile_line_table_follows_source() {
        let proto = compile_fn("function() {\n  var a = 1\n  return a\n}");
        let return_idx = proto
            .code
            .ops
            .iter()
            .position(|op| *op == Opcode::Return)
            .expect("return");
        assert_eq!(proto.code.line_at(return_idx), Some(3));
    }
}
