//! Stack-based virtual machine for stylescript bytecode.
//!
//! The VM executes compiled functions on one value stack that is shared with
//! the embedding API: the embedder pushes a function and its arguments,
//! calls [`Vm::call`], and finds the result in the function's slot.
//!
//! # Host Access
//!
//! Property reads on host objects are forwarded to the [`HostContext`]
//! passed to the call. When no host is involved, pass [`NoHost`].
//!
//! # Errors
//!
//! Script errors are recoverable: a failed call leaves the stack exactly as
//! deep as it was before the function was pushed. Broken internal
//! invariants and heap exhaustion are fatal and go to the configured
//! [`FatalHandler`].

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]

mod context;
mod native;

pub use context::{HostContext, NoHost};

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use stylescript_foundation::{Error, ErrorContext, ErrorKind, Result};
use tracing::{debug, error};

use crate::compiler::{self, FunctionProto, UpvalueSource};
use crate::heap::{DEFAULT_GC_THRESHOLD, Heap, HeapStats};
use crate::object::{Closure, Object, ObjectKind, Upvalue};
use crate::opcode::Opcode;
use crate::value::{ObjectRef, Value};
use native::{MethodTables, add_values, bit_not, compare_values, shift_count};

/// Callback for unrecoverable engine failures. Must not return.
pub type FatalHandler = fn(&str) -> !;

/// Default maximum number of nested script calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Default maximum number of values on the stack.
pub const DEFAULT_MAX_STACK: usize = 65_536;

/// Largest gap an array write may open past the current length.
const MAX_ARRAY_GAP: usize = 1 << 20;

/// Logs the failure and aborts the process.
pub fn default_fatal_handler(message: &str) -> ! {
    error!(reason = message, "fatal script engine error");
    std::process::abort()
}

/// VM limits and callbacks.
#[derive(Clone, Copy)]
pub struct VmConfig {
    /// Maximum number of nested script calls before a `RangeError`.
    pub max_call_depth: usize,
    /// Maximum number of stack values before a `RangeError`.
    pub max_stack: usize,
    /// Allocations between cycle collections.
    pub gc_threshold: usize,
    /// Maximum number of live heap objects; exceeding it is fatal.
    pub max_heap_objects: Option<usize>,
    /// Called on unrecoverable failures.
    pub fatal_handler: FatalHandler,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack: DEFAULT_MAX_STACK,
            gc_threshold: DEFAULT_GC_THRESHOLD,
            max_heap_objects: None,
            fatal_handler: default_fatal_handler,
        }
    }
}

impl fmt::Debug for VmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmConfig")
            .field("max_call_depth", &self.max_call_depth)
            .field("max_stack", &self.max_stack)
            .field("gc_threshold", &self.gc_threshold)
            .field("max_heap_objects", &self.max_heap_objects)
            .finish_non_exhaustive()
    }
}

impl VmConfig {
    /// Sets the maximum call depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Sets the maximum stack size.
    #[must_use]
    pub fn with_max_stack(mut self, values: usize) -> Self {
        self.max_stack = values;
        self
    }

    /// Sets the number of allocations between collections.
    #[must_use]
    pub fn with_gc_threshold(mut self, allocations: usize) -> Self {
        self.gc_threshold = allocations;
        self
    }

    /// Sets the live-object limit.
    #[must_use]
    pub fn with_max_heap_objects(mut self, limit: Option<usize>) -> Self {
        self.max_heap_objects = limit;
        self
    }

    /// Sets the fatal error handler.
    #[must_use]
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.fatal_handler = handler;
        self
    }
}

/// An active script call.
struct Frame {
    /// The function object being executed.
    callee: ObjectRef,
    proto: Rc<FunctionProto>,
    upvalues: Vec<Upvalue>,
    cells: Vec<Upvalue>,
    this: Value,
    ip: usize,
    /// Stack index of the first local slot.
    base: usize,
}

enum Callee {
    Script(Rc<FunctionProto>, Vec<Upvalue>),
    Native(crate::object::NativeFunction),
}

/// Stack-based virtual machine.
pub struct Vm {
    /// Value stack shared by script frames and the embedder.
    stack: Vec<Value>,
    /// Active script calls, innermost last.
    frames: Vec<Frame>,
    /// Global variables.
    globals: HashMap<Rc<str>, Value>,
    /// Embedder values kept alive without being visible to scripts.
    stash: HashMap<String, Value>,
    /// Builtin methods of primitives.
    methods: MethodTables,
    heap: Heap,
    config: VmConfig,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("stack_len", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("globals", &self.globals.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Vm {
    /// Creates a VM with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Creates a VM with the given configuration.
    #[must_use]
    pub fn with_config(config: VmConfig) -> Self {
        let mut heap = Heap::new(config.gc_threshold, None);
        let mut globals = HashMap::new();
        let methods = match native::install_globals(&mut heap, &mut globals)
            .and_then(|()| MethodTables::new(&mut heap))
        {
            Ok(methods) => methods,
            Err(err) => (config.fatal_handler)(&err.to_string()),
        };
        heap.set_limit(config.max_heap_objects);
        Self {
            stack: Vec::with_capacity(256),
            frames: Vec::new(),
            globals,
            stash: HashMap::new(),
            methods,
            heap,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    // =========================================================================
    // Stack
    // =========================================================================

    /// Pushes a value.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops the top value.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Returns the top value.
    #[must_use]
    pub fn top(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Returns the number of values on the stack.
    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Truncates the stack to `len` values, or pads it with `undefined`.
    pub fn set_stack_len(&mut self, len: usize) {
        self.stack.resize(len, Value::Undefined);
    }

    /// Returns the value at stack index `idx`.
    #[must_use]
    pub fn value_at(&self, idx: usize) -> Option<&Value> {
        self.stack.get(idx)
    }

    /// Pushes a copy of the value at `idx`. Returns false if `idx` is invalid.
    pub fn dup(&mut self, idx: usize) -> bool {
        match self.stack.get(idx) {
            Some(value) => {
                let value = value.clone();
                self.stack.push(value);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Globals and Stash
    // =========================================================================

    /// Returns a global variable.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Defines or overwrites a global variable.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(Rc::from(name), value);
    }

    /// Pushes a global variable (`undefined` if it does not exist).
    pub fn push_global(&mut self, name: &str) {
        let value = self.globals.get(name).cloned().unwrap_or_default();
        self.stack.push(value);
    }

    /// Pops the top value into a global variable.
    ///
    /// # Errors
    /// Returns an internal error if the stack is empty.
    pub fn put_global(&mut self, name: &str) -> Result<()> {
        let value = self
            .stack
            .pop()
            .ok_or_else(|| Error::internal("put_global on an empty stack"))?;
        self.set_global(name, value);
        Ok(())
    }

    /// Stores a value that stays alive without being visible to scripts.
    pub fn stash_put(&mut self, key: &str, value: Value) {
        self.stash.insert(key.to_string(), value);
    }

    /// Returns a stashed value.
    #[must_use]
    pub fn stash_get(&self, key: &str) -> Option<&Value> {
        self.stash.get(key)
    }

    /// Removes a stashed value.
    pub fn stash_remove(&mut self, key: &str) -> Option<Value> {
        self.stash.remove(key)
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Allocates an empty object.
    pub fn new_object(&mut self) -> Value {
        Value::Object(self.alloc(Object::new(ObjectKind::Ordinary)))
    }

    /// Allocates an array.
    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::Object(self.alloc(Object::new(ObjectKind::Array(items))))
    }

    /// Allocates a host object whose property reads go to the [`HostContext`].
    pub fn new_host_object(&mut self, id: u32) -> Value {
        Value::Object(self.alloc(Object::new(ObjectKind::Host(id))))
    }

    /// Compiles source consisting of one function expression into a function value.
    ///
    /// # Errors
    /// Returns a `SyntaxError` if the source does not compile.
    pub fn compile_function(&mut self, source: &str) -> Result<Value> {
        let proto = compiler::compile_function(source)?;
        Ok(self.instantiate(proto))
    }

    fn instantiate(&mut self, proto: Rc<FunctionProto>) -> Value {
        let closure = Closure {
            proto,
            upvalues: Vec::new(),
        };
        Value::Object(self.alloc(Object::new(ObjectKind::Function(closure))))
    }

    fn alloc(&mut self, object: Object) -> ObjectRef {
        match self.heap.alloc(object) {
            Ok(obj) => obj,
            Err(err) => self.fatal(&err.to_string()),
        }
    }

    fn fatal(&self, message: &str) -> ! {
        (self.config.fatal_handler)(message)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Calls a function with `nargs` arguments: `[func, args...] -> [result]`.
    ///
    /// On error the function and its arguments are removed, leaving the stack
    /// as deep as it was before the function was pushed.
    ///
    /// # Errors
    /// Returns the script error that ended the call.
    pub fn call(&mut self, nargs: usize, host: &mut dyn HostContext) -> Result<()> {
        let Some(func_idx) = self.stack.len().checked_sub(nargs + 1) else {
            return Err(Error::internal(format!(
                "call with {nargs} arguments on a stack of {}",
                self.stack.len()
            )));
        };
        if self.frames.is_empty() && self.heap.should_collect() {
            self.collect_garbage();
        }
        self.stack.insert(func_idx + 1, Value::Undefined);

        let depth = self.frames.len();
        let result = match self.call_at(func_idx, nargs) {
            Ok(true) => self.run(depth, host),
            Ok(false) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.frames.truncate(depth);
            self.stack.truncate(func_idx);
            if let ErrorKind::HeapExhausted { .. } = err.kind {
                self.fatal(&err.to_string());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Calls `func` with `args` and returns its result.
    ///
    /// # Errors
    /// Returns the script error that ended the call.
    pub fn call_value(
        &mut self,
        func: Value,
        args: &[Value],
        host: &mut dyn HostContext,
    ) -> Result<Value> {
        self.stack.push(func);
        self.stack.extend_from_slice(args);
        self.call(args.len(), host)?;
        Ok(self.pop_value())
    }

    /// Compiles and runs program text in the global scope.
    ///
    /// Returns the value of the last expression statement.
    ///
    /// # Errors
    /// Returns a `SyntaxError` or the script error that ended the program.
    pub fn eval(&mut self, source: &str, host: &mut dyn HostContext) -> Result<Value> {
        let proto = compiler::compile_program(source)?;
        let program = self.instantiate(proto);
        self.call_value(program, &[], host)
    }

    /// Prepares the call of the value at `callee_idx` (`[callee, this, args...]`).
    ///
    /// Native functions run to completion; script functions get a frame.
    /// Returns true if a frame was pushed.
    fn call_at(&mut self, callee_idx: usize, argc: usize) -> Result<bool> {
        let callee = self.stack[callee_idx].clone();
        let target = match &callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Function(closure) => Some(Callee::Script(
                    Rc::clone(&closure.proto),
                    closure.upvalues.clone(),
                )),
                ObjectKind::Native(native) => Some(Callee::Native(*native)),
                _ => None,
            },
            _ => None,
        };
        match (target, callee) {
            (Some(Callee::Native(native)), _) => {
                let this = self.stack[callee_idx + 1].clone();
                let result = (native.func)(&mut self.heap, &this, &self.stack[callee_idx + 2..])?;
                self.stack.truncate(callee_idx);
                self.stack.push(result);
                Ok(false)
            }
            (Some(Callee::Script(proto, upvalues)), Value::Object(obj)) => {
                self.push_frame(obj, proto, upvalues, callee_idx, argc)?;
                Ok(true)
            }
            (_, callee) => Err(Error::type_error(format!("{callee} is not a function"))),
        }
    }

    fn push_frame(
        &mut self,
        callee: ObjectRef,
        proto: Rc<FunctionProto>,
        upvalues: Vec<Upvalue>,
        callee_idx: usize,
        argc: usize,
    ) -> Result<()> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(Error::range("Maximum call stack size exceeded"));
        }
        let base = callee_idx + 2;
        let locals = usize::from(proto.locals_count);
        if base + locals >= self.config.max_stack {
            return Err(Error::range("Script stack overflow"));
        }
        self.stack.truncate(base + argc.min(usize::from(proto.arity)));
        self.stack.resize(base + locals, Value::Undefined);

        let cells: Vec<Upvalue> = (0..proto.cells_count)
            .map(|_| Rc::new(RefCell::new(Value::Undefined)))
            .collect();
        for &(slot, cell) in &proto.param_cells {
            if let Some(cell) = cells.get(usize::from(cell)) {
                *cell.borrow_mut() = self.stack[base + usize::from(slot)].clone();
            }
        }
        let this = self.stack[callee_idx + 1].clone();
        self.frames.push(Frame {
            callee,
            proto,
            upvalues,
            cells,
            this,
            ip: 0,
            base,
        });
        Ok(())
    }

    /// Runs until the frame count drops back to `stop`.
    fn run(&mut self, stop: usize, host: &mut dyn HostContext) -> Result<()> {
        while self.frames.len() > stop {
            if let Err(err) = self.step(host) {
                return Err(self.annotate(err));
            }
        }
        Ok(())
    }

    /// Attaches the failing line and the script call stack to an error.
    fn annotate(&self, err: Error) -> Error {
        if err.context.is_some() {
            return err;
        }
        let mut context = ErrorContext::new();
        if let Some(frame) = self.frames.last() {
            context = context.with_source(frame.proto.display_name());
            if let Some(line) = frame.proto.code.line_at(frame.ip.saturating_sub(1)) {
                context = context.with_line(line);
            }
        }
        for frame in self.frames.iter().rev() {
            context = context.with_frame(frame.proto.display_name());
        }
        err.with_context(context)
    }

    // =========================================================================
    // Interpreter
    // =========================================================================

    fn frame(&self) -> &Frame {
        let handler = self.config.fatal_handler;
        self.frames
            .last()
            .unwrap_or_else(|| handler("no active frame"))
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let handler = self.config.fatal_handler;
        self.frames
            .last_mut()
            .unwrap_or_else(|| handler("no active frame"))
    }

    fn pop_value(&mut self) -> Value {
        let handler = self.config.fatal_handler;
        self.stack
            .pop()
            .unwrap_or_else(|| handler("value stack underflow"))
    }

    fn peek(&self, distance: usize) -> Value {
        let handler = self.config.fatal_handler;
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|idx| self.stack.get(idx))
            .cloned()
            .unwrap_or_else(|| handler("value stack underflow"))
    }

    fn local_index(&self, slot: u16) -> usize {
        self.frame().base + usize::from(slot)
    }

    fn jump(&mut self, offset: i32) {
        let frame = self.frame_mut();
        frame.ip = (frame.ip as isize + offset as isize) as usize;
    }

    fn name_constant(proto: &FunctionProto, k: u16) -> Result<Rc<str>> {
        match proto.constants.get(usize::from(k)) {
            Some(Value::String(name)) => Ok(Rc::clone(name)),
            _ => Err(Error::internal(format!("constant {k} is not a name"))),
        }
    }

    fn push_number(&mut self, n: f64) {
        self.stack.push(Value::Number(n));
    }

    fn binary_numeric(&mut self, op: fn(f64, f64) -> f64) {
        let b = self.pop_value();
        let a = self.pop_value();
        self.push_number(op(a.to_number(), b.to_number()));
    }

    fn binary_int32(&mut self, op: fn(i32, i32) -> i32) {
        let b = self.pop_value();
        let a = self.pop_value();
        self.push_number(f64::from(op(a.to_int32(), b.to_int32())));
    }

    fn compare(&mut self, accept: fn(Ordering) -> bool) {
        let b = self.pop_value();
        let a = self.pop_value();
        let result = compare_values(a, b).is_some_and(accept);
        self.stack.push(Value::Bool(result));
    }

    /// Executes one instruction of the innermost frame.
    fn step(&mut self, host: &mut dyn HostContext) -> Result<()> {
        let frame = self.frame_mut();
        let proto = Rc::clone(&frame.proto);
        let Some(&op) = proto.code.ops.get(frame.ip) else {
            return Err(Error::internal("instruction pointer out of range"));
        };
        frame.ip += 1;

        match op {
            // === Stack Operations ===
            Opcode::Const(k) => {
                let value = proto
                    .constants
                    .get(usize::from(k))
                    .cloned()
                    .ok_or_else(|| Error::internal(format!("constant {k} out of range")))?;
                self.stack.push(value);
            }
            Opcode::Undefined => self.stack.push(Value::Undefined),
            Opcode::Null => self.stack.push(Value::Null),
            Opcode::True => self.stack.push(Value::Bool(true)),
            Opcode::False => self.stack.push(Value::Bool(false)),
            Opcode::Pop => {
                self.pop_value();
            }
            Opcode::Dup => {
                let value = self.peek(0);
                self.stack.push(value);
            }
            Opcode::Dup2 => {
                let a = self.peek(1);
                let b = self.peek(0);
                self.stack.push(a);
                self.stack.push(b);
            }
            Opcode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    self.fatal("value stack underflow");
                }
                self.stack.swap(len - 1, len - 2);
            }

            // === Variables ===
            Opcode::LoadLocal(slot) => {
                let idx = self.local_index(slot);
                let value = self.stack[idx].clone();
                self.stack.push(value);
            }
            Opcode::StoreLocal(slot) => {
                let idx = self.local_index(slot);
                self.stack[idx] = self.peek(0);
            }
            Opcode::LoadCell(cell) => {
                let value = self.frame().cells[usize::from(cell)].borrow().clone();
                self.stack.push(value);
            }
            Opcode::StoreCell(cell) => {
                let value = self.peek(0);
                *self.frame().cells[usize::from(cell)].borrow_mut() = value;
            }
            Opcode::LoadUpvalue(idx) => {
                let value = self.frame().upvalues[usize::from(idx)].borrow().clone();
                self.stack.push(value);
            }
            Opcode::StoreUpvalue(idx) => {
                let value = self.peek(0);
                *self.frame().upvalues[usize::from(idx)].borrow_mut() = value;
            }
            Opcode::LoadGlobal(k) => {
                let name = Self::name_constant(&proto, k)?;
                let value = self
                    .globals
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| Error::reference(format!("{name} is not defined")))?;
                self.stack.push(value);
            }
            Opcode::StoreGlobal(k) => {
                let name = Self::name_constant(&proto, k)?;
                let value = self.peek(0);
                self.globals.insert(name, value);
            }
            Opcode::TypeOfGlobal(k) => {
                let name = Self::name_constant(&proto, k)?;
                let type_name = self.globals.get(&name).map_or("undefined", Value::type_of);
                self.stack.push(Value::from(type_name));
            }
            Opcode::DeclareGlobal(k) => {
                let name = Self::name_constant(&proto, k)?;
                self.globals.entry(name).or_insert(Value::Undefined);
            }
            Opcode::LoadCallee => {
                let callee = Value::Object(self.frame().callee.clone());
                self.stack.push(callee);
            }
            Opcode::LoadThis => {
                let this = self.frame().this.clone();
                self.stack.push(this);
            }

            // === Properties ===
            Opcode::GetProp(k) => {
                let name = Self::name_constant(&proto, k)?;
                let target = self.pop_value();
                let value = self.get_property(&target, &name, host)?;
                self.stack.push(value);
            }
            Opcode::SetProp(k) => {
                let name = Self::name_constant(&proto, k)?;
                let value = self.pop_value();
                let target = self.pop_value();
                self.set_property(&target, &name, value.clone())?;
                self.stack.push(value);
            }
            Opcode::GetIndex => {
                let key = self.pop_value();
                let target = self.pop_value();
                let value = self.get_index(&target, &key, host)?;
                self.stack.push(value);
            }
            Opcode::SetIndex => {
                let value = self.pop_value();
                let key = self.pop_value();
                let target = self.pop_value();
                self.set_index(&target, &key, value.clone())?;
                self.stack.push(value);
            }

            // === Literals ===
            Opcode::NewArray(count) => {
                let start = self
                    .stack
                    .len()
                    .checked_sub(usize::from(count))
                    .unwrap_or_else(|| self.fatal("value stack underflow"));
                let items = self.stack.split_off(start);
                let array = self.heap.alloc_array(items)?;
                self.stack.push(array);
            }
            Opcode::NewObject => {
                let object = self.heap.alloc_object()?;
                self.stack.push(object);
            }
            Opcode::InitProp(k) => {
                let name = Self::name_constant(&proto, k)?;
                let value = self.pop_value();
                if let Value::Object(obj) = self.peek(0) {
                    obj.borrow_mut().properties.set(name, value);
                }
            }
            Opcode::MakeClosure(idx) => {
                let child = proto
                    .functions
                    .get(usize::from(idx))
                    .cloned()
                    .ok_or_else(|| Error::internal(format!("function {idx} out of range")))?;
                let frame = self.frame();
                let upvalues = child
                    .upvalues
                    .iter()
                    .map(|source| match *source {
                        UpvalueSource::Cell(cell) => Rc::clone(&frame.cells[usize::from(cell)]),
                        UpvalueSource::Upvalue(up) => Rc::clone(&frame.upvalues[usize::from(up)]),
                    })
                    .collect();
                let closure = self.heap.alloc(Object::new(ObjectKind::Function(Closure {
                    proto: child,
                    upvalues,
                })))?;
                self.stack.push(Value::Object(closure));
            }

            // === Arithmetic ===
            Opcode::Add => {
                let b = self.pop_value();
                let a = self.pop_value();
                self.stack.push(add_values(a, b));
            }
            Opcode::Sub => self.binary_numeric(|a, b| a - b),
            Opcode::Mul => self.binary_numeric(|a, b| a * b),
            Opcode::Div => self.binary_numeric(|a, b| a / b),
            Opcode::Mod => self.binary_numeric(|a, b| a % b),
            Opcode::Neg => {
                let a = self.pop_value();
                self.push_number(-a.to_number());
            }
            Opcode::ToNumber => {
                let a = self.pop_value();
                self.push_number(a.to_number());
            }

            // === Bitwise ===
            Opcode::BitAnd => self.binary_int32(|a, b| a & b),
            Opcode::BitOr => self.binary_int32(|a, b| a | b),
            Opcode::BitXor => self.binary_int32(|a, b| a ^ b),
            Opcode::BitNot => {
                let a = self.pop_value();
                self.push_number(bit_not(&a));
            }
            Opcode::Shl => {
                let b = self.pop_value();
                let a = self.pop_value();
                self.push_number(f64::from(a.to_int32().wrapping_shl(shift_count(&b))));
            }
            Opcode::Shr => {
                let b = self.pop_value();
                let a = self.pop_value();
                self.push_number(f64::from(a.to_int32() >> shift_count(&b)));
            }
            Opcode::UShr => {
                let b = self.pop_value();
                let a = self.pop_value();
                self.push_number(f64::from(a.to_uint32() >> shift_count(&b)));
            }

            // === Comparison ===
            Opcode::Eq | Opcode::Ne | Opcode::StrictEq | Opcode::StrictNe => {
                let b = self.pop_value();
                let a = self.pop_value();
                let result = match op {
                    Opcode::Eq => a.loose_equals(&b),
                    Opcode::Ne => !a.loose_equals(&b),
                    Opcode::StrictEq => a.strict_equals(&b),
                    _ => !a.strict_equals(&b),
                };
                self.stack.push(Value::Bool(result));
            }
            Opcode::Lt => self.compare(|o| o == Ordering::Less),
            Opcode::Le => self.compare(|o| o != Ordering::Greater),
            Opcode::Gt => self.compare(|o| o == Ordering::Greater),
            Opcode::Ge => self.compare(|o| o != Ordering::Less),
            Opcode::In => {
                let target = self.pop_value();
                let key = self.pop_value();
                let found = self.has_property(&target, &key, host)?;
                self.stack.push(Value::Bool(found));
            }

            // === Logic ===
            Opcode::Not => {
                let a = self.pop_value();
                self.stack.push(Value::Bool(!a.to_boolean()));
            }
            Opcode::TypeOf => {
                let a = self.pop_value();
                self.stack.push(Value::from(a.type_of()));
            }

            // === Control Flow ===
            Opcode::Jump(offset) => self.jump(offset),
            Opcode::JumpIfFalse(offset) => {
                if !self.pop_value().to_boolean() {
                    self.jump(offset);
                }
            }
            Opcode::JumpIfTrue(offset) => {
                if self.pop_value().to_boolean() {
                    self.jump(offset);
                }
            }
            Opcode::JumpIfFalseKeep(offset) => {
                if !self.peek(0).to_boolean() {
                    self.jump(offset);
                }
            }
            Opcode::JumpIfTrueKeep(offset) => {
                if self.peek(0).to_boolean() {
                    self.jump(offset);
                }
            }
            Opcode::Call(argc) => {
                let argc = usize::from(argc);
                let callee_idx = self
                    .stack
                    .len()
                    .checked_sub(argc + 2)
                    .unwrap_or_else(|| self.fatal("value stack underflow"));
                self.call_at(callee_idx, argc)?;
            }
            Opcode::Return => {
                let result = self.pop_value();
                let handler = self.config.fatal_handler;
                let frame = self
                    .frames
                    .pop()
                    .unwrap_or_else(|| handler("no active frame"));
                self.stack.truncate(frame.base - 2);
                self.stack.push(result);
            }
            Opcode::Throw => {
                let value = self.pop_value();
                return Err(Error::thrown(thrown_message(&value)));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Property Access
    // =========================================================================

    /// Reads `target[key]` for a string key.
    ///
    /// # Errors
    /// Returns a `TypeError` when `target` is `undefined` or `null`.
    pub fn get_property(
        &self,
        target: &Value,
        key: &str,
        host: &mut dyn HostContext,
    ) -> Result<Value> {
        match target {
            Value::Undefined | Value::Null => Err(Error::type_error(format!(
                "Cannot read property '{key}' of {target}"
            ))),
            Value::Bool(_) => Ok(Value::Undefined),
            Value::Number(_) => Ok(self.methods.number.get(key).cloned().unwrap_or_default()),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(native::char_len(s) as f64));
                }
                if let Some(idx) = array_index(key) {
                    return Ok(char_value(s, idx));
                }
                Ok(self.methods.string.get(key).cloned().unwrap_or_default())
            }
            Value::Object(obj) => {
                let object = obj.borrow();
                if let ObjectKind::Host(id) = object.kind {
                    drop(object);
                    return Ok(host.get(id, key));
                }
                if let Some(value) = object.properties.get(key) {
                    return Ok(value.clone());
                }
                let value = match &object.kind {
                    ObjectKind::Array(items) => {
                        if key == "length" {
                            Value::Number(items.len() as f64)
                        } else if let Some(idx) = array_index(key) {
                            items.get(idx).cloned().unwrap_or_default()
                        } else {
                            self.methods.array.get(key).cloned().unwrap_or_default()
                        }
                    }
                    ObjectKind::Function(closure) => match key {
                        "length" => Value::Number(f64::from(closure.proto.arity)),
                        "name" => Value::from(closure.proto.name.as_deref().unwrap_or("")),
                        _ => Value::Undefined,
                    },
                    ObjectKind::Native(native) => match key {
                        "length" => Value::Number(f64::from(native.arity)),
                        "name" => Value::from(native.name),
                        _ => Value::Undefined,
                    },
                    ObjectKind::Ordinary | ObjectKind::Host(_) => Value::Undefined,
                };
                Ok(value)
            }
        }
    }

    /// Reads `target[key]` for an arbitrary key value.
    ///
    /// # Errors
    /// Returns a `TypeError` when `target` is `undefined` or `null`.
    pub fn get_index(
        &self,
        target: &Value,
        key: &Value,
        host: &mut dyn HostContext,
    ) -> Result<Value> {
        if let Some(idx) = number_index(key) {
            match target {
                Value::String(s) => return Ok(char_value(s, idx)),
                Value::Object(obj) => {
                    if let ObjectKind::Array(items) = &obj.borrow().kind {
                        return Ok(items.get(idx).cloned().unwrap_or_default());
                    }
                }
                _ => {}
            }
        }
        self.get_property(target, &key.to_js_string(), host)
    }

    /// Writes `target[key] = value` for a string key.
    ///
    /// Writes to host objects and primitives are ignored.
    ///
    /// # Errors
    /// Returns a `TypeError` when `target` is `undefined` or `null`, or a
    /// `RangeError` for an invalid array length.
    pub fn set_property(&mut self, target: &Value, key: &str, value: Value) -> Result<()> {
        match target {
            Value::Undefined | Value::Null => Err(Error::type_error(format!(
                "Cannot set property '{key}' of {target}"
            ))),
            Value::Object(obj) => {
                let mut guard = obj.borrow_mut();
                let object: &mut Object = &mut guard;
                match &mut object.kind {
                    ObjectKind::Host(_) => {}
                    ObjectKind::Array(items) => {
                        if key == "length" {
                            set_array_length(items, &value)?;
                        } else if let Some(idx) = array_index(key) {
                            set_array_item(items, idx, value)?;
                        } else {
                            object.properties.set(key, value);
                        }
                    }
                    _ => object.properties.set(key, value),
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Writes `target[key] = value` for an arbitrary key value.
    ///
    /// # Errors
    /// See [`Vm::set_property`].
    pub fn set_index(&mut self, target: &Value, key: &Value, value: Value) -> Result<()> {
        if let (Some(idx), Value::Object(obj)) = (number_index(key), target) {
            if let ObjectKind::Array(items) = &mut obj.borrow_mut().kind {
                return set_array_item(items, idx, value);
            }
        }
        self.set_property(target, &key.to_js_string(), value)
    }

    /// Answers `key in target`.
    ///
    /// # Errors
    /// Returns a `TypeError` when `target` is not an object.
    pub fn has_property(
        &self,
        target: &Value,
        key: &Value,
        host: &mut dyn HostContext,
    ) -> Result<bool> {
        let Value::Object(obj) = target else {
            return Err(Error::type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {target}",
                key.to_js_string()
            )));
        };
        let key = key.to_js_string();
        let object = obj.borrow();
        if let ObjectKind::Host(id) = object.kind {
            drop(object);
            return Ok(host.has(id, &key));
        }
        if object.properties.contains(&key) {
            return Ok(true);
        }
        Ok(match &object.kind {
            ObjectKind::Array(items) => {
                &*key == "length" || array_index(&key).is_some_and(|idx| idx < items.len())
            }
            ObjectKind::Function(_) | ObjectKind::Native(_) => {
                matches!(&*key, "length" | "name")
            }
            ObjectKind::Ordinary | ObjectKind::Host(_) => false,
        })
    }

    // =========================================================================
    // Garbage Collection
    // =========================================================================

    /// Clears objects that are only kept alive by reference cycles.
    ///
    /// Roots are the stack, globals, stash, builtin methods, and active frames.
    /// Returns the number of objects cleared.
    pub fn collect_garbage(&mut self) -> usize {
        let mut marker = self.heap.marker();
        for value in self
            .stack
            .iter()
            .chain(self.globals.values())
            .chain(self.stash.values())
            .chain(self.methods.values())
        {
            marker.mark(value);
        }
        for frame in &self.frames {
            marker.mark(&Value::Object(frame.callee.clone()));
            marker.mark(&frame.this);
            for upvalue in frame.cells.iter().chain(&frame.upvalues) {
                marker.mark_upvalue(upvalue);
            }
        }
        let cleared = self.heap.sweep(&mut marker);
        debug!(
            cleared,
            live = self.heap.stats().live_objects,
            "collected script heap"
        );
        cleared
    }

    /// Returns heap statistics.
    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        self.frames.clear();
        self.stack.clear();
        self.globals.clear();
        self.stash.clear();
        self.methods = MethodTables::default();
        self.heap.clear_all();
    }
}

/// Message for a thrown value; objects with a `message` use it.
fn thrown_message(value: &Value) -> String {
    if let Value::Object(obj) = value {
        if let Some(message) = obj.borrow().properties.get("message") {
            return message.to_js_string().to_string();
        }
    }
    value.to_js_string().to_string()
}

/// Parses a canonical array index (`"0"`, `"17"`, not `"017"` or `"+1"`).
fn array_index(key: &str) -> Option<usize> {
    let first = *key.as_bytes().first()?;
    if !first.is_ascii_digit() || (first == b'0' && key.len() > 1) {
        return None;
    }
    key.parse().ok()
}

/// Returns the index for a numeric key that is a non-negative integer.
fn number_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < 4_294_967_295.0 => {
            Some(*n as usize)
        }
        _ => None,
    }
}

fn char_value(s: &str, idx: usize) -> Value {
    native::char_at(s, idx).map_or(Value::Undefined, |c| Value::from(c.to_string()))
}

fn set_array_item(items: &mut Vec<Value>, idx: usize, value: Value) -> Result<()> {
    if idx < items.len() {
        items[idx] = value;
    } else if idx - items.len() <= MAX_ARRAY_GAP {
        items.resize(idx, Value::Undefined);
        items.push(value);
    } else {
        return Err(Error::range("Invalid array length"));
    }
    Ok(())
}

fn set_array_length(items: &mut Vec<Value>, value: &Value) -> Result<()> {
    let n = value.to_number();
    if n < 0.0 || n.fract() != 0.0 || n as usize > items.len() + MAX_ARRAY_GAP {
        return Err(Error::range("Invalid array length"));
    }
    items.resize(n as usize, Value::Undefined);
    Ok(())
}
