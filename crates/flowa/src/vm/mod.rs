//! The stack-based virtual machine.
//!
//! A single-threaded interpreter over the compiler's bytecode. The dispatch
//! loop caches the current frame's function, instruction pointer, and base
//! pointer in locals and flushes them back only when suspending (calls,
//! imports, the serve loop) — no helper on the arithmetic hot path re-reads
//! VM fields.
//!
//! Failure semantics: a runtime error unwinds every frame and surfaces one
//! `RuntimeError` (carrying the failing instruction pointer) to the
//! embedder. There is no language-level catch.

mod import;
pub(crate) mod ops;
mod serve;

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    builtins::{self, Builtin},
    bytecode::{Bytecode, CompiledFunction, Opcode},
    error::RuntimeError,
    io::PrintWriter,
    value::{
        array_value, bool_value, int_value, map_from_pairs, null_value, str_value, Value, ValueRef,
    },
};
pub use serve::RouteTable;

/// Frame-stack capacity; effectively the recursion limit.
pub const MAX_FRAMES: usize = 1024;
/// Initial value-stack capacity. The stack may grow beyond this.
const INITIAL_STACK: usize = 2048;

/// Path-keyed module cache, shared between a VM and the nested VMs its
/// imports create.
pub type ImportCache = Rc<RefCell<AHashMap<PathBuf, ValueRef>>>;

/// A per-call activation record.
#[derive(Debug)]
struct Frame {
    func: Rc<CompiledFunction>,
    ip: usize,
    base_pointer: usize,
}

/// The virtual machine.
pub struct Vm<'w> {
    constants: Vec<ValueRef>,
    stack: Vec<ValueRef>,
    frames: Vec<Frame>,
    globals: Vec<ValueRef>,
    builtins: Vec<ValueRef>,
    import_cache: ImportCache,
    base_dir: PathBuf,
    routes: RouteTable,
    middleware: Vec<ValueRef>,
    /// Serve at most this many requests before `listen` returns. Tests use
    /// this; production runs block indefinitely.
    serve_limit: Option<usize>,
    print: &'w mut dyn PrintWriter,
}

impl<'w> Vm<'w> {
    /// Creates a VM for a compiled program. The top-level statements run in
    /// an implicit main frame whose locals are reserved at the bottom of the
    /// value stack.
    pub fn new(bytecode: &Bytecode, print: &'w mut dyn PrintWriter) -> Self {
        let main = Rc::new(CompiledFunction {
            instructions: bytecode.instructions.clone(),
            num_locals: usize::from(bytecode.main_locals),
            num_params: 0,
            name: Some("<main>".to_owned()),
        });
        let mut stack = Vec::with_capacity(INITIAL_STACK);
        stack.resize_with(main.num_locals, null_value);
        Self {
            constants: bytecode.constants.clone(),
            stack,
            frames: vec![Frame {
                func: main,
                ip: 0,
                base_pointer: 0,
            }],
            globals: Vec::new(),
            builtins: builtins::table(),
            import_cache: Rc::new(RefCell::new(AHashMap::new())),
            base_dir: PathBuf::from("."),
            routes: RouteTable::new(),
            middleware: Vec::new(),
            serve_limit: None,
            print,
        }
    }

    /// Seeds the global array (REPL sessions carry globals across lines).
    #[must_use]
    pub fn with_globals(mut self, globals: Vec<ValueRef>) -> Self {
        self.globals = globals;
        self
    }

    /// Shares an existing import cache (nested import VMs).
    #[must_use]
    pub fn with_import_cache(mut self, cache: ImportCache) -> Self {
        self.import_cache = cache;
        self
    }

    /// Sets the directory import paths resolve against.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Bounds the number of requests `listen` serves (testing hook).
    #[must_use]
    pub fn with_serve_limit(mut self, limit: Option<usize>) -> Self {
        self.serve_limit = limit;
        self
    }

    /// Current operand-stack depth. After a well-formed program terminates
    /// this equals the main function's local-slot count.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Current frame-stack depth.
    #[must_use]
    pub fn frames_depth(&self) -> usize {
        self.frames.len()
    }

    /// Consumes the VM, returning the global array (REPL persistence).
    #[must_use]
    pub fn into_globals(self) -> Vec<ValueRef> {
        self.globals
    }

    /// Executes the program to completion.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        self.run_loop(0)
    }

    /// The dispatch loop. Runs until the frame stack shrinks back to
    /// `base_depth` (a call completing) or the frame above it finishes its
    /// instruction stream (the main frame has no trailing Return).
    #[allow(clippy::too_many_lines)]
    fn run_loop(&mut self, base_depth: usize) -> Result<(), RuntimeError> {
        // Cached frame state; flushed on suspension, reloaded after any
        // frame-stack change.
        let mut func;
        let mut ip;
        let mut base;
        {
            let frame = self.frames.last().expect("run_loop requires a frame");
            func = frame.func.clone();
            ip = frame.ip;
            base = frame.base_pointer;
        }

        macro_rules! reload {
            () => {{
                let frame = self.frames.last().expect("frame stack empty on reload");
                func = frame.func.clone();
                ip = frame.ip;
                base = frame.base_pointer;
            }};
        }
        macro_rules! flush {
            () => {
                self.frames.last_mut().expect("frame stack empty on flush").ip = ip;
            };
        }
        macro_rules! fetch_u8 {
            () => {{
                let byte = func.instructions[ip];
                ip += 1;
                byte
            }};
        }
        macro_rules! fetch_u16 {
            () => {{
                let hi = func.instructions[ip];
                let lo = func.instructions[ip + 1];
                ip += 2;
                u16::from_be_bytes([hi, lo])
            }};
        }

        loop {
            if ip >= func.instructions.len() {
                if self.frames.len() == base_depth + 1 {
                    flush!();
                    return Ok(());
                }
                return Err(RuntimeError::new("instruction pointer ran past end of function"));
            }

            let instruction_ip = ip;
            macro_rules! try_op {
                ($expr:expr) => {
                    match $expr {
                        Ok(v) => v,
                        Err(e) => return Err(e.with_ip(instruction_ip)),
                    }
                };
            }

            let op = Opcode::from_byte(func.instructions[ip]).expect("invalid opcode in bytecode");
            ip += 1;

            match op {
                Opcode::Constant => {
                    let idx = usize::from(fetch_u16!());
                    self.stack.push(self.constants[idx].clone());
                }
                Opcode::True => self.stack.push(bool_value(true)),
                Opcode::False => self.stack.push(bool_value(false)),
                Opcode::Null => self.stack.push(null_value()),
                Opcode::Pop => {
                    self.pop();
                }

                Opcode::Add => {
                    // Integer fast path; the dominant case in hot loops.
                    let len = self.stack.len();
                    if len >= 2 {
                        if let (Value::Int(a), Value::Int(b)) =
                            (self.stack[len - 2].as_ref(), self.stack[len - 1].as_ref())
                        {
                            let result = int_value(a.wrapping_add(*b));
                            self.stack.truncate(len - 2);
                            self.stack.push(result);
                            continue;
                        }
                    }
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::add(&left, &right));
                    self.stack.push(result);
                }
                Opcode::Sub => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::sub(&left, &right));
                    self.stack.push(result);
                }
                Opcode::Mul => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::mul(&left, &right));
                    self.stack.push(result);
                }
                Opcode::Div => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::div(&left, &right));
                    self.stack.push(result);
                }

                Opcode::Equal => {
                    let right = self.pop();
                    let left = self.pop();
                    self.stack.push(ops::equal(&left, &right, false));
                }
                Opcode::NotEqual => {
                    let right = self.pop();
                    let left = self.pop();
                    self.stack.push(ops::equal(&left, &right, true));
                }
                Opcode::LessThan => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::less_than(&left, &right));
                    self.stack.push(bool_value(result));
                }
                Opcode::GreaterThan => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::greater_than(&left, &right));
                    self.stack.push(bool_value(result));
                }
                Opcode::LessThanEqual => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::less_equal(&left, &right));
                    self.stack.push(bool_value(result));
                }
                Opcode::GreaterThanEqual => {
                    let right = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::greater_equal(&left, &right));
                    self.stack.push(bool_value(result));
                }

                Opcode::Minus => {
                    let value = self.pop();
                    let result = match value.as_ref() {
                        Value::Int(n) => int_value(n.wrapping_neg()),
                        Value::Float(f) => crate::value::float_value(-f),
                        other => {
                            return Err(RuntimeError::new(format!("cannot negate {}", other.type_name()))
                                .with_ip(instruction_ip));
                        }
                    };
                    self.stack.push(result);
                }
                Opcode::Bang => {
                    let value = self.pop();
                    self.stack.push(bool_value(!value.is_truthy()));
                }

                Opcode::Array => {
                    let count = usize::from(fetch_u16!());
                    let start = self.stack.len() - count;
                    let elements: Vec<ValueRef> = self.stack.drain(start..).collect();
                    self.stack.push(array_value(elements));
                }
                Opcode::Hash => {
                    let count = usize::from(fetch_u16!());
                    let start = self.stack.len() - count;
                    let items: Vec<ValueRef> = self.stack.drain(start..).collect();
                    let map = map_from_pairs(items.chunks_exact(2).map(|pair| (pair[0].clone(), pair[1].clone())));
                    self.stack.push(map);
                }
                Opcode::Index => {
                    let idx = self.pop();
                    let left = self.pop();
                    let result = try_op!(ops::index(&left, &idx));
                    self.stack.push(result);
                }

                Opcode::GetGlobal => {
                    let slot = usize::from(fetch_u16!());
                    let value = self.globals.get(slot).cloned().unwrap_or_else(null_value);
                    self.stack.push(value);
                }
                Opcode::SetGlobal => {
                    let slot = usize::from(fetch_u16!());
                    let value = self.pop();
                    self.ensure_global(slot);
                    self.globals[slot] = value;
                }
                Opcode::GetLocal => {
                    let slot = usize::from(fetch_u8!());
                    self.stack.push(self.stack[base + slot].clone());
                }
                Opcode::SetLocal => {
                    let slot = usize::from(fetch_u8!());
                    let value = self.pop();
                    self.stack[base + slot] = value;
                }
                Opcode::GetBuiltin => {
                    let idx = usize::from(fetch_u8!());
                    let value = self
                        .builtins
                        .get(idx)
                        .cloned()
                        .ok_or_else(|| RuntimeError::new(format!("unknown builtin index {idx}")).with_ip(instruction_ip))?;
                    self.stack.push(value);
                }

                Opcode::Jump => {
                    ip = usize::from(fetch_u16!());
                }
                Opcode::JumpNotTruth => {
                    let target = usize::from(fetch_u16!());
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        ip = target;
                    }
                }

                Opcode::Call => {
                    let argc = usize::from(fetch_u8!());
                    flush!();
                    try_op!(self.execute_call(argc));
                    reload!();
                }
                Opcode::ReturnValue => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("return without frame");
                    self.stack.truncate(frame.base_pointer - 1);
                    self.stack.push(result);
                    if self.frames.len() == base_depth {
                        return Ok(());
                    }
                    reload!();
                }
                Opcode::Return => {
                    let frame = self.frames.pop().expect("return without frame");
                    self.stack.truncate(frame.base_pointer - 1);
                    self.stack.push(null_value());
                    if self.frames.len() == base_depth {
                        return Ok(());
                    }
                    reload!();
                }

                Opcode::IncLocal => {
                    let slot = usize::from(fetch_u8!());
                    let new = try_op!(ops::step(&self.stack[base + slot], 1));
                    self.stack[base + slot] = new;
                }
                Opcode::DecLocal => {
                    let slot = usize::from(fetch_u8!());
                    let new = try_op!(ops::step(&self.stack[base + slot], -1));
                    self.stack[base + slot] = new;
                }
                Opcode::AddLocal => {
                    let dest = usize::from(fetch_u8!());
                    let src = usize::from(fetch_u8!());
                    let sum = try_op!(ops::add(&self.stack[base + dest], &self.stack[base + src]));
                    self.stack[base + dest] = sum;
                }
                Opcode::JumpIfLocalGreaterEqualConst => {
                    let slot = usize::from(fetch_u8!());
                    let const_idx = usize::from(fetch_u16!());
                    let target = usize::from(fetch_u16!());
                    let jump = match (self.stack[base + slot].as_ref(), self.constants[const_idx].as_ref()) {
                        (Value::Int(a), Value::Int(b)) => a >= b,
                        _ => !try_op!(ops::less_than(&self.stack[base + slot], &self.constants[const_idx])),
                    };
                    if jump {
                        ip = target;
                    }
                }
                Opcode::SetLocalZero => {
                    let slot = usize::from(fetch_u8!());
                    self.stack[base + slot] = crate::value::zero_value();
                }
                Opcode::PostfixInc => {
                    let slot = usize::from(fetch_u8!());
                    let old = self.stack[base + slot].clone();
                    let new = try_op!(ops::step(&old, 1));
                    self.stack[base + slot] = new;
                    self.stack.push(old);
                }
                Opcode::PostfixDec => {
                    let slot = usize::from(fetch_u8!());
                    let old = self.stack[base + slot].clone();
                    let new = try_op!(ops::step(&old, -1));
                    self.stack[base + slot] = new;
                    self.stack.push(old);
                }

                Opcode::Import => {
                    let idx = usize::from(fetch_u16!());
                    let Value::Str(path) = self.constants[idx].as_ref() else {
                        return Err(RuntimeError::new("import path constant is not a String").with_ip(instruction_ip));
                    };
                    let path = path.clone();
                    flush!();
                    let module = try_op!(self.import_module(&path));
                    self.stack.push(module);
                }

                Opcode::Task => {
                    let value = self.pop();
                    self.stack.push(Rc::new(Value::Task(value)));
                }
                Opcode::Await => {
                    let value = self.pop();
                    let result = match value.as_ref() {
                        Value::Task(inner) => inner.clone(),
                        _ => value.clone(),
                    };
                    self.stack.push(result);
                }
            }
        }
    }

    /// Dispatches a call. Stack layout on entry: `[..., callee, args...]`.
    ///
    /// Flowa functions push a frame; builtins and module host functions run
    /// synchronously and replace the callee and arguments with the result.
    fn execute_call(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee_idx = self.stack.len() - 1 - argc;
        let callee = self.stack[callee_idx].clone();
        match callee.as_ref() {
            Value::Function(func) => {
                if argc != func.num_params {
                    return Err(RuntimeError::new(format!(
                        "wrong number of arguments: {} takes {}, got {argc}",
                        callee, func.num_params
                    )));
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err(RuntimeError::new("stack overflow: frame limit reached"));
                }
                let base_pointer = self.stack.len() - argc;
                self.stack.resize_with(base_pointer + func.num_locals, null_value);
                self.frames.push(Frame {
                    func: func.clone(),
                    ip: 0,
                    base_pointer,
                });
                Ok(())
            }
            Value::Builtin(builtin) => {
                // Builtin calls rarely exceed a handful of arguments; keep
                // them off the heap.
                let args: SmallVec<[ValueRef; 4]> = self.stack.drain(callee_idx + 1..).collect();
                self.stack.truncate(callee_idx);
                let result = if builtin.is_vm_aware() {
                    self.call_vm_builtin(*builtin, &args)?
                } else {
                    builtins::call_builtin(*builtin, &args, &mut *self.print)?
                };
                self.stack.push(result);
                Ok(())
            }
            Value::NativeFn(func) => {
                let args: SmallVec<[ValueRef; 4]> = self.stack.drain(callee_idx + 1..).collect();
                self.stack.truncate(callee_idx);
                let result = crate::modules::call_native(*func, &args)?;
                self.stack.push(result);
                Ok(())
            }
            other => Err(RuntimeError::new(format!("cannot call a {}", other.type_name()))),
        }
    }

    /// The VM-aware builtins: `route`, `middleware`, and `listen` touch the
    /// VM's own route table and serve loop.
    fn call_vm_builtin(&mut self, builtin: Builtin, args: &[ValueRef]) -> Result<ValueRef, RuntimeError> {
        match builtin {
            Builtin::Route => self.register_route(args),
            Builtin::Middleware => {
                let [handler] = args else {
                    return Err(RuntimeError::new(format!(
                        "middleware() takes exactly 1 argument, got {}",
                        args.len()
                    )));
                };
                self.middleware.push(handler.clone());
                Ok(str_value("middleware registered"))
            }
            Builtin::Listen => {
                let [port] = args else {
                    return Err(RuntimeError::new(format!(
                        "listen() takes exactly 1 argument, got {}",
                        args.len()
                    )));
                };
                let Value::Int(port) = port.as_ref() else {
                    return Err(RuntimeError::new(format!(
                        "listen() port must be an Integer, got {}",
                        port.type_name()
                    )));
                };
                let port = u16::try_from(*port)
                    .map_err(|_| RuntimeError::new(format!("listen() port {port} out of range")))?;
                self.serve(port)?;
                Ok(null_value())
            }
            other => unreachable!("{other} is not VM-aware"),
        }
    }

    fn register_route(&mut self, args: &[ValueRef]) -> Result<ValueRef, RuntimeError> {
        let [method, path, handler] = args else {
            return Err(RuntimeError::new(format!(
                "route() takes exactly 3 arguments, got {}",
                args.len()
            )));
        };
        let (Value::Str(method), Value::Str(path)) = (method.as_ref(), path.as_ref()) else {
            return Err(RuntimeError::new("route() method and path must be Strings"));
        };
        if !matches!(handler.as_ref(), Value::Function(_) | Value::Builtin(_) | Value::NativeFn(_)) {
            return Err(RuntimeError::new(format!(
                "route() handler must be callable, got {}",
                handler.type_name()
            )));
        }
        let method = method.to_ascii_uppercase();
        tracing::debug!(%method, %path, "route registered");
        self.routes.insert(method.clone(), path.clone(), handler.clone());
        Ok(str_value(format!("route registered: {method} {path}")))
    }

    /// Calls a function value with the given arguments and returns its
    /// result. Used by the serve loop to invoke handlers and middleware.
    pub(crate) fn call_function_value(
        &mut self,
        callee: ValueRef,
        args: Vec<ValueRef>,
    ) -> Result<ValueRef, RuntimeError> {
        let depth = self.frames.len();
        let argc = args.len();
        self.stack.push(callee);
        self.stack.extend(args);
        self.execute_call(argc)?;
        if self.frames.len() > depth {
            self.run_loop(depth)?;
        }
        Ok(self.pop())
    }

    fn ensure_global(&mut self, slot: usize) {
        if slot >= self.globals.len() {
            self.globals.resize_with(slot + 1, null_value);
        }
    }

    fn pop(&mut self) -> ValueRef {
        self.stack.pop().expect("stack underflow: compiler emitted unbalanced code")
    }
}
