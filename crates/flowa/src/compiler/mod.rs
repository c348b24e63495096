//! AST to bytecode compiler.
//!
//! A single walk over the AST emits instructions through per-scope
//! `CodeBuilder`s and collects constants into one program-wide pool. The
//! implicit top level compiles like a function body: its variables live in
//! frame-local slots, while function, type, and module declarations are
//! hoisted into the outermost global table so forward references resolve.
//!
//! Peephole specializations happen at emit time:
//! - two-literal integer arithmetic/comparisons (and string `+`, `==`, `!=`)
//!   fold to a single constant, recursing one level into infix operands
//! - `i = 0` on a local emits `SetLocalZero` with no constant-pool entry
//! - `i = i + 1` / `i = 1 + i` emits `IncLocal` (and `i = i - 1`, `DecLocal`)
//! - `sum = sum + other` on two locals emits `AddLocal`
//! - `while local < N:` with a literal `N` emits the fused
//!   `JumpIfLocalGreaterEqualConst` loop check
//!
//! Every fused form is observably identical to its unfused expansion.

mod symbols;

use std::{path::PathBuf, rc::Rc};

use crate::{
    ast::{Block, Expr, IfArm, InfixOp, PostfixOp, PrefixOp, Program, Stmt},
    builtins::Builtin,
    bytecode::{Bytecode, CodeBuilder, CompiledFunction, JumpLabel, Opcode},
    error::CompileError,
    intern::Interner,
    parser,
    value::{float_value, int_value, str_value, Value, ValueRef},
};
pub use symbols::{Resolution, Symbol, SymbolScope, SymbolTables, MAX_GLOBALS, MAX_LOCALS};

/// One compilation scope: the implicit top level or a function body.
#[derive(Debug, Default)]
struct Scope {
    builder: CodeBuilder,
    /// Deferred expressions, run at every exit of this scope.
    defers: Vec<Expr>,
    /// Per-loop lists of `break` jump sites awaiting back-patching.
    breaks: Vec<Vec<JumpLabel>>,
}

/// Result of compile-time constant folding.
enum Folded {
    Int(i64),
    Str(String),
    Bool(bool),
}

/// AST to bytecode compiler.
///
/// Holds all state that must survive across REPL lines: the interner, the
/// symbol tables, and the constant pool. One-shot compilation uses a fresh
/// compiler per program.
pub struct Compiler {
    interner: Interner,
    symbols: SymbolTables,
    constants: Vec<ValueRef>,
    scopes: Vec<Scope>,
    /// Base directory for resolving star-import paths at compile time.
    base_dir: PathBuf,
    /// Constant index of a top-level `main` function, or -1.
    main_function: i32,
    /// Counter for synthetic loop-helper local names.
    synth_counter: u32,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    /// A compiler whose top-level definitions are globals, so bindings
    /// survive across REPL lines.
    #[must_use]
    pub fn new_repl() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(repl: bool) -> Self {
        let mut interner = Interner::new();
        let symbols = SymbolTables::new(&mut interner, repl);
        Self {
            interner,
            symbols,
            constants: Vec::new(),
            scopes: vec![Scope::default()],
            base_dir: PathBuf::from("."),
            main_function: -1,
            synth_counter: 0,
        }
    }

    /// Sets the directory against which star-import paths resolve.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = dir.into();
    }

    /// Compiles a program into bytecode. The compiler can be reused for
    /// subsequent programs (REPL lines); symbols and constants accumulate.
    pub fn compile(&mut self, program: &Program) -> Result<Bytecode, CompileError> {
        self.scopes = vec![Scope::default()];
        self.main_function = -1;

        self.hoist_declarations(&program.statements)?;
        for stmt in &program.statements {
            self.compile_stmt(stmt)?;
        }

        // A declared zero-argument `main` function runs after the top-level
        // statements.
        if self.main_function >= 0 {
            let main_idx = usize::try_from(self.main_function).expect("checked non-negative");
            let takes_no_args = matches!(
                self.constants[main_idx].as_ref(),
                Value::Function(f) if f.num_params == 0
            );
            let main_id = self.interner.intern("main");
            if takes_no_args {
                if let Resolution::Found(sym) = self.symbols.resolve(main_id) {
                    self.emit_get(sym);
                    self.builder().emit_u8(Opcode::Call, 0);
                    self.builder().emit(Opcode::Pop);
                }
            }
        }

        // Top-level defers run before normal program exit, most recent first.
        let defers: Vec<Expr> = self.scopes[0].defers.drain(..).rev().collect();
        for expr in &defers {
            self.compile_expr(expr)?;
            self.builder().emit(Opcode::Pop);
        }

        let scope = self.scopes.pop().expect("main scope");
        self.scopes.push(Scope::default());
        Ok(Bytecode {
            instructions: scope.builder.finish(),
            constants: self.constants.clone(),
            main_locals: self.symbols.num_main_locals(),
            main_function: self.main_function,
        })
    }

    /// All non-builtin global bindings by name. The importer uses this to
    /// collect a module's exports after executing it.
    #[must_use]
    pub fn global_exports(&self) -> Vec<(String, u16)> {
        self.symbols
            .global_bindings()
            .into_iter()
            .map(|(id, slot)| (self.interner.get(id).to_owned(), slot))
            .collect()
    }

    // ------------------------------------------------------------------
    // Declaration hoisting
    // ------------------------------------------------------------------

    /// Walks every block and attaches each function, type, and module
    /// declaration to the outermost global scope. This is what lets a
    /// function call another one declared later in the file.
    fn hoist_declarations(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        for stmt in statements {
            match stmt {
                Stmt::Func { name, body, .. } => {
                    let id = self.interner.intern(name);
                    self.symbols.define_global(id)?;
                    self.hoist_declarations(body)?;
                }
                Stmt::TypeDecl { name, .. } => {
                    let id = self.interner.intern(name);
                    self.symbols.define_global(id)?;
                }
                Stmt::Module { name, body } => {
                    let id = self.interner.intern(name);
                    self.symbols.define_global(id)?;
                    self.hoist_declarations(body)?;
                }
                Stmt::If { arms, or_else } => {
                    for arm in arms {
                        self.hoist_declarations(&arm.body)?;
                    }
                    if let Some(block) = or_else {
                        self.hoist_declarations(block)?;
                    }
                }
                Stmt::While { body, .. }
                | Stmt::ForIn { body, .. }
                | Stmt::ForC { body, .. }
                | Stmt::Service { body, .. } => {
                    self.hoist_declarations(body)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Assign { name, value } => self.compile_assign(name, value),
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.builder().emit(Opcode::Pop);
                Ok(())
            }
            Stmt::Return(value) => self.compile_return(value.as_ref()),
            Stmt::Break => self.compile_break(),
            Stmt::Func {
                name, params, body, ..
            } => self.compile_func_decl(name, params, body),
            Stmt::If { arms, or_else } => self.compile_if(arms, or_else.as_ref()),
            Stmt::While { condition, body } => self.compile_while(condition, body),
            Stmt::ForIn { var, iterable, body } => self.compile_for_in(var, iterable, body),
            Stmt::ForC {
                init,
                condition,
                post,
                body,
            } => self.compile_for_c(init.as_deref(), condition.as_ref(), post.as_deref(), body),
            Stmt::Module { name, body } => self.compile_module(name, body),
            Stmt::Import { path } => self.compile_import(path),
            Stmt::FromImport { path, names } => self.compile_from_import(path, names.as_deref()),
            Stmt::TypeDecl { name, fields } => self.compile_type_decl(name, fields),
            Stmt::Service { addr, body, .. } => self.compile_service(addr, body),
            Stmt::Route { method, path, handler } => self.compile_route(method, path, handler),
            Stmt::Use(expr) => self.compile_use(expr),
            Stmt::Defer(expr) => {
                self.current_scope().defers.push(expr.clone());
                Ok(())
            }
        }
    }

    fn compile_assign(&mut self, name: &str, value: &Expr) -> Result<(), CompileError> {
        let name_id = self.interner.intern(name);
        let existing = match self.symbols.resolve(name_id) {
            Resolution::Found(sym) if sym.scope != SymbolScope::Builtin => Some(sym),
            _ => None,
        };

        // `i = 0` on a local slot: SetLocalZero, no constant-pool entry.
        if matches!(value, Expr::Int(0)) {
            let target = match existing {
                Some(sym) => sym,
                None => self.symbols.define(name_id)?,
            };
            if target.scope == SymbolScope::Local {
                let slot = local_u8(target);
                self.builder().emit_u8(Opcode::SetLocalZero, slot);
                return Ok(());
            }
            // Global target: general path below.
            self.compile_expr(value)?;
            self.emit_set(target);
            return Ok(());
        }

        if let Some(target) = existing {
            if target.scope == SymbolScope::Local {
                let slot = local_u8(target);
                // `i = i + 1` / `i = 1 + i` and `i = i - 1`.
                if let Some(op) = self.match_step_assign(name, value) {
                    self.builder().emit_u8(op, slot);
                    return Ok(());
                }
                // `sum = sum + other` / `sum = other + sum` on two locals.
                if let Some(src) = self.match_accumulate_assign(name, value) {
                    self.builder().emit_u8_u8(Opcode::AddLocal, slot, src);
                    return Ok(());
                }
            }
            self.compile_expr(value)?;
            self.emit_set(target);
            return Ok(());
        }

        // New binding: compile the value first so `x = x` is an error.
        self.compile_expr(value)?;
        let target = self.symbols.define(name_id)?;
        self.emit_set(target);
        Ok(())
    }

    /// Detects `i = i + 1`, `i = 1 + i`, and `i = i - 1` for a local `i`.
    fn match_step_assign(&self, name: &str, value: &Expr) -> Option<Opcode> {
        let Expr::Infix { left, op, right } = value else {
            return None;
        };
        match op {
            InfixOp::Add => {
                let inc = matches!((left.as_ref(), right.as_ref()),
                    (Expr::Ident(n), Expr::Int(1)) | (Expr::Int(1), Expr::Ident(n)) if n == name);
                inc.then_some(Opcode::IncLocal)
            }
            InfixOp::Sub => {
                let dec = matches!((left.as_ref(), right.as_ref()),
                    (Expr::Ident(n), Expr::Int(1)) if n == name);
                dec.then_some(Opcode::DecLocal)
            }
            _ => None,
        }
    }

    /// Detects `sum = sum + other` / `sum = other + sum` where both names
    /// are locals of the current frame; returns the source slot.
    fn match_accumulate_assign(&self, name: &str, value: &Expr) -> Option<u8> {
        let Expr::Infix { left, op: InfixOp::Add, right } = value else {
            return None;
        };
        let other = match (left.as_ref(), right.as_ref()) {
            (Expr::Ident(l), Expr::Ident(r)) if l == name => r,
            (Expr::Ident(l), Expr::Ident(r)) if r == name => l,
            _ => return None,
        };
        self.local_slot(other)
    }

    /// Slot of `name` when it resolves to a local of the current frame.
    /// Names never seen by the interner cannot be locals.
    fn local_slot(&self, name: &str) -> Option<u8> {
        let id = self.interner.lookup(name)?;
        match self.symbols.resolve(id) {
            Resolution::Found(sym) if sym.scope == SymbolScope::Local => Some(local_u8(sym)),
            _ => None,
        }
    }

    fn compile_return(&mut self, value: Option<&Expr>) -> Result<(), CompileError> {
        if !self.symbols.in_function() {
            return Err(CompileError::new("`return` outside of a function"));
        }
        match value {
            Some(expr) => {
                self.compile_expr(expr)?;
                self.emit_scope_defers()?;
                self.builder().emit(Opcode::ReturnValue);
            }
            None => {
                self.emit_scope_defers()?;
                self.builder().emit(Opcode::Return);
            }
        }
        Ok(())
    }

    /// Compiles the current scope's deferred expressions, most recent first,
    /// discarding each result. Called at every scope exit.
    fn emit_scope_defers(&mut self) -> Result<(), CompileError> {
        let defers: Vec<Expr> = self.current_scope().defers.iter().rev().cloned().collect();
        for expr in &defers {
            self.compile_expr(expr)?;
            self.builder().emit(Opcode::Pop);
        }
        Ok(())
    }

    fn compile_break(&mut self) -> Result<(), CompileError> {
        if self.current_scope().breaks.is_empty() {
            return Err(CompileError::new("`break` outside of a loop"));
        }
        let label = self.builder().emit_jump(Opcode::Jump);
        self.current_scope()
            .breaks
            .last_mut()
            .expect("checked non-empty")
            .push(label);
        Ok(())
    }

    fn compile_func_decl(&mut self, name: &str, params: &[String], body: &Block) -> Result<(), CompileError> {
        let name_id = self.interner.intern(name);
        let slot = self.symbols.define_global(name_id)?;
        let const_idx = self.compile_function_body(Some(name), params, body)?;
        if name == "main" && !self.symbols.in_function() {
            self.main_function = i32::from(const_idx);
        }
        self.builder().emit_u16(Opcode::Constant, const_idx);
        self.emit_set(slot);
        Ok(())
    }

    /// Compiles a function body into a `CompiledFunction` constant and
    /// returns its pool index.
    fn compile_function_body(
        &mut self,
        name: Option<&str>,
        params: &[String],
        body: &Block,
    ) -> Result<u16, CompileError> {
        if params.len() > u8::MAX as usize {
            return Err(CompileError::new(format!(
                "function `{}` has too many parameters (max 255)",
                name.unwrap_or("<anonymous>")
            )));
        }
        self.symbols.enter_function();
        self.scopes.push(Scope::default());

        for param in params {
            let id = self.interner.intern(param);
            self.symbols.define(id)?;
        }

        let result = (|| -> Result<(), CompileError> {
            for stmt in body {
                self.compile_stmt(stmt)?;
            }
            // Implicit `return null` unless the body already ended with an
            // explicit return.
            if !matches!(
                self.builder().last_opcode(),
                Some(Opcode::Return | Opcode::ReturnValue)
            ) {
                self.emit_scope_defers()?;
                self.builder().emit(Opcode::Return);
            }
            Ok(())
        })();

        let num_locals = self.symbols.leave_function();
        let scope = self.scopes.pop().expect("function scope");
        result?;

        let function = CompiledFunction {
            instructions: scope.builder.finish(),
            num_locals: usize::from(num_locals),
            num_params: params.len(),
            name: name.map(ToOwned::to_owned),
        };
        self.add_constant(Rc::new(Value::Function(Rc::new(function))))
    }

    fn compile_if(&mut self, arms: &[IfArm], or_else: Option<&Block>) -> Result<(), CompileError> {
        let mut end_jumps = Vec::with_capacity(arms.len());
        for arm in arms {
            self.compile_expr(&arm.condition)?;
            let skip = self.builder().emit_jump(Opcode::JumpNotTruth);
            self.compile_block(&arm.body)?;
            end_jumps.push(self.builder().emit_jump(Opcode::Jump));
            self.builder().patch_jump(skip);
        }
        if let Some(block) = or_else {
            self.compile_block(block)?;
        }
        for label in end_jumps {
            self.builder().patch_jump(label);
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for stmt in block {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_while(&mut self, condition: &Expr, body: &Block) -> Result<(), CompileError> {
        // `while local < N:` with literal N fuses the whole check into one
        // instruction.
        if let Expr::Infix { left, op: InfixOp::Lt, right } = condition {
            if let (Expr::Ident(name), Expr::Int(limit)) = (left.as_ref(), right.as_ref()) {
                if let Some(slot) = self.local_slot(name) {
                    let const_idx = self.add_constant(int_value(*limit))?;
                    let loop_start = self.builder().current_offset();
                    let exit = self.builder().emit_fused_loop_check(slot, const_idx);
                    self.enter_loop();
                    let result = self.compile_block(body);
                    let breaks = self.leave_loop();
                    result?;
                    self.builder().emit_jump_to(Opcode::Jump, loop_start);
                    self.builder().patch_jump(exit);
                    for label in breaks {
                        self.builder().patch_jump(label);
                    }
                    return Ok(());
                }
            }
        }

        let loop_start = self.builder().current_offset();
        self.compile_expr(condition)?;
        let exit = self.builder().emit_jump(Opcode::JumpNotTruth);
        self.enter_loop();
        let result = self.compile_block(body);
        let breaks = self.leave_loop();
        result?;
        self.builder().emit_jump_to(Opcode::Jump, loop_start);
        self.builder().patch_jump(exit);
        for label in breaks {
            self.builder().patch_jump(label);
        }
        Ok(())
    }

    /// `for x in arr:` desugars onto two synthetic slots: an index counter
    /// and the evaluated iterable. Arrays are the iterable kind.
    fn compile_for_in(&mut self, var: &str, iterable: &Expr, body: &Block) -> Result<(), CompileError> {
        let arr_sym = self.define_synthetic("iter")?;
        let idx_sym = self.define_synthetic("idx")?;
        let var_id = self.interner.intern(var);
        let var_sym = match self.symbols.resolve(var_id) {
            Resolution::Found(sym) if sym.scope != SymbolScope::Builtin => sym,
            _ => self.symbols.define(var_id)?,
        };

        self.compile_expr(iterable)?;
        self.emit_set(arr_sym);
        self.emit_zero(idx_sym)?;

        let loop_start = self.builder().current_offset();
        // idx < len(arr)
        self.emit_get(idx_sym);
        self.builder().emit_u8(Opcode::GetBuiltin, Builtin::Len as u8);
        self.emit_get(arr_sym);
        self.builder().emit_u8(Opcode::Call, 1);
        self.builder().emit(Opcode::LessThan);
        let exit = self.builder().emit_jump(Opcode::JumpNotTruth);

        // var = arr[idx]
        self.emit_get(arr_sym);
        self.emit_get(idx_sym);
        self.builder().emit(Opcode::Index);
        self.emit_set(var_sym);

        self.enter_loop();
        let result = self.compile_block(body);
        let breaks = self.leave_loop();
        result?;

        self.emit_increment(idx_sym)?;
        self.builder().emit_jump_to(Opcode::Jump, loop_start);
        self.builder().patch_jump(exit);
        for label in breaks {
            self.builder().patch_jump(label);
        }
        Ok(())
    }

    fn compile_for_c(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
    ) -> Result<(), CompileError> {
        if let Some(stmt) = init {
            self.compile_stmt(stmt)?;
        }
        let loop_start = self.builder().current_offset();
        let exit = match condition {
            Some(expr) => {
                self.compile_expr(expr)?;
                Some(self.builder().emit_jump(Opcode::JumpNotTruth))
            }
            None => None,
        };
        self.enter_loop();
        let result = self.compile_block(body);
        let breaks = self.leave_loop();
        result?;
        if let Some(stmt) = post {
            self.compile_stmt(stmt)?;
        }
        self.builder().emit_jump_to(Opcode::Jump, loop_start);
        if let Some(label) = exit {
            self.builder().patch_jump(label);
        }
        for label in breaks {
            self.builder().patch_jump(label);
        }
        Ok(())
    }

    /// `module name:` — the block's declarations compile as ordinary
    /// (hoisted) globals, then `name` binds to a map of member name to
    /// member value so `name.member` works through the normal Index path.
    fn compile_module(&mut self, name: &str, body: &Block) -> Result<(), CompileError> {
        let name_id = self.interner.intern(name);
        let slot = self.symbols.define_global(name_id)?;
        self.compile_block(body)?;

        let members: Vec<String> = body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Func { name, .. } | Stmt::TypeDecl { name, .. } | Stmt::Module { name, .. } => {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect();
        for member in &members {
            let idx = self.add_constant(str_value(member.clone()))?;
            self.builder().emit_u16(Opcode::Constant, idx);
            let member_id = self.interner.intern(member);
            match self.symbols.resolve(member_id) {
                Resolution::Found(sym) => self.emit_get(sym),
                _ => return Err(CompileError::new(format!("undefined module member `{member}`"))),
            }
        }
        let count = u16::try_from(members.len() * 2).map_err(|_| CompileError::new("module has too many members"))?;
        self.builder().emit_u16(Opcode::Hash, count);
        self.emit_set(slot);
        Ok(())
    }

    /// `import "path"` binds the module under the path's file stem.
    fn compile_import(&mut self, path: &str) -> Result<(), CompileError> {
        let stem = std::path::Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CompileError::new(format!("cannot derive a module name from `{path}`")))?
            .to_owned();
        let path_idx = self.add_constant(str_value(path))?;
        self.builder().emit_u16(Opcode::Import, path_idx);
        // Import bindings are globals so functions can reach them.
        let name_id = self.interner.intern(&stem);
        let target = self.symbols.define_global(name_id)?;
        self.emit_set(target);
        Ok(())
    }

    /// `from "p" import a, b` lowers to one re-import per symbol; the import
    /// cache makes the repeats cheap. The star form enumerates the module's
    /// declarations at compile time.
    fn compile_from_import(&mut self, path: &str, names: Option<&[String]>) -> Result<(), CompileError> {
        let names: Vec<String> = match names {
            Some(list) => list.to_vec(),
            None => self.discover_exports(path)?,
        };
        for name in &names {
            let path_idx = self.add_constant(str_value(path))?;
            self.builder().emit_u16(Opcode::Import, path_idx);
            let member_idx = self.add_constant(str_value(name.clone()))?;
            self.builder().emit_u16(Opcode::Constant, member_idx);
            self.builder().emit(Opcode::Index);
            let name_id = self.interner.intern(name);
            let target = self.symbols.define_global(name_id)?;
            self.emit_set(target);
        }
        Ok(())
    }

    /// Reads and parses a module file to enumerate its exported names. The
    /// real loading still happens at runtime through the import cache.
    fn discover_exports(&self, path: &str) -> Result<Vec<String>, CompileError> {
        let full = self.base_dir.join(path);
        let source = std::fs::read_to_string(&full)
            .map_err(|e| CompileError::new(format!("cannot read import `{}`: {e}", full.display())))?;
        let program = parser::parse(&source)
            .map_err(|errors| CompileError::new(format!("import `{path}` failed to parse: {} error(s)", errors.len())))?;
        let mut names = Vec::new();
        collect_exported_names(&program.statements, &mut names);
        Ok(names)
    }

    /// `type Name:` declares a constructor function `Name(field, ...)`
    /// returning a map of the fields. The body is synthesized directly in
    /// bytecode.
    fn compile_type_decl(&mut self, name: &str, fields: &[String]) -> Result<(), CompileError> {
        if fields.len() > u8::MAX as usize {
            return Err(CompileError::new(format!("type `{name}` has too many fields (max 255)")));
        }
        let name_id = self.interner.intern(name);
        let slot = self.symbols.define_global(name_id)?;

        let mut builder = CodeBuilder::new();
        let mut field_consts = Vec::with_capacity(fields.len());
        for field in fields {
            field_consts.push(self.add_constant(str_value(field.clone()))?);
        }
        for (i, idx) in field_consts.iter().enumerate() {
            builder.emit_u16(Opcode::Constant, *idx);
            builder.emit_u8(Opcode::GetLocal, u8::try_from(i).expect("checked above"));
        }
        builder.emit_u16(
            Opcode::Hash,
            u16::try_from(fields.len() * 2).expect("field count bounded by u8"),
        );
        builder.emit(Opcode::ReturnValue);

        let function = CompiledFunction {
            instructions: builder.finish(),
            num_locals: fields.len(),
            num_params: fields.len(),
            name: Some(name.to_owned()),
        };
        let const_idx = self.add_constant(Rc::new(Value::Function(Rc::new(function))))?;
        self.builder().emit_u16(Opcode::Constant, const_idx);
        self.emit_set(slot);
        Ok(())
    }

    /// `service Name on ":port":` desugars to `route`/`middleware` builtin
    /// calls followed by a final `listen(port)`.
    fn compile_service(&mut self, addr: &str, body: &Block) -> Result<(), CompileError> {
        let port: i64 = addr
            .trim_start_matches(':')
            .parse()
            .map_err(|_| CompileError::new(format!("invalid service address `{addr}`")))?;
        self.compile_block(body)?;
        self.builder().emit_u8(Opcode::GetBuiltin, Builtin::Listen as u8);
        let port_idx = self.add_constant(int_value(port))?;
        self.builder().emit_u16(Opcode::Constant, port_idx);
        self.builder().emit_u8(Opcode::Call, 1);
        self.builder().emit(Opcode::Pop);
        Ok(())
    }

    fn compile_route(&mut self, method: &str, path: &str, handler: &Expr) -> Result<(), CompileError> {
        self.builder().emit_u8(Opcode::GetBuiltin, Builtin::Route as u8);
        let method_idx = self.add_constant(str_value(method))?;
        self.builder().emit_u16(Opcode::Constant, method_idx);
        let path_idx = self.add_constant(str_value(path))?;
        self.builder().emit_u16(Opcode::Constant, path_idx);
        self.compile_expr(handler)?;
        self.builder().emit_u8(Opcode::Call, 3);
        self.builder().emit(Opcode::Pop);
        Ok(())
    }

    fn compile_use(&mut self, expr: &Expr) -> Result<(), CompileError> {
        self.builder().emit_u8(Opcode::GetBuiltin, Builtin::Middleware as u8);
        self.compile_expr(expr)?;
        self.builder().emit_u8(Opcode::Call, 1);
        self.builder().emit(Opcode::Pop);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Int(n) => {
                let idx = self.add_constant(int_value(*n))?;
                self.builder().emit_u16(Opcode::Constant, idx);
                Ok(())
            }
            Expr::Float(f) => {
                let idx = self.add_constant(float_value(*f))?;
                self.builder().emit_u16(Opcode::Constant, idx);
                Ok(())
            }
            Expr::Str(s) => {
                let idx = self.add_constant(str_value(s.clone()))?;
                self.builder().emit_u16(Opcode::Constant, idx);
                Ok(())
            }
            Expr::Bool(true) => {
                self.builder().emit(Opcode::True);
                Ok(())
            }
            Expr::Bool(false) => {
                self.builder().emit(Opcode::False);
                Ok(())
            }
            Expr::Null => {
                self.builder().emit(Opcode::Null);
                Ok(())
            }
            Expr::Ident(name) => self.compile_ident(name),
            Expr::Prefix { op, right } => self.compile_prefix(*op, right),
            Expr::Infix { left, op, right } => self.compile_infix(left, *op, right),
            Expr::Postfix { op, operand } => self.compile_postfix(*op, operand),
            Expr::Call { callee, args } => self.compile_call(callee, args),
            Expr::Index { left, index } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.builder().emit(Opcode::Index);
                Ok(())
            }
            Expr::Member { object, name } => {
                self.compile_expr(object)?;
                let idx = self.add_constant(str_value(name.clone()))?;
                self.builder().emit_u16(Opcode::Constant, idx);
                self.builder().emit(Opcode::Index);
                Ok(())
            }
            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                let count =
                    u16::try_from(elements.len()).map_err(|_| CompileError::new("array literal too large"))?;
                self.builder().emit_u16(Opcode::Array, count);
                Ok(())
            }
            Expr::Map(pairs) => {
                for (key, value) in pairs {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                let count =
                    u16::try_from(pairs.len() * 2).map_err(|_| CompileError::new("map literal too large"))?;
                self.builder().emit_u16(Opcode::Hash, count);
                Ok(())
            }
            Expr::Spawn(inner) => {
                self.compile_expr(inner)?;
                self.builder().emit(Opcode::Task);
                Ok(())
            }
            Expr::Await(inner) => {
                self.compile_expr(inner)?;
                self.builder().emit(Opcode::Await);
                Ok(())
            }
        }
    }

    fn compile_ident(&mut self, name: &str) -> Result<(), CompileError> {
        let id = self.interner.intern(name);
        match self.symbols.resolve(id) {
            Resolution::Found(sym) => {
                self.emit_get(sym);
                Ok(())
            }
            Resolution::FreeVariable => Err(CompileError::new(format!(
                "cannot use `{name}` here: it is a variable of an enclosing function"
            ))),
            Resolution::Undefined => Err(CompileError::new(format!("undefined identifier `{name}`"))),
        }
    }

    fn compile_prefix(&mut self, op: PrefixOp, right: &Expr) -> Result<(), CompileError> {
        // Fold negated literals so `-5` is a single constant.
        if op == PrefixOp::Neg {
            if let Expr::Int(n) = right {
                let idx = self.add_constant(int_value(n.wrapping_neg()))?;
                self.builder().emit_u16(Opcode::Constant, idx);
                return Ok(());
            }
            if let Expr::Float(f) = right {
                let idx = self.add_constant(float_value(-f))?;
                self.builder().emit_u16(Opcode::Constant, idx);
                return Ok(());
            }
        }
        self.compile_expr(right)?;
        match op {
            PrefixOp::Neg => self.builder().emit(Opcode::Minus),
            PrefixOp::Not => self.builder().emit(Opcode::Bang),
        }
        Ok(())
    }

    fn compile_infix(&mut self, left: &Expr, op: InfixOp, right: &Expr) -> Result<(), CompileError> {
        if let Some(folded) = fold_infix(left, op, right) {
            match folded {
                Folded::Int(n) => {
                    let idx = self.add_constant(int_value(n))?;
                    self.builder().emit_u16(Opcode::Constant, idx);
                }
                Folded::Str(s) => {
                    let idx = self.add_constant(str_value(s))?;
                    self.builder().emit_u16(Opcode::Constant, idx);
                }
                Folded::Bool(true) => self.builder().emit(Opcode::True),
                Folded::Bool(false) => self.builder().emit(Opcode::False),
            }
            return Ok(());
        }

        self.compile_expr(left)?;
        self.compile_expr(right)?;
        let opcode = match op {
            InfixOp::Add => Opcode::Add,
            InfixOp::Sub => Opcode::Sub,
            InfixOp::Mul => Opcode::Mul,
            InfixOp::Div => Opcode::Div,
            InfixOp::Eq => Opcode::Equal,
            InfixOp::NotEq => Opcode::NotEqual,
            InfixOp::Lt => Opcode::LessThan,
            InfixOp::Gt => Opcode::GreaterThan,
            InfixOp::LtEq => Opcode::LessThanEqual,
            InfixOp::GtEq => Opcode::GreaterThanEqual,
        };
        self.builder().emit(opcode);
        Ok(())
    }

    fn compile_postfix(&mut self, op: PostfixOp, operand: &Expr) -> Result<(), CompileError> {
        let Some(name) = operand.as_ident() else {
            return Err(CompileError::new("postfix `++`/`--` target must be an identifier"));
        };
        let id = self.interner.intern(name);
        match self.symbols.resolve(id) {
            Resolution::Found(sym) if sym.scope == SymbolScope::Local => {
                let slot = local_u8(sym);
                match op {
                    PostfixOp::Inc => self.builder().emit_u8(Opcode::PostfixInc, slot),
                    PostfixOp::Dec => self.builder().emit_u8(Opcode::PostfixDec, slot),
                }
                Ok(())
            }
            Resolution::Found(_) => Err(CompileError::new(format!(
                "postfix `++`/`--` requires a local variable, `{name}` is not one"
            ))),
            _ => Err(CompileError::new(format!("undefined identifier `{name}`"))),
        }
    }

    fn compile_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<(), CompileError> {
        self.compile_expr(callee)?;
        for arg in args {
            self.compile_expr(arg)?;
        }
        let argc = u8::try_from(args.len()).map_err(|_| CompileError::new("too many call arguments (max 255)"))?;
        self.builder().emit_u8(Opcode::Call, argc);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    fn builder(&mut self) -> &mut CodeBuilder {
        &mut self.current_scope().builder
    }

    fn current_scope(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn enter_loop(&mut self) {
        self.current_scope().breaks.push(Vec::new());
    }

    fn leave_loop(&mut self) -> Vec<JumpLabel> {
        self.current_scope().breaks.pop().expect("leave_loop without enter_loop")
    }

    fn emit_get(&mut self, sym: Symbol) {
        match sym.scope {
            SymbolScope::Global => self.builder().emit_u16(Opcode::GetGlobal, sym.index),
            SymbolScope::Local => {
                let slot = local_u8(sym);
                self.builder().emit_u8(Opcode::GetLocal, slot);
            }
            SymbolScope::Builtin => {
                let idx = u8::try_from(sym.index).expect("builtin index fits u8");
                self.builder().emit_u8(Opcode::GetBuiltin, idx);
            }
        }
    }

    fn emit_set(&mut self, sym: Symbol) {
        match sym.scope {
            SymbolScope::Global => self.builder().emit_u16(Opcode::SetGlobal, sym.index),
            SymbolScope::Local => {
                let slot = local_u8(sym);
                self.builder().emit_u8(Opcode::SetLocal, slot);
            }
            SymbolScope::Builtin => unreachable!("builtins are never assignment targets"),
        }
    }

    /// Stores integer zero to a slot, using `SetLocalZero` for locals.
    fn emit_zero(&mut self, sym: Symbol) -> Result<(), CompileError> {
        if sym.scope == SymbolScope::Local {
            let slot = local_u8(sym);
            self.builder().emit_u8(Opcode::SetLocalZero, slot);
        } else {
            let idx = self.add_constant(int_value(0))?;
            self.builder().emit_u16(Opcode::Constant, idx);
            self.emit_set(sym);
        }
        Ok(())
    }

    /// Adds one to a slot in place, using `IncLocal` for locals.
    fn emit_increment(&mut self, sym: Symbol) -> Result<(), CompileError> {
        if sym.scope == SymbolScope::Local {
            let slot = local_u8(sym);
            self.builder().emit_u8(Opcode::IncLocal, slot);
        } else {
            self.emit_get(sym);
            let idx = self.add_constant(int_value(1))?;
            self.builder().emit_u16(Opcode::Constant, idx);
            self.builder().emit(Opcode::Add);
            self.emit_set(sym);
        }
        Ok(())
    }

    /// Defines a uniquely named synthetic local for loop plumbing.
    fn define_synthetic(&mut self, kind: &str) -> Result<Symbol, CompileError> {
        let name = format!("<{kind}_{}>", self.synth_counter);
        self.synth_counter += 1;
        let id = self.interner.intern(&name);
        self.symbols.define(id)
    }

    fn add_constant(&mut self, value: ValueRef) -> Result<u16, CompileError> {
        let idx = self.constants.len();
        let idx = u16::try_from(idx).map_err(|_| CompileError::new("too many constants (max 65536)"))?;
        self.constants.push(value);
        Ok(idx)
    }
}

fn local_u8(sym: Symbol) -> u8 {
    u8::try_from(sym.index).expect("local slot exceeds u8; define() enforces the limit")
}

/// Collects declaration names for star imports: top-level functions, types,
/// and module blocks (including declarations nested in module bodies).
fn collect_exported_names(statements: &[Stmt], out: &mut Vec<String>) {
    for stmt in statements {
        match stmt {
            Stmt::Func { name, .. } | Stmt::TypeDecl { name, .. } => out.push(name.clone()),
            Stmt::Module { name, body } => {
                out.push(name.clone());
                collect_exported_names(body, out);
            }
            _ => {}
        }
    }
}

/// Attempts compile-time folding of an infix expression.
///
/// Folds integer arithmetic and comparisons, plus string `+`, `==`, and
/// `!=`, recursing one level into infix operands so `1 + 2 * 3` becomes a
/// single constant.
fn fold_infix(left: &Expr, op: InfixOp, right: &Expr) -> Option<Folded> {
    let lhs = literal_operand(left, true)?;
    let rhs = literal_operand(right, true)?;
    fold_values(&lhs, op, &rhs)
}

/// Extracts a literal value from an operand, optionally folding one nested
/// infix level.
fn literal_operand(expr: &Expr, recurse: bool) -> Option<Folded> {
    match expr {
        Expr::Int(n) => Some(Folded::Int(*n)),
        Expr::Str(s) => Some(Folded::Str(s.clone())),
        Expr::Infix { left, op, right } if recurse => {
            let lhs = literal_operand(left, false)?;
            let rhs = literal_operand(right, false)?;
            fold_values(&lhs, *op, &rhs)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bytecode::disassemble;
    use crate::parser;

    fn compile(source: &str) -> Bytecode {
        let program = parser::parse(source).expect("parse failed");
        Compiler::new().compile(&program).expect("compile failed")
    }

    fn compile_err(source: &str) -> CompileError {
        let program = parser::parse(source).expect("parse failed");
        Compiler::new().compile(&program).expect_err("expected compile error")
    }

    #[test]
    fn test_constant_folding_arithmetic() {
        for (source, expected) in [("1 + 2", 3i64), ("5 * 10", 50), ("100 - 50", 50), ("20 / 4", 5)] {
            let bytecode = compile(source);
            assert_eq!(
                disassemble(&bytecode.instructions),
                "0000 Constant 0\n0003 Pop\n",
                "source: {source}"
            );
            assert!(matches!(bytecode.constants[0].as_ref(), Value::Int(n) if *n == expected));
        }
    }

    #[test]
    fn test_constant_folding_recurses_one_level() {
        let bytecode = compile("1 + 2 * 3");
        assert_eq!(disassemble(&bytecode.instructions), "0000 Constant 0\n0003 Pop\n");
        assert!(matches!(bytecode.constants[0].as_ref(), Value::Int(7)));
    }

    #[test]
    fn test_constant_folding_comparisons() {
        let bytecode = compile("1 < 2");
        assert_eq!(disassemble(&bytecode.instructions), "0000 True\n0001 Pop\n");
        let bytecode = compile("3 == 4");
        assert_eq!(disassemble(&bytecode.instructions), "0000 False\n0001 Pop\n");
    }

    #[test]
    fn test_constant_folding_strings() {
        let bytecode = compile("\"ab\" + \"cd\"");
        assert_eq!(disassemble(&bytecode.instructions), "0000 Constant 0\n0003 Pop\n");
        assert!(matches!(bytecode.constants[0].as_ref(), Value::Str(s) if s == "abcd"));
        let bytecode = compile("\"x\" == \"x\"");
        assert_eq!(disassemble(&bytecode.instructions), "0000 True\n0001 Pop\n");
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let bytecode = compile("1 / 0");
        assert!(disassemble(&bytecode.instructions).contains("Div"));
    }

    #[test]
    fn test_set_local_zero_has_no_constant() {
        let bytecode = compile("i = 0");
        assert_eq!(disassemble(&bytecode.instructions), "0000 SetLocalZero 0\n");
        assert!(bytecode.constants.is_empty());
        assert_eq!(bytecode.main_locals, 1);
    }

    #[test]
    fn test_increment_specialization() {
        let bytecode = compile("i = 0\ni = i + 1\ni = 1 + i\ni = i - 1");
        assert_eq!(
            disassemble(&bytecode.instructions),
            "0000 SetLocalZero 0\n0002 IncLocal 0\n0004 IncLocal 0\n0006 DecLocal 0\n"
        );
    }

    #[test]
    fn test_accumulate_specialization() {
        let bytecode = compile("sum = 0\nother = 5\nsum = sum + other\nsum = other + sum");
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("AddLocal 0 1"), "listing:\n{listing}");
        assert_eq!(listing.matches("AddLocal").count(), 2);
        assert!(!listing.contains(" Add\n"));
    }

    #[test]
    fn test_fused_while_loop() {
        let bytecode = compile("count = 0\nwhile count < 5: count = count + 1");
        assert_eq!(
            disassemble(&bytecode.instructions),
            "0000 SetLocalZero 0\n\
             0002 JumpIfLocalGreaterEqualConst 0 0 13\n\
             0008 IncLocal 0\n\
             0010 Jump 2\n"
        );
        assert!(matches!(bytecode.constants[0].as_ref(), Value::Int(5)));
    }

    #[test]
    fn test_unfused_while_on_globals() {
        // REPL mode keeps top-level names global, so the loop check cannot
        // fuse; semantics must come from the general opcodes.
        let program = parser::parse("count = 0\nwhile count < 5: count = count + 1").unwrap();
        let bytecode = Compiler::new_repl().compile(&program).unwrap();
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("JumpNotTruth"));
        assert!(listing.contains("LessThan"));
        assert!(!listing.contains("JumpIfLocalGreaterEqualConst"));
    }

    #[test]
    fn test_forward_function_references() {
        let bytecode = compile("func first() { return second() }\nfunc second() { return 1 }");
        assert_eq!(bytecode.main_function, -1);
        assert_eq!(bytecode.constants.len(), 3);
    }

    #[test]
    fn test_main_function_is_recorded_and_called() {
        let bytecode = compile("func main() { return 7 }");
        assert!(bytecode.main_function >= 0);
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("Call 0"), "listing:\n{listing}");
    }

    #[test]
    fn test_if_else_jump_shape() {
        let bytecode = compile("x = 1\nif x: print(x)\nelse: print(0)");
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("JumpNotTruth"));
        assert!(listing.contains("Jump"));
    }

    #[test]
    fn test_break_patches_past_loop_end() {
        let bytecode = compile("while True:\n    break\nx = 1");
        let listing = disassemble(&bytecode.instructions);
        // The break Jump targets the statement after the loop.
        assert!(listing.contains("Jump"), "listing:\n{listing}");
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let err = compile_err("break");
        assert!(err.message.contains("break"));
    }

    #[test]
    fn test_return_outside_function_is_an_error() {
        let err = compile_err("return 1");
        assert!(err.message.contains("return"));
    }

    #[test]
    fn test_undefined_identifier_is_an_error() {
        let err = compile_err("x = missing");
        assert!(err.message.contains("undefined identifier"));
    }

    #[test]
    fn test_enclosing_function_local_is_an_error() {
        let err = compile_err("func outer() {\n    a = 1\n    func inner() { return a }\n}");
        assert!(err.message.contains("enclosing"), "message: {}", err.message);
    }

    #[test]
    fn test_postfix_on_global_is_an_error() {
        let program = parser::parse("x = 1\nx++").unwrap();
        let err = Compiler::new_repl().compile(&program).unwrap_err();
        assert!(err.message.contains("local"), "message: {}", err.message);
    }

    #[test]
    fn test_postfix_on_local_emits_fused_opcode() {
        let bytecode = compile("i = 0\ni++\ni--");
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("PostfixInc 0"));
        assert!(listing.contains("PostfixDec 0"));
    }

    #[test]
    fn test_member_access_lowers_to_index() {
        let bytecode = compile("m = {\"a\": 1}\nx = m.a");
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("Hash 2"));
        assert!(listing.contains("Index"));
    }

    #[test]
    fn test_type_decl_synthesizes_constructor() {
        let bytecode = compile("type User:\n    name\n    email\n");
        let func = bytecode
            .constants
            .iter()
            .find_map(|c| match c.as_ref() {
                Value::Function(f) => Some(f.clone()),
                _ => None,
            })
            .expect("constructor constant");
        assert_eq!(func.num_params, 2);
        assert_eq!(func.num_locals, 2);
        let listing = disassemble(&func.instructions);
        assert!(listing.contains("Hash 4"));
        assert!(listing.contains("ReturnValue"));
    }

    #[test]
    fn test_service_desugars_to_builtin_calls() {
        let source = "func handler(req) { return \"ok\" }\nservice Api on \":8080\":\n    use handler\n    get \"/x\" -> handler\n";
        let bytecode = compile(source);
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains(&format!("GetBuiltin {}", Builtin::Middleware as u8)));
        assert!(listing.contains(&format!("GetBuiltin {}", Builtin::Route as u8)));
        assert!(listing.contains(&format!("GetBuiltin {}", Builtin::Listen as u8)));
    }

    #[test]
    fn test_spawn_await_emit_task_opcodes() {
        let bytecode = compile("t = spawn 1 + 2\nx = await t");
        let listing = disassemble(&bytecode.instructions);
        assert!(listing.contains("Task"));
        assert!(listing.contains("Await"));
    }

    #[test]
    fn test_from_import_lowering_reimports_per_symbol() {
        // Lowering emits Import/Constant/Index/SetLocal per name; the
        // runtime cache makes the re-imports cheap.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.flowa"), "func a() { return 1 }\nfunc b() { return 2 }\n").unwrap();
        let program = parser::parse("from \"lib.flowa\" import a, b").unwrap();
        let mut compiler = Compiler::new();
        compiler.set_base_dir(dir.path());
        let bytecode = compiler.compile(&program).unwrap();
        let listing = disassemble(&bytecode.instructions);
        assert_eq!(listing.matches("Import").count(), 2);
        assert_eq!(listing.matches("Index").count(), 2);
    }

    #[test]
    fn test_star_import_discovers_exports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.flowa"), "func a() { return 1 }\ntype T:\n    x\n").unwrap();
        let program = parser::parse("from \"lib.flowa\" import *").unwrap();
        let mut compiler = Compiler::new();
        compiler.set_base_dir(dir.path());
        let bytecode = compiler.compile(&program).unwrap();
        let listing = disassemble(&bytecode.instructions);
        assert_eq!(listing.matches("Import").count(), 2, "one per discovered export");
    }

    #[test]
    fn test_defer_runs_before_returns() {
        let source = "func f() {\n    defer print(\"late\")\n    return 1\n}";
        let bytecode = compile(source);
        let func = bytecode
            .constants
            .iter()
            .find_map(|c| match c.as_ref() {
                Value::Function(f) => Some(f.clone()),
                _ => None,
            })
            .expect("function constant");
        let listing = disassemble(&func.instructions);
        // The deferred print call sits between the return value load and
        // the ReturnValue.
        let call_pos = listing.find("Call 1").expect("deferred call");
        let ret_pos = listing.find("ReturnValue").expect("return");
        assert!(call_pos < ret_pos, "listing:\n{listing}");
    }
}

fn fold_values(lhs: &Folded, op: InfixOp, rhs: &Folded) -> Option<Folded> {
    match (lhs, rhs) {
        (Folded::Int(a), Folded::Int(b)) => {
            let folded = match op {
                InfixOp::Add => Folded::Int(a.wrapping_add(*b)),
                InfixOp::Sub => Folded::Int(a.wrapping_sub(*b)),
                InfixOp::Mul => Folded::Int(a.wrapping_mul(*b)),
                InfixOp::Div => {
                    // Division by zero stays a runtime error.
                    if *b == 0 {
                        return None;
                    }
                    Folded::Int(a.wrapping_div(*b))
                }
                InfixOp::Eq => Folded::Bool(a == b),
                InfixOp::NotEq => Folded::Bool(a != b),
                InfixOp::Lt => Folded::Bool(a < b),
                InfixOp::Gt => Folded::Bool(a > b),
                InfixOp::LtEq => Folded::Bool(a <= b),
                InfixOp::GtEq => Folded::Bool(a >= b),
            };
            Some(folded)
        }
        (Folded::Str(a), Folded::Str(b)) => match op {
            InfixOp::Add => Some(Folded::Str(format!("{a}{b}"))),
            InfixOp::Eq => Some(Folded::Bool(a == b)),
            InfixOp::NotEq => Some(Folded::Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}
