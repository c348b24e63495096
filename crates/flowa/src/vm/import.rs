//! Module loading for `OpImport`.
//!
//! Imports are cached by (normalized) path for the lifetime of the outer
//! VM. A cache miss reads the file, runs lex+parse+compile, executes the
//! module in a fresh VM with its own stacks and globals, then collects every
//! populated slot of the module's global scope into a Module value. Nested
//! VMs share the parent's import cache, so diamond-shaped import graphs
//! compile each file exactly once.

use std::path::Path;

use crate::{
    compiler::Compiler,
    error::RuntimeError,
    io::PrintWriter,
    parser,
    value::{ModuleValue, Value, ValueRef},
};

use super::Vm;

impl Vm<'_> {
    /// Resolves `path` against the VM's base directory and returns the
    /// (possibly cached) Module value.
    pub(super) fn import_module(&mut self, path: &str) -> Result<ValueRef, RuntimeError> {
        let full = self.base_dir.join(path);
        let key = full.canonicalize().unwrap_or_else(|_| full.clone());

        if let Some(cached) = self.import_cache.borrow().get(&key) {
            // The in-progress marker is Null; a real entry is a Module.
            if matches!(cached.as_ref(), Value::Null) {
                return Err(RuntimeError::new(format!("circular import of `{path}`")));
            }
            return Ok(cached.clone());
        }

        tracing::debug!(path, "loading module");
        let source = std::fs::read_to_string(&full)
            .map_err(|e| RuntimeError::new(format!("cannot import `{path}`: {e}")))?;
        let program = parser::parse(&source).map_err(|errors| {
            let mut message = format!("import `{path}` failed to parse:");
            for error in &errors {
                message.push_str("\n  ");
                message.push_str(&error.to_string());
            }
            RuntimeError::new(message)
        })?;

        let module_dir = full.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let mut compiler = Compiler::new();
        compiler.set_base_dir(&module_dir);
        let bytecode = compiler
            .compile(&program)
            .map_err(|e| RuntimeError::new(format!("import `{path}` failed to compile: {}", e.message)))?;

        // Mark in-progress so a cycle fails fast instead of recursing.
        self.import_cache.borrow_mut().insert(key.clone(), crate::value::null_value());

        let run_result = {
            let printer: &mut dyn PrintWriter = &mut *self.print;
            let mut nested = Vm::new(&bytecode, printer)
                .with_import_cache(self.import_cache.clone())
                .with_base_dir(module_dir);
            nested
                .run()
                .map(|()| nested.into_globals())
        };
        let globals = match run_result {
            Ok(globals) => globals,
            Err(e) => {
                self.import_cache.borrow_mut().remove(&key);
                return Err(RuntimeError::new(format!("import `{path}` failed: {e}")));
            }
        };

        let name = full
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_owned();
        let mut exports = ahash::AHashMap::new();
        for (export_name, slot) in compiler.global_exports() {
            if let Some(value) = globals.get(usize::from(slot)) {
                if !matches!(value.as_ref(), Value::Null) {
                    exports.insert(export_name, value.clone());
                }
            }
        }

        let module: ValueRef = std::rc::Rc::new(Value::Module(std::rc::Rc::new(ModuleValue { name, exports })));
        self.import_cache.borrow_mut().insert(key, module.clone());
        Ok(module)
    }
}
