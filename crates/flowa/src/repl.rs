//! Persistent REPL evaluation.
//!
//! Each line parses and compiles against a session-held compiler, so the
//! symbol table, constant pool, and interner stay stable across lines; the
//! global array and import cache likewise survive between evaluations. A
//! trailing expression statement is echoed through `print`.

use crate::{
    ast::{Expr, Stmt},
    compiler::Compiler,
    error::FlowaError,
    io::PrintWriter,
    parser,
    value::ValueRef,
    vm::{ImportCache, Vm},
};

/// One interactive session's accumulated state.
pub struct ReplSession {
    compiler: Compiler,
    globals: Vec<ValueRef>,
    import_cache: ImportCache,
}

impl Default for ReplSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            compiler: Compiler::new_repl(),
            globals: Vec::new(),
            import_cache: ImportCache::default(),
        }
    }

    /// Parses, compiles, and runs one input line. Definitions persist into
    /// later lines; a failed line leaves earlier state intact.
    pub fn eval(&mut self, line: &str, print: &mut dyn PrintWriter) -> Result<(), FlowaError> {
        let mut program = parser::parse(line).map_err(FlowaError::Parse)?;

        // Echo a trailing expression statement: `1 + 2` prints `3`.
        if let Some(Stmt::Expr(_)) = program.statements.last() {
            let Some(Stmt::Expr(expr)) = program.statements.pop() else {
                unreachable!("just matched an expression statement");
            };
            program.statements.push(Stmt::Expr(Expr::Call {
                callee: Box::new(Expr::Ident("print".to_owned())),
                args: vec![expr],
            }));
        }

        let bytecode = self.compiler.compile(&program)?;
        let mut vm = Vm::new(&bytecode, print)
            .with_globals(std::mem::take(&mut self.globals))
            .with_import_cache(self.import_cache.clone());
        let result = vm.run();
        self.globals = vm.into_globals();
        result.map_err(FlowaError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;

    fn eval_ok(session: &mut ReplSession, line: &str) -> String {
        let mut out = CollectStringPrint::new();
        session.eval(line, &mut out).unwrap();
        out.into_output()
    }

    #[test]
    fn test_bindings_survive_across_lines() {
        let mut session = ReplSession::new();
        assert_eq!(eval_ok(&mut session, "x = 40"), "");
        assert_eq!(eval_ok(&mut session, "x + 2"), "42\n");
    }

    #[test]
    fn test_functions_survive_across_lines() {
        let mut session = ReplSession::new();
        eval_ok(&mut session, "func double(n) { return n * 2 }");
        assert_eq!(eval_ok(&mut session, "double(21)"), "42\n");
    }

    #[test]
    fn test_failed_line_keeps_state() {
        let mut session = ReplSession::new();
        eval_ok(&mut session, "x = 7");
        let mut out = CollectStringPrint::new();
        assert!(session.eval("nope(", &mut out).is_err());
        assert_eq!(eval_ok(&mut session, "x"), "7\n");
    }

    #[test]
    fn test_expression_echo_uses_print_formatting() {
        let mut session = ReplSession::new();
        assert_eq!(eval_ok(&mut session, "[1, 2][0]"), "1\n");
        assert_eq!(eval_ok(&mut session, "[1, 2][9]"), "null\n");
    }
}
