//! Evaluator for the command language.
//!
//! Text entry points parse through `argus-interp` and evaluate against the
//! engine. Calls resolve through the table tree to registered functions and
//! run through the same dispatch pipeline as the typed entry points, so
//! provenance and hooks behave identically for both surfaces.

use std::collections::BTreeMap;

use argus_interp::{parse, Expr, Program, Stmt, Value};

use crate::engine::ScriptEngine;
use crate::error::{ScriptError, ScriptResult};
use crate::marshal::Transit;
use crate::stack_guard::StackGuard;

impl ScriptEngine {
    /// Compiles and runs a text fragment.
    pub fn exec(&mut self, text: &str) -> ScriptResult<()> {
        let program = parse(text)?;
        self.eval_program(&program).map(|_| ())
    }

    /// Compiles and runs `return <text>`, marshalling the result.
    pub fn exec_ret<T: Transit>(&mut self, text: &str) -> ScriptResult<T> {
        let program = parse(&format!("return {text}"))?;
        let result = self.eval_program(&program)?;
        T::from_value(&result.unwrap_or(Value::Nil))
    }

    fn eval_program(&mut self, program: &Program) -> ScriptResult<Option<Value>> {
        let guard = StackGuard::new(&self.interp.stack, 0, 0);
        let result = self.eval_statements(program);
        guard.settle(&mut self.interp.stack, result.is_err());
        result
    }

    fn eval_statements(&mut self, program: &Program) -> ScriptResult<Option<Value>> {
        let mut returned = None;
        for stmt in &program.stmts {
            match stmt {
                Stmt::Expr(expr) => {
                    self.eval_expr(expr)?;
                }
                Stmt::Assign { path, value } => {
                    let value = self.eval_expr(value)?;
                    self.interp.tables.set_path(&path.join("."), value)?;
                }
                Stmt::Return(expr) => {
                    returned = Some(self.eval_expr(expr)?);
                }
            }
        }
        Ok(returned)
    }

    fn eval_expr(&mut self, expr: &Expr) -> ScriptResult<Value> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Boolean(*b)),
            Expr::Int(i) => Ok(Value::Integer(i.clone())),
            Expr::Float(f) => Ok(Value::Number(*f)),
            Expr::Str(s) => Ok(Value::Text(s.clone())),
            Expr::Neg(inner) => match self.eval_expr(inner)? {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(ScriptError::invalid_type("number", other.type_name())),
            },
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Record(fields) => {
                let mut map = BTreeMap::new();
                for (name, value) in fields {
                    map.insert(name.clone(), self.eval_expr(value)?);
                }
                Ok(Value::Record(map))
            }
            Expr::Path(path) => {
                // Missing paths read as nil, table-tree style.
                Ok(self
                    .interp
                    .tables
                    .resolve_path(&path.join("."))?
                    .unwrap_or(Value::Nil))
            }
            Expr::Call { path, method, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                let result = match method {
                    None => {
                        let fq = path.join(".");
                        self.dispatch_name(&fq, values)?
                    }
                    Some(method) => {
                        let receiver_path = path.join(".");
                        let receiver = self
                            .interp
                            .tables
                            .resolve_path(&receiver_path)?
                            .ok_or_else(|| {
                                ScriptError::no_such_function(format!(
                                    "{receiver_path}:{method}"
                                ))
                            })?;
                        let table = receiver.as_table()?;
                        // Method lookup walks the inheritance chain.
                        let entry =
                            self.interp.tables.lookup(table, method)?.ok_or_else(|| {
                                ScriptError::no_such_function(format!(
                                    "{receiver_path}:{method}"
                                ))
                            })?;
                        let key = entry.as_function()?;
                        self.dispatch_key(key, values)?
                    }
                };
                Ok(result.unwrap_or(Value::Nil))
            }
        }
    }
}
