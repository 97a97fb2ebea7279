//! Procedure source language.
//!
//! Procedures arrive as text produced by a test generator. The language is
//! small: module constants, `fn` / `async fn` definitions, `let` bindings,
//! calls with positional and keyword arguments, member access, `+` and
//! `await`. Everything a procedure can do goes through its context
//! parameter.
//!
//! ```text
//! let BASE = "http://localhost:8080";
//!
//! async fn test_add_task(ctx) {
//!     await ctx.page.goto(BASE + "/todo");
//!     await ctx.page.get_by_label("New task").fill("write docs");
//!     await ctx.page.get_by_role("button", name="Add").click();
//!     await ctx.expect(ctx.page.get_by_test_id("count")).to_have_text("1 task");
//! }
//! ```
//!
//! [`compile`] parses and resolves the whole text up front, so a procedure
//! that references an unknown name fails to load instead of failing halfway
//! through a browser session.

pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;

use crate::context::ExecutionContext;
use crate::procedure::Procedure;
use crate::result::{HarnessResult, LoadError};
use ast::{Expr, ExprKind, Function, Module, Stmt};
use async_trait::async_trait;
use interpreter::{eval_constant, Interpreter, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Parsed and validated procedure source
#[derive(Debug)]
pub struct Script {
    module: Module,
    constants: HashMap<String, Value>,
    source: String,
}

impl Script {
    /// Syntax tree
    #[must_use]
    pub const fn module(&self) -> &Module {
        &self.module
    }

    /// Value of a module constant
    #[must_use]
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    /// Original text
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parse, evaluate constants and resolve names
pub fn compile(source: &str) -> Result<Script, LoadError> {
    let module = parser::Parser::parse_str(source)?;

    let mut seen = HashSet::new();
    for (name, line) in module
        .constants
        .iter()
        .map(|c| (&c.name, c.line))
        .chain(module.functions.iter().map(|f| (&f.name, f.line)))
    {
        if !seen.insert(name.as_str()) {
            return Err(LoadError::DuplicateDefinition {
                name: name.clone(),
                line,
            });
        }
    }

    let mut constants = HashMap::new();
    for constant in &module.constants {
        let value = eval_constant(&constant.value, &constants).map_err(|message| {
            LoadError::InvalidConstant {
                name: constant.name.clone(),
                message,
            }
        })?;
        constants.insert(constant.name.clone(), value);
    }

    let resolver = Resolver {
        module: &module,
        constants: &constants,
    };
    for function in &module.functions {
        resolver.function(function)?;
    }

    Ok(Script {
        module,
        constants,
        source: source.to_string(),
    })
}

struct Resolver<'a> {
    module: &'a Module,
    constants: &'a HashMap<String, Value>,
}

impl Resolver<'_> {
    fn function(&self, function: &Function) -> Result<(), LoadError> {
        let mut scope: HashSet<&str> = HashSet::new();
        for param in &function.params {
            if !scope.insert(param.as_str()) {
                return Err(LoadError::DuplicateDefinition {
                    name: param.clone(),
                    line: function.line,
                });
            }
        }
        for stmt in &function.body {
            match stmt {
                Stmt::Let { name, value, .. } => {
                    self.expr(value, &scope)?;
                    scope.insert(name.as_str());
                }
                Stmt::Expr(expr) => self.expr(expr, &scope)?,
                Stmt::Return { value, .. } => {
                    if let Some(expr) = value {
                        self.expr(expr, &scope)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn expr(&self, expr: &Expr, scope: &HashSet<&str>) -> Result<(), LoadError> {
        match &expr.kind {
            ExprKind::Str(_) | ExprKind::Number(_) | ExprKind::Bool(_) | ExprKind::Null => Ok(()),
            ExprKind::Ident(name) => {
                if scope.contains(name.as_str()) || self.constants.contains_key(name) {
                    Ok(())
                } else if self.module.function(name).is_some() {
                    Err(syntax(expr, format!("function '{name}' must be called")))
                } else {
                    Err(LoadError::UnresolvedName {
                        name: name.clone(),
                        line: expr.line,
                    })
                }
            }
            ExprKind::Member { object, .. } => self.expr(object, scope),
            ExprKind::Add(left, right) => {
                self.expr(left, scope)?;
                self.expr(right, scope)
            }
            ExprKind::Await(inner) => self.expr(inner, scope),
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => {
                for arg in args.iter().chain(kwargs.iter().map(|(_, e)| e)) {
                    self.expr(arg, scope)?;
                }
                match &callee.kind {
                    ExprKind::Ident(name) => self.call(callee, name, args.len(), kwargs, scope),
                    ExprKind::Member { object, .. } => self.expr(object, scope),
                    _ => Err(syntax(callee, "expression is not callable".to_string())),
                }
            }
        }
    }

    fn call(
        &self,
        callee: &Expr,
        name: &str,
        found: usize,
        kwargs: &[(String, Expr)],
        scope: &HashSet<&str>,
    ) -> Result<(), LoadError> {
        let local = scope.contains(name) || self.constants.contains_key(name);
        let Some(function) = self.module.function(name).filter(|_| !local) else {
            if local {
                return Err(syntax(callee, format!("'{name}' is not a function")));
            }
            return Err(LoadError::UnresolvedName {
                name: name.to_string(),
                line: callee.line,
            });
        };
        if !kwargs.is_empty() {
            return Err(syntax(
                callee,
                format!("'{name}' does not take keyword arguments"),
            ));
        }
        if function.params.len() != found {
            return Err(LoadError::ArityMismatch {
                name: name.to_string(),
                expected: function.params.len(),
                found,
                line: callee.line,
            });
        }
        Ok(())
    }
}

fn syntax(expr: &Expr, message: String) -> LoadError {
    LoadError::Syntax {
        line: expr.line,
        column: expr.column,
        message,
    }
}

/// One function of a compiled [`Script`], runnable as a [`Procedure`]
#[derive(Debug, Clone)]
pub struct ScriptProcedure {
    script: Arc<Script>,
    entry: String,
}

impl ScriptProcedure {
    /// Procedure running `entry` from `script`
    #[must_use]
    pub fn new(script: Arc<Script>, entry: impl Into<String>) -> Self {
        Self {
            script,
            entry: entry.into(),
        }
    }

    /// The compiled script
    #[must_use]
    pub fn script(&self) -> &Script {
        &self.script
    }
}

#[async_trait]
impl Procedure for ScriptProcedure {
    async fn run(&self, ctx: &ExecutionContext) -> HarnessResult<()> {
        Interpreter::new(&self.script, ctx).run_entry(&self.entry).await
    }

    fn name(&self) -> Option<&str> {
        Some(&self.entry)
    }

    fn source(&self) -> Option<&str> {
        Some(self.script.source())
    }
}
