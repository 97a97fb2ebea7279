//! Tree-walking evaluator for compiled procedure source.
//!
//! The only ambient capability is the context value bound to the entry
//! point's parameter. Every capability call completes before the next
//! expression is evaluated, so `await` is accepted but changes nothing.

use super::ast::{Expr, ExprKind, Function, Stmt};
use super::Script;
use crate::assertion::{LocatorAssertions, PageAssertions};
use crate::context::{ExecutionContext, PatternMatcher};
use crate::locator::{normalize_whitespace, Locator, Pattern, TextMatch};
use crate::result::{HarnessError, HarnessResult};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;

/// Maximum nesting of calls to module functions
pub const MAX_CALL_DEPTH: usize = 64;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    Str(String),
    /// Compiled pattern from `ctx.re.compile`
    Pattern(Pattern),
    /// The execution context
    Context,
    /// `ctx.page`
    Page,
    /// `ctx.re`
    Re,
    /// `ctx.uuid`
    Uuid,
    /// Element locator
    Locator(Locator),
    /// `ctx.expect(locator)`
    LocatorExpect(LocatorAssertions),
    /// `ctx.expect(ctx.page)`
    PageExpect(PageAssertions),
}

impl Value {
    /// Type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Pattern(_) => "pattern",
            Self::Context => "context",
            Self::Page => "page",
            Self::Re => "re",
            Self::Uuid => "uuid",
            Self::Locator(_) => "locator",
            Self::LocatorExpect(_) | Self::PageExpect(_) => "assertion",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Pattern(p) => write!(f, "{p}"),
            Self::Locator(l) => write!(f, "{l}"),
            other => write!(f, "<{}>", other.type_name()),
        }
    }
}

/// Evaluate a module constant initializer.
///
/// Only literals, earlier constants and `+` are allowed.
pub fn eval_constant(expr: &Expr, known: &HashMap<String, Value>) -> Result<Value, String> {
    match &expr.kind {
        ExprKind::Str(s) => Ok(Value::Str(s.clone())),
        ExprKind::Number(n) => Ok(Value::Number(*n)),
        ExprKind::Bool(b) => Ok(Value::Bool(*b)),
        ExprKind::Null => Ok(Value::Null),
        ExprKind::Ident(name) => known
            .get(name)
            .cloned()
            .ok_or_else(|| format!("'{name}' is not an earlier constant")),
        ExprKind::Add(left, right) => {
            let l = eval_constant(left, known)?;
            let r = eval_constant(right, known)?;
            add(l, r)
        }
        _ => Err("only literals, constants and '+' are allowed".to_string()),
    }
}

fn add(left: Value, right: Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::Str(a), b) => Ok(Value::Str(format!("{a}{b}"))),
        (a, Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (a, b) => Err(format!(
            "cannot add {} and {}",
            a.type_name(),
            b.type_name()
        )),
    }
}

type Frame = HashMap<String, Value>;

/// Runs functions of one [`Script`] against one context
pub struct Interpreter<'a> {
    script: &'a Script,
    ctx: &'a ExecutionContext,
}

impl<'a> Interpreter<'a> {
    /// Interpreter bound to `ctx`
    #[must_use]
    pub const fn new(script: &'a Script, ctx: &'a ExecutionContext) -> Self {
        Self { script, ctx }
    }

    /// Call `entry` with the context as its only argument
    pub async fn run_entry(&self, entry: &str) -> HarnessResult<()> {
        let function = self
            .script
            .module()
            .function(entry)
            .ok_or_else(|| HarnessError::script(0, format!("function '{entry}' is not defined")))?;
        tracing::debug!(entry, "running procedure");
        self.call(function, vec![Value::Context], 0).await.map(|_| ())
    }

    fn call<'b>(
        &'b self,
        function: &'b Function,
        args: Vec<Value>,
        depth: usize,
    ) -> BoxFuture<'b, HarnessResult<Value>> {
        async move {
            if depth >= MAX_CALL_DEPTH {
                return Err(HarnessError::script(
                    function.line,
                    format!("maximum call depth {MAX_CALL_DEPTH} exceeded in '{}'", function.name),
                ));
            }
            if args.len() != function.params.len() {
                return Err(HarnessError::script(
                    function.line,
                    format!(
                        "'{}' takes {} argument(s) but {} were given",
                        function.name,
                        function.params.len(),
                        args.len()
                    ),
                ));
            }

            let mut frame: Frame = function.params.iter().cloned().zip(args).collect();
            for stmt in &function.body {
                tracing::debug!(function = %function.name, line = stmt.line(), "step");
                match stmt {
                    Stmt::Let { name, value, .. } => {
                        let value = self.eval(value, &mut frame, depth).await?;
                        frame.insert(name.clone(), value);
                    }
                    Stmt::Expr(expr) => {
                        self.eval(expr, &mut frame, depth).await?;
                    }
                    Stmt::Return { value, .. } => {
                        return match value {
                            Some(expr) => self.eval(expr, &mut frame, depth).await,
                            None => Ok(Value::Null),
                        };
                    }
                }
            }
            Ok(Value::Null)
        }
        .boxed()
    }

    fn eval<'b>(
        &'b self,
        expr: &'b Expr,
        frame: &'b mut Frame,
        depth: usize,
    ) -> BoxFuture<'b, HarnessResult<Value>> {
        async move {
            let line = expr.line;
            match &expr.kind {
                ExprKind::Str(s) => Ok(Value::Str(s.clone())),
                ExprKind::Number(n) => Ok(Value::Number(*n)),
                ExprKind::Bool(b) => Ok(Value::Bool(*b)),
                ExprKind::Null => Ok(Value::Null),
                ExprKind::Ident(name) => frame
                    .get(name)
                    .or_else(|| self.script.constant(name))
                    .cloned()
                    .ok_or_else(|| HarnessError::script(line, format!("'{name}' is not defined"))),
                ExprKind::Member { object, name } => {
                    let receiver = self.eval(object, frame, depth).await?;
                    self.attribute(receiver, name, line)
                }
                ExprKind::Add(left, right) => {
                    let l = self.eval(left, frame, depth).await?;
                    let r = self.eval(right, frame, depth).await?;
                    add(l, r).map_err(|message| HarnessError::script(line, message))
                }
                ExprKind::Await(inner) => self.eval(inner, frame, depth).await,
                ExprKind::Call {
                    callee,
                    args,
                    kwargs,
                } => {
                    let mut positional = Vec::with_capacity(args.len());
                    for arg in args {
                        positional.push(self.eval(arg, frame, depth).await?);
                    }
                    let mut keyword = Vec::with_capacity(kwargs.len());
                    for (name, arg) in kwargs {
                        keyword.push((name.clone(), self.eval(arg, frame, depth).await?));
                    }

                    match &callee.kind {
                        ExprKind::Ident(name) => {
                            let function = self.script.module().function(name).ok_or_else(|| {
                                HarnessError::script(line, format!("'{name}' is not a function"))
                            })?;
                            self.call(function, positional, depth + 1).await
                        }
                        ExprKind::Member { object, name } => {
                            let receiver = self.eval(object, frame, depth).await?;
                            let args = Args {
                                method: name.clone(),
                                positional,
                                keyword,
                                line,
                            };
                            self.method(receiver, args).await
                        }
                        _ => Err(HarnessError::script(line, "expression is not callable")),
                    }
                }
            }
        }
        .boxed()
    }

    fn attribute(&self, receiver: Value, name: &str, line: usize) -> HarnessResult<Value> {
        match (&receiver, name) {
            (Value::Context, "page") => Ok(Value::Page),
            (Value::Context, "re") => Ok(Value::Re),
            (Value::Context, "uuid") => Ok(Value::Uuid),
            (Value::Re, "I" | "IGNORECASE") => Ok(Value::Number(f64::from(PatternMatcher::IGNORECASE))),
            (Value::Locator(l), "first") => Ok(Value::Locator(l.clone().first())),
            (Value::Locator(l), "last") => Ok(Value::Locator(l.clone().last())),
            (Value::Pattern(p), "pattern") => Ok(Value::Str(p.source().to_string())),
            _ => Err(HarnessError::script(
                line,
                format!("{} has no attribute '{name}'", receiver.type_name()),
            )),
        }
    }

    async fn method(&self, receiver: Value, args: Args) -> HarnessResult<Value> {
        match receiver {
            Value::Context => self.context_method(args),
            Value::Page => self.page_method(args).await,
            Value::Locator(locator) => locator_method(&locator, args).await,
            Value::LocatorExpect(assertions) => locator_assertion(&assertions, args).await,
            Value::PageExpect(assertions) => match args.method.as_str() {
                "to_have_url" => {
                    args.arity(1, 1)?;
                    let expected = args.text_match(0)?;
                    args.finish()?;
                    assertions.to_have_url(expected).await?;
                    Ok(Value::Null)
                }
                _ => Err(args.unknown("page assertion")),
            },
            Value::Re => self.re_method(args),
            Value::Uuid => match args.method.as_str() {
                "uuid4" => {
                    args.arity(0, 0)?;
                    args.finish()?;
                    Ok(Value::Str(self.ctx.uuid().uuid4().to_string()))
                }
                _ => Err(args.unknown("uuid")),
            },
            other => Err(HarnessError::script(
                args.line,
                format!("{} has no method '{}'", other.type_name(), args.method),
            )),
        }
    }

    fn context_method(&self, args: Args) -> HarnessResult<Value> {
        match args.method.as_str() {
            "expect" => {
                args.arity(1, 1)?;
                args.finish()?;
                match &args.positional[0] {
                    Value::Locator(l) => Ok(Value::LocatorExpect(self.ctx.expect().that(l))),
                    Value::Page => Ok(Value::PageExpect(
                        self.ctx.expect().page(self.ctx.page().raw()),
                    )),
                    other => Err(HarnessError::script(
                        args.line,
                        format!("expect() needs a locator or the page, got {}", other.type_name()),
                    )),
                }
            }
            _ => Err(args.unknown("context")),
        }
    }

    async fn page_method(&self, mut args: Args) -> HarnessResult<Value> {
        let page = self.ctx.page();
        let value = match args.method.as_str() {
            "goto" => {
                args.arity(1, 1)?;
                let url = args.string(0)?;
                args.finish()?;
                page.goto(&url).await?;
                Value::Null
            }
            "url" => {
                args.arity(0, 0)?;
                args.finish()?;
                Value::Str(page.url().await?)
            }
            "reload" => {
                args.arity(0, 0)?;
                args.finish()?;
                page.reload().await?;
                Value::Null
            }
            "wait_for_timeout" => {
                args.arity(1, 1)?;
                let ms = args.index(0)?;
                args.finish()?;
                page.wait_for_timeout(ms as u64).await?;
                Value::Null
            }
            "get_by_role" => {
                args.arity(1, 1)?;
                let role = args.string(0)?;
                let name = args.take_keyword("name");
                let exact = args.flag("exact")?;
                args.finish()?;
                let mut locator = page.get_by_role(&role);
                if let Some(name) = name {
                    locator = locator.with_name(to_text_match(name, args.line)?);
                }
                Value::Locator(if exact { locator.exact() } else { locator })
            }
            "get_by_text" | "get_by_label" | "get_by_placeholder" => {
                args.arity(1, 1)?;
                let text = args.text_match(0)?;
                let exact = args.flag("exact")?;
                args.finish()?;
                let locator = match args.method.as_str() {
                    "get_by_text" => page.get_by_text(text),
                    "get_by_label" => page.get_by_label(text),
                    _ => page.get_by_placeholder(text),
                };
                Value::Locator(if exact { locator.exact() } else { locator })
            }
            "get_by_test_id" => {
                args.arity(1, 1)?;
                let id = args.string(0)?;
                args.finish()?;
                Value::Locator(page.get_by_test_id(&id))
            }
            "locator" => {
                args.arity(1, 1)?;
                let css = args.string(0)?;
                args.finish()?;
                Value::Locator(page.locator(&css))
            }
            _ => return Err(args.unknown("page")),
        };
        Ok(value)
    }

    fn re_method(&self, mut args: Args) -> HarnessResult<Value> {
        let re = self.ctx.re();
        match args.method.as_str() {
            "compile" => {
                args.arity(1, 2)?;
                let pattern = args.string(0)?;
                let flags = match args.positional.get(1).cloned().or_else(|| args.take_keyword("flags")) {
                    Some(value) => as_index(&value, args.line)?,
                    None => 0,
                };
                args.finish()?;
                Ok(Value::Pattern(re.compile_with(&pattern, flags as u32)?))
            }
            "search" => {
                args.arity(2, 2)?;
                let text = args.string(1)?;
                args.finish()?;
                let found = match &args.positional[0] {
                    Value::Pattern(p) => p.find(&text).map(str::to_string),
                    Value::Str(s) => re.search(s, &text)?,
                    other => {
                        return Err(HarnessError::script(
                            args.line,
                            format!("search() needs a pattern, got {}", other.type_name()),
                        ));
                    }
                };
                Ok(found.map_or(Value::Null, Value::Str))
            }
            "escape" => {
                args.arity(1, 1)?;
                let text = args.string(0)?;
                args.finish()?;
                Ok(Value::Str(re.escape(&text)))
            }
            _ => Err(args.unknown("re")),
        }
    }
}

async fn locator_method(locator: &Locator, args: Args) -> HarnessResult<Value> {
    let value = match args.method.as_str() {
        "click" => {
            args.arity(0, 0)?;
            args.finish()?;
            locator.click().await?;
            Value::Null
        }
        "fill" => {
            args.arity(1, 1)?;
            let text = args.string(0)?;
            args.finish()?;
            locator.fill(&text).await?;
            Value::Null
        }
        "press" => {
            args.arity(1, 1)?;
            let key = args.string(0)?;
            args.finish()?;
            locator.press(&key).await?;
            Value::Null
        }
        "text_content" => {
            args.arity(0, 0)?;
            args.finish()?;
            Value::Str(locator.text_content().await?)
        }
        "inner_text" => {
            args.arity(0, 0)?;
            args.finish()?;
            Value::Str(normalize_whitespace(&locator.text_content().await?))
        }
        "is_visible" => {
            args.arity(0, 0)?;
            args.finish()?;
            Value::Bool(locator.is_visible().await?)
        }
        "count" => {
            args.arity(0, 0)?;
            args.finish()?;
            Value::Number(locator.count().await? as f64)
        }
        "nth" => {
            args.arity(1, 1)?;
            let index = args.index(0)?;
            args.finish()?;
            Value::Locator(locator.clone().nth(index))
        }
        "first" => {
            args.arity(0, 0)?;
            args.finish()?;
            Value::Locator(locator.clone().first())
        }
        "last" => {
            args.arity(0, 0)?;
            args.finish()?;
            Value::Locator(locator.clone().last())
        }
        _ => return Err(args.unknown("locator")),
    };
    Ok(value)
}

async fn locator_assertion(assertions: &LocatorAssertions, args: Args) -> HarnessResult<Value> {
    match args.method.as_str() {
        "to_be_visible" | "to_be_hidden" | "not_to_be_visible" | "to_be_enabled"
        | "to_be_disabled" => {
            args.arity(0, 0)?;
            args.finish()?;
            match args.method.as_str() {
                "to_be_visible" => assertions.to_be_visible().await?,
                "to_be_enabled" => assertions.to_be_enabled().await?,
                "to_be_disabled" => assertions.to_be_disabled().await?,
                _ => assertions.to_be_hidden().await?,
            }
        }
        "to_have_text" => {
            args.arity(1, 1)?;
            let expected = args.text_match(0)?;
            args.finish()?;
            assertions.to_have_text(expected).await?;
        }
        "to_contain_text" => {
            args.arity(1, 1)?;
            let expected = args.string(0)?;
            args.finish()?;
            assertions.to_contain_text(&expected).await?;
        }
        "to_have_value" => {
            args.arity(1, 1)?;
            let expected = args.string(0)?;
            args.finish()?;
            assertions.to_have_value(&expected).await?;
        }
        "to_have_count" => {
            args.arity(1, 1)?;
            let expected = args.index(0)?;
            args.finish()?;
            assertions.to_have_count(expected).await?;
        }
        _ => return Err(args.unknown("locator assertion")),
    }
    Ok(Value::Null)
}

fn to_text_match(value: Value, line: usize) -> HarnessResult<TextMatch> {
    match value {
        Value::Str(s) => Ok(TextMatch::from(s)),
        Value::Pattern(p) => Ok(TextMatch::from(p)),
        other => Err(HarnessError::script(
            line,
            format!("expected a string or pattern, got {}", other.type_name()),
        )),
    }
}

fn as_index(value: &Value, line: usize) -> HarnessResult<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64 => {
            Ok(*n as usize)
        }
        other => Err(HarnessError::script(
            line,
            format!("expected a non-negative integer, got {other}"),
        )),
    }
}

struct Args {
    method: String,
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
    line: usize,
}

impl Args {
    fn arity(&self, min: usize, max: usize) -> HarnessResult<()> {
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(HarnessError::script(
                self.line,
                format!("{}() takes {expected} argument(s) but {n} were given", self.method),
            ));
        }
        Ok(())
    }

    fn string(&self, index: usize) -> HarnessResult<String> {
        match self.positional.get(index) {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(HarnessError::script(
                self.line,
                format!(
                    "{}() argument {} must be a string, got {}",
                    self.method,
                    index + 1,
                    other.type_name()
                ),
            )),
            None => Err(HarnessError::script(
                self.line,
                format!("{}() is missing argument {}", self.method, index + 1),
            )),
        }
    }

    fn index(&self, index: usize) -> HarnessResult<usize> {
        let value = self.positional.get(index).cloned().unwrap_or(Value::Null);
        as_index(&value, self.line)
    }

    fn text_match(&self, index: usize) -> HarnessResult<TextMatch> {
        let value = self.positional.get(index).cloned().unwrap_or(Value::Null);
        to_text_match(value, self.line)
    }

    fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let position = self.keyword.iter().position(|(k, _)| k == name)?;
        Some(self.keyword.remove(position).1)
    }

    fn flag(&mut self, name: &str) -> HarnessResult<bool> {
        match self.take_keyword(name) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(other) => Err(HarnessError::script(
                self.line,
                format!("{name}= must be true or false, got {}", other.type_name()),
            )),
        }
    }

    fn finish(&self) -> HarnessResult<()> {
        match self.keyword.first() {
            None => Ok(()),
            Some((name, _)) => Err(HarnessError::script(
                self.line,
                format!("{}() got an unexpected keyword argument '{name}'", self.method),
            )),
        }
    }

    fn unknown(&self, receiver: &str) -> HarnessError {
        HarnessError::script(
            self.line,
            format!("{receiver} has no method '{}'", self.method),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lit(kind: ExprKind) -> Expr {
        Expr::new(kind, 1, 1)
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Page.to_string(), "<page>");
    }

    #[test]
    fn test_add() {
        assert_eq!(
            add(Value::Str("n".into()), Value::Number(1.0)).unwrap().to_string(),
            "n1"
        );
        assert!(matches!(
            add(Value::Number(1.0), Value::Number(2.0)).unwrap(),
            Value::Number(n) if (n - 3.0).abs() < f64::EPSILON
        ));
        assert!(add(Value::Null, Value::Bool(true)).is_err());
    }

    #[test]
    fn test_eval_constant() {
        let mut known = HashMap::new();
        known.insert("BASE".to_string(), Value::Str("http://app".into()));
        let expr = lit(ExprKind::Add(
            Box::new(lit(ExprKind::Ident("BASE".into()))),
            Box::new(lit(ExprKind::Str("/play".into()))),
        ));
        assert_eq!(eval_constant(&expr, &known).unwrap().to_string(), "http://app/play");

        let call = lit(ExprKind::Call {
            callee: Box::new(lit(ExprKind::Ident("f".into()))),
            args: Vec::new(),
            kwargs: Vec::new(),
        });
        assert!(eval_constant(&call, &known).is_err());
        assert!(eval_constant(&lit(ExprKind::Ident("LATER".into())), &known).is_err());
    }

    #[test]
    fn test_as_index() {
        assert_eq!(as_index(&Value::Number(2.0), 1).unwrap(), 2);
        assert!(as_index(&Value::Number(-1.0), 1).is_err());
        assert!(as_index(&Value::Number(1.5), 1).is_err());
        assert!(as_index(&Value::Str("1".into()), 1).is_err());
    }
}
