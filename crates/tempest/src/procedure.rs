//! Test procedures: the logic a run executes.

use crate::context::ExecutionContext;
use crate::result::HarnessResult;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// An asynchronous routine taking the execution context
#[async_trait]
pub trait Procedure: Send + Sync {
    /// Run against a bound context
    async fn run(&self, ctx: &ExecutionContext) -> HarnessResult<()>;

    /// Routine name, when known
    fn name(&self) -> Option<&str> {
        None
    }

    /// Source text, for procedures loaded from text
    fn source(&self) -> Option<&str> {
        None
    }
}

/// Adapts an async closure into a [`Procedure`].
///
/// The closure receives its own clone of the context.
///
/// ```ignore
/// let procedure = FnProcedure::new(|ctx: ExecutionContext| async move {
///     ctx.page().goto("http://localhost:8080").await?;
///     ctx.expect().that(&ctx.page().get_by_text("Ready")).to_be_visible().await
/// });
/// ```
pub struct FnProcedure<F> {
    f: F,
}

impl<F, Fut> FnProcedure<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = HarnessResult<()>> + Send,
{
    /// Wrap a closure
    #[must_use]
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnProcedure<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnProcedure")
    }
}

#[async_trait]
impl<F, Fut> Procedure for FnProcedure<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = HarnessResult<()>> + Send,
{
    async fn run(&self, ctx: &ExecutionContext) -> HarnessResult<()> {
        (self.f)(ctx.clone()).await
    }
}

/// A procedure as supplied by a caller: ready to run, or as source text
#[derive(Clone)]
pub enum TestProcedure {
    /// Already invocable
    Compiled(Arc<dyn Procedure>),
    /// Procedure source text, compiled by the loader
    Source(String),
}

impl TestProcedure {
    /// Wrap an async closure
    #[must_use]
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HarnessResult<()>> + Send + 'static,
    {
        Self::Compiled(Arc::new(FnProcedure::new(f)))
    }

    /// Wrap any procedure
    #[must_use]
    pub fn compiled(procedure: impl Procedure + 'static) -> Self {
        Self::Compiled(Arc::new(procedure))
    }

    /// Source text, if this procedure has not been compiled yet
    #[must_use]
    pub fn as_source(&self) -> Option<&str> {
        match self {
            Self::Source(text) => Some(text),
            Self::Compiled(_) => None,
        }
    }
}

impl fmt::Debug for TestProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiled(p) => f
                .debug_tuple("Compiled")
                .field(&p.name().unwrap_or("<fn>"))
                .finish(),
            Self::Source(text) => f.debug_tuple("Source").field(&text.len()).finish(),
        }
    }
}

impl From<String> for TestProcedure {
    fn from(text: String) -> Self {
        Self::Source(text)
    }
}

impl From<&str> for TestProcedure {
    fn from(text: &str) -> Self {
        Self::Source(text.to_string())
    }
}

impl From<Arc<dyn Procedure>> for TestProcedure {
    fn from(procedure: Arc<dyn Procedure>) -> Self {
        Self::Compiled(procedure)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text() {
        let p = TestProcedure::from("async fn t(ctx) {}");
        assert_eq!(p.as_source(), Some("async fn t(ctx) {}"));
        assert!(format!("{p:?}").starts_with("Source"));
    }

    #[test]
    fn test_from_fn() {
        let p = TestProcedure::from_fn(|_ctx| async { Ok(()) });
        assert!(p.as_source().is_none());
        assert_eq!(format!("{p:?}"), "Compiled(\"<fn>\")");
    }
}
