//! Procedure Loader: turns a [`TestProcedure`] into something invocable.
//!
//! Ready procedures pass through unchanged. Source text is compiled and
//! exactly one entry point is selected:
//!
//! - a requested [`LoadOptions::entry_point`] must exist and be `async`;
//! - otherwise the first `async fn` in source order wins, with a warning
//!   when there was more than one candidate;
//! - no `async fn` at all is [`LoadError::NoProcedureFound`].
//!
//! The entry point must take exactly one parameter, the context.

use crate::context::ExecutionContext;
use crate::procedure::{Procedure, TestProcedure};
use crate::result::{HarnessResult, LoadError};
use crate::script::{self, ScriptProcedure};
use std::fmt;
use std::sync::Arc;

/// Loader settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Function to run instead of the first `async fn`
    pub entry_point: Option<String>,
}

impl LoadOptions {
    /// Require a named entry point
    #[must_use]
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }
}

/// A procedure ready to be invoked with a context
#[derive(Clone)]
pub struct LoadedProcedure {
    procedure: Arc<dyn Procedure>,
}

impl fmt::Debug for LoadedProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedProcedure")
            .field("name", &self.name())
            .field("from_source", &self.source().is_some())
            .finish()
    }
}

impl LoadedProcedure {
    /// Entry point name, when known
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.procedure.name()
    }

    /// Source text the procedure was compiled from
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.procedure.source()
    }

    /// The invocable procedure
    #[must_use]
    pub fn procedure(&self) -> Arc<dyn Procedure> {
        self.procedure.clone()
    }

    /// Invoke with `ctx`
    pub async fn run(&self, ctx: &ExecutionContext) -> HarnessResult<()> {
        self.procedure.run(ctx).await
    }
}

/// Load a procedure, compiling source text
pub fn load(procedure: TestProcedure, options: &LoadOptions) -> Result<LoadedProcedure, LoadError> {
    let procedure = match procedure {
        TestProcedure::Compiled(procedure) => procedure,
        TestProcedure::Source(text) => {
            let script = Arc::new(script::compile(&text)?);
            let entry = select_entry_point(&script, options)?;
            tracing::debug!(entry = %entry, "procedure compiled");
            Arc::new(ScriptProcedure::new(script, entry))
        }
    };
    Ok(LoadedProcedure { procedure })
}

fn select_entry_point(script: &script::Script, options: &LoadOptions) -> Result<String, LoadError> {
    let module = script.module();
    let function = if let Some(name) = &options.entry_point {
        let function = module
            .function(name)
            .ok_or_else(|| LoadError::EntryPointNotFound { name: name.clone() })?;
        if !function.is_async {
            return Err(LoadError::InvalidEntryPoint {
                name: name.clone(),
                message: "entry point must be declared 'async fn'".to_string(),
            });
        }
        function
    } else {
        let mut candidates = module.async_functions();
        let first = candidates.next().ok_or(LoadError::NoProcedureFound)?;
        let others: Vec<&str> = candidates.map(|f| f.name.as_str()).collect();
        if !others.is_empty() {
            tracing::warn!(
                selected = %first.name,
                ignored = ?others,
                "procedure source defines several async functions; running the first"
            );
        }
        first
    };

    if function.params.len() != 1 {
        return Err(LoadError::InvalidEntryPoint {
            name: function.name.clone(),
            message: format!(
                "entry point must take exactly one parameter (the context), found {}",
                function.params.len()
            ),
        });
    }
    Ok(function.name.clone())
}
