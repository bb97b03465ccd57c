//! Resolves a tool name and runs its handler with error containment.

use crate::error::CoreError;
use crate::tools::registry::ToolRegistry;
use crate::tools::traits::ToolContext;
use crate::types::{FunctionCallRequest, ToolResult};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes registered tools.
///
/// `execute` is total: missing tools, handler errors and handler panics
/// all come back as [`ToolResult::Error`]. Calls are re-entrant and may
/// run concurrently; no de-duplication or rate limiting is applied.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self { registry, ctx }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run `name` with `args`.
    pub async fn execute(&self, name: &str, args: &str) -> ToolResult {
        let Some(descriptor) = self.registry.lookup(name) else {
            warn!("Tool not found: {}", name);
            return ToolResult::error(CoreError::ToolNotFound(name.to_string()).to_string());
        };

        debug!("Dispatching {}({})", name, args);

        let outcome = AssertUnwindSafe(descriptor.handler.execute(&self.ctx, args))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                info!("Tool {} returned {}", name, result.kind());
                result
            }
            Ok(Err(e)) => {
                let err = CoreError::ToolExecution {
                    name: name.to_string(),
                    message: format!("{:#}", e),
                };
                warn!("{}", err);
                ToolResult::error(err.to_string())
            }
            Err(panic) => {
                let message = format!("tool {} panicked: {}", name, panic_message(panic.as_ref()));
                warn!("{}", message);
                ToolResult::error(message)
            }
        }
    }

    /// Run a model-issued call, normalising its argument mapping first.
    pub async fn execute_call(&self, call: &FunctionCallRequest) -> ToolResult {
        self.execute(&call.name, &call.arg_string()).await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
