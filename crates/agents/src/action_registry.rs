use {
    anyhow::Result,
    async_trait::async_trait,
    futures::FutureExt,
    serde::Serialize,
    std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc},
    tracing::{debug, warn},
};

use crate::action::{ActionArgs, ActionResult};

pub const UNKNOWN_ACTION: &str = "unknown action";
pub const INVALID_ARGUMENTS: &str = "invalid arguments";

/// Declared type of an action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
}

/// One parameter an action accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }

    fn accepts(&self, args: &ActionArgs) -> bool {
        match args.get(self.name) {
            None => !self.required,
            Some(value) => match self.kind {
                ParamKind::String => !self.required || !value.trim().is_empty(),
                ParamKind::Integer => value.trim().parse::<i64>().is_ok(),
            },
        }
    }
}

/// An operation the completion engine can invoke by name.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn params(&self) -> &[ParamSpec] {
        &[]
    }
    /// Arguments have already been checked against [`Self::params`].
    async fn execute(&self, args: &ActionArgs) -> Result<serde_json::Value>;
}

/// Fixed mapping from action name to handler, built once at startup.
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Box<dyn ActionHandler>) {
        let name = handler.name().to_string();
        if self.handlers.insert(name.clone(), Arc::from(handler)).is_some() {
            warn!(action = %name, "action handler replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ActionHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the named action. Never fails: unknown names, bad arguments,
    /// handler errors and handler panics all come back as
    /// [`ActionResult::Err`].
    pub async fn dispatch(&self, name: &str, args: &ActionArgs) -> ActionResult {
        let Some(handler) = self.handlers.get(name) else {
            warn!(action = %name, "unknown action requested");
            return ActionResult::error(UNKNOWN_ACTION);
        };

        if let Some(param) = handler.params().iter().find(|p| !p.accepts(args)) {
            warn!(action = %name, param = param.name, "invalid action arguments");
            return ActionResult::error(INVALID_ARGUMENTS);
        }

        debug!(action = %name, args = args.len(), "dispatching action");
        match AssertUnwindSafe(handler.execute(args)).catch_unwind().await {
            Ok(Ok(info)) => ActionResult::Ok(info),
            Ok(Err(e)) => {
                warn!(action = %name, error = %e, "action failed");
                ActionResult::error(format!("{e:#}"))
            },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(action = %name, panic = %message, "action handler panicked");
                ActionResult::error(format!("action panicked: {message}"))
            },
        }
    }

    /// Function definitions in the shape the completion engine expects,
    /// sorted by name.
    pub fn function_schemas(&self) -> Vec<serde_json::Value> {
        let mut handlers: Vec<&Arc<dyn ActionHandler>> = self.handlers.values().collect();
        handlers.sort_by(|a, b| a.name().cmp(b.name()));
        handlers
            .into_iter()
            .map(|h| {
                let properties: serde_json::Map<String, serde_json::Value> = h
                    .params()
                    .iter()
                    .map(|p| {
                        (
                            p.name.to_string(),
                            serde_json::json!({
                                "type": p.kind,
                                "description": p.description,
                            }),
                        )
                    })
                    .collect();
                let required: Vec<&str> = h
                    .params()
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name)
                    .collect();
                serde_json::json!({
                    "name": h.name(),
                    "description": h.description(),
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    },
                })
            })
            .collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
