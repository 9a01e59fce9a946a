// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool registry and invoker
//!
//! Holds tool schemas next to their handlers, renders the provider-agnostic
//! schema list handed to the reasoning service, and executes calls after
//! validating arguments against the declared parameters.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::tool::{ToolArguments, ToolError, ToolHandler, ToolSchema};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct RegisteredTool {
    schema: ToolSchema,
    handler: Arc<dyn ToolHandler>,
}

/// Named collection of tools. Cheap to clone; handlers are shared.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, schema: ToolSchema, handler: Arc<dyn ToolHandler>) {
        if self.tools.contains_key(&schema.name) {
            warn!(tool = %schema.name, "Replacing previously registered tool");
        }
        self.tools
            .insert(schema.name.clone(), RegisteredTool { schema, handler });
    }

    /// A registry holding only the named tools that exist here
    pub fn subset(&self, names: &[&str]) -> Self {
        let tools = names
            .iter()
            .filter_map(|name| self.tools.get(*name).map(|t| (name.to_string(), t.clone())))
            .collect();
        Self {
            tools,
            timeout: self.timeout,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn schemas(&self) -> impl Iterator<Item = &ToolSchema> {
        self.tools.values().map(|t| &t.schema)
    }

    /// Provider-agnostic function schemas
    pub fn describe(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for (name, spec) in &tool.schema.parameters {
                    let mut property = Map::new();
                    property.insert("type".into(), json!(spec.param_type.as_str()));
                    if let Some(description) = &spec.description {
                        property.insert("description".into(), json!(description));
                    }
                    if let Some(default) = &spec.default {
                        property.insert("default".into(), default.clone());
                    }
                    properties.insert(name.clone(), Value::Object(property));
                    if spec.required {
                        required.push(json!(name));
                    }
                }

                json!({
                    "type": "function",
                    "function": {
                        "name": tool.schema.name,
                        "description": tool.schema.description,
                        "parameters": {
                            "type": "object",
                            "properties": properties,
                            "required": required,
                        }
                    }
                })
            })
            .collect()
    }

    /// Validate arguments and run the named tool under the registry timeout
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let result = self.invoke_inner(name, arguments).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::NotFound(_)) => "not_found",
            Err(ToolError::InvalidArguments { .. }) => "invalid_arguments",
            Err(ToolError::ExecutionFailed { .. }) => "failed",
            Err(ToolError::Timeout { .. }) => "timeout",
        };
        metrics::counter!(
            "aether_tool_invocations_total",
            "tool" => name.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn invoke_inner(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments = Self::validate(&tool.schema, arguments)?;
        debug!(tool = name, "Invoking tool");

        match tokio::time::timeout(self.timeout, tool.handler.call(arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: name.to_string(),
                elapsed: self.timeout,
            }),
        }
    }

    fn validate(schema: &ToolSchema, arguments: Value) -> Result<ToolArguments, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: schema.name.clone(),
            reason,
        };

        let mut arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => ToolArguments::new(),
            other => return Err(invalid(format!("expected an object, got {}", other))),
        };

        if let Some(unknown) = arguments.keys().find(|k| !schema.parameters.contains_key(*k)) {
            return Err(invalid(format!("unknown argument '{}'", unknown)));
        }

        // an explicit null counts as omitted
        arguments.retain(|_, value| !value.is_null());

        for (name, spec) in &schema.parameters {
            match arguments.get(name) {
                Some(value) if !spec.param_type.accepts(value) => {
                    return Err(invalid(format!(
                        "argument '{}' must be of type {}",
                        name, spec.param_type
                    )));
                }
                Some(_) => {}
                None => {
                    if let Some(default) = &spec.default {
                        arguments.insert(name.clone(), default.clone());
                    } else if spec.required {
                        return Err(invalid(format!("missing required argument '{}'", name)));
                    }
                }
            }
        }

        Ok(arguments)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool::{FnTool, ParameterSpec, ParameterType};
    use async_trait::async_trait;

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolSchema::new("echo", "Echo arguments back")
                .param("message", ParameterSpec::required(ParameterType::String))
                .param(
                    "repeat",
                    ParameterSpec::optional(ParameterType::Integer).with_default(json!(1)),
                ),
            Arc::new(FnTool(|args: ToolArguments| -> Result<Value, ToolError> {
                Ok(Value::Object(args))
            })),
        );
        registry
    }

    struct SlowTool;

    #[async_trait]
    impl ToolHandler for SlowTool {
        async fn call(&self, _arguments: ToolArguments) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        async fn call(&self, _arguments: ToolArguments) -> Result<Value, ToolError> {
            Err(ToolError::failed("kubectl exited with status 1"))
        }
    }

    #[tokio::test]
    async fn test_invoke_fills_defaults() {
        let registry = echo_registry();
        let result = registry
            .invoke("echo", json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"message": "hi", "repeat": 1}));
    }

    #[tokio::test]
    async fn test_null_optional_argument_gets_default() {
        let registry = echo_registry();
        let result = registry
            .invoke("echo", json!({"message": "hi", "repeat": null}))
            .await
            .unwrap();
        assert_eq!(result, json!({"message": "hi", "repeat": 1}));
    }

    #[tokio::test]
    async fn test_null_required_argument_is_missing() {
        let registry = echo_registry();
        let err = registry
            .invoke("echo", json!({"message": null}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref reason, .. } if reason.contains("missing required argument 'message'")));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = echo_registry();
        let err = registry.invoke("nope", json!({})).await.unwrap_err();
        assert_eq!(err, ToolError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let registry = echo_registry();
        let err = registry.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref reason, .. } if reason.contains("message")));
    }

    #[tokio::test]
    async fn test_unknown_argument() {
        let registry = echo_registry();
        let err = registry
            .invoke("echo", json!({"message": "hi", "volume": 11}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref reason, .. } if reason.contains("volume")));
    }

    #[tokio::test]
    async fn test_wrong_argument_type() {
        let registry = echo_registry();
        let err = registry
            .invoke("echo", json!({"message": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_handler_failure_is_execution_failed() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolSchema::new("broken", "Always fails"), Arc::new(FailingTool));
        let err = registry.invoke("broken", Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(20));
        registry.register(ToolSchema::new("slow", "Sleeps"), Arc::new(SlowTool));
        let err = registry.invoke("slow", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[test]
    fn test_describe_shape() {
        let registry = echo_registry();
        let schemas = registry.describe();
        assert_eq!(schemas.len(), 1);

        let function = &schemas[0]["function"];
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(function["name"], "echo");
        assert_eq!(function["parameters"]["type"], "object");
        assert_eq!(function["parameters"]["properties"]["message"]["type"], "string");
        assert_eq!(function["parameters"]["required"], json!(["message"]));
    }

    #[test]
    fn test_subset() {
        let registry = echo_registry();
        let subset = registry.subset(&["echo", "missing"]);
        assert!(subset.contains("echo"));
        assert!(!subset.contains("missing"));
        assert!(registry.subset(&[]).is_empty());
    }
}
