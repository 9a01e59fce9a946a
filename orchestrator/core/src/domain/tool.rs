// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool Domain Types
//!
//! A tool is a named, described operation with a declared parameter schema.
//! Implementations receive validated named arguments and return JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Named arguments passed to a tool
pub type ToolArguments = Map<String, Value>;

/// Primitive JSON type a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Object => value.is_object(),
            ParameterType::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn required(param_type: ParameterType) -> Self {
        Self {
            param_type,
            description: None,
            required: true,
            default: None,
        }
    }

    pub fn optional(param_type: ParameterType) -> Self {
        Self {
            param_type,
            description: None,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Name, description and parameter schema of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }
}

/// Implementation side of a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError>;
}

/// Adapts a synchronous closure into a [`ToolHandler`]
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(ToolArguments) -> Result<Value, ToolError> + Send + Sync,
{
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        (self.0)(arguments)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool execution failed: {cause}")]
    ExecutionFailed { cause: String },

    #[error("Tool '{tool}' timed out after {elapsed:?}")]
    Timeout { tool: String, elapsed: Duration },
}

impl ToolError {
    pub fn failed(cause: impl fmt::Display) -> Self {
        ToolError::ExecutionFailed {
            cause: cause.to_string(),
        }
    }
}

/// Typed argument accessors used by tool implementations after validation
pub fn str_arg<'a>(arguments: &'a ToolArguments, name: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::failed(format!("argument '{}' missing or not a string", name)))
}

pub fn int_arg(arguments: &ToolArguments, name: &str) -> Option<i64> {
    arguments.get(name).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameter_type_accepts() {
        assert!(ParameterType::Integer.accepts(&json!(3)));
        assert!(!ParameterType::Integer.accepts(&json!(3.5)));
        assert!(ParameterType::Number.accepts(&json!(3)));
        assert!(ParameterType::Number.accepts(&json!(3.5)));
        assert!(!ParameterType::String.accepts(&json!(null)));
        assert!(ParameterType::Object.accepts(&json!({})));
        assert!(ParameterType::Array.accepts(&json!([])));
    }

    #[tokio::test]
    async fn test_fn_tool_runs_closure() {
        let tool = FnTool(|args: ToolArguments| -> Result<Value, ToolError> {
            Ok(json!({ "echo": args.get("x").cloned() }))
        });
        let mut args = ToolArguments::new();
        args.insert("x".into(), json!(7));
        assert_eq!(tool.call(args).await.unwrap(), json!({"echo": 7}));
    }
}
