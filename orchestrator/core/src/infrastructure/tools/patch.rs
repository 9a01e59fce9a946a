// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes manifest generation
//!
//! Pure functions; nothing here talks to a cluster.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::domain::tool::{
    str_arg, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolHandler, ToolSchema,
};

/// Build a manifest for `resource_type` with `patches` merged into its spec
/// (or its data, for config maps)
pub fn build_manifest(
    resource_type: &str,
    name: &str,
    namespace: &str,
    patches: Map<String, Value>,
) -> Result<Value, String> {
    let metadata = json!({ "name": name, "namespace": namespace });

    let manifest = match resource_type {
        "deployment" => json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": metadata,
            "spec": patches,
        }),
        "service" => json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": metadata,
            "spec": patches,
        }),
        "configmap" => json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": metadata,
            "data": patches,
        }),
        other => return Err(format!("unsupported resource type '{}'", other)),
    };

    Ok(manifest)
}

pub fn to_yaml(manifest: &Value) -> Result<String, ToolError> {
    serde_yaml::to_string(manifest).map_err(ToolError::failed)
}

/// Deployment manifest setting the replica count
pub fn scale_manifest(name: &str, namespace: &str, replicas: u32) -> Result<String, ToolError> {
    let mut spec = Map::new();
    spec.insert("replicas".into(), json!(replicas));
    let manifest = build_manifest("deployment", name, namespace, spec).map_err(ToolError::failed)?;
    to_yaml(&manifest)
}

/// Deployment manifest setting CPU and memory limits on one container
pub fn resource_limits_manifest(
    name: &str,
    namespace: &str,
    container: &str,
    cpu: &str,
    memory: &str,
) -> Result<String, ToolError> {
    let mut spec = Map::new();
    spec.insert(
        "template".into(),
        json!({
            "spec": {
                "containers": [{
                    "name": container,
                    "resources": { "limits": { "cpu": cpu, "memory": memory } }
                }]
            }
        }),
    );
    let manifest = build_manifest("deployment", name, namespace, spec).map_err(ToolError::failed)?;
    to_yaml(&manifest)
}

pub struct GeneratePatchTool;

impl GeneratePatchTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "generate_yaml_patch",
            "Generate a Kubernetes YAML patch for a deployment, service or configmap",
        )
        .param(
            "resource_type",
            ParameterSpec::required(ParameterType::String)
                .describe("One of deployment, service, configmap"),
        )
        .param("resource_name", ParameterSpec::required(ParameterType::String))
        .param("namespace", ParameterSpec::required(ParameterType::String))
        .param(
            "patches",
            ParameterSpec::required(ParameterType::Object)
                .describe("Fields merged into spec (data for configmaps)"),
        )
    }
}

#[async_trait]
impl ToolHandler for GeneratePatchTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let resource_type = str_arg(&arguments, "resource_type")?;
        let resource_name = str_arg(&arguments, "resource_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        let patches = arguments
            .get("patches")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let manifest = build_manifest(resource_type, resource_name, namespace, patches).map_err(
            |reason| ToolError::InvalidArguments {
                tool: "generate_yaml_patch".to_string(),
                reason,
            },
        )?;

        Ok(json!({
            "yaml": to_yaml(&manifest)?,
            "resource_type": resource_type,
            "resource_name": resource_name,
            "namespace": namespace,
        }))
    }
}
