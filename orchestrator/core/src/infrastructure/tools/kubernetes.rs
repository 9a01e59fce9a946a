// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes tools backed by the `kubectl` binary
//!
//! Every call spawns `kubectl` through `tokio::process` with `kill_on_drop`,
//! so the registry timeout also reaps the child. Output is requested as JSON
//! and reduced to the small shapes agents reason about.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::tool::{
    int_arg, str_arg, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolHandler,
    ToolSchema,
};

/// Thin async wrapper around the kubectl CLI
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
}

impl Kubectl {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run kubectl, optionally feeding `stdin`; stdout on success, stderr as the error
    pub async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String, ToolError> {
        debug!(binary = %self.binary, ?args, "Running kubectl");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::failed(format!("failed to spawn {}: {}", self.binary, e)))?;

        if let (Some(input), Some(mut handle)) = (stdin, child.stdin.take()) {
            handle
                .write_all(input.as_bytes())
                .await
                .map_err(ToolError::failed)?;
            // handle dropped here so kubectl sees EOF
        }

        let output = child.wait_with_output().await.map_err(ToolError::failed)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ToolError::failed(format!(
                "kubectl exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }

    async fn get_json(&self, args: &[&str]) -> Result<Value, ToolError> {
        let stdout = self.run(args, None).await?;
        serde_json::from_str(&stdout)
            .map_err(|e| ToolError::failed(format!("invalid kubectl JSON output: {}", e)))
    }

    /// Pod selector of a service, if it declares one
    async fn service_selector(&self, service: &str, namespace: &str) -> Result<Option<String>, ToolError> {
        let svc = self
            .get_json(&["get", "service", service, "-n", namespace, "-o", "json"])
            .await?;
        Ok(label_selector(&svc["spec"]["selector"]))
    }

    /// Aggregate service, pod and deployment state. Lookup failures are
    /// collected in `errors` rather than failing the call.
    pub async fn service_status(&self, service: &str, namespace: &str) -> ServiceStatus {
        let mut status = ServiceStatus::new(service, namespace);

        let svc = match self
            .get_json(&["get", "service", service, "-n", namespace, "-o", "json"])
            .await
        {
            Ok(svc) => svc,
            Err(e) => {
                status.errors.push(format!("API error: {}", e));
                return status;
            }
        };

        status.exists = true;
        status.service_type = svc["spec"]["type"].as_str().map(String::from);
        status.cluster_ip = svc["spec"]["clusterIP"].as_str().map(String::from);
        status.ports = svc["spec"]["ports"]
            .as_array()
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| {
                        json!({
                            "port": p["port"],
                            "target_port": p["targetPort"],
                            "protocol": p["protocol"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let Some(selector) = label_selector(&svc["spec"]["selector"]) else {
            return status;
        };

        match self
            .get_json(&["get", "pods", "-n", namespace, "-l", &selector, "-o", "json"])
            .await
        {
            Ok(pods) => {
                status.pods = items(&pods).map(pod_status).collect();
                status.restarts = status.pods.iter().map(|p| p.restarts).sum();
                status.ready_pods = status.pods.iter().filter(|p| p.ready).count();
                status.total_pods = status.pods.len();
            }
            Err(e) => status.errors.push(format!("Error: {}", e)),
        }

        match self
            .get_json(&["get", "deployments", "-n", namespace, "-l", &selector, "-o", "json"])
            .await
        {
            Ok(deployments) => {
                status.deployments = items(&deployments).map(deployment_status).collect();
            }
            Err(e) => status.errors.push(format!("Error: {}", e)),
        }

        status
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub service_name: String,
    pub namespace: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
    pub ports: Vec<Value>,
    pub pods: Vec<PodStatus>,
    pub deployments: Vec<DeploymentStatus>,
    pub restarts: u64,
    pub ready_pods: usize,
    pub total_pods: usize,
    /// Not measured by kubectl; populated from metrics when available
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub errors: Vec<String>,
}

impl ServiceStatus {
    fn new(service: &str, namespace: &str) -> Self {
        Self {
            service_name: service.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodStatus {
    pub name: String,
    pub status: String,
    pub ready: bool,
    pub restarts: u64,
    pub pod_ip: Option<String>,
    pub node: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentStatus {
    pub name: String,
    pub replicas: u64,
    pub available_replicas: u64,
    pub ready_replicas: u64,
    pub strategy: String,
}

/// `k=v,k2=v2` from a selector map
fn label_selector(selector: &Value) -> Option<String> {
    let map = selector.as_object()?;
    if map.is_empty() {
        return None;
    }
    Some(
        map.iter()
            .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn items(list: &Value) -> impl Iterator<Item = &Value> {
    list["items"].as_array().into_iter().flatten()
}

fn name_of(item: &Value) -> String {
    item["metadata"]["name"].as_str().unwrap_or_default().to_string()
}

fn pod_status(pod: &Value) -> PodStatus {
    let containers = pod["status"]["containerStatuses"].as_array();
    PodStatus {
        name: name_of(pod),
        status: pod["status"]["phase"].as_str().unwrap_or("Unknown").to_string(),
        ready: containers
            .map(|cs| !cs.is_empty() && cs.iter().all(|c| c["ready"].as_bool() == Some(true)))
            .unwrap_or(false),
        restarts: containers
            .map(|cs| cs.iter().filter_map(|c| c["restartCount"].as_u64()).sum())
            .unwrap_or(0),
        pod_ip: pod["status"]["podIP"].as_str().map(String::from),
        node: pod["spec"]["nodeName"].as_str().map(String::from),
    }
}

fn deployment_status(deployment: &Value) -> DeploymentStatus {
    DeploymentStatus {
        name: name_of(deployment),
        replicas: deployment["spec"]["replicas"].as_u64().unwrap_or(0),
        available_replicas: deployment["status"]["availableReplicas"].as_u64().unwrap_or(0),
        ready_replicas: deployment["status"]["readyReplicas"].as_u64().unwrap_or(0),
        strategy: deployment["spec"]["strategy"]["type"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string(),
    }
}

/// Event reduced to what agents look at. Returns `None` when the event was
/// last seen before `cutoff`; events without timestamps are kept.
fn event_entry(event: &Value, cutoff: DateTime<Utc>) -> Option<Value> {
    let last_seen = event["lastTimestamp"]
        .as_str()
        .or_else(|| event["eventTime"].as_str());
    if let Some(seen) = last_seen.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok()) {
        if seen.with_timezone(&Utc) < cutoff {
            return None;
        }
    }

    Some(json!({
        "type": event["type"],
        "reason": event["reason"],
        "message": event["message"],
        "count": event["count"],
        "first_timestamp": event["firstTimestamp"],
        "last_timestamp": last_seen,
        "involved_object": {
            "kind": event["involvedObject"]["kind"],
            "name": event["involvedObject"]["name"],
        },
    }))
}

fn namespace_param() -> ParameterSpec {
    ParameterSpec::optional(ParameterType::String)
        .with_default(json!("default"))
        .describe("Kubernetes namespace")
}

pub struct ServiceStatusTool(pub Kubectl);

impl ServiceStatusTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "get_service_status",
            "Get the status of a Kubernetes service: pods, restarts and deployments",
        )
        .param(
            "service_name",
            ParameterSpec::required(ParameterType::String).describe("Service name"),
        )
        .param("namespace", namespace_param())
    }
}

#[async_trait]
impl ToolHandler for ServiceStatusTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        let status = self.0.service_status(service, namespace).await;
        serde_json::to_value(status).map_err(ToolError::failed)
    }
}

pub struct PodLogsTool(pub Kubectl);

impl PodLogsTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new("get_pod_logs", "Get recent logs from the pods behind a service")
            .param(
                "service_name",
                ParameterSpec::required(ParameterType::String).describe("Service name"),
            )
            .param("namespace", namespace_param())
            .param(
                "tail_lines",
                ParameterSpec::optional(ParameterType::Integer).with_default(json!(100)),
            )
            .param(
                "container",
                ParameterSpec::optional(ParameterType::String)
                    .describe("Container name; the pod's first container when omitted"),
            )
    }
}

#[async_trait]
impl ToolHandler for PodLogsTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        let tail = int_arg(&arguments, "tail_lines").unwrap_or(100).to_string();
        let container = arguments.get("container").and_then(Value::as_str);

        let Some(selector) = self.0.service_selector(service, namespace).await? else {
            return Ok(json!([]));
        };

        let pods = self
            .0
            .get_json(&["get", "pods", "-n", namespace, "-l", &selector, "-o", "json"])
            .await?;

        let mut logs = Vec::new();
        for pod in items(&pods) {
            let pod_name = name_of(pod);
            let container = container
                .map(String::from)
                .or_else(|| pod["spec"]["containers"][0]["name"].as_str().map(String::from))
                .unwrap_or_default();

            let mut args = vec!["logs", pod_name.as_str(), "-n", namespace, "--tail", tail.as_str()];
            if !container.is_empty() {
                args.extend(["-c", container.as_str()]);
            }

            match self.0.run(&args, None).await {
                Ok(output) => logs.push(json!({
                    "pod_name": pod_name,
                    "container": container,
                    "logs": output.lines().collect::<Vec<_>>(),
                })),
                Err(e) => {
                    warn!(pod = %pod_name, error = %e, "Failed to read pod logs");
                    logs.push(json!({ "pod_name": pod_name, "error": e.to_string() }));
                }
            }
        }

        Ok(Value::Array(logs))
    }
}

pub struct PodEventsTool(pub Kubectl);

impl PodEventsTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "get_pod_events",
            "Get recent Kubernetes events for the objects named after a service",
        )
        .param(
            "service_name",
            ParameterSpec::required(ParameterType::String).describe("Service name"),
        )
        .param("namespace", namespace_param())
        .param(
            "since_seconds",
            ParameterSpec::optional(ParameterType::Integer)
                .with_default(json!(3600))
                .describe("Only events last seen within this window"),
        )
    }
}

#[async_trait]
impl ToolHandler for PodEventsTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let service = str_arg(&arguments, "service_name")?;
        let namespace = str_arg(&arguments, "namespace")?;
        let since = int_arg(&arguments, "since_seconds").unwrap_or(3600).max(0);
        let selector = format!("involvedObject.name={}", service);

        let events = self
            .0
            .get_json(&[
                "get",
                "events",
                "-n",
                namespace,
                "--field-selector",
                &selector,
                "-o",
                "json",
            ])
            .await?;

        let cutoff = Utc::now() - ChronoDuration::seconds(since);
        Ok(Value::Array(
            items(&events).filter_map(|e| event_entry(e, cutoff)).collect(),
        ))
    }
}

pub struct ApplyPatchTool(pub Kubectl);

impl ApplyPatchTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new("apply_yaml_patch", "Apply a Kubernetes YAML manifest")
            .param(
                "yaml_content",
                ParameterSpec::required(ParameterType::String).describe("Manifest to apply"),
            )
            .param("namespace", ParameterSpec::required(ParameterType::String))
    }
}

#[async_trait]
impl ToolHandler for ApplyPatchTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let yaml = str_arg(&arguments, "yaml_content")?;
        let namespace = str_arg(&arguments, "namespace")?;

        info!(namespace, "Applying YAML patch");
        let output = self
            .0
            .run(&["apply", "-f", "-", "-n", namespace], Some(yaml))
            .await?;

        Ok(json!({
            "success": true,
            "output": output,
            "resource_applied": true,
        }))
    }
}

pub struct RestartDeploymentTool(pub Kubectl);

impl RestartDeploymentTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new("restart_deployment", "Restart a Kubernetes deployment via rollout")
            .param("deployment_name", ParameterSpec::required(ParameterType::String))
            .param("namespace", ParameterSpec::required(ParameterType::String))
    }
}

#[async_trait]
impl ToolHandler for RestartDeploymentTool {
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let deployment = str_arg(&arguments, "deployment_name")?;
        let namespace = str_arg(&arguments, "namespace")?;

        info!(deployment, namespace, "Restarting deployment");
        let output = self
            .0
            .run(
                &["rollout", "restart", "deployment", deployment, "-n", namespace],
                None,
            )
            .await?;

        Ok(json!({
            "success": true,
            "message": format!("Deployment {} restarted successfully", deployment),
            "output": output,
        }))
    }
}
