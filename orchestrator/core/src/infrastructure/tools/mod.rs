// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in tool adapters: kubectl, manifest generation, Prometheus and Loki

pub mod kubernetes;
pub mod logs;
pub mod metrics;
pub mod patch;

use std::sync::Arc;
use std::time::Duration;

use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::aether_config::ToolsConfig;

pub use kubernetes::{
    ApplyPatchTool, Kubectl, PodEventsTool, PodLogsTool, RestartDeploymentTool,
    ServiceStatusTool,
};
pub use logs::{AnalyzeLogsTool, LokiClient, QueryLogsTool};
pub use metrics::{MetricsSummaryTool, PrometheusClient, QueryMetricsTool};
pub use patch::GeneratePatchTool;

/// Registry holding every built-in tool
pub fn builtin_registry(config: &ToolsConfig, timeout: Duration) -> ToolRegistry {
    let kubectl = Kubectl::new(config.kubectl_binary.clone());
    let prometheus = PrometheusClient::new(config.prometheus_url.clone());
    let loki = LokiClient::new(config.loki_url.clone());

    let mut registry = ToolRegistry::new().with_timeout(timeout);
    registry.register(
        ServiceStatusTool::schema(),
        Arc::new(ServiceStatusTool(kubectl.clone())),
    );
    registry.register(PodLogsTool::schema(), Arc::new(PodLogsTool(kubectl.clone())));
    registry.register(
        PodEventsTool::schema(),
        Arc::new(PodEventsTool(kubectl.clone())),
    );
    registry.register(
        ApplyPatchTool::schema(),
        Arc::new(ApplyPatchTool(kubectl.clone())),
    );
    registry.register(
        RestartDeploymentTool::schema(),
        Arc::new(RestartDeploymentTool(kubectl)),
    );
    registry.register(GeneratePatchTool::schema(), Arc::new(GeneratePatchTool));
    registry.register(
        QueryMetricsTool::schema(),
        Arc::new(QueryMetricsTool(prometheus.clone())),
    );
    registry.register(
        MetricsSummaryTool::schema(),
        Arc::new(MetricsSummaryTool(prometheus)),
    );
    registry.register(QueryLogsTool::schema(), Arc::new(QueryLogsTool(loki.clone())));
    registry.register(AnalyzeLogsTool::schema(), Arc::new(AnalyzeLogsTool(loki)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry(&ToolsConfig::default(), Duration::from_secs(5));
        for name in [
            "get_service_status",
            "get_pod_logs",
            "get_pod_events",
            "apply_yaml_patch",
            "restart_deployment",
            "generate_yaml_patch",
            "query_metrics",
            "get_service_metrics_summary",
            "query_logs",
            "analyze_logs",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert_eq!(registry.describe().len(), 10);
    }
}
