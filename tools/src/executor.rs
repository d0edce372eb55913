//! Tool dispatch pipeline
//!
//! Pipeline per call: resolve tool → decode arguments → apply defaults →
//! validate against schema → execute probe. Every call yields exactly one
//! response; nothing a single call does can abort the batch.

use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::ToolsConfig;
use crate::envelope::{BatchEntry, CallRequest, CallResponse, ToolResult};
use crate::error::ProbeError;
use crate::probe::ProbeContext;
use crate::registry::Registry;
use crate::runner::CommandRunner;
use crate::schema;

/// Executes batches of calls against a registry
pub struct Dispatcher<R> {
    registry: Registry,
    runner: R,
    config: ToolsConfig,
}

impl<R: CommandRunner> Dispatcher<R> {
    pub fn new(registry: Registry, runner: R, config: ToolsConfig) -> Self {
        Self {
            registry,
            runner,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Dispatch every call in order, returning one response per call.
    pub async fn dispatch(&self, calls: Vec<CallRequest>) -> Vec<CallResponse> {
        let total = calls.len();
        let mut responses = Vec::with_capacity(total);
        for call in calls {
            responses.push(self.dispatch_one(call).await);
        }
        info!("Dispatched {total} calls");
        responses
    }

    /// Dispatch a parsed batch. Rejected elements answer with an
    /// `Invalid tool call` error in their own position.
    pub async fn dispatch_batch(&self, entries: Vec<BatchEntry>) -> Vec<CallResponse> {
        let total = entries.len();
        let mut responses = Vec::with_capacity(total);
        for entry in entries {
            let response = match entry {
                BatchEntry::Call(call) => self.dispatch_one(call).await,
                BatchEntry::Rejected { id, reason } => {
                    warn!("Rejected malformed call {id:?}: {reason}");
                    CallResponse::new(id, ProbeError::InvalidCall(reason).into())
                }
            };
            responses.push(response);
        }
        info!("Dispatched {total} calls");
        responses
    }

    async fn dispatch_one(&self, call: CallRequest) -> CallResponse {
        let start = Instant::now();
        let result = match AssertUnwindSafe(self.execute(&call)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!("Tool {} panicked (call {})", call.name, call.id);
                ToolResult::error(format!("Tool {} failed unexpectedly", call.name))
            }
        };

        let status = if result.is_success() { "success" } else { "error" };
        info!(
            tool = %call.name,
            call_id = %call.id,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dispatched call"
        );
        if let Some(message) = result.message() {
            warn!("Tool {} returned an error: {message}", call.name);
        }

        CallResponse::new(call.id, result)
    }

    /// Run a single call through the pipeline.
    pub async fn execute(&self, call: &CallRequest) -> ToolResult {
        // 1. Resolve: unknown names never reach a probe
        let Some(tool) = self.registry.get_tool(&call.name) else {
            return ProbeError::UnknownTool(call.name.clone()).into();
        };

        // 2. Decode arguments, degrading malformed payloads to defaults
        let mut arguments = resolve_arguments(call);

        // 3. Defaults and schema validation
        schema::apply_defaults(&tool.params, &mut arguments);
        if let Err(reason) = schema::validate_arguments(&arguments, &tool.parameters_schema()) {
            return ProbeError::InvalidArguments {
                tool: tool.name.clone(),
                reason,
            }
            .into();
        }

        let probe_call = match tool.probe.decode(&tool.name, arguments) {
            Ok(probe_call) => probe_call,
            Err(e) => return e.into(),
        };

        // 4. Execute
        let ctx = ProbeContext::new(&self.runner, &self.config);
        probe_call.execute(&ctx).await
    }
}

/// Raw argument text wins over structured arguments; unreadable text is
/// replaced by an empty mapping.
fn resolve_arguments(call: &CallRequest) -> Map<String, Value> {
    match call.raw_arguments.as_deref() {
        Some(raw) => schema::parse_arguments(raw).unwrap_or_else(|e| {
            warn!("{e} (tool {}, call {}); running with defaults", call.name, call.id);
            Map::new()
        }),
        None => call.arguments.clone(),
    }
}

/// The built-in diagnostic plan: one call per probe.
pub fn diagnostic_plan() -> Vec<CallRequest> {
    vec![
        CallRequest::new("plan-hostnamectl", "check_hostnamectl_info"),
        CallRequest::new("plan-cpu-info", "check_cpu_info"),
        CallRequest::new("plan-cpu-usage", "check_cpu_usage").with_argument("duration", json!(10)),
        CallRequest::new("plan-memory", "check_memory_usage"),
        CallRequest::new("plan-disk-io", "check_disk_io").with_argument("device", json!("all")),
        CallRequest::new("plan-processes", "check_running_processes")
            .with_argument("top_n", json!(5)),
        CallRequest::new("plan-network", "check_network_info"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::runner::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every command with the same stdout and records what ran.
    struct EchoRunner {
        stdout: &'static str,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl EchoRunner {
        fn new(stdout: &'static str) -> Self {
            Self {
                stdout,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for EchoRunner {
        async fn run(&self, argv: &[String], _timeout: Duration) -> Result<CommandOutput> {
            self.seen.lock().unwrap().push(argv.to_vec());
            Ok(CommandOutput {
                stdout: self.stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    struct PanickingRunner;

    #[async_trait]
    impl CommandRunner for PanickingRunner {
        async fn run(&self, _argv: &[String], _timeout: Duration) -> Result<CommandOutput> {
            panic!("runner exploded");
        }
    }

    const PS_OUTPUT: &str = "\
    PID USER     %CPU %MEM COMMAND
   2201 postgres 35.2  8.1 postgres
    911 www-data  4.0  1.2 nginx
      1 root      0.1  0.1 systemd
";

    fn dispatcher<R: CommandRunner>(runner: R) -> Dispatcher<R> {
        Dispatcher::new(Registry::builtin(), runner, ToolsConfig::default())
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_envelope() {
        let d = dispatcher(EchoRunner::new(PS_OUTPUT));
        let result = d.execute(&CallRequest::new("1", "check_gpu")).await;
        assert_eq!(result.message(), Some("Unknown function: check_gpu"));
        assert!(d.runner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defaults_flow_into_command() {
        let d = dispatcher(EchoRunner::new(PS_OUTPUT));
        let result = d
            .execute(&CallRequest::new("1", "check_running_processes"))
            .await;
        assert!(result.is_success());
        assert_eq!(result.data().unwrap().as_array().unwrap().len(), 3);

        let result = d
            .execute(&CallRequest::new("2", "check_running_processes").with_argument("top_n", json!(1)))
            .await;
        assert_eq!(result.data().unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_raw_arguments_use_defaults() {
        let d = dispatcher(EchoRunner::new(PS_OUTPUT));
        let call = CallRequest::new("1", "check_running_processes").with_raw_arguments("{top_n: 2");
        let result = d.execute(&call).await;
        assert!(result.is_success());
        assert_eq!(result.data().unwrap().as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_schema_violation_is_invalid_arguments() {
        let d = dispatcher(EchoRunner::new(PS_OUTPUT));
        let call = CallRequest::new("1", "check_running_processes").with_argument("top_n", json!(0));
        let result = d.execute(&call).await;
        assert!(result
            .message()
            .unwrap()
            .starts_with("Invalid arguments for check_running_processes"));
        assert!(d.runner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let d = dispatcher(PanickingRunner);
        let responses = d
            .dispatch(vec![
                CallRequest::new("a", "check_memory_usage"),
                CallRequest::new("b", "nonexistent"),
            ])
            .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0].result.message(),
            Some("Tool check_memory_usage failed unexpectedly")
        );
        assert_eq!(responses[1].call_id, "b");
    }

    #[tokio::test]
    async fn test_rejected_entry_keeps_its_slot() {
        let d = dispatcher(EchoRunner::new(PS_OUTPUT));
        let responses = d
            .dispatch_batch(vec![
                BatchEntry::Call(CallRequest::new("a", "check_running_processes")),
                BatchEntry::Rejected {
                    id: "b".into(),
                    reason: "missing field `name`".into(),
                },
                BatchEntry::Call(
                    CallRequest::new("c", "check_running_processes")
                        .with_argument("top_n", json!(1)),
                ),
            ])
            .await;

        let ids: Vec<&str> = responses.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(responses[0].result.is_success());
        assert_eq!(
            responses[1].result.message(),
            Some("Invalid tool call: missing field `name`")
        );
        assert_eq!(responses[2].result.data().unwrap().as_array().unwrap().len(), 1);
        assert_eq!(d.runner.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_diagnostic_plan_covers_every_tool() {
        let plan = diagnostic_plan();
        let registry = Registry::builtin();
        assert_eq!(plan.len(), registry.tool_count());
        for call in &plan {
            assert!(registry.get_tool(&call.name).is_some(), "{}", call.name);
        }
        let cpu = plan.iter().find(|c| c.name == "check_cpu_usage").unwrap();
        assert_eq!(cpu.arguments["duration"], 10);
    }
}
