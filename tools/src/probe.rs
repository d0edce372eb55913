//! The closed set of telemetry probes and their typed arguments.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::runner::CommandRunner;
use crate::{hw, monitor, net, process};

/// What a probe needs to run: a command runner and the active configuration.
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub config: &'a ToolsConfig,
}

impl<'a> ProbeContext<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a ToolsConfig) -> Self {
        Self { runner, config }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    SocketSummary,
    CpuTopology,
    HostIdentity,
    CpuLoad,
    Memory,
    DiskIo,
    ProcessTable,
}

/// A probe with its arguments decoded and defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeCall {
    SocketSummary,
    CpuTopology,
    HostIdentity,
    CpuLoad(monitor::cpu::Input),
    Memory,
    DiskIo(monitor::disk::Input),
    ProcessTable(process::list::Input),
}

impl Probe {
    /// Decode resolved arguments into this probe's argument struct.
    pub fn decode(self, tool: &str, arguments: Map<String, Value>) -> Result<ProbeCall> {
        Ok(match self {
            Self::SocketSummary => ProbeCall::SocketSummary,
            Self::CpuTopology => ProbeCall::CpuTopology,
            Self::HostIdentity => ProbeCall::HostIdentity,
            Self::Memory => ProbeCall::Memory,
            Self::CpuLoad => ProbeCall::CpuLoad(decode_input(tool, arguments)?),
            Self::DiskIo => ProbeCall::DiskIo(decode_input(tool, arguments)?),
            Self::ProcessTable => ProbeCall::ProcessTable(decode_input(tool, arguments)?),
        })
    }
}

impl ProbeCall {
    pub async fn execute(&self, ctx: &ProbeContext<'_>) -> ToolResult {
        match self {
            Self::SocketSummary => net::sockets::execute(ctx).await,
            Self::CpuTopology => hw::cpu_info::execute(ctx).await,
            Self::HostIdentity => hw::hostname::execute(ctx).await,
            Self::CpuLoad(input) => monitor::cpu::execute(ctx, input).await,
            Self::Memory => monitor::memory::execute(ctx).await,
            Self::DiskIo(input) => monitor::disk::execute(ctx, &input.device).await,
            Self::ProcessTable(input) => process::list::execute(ctx, input).await,
        }
    }
}

fn decode_input<T: DeserializeOwned>(tool: &str, arguments: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| ProbeError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}
