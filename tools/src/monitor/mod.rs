//! Live load probes: cpu usage, memory, and disk I/O.
//!
//! Each submodule exposes an async `execute` taking a `ProbeContext` and a
//! pure `parse_*` function over the captured command output.

pub mod cpu;
pub mod disk;
pub mod memory;

use serde_json::json;

use crate::probe::Probe;
use crate::registry::{make_tool, ParamSpec, ParamType, Registry};

/// Register every monitor tool with the registry.
pub fn register_tools(reg: &mut Registry) {
    reg.register_tool(make_tool(
        "check_cpu_usage",
        "monitor",
        "Check CPU usage and load status",
        vec![ParamSpec::new(
            "duration",
            ParamType::Integer,
            "Monitoring duration (seconds)",
        )
        .with_default(json!(5))
        .with_range(Some(1), Some(300))],
        Probe::CpuLoad,
    ));

    reg.register_tool(make_tool(
        "check_memory_usage",
        "monitor",
        "Check memory and Swap usage",
        vec![],
        Probe::Memory,
    ));

    reg.register_tool(make_tool(
        "check_disk_io",
        "monitor",
        "Check disk IO performance",
        vec![ParamSpec::new(
            "device",
            ParamType::String,
            "Disk device name (e.g., sda), or \"all\" for every device",
        )
        .with_default(json!(disk::ALL_DEVICES))],
        Probe::DiskIo,
    ));
}
