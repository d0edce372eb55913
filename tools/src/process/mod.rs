//! Process table tools.

pub mod list;

use serde_json::json;

use crate::probe::Probe;
use crate::registry::{make_tool, ParamSpec, ParamType, Registry};

/// Register every process tool with the registry.
pub fn register_tools(reg: &mut Registry) {
    reg.register_tool(make_tool(
        "check_running_processes",
        "process",
        "Check processes with the highest resource consumption",
        vec![ParamSpec::new(
            "top_n",
            ParamType::Integer,
            "Number of processes to display",
        )
        .with_default(json!(5))
        .with_range(Some(1), None)],
        Probe::ProcessTable,
    ));
}
