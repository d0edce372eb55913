//! Hardware and host identity tools.

pub mod cpu_info;
pub mod hostname;

use crate::probe::Probe;
use crate::registry::{make_tool, Registry};

/// Register every hardware tool with the registry.
pub fn register_tools(reg: &mut Registry) {
    reg.register_tool(make_tool(
        "check_hostnamectl_info",
        "hw",
        "Check basic system information",
        vec![],
        Probe::HostIdentity,
    ));

    reg.register_tool(make_tool(
        "check_cpu_info",
        "hw",
        "Check CPU configuration information",
        vec![],
        Probe::CpuTopology,
    ));
}
