//! Network probes.

pub mod sockets;

use crate::probe::Probe;
use crate::registry::{make_tool, Registry};

/// Register every network tool with the registry.
pub fn register_tools(reg: &mut Registry) {
    reg.register_tool(make_tool(
        "check_network_info",
        "net",
        "Check socket usage summary",
        vec![],
        Probe::SocketSummary,
    ));
}
