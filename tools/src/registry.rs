//! Tool Registry: stores and retrieves tool definitions

use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::probe::Probe;
use crate::schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

/// One named parameter a tool accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub default: Option<Value>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }
}

/// A registered tool: its public schema and the probe that serves it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub namespace: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub probe: Probe,
}

impl ToolSpec {
    pub fn parameters_schema(&self) -> Value {
        schema::parameters_schema(&self.params)
    }

    /// Function-calling definition handed to the orchestrator.
    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema(),
            }
        })
    }
}

/// In-memory tool registry
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: BTreeMap<String, ToolSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in probe.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        crate::monitor::register_tools(&mut reg);
        crate::hw::register_tools(&mut reg);
        crate::process::register_tools(&mut reg);
        crate::net::register_tools(&mut reg);
        info!("Registered {} built-in tools", reg.tool_count());
        reg
    }

    /// Register a tool definition
    pub fn register_tool(&mut self, tool: ToolSpec) {
        info!("Registered tool: {} (ns: {})", tool.name, tool.namespace);
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// List tools, optionally filtered by namespace
    pub fn list_tools(&self, namespace: &str) -> Vec<&ToolSpec> {
        self.tools
            .values()
            .filter(|t| namespace.is_empty() || t.namespace == namespace)
            .collect()
    }

    /// Get total tool count
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Definitions of every tool, sorted by name.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools.values().map(ToolSpec::definition).collect()
    }
}

/// Helper to create a ToolSpec
pub fn make_tool(
    name: &str,
    namespace: &str,
    description: &str,
    params: Vec<ParamSpec>,
    probe: Probe,
) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        namespace: namespace.to_string(),
        description: description.to_string(),
        params,
        probe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tool(name: &str, namespace: &str) -> ToolSpec {
        make_tool(name, namespace, "A test tool", vec![], Probe::Memory)
    }

    #[test]
    fn test_register_and_get_tool() {
        let mut reg = Registry::new();
        reg.register_tool(sample_tool("check_memory_usage", "monitor"));

        let tool = reg.get_tool("check_memory_usage").unwrap();
        assert_eq!(tool.name, "check_memory_usage");
        assert_eq!(tool.namespace, "monitor");
    }

    #[test]
    fn test_get_nonexistent_tool() {
        let reg = Registry::new();
        assert!(reg.get_tool("nonexistent").is_none());
    }

    #[test]
    fn test_list_tools_by_namespace() {
        let mut reg = Registry::new();
        reg.register_tool(sample_tool("a", "monitor"));
        reg.register_tool(sample_tool("b", "monitor"));
        reg.register_tool(sample_tool("c", "hw"));

        assert_eq!(reg.list_tools("").len(), 3);
        assert_eq!(reg.list_tools("monitor").len(), 2);
        assert_eq!(reg.list_tools("hw").len(), 1);
        assert!(reg.list_tools("nonexistent").is_empty());
    }

    #[test]
    fn test_register_overwrites_existing() {
        let mut reg = Registry::new();
        reg.register_tool(make_tool("t", "monitor", "Original", vec![], Probe::Memory));
        reg.register_tool(make_tool("t", "monitor", "Updated", vec![], Probe::DiskIo));

        assert_eq!(reg.tool_count(), 1);
        let tool = reg.get_tool("t").unwrap();
        assert_eq!(tool.description, "Updated");
        assert_eq!(tool.probe, Probe::DiskIo);
    }

    #[test]
    fn test_builtin_registry() {
        let reg = Registry::builtin();
        assert_eq!(reg.tool_count(), 7);
        for name in [
            "check_cpu_usage",
            "check_memory_usage",
            "check_disk_io",
            "check_running_processes",
            "check_hostnamectl_info",
            "check_cpu_info",
            "check_network_info",
        ] {
            assert!(reg.get_tool(name).is_some(), "missing builtin tool {name}");
        }
        assert_eq!(reg.get_tool("check_disk_io").unwrap().probe, Probe::DiskIo);
    }

    #[test]
    fn test_definition_shape() {
        let reg = Registry::builtin();
        let def = reg.get_tool("check_disk_io").unwrap().definition();
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "check_disk_io");
        let device = &def["function"]["parameters"]["properties"]["device"];
        assert_eq!(device["type"], "string");
        assert_eq!(device["default"], "all");

        let defs = reg.definitions();
        assert_eq!(defs.len(), 7);
        assert_eq!(defs[0]["function"]["name"], "check_cpu_info");
    }
}
