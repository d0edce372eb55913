//! Error kinds raised inside probes and the dispatcher.
//!
//! None of these cross a probe boundary: every probe turns its
//! `Result<_, ProbeError>` into a [`ToolResult`](crate::envelope::ToolResult).

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Command '{program}' not found. Please ensure it is installed and in the system's PATH.")]
    CommandNotFound { program: String },

    #[error("Command '{command}' failed with error: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Command '{command}' timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("{0}")]
    MalformedOutput(String),

    #[error("Device not found: {device}")]
    DeviceNotFound {
        device: String,
        available: Vec<String>,
    },

    #[error("Unknown function: {0}")]
    UnknownTool(String),

    #[error("Could not decode arguments: {0}")]
    MalformedArguments(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Invalid tool call: {0}")]
    InvalidCall(String),

    #[error("Execution error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedOutput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failure() {
        let err = ProbeError::CommandNotFound {
            program: "iostat".into(),
        };
        assert!(err.to_string().starts_with("Command 'iostat' not found"));

        let err = ProbeError::Timeout {
            command: "mpstat -P ALL 5 1".into(),
            after: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "Command 'mpstat -P ALL 5 1' timed out after 10s"
        );

        let err = ProbeError::UnknownTool("check_gpu".into());
        assert_eq!(err.to_string(), "Unknown function: check_gpu");
    }

    #[test]
    fn test_device_not_found_message() {
        let err = ProbeError::DeviceNotFound {
            device: "nvme9n1".into(),
            available: vec!["sda".into()],
        };
        assert_eq!(err.to_string(), "Device not found: nvme9n1");
    }

    #[test]
    fn test_invalid_call_message() {
        let err = ProbeError::InvalidCall("missing field `name`".into());
        assert_eq!(err.to_string(), "Invalid tool call: missing field `name`");
    }
}
