//! check_cpu_info: CPU topology from `lscpu -J`, passed through as JSON

use serde_json::Value;

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

pub async fn execute(ctx: &ProbeContext<'_>) -> ToolResult {
    collect(ctx).await.into()
}

async fn collect(ctx: &ProbeContext<'_>) -> Result<Value> {
    let cmd = argv([ctx.config.commands.lscpu.as_str(), "-J"]);
    let stdout = ctx
        .runner
        .run(&cmd, ctx.config.timeouts.default_timeout())
        .await?
        .into_stdout(&cmd)?;
    parse_lscpu_json(&stdout)
}

pub fn parse_lscpu_json(output: &str) -> Result<Value> {
    serde_json::from_str(output)
        .map_err(|e| ProbeError::malformed(format!("lscpu did not return valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let output = r#"{
   "lscpu": [
      {
         "field": "Architecture:",
         "data": "x86_64"
      },{
         "field": "CPU(s):",
         "data": "8"
      }
   ]
}"#;
        let value = parse_lscpu_json(output).unwrap();
        assert_eq!(value["lscpu"][1]["data"], "8");
        assert_eq!(value["lscpu"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_lscpu_json("Architecture: x86_64").unwrap_err();
        assert!(err.to_string().starts_with("lscpu did not return valid JSON"));
    }
}
