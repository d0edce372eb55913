//! check_hostnamectl_info: host identity from `hostnamectl`
//!
//! Prefers `hostnamectl --json=pretty` and passes the JSON through. systemd
//! releases without JSON support get the plain `key: value` listing parsed
//! instead; both paths produce the same success envelope.

use serde_json::{Map, Value};
use tracing::debug;

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

/// Lines never copied into the text-mode record.
fn is_cosmetic(line: &str) -> bool {
    line.contains("Icon name") || (line.contains("Chassis") && !line.contains(':'))
}

pub async fn execute(ctx: &ProbeContext<'_>) -> ToolResult {
    collect(ctx).await.into()
}

async fn collect(ctx: &ProbeContext<'_>) -> Result<Value> {
    let bin = ctx.config.commands.hostnamectl.as_str();
    let timeout = ctx.config.timeouts.default_timeout();

    let cmd = argv([bin, "--json=pretty"]);
    let primary = ctx.runner.run(&cmd, timeout).await?;
    if primary.success() || !rejects_option(&primary.stderr) {
        let stdout = primary.into_stdout(&cmd)?;
        match serde_json::from_str::<Value>(&stdout) {
            Ok(value) => return Ok(value),
            Err(e) => debug!("hostnamectl JSON output unusable ({e}), falling back to text"),
        }
    } else {
        debug!("hostnamectl does not support --json, falling back to text");
    }

    let cmd = argv([bin]);
    let stdout = ctx.runner.run(&cmd, timeout).await?.into_stdout(&cmd)?;
    parse_hostnamectl_text(&stdout).map(Value::Object)
}

fn rejects_option(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("unrecognized option")
        || stderr.contains("invalid option")
        || stderr.contains("unknown option")
}

/// Parse the plain `hostnamectl` listing.
///
/// Keys are lowercased with spaces turned into underscores
/// (`Operating System` → `operating_system`). Only the first `Firmware Age`
/// line is kept.
pub fn parse_hostnamectl_text(output: &str) -> Result<Map<String, Value>> {
    let mut data = Map::new();

    for line in output.lines() {
        if line.trim().is_empty() || is_cosmetic(line) {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().replace(' ', "_").to_lowercase();
        if key == "firmware_age" && data.contains_key("firmware_age") {
            continue;
        }
        data.insert(key, Value::String(value.trim().to_string()));
    }

    if data.is_empty() {
        return Err(ProbeError::malformed(
            "hostnamectl output contains no 'key: value' lines",
        ));
    }

    merge_icon_into_chassis(&mut data);
    Ok(data)
}

/// Fold `icon_name` into `chassis` when both are present.
pub fn merge_icon_into_chassis(data: &mut Map<String, Value>) {
    if !data.contains_key("chassis") {
        return;
    }
    let Some(icon) = data.remove("icon_name") else {
        return;
    };
    let icon = icon.as_str().unwrap_or_default().to_string();
    if let Some(Value::String(chassis)) = data.get_mut("chassis") {
        *chassis = format!("{chassis} {icon}");
    }
}
