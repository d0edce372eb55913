//! check_memory_usage: memory and swap totals from `free -m`

use serde::Serialize;

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub total_mb: u64,
    pub used_mb: u64,
    pub free_mb: u64,
    /// Not printed by older procps releases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_mb: Option<u64>,
    pub swap_total_mb: u64,
    pub swap_used_mb: u64,
}

pub async fn execute(ctx: &ProbeContext<'_>) -> ToolResult {
    collect(ctx).await.into()
}

async fn collect(ctx: &ProbeContext<'_>) -> Result<MemoryUsage> {
    let cmd = argv([ctx.config.commands.free.as_str(), "-m"]);
    let stdout = ctx
        .runner
        .run(&cmd, ctx.config.timeouts.default_timeout())
        .await?
        .into_stdout(&cmd)?;
    parse_free(&stdout)
}

/// Parse `free -m`: line 1 holds memory totals, line 2 swap totals.
///
/// ```text
///                total        used        free      shared  buff/cache   available
/// Mem:           15866        6311        1290         412        8264        8812
/// Swap:           2047          12        2035
/// ```
///
/// Older procps inserts a `-/+ buffers/cache` line before swap, so the
/// `Mem:`/`Swap:` labels win over the fixed positions when present.
pub fn parse_free(output: &str) -> Result<MemoryUsage> {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() < 3 {
        return Err(ProbeError::malformed(
            "free output is too short: expected memory and swap lines",
        ));
    }

    let labelled = |label: &str, fallback: usize| {
        lines
            .iter()
            .find(|l| l.trim_start().starts_with(label))
            .unwrap_or(&lines[fallback])
            .split_whitespace()
            .collect::<Vec<&str>>()
    };
    let mem = labelled("Mem:", 1);
    let swap = labelled("Swap:", 2);

    // "available" only exists in newer headers; +1 skips the row label.
    let available_mb = lines[0]
        .split_whitespace()
        .position(|h| h == "available")
        .and_then(|i| mem.get(i + 1))
        .and_then(|v| v.parse().ok());

    Ok(MemoryUsage {
        total_mb: column(&mem, 1, "total")?,
        used_mb: column(&mem, 2, "used")?,
        free_mb: column(&mem, 3, "free")?,
        available_mb,
        swap_total_mb: column(&swap, 1, "swap total")?,
        swap_used_mb: column(&swap, 2, "swap used")?,
    })
}

fn column(parts: &[&str], index: usize, name: &str) -> Result<u64> {
    let raw = parts
        .get(index)
        .ok_or_else(|| ProbeError::malformed(format!("free output is missing the {name} column")))?;
    raw.parse()
        .map_err(|_| ProbeError::malformed(format!("Invalid {name} value '{raw}' in free output")))
}
