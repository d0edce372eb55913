//! check_running_processes: top processes by CPU from `ps`

use serde::{Deserialize, Serialize};

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Input {
    pub top_n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: String,
    pub user: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub command: String,
}

pub async fn execute(ctx: &ProbeContext<'_>, input: &Input) -> ToolResult {
    collect(ctx, input).await.into()
}

async fn collect(ctx: &ProbeContext<'_>, input: &Input) -> Result<Vec<ProcessRecord>> {
    let cmd = argv([
        ctx.config.commands.ps.as_str(),
        "-eo",
        "pid,user,%cpu,%mem,comm",
        "--sort=-%cpu",
    ]);
    let stdout = ctx
        .runner
        .run(&cmd, ctx.config.timeouts.default_timeout())
        .await?
        .into_stdout(&cmd)?;
    parse_ps(&stdout, input.top_n)
}

/// Parse `ps -eo pid,user,%cpu,%mem,comm` output, keeping the first `top_n`
/// rows after the header. The command column may contain spaces.
pub fn parse_ps(output: &str, top_n: usize) -> Result<Vec<ProcessRecord>> {
    let mut processes = Vec::new();

    for line in output.lines().skip(1).take(top_n) {
        if line.trim().is_empty() {
            continue;
        }
        let (fields, command) = split_fields::<4>(line)
            .ok_or_else(|| ProbeError::malformed(format!("Truncated ps row: '{}'", line.trim())))?;

        let [pid, user, cpu, mem] = fields;
        processes.push(ProcessRecord {
            pid: pid.to_string(),
            user: user.to_string(),
            cpu_percent: percent(cpu, line)?,
            mem_percent: percent(mem, line)?,
            command: command.to_string(),
        });
    }

    Ok(processes)
}

/// First `N` whitespace-separated fields and the untouched remainder.
fn split_fields<const N: usize>(line: &str) -> Option<([&str; N], &str)> {
    let mut fields = [""; N];
    let mut rest = line.trim_start();
    for slot in fields.iter_mut() {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        *slot = &rest[..end];
        rest = rest[end..].trim_start();
    }
    Some((fields, rest.trim_end()))
}

fn percent(raw: &str, line: &str) -> Result<f64> {
    raw.parse().map_err(|_| {
        ProbeError::malformed(format!("Invalid percentage '{raw}' in ps row: '{}'", line.trim()))
    })
}
