//! check_cpu_usage: aggregate CPU utilisation sampled with `mpstat`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Input {
    /// Sampling window in seconds.
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuUsage {
    pub user: f64,
    pub system: f64,
    pub iowait: f64,
    pub idle: f64,
    pub load_1min: f64,
}

pub async fn execute(ctx: &ProbeContext<'_>, input: &Input) -> ToolResult {
    collect(ctx, input).await.into()
}

async fn collect(ctx: &ProbeContext<'_>, input: &Input) -> Result<CpuUsage> {
    let duration = input.duration.to_string();
    let cmd = argv([
        ctx.config.commands.mpstat.as_str(),
        "-P",
        "ALL",
        duration.as_str(),
        "1",
    ]);
    let stdout = ctx
        .runner
        .run(&cmd, ctx.config.timeouts.cpu_timeout(input.duration))
        .await?
        .into_stdout(&cmd)?;
    parse_mpstat(&stdout, load_average_1min())
}

/// Extract the `all` row of the `Average:` section.
///
/// ```text
/// Average:     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle
/// Average:     all    3.02    0.00    1.26    0.38    0.00    0.13    0.00    0.00    0.00   95.21
/// ```
///
/// Columns are looked up by name from the `Average:` header, falling back to
/// the sysstat default positions when no header is present.
pub fn parse_mpstat(output: &str, load_1min: f64) -> Result<CpuUsage> {
    let mut columns: HashMap<&str, usize> = HashMap::new();
    let mut aggregate: Option<Vec<&str>> = None;

    for line in output.lines() {
        if !line.starts_with("Average:") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.get(1) {
            Some(&"CPU") => {
                columns = parts
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.trim_start_matches('%'), i))
                    .collect();
            }
            Some(&"all") => aggregate = Some(parts),
            _ => {}
        }
    }

    let parts = aggregate
        .ok_or_else(|| ProbeError::malformed("mpstat output has no 'Average: all' row"))?;

    let field = |names: &[&str], fallback: usize| -> Result<f64> {
        let index = names
            .iter()
            .find_map(|n| columns.get(n).copied())
            .unwrap_or(fallback);
        let raw = parts.get(index).ok_or_else(|| {
            ProbeError::malformed(format!("mpstat row is missing column {}", names[0]))
        })?;
        raw.parse::<f64>().map_err(|_| {
            ProbeError::malformed(format!("Invalid {} value '{raw}' in mpstat output", names[0]))
        })
    };

    Ok(CpuUsage {
        user: field(&["usr", "user"], 2)?,
        system: field(&["sys", "system"], 4)?,
        iowait: field(&["iowait"], 5)?,
        idle: field(&["idle"], 11)?,
        load_1min,
    })
}

/// One-minute load average as reported by the kernel.
pub fn load_average_1min() -> f64 {
    let mut loads = [0.0f64; 3];
    // SAFETY: the buffer holds the three samples requested.
    let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if n >= 1 {
        loads[0]
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MPSTAT_OUTPUT: &str = "\
Linux 6.8.0-45-generic (db-01) \t06/09/2025 \t_x86_64_\t(4 CPU)

10:30:01 AM  CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle
10:30:06 AM  all    3.02    0.00    1.26    0.38    0.00    0.13    0.00    0.00    0.00   95.21
10:30:06 AM    0    2.80    0.00    1.20    0.40    0.00    0.20    0.00    0.00    0.00   95.40

Average:     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle
Average:     all    3.02    0.00    1.26    0.38    0.00    0.13    0.00    0.00    0.00   95.21
Average:       0    2.80    0.00    1.20    0.40    0.00    0.20    0.00    0.00    0.00   95.40
";

    #[test]
    fn test_parse_average_row() {
        let usage = parse_mpstat(MPSTAT_OUTPUT, 0.42).unwrap();
        assert_eq!(usage.user, 3.02);
        assert_eq!(usage.system, 1.26);
        assert_eq!(usage.iowait, 0.38);
        assert_eq!(usage.idle, 95.21);
        assert_eq!(usage.load_1min, 0.42);
    }

    #[test]
    fn test_header_reordering_is_followed() {
        let output = "\
Average:     CPU    %idle    %usr    %sys %iowait
Average:     all    90.00    6.00    3.00    1.00
";
        let usage = parse_mpstat(output, 0.0).unwrap();
        assert_eq!(usage.idle, 90.0);
        assert_eq!(usage.user, 6.0);
        assert_eq!(usage.iowait, 1.0);
    }

    #[test]
    fn test_positional_fallback_without_header() {
        let output = "Average:     all    3.02    0.00    1.26    0.38    0.00    0.13    0.00    0.00    0.00   95.21\n";
        let usage = parse_mpstat(output, 0.0).unwrap();
        assert_eq!(usage.user, 3.02);
        assert_eq!(usage.idle, 95.21);
    }

    #[test]
    fn test_missing_aggregate_row() {
        let err = parse_mpstat("Linux 6.8.0 (db-01)\n", 0.0).unwrap_err();
        assert!(matches!(err, ProbeError::MalformedOutput(_)));
    }

    #[test]
    fn test_truncated_row_is_an_error() {
        let output = "Average:     CPU    %usr   %nice    %sys\nAverage:     all    3.02\n";
        assert!(parse_mpstat(output, 0.0).is_err());
    }

    #[test]
    fn test_load_average_is_non_negative() {
        assert!(load_average_1min() >= 0.0);
    }
}
