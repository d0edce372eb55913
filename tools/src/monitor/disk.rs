//! check_disk_io: extended per-device statistics from `iostat -d -x -y`
//!
//! iostat samples repeatedly, so its output is a sequence of blocks, each a
//! `Device ...` header followed by one row per device. The last block with
//! rows is reported; the summary sums IOPS and throughput across devices and
//! tracks the busiest device's utilisation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

/// Device filter value that keeps every row.
pub const ALL_DEVICES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Input {
    /// Device name such as `sda`, or `all`.
    pub device: String,
}

/// A column value: numeric when it parses, otherwise the raw token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    fn parse(token: &str) -> Self {
        // Explicit zero renderings, kept separate from the general float path.
        if token == "0.00" || token == "0.0" {
            return Self::Number(0.0);
        }
        match token.parse::<f64>() {
            Ok(v) => Self::Number(v),
            Err(_) => Self::Text(token.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskDeviceMetric {
    pub device: String,
    /// Keyed by the lowercased iostat column name, e.g. `r/s`, `%util`.
    pub metrics: BTreeMap<String, MetricValue>,
}

impl DiskDeviceMetric {
    fn number(&self, column: &str) -> Option<f64> {
        self.metrics.get(column).and_then(MetricValue::as_f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiskSummary {
    pub total_iops: f64,
    /// kB/s read plus written.
    pub total_throughput: f64,
    pub max_utilization: f64,
    pub device_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseDebug {
    pub output_lines: usize,
    pub blocks_found: usize,
    pub selected_block_size: usize,
    pub devices_found: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskIoReport {
    pub devices: Vec<DiskDeviceMetric>,
    pub summary: DiskSummary,
    pub captured_at: DateTime<Utc>,
    pub debug: ParseDebug,
}

/// One `Device` header and the rows that follow it.
#[derive(Debug, Default)]
struct Block<'a> {
    headers: Vec<String>,
    rows: Vec<Vec<&'a str>>,
}

impl Block<'_> {
    /// Header plus rows, the way the block appears in the output.
    fn line_count(&self) -> usize {
        1 + self.rows.len()
    }
}

/// Segmenter state while walking iostat output.
#[derive(Debug)]
enum ScanState<'a> {
    /// Before the first `Device` header (banner, blank lines).
    Scanning,
    /// Collecting rows under the most recent header.
    InDeviceBlock(Block<'a>),
}

pub async fn execute(ctx: &ProbeContext<'_>, device: &str) -> ToolResult {
    collect(ctx, device).await.into()
}

async fn collect(ctx: &ProbeContext<'_>, device: &str) -> Result<DiskIoReport> {
    let interval = ctx.config.disk_io.interval_secs.to_string();
    let samples = ctx.config.disk_io.samples.to_string();
    let cmd = argv([
        ctx.config.commands.iostat.as_str(),
        "-d",
        "-x",
        "-y",
        interval.as_str(),
        samples.as_str(),
    ]);
    let stdout = ctx
        .runner
        .run(&cmd, ctx.config.timeouts.disk_io_timeout())
        .await?
        .into_stdout(&cmd)?;
    parse_report(&stdout, device, Utc::now())
}

/// Parse iostat output into a success or error envelope.
pub fn parse_iostat_output(output: &str, device: &str, captured_at: DateTime<Utc>) -> ToolResult {
    parse_report(output, device, captured_at).into()
}

pub fn parse_report(output: &str, device: &str, captured_at: DateTime<Utc>) -> Result<DiskIoReport> {
    let lines: Vec<&str> = output.trim().lines().collect();
    if lines.len() < 3 {
        return Err(ProbeError::malformed(
            "iostat output is empty or has an abnormal format",
        ));
    }

    let blocks = segment_blocks(&lines);
    if blocks.is_empty() {
        return Err(ProbeError::malformed("No valid data blocks found"));
    }

    let selected = select_block(&blocks)
        .ok_or_else(|| ProbeError::malformed("Not enough data rows found"))?;

    let filter = if device.is_empty() { ALL_DEVICES } else { device };
    let devices: Vec<DiskDeviceMetric> = selected
        .rows
        .iter()
        .filter(|row| filter == ALL_DEVICES || row[0] == filter)
        .map(|row| zip_row(&selected.headers, row))
        .collect();

    if devices.is_empty() {
        return Err(ProbeError::DeviceNotFound {
            device: filter.to_string(),
            available: selected.rows.iter().map(|row| row[0].to_string()).collect(),
        });
    }

    let summary = summarize(&devices);
    let counters = ParseDebug {
        output_lines: lines.len(),
        blocks_found: blocks.len(),
        selected_block_size: selected.line_count(),
        devices_found: devices.len(),
    };
    debug!("iostat parse: {:?}", counters);

    Ok(DiskIoReport {
        devices,
        summary,
        captured_at,
        debug: counters,
    })
}

/// Split output into header-delimited blocks. Rows shorter than their header
/// are truncated samples and are dropped.
fn segment_blocks<'a>(lines: &[&'a str]) -> Vec<Block<'a>> {
    let mut blocks = Vec::new();
    let mut state = ScanState::Scanning;

    for &line in lines {
        if line.starts_with("Device") {
            if let ScanState::InDeviceBlock(block) = state {
                blocks.push(block);
            }
            state = ScanState::InDeviceBlock(Block {
                headers: line.split_whitespace().map(str::to_lowercase).collect(),
                rows: Vec::new(),
            });
            continue;
        }

        if let ScanState::InDeviceBlock(block) = &mut state {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= block.headers.len() {
                block.rows.push(parts);
            }
        }
    }

    if let ScanState::InDeviceBlock(block) = state {
        blocks.push(block);
    }
    blocks
}

/// The last block, or the nearest earlier one if the last has no rows.
fn select_block<'b, 'a>(blocks: &'b [Block<'a>]) -> Option<&'b Block<'a>> {
    blocks.iter().rev().find(|block| !block.rows.is_empty())
}

fn zip_row(headers: &[String], row: &[&str]) -> DiskDeviceMetric {
    let metrics = headers
        .iter()
        .zip(row.iter())
        .skip(1)
        .map(|(header, token)| (header.clone(), MetricValue::parse(token)))
        .collect();
    DiskDeviceMetric {
        device: row[0].to_string(),
        metrics,
    }
}

fn summarize(devices: &[DiskDeviceMetric]) -> DiskSummary {
    let mut summary = DiskSummary {
        device_count: devices.len(),
        ..Default::default()
    };

    for d in devices {
        let reads = transfers(d, "r/s", "rsec/s");
        let writes = transfers(d, "w/s", "wsec/s");
        summary.total_iops += reads + writes;

        let read_kb = d.number("rkb/s").unwrap_or(0.0);
        let write_kb = d.number("wkb/s").unwrap_or(0.0);
        summary.total_throughput += read_kb + write_kb;

        let util = d.number("%util").unwrap_or(0.0);
        if util > summary.max_utilization {
            summary.max_utilization = util;
        }
    }

    summary
}

/// Requests per second from the `r/s`-style column, falling back to the
/// sector-rate column of older iostat releases halved.
fn transfers(d: &DiskDeviceMetric, primary: &str, sectors: &str) -> f64 {
    match d.number(primary) {
        Some(v) => v,
        None => d.number(sectors).map(|v| v / 2.0).unwrap_or(0.0),
    }
}
