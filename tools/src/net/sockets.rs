//! check_network_info: socket usage summary from `ss -s`
//!
//! `ss -s` prints three loosely ordered sections:
//!
//! ```text
//! Total: 1204
//! TCP:   48 (estab 21, closed 9, orphaned 0, timewait 7)
//!
//! Transport Total     IP        IPv6
//! RAW       1         0         1
//! UDP       12        8         4
//! TCP       39        27        12
//! ```
//!
//! Lines are classified by prefix. Seeing the `Transport` header switches the
//! scanner into table mode, where every later non-empty line is a protocol row
//! zipped against the header columns.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::envelope::ToolResult;
use crate::error::{ProbeError, Result};
use crate::probe::ProbeContext;
use crate::runner::argv;

static TCP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^TCP:\s+(\d+)\s+\((.*)\)").expect("static regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub total_sockets: u64,
    pub tcp_total: u64,
    pub tcp_states: BTreeMap<String, u64>,
    pub transport: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Scanner state while walking `ss -s` output.
#[derive(Debug)]
enum ScanState {
    /// Looking for `Total:`, `TCP:` or the `Transport` header.
    Scanning,
    /// Entered on the `Transport` header; holds its column names minus the label.
    InTransportTable { headers: Vec<String> },
}

pub async fn execute(ctx: &ProbeContext<'_>) -> ToolResult {
    collect(ctx).await.into()
}

async fn collect(ctx: &ProbeContext<'_>) -> Result<NetworkSummary> {
    let cmd = argv([ctx.config.commands.ss.as_str(), "-s"]);
    let stdout = ctx
        .runner
        .run(&cmd, ctx.config.timeouts.default_timeout())
        .await?
        .into_stdout(&cmd)?;
    parse_summary(&stdout)
}

/// Parse `ss -s` output into a success or error envelope.
pub fn parse_ss_s(output: &str) -> ToolResult {
    parse_summary(output).into()
}

pub fn parse_summary(output: &str) -> Result<NetworkSummary> {
    let mut summary = NetworkSummary::default();
    let mut state = ScanState::Scanning;

    for line in output.trim().lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Total:") {
            summary.total_sockets = leading_integer(rest)
                .ok_or_else(|| ProbeError::malformed(format!("Invalid Total line: '{line}'")))?;
            continue;
        }

        if line.starts_with("TCP:") {
            parse_tcp_line(line, &mut summary)?;
            continue;
        }

        if line.starts_with("Transport") {
            let headers = line.split_whitespace().skip(1).map(str::to_string).collect();
            state = ScanState::InTransportTable { headers };
            continue;
        }

        if let ScanState::InTransportTable { headers } = &state {
            let mut parts = line.split_whitespace();
            let Some(protocol) = parts.next() else {
                continue;
            };
            let mut row = BTreeMap::new();
            for (header, raw) in headers.iter().zip(parts) {
                // "-" marks a column that does not apply to this protocol
                if raw == "-" {
                    continue;
                }
                let value = leading_integer(raw).ok_or_else(|| {
                    ProbeError::malformed(format!(
                        "Invalid value '{raw}' in transport row '{protocol}'"
                    ))
                })?;
                row.insert(header.clone(), value);
            }
            summary.transport.insert(protocol.to_string(), row);
        }
    }

    if summary.total_sockets == 0 && summary.transport.is_empty() {
        return Err(ProbeError::malformed(
            "Input does not contain valid 'ss -s' data.",
        ));
    }

    Ok(summary)
}

fn parse_tcp_line(line: &str, summary: &mut NetworkSummary) -> Result<()> {
    if let Some(caps) = TCP_LINE.captures(line) {
        summary.tcp_total = caps[1]
            .parse()
            .map_err(|_| ProbeError::malformed(format!("Invalid TCP total in '{line}'")))?;
        for pair in caps[2].split(',') {
            let mut tokens = pair.split_whitespace();
            match (tokens.next(), tokens.next().and_then(leading_integer), tokens.next()) {
                (Some(state), Some(count), None) => {
                    summary.tcp_states.insert(state.to_string(), count);
                }
                _ => debug!("Skipping unrecognised TCP state entry '{}'", pair.trim()),
            }
        }
    } else {
        let rest = line.trim_start_matches("TCP:");
        let scalar = rest.split('(').next().unwrap_or_default();
        summary.tcp_total = leading_integer(scalar)
            .ok_or_else(|| ProbeError::malformed(format!("Invalid TCP line: '{line}'")))?;
    }
    Ok(())
}

/// Leading run of digits, tolerating forms like `193 (kernel 0)` or `7/0`.
fn leading_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SS_OUTPUT: &str = "\
Total: 1204
TCP:   48 (estab 21, closed 9, orphaned 0, timewait 7)

Transport Total     IP        IPv6
RAW\t  1         0         1
UDP\t  12        8         4
TCP\t  39        27        12
INET\t  52        35        17
FRAG\t  0         0         0
";

    #[test]
    fn test_parse_full_output() {
        let summary = parse_summary(SS_OUTPUT).unwrap();
        assert_eq!(summary.total_sockets, 1204);
        assert_eq!(summary.tcp_total, 48);
        assert_eq!(summary.tcp_states["estab"], 21);
        assert_eq!(summary.tcp_states["timewait"], 7);
        assert_eq!(summary.tcp_states.len(), 4);
        assert_eq!(summary.transport.len(), 5);
        assert_eq!(summary.transport["TCP"]["Total"], 39);
        assert_eq!(summary.transport["TCP"]["IPv6"], 12);
        assert_eq!(summary.transport["RAW"]["IP"], 0);
    }

    #[test]
    fn test_older_ss_format() {
        let output = "\
Total: 193 (kernel 0)
TCP:   10 (estab 4, closed 2, orphaned 0, synrecv 0, timewait 2/0), ports 0

Transport Total     IP        IPv6
*\t  0         -         -
TCP\t  8         6         2
";
        let summary = parse_summary(output).unwrap();
        assert_eq!(summary.total_sockets, 193);
        assert_eq!(summary.tcp_total, 10);
        assert_eq!(summary.tcp_states["timewait"], 2);
        assert_eq!(summary.tcp_states["synrecv"], 0);
        assert_eq!(summary.transport.len(), 2);
        assert_eq!(summary.transport["*"]["Total"], 0);
        assert!(!summary.transport["*"].contains_key("IP"));
    }

    #[test]
    fn test_tcp_line_without_states() {
        let summary = parse_summary("Total: 5\nTCP: 3\n").unwrap();
        assert_eq!(summary.tcp_total, 3);
        assert!(summary.tcp_states.is_empty());
    }

    #[test]
    fn test_transport_without_total() {
        let summary = parse_summary("Transport Total IP IPv6\nUDP 4 2 2\n").unwrap();
        assert_eq!(summary.total_sockets, 0);
        assert_eq!(summary.transport["UDP"]["IPv6"], 2);
    }

    #[test]
    fn test_short_row_is_zipped_positionally() {
        let summary = parse_summary("Total: 9\nTransport Total IP IPv6\nTCP 9 9\n").unwrap();
        assert_eq!(summary.transport["TCP"].len(), 2);
        assert!(!summary.transport["TCP"].contains_key("IPv6"));
    }

    #[test]
    fn test_unrelated_input_is_an_error() {
        let result = parse_ss_s("Netid State Recv-Q Send-Q\n");
        assert_eq!(
            result.message(),
            Some("Input does not contain valid 'ss -s' data.")
        );
        assert!(!parse_ss_s("").is_success());
    }

    #[test]
    fn test_invalid_total_is_an_error_not_a_panic() {
        let result = parse_ss_s("Total: lots\n");
        assert!(!result.is_success());
    }

    #[test]
    fn test_garbage_transport_cell_is_an_error() {
        let result = parse_ss_s("Total: 4\nTransport Total IP\nUDP four 2\n");
        assert_eq!(
            result.message(),
            Some("Invalid value 'four' in transport row 'UDP'")
        );
    }

    #[test]
    fn test_envelope_is_deterministic() {
        let first = serde_json::to_string(&parse_ss_s(SS_OUTPUT)).unwrap();
        let second = serde_json::to_string(&parse_ss_s(SS_OUTPUT)).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("{\"status\":\"success\",\"data\":{"));

        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["data"]["total_sockets"], 1204);
        assert_eq!(value["data"]["tcp_total"], 48);
        assert_eq!(value["data"]["tcp_states"]["timewait"], 7);
        assert_eq!(value["data"]["transport"]["TCP"]["IP"], 27);
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer(" 193 (kernel 0)"), Some(193));
        assert_eq!(leading_integer("7/0"), Some(7));
        assert_eq!(leading_integer("-"), None);
    }
}
