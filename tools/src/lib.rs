//! perfdoc tools: system telemetry probes behind a function-calling dispatcher
//!
//! Each probe runs one diagnostic command (`ss`, `lscpu`, `hostnamectl`,
//! `mpstat`, `free`, `iostat`, `ps`) and normalizes its output into a
//! `{"status": ..}` envelope. The [`executor::Dispatcher`] resolves batches of
//! named calls against the [`registry::Registry`] and answers every call.

pub mod config;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod hw;
pub mod monitor;
pub mod net;
pub mod prereq;
pub mod probe;
pub mod process;
pub mod registry;
pub mod runner;
pub mod schema;

pub use envelope::{CallRequest, CallResponse, ToolResult};
pub use error::ProbeError;
pub use executor::Dispatcher;
pub use registry::Registry;
