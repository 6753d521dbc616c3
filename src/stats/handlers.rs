//! Stats snapshot capture and its text and JSON renderings.

use std::fmt::Write;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::stats::StatsState;

/// One point-in-time view of the process.
#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub version: &'static str,
    pub alive_tasks: usize,
    pub worker_threads: usize,
    pub memory_resident_bytes: Option<u64>,
    pub memory_virtual_bytes: Option<u64>,
    pub uptime_secs: u64,
    pub active_connections: u64,
    pub total_connections: u64,
}

impl StatsSnapshot {
    pub fn capture(state: &StatsState) -> Self {
        let runtime = tokio::runtime::Handle::current().metrics();
        let memory = process_memory();
        Self {
            version: env!("CARGO_PKG_VERSION"),
            alive_tasks: runtime.num_alive_tasks(),
            worker_threads: runtime.num_workers(),
            memory_resident_bytes: memory.map(|m| m.resident),
            memory_virtual_bytes: memory.map(|m| m.virtual_size),
            uptime_secs: state.started.elapsed().as_secs(),
            active_connections: state.connections.active_count(),
            total_connections: state.connections.accepted_count(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# tasks        : {}", self.alive_tasks);
        let _ = writeln!(out, "# workers      : {}", self.worker_threads);
        let _ = writeln!(out, "Memory resident: {}", bytes_or_na(self.memory_resident_bytes));
        let _ = writeln!(out, "Memory virtual : {}", bytes_or_na(self.memory_virtual_bytes));
        let _ = writeln!(out, "Uptime         : {}s", self.uptime_secs);
        let _ = writeln!(out, "Active connect : {}", self.active_connections);
        let _ = writeln!(out, "Total connect  : {}", self.total_connections);
        out
    }
}

pub async fn get_stats_text(State(state): State<StatsState>) -> String {
    StatsSnapshot::capture(&state).render_text()
}

pub async fn get_stats_json(State(state): State<StatsState>) -> Json<StatsSnapshot> {
    Json(StatsSnapshot::capture(&state))
}

#[derive(Debug, Clone, Copy)]
struct ProcessMemory {
    resident: u64,
    virtual_size: u64,
}

/// Read VmRSS / VmSize from procfs. `None` where procfs is unavailable.
fn process_memory() -> Option<ProcessMemory> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_proc_status(&status)
}

fn parse_proc_status(status: &str) -> Option<ProcessMemory> {
    let field = |name: &str| {
        status
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    Some(ProcessMemory {
        resident: field("VmRSS:")?,
        virtual_size: field("VmSize:")?,
    })
}

fn bytes_or_na(bytes: Option<u64>) -> String {
    bytes.map(human_bytes).unwrap_or_else(|| "n/a".to_string())
}

/// SI-style size, e.g. `12 MB`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];
    if bytes < 10 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 || value >= 10.0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
