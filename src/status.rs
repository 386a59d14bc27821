//! System dashboard for `privy status` and the `privy-status` built-in.
//!
//! Reports CPU usage, memory used/total, free space on the root
//! filesystem, whether the active provider is ready, and the size of each
//! index partition.

use anyhow::Result;
use std::path::Path;
use sysinfo::{Disks, System};
use tracing::warn;

use crate::generator::TextGenerator;
use crate::store::{ChunkStore, PartitionStats};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

/// One sample of the machine's resources.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub cpu_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    /// Free bytes on `/`; `None` when no disk is mounted there.
    pub disk_free: Option<u64>,
    pub provider: String,
    pub provider_ready: bool,
    pub partitions: Vec<PartitionStats>,
}

/// Sample the machine, ping the provider, and summarize the index.
pub async fn collect(generator: &dyn TextGenerator, store: Option<&dyn ChunkStore>) -> StatusReport {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    // CPU usage is a delta between two refreshes
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let disk_free = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .map(|d| d.available_space());

    StatusReport {
        cpu_percent: sys.global_cpu_usage(),
        memory_used: sys.used_memory(),
        memory_total: sys.total_memory(),
        disk_free,
        provider: generator.identity(),
        provider_ready: generator.ready().await,
        partitions: match store {
            Some(store) => store.partitions().await.unwrap_or_else(|e| {
                warn!(error = %e, "could not read index partitions");
                Vec::new()
            }),
            None => Vec::new(),
        },
    }
}

pub fn render(report: &StatusReport) -> String {
    let disk = match report.disk_free {
        Some(bytes) => format!("{}GB Free", bytes / GB),
        None => "N/A".to_string(),
    };
    let provider = if report.provider_ready {
        format!("{} (ready)", report.provider)
    } else {
        format!("{} (not ready)", report.provider)
    };

    let mut out = String::new();
    out.push_str("Privy Dashboard\n");
    out.push_str("===============\n\n");
    out.push_str(&format!("  CPU Usage:            {:.1}%\n", report.cpu_percent));
    out.push_str(&format!(
        "  Memory (Used/Total):  {}MB / {}MB\n",
        report.memory_used / MB,
        report.memory_total / MB
    ));
    out.push_str(&format!("  Disk Space (Free):    {}\n", disk));
    out.push_str(&format!("  AI Provider:          {}\n", provider));

    out.push_str("\n  Index:\n");
    if report.partitions.is_empty() {
        out.push_str("    (empty)\n");
    }
    for p in &report.partitions {
        out.push_str(&format!(
            "    {:<36} {} chunks, {} files\n",
            p.provider, p.chunks, p.sources
        ));
    }
    out
}

/// Run the status command: sample and print the dashboard.
pub async fn run_status(generator: &dyn TextGenerator, store: Option<&dyn ChunkStore>) -> Result<()> {
    let report = collect(generator, store).await;
    println!();
    print!("{}", render(&report));
    println!();
    Ok(())
}
