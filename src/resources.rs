use sysinfo::{Disks, System};
use tracing::info;

/// Log a CPU/memory/disk snapshot. Called before and after each video for
/// observability only; it never gates or throttles processing.
pub fn log_resource_snapshot(context: &str) {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();

    let cpu_percent = sys.global_cpu_info().cpu_usage();
    let memory_used_gb = sys.used_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
    let memory_total_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);

    let disks = Disks::new_with_refreshed_list();
    let (disk_total, disk_available) = disks
        .iter()
        .map(|d| (d.total_space(), d.available_space()))
        .fold((0u64, 0u64), |acc, (t, a)| (acc.0 + t, acc.1 + a));
    let disk_used_gb = (disk_total.saturating_sub(disk_available)) as f64
        / (1024.0 * 1024.0 * 1024.0);
    let disk_total_gb = disk_total as f64 / (1024.0 * 1024.0 * 1024.0);

    info!(
        context,
        cpu_percent,
        memory_used_gb = format!("{memory_used_gb:.2}"),
        memory_total_gb = format!("{memory_total_gb:.2}"),
        disk_used_gb = format!("{disk_used_gb:.2}"),
        disk_total_gb = format!("{disk_total_gb:.2}"),
        "System resources"
    );
}
