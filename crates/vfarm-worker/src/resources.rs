//! Host resource sampling.

use sysinfo::{Disks, System};
use vfarm_models::ResourceUsage;

/// Take a resource snapshot of the host.
///
/// CPU usage needs two refreshes a short interval apart, so one call takes
/// slightly longer than `MINIMUM_CPU_UPDATE_INTERVAL`.
pub async fn sample_resources() -> ResourceUsage {
    let mut sys = System::new();

    sys.refresh_cpu();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu();
    let cpu_percent = sys.global_cpu_info().cpu_usage() as f64;

    sys.refresh_memory();
    let total_memory = sys.total_memory();
    let memory_percent = if total_memory > 0 {
        sys.used_memory() as f64 / total_memory as f64 * 100.0
    } else {
        0.0
    };

    let disks = Disks::new_with_refreshed_list();
    let (total_disk, available_disk) = disks
        .iter()
        .fold((0u64, 0u64), |(total, available), disk| {
            (total + disk.total_space(), available + disk.available_space())
        });
    let disk_percent = if total_disk > 0 {
        (total_disk - available_disk) as f64 / total_disk as f64 * 100.0
    } else {
        0.0
    };

    ResourceUsage {
        cpu_percent,
        memory_percent,
        disk_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_is_within_percent_bounds() {
        let usage = sample_resources().await;
        assert!((0.0..=100.0).contains(&usage.memory_percent));
        assert!((0.0..=100.0).contains(&usage.disk_percent));
        assert!(usage.cpu_percent >= 0.0);
    }
}
