//! Default worker-count probe.
//!
//! Carving is CPU-bound per candidate, so the default pool size is the
//! physical core count rather than the SMT-inflated logical count. On
//! Linux that comes from `/proc/cpuinfo` (group by `physical id`, sum
//! `cpu cores` per package); everywhere else, and whenever the parse
//! yields nothing, the logical CPU count stands in.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Number of physical cores, with a logical-count fallback.
pub fn physical_cpu_count() -> usize {
    if cfg!(target_os = "linux") {
        if let Ok(text) = std::fs::read_to_string("/proc/cpuinfo") {
            if let Some(count) = parse_cpuinfo(&text) {
                return count;
            }
        }
    }
    num_cpus::get()
}

/// Sum `cpu cores` over distinct `physical id` packages.
fn parse_cpuinfo(text: &str) -> Option<usize> {
    static PHYSICAL_ID: OnceLock<Regex> = OnceLock::new();
    static CPU_CORES: OnceLock<Regex> = OnceLock::new();
    let physical_id =
        PHYSICAL_ID.get_or_init(|| Regex::new(r"physical id\s*:\s*(\d+)").expect("probe pattern"));
    let cpu_cores =
        CPU_CORES.get_or_init(|| Regex::new(r"cpu cores\s*:\s*(\d+)").expect("probe pattern"));

    let mut cores_per_package: BTreeMap<u32, usize> = BTreeMap::new();
    let mut current_id: Option<u32> = None;
    let mut current_cores: Option<usize> = None;

    // Processor blocks are blank-line separated; each block repeats its
    // package's id and core count.
    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let (Some(id), Some(cores)) = (current_id, current_cores) {
                cores_per_package.insert(id, cores);
            }
            current_id = None;
            current_cores = None;
            continue;
        }

        if let Some(caps) = physical_id.captures(line) {
            current_id = caps[1].parse().ok();
        } else if let Some(caps) = cpu_cores.captures(line) {
            current_cores = caps[1].parse().ok();
        }
    }

    let total: usize = cores_per_package.values().sum();
    (total > 0).then_some(total)
}
