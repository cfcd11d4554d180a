use crate::core::DeviceKind;
use std::process::Command;

/// Memory figures printed after a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Bytes held by the model weights on their device.
    pub weights: u64,
    /// Used memory reported by the accelerator driver, when one is in use.
    pub device_used: Option<u64>,
    /// Resident set size of this process.
    pub resident: Option<u64>,
}

impl MemoryUsage {
    pub fn probe(device: DeviceKind, weights: u64) -> Self {
        let device_used = match device {
            DeviceKind::Cuda(ordinal) => nvidia_memory_used(ordinal),
            _ => None,
        };
        Self {
            weights,
            device_used,
            resident: process_resident_bytes(),
        }
    }
}

pub fn process_resident_bytes() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status_rss(&content)
}

fn parse_status_rss(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(parse_kb_line)
}

fn parse_kb_line(line: &str) -> Option<u64> {
    line.split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

fn nvidia_memory_used(ordinal: usize) -> Option<u64> {
    let output = Command::new("nvidia-smi")
        .arg("--query-gpu=memory.used")
        .arg("--format=csv,noheader,nounits")
        .arg(format!("--id={}", ordinal))
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .and_then(|l| l.trim().parse::<u64>().ok())
        .map(|mib| mib * 1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_rss() {
        let status = "Name:\tlm-runner\nVmPeak:\t  9000 kB\nVmRSS:\t  2048 kB\nThreads:\t1\n";
        assert_eq!(parse_status_rss(status), Some(2048 * 1024));
        assert_eq!(parse_status_rss("Name:\tx\n"), None);
    }

    #[test]
    fn test_cpu_probe_has_no_device_figure() {
        let usage = MemoryUsage::probe(DeviceKind::Cpu, 42);
        assert_eq!(usage.weights, 42);
        assert_eq!(usage.device_used, None);
    }
}
