use crate::core::Result;
use candle_core::Device;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda(usize),
    Metal,
}

impl DeviceKind {
    /// Picks the best compute device from what was detected. CUDA wins over
    /// Metal; with neither present this is the CPU.
    pub fn select(cuda_available: bool, metal_available: bool) -> Self {
        if cuda_available {
            DeviceKind::Cuda(0)
        } else if metal_available {
            DeviceKind::Metal
        } else {
            DeviceKind::Cpu
        }
    }

    pub fn detect() -> Self {
        Self::select(
            candle_core::utils::cuda_is_available(),
            candle_core::utils::metal_is_available(),
        )
    }

    /// Backend name without the ordinal.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Cuda(_) => "cuda",
            DeviceKind::Metal => "metal",
        }
    }

    pub fn is_accelerator(&self) -> bool {
        !matches!(self, DeviceKind::Cpu)
    }

    pub fn to_candle(self) -> Result<Device> {
        let device = match self {
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::Cuda(ordinal) => Device::new_cuda(ordinal)?,
            DeviceKind::Metal => Device::new_metal(0)?,
        };
        Ok(device)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            DeviceKind::Metal => write!(f, "metal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_drops_ordinal() {
        assert_eq!(DeviceKind::Cuda(1).name(), "cuda");
        assert_eq!(DeviceKind::Cuda(1).to_string(), "cuda:1");
        assert_eq!(DeviceKind::Cpu.name(), "cpu");
        assert_eq!(DeviceKind::Metal.name(), "metal");
    }

    #[test]
    fn test_select_prefers_cuda() {
        assert_eq!(DeviceKind::select(true, true), DeviceKind::Cuda(0));
        assert_eq!(DeviceKind::select(true, false), DeviceKind::Cuda(0));
    }

    #[test]
    fn test_select_falls_back_to_cpu() {
        assert_eq!(DeviceKind::select(false, true), DeviceKind::Metal);
        let kind = DeviceKind::select(false, false);
        assert_eq!(kind, DeviceKind::Cpu);
        assert!(!kind.is_accelerator());
    }

    #[test]
    fn test_cpu_to_candle() {
        let device = DeviceKind::Cpu.to_candle().unwrap();
        assert!(device.is_cpu());
        assert_eq!(DeviceKind::Cuda(1).to_string(), "cuda:1");
    }
}
