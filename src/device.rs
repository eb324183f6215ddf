//! # Compute Device Selection
//!
//! Picks the Candle device the Whisper model runs on. GPU backends fall back
//! to the CPU when they are not compiled in or no device is present.

use candle_core::Device;
use tracing::{debug, info, warn};

/// Device preference from `transcription.device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Best available: CUDA, then Metal, then CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(format!("Unknown device preference: {}", s)),
        }
    }
}

impl DevicePreference {
    /// Resolve the preference to a concrete device.
    pub fn select(self) -> Device {
        match self {
            DevicePreference::Auto => best_device(),
            DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Cuda => cuda_device().unwrap_or_else(|| {
                warn!("CUDA requested but unavailable, falling back to CPU");
                Device::Cpu
            }),
            DevicePreference::Metal => metal_device().unwrap_or_else(|| {
                warn!("Metal requested but unavailable, falling back to CPU");
                Device::Cpu
            }),
        }
    }
}

/// Parse a configured device string, treating unknown values as `auto`.
pub fn device_from_config(value: &str) -> Device {
    match value.parse::<DevicePreference>() {
        Ok(preference) => preference.select(),
        Err(_) => {
            warn!("Invalid device preference '{}', using auto", value);
            DevicePreference::Auto.select()
        }
    }
}

/// Short label for logs and the health endpoint.
pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

fn best_device() -> Device {
    if let Some(device) = cuda_device() {
        info!("Selected CUDA GPU for transcription");
        return device;
    }
    if let Some(device) = metal_device() {
        info!("Selected Metal GPU for transcription");
        return device;
    }
    info!("Using CPU for transcription");
    Device::Cpu
}

fn cuda_device() -> Option<Device> {
    match Device::new_cuda(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("CUDA not available: {}", e);
            None
        }
    }
}

fn metal_device() -> Option<Device> {
    match Device::new_metal(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("Metal not available: {}", e);
            None
        }
    }
}
