use ndarray::{Array, ArrayD, IxDyn};
use serde::Deserialize;

#[cfg(feature = "ort-backend")]
pub mod ort;

pub trait InferenceBackend: Send {
    /// Run inference on a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    Cpu,
    Cuda,
}

impl Accelerator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accelerator::Cpu => "cpu",
            Accelerator::Cuda => "cuda",
        }
    }
}

/// Outcome of device negotiation at model load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBinding {
    pub accelerator: Accelerator,
    pub half_precision: bool,
}

impl DeviceBinding {
    pub const CPU: DeviceBinding = DeviceBinding {
        accelerator: Accelerator::Cpu,
        half_precision: false,
    };

    pub fn is_accelerated(&self) -> bool {
        self.accelerator != Accelerator::Cpu
    }
}

impl Default for DeviceBinding {
    fn default() -> Self {
        Self::CPU
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Try an accelerator (and reduced precision) first, fall back to CPU.
    #[default]
    Auto,
    Cpu,
}
