use super::{Accelerator, DeviceBinding, DevicePreference, InferenceBackend};
use ndarray::{Array, ArrayD, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

const INPUT_NAME: &str = "images";
const OUTPUT_NAME: &str = "output0";

#[derive(Debug, Clone, Copy)]
enum ExecutionProvider {
    TensorRtFp16,
    Cuda,
    Cpu,
}

impl ExecutionProvider {
    fn binding(self) -> DeviceBinding {
        match self {
            ExecutionProvider::TensorRtFp16 => DeviceBinding {
                accelerator: Accelerator::Cuda,
                half_precision: true,
            },
            ExecutionProvider::Cuda => DeviceBinding {
                accelerator: Accelerator::Cuda,
                half_precision: false,
            },
            ExecutionProvider::Cpu => DeviceBinding::CPU,
        }
    }
}

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    /// Load a YOLO ONNX export, negotiating the best available device.
    ///
    /// With [`DevicePreference::Auto`] the providers are tried in order:
    /// TensorRT with FP16, then CUDA, then CPU. A provider that fails to
    /// register is logged and skipped; only a CPU failure is returned.
    pub fn load(
        path: &Path,
        preference: DevicePreference,
        intra_threads: usize,
    ) -> anyhow::Result<(Self, DeviceBinding)> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        if !path.is_file() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        if preference == DevicePreference::Auto {
            for provider in [ExecutionProvider::TensorRtFp16, ExecutionProvider::Cuda] {
                match Self::build_session(path, provider, intra_threads) {
                    Ok(session) => return Ok((Self { session }, provider.binding())),
                    Err(e) => {
                        tracing::warn!(
                            provider = ?provider,
                            error = %e,
                            "Execution provider unavailable, trying next"
                        );
                    }
                }
            }
        }

        let session = Self::build_session(path, ExecutionProvider::Cpu, intra_threads)?;
        Ok((Self { session }, DeviceBinding::CPU))
    }

    fn build_session(
        path: &Path,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> anyhow::Result<Session> {
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        match provider {
            ExecutionProvider::TensorRtFp16 => {
                tracing::debug!("Registering TensorRT execution provider (FP16)");
                builder = builder.with_execution_providers([
                    ort::execution_providers::TensorRTExecutionProvider::default()
                        .with_device_id(0)
                        .with_fp16(true)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cuda => {
                tracing::debug!("Registering CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::debug!("Using CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        tracing::info!(path = %path.display(), provider = ?provider, "Model loaded");
        Ok(session)
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>> {
        let outputs = self.session.run(ort::inputs![
            INPUT_NAME => TensorRef::from_array_view(images.view())?
        ])?;

        let predictions = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;

        Ok(predictions.into_owned())
    }
}
