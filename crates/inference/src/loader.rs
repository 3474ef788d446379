use crate::backend::ort::OrtBackend;
use crate::cache::ModelLoader;
use crate::class_names::ClassNameTable;
use crate::config::{LoaderConfig, resolve_model_path};
use crate::detector::YoloDetector;
use crate::render::Renderer;

/// Loads ONNX YOLO exports from the configured models directory.
pub struct OrtLoader {
    config: LoaderConfig,
    renderer: Renderer,
}

impl OrtLoader {
    /// Fails only if a configured label font cannot be read.
    pub fn new(config: LoaderConfig) -> anyhow::Result<Self> {
        let mut renderer = Renderer::new(config.render_order, ClassNameTable::LOST_AND_FOUND);
        if let Some(font_path) = &config.label_font_path {
            renderer = renderer.with_font_file(font_path)?;
            tracing::info!(font = %font_path.display(), "Label font loaded");
        }

        Ok(Self { config, renderer })
    }
}

impl ModelLoader for OrtLoader {
    type Model = YoloDetector<OrtBackend>;

    fn load(&self, key: &str) -> anyhow::Result<Self::Model> {
        let path = resolve_model_path(&self.config.models_dir, key)?;

        let (backend, binding) =
            OrtBackend::load(&path, self.config.device, self.config.intra_threads)?;

        tracing::info!(
            model = key,
            accelerator = binding.accelerator.as_str(),
            half_precision = binding.half_precision,
            accelerated = binding.is_accelerated(),
            "Device negotiation complete"
        );

        Ok(YoloDetector::new(backend, binding, self.renderer.clone()))
    }
}
