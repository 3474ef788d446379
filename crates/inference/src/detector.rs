use crate::backend::{DeviceBinding, InferenceBackend};
use crate::buffer::array_to_rgb_image;
use crate::config::{DEFAULT_IMAGE_SIZE, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS};
use crate::detection::Detection;
use crate::processing::{post::PostProcessor, pre::PreProcessor};
use crate::render::Renderer;
use image::{ImageReader, RgbImage};
use ndarray::Array3;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PredictOptions {
    pub confidence_threshold: f32,
    pub image_size: u32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// When set, the annotated image is also written here and reported in
    /// [`Prediction::artifacts`].
    pub save_dir: Option<PathBuf>,
}

impl PredictOptions {
    pub fn new(confidence_threshold: f32, image_size: u32) -> Self {
        Self {
            confidence_threshold,
            image_size,
            ..Self::default()
        }
    }
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            image_size: DEFAULT_IMAGE_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            save_dir: None,
        }
    }
}

/// Result of running a detector on one image.
pub struct Prediction {
    pub source: RgbImage,
    /// `None` when the model produced no detection structure at all.
    pub detections: Option<Vec<Detection>>,
    /// Files written on behalf of this prediction.
    pub artifacts: Vec<PathBuf>,
    renderer: Renderer,
}

impl Prediction {
    pub fn new(source: RgbImage, detections: Option<Vec<Detection>>, renderer: Renderer) -> Self {
        Self {
            source,
            detections,
            artifacts: Vec::new(),
            renderer,
        }
    }

    /// Annotated image, H×W×3, in the renderer's channel order.
    pub fn plot(&self) -> anyhow::Result<Array3<u8>> {
        let detections = self.detections.as_deref().unwrap_or_default();
        self.renderer.render(&self.source, detections)
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }
}

/// Object detector: image file in, predictions out.
pub trait Detector: Send + Sync {
    fn predict(&self, image_path: &Path, options: &PredictOptions) -> anyhow::Result<Vec<Prediction>>;

    fn device(&self) -> DeviceBinding {
        DeviceBinding::CPU
    }
}

/// YOLOv8-style detector over any [`InferenceBackend`].
pub struct YoloDetector<B: InferenceBackend> {
    backend: Mutex<B>,
    binding: DeviceBinding,
    renderer: Renderer,
}

impl<B: InferenceBackend> YoloDetector<B> {
    pub fn new(backend: B, binding: DeviceBinding, renderer: Renderer) -> Self {
        Self {
            backend: Mutex::new(backend),
            binding,
            renderer,
        }
    }

    fn save_annotated(
        &self,
        prediction: &mut Prediction,
        image_path: &Path,
        save_dir: &Path,
    ) -> anyhow::Result<()> {
        let annotated = prediction.plot()?;
        let rgb = array_to_rgb_image(&annotated, self.renderer.channel_order)?;

        let stem = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        std::fs::create_dir_all(save_dir)?;
        let out_path = save_dir.join(format!("{stem}_pred.jpg"));

        rgb.save(&out_path)?;
        tracing::debug!(path = %out_path.display(), "Saved annotated image");
        prediction.artifacts.push(out_path);
        Ok(())
    }
}

impl<B: InferenceBackend> Detector for YoloDetector<B> {
    fn predict(&self, image_path: &Path, options: &PredictOptions) -> anyhow::Result<Vec<Prediction>> {
        let start = Instant::now();

        let source = ImageReader::open(image_path)?
            .with_guessed_format()?
            .decode()?
            .to_rgb8();

        let mut preprocessor = PreProcessor::new(options.image_size);
        let (input, transform) = preprocessor.preprocess(&source)?;

        let output = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            self.backend.lock().infer(&input)?
        };

        let postprocessor = PostProcessor {
            confidence_threshold: options.confidence_threshold,
            iou_threshold: options.iou_threshold,
            max_detections: options.max_detections,
        };
        let detections = postprocessor.parse_detections(&output.view(), &transform)?;

        tracing::debug!(
            detections = detections.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prediction complete"
        );

        let mut prediction = Prediction::new(source, Some(detections), self.renderer.clone());

        if let Some(save_dir) = &options.save_dir {
            self.save_annotated(&mut prediction, image_path, save_dir)?;
        }

        Ok(vec![prediction])
    }

    fn device(&self) -> DeviceBinding {
        self.binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ChannelOrder;
    use crate::class_names::ClassNameTable;
    use image::Rgb;
    use ndarray::{Array, ArrayD, IxDyn};

    /// Backend that returns a single confident box for class 2 in the
    /// middle of the input.
    struct FixedBackend {
        calls: usize,
    }

    impl InferenceBackend for FixedBackend {
        fn infer(&mut self, images: &Array<f32, IxDyn>) -> anyhow::Result<ArrayD<f32>> {
            self.calls += 1;
            let size = images.shape()[3] as f32;
            let mut output = Array::zeros(IxDyn(&[1, 4 + 24, 2]));
            output[[0, 0, 0]] = size / 2.0;
            output[[0, 1, 0]] = size / 2.0;
            output[[0, 2, 0]] = size / 4.0;
            output[[0, 3, 0]] = size / 4.0;
            output[[0, 4 + 2, 0]] = 0.88;
            // Second anchor is below any sensible threshold
            output[[0, 4 + 7, 1]] = 0.1;
            Ok(output)
        }
    }

    fn write_test_image(dir: &Path) -> PathBuf {
        let path = dir.join("sample.png");
        RgbImage::from_pixel(64, 64, Rgb([30, 60, 90]))
            .save(&path)
            .unwrap();
        path
    }

    fn detector() -> YoloDetector<FixedBackend> {
        YoloDetector::new(
            FixedBackend { calls: 0 },
            DeviceBinding::CPU,
            Renderer::new(ChannelOrder::Bgr, ClassNameTable::default()),
        )
    }

    #[test]
    fn test_predict_decodes_and_maps_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path());

        let predictions = detector()
            .predict(&path, &PredictOptions::new(0.5, 64))
            .unwrap();

        assert_eq!(predictions.len(), 1);
        let detections = predictions[0].detections.as_ref().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_index, 2);

        let bbox = detections[0].bbox.unwrap();
        assert!((bbox.x1 - 24.0).abs() < 0.5 && (bbox.x2 - 40.0).abs() < 0.5);
        assert!(predictions[0].artifacts.is_empty());
    }

    #[test]
    fn test_plot_uses_renderer_channel_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path());

        let predictions = detector()
            .predict(&path, &PredictOptions::new(0.5, 64))
            .unwrap();
        let annotated = predictions[0].plot().unwrap();

        assert_eq!(annotated.dim(), (64, 64, 3));
        // Background pixel, BGR
        assert_eq!(annotated[[0, 0, 0]], 90);
        assert_eq!(annotated[[0, 0, 2]], 30);
    }

    #[test]
    fn test_save_dir_records_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path());
        let out_dir = dir.path().join("out");

        let mut options = PredictOptions::new(0.5, 64);
        options.save_dir = Some(out_dir.clone());

        let predictions = detector().predict(&path, &options).unwrap();

        assert_eq!(predictions[0].artifacts, vec![out_dir.join("sample_pred.jpg")]);
        assert!(predictions[0].artifacts[0].is_file());
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = detector().predict(&dir.path().join("nope.png"), &PredictOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_is_reused_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path());
        let detector = detector();

        detector.predict(&path, &PredictOptions::new(0.5, 64)).unwrap();
        detector.predict(&path, &PredictOptions::new(0.5, 64)).unwrap();

        assert_eq!(detector.backend.lock().calls, 2);
    }
}
