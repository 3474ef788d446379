pub mod backend;
pub mod buffer;
pub mod cache;
pub mod class_names;
pub mod config;
pub mod detection;
pub mod detector;
#[cfg(feature = "ort-backend")]
pub mod loader;
pub mod processing;
pub mod render;

// Re-export commonly used types for convenience
pub use backend::{Accelerator, DeviceBinding, DevicePreference, InferenceBackend};
pub use cache::{ModelCache, ModelLoader};
pub use class_names::{ClassNameTable, UNKNOWN_LABEL};
pub use config::LoaderConfig;
pub use detection::{BoundingBox, ChannelOrder, Detection};
pub use detector::{Detector, PredictOptions, Prediction, YoloDetector};
#[cfg(feature = "ort-backend")]
pub use loader::OrtLoader;
pub use render::Renderer;
