use crate::backend::DevicePreference;
use crate::detection::ChannelOrder;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_IMAGE_SIZE: u32 = 640;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

/// Settings shared by every model the loader produces.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub models_dir: PathBuf,
    pub device: DevicePreference,
    pub intra_threads: usize,
    pub label_font_path: Option<PathBuf>,
    /// Channel order of the annotated image produced by `Prediction::plot`.
    pub render_order: ChannelOrder,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            device: DevicePreference::Auto,
            intra_threads: 4,
            label_font_path: None,
            render_order: ChannelOrder::Rgb,
        }
    }
}

/// Resolve a model key to a file under `models_dir`.
///
/// Keys must be relative and may not contain `..`.
pub fn resolve_model_path(models_dir: &Path, key: &str) -> anyhow::Result<PathBuf> {
    if key.trim().is_empty() {
        anyhow::bail!("Model key must not be empty");
    }

    let relative = Path::new(key);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        anyhow::bail!("Model key '{}' must be a path inside the models directory", key);
    }

    Ok(models_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_render_order_is_rgb() {
        assert_eq!(LoaderConfig::default().render_order, ChannelOrder::Rgb);
    }

    #[test]
    fn test_resolve_plain_key() {
        let path = resolve_model_path(Path::new("/srv/models"), "lostfound.onnx").unwrap();
        assert_eq!(path, PathBuf::from("/srv/models/lostfound.onnx"));
    }

    #[test]
    fn test_resolve_nested_key() {
        let path = resolve_model_path(Path::new("models"), "v2/best.onnx").unwrap();
        assert_eq!(path, PathBuf::from("models/v2/best.onnx"));
    }

    #[test]
    fn test_resolve_rejects_escaping_keys() {
        let dir = Path::new("models");
        assert!(resolve_model_path(dir, "../secret.onnx").is_err());
        assert!(resolve_model_path(dir, "/etc/passwd").is_err());
        assert!(resolve_model_path(dir, "a/../../b.onnx").is_err());
        assert!(resolve_model_path(dir, "  ").is_err());
    }
}
