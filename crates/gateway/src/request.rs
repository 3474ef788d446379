//! Multipart form handling for `POST /predict_yolo`.

use crate::config::Config;
use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::Multipart;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

const MIN_IMAGE_SIZE: i64 = 32;
const MAX_IMAGE_SIZE: i64 = 1920;
const IMAGE_SIZE_STRIDE: i64 = 32;

/// Validated contents of a prediction request.
#[derive(Debug, Clone)]
pub struct PredictForm {
    pub filename: String,
    pub data: Bytes,
    pub model: String,
    pub min_conf: f64,
    pub imgsz: u32,
}

impl PredictForm {
    /// Read every field, then validate the upload.
    pub async fn from_multipart(
        multipart: &mut Multipart,
        defaults: &Config,
    ) -> Result<Self, ApiError> {
        let mut upload: Option<(String, Bytes)> = None;
        let mut model = None;
        let mut min_conf = None;
        let mut imgsz = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Multipart(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" if upload.is_none() => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Multipart(e.to_string()))?;
                    upload = Some((filename, data));
                }
                "model" | "min_conf" | "imgsz" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::Multipart(e.to_string()))?;
                    match name.as_str() {
                        "model" => model = Some(value),
                        "min_conf" => min_conf = Some(value),
                        _ => imgsz = Some(value),
                    }
                }
                other => tracing::debug!(field = other, "Ignoring form field"),
            }
        }

        let (filename, data) = upload.ok_or(ApiError::NoFilePart)?;
        if filename.is_empty() {
            return Err(ApiError::NoSelectedFile);
        }
        if !allowed_file(&filename) {
            return Err(ApiError::InvalidFileType);
        }

        Ok(Self {
            filename,
            data,
            model: model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| defaults.default_model.clone()),
            min_conf: parse_min_conf(min_conf.as_deref(), defaults.default_min_conf),
            imgsz: parse_image_size(imgsz.as_deref(), defaults.default_imgsz),
        })
    }
}

/// Case-insensitive check of the text after the last `.`.
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Strip any directory part and replace characters outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn parse_min_conf(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

pub fn parse_image_size(raw: Option<&str>, default: u32) -> u32 {
    let requested = raw
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default as i64);
    normalize_image_size(requested)
}

/// Round up to the model stride and clamp to a size the letterboxer accepts.
pub fn normalize_image_size(size: i64) -> u32 {
    let clamped = size.clamp(MIN_IMAGE_SIZE, MAX_IMAGE_SIZE);
    let rounded = (clamped + IMAGE_SIZE_STRIDE - 1) / IMAGE_SIZE_STRIDE * IMAGE_SIZE_STRIDE;
    rounded.min(MAX_IMAGE_SIZE) as u32
}
