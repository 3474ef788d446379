//! Builds the `POST /predict_yolo` success payload.

use crate::error::ApiError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use inference::buffer::{array_to_rgb_image, to_contiguous_bytes};
use inference::{ChannelOrder, ClassNameTable, Detection};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

pub const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEntry {
    pub classname: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Base64 JPEG of the annotated image; empty if encoding failed.
    pub image: String,
    pub detections: Vec<DetectionEntry>,
}

pub fn round_confidence(confidence: f32) -> f64 {
    (f64::from(confidence) * 100.0).round() / 100.0
}

/// Keep detections at or above `threshold`, named and rounded, in input order.
pub fn filter_detections(
    detections: &[Detection],
    threshold: f64,
    names: &ClassNameTable,
) -> Result<Vec<DetectionEntry>, ApiError> {
    let mut entries = Vec::with_capacity(detections.len());

    for detection in detections {
        if !detection.confidence.is_finite() {
            return Err(ApiError::ResultParsing(format!(
                "non-finite confidence for class {}",
                detection.class_index
            )));
        }
        if f64::from(detection.confidence) < threshold {
            continue;
        }

        entries.push(DetectionEntry {
            classname: names.label(detection.class_index).to_string(),
            confidence: round_confidence(detection.confidence),
        });
    }

    Ok(entries)
}

/// JPEG through the `image` encoder. Expects three channels stored in `order`.
pub fn encode_jpeg(image: &Array3<u8>, order: ChannelOrder) -> anyhow::Result<Vec<u8>> {
    let rgb = array_to_rgb_image(image, order)?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;

    Ok(jpeg)
}

/// JPEG through libjpeg-turbo, reading the buffer in its own channel order.
pub fn encode_jpeg_turbo(image: &Array3<u8>, order: ChannelOrder) -> anyhow::Result<Vec<u8>> {
    let (height, width, channels) = image.dim();

    let (format, subsamp) = match (channels, order) {
        (1, _) => (turbojpeg::PixelFormat::GRAY, turbojpeg::Subsamp::Gray),
        (3, ChannelOrder::Rgb) => (turbojpeg::PixelFormat::RGB, turbojpeg::Subsamp::Sub2x2),
        (3, ChannelOrder::Bgr) => (turbojpeg::PixelFormat::BGR, turbojpeg::Subsamp::Sub2x2),
        (4, ChannelOrder::Rgb) => (turbojpeg::PixelFormat::RGBA, turbojpeg::Subsamp::Sub2x2),
        (4, ChannelOrder::Bgr) => (turbojpeg::PixelFormat::BGRA, turbojpeg::Subsamp::Sub2x2),
        (other, _) => anyhow::bail!("Cannot encode {}-channel image", other),
    };

    let pixels = to_contiguous_bytes(image);
    let turbo_image = turbojpeg::Image {
        pixels: pixels.as_slice(),
        width,
        pitch: width * channels,
        height,
        format,
    };

    let jpeg = turbojpeg::compress(turbo_image, i32::from(JPEG_QUALITY), subsamp)?;
    Ok(jpeg.to_vec())
}

/// Base64 JPEG, or an empty string if every encoder fails.
pub fn encode_annotated(image: &Array3<u8>, order: ChannelOrder) -> String {
    let jpeg = encode_jpeg(image, order).or_else(|e| {
        tracing::warn!(error = %e, "Primary JPEG encoding failed, trying libjpeg-turbo");
        encode_jpeg_turbo(image, order)
    });

    match jpeg {
        Ok(bytes) => STANDARD.encode(bytes),
        Err(e) => {
            tracing::error!(error = %e, "Fallback JPEG encoding failed");
            String::new()
        }
    }
}

/// Assemble the response body. A missing annotated image yields an empty
/// `image`; detections are unaffected by encoding.
pub fn assemble(
    detections: &[Detection],
    threshold: f64,
    annotated: Option<&Array3<u8>>,
    order: ChannelOrder,
    names: &ClassNameTable,
) -> Result<PredictResponse, ApiError> {
    let detections = filter_detections(detections, threshold, names)?;
    let image = annotated
        .map(|image| encode_annotated(image, order))
        .unwrap_or_default();

    Ok(PredictResponse { image, detections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference::UNKNOWN_LABEL;

    fn names() -> ClassNameTable {
        ClassNameTable::LOST_AND_FOUND
    }

    fn sample_image() -> Array3<u8> {
        Array3::from_shape_fn((32, 48, 3), |(y, x, c)| ((x * 5 + y * 3 + c * 40) % 256) as u8)
    }

    fn decode_base64_jpeg(encoded: &str) -> image::RgbImage {
        let bytes = STANDARD.decode(encoded).unwrap();
        image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8()
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.876), 0.88);
        assert_eq!(round_confidence(0.6), 0.6);
        assert_eq!(round_confidence(1.0), 1.0);
        assert_eq!(round_confidence(0.004), 0.0);
    }

    #[test]
    fn test_filter_keeps_only_confident_detections_in_order() {
        let detections = vec![
            Detection::new(16, 0.91),
            Detection::new(9, 0.59),
            Detection::new(23, 0.6),
            Detection::new(99, 0.75),
        ];

        let entries = filter_detections(&detections, 0.6, &names()).unwrap();

        assert_eq!(
            entries,
            vec![
                DetectionEntry { classname: "Wallet".into(), confidence: 0.91 },
                DetectionEntry { classname: "Watch".into(), confidence: 0.6 },
                DetectionEntry { classname: UNKNOWN_LABEL.into(), confidence: 0.75 },
            ]
        );
    }

    #[test]
    fn test_threshold_compares_at_double_precision() {
        // Rounds to 0.6f32 but sits above the widened 0.6f32 confidence
        let threshold = 0.600_000_03_f64;
        assert_eq!(threshold as f32, 0.6f32);

        let detections = [Detection::new(16, 0.6)];
        assert!(filter_detections(&detections, threshold, &names()).unwrap().is_empty());
        assert_eq!(filter_detections(&detections, 0.6, &names()).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_wallet_index_maps_to_same_name() {
        let entries =
            filter_detections(&[Detection::new(22, 0.8)], 0.5, &names()).unwrap();
        assert_eq!(entries[0].classname, "Wallet");
    }

    #[test]
    fn test_non_finite_confidence_is_a_parse_error() {
        let result = filter_detections(&[Detection::new(1, f32::NAN)], 0.5, &names());
        assert!(matches!(result, Err(ApiError::ResultParsing(_))));
    }

    #[test]
    fn test_primary_encoding_is_rgb_jpeg() {
        let mut image = Array3::zeros((16, 16, 3));
        image.slice_mut(ndarray::s![.., .., 0]).fill(220u8);

        let encoded = encode_annotated(&image, ChannelOrder::Rgb);
        let decoded = decode_base64_jpeg(&encoded);

        assert_eq!(decoded.dimensions(), (16, 16));
        let pixel = decoded.get_pixel(8, 8);
        assert!(pixel[0] > 180 && pixel[2] < 40, "Expected red, got {:?}", pixel);
    }

    #[test]
    fn test_bgr_buffer_is_converted_before_encoding() {
        let mut image = Array3::zeros((16, 16, 3));
        // Blue in BGR storage is channel 0
        image.slice_mut(ndarray::s![.., .., 0]).fill(220u8);

        let decoded = decode_base64_jpeg(&encode_annotated(&image, ChannelOrder::Bgr));
        let pixel = decoded.get_pixel(8, 8);
        assert!(pixel[2] > 180 && pixel[0] < 40, "Expected blue, got {:?}", pixel);
    }

    #[test]
    fn test_turbo_fallback_encodes_four_channels() {
        let image = Array3::from_elem((8, 8, 4), 128u8);
        assert!(encode_jpeg(&image, ChannelOrder::Rgb).is_err());
        assert!(!encode_annotated(&image, ChannelOrder::Rgb).is_empty());
    }

    #[test]
    fn test_unencodable_image_yields_empty_string() {
        let image = Array3::from_elem((8, 8, 2), 128u8);
        assert_eq!(encode_annotated(&image, ChannelOrder::Rgb), "");
    }

    #[test]
    fn test_encoding_failure_keeps_detections() {
        let broken = Array3::from_elem((4, 4, 2), 0u8);
        let detections = vec![Detection::new(0, 0.9), Detection::new(1, 0.1)];

        let response =
            assemble(&detections, 0.5, Some(&broken), ChannelOrder::Rgb, &names()).unwrap();

        assert!(response.image.is_empty());
        assert_eq!(response.detections.len(), 1);
        assert_eq!(response.detections[0].classname, "Airpods");
    }

    #[test]
    fn test_assemble_with_image() {
        let response = assemble(
            &[Detection::new(10, 0.777)],
            0.25,
            Some(&sample_image()),
            ChannelOrder::Rgb,
            &names(),
        )
        .unwrap();

        assert!(!response.image.is_empty());
        assert_eq!(
            response.detections,
            vec![DetectionEntry { classname: "Laptop".into(), confidence: 0.78 }]
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["image"].is_string());
        assert_eq!(json["detections"][0]["classname"], "Laptop");
    }

    #[test]
    fn test_assemble_without_annotated_image() {
        let response =
            assemble(&[Detection::new(3, 0.9)], 0.5, None, ChannelOrder::Bgr, &names()).unwrap();
        assert_eq!(response.image, "");
        assert_eq!(response.detections[0].classname, "Cap");
    }
}
