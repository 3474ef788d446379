use crate::config::{DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS};
use crate::detection::{BoundingBox, Detection};
use ndarray::ArrayViewD;

/// Values needed to undo the letterbox applied during preprocessing.
#[derive(Debug, Clone, Copy)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }

    /// Decode YOLOv8 output `[1, 4 + num_classes, num_anchors]`.
    ///
    /// Rows 0..4 are `cx, cy, w, h` in input pixels, the remaining rows are
    /// per-class scores (already sigmoid-activated by the export).
    #[tracing::instrument(skip(self, output, transform))]
    pub fn parse_detections(
        &self,
        output: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            anyhow::bail!(
                "Unexpected model output shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            );
        }

        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            let mut best_score = f32::NEG_INFINITY;
            let mut class_index = 0usize;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, i]];
                if score > best_score {
                    best_score = score;
                    class_index = c;
                }
            }

            if best_score < self.confidence_threshold {
                continue;
            }

            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];

            let (x1, y1, x2, y2) = cxcywh_to_xyxy(cx, cy, w, h);
            let bbox = unletterbox(x1, y1, x2, y2, transform);

            candidates.push(Detection::new(class_index, best_score).with_box(bbox));
        }

        let kept = non_maximum_suppression(candidates, self.iou_threshold, self.max_detections);

        tracing::trace!(detections = kept.len(), "Parsed detections");
        Ok(kept)
    }
}

/// Class-aware greedy NMS, highest confidence first.
pub fn non_maximum_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len().min(max_detections));

    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }

        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index
                && match (&k.bbox, &candidate.bbox) {
                    (Some(a), Some(b)) => a.iou(b) > iou_threshold,
                    _ => false,
                }
        });

        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}

/// Map input-space corners back to original-image pixels, clamped to bounds.
#[inline]
fn unletterbox(x1: f32, y1: f32, x2: f32, y2: f32, t: &TransformParams) -> BoundingBox {
    let max_x = t.orig_width as f32;
    let max_y = t.orig_height as f32;

    BoundingBox::new(
        ((x1 - t.offset_x) / t.scale).clamp(0.0, max_x),
        ((y1 - t.offset_y) / t.scale).clamp(0.0, max_y),
        ((x2 - t.offset_x) / t.scale).clamp(0.0, max_x),
        ((y2 - t.offset_y) / t.scale).clamp(0.0, max_y),
    )
}
