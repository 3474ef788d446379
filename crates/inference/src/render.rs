use crate::buffer::rgb_image_to_array;
use crate::class_names::ClassNameTable;
use crate::detection::{ChannelOrder, Detection};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use ndarray::Array3;
use std::path::Path;
use std::sync::Arc;

const LINE_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [44, 153, 168],
    [0, 194, 255],
];

/// Draws detections onto a copy of the source image.
#[derive(Clone)]
pub struct Renderer {
    pub channel_order: ChannelOrder,
    names: ClassNameTable,
    font: Option<Arc<FontVec>>,
}

impl Renderer {
    pub fn new(channel_order: ChannelOrder, names: ClassNameTable) -> Self {
        Self {
            channel_order,
            names,
            font: None,
        }
    }

    /// Enable `"{label} {confidence}"` captions using a TrueType/OpenType font.
    pub fn with_font_file(mut self, path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("Invalid font {}: {}", path.display(), e))?;
        self.font = Some(Arc::new(font));
        Ok(self)
    }

    /// Render as an H×W×3 array in [`Self::channel_order`].
    pub fn render(&self, source: &RgbImage, detections: &[Detection]) -> anyhow::Result<Array3<u8>> {
        let mut canvas = source.clone();

        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }

        rgb_image_to_array(&canvas, self.channel_order)
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let Some(bbox) = detection.bbox else {
            return;
        };

        let x1 = bbox.x1.round() as i32;
        let y1 = bbox.y1.round() as i32;
        let w = bbox.width().round() as i32;
        let h = bbox.height().round() as i32;
        if w <= 0 || h <= 0 {
            return;
        }

        let color = Rgb(PALETTE[detection.class_index % PALETTE.len()]);

        for t in 0..LINE_THICKNESS {
            let (tw, th) = (w - 2 * t, h - 2 * t);
            if tw <= 0 || th <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(tw as u32, th as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }

        if let Some(font) = &self.font {
            let caption = format!(
                "{} {:.2}",
                self.names.label(detection.class_index),
                detection.confidence
            );
            let scale = PxScale::from(LABEL_SCALE);
            let (text_w, text_h) = text_size(scale, font.as_ref(), &caption);
            let label_y = (y1 - text_h as i32 - 2).max(0);

            draw_filled_rect_mut(
                canvas,
                Rect::at(x1, label_y).of_size(text_w + 4, text_h + 2),
                color,
            );
            draw_text_mut(
                canvas,
                LABEL_TEXT_COLOR,
                x1 + 2,
                label_y,
                scale,
                font.as_ref(),
                &caption,
            );
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(ChannelOrder::Rgb, ClassNameTable::default())
    }
}
