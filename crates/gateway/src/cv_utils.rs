//! Channel-order reconciliation between an upload and its annotated render.
//!
//! The detector may hand back its annotated image with the colour channels
//! reversed relative to the decoded upload. Comparing per-channel means of
//! the two images (and of the annotated image with its channels reversed)
//! tells us which way round it is.

use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use inference::ChannelOrder;
use inference::buffer::{reverse_channels, to_contiguous_bytes};
use ndarray::Array3;
use thiserror::Error;

/// Channel order produced by [`decode_original`].
pub const CANONICAL_ORDER: ChannelOrder = ChannelOrder::Rgb;

/// Either comparison must win by more than this to be conclusive.
pub const FLIP_MARGIN: f64 = 1e-6;

/// How the annotated image's channel means line up with the original's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMatch {
    Direct,
    Reversed,
    /// Reversal makes no measurable difference, e.g. red/blue symmetric content.
    Ambiguous,
}

#[derive(Error, Debug)]
pub enum CvUtilsError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Channel count mismatch: original has {original}, annotated has {annotated}")]
    ChannelMismatch { original: usize, annotated: usize },
    #[error("Unsupported channel count for resampling: {0}")]
    UnsupportedChannels(usize),
    #[error("Resample buffer error: {0}")]
    Buffer(#[from] fast_image_resize::ImageBufferError),
    #[error("Resample error: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Outcome of [`reconcile_channels`].
#[derive(Debug)]
pub struct Reconciliation {
    pub flipped: bool,
    pub image: Array3<u8>,
    /// Channel order of `image`.
    pub order: ChannelOrder,
}

/// Decode uploaded bytes into an H×W×3 array in [`CANONICAL_ORDER`].
pub fn decode_original(bytes: &[u8]) -> Result<Array3<u8>, CvUtilsError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(CvUtilsError::EmptyImage);
    }
    Ok(Array3::from_shape_vec(
        (height as usize, width as usize, 3),
        rgb.into_raw(),
    )?)
}

pub fn channel_means(image: &Array3<u8>) -> Result<Vec<f64>, CvUtilsError> {
    let (height, width, channels) = image.dim();
    let pixels = height * width;
    if pixels == 0 || channels == 0 {
        return Err(CvUtilsError::EmptyImage);
    }

    let mut sums = vec![0u64; channels];
    for ((_, _, c), &value) in image.indexed_iter() {
        sums[c] += u64::from(value);
    }

    Ok(sums.into_iter().map(|s| s as f64 / pixels as f64).collect())
}

/// Area-averaging resample to `width`×`height`.
pub fn resample_area(
    image: &Array3<u8>,
    width: usize,
    height: usize,
) -> Result<Array3<u8>, CvUtilsError> {
    let (src_height, src_width, channels) = image.dim();
    let pixel_type = match channels {
        1 => PixelType::U8,
        3 => PixelType::U8x3,
        4 => PixelType::U8x4,
        other => return Err(CvUtilsError::UnsupportedChannels(other)),
    };
    if src_height == 0 || src_width == 0 || width == 0 || height == 0 {
        return Err(CvUtilsError::EmptyImage);
    }

    let bytes = to_contiguous_bytes(image);
    let src = ImageRef::new(src_width as u32, src_height as u32, &bytes, pixel_type)?;
    let mut dst = Image::new(width as u32, height as u32, pixel_type);

    Resizer::new().resize(
        &src,
        &mut dst,
        &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box)),
    )?;

    Ok(Array3::from_shape_vec((height, width, channels), dst.buffer().to_vec())?)
}

fn distance(a: &[f64], b: impl Iterator<Item = f64>) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Compare `annotated` against `original` as received and channel-reversed.
pub fn compare_channels(
    original: &Array3<u8>,
    annotated: &Array3<u8>,
) -> Result<ChannelMatch, CvUtilsError> {
    let (orig_h, orig_w, orig_c) = original.dim();
    let (ann_h, ann_w, ann_c) = annotated.dim();
    if orig_c != ann_c {
        return Err(CvUtilsError::ChannelMismatch {
            original: orig_c,
            annotated: ann_c,
        });
    }

    let resampled;
    let original = if (orig_h, orig_w) != (ann_h, ann_w) {
        resampled = resample_area(original, ann_w, ann_h)?;
        &resampled
    } else {
        original
    };

    let orig_means = channel_means(original)?;
    let ann_means = channel_means(annotated)?;

    let dist_no_flip = distance(&orig_means, ann_means.iter().copied());
    let dist_flip = distance(&orig_means, ann_means.iter().rev().copied());

    tracing::trace!(dist_no_flip, dist_flip, "Channel mean distances");

    Ok(if dist_flip + FLIP_MARGIN < dist_no_flip {
        ChannelMatch::Reversed
    } else if dist_no_flip + FLIP_MARGIN < dist_flip {
        ChannelMatch::Direct
    } else {
        ChannelMatch::Ambiguous
    })
}

/// Whether `annotated` looks channel-reversed relative to `original`.
pub fn should_flip(original: &Array3<u8>, annotated: &Array3<u8>) -> Result<bool, CvUtilsError> {
    Ok(compare_channels(original, annotated)? == ChannelMatch::Reversed)
}

/// Bring `annotated` into `original`'s channel order when it appears reversed.
///
/// An inconclusive comparison or any failure leaves `annotated` untouched and
/// reports `declared` as its order.
pub fn reconcile_channels(
    original: &Array3<u8>,
    annotated: Array3<u8>,
    declared: ChannelOrder,
) -> Reconciliation {
    match compare_channels(original, &annotated) {
        Ok(ChannelMatch::Reversed) => {
            tracing::debug!("Annotated image channels reversed; flipping");
            Reconciliation {
                flipped: true,
                image: reverse_channels(&annotated),
                order: CANONICAL_ORDER,
            }
        }
        Ok(ChannelMatch::Direct) => Reconciliation {
            flipped: false,
            image: annotated,
            order: CANONICAL_ORDER,
        },
        Ok(ChannelMatch::Ambiguous) => Reconciliation {
            flipped: false,
            image: annotated,
            order: declared,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Original/annotated comparison failed");
            Reconciliation {
                flipped: false,
                image: annotated,
                order: declared,
            }
        }
    }
}

/// [`reconcile_channels`] against the raw upload bytes.
pub fn reconcile_upload(
    upload: &[u8],
    annotated: Array3<u8>,
    declared: ChannelOrder,
) -> Reconciliation {
    match decode_original(upload) {
        Ok(original) => reconcile_channels(&original, annotated, declared),
        Err(e) => {
            tracing::warn!(error = %e, "Could not decode original for channel comparison");
            Reconciliation {
                flipped: false,
                image: annotated,
                order: declared,
            }
        }
    }
}
