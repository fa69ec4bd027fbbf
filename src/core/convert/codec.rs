//! DICOM pixel decoding and PNG naming
//!
//! Decoding is fail-soft: a file that isn't a decodable image comes back as
//! [`DecodeResult::Invalid`] rather than an error, and compressed transfer
//! syntaxes come back as [`DecodeResult::Compressed`] so the caller can route
//! them through the external decompressor. Identifying metadata is dropped on
//! purpose; the PNG keeps only the series description and instance number,
//! coded into its file name.

use crate::domain::{CohortError, Result};
use dicom_dictionary_std::tags;
use dicom_object::{open_file, FileDicomObject, InMemDicomObject};
use dicom_pixeldata::image::DynamicImage;
use dicom_pixeldata::PixelDecoder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transfer syntaxes whose pixel data is stored uncompressed.
const NATIVE_TRANSFER_SYNTAXES: [&str; 3] = [
    "1.2.840.10008.1.2",   // implicit VR little endian
    "1.2.840.10008.1.2.1", // explicit VR little endian
    "1.2.840.10008.1.2.2", // explicit VR big endian
];

/// Outcome of decoding one file.
#[derive(Debug)]
pub enum DecodeResult {
    /// Normalized 8-bit frames, ready for PNG encoding
    Decoded(PixelBuffer),
    /// Pixel data is compressed; try the decompressor
    Compressed,
    /// Not a decodable image
    Invalid,
}

/// Decoded frames plus the two metadata fields that survive into the name.
#[derive(Debug)]
pub struct PixelBuffer {
    pub frames: Vec<DynamicImage>,
    pub series_description: String,
    pub instance_number: i64,
}

impl PixelBuffer {
    pub fn is_multiframe(&self) -> bool {
        self.frames.len() > 1
    }
}

/// Decode a DICOM file into normalized 8-bit frames.
pub fn decode(path: &Path) -> Result<DecodeResult> {
    let obj = match open_file(path) {
        Ok(obj) => obj,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Not a readable DICOM file");
            return Ok(DecodeResult::Invalid);
        }
    };

    let ts = obj.meta().transfer_syntax();
    let ts = ts.trim_end_matches(['\0', ' ']);
    if !NATIVE_TRANSFER_SYNTAXES.contains(&ts) {
        debug!(path = %path.display(), transfer_syntax = ts, "Compressed pixel data");
        return Ok(DecodeResult::Compressed);
    }

    let decoded = match obj.decode_pixel_data() {
        Ok(d) => d,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No decodable pixel data");
            return Ok(DecodeResult::Invalid);
        }
    };

    let mut frames = Vec::with_capacity(decoded.number_of_frames() as usize);
    for frame in 0..decoded.number_of_frames() {
        let img = decoded
            .to_dynamic_image(frame)
            .map_err(|e| CohortError::Decode(e.to_string()))?;
        frames.push(normalize(img));
    }
    if frames.is_empty() {
        return Ok(DecodeResult::Invalid);
    }

    Ok(DecodeResult::Decoded(PixelBuffer {
        frames,
        series_description: string_element(&obj, tags::SERIES_DESCRIPTION)
            .unwrap_or_else(|| "series".to_string()),
        instance_number: string_element(&obj, tags::INSTANCE_NUMBER)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
    }))
}

fn string_element(
    obj: &FileDicomObject<InMemDicomObject>,
    tag: dicom_core::Tag,
) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Linearly stretch pixel intensities to the 8-bit range, per channel.
fn normalize(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma16(buf) => {
            let (min, max) = min_max(buf.iter().copied());
            let out = dicom_pixeldata::image::ImageBuffer::from_fn(
                buf.width(),
                buf.height(),
                |x, y| {
                    dicom_pixeldata::image::Luma([scale(buf.get_pixel(x, y).0[0], min, max)])
                },
            );
            DynamicImage::ImageLuma8(out)
        }
        DynamicImage::ImageLuma8(buf) => {
            let (min, max) = min_max(buf.iter().map(|&v| u16::from(v)));
            let out = dicom_pixeldata::image::ImageBuffer::from_fn(
                buf.width(),
                buf.height(),
                |x, y| {
                    dicom_pixeldata::image::Luma([scale(
                        u16::from(buf.get_pixel(x, y).0[0]),
                        min,
                        max,
                    )])
                },
            );
            DynamicImage::ImageLuma8(out)
        }
        DynamicImage::ImageRgb8(buf) => {
            let mut mins = [u16::MAX; 3];
            let mut maxs = [u16::MIN; 3];
            for pixel in buf.pixels() {
                for c in 0..3 {
                    let v = u16::from(pixel.0[c]);
                    mins[c] = mins[c].min(v);
                    maxs[c] = maxs[c].max(v);
                }
            }
            let out = dicom_pixeldata::image::ImageBuffer::from_fn(
                buf.width(),
                buf.height(),
                |x, y| {
                    let p = buf.get_pixel(x, y);
                    dicom_pixeldata::image::Rgb([
                        scale(u16::from(p.0[0]), mins[0], maxs[0]),
                        scale(u16::from(p.0[1]), mins[1], maxs[1]),
                        scale(u16::from(p.0[2]), mins[2], maxs[2]),
                    ])
                },
            );
            DynamicImage::ImageRgb8(out)
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn min_max(values: impl Iterator<Item = u16>) -> (u16, u16) {
    values.fold((u16::MAX, u16::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn scale(value: u16, min: u16, max: u16) -> u8 {
    // a flat frame has no range to stretch; render it black
    if min == max {
        return 0;
    }
    let span = f64::from(max) - f64::from(min);
    ((f64::from(value) - f64::from(min)) * 255.0 / span) as u8
}

/// Build the base PNG name `<series-description>_<instance:03>`. Whitespace
/// collapses to underscores; `/` and `:` are path- and drive-hostile and get
/// the same treatment.
pub fn png_base_name(series_description: &str, instance_number: i64) -> String {
    let mut name = series_description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    name = name.replace(['/', ':'], "_");
    format!("{name}_{instance_number:03}")
}

/// Name for one frame of a multiframe image.
pub fn png_frame_name(series_description: &str, frame_index: usize) -> String {
    let mut name = series_description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    name = name.replace(['/', ':'], "_");
    format!("{name}_{:03}", frame_index + 1)
}

/// Append `_copy<N>` until the name no longer collides with an existing file.
pub fn collision_free(dir: &Path, base_name: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{base_name}.png"));
    let mut copy = 0;
    let mut name = base_name.to_string();
    while candidate.exists() {
        copy += 1;
        name = format!("{name}_copy{copy}");
        candidate = dir.join(format!("{name}.png"));
    }
    candidate
}
