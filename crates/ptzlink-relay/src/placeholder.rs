use bytes::Bytes;
use image::{Rgb, RgbImage};
use ptzlink_core::SourceError;

/// Dark grey, so a missing feed is visibly different from a black scene.
const FILL: Rgb<u8> = Rgb([24, 24, 24]);

/// Encode a blank `width`×`height` JPEG shown while no live frame exists.
pub fn blank_jpeg(width: u32, height: u32, quality: u8) -> Result<Bytes, SourceError> {
    let img = RgbImage::from_pixel(width.max(1), height.max(1), FILL);

    let mut jpeg_bytes = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, quality.clamp(1, 100));
    encoder
        .encode_image(&img)
        .map_err(|e| SourceError::Pipeline(format!("placeholder encode: {e}")))?;

    Ok(Bytes::from(jpeg_bytes))
}
