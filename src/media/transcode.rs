use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, warn};

use super::model::{CapturedMedia, MediaKind};
use super::MediaError;

#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64 of the JPEG bytes, no data-URI prefix.
    pub base64: String,
    pub byte_len: usize,
}

/// Re-encodes `media` as JPEG at `quality` (clamped to 1..=100), even when the
/// source already is a JPEG.
pub async fn encode(media: &CapturedMedia, quality: u8) -> Result<EncodedImage, MediaError> {
    if media.kind != MediaKind::Image {
        warn!(uri = %media.uri, kind = ?media.kind, "refusing to encode non-image media");
        return Err(MediaError::UnsupportedMedia(media.kind));
    }

    let source = load_bytes(media).await?;
    let quality = quality.clamp(1, 100);
    let source_len = source.len();

    let jpeg = tokio::task::spawn_blocking(move || to_jpeg(&source, quality))
        .await
        .map_err(|e| MediaError::Encoding(format!("encoder task failed: {e}")))??;

    debug!(
        uri = %media.uri,
        source_len,
        jpeg_len = jpeg.len(),
        quality,
        "image transcoded"
    );
    Ok(EncodedImage {
        base64: STANDARD.encode(&jpeg),
        byte_len: jpeg.len(),
    })
}

async fn load_bytes(media: &CapturedMedia) -> Result<Bytes, MediaError> {
    if let Some(bytes) = &media.bytes {
        return Ok(bytes.clone());
    }
    let path = media
        .local_path()
        .ok_or_else(|| MediaError::Encoding(format!("unreadable media uri {}", media.uri)))?;
    tokio::fs::read(&path)
        .await
        .map(Bytes::from)
        .map_err(|e| MediaError::Encoding(format!("read {}: {e}", path.display())))
}

fn to_jpeg(source: &[u8], quality: u8) -> Result<Vec<u8>, MediaError> {
    let decoded = image::load_from_memory(source)
        .map_err(|e| MediaError::Encoding(format!("decode: {e}")))?;
    // JPEG has no alpha channel.
    let rgb = decoded.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| MediaError::Encoding(format!("encode: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) fn sample_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(8, 8, |x, y| {
        image::Rgba([(x * 30) as u8, (y * 30) as u8, 90, if x < 4 { 255 } else { 40 }])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("png encode");
    out.into_inner()
}
