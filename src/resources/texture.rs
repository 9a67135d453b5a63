use std::path::Path;

use anyhow::Context as _;
use image::{ImageFormat, load_from_memory_with_format};

use crate::data_structures::texture::TextureData;

pub async fn load_binary(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

/// Decode image file contents into RGBA8.
///
/// `format` is an optional extension hint ("png", "jpg"); without it the
/// format is guessed from the bytes.
pub fn decode_image(bytes: &[u8], label: &str, format: Option<&str>) -> anyhow::Result<TextureData> {
    let img = match format.and_then(ImageFormat::from_extension) {
        None => image::load_from_memory(bytes)?,
        Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
    };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    TextureData::new(label, width, height, rgba.into_raw())
}

pub async fn load_texture(path: &Path) -> anyhow::Result<TextureData> {
    let data = load_binary(path).await?;
    let label = path.display().to_string();
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    // decoding large images is CPU bound, keep it off the async workers
    tokio::task::spawn_blocking(move || decode_image(&data, &label, format.as_deref()))
        .await
        .context("image decoder task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_with_hint() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let data = decode_image(&png, "test", Some("png")).unwrap();
        assert_eq!((data.width, data.height), (2, 3));
        assert_eq!(&data.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_image(&[1, 2, 3], "junk", None).is_err());
    }
}
