use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageError, RgbaImage};

use crate::error::ExportError;

const JPEG_QUALITY: u8 = 92;

/// Export formats for [`encode_data_url`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImageType {
    #[default]
    Png,
    Jpeg,
    Bmp,
}

impl ImageType {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpeg => "image/jpeg",
            ImageType::Bmp => "image/bmp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Png => "png",
            ImageType::Jpeg => "jpg",
            ImageType::Bmp => "bmp",
        }
    }

    /// Look up a format by MIME type or file extension, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Some(ImageType::Png),
            "jpg" | "jpeg" | "image/jpeg" => Some(ImageType::Jpeg),
            "bmp" | "image/bmp" => Some(ImageType::Bmp),
            _ => None,
        }
    }
}

/// Encode `image` into an in-memory file of the given type.
pub fn encode_image(image: &RgbaImage, format: ImageType) -> Result<Vec<u8>, ImageError> {
    let mut buf: Vec<u8> = Vec::new();
    match format {
        ImageType::Png => {
            let encoder = PngEncoder::new(&mut buf);
            #[allow(deprecated)]
            encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
        }
        ImageType::Jpeg => {
            // JPEG has no alpha channel.
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            encoder.encode(rgb_image.as_raw(), rgb_image.width(), rgb_image.height(), image::ColorType::Rgb8)?;
        }
        ImageType::Bmp => {
            let mut encoder = BmpEncoder::new(&mut buf);
            encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
        }
    }
    Ok(buf)
}

/// `data:<mime>;base64,<payload>` for `image`.
pub fn encode_data_url(image: &RgbaImage, format: ImageType) -> Result<String, ExportError> {
    let bytes = encode_image(image, format)?;
    Ok(format!("data:{};base64,{}", format.mime(), BASE64.encode(bytes)))
}
