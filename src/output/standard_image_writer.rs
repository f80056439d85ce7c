use std::io::Write;

use image::codecs::png::PngEncoder;
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use tracing::debug;

use crate::camera::types::{Frame, ImageFormat};
use crate::common::error::{DarkFrameError, Result};
use crate::output::types::{ChromaSubsampling, OutputFormat, OutputOptions, TiffCompression};
use crate::output::writer::ImageWriter;

pub struct StandardImageWriter;

fn to_u8(data: &[u16], shift: u32) -> Vec<u8> {
    data.iter()
        .map(|&v| u8::try_from(v >> shift).unwrap_or(u8::MAX))
        .collect()
}

fn encode_error(e: impl std::fmt::Display) -> DarkFrameError {
    DarkFrameError::EncodeError(e.to_string())
}

impl StandardImageWriter {
    fn write_png(&self, image: &Frame, output: &mut dyn Write) -> Result<()> {
        let (width, height) = (image.width as u32, image.height as u32);
        let encoder = PngEncoder::new(output);
        match image.format {
            ImageFormat::Raw16 => {
                let buffer = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, image.data.clone())
                    .ok_or(DarkFrameError::InvalidDimensions(image.width, image.height))?;
                buffer.write_with_encoder(encoder).map_err(encode_error)
            }
            ImageFormat::Rgb24 => {
                let buffer = RgbImage::from_raw(width, height, to_u8(&image.data, 0))
                    .ok_or(DarkFrameError::InvalidDimensions(image.width, image.height))?;
                buffer.write_with_encoder(encoder).map_err(encode_error)
            }
            ImageFormat::Raw8 | ImageFormat::Y8 => {
                let buffer = GrayImage::from_raw(width, height, to_u8(&image.data, 0))
                    .ok_or(DarkFrameError::InvalidDimensions(image.width, image.height))?;
                buffer.write_with_encoder(encoder).map_err(encode_error)
            }
        }
    }

    fn write_jpeg(&self, image: &Frame, output: &mut dyn Write, options: &OutputOptions) -> Result<()> {
        let invalid = || DarkFrameError::InvalidDimensions(image.width, image.height);
        let width = u16::try_from(image.width).map_err(|_| invalid())?;
        let height = u16::try_from(image.height).map_err(|_| invalid())?;
        // JPEG has no 16-bit mode, keep the high byte.
        let shift = if image.format == ImageFormat::Raw16 { 8 } else { 0 };
        let samples = to_u8(&image.data, shift);

        let mut encoder = jpeg_encoder::Encoder::new(output, options.quality);
        encoder.set_sampling_factor(match options.chroma_subsampling() {
            ChromaSubsampling::Yuv444 => jpeg_encoder::SamplingFactor::F_1_1,
            ChromaSubsampling::Yuv422 => jpeg_encoder::SamplingFactor::F_2_1,
            ChromaSubsampling::Yuv420 => jpeg_encoder::SamplingFactor::F_2_2,
        });
        let color = if image.format == ImageFormat::Rgb24 {
            jpeg_encoder::ColorType::Rgb
        } else {
            jpeg_encoder::ColorType::Luma
        };
        encoder.encode(&samples, width, height, color).map_err(encode_error)
    }

    fn write_tiff(&self, image: &Frame, output: &mut dyn Write, compression: TiffCompression) -> Result<()> {
        let mut buffer = Vec::new();

        let compression = match compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Balanced),
            TiffCompression::DeflateBest => tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Best),
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(encode_error)?
            .with_compression(compression);

        let (width, height) = (image.width as u32, image.height as u32);
        match image.format {
            ImageFormat::Raw16 => encoder
                .write_image::<tiff::encoder::colortype::Gray16>(width, height, &image.data)
                .map_err(encode_error)?,
            ImageFormat::Rgb24 => encoder
                .write_image::<tiff::encoder::colortype::RGB8>(width, height, &to_u8(&image.data, 0))
                .map_err(encode_error)?,
            ImageFormat::Raw8 | ImageFormat::Y8 => encoder
                .write_image::<tiff::encoder::colortype::Gray8>(width, height, &to_u8(&image.data, 0))
                .map_err(encode_error)?,
        }

        output.write_all(&buffer)?;
        Ok(())
    }
}

impl ImageWriter for StandardImageWriter {
    fn write_image(
        &self,
        image: &Frame,
        format: OutputFormat,
        output: &mut dyn Write,
        options: &OutputOptions,
    ) -> Result<()> {
        debug!("Encoding {:?} image: {}x{} as {:?}", image.format, image.width, image.height, format);

        if image.width == 0 || image.height == 0 || image.data.len() != image.sample_count() {
            return Err(DarkFrameError::InvalidDimensions(image.width, image.height));
        }

        match format {
            OutputFormat::Png => self.write_png(image, output)?,
            OutputFormat::Jpeg => self.write_jpeg(image, output, options)?,
            OutputFormat::Tiff => self.write_tiff(image, output, options.tiff_compression)?,
        }

        debug!("Encoding complete");
        Ok(())
    }
}
