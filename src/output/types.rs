//! Output encoding configuration types

use std::path::Path;

use crate::common::error::{DarkFrameError, Result};

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - balanced
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

/// JPEG chroma subsampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChromaSubsampling {
    /// Full chroma resolution
    #[value(name = "444")]
    Yuv444,
    /// Chroma halved horizontally
    #[value(name = "422")]
    Yuv422,
    /// Chroma halved in both directions
    #[value(name = "420")]
    Yuv420,
}

impl ChromaSubsampling {
    /// Subsampling used when none is requested: full chroma only at maximum quality.
    pub fn for_quality(quality: u8) -> Self {
        if quality >= 100 {
            ChromaSubsampling::Yuv444
        } else {
            ChromaSubsampling::Yuv422
        }
    }
}

/// Encoder selected from the output file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    Tiff,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("png") => Ok(OutputFormat::Png),
            Some("jpg") | Some("jpeg") => Ok(OutputFormat::Jpeg),
            Some("tif") | Some("tiff") => Ok(OutputFormat::Tiff),
            _ => Err(DarkFrameError::UnsupportedFormat(format!(
                "cannot pick an encoder for '{}', use .png, .jpg or .tiff",
                path.display()
            ))),
        }
    }
}

/// Configuration for writing stacked frames
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// JPEG quality, 1-100
    pub quality: u8,
    /// JPEG chroma subsampling, derived from `quality` when unset
    pub subsampling: Option<ChromaSubsampling>,
    /// Compression method for TIFF output
    pub tiff_compression: TiffCompression,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            quality: 100,
            subsampling: None,
            tiff_compression: TiffCompression::None,
        }
    }
}

impl OutputOptions {
    pub fn builder() -> OutputOptionsBuilder {
        OutputOptionsBuilder::default()
    }

    pub fn chroma_subsampling(&self) -> ChromaSubsampling {
        self.subsampling
            .unwrap_or_else(|| ChromaSubsampling::for_quality(self.quality))
    }
}

/// Builder for OutputOptions
#[derive(Default)]
pub struct OutputOptionsBuilder {
    quality: Option<u8>,
    subsampling: Option<ChromaSubsampling>,
    tiff_compression: Option<TiffCompression>,
}

impl OutputOptionsBuilder {
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn subsampling(mut self, subsampling: ChromaSubsampling) -> Self {
        self.subsampling = Some(subsampling);
        self
    }

    pub fn tiff_compression(mut self, compression: TiffCompression) -> Self {
        self.tiff_compression = Some(compression);
        self
    }

    pub fn build(self) -> OutputOptions {
        let default = OutputOptions::default();
        OutputOptions {
            quality: self.quality.unwrap_or(default.quality).clamp(1, 100),
            subsampling: self.subsampling,
            tiff_compression: self.tiff_compression.unwrap_or(default.tiff_compression),
        }
    }
}
