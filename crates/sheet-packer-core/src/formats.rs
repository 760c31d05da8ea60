//! GPU families, pixel/image formats and the compatibility tables that tie them
//! together.
//!
//! The tables live behind [`FormatCatalog`] so callers can swap in their own
//! engine's rules; [`StandardCatalog`] ships the defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target GPU families. `Origin` is the uncompressed RGBA8888/PNG target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GpuFamily {
    #[serde(rename = "PowerVR_iOS")]
    PowerVrIos,
    #[serde(rename = "PowerVR_Android")]
    PowerVrAndroid,
    #[serde(rename = "tegra")]
    Tegra,
    #[serde(rename = "mali")]
    Mali,
    #[serde(rename = "adreno")]
    Adreno,
    #[serde(rename = "dx11")]
    Dx11,
    #[serde(rename = "origin")]
    Origin,
}

impl GpuFamily {
    pub const ALL: [GpuFamily; 7] = [
        GpuFamily::PowerVrIos,
        GpuFamily::PowerVrAndroid,
        GpuFamily::Tegra,
        GpuFamily::Mali,
        GpuFamily::Adreno,
        GpuFamily::Dx11,
        GpuFamily::Origin,
    ];

    /// Every family, in declaration order.
    pub fn all() -> Vec<GpuFamily> {
        Self::ALL.to_vec()
    }

    pub fn name(&self) -> &'static str {
        match self {
            GpuFamily::PowerVrIos => "PowerVR_iOS",
            GpuFamily::PowerVrAndroid => "PowerVR_Android",
            GpuFamily::Tegra => "tegra",
            GpuFamily::Mali => "mali",
            GpuFamily::Adreno => "adreno",
            GpuFamily::Dx11 => "dx11",
            GpuFamily::Origin => "origin",
        }
    }

    /// Command-line flag that carries this family's format tokens.
    pub fn flag(&self) -> String {
        format!("--{}", self.name())
    }

    /// True for real device targets (everything but `Origin`).
    pub fn is_device(&self) -> bool {
        !matches!(self, GpuFamily::Origin)
    }
}

impl fmt::Display for GpuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GpuFamily {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches("--");
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types)]
pub enum PixelFormat {
    RGBA8888,
    RGBA5551,
    RGBA4444,
    RGB888,
    RGB565,
    A8,
    PVR4,
    PVR2,
    DXT1,
    DXT1A,
    DXT3,
    DXT5,
    DXT5NM,
    ETC1,
    ATC_RGB,
    ATC_RGBA_EXPLICIT_ALPHA,
    ATC_RGBA_INTERPOLATED_ALPHA,
    PVR2_2,
    PVR4_2,
    EAC_R11,
    EAC_R11_SIGNED,
    EAC_RG11,
    EAC_RG11_SIGNED,
    ETC2_RGB,
    ETC2_RGBA,
    ETC2_RGB_A1,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 26] = [
        PixelFormat::RGBA8888,
        PixelFormat::RGBA5551,
        PixelFormat::RGBA4444,
        PixelFormat::RGB888,
        PixelFormat::RGB565,
        PixelFormat::A8,
        PixelFormat::PVR4,
        PixelFormat::PVR2,
        PixelFormat::DXT1,
        PixelFormat::DXT1A,
        PixelFormat::DXT3,
        PixelFormat::DXT5,
        PixelFormat::DXT5NM,
        PixelFormat::ETC1,
        PixelFormat::ATC_RGB,
        PixelFormat::ATC_RGBA_EXPLICIT_ALPHA,
        PixelFormat::ATC_RGBA_INTERPOLATED_ALPHA,
        PixelFormat::PVR2_2,
        PixelFormat::PVR4_2,
        PixelFormat::EAC_R11,
        PixelFormat::EAC_R11_SIGNED,
        PixelFormat::EAC_RG11,
        PixelFormat::EAC_RG11_SIGNED,
        PixelFormat::ETC2_RGB,
        PixelFormat::ETC2_RGBA,
        PixelFormat::ETC2_RGB_A1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::RGBA8888 => "RGBA8888",
            PixelFormat::RGBA5551 => "RGBA5551",
            PixelFormat::RGBA4444 => "RGBA4444",
            PixelFormat::RGB888 => "RGB888",
            PixelFormat::RGB565 => "RGB565",
            PixelFormat::A8 => "A8",
            PixelFormat::PVR4 => "PVR4",
            PixelFormat::PVR2 => "PVR2",
            PixelFormat::DXT1 => "DXT1",
            PixelFormat::DXT1A => "DXT1A",
            PixelFormat::DXT3 => "DXT3",
            PixelFormat::DXT5 => "DXT5",
            PixelFormat::DXT5NM => "DXT5NM",
            PixelFormat::ETC1 => "ETC1",
            PixelFormat::ATC_RGB => "ATC_RGB",
            PixelFormat::ATC_RGBA_EXPLICIT_ALPHA => "ATC_RGBA_EXPLICIT_ALPHA",
            PixelFormat::ATC_RGBA_INTERPOLATED_ALPHA => "ATC_RGBA_INTERPOLATED_ALPHA",
            PixelFormat::PVR2_2 => "PVR2_2",
            PixelFormat::PVR4_2 => "PVR4_2",
            PixelFormat::EAC_R11 => "EAC_R11",
            PixelFormat::EAC_R11_SIGNED => "EAC_R11_SIGNED",
            PixelFormat::EAC_RG11 => "EAC_RG11",
            PixelFormat::EAC_RG11_SIGNED => "EAC_RG11_SIGNED",
            PixelFormat::ETC2_RGB => "ETC2_RGB",
            PixelFormat::ETC2_RGBA => "ETC2_RGBA",
            PixelFormat::ETC2_RGB_A1 => "ETC2_RGB_A1",
        }
    }

    /// Block-compressed formats. Sheets exported in one of these must be square.
    pub fn is_block_compressed(&self) -> bool {
        !matches!(
            self,
            PixelFormat::RGBA8888
                | PixelFormat::RGBA5551
                | PixelFormat::RGBA4444
                | PixelFormat::RGB888
                | PixelFormat::RGB565
                | PixelFormat::A8
        )
    }

    fn is_dxt(&self) -> bool {
        matches!(
            self,
            PixelFormat::DXT1 | PixelFormat::DXT1A | PixelFormat::DXT3 | PixelFormat::DXT5 | PixelFormat::DXT5NM
        )
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Pvr,
    Dds,
    Jpeg,
    Tga,
    Webp,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 6] = [
        ImageFormat::Png,
        ImageFormat::Pvr,
        ImageFormat::Dds,
        ImageFormat::Jpeg,
        ImageFormat::Tga,
        ImageFormat::Webp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Pvr => "PVR",
            ImageFormat::Dds => "DDS",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Tga => "TGA",
            ImageFormat::Webp => "WEBP",
        }
    }

    /// Primary file extension, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Pvr => ".pvr",
            ImageFormat::Dds => ".dds",
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Tga => ".tga",
            ImageFormat::Webp => ".webp",
        }
    }

    /// Container formats produced only by a GPU compressor.
    pub fn is_gpu_container(&self) -> bool {
        matches!(self, ImageFormat::Pvr | ImageFormat::Dds)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoder quality for lossy source formats (0..=100) or lossless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Lossless,
    Lossy(u8),
}

/// Effort level handed to GPU compressors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvertQuality {
    Fastest,
    Fast,
    Normal,
    High,
    #[default]
    VeryHigh,
}

impl ConvertQuality {
    /// Maps the numeric `--quality` value (0 = fastest .. 4 = very high).
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Fastest),
            1 => Some(Self::Fast),
            2 => Some(Self::Normal),
            3 => Some(Self::High),
            4 => Some(Self::VeryHigh),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

/// Lookup tables consumed by export-key resolution.
pub trait FormatCatalog {
    fn pixel_format_by_name(&self, name: &str) -> Option<PixelFormat>;
    fn image_format_by_name(&self, name: &str) -> Option<ImageFormat>;
    /// Container a GPU compressor produces for `format` on `gpu`, if any.
    fn compressed_file_format(&self, gpu: GpuFamily, format: PixelFormat) -> Option<ImageFormat>;
    fn is_format_supported(&self, gpu: GpuFamily, format: PixelFormat) -> bool;
    /// Whether an RGBA8888 image can be converted to `format` before encoding.
    fn can_convert_from_rgba8888(&self, format: PixelFormat) -> bool;
    /// Formats whose GPU compression forces square sheets.
    fn requires_square(&self, format: PixelFormat) -> bool;
}

/// Default tables for the supported GPU families.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCatalog;

impl FormatCatalog for StandardCatalog {
    fn pixel_format_by_name(&self, name: &str) -> Option<PixelFormat> {
        PixelFormat::ALL.iter().copied().find(|f| f.name() == name)
    }

    fn image_format_by_name(&self, name: &str) -> Option<ImageFormat> {
        if name.eq_ignore_ascii_case("jpg") {
            return Some(ImageFormat::Jpeg);
        }
        ImageFormat::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    fn compressed_file_format(&self, gpu: GpuFamily, format: PixelFormat) -> Option<ImageFormat> {
        if !self.is_format_supported(gpu, format) {
            return None;
        }
        match gpu {
            GpuFamily::Origin => None,
            GpuFamily::Dx11 => Some(ImageFormat::Dds),
            GpuFamily::Tegra if format.is_dxt() => Some(ImageFormat::Dds),
            _ => Some(ImageFormat::Pvr),
        }
    }

    fn is_format_supported(&self, gpu: GpuFamily, format: PixelFormat) -> bool {
        use PixelFormat::*;
        if !format.is_block_compressed() {
            return gpu.is_device() || format == RGBA8888;
        }
        match gpu {
            GpuFamily::PowerVrIos => matches!(
                format,
                PVR4 | PVR2 | PVR4_2 | PVR2_2 | ETC2_RGB | ETC2_RGBA | ETC2_RGB_A1 | EAC_R11 | EAC_R11_SIGNED | EAC_RG11
                    | EAC_RG11_SIGNED
            ),
            GpuFamily::PowerVrAndroid => matches!(format, PVR4 | PVR2 | ETC1),
            GpuFamily::Tegra => matches!(format, DXT1 | DXT1A | DXT3 | DXT5 | DXT5NM | ETC1),
            GpuFamily::Mali => matches!(
                format,
                ETC1 | ETC2_RGB | ETC2_RGBA | ETC2_RGB_A1 | EAC_R11 | EAC_R11_SIGNED | EAC_RG11 | EAC_RG11_SIGNED
            ),
            GpuFamily::Adreno => matches!(
                format,
                ATC_RGB | ATC_RGBA_EXPLICIT_ALPHA | ATC_RGBA_INTERPOLATED_ALPHA | ETC1
            ),
            GpuFamily::Dx11 => matches!(format, DXT1 | DXT1A | DXT3 | DXT5 | DXT5NM),
            GpuFamily::Origin => false,
        }
    }

    fn can_convert_from_rgba8888(&self, format: PixelFormat) -> bool {
        matches!(
            format,
            PixelFormat::RGBA8888
                | PixelFormat::RGBA5551
                | PixelFormat::RGBA4444
                | PixelFormat::RGB888
                | PixelFormat::RGB565
                | PixelFormat::A8
        )
    }

    fn requires_square(&self, format: PixelFormat) -> bool {
        format.is_block_compressed()
    }
}
