//! Per-sheet texture descriptor (`<sheet>.tex`).
//!
//! The descriptor tells the engine how to sample a sheet and which file to load
//! for every GPU family. It is stored as pretty-printed JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::PackerConfig;
use crate::error::Result;
use crate::formats::{ConvertQuality, GpuFamily, ImageFormat, ImageQuality, PixelFormat};

pub const DESCRIPTOR_EXTENSION: &str = ".tex";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MipFilter {
    #[default]
    None,
    Nearest,
    Linear,
}

/// Sampler state written for every sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DrawSettings {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub mip_filter: MipFilter,
}

impl DrawSettings {
    pub fn from_config(cfg: &PackerConfig) -> Self {
        Self {
            wrap_s: cfg.wrap_mode,
            wrap_t: cfg.wrap_mode,
            min_filter: cfg.min_filter,
            mag_filter: cfg.mag_filter,
            mip_filter: cfg.effective_mip_filter(),
        }
    }
}

/// Target format of one GPU family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressionEntry {
    pub format: PixelFormat,
    pub image_format: ImageFormat,
    #[serde(default)]
    pub quality: ImageQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SheetDescriptor {
    pub draw_settings: DrawSettings,
    pub generate_mipmaps: bool,
    /// Format of the uncompressed source image stored next to the descriptor.
    pub source_file_format: ImageFormat,
    #[serde(default)]
    pub convert_quality: ConvertQuality,
    #[serde(default)]
    pub compression: BTreeMap<GpuFamily, CompressionEntry>,
    /// Set when the descriptor was exported for a single GPU family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_for: Option<GpuFamily>,
}

impl SheetDescriptor {
    pub fn from_config(cfg: &PackerConfig) -> Self {
        Self {
            draw_settings: DrawSettings::from_config(cfg),
            generate_mipmaps: cfg.generate_mipmaps,
            source_file_format: ImageFormat::Png,
            convert_quality: cfg.convert_quality,
            compression: BTreeMap::new(),
            exported_for: None,
        }
    }

    /// Copy that only carries `gpu`'s entry.
    pub fn exported(&self, gpu: GpuFamily) -> Self {
        let mut out = self.clone();
        out.compression.retain(|g, _| *g == gpu);
        out.exported_for = Some(gpu);
        out
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// `<base>.tex`
pub fn descriptor_path(base: &Path) -> PathBuf {
    with_suffix(base, DESCRIPTOR_EXTENSION)
}

/// `<base><ext>`, the uncompressed source image.
pub fn source_path(base: &Path, format: ImageFormat) -> PathBuf {
    with_suffix(base, format.extension())
}

/// `<base>.<gpu><ext>`, the image loaded on one GPU family.
pub fn gpu_path(base: &Path, gpu: GpuFamily, format: ImageFormat) -> PathBuf {
    with_suffix(base, &format!(".{}{}", gpu.name(), format.extension()))
}
