//! Core library for packing sprite frames into GPU texture sheets.
//!
//! - Layouts: Basic shelf packing and MaxRects (BAF/BSSF/BLSF/BL/CP), margins with edge-pixel duplication
//! - Search: every power-of-two resolution × algorithm, smallest full pack wins, greedy multi-sheet continuation
//! - Export: per-GPU export keys, sheet descriptors (`.tex`) and text definition files
//!
//! Quick example:
//! ```ignore
//! use sheet_packer_core::prelude::*;
//! use std::path::Path;
//! # fn main() -> sheet_packer_core::Result<()> {
//! let cfg = PackerConfig::builder().max_texture_size(1024).build();
//! let def = DefinitionFile::new("hero.txt", 32, 32).with_frame(Rect::new(0, 0, 32, 32), "idle");
//! let mut frames = InMemoryFrames::new();
//! frames.insert("hero.txt", 0, image::RgbaImage::new(32, 32));
//! let mut sink = MemorySink::new();
//! let mut packer = TexturePacker::new(cfg);
//! let out = packer.pack(Path::new("out"), &[def], &[GpuFamily::Origin], &frames, &mut sink)?;
//! println!("sheets: {}", out.sheets.len());
//! packer.errors().report();
//! # Ok(()) }
//! ```

pub mod compositing;
pub mod config;
pub mod definition;
pub mod definition_text;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod export_keys;
pub mod flags;
pub mod formats;
pub mod io;
pub mod layout;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod search;

pub use config::*;
pub use error::*;
pub use model::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `sheet_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{
        AlgorithmPreset, MaxRectsHeuristic, PackerConfig, PackerConfigBuilder, PackingAlgorithm,
    };
    pub use crate::definition::{DefinitionFile, SpriteItem, prepare_sprites};
    pub use crate::definition_text::DefinitionText;
    pub use crate::error::{ErrorLog, Result, SheetPackerError};
    pub use crate::export_keys::{ImageExportKey, resolve_export_keys};
    pub use crate::formats::{FormatCatalog, GpuFamily, ImageFormat, PixelFormat, StandardCatalog};
    pub use crate::io::{FrameImageSource, FsSink, InMemoryFrames, MemorySink, OutputSink, TextureCompressor};
    pub use crate::layout::{Layout, SpritesheetLayout};
    pub use crate::model::{Rect, Size, SpriteBoundsRect, SpriteId};
    pub use crate::pipeline::{PackOutcome, SheetRecord, TexturePacker};
    pub use crate::search::pack_sprites;
}
