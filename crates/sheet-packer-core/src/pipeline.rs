//! One packing run: export keys, sheet search, composing, export and
//! definition files.

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::compositing::compose_sheets;
use crate::config::PackerConfig;
use crate::definition::{DefinitionFile, prepare_sprites};
use crate::definition_text::{build_definition, sheet_name};
use crate::descriptor::SheetDescriptor;
use crate::error::{ErrorLog, Result};
use crate::export::export_sheet;
use crate::export_keys::{ImageExportKey, need_square_texture, resolve_export_keys};
use crate::formats::{FormatCatalog, GpuFamily, StandardCatalog};
use crate::io::{FrameImageSource, NoCompressor, OutputSink, TextureCompressor};
use crate::layout::{Layout, SpritesheetLayout};
use crate::search::pack_sprites;

/// Sheet basename used when all definitions share sheets.
pub const COMBINED_BASENAME: &str = "texture";

/// A committed sheet and what was written for it.
#[derive(Debug, Clone)]
pub struct SheetRecord {
    /// `<basename><index><postfix>`
    pub name: String,
    pub layout: Layout,
    /// `None` when exporting the sheet failed (see the run's errors).
    pub descriptor: Option<SheetDescriptor>,
}

impl SheetRecord {
    pub fn size(&self) -> (u32, u32) {
        self.layout.rect()
    }
}

/// Everything a run produced, in commit order.
#[derive(Debug, Clone, Default)]
pub struct PackOutcome {
    pub sheets: Vec<SheetRecord>,
    /// Definition files written successfully.
    pub definitions: Vec<PathBuf>,
}

impl PackOutcome {
    fn extend(&mut self, other: PackOutcome) {
        self.sheets.extend(other.sheets);
        self.definitions.extend(other.definitions);
    }
}

/// Packing run. Owns the run's [`ErrorLog`]; recoverable failures land there
/// while the run goes on.
pub struct TexturePacker<'a> {
    cfg: PackerConfig,
    catalog: &'a dyn FormatCatalog,
    compressor: &'a dyn TextureCompressor,
    errors: ErrorLog,
}

impl<'a> TexturePacker<'a> {
    pub fn new(cfg: PackerConfig) -> Self {
        Self {
            cfg,
            catalog: &StandardCatalog,
            compressor: &NoCompressor,
            errors: ErrorLog::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: &'a dyn FormatCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_compressor(mut self, compressor: &'a dyn TextureCompressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn config(&self) -> &PackerConfig {
        &self.cfg
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn into_errors(self) -> ErrorLog {
        self.errors
    }

    /// Resolves export keys for `gpus`, recording failures in the run's errors.
    pub fn export_keys(&mut self, gpus: &[GpuFamily]) -> Vec<ImageExportKey> {
        resolve_export_keys(gpus, &self.cfg, self.catalog, &mut self.errors)
    }

    /// Packs `defs` combined or one by one, depending on `split`.
    pub fn pack(
        &mut self,
        out_dir: &Path,
        defs: &[DefinitionFile],
        gpus: &[GpuFamily],
        frames: &dyn FrameImageSource,
        sink: &mut dyn OutputSink,
    ) -> Result<PackOutcome> {
        if self.cfg.split {
            self.pack_to_textures_separate(out_dir, defs, gpus, frames, sink)
        } else {
            self.pack_to_textures(out_dir, defs, gpus, frames, sink)
        }
    }

    /// Packs every definition into shared sheets named `texture<i>`.
    pub fn pack_to_textures(
        &mut self,
        out_dir: &Path,
        defs: &[DefinitionFile],
        gpus: &[GpuFamily],
        frames: &dyn FrameImageSource,
        sink: &mut dyn OutputSink,
    ) -> Result<PackOutcome> {
        let keys = self.export_keys(gpus);
        self.pack_to_multiple_textures(out_dir, COMBINED_BASENAME, defs, &keys, frames, sink)
    }

    /// Packs each definition into its own sheets, named after the definition.
    /// A definition that cannot be packed does not stop the others.
    pub fn pack_to_textures_separate(
        &mut self,
        out_dir: &Path,
        defs: &[DefinitionFile],
        gpus: &[GpuFamily],
        frames: &dyn FrameImageSource,
        sink: &mut dyn OutputSink,
    ) -> Result<PackOutcome> {
        let keys = self.export_keys(gpus);
        let mut outcome = PackOutcome::default();
        for def in defs {
            let single = std::slice::from_ref(def);
            match self.pack_to_multiple_textures(out_dir, def.basename(), single, &keys, frames, sink) {
                Ok(o) => outcome.extend(o),
                Err(e) => warn!(definition = %def.filename, "skipped: {e}"),
            }
        }
        Ok(outcome)
    }

    /// Searches sheets for `defs`, then writes them with
    /// [`save_result_sheets`](Self::save_result_sheets).
    ///
    /// A search that cannot place any sprite is recorded in the run's errors
    /// and returned; nothing is written in that case.
    #[instrument(skip_all, fields(basename = %basename, defs = defs.len()))]
    pub fn pack_to_multiple_textures(
        &mut self,
        out_dir: &Path,
        basename: &str,
        defs: &[DefinitionFile],
        keys: &[ImageExportKey],
        frames: &dyn FrameImageSource,
        sink: &mut dyn OutputSink,
    ) -> Result<PackOutcome> {
        let items = prepare_sprites(defs);
        let needs_square = need_square_texture(keys, self.catalog);
        let sheets = match pack_sprites(items, &self.cfg, needs_square) {
            Ok(s) => s,
            Err(e) => {
                self.errors.add_error(&e);
                return Err(e);
            }
        };
        self.save_result_sheets(out_dir, basename, defs, sheets, keys, frames, sink)
    }

    /// Composes and exports every sheet, then writes one definition file per
    /// definition. Export or definition failures are recorded per item.
    #[allow(clippy::too_many_arguments)]
    pub fn save_result_sheets(
        &mut self,
        out_dir: &Path,
        basename: &str,
        defs: &[DefinitionFile],
        sheets: Vec<Layout>,
        keys: &[ImageExportKey],
        frames: &dyn FrameImageSource,
        sink: &mut dyn OutputSink,
    ) -> Result<PackOutcome> {
        debug!("Writing {} final texture(s)", sheets.len());
        let images = compose_sheets(defs, &sheets, frames, &self.cfg)?;

        let mut outcome = PackOutcome::default();
        for (i, (layout, image)) in sheets.iter().zip(&images).enumerate() {
            let name = sheet_name(basename, i, &self.cfg.texture_postfix);
            let base = out_dir.join(&name);
            let descriptor = match export_sheet(
                image,
                keys,
                &base,
                &self.cfg,
                sink,
                self.compressor,
                &mut self.errors,
            ) {
                Ok(d) => Some(d),
                Err(e) => {
                    self.errors.add(format!("Cannot export texture {name}: {e}"));
                    None
                }
            };
            let (w, h) = layout.rect();
            info!(sheet = %name, w, h, sprites = layout.len(), "sheet written");
            outcome.sheets.push(SheetRecord {
                name,
                layout: layout.clone(),
                descriptor,
            });
        }

        for (index, def) in defs.iter().enumerate() {
            if let Some(path) = self.write_definition(out_dir, basename, def, index, &sheets, sink) {
                outcome.definitions.push(path);
            }
        }
        Ok(outcome)
    }

    fn write_definition(
        &mut self,
        out_dir: &Path,
        basename: &str,
        def: &DefinitionFile,
        index: usize,
        sheets: &[Layout],
        sink: &mut dyn OutputSink,
    ) -> Option<PathBuf> {
        let path = out_dir.join(&def.filename);
        debug!("Write definition: {}", def.filename);
        let written = build_definition(def, index, sheets, basename, &self.cfg)
            .map_err(|e| format!("*** FATAL ERROR: {e}."))
            .and_then(|text| {
                sink.write(&path, text.to_string().as_bytes())
                    .map_err(|e| format!("Unable to write file {}: {e}", path.display()))
            });
        match written {
            Ok(()) => Some(path),
            Err(message) => {
                self.errors.add(message);
                if let Err(e) = sink.remove(&path) {
                    warn!(path = %path.display(), "cannot remove definition: {e}");
                }
                self.errors
                    .add(format!("* ERROR: Failed to write definition - {}.", def.filename));
                None
            }
        }
    }
}
