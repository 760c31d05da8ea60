//! Collaborator seams: where bytes go, where frame images come from, and who
//! runs GPU compression.

use image::RgbaImage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::definition::DefinitionFile;
use crate::error::{Result, SheetPackerError};
use crate::export_keys::ImageExportKey;
use crate::formats::ConvertQuality;

/// Write-bytes-to-path primitive plus the few file operations export needs.
pub trait OutputSink {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<()>;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn rename(&mut self, from: &Path, to: &Path) -> Result<()>;
    fn remove(&mut self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Writes to the local file system, creating parent directories on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSink;

impl OutputSink for FsSink {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            fs::remove_file(to)?;
        }
        fs::rename(from, to)?;
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory file map, used by tests and by callers that post-process outputs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }

    pub fn get_str(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.get(path).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

fn not_found(path: &Path) -> SheetPackerError {
    SheetPackerError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    ))
}

impl OutputSink for MemorySink {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        let bytes = self.files.remove(from).ok_or_else(|| not_found(from))?;
        self.files.insert(to.to_path_buf(), bytes);
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.files.remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Supplies the already-cropped RGBA image of one frame.
pub trait FrameImageSource {
    fn load_frame(&self, definition: &DefinitionFile, frame: usize) -> Result<RgbaImage>;
}

/// Frames held in memory, keyed by definition file name and frame index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFrames {
    frames: BTreeMap<(String, usize), RgbaImage>,
}

impl InMemoryFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: &str, frame: usize, image: RgbaImage) {
        self.frames.insert((definition.to_string(), frame), image);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameImageSource for InMemoryFrames {
    fn load_frame(&self, definition: &DefinitionFile, frame: usize) -> Result<RgbaImage> {
        self.frames
            .get(&(definition.filename.clone(), frame))
            .cloned()
            .ok_or_else(|| {
                SheetPackerError::InvalidConfig(format!(
                    "no image for frame {frame} of {}",
                    definition.filename
                ))
            })
    }
}

/// GPU-side compressor: turns the written source image into the key's
/// container format at `output`.
pub trait TextureCompressor {
    fn compress(
        &self,
        source: &Path,
        output: &Path,
        key: &ImageExportKey,
        quality: ConvertQuality,
        sink: &mut dyn OutputSink,
    ) -> Result<()>;
}

/// Refuses every request; used when no compressor is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompressor;

impl TextureCompressor for NoCompressor {
    fn compress(
        &self,
        _source: &Path,
        output: &Path,
        key: &ImageExportKey,
        _quality: ConvertQuality,
        _sink: &mut dyn OutputSink,
    ) -> Result<()> {
        Err(SheetPackerError::Compression(format!(
            "no texture compressor configured for GPU '{}' ({})",
            key.gpu,
            output.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_rename_moves_bytes() {
        let mut s = MemorySink::new();
        s.write(Path::new("a.png"), b"x").unwrap();
        s.rename(Path::new("a.png"), Path::new("b.png")).unwrap();
        assert!(!s.exists(Path::new("a.png")));
        assert_eq!(s.get("b.png"), Some(&b"x"[..]));
        assert!(s.rename(Path::new("a.png"), Path::new("c.png")).is_err());
    }
}
