use serde::{Deserialize, Serialize};

use crate::model::{Rect, Size, SpriteId};

/// One source asset: a sprite of `sprite_width x sprite_height` made of frames.
///
/// `frame_rects[i]` holds the crop of frame `i`: `x,y` is the crop origin inside
/// the sprite and `w,h` the size of the cropped frame image that gets packed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefinitionFile {
    /// Output file name of the definition, e.g. `hero.txt`.
    pub filename: String,
    pub sprite_width: u32,
    pub sprite_height: u32,
    pub frame_rects: Vec<Rect>,
    /// Optional per-frame names; may be empty or shorter than `frame_rects`.
    #[serde(default)]
    pub frame_names: Vec<String>,
}

impl DefinitionFile {
    pub fn new(filename: impl Into<String>, sprite_width: u32, sprite_height: u32) -> Self {
        Self {
            filename: filename.into(),
            sprite_width,
            sprite_height,
            frame_rects: Vec::new(),
            frame_names: Vec::new(),
        }
    }

    /// Appends a frame cropped at `crop` (origin inside the sprite, packed size).
    pub fn with_frame(mut self, crop: Rect, name: impl Into<String>) -> Self {
        self.frame_rects.push(crop);
        self.frame_names.push(name.into());
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frame_rects.len()
    }

    pub fn frame_size(&self, frame: usize) -> Size {
        self.frame_rects[frame].size()
    }

    pub fn frame_name(&self, frame: usize) -> &str {
        self.frame_names.get(frame).map(String::as_str).unwrap_or("")
    }

    /// File name without its extension.
    pub fn basename(&self) -> &str {
        match self.filename.rfind('.') {
            Some(dot) if dot > 0 => &self.filename[..dot],
            _ => &self.filename,
        }
    }
}

/// A frame waiting to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteItem {
    pub id: SpriteId,
    pub size: Size,
    /// `width * height` of the frame.
    pub weight: u64,
}

/// Flattens every `(definition, frame)` pair into a work list sorted by weight,
/// largest first. The sort is stable, so equal weights keep definition/frame order.
pub fn prepare_sprites(defs: &[DefinitionFile]) -> Vec<SpriteItem> {
    let mut items: Vec<SpriteItem> = defs
        .iter()
        .enumerate()
        .flat_map(|(d, def)| {
            (0..def.frame_count()).map(move |f| {
                let size = def.frame_size(f);
                SpriteItem {
                    id: SpriteId::new(d, f),
                    size,
                    weight: size.area(),
                }
            })
        })
        .collect();
    items.sort_by(|a, b| b.weight.cmp(&a.weight));
    items
}
