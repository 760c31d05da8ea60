use std::collections::BTreeMap;

use crate::config::PackingAlgorithm;
use crate::model::{MarginPolicy, Size, SpriteBoundsRect, SpriteId};

pub mod basic;
pub mod maxrects;

use basic::BasicLayout;
use maxrects::MaxRectsLayout;

/// A spritesheet layout places sprites into one fixed-size sheet.
///
/// Implementations must ensure no two margins rects overlap and that every
/// margins rect stays inside the sheet. `add_sprite` returning `false` means the
/// sheet is full for that sprite and must leave the layout unchanged.
pub trait SpritesheetLayout {
    fn add_sprite(&mut self, size: Size, id: SpriteId) -> bool;
    fn bounds_rect_for(&self, id: SpriteId) -> Option<&SpriteBoundsRect>;
    /// Sheet dimensions `(width, height)`.
    fn rect(&self) -> (u32, u32);
    /// Sum of the areas of all placed sprites (without margins).
    fn packed_weight(&self) -> u64;
}

/// Placement map shared by every layout variant.
#[derive(Debug, Clone, Default)]
pub(crate) struct Placements {
    by_id: BTreeMap<SpriteId, SpriteBoundsRect>,
    weight: u64,
}

impl Placements {
    fn insert(&mut self, id: SpriteId, bounds: SpriteBoundsRect) {
        self.weight += bounds.sprite_rect.area();
        self.by_id.insert(id, bounds);
    }
    fn get(&self, id: SpriteId) -> Option<&SpriteBoundsRect> {
        self.by_id.get(&id)
    }
}

/// Closed set of layout variants behind the [`SpritesheetLayout`] contract.
#[derive(Debug, Clone)]
pub enum Layout {
    Basic(BasicLayout),
    MaxRects(MaxRectsLayout),
}

impl Layout {
    pub fn create(width: u32, height: u32, two_side_margin: bool, margin: u32, algorithm: PackingAlgorithm) -> Self {
        let policy = MarginPolicy::new(margin, two_side_margin);
        match algorithm {
            PackingAlgorithm::Basic => Layout::Basic(BasicLayout::new(width, height, policy)),
            PackingAlgorithm::MaxRects(h) => {
                Layout::MaxRects(MaxRectsLayout::new(width, height, policy, h))
            }
        }
    }

    pub fn algorithm(&self) -> PackingAlgorithm {
        match self {
            Layout::Basic(_) => PackingAlgorithm::Basic,
            Layout::MaxRects(l) => PackingAlgorithm::MaxRects(l.heuristic()),
        }
    }

    /// All placements, ordered by sprite id.
    pub fn placements(&self) -> impl Iterator<Item = (SpriteId, &SpriteBoundsRect)> {
        self.placement_map().by_id.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.placement_map().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn area(&self) -> u64 {
        let (w, h) = self.rect();
        w as u64 * h as u64
    }

    fn placement_map(&self) -> &Placements {
        match self {
            Layout::Basic(l) => l.placements(),
            Layout::MaxRects(l) => l.placements(),
        }
    }
}

/// First sheet, in commit order, that holds `id`.
pub fn locate_sprite(sheets: &[Layout], id: SpriteId) -> Option<(usize, &SpriteBoundsRect)> {
    sheets
        .iter()
        .enumerate()
        .find_map(|(i, sheet)| sheet.bounds_rect_for(id).map(|b| (i, b)))
}

impl SpritesheetLayout for Layout {
    fn add_sprite(&mut self, size: Size, id: SpriteId) -> bool {
        match self {
            Layout::Basic(l) => l.add_sprite(size, id),
            Layout::MaxRects(l) => l.add_sprite(size, id),
        }
    }

    fn bounds_rect_for(&self, id: SpriteId) -> Option<&SpriteBoundsRect> {
        self.placement_map().get(id)
    }

    fn rect(&self) -> (u32, u32) {
        match self {
            Layout::Basic(l) => l.rect(),
            Layout::MaxRects(l) => l.rect(),
        }
    }

    fn packed_weight(&self) -> u64 {
        self.placement_map().weight
    }
}
