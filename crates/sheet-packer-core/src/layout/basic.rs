use super::{Placements, SpritesheetLayout};
use crate::model::{MarginPolicy, Size, SpriteBoundsRect, SpriteId};

/// Shelf packer: sprites fill the current row left to right; a sprite that does
/// not fit opens a new row below the tallest cell of the current one.
#[derive(Debug, Clone)]
pub struct BasicLayout {
    width: u32,
    height: u32,
    policy: MarginPolicy,
    cursor_x: u32,
    shelf_y: u32,
    shelf_h: u32,
    placements: Placements,
}

impl BasicLayout {
    pub fn new(width: u32, height: u32, policy: MarginPolicy) -> Self {
        Self {
            width,
            height,
            policy,
            cursor_x: 0,
            shelf_y: 0,
            shelf_h: 0,
            placements: Placements::default(),
        }
    }

    pub(crate) fn placements(&self) -> &Placements {
        &self.placements
    }

    fn choose(&self, cell: Size) -> Option<(u32, u32, bool)> {
        if cell.w > self.width || cell.h > self.height {
            return None;
        }
        // current shelf
        if self.cursor_x + cell.w <= self.width && self.shelf_y + cell.h <= self.height {
            return Some((self.cursor_x, self.shelf_y, false));
        }
        // new shelf
        let next_y = self.shelf_y + self.shelf_h;
        if next_y + cell.h <= self.height {
            return Some((0, next_y, true));
        }
        None
    }
}

impl SpritesheetLayout for BasicLayout {
    fn add_sprite(&mut self, size: Size, id: SpriteId) -> bool {
        let cell = self.policy.cell_size(size);
        let Some((x, y, new_shelf)) = self.choose(cell) else {
            return false;
        };
        if new_shelf {
            self.shelf_y = y;
            self.shelf_h = 0;
        }
        self.cursor_x = x + cell.w;
        self.shelf_h = self.shelf_h.max(cell.h);
        self.placements.insert(id, self.policy.bounds_at(x, y, size));
        true
    }

    fn bounds_rect_for(&self, id: SpriteId) -> Option<&SpriteBoundsRect> {
        self.placements.get(id)
    }

    fn rect(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn packed_weight(&self) -> u64 {
        self.placements.weight
    }
}
