use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right_ex(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn bottom_ex(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right_ex() <= self.right_ex() && r.bottom_ex() <= self.bottom_ex()
    }
    /// Returns true if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x >= other.right_ex()
            || other.x >= self.right_ex()
            || self.y >= other.bottom_ex()
            || other.y >= self.bottom_ex())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

/// Stable identity of one sprite frame: index of its definition file in the
/// packed collection and the frame index inside that file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteId {
    pub definition: usize,
    pub frame: usize,
}

impl SpriteId {
    pub fn new(definition: usize, frame: usize) -> Self {
        Self { definition, frame }
    }
}

/// Where a sprite landed inside a sheet.
///
/// `margins_rect` is the full reserved cell (sprite plus margins), `sprite_rect`
/// the tight placement of the cropped frame. The per-side margin widths and the
/// edge flags tell the compositor which margins get the sprite's edge pixels
/// duplicated into them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpriteBoundsRect {
    pub margins_rect: Rect,
    pub sprite_rect: Rect,
    pub left_edge_pixel: bool,
    pub right_edge_pixel: bool,
    pub top_edge_pixel: bool,
    pub bottom_edge_pixel: bool,
    pub left_margin: u32,
    pub right_margin: u32,
    pub top_margin: u32,
    pub bottom_margin: u32,
}

/// Margin policy applied to every sprite added to a layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarginPolicy {
    pub margin: u32,
    pub two_side: bool,
}

impl MarginPolicy {
    pub fn new(margin: u32, two_side: bool) -> Self {
        Self { margin, two_side }
    }

    /// Leading (left/top) margin. Two-side margins always keep at least one
    /// pixel so there is room for the duplicated edge.
    pub fn leading(&self) -> u32 {
        if self.two_side { self.margin.max(1) } else { 0 }
    }

    /// Trailing (right/bottom) margin.
    pub fn trailing(&self) -> u32 {
        if self.two_side { self.margin.max(1) } else { self.margin }
    }

    /// Size of the reserved cell for a sprite of `size`.
    pub fn cell_size(&self, size: Size) -> Size {
        let extra = self.leading() + self.trailing();
        Size::new(size.w.saturating_add(extra), size.h.saturating_add(extra))
    }

    /// Builds the placement record for a cell whose top-left corner is `(x, y)`.
    pub fn bounds_at(&self, x: u32, y: u32, size: Size) -> SpriteBoundsRect {
        let lead = self.leading();
        let trail = self.trailing();
        let cell = self.cell_size(size);
        SpriteBoundsRect {
            margins_rect: Rect::new(x, y, cell.w, cell.h),
            sprite_rect: Rect::new(x + lead, y + lead, size.w, size.h),
            left_edge_pixel: self.two_side,
            right_edge_pixel: self.two_side,
            top_edge_pixel: self.two_side,
            bottom_edge_pixel: self.two_side,
            left_margin: lead,
            right_margin: trail,
            top_margin: lead,
            bottom_margin: trail,
        }
    }
}
