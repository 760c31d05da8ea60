use super::{Placements, SpritesheetLayout};
use crate::config::MaxRectsHeuristic;
use crate::model::{MarginPolicy, Rect, Size, SpriteBoundsRect, SpriteId};

#[derive(Debug, Clone)]
pub struct MaxRectsLayout {
    border: Rect,
    policy: MarginPolicy,
    free: Vec<Rect>,
    used: Vec<Rect>,
    heuristic: MaxRectsHeuristic,
    placements: Placements,
}

impl MaxRectsLayout {
    pub fn new(width: u32, height: u32, policy: MarginPolicy, heuristic: MaxRectsHeuristic) -> Self {
        let border = Rect::new(0, 0, width, height);
        Self {
            border,
            policy,
            free: vec![border],
            used: Vec::new(),
            heuristic,
            placements: Placements::default(),
        }
    }

    pub fn heuristic(&self) -> MaxRectsHeuristic {
        self.heuristic
    }

    pub(crate) fn placements(&self) -> &Placements {
        &self.placements
    }

    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    fn place_rect(&mut self, node: &Rect) {
        let mut new_free: Vec<Rect> = Vec::new();
        let mut i = 0usize;
        while i < self.free.len() {
            let fr = self.free[i];
            if fr.intersects(node) {
                self.free.swap_remove(i);
                split_free_node(fr, node, &mut new_free);
            } else {
                i += 1;
            }
        }
        // drop fragments already covered by surviving free rects and vice versa
        new_free.retain(|nr| nr.w > 0 && nr.h > 0 && !self.free.iter().any(|of| of.contains(nr)));
        self.free.retain(|of| !new_free.iter().any(|nr| nr.contains(of)));
        prune_within(&mut new_free);
        self.free.extend(new_free);
        self.used.push(*node);
    }

    fn score(&self, fr: &Rect, w: u32, h: u32) -> (i64, i64) {
        let leftover_h = fr.w as i64 - w as i64;
        let leftover_v = fr.h as i64 - h as i64;
        let short_fit = leftover_h.min(leftover_v);
        let long_fit = leftover_h.max(leftover_v);
        let area_fit = fr.area() as i64 - (w as i64 * h as i64);
        match self.heuristic {
            MaxRectsHeuristic::BestAreaFit => (area_fit, short_fit),
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit),
            MaxRectsHeuristic::BestLongSideFit => (long_fit, short_fit),
            MaxRectsHeuristic::BottomLeft => ((fr.y + h) as i64, fr.x as i64),
            MaxRectsHeuristic::ContactPoint => {
                // maximize contact score: use negative for minimization
                let contact = self.contact_point_score(fr.x, fr.y, w, h);
                (-(contact as i64), area_fit)
            }
        }
    }

    fn find_position(&self, w: u32, h: u32) -> Option<Rect> {
        let mut best: Option<(i64, i64, u32, u32)> = None; // (s1, s2, top, left)
        let mut best_rect = None;

        for fr in &self.free {
            if fr.w < w || fr.h < h {
                continue;
            }
            // perfect fit early-out
            if fr.w == w && fr.h == h && self.heuristic != MaxRectsHeuristic::ContactPoint {
                return Some(Rect::new(fr.x, fr.y, w, h));
            }
            let (s1, s2) = self.score(fr, w, h);
            let cand = (s1, s2, fr.y + h, fr.x);
            if best.is_none_or(|b| cand < b) {
                best = Some(cand);
                best_rect = Some(Rect::new(fr.x, fr.y, w, h));
            }
        }
        best_rect
    }

    fn contact_point_score(&self, x: u32, y: u32, w: u32, h: u32) -> u32 {
        let node = Rect::new(x, y, w, h);
        let mut score = 0u32;
        // contact with borders
        if node.x == self.border.x || node.right_ex() == self.border.right_ex() {
            score += node.h;
        }
        if node.y == self.border.y || node.bottom_ex() == self.border.bottom_ex() {
            score += node.w;
        }

        // contact with used rectangles
        for u in &self.used {
            if node.x == u.right_ex() || u.x == node.right_ex() {
                score += overlap_1d(node.y, node.bottom_ex(), u.y, u.bottom_ex());
            }
            if node.y == u.bottom_ex() || u.y == node.bottom_ex() {
                score += overlap_1d(node.x, node.right_ex(), u.x, u.right_ex());
            }
        }
        score
    }
}

fn split_free_node(fr: Rect, node: &Rect, out: &mut Vec<Rect>) {
    let fr_x2 = fr.right_ex();
    let fr_y2 = fr.bottom_ex();
    let n_x2 = node.right_ex();
    let n_y2 = node.bottom_ex();

    // Left
    if node.x > fr.x && node.x < fr_x2 {
        out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
    }
    // Right
    if n_x2 < fr_x2 {
        out.push(Rect::new(n_x2, fr.y, fr_x2 - n_x2, fr.h));
    }
    // Top
    if node.y > fr.y && node.y < fr_y2 {
        out.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
    }
    // Bottom
    if n_y2 < fr_y2 {
        out.push(Rect::new(fr.x, n_y2, fr.w, fr_y2 - n_y2));
    }
}

fn prune_within(v: &mut Vec<Rect>) {
    let mut i = 0;
    while i < v.len() {
        let a = v[i];
        let dominated = v
            .iter()
            .enumerate()
            .any(|(j, b)| j != i && b.contains(&a) && (a != *b || j < i));
        if dominated {
            v.remove(i);
        } else {
            i += 1;
        }
    }
}

fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    let start = a1.max(b1);
    let end = a2.min(b2);
    end.saturating_sub(start)
}

impl SpritesheetLayout for MaxRectsLayout {
    fn add_sprite(&mut self, size: Size, id: SpriteId) -> bool {
        let cell = self.policy.cell_size(size);
        if cell.w == 0 || cell.h == 0 {
            return false;
        }
        match self.find_position(cell.w, cell.h) {
            Some(place) => {
                self.place_rect(&place);
                self.placements
                    .insert(id, self.policy.bounds_at(place.x, place.y, size));
                true
            }
            None => false,
        }
    }

    fn bounds_rect_for(&self, id: SpriteId) -> Option<&SpriteBoundsRect> {
        self.placements.get(id)
    }

    fn rect(&self) -> (u32, u32) {
        (self.border.w, self.border.h)
    }

    fn packed_weight(&self) -> u64 {
        self.placements.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_keeps_one_of_two_equal_rects() {
        let mut v = vec![Rect::new(0, 0, 4, 4), Rect::new(0, 0, 4, 4), Rect::new(1, 1, 2, 2)];
        prune_within(&mut v);
        assert_eq!(v, vec![Rect::new(0, 0, 4, 4)]);
    }

    #[test]
    fn free_list_covers_remaining_space_after_split() {
        let mut l = MaxRectsLayout::new(
            16,
            16,
            MarginPolicy::new(0, false),
            MaxRectsHeuristic::BestAreaFit,
        );
        assert!(l.add_sprite(Size::new(8, 8), SpriteId::new(0, 0)));
        // right strip and bottom strip remain
        assert_eq!(l.free_list_len(), 2);
        assert!(l.add_sprite(Size::new(8, 16), SpriteId::new(0, 1)));
        assert!(l.add_sprite(Size::new(8, 8), SpriteId::new(0, 2)));
        assert!(!l.add_sprite(Size::new(1, 1), SpriteId::new(0, 3)));
        assert_eq!(l.packed_weight(), 256);
    }
}
