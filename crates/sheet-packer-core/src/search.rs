//! Multi-sheet packing search.
//!
//! For every sheet, all power-of-two resolutions from 8 up to the configured
//! maximum are tried with every configured algorithm. The best attempt is
//! committed, its sprites are removed from the work list, and the search starts
//! over for the remainder.

use tracing::{debug, info, instrument};

use crate::config::{MIN_TEXTURE_SIZE, PackerConfig, PackingAlgorithm};
use crate::definition::SpriteItem;
use crate::error::{Result, SheetPackerError};
use crate::layout::{Layout, SpritesheetLayout};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Places items from `items` into `sheet` in order, removing every placed item.
///
/// With `full_pack_only` the attempt stops at the first rejected item. Returns
/// the packed weight.
pub fn try_to_pack(sheet: &mut Layout, items: &mut Vec<SpriteItem>, full_pack_only: bool) -> u64 {
    let mut weight = 0u64;
    let mut i = 0;
    while i < items.len() {
        let item = items[i];
        if sheet.add_sprite(item.size, item.id) {
            weight += item.weight;
            items.remove(i);
        } else if full_pack_only {
            return weight;
        } else {
            i += 1;
        }
    }
    weight
}

/// Power-of-two sheet sides tried by the search, ascending.
pub fn candidate_sides(max_texture_size: u32) -> impl Iterator<Item = u32> {
    std::iter::successors(Some(MIN_TEXTURE_SIZE), |s| s.checked_mul(2))
        .take_while(move |s| *s <= max_texture_size)
}

/// One sheet attempt: the layout and the work list left over after it.
#[derive(Debug, Clone)]
pub struct PackAttempt {
    pub layout: Layout,
    pub remaining: Vec<SpriteItem>,
    pub weight: u64,
}

impl PackAttempt {
    pub fn is_full(&self) -> bool {
        self.remaining.is_empty()
    }

    fn run(
        items: &[SpriteItem],
        width: u32,
        height: u32,
        algorithm: PackingAlgorithm,
        cfg: &PackerConfig,
        full_pack_only: bool,
    ) -> Self {
        let mut layout = Layout::create(width, height, cfg.two_side_margin, cfg.margin, algorithm);
        let mut remaining = items.to_vec();
        let weight = try_to_pack(&mut layout, &mut remaining, full_pack_only);
        Self {
            layout,
            remaining,
            weight,
        }
    }
}

/// Best-so-far bookkeeping for one sheet.
#[derive(Default)]
struct BestAttempt {
    attempt: Option<PackAttempt>,
    weight: u64,
    area: u64,
    was_fully_packed: bool,
}

impl BestAttempt {
    /// Considers `candidate`; returns true when the remaining algorithms for this
    /// resolution can be skipped.
    fn consider(&mut self, candidate: PackAttempt) -> bool {
        let area = candidate.layout.area();
        let full = candidate.is_full();
        if self.was_fully_packed && !full {
            return false;
        }
        let better = full
            || candidate.weight > self.weight
            || (candidate.weight == self.weight && area < self.area);
        if !better {
            return false;
        }
        debug!(
            w = candidate.layout.rect().0,
            h = candidate.layout.rect().1,
            algorithm = ?candidate.layout.algorithm(),
            weight = candidate.weight,
            full,
            "new best attempt"
        );
        self.weight = candidate.weight;
        self.area = area;
        self.attempt = Some(candidate);
        if full {
            self.was_fully_packed = true;
        }
        full
    }

    fn skips(&self, area: u64) -> bool {
        self.was_fully_packed && area >= self.area
    }
}

/// Finds the best single sheet for `items`.
pub fn find_best_sheet(items: &[SpriteItem], cfg: &PackerConfig, only_square: bool) -> Option<PackAttempt> {
    let mut best = BestAttempt::default();
    for height in candidate_sides(cfg.max_texture_size) {
        for width in candidate_sides(cfg.max_texture_size) {
            if only_square && width != height {
                continue;
            }
            if best.skips(width as u64 * height as u64) {
                continue;
            }
            let full_only = best.was_fully_packed;

            // Parallel path (optional): evaluate, then reduce in enumeration order
            #[cfg(feature = "parallel")]
            {
                if cfg.parallel {
                    let attempts: Vec<PackAttempt> = cfg
                        .algorithms
                        .par_iter()
                        .map(|&alg| PackAttempt::run(items, width, height, alg, cfg, full_only))
                        .collect();
                    for attempt in attempts {
                        if best.consider(attempt) {
                            break;
                        }
                    }
                    continue;
                }
            }

            for &alg in &cfg.algorithms {
                let attempt = PackAttempt::run(items, width, height, alg, cfg, full_only);
                if best.consider(attempt) {
                    break;
                }
            }
        }
    }
    best.attempt
}

/// Packs every item into as few sheets as the search finds, in commit order.
///
/// Fails with [`SheetPackerError::NoProgress`] when a sheet attempt cannot place
/// a single item (some sprite is larger than the maximum sheet size).
#[instrument(skip_all, fields(items = items.len()))]
pub fn pack_sprites(mut items: Vec<SpriteItem>, cfg: &PackerConfig, needs_square: bool) -> Result<Vec<Layout>> {
    let only_square = cfg.only_square || needs_square;
    let mut sheets: Vec<Layout> = Vec::new();

    while !items.is_empty() {
        debug!(remaining = items.len(), only_square, "packing attempts started");
        let best = find_best_sheet(&items, cfg, only_square);
        let Some(best) = best.filter(|b| b.layout.packed_weight() > 0) else {
            return Err(SheetPackerError::NoProgress {
                remaining: items.len(),
                max_size: cfg.max_texture_size,
            });
        };
        let (w, h) = best.layout.rect();
        info!(
            sheet = sheets.len(),
            w,
            h,
            sprites = best.layout.len(),
            algorithm = ?best.layout.algorithm(),
            "sheet committed"
        );
        items = best.remaining;
        sheets.push(best.layout);
    }
    Ok(sheets)
}
