//! Text definition files: where every frame of one source asset landed.
//!
//! ```text
//! <usedSheetCount>
//! <sheetName>.tex            (one line per used sheet)
//! <spriteWidth> <spriteHeight>
//! <frameCount>
//! <x> <y> <dx> <dy> <origX> <origY> <localSheetIndex> <frameName>
//! ```
//!
//! `localSheetIndex` points into the sheet list of this file, which only holds
//! sheets that received at least one of its frames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::config::PackerConfig;
use crate::definition::DefinitionFile;
use crate::descriptor::DESCRIPTOR_EXTENSION;
use crate::error::{Result, SheetPackerError};
use crate::layout::{Layout, locate_sprite};
use crate::model::SpriteId;

/// `<basename><index><postfix>`
pub fn sheet_name(basename: &str, index: usize, postfix: &str) -> String {
    format!("{basename}{index}{postfix}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameLine {
    pub x: u32,
    pub y: u32,
    pub dx: u32,
    pub dy: u32,
    pub orig_x: u32,
    pub orig_y: u32,
    pub sheet: usize,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefinitionText {
    /// Sheet descriptor file names, e.g. `texture0.tex`.
    pub sheet_names: Vec<String>,
    pub sprite_width: u32,
    pub sprite_height: u32,
    pub frames: Vec<FrameLine>,
}

impl fmt::Display for DefinitionText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sheet_names.len())?;
        for name in &self.sheet_names {
            writeln!(f, "{name}")?;
        }
        writeln!(f, "{} {}", self.sprite_width, self.sprite_height)?;
        writeln!(f, "{}", self.frames.len())?;
        for l in &self.frames {
            writeln!(
                f,
                "{} {} {} {} {} {} {} {}",
                l.x, l.y, l.dx, l.dy, l.orig_x, l.orig_y, l.sheet, l.name
            )?;
        }
        Ok(())
    }
}

struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}

impl<'a> Lines<'a> {
    fn next_line(&mut self, what: &str) -> Result<&'a str> {
        match self.inner.next() {
            Some((i, l)) => {
                self.line = i + 1;
                Ok(l.strip_suffix('\r').unwrap_or(l))
            }
            None => Err(SheetPackerError::Parse {
                line: self.line + 1,
                message: format!("expected {what}, found end of file"),
            }),
        }
    }

    fn err(&self, message: impl Into<String>) -> SheetPackerError {
        SheetPackerError::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn number<T: FromStr>(&self, token: Option<&str>, what: &str) -> Result<T> {
        let token = token.ok_or_else(|| self.err(format!("missing {what}")))?;
        token
            .trim()
            .parse()
            .map_err(|_| self.err(format!("invalid {what} '{token}'")))
    }
}

impl FromStr for DefinitionText {
    type Err = SheetPackerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut lines = Lines {
            inner: s.lines().enumerate(),
            line: 0,
        };

        let l = lines.next_line("sheet count")?;
        let sheet_count: usize = lines.number(Some(l), "sheet count")?;
        let mut sheet_names = Vec::with_capacity(sheet_count);
        for _ in 0..sheet_count {
            sheet_names.push(lines.next_line("sheet name")?.to_string());
        }

        let l = lines.next_line("sprite size")?;
        let mut it = l.split_whitespace();
        let sprite_width = lines.number(it.next(), "sprite width")?;
        let sprite_height = lines.number(it.next(), "sprite height")?;

        let l = lines.next_line("frame count")?;
        let frame_count: usize = lines.number(Some(l), "frame count")?;
        let mut frames = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            let l = lines.next_line("frame line")?;
            let mut it = l.splitn(8, ' ');
            let line = FrameLine {
                x: lines.number(it.next(), "x")?,
                y: lines.number(it.next(), "y")?,
                dx: lines.number(it.next(), "dx")?,
                dy: lines.number(it.next(), "dy")?,
                orig_x: lines.number(it.next(), "origin x")?,
                orig_y: lines.number(it.next(), "origin y")?,
                sheet: lines.number(it.next(), "sheet index")?,
                name: it.next().unwrap_or("").to_string(),
            };
            if line.sheet >= sheet_count {
                return Err(lines.err(format!(
                    "sheet index {} out of range ({sheet_count} sheets)",
                    line.sheet
                )));
            }
            frames.push(line);
        }

        Ok(Self {
            sheet_names,
            sprite_width,
            sprite_height,
            frames,
        })
    }
}

/// Builds the definition text for `defs[index]` from the committed sheets.
///
/// Fails with [`SheetPackerError::FrameNotPacked`] if some frame is in no sheet.
pub fn build_definition(
    def: &DefinitionFile,
    index: usize,
    sheets: &[Layout],
    basename: &str,
    cfg: &PackerConfig,
) -> Result<DefinitionText> {
    let mut located = Vec::with_capacity(def.frame_count());
    for frame in 0..def.frame_count() {
        let (sheet, bounds) = locate_sprite(sheets, SpriteId::new(index, frame)).ok_or_else(|| {
            SheetPackerError::FrameNotPacked {
                frame,
                definition: def.filename.clone(),
            }
        })?;
        located.push((sheet, bounds.sprite_rect));
    }

    // global sheet index -> index in this file, ascending
    let mut local: BTreeMap<usize, usize> = located.iter().map(|(s, _)| (*s, 0)).collect();
    let mut sheet_names = Vec::with_capacity(local.len());
    for (n, (global, slot)) in local.iter_mut().enumerate() {
        *slot = n;
        sheet_names.push(format!(
            "{}{DESCRIPTOR_EXTENSION}",
            sheet_name(basename, *global, &cfg.texture_postfix)
        ));
    }

    let frames = located
        .into_iter()
        .enumerate()
        .map(|(frame, (sheet, rect))| {
            if rect.w > def.sprite_width || rect.h > def.sprite_height {
                warn!(
                    "In sprite {} frame {frame} has size bigger than sprite size. Frame will be cropped.",
                    def.basename()
                );
            }
            let crop = def.frame_rects[frame];
            let (orig_x, orig_y) = if cfg.disable_crop_alpha { (0, 0) } else { (crop.x, crop.y) };
            FrameLine {
                x: rect.x,
                y: rect.y,
                dx: rect.w,
                dy: rect.h,
                orig_x,
                orig_y,
                sheet: local[&sheet],
                name: def.frame_name(frame).to_string(),
            }
        })
        .collect();

    Ok(DefinitionText {
        sheet_names,
        sprite_width: def.sprite_width,
        sprite_height: def.sprite_height,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_name_keeps_the_separator() {
        let text = DefinitionText {
            sheet_names: vec!["texture0.tex".into()],
            sprite_width: 4,
            sprite_height: 4,
            frames: vec![FrameLine {
                x: 0,
                y: 0,
                dx: 4,
                dy: 4,
                orig_x: 0,
                orig_y: 0,
                sheet: 0,
                name: String::new(),
            }],
        };
        assert_eq!(text.to_string(), "1\ntexture0.tex\n4 4\n1\n0 0 4 4 0 0 0 \n");
        assert_eq!(text.to_string().parse::<DefinitionText>().unwrap(), text);
    }

    #[test]
    fn truncated_file_reports_the_line() {
        let err = "1\ntexture0.tex\n4 4\n2\n0 0 4 4 0 0 0 a\n"
            .parse::<DefinitionText>()
            .unwrap_err();
        assert!(matches!(err, SheetPackerError::Parse { line: 6, .. }));
    }
}
