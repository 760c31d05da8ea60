//! `flags.txt` style option tokens.
//!
//! A flag is a token starting with `-`; the tokens that follow it, up to the
//! next flag, are its parameters (`--mali ETC1`, `--tsize 1024`).

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::{AlgorithmPreset, PackerConfig, is_valid_texture_size};
use crate::descriptor::{MipFilter, TextureFilter, WrapMode};
use crate::error::Result;
use crate::formats::{ConvertQuality, GpuFamily};

fn is_flag(token: &str) -> bool {
    token.starts_with('-') && token.parse::<i64>().is_err()
}

/// Parsed flags with their parameters. Later repeats of a flag replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeMap<String, Vec<String>>,
}

impl FlagSet {
    pub fn parse(text: &str) -> Self {
        Self::from_tokens(text.split_whitespace())
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;
        for token in tokens {
            let token = token.as_ref();
            if is_flag(token) {
                flags.insert(token.to_string(), Vec::new());
                current = Some(token.to_string());
            } else if let Some(params) = current.as_ref().and_then(|f| flags.get_mut(f)) {
                params.push(token.to_string());
            } else {
                debug!(token, "parameter without a flag ignored");
            }
        }
        Self { flags }
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.flags.contains_key(flag)
    }

    pub fn params(&self, flag: &str) -> Option<&[String]> {
        self.flags.get(flag).map(Vec::as_slice)
    }

    fn first_param(&self, flag: &str) -> Option<&str> {
        self.params(flag).and_then(|p| p.first()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

const MARGIN_FLAGS: [(&str, u32); 4] = [("--add0pixel", 0), ("--add1pixel", 1), ("--add2pixel", 2), ("--add4pixel", 4)];

fn wrap_mode(flags: &FlagSet) -> Option<WrapMode> {
    [
        ("--wrapClampToEdge", WrapMode::Clamp),
        ("--wrapRepeat", WrapMode::Repeat),
        ("--wrapMirror", WrapMode::Mirror),
    ]
    .into_iter()
    .find(|(f, _)| flags.is_set(f))
    .map(|(_, m)| m)
}

fn min_filter(flags: &FlagSet) -> Option<(TextureFilter, Option<MipFilter>)> {
    use MipFilter as M;
    use TextureFilter::{Linear, Nearest};
    [
        ("--minFilterNearest", Nearest, None),
        ("--minFilterLinear", Linear, None),
        ("--minFilterNearestMipmapNearest", Nearest, Some(M::Nearest)),
        ("--minFilterLinearMipmapNearest", Linear, Some(M::Nearest)),
        ("--minFilterNearestMipmapLinear", Nearest, Some(M::Linear)),
        ("--minFilterLinearMipmapLinear", Linear, Some(M::Linear)),
    ]
    .into_iter()
    .find(|(f, _, _)| flags.is_set(f))
    .map(|(_, min, mip)| (min, mip))
}

/// Applies `flags` on top of `cfg`.
pub fn apply_flags(cfg: &mut PackerConfig, flags: &FlagSet) {
    cfg.two_side_margin = cfg.two_side_margin || flags.is_set("--add2sidepixel");
    match MARGIN_FLAGS.iter().find(|(f, _)| flags.is_set(f)) {
        Some((_, m)) => cfg.margin = *m,
        None if flags.is_set("--add2sidepixel") => cfg.margin = 0,
        None => {}
    }

    cfg.only_square |= flags.is_set("--square");
    cfg.split |= flags.is_set("--split");
    cfg.disable_crop_alpha |= flags.is_set("--disableCropAlpha");
    cfg.debug_outlines |= flags.is_set("--debug");
    cfg.generate_mipmaps |= flags.is_set("--generateMipMaps");

    if let Some(v) = flags.first_param("--tsize") {
        match v.parse::<u32>() {
            Ok(size) if is_valid_texture_size(size) => cfg.max_texture_size = size,
            _ => warn!("Unsupported max texture size '{v}', keeping {}", cfg.max_texture_size),
        }
    }
    if let Some(v) = flags.first_param("--quality") {
        match v.parse::<i64>().ok().and_then(ConvertQuality::from_level) {
            Some(q) => cfg.convert_quality = q,
            None => warn!("Unsupported quality '{v}', keeping {:?}", cfg.convert_quality),
        }
    }
    if let Some(v) = flags.first_param("--alg") {
        match v.parse::<AlgorithmPreset>() {
            Ok(p) => cfg.algorithms = p.algorithms(),
            Err(()) => warn!("Unknown packing algorithm '{v}'"),
        }
    }

    if let Some(m) = wrap_mode(flags) {
        cfg.wrap_mode = m;
    }
    if flags.is_set("--magFilterNearest") {
        cfg.mag_filter = TextureFilter::Nearest;
    }
    if flags.is_set("--magFilterLinear") {
        cfg.mag_filter = TextureFilter::Linear;
    }
    if let Some((min, mip)) = min_filter(flags) {
        cfg.min_filter = min;
        if mip.is_some() {
            cfg.mip_filter = mip;
        }
    }

    for gpu in GpuFamily::ALL {
        if let Some(tokens) = flags.params(&gpu.flag()) {
            cfg.gpu_params.insert(gpu, tokens.to_vec());
        }
    }
}

/// Default configuration with `text`'s flags applied, validated.
pub fn parse_flags(text: &str) -> Result<PackerConfig> {
    let mut cfg = PackerConfig::default();
    apply_flags(&mut cfg, &FlagSet::parse(text));
    cfg.validate()?;
    Ok(cfg)
}

/// GPU families whose flag is present, in declaration order.
pub fn requested_gpus(flags: &FlagSet) -> Vec<GpuFamily> {
    GpuFamily::ALL
        .into_iter()
        .filter(|g| flags.is_set(&g.flag()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_attach_to_the_preceding_flag() {
        let f = FlagSet::parse("stray --mali ETC1 --tsize 512 --split");
        assert_eq!(f.params("--mali").unwrap(), ["ETC1".to_string()]);
        assert_eq!(f.first_param("--tsize"), Some("512"));
        assert!(f.params("--split").unwrap().is_empty());
        assert!(!f.is_set("stray"));
    }

    #[test]
    fn negative_numbers_are_parameters() {
        let f = FlagSet::parse("--quality -1");
        assert_eq!(f.first_param("--quality"), Some("-1"));
    }
}
