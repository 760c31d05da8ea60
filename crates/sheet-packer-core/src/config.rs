use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::descriptor::{MipFilter, TextureFilter, WrapMode};
use crate::formats::{ConvertQuality, GpuFamily};

/// Default upper bound for sheet width/height.
pub const DEFAULT_TEXTURE_SIZE: u32 = 2048;
/// Smallest sheet side tried by the resolution search.
pub const MIN_TEXTURE_SIZE: u32 = 8;
/// Largest accepted sheet side.
pub const MAX_TEXTURE_SIZE: u32 = 65536;

/// Power of two in `MIN_TEXTURE_SIZE..=MAX_TEXTURE_SIZE`.
pub fn is_valid_texture_size(size: u32) -> bool {
    size.is_power_of_two() && (MIN_TEXTURE_SIZE..=MAX_TEXTURE_SIZE).contains(&size)
}

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaxRectsHeuristic {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    BottomLeft,
    ContactPoint,
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" | "best_area_fit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" | "best_short_side_fit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" | "best_long_side_fit" => Ok(Self::BestLongSideFit),
            "bl" | "bottomleft" | "bottom_left" => Ok(Self::BottomLeft),
            "cp" | "contactpoint" | "contact_point" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

/// One allocator variant tried by the packing search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackingAlgorithm {
    /// Shelf packing: rows advance top to bottom.
    Basic,
    /// Free-rectangle list with the given candidate heuristic.
    MaxRects(MaxRectsHeuristic),
}

impl FromStr for PackingAlgorithm {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if lower == "basic" {
            return Ok(Self::Basic);
        }
        let h = lower
            .strip_prefix("maxrects_")
            .or_else(|| lower.strip_prefix("maxrects:"))
            .ok_or(())?;
        h.parse().map(Self::MaxRects)
    }
}

/// Named algorithm sets accepted by `-alg`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmPreset {
    /// All five MaxRects heuristics.
    Maxrect,
    /// MaxRects best-area-fit only.
    MaxrectFast,
    Basic,
}

impl AlgorithmPreset {
    pub fn algorithms(&self) -> Vec<PackingAlgorithm> {
        match self {
            AlgorithmPreset::Maxrect => default_algorithms(),
            AlgorithmPreset::MaxrectFast => {
                vec![PackingAlgorithm::MaxRects(MaxRectsHeuristic::BestAreaFit)]
            }
            AlgorithmPreset::Basic => vec![PackingAlgorithm::Basic],
        }
    }
}

impl FromStr for AlgorithmPreset {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "maxrect" => Ok(Self::Maxrect),
            "maxrect_fast" => Ok(Self::MaxrectFast),
            "basic" => Ok(Self::Basic),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackerConfig {
    /// Largest sheet side (power of two).
    pub max_texture_size: u32,
    /// Only try square sheets, regardless of export formats.
    pub only_square: bool,
    /// Reserve margins on leading edges too and duplicate edge pixels into them.
    pub two_side_margin: bool,
    /// Pixels reserved around each sprite.
    pub margin: u32,
    /// Allocator variants, tried in this order for every resolution.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<PackingAlgorithm>,
    /// Appended to sheet names: `<basename><index><postfix>`.
    #[serde(default)]
    pub texture_postfix: String,
    /// Write `0 0` as crop origin in definition files.
    #[serde(default)]
    pub disable_crop_alpha: bool,
    /// Draw red outlines around every placement (debug).
    #[serde(default)]
    pub debug_outlines: bool,
    /// Pack each definition file into its own sheets.
    #[serde(default)]
    pub split: bool,
    /// Effort passed to GPU compressors.
    #[serde(default)]
    pub convert_quality: ConvertQuality,
    /// Per-GPU format tokens, e.g. `mali: ["ETC1"]`, `origin: []`.
    #[serde(default)]
    pub gpu_params: BTreeMap<GpuFamily, Vec<String>>,

    // texture descriptor draw settings
    #[serde(default)]
    pub generate_mipmaps: bool,
    #[serde(default)]
    pub wrap_mode: WrapMode,
    #[serde(default)]
    pub min_filter: TextureFilter,
    #[serde(default)]
    pub mag_filter: TextureFilter,
    /// Overrides the mip filter implied by `generate_mipmaps`.
    #[serde(default)]
    pub mip_filter: Option<MipFilter>,

    /// Evaluate algorithm variants concurrently when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_texture_size: DEFAULT_TEXTURE_SIZE,
            only_square: false,
            two_side_margin: false,
            margin: 1,
            algorithms: default_algorithms(),
            texture_postfix: String::new(),
            disable_crop_alpha: false,
            debug_outlines: false,
            split: false,
            convert_quality: ConvertQuality::default(),
            gpu_params: BTreeMap::new(),
            generate_mipmaps: false,
            wrap_mode: WrapMode::default(),
            min_filter: TextureFilter::default(),
            mag_filter: TextureFilter::default(),
            mip_filter: None,
            parallel: false,
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - `max_texture_size` is not a power of two in `8..=65536`
    /// - no packing algorithm is configured
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SheetPackerError;

        let size = self.max_texture_size;
        if !is_valid_texture_size(size) {
            return Err(SheetPackerError::InvalidDimensions { size });
        }
        if self.algorithms.is_empty() {
            return Err(SheetPackerError::InvalidConfig(
                "Packing algorithm was not specified".into(),
            ));
        }
        Ok(())
    }

    /// Format tokens supplied for `gpu`, if its flag was set at all.
    pub fn gpu_tokens(&self, gpu: GpuFamily) -> Option<&[String]> {
        self.gpu_params.get(&gpu).map(Vec::as_slice)
    }

    /// Mip filter written to descriptors.
    pub fn effective_mip_filter(&self) -> MipFilter {
        self.mip_filter.unwrap_or(if self.generate_mipmaps {
            MipFilter::Linear
        } else {
            MipFilter::None
        })
    }
}

fn default_algorithms() -> Vec<PackingAlgorithm> {
    vec![
        PackingAlgorithm::MaxRects(MaxRectsHeuristic::BestAreaFit),
        PackingAlgorithm::MaxRects(MaxRectsHeuristic::BestLongSideFit),
        PackingAlgorithm::MaxRects(MaxRectsHeuristic::BestShortSideFit),
        PackingAlgorithm::MaxRects(MaxRectsHeuristic::BottomLeft),
        PackingAlgorithm::MaxRects(MaxRectsHeuristic::ContactPoint),
    ]
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn max_texture_size(mut self, v: u32) -> Self {
        self.cfg.max_texture_size = v;
        self
    }
    pub fn only_square(mut self, v: bool) -> Self {
        self.cfg.only_square = v;
        self
    }
    pub fn two_side_margin(mut self, v: bool) -> Self {
        self.cfg.two_side_margin = v;
        self
    }
    pub fn margin(mut self, v: u32) -> Self {
        self.cfg.margin = v;
        self
    }
    pub fn algorithms(mut self, v: Vec<PackingAlgorithm>) -> Self {
        self.cfg.algorithms = v;
        self
    }
    pub fn preset(mut self, v: AlgorithmPreset) -> Self {
        self.cfg.algorithms = v.algorithms();
        self
    }
    pub fn texture_postfix(mut self, v: impl Into<String>) -> Self {
        self.cfg.texture_postfix = v.into();
        self
    }
    pub fn disable_crop_alpha(mut self, v: bool) -> Self {
        self.cfg.disable_crop_alpha = v;
        self
    }
    pub fn debug_outlines(mut self, v: bool) -> Self {
        self.cfg.debug_outlines = v;
        self
    }
    pub fn split(mut self, v: bool) -> Self {
        self.cfg.split = v;
        self
    }
    pub fn convert_quality(mut self, v: ConvertQuality) -> Self {
        self.cfg.convert_quality = v;
        self
    }
    /// Sets the format tokens for one GPU family (marks its flag as present).
    pub fn gpu<S: Into<String>>(mut self, gpu: GpuFamily, tokens: impl IntoIterator<Item = S>) -> Self {
        self.cfg
            .gpu_params
            .insert(gpu, tokens.into_iter().map(Into::into).collect());
        self
    }
    pub fn generate_mipmaps(mut self, v: bool) -> Self {
        self.cfg.generate_mipmaps = v;
        self
    }
    pub fn wrap_mode(mut self, v: WrapMode) -> Self {
        self.cfg.wrap_mode = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}

impl PackerConfig {
    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("basic".parse(), Ok(PackingAlgorithm::Basic));
        assert_eq!(
            "maxrects_bssf".parse(),
            Ok(PackingAlgorithm::MaxRects(MaxRectsHeuristic::BestShortSideFit))
        );
        assert!("maxrects_nope".parse::<PackingAlgorithm>().is_err());
    }

    #[test]
    fn validate_rejects_non_pow2_sizes() {
        let cfg = PackerConfig::builder().max_texture_size(1000).build();
        assert!(cfg.validate().is_err());
        let cfg = PackerConfig::builder().max_texture_size(4).build();
        assert!(cfg.validate().is_err());
        assert!(PackerConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_algorithm_list_is_rejected() {
        let cfg = PackerConfig::builder().algorithms(vec![]).build();
        assert!(cfg.validate().is_err());
    }
}
