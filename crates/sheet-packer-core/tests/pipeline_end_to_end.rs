use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use sheet_packer_core::config::PackerConfig;
use sheet_packer_core::error::Result;
use sheet_packer_core::export_keys::ImageExportKey;
use sheet_packer_core::definition::DefinitionFile;
use sheet_packer_core::definition_text::DefinitionText;
use sheet_packer_core::descriptor::SheetDescriptor;
use sheet_packer_core::formats::{ConvertQuality, GpuFamily, ImageFormat, PixelFormat};
use sheet_packer_core::io::{InMemoryFrames, MemorySink, OutputSink, TextureCompressor};
use sheet_packer_core::layout::{Layout, SpritesheetLayout};
use sheet_packer_core::model::{Rect, Size, SpriteId};
use sheet_packer_core::pipeline::TexturePacker;

/// Copies the source bytes to the output and remembers `(source, output, quality)`.
#[derive(Default)]
struct RecordingCompressor {
    calls: RefCell<Vec<(PathBuf, PathBuf, ConvertQuality)>>,
}

impl RecordingCompressor {
    fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> Vec<(PathBuf, PathBuf, ConvertQuality)> {
        self.calls.borrow().clone()
    }
}

impl TextureCompressor for RecordingCompressor {
    fn compress(
        &self,
        source: &Path,
        output: &Path,
        _key: &ImageExportKey,
        quality: ConvertQuality,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let bytes = sink.read(source)?;
        sink.write(output, &bytes)?;
        self.calls
            .borrow_mut()
            .push((source.to_path_buf(), output.to_path_buf(), quality));
        Ok(())
    }
}

fn hero() -> DefinitionFile {
    DefinitionFile::new("hero.txt", 16, 16)
        .with_frame(Rect::new(0, 0, 16, 16), "idle")
        .with_frame(Rect::new(4, 4, 8, 8), "blink")
}

fn coin() -> DefinitionFile {
    DefinitionFile::new("coin.txt", 8, 8).with_frame(Rect::new(0, 0, 8, 8), "spin")
}

fn frames_for(defs: &[DefinitionFile]) -> InMemoryFrames {
    let mut frames = InMemoryFrames::new();
    for def in defs {
        for f in 0..def.frame_count() {
            let s = def.frame_size(f);
            frames.insert(&def.filename, f, RgbaImage::from_pixel(s.w, s.h, Rgba([200, 50, 50, 255])));
        }
    }
    frames
}

fn paths(sink: &MemorySink) -> Vec<PathBuf> {
    sink.paths().map(Path::to_path_buf).collect()
}

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

fn descriptor(sink: &MemorySink, path: &str) -> SheetDescriptor {
    SheetDescriptor::from_bytes(sink.get(path).expect("descriptor written")).unwrap()
}

#[test]
fn origin_only_run_writes_png_descriptor_and_definition() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(PackerConfig::default());
    let out = packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Origin], &frames, &mut sink)
        .unwrap();

    assert!(packer.errors().is_empty(), "{:?}", packer.errors());
    assert_eq!(out.sheets.len(), 1);
    assert_eq!(out.sheets[0].name, "texture0");
    assert_eq!(out.definitions, [p("out/hero.txt")]);
    assert_eq!(
        paths(&sink),
        [p("out/hero.txt"), p("out/texture0.png"), p("out/texture0.tex")]
    );

    let d = descriptor(&sink, "out/texture0.tex");
    assert_eq!(d.exported_for, Some(GpuFamily::Origin));
    assert_eq!(d.compression.len(), 1);
    assert_eq!(d.source_file_format, ImageFormat::Png);

    let png = image::load_from_memory(sink.get("out/texture0.png").unwrap()).unwrap();
    assert_eq!((png.width(), png.height()), out.sheets[0].size());

    let text: DefinitionText = sink.get_str("out/hero.txt").unwrap().parse().unwrap();
    assert_eq!(text.sheet_names, ["texture0.tex"]);
    assert_eq!(text.frames.len(), 2);
    assert_eq!(text.frames[1].name, "blink");
    assert_eq!((text.frames[1].orig_x, text.frames[1].orig_y), (4, 4));
    assert_eq!((text.frames[1].dx, text.frames[1].dy), (8, 8));
}

#[test]
fn compressed_and_origin_keys_share_a_full_descriptor() {
    let defs = vec![hero(), coin()];
    let frames = frames_for(&defs);
    let compressor = RecordingCompressor::new();
    let cfg = PackerConfig::builder().gpu(GpuFamily::Tegra, ["DXT5"]).build();
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(cfg).with_compressor(&compressor);
    let out = packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Origin, GpuFamily::Tegra], &frames, &mut sink)
        .unwrap();
    assert!(packer.errors().is_empty(), "{:?}", packer.errors());

    let (w, h) = out.sheets[0].size();
    assert_eq!(w, h, "block compression needs square sheets");
    assert!(sink.exists(Path::new("out/texture0.png")));
    assert!(sink.exists(Path::new("out/texture0.tegra.dds")));
    assert!(sink.exists(Path::new("out/coin.txt")));

    let d = descriptor(&sink, "out/texture0.tex");
    assert_eq!(d.exported_for, None);
    assert_eq!(d.compression.len(), 2);
    assert_eq!(d.compression[&GpuFamily::Tegra].format, PixelFormat::DXT5);

    let calls = compressor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, p("out/texture0.png"));
    assert_eq!(calls[0].1, p("out/texture0.tegra.dds"));
    assert_eq!(calls[0].2, packer.config().convert_quality);
}

#[test]
fn single_compressed_key_drops_the_source_image() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let compressor = RecordingCompressor::new();
    let cfg = PackerConfig::builder().gpu(GpuFamily::Tegra, ["DXT5"]).build();
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(cfg).with_compressor(&compressor);
    packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Tegra], &frames, &mut sink)
        .unwrap();

    assert_eq!(
        paths(&sink),
        [p("out/hero.txt"), p("out/texture0.tegra.dds"), p("out/texture0.tex")]
    );
    let d = descriptor(&sink, "out/texture0.tex");
    assert_eq!(d.exported_for, Some(GpuFamily::Tegra));
}

#[test]
fn failed_compression_is_recorded_and_the_run_goes_on() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let cfg = PackerConfig::builder().gpu(GpuFamily::Tegra, ["DXT5"]).build();
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(cfg);
    let out = packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Tegra], &frames, &mut sink)
        .unwrap();

    assert!(packer.errors().mentions("Cannot compress texture"));
    assert!(packer.errors().mentions("for GPU 'tegra'"));
    assert!(!sink.exists(Path::new("out/texture0.tegra.dds")));
    assert!(sink.exists(Path::new("out/texture0.png")), "source kept when compression fails");
    assert_eq!(descriptor(&sink, "out/texture0.tex").exported_for, Some(GpuFamily::Tegra));
    assert_eq!(out.definitions.len(), 1);
}

#[test]
fn failed_compression_among_several_keys_keeps_the_full_descriptor() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let cfg = PackerConfig::builder().gpu(GpuFamily::Tegra, ["DXT5"]).build();
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(cfg);
    packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Origin, GpuFamily::Tegra], &frames, &mut sink)
        .unwrap();

    assert!(packer.errors().mentions("Cannot compress texture"));
    assert!(sink.exists(Path::new("out/texture0.png")));
    let d = descriptor(&sink, "out/texture0.tex");
    assert_eq!(d.exported_for, None);
    assert_eq!(d.compression.len(), 2);
}

#[test]
fn direct_device_key_leaves_the_origin_image_alone() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let cfg = PackerConfig::builder()
        .gpu(GpuFamily::Mali, ["RGBA4444", "png"])
        .build();
    for gpus in [[GpuFamily::Origin, GpuFamily::Mali], [GpuFamily::Mali, GpuFamily::Origin]] {
        let mut sink = MemorySink::new();
        let mut packer = TexturePacker::new(cfg.clone());
        packer.pack(Path::new("out"), &defs, &gpus, &frames, &mut sink).unwrap();
        assert!(packer.errors().is_empty(), "{:?}", packer.errors());

        assert_eq!(
            paths(&sink),
            [p("out/hero.txt"), p("out/texture0.mali.png"), p("out/texture0.png"), p("out/texture0.tex")]
        );
        let origin = image::load_from_memory(sink.get("out/texture0.png").unwrap()).unwrap().to_rgba8();
        assert_eq!(origin.get_pixel(0, 0).0, [200, 50, 50, 255], "origin keeps full precision");
        let d = descriptor(&sink, "out/texture0.tex");
        assert_eq!(d.exported_for, None);
        assert_eq!(d.compression.len(), 2);
    }
}

#[test]
fn direct_device_format_is_renamed_for_the_gpu() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let cfg = PackerConfig::builder()
        .gpu(GpuFamily::Mali, ["RGBA4444", "webp", "80"])
        .build();
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(cfg);
    packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Mali], &frames, &mut sink)
        .unwrap();
    assert!(packer.errors().is_empty(), "{:?}", packer.errors());

    assert_eq!(
        paths(&sink),
        [p("out/hero.txt"), p("out/texture0.mali.webp"), p("out/texture0.tex")]
    );
    let d = descriptor(&sink, "out/texture0.tex");
    assert_eq!(d.exported_for, Some(GpuFamily::Mali));
    assert_eq!(d.source_file_format, ImageFormat::Webp);
}

#[test]
fn split_mode_names_sheets_after_each_definition() {
    let defs = vec![hero(), coin()];
    let frames = frames_for(&defs);
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(PackerConfig::builder().split(true).build());
    let out = packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Origin], &frames, &mut sink)
        .unwrap();

    let names: Vec<&str> = out.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["hero0", "coin0"]);
    for f in ["out/hero0.png", "out/hero0.tex", "out/coin0.png", "out/coin0.tex"] {
        assert!(sink.exists(Path::new(f)), "{f} missing");
    }
    let coin: DefinitionText = sink.get_str("out/coin.txt").unwrap().parse().unwrap();
    assert_eq!(coin.sheet_names, ["coin0.tex"]);
}

#[test]
fn sprite_larger_than_max_size_writes_nothing() {
    let giant = DefinitionFile::new("giant.txt", 64, 64).with_frame(Rect::new(0, 0, 64, 64), "");
    let defs = vec![giant];
    let frames = frames_for(&defs);
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(PackerConfig::builder().max_texture_size(32).build());
    let res = packer.pack(Path::new("out"), &defs, &[GpuFamily::Origin], &frames, &mut sink);

    assert!(res.is_err());
    assert!(sink.files.is_empty());
    assert!(packer.errors().mentions("Can't pack any sprite"));
}

#[test]
fn split_mode_skips_only_the_failing_definition() {
    let giant = DefinitionFile::new("giant.txt", 64, 64).with_frame(Rect::new(0, 0, 64, 64), "");
    let defs = vec![giant, coin()];
    let frames = frames_for(&defs);
    let mut sink = MemorySink::new();
    let cfg = PackerConfig::builder().max_texture_size(32).split(true).build();
    let mut packer = TexturePacker::new(cfg);
    let out = packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Origin], &frames, &mut sink)
        .unwrap();

    assert_eq!(out.definitions, [p("out/coin.txt")]);
    assert!(!sink.exists(Path::new("out/giant.txt")));
    assert!(packer.errors().mentions("Can't pack any sprite"));
}

#[test]
fn definition_with_unplaced_frames_is_removed() {
    let defs = vec![coin(), DefinitionFile::new("b.txt", 4, 4).with_frame(Rect::new(0, 0, 4, 4), "")];
    let frames = frames_for(&defs[..1]);
    let mut layout = Layout::create(16, 16, false, 1, sheet_packer_core::config::PackingAlgorithm::Basic);
    assert!(layout.add_sprite(Size::new(8, 8), SpriteId::new(0, 0)));

    let mut sink = MemorySink::new();
    sink.write(Path::new("out/b.txt"), b"stale").unwrap();
    let mut packer = TexturePacker::new(PackerConfig::default());
    let keys = packer.export_keys(&[GpuFamily::Origin]);
    let out = packer
        .save_result_sheets(Path::new("out"), "texture", &defs, vec![layout], &keys, &frames, &mut sink)
        .unwrap();

    assert_eq!(out.definitions, [p("out/coin.txt")]);
    assert!(!sink.exists(Path::new("out/b.txt")));
    assert!(packer.errors().contains(
        "*** FATAL ERROR: Can't find rect in all of packers for frame - 0. Definition file - b.txt."
    ));
    assert!(packer.errors().contains("* ERROR: Failed to write definition - b.txt."));
}

#[test]
fn unresolved_keys_do_not_stop_the_origin_export() {
    let defs = vec![hero()];
    let frames = frames_for(&defs);
    let cfg = PackerConfig::builder().gpu(GpuFamily::Mali, ["PVR4"]).build();
    let mut sink = MemorySink::new();
    let mut packer = TexturePacker::new(cfg);
    packer
        .pack(Path::new("out"), &defs, &[GpuFamily::Origin, GpuFamily::Mali], &frames, &mut sink)
        .unwrap();

    assert_eq!(packer.errors().len(), 1);
    assert!(sink.exists(Path::new("out/texture0.png")));
    assert_eq!(descriptor(&sink, "out/texture0.tex").exported_for, Some(GpuFamily::Origin));
}
