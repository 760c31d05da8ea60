use sheet_packer_core::config::PackerConfig;
use sheet_packer_core::error::ErrorLog;
use sheet_packer_core::export_keys::{ImageExportKey, need_square_texture, resolve_export_keys};
use sheet_packer_core::formats::{
    FormatCatalog, GpuFamily, ImageFormat, ImageQuality, PixelFormat, StandardCatalog,
};

fn resolve(cfg: &PackerConfig, gpus: &[GpuFamily]) -> (Vec<ImageExportKey>, ErrorLog) {
    let mut errors = ErrorLog::new();
    let keys = resolve_export_keys(gpus, cfg, &StandardCatalog, &mut errors);
    (keys, errors)
}

fn key(keys: &[ImageExportKey], gpu: GpuFamily) -> ImageExportKey {
    *keys.iter().find(|k| k.gpu == gpu).expect("key for gpu")
}

#[test]
fn unsupported_mali_format_leaves_origin_untouched() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Mali, ["PVR4"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Origin, GpuFamily::Mali]);

    let mali = key(&keys, GpuFamily::Mali);
    assert!(!mali.is_resolved());
    assert!(!mali.to_compress_for_gpu && !mali.to_convert_origin);
    assert_eq!(errors.len(), 1);
    assert!(errors.contains("Incorrect settings were selected for GPU 'mali'"));

    let origin = key(&keys, GpuFamily::Origin);
    assert_eq!(origin.pixel_format, Some(PixelFormat::RGBA8888));
    assert_eq!(origin.image_format, Some(ImageFormat::Png));
    assert!(!need_square_texture(&keys, &StandardCatalog));
}

#[test]
fn origin_ignores_its_tokens() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Origin, ["ETC1", "jpeg"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Origin]);
    assert!(errors.is_empty());
    assert_eq!(keys[0].image_format, Some(ImageFormat::Png));
    assert!(!keys[0].to_convert_origin);
}

#[test]
fn device_without_flags_is_reported() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Adreno, Vec::<String>::new()).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Tegra, GpuFamily::Adreno]);
    assert!(keys.iter().all(|k| !k.is_resolved()));
    assert!(errors.contains("Cannot read compression options for GPU 'tegra'"));
    assert!(errors.contains("Cannot read compression options for GPU 'adreno'"));
}

#[test]
fn pixel_format_is_mandatory() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Adreno, ["webp", "90"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Adreno]);
    assert!(!keys[0].is_resolved());
    assert!(errors.contains("Compression format was not selected for GPU 'adreno'"));
}

#[test]
fn container_must_match_the_compatibility_table() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Tegra, ["ETC1", "dds"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Tegra]);
    assert!(!keys[0].is_resolved());
    assert!(errors.contains("Incorrect settings were selected for GPU 'tegra'"));

    let cfg = PackerConfig::builder().gpu(GpuFamily::Tegra, ["ETC1", "pvr"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Tegra]);
    assert!(errors.is_empty());
    assert_eq!(keys[0].image_format, Some(ImageFormat::Pvr));
    assert!(keys[0].to_compress_for_gpu);
}

#[test]
fn direct_formats_convert_unless_already_rgba8888() {
    let cfg = PackerConfig::builder()
        .gpu(GpuFamily::Mali, ["webp", "80", "RGBA4444"])
        .gpu(GpuFamily::Adreno, ["RGBA8888", "png"])
        .build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Mali, GpuFamily::Adreno]);
    assert!(errors.is_empty(), "{errors:?}");

    let mali = key(&keys, GpuFamily::Mali);
    assert_eq!(mali.pixel_format, Some(PixelFormat::RGBA4444));
    assert_eq!(mali.image_format, Some(ImageFormat::Webp));
    assert_eq!(mali.quality, ImageQuality::Lossy(80));
    assert!(mali.to_convert_origin);
    assert!(!mali.to_compress_for_gpu);

    let adreno = key(&keys, GpuFamily::Adreno);
    assert!(adreno.is_resolved());
    assert!(!adreno.to_convert_origin);
}

#[test]
fn compressed_formats_cannot_be_written_directly() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Mali, ["ETC1", "png"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Mali]);
    assert!(!keys[0].is_resolved());
    assert!(errors.contains("Can't convert to 'ETC1'"));
}

#[test]
fn block_compression_requires_square_sheets() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Dx11, ["DXT5"]).build();
    let (keys, errors) = resolve(&cfg, &[GpuFamily::Origin, GpuFamily::Dx11]);
    assert!(errors.is_empty());
    let dx = key(&keys, GpuFamily::Dx11);
    assert_eq!(dx.image_format, Some(ImageFormat::Dds));
    assert!(dx.to_compress_for_gpu);
    assert!(dx.needs_square(&StandardCatalog));
    assert!(need_square_texture(&keys, &StandardCatalog));
}

#[test]
fn all_families_expand_to_one_key_each() {
    let cfg = PackerConfig::default();
    let mut gpus = GpuFamily::all();
    gpus.push(GpuFamily::Origin);
    let (keys, errors) = resolve(&cfg, &gpus);
    assert_eq!(keys.len(), GpuFamily::ALL.len());
    assert_eq!(keys.iter().filter(|k| k.is_resolved()).count(), 1);
    assert_eq!(errors.len(), GpuFamily::ALL.len() - 1);
}

/// Catalog that claims every device stores PVR, so the support check is the
/// one that rejects.
struct PvrEverywhere;

impl FormatCatalog for PvrEverywhere {
    fn pixel_format_by_name(&self, name: &str) -> Option<PixelFormat> {
        StandardCatalog.pixel_format_by_name(name)
    }
    fn image_format_by_name(&self, name: &str) -> Option<ImageFormat> {
        StandardCatalog.image_format_by_name(name)
    }
    fn compressed_file_format(&self, gpu: GpuFamily, _format: PixelFormat) -> Option<ImageFormat> {
        gpu.is_device().then_some(ImageFormat::Pvr)
    }
    fn is_format_supported(&self, gpu: GpuFamily, format: PixelFormat) -> bool {
        StandardCatalog.is_format_supported(gpu, format)
    }
    fn can_convert_from_rgba8888(&self, format: PixelFormat) -> bool {
        StandardCatalog.can_convert_from_rgba8888(format)
    }
    fn requires_square(&self, format: PixelFormat) -> bool {
        StandardCatalog.requires_square(format)
    }
}

#[test]
fn unsupported_compression_is_reported_by_name() {
    let cfg = PackerConfig::builder().gpu(GpuFamily::Mali, ["PVR4"]).build();
    let mut errors = ErrorLog::new();
    let keys = resolve_export_keys(&[GpuFamily::Mali], &cfg, &PvrEverywhere, &mut errors);
    assert!(!keys[0].is_resolved());
    assert!(errors.contains("Compression format 'PVR4' is not supported for GPU 'mali'"));
}
