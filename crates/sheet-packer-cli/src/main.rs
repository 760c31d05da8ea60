use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use sheet_packer_core::config::AlgorithmPreset;
use sheet_packer_core::definition::DefinitionFile;
use sheet_packer_core::definition_text::DefinitionText;
use sheet_packer_core::descriptor::{DESCRIPTOR_EXTENSION, SheetDescriptor};
use sheet_packer_core::error::ErrorLog;
use sheet_packer_core::export_keys::ImageExportKey;
use sheet_packer_core::flags::{FlagSet, apply_flags, requested_gpus};
use sheet_packer_core::formats::{ConvertQuality, GpuFamily};
use sheet_packer_core::io::{FsSink, NoCompressor, OutputSink, TextureCompressor};
use sheet_packer_core::layout::SpritesheetLayout;
use sheet_packer_core::loader::{ProcessedFrames, STRIP_EXTENSION, load_png_definition};
use sheet_packer_core::{PackerConfig, SheetPackerError, TexturePacker};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Flags file looked up in every input directory.
const FLAGS_FILE: &str = "flags.txt";
/// Scratch directory for cropped frame images, inside the output directory.
const PROCESS_DIR: &str = ".process";

#[derive(Parser, Debug)]
#[command(
    name = "sheet-packer",
    about = "Pack sprite folders into GPU spritesheets and definition files",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack the PNG sprites of every directory under a root
    Pack(PackArgs),
    /// Print a definition file (.txt) or sheet descriptor (.tex) as JSON
    Inspect(InspectArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Input directory holding `<name>.png` sprites (and optional `<name>.pngdef` strips).
    /// Every subdirectory is packed on its own into the same relative path under the output.
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// YAML config file path (applied before flags)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Flags file for the input root; defaults to `<input>/flags.txt` when present.
    /// Subdirectories always read their own `flags.txt`
    #[arg(long, help_heading = "Input/Output")]
    flags: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
    /// Keep the cropped frame images in `<out_dir>/.process`
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    keep_process: bool,

    // Layout
    /// Max sheet side (power of two)
    #[arg(long, help_heading = "Layout")]
    tsize: Option<u32>,
    /// Only try square sheets
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    square: bool,
    /// Pack each sprite into its own sheets
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    split: bool,
    /// Algorithm preset: maxrect | maxrect_fast | basic
    #[arg(long, help_heading = "Layout")]
    alg: Option<String>,
    /// Pixels reserved around each sprite
    #[arg(long, help_heading = "Layout")]
    margin: Option<u32>,
    /// Reserve margins on every side and duplicate edge pixels into them
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    two_side_margin: bool,
    /// Evaluate algorithms in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    parallel: bool,

    // Export
    /// GPU families to export for (repeatable); defaults to the families named in flags, else origin
    #[arg(long = "gpu", help_heading = "Export")]
    gpus: Vec<String>,
    /// External compressor program, run as `<program> <source> <gpu> <pixel-format> <quality> <output>`
    #[arg(long, help_heading = "Export")]
    compressor: Option<PathBuf>,
    /// Draw red outlines around every placement (debug)
    #[arg(long, default_value_t = false, help_heading = "Export")]
    outlines: bool,
    /// Print the merged configuration (after YAML/flags/CLI) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
}

#[derive(Parser, Debug, Clone)]
struct InspectArgs {
    /// Definition (.txt) or descriptor (.tex) file
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let mut base = PackerConfig::default();
    if let Some(path) = &cli.config {
        let file = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)?;
        y.apply(&mut base);
    }

    let jobs = gather_jobs(cli)?;
    if cli.print_config {
        let root_flags = jobs.first().map(|j| j.flags.clone()).unwrap_or_default();
        let cfg = job_config(&base, &root_flags, cli)?;
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let external = cli.compressor.clone().map(ExternalCompressor::new);
    let compressor: &dyn TextureCompressor = match &external {
        Some(c) => c,
        None => &NoCompressor,
    };

    let mut errors = ErrorLog::new();
    let mut sprites = 0usize;
    for job in jobs.iter().filter(|j| !j.sprites.is_empty()) {
        match pack_directory(job, &base, cli, compressor, show_progress, &mut errors) {
            Ok(n) => sprites += n,
            Err(e) => errors.add(format!("{e:#}")),
        }
    }

    if !cli.keep_process {
        let process_dir = cli.out_dir.join(PROCESS_DIR);
        if let Err(e) = fs::remove_dir_all(&process_dir) {
            debug!(path = %process_dir.display(), "cannot remove process dir: {e}");
        }
    }

    errors.report();
    if sprites == 0 && errors.is_empty() {
        anyhow::bail!("no sprites found under {}", cli.input.display());
    }
    if !errors.is_empty() {
        anyhow::bail!("finished with {} error(s)", errors.len());
    }
    info!(directories = jobs.len(), sprites, "done");
    Ok(())
}

/// One input directory, packed on its own into the mirrored output directory.
#[derive(Debug)]
struct PackJob {
    input: PathBuf,
    output: PathBuf,
    process: PathBuf,
    flags: FlagSet,
    sprites: Vec<PathBuf>,
}

/// Defaults and YAML, then the directory's flags, then command-line options.
fn job_config(base: &PackerConfig, flags: &FlagSet, cli: &PackArgs) -> anyhow::Result<PackerConfig> {
    let mut cfg = base.clone();
    apply_flags(&mut cfg, flags);
    apply_args(cli, &mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

fn pack_directory(
    job: &PackJob,
    base: &PackerConfig,
    cli: &PackArgs,
    compressor: &dyn TextureCompressor,
    show_progress: bool,
    errors: &mut ErrorLog,
) -> anyhow::Result<usize> {
    let cfg = job_config(base, &job.flags, cli)
        .with_context(|| format!("bad configuration for {}", job.input.display()))?;
    let gpus = select_gpus(cli, &job.flags)?;
    let defs = load_definitions_with_progress(&job.sprites, &job.process, show_progress, errors)?;
    if defs.is_empty() {
        return Ok(0);
    }
    fs::create_dir_all(&job.output).with_context(|| format!("create {}", job.output.display()))?;
    info!(dir = %job.input.display(), sprites = defs.len(), gpus = ?gpus, "packing directory");

    let frames = ProcessedFrames::new(FsSink, &job.process);
    let mut packer = TexturePacker::new(cfg).with_compressor(compressor);
    let result = packer.pack(&job.output, &defs, &gpus, &frames, &mut FsSink);
    errors.extend(packer.into_errors());
    let out = result.with_context(|| format!("packing {} failed", job.input.display()))?;

    let (used, total) = out.sheets.iter().fold((0u64, 0u64), |(u, t), s| {
        (u + s.layout.packed_weight(), t + s.layout.area())
    });
    let occupancy = if total > 0 { used as f64 / total as f64 } else { 0.0 };
    info!(
        dir = %job.output.display(),
        sheets = out.sheets.len(),
        definitions = out.definitions.len(),
        used_area = used,
        total_area = total,
        occupancy = format!("{:.2}%", occupancy * 100.0),
        "stats"
    );
    Ok(defs.len())
}

fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.path).with_context(|| format!("read {}", args.path.display()))?;
    let is_descriptor = args
        .path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| format!(".{e}") == DESCRIPTOR_EXTENSION);
    let json = if is_descriptor {
        serde_json::to_string_pretty(&SheetDescriptor::from_bytes(&bytes)?)?
    } else {
        let text = String::from_utf8(bytes).context("definition is not UTF-8")?;
        let def: DefinitionText = text.parse()?;
        serde_json::to_string_pretty(&def)?
    };
    println!("{json}");
    Ok(())
}

fn read_flags_file(path: &Path) -> anyhow::Result<FlagSet> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    debug!(path = %path.display(), "flags loaded");
    Ok(FlagSet::parse(&text))
}

/// `<dir>/flags.txt`, or no flags. Flags never carry over between directories.
fn directory_flags(dir: &Path) -> anyhow::Result<FlagSet> {
    let path = dir.join(FLAGS_FILE);
    if path.is_file() {
        read_flags_file(&path)
    } else {
        Ok(FlagSet::default())
    }
}

fn apply_args(cli: &PackArgs, cfg: &mut PackerConfig) -> anyhow::Result<()> {
    if let Some(v) = cli.tsize {
        cfg.max_texture_size = v;
    }
    if let Some(v) = &cli.alg {
        let preset: AlgorithmPreset = v
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown algorithm preset: {v}"))?;
        cfg.algorithms = preset.algorithms();
    }
    if let Some(v) = cli.margin {
        cfg.margin = v;
    }
    cfg.only_square |= cli.square;
    cfg.split |= cli.split;
    cfg.two_side_margin |= cli.two_side_margin;
    cfg.debug_outlines |= cli.outlines;
    cfg.parallel |= cli.parallel;
    Ok(())
}

fn select_gpus(cli: &PackArgs, flags: &FlagSet) -> anyhow::Result<Vec<GpuFamily>> {
    if !cli.gpus.is_empty() {
        return cli
            .gpus
            .iter()
            .map(|g| {
                if g.eq_ignore_ascii_case("all") {
                    return Ok(GpuFamily::all());
                }
                g.parse::<GpuFamily>()
                    .map(|f| vec![f])
                    .map_err(|_| anyhow::anyhow!("unknown GPU family: {g}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map(|v| v.concat());
    }
    let from_flags = requested_gpus(flags);
    if from_flags.is_empty() {
        Ok(vec![GpuFamily::Origin])
    } else {
        Ok(from_flags)
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

/// Input root and every non-hidden subdirectory, parents first.
fn gather_jobs(cli: &PackArgs) -> anyhow::Result<Vec<PackJob>> {
    let inc_set = build_globset(&cli.include)?;
    let exc_set = build_globset(&cli.exclude)?;
    let mut jobs = Vec::new();
    let walker = WalkDir::new(&cli.input)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || (e.file_type().is_dir() && !is_hidden(e.file_name()) && e.path() != cli.out_dir)
        });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let rel = dir.strip_prefix(&cli.input)?;
        let flags = match &cli.flags {
            Some(path) if entry.depth() == 0 => read_flags_file(path)?,
            _ => directory_flags(dir)?,
        };
        jobs.push(PackJob {
            input: dir.to_path_buf(),
            output: cli.out_dir.join(rel),
            process: cli.out_dir.join(PROCESS_DIR).join(rel),
            flags,
            sprites: directory_sprites(dir, inc_set.as_ref(), exc_set.as_ref())?,
        });
    }
    Ok(jobs)
}

fn directory_sprites(dir: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> anyhow::Result<Vec<PathBuf>> {
    let mut list = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let p = entry.path();
        if entry.file_type().is_file() && is_png(p) && !should_skip(p, include, exclude) {
            list.push(p.to_path_buf());
        }
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat)?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if exclude.is_some_and(|ex| ex.is_match(&s)) {
        return true;
    }
    include.is_some_and(|inc| !inc.is_match(&s))
}

fn is_png(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

fn load_definitions_with_progress(
    paths: &[PathBuf],
    process_dir: &Path,
    progress: bool,
    errors: &mut ErrorLog,
) -> anyhow::Result<Vec<DefinitionFile>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut sink = FsSink;
    let mut list: Vec<DefinitionFile> = Vec::with_capacity(paths.len());
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        match load_png_definition(p, process_dir, &mut sink) {
            Ok(def) if list.iter().any(|d| d.filename == def.filename) => {
                warn!(?p, definition = %def.filename, "duplicate sprite name, skipped");
                errors.add(format!("Duplicate sprite name: {}", def.filename));
            }
            Ok(def) => list.push(def),
            Err(e) => {
                error!(?p, error = %e, "skip sprite");
                errors.add(format!("Cannot load sprite {}: {e}", p.display()));
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    let strips = paths.iter().filter(|p| p.with_extension(STRIP_EXTENSION).is_file()).count();
    debug!(sprites = list.len(), strips, "definitions ready");
    Ok(list)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

/// Runs an external program per compressed sheet.
struct ExternalCompressor {
    program: PathBuf,
}

impl ExternalCompressor {
    fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl TextureCompressor for ExternalCompressor {
    fn compress(
        &self,
        source: &Path,
        output: &Path,
        key: &ImageExportKey,
        quality: ConvertQuality,
        sink: &mut dyn OutputSink,
    ) -> sheet_packer_core::Result<()> {
        let pixel_format = key
            .pixel_format
            .ok_or_else(|| SheetPackerError::Compression(format!("unresolved key for GPU '{}'", key.gpu)))?;
        debug!(program = %self.program.display(), gpu = %key.gpu, %pixel_format, "compress");
        let status = Command::new(&self.program)
            .arg(source)
            .arg(key.gpu.name())
            .arg(pixel_format.name())
            .arg(quality.level().to_string())
            .arg(output)
            .status()?;
        if !status.success() {
            return Err(SheetPackerError::Compression(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        if !sink.exists(output) {
            return Err(SheetPackerError::Compression(format!(
                "{} did not produce {}",
                self.program.display(),
                output.display()
            )));
        }
        Ok(())
    }
}

/// Packing options read from `--config`. Missing keys keep their defaults.
#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    max_texture_size: Option<u32>,
    only_square: Option<bool>,
    two_side_margin: Option<bool>,
    margin: Option<u32>,
    alg: Option<String>,
    texture_postfix: Option<String>,
    disable_crop_alpha: Option<bool>,
    debug_outlines: Option<bool>,
    split: Option<bool>,
    quality: Option<i64>,
    generate_mipmaps: Option<bool>,
    parallel: Option<bool>,
    /// GPU family name -> format tokens, as in flags (`mali: [ETC1]`).
    #[serde(default)]
    gpu: BTreeMap<String, Vec<String>>,
}

impl YamlConfig {
    fn apply(self, cfg: &mut PackerConfig) {
        if let Some(v) = self.max_texture_size {
            cfg.max_texture_size = v;
        }
        if let Some(v) = self.only_square {
            cfg.only_square = v;
        }
        if let Some(v) = self.two_side_margin {
            cfg.two_side_margin = v;
        }
        if let Some(v) = self.margin {
            cfg.margin = v;
        }
        if let Some(v) = self.alg {
            match v.parse::<AlgorithmPreset>() {
                Ok(p) => cfg.algorithms = p.algorithms(),
                Err(()) => warn!("unknown algorithm preset in config: {v}"),
            }
        }
        if let Some(v) = self.texture_postfix {
            cfg.texture_postfix = v;
        }
        if let Some(v) = self.disable_crop_alpha {
            cfg.disable_crop_alpha = v;
        }
        if let Some(v) = self.debug_outlines {
            cfg.debug_outlines = v;
        }
        if let Some(v) = self.split {
            cfg.split = v;
        }
        if let Some(v) = self.quality {
            cfg.convert_quality = ConvertQuality::from_level(v).unwrap_or(cfg.convert_quality);
        }
        if let Some(v) = self.generate_mipmaps {
            cfg.generate_mipmaps = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        for (name, tokens) in self.gpu {
            match name.parse::<GpuFamily>() {
                Ok(g) => {
                    cfg.gpu_params.insert(g, tokens);
                }
                Err(()) => warn!("unknown GPU family in config: {name}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_config_overrides_defaults() {
        let y: YamlConfig = serde_yaml::from_str(
            "max_texture_size: 512\nalg: basic\nquality: 1\ngpu:\n  mali: [ETC1]\n  nope: []\n",
        )
        .unwrap();
        let mut cfg = PackerConfig::default();
        y.apply(&mut cfg);
        assert_eq!(cfg.max_texture_size, 512);
        assert_eq!(cfg.algorithms, AlgorithmPreset::Basic.algorithms());
        assert_eq!(cfg.convert_quality, ConvertQuality::Fast);
        assert_eq!(cfg.gpu_params.len(), 1);
        assert!(cfg.gpu_tokens(GpuFamily::Mali).is_some());
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sheet-packer-cli-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sprite(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 200, 30, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn every_directory_is_packed_on_its_own() {
        let root = scratch_dir("tree");
        let input = root.join("gfx");
        let out = root.join("out");
        sprite(&input.join("ui/hero.png"));
        fs::write(input.join("ui/flags.txt"), "--split --tsize 256").unwrap();
        sprite(&input.join("world/hero.png"));
        sprite(&input.join("world/.cache/ghost.png"));

        let args = PackArgs::try_parse_from([
            OsStr::new("pack"),
            input.as_os_str(),
            OsStr::new("--out-dir"),
            out.as_os_str(),
        ])
        .unwrap();

        let jobs = gather_jobs(&args).unwrap();
        let outputs: Vec<PathBuf> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(outputs, [out.clone(), out.join("ui"), out.join("world")]);
        assert!(jobs[0].sprites.is_empty());
        assert!(jobs[1].flags.is_set("--split"));
        assert!(!jobs[2].flags.is_set("--split"), "flags stay with their directory");
        assert_eq!(jobs[2].sprites, [input.join("world/hero.png")]);
        assert_eq!(jobs[2].process, out.join(PROCESS_DIR).join("world"));

        run_pack(&args, false).unwrap();
        assert!(out.join("ui/hero.txt").is_file());
        assert!(out.join("ui/hero0.png").is_file());
        assert!(out.join("world/hero.txt").is_file());
        assert!(out.join("world/texture0.png").is_file());
        assert!(out.join("world/texture0.tex").is_file());
        assert!(!out.join(PROCESS_DIR).exists());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn skip_rules_follow_globs() {
        let exc = build_globset(&["**/ui/**".into()]).unwrap();
        assert!(should_skip(Path::new("in/ui/button.png"), None, exc.as_ref()));
        assert!(!should_skip(Path::new("in/hero.png"), None, exc.as_ref()));
        assert!(is_png(Path::new("a/B.PNG")));
        assert!(!is_png(Path::new("a/b.pngdef")));
    }
}
