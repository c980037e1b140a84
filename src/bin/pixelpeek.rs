use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};

/// Render one split-view comparison frame of two images to a PNG.
#[derive(Parser, Debug)]
#[command(name = "pixelpeek", version)]
struct Cli {
    /// First image (left / top side of the split).
    #[arg(long)]
    left: PathBuf,

    /// Second image (right / bottom side of the split).
    #[arg(long)]
    right: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Split ratio in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    ratio: f64,

    #[arg(long, value_enum, default_value_t = OrientationChoice::Vertical)]
    orientation: OrientationChoice,

    #[arg(long, value_enum, default_value_t = DiffChoice::Off)]
    diff: DiffChoice,

    #[arg(long, value_enum, default_value_t = ChannelChoice::All)]
    channel: ChannelChoice,

    /// Enable the magnifier lenses.
    #[arg(long)]
    magnifier: bool,

    /// Capture position as "x,y" relative coordinates.
    #[arg(long, default_value = "0.5,0.5")]
    pos: String,

    /// Lens diameter as a fraction of the shorter image dimension.
    #[arg(long, default_value_t = 0.25)]
    lens_size: f64,

    /// Capture-circle diameter as a fraction of the shorter image dimension.
    #[arg(long, default_value_t = 0.08)]
    capture_size: f64,

    /// Lens spacing fraction; below the merge threshold the lenses merge.
    #[arg(long, default_value_t = 0.05)]
    spacing: f64,

    /// Optional JSON view config overriding style and quality settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Label the two sides with their file names.
    #[arg(long)]
    names: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrientationChoice {
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DiffChoice {
    Off,
    Highlight,
    Grayscale,
    Ssim,
    Edges,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChannelChoice {
    All,
    Red,
    Green,
    Blue,
    Luma,
}

/// Optional on-disk overrides for the stylable parts of the context.
#[derive(Debug, Default, serde::Deserialize)]
struct ViewConfig {
    #[serde(default)]
    style: Option<pixelpeek::Style>,
    #[serde(default)]
    quality: Option<pixelpeek::QualityProfile>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let full_a = load_rgba(&cli.left)?;
    let full_b = load_rgba(&cli.right)?;
    let (pos_x, pos_y) = parse_pos(&cli.pos)?;

    let config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ViewConfig::default(),
    };
    let quality = config.quality.unwrap_or_default();

    // Unify to the smaller common size for the base comparison; lenses keep
    // sampling the originals at native resolution.
    let unified_w = full_a.width().min(full_b.width());
    let unified_h = full_a.height().min(full_b.height());
    let main_filter = quality
        .resolve(pixelpeek::InterpUsage::Main, false)
        .filter();
    let unify = |img: &image::RgbaImage| {
        if img.dimensions() == (unified_w, unified_h) {
            img.clone()
        } else {
            image::imageops::resize(img, unified_w, unified_h, main_filter)
        }
    };

    let sources = pixelpeek::SourcePair {
        unified_a: Arc::new(unify(&full_a)),
        unified_b: Arc::new(unify(&full_b)),
        full_a: Arc::new(full_a),
        full_b: Arc::new(full_b),
        id_a: pixelpeek::SourceId(1),
        id_b: pixelpeek::SourceId(2),
    };

    let mut ctx = pixelpeek::RenderContext::new(
        sources,
        pixelpeek::SplitState::new(
            cli.ratio,
            match cli.orientation {
                OrientationChoice::Vertical => pixelpeek::Orientation::Vertical,
                OrientationChoice::Horizontal => pixelpeek::Orientation::Horizontal,
            },
        ),
    );
    ctx.diff_mode = match cli.diff {
        DiffChoice::Off => pixelpeek::DiffMode::Off,
        DiffChoice::Highlight => pixelpeek::DiffMode::Highlight,
        DiffChoice::Grayscale => pixelpeek::DiffMode::Grayscale,
        DiffChoice::Ssim => pixelpeek::DiffMode::Ssim,
        DiffChoice::Edges => pixelpeek::DiffMode::Edges,
    };
    ctx.channel_mode = match cli.channel {
        ChannelChoice::All => pixelpeek::ChannelMode::All,
        ChannelChoice::Red => pixelpeek::ChannelMode::Red,
        ChannelChoice::Green => pixelpeek::ChannelMode::Green,
        ChannelChoice::Blue => pixelpeek::ChannelMode::Blue,
        ChannelChoice::Luma => pixelpeek::ChannelMode::Luma,
    };
    ctx.magnifier.enabled = cli.magnifier;
    ctx.magnifier.position = pixelpeek::RelPoint::new(pos_x, pos_y);
    ctx.magnifier.size_frac = cli.lens_size;
    ctx.magnifier.capture_frac = cli.capture_size;
    ctx.magnifier.spacing_frac = cli.spacing;

    if let Some(style) = config.style {
        ctx.style = style;
    }
    ctx.quality = quality;

    if cli.names {
        let name = |p: &PathBuf| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        ctx.filenames = Some((name(&cli.left), name(&cli.right)));
    }

    let mut cache = pixelpeek::RenderCache::new();
    let frame = pixelpeek::render_frame(
        &ctx,
        &mut cache,
        &pixelpeek::AbsDiff::default(),
        &pixelpeek::NullOverlay,
    )?;

    if let Some(parent) = cli.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &cli.out,
        frame.canvas.as_raw(),
        frame.canvas.width(),
        frame.canvas.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", cli.out.display()))?;

    eprintln!(
        "wrote {} ({}x{}, pad {},{})",
        cli.out.display(),
        frame.canvas.width(),
        frame.canvas.height(),
        frame.pad_left,
        frame.pad_top
    );
    Ok(())
}

fn load_rgba(path: &PathBuf) -> anyhow::Result<image::RgbaImage> {
    let img = image::open(path).with_context(|| format!("open image '{}'", path.display()))?;
    Ok(img.to_rgba8())
}

fn read_config(path: &PathBuf) -> anyhow::Result<ViewConfig> {
    let f = File::open(path).with_context(|| format!("open view config '{}'", path.display()))?;
    let cfg: ViewConfig =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse view config JSON")?;
    Ok(cfg)
}

fn parse_pos(pos: &str) -> anyhow::Result<(f64, f64)> {
    let parts: Vec<&str> = pos.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("invalid --pos format, expected \"x,y\"");
    }
    let x: f64 = parts[0].trim().parse().context("invalid --pos x")?;
    let y: f64 = parts[1].trim().parse().context("invalid --pos y")?;
    Ok((x, y))
}
