//! md2pdf – command-line Markdown → PDF converter.
//!
//! Usage:
//!   md2pdf --config report.toml input.md [-o output.pdf] [--title "Report"]
//!
//! If `-o` is omitted the PDF is written next to the input file with the same
//! stem (e.g. `report.md` → `report.pdf`).

use std::{fs, path::PathBuf, process};

use clap::Parser;

use md2pdf::pipeline::{PageOrientation, PipelineConfig};
use md2pdf::{Config, Md2Pdf, Md2PdfError, SaveMeta};

/// Convert a Markdown document to PDF using a TOML report configuration.
#[derive(Parser)]
#[command(name = "md2pdf", version, about)]
struct Cli {
    /// Markdown file to convert.
    input: PathBuf,

    /// Report configuration (fonts, styles, reports, defaults).
    #[arg(short, long)]
    config: PathBuf,

    /// Output path (default: input stem with .pdf).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory font paths are relative to (default: the config's directory).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Document title (default: input filename stem).
    #[arg(short, long)]
    title: Option<String>,

    /// Author and creator written into the metadata.
    #[arg(long, default_value = "")]
    name: String,

    /// Metadata keyword; repeat for several.
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Stamp the subject with a content hash of the configuration.
    #[arg(long)]
    version_stamp: bool,

    /// Landscape A4 pages.
    #[arg(short, long)]
    landscape: bool,

    /// Also write the computed page layout as JSON.
    #[arg(long, value_name = "FILE")]
    dump_layout: Option<PathBuf>,
}

fn run(cli: Cli) -> Result<(), Md2PdfError> {
    let config = Config::from_file(&cli.config)?;
    let version = if cli.version_stamp {
        Md2Pdf::version(&config)?
    } else {
        String::new()
    };

    let root = cli
        .root
        .clone()
        .or_else(|| cli.config.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let output = cli.output.clone().unwrap_or_else(|| cli.input.with_extension("pdf"));
    let title = cli.title.clone().unwrap_or_else(|| {
        cli.input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("md2pdf output")
            .to_string()
    });

    let pipeline = PipelineConfig {
        orientation: if cli.landscape {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        },
        ..PipelineConfig::default()
    };

    let mut doc = Md2Pdf::new().with_pipeline(pipeline);
    doc.setup(config, Some(root.as_path()))?.build_from_file(&cli.input)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let meta = SaveMeta {
        title,
        name: cli.name,
        version,
        keywords: cli.keywords,
    };
    let layout = doc.save(&output, &meta)?;

    if let Some(path) = cli.dump_layout {
        fs::write(&path, layout.to_json()?)?;
    }

    let pages = layout.pages.len();
    eprintln!(
        "Wrote '{}' ({} page{})",
        output.display(),
        pages,
        if pages == 1 { "" } else { "s" }
    );
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
