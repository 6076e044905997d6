//! tikzsvg CLI
//!
//! Usage:
//!   tikzsvg convert [OPTIONS] <INPUT> [OUTPUT]
//!
//! Options:
//!   --width <PX>    Canvas width in pixels
//!   --height <PX>   Canvas height in pixels
//!   --scale <S>     Pixels per centimetre
//!
//! Set `RUST_LOG=tikzsvg=debug` to see the pipeline stages and any
//! fallbacks on stderr.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic};

use tikzsvg::RenderConfig;
use tikzsvg::config::{DEFAULT_HEIGHT, DEFAULT_SCALE, DEFAULT_WIDTH};

#[derive(Parser)]
#[command(name = "tikzsvg")]
#[command(about = "Convert TikZ pictures to SVG", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert every tikzpicture in a file to SVG
    Convert {
        /// TikZ or LaTeX source file
        input: PathBuf,

        /// Output file (defaults to the input name with `.svg`)
        output: Option<PathBuf>,

        /// Canvas width in pixels
        #[arg(long, default_value_t = DEFAULT_WIDTH)]
        width: u32,

        /// Canvas height in pixels
        #[arg(long, default_value_t = DEFAULT_HEIGHT)]
        height: u32,

        /// Pixels per centimetre
        #[arg(long, default_value_t = DEFAULT_SCALE)]
        scale: f64,
    },
}

fn main() -> miette::Result<()> {
    // stdout may carry nothing but results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Convert {
            input,
            output,
            width,
            height,
            scale,
        } => {
            let config = RenderConfig::new()
                .with_size(width, height)
                .with_scale(scale);
            convert(&input, output.as_deref(), &config)
        }
    }
}

fn convert(input: &Path, output: Option<&Path>, config: &RenderConfig) -> miette::Result<()> {
    let source = fs::read_to_string(input)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", input.display()))?;

    let svgs = tikzsvg::convert_document(&source, config)?;
    let base = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("svg"));

    for (path, svg) in output_paths(&base, svgs.len()).into_iter().zip(&svgs) {
        fs::write(&path, svg)
            .into_diagnostic()
            .wrap_err_with(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote svg");
    }
    Ok(())
}

/// One path per picture: `base` itself for a single picture, otherwise
/// `<stem>-<n>.svg` next to it.
fn output_paths(base: &Path, count: usize) -> Vec<PathBuf> {
    if count == 1 {
        return vec![base.to_path_buf()];
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "picture".to_string());
    (1..=count)
        .map(|n| base.with_file_name(format!("{stem}-{n}.svg")))
        .collect()
}
