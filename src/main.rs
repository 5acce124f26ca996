use card_gallery::config::{self, GalleryConfig};
use card_gallery::ocr::TesseractCli;
use card_gallery::process::{self, BuildOptions, CancelToken};
use card_gallery::store::FsStore;
use card_gallery::{lock, output, render, scan};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Flags for commands that process images.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Ignore the build cache: regenerate every thumbnail and re-run OCR
    #[arg(long)]
    no_cache: bool,

    /// Skip text recognition (cards get empty text)
    #[arg(long)]
    no_ocr: bool,
}

#[derive(Parser)]
#[command(name = "card-gallery")]
#[command(about = "Static gallery and search index for scanned card images")]
#[command(long_about = "\
Static gallery and search index for scanned card images

Each sub-directory of the source root is a folder of cards:

  CardImages/
  ├── Alpha/
  │   ├── Black Lotus.png
  │   └── Mox Pearl.jpg
  └── Beta/
      └── Shivan Dragon.jpeg

A build writes, under the output root:

  docs/
  ├── cards.json                          # searchable manifest
  ├── index.html                          # folder list + search
  ├── Alpha.html                          # one page per folder
  └── CardImages/Alpha/
      ├── Black Lotus.png                 # full-size copy
      └── thumbnails/Black Lotus.png

Builds are incremental: unchanged cards reuse their thumbnail, text and color.

Run 'card-gallery gen-config' to generate a documented gallery.toml.")]
#[command(version)]
struct Cli {
    /// Config file (optional; stock defaults apply when absent)
    #[arg(long, default_value = "gallery.toml", global = true)]
    config: PathBuf,

    /// Source directory (overrides `source_root`)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Output directory (overrides `output_root`)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Show debug logs on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: scan → thumbnails + OCR → cards.json → pages
    Build(BuildArgs),
    /// Scan the source tree and report stale thumbnails without writing
    Check,
    /// Re-render the HTML pages from an existing cards.json
    Render,
    /// Print a stock gallery.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::load_config(&cli.config)?;
    if let Some(source) = &cli.source {
        config.source_root = source.clone();
    }
    if let Some(output) = &cli.output {
        config.output_root = output.clone();
    }
    let store = FsStore::new();

    match cli.command {
        Command::Build(args) => build(&store, config, &args)?,
        Command::Check => {
            println!("==> Checking {}", config.source_root.display());
            let report = process::check(&store, &config)?;
            output::print_scan_output(&report.folders);
            output::print_check_report(&report);
        }
        Command::Render => {
            println!("==> Rendering {}", config.output_root.display());
            let result = render::render(&store, &config.output_root)?;
            output::print_render_output(&result);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn build(
    store: &FsStore,
    mut config: GalleryConfig,
    args: &BuildArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.no_ocr {
        config.ocr.enabled = false;
    }
    let recognizer = TesseractCli::from_config(&config.ocr);
    if config.ocr.enabled {
        match recognizer.probe() {
            Ok(version) => info!("OCR engine: {version}"),
            Err(e) => {
                return Err(format!("{e}\nInstall tesseract or run with --no-ocr.").into());
            }
        }
    }

    println!("==> Stage 1: Scanning {}", config.source_root.display());
    let folders = scan::scan(store, &config)?;
    output::print_scan_output(&folders);

    let _run_lock = lock::lock(&config.output_root)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Received Ctrl+C, stopping after in-flight cards...");
        handler_token.cancel();
    })?;

    println!("==> Stage 2: Processing cards");
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let options = BuildOptions {
        use_cache: !args.no_cache,
        cancel,
        events: Some(tx),
    };
    let result = process::process_folders(store, &config, &recognizer, &folders, options);
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    let result = result?;
    output::print_build_summary(&result);

    println!("==> Stage 3: Rendering pages");
    let pages = render::render_records(store, &config.output_root, &result.records)?;
    output::print_render_output(&pages);

    println!("==> Build complete: {}", config.output_root.display());
    Ok(())
}

/// Log to stderr so progress output on stdout stays clean.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
