//! unbind - Unpack EPUB books for a web reader

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use unbind::{BookId, Processor, ProcessorConfig, TracingLog};

#[derive(Parser)]
#[command(name = "unbind")]
#[command(version, about = "Unpack EPUB books into web-servable assets", long_about = None)]
#[command(after_help = "EXAMPLES:
    unbind book.epub -o /srv/books -s http://localhost:8000/
    unbind book.epub -o out -s /assets/ --id 4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3 --json")]
struct Cli {
    /// EPUB file to unpack
    #[arg(value_name = "EPUB")]
    input: PathBuf,

    /// Directory that receives one subdirectory per book
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Base URL the assets will be served from
    #[arg(short, long, value_name = "URL")]
    server: String,

    /// Book identifier (UUID); a random one is generated if omitted
    #[arg(long, value_name = "UUID")]
    id: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let id = cli.id.unwrap_or_else(|| BookId::new_v4().to_string());
    let config = ProcessorConfig::new(&id, cli.input, cli.output, &cli.server).map_err(|e| e.to_string())?;

    let log = TracingLog::new(config.book_id);
    let summary = Processor::new(config, log).process().map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "Book {id}: {} documents, {} images, {} fonts, {} style files ({} failures)",
            summary.documents.written,
            summary.images.written,
            summary.fonts.written,
            summary.styles.written,
            summary.failures()
        );
    }

    Ok(())
}
