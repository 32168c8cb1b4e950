//! rtl-epub - Convert exported EPUB files to a right-to-left layout

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use rtl_epub::{ConvertOptions, DEFAULT_MANIFEST_PATH, MarkupRewriter, convert};

#[derive(Parser)]
#[command(name = "rtl-epub")]
#[command(version, about = "Convert an exported Google Docs EPUB to a formatted RTL ebook", long_about = None)]
#[command(after_help = "EXAMPLES:
    rtl-epub book.epub                     Convert in place
    rtl-epub book.epub -o book-rtl.epub    Write to a new file
    rtl-epub book.epub --work-dir temp_epub --clean-after false
                                           Keep the extracted files for inspection")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output EPUB file. Defaults to overwriting the input
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Remove the working directory before processing, in case a previous run left it there
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    clean_before: bool,

    /// Remove the working directory when done
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    clean_after: bool,

    /// Stage files in this directory instead of a fresh temporary one.
    /// With --clean-before true, an existing directory here is deleted
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Package document path inside the archive
    #[arg(long, value_name = "PATH", default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,

    /// Do not add the RTL stylesheet to documents that have no <style> element
    #[arg(long)]
    no_inject_style: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let mut options = ConvertOptions::new()
        .with_clean_before(cli.clean_before)
        .with_clean_after(cli.clean_after)
        .with_manifest_path(cli.manifest)
        .with_rewriter(MarkupRewriter::new().with_style_injection(!cli.no_inject_style));
    if let Some(dir) = cli.work_dir {
        options = options.with_work_dir(dir);
    }

    match convert(&cli.input, cli.output.as_deref(), &options) {
        Ok(written) => {
            if !cli.quiet {
                println!("Conversion complete. Output saved to {}", written.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
