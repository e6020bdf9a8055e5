use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Result, anyhow};
use clap::Parser;
use pdf_reflow_translator::{Config, DocumentError, RunHooks};

/// Exit status for a run stopped with Ctrl-C.
const EXIT_CANCELED: i32 = 130;

const PROGRESS_WIDTH: usize = 30;

#[derive(Parser, Debug)]
#[command(
    name = "pdf-reflow-translator",
    version,
    about = "Translate the text of a PDF in place, keeping its layout"
)]
struct Cli {
    /// PDF to translate
    input: Option<PathBuf>,

    /// Where to write the translated PDF
    output: Option<PathBuf>,

    /// Target language code (overrides settings)
    #[arg(short = 't', long = "target")]
    target: Option<String>,

    /// Source language code (overrides settings)
    #[arg(short = 's', long = "source")]
    source: Option<String>,

    /// Translation backend: libretranslate or identity
    #[arg(long = "backend")]
    backend: Option<String>,

    /// Base URL of the LibreTranslate server
    #[arg(long = "url")]
    url: Option<String>,

    /// Read an additional settings file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// List target languages offered for the source language and exit
    #[arg(long = "list-targets")]
    list_targets: bool,

    /// Print the planned replacements as JSON instead of writing a PDF
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pdf_reflow_translator::logging::init(cli.verbose)?;

    let show_progress = !(cli.list_targets || cli.dry_run);
    let hooks = RunHooks {
        progress: show_progress.then(|| {
            Arc::new(print_progress) as Arc<dyn Fn(usize, usize) + Send + Sync>
        }),
        cancel: Arc::default(),
    };
    let cancel = hooks.cancel.clone();
    let config = Config {
        input: cli.input,
        output: cli.output,
        target: cli.target,
        source: cli.source,
        backend: cli.backend,
        url: cli.url,
        settings_path: cli.read_settings,
        list_targets: cli.list_targets,
        dry_run: cli.dry_run,
    };

    let mut job = tokio::task::spawn_blocking(move || pdf_reflow_translator::run(config, hooks));
    let joined = tokio::select! {
        joined = &mut job => joined,
        _ = tokio::signal::ctrl_c() => {
            cancel.store(true, Ordering::Relaxed);
            eprintln!("\nstopping at the next line...");
            job.await
        }
    };
    let result = joined.map_err(|err| anyhow!("translation worker failed: {}", err))?;

    if show_progress && io::stderr().is_terminal() {
        eprintln!();
    }
    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(err) if matches!(err.downcast_ref::<DocumentError>(), Some(DocumentError::Canceled)) => {
            eprintln!("translation canceled");
            std::process::exit(EXIT_CANCELED);
        }
        Err(err) => Err(err),
    }
}

fn print_progress(current: usize, total: usize) {
    let ratio = if total == 0 {
        1.0
    } else {
        current as f64 / total as f64
    };
    let filled = ((ratio * PROGRESS_WIDTH as f64).round() as usize).min(PROGRESS_WIDTH);
    let mut stderr = io::stderr();
    let _ = write!(
        stderr,
        "\r|{}{}| {:.2}% ({}/{})",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        ratio * 100.0,
        current,
        total
    );
    let _ = stderr.flush();
}
