//! CLI binary for ofd2docx.
//!
//! A thin shim over the library crate: maps flags to `BatchConfig` and
//! `ConverterOptions`, asks for the conversion mode when none was given,
//! and prints the batch summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ofd2docx::{
    convert_batch, BatchConfig, BatchProgressCallback, BatchSummary, ConversionMode,
    ConversionOutcome, ConverterOptions, PipelineState, ProgressCallback,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the whole batch; items complete out of order, so each one
/// prints its own line above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("looking for documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_items as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_items} document(s)"))
        ));
    }

    fn on_item_start(&self, file_name: &str) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_item_complete(&self, outcome: &ConversionOutcome) {
        let line = match (outcome.success, outcome.state) {
            (true, PipelineState::AlreadyDone) => format!(
                "  {} {}  {}",
                dim("="),
                outcome.file_name,
                dim("already converted")
            ),
            (true, _) => format!(
                "  {} {}  {}",
                green("✓"),
                outcome.file_name,
                dim(&outcome.output.display().to_string())
            ),
            (false, _) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                let msg = outcome.message.as_deref().unwrap_or("unknown error");
                let msg = if msg.chars().count() > 100 {
                    format!("{}\u{2026}", msg.chars().take(99).collect::<String>())
                } else {
                    msg.to_string()
                };
                format!("  {} {}  {}", red("✗"), outcome.file_name, red(&msg))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_cleanup_start(&self, artifacts: usize) {
        self.bar.set_prefix("Cleaning up");
        self.bar.set_message(format!("{artifacts} intermediate file(s)"));
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} document(s) converted successfully",
                green("✔"),
                bold(&summary.succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) converted  ({} failed)",
                if summary.succeeded == 0 { red("✘") } else { cyan("⚠") },
                bold(&summary.succeeded.to_string()),
                summary.total(),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask for the mode interactively, convert ./ofds into ./out
  ofd2docx

  # Plain text, 4 workers
  ofd2docx --mode y1x --jobs 4

  # LibreOffice mode with an explicit executable
  ofd2docx --mode y2 --soffice "/opt/libreoffice/program/soffice"

  # Custom Stage-1 tool and argument template
  ofd2docx --mode y1 --stage1-cmd ofdrw-convert --stage1-arg=-i --stage1-arg={input} \
           --stage1-arg=-o --stage1-arg={output}

  # Machine-readable summary
  ofd2docx --mode y1d --json > summary.json

MODES:
  Token  Output            Stage 2 converter    Requires
  ─────  ────────────────  ───────────────────  ───────────
  y1     DOCX, layout      PDFium, page images  libpdfium
  y1x    TXT, text only    PDFium text          libpdfium
  y1d    DOCX, text only   PDFium text          libpdfium
  y2     DOCX, layout      LibreOffice          LibreOffice
  n      quit

NOTES:
  * Every .ofd file under the input directory (recursively) is converted.
  * Outputs land flat in the output directory; duplicate names get _1, _2, …
  * An output that already exists is skipped and counted as converted.
  * Intermediate PDFs are removed after the batch.

ENVIRONMENT VARIABLES:
  OFD2DOCX_SOFFICE   LibreOffice executable for y2
  PDFIUM_LIB_PATH    PDFium shared library for y1 / y1x / y1d
  RUST_LOG           Log filter (overrides -v / -q)
"#;

/// Batch-convert OFD documents to DOCX or TXT.
#[derive(Parser, Debug)]
#[command(
    name = "ofd2docx",
    version,
    about = "Batch-convert OFD documents to DOCX or TXT through a PDF intermediate",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Conversion mode: y1, y1x, y1d or y2. Prompted for when omitted.
    #[arg(long, env = "OFD2DOCX_MODE", value_parser = parse_mode)]
    mode: Option<ConversionMode>,

    /// Directory scanned recursively for .ofd files.
    #[arg(short, long, env = "OFD2DOCX_INPUT", default_value = "ofds")]
    input: PathBuf,

    /// Output directory, created if absent.
    #[arg(short, long, env = "OFD2DOCX_OUTPUT", default_value = "out")]
    output: PathBuf,

    /// Number of documents converted at once. Default: logical CPU count.
    #[arg(short, long, env = "OFD2DOCX_JOBS",
          value_parser = clap::value_parser!(u64).range(1..))]
    jobs: Option<u64>,

    /// Per-stage timeout in seconds; 0 disables it.
    #[arg(long, env = "OFD2DOCX_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Pause before deleting intermediates, in milliseconds.
    #[arg(long, env = "OFD2DOCX_SETTLE_DELAY_MS", default_value_t = 0)]
    settle_delay_ms: u64,

    /// LibreOffice executable (mode y2).
    #[arg(long, env = "OFD2DOCX_SOFFICE")]
    soffice: Option<PathBuf>,

    /// PDFium shared library (modes y1, y1x, y1d).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// OFD → PDF converter program.
    #[arg(long, env = "OFD2DOCX_STAGE1_CMD", default_value = "ofd2pdf")]
    stage1_cmd: String,

    /// Argument for the OFD → PDF program; repeatable. `{input}` and
    /// `{output}` are replaced per document; each value is passed as one
    /// argument, spaces included. Default: `{input} {output}`.
    #[arg(long = "stage1-arg", allow_hyphen_values = true)]
    stage1_args: Vec<String>,

    /// Print the summary as JSON on stdout.
    #[arg(long, env = "OFD2DOCX_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "OFD2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OFD2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OFD2DOCX_QUIET")]
    quiet: bool,
}

fn parse_mode(s: &str) -> std::result::Result<ConversionMode, String> {
    ConversionMode::from_token(s).ok_or_else(|| format!("unknown mode '{s}' (expected y1, y1x, y1d or y2)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters, so library INFO
    // logs are hidden while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Mode selection ───────────────────────────────────────────────────
    let mode = match cli.mode {
        Some(mode) => mode,
        None => {
            let chosen = tokio::task::block_in_place(|| {
                let stdin = io::stdin();
                let stderr = io::stderr();
                print_welcome(&mut stderr.lock(), &cli)?;
                prompt_mode(stdin.lock(), &mut stderr.lock())
            })
            .context("Failed to read the conversion mode")?;

            match chosen {
                Some(mode) => mode,
                None => {
                    eprintln!("Bye.");
                    return Ok(());
                }
            }
        }
    };

    if mode == ConversionMode::External && !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            dim("LibreOffice must be installed for y2; searched in OFD2DOCX_SOFFICE, the usual install paths, then PATH")
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, mode, progress_cb)?;
    let options = ConverterOptions {
        stage1_program: cli.stage1_cmd.clone(),
        stage1_args: if cli.stage1_args.is_empty() {
            ConverterOptions::default().stage1_args
        } else {
            cli.stage1_args.clone()
        },
        soffice: cli.soffice.clone(),
        pdfium_library: cli.pdfium.clone(),
    };

    // ── Run batch ────────────────────────────────────────────────────────
    let summary = convert_batch(&config, &options)
        .await
        .context("Batch conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        println!("{summary}");
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(
    cli: &Cli,
    mode: ConversionMode,
    progress: Option<ProgressCallback>,
) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .input_dir(&cli.input)
        .output_dir(&cli.output)
        .mode(mode)
        .convert_timeout_secs(cli.timeout)
        .settle_delay_ms(cli.settle_delay_ms);

    if let Some(jobs) = cli.jobs {
        builder = builder.concurrency(usize::try_from(jobs).context("--jobs is too large")?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_welcome(out: &mut impl Write, cli: &Cli) -> io::Result<()> {
    writeln!(out, "{}", bold("========================= ofd2docx ========================="))?;
    writeln!(out, "1. Every .ofd file under '{}' (and its subfolders) is converted.", cli.input.display())?;
    writeln!(out, "2. Source files are never modified; results go to '{}'.", cli.output.display())?;
    writeln!(out, "3. Files with the same name get a numeric suffix (a.docx, a_1.docx, …).")?;
    writeln!(out, "4. Each file goes OFD → PDF → final format; quality varies by document.")?;
    writeln!(out, "5. y2 needs LibreOffice installed.")?;
    writeln!(out, "6. Documents are converted in parallel; close heavy programs first.")?;
    writeln!(out, "{}", bold("============================================================"))?;
    writeln!(out, "+--------+-------------------------------------------+")?;
    writeln!(out, "| Option | Conversion                                |")?;
    writeln!(out, "+--------+-------------------------------------------+")?;
    for mode in ConversionMode::ALL {
        writeln!(out, "| {:<6} | {:<41} |", mode.token(), mode.description())?;
    }
    writeln!(out, "| {:<6} | {:<41} |", "n", "quit")?;
    writeln!(out, "+--------+-------------------------------------------+")?;
    Ok(())
}

/// Read tokens until a valid mode, `n`, or end of input.
///
/// Returns `None` for `n` and for end of input.
fn prompt_mode(mut input: impl BufRead, out: &mut impl Write) -> io::Result<Option<ConversionMode>> {
    write!(out, "Enter a command to start, or n to quit (y1/y1x/y1d/y2/n)? ")?;
    out.flush()?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(None);
        }

        let token = line.trim();
        if token.eq_ignore_ascii_case("n") {
            return Ok(None);
        }
        if let Some(mode) = ConversionMode::from_token(token) {
            writeln!(out, "Starting conversion: {}", mode.description())?;
            return Ok(Some(mode));
        }

        write!(out, "Invalid input, please enter a valid command (y1/y1x/y1d/y2/n)? ")?;
        out.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Cursor;

    fn prompt(input: &str) -> (Option<ConversionMode>, String) {
        let mut out = Vec::new();
        let mode = prompt_mode(Cursor::new(input.as_bytes()), &mut out).unwrap();
        (mode, String::from_utf8(out).unwrap())
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn prompt_accepts_tokens_case_insensitively() {
        assert_eq!(prompt(" Y1D \n").0, Some(ConversionMode::TextDocx));
        assert_eq!(prompt("y2\n").0, Some(ConversionMode::External));
    }

    #[test]
    fn prompt_reprompts_on_invalid_token() {
        let (mode, out) = prompt("docx\n\ny1x\n");
        assert_eq!(mode, Some(ConversionMode::Text));
        assert_eq!(out.matches("Invalid input").count(), 2);
    }

    #[test]
    fn prompt_quits_on_n_and_eof() {
        assert_eq!(prompt("N\n").0, None);
        assert_eq!(prompt("").0, None);
        assert_eq!(prompt("what\n").0, None);
    }

    #[test]
    fn mode_flag_parses_tokens() {
        let cli = Cli::try_parse_from(["ofd2docx", "--mode", "Y1X", "--jobs", "3"]).unwrap();
        assert_eq!(cli.mode, Some(ConversionMode::Text));
        assert_eq!(cli.jobs, Some(3));
        assert!(Cli::try_parse_from(["ofd2docx", "--mode", "docx"]).is_err());
        assert!(Cli::try_parse_from(["ofd2docx", "--jobs", "0"]).is_err());
    }

    #[test]
    fn stage1_args_are_repeatable() {
        let cli = Cli::try_parse_from([
            "ofd2docx",
            "--stage1-arg=-i",
            "--stage1-arg={input}",
            "--stage1-arg=-o",
            "--stage1-arg={output}",
        ])
        .unwrap();
        assert_eq!(cli.stage1_args, ["-i", "{input}", "-o", "{output}"]);
    }

    #[test]
    fn stage1_arg_with_spaces_stays_one_argument() {
        let cli = Cli::try_parse_from([
            "ofd2docx",
            "--stage1-arg",
            "--title=Quarterly report",
            "--stage1-arg",
            "{input}",
        ])
        .unwrap();
        assert_eq!(cli.stage1_args, ["--title=Quarterly report", "{input}"]);
    }

    #[test]
    fn build_config_applies_flags() {
        let cli = Cli::try_parse_from(["ofd2docx", "-i", "docs", "-o", "res", "--timeout", "0"]).unwrap();
        let config = build_config(&cli, ConversionMode::Layout, None).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("docs"));
        assert_eq!(config.output_dir, PathBuf::from("res"));
        assert!(config.convert_timeout().is_none());
    }
}
