//! CLI binary for imgharvest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `HarvestConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use imgharvest::{
    run_source, HarvestConfig, HarvestProgressCallback, HtmlPageSource, ImageReference,
    ImageSource, ProgressCallback, StaticListSource,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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

/// Cut a string to `max` characters, appending an ellipsis when shortened.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

/// Terminal progress callback: renders a live progress bar and per-image log
/// lines using [indicatif].
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_run_start` (extraction has to finish before the total is known).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Extracting");
        bar.set_message("Fetching page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Downloading");
    }
}

impl HarvestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total} image reference(s)"))
        ));
    }

    fn on_image_start(&self, _index: usize, _total: usize, url: &str) {
        // Truncate long CDN URLs so the message fits on one bar line.
        self.bar.set_message(truncate(url, 60));
    }

    fn on_image_complete(&self, index: usize, total: usize, filename: &str, size_bytes: u64) {
        self.bar.println(format!(
            "  {} [{:>3}/{:<3}] {}  {}",
            green("✓"),
            index,
            total,
            filename,
            dim(&format!("{:.1} KB", size_bytes as f64 / 1024.0)),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, url: &str, error: &str) {
        self.bar.println(format!(
            "  {} [{:>3}/{:<3}] {}  {}",
            red("✗"),
            index,
            total,
            url,
            red(&truncate(error, 60)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, downloaded: usize, failed: usize) {
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} image(s) downloaded",
                green("✔"),
                bold(&downloaded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) downloaded  ({} failed)",
                if downloaded == 0 { red("✘") } else { cyan("⚠") },
                bold(&downloaded.to_string()),
                downloaded + failed,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Harvest all article images from a blog post
  imgharvest https://huggingface.co/blog/continuous_batching -o blog/continuous-batching

  # Scope extraction to a specific container
  imgharvest https://example.com/post --selector ".prose" -o images

  # Download a pre-extracted reference list (JSON array of {url, alt_text})
  imgharvest --refs figures.json -o blog/arxiv-2510.02425

  # List what would be downloaded, without downloading
  imgharvest https://example.com/post --list-only

  # Notion exports: PNG default extension and a Referer header
  imgharvest <notion-url> -o images --default-ext png --referer https://www.notion.so/

  # Print the manifest to stdout as JSON
  imgharvest https://example.com/post -o images --json

OUTPUT LAYOUT:
  <output-dir>/
    gradient_norm_plot.png      one file per downloaded image,
    attention_heads.png         names from alt text or URL basename
    image-014.jpg               (index fallback), deduplicated with -N
    images.json                 manifest: counts, per-file records, failures

POLITENESS:
  Downloads are strictly sequential (one request in flight) with a courtesy
  delay between requests (--delay-ms, default 500). Retries back off
  exponentially from --backoff-ms (default 500).
"#;

/// Harvest article images into files plus a JSON manifest.
#[derive(Parser, Debug)]
#[command(
    name = "imgharvest",
    version,
    about = "Harvest images from blog articles into sanitized files plus a JSON manifest",
    long_about = "Fetch a blog article, extract its image references (img tags, lazy-load \
attributes, picture/source srcsets), download each with bounded retries, and write an \
images.json manifest describing what succeeded and failed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Article URL to harvest images from. Omit when using --refs.
    input: Option<String>,

    /// Output directory for images and the manifest.
    #[arg(short, long, env = "IMGHARVEST_OUTPUT", default_value = "images")]
    output: PathBuf,

    /// JSON file with a pre-extracted reference list instead of a page URL.
    #[arg(long, conflicts_with = "input")]
    refs: Option<PathBuf>,

    /// CSS selector scoping extraction (default: article/main heuristics).
    #[arg(long)]
    selector: Option<String>,

    /// Download attempts per image.
    #[arg(long, env = "IMGHARVEST_RETRIES", default_value_t = 3)]
    retries: u32,

    /// Initial retry backoff in milliseconds (doubles per attempt).
    #[arg(long, env = "IMGHARVEST_BACKOFF_MS", default_value_t = 500)]
    backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "IMGHARVEST_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Courtesy delay between downloads in milliseconds (0 disables).
    #[arg(long, env = "IMGHARVEST_DELAY_MS", default_value_t = 500)]
    delay_ms: u64,

    /// Fallback extension when the URL has no known image extension.
    #[arg(long, env = "IMGHARVEST_DEFAULT_EXT", default_value = "jpg")]
    default_ext: String,

    /// Referer header sent with image requests.
    #[arg(long, env = "IMGHARVEST_REFERER")]
    referer: Option<String>,

    /// Custom User-Agent header.
    #[arg(long, env = "IMGHARVEST_USER_AGENT")]
    user_agent: Option<String>,

    /// Print extracted references as JSON and exit without downloading.
    #[arg(long)]
    list_only: bool,

    /// Print the final manifest to stdout as JSON.
    #[arg(long, env = "IMGHARVEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMGHARVEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMGHARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMGHARVEST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new_dynamic();
        Some(cb)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list_only {
        let refs = extract_references(&cli, &config).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&refs).context("Failed to serialise references")?
        );
        if !cli.quiet {
            eprintln!("{} reference(s) found", refs.len());
        }
        return Ok(());
    }

    // ── Run harvest ──────────────────────────────────────────────────────
    let manifest = if let Some(ref refs_path) = cli.refs {
        let source = StaticListSource::from_json_file(refs_path)
            .await
            .context("Failed to load reference list")?;
        run_source(&source, &config).await.context("Harvest failed")?
    } else {
        let url = cli
            .input
            .clone()
            .context("Provide an article URL or --refs FILE")?;
        let mut source = HtmlPageSource::new(url);
        if let Some(ref sel) = cli.selector {
            source = source.with_scope_selector(sel.clone());
        }
        run_source(&source, &config).await.context("Harvest failed")?
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&manifest).context("Failed to serialise manifest")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(json.as_bytes()).context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if !cli.quiet && !show_progress {
        // Inline summary when the progress callback did not already print one.
        eprintln!(
            "Downloaded {}/{} image(s) into {}",
            manifest.total_downloaded,
            manifest.total_found,
            config.output_dir.display()
        );
    }
    if !cli.quiet && manifest.total_failed > 0 {
        eprintln!("Failed downloads:");
        for f in &manifest.failed {
            eprintln!("  {} {}  {}", red("-"), f.url, dim(&f.error));
        }
    }
    if !cli.quiet {
        eprintln!(
            "   manifest: {}",
            dim(&config.output_dir.join("images.json").display().to_string())
        );
    }

    Ok(())
}

/// Extraction half of the pipeline, used by `--list-only`.
async fn extract_references(cli: &Cli, config: &HarvestConfig) -> Result<Vec<ImageReference>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")?;

    if let Some(ref refs_path) = cli.refs {
        let source = StaticListSource::from_json_file(refs_path)
            .await
            .context("Failed to load reference list")?;
        Ok(source.references(&client, config).await?)
    } else {
        let url = cli
            .input
            .clone()
            .context("Provide an article URL or --refs FILE")?;
        let mut source = HtmlPageSource::new(url);
        if let Some(ref sel) = cli.selector {
            source = source.with_scope_selector(sel.clone());
        }
        Ok(source.references(&client, config).await?)
    }
}

/// Map CLI args to `HarvestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<HarvestConfig> {
    let mut builder = HarvestConfig::builder()
        .output_dir(&cli.output)
        .max_retries(cli.retries)
        .retry_backoff_ms(cli.backoff_ms)
        .timeout_secs(cli.timeout)
        .courtesy_delay_ms(cli.delay_ms)
        .default_extension(cli.default_ext.clone());

    if let Some(ref referer) = cli.referer {
        builder = builder.referer(referer.clone());
    }
    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
