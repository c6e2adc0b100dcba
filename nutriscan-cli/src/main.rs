// NutriScan Command Line Interface
// Scan food labels, search products and manage dietary preferences

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nutriscan_core::{AnalysisResult, Preference};
use nutriscan_scanner::{
    AppContext, CameraDevice, FixedTextRecognizer, HttpLabelApi, LabelApi, NoCamera, RevealPhase, ScanStep,
    ScanWizard, ScannerConfig, StillImageCamera, StreamStatus,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nutriscan")]
#[command(about = "NutriScan - scan food labels and get a health verdict", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Analysis API base URL (overrides config file and environment)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Configuration file path
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a product: ingredient list, then nutrition facts
    Scan {
        /// Ingredient list photo (uploaded instead of captured)
        #[arg(long)]
        ingredients: Option<PathBuf>,

        /// Nutrition facts photo (uploaded instead of captured)
        #[arg(long)]
        nutrition: Option<PathBuf>,

        /// Image served as the live camera feed
        #[arg(long)]
        feed: Option<PathBuf>,
    },

    /// Search products by name
    Search {
        query: String,
    },

    /// Show past scans
    History,

    /// Show score trends and most common additives
    Analytics,

    /// Dietary preferences
    #[command(subcommand)]
    Prefs(PrefsCommands),
}

#[derive(Subcommand)]
enum PrefsCommands {
    /// Show current preferences
    Show,

    /// Flip one preference (vegan, no-sugar, low-sodium, gluten-free)
    Toggle {
        preference: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(cli.verbose))))
        .with_writer(io::stderr)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Scan { ingredients, nutrition, feed } => {
            run_scan(config, ingredients.as_deref(), nutrition.as_deref(), feed.as_deref()).await?;
        }
        Commands::Search { query } => {
            run_search(config, &query).await?;
        }
        Commands::History => {
            show_history(config).await?;
        }
        Commands::Analytics => {
            show_analytics(config).await?;
        }
        Commands::Prefs(cmd) => {
            handle_prefs_command(config, cmd).await?;
        }
    }

    Ok(())
}

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Config file, then `NUTRISCAN_API_URL`, then `--server`
fn load_config(cli: &Cli) -> anyhow::Result<ScannerConfig> {
    let mut config = ScannerConfig::load(cli.config.as_deref())?;
    config.apply_api_url_override(cli.server.clone());
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    debug!("Using API at {}", config.api_base_url);
    Ok(config)
}

async fn start_context(config: ScannerConfig, feed: Option<&Path>) -> anyhow::Result<AppContext> {
    let camera: Arc<dyn CameraDevice> = match feed {
        Some(path) => Arc::new(
            StillImageCamera::from_path(path).with_context(|| format!("Cannot open feed image {}", path.display()))?,
        ),
        None => Arc::new(NoCamera),
    };
    let api: Arc<dyn LabelApi> = Arc::new(HttpLabelApi::new(&config)?);
    let recognizer = FixedTextRecognizer::new("Detected text...");
    Ok(AppContext::start(config, camera, Box::new(recognizer), api).await?)
}

async fn run_scan(
    config: ScannerConfig,
    ingredients: Option<&Path>,
    nutrition: Option<&Path>,
    feed: Option<&Path>,
) -> anyhow::Result<()> {
    let ctx = start_context(config, feed).await?;
    let result = scan_with(&ctx, ingredients, nutrition).await;
    ctx.shutdown().await;
    result
}

async fn scan_with(ctx: &AppContext, ingredients: Option<&Path>, nutrition: Option<&Path>) -> anyhow::Result<()> {
    let mut scanner = ctx.scanner();

    println!("📷 Step 1/2: ingredient list");
    let status = scanner.enter().await;
    fill_step(ctx, &mut scanner, status, ingredients).await?;

    println!("📷 Step 2/2: nutrition facts");
    let status = scanner.advance().await?;
    fill_step(ctx, &mut scanner, status, nutrition).await?;

    println!("🔬 Analyzing...");
    let outcome = match scanner.submit().await {
        Ok(outcome) => outcome,
        Err(e) => {
            scanner.exit();
            bail!("Analysis failed: {} (run the scan again to retry)", e);
        }
    };

    let mut results = ctx.results_view();
    results.present(outcome.clone());
    let reveal = ctx.reveal_for(&outcome).run(|frame| {
        let line = match frame.phase {
            RevealPhase::Counting => format!("\r   Score: {}", frame.digit),
            RevealPhase::Flashing | RevealPhase::Done => format!(
                "\r   Score: {}  {} {}",
                frame.digit,
                outcome.result.health_score.emoji(),
                outcome.result.health_score.label()
            ),
        };
        print!("{}", line);
        let _ = io::stdout().flush();
    });
    let revealed = reveal.await;
    println!();

    results.on_reveal_done(&revealed);
    if results.celebration().is_active() {
        println!("🎉 Great choice!");
    }
    if let Some(shown) = results.outcome() {
        print_result(&shown.result);
    }
    scanner.exit();
    Ok(())
}

async fn fill_step(
    ctx: &AppContext,
    scanner: &mut ScanWizard,
    status: StreamStatus,
    upload: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(path) = upload {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        scanner.upload(bytes)?;
        println!("   ✅ Using {}", path.display());
        return Ok(());
    }

    match status {
        StreamStatus::Live => {
            // Give the live overlay a couple of samples before capturing
            tokio::time::sleep(ctx.config().sample_interval() * 2).await;
            if let Some(reading) = scanner.overlay_text() {
                println!("   👁  {} ({:.0}%)", reading.text, reading.confidence * 100.0);
            }
            scanner.capture()?;
            println!("   ✅ Captured from {}", ctx.cameras().device_name());
            Ok(())
        }
        StreamStatus::Unavailable(reason) => {
            let flag = match scanner.step() {
                ScanStep::Ingredients => "--ingredients",
                ScanStep::Nutrition => "--nutrition",
            };
            scanner.exit();
            bail!("No camera available ({}); pass {} <file> or --feed <image>", reason, flag)
        }
    }
}

fn print_result(result: &AnalysisResult) {
    println!();
    println!("🛒 {}", result.product_name);
    println!(
        "   Verdict: {} {} ({}/10)",
        result.health_score.emoji(),
        result.health_score.label(),
        result.display_digit()
    );

    if !result.nutrition.is_empty() {
        println!("\n📊 Nutrition:");
        for (name, value) in &result.nutrition {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("   {:<20} {}", name, value);
        }
    }

    if !result.additives.is_empty() {
        println!("\n🧪 Additives:");
        for additive in &result.additives {
            println!("   {} [{:?}] {}", additive.name, additive.risk_level, additive.reason);
        }
    }

    if let Some(xai) = &result.xai {
        if !xai.shap_impacts.is_empty() {
            println!("\n🔎 Score drivers:");
            let mut impacts: Vec<_> = xai.shap_impacts.iter().collect();
            impacts.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
            for (feature, impact) in impacts.into_iter().take(5) {
                println!("   {:<20} {:+.2}", feature, impact);
            }
        }
    }

    if let Some(alternative) = &result.healthy_alternative {
        println!("\n💡 Try instead: {}", alternative);
    }
}

async fn run_search(config: ScannerConfig, query: &str) -> anyhow::Result<()> {
    let ctx = start_context(config, None).await?;
    if query.chars().count() < ctx.config().min_query_len {
        println!("⚠️  Query must be at least {} characters", ctx.config().min_query_len);
        ctx.shutdown().await;
        return Ok(());
    }

    let search = ctx.search();
    search.on_query_change(query);
    search.settled().await;
    let state = search.snapshot();

    if state.suggestions.is_empty() {
        println!("No products found for '{}'", query);
    } else {
        for suggestion in &state.suggestions {
            match suggestion.health_score {
                Some(category) => println!("{} {}", category.emoji(), suggestion.name),
                None => println!("   {}", suggestion.name),
            }
        }
    }
    ctx.shutdown().await;
    Ok(())
}

async fn show_history(config: ScannerConfig) -> anyhow::Result<()> {
    let ctx = start_context(config, None).await?;
    let history = ctx.history().await;
    if history.is_empty() {
        println!("No scans yet");
    }
    for entry in &history {
        let score = nutriscan_core::analysis::score_digit(entry.health_score, entry.score_value);
        println!(
            "{}  {} {:<30} {}/10",
            entry.timestamp,
            entry.health_score.emoji(),
            entry.product_name,
            score
        );
    }
    ctx.shutdown().await;
    Ok(())
}

async fn show_analytics(config: ScannerConfig) -> anyhow::Result<()> {
    let ctx = start_context(config, None).await?;
    match ctx.analytics().await {
        Some(analytics) => {
            println!("📈 Average score: {:.1}", analytics.avg_score);
            if !analytics.history_trend.is_empty() {
                let trend: Vec<String> = analytics.history_trend.iter().map(|s| format!("{:.0}", s)).collect();
                println!("   Trend: {}", trend.join(" → "));
            }
            if !analytics.top_additives.is_empty() {
                println!("\n🧪 Most common additives:");
                for additive in &analytics.top_additives {
                    println!("   {:<20} {}", additive.name, additive.count);
                }
            }
        }
        None => println!("Analytics unavailable"),
    }
    ctx.shutdown().await;
    Ok(())
}

async fn handle_prefs_command(config: ScannerConfig, cmd: PrefsCommands) -> anyhow::Result<()> {
    // Parse before touching the network
    let toggle = match &cmd {
        PrefsCommands::Toggle { preference } => Some(preference.parse::<Preference>()?),
        PrefsCommands::Show => None,
    };

    let ctx = start_context(config, None).await?;
    if let Some(pref) = toggle {
        let value = ctx.preferences().toggle(pref);
        info!("Preference {} set to {}", pref, value);
        ctx.preferences().flush().await;
        println!("✅ {} is now {}", pref, if value { "on" } else { "off" });
    }

    let prefs = ctx.preferences().get();
    for pref in Preference::ALL {
        let mark = if prefs.get(pref) { "✅" } else { "⬜" };
        println!("{} {}", mark, pref);
    }
    ctx.shutdown().await;
    Ok(())
}
