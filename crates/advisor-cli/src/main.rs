//! `ph-advisor`: analyse PSE stocks from the terminal
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! ph-advisor analyze TEL SM AREIT --concurrency 2
//! ph-advisor history TEL
//! ph-advisor show TEL --id 3
//! ```

use advisor_stock::engine::TracingListener;
use advisor_stock::export::{default_file_name, render_markdown};
use advisor_stock::storage::open_repository;
use advisor_stock::{Advisor, AdvisorConfig, FinalReport, ReportRepository, Symbol, WorkflowError};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ph-advisor", version)]
#[command(about = "BUY / NOT BUY reports for Philippine Stock Exchange tickers", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis for one or more tickers
    Analyze {
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Tickers analysed at the same time
        #[arg(short, long, default_value_t = 2)]
        concurrency: usize,

        /// Also write each report as Markdown into this directory
        #[arg(long, value_name = "DIR")]
        markdown: Option<PathBuf>,

        /// Skip saving reports
        #[arg(long)]
        no_save: bool,
    },
    /// Stored reports for a ticker, newest first
    History {
        symbol: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Print a stored report (latest unless --id is given)
    Show {
        symbol: String,

        #[arg(long)]
        id: Option<i64>,
    },
    /// Recently analysed tickers
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        advisor_utils::init_tracing_json(Some("warn,advisor_stock=info"));
    } else {
        advisor_utils::init_tracing(Some("warn,advisor_stock=info"));
    }

    let config = AdvisorConfig::from_env().context("invalid configuration")?;

    match cli.command {
        Commands::Analyze {
            symbols,
            concurrency,
            markdown,
            no_save,
        } => analyze(&config, symbols, concurrency, markdown.as_deref(), no_save).await,
        Commands::History { symbol, limit } => history(&config, &symbol, limit).await,
        Commands::Show { symbol, id } => show(&config, &symbol, id).await,
        Commands::Recent { limit } => recent(&config, limit).await,
    }
}

fn repository(config: &AdvisorConfig) -> anyhow::Result<Arc<dyn ReportRepository>> {
    open_repository(config.storage_backend, &config.sqlite_path)
        .with_context(|| format!("cannot open report store at {}", config.sqlite_path.display()))
}

fn parse_symbol(raw: &str) -> anyhow::Result<Symbol> {
    Symbol::parse(raw).with_context(|| format!("'{raw}' is not a PSE ticker"))
}

async fn analyze(
    config: &AdvisorConfig,
    symbols: Vec<String>,
    concurrency: usize,
    markdown: Option<&Path>,
    no_save: bool,
) -> anyhow::Result<()> {
    let advisor = Advisor::from_config(config)
        .context("failed to set up the advisor")?
        .with_listener(Arc::new(TracingListener));
    let total = symbols.len();

    let outcomes: Vec<(String, Result<FinalReport, WorkflowError>)> = futures::stream::iter(symbols)
        .map(|raw| {
            let advisor = &advisor;
            async move {
                let outcome = if no_save {
                    advisor.analyze(&raw).await
                } else {
                    advisor.analyze_and_save(&raw).await.map(|saved| saved.report)
                };
                (raw, outcome)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut completed = 0;
    for (raw, outcome) in outcomes {
        let report = match outcome {
            Ok(report) => report,
            Err(err @ WorkflowError::PersistenceFailure { .. }) => {
                tracing::warn!(symbol = %raw, error = %err, "report not saved");
                eprintln!("warning: {err}");
                match err.into_report() {
                    Some(report) => report,
                    None => continue,
                }
            }
            Err(err) => {
                eprintln!("✗ {raw}: {err} (stage: {})", err.stage());
                continue;
            }
        };

        publish(&report, markdown).await;
        completed += 1;
    }

    println!("\nCompleted {completed}/{total} analyses");
    if completed < total {
        bail!("{} of {total} analyses failed", total - completed);
    }
    Ok(())
}

/// Print a report and export it when asked
///
/// A failed export is only a warning: the analysis itself succeeded and the
/// remaining reports still need printing.
async fn publish(report: &FinalReport, markdown: Option<&Path>) -> bool {
    print_report(report);
    let Some(dir) = markdown else {
        return true;
    };
    match write_markdown(dir, report).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(symbol = %report.symbol, error = %err, "markdown export failed");
            eprintln!("warning: {err:#}");
            false
        }
    }
}

async fn write_markdown(dir: &Path, report: &FinalReport) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(default_file_name(report));
    tokio::fs::write(&path, render_markdown(report))
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("Markdown written to {}", path.display());
    Ok(())
}

fn print_report(report: &FinalReport) {
    let rule = "=".repeat(64);
    println!("\n{rule}");
    println!("  {}  |  VERDICT: {}", report.symbol, report.verdict);
    println!("{rule}\n");
    println!("{}", report.summary.trim());

    if !report.limitations.is_empty() {
        println!();
        for note in &report.limitations {
            println!("! {note}");
        }
    }
    println!(
        "\nGenerated {} (verdict basis: {})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.verdict_basis.as_str()
    );
}

async fn history(config: &AdvisorConfig, raw: &str, limit: usize) -> anyhow::Result<()> {
    let symbol = parse_symbol(raw)?;
    let reports = repository(config)?.list_history(&symbol, limit).await?;
    if reports.is_empty() {
        println!("No stored reports for {symbol}");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Generated", "Verdict", "Basis", "Missing"]);
    for stored in &reports {
        let missing: Vec<&str> = stored
            .report
            .missing_dimensions()
            .iter()
            .map(|d| d.as_str())
            .collect();
        table.add_row(vec![
            stored.id.to_string(),
            stored.report.generated_at.format("%Y-%m-%d %H:%M").to_string(),
            stored.report.verdict.to_string(),
            stored.report.verdict_basis.as_str().to_string(),
            if missing.is_empty() { "-".to_string() } else { missing.join(", ") },
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn show(config: &AdvisorConfig, raw: &str, id: Option<i64>) -> anyhow::Result<()> {
    let symbol = parse_symbol(raw)?;
    let repo = repository(config)?;
    let stored = match id {
        Some(id) => repo.get_by_id(&symbol, id).await?,
        None => repo.get_latest(&symbol).await?,
    };

    match stored {
        Some(stored) => {
            println!("Report #{}", stored.id);
            print_report(&stored.report);
            Ok(())
        }
        None => match id {
            Some(id) => bail!("no report #{id} for {symbol}"),
            None => bail!("no stored reports for {symbol}"),
        },
    }
}

async fn recent(config: &AdvisorConfig, limit: usize) -> anyhow::Result<()> {
    let recent = repository(config)?.list_recent_symbols(limit).await?;
    if recent.is_empty() {
        println!("No reports stored yet");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Symbol", "Latest verdict", "Generated"]);
    for entry in &recent {
        table.add_row(vec![
            entry.symbol.to_string(),
            entry.verdict.to_string(),
            entry.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
