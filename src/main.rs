use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use table_etl::config::{PipelineConfig, Preset};
use table_etl::{db, fetch, sinks, Pipeline, RecordSet};

#[derive(Parser)]
#[command(name = "table_etl", about = "Extract an HTML table, normalise it, load it to SQLite/JSON/CSV")]
struct Cli {
    /// Built-in pipeline to start from
    #[arg(short, long, value_enum, default_value = "gdp", global = true)]
    preset: Preset,
    /// TOML file layered over the preset
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override the page URL or local path
    #[arg(short, long, global = true)]
    source: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract → transform → load all sinks → query
    Run,
    /// Extract + transform and print, without touching any sink
    Preview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Run a read query against the configured database
    Query {
        sql: String,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Print a JSON snapshot written by a previous run
    ShowJson {
        path: Option<PathBuf>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut cfg = PipelineConfig::load(cli.preset, cli.config.as_deref())?;
    if let Some(source) = cli.source {
        cfg.source = source;
    }

    let result = match cli.command {
        Commands::Run => {
            let source = fetch::source_for(&cfg.source);
            println!("Running {:?} pipeline on {}", cli.preset, source.describe());
            let report = Pipeline::new(&cfg).run(source.as_ref())?;
            println!("Loaded {} records.", report.records.len());
            if let Some(rows) = &report.query {
                if let Some(sql) = &cfg.query {
                    println!("\n{}", sql);
                }
                print_table(rows, 50);
            }
            if report.is_clean() {
                Ok(())
            } else {
                for (phase, err) in &report.failures {
                    eprintln!("{} failed: {}", phase, err);
                }
                Err(anyhow::anyhow!(
                    "{} phase(s) failed, see {}",
                    report.failures.len(),
                    cfg.log_file.display()
                ))
            }
        }
        Commands::Preview { limit } => {
            let source = fetch::source_for(&cfg.source);
            let records = Pipeline::new(&cfg).preview(source.as_ref())?;
            print_table(&records, limit);
            Ok(())
        }
        Commands::Query { sql, limit } => {
            let conn = db::connect(&cfg.sinks.db_path)?;
            let rows = db::run_query(&conn, &sql)?;
            print_table(&rows, limit);
            Ok(())
        }
        Commands::ShowJson { path, limit } => {
            let path = path
                .or_else(|| cfg.sinks.json_path.clone())
                .ok_or_else(|| anyhow::anyhow!("no JSON path given or configured"))?;
            let records = sinks::read_json(&path)?;
            print_table(&records, limit);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn print_table(records: &RecordSet, limit: usize) {
    if records.is_empty() {
        println!("No rows.");
        return;
    }

    let cells: Vec<Vec<String>> = records
        .rows()
        .iter()
        .take(limit)
        .map(|r| r.iter().map(|v| truncate(&v.to_string(), 32)).collect())
        .collect();
    let widths: Vec<usize> = records
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(truncate(name, 32).chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<String>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<w$}", v, w = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let header = line(records.columns().iter().map(|c| truncate(c, 32)).collect());
    println!("{:>3} | {}", "#", header);
    println!("{}", "-".repeat(header.chars().count() + 6));
    for (i, row) in cells.into_iter().enumerate() {
        println!("{:>3} | {}", i + 1, line(row));
    }
    if records.len() > limit {
        println!("... {} more", records.len() - limit);
    }
    println!("\n{} rows", records.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
