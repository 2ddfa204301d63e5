//! dynsql command line
//!
//! Compile structured selects to MySQL text and optionally run them.
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL only
//! dynsql --dry-run select users --where '{"age": {"GE": 18}}' --limit 10
//!
//! # Run against the configured backend
//! dynsql select orders --columns '["id", "{DB_SUM}total"]' --group '["id"]'
//!
//! # Raw statement
//! dynsql exec "SELECT NOW()"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dynsql::parser;
use dynsql::prelude::*;
use serde_json::Value as Json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dynsql")]
#[command(version)]
#[command(about = "Structured query compiler and runner for MySQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    dynsql --dry-run select users --where '{\"status\": 1}'
    dynsql select users --columns '[\"id\", \"name\"]' --order '{\"name\": \"desc\"}' --limit '\"5, 10\"'
    dynsql exec 'SHOW TABLES' --format json")]
struct Cli {
    /// Don't connect, just show the generated SQL
    #[arg(short, long, global = true)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Configuration file (defaults to ./dynsql.toml, then the user config dir)
    #[arg(short, long, env = "DYNSQL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and run a SELECT
    Select {
        table: String,

        /// Column list as JSON (array or alias map)
        #[arg(long)]
        columns: Option<String>,

        /// Condition as JSON
        #[arg(long = "where")]
        condition: Option<String>,

        /// Order as JSON (string or column/direction map)
        #[arg(long)]
        order: Option<String>,

        /// Group columns as JSON
        #[arg(long)]
        group: Option<String>,

        /// HAVING condition as JSON
        #[arg(long)]
        having: Option<String>,

        /// Limit as JSON (count or "offset, count")
        #[arg(long)]
        limit: Option<String>,
    },
    /// Run one raw statement
    Exec { sql: String },
    /// Show the token reference
    Tokens,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "dynsql=debug" } else { "dynsql=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        dry_run,
        format,
        config,
        verbose,
        command,
    } = cli;
    let config_path = config.as_deref();

    match command {
        Commands::Tokens => {
            show_tokens();
            Ok(())
        }
        Commands::Select {
            table,
            columns,
            condition,
            order,
            group,
            having,
            limit,
        } => {
            let mut q = Select::new(table);
            if let Some(spec) = columns {
                q = q.columns(parser::columns_from_json(&json_arg("--columns", &spec)?)?);
            }
            if let Some(spec) = condition {
                q = q.filter(parser::condition_from_json(&json_arg("--where", &spec)?)?);
            }
            if let Some(spec) = order {
                q = q.order_by(parser::order_from_json(&json_arg("--order", &spec)?)?);
            }
            if let Some(spec) = group {
                q = parser::group_from_json(&json_arg("--group", &spec)?)?
                    .into_iter()
                    .fold(q, Select::group_by);
            }
            if let Some(spec) = having {
                q = q.having(parser::condition_from_json(&json_arg("--having", &spec)?)?);
            }
            if let Some(spec) = limit {
                if let Some(limit) = parser::limit_from_json(&json_arg("--limit", &spec)?)? {
                    q = q.limit_spec(limit);
                }
            }

            if dry_run {
                let config = DbConfig::load(config_path)?;
                let compiler = Compiler::new(Dialect::MYSQL).strict(config.strict);
                println!("{}", q.to_sql(&compiler)?.white());
                return Ok(());
            }

            let mut db = open(config_path, verbose)?;
            let rows = db.all(q)?;
            format_output(&rows, format);
            Ok(())
        }
        Commands::Exec { sql } => {
            if dry_run {
                println!("{}", sql.white());
                return Ok(());
            }
            let mut db = open(config_path, verbose)?;
            let mut rs = db.query(&sql)?;
            if rs.field_count() == 0 {
                println!(
                    "{} row(s) affected",
                    rs.affected_rows().to_string().cyan()
                );
                return Ok(());
            }
            let rows = rs.fetch_all()?;
            format_output(&rows, format);
            Ok(())
        }
    }
}

fn open(config_path: Option<&Path>, verbose: bool) -> Result<QueryBuilder> {
    let config = DbConfig::load(config_path)?;
    if verbose {
        eprintln!(
            "{} {}@{}:{}",
            "Connecting:".dimmed(),
            config.user,
            config.host,
            config.port
        );
    }
    QueryBuilder::open(&config).with_context(|| format!("opening '{}' driver", config.driver))
}

fn json_arg(flag: &str, spec: &str) -> Result<Json> {
    serde_json::from_str(spec).with_context(|| format!("{} is not valid JSON", flag))
}

fn format_output(rows: &[Record], format: OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let maps: Vec<_> = rows.iter().map(Record::to_map).collect();
            println!("{}", serde_json::to_string_pretty(&maps).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns = rows[0].columns();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
            for row in rows {
                for (w, val) in widths.iter_mut().zip(row.values()) {
                    *w = (*w).max(val_to_string(val).len());
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in rows {
                let cells: Vec<String> = row
                    .values()
                    .iter()
                    .zip(&widths)
                    .map(|(val, w)| format!("{:width$}", val_to_string(val), width = *w))
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &Json) -> String {
    match val {
        Json::Null => "NULL".to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => s.clone(),
        _ => val.to_string(),
    }
}

fn show_tokens() {
    println!("{}", "dynsql token reference".cyan().bold());
    println!();

    let tokens = [
        ("{DB_SUM}col", "column", "SUM(`col`)"),
        ("{DB_COUNT}*", "column", "COUNT(*)"),
        ("{DB_DISTINCT}col", "column", "DISTINCT `col`"),
        ("{DB_FROM_UNIXTIME}c", "column", "FROM_UNIXTIME(`c`)"),
        ("{DB_FNC}expr", "column/value", "expr (verbatim)"),
        ("{DB_VAL}text", "column", "'text'"),
        ("{DB_NE}v", "condition", "!= v"),
        ("{DB_GE}v / {DB_GT}v", "condition", ">= v / > v"),
        ("{DB_LE}v / {DB_LT}v", "condition", "<= v / < v"),
        ("{DB_NNE}v", "condition", "<=> v"),
        ("{DB_LIKE}p", "condition", "LIKE 'p'"),
        ("{DB_XLIKE}p", "condition", "NOT LIKE 'p'"),
        ("{DB_INULL}", "condition", "IS NULL"),
        ("{DB_XINULL}", "condition", "IS NOT NULL"),
        ("{DB_AND} {DB_OR}", "flow", "AND / OR"),
        ("{DB_XOR}", "flow", "XOR"),
        ("{DB_LB} {DB_RB}", "flow", "( )"),
        ("{DB_INC}n / {DB_DEC}n", "write", "`col` + n / `col` - n"),
        ("{DB_TIMES}n / {DB_DIV}n", "write", "`col` * n / `col` / n"),
        ("{DB_NOW}", "write", "NOW()"),
        ("{DB_TIME}", "write", "CURRENT_TIME()"),
        ("{DB_COL}name", "write", "`name`"),
        ("{DB_RAND}", "order", "ORDER BY RAND()"),
    ];

    println!(
        "{:24} {:14} {}",
        "Token".white().bold(),
        "Where".white().bold(),
        "SQL".white().bold()
    );
    println!("{}", "─".repeat(64).dimmed());

    for (token, place, sql) in tokens {
        println!("{:24} {:14} {}", token.cyan().bold(), place.yellow(), sql.dimmed());
    }

    println!();
    let transforms: Vec<&str> = ColumnFn::ALL.iter().map(ColumnFn::token).collect();
    println!("{} {}", "Column transforms:".dimmed(), transforms.join(", "));
}
