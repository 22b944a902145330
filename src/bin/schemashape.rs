//! schemashape: inspect a schema and the shapes its queries return.
//!
//! # Usage
//!
//! ```bash
//! # Print the validated table model
//! schemashape --schema schema.surql parse
//!
//! # Infer the result shape of a query
//! schemashape --schema schema.surql infer "SELECT *, author.* FROM post"
//!
//! # Use a live info dump instead of DDL
//! schemashape --info dump.json tables --format json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use schemashape::prelude::*;
use schemashape::source::LoadOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemashape")]
#[command(version)]
#[command(about = "Schema DDL to type model, query to result shape", long_about = None)]
#[command(after_help = "EXAMPLES:
    schemashape --schema schema.surql parse
    schemashape --schema schema.surql infer 'SELECT *, author.* FROM post LIMIT 1'
    schemashape --info dump.json explain 'SELECT title AS headline FROM post'")]
struct Cli {
    /// DDL file to read the schema from
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// JSON info dump (`{ "db": ..., "tables": ... }`) to read the schema from
    #[arg(long, global = true, conflicts_with = "schema")]
    info: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    format: Option<Format>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pretty => OutputFormat::Pretty,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the validated table model
    Parse,
    /// Infer the result shape of a query
    Infer {
        /// The query to infer
        query: String,
    },
    /// List tables with their field counts
    Tables,
    /// Show how a query is parsed
    Explain {
        /// The query to explain
        query: String,
    },
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
    let default = if verbose { "schemashape=debug" } else { "schemashape=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::discover()?.override_with(
        cli.schema.clone(),
        cli.info.clone(),
        cli.format.map(Into::into),
    );

    match &cli.command {
        // `explain` needs no schema.
        Commands::Explain { query } => explain_query(query, config.output)?,
        Commands::Parse => print_tables(&load_tables(&config)?, config.output)?,
        Commands::Tables => list_tables(&load_tables(&config)?, config.output)?,
        Commands::Infer { query } => {
            let registry = SchemaRegistry::from_tables(&load_tables(&config)?);
            print_shape(query, &registry, config.output)?;
        }
    }

    Ok(())
}

fn load_tables(config: &Config) -> Result<Vec<TableDefinition>> {
    let source = config.source()?;
    let options = LoadOptions {
        validate: config.validate_options(),
        normalize: config.normalize_options(),
    };
    Ok(source.load_with(&options)?)
}

fn print_tables(tables: &[TableDefinition], output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(tables)?);
        return Ok(());
    }

    for table in tables {
        match &table.description {
            Some(description) => println!("{} {}", table.name.cyan().bold(), format!("-- {}", description).dimmed()),
            None => println!("{}", table.name.cyan().bold()),
        }
        for field in &table.fields {
            let mut kind = field.kind.to_string();
            if let Some(reference) = &field.reference {
                kind = format!("{} → {}", kind, reference.table);
            }
            let marker = if field.optional { "?" } else { "" };
            print!("  {}{} {}", field.name.white(), marker.yellow(), kind.green());
            if let Some(default) = &field.default_value {
                print!(" {}", format!("= {}", default).dimmed());
            }
            if let Some(description) = &field.description {
                print!(" {}", format!("-- {}", description).dimmed());
            }
            println!();
        }
        println!();
    }
    Ok(())
}

fn list_tables(tables: &[TableDefinition], output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        let summary: Vec<serde_json::Value> = tables
            .iter()
            .map(|t| serde_json::json!({ "name": t.name, "fields": t.fields.len() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let width = tables.iter().map(|t| t.name.len()).max().unwrap_or(0).max(5);
    println!("{:width$}  {}", "Table".white().bold(), "Fields".white().bold(), width = width);
    println!("{}", "─".repeat(width + 8).dimmed());
    for table in tables {
        println!("{:width$}  {}", table.name.cyan(), table.fields.len(), width = width);
    }
    println!();
    println!("{} table(s)", tables.len().to_string().cyan());
    Ok(())
}

fn print_shape(query: &str, registry: &SchemaRegistry, output: OutputFormat) -> Result<()> {
    let shape = infer_query(query, registry);
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shape)?),
        OutputFormat::Pretty => {
            println!("{} {}", "Query:".dimmed(), query.yellow());
            println!("{} {}", "Shape:".green().bold(), shape.to_string().white());
        }
    }
    Ok(())
}

fn explain_query(query: &str, output: OutputFormat) -> Result<()> {
    let parsed = schemashape::query::parse(query);
    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    println!("{} {}", "Query:".dimmed(), query.yellow());
    println!();
    println!("{}", "Parsed Structure:".green().bold());
    println!("  {} {}", "Statement:".dimmed(), parsed.kind.to_string().cyan());
    if parsed.kind != StatementKind::Select {
        return Ok(());
    }

    let table = parsed.table().unwrap_or("(none)");
    let only = if parsed.only { " (ONLY)" } else { "" };
    println!("  {} {}{}", "Table:".dimmed(), table.white(), only.yellow());

    if !parsed.fields.is_empty() {
        println!("  {}", "Fields:".dimmed());
        for field in &parsed.fields {
            println!("    • {}", field.to_string().white());
        }
    }
    if !parsed.conditions.is_empty() {
        println!("  {}", "Conditions:".dimmed());
        for cond in &parsed.conditions {
            println!("    {} {} {}", cond.field.white(), cond.op, cond.value.yellow());
        }
    }
    if !parsed.order_by.is_empty() {
        println!("  {} {}", "Order:".dimmed(), parsed.order_by.join(", "));
    }
    if let Some(limit) = parsed.limit {
        println!("  {} {}", "Limit:".dimmed(), limit);
    }
    if let Some(start) = parsed.start {
        println!("  {} {}", "Start:".dimmed(), start);
    }
    if !parsed.fetch.is_empty() {
        println!("  {} {}", "Fetch:".dimmed(), parsed.fetch.join(", "));
    }
    println!(
        "  {} {}",
        "Result:".dimmed(),
        if parsed.is_array_result { "list" } else { "single record" }.cyan()
    );
    Ok(())
}
