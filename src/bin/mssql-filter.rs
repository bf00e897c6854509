//! mssql-filter: compile filter descriptors to T-SQL
//!
//! # Usage
//!
//! ```bash
//! # Compile a descriptor file (or '-' for stdin)
//! mssql-filter descriptor.json
//!
//! # Assemble a descriptor from flags
//! mssql-filter --table users --where "age >= 21" --where "name ~^ An" --sort name_asc --take 10
//!
//! # Show how a descriptor is understood
//! mssql-filter explain descriptor.json
//! ```

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use mssql_filter::cache::FragmentCache;
use mssql_filter::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mssql-filter")]
#[command(version)]
#[command(about = "Compile declarative filter descriptors to parameterized T-SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    mssql-filter filter.json
    cat filter.json | mssql-filter - --format json
    mssql-filter --table users --where 'active = true' --where 'role in (admin, mod)' --take 5
    mssql-filter --table orders --exec count --where 'total between 10 and 50'")]
struct Cli {
    /// Descriptor JSON file, or '-' for stdin
    input: Option<String>,

    /// Target table
    #[arg(short, long)]
    table: Option<String>,

    /// Operation (find, list, count, insert, update, remove, check, drop, truncate, scalar, query)
    #[arg(short, long)]
    exec: Option<String>,

    /// Predicate shorthand, repeatable; joined with AND
    #[arg(short = 'w', long = "where")]
    predicates: Vec<String>,

    /// Projection columns
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,

    /// Sort entries such as name_asc
    #[arg(long, value_delimiter = ',')]
    sort: Vec<String>,

    #[arg(long)]
    skip: Option<u64>,

    #[arg(long)]
    take: Option<u64>,

    /// Language code for § columns
    #[arg(short, long)]
    language: Option<String>,

    /// Schema prefix for the table
    #[arg(long)]
    schema: Option<String>,

    /// Config file path
    #[arg(short, long, env = "MSSQL_FILTER_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the structure of a descriptor and its SQL
    Explain {
        /// Descriptor JSON file, or '-' for stdin
        file: String,
    },
    /// Show the predicate and payload prefix reference
    Predicates,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { file }) => explain(file, &cli),
        Some(Commands::Predicates) => {
            show_predicates();
            Ok(())
        }
        None => {
            if cli.input.is_none() && cli.table.is_none() {
                println!("{}", "mssql-filter".cyan().bold());
                println!();
                println!("Usage: mssql-filter <FILE|-> [OPTIONS]");
                println!("       mssql-filter --table <TABLE> [--where <EXPR>]...");
                println!();
                println!("Try: mssql-filter --help");
                return;
            }
            compile_command(&cli)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn compile_command(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let filter = build_descriptor(cli, &config)?;

    if cli.verbose {
        eprintln!(
            "{} {} {}",
            "Descriptor:".dimmed(),
            filter.exec.to_string().cyan(),
            filter.table_name().yellow()
        );
    }

    let compiler = Compiler::with_cache(FragmentCache::new(config.mssql.cache_clear_every));
    let queries = if filter.exec == Operation::List {
        let (page, count) = compiler.compile_list(&filter)?;
        vec![page, count]
    } else {
        vec![compiler.compile(&filter)?]
    };

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&queries)?);
        }
        OutputFormat::Text => {
            for query in &queries {
                print_query(query);
            }
        }
    }
    Ok(())
}

/// Descriptor from the input file (if any) with flag overrides applied.
fn build_descriptor(cli: &Cli, config: &Config) -> Result<FilterDescriptor> {
    let mut filter = match &cli.input {
        Some(path) => read_descriptor(path)?,
        None => FilterDescriptor::default(),
    };

    if let Some(table) = &cli.table {
        filter.table = table.clone();
    }
    if let Some(exec) = &cli.exec {
        filter.exec = exec.parse()?;
    }
    filter.filter.extend(parse_predicates(&cli.predicates)?);
    if !cli.fields.is_empty() {
        filter.fields = Some(cli.fields.clone());
    }
    if !cli.sort.is_empty() {
        filter.sort = Some(cli.sort.clone());
    }
    if cli.skip.is_some() {
        filter.skip = cli.skip;
    }
    if cli.take.is_some() {
        filter.take = cli.take;
    }
    if cli.language.is_some() {
        filter.language = cli.language.clone();
    }
    if cli.schema.is_some() {
        filter.schema = cli.schema.clone();
    }
    if filter.schema.is_none() {
        filter.schema = config.default_schema();
    }

    if filter.table.is_empty() && filter.exec != Operation::Query {
        return Err(anyhow!("No table given; use --table or a descriptor file"));
    }
    Ok(filter)
}

fn read_descriptor(path: &str) -> Result<FilterDescriptor> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading descriptor from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("reading descriptor {}", path))?
    };
    serde_json::from_str(&content).with_context(|| format!("parsing descriptor {}", path))
}

fn print_query(query: &CompiledQuery) {
    let kind = if query.is_read { "read".green() } else { "write".red() };
    println!(
        "{} {} ({})",
        "Generated SQL".green().bold(),
        format!("[{}]", query.operation).dimmed(),
        kind
    );
    println!("{}", query.sql.white());

    if !query.params.is_empty() {
        println!();
        println!("{}", "Parameters:".cyan());
        for param in &query.params {
            let value = serde_json::Value::from(param.value.clone());
            println!("  @{} = {}", param.name, value.to_string().yellow());
        }
    }
    println!();
}

fn explain(file: &str, cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let filter = read_descriptor(file)?;

    println!("{}", "Descriptor Explanation".cyan().bold());
    println!();
    println!("  {} {}", "Operation:".dimmed(), filter.exec.to_string().cyan());
    println!("  {} {}", "Table:".dimmed(), filter.table_name().white());
    if let Some(language) = &filter.language {
        println!("  {} {}", "Language:".dimmed(), language.yellow());
    }

    if let Some(fields) = filter.fields.as_ref().filter(|f| !f.is_empty()) {
        println!("  {}", "Fields:".dimmed());
        for field in fields {
            println!("    • {}", field.white());
        }
    }

    if !filter.filter.is_empty() {
        println!("  {}", "Predicates (AND):".dimmed());
        for predicate in &filter.filter {
            println!(
                "    [{}] {}",
                predicate.kind().cyan(),
                predicate.column().unwrap_or("").white()
            );
        }
    }

    if let Some(sort) = filter.sort.as_ref().filter(|s| !s.is_empty()) {
        println!("  {} {}", "Sort:".dimmed(), sort.join(", ").white());
    }
    if let Some(skip) = filter.skip {
        println!("  {} {}", "Skip:".dimmed(), skip);
    }
    if let Some(take) = filter.take {
        println!("  {} {}", "Take:".dimmed(), take);
    }

    if let Some(payload) = &filter.payload {
        println!("  {}", "Payload:".dimmed());
        for entry in payload.entries() {
            let state = if entry.value.is_some() { "" } else { " (unset)" };
            println!(
                "    {} {:?}{}",
                entry.column.white(),
                entry.op,
                state.dimmed()
            );
        }
    }

    println!();
    let compiler = Compiler::with_cache(FragmentCache::new(config.mssql.cache_clear_every));
    match compiler.compile(&filter) {
        Ok(query) => print_query(&query),
        Err(e) => eprintln!("{} {}", "Compile Error:".red().bold(), e),
    }
    Ok(())
}

fn show_predicates() {
    println!("{}", "Predicate Reference".cyan().bold());
    println!();

    let predicates = [
        ("where", "age >= 21", "\"age\" >= 21"),
        ("in", "role in (a, b)", "\"role\" IN ('a', 'b')"),
        ("notin", "id notin (1, 2)", "\"id\" NOT IN (1, 2)"),
        ("between", "price between 1 and 9", "(\"price\" BETWEEN 1 AND 9)"),
        ("search", "name ~ an", "CAST(\"name\" AS NVARCHAR(MAX)) LIKE '%an%'"),
        ("search beg", "name ~^ an", "\"name\" LIKE 'an%'"),
        ("search end", "name ~$ an", "\"name\" LIKE '%an'"),
        ("empty", "note is empty", "(\"note\" IS NULL OR LEN(...) = 0)"),
        ("contains", "note is not empty", "LEN(CAST(\"note\" AS NVARCHAR(MAX))) > 0"),
        ("null", "note is null", "\"note\" IS NULL"),
        ("or", "(descriptor only)", "(a OR b)"),
        ("query", "(descriptor only)", "(raw sql)"),
        ("year/month/day", "(descriptor only)", "MONTH(\"col\") = 5"),
        ("hour/minute", "(descriptor only)", "DATEPART(HOUR, \"col\") = 5"),
    ];

    println!(
        "{:16} {:24} {}",
        "Type".white().bold(),
        "Shorthand".white().bold(),
        "T-SQL".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for (kind, shorthand, sql) in predicates {
        println!("{:16} {:24} {}", kind.cyan().bold(), shorthand.yellow(), sql.dimmed());
    }

    println!();
    println!("{}", "Payload Prefixes".cyan().bold());
    println!();

    let prefixes = [
        ("+", "increment", "\"c\" = COALESCE(\"c\", 0) + @c"),
        ("-", "decrement", "\"c\" = COALESCE(\"c\", 0) - @c"),
        ("*", "multiply", "\"c\" = COALESCE(\"c\", 0) * @c"),
        ("/", "divide", "\"c\" = COALESCE(\"c\", 0) / @c"),
        (">", "max", "\"c\" = GREATEST(\"c\", @c)"),
        ("<", "min", "\"c\" = LEAST(\"c\", @c)"),
        ("!", "toggle", "\"c\" = CASE WHEN \"c\" = 1 THEN 0 ELSE 1 END"),
        ("=", "raw (insert only)", "VALUES(<raw>)"),
        ("#", "raw (update only)", "\"c\" = <raw>"),
    ];

    println!(
        "{:8} {:20} {}",
        "Prefix".white().bold(),
        "Name".white().bold(),
        "Update".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for (prefix, name, sql) in prefixes {
        println!("{:8} {:20} {}", prefix.cyan().bold(), name.yellow(), sql.dimmed());
    }
}
