//! tabjoin CLI
//!
//! Command-line tool for previewing two tables, copying columns from one into
//! the other by a join key, and exporting the result as CSV or xlsx.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabjoin_core::{
    parse_file, Coercion, Format, JobFile, Session, Slot, Table, DEFAULT_JOIN_KEY,
};
use tracing_subscriber::EnvFilter;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Parser)]
#[command(name = "tabjoin")]
#[command(about = "Combine columns of two CSV/Excel files by a join key", long_about = None)]
#[command(version)]
struct Cli {
    /// Log parse, merge and export details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and display its first rows
    Preview {
        /// Path to a .csv file or a workbook
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Print the parsed table as JSON instead
        #[arg(long)]
        json: bool,

        /// Detect numbers and booleans in CSV fields
        #[arg(long)]
        infer_types: bool,
    },

    /// List the columns of a file (taken from its first row)
    Columns {
        /// Path to a .csv file or a workbook
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Copy columns from the base file into the enrich file and export
    Merge {
        /// File one: supplies the columns
        #[arg(short, long)]
        base: PathBuf,

        /// File two: receives the columns
        #[arg(short, long)]
        enrich: PathBuf,

        /// Join key column
        #[arg(short, long, default_value = DEFAULT_JOIN_KEY)]
        key: String,

        /// Column of the base file to copy (repeatable)
        #[arg(short, long = "column")]
        columns: Vec<String>,

        /// Column of the result to leave out (repeatable)
        #[arg(long = "hide")]
        hidden: Vec<String>,

        /// Output format (csv or xlsx)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Output file or directory (defaults to combined_data.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of result rows to display after merging
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Detect numbers and booleans in CSV fields
        #[arg(long)]
        infer_types: bool,
    },

    /// Run a job file
    Run {
        /// Path to job file (JSON)
        #[arg(short, long)]
        job: PathBuf,
    },

    /// Create a job file template
    CreateJob {
        /// Output path for the job file
        #[arg(short, long)]
        output: PathBuf,

        /// File one: supplies the columns
        #[arg(short, long, default_value = "file_one.xlsx")]
        base: PathBuf,

        /// File two: receives the columns
        #[arg(short, long, default_value = "file_two.csv")]
        enrich: PathBuf,

        /// Columns to copy (repeatable)
        #[arg(short, long = "column")]
        columns: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        if e.is_parse_error() {
            eprintln!("Please check the file format and try again.");
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "tabjoin_core=debug"
    } else {
        "tabjoin_core=warn"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(command: Commands) -> tabjoin_core::Result<()> {
    match command {
        Commands::Preview {
            file,
            limit,
            json,
            infer_types,
        } => cmd_preview(&file, limit, json, coercion(infer_types)),
        Commands::Columns { file } => cmd_columns(&file),
        Commands::Merge {
            base,
            enrich,
            key,
            columns,
            hidden,
            format,
            output,
            limit,
            infer_types,
        } => {
            let job = JobFile {
                base,
                enrich,
                key,
                columns,
                hidden,
                format: format.parse()?,
                output,
                coercion: coercion(infer_types),
            };
            cmd_merge(&job, limit)
        }
        Commands::Run { job } => cmd_run(&job),
        Commands::CreateJob {
            output,
            base,
            enrich,
            columns,
        } => cmd_create_job(&output, base, enrich, columns),
    }
}

fn coercion(infer_types: bool) -> Coercion {
    if infer_types {
        Coercion::Infer
    } else {
        Coercion::Text
    }
}

fn cmd_preview(file: &Path, limit: usize, json: bool, coercion: Coercion) -> tabjoin_core::Result<()> {
    let table = parse_file(file, coercion)?;

    if json {
        let shown = Table::from_rows(table.rows.iter().take(limit).cloned().collect());
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Format: {}", Format::from_file_name(&file.to_string_lossy()));
    println!("Columns: {}", table.columns().len());
    println!("Rows: {}", table.row_count());
    println!();
    print_table(&table, limit);

    Ok(())
}

fn cmd_columns(file: &Path) -> tabjoin_core::Result<()> {
    let table = parse_file(file, Coercion::Text)?;

    for column in table.columns() {
        println!("{}", column);
    }

    Ok(())
}

fn cmd_merge(job: &JobFile, limit: usize) -> tabjoin_core::Result<()> {
    let (session, export) = job.run()?;

    print_session(&session);
    if let Some(preview) = session.preview() {
        println!();
        print_table(&preview, limit);
    }

    let path = export.write_to(job.output_path())?;
    println!();
    println!("Exported {} bytes to {}", export.bytes.len(), path.display());

    Ok(())
}

fn cmd_run(job_path: &Path) -> tabjoin_core::Result<()> {
    let job = JobFile::load(job_path)?;
    println!(
        "Running job: {} + {} on '{}'",
        job.base.display(),
        job.enrich.display(),
        job.key
    );

    let (session, export) = job.run()?;
    print_session(&session);

    let path = export.write_to(job.output_path())?;
    println!("  Wrote {}", path.display());

    Ok(())
}

fn cmd_create_job(
    output: &Path,
    base: PathBuf,
    enrich: PathBuf,
    columns: Vec<String>,
) -> tabjoin_core::Result<()> {
    let mut job = JobFile::new(base, enrich);
    job.columns = columns;

    job.save(output)?;
    println!("Created job file: {}", output.display());
    println!();
    println!("Edit the file to choose columns, then run:");
    println!("  tabjoin run --job {}", output.display());

    Ok(())
}

fn print_session(session: &Session) {
    for slot in [Slot::Base, Slot::Enrich] {
        if let Some(file) = session.file(slot) {
            println!(
                "Loaded {} as {}: {} ({})",
                slot.label(),
                file.format(),
                file.name,
                file.loaded_at.format(TIME_FORMAT)
            );
        }
    }
    println!("Base columns: {}", session.base_columns().join(", "));

    if let Some(stats) = session.merge_stats() {
        println!(
            "Joined on '{}': {} matched, {} unmatched",
            session.key(),
            stats.matched,
            stats.unmatched
        );
    }
    if let Some(record) = session.last_export() {
        println!(
            "Exported {} as {} at {}",
            record.file_name,
            record.format,
            record.exported_at.format(TIME_FORMAT)
        );
    }
}

fn print_table(table: &Table, limit: usize) {
    let columns = table.columns();
    println!("{}", columns.join("\t"));
    println!("{}", "-".repeat(columns.len() * 12));

    for row in table.rows.iter().take(limit) {
        let values: Vec<String> = columns
            .iter()
            .map(|column| {
                row.get(column)
                    .map(|value| value.to_string_value())
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > limit {
        println!("... ({} more rows)", table.row_count() - limit);
    }
}
