use anyhow::Context;
use clap::{Parser, Subcommand};
use claims_core::completeness::is_complete;
use claims_core::constants::DEFAULT_SORT_CHUNK_LINES;
use claims_core::{
    ClaimParser, CoreConfig, JsonLinesQueue, RawRecord, ScalarConflictPolicy, SchemaLookup,
    SchemaRegistry, SortStrategy,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "claims")]
#[command(about = "Claim line grouping and merge CLI")]
struct Cli {
    /// YAML file mapping claim types to their expected fields
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge claim line files into one record per claim
    Merge {
        /// Claim type (inpatient, outpatient, carrier or pde)
        claim_type: String,
        /// JSON-lines files or directories holding them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for staging files
        #[arg(long, default_value = ".")]
        work_dir: PathBuf,
        /// Write merged claims here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// External sort to use (chunked or unix)
        #[arg(long, default_value = "chunked")]
        sort: SortStrategy,
        /// Staging lines held in memory per sorted run
        #[arg(long, default_value_t = DEFAULT_SORT_CHUNK_LINES)]
        chunk_lines: usize,
        /// Scalar conflict policy (last-write-wins or first-write-wins)
        #[arg(long, default_value = "last-write-wins")]
        policy: ScalarConflictPolicy,
        /// Leave input files in place after they are read
        #[arg(long)]
        keep_sources: bool,
    },
    /// Count complete and incomplete records in a JSON-lines file
    Check {
        /// JSON-lines file to inspect
        file: PathBuf,
    },
    /// List the claim types and their expected fields
    Types,
}

fn load_schema(path: Option<&Path>) -> anyhow::Result<SchemaRegistry> {
    match path {
        None => Ok(SchemaRegistry::builtin()),
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("reading schema file {}", path.display()))?;
            Ok(SchemaRegistry::from_yaml_str(&yaml)?)
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claims_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let schema = load_schema(cli.schema.as_deref())?;

    match cli.command {
        Some(Commands::Merge {
            claim_type,
            inputs,
            work_dir,
            output,
            sort,
            chunk_lines,
            policy,
            keep_sources,
        }) => {
            let config = CoreConfig::new(work_dir, chunk_lines, sort, policy)?;
            let parser = ClaimParser::new(&claim_type, &schema, config)?;

            let mut queue = JsonLinesQueue::new();
            if keep_sources {
                queue = queue.keep_consumed_sources();
            }
            for input in inputs {
                if input.is_dir() {
                    let queued = queue
                        .push_dir(&input)
                        .with_context(|| format!("listing {}", input.display()))?;
                    tracing::debug!(dir = %input.display(), queued, "queued claim line files");
                } else {
                    queue.push(input);
                }
            }

            let outcome = parser.merge_claim_lines(&mut queue)?;

            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    serde_json::to_writer_pretty(&mut writer, &outcome.claims)?;
                    writer.flush()?;
                }
                None => {
                    let stdout = io::stdout();
                    let mut writer = stdout.lock();
                    serde_json::to_writer_pretty(&mut writer, &outcome.claims)?;
                    writeln!(writer)?;
                }
            }

            eprintln!(
                "Merged {} claims for {} subjects ({} incomplete lines dropped)",
                outcome.report.merged_claims,
                outcome.report.subjects,
                outcome.report.incomplete_dropped
            );
        }
        Some(Commands::Check { file }) => {
            let reader = BufReader::new(
                File::open(&file).with_context(|| format!("opening {}", file.display()))?,
            );
            let (mut complete, mut incomplete, mut unreadable) = (0usize, 0usize, 0usize);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawRecord>(&line) {
                    Ok(record) if is_complete(&record) => complete += 1,
                    Ok(_) => incomplete += 1,
                    Err(_) => unreadable += 1,
                }
            }
            println!("complete: {complete}");
            println!("incomplete: {incomplete}");
            println!("unreadable: {unreadable}");
        }
        Some(Commands::Types) => {
            for claim_type in schema.claim_types() {
                let fields = schema
                    .expected_fields(claim_type.as_str())
                    .unwrap_or_default();
                println!("{}: {}", claim_type, fields.join(", "));
            }
        }
        None => {
            println!("Use 'claims --help' for commands");
        }
    }

    Ok(())
}
