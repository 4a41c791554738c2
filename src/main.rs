use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use claims_core::config::{
    scalar_policy_from_env_value, sort_chunk_lines_from_env_value, sort_strategy_from_env_value,
};
use claims_core::constants::DEFAULT_WORK_DIR;
use claims_core::{ClaimParser, CoreConfig, JsonLinesQueue, MergeOutcome, SchemaRegistry};

/// Batch entry point for one claim merge run
///
/// Reads every JSON-lines file in the input directory, merges the claim lines
/// of the configured claim type and writes the merged claims as JSON.
///
/// # Environment Variables
/// - `CLAIMS_TYPE`: claim type to merge (required)
/// - `CLAIMS_INPUT_DIR`: directory holding the claim line files (required)
/// - `CLAIMS_OUTPUT`: output file (default: stdout)
/// - `CLAIMS_WORK_DIR`: directory for staging files (default: ".")
/// - `CLAIMS_SORT_STRATEGY`: `chunked` or `unix` (default: `chunked`)
/// - `CLAIMS_SORT_CHUNK_LINES`: staging lines per sorted run (default: 100000)
/// - `CLAIMS_SCALAR_POLICY`: `last-write-wins` or `first-write-wins`
/// - `CLAIMS_KEEP_SOURCES`: set to `true` to leave input files in place
/// - `CLAIMS_SCHEMA_FILE`: YAML schema overriding the built-in claim types
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claims_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let claim_type = required_env("CLAIMS_TYPE")?;
    let input_dir = PathBuf::from(required_env("CLAIMS_INPUT_DIR")?);
    let work_dir = optional_env("CLAIMS_WORK_DIR").unwrap_or_else(|| DEFAULT_WORK_DIR.into());

    let config = CoreConfig::new(
        PathBuf::from(work_dir),
        sort_chunk_lines_from_env_value(optional_env("CLAIMS_SORT_CHUNK_LINES"))?,
        sort_strategy_from_env_value(optional_env("CLAIMS_SORT_STRATEGY"))?,
        scalar_policy_from_env_value(optional_env("CLAIMS_SCALAR_POLICY"))?,
    )?;

    let schema = match optional_env("CLAIMS_SCHEMA_FILE") {
        Some(path) => SchemaRegistry::from_yaml_str(&std::fs::read_to_string(&path)?)?,
        None => SchemaRegistry::builtin(),
    };

    let parser = ClaimParser::new(&claim_type, &schema, config)?;

    let mut queue = JsonLinesQueue::new();
    if keep_sources(optional_env("CLAIMS_KEEP_SOURCES")) {
        queue = queue.keep_consumed_sources();
    }
    let queued = queue.push_dir(&input_dir)?;

    tracing::info!("++ Starting {} over {} files in {}", parser, queued, input_dir.display());

    let outcome = parser.merge_claim_lines(&mut queue)?;
    write_claims(&outcome, optional_env("CLAIMS_OUTPUT"))?;

    tracing::info!(report = %serde_json::to_string(&outcome.report)?, "run report");

    Ok(())
}

fn required_env(name: &str) -> anyhow::Result<String> {
    optional_env(name).ok_or_else(|| anyhow::anyhow!("{name} must be set"))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn keep_sources(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn write_claims(outcome: &MergeOutcome, output: Option<String>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut writer, &outcome.claims)?;
            writer.flush()?;
        }
        None => {
            let mut writer = io::stdout().lock();
            serde_json::to_writer_pretty(&mut writer, &outcome.claims)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_sources_accepts_truthy_values() {
        assert!(keep_sources(Some("true".into())));
        assert!(keep_sources(Some("YES".into())));
        assert!(keep_sources(Some("1".into())));
        assert!(!keep_sources(Some("no".into())));
        assert!(!keep_sources(None));
    }
}
