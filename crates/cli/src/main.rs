use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use blockbridge_core::{BlockQuery, TargetBlock};
use blockbridge_gen::StatePair;
use blockbridge_persist::{LoadOptions, LoadReport, RecordSource};
use blockbridge_store::{TableConfig, TableStats, TranslationTable};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "blockbridgectl", version, about = "Translate block identities between editions")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Args, Debug)]
struct TableArgs {
    /// Record file to load; repeat or comma-separate for several
    #[arg(long = "records", required = true, action = ArgAction::Append, value_delimiter = ',')]
    records: Vec<PathBuf>,
    /// Abort on the first discriminator that is defined twice
    #[arg(long = "strict", env = "BLOCKBRIDGE_STRICT", action = ArgAction::SetTrue)]
    strict: bool,
    /// Later records replace earlier ones instead of being ignored
    #[arg(long = "overwrite", action = ArgAction::SetTrue)]
    overwrite: bool,
    /// Do not answer legacy values from state anchors by position
    #[arg(long = "no-positional-fallback", action = ArgAction::SetTrue)]
    no_positional_fallback: bool,
}

impl TableArgs {
    fn load_options(&self) -> LoadOptions { LoadOptions { overwrite: self.overwrite, strict: self.strict } }

    fn build(&self) -> Result<(TranslationTable<TargetBlock>, LoadReport)> {
        let sources = self
            .records
            .iter()
            .map(|p| RecordSource::from_file(p))
            .collect::<Result<Vec<_>>>()?;
        let config = TableConfig::default().positional_legacy_fallback(!self.no_positional_fallback);
        let table = TranslationTable::new(config);
        let report = blockbridge_persist::load_sources_parallel(&table, &sources, self.load_options())
            .context("loading translation records")?;
        info!(sources = sources.len(), records = report.total(), conflicts = report.conflicts, "translation table ready");
        Ok((table, report))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve block strings such as `wool 14` or `log[pillar_axis="y"]`
    Lookup {
        #[command(flatten)]
        table: TableArgs,
        /// Also print the target's typed properties
        #[arg(long = "props", action = ArgAction::SetTrue)]
        props: bool,
        /// Block strings to resolve
        #[arg(required = true)]
        blocks: Vec<String>,
    },
    /// Load record files and report what ended up in the table
    Check {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Generate records from paired source/target states
    Gen {
        /// Records that define the source table the pairs are checked against
        #[command(flatten)]
        table: TableArgs,
        /// JSON array of [source name, source state, target name, target state]
        #[arg(long = "pairs")]
        pairs: PathBuf,
        /// Where to write the generated records
        #[arg(long = "out")]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct LookupRow<'a> {
    input: &'a str,
    target: String,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    props: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct CheckOutput {
    load: LoadReport,
    table: TableStats,
}

fn init_tracing() {
    let env = std::env::var("BLOCKBRIDGE_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup { table, props, blocks } => {
            let (table, _) = table.build()?;
            let rows: Vec<LookupRow<'_>> = blocks
                .iter()
                .map(|input| {
                    let m = table.resolve(&BlockQuery::parse_lenient(input));
                    if !m.found {
                        warn!(block = %input, "no translation found");
                    }
                    LookupRow { input: input.as_str(), target: m.target.to_string(), found: m.found, props: props.then(|| m.target.to_json()) }
                })
                .collect();
            match cli.output {
                Output::Human => {
                    for r in rows {
                        let miss = if r.found { "" } else { "  (not found)" };
                        match r.props {
                            Some(p) => println!("{} -> {}  {}{}", r.input, r.target, p, miss),
                            None => println!("{} -> {}{}", r.input, r.target, miss),
                        }
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        Commands::Check { table } => {
            let (table, load) = table.build()?;
            let out = CheckOutput { load, table: table.stats() };
            match cli.output {
                Output::Human => {
                    println!("records: {} legacy, {} state, {} duplicate", out.load.legacy, out.load.states, out.load.conflicts);
                    println!(
                        "table:   {} base names, {} legacy values, {} state anchors",
                        out.table.groups, out.table.legacy_set, out.table.anchors
                    );
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&out)?),
            }
        }
        Commands::Gen { table, pairs: pairs_path, out } => {
            let (source, _) = table.build()?;
            let raw = std::fs::read_to_string(&pairs_path)
                .with_context(|| format!("reading pairs from {}", pairs_path.display()))?;
            let pairs: Vec<StatePair> =
                serde_json::from_str(&raw).with_context(|| format!("parsing pairs in {}", pairs_path.display()))?;
            let g = blockbridge_gen::generate(&pairs, &source);
            blockbridge_persist::write_records_file(&out, &g.records)?;
            info!(path = %out.display(), records = g.records.len(), "wrote generated records");
            match cli.output {
                Output::Human => println!(
                    "{} translated, {} ignored, {} conflicted, {} malformed ({} via best match)",
                    g.report.translated, g.report.ignored, g.report.conflicted, g.report.malformed, g.report.deferred
                ),
                Output::Json => println!("{}", serde_json::to_string_pretty(&g.report)?),
            }
        }
    }
    Ok(())
}
