//! blockbridge persistence: the four-line conversion record format and the loader that
//! feeds records into a translation table.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use blockbridge_core::{BaseName, LegacyValue, PropertySet, TargetBlock};
use blockbridge_store::TranslationTable;
use metrics::{counter, histogram};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One persisted rule: base name, discriminator (legacy value or property set), target
/// name and target state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub name: String,
    pub discriminator: String,
    pub target_name: String,
    pub target_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminator {
    Legacy(LegacyValue),
    State(PropertySet),
}

impl ConversionRecord {
    pub fn new(
        name: impl Into<String>,
        discriminator: impl Into<String>,
        target_name: impl Into<String>,
        target_state: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            discriminator: discriminator.into(),
            target_name: target_name.into(),
            target_state: target_state.into(),
        }
    }

    /// Integer first; anything that is not an integer is read as a property set.
    pub fn discriminator(&self) -> std::result::Result<Discriminator, blockbridge_core::Error> {
        let raw = self.discriminator.trim();
        if let Ok(n) = raw.parse::<i64>() {
            return LegacyValue::try_from(n).map(Discriminator::Legacy).map_err(|_| {
                blockbridge_core::Error::MalformedPropertyData {
                    input: raw.to_string(),
                    reason: "legacy value out of range".to_string(),
                }
            });
        }
        PropertySet::parse(raw).map(Discriminator::State)
    }
}

impl fmt::Display for ConversionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}\n{}\n{}\n", self.name, self.discriminator, self.target_name, self.target_state)
    }
}

/// Split text into records of four consecutive lines. Records with an empty name are
/// skipped; an incomplete trailing group is dropped.
pub fn parse_records(text: &str) -> Vec<ConversionRecord> {
    let lines: Vec<&str> = text.split('\n').map(str::trim).collect();
    let mut out = Vec::with_capacity(lines.len() / 4);
    let mut chunks = lines.chunks_exact(4);
    for chunk in chunks.by_ref() {
        if chunk[0].is_empty() {
            continue;
        }
        out.push(ConversionRecord::new(chunk[0], chunk[1], chunk[2], chunk[3]));
    }
    let rest = chunks.remainder();
    if rest.iter().any(|l| !l.is_empty()) {
        warn!(lines = rest.len(), first = %rest[0], "dropping incomplete trailing record");
    }
    out
}

pub fn write_records<'a>(records: impl IntoIterator<Item = &'a ConversionRecord>) -> String {
    records.into_iter().map(|r| r.to_string()).collect()
}

pub fn read_records_file(path: &Path) -> Result<Vec<ConversionRecord>> {
    let started = std::time::Instant::now();
    let raw = std::fs::read(path).with_context(|| format!("reading records from {}", path.display()))?;
    let bytes = maybe_decompress(raw).with_context(|| format!("decompressing {}", path.display()))?;
    let text = String::from_utf8(bytes).with_context(|| format!("records in {} are not UTF-8", path.display()))?;
    let records = parse_records(&text);
    histogram!("records_read_ms", started.elapsed().as_secs_f64() * 1000.0);
    debug!(path = %path.display(), records = records.len(), "read record file");
    Ok(records)
}

pub fn write_records_file(path: &Path, records: &[ConversionRecord]) -> Result<()> {
    let text = write_records(records);
    std::fs::write(path, maybe_compress(&text)).with_context(|| format!("writing records to {}", path.display()))
}

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

fn maybe_decompress(raw: Vec<u8>) -> Result<Vec<u8>> {
    if !raw.starts_with(&ZSTD_MAGIC) {
        return Ok(raw);
    }
    decode_zstd(raw)
}

#[cfg(feature = "zstd")]
fn decode_zstd(raw: Vec<u8>) -> Result<Vec<u8>> {
    Ok(zstd::decode_all(std::io::Cursor::new(raw))?)
}

#[cfg(not(feature = "zstd"))]
fn decode_zstd(_raw: Vec<u8>) -> Result<Vec<u8>> {
    anyhow::bail!("zstd-compressed record file, but zstd support is not enabled")
}

fn maybe_compress(text: &str) -> Vec<u8> {
    #[cfg(feature = "zstd")]
    {
        let lvl: i32 = std::env::var("BLOCKBRIDGE_ZSTD_LEVEL").ok().and_then(|s| s.parse().ok()).unwrap_or(0);
        if lvl > 0 {
            return zstd::encode_all(text.as_bytes(), lvl).unwrap_or_else(|_| text.as_bytes().to_vec());
        }
    }
    text.as_bytes().to_vec()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Replace targets already present for the same discriminator.
    pub overwrite: bool,
    /// Treat an already-present discriminator as a fatal error.
    pub strict: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("record for {base_name}: {source}")]
    Malformed {
        base_name: String,
        #[source]
        source: blockbridge_core::Error,
    },
    #[error("conflicting translation for {base_name} {discriminator} -> {target}")]
    Conflict { base_name: String, discriminator: String, target: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub legacy: usize,
    pub states: usize,
    pub conflicts: usize,
}

impl LoadReport {
    pub fn total(&self) -> usize { self.legacy + self.states }

    fn merge(mut self, other: LoadReport) -> LoadReport {
        self.legacy += other.legacy;
        self.states += other.states;
        self.conflicts += other.conflicts;
        self
    }
}

/// Insert one record. Returns whether the discriminator was already present.
pub fn load_record(
    table: &TranslationTable<TargetBlock>,
    record: &ConversionRecord,
    opts: LoadOptions,
) -> std::result::Result<bool, LoadError> {
    let base = BaseName::new(&record.name);
    let target = TargetBlock::new(record.target_name.as_str(), record.target_state.as_str());
    let discriminator = record
        .discriminator()
        .map_err(|source| LoadError::Malformed { base_name: record.name.clone(), source })?;
    let (exists, shown) = match discriminator {
        Discriminator::Legacy(v) => {
            let shown = opts.strict.then(|| v.to_string());
            (table.add_anchor_by_legacy_value(&base, v, target.clone(), opts.overwrite), shown)
        }
        Discriminator::State(props) => {
            let shown = opts.strict.then(|| props.canonical_key());
            (table.add_anchor_by_state(&base, props, target.clone(), opts.overwrite), shown)
        }
    };
    if exists && opts.strict {
        return Err(LoadError::Conflict {
            base_name: base.to_string(),
            discriminator: shown.unwrap_or_default(),
            target: target.to_string(),
        });
    }
    Ok(exists)
}

/// Load every record in order. Any error aborts the whole load.
pub fn load_records(
    table: &TranslationTable<TargetBlock>,
    records: &[ConversionRecord],
    opts: LoadOptions,
) -> std::result::Result<LoadReport, LoadError> {
    let started = std::time::Instant::now();
    let mut report = LoadReport::default();
    for record in records {
        let legacy = record.discriminator.trim().parse::<i64>().is_ok();
        let exists = load_record(table, record, opts)?;
        if exists {
            report.conflicts += 1;
            debug!(base = %record.name, discriminator = %record.discriminator, "translation already present; kept first");
        } else if legacy {
            report.legacy += 1;
        } else {
            report.states += 1;
        }
    }
    counter!("records_loaded_total", report.total() as u64);
    counter!("records_conflicts_total", report.conflicts as u64);
    histogram!("records_load_ms", started.elapsed().as_secs_f64() * 1000.0);
    Ok(report)
}

/// A named batch of records, typically one definition file.
#[derive(Debug, Clone, Default)]
pub struct RecordSource {
    pub label: String,
    pub records: Vec<ConversionRecord>,
}

impl RecordSource {
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self { label: path.display().to_string(), records: read_records_file(path)? })
    }
}

/// Load several sources concurrently into one table. Sources race for shared
/// discriminators, so order between sources is not defined; within a source it is.
pub fn load_sources_parallel(
    table: &TranslationTable<TargetBlock>,
    sources: &[RecordSource],
    opts: LoadOptions,
) -> std::result::Result<LoadReport, LoadError> {
    let reports = sources
        .par_iter()
        .map(|src| {
            let r = load_records(table, &src.records, opts);
            match &r {
                Ok(rep) => info!(source = %src.label, legacy = rep.legacy, states = rep.states, conflicts = rep.conflicts, "loaded record source"),
                Err(e) => warn!(source = %src.label, error = %e, "record source failed to load"),
            }
            r
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(reports.into_iter().fold(LoadReport::default(), LoadReport::merge))
}
