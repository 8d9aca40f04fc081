//! blockbridge gen: build conversion records from paired (source state, target state)
//! data, checked against an already-built source table.
//!
//! Two phases, in this order:
//! 1. [`plan`]: pairs whose source state is a precise match are committed; pairs that
//!    only miss the precise index are deferred.
//! 2. [`resolve_deferred`]: deferred pairs are retried with best-match search and
//!    committed after every phase-one record, so a guessed association can never take a
//!    key an exact one claims.

#![forbid(unsafe_code)]

use std::sync::Arc;

use blockbridge_core::{BaseName, PropertySet, TargetBlock};
use blockbridge_persist::ConversionRecord;
use blockbridge_store::{TableConfig, TranslationTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One row of paired data: a source block state and the target block it becomes.
/// Deserializes from a four-element JSON array as well as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePair {
    pub source_name: String,
    pub source_state: String,
    pub target_name: String,
    pub target_state: String,
}

impl<S: Into<String>> From<[S; 4]> for StatePair {
    fn from([source_name, source_state, target_name, target_state]: [S; 4]) -> Self {
        Self {
            source_name: source_name.into(),
            source_state: source_state.into(),
            target_name: target_name.into(),
            target_state: target_state.into(),
        }
    }
}

/// A pair whose source side has been parsed.
#[derive(Debug, Clone)]
pub struct Candidate {
    base: BaseName,
    props: PropertySet,
    target_name: String,
    target_state: String,
}

impl Candidate {
    fn from_pair(pair: &StatePair) -> Result<Self, blockbridge_core::Error> {
        Ok(Self {
            base: BaseName::new(&pair.source_name),
            props: PropertySet::parse(&pair.source_state)?,
            target_name: pair.target_name.clone(),
            target_state: pair.target_state.clone(),
        })
    }

    pub fn base(&self) -> &BaseName { &self.base }
    pub fn props(&self) -> &PropertySet { &self.props }

    fn targets_air(&self) -> bool { matches!(self.target_name.as_str(), "air" | "minecraft:air") }

    fn record(&self) -> ConversionRecord {
        let state = if self.target_state == "{}" { "" } else { self.target_state.as_str() };
        ConversionRecord::new(self.base.as_str(), self.props.record_form(), self.target_name.as_str(), state)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub translated: usize,
    pub ignored: usize,
    pub conflicted: usize,
    pub malformed: usize,
    /// Pairs that went through the best-match phase.
    pub deferred: usize,
}

/// Output of phase one.
#[derive(Debug, Default)]
pub struct Plan {
    pub exact: Vec<Candidate>,
    pub deferred: Vec<Candidate>,
    pub ignored: usize,
    pub malformed: usize,
}

/// Phase one: classify every pair by precise lookup in `source`.
pub fn plan<S>(pairs: &[StatePair], source: &TranslationTable<S>) -> Plan {
    let mut out = Plan::default();
    for pair in pairs {
        let cand = match Candidate::from_pair(pair) {
            Ok(c) => c,
            Err(e) => {
                warn!(source = %pair.source_name, error = %e, "skipping pair with unreadable source state");
                out.malformed += 1;
                continue;
            }
        };
        if !source.precise_match_by_state(&cand.base, &cand.props).found {
            out.deferred.push(cand);
        } else if cand.targets_air() {
            out.ignored += 1;
        } else {
            out.exact.push(cand);
        }
    }
    out
}

/// Output of phase two.
#[derive(Debug, Default)]
pub struct Resolved {
    pub matched: Vec<Candidate>,
    pub ignored: usize,
}

/// Phase two: keep the deferred pairs whose source state has any best match.
pub fn resolve_deferred<S>(deferred: Vec<Candidate>, source: &TranslationTable<S>) -> Resolved {
    let mut out = Resolved::default();
    for cand in deferred {
        let found = source.try_best_search_by_state(&cand.base, &cand.props).matched_any;
        if !found || cand.targets_air() {
            debug!(source = %cand.base, state = %cand.props, "no source match for deferred pair");
            out.ignored += 1;
            continue;
        }
        out.matched.push(cand);
    }
    out
}

/// Commits candidates into a staging table so that a key is claimed at most once.
struct Stage {
    table: TranslationTable<TargetBlock>,
    records: Vec<ConversionRecord>,
    report: GenerationReport,
}

impl Stage {
    fn new() -> Self {
        Self { table: TranslationTable::new(TableConfig::default()), records: Vec::new(), report: GenerationReport::default() }
    }

    fn commit_all(&mut self, cands: Vec<Candidate>) {
        for cand in cands {
            let target = Arc::new(TargetBlock::new(cand.target_name.as_str(), cand.target_state.as_str()));
            if self.table.add_anchor_by_state(&cand.base, cand.props.clone(), Arc::clone(&target), false) {
                let held = self.table.precise_match_by_state(&cand.base, &cand.props);
                if held.target == target {
                    self.report.ignored += 1;
                } else {
                    debug!(source = %cand.base, state = %cand.props, kept = %held.target, rejected = %target, "conflicting pair");
                    self.report.conflicted += 1;
                }
                continue;
            }
            self.records.push(cand.record());
            self.report.translated += 1;
        }
    }
}

#[derive(Debug, Default)]
pub struct Generation {
    pub records: Vec<ConversionRecord>,
    pub report: GenerationReport,
}

/// Run both phases and return the records in commit order.
pub fn generate<S>(pairs: &[StatePair], source: &TranslationTable<S>) -> Generation {
    let planned = plan(pairs, source);
    let deferred = planned.deferred.len();

    let mut stage = Stage::new();
    stage.commit_all(planned.exact);
    let resolved = resolve_deferred(planned.deferred, source);
    stage.commit_all(resolved.matched);

    let mut report = stage.report;
    report.ignored += planned.ignored + resolved.ignored;
    report.malformed = planned.malformed;
    report.deferred = deferred;
    info!(
        translated = report.translated,
        ignored = report.ignored,
        conflicted = report.conflicted,
        malformed = report.malformed,
        deferred = report.deferred,
        "generated conversion records"
    );
    metrics::counter!("gen_records_total", report.translated as u64);
    metrics::counter!("gen_conflicts_total", report.conflicted as u64);
    Generation { records: stage.records, report }
}
