//! blockbridge store: the in-RAM translation table, one anchor group per base name.

#![forbid(unsafe_code)]

use std::sync::{Arc, PoisonError, RwLock};

use blockbridge_core::{BaseName, BlockQuery, LegacyValue, PropertySet, TargetBlock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

pub mod group;

pub use group::{AnchorGroup, BestMatch, GroupStats, LegacyMatch, LegacySource, Match};

/// Fallback targets and lookup policy, built once by the caller and handed to the table.
#[derive(Debug)]
pub struct TableConfig<T> {
    /// Returned by group-level misses.
    pub air: Arc<T>,
    /// Returned when a base name has no group at all.
    pub unknown: Arc<T>,
    /// Let best-effort legacy lookups fall back to state anchors by position.
    pub positional_legacy_fallback: bool,
}

impl<T> TableConfig<T> {
    pub fn new(air: impl Into<Arc<T>>, unknown: impl Into<Arc<T>>) -> Self {
        Self { air: air.into(), unknown: unknown.into(), positional_legacy_fallback: true }
    }

    /// One shared target for both fallback slots.
    pub fn with_fallback(fallback: impl Into<Arc<T>>) -> Self {
        let air = fallback.into();
        Self { unknown: Arc::clone(&air), air, positional_legacy_fallback: true }
    }

    pub fn positional_legacy_fallback(mut self, enabled: bool) -> Self {
        self.positional_legacy_fallback = enabled;
        self
    }
}

impl<T> Clone for TableConfig<T> {
    fn clone(&self) -> Self {
        Self {
            air: Arc::clone(&self.air),
            unknown: Arc::clone(&self.unknown),
            positional_legacy_fallback: self.positional_legacy_fallback,
        }
    }
}

impl Default for TableConfig<TargetBlock> {
    fn default() -> Self { Self::with_fallback(TargetBlock::new("minecraft:air", "")) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub groups: usize,
    pub legacy_set: usize,
    pub anchors: usize,
}

pub struct TranslationTable<T> {
    config: TableConfig<T>,
    groups: RwLock<FxHashMap<BaseName, Arc<AnchorGroup<T>>>>,
}

impl<T> TranslationTable<T> {
    pub fn new(config: TableConfig<T>) -> Self {
        Self { config, groups: RwLock::new(FxHashMap::default()) }
    }

    pub fn config(&self) -> &TableConfig<T> { &self.config }

    pub fn len(&self) -> usize { self.groups.read().unwrap_or_else(PoisonError::into_inner).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn group(&self, name: &BaseName) -> Option<Arc<AnchorGroup<T>>> {
        self.groups.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Check, create and register under one write lock so racing first inserts for the
    /// same name end up sharing a single group.
    fn ensure_group(&self, name: &BaseName) -> Arc<AnchorGroup<T>> {
        if let Some(g) = self.group(name) {
            return g;
        }
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let g = groups.entry(name.clone()).or_insert_with(|| {
            debug!(base = %name, "creating anchor group");
            Arc::new(AnchorGroup::new(
                Arc::clone(&self.config.air),
                Arc::clone(&self.config.unknown),
                self.config.positional_legacy_fallback,
            ))
        });
        let g = Arc::clone(g);
        metrics::gauge!("table_groups", groups.len() as f64);
        g
    }

    /// Sorted base names that have a group.
    pub fn base_names(&self) -> Vec<BaseName> {
        let mut names: Vec<BaseName> =
            self.groups.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> TableStats {
        let groups: Vec<Arc<AnchorGroup<T>>> =
            self.groups.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect();
        let mut out = TableStats { groups: groups.len(), ..TableStats::default() };
        for g in groups.iter() {
            let s = g.stats();
            out.legacy_set += s.legacy_set;
            out.anchors += s.anchors;
        }
        out
    }

    /// Returns `true` when the value was already mapped and left untouched.
    pub fn add_anchor_by_legacy_value(
        &self,
        name: &BaseName,
        value: LegacyValue,
        target: impl Into<Arc<T>>,
        overwrite: bool,
    ) -> bool {
        self.ensure_group(name).insert_by_legacy_value(value, target.into(), overwrite)
    }

    pub fn precise_match_by_legacy_value(&self, name: &BaseName, value: LegacyValue) -> Match<T> {
        match self.group(name) {
            Some(g) => g.lookup_exact_by_legacy_value(value),
            None => Match { target: Arc::clone(&self.config.unknown), found: false },
        }
    }

    pub fn try_best_search_by_legacy_value(&self, name: &BaseName, value: LegacyValue) -> LegacyMatch<T> {
        match self.group(name) {
            Some(g) => g.lookup_best_by_legacy_value(value),
            None => LegacyMatch {
                target: Arc::clone(&self.config.unknown),
                found: false,
                source: LegacySource::Fallback,
            },
        }
    }

    pub fn precise_match_by_state(&self, name: &BaseName, props: &PropertySet) -> Match<T> {
        match self.group(name) {
            Some(g) => g.lookup_exact_by_state(props),
            None => Match { target: Arc::clone(&self.config.unknown), found: false },
        }
    }

    pub fn try_best_search_by_state(&self, name: &BaseName, props: &PropertySet) -> BestMatch<T> {
        match self.group(name) {
            Some(g) => g.lookup_best_by_state(props),
            None => BestMatch {
                target: Arc::clone(&self.config.unknown),
                score: Default::default(),
                matched_any: false,
            },
        }
    }

    /// Best-effort lookup for a parsed block string.
    pub fn resolve(&self, query: &BlockQuery) -> Match<T> {
        match query {
            BlockQuery::Legacy { name, value } => {
                let m = self.try_best_search_by_legacy_value(name, *value);
                if m.source != LegacySource::Exact && m.found {
                    debug!(base = %name, value, source = ?m.source, "legacy value resolved through state anchors");
                }
                Match { target: m.target, found: m.found }
            }
            BlockQuery::State { name, props } => {
                let m = self.try_best_search_by_state(name, props);
                Match { target: m.target, found: m.matched_any }
            }
        }
    }
}

impl<T: PartialEq> TranslationTable<T> {
    /// Returns `true` when the state key was already present (see [`AnchorGroup::insert_by_state`]).
    pub fn add_anchor_by_state(
        &self,
        name: &BaseName,
        props: PropertySet,
        target: impl Into<Arc<T>>,
        overwrite: bool,
    ) -> bool {
        self.ensure_group(name).insert_by_state(props, target.into(), overwrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TranslationTable<TargetBlock> {
        TranslationTable::new(TableConfig::new(
            TargetBlock::new("minecraft:air", ""),
            TargetBlock::new("minecraft:barrier", ""),
        ))
    }

    #[test]
    fn unknown_base_name_returns_configured_fallback() {
        let t = table();
        let name = BaseName::new("nope");
        let m = t.precise_match_by_legacy_value(&name, 0);
        assert!(!m.found);
        assert_eq!(m.target.name(), "minecraft:barrier");
        assert!(!t.try_best_search_by_legacy_value(&name, 0).found);
        assert!(!t.precise_match_by_state(&name, &PropertySet::new()).found);
        let b = t.try_best_search_by_state(&name, &PropertySet::new());
        assert!(!b.matched_any);
        assert_eq!(b.target.name(), "minecraft:barrier");
    }

    #[test]
    fn groups_seeded_with_table_fallbacks() {
        let t = table();
        let name = BaseName::new("stone");
        assert!(!t.add_anchor_by_legacy_value(&name, 3, TargetBlock::new("minecraft:stone", ""), false));
        let m = t.precise_match_by_legacy_value(&name, 1);
        assert!(!m.found);
        assert_eq!(m.target.name(), "minecraft:air");
        let g = t.group(&name).unwrap();
        assert_eq!(g.unknown().name(), "minecraft:barrier");
    }

    #[test]
    fn namespaced_names_share_a_group() {
        let t = table();
        let props = PropertySet::parse("{axis=y}").unwrap();
        let _ = t.add_anchor_by_state(&BaseName::new("minecraft:oak_log"), props.clone(), TargetBlock::new("minecraft:oak_log", "axis=y"), false);
        let m = t.precise_match_by_state(&BaseName::new("oak_log"), &props);
        assert!(m.found);
        assert_eq!(m.target.to_string(), "minecraft:oak_log[axis=y]");
        assert_eq!(t.len(), 1);
        assert_eq!(t.base_names(), vec![BaseName::new("oak_log")]);
    }

    #[test]
    fn resolve_routes_both_query_shapes() {
        let t = table();
        let wool = BaseName::new("wool");
        let _ = t.add_anchor_by_legacy_value(&wool, 14, TargetBlock::new("minecraft:red_wool", ""), false);
        let _ = t.add_anchor_by_state(
            &BaseName::new("coral_block"),
            PropertySet::parse(r#"{coral_color="yellow",dead_bit=0b}"#).unwrap(),
            TargetBlock::new("minecraft:horn_coral_block", ""),
            false,
        );
        let m = t.resolve(&BlockQuery::parse("wool 14").unwrap());
        assert!(m.found);
        assert_eq!(m.target.name(), "minecraft:red_wool");
        let m = t.resolve(&BlockQuery::parse(r#"coral_block[coral_color="yellow",dead_bit=1b]"#).unwrap());
        assert!(m.found, "fuzzy match expected");
        assert_eq!(m.target.name(), "minecraft:horn_coral_block");
        let stats = t.stats();
        assert_eq!(stats, TableStats { groups: 2, legacy_set: 1, anchors: 1 });
    }

    #[test]
    fn positional_fallback_can_be_disabled() {
        let t: TranslationTable<TargetBlock> =
            TranslationTable::new(TableConfig::default().positional_legacy_fallback(false));
        let name = BaseName::new("planks");
        let _ = t.add_anchor_by_state(&name, PropertySet::parse("{wood_type=oak}").unwrap(), TargetBlock::new("minecraft:oak_planks", ""), false);
        let m = t.try_best_search_by_legacy_value(&name, 0);
        assert!(!m.found);
        assert_eq!(m.source, LegacySource::Fallback);
    }
}
