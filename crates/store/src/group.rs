//! Per-base-name anchor group.
//!
//! All group fields live in one [`GroupState`] behind one `RwLock`: inserts take the write
//! lock, every lookup (the exact-key fast path included) takes the read lock.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use blockbridge_core::{ComparedOutput, LegacyValue, PropertySet};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Result of a precise lookup. `target` is the fallback when `found` is false.
#[must_use]
#[derive(Debug, Clone)]
pub struct Match<T> {
    pub target: Arc<T>,
    pub found: bool,
}

impl<T> Match<T> {
    pub fn into_found(self) -> Option<Arc<T>> { self.found.then_some(self.target) }
}

/// Where a best-effort legacy lookup got its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LegacySource {
    Exact,
    /// The legacy value was used as a position into the state anchors.
    AnchorPosition,
    FirstAnchor,
    Fallback,
}

#[must_use]
#[derive(Debug, Clone)]
pub struct LegacyMatch<T> {
    pub target: Arc<T>,
    pub found: bool,
    pub source: LegacySource,
}

#[must_use]
#[derive(Debug, Clone)]
pub struct BestMatch<T> {
    pub target: Arc<T>,
    pub score: ComparedOutput,
    pub matched_any: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub legacy_len: usize,
    pub legacy_set: usize,
    pub anchors: usize,
}

struct Anchor<T> {
    props: PropertySet,
    target: Arc<T>,
}

struct GroupState<T> {
    legacy: Vec<Option<Arc<T>>>,
    anchors: Vec<Anchor<T>>,
    /// canonical key -> position in `anchors`
    exact: FxHashMap<String, usize>,
    air: Arc<T>,
    unknown: Arc<T>,
}

pub struct AnchorGroup<T> {
    state: RwLock<GroupState<T>>,
    positional_legacy_fallback: bool,
}

impl<T> AnchorGroup<T> {
    pub fn new(air: Arc<T>, unknown: Arc<T>, positional_legacy_fallback: bool) -> Self {
        Self {
            state: RwLock::new(GroupState {
                legacy: Vec::new(),
                anchors: Vec::new(),
                exact: FxHashMap::default(),
                air,
                unknown,
            }),
            positional_legacy_fallback,
        }
    }

    // Poisoning is recovered: the state is only mutated by code that cannot panic midway.
    fn read(&self) -> RwLockReadGuard<'_, GroupState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GroupState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn air(&self) -> Arc<T> { Arc::clone(&self.read().air) }
    pub fn unknown(&self) -> Arc<T> { Arc::clone(&self.read().unknown) }

    /// Returns `true` when the slot was already set and left untouched.
    pub fn insert_by_legacy_value(&self, value: LegacyValue, target: Arc<T>, overwrite: bool) -> bool {
        let mut st = self.write();
        let i = value as usize;
        if st.legacy.len() <= i {
            st.legacy.resize(i + 1, None);
        }
        let slot = &mut st.legacy[i];
        if slot.is_some() && !overwrite {
            return true;
        }
        *slot = Some(target);
        false
    }

    pub fn lookup_exact_by_legacy_value(&self, value: LegacyValue) -> Match<T> {
        let st = self.read();
        match st.legacy.get(value as usize).and_then(|s| s.as_ref()) {
            Some(t) => Match { target: Arc::clone(t), found: true },
            None => Match { target: Arc::clone(&st.air), found: false },
        }
    }

    pub fn lookup_best_by_legacy_value(&self, value: LegacyValue) -> LegacyMatch<T> {
        let st = self.read();
        if let Some(t) = st.legacy.get(value as usize).and_then(|s| s.as_ref()) {
            return LegacyMatch { target: Arc::clone(t), found: true, source: LegacySource::Exact };
        }
        if self.positional_legacy_fallback {
            if let Some(a) = st.anchors.get(value as usize) {
                return LegacyMatch { target: Arc::clone(&a.target), found: true, source: LegacySource::AnchorPosition };
            }
            if let Some(a) = st.anchors.first() {
                return LegacyMatch { target: Arc::clone(&a.target), found: true, source: LegacySource::FirstAnchor };
            }
        }
        LegacyMatch { target: Arc::clone(&st.air), found: false, source: LegacySource::Fallback }
    }

    pub fn lookup_exact_by_state(&self, props: &PropertySet) -> Match<T> {
        let key = props.canonical_key();
        let st = self.read();
        match st.exact.get(&key) {
            Some(&i) => Match { target: Arc::clone(&st.anchors[i].target), found: true },
            None => Match { target: Arc::clone(&st.air), found: false },
        }
    }

    /// Exact key first, then the anchor with the most equal properties and, among those,
    /// the fewest mismatches. Equal scores keep the earlier anchor.
    pub fn lookup_best_by_state(&self, props: &PropertySet) -> BestMatch<T> {
        let key = props.canonical_key();
        let st = self.read();
        if let Some(&i) = st.exact.get(&key) {
            let score = ComparedOutput { same: props.len() as u32, ..ComparedOutput::default() };
            return BestMatch { target: Arc::clone(&st.anchors[i].target), score, matched_any: true };
        }
        let mut best: Option<(usize, ComparedOutput)> = None;
        for (i, anchor) in st.anchors.iter().enumerate() {
            let score = props.compare(&anchor.props);
            if best.map_or(true, |(_, b)| score.beats(&b)) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, score)) => BestMatch { target: Arc::clone(&st.anchors[i].target), score, matched_any: true },
            None => BestMatch { target: Arc::clone(&st.air), score: ComparedOutput::default(), matched_any: false },
        }
    }

    pub fn stats(&self) -> GroupStats {
        let st = self.read();
        GroupStats {
            legacy_len: st.legacy.len(),
            legacy_set: st.legacy.iter().filter(|s| s.is_some()).count(),
            anchors: st.anchors.len(),
        }
    }
}

impl<T: PartialEq> AnchorGroup<T> {
    /// Returns `true` when the key is already present (same target, or a different one
    /// kept because `overwrite` is false). Overwriting replaces the target in place, so
    /// the anchor keeps its position in the tie-break order.
    pub fn insert_by_state(&self, props: PropertySet, target: Arc<T>, overwrite: bool) -> bool {
        let key = props.canonical_key();
        let mut st = self.write();
        if let Some(&i) = st.exact.get(&key) {
            let current = &mut st.anchors[i].target;
            if Arc::ptr_eq(current, &target) || **current == *target || !overwrite {
                return true;
            }
            *current = target;
            return false;
        }
        let pos = st.anchors.len();
        st.anchors.push(Anchor { props, target });
        st.exact.insert(key, pos);
        false
    }
}
