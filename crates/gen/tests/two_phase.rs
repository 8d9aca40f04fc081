#![forbid(unsafe_code)]

use blockbridge_core::{BaseName, PropertySet, TargetBlock};
use blockbridge_gen::{generate, plan, resolve_deferred, StatePair};
use blockbridge_persist::{load_records, LoadOptions};
use blockbridge_store::{TableConfig, TranslationTable};

fn source_table() -> TranslationTable<u32> {
    let t = TranslationTable::new(TableConfig::with_fallback(0u32));
    let log = BaseName::new("log");
    for (i, axis) in ["x", "y", "z"].iter().enumerate() {
        let props = PropertySet::parse(&format!("{{pillar_axis={axis},old_log_type=oak}}")).unwrap();
        let _ = t.add_anchor_by_state(&log, props, 200 + i as u32, false);
    }
    t
}

fn pair(a: &str, b: &str, c: &str, d: &str) -> StatePair { StatePair::from([a, b, c, d]) }

#[test]
fn exact_records_are_committed_before_fuzzy_ones() {
    let src = source_table();
    let pairs = vec![
        // not in the source table as written; only a best match exists
        pair("log", "{pillar_axis=y,old_log_type=oak,stripped_bit=0b}", "minecraft:oak_log", "axis=\"y\""),
        pair("log", "{pillar_axis=x,old_log_type=oak}", "minecraft:oak_log", "axis=\"x\""),
        pair("log", "{pillar_axis=z,old_log_type=oak}", "minecraft:oak_log", "axis=\"z\""),
    ];
    let g = generate(&pairs, &src);
    assert_eq!(g.report.translated, 3);
    assert_eq!(g.report.deferred, 1);
    let keys: Vec<&str> = g.records.iter().map(|r| r.discriminator.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "{old_log_type=oak,pillar_axis=x}",
            "{old_log_type=oak,pillar_axis=z}",
            "{old_log_type=oak,pillar_axis=y,stripped_bit=0b}",
        ]
    );
}

#[test]
fn later_pairs_cannot_displace_committed_keys() {
    let src = source_table();
    let pairs = vec![
        pair("log", "{pillar_axis=x,old_log_type=oak}", "minecraft:oak_log", "axis=\"x\""),
        pair("log", "{old_log_type=oak,pillar_axis=x}", "minecraft:birch_log", "axis=\"x\""),
        pair("log", "{pillar_axis=x,old_log_type=oak}", "minecraft:oak_log", "axis=\"x\""),
    ];
    let g = generate(&pairs, &src);
    assert_eq!(g.records.len(), 1);
    assert_eq!(g.report.conflicted, 1);
    assert_eq!(g.report.ignored, 1);
    assert_eq!(g.records[0].target_name, "minecraft:oak_log");
}

#[test]
fn phases_can_run_separately() {
    let src = source_table();
    let pairs = vec![
        pair("log", "{pillar_axis=y}", "minecraft:oak_log", "axis=\"y\""),
        pair("log", "{pillar_axis=y,old_log_type=oak}", "minecraft:oak_log", "axis=\"y\""),
    ];
    let planned = plan(&pairs, &src);
    assert_eq!(planned.exact.len(), 1);
    assert_eq!(planned.deferred.len(), 1);
    assert_eq!(planned.deferred[0].props().len(), 1);
    let resolved = resolve_deferred(planned.deferred, &src);
    assert_eq!(resolved.matched.len(), 1);
    assert_eq!(resolved.ignored, 0);
}

#[test]
fn generated_records_load_into_a_target_table() {
    let src = source_table();
    let gate = BaseName::new("fence_gate");
    let gate_state = r#"{"minecraft:cardinal_direction"="north",open_bit=0b}"#;
    let _ = src.add_anchor_by_state(&gate, PropertySet::parse(gate_state).unwrap(), 300u32, false);
    let sign = BaseName::new("sign");
    let sign_state = r#"{label="true",ground_sign_direction=4}"#;
    let _ = src.add_anchor_by_state(&sign, PropertySet::parse(sign_state).unwrap(), 400u32, false);

    let pairs = vec![
        pair("log", "{pillar_axis=x,old_log_type=oak}", "minecraft:oak_log", "axis=\"x\""),
        pair("log", "{pillar_axis=y,old_log_type=oak}", "minecraft:oak_log", "axis=\"y\""),
        pair("fence_gate", gate_state, "minecraft:oak_fence_gate", "facing=\"north\",open=false"),
        pair("sign", sign_state, "minecraft:oak_sign", "rotation=4"),
    ];
    let g = generate(&pairs, &src);
    assert_eq!(g.report.translated, 4);
    let table: TranslationTable<TargetBlock> = TranslationTable::new(TableConfig::default());
    let report = load_records(&table, &g.records, LoadOptions { overwrite: false, strict: true }).unwrap();
    assert_eq!(report.states, 4);

    let m = table.try_best_search_by_state(
        &BaseName::new("log"),
        &PropertySet::parse("{pillar_axis=y,old_log_type=oak,stripped_bit=1b}").unwrap(),
    );
    assert!(m.matched_any);
    assert_eq!(m.target.to_string(), "minecraft:oak_log[axis=y]");

    let m = table.precise_match_by_state(&gate, &PropertySet::parse(gate_state).unwrap());
    assert!(m.found);
    assert_eq!(m.target.name(), "minecraft:oak_fence_gate");
    let m = table.precise_match_by_state(&sign, &PropertySet::parse(sign_state).unwrap());
    assert!(m.found);
    assert_eq!(m.target.name(), "minecraft:oak_sign");
}
