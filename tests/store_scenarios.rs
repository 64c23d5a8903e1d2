mod common;

use std::collections::{HashMap, HashSet};

use common::{open_store, Entry, EntryDescriptor};
use rowstore::{
    rules::{NumericRule, Operation},
    Descriptor, RowStore, RuleSelector, StoreError, StoreOptions,
};
use tempfile::TempDir;

fn insert_abc(store: &mut RowStore<EntryDescriptor>) {
    store.add(&Entry::new("a", 1, 0)).unwrap();
    store.add(&Entry::new("b", 2, 1)).unwrap();
    store.add(&Entry::new("c", 3, 2)).unwrap();
}

#[test]
fn window_returns_newest_rows_first() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    insert_abc(&mut store);

    let window = store
        .get_converted_rows_between_indices(0, 1, Entry::blank, None)
        .unwrap();
    assert_eq!(window, [Entry::new("c", 3, 2), Entry::new("b", 2, 1)]);
}

#[test]
fn rule_predicate_counts_matching_rows() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    insert_abc(&mut store);

    let rule = NumericRule::new(|entry: &Entry| entry.score as f64)
        .with_operation(Operation::GreaterThan)
        .with_value1(1.0);
    assert_eq!(store.row_count(Some(&RuleSelector(&rule))).unwrap(), 2);
    assert_eq!(store.row_count(None).unwrap(), 3);
}

#[test]
fn misconfigured_rule_surfaces_as_error() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    insert_abc(&mut store);

    let rule = NumericRule::new(|entry: &Entry| entry.score as f64)
        .with_operation(Operation::Contains)
        .with_value1(1.0);
    assert!(matches!(
        store.get_converted_rows(Some(&RuleSelector(&rule))),
        Err(StoreError::Rule(_))
    ));
}

#[test]
fn update_rewrites_the_same_physical_row() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    insert_abc(&mut store);
    let id = store.row_id_of("b").unwrap();

    store.update_row(&Entry::new("b", 20, 1)).unwrap();
    assert_eq!(store.row_id_of("b"), Some(id));

    let rows = store.get_converted_rows(None).unwrap();
    let matching: Vec<_> = rows.iter().filter(|entry| entry.name == "b").collect();
    assert_eq!(matching, [&Entry::new("b", 20, 1)]);
    assert_eq!(rows.len(), 3);
}

#[test]
fn stored_rows_round_trip_through_the_descriptor() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let entry = Entry::new("round", -42, 12_345);
    store.add(&entry).unwrap();

    let (handle, mut rows) = store.all_rows().unwrap();
    let stored = rows.next().unwrap().unwrap();
    assert!(rows.next().is_none());
    store.close_row_reader(handle).unwrap();

    let descriptor = store.descriptor();
    assert_eq!(descriptor.primary_key(&stored), descriptor.primary_key(&entry));
    assert_eq!(descriptor.date(&stored), descriptor.date(&entry));
    assert_eq!(descriptor.to_row(&stored), descriptor.to_row(&entry));
}

#[test]
fn key_mapping_tracks_latest_insert_per_key() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let mut rng = fastrand::Rng::with_seed(7);
    let mut expected = HashMap::new();
    let mut last_id = None;

    for second in 0..200 {
        let name = format!("k{}", rng.u8(..20));
        let entry = Entry::new(&name, rng.i64(-100..100), second);
        let id = if rng.bool() {
            store.add(&entry).unwrap()
        } else {
            store.add_range([&entry]).unwrap();
            store.row_id_of(&name).unwrap()
        };
        if let Some(last) = last_id {
            assert!(id > last, "row ids increase with insertion order");
        }
        last_id = Some(id);
        expected.insert(name, id);
    }

    assert_eq!(store.mapped_key_count(), expected.len());
    for (name, id) in &expected {
        assert_eq!(store.row_id_of(name), Some(*id));
    }
    assert_eq!(store.row_count(None).unwrap(), 200);
}

#[test]
fn window_pads_with_defaults_past_the_end() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    insert_abc(&mut store);

    let window = store
        .get_converted_rows_between_indices(2, 5, Entry::blank, None)
        .unwrap();
    assert_eq!(window.len(), 4);
    assert_eq!(window[0], Entry::new("a", 1, 0));
    assert!(window[1..].iter().all(|entry| *entry == Entry::blank()));

    let even = |entry: &Entry| entry.score % 2 == 0;
    let window = store
        .get_converted_rows_between_indices(0, 2, Entry::blank, Some(&even))
        .unwrap();
    assert_eq!(window, [Entry::new("b", 2, 1), Entry::blank(), Entry::blank()]);
}

#[test]
fn open_cursors_do_not_see_later_inserts() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    for second in 0..10 {
        store.add(&Entry::new(&format!("e{second}"), second, second)).unwrap();
    }

    let (first, early) = store.all_rows().unwrap();
    for second in 10..15 {
        store.add(&Entry::new(&format!("e{second}"), second, second)).unwrap();
    }
    let (second, late) = store.all_rows().unwrap();

    assert_eq!(early.count(), 10);
    assert_eq!(late.count(), 15);
    store.close_row_reader(first).unwrap();
    store.close_row_reader(second).unwrap();
}

#[test]
fn nested_readers_are_independent() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    insert_abc(&mut store);

    let (outer_handle, outer) = store.all_rows().unwrap();
    let mut pairs = HashSet::new();
    for outer in outer {
        let outer = outer.unwrap();
        let (inner_handle, inner) = store.all_rows().unwrap();
        for inner in inner {
            pairs.insert((outer.name.clone(), inner.unwrap().name));
        }
        store.close_row_reader(inner_handle).unwrap();
    }
    store.close_row_reader(outer_handle).unwrap();
    assert_eq!(pairs.len(), 9);
    assert_eq!(store.open_reader_count(), 0);
}

#[test]
fn closing_a_handle_twice_fails() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (handle, _) = store.all_rows().unwrap();
    store.close_row_reader(handle).unwrap();
    assert!(matches!(
        store.close_row_reader(handle),
        Err(StoreError::UnknownCursor(_))
    ));
}

#[test]
fn reopening_restores_keys_and_recreate_discards_rows() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_store(&dir);
        insert_abc(&mut store);
        store.add(&Entry::new("a", 10, 3)).unwrap();
    }

    let mut store = open_store(&dir);
    assert_eq!(store.row_id_of("a"), Some(3));
    store.update_row(&Entry::new("a", 11, 3)).unwrap();
    let rows = store.get_converted_rows(None).unwrap();
    assert_eq!(rows[0], Entry::new("a", 11, 3));
    assert_eq!(rows[3], Entry::new("a", 1, 0));
    store.disconnect().unwrap();

    let options = StoreOptions::from(dir.path().join("entries.db")).recreate(true);
    let store = RowStore::open(options, EntryDescriptor::default()).unwrap();
    assert_eq!(store.row_count(None).unwrap(), 0);
    assert_eq!(store.mapped_key_count(), 0);
}

#[test]
fn halt_from_another_thread_stops_a_batch() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(&dir);
    let halt = store.halt_handle();
    let entries: Vec<_> = (0..50)
        .map(|second| Entry::new(&format!("h{second}"), second, second))
        .collect();

    std::thread::spawn(move || halt.halt()).join().unwrap();
    assert_eq!(store.add_range(&entries).unwrap(), 0);
    assert!(matches!(
        store.update_row(&Entry::new("h0", 0, 0)),
        Err(StoreError::Halted)
    ));

    store.halt_handle().resume();
    assert_eq!(store.add_range(&entries).unwrap(), 50);
}
