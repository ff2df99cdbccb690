mod common;

use common::{column_values, ids, numbers, strings};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;
use tidyframe_engine::{
    join_indices, AsofDirection, AsofSpec, Column, ColumnType, FrameError, JoinKind, JoinSpec,
    SchemaError, Table, TableVerbs, Value, UNMATCHED,
};

fn left() -> Table {
    ids("id", &[1.0, 2.0, 3.0])
}

fn right() -> Table {
    Table::new(vec![
        Column::numbers("id", [2.0, 3.0, 4.0]),
        Column::strings("label", ["two", "three", "four"]),
    ])
    .unwrap()
}

#[test]
fn inner_left_and_cross_cardinalities() {
    let inner = left().inner_join(&right(), JoinSpec::on("id")).unwrap();
    assert_eq!(inner.column_names(), vec!["id", "label"]);
    assert_eq!(column_values(&inner, "id"), numbers(&[2.0, 3.0]));
    assert_eq!(column_values(&inner, "label"), strings(&["two", "three"]));

    let left_join = left().left_join(&right(), JoinSpec::on("id")).unwrap();
    assert_eq!(left_join.row_count(), 3);
    assert_eq!(
        column_values(&left_join, "label"),
        vec![Value::Null, Value::from("two"), Value::from("three")]
    );

    let cross = left().cross_join(&right()).unwrap();
    assert_eq!(cross.row_count(), 9);
    assert_eq!(cross.column_names(), vec!["id", "id_y", "label"]);
}

#[test]
fn right_and_outer_joins_coalesce_keys() {
    let right_join = left().right_join(&right(), JoinSpec::on("id")).unwrap();
    assert_eq!(column_values(&right_join, "id"), numbers(&[2.0, 3.0, 4.0]));
    assert_eq!(
        column_values(&right_join, "label"),
        strings(&["two", "three", "four"])
    );

    let outer = left().outer_join(&right(), JoinSpec::on("id")).unwrap();
    assert_eq!(column_values(&outer, "id"), numbers(&[1.0, 2.0, 3.0, 4.0]));
    assert_eq!(
        column_values(&outer, "label"),
        vec![
            Value::Null,
            Value::from("two"),
            Value::from("three"),
            Value::from("four")
        ]
    );
}

#[test]
fn differently_named_keys_and_suffixes() {
    let orders = Table::new(vec![
        Column::strings("customer", ["a", "b", "a"]),
        Column::numbers("amount", [5.0, 7.0, 9.0]),
    ])
    .unwrap();
    let customers = Table::new(vec![
        Column::strings("cid", ["a", "b"]),
        Column::numbers("amount", [100.0, 200.0]),
    ])
    .unwrap();

    let spec = JoinSpec::pairs(&["customer"], &["cid"]).suffixes("_order", "_limit");
    let out = orders.inner_join(&customers, spec).unwrap();
    assert_eq!(
        out.column_names(),
        vec!["customer", "amount_order", "amount_limit"]
    );
    assert_eq!(column_values(&out, "amount_limit"), numbers(&[100.0, 200.0, 100.0]));

    // The default left suffix is empty, which leaves the right renamed only.
    let out = orders
        .inner_join(&customers, JoinSpec::pairs(&["customer"], &["cid"]))
        .unwrap();
    assert_eq!(out.column_names(), vec!["customer", "amount", "amount_y"]);
}

#[test]
fn colliding_suffixes_are_a_schema_error() {
    let a = Table::new(vec![
        Column::numbers("id", [1.0]),
        Column::numbers("v", [1.0]),
    ])
    .unwrap();
    let spec = JoinSpec::on("id").suffixes("", "");
    let err = a.inner_join(&a, spec).unwrap_err();
    assert!(matches!(
        err,
        FrameError::Schema(SchemaError::DuplicateColumn(name)) if name == "v"
    ));
}

#[test]
fn na_keys_never_match() {
    let l = Table::new(vec![Column::nullable_numbers("id", [Some(1.0), None])]).unwrap();
    let r = Table::new(vec![
        Column::nullable_numbers("id", [None, Some(1.0)]),
        Column::numbers("x", [10.0, 20.0]),
    ])
    .unwrap();

    let inner = l.inner_join(&r, JoinSpec::on("id")).unwrap();
    assert_eq!(column_values(&inner, "x"), numbers(&[20.0]));

    let pairs = join_indices(&l, &r, &JoinSpec::on("id").kind(JoinKind::Outer)).unwrap();
    assert_eq!(pairs.left, vec![0, 1, UNMATCHED]);
    assert_eq!(pairs.right, vec![1, UNMATCHED, 0]);
}

#[test]
fn multi_key_join() {
    let l = Table::new(vec![
        Column::strings("a", ["x", "x", "y"]),
        Column::numbers("b", [1.0, 2.0, 1.0]),
        Column::numbers("l", [0.0, 1.0, 2.0]),
    ])
    .unwrap();
    let r = Table::new(vec![
        Column::strings("a", ["y", "x"]),
        Column::numbers("b", [1.0, 2.0]),
        Column::numbers("r", [10.0, 20.0]),
    ])
    .unwrap();
    let out = l.inner_join(&r, JoinSpec::on_many(&["a", "b"])).unwrap();
    assert_eq!(column_values(&out, "l"), numbers(&[1.0, 2.0]));
    assert_eq!(column_values(&out, "r"), numbers(&[20.0, 10.0]));
}

#[test]
fn key_type_mismatch_is_rejected_before_work() {
    let l = ids("id", &[1.0]);
    let r = Table::new(vec![Column::strings("id", ["1"])]).unwrap();
    let err = l.inner_join(&r, JoinSpec::on("id")).unwrap_err();
    assert!(matches!(
        err,
        FrameError::JoinKeyType {
            left_type: ColumnType::Number,
            right_type: ColumnType::String,
            ..
        }
    ));

    let err = l.join(&r, &JoinSpec::on("id").kind(JoinKind::Cross)).unwrap_err();
    assert!(matches!(err, FrameError::JoinSpec(_)));

    let err = l.inner_join(&r, JoinSpec::on("missing")).unwrap_err();
    assert!(matches!(err, FrameError::Schema(SchemaError::UnknownColumn(_))));
}

#[test]
fn cross_join_with_empty_side_keeps_schema() {
    let empty = Table::new(vec![Column::numbers("x", Vec::<f64>::new())]).unwrap();
    let out = left().cross_join(&empty).unwrap();
    assert_eq!(out.row_count(), 0);
    assert_eq!(out.column_names(), vec!["id", "x"]);
}

fn key_table(name: &str, keys: &[u8]) -> Table {
    Table::new(vec![Column::numbers(name, keys.iter().map(|&k| f64::from(k)))]).unwrap()
}

fn counts(keys: &[u8]) -> HashMap<u8, usize> {
    let mut out = HashMap::new();
    for &k in keys {
        *out.entry(k).or_insert(0) += 1;
    }
    out
}

proptest! {
    #[test]
    fn join_cardinalities(
        l in prop::collection::vec(0u8..6, 0..40),
        r in prop::collection::vec(0u8..6, 0..40),
    ) {
        let lt = key_table("k", &l);
        let rt = key_table("k", &r);
        let (lc, rc) = (counts(&l), counts(&r));

        let expected_inner: usize = lc
            .iter()
            .map(|(k, n)| n * rc.get(k).copied().unwrap_or(0))
            .sum();
        let inner = join_indices(&lt, &rt, &JoinSpec::on("k")).unwrap();
        prop_assert_eq!(inner.len(), expected_inner);

        let expected_left: usize = l.iter().map(|k| rc.get(k).copied().unwrap_or(0).max(1)).sum();
        let left = join_indices(&lt, &rt, &JoinSpec::on("k").kind(JoinKind::Left)).unwrap();
        prop_assert_eq!(left.len(), expected_left);
        for row in 0..l.len() {
            prop_assert!(left.left.contains(&row));
        }
        prop_assert!(left.left.windows(2).all(|w| w[0] <= w[1]));

        let cross = join_indices(&lt, &rt, &JoinSpec::cross()).unwrap();
        prop_assert_eq!(cross.len(), l.len() * r.len());
    }
}

fn events(times: &[f64]) -> Table {
    let names: Vec<String> = (0..times.len()).map(|i| format!("e{i}")).collect();
    Table::new(vec![
        Column::numbers("time", times.iter().copied()),
        Column::strings("event", names),
    ])
    .unwrap()
}

fn prices(times: &[f64], prices: &[f64]) -> Table {
    Table::new(vec![
        Column::numbers("time", times.iter().copied()),
        Column::numbers("price", prices.iter().copied()),
    ])
    .unwrap()
}

#[test]
fn asof_directions_pick_the_expected_rows() {
    let quotes = prices(&[0.0, 2.0, 4.0, 6.0], &[10.0, 20.0, 30.0, 40.0]);
    let trades = events(&[1.0, 3.0, 5.0]);

    let backward = trades.asof_join(&quotes, &AsofSpec::on("time")).unwrap();
    assert_eq!(backward.column_names(), vec!["time", "event", "price"]);
    assert_eq!(column_values(&backward, "time"), numbers(&[1.0, 3.0, 5.0]));
    assert_eq!(column_values(&backward, "price"), numbers(&[10.0, 20.0, 30.0]));

    let forward = AsofSpec::on("time").direction(AsofDirection::Forward);
    let out = trades.asof_join(&quotes, &forward).unwrap();
    assert_eq!(column_values(&out, "price"), numbers(&[20.0, 30.0, 40.0]));

    // Equidistant candidates resolve to the earlier key.
    let nearest = AsofSpec::on("time").direction(AsofDirection::Nearest);
    let out = trades.asof_join(&quotes, &nearest).unwrap();
    assert_eq!(column_values(&out, "price"), numbers(&[10.0, 20.0, 30.0]));
    let out = events(&[3.5]).asof_join(&quotes, &nearest).unwrap();
    assert_eq!(column_values(&out, "price"), numbers(&[30.0]));
}

#[test]
fn asof_tolerance_is_inclusive() {
    let quotes = prices(&[0.0, 3.0, 8.0], &[10.0, 20.0, 30.0]);
    let trades = events(&[1.0, 5.0, 10.0]);

    let out = trades
        .asof_join(&quotes, &AsofSpec::on("time").tolerance(2.0))
        .unwrap();
    assert_eq!(column_values(&out, "price"), numbers(&[10.0, 20.0, 30.0]));

    let out = trades
        .asof_join(&quotes, &AsofSpec::on("time").tolerance(1.0))
        .unwrap();
    assert_eq!(
        column_values(&out, "price"),
        vec![Value::from(10.0), Value::Null, Value::Null]
    );
}

#[test]
fn asof_keeps_left_order_and_unmatched_rows() {
    let quotes = prices(&[5.0, 6.0], &[10.0, 20.0]);
    let trades = events(&[7.0, 1.0, 5.5]);
    let out = trades.asof_join(&quotes, &AsofSpec::on("time")).unwrap();
    assert_eq!(column_values(&out, "event"), strings(&["e0", "e1", "e2"]));
    assert_eq!(
        column_values(&out, "price"),
        vec![Value::from(20.0), Value::Null, Value::from(10.0)]
    );

    let forward = AsofSpec::on("time").direction(AsofDirection::Forward);
    let out = events(&[7.0, 10.0]).asof_join(&quotes, &forward).unwrap();
    assert_eq!(column_values(&out, "price"), vec![Value::Null, Value::Null]);
}

#[test]
fn asof_by_matches_within_equal_keys() {
    let orders = Table::new(vec![
        Column::strings("symbol", ["AAPL", "MSFT", "AAPL", "MSFT"]),
        Column::numbers("time", [1.0, 1.0, 5.0, 4.0]),
        Column::strings("side", ["buy", "buy", "sell", "sell"]),
    ])
    .unwrap();
    let quotes = Table::new(vec![
        Column::nullable_strings("symbol", [Some("AAPL"), Some("MSFT"), Some("AAPL"), None]),
        Column::numbers("time", [0.0, 3.0, 4.0, 4.0]),
        Column::numbers("price", [100.0, 200.0, 105.0, 999.0]),
    ])
    .unwrap();

    let spec = AsofSpec::on("time").by(&["symbol"]);
    let out = orders.asof_join(&quotes, &spec).unwrap();
    assert_eq!(out.column_names(), vec!["symbol", "time", "side", "price"]);
    assert_eq!(
        column_values(&out, "price"),
        vec![
            Value::from(100.0),
            Value::Null,
            Value::from(105.0),
            Value::from(200.0)
        ]
    );
}

#[test]
fn asof_suffixes_clashing_right_columns() {
    let left = Table::new(vec![
        Column::numbers("id", [1.0, 2.0]),
        Column::numbers("time", [1.0, 3.0]),
        Column::strings("value", ["A", "B"]),
    ])
    .unwrap();
    let right = Table::new(vec![
        Column::numbers("id", [10.0, 20.0]),
        Column::numbers("time", [0.0, 2.0]),
        Column::strings("value", ["X", "Y"]),
    ])
    .unwrap();
    let out = left
        .asof_join(&right, &AsofSpec::on("time").suffix("_r"))
        .unwrap();
    assert_eq!(
        out.column_names(),
        vec!["id", "time", "value", "id_r", "value_r"]
    );
    assert_eq!(column_values(&out, "id_r"), numbers(&[10.0, 20.0]));
    assert_eq!(column_values(&out, "value_r"), strings(&["X", "Y"]));
}

#[test]
fn asof_on_dates_and_empty_sides() {
    let minute = 60_000;
    let left = Table::new(vec![
        Column::dates("at", [10 * minute, 15 * minute]),
        Column::strings("event", ["A", "B"]),
    ])
    .unwrap();
    let right = Table::new(vec![
        Column::dates("at", [9 * minute, 12 * minute]),
        Column::numbers("price", [10.0, 30.0]),
    ])
    .unwrap();
    let out = left
        .asof_join(&right, &AsofSpec::on("at").tolerance((2 * minute) as f64))
        .unwrap();
    assert_eq!(
        column_values(&out, "price"),
        vec![Value::from(10.0), Value::Null]
    );

    let empty_right = right.head(0);
    let out = left.asof_join(&empty_right, &AsofSpec::on("at")).unwrap();
    assert_eq!(out.column_names(), vec!["at", "event", "price"]);
    assert_eq!(column_values(&out, "price"), vec![Value::Null, Value::Null]);
    assert_eq!(out.column("price").unwrap().column_type(), ColumnType::Number);

    let out = left.head(0).asof_join(&right, &AsofSpec::on("at")).unwrap();
    assert_eq!(out.row_count(), 0);
    assert_eq!(out.column_names(), vec!["at", "event", "price"]);

    let mixed = prices(&[1.0], &[1.0]).rename(&[("time", "at")]).unwrap();
    assert!(matches!(
        left.asof_join(&mixed, &AsofSpec::on("at")),
        Err(FrameError::JoinKeyType { .. })
    ));
}

#[test]
fn grouped_asof_keeps_the_partition() {
    let orders = Table::new(vec![
        Column::strings("symbol", ["a", "b", "a"]),
        Column::numbers("time", [1.0, 2.0, 3.0]),
    ])
    .unwrap();
    let quotes = prices(&[0.0, 2.5], &[1.0, 2.0]);
    let grouped = orders.group_by(&["symbol"]).unwrap();
    let out = grouped.asof_join(&quotes, &AsofSpec::on("time")).unwrap();
    assert_eq!(out.group_count(), 2);
    assert_eq!(out.partition().rows(0), &[0, 2]);
    assert_eq!(column_values(out.table(), "price"), numbers(&[1.0, 1.0, 2.0]));
}
