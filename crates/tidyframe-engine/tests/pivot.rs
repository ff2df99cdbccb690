mod common;

use common::{column_values, numbers, strings};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tidyframe_engine::{
    Column, ColumnType, DuplicatePolicy, FrameError, PivotLongerSpec, PivotWiderSpec, Table,
    TableVerbs, Value,
};

fn scores() -> Table {
    Table::new(vec![
        Column::strings("student", ["ann", "ann", "bob", "cat", "cat"]),
        Column::strings("subject", ["math", "art", "math", "art", "math"]),
        Column::numbers("score", [90.0, 70.0, 60.0, 80.0, 85.0]),
    ])
    .unwrap()
}

#[test]
fn wider_scatters_values_and_fills_na() {
    let wide = scores()
        .pivot_wider(&PivotWiderSpec::new("subject", "score"))
        .unwrap();
    assert_eq!(wide.column_names(), vec!["student", "math", "art"]);
    assert_eq!(column_values(&wide, "student"), strings(&["ann", "bob", "cat"]));
    assert_eq!(column_values(&wide, "math"), numbers(&[90.0, 60.0, 85.0]));
    assert_eq!(
        column_values(&wide, "art"),
        vec![Value::from(70.0), Value::Null, Value::from(80.0)]
    );
    assert_eq!(wide.column("art").unwrap().column_type(), ColumnType::Number);
}

#[test]
fn expected_columns_fix_the_output_set() {
    let spec = PivotWiderSpec::new("subject", "score")
        .with_expected_columns(&["art", "math", "music"])
        .with_names_prefix("score_");
    let wide = scores().pivot_wider(&spec).unwrap();
    assert_eq!(
        wide.column_names(),
        vec!["student", "score_art", "score_math", "score_music"]
    );
    assert_eq!(
        column_values(&wide, "score_music"),
        vec![Value::Null, Value::Null, Value::Null]
    );

    let spec = PivotWiderSpec::new("subject", "score").with_expected_columns(&["math"]);
    assert!(matches!(
        scores().pivot_wider(&spec),
        Err(FrameError::PivotSpec(_))
    ));
}

#[test]
fn na_names_render_as_na() {
    let table = Table::new(vec![
        Column::strings("id", ["a", "a"]),
        Column::nullable_strings("key", [Some("x"), None]),
        Column::numbers("v", [1.0, 2.0]),
    ])
    .unwrap();
    let wide = table.pivot_wider(&PivotWiderSpec::new("key", "v")).unwrap();
    assert_eq!(wide.column_names(), vec!["id", "x", "NA"]);
}

#[test]
fn combine_policy_reduces_collisions() {
    let table = Table::new(vec![
        Column::strings("id", ["a", "a", "a"]),
        Column::strings("key", ["x", "x", "y"]),
        Column::strings("v", ["p", "q", "r"]),
    ])
    .unwrap();
    let joined = DuplicatePolicy::combine(|vals| {
        let parts: Vec<String> = vals.iter().map(Value::to_string).collect();
        Ok(Value::from(parts.join("+")))
    });
    let wide = table
        .pivot_wider(&PivotWiderSpec::new("key", "v").with_duplicates(joined))
        .unwrap();
    assert_eq!(column_values(&wide, "x"), strings(&["p+q"]));
    assert_eq!(column_values(&wide, "y"), strings(&["r"]));
}

#[test]
fn combine_counts_every_filled_cell() {
    let table = Table::new(vec![
        Column::strings("id", ["a", "a", "b", "c"]),
        Column::strings("key", ["x", "x", "x", "y"]),
        Column::numbers("val", [10.0, 20.0, 30.0, 40.0]),
    ])
    .unwrap();
    let count = DuplicatePolicy::combine(|vals| Ok(Value::from(vals.len() as f64)));
    let wide = table
        .pivot_wider(&PivotWiderSpec::new("key", "val").with_duplicates(count))
        .unwrap();
    assert_eq!(
        column_values(&wide, "x"),
        vec![Value::from(2.0), Value::from(1.0), Value::Null]
    );
    assert_eq!(
        column_values(&wide, "y"),
        vec![Value::Null, Value::Null, Value::from(1.0)]
    );
}

#[test]
fn wider_validates_columns() {
    let err = scores()
        .pivot_wider(&PivotWiderSpec::new("subject", "subject"))
        .unwrap_err();
    assert!(matches!(err, FrameError::PivotSpec(_)));
    let err = scores()
        .pivot_wider(&PivotWiderSpec::new("missing", "score"))
        .unwrap_err();
    assert!(matches!(err, FrameError::Schema(_)));
}

#[test]
fn longer_validates_spec() {
    let wide = Table::new(vec![
        Column::strings("id", ["a"]),
        Column::numbers("x", [1.0]),
    ])
    .unwrap();
    for spec in [
        PivotLongerSpec::new(&[] as &[&str], "name", "value"),
        PivotLongerSpec::new(&["nope"], "name", "value"),
        PivotLongerSpec::new(&["x", "x"], "name", "value"),
        PivotLongerSpec::new(&["x"], "same", "same"),
        PivotLongerSpec::new(&["x"], "id", "value"),
    ] {
        assert!(
            matches!(wide.pivot_longer(&spec), Err(FrameError::PivotSpec(_))),
            "{spec:?} should be rejected"
        );
    }
}

#[test]
fn longer_widens_mixed_fold_types() {
    let wide = Table::new(vec![
        Column::numbers("n", [1.0]),
        Column::strings("s", ["one"]),
    ])
    .unwrap();
    let long = wide
        .pivot_longer(&PivotLongerSpec::new(&["n", "s"], "name", "value"))
        .unwrap();
    assert_eq!(long.column("value").unwrap().column_type(), ColumnType::Opaque);
    assert_eq!(
        column_values(&long, "value"),
        vec![Value::from(1.0), Value::from("one")]
    );
}

fn wide_table(values: &[[Option<i16>; 3]]) -> Table {
    let ids: Vec<String> = (0..values.len()).map(|i| format!("id{i}")).collect();
    let mut columns = vec![Column::strings("id", ids)];
    for (c, name) in ["a", "b", "c"].into_iter().enumerate() {
        columns.push(Column::nullable_numbers(
            name,
            values.iter().map(|row| row[c].map(f64::from)),
        ));
    }
    Table::new(columns).unwrap()
}

proptest! {
    #[test]
    fn longer_then_wider_restores_the_table(
        values in prop::collection::vec(prop::array::uniform3(prop::option::of(-50i16..50)), 1..12)
    ) {
        let wide = wide_table(&values);
        let long = wide
            .pivot_longer(&PivotLongerSpec::new(&["a", "b", "c"], "name", "value"))
            .unwrap();
        prop_assert_eq!(long.row_count(), values.len() * 3);

        let back = long
            .pivot_wider(
                &PivotWiderSpec::new("name", "value").with_duplicates(DuplicatePolicy::Error),
            )
            .unwrap();
        prop_assert_eq!(back.to_rows(), wide.to_rows());
        prop_assert_eq!(back.column_names(), wide.column_names());
    }

    #[test]
    fn wider_then_longer_restores_complete_long_tables(
        values in prop::collection::vec(prop::array::uniform3(-50i16..50), 1..12)
    ) {
        let mut ids = Vec::new();
        let mut names = Vec::new();
        let mut vals = Vec::new();
        for (i, row) in values.iter().enumerate() {
            for (name, v) in ["a", "b", "c"].into_iter().zip(row) {
                ids.push(format!("id{i}"));
                names.push(name);
                vals.push(f64::from(*v));
            }
        }
        let long = Table::new(vec![
            Column::strings("id", ids),
            Column::strings("name", names),
            Column::numbers("value", vals),
        ])
        .unwrap();

        let wide = long.pivot_wider(&PivotWiderSpec::new("name", "value")).unwrap();
        let back = wide
            .pivot_longer(&PivotLongerSpec::new(&["a", "b", "c"], "name", "value"))
            .unwrap();
        prop_assert_eq!(back.to_rows(), long.to_rows());
    }
}
