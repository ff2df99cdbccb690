#![allow(dead_code)]

use tidyframe_engine::{Column, FrameResult, StageOutput, Table, Value};

pub fn sales() -> Table {
    Table::new(vec![
        Column::strings("region", ["N", "S", "N", "S"]),
        Column::numbers("sales", [10.0, 20.0, 30.0, 40.0]),
    ])
    .unwrap()
}

pub fn ids(name: &str, ids: &[f64]) -> Table {
    Table::new(vec![Column::numbers(name, ids.iter().copied())]).unwrap()
}

pub fn numbers(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::from).collect()
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().copied().map(Value::from).collect()
}

/// Unwrap a stage that must have completed synchronously.
pub fn ready<T>(stage: FrameResult<StageOutput<T>>) -> T {
    let stage = stage.unwrap();
    assert!(!stage.is_pending(), "stage unexpectedly pending");
    stage.into_ready().unwrap()
}

pub fn column_values(table: &Table, name: &str) -> Vec<Value> {
    table.column(name).unwrap().values()
}
