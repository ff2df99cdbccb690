//! The numeric kernel handle is process-wide, so everything touching it lives in this one test
//! binary and in a single test function.

use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tidyframe_columnar::{
    install_kernel, kernel, KernelAlreadyInstalled, NumericKernel, SoftwareKernel,
    KERNEL_THRESHOLD,
};
use tidyframe_engine::stats::{self, NaPolicy};
use tidyframe_engine::{Column, SortKey, Table, TableVerbs, Value};

/// Delegates to the software kernel and counts every call. Clones share the counters.
#[derive(Clone, Debug, Default)]
struct CountingKernel {
    sums: Arc<AtomicUsize>,
    sorts: Arc<AtomicUsize>,
    quantiles: Arc<AtomicUsize>,
}

impl NumericKernel for CountingKernel {
    fn name(&self) -> &str {
        "counting"
    }

    fn sum(&self, values: &[f64]) -> f64 {
        self.sums.fetch_add(1, Ordering::SeqCst);
        SoftwareKernel.sum(values)
    }

    fn stable_sort_indices(&self, values: &[f64], descending: bool) -> Vec<usize> {
        self.sorts.fetch_add(1, Ordering::SeqCst);
        SoftwareKernel.stable_sort_indices(values, descending)
    }

    fn select_quantile(&self, values: &mut [f64], p: f64) -> f64 {
        self.quantiles.fetch_add(1, Ordering::SeqCst);
        SoftwareKernel.select_quantile(values, p)
    }
}

fn numbers(n: usize) -> Vec<Value> {
    (0..n).map(|i| Value::from(i as f64)).collect()
}

#[test]
fn installed_kernel_takes_large_inputs_only() {
    let counting = CountingKernel::default();
    install_kernel(Arc::new(counting.clone())).unwrap();
    assert_eq!(kernel().name(), "counting");

    let err = install_kernel(Arc::new(SoftwareKernel)).unwrap_err();
    assert!(matches!(&err, KernelAlreadyInstalled(current) if current == "counting"));
    assert_eq!(kernel().name(), "counting");

    // Below the threshold the software path is used.
    let small = numbers(KERNEL_THRESHOLD - 1);
    let total = stats::sum(&small, NaPolicy::Propagate).unwrap();
    let n = (KERNEL_THRESHOLD - 1) as f64;
    assert_eq!(total, Value::from(n * (n - 1.0) / 2.0));
    assert_eq!(counting.sums.load(Ordering::SeqCst), 0);

    let large = numbers(KERNEL_THRESHOLD);
    let n = KERNEL_THRESHOLD as f64;
    assert_eq!(
        stats::sum(&large, NaPolicy::Propagate).unwrap(),
        Value::from(n * (n - 1.0) / 2.0)
    );
    assert_eq!(counting.sums.load(Ordering::SeqCst), 1);

    assert_eq!(
        stats::median(&large, NaPolicy::Propagate).unwrap(),
        Value::from((n - 1.0) / 2.0)
    );
    assert_eq!(counting.quantiles.load(Ordering::SeqCst), 1);

    let table = Table::new(vec![Column::numbers(
        "x",
        (0..KERNEL_THRESHOLD).map(|i| ((i * 7) % 13) as f64),
    )])
    .unwrap();
    let sorted = table.arrange(&[SortKey::desc("x")]).unwrap();
    assert_eq!(counting.sorts.load(Ordering::SeqCst), 1);
    assert_eq!(sorted.value(0, "x").unwrap(), Value::from(12.0));
    assert_eq!(
        sorted.value(KERNEL_THRESHOLD - 1, "x").unwrap(),
        Value::from(0.0)
    );
}
