#![forbid(unsafe_code)]

//! Process-wide handle to the bulk numeric kernel.
//!
//! Large numeric reductions and sorts are routed through a [`NumericKernel`]. An accelerated
//! implementation may be installed once at startup; otherwise the pure-Rust [`SoftwareKernel`]
//! is used.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Inputs at least this long are handed to the installed kernel.
pub const KERNEL_THRESHOLD: usize = 1000;

pub trait NumericKernel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn sum(&self, values: &[f64]) -> f64;

    /// Permutation that stably sorts `values` (NaN last in both directions).
    fn stable_sort_indices(&self, values: &[f64], descending: bool) -> Vec<usize>;

    /// Type-7 quantile of non-empty `values`; `values` may be reordered. Any NaN gives NaN.
    fn select_quantile(&self, values: &mut [f64], p: f64) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwareKernel;

impl NumericKernel for SoftwareKernel {
    fn name(&self) -> &str {
        "software"
    }

    fn sum(&self, values: &[f64]) -> f64 {
        // Kahan summation keeps long sums stable.
        let mut sum = 0.0;
        let mut comp = 0.0;
        for &v in values {
            let y = v - comp;
            let t = sum + y;
            comp = (t - sum) - y;
            sum = t;
        }
        sum
    }

    fn stable_sort_indices(&self, values: &[f64], descending: bool) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..values.len()).collect();
        idx.sort_by(|&a, &b| compare_f64(values[a], values[b], descending));
        idx
    }

    fn select_quantile(&self, values: &mut [f64], p: f64) -> f64 {
        debug_assert!(!values.is_empty());
        if values.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        let h = (values.len() - 1) as f64 * p;
        let lo = h.floor() as usize;
        let hi = h.ceil() as usize;
        let (_, lo_val, upper) = values.select_nth_unstable_by(lo, f64::total_cmp);
        let lo_val = *lo_val;
        if hi == lo {
            return lo_val;
        }
        // The next order statistic is the minimum of the upper partition.
        let hi_val = upper
            .iter()
            .copied()
            .min_by(f64::total_cmp)
            .unwrap_or(lo_val);
        lo_val + (h - lo as f64) * (hi_val - lo_val)
    }
}

fn compare_f64(a: f64, b: f64, descending: bool) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Returned by [`install_kernel`] when a kernel is already in place.
#[derive(Debug, thiserror::Error)]
#[error("a numeric kernel is already installed: {0}")]
pub struct KernelAlreadyInstalled(pub String);

static KERNEL: OnceLock<Arc<dyn NumericKernel>> = OnceLock::new();

/// Install the process-wide kernel. Must happen before first use of [`kernel`].
pub fn install_kernel(kernel: Arc<dyn NumericKernel>) -> Result<(), KernelAlreadyInstalled> {
    let name = kernel.name().to_string();
    KERNEL.set(kernel).map_err(|_| {
        let current = KERNEL.get().map(|k| k.name().to_string()).unwrap_or_default();
        log::warn!("ignoring numeric kernel {name}: {current} is already installed");
        KernelAlreadyInstalled(current)
    })?;
    log::debug!("installed numeric kernel {name}");
    Ok(())
}

/// The installed kernel, initializing the software fallback on first use.
pub fn kernel() -> &'static Arc<dyn NumericKernel> {
    KERNEL.get_or_init(|| Arc::new(SoftwareKernel))
}

/// The kernel to use for an input of `len` values.
pub fn kernel_for(len: usize) -> &'static dyn NumericKernel {
    static SOFTWARE: SoftwareKernel = SoftwareKernel;
    if len >= KERNEL_THRESHOLD {
        &**kernel()
    } else {
        &SOFTWARE
    }
}
