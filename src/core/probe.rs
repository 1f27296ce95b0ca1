//! Availability probe adapter.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Callback returning how many tokens are currently free for granting.
///
/// Zero blocks any additional usage of the resource; values above the
/// protector's maximum are of no benefit.
pub type AvailabilityFn = dyn Fn() -> u32 + Send + Sync;

/// Wraps a user-supplied busyness callback.
///
/// The adapter clamps the callback's answer into `[0, max_tokens]` and shields
/// the scheduling loop from a panicking callback.
pub struct AvailabilityProbe {
    callback: Box<AvailabilityFn>,
    panicked: AtomicBool,
}

impl AvailabilityProbe {
    /// Wrap a callback.
    #[must_use]
    pub fn new(callback: Box<AvailabilityFn>) -> Self {
        Self {
            callback,
            panicked: AtomicBool::new(false),
        }
    }

    /// Run the callback, clamping the result into `[0, max_tokens]`.
    ///
    /// A panicking callback is treated as zero availability and logged once.
    #[must_use]
    pub fn check(&self, max_tokens: u32) -> u32 {
        match catch_unwind(AssertUnwindSafe(|| (self.callback)())) {
            Ok(available) => available.min(max_tokens),
            Err(_) => {
                if !self.panicked.swap(true, Ordering::Relaxed) {
                    warn!("availability probe panicked; treating the resource as fully busy");
                }
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_max_tokens() {
        let probe = AvailabilityProbe::new(Box::new(|| 1000));
        assert_eq!(probe.check(8), 8);
    }

    #[test]
    fn passes_through_in_range_values() {
        let probe = AvailabilityProbe::new(Box::new(|| 3));
        assert_eq!(probe.check(8), 3);
    }

    #[test]
    fn panicking_probe_reports_zero() {
        let probe = AvailabilityProbe::new(Box::new(|| panic!("busyness check exploded")));
        assert_eq!(probe.check(8), 0);
        assert_eq!(probe.check(8), 0);
    }
}
