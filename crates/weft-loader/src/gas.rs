//! Compute-cost accounting for one sandbox instance.

use crate::constants::gas::DEFAULT_COMPUTE_LIMIT;

/// A meter for the compute cost consumed by sandboxed execution.
///
/// The guest charges the meter through its metering import at fine-grained accounting
/// points; the harness reads the total back after every invocation. The budget counts as
/// exhausted only once `used` strictly exceeds `limit`, so a call whose total cost lands
/// exactly on the limit still succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    /// Budget fixed at construction.
    limit: u64,
    /// Total cost charged since the last refill.
    used: u64,
}

impl GasMeter {
    /// Creates a meter with the given budget.
    pub const fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// The budget this meter enforces.
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Total cost charged since the last refill.
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Adds `amount` to the used counter, saturating at the numeric ceiling.
    pub fn charge(&mut self, amount: u64) {
        self.used = self.used.saturating_add(amount);
    }

    /// Whether the budget is exhausted. Strictly greater: exact-limit usage is permitted.
    pub const fn is_exhausted(&self) -> bool {
        self.used > self.limit
    }

    /// Refills the budget: `None` or `Some(0)` resets the used counter to zero, any other
    /// amount is refunded from it, floored at zero.
    pub fn refill(&mut self, amount: Option<u64>) {
        match amount.unwrap_or(0) {
            0 => self.used = 0,
            refund => self.used = self.used.saturating_sub(refund),
        }
    }
}

impl Default for GasMeter {
    fn default() -> Self {
        Self::new(DEFAULT_COMPUTE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_limit_is_not_exhausted() {
        let mut meter = GasMeter::new(100);
        meter.charge(100);
        assert!(!meter.is_exhausted());
        meter.charge(1);
        assert!(meter.is_exhausted());
    }

    #[test]
    fn refill_without_amount_resets() {
        let mut meter = GasMeter::new(100);
        meter.charge(42);
        meter.refill(None);
        assert_eq!(meter.used(), 0);
    }

    #[test]
    fn refill_with_zero_behaves_like_absent() {
        let mut meter = GasMeter::new(100);
        meter.charge(42);
        meter.refill(Some(0));
        assert_eq!(meter.used(), 0);
    }

    #[test]
    fn refill_is_floored_at_zero() {
        let mut meter = GasMeter::new(100);
        meter.charge(10);
        meter.refill(Some(25));
        assert_eq!(meter.used(), 0);
    }

    #[test]
    fn partial_refund_subtracts() {
        let mut meter = GasMeter::new(100);
        meter.charge(80);
        meter.refill(Some(30));
        assert_eq!(meter.used(), 50);
    }

    #[test]
    fn default_budget_is_effectively_unbounded() {
        let meter = GasMeter::default();
        assert_eq!(meter.limit(), DEFAULT_COMPUTE_LIMIT);
        assert!(!meter.is_exhausted());
    }
}
