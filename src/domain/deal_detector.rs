//! Deal Detector
//!
//! Pure discount check: given an asking price and a reference price,
//! decide whether the listing is far enough below fair value to alert on.
//! Knows nothing about dedup or polling state.

use super::listing::{Listing, Reference};

/// Default minimum discount (10%)
pub const DEFAULT_MIN_DISCOUNT_FRACTION: f64 = 0.10;

/// Result of evaluating one listing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DealDecision {
    /// Price is at or below the discount target
    Deal {
        /// Discount relative to the reference, in percent
        discount_pct: f64,
        /// Resolved reference price in major units
        reference_major: f64,
    },
    /// Price is above the discount target
    NotADeal {
        discount_pct: f64,
        reference_major: f64,
    },
    /// No usable reference price; no decision possible
    NoReference,
}

impl DealDecision {
    /// Returns true if the listing qualifies as a deal
    pub fn qualifies(&self) -> bool {
        matches!(self, DealDecision::Deal { .. })
    }

    /// Discount percentage, if a reference was available
    pub fn discount_pct(&self) -> Option<f64> {
        match self {
            DealDecision::Deal { discount_pct, .. }
            | DealDecision::NotADeal { discount_pct, .. } => Some(*discount_pct),
            DealDecision::NoReference => None,
        }
    }
}

/// Discount threshold checker
#[derive(Debug, Clone, Copy)]
pub struct DealDetector {
    min_discount_fraction: f64,
}

impl Default for DealDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DISCOUNT_FRACTION)
    }
}

impl DealDetector {
    pub fn new(min_discount_fraction: f64) -> Self {
        Self { min_discount_fraction }
    }

    pub fn min_discount_fraction(&self) -> f64 {
        self.min_discount_fraction
    }

    /// Evaluate a listing against its own reference block
    pub fn evaluate(&self, listing: &Listing) -> DealDecision {
        self.evaluate_price(listing.price, listing.reference.as_ref())
    }

    /// Evaluate a raw price (cents) against an optional reference block
    pub fn evaluate_price(&self, price_cents: u64, reference: Option<&Reference>) -> DealDecision {
        match reference.and_then(Reference::resolve) {
            Some(reference_cents) => self.decide(
                price_cents as f64 / 100.0,
                reference_cents / 100.0,
            ),
            None => DealDecision::NoReference,
        }
    }

    /// Core rule, both prices in major units
    pub fn decide(&self, price_major: f64, reference_major: f64) -> DealDecision {
        if !(reference_major.is_finite() && reference_major > 0.0) {
            return DealDecision::NoReference;
        }

        let target = reference_major * (1.0 - self.min_discount_fraction);
        let discount_pct = (reference_major - price_major) / reference_major * 100.0;

        if price_major <= target {
            DealDecision::Deal { discount_pct, reference_major }
        } else {
            DealDecision::NotADeal { discount_pct, reference_major }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference(base: Option<f64>, predicted: Option<f64>) -> Reference {
        Reference {
            base_price: base,
            predicted_price: predicted,
        }
    }

    #[test]
    fn test_ten_percent_below_qualifies() {
        let detector = DealDetector::default();
        let decision = detector.decide(450.0, 500.0);

        assert!(decision.qualifies());
        assert_relative_eq!(decision.discount_pct().unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_above_target_does_not_qualify() {
        let detector = DealDetector::default();
        let decision = detector.decide(460.0, 500.0);

        assert!(!decision.qualifies());
        assert_relative_eq!(decision.discount_pct().unwrap(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_evaluate_price_in_cents() {
        let detector = DealDetector::default();
        let decision = detector.evaluate_price(45_000, Some(&reference(None, Some(50_000.0))));

        match decision {
            DealDecision::Deal { reference_major, .. } => assert_eq!(reference_major, 500.0),
            other => panic!("expected deal, got {:?}", other),
        }
    }

    #[test]
    fn test_base_price_used_before_predicted() {
        let detector = DealDetector::default();
        // 450 against base 400 is a premium, even though predicted 500 would be a deal
        let decision = detector.evaluate_price(45_000, Some(&reference(Some(40_000.0), Some(50_000.0))));

        assert!(!decision.qualifies());
        assert!(decision.discount_pct().unwrap() < 0.0);
    }

    #[test]
    fn test_missing_reference_is_skipped() {
        let detector = DealDetector::default();

        assert_eq!(detector.evaluate_price(100, None), DealDecision::NoReference);
        assert_eq!(
            detector.evaluate_price(100, Some(&reference(None, None))),
            DealDecision::NoReference
        );
        assert_eq!(detector.evaluate_price(100, Some(&reference(None, None))).discount_pct(), None);
    }

    #[test]
    fn test_custom_threshold() {
        let detector = DealDetector::new(0.25);

        assert!(!detector.decide(80.0, 100.0).qualifies());
        assert!(detector.decide(75.0, 100.0).qualifies());
    }
}
