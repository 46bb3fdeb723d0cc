//! Listing Model
//!
//! Typed view of one marketplace sale offer as returned by the listings
//! endpoint. All prices are in cents (smallest currency unit).

use serde::{Deserialize, Serialize};

/// Base URL for a listing page on the marketplace website
pub const LISTING_URL_BASE: &str = "https://csfloat.com/item";

/// Item attributes attached to a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Display name (e.g. "AK-47 | Redline (Field-Tested)")
    pub market_hash_name: String,
    /// Wear float, if the item has one
    #[serde(default)]
    pub float_value: Option<f64>,
    /// Pattern seed, if the item has one
    #[serde(default)]
    pub paint_seed: Option<u32>,
}

/// Externally supplied fair-value estimates, in cents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub base_price: Option<f64>,
    #[serde(default)]
    pub predicted_price: Option<f64>,
}

impl Reference {
    /// Resolve the reference price in cents.
    ///
    /// Base price wins when present; predicted price is the fallback.
    /// Zero, negative or non-finite values count as absent.
    pub fn resolve(&self) -> Option<f64> {
        usable(self.base_price).or_else(|| usable(self.predicted_price))
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// One sale offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    /// Asking price in cents
    pub price: u64,
    /// Listing type ("buy_now", "auction")
    #[serde(rename = "type")]
    pub listing_type: String,
    pub item: Item,
    #[serde(default)]
    pub reference: Option<Reference>,
}

impl Listing {
    /// Asking price in major currency units
    pub fn price_major(&self) -> f64 {
        self.price as f64 / 100.0
    }

    /// Resolved reference price in major currency units
    pub fn reference_major(&self) -> Option<f64> {
        self.reference
            .as_ref()
            .and_then(Reference::resolve)
            .map(|cents| cents / 100.0)
    }

    /// Public page for this listing
    pub fn url(&self) -> String {
        format!("{}/{}", LISTING_URL_BASE, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(base: Option<f64>, predicted: Option<f64>) -> Reference {
        Reference {
            base_price: base,
            predicted_price: predicted,
        }
    }

    #[test]
    fn test_reference_prefers_base_price() {
        assert_eq!(reference(Some(40_000.0), Some(50_000.0)).resolve(), Some(40_000.0));
    }

    #[test]
    fn test_reference_falls_back_to_predicted() {
        assert_eq!(reference(None, Some(50_000.0)).resolve(), Some(50_000.0));
        assert_eq!(reference(Some(0.0), Some(50_000.0)).resolve(), Some(50_000.0));
    }

    #[test]
    fn test_reference_unresolvable() {
        assert_eq!(reference(None, None).resolve(), None);
        assert_eq!(reference(Some(f64::NAN), Some(-1.0)).resolve(), None);
    }

    #[test]
    fn test_listing_deserialize() {
        let raw = r#"{
            "id": "781234567890",
            "price": 45000,
            "type": "buy_now",
            "item": {
                "market_hash_name": "AK-47 | Redline (Field-Tested)",
                "float_value": 0.1534,
                "paint_seed": 661
            },
            "reference": { "base_price": 50000, "predicted_price": 51000 }
        }"#;

        let listing: Listing = serde_json::from_str(raw).unwrap();

        assert_eq!(listing.id, "781234567890");
        assert_eq!(listing.listing_type, "buy_now");
        assert_eq!(listing.price_major(), 450.0);
        assert_eq!(listing.reference_major(), Some(500.0));
        assert_eq!(listing.item.paint_seed, Some(661));
        assert_eq!(listing.url(), "https://csfloat.com/item/781234567890");
    }

    #[test]
    fn test_listing_optional_fields() {
        let raw = r#"{
            "id": "1",
            "price": 999,
            "type": "buy_now",
            "item": { "market_hash_name": "Sticker | Crown (Foil)" }
        }"#;

        let listing: Listing = serde_json::from_str(raw).unwrap();

        assert!(listing.reference.is_none());
        assert!(listing.item.float_value.is_none());
        assert_eq!(listing.reference_major(), None);
    }
}
