//! Deal alert formatting
//!
//! Turns a qualifying listing into a transport-neutral `Notification` and
//! the multi-line log block written for every detected deal.

use crate::domain::Listing;
use crate::ports::notifier::Notification;

/// Discount at which the alert is sent at max priority
pub const URGENT_DISCOUNT_PCT: f64 = 20.0;

pub const ACTION_LABEL: &str = "Open listing";

pub fn deal_alert(listing: &Listing, discount_pct: f64, reference_major: f64) -> Notification {
    let urgent = discount_pct >= URGENT_DISCOUNT_PCT;

    let mut body = format!(
        "{}\nPrice: ${:.2}\nReference: ${:.2}\nDiscount: {:.1}%",
        listing.item.market_hash_name,
        listing.price_major(),
        reference_major,
        discount_pct
    );
    if let Some(float) = listing.item.float_value {
        body.push_str(&format!("\nFloat: {:.6}", float));
    }
    if let Some(seed) = listing.item.paint_seed {
        body.push_str(&format!("\nSeed: {}", seed));
    }

    let mut tags = vec!["moneybag".to_string()];
    if urgent {
        tags.push("rotating_light".to_string());
    }

    Notification {
        title: format!("{:.1}% off: {}", discount_pct, listing.item.market_hash_name),
        body,
        action_label: ACTION_LABEL.to_string(),
        action_url: listing.url(),
        tags,
        priority: if urgent { 5 } else { 4 },
    }
}

pub fn log_deal(listing: &Listing, discount_pct: f64, reference_major: f64, dry_run: bool) {
    let float = listing
        .item
        .float_value
        .map(|f| format!("{:.6}", f))
        .unwrap_or_else(|| "-".to_string());

    tracing::info!(
        "{}DEAL FOUND\n  Item:      {}\n  Float:     {}\n  Price:     ${:.2}\n  Reference: ${:.2}\n  Discount:  {:.1}%\n  Link:      {}",
        if dry_run { "[dry-run] " } else { "" },
        listing.item.market_hash_name,
        float,
        listing.price_major(),
        reference_major,
        discount_pct,
        listing.url()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, Reference};

    fn listing(float_value: Option<f64>) -> Listing {
        Listing {
            id: "777".to_string(),
            price: 45_000,
            listing_type: "buy_now".to_string(),
            item: Item {
                market_hash_name: "AWP | Asiimov (Field-Tested)".to_string(),
                float_value,
                paint_seed: None,
            },
            reference: Some(Reference {
                base_price: Some(50_000.0),
                predicted_price: None,
            }),
        }
    }

    #[test]
    fn test_deal_alert_contents() {
        let n = deal_alert(&listing(Some(0.25)), 10.0, 500.0);

        assert_eq!(n.title, "10.0% off: AWP | Asiimov (Field-Tested)");
        assert!(n.body.contains("Price: $450.00"));
        assert!(n.body.contains("Reference: $500.00"));
        assert!(n.body.contains("Float: 0.250000"));
        assert_eq!(n.action_url, "https://csfloat.com/item/777");
        assert_eq!(n.priority, 4);
        assert_eq!(n.tags, vec!["moneybag".to_string()]);
    }

    #[test]
    fn test_deal_alert_without_float_and_urgent() {
        let n = deal_alert(&listing(None), 25.0, 600.0);

        assert!(!n.body.contains("Float"));
        assert_eq!(n.priority, 5);
        assert!(n.tags.contains(&"rotating_light".to_string()));
    }
}
