//! Rule-based fares and the quoting surface that blends them with the
//! model estimate.

use super::{PricingModel, RideSample, BASE_RATE_PER_KM};
use serde::{Deserialize, Serialize};

/// Hard floor on the effective per-kilometer rate of any quote.
pub const MIN_RATE_PER_KM: f32 = 5.0;

/// How a quote's total was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Average of the rule-based fare and the model estimate.
    Blended,
    /// Rule-based fare alone; no usable model estimate.
    RuleBased,
}

/// A priced ride request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Final quoted price, rounded to 2 decimals.
    pub total: f32,
    /// Distance the quote covers.
    pub distance_km: f32,
    /// Whether the model contributed to the total.
    pub source: PriceSource,
}

/// Rule-based fare: base rate per kilometer with service multipliers.
///
/// Priority rides pay a 1.2x premium, carpool rides get a 0.8x discount,
/// and a ride requesting both settles at 0.9x.
#[must_use]
pub fn rule_fare(ride: &RideSample) -> f32 {
    let base = BASE_RATE_PER_KM * ride.distance_km;
    let multiplier = match (ride.priority, ride.carpool) {
        (true, true) => 0.9,
        (true, false) => 1.2,
        (false, true) => 0.8,
        (false, false) => 1.0,
    };
    base * multiplier
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Quotes a ride, blending the model estimate with the rule-based fare.
///
/// With a trained model the total is the average of the two; without one
/// (or when the model errors on this input) the rule-based fare stands
/// alone and the quote says so. Every quote is clamped to the per-km
/// floor and rounded to 2 decimals.
#[must_use]
pub fn quote_fare(model: Option<&PricingModel>, ride: &RideSample) -> PriceQuote {
    let rule = rule_fare(ride);

    let (raw_total, source) = match model.map(|m| m.predict_one(ride)) {
        Some(Ok(estimate)) => ((rule + estimate) / 2.0, PriceSource::Blended),
        Some(Err(_)) | None => (rule, PriceSource::RuleBased),
    };

    let floor = MIN_RATE_PER_KM * ride.distance_km;
    PriceQuote {
        total: round2(raw_total.max(floor)),
        distance_km: ride.distance_km,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::synthetic_training_data;

    fn ride(distance_km: f32, priority: bool, carpool: bool) -> RideSample {
        RideSample {
            distance_km,
            priority,
            carpool,
        }
    }

    #[test]
    fn test_rule_fare_plain() {
        assert!((rule_fare(&ride(10.0, false, false)) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_rule_fare_priority_premium() {
        assert!((rule_fare(&ride(10.0, true, false)) - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_rule_fare_carpool_discount() {
        assert!((rule_fare(&ride(10.0, false, true)) - 80.0).abs() < 1e-4);
    }

    #[test]
    fn test_rule_fare_both_flags() {
        assert!((rule_fare(&ride(10.0, true, true)) - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_quote_without_model_is_rule_based() {
        let quote = quote_fare(None, &ride(10.0, false, false));
        assert_eq!(quote.source, PriceSource::RuleBased);
        assert!((quote.total - 100.0).abs() < 1e-4);
        assert_eq!(quote.distance_km, 10.0);
    }

    #[test]
    fn test_quote_with_untrained_model_falls_back() {
        let model = PricingModel::new();
        let quote = quote_fare(Some(&model), &ride(10.0, true, false));
        // Untrained model errors internally, so the quote is rule-based.
        assert_eq!(quote.source, PriceSource::RuleBased);
        assert!((quote.total - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_quote_with_trained_model_blends() {
        let (x, y) = synthetic_training_data(42);
        let mut model = PricingModel::new().with_forest_size(5);
        model.train(&x, &y).expect("training");

        let r = ride(10.0, false, false);
        let quote = quote_fare(Some(&model), &r);
        assert_eq!(quote.source, PriceSource::Blended);

        let estimate = model.predict_one(&r).expect("predict");
        let expected = ((rule_fare(&r) + estimate) / 2.0).max(50.0);
        assert!((quote.total - (expected * 100.0).round() / 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_quote_enforces_per_km_floor() {
        let (x, y) = synthetic_training_data(42);
        let mut model = PricingModel::new().with_forest_size(3);
        model.train(&x, &y).expect("training");

        // Carpool on a long trip is the cheapest combination; the quote
        // can never dip under 5 per km regardless of the model's output.
        let r = ride(40.0, false, true);
        let quote = quote_fare(Some(&model), &r);
        assert!(quote.total >= MIN_RATE_PER_KM * r.distance_km - 1e-3);
    }

    #[test]
    fn test_quote_rounds_to_two_decimals() {
        let quote = quote_fare(None, &ride(0.333, false, false));
        let scaled = quote.total * 100.0;
        assert!((scaled - scaled.round()).abs() < 1e-3);
    }
}
