//! Property-based tests for the invariants the pricing surfaces promise.

use proptest::prelude::*;
use tarifa::preprocessing::FeaturePipeline;
use tarifa::pricing::{quote_fare, rule_fare, PriceSource, RideSample, MIN_RATE_PER_KM};
use tarifa::primitives::Matrix;
use tarifa::traits::Transformer;

fn ride_strategy() -> impl Strategy<Value = RideSample> {
    (0.1_f32..60.0, any::<bool>(), any::<bool>()).prop_map(|(distance_km, priority, carpool)| {
        RideSample {
            distance_km,
            priority,
            carpool,
        }
    })
}

/// Raw feature matrix covering all four flag combinations plus random rows.
fn raw_matrix(rides: &[RideSample]) -> Matrix<f32> {
    let mut data = Vec::with_capacity(rides.len() * 5);
    for ride in rides {
        data.extend_from_slice(&ride.raw_features());
    }
    Matrix::from_vec(rides.len(), 5, data).expect("row-aligned data")
}

fn anchor_rides() -> Vec<RideSample> {
    vec![
        RideSample { distance_km: 2.0, priority: false, carpool: false },
        RideSample { distance_km: 5.0, priority: true, carpool: false },
        RideSample { distance_km: 9.0, priority: false, carpool: true },
        RideSample { distance_km: 14.0, priority: true, carpool: true },
    ]
}

proptest! {
    #[test]
    fn rule_fare_is_positive_and_scales_with_distance(ride in ride_strategy()) {
        let fare = rule_fare(&ride);
        prop_assert!(fare > 0.0);

        let longer = RideSample { distance_km: ride.distance_km * 2.0, ..ride };
        prop_assert!(rule_fare(&longer) > fare);
    }

    #[test]
    fn modelless_quote_is_rule_based_with_floor(ride in ride_strategy()) {
        let quote = quote_fare(None, &ride);
        prop_assert_eq!(quote.source, PriceSource::RuleBased);
        prop_assert!(quote.total >= MIN_RATE_PER_KM * ride.distance_km - 0.01);

        // Rounded to cents.
        let scaled = f64::from(quote.total) * 100.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-2);
    }

    #[test]
    fn pipeline_width_fixed_at_fit_time(rides in prop::collection::vec(ride_strategy(), 1..20)) {
        let mut anchored = anchor_rides();
        anchored.extend(rides.iter().copied());

        let mut pipeline = FeaturePipeline::new();
        let fitted = pipeline.fit_transform(&raw_matrix(&anchored)).expect("fit_transform");
        prop_assert_eq!(fitted.n_cols(), 7);

        // Any single ride transforms to the same width, novel or not.
        for ride in &rides {
            let row = pipeline.transform(&raw_matrix(&[*ride])).expect("transform");
            prop_assert_eq!(row.n_cols(), 7);
        }
    }

    #[test]
    fn pipeline_transform_is_deterministic(ride in ride_strategy()) {
        let mut pipeline = FeaturePipeline::new();
        pipeline.fit(&raw_matrix(&anchor_rides())).expect("fit");

        let x = raw_matrix(&[ride]);
        let a = pipeline.transform(&x).expect("transform");
        let b = pipeline.transform(&x).expect("transform");
        prop_assert_eq!(a, b);
    }

    #[test]
    fn pipeline_rejects_wrong_schema(cols in 1_usize..10) {
        prop_assume!(cols != 5);

        let mut pipeline = FeaturePipeline::new();
        pipeline.fit(&raw_matrix(&anchor_rides())).expect("fit");

        let bad = Matrix::from_vec(1, cols, vec![1.0; cols]).expect("matrix");
        prop_assert!(pipeline.transform(&bad).is_err());
    }

    #[test]
    fn raw_features_are_consistent(ride in ride_strategy()) {
        let [d, p, c, d2, pd] = ride.raw_features();
        prop_assert_eq!(d, ride.distance_km);
        prop_assert!(p == 0.0 || p == 1.0);
        prop_assert!(c == 0.0 || c == 1.0);
        prop_assert!((d2 - d * d).abs() < 1e-3 * d2.max(1.0));
        prop_assert_eq!(pd, p * d);
    }
}
