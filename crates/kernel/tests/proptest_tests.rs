//! Property-based tests for the precision layer using the `proptest` crate.

use proptest::prelude::*;

use bim_kernel::geometry::{Coordinate, CoordinateTransform, PrecisionMath};
use bim_kernel::{PrecisionConfig, PrecisionError};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Arbitrary in-range coordinate triple.
fn arb_point() -> impl Strategy<Value = (f64, f64, f64)> {
    (-1e5f64..1e5, -1e5f64..1e5, -1e5f64..1e5)
}

/// A finite value beyond the default range.
fn arb_out_of_range() -> impl Strategy<Value = f64> {
    prop_oneof![1.0e6f64 + 1.0..1e300, -1e300f64..-1.0e6 - 1.0]
}

fn arb_non_finite() -> impl Strategy<Value = f64> {
    prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
}

fn arb_angle() -> impl Strategy<Value = f64> {
    -std::f64::consts::PI..std::f64::consts::PI
}

const STEP: f64 = 0.001;

// ---------------------------------------------------------------------------
// 1. distance_to(self) == 0
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn distance_to_self_is_zero((x, y, z) in arb_point()) {
        let c = Coordinate::new(x, y, z).unwrap();
        prop_assert_eq!(c.distance_to(&c), 0.0);
    }
}

// ---------------------------------------------------------------------------
// 2. Construction lands within half a step of the input
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn construction_error_below_step((x, y, z) in arb_point()) {
        let c = Coordinate::new(x, y, z).unwrap();
        prop_assert!((c.x() - x).abs() <= STEP / 2.0 + 1e-9);
        prop_assert!((c.y() - y).abs() <= STEP / 2.0 + 1e-9);
        prop_assert!((c.z() - z).abs() <= STEP / 2.0 + 1e-9);
    }
}

// ---------------------------------------------------------------------------
// 3. Binary and JSON round trips stay within one step
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn serialize_round_trip_within_step((x, y, z) in arb_point()) {
        let m = PrecisionMath::default();
        let c = Coordinate::new(x, y, z).unwrap();

        let back = Coordinate::from_bytes(&c.to_bytes(), &m).unwrap();
        prop_assert!(back.distance_to(&c) < STEP);

        let back = Coordinate::from_json(&c.to_json().unwrap()).unwrap();
        prop_assert!(back.distance_to(&c) < STEP);
    }
}

// ---------------------------------------------------------------------------
// 4. Invalid components fail with the matching error kind
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn non_finite_rejected(bad in arb_non_finite(), (x, y, _z) in arb_point(), axis in 0usize..3) {
        let mut v = [x, y, 0.0];
        v[axis] = bad;
        let r = Coordinate::new(v[0], v[1], v[2]);
        let is_non_finite = matches!(r, Err(PrecisionError::NonFinite { .. }));
        prop_assert!(is_non_finite);
    }

    #[test]
    fn out_of_range_rejected(bad in arb_out_of_range(), (x, y, _z) in arb_point(), axis in 0usize..3) {
        let mut v = [x, y, 0.0];
        v[axis] = bad;
        let r = Coordinate::new(v[0], v[1], v[2]);
        let is_out_of_range = matches!(r, Err(PrecisionError::OutOfRange { .. }));
        prop_assert!(is_out_of_range);
    }

    #[test]
    fn auto_correct_never_fails(bad in arb_non_finite(), big in arb_out_of_range()) {
        let m = PrecisionMath::new(PrecisionConfig::auto_correct());
        let c = m.coordinate(bad, big, 1.0).unwrap();
        prop_assert!(c.x().is_finite());
        prop_assert!(c.y().abs() <= 1e6);
    }
}

// ---------------------------------------------------------------------------
// 5. Distance is symmetric
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn distance_symmetry((ax, ay, az) in arb_point(), (bx, by, bz) in arb_point()) {
        let a = Coordinate::new(ax, ay, az).unwrap();
        let b = Coordinate::new(bx, by, bz).unwrap();
        prop_assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-9);
    }
}

// ---------------------------------------------------------------------------
// 6. Rotation about a center preserves distance to that center
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rotation_preserves_radius(
        (px, py, _pz) in arb_point(),
        (cx, cy, _cz) in arb_point(),
        angle in arb_angle(),
    ) {
        let m = PrecisionMath::default();
        let p = Coordinate::xy(px, py).unwrap();
        let center = Coordinate::xy(cx, cy).unwrap();
        if let Ok(r) = p.rotate(angle, &center, &m) {
            // Each snapped component moves at most half a step.
            prop_assert!((r.distance_to(&center) - p.distance_to(&center)).abs() < STEP);
        }
    }
}

// ---------------------------------------------------------------------------
// 7. A transform followed by its inverse returns to the start
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn transform_inverse_round_trip(
        (px, py, pz) in (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0),
        scale in 0.5f64..2.0,
        angle in arb_angle(),
        (dx, dy, dz) in (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0),
    ) {
        let m = PrecisionMath::default();
        let t = CoordinateTransform::new(scale, angle, [dx, dy, dz]);
        let p = Coordinate::new(px, py, pz).unwrap();
        let there = t.apply(&p, &m).unwrap();
        let back = t.inverse(&m).unwrap().apply(&there, &m).unwrap();
        // One snap on each leg, the first amplified by 1/scale.
        prop_assert!(back.distance_to(&p) < 4.0 * STEP);
    }
}
