//! Rotation helpers shared by the controller, the IK solver and the
//! velocity estimator.

use std::f32::consts::PI;

use nalgebra::{Unit, UnitQuaternion, Vector3};

/// Axis-angle magnitudes at or below this are treated as no rotation.
pub const AXIS_ANGLE_EPS: f32 = 1.0e-6;

/// Flip `q` so that its scalar part is non-negative.
///
/// `q` and `-q` encode the same rotation; the canonical one selects the
/// shorter of the two arcs when converted to axis-angle.
pub fn canonical_quat(q: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    if q.w < 0.0 {
        UnitQuaternion::new_unchecked(-q.into_inner())
    } else {
        *q
    }
}

/// Axis-angle vector (`axis * angle`) of a rotation, after sign correction.
///
/// Returns zero when the vector part is below [`AXIS_ANGLE_EPS`].
pub fn axis_angle_from_quat(q: &UnitQuaternion<f32>) -> Vector3<f32> {
    let q = canonical_quat(q);
    let imag = q.imag();
    let sin_half = imag.norm();
    if sin_half <= AXIS_ANGLE_EPS {
        return Vector3::zeros();
    }
    let angle = 2.0 * sin_half.atan2(q.w);
    imag * (angle / sin_half)
}

/// Quaternion for an axis-angle vector; identity when its norm is at or
/// below `eps`.
pub fn quat_from_axis_angle(v: &Vector3<f32>, eps: f32) -> UnitQuaternion<f32> {
    let angle = v.norm();
    if angle > eps {
        UnitQuaternion::from_axis_angle(&Unit::new_unchecked(v / angle), angle)
    } else {
        UnitQuaternion::identity()
    }
}

/// Rotation error that takes `current` to `target`, as axis-angle.
pub fn rotation_error(
    current: &UnitQuaternion<f32>,
    target: &UnitQuaternion<f32>,
) -> Vector3<f32> {
    axis_angle_from_quat(&(target * current.inverse()))
}

/// Wrap an angle to `[-pi, pi)`.
pub fn wrap_to_pi(angle: f32) -> f32 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Replace roll and pitch of `q` (extrinsic XYZ) with constants, keeping yaw.
pub fn level_orientation(q: &UnitQuaternion<f32>, roll: f32, pitch: f32) -> UnitQuaternion<f32> {
    let (_, _, yaw) = q.euler_angles();
    canonical_quat(&UnitQuaternion::from_euler_angles(roll, pitch, yaw))
}

/// `[w, x, y, z]` coefficients.
pub fn quat_wxyz(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.w, q.i, q.j, q.k]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn axis_angle_of_quarter_turn() {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let aa = axis_angle_from_quat(&q);
        assert_relative_eq!(aa, Vector3::new(0.0, 0.0, FRAC_PI_2), epsilon = 1e-5);
    }

    #[test]
    fn axis_angle_takes_short_arc() {
        // 270 degrees about z is -90 degrees after sign correction.
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.5 * PI);
        let aa = axis_angle_from_quat(&q);
        assert_relative_eq!(aa, Vector3::new(0.0, 0.0, -FRAC_PI_2), epsilon = 1e-5);
    }

    #[test]
    fn identity_fallback_below_eps() {
        let q = quat_from_axis_angle(&Vector3::new(1e-8, 0.0, 0.0), AXIS_ANGLE_EPS);
        assert_eq!(q, UnitQuaternion::identity());
    }

    #[test]
    fn wrap_to_pi_boundaries() {
        assert_relative_eq!(wrap_to_pi(PI), -PI, epsilon = 1e-6);
        assert_relative_eq!(wrap_to_pi(3.0 * PI / 2.0), -FRAC_PI_2, epsilon = 1e-5);
        assert_relative_eq!(wrap_to_pi(-0.25), -0.25, epsilon = 1e-6);
    }

    #[test]
    fn level_keeps_yaw() {
        let q = UnitQuaternion::from_euler_angles(0.3, 0.2, 0.7);
        let leveled = level_orientation(&q, PI, 0.0);
        let expected = UnitQuaternion::from_euler_angles(PI, 0.0, 0.7);
        assert_relative_eq!(leveled.angle_to(&expected), 0.0, epsilon = 1e-3);
        assert!(leveled.w >= 0.0);
    }

    #[test]
    fn rotation_error_composes_to_target() {
        let current = UnitQuaternion::from_euler_angles(0.1, -0.3, 0.5);
        let target = UnitQuaternion::from_euler_angles(0.4, 0.2, -0.1);
        let err = rotation_error(&current, &target);
        let reached = quat_from_axis_angle(&err, AXIS_ANGLE_EPS) * current;
        assert_relative_eq!(reached.angle_to(&target), 0.0, epsilon = 1e-4);
    }

    proptest! {
        #[test]
        fn self_difference_has_zero_angle(
            roll in -PI..PI,
            pitch in -1.5f32..1.5,
            yaw in -PI..PI,
        ) {
            let q = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
            let aa = axis_angle_from_quat(&(q * q.inverse()));
            prop_assert!(aa.norm() < 1e-4);
        }

        #[test]
        fn canonical_scalar_is_non_negative(w in -1.0f32..1.0, x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0) {
            let raw = nalgebra::Quaternion::new(w, x, y, z);
            prop_assume!(raw.norm() > 1e-3);
            let q = canonical_quat(&UnitQuaternion::from_quaternion(raw));
            prop_assert!(q.w >= 0.0);
        }

        #[test]
        fn wrapped_angle_in_range(a in -100.0f32..100.0) {
            let w = wrap_to_pi(a);
            prop_assert!((-PI..PI).contains(&w) || (w - PI).abs() < 1e-4);
        }
    }
}
