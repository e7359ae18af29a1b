//! Vector and rotation helpers for the spherical world.
//! The sphere is centred at the origin; "up" at a point is the outward radial direction.

pub use glam::{DMat3, DQuat, DVec3};

/// Canonical forward direction of an unrotated body (-Z).
pub const FORWARD: DVec3 = DVec3::NEG_Z;

/// Fraction of the remaining distance covered in one frame by exponential damping.
/// Frame-rate independent: two steps of dt equal one step of 2*dt.
pub fn damping_factor(rate: f64, dt: f64) -> f64 {
    1.0 - (-rate * dt).exp()
}

/// Move `current` toward `target` by one damping step.
pub fn damp(current: f64, target: f64, rate: f64, dt: f64) -> f64 {
    current + (target - current) * damping_factor(rate, dt)
}

/// Normalize, falling back to `fallback` for near-zero input.
pub fn normalize_or(v: DVec3, fallback: DVec3) -> DVec3 {
    let len = v.length();
    if len < 1e-10 {
        return fallback;
    }
    v / len
}

/// Outward unit normal of the sphere at `position`.
pub fn surface_normal(position: DVec3) -> DVec3 {
    normalize_or(position, DVec3::Y)
}

/// Find an arbitrary unit vector orthogonal to v.
pub fn arbitrary_orthogonal(v: DVec3) -> DVec3 {
    let reference = if v.y.abs() < 0.9 { DVec3::Y } else { DVec3::X };
    normalize_or(reference.cross(v), DVec3::X)
}

/// Build a local tangent basis (e1, e2) for a point on the sphere.
pub fn build_tangent_basis(u: DVec3) -> (DVec3, DVec3) {
    let reference = if u.dot(DVec3::Y).abs() < 0.9 {
        DVec3::Y
    } else {
        DVec3::X
    };

    let e1 = normalize_or(reference.cross(u), arbitrary_orthogonal(u));
    let e2 = u.cross(e1);

    (e1, e2)
}

/// Rotation whose local axes map to (right, up, back).
/// The three vectors must form an orthonormal right-handed basis.
pub fn orientation_from_basis(right: DVec3, up: DVec3, back: DVec3) -> DQuat {
    DQuat::from_mat3(&DMat3::from_cols(right, up, back)).normalize()
}

/// Rotation that points the local forward (-Z) along `forward` with local +Y as close to `up` as possible.
pub fn look_rotation(forward: DVec3, up: DVec3) -> DQuat {
    let forward = normalize_or(forward, FORWARD);
    let right = normalize_or(forward.cross(up), arbitrary_orthogonal(forward));
    let true_up = right.cross(forward);
    orientation_from_basis(right, true_up, -forward)
}

/// Reflect `velocity` off a surface with outward `normal`.
/// Only the component moving into the surface is reflected, scaled by `restitution`.
pub fn reflect_with_restitution(velocity: DVec3, normal: DVec3, restitution: f64) -> DVec3 {
    let into = velocity.dot(normal);
    if into >= 0.0 {
        return velocity;
    }
    velocity + normal * (-(1.0 + restitution) * into)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_close(actual: DVec3, expected: DVec3) {
        assert!(
            actual.abs_diff_eq(expected, 1e-6),
            "Expected {:?} to be close to {:?}",
            actual,
            expected
        );
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "Expected {} to be close to {}",
            actual,
            expected
        );
    }

    #[test]
    fn damping_factor_zero_dt_is_zero() {
        assert_eq!(damping_factor(5.0, 0.0), 0.0);
    }

    #[test]
    fn damping_factor_approaches_one() {
        assert!(damping_factor(5.0, 100.0) > 0.999_999);
        assert!(damping_factor(5.0, 100.0) <= 1.0);
    }

    #[test]
    fn damping_is_frame_rate_independent() {
        let one_step = damp(0.0, 1.0, 3.0, 0.2);
        let two_steps = damp(damp(0.0, 1.0, 3.0, 0.1), 1.0, 3.0, 0.1);
        assert_close(one_step, two_steps);
    }

    #[test]
    fn normalize_or_uses_fallback_for_zero() {
        assert_vec_close(normalize_or(DVec3::ZERO, DVec3::Z), DVec3::Z);
    }

    #[test]
    fn surface_normal_is_radial() {
        assert_vec_close(surface_normal(DVec3::new(0.0, 0.0, 7.0)), DVec3::Z);
        assert_vec_close(surface_normal(DVec3::ZERO), DVec3::Y);
    }

    #[test]
    fn arbitrary_orthogonal_works_for_axis_aligned() {
        for v in [DVec3::X, DVec3::Y, DVec3::Z] {
            let orth = arbitrary_orthogonal(v);
            assert_close(v.dot(orth), 0.0);
            assert_close(orth.length(), 1.0);
        }
    }

    #[test]
    fn tangent_basis_orthonormal() {
        let u = DVec3::new(1.0, 2.0, 3.0).normalize();
        let (e1, e2) = build_tangent_basis(u);
        assert_close(e1.length(), 1.0);
        assert_close(e2.length(), 1.0);
        assert_close(u.dot(e1), 0.0);
        assert_close(u.dot(e2), 0.0);
        assert_close(e1.dot(e2), 0.0);
    }

    #[test]
    fn tangent_basis_north_pole() {
        let (e1, e2) = build_tangent_basis(DVec3::Y);
        assert_close(DVec3::Y.dot(e1), 0.0);
        assert_close(DVec3::Y.dot(e2), 0.0);
        assert_close(e1.dot(e2), 0.0);
    }

    #[test]
    fn identity_basis_gives_identity_rotation() {
        let q = orientation_from_basis(DVec3::X, DVec3::Y, DVec3::Z);
        assert!(q.abs_diff_eq(DQuat::IDENTITY, 1e-9));
    }

    #[test]
    fn look_rotation_points_forward() {
        let forward = DVec3::new(1.0, 0.0, -1.0).normalize();
        let q = look_rotation(forward, DVec3::Y);
        assert_vec_close(q * FORWARD, forward);
        assert_close((q * DVec3::Y).dot(forward), 0.0);
    }

    #[test]
    fn look_rotation_survives_parallel_up() {
        let q = look_rotation(DVec3::Y, DVec3::Y);
        assert_vec_close(q * FORWARD, DVec3::Y);
        assert!(q.is_normalized());
    }

    #[test]
    fn reflect_applies_restitution() {
        let v = reflect_with_restitution(DVec3::new(2.0, -4.0, 0.0), DVec3::Y, 0.5);
        assert_vec_close(v, DVec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn reflect_ignores_separating_velocity() {
        let v = DVec3::new(1.0, 3.0, 0.0);
        assert_vec_close(reflect_with_restitution(v, DVec3::Y, 0.3), v);
    }

    #[test]
    fn reflected_velocity_never_points_into_surface() {
        let normal = DVec3::new(1.0, 1.0, 0.0).normalize();
        for restitution in [0.0, 0.2, 0.3, 1.0] {
            for v in [
                DVec3::new(-3.0, -1.0, 2.0),
                DVec3::new(-0.1, -0.1, 0.0),
                DVec3::new(0.0, -5.0, -5.0),
            ] {
                let out = reflect_with_restitution(v, normal, restitution);
                assert!(out.dot(normal) >= -1e-12);
            }
        }
    }
}
