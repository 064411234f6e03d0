use glam::{Mat3, Quat, Vec3};

// Squared-magnitude cutoff below which a vector has no usable direction.
const EPSILON: f32 = 1.0e-10;
const PARALLEL_UP_DOT: f32 = 0.9999;

pub fn is_degenerate(v: Vec3) -> bool {
    let mag_sq = v.length_squared();
    !mag_sq.is_finite() || mag_sq <= EPSILON
}

/// Unit vector along `v`, or `None` when `v` is too short (or non-finite) to
/// carry a direction.
pub fn normalize_checked(v: Vec3) -> Option<Vec3> {
    if is_degenerate(v) {
        return None;
    }
    Some(v * v.length_squared().sqrt().recip())
}

/// Rotates `v` around the world up axis by `degrees`.
pub fn yaw(v: Vec3, degrees: f32) -> Vec3 {
    Quat::from_rotation_y(degrees.to_radians()) * v
}

/// Orientation whose local +Z faces `forward`, keeping local +Y as close to
/// world up as possible.
pub fn look_rotation(forward: Vec3) -> Option<Quat> {
    let fwd = normalize_checked(forward)?;

    let mut up_ref = Vec3::Y;
    if fwd.dot(up_ref).abs() > PARALLEL_UP_DOT {
        up_ref = Vec3::Z;
    }

    let right = normalize_checked(up_ref.cross(fwd)).unwrap_or(Vec3::X);
    let up = fwd.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, fwd)).normalize())
}

pub fn forward_of(rotation: Quat) -> Vec3 {
    rotation * Vec3::Z
}
