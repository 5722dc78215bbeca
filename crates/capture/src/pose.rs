//! Pose composition (link pose * mount offset).

use contracts::Pose;
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};

const MIN_QUATERNION_NORM: f64 = 1e-9;

/// Convert to an isometry; a degenerate quaternion is treated as identity
pub fn to_isometry(pose: &Pose) -> Isometry3<f64> {
    let [x, y, z, w] = pose.orientation;
    let rotation = UnitQuaternion::try_new(Quaternion::new(w, x, y, z), MIN_QUATERNION_NORM)
        .unwrap_or_else(UnitQuaternion::identity);
    let [px, py, pz] = pose.position;
    Isometry3::from_parts(Translation3::new(px, py, pz), rotation)
}

pub fn from_isometry(isometry: &Isometry3<f64>) -> Pose {
    let t = isometry.translation.vector;
    let q = isometry.rotation.quaternion();
    Pose {
        position: [t.x, t.y, t.z],
        orientation: [q.i, q.j, q.k, q.w],
    }
}

/// World pose of the sensor mounted at `mount` on a link at `link`
pub fn compose(link: &Pose, mount: &Pose) -> Pose {
    from_isometry(&(to_isometry(link) * to_isometry(mount)))
}

/// Orientation for a pure yaw rotation, `[x, y, z, w]`
pub fn yaw_orientation(yaw: f64) -> [f64; 4] {
    let half = yaw * 0.5;
    [0.0, 0.0, half.sin(), half.cos()]
}
