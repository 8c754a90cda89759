pub type Vec3 = [f64; 3];
pub type Quat = [f64; 4];

pub const ZERO_VEC3: Vec3 = [0.0, 0.0, 0.0];
/// Identity rotation in `[x, y, z, w]` order.
pub const IDENTITY_QUAT: Quat = [0.0, 0.0, 0.0, 1.0];

pub fn vec3_add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn vec3_sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn vec3_scale(v: Vec3, factor: f64) -> Vec3 {
    [v[0] * factor, v[1] * factor, v[2] * factor]
}

pub fn vec3_norm(v: Vec3) -> f64 {
    ((v[0] * v[0]) + (v[1] * v[1]) + (v[2] * v[2])).sqrt()
}

pub fn vec3_distance(a: Vec3, b: Vec3) -> f64 {
    vec3_norm(vec3_sub(a, b))
}

pub fn vec3_is_finite(v: &Vec3) -> bool {
    v.iter().all(|component| component.is_finite())
}

pub fn quat_norm(q: Quat) -> f64 {
    q.iter().map(|component| component * component).sum::<f64>().sqrt()
}

/// Advances `q` by angular velocity `omega` (rad/s, world frame) over `dt`.
pub fn quat_integrate(q: Quat, omega: Vec3, dt: f64) -> Quat {
    let [x, y, z, w] = q;
    let [wx, wy, wz] = omega;
    let half_dt = 0.5 * dt;
    let next = [
        x + half_dt * (wx * w + wy * z - wz * y),
        y + half_dt * (wy * w + wz * x - wx * z),
        z + half_dt * (wz * w + wx * y - wy * x),
        w - half_dt * (wx * x + wy * y + wz * z),
    ];
    let norm = quat_norm(next);
    if norm <= f64::EPSILON || !norm.is_finite() {
        return q;
    }
    [next[0] / norm, next[1] / norm, next[2] / norm, next[3] / norm]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(vec3_distance([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]), 5.0);
    }

    #[test]
    fn zero_spin_keeps_orientation() {
        let q = quat_integrate(IDENTITY_QUAT, ZERO_VEC3, 0.01);
        assert_eq!(q, IDENTITY_QUAT);
    }

    #[test]
    fn spin_keeps_quaternion_unit_length() {
        let mut q = IDENTITY_QUAT;
        for _ in 0..1000 {
            q = quat_integrate(q, [0.0, 0.0, 3.0], 0.01);
        }
        assert!((quat_norm(q) - 1.0).abs() < 1e-9);
        assert!(q[2].abs() > 0.0);
    }
}
