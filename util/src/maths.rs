//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Convert a compass bearing (degrees clockwise from north) into a mathematical angle (radians
/// anticlockwise from the positive x axis).
pub fn compass_deg_to_rad<T>(bearing_deg: T) -> T
where
    T: Float,
{
    (T::from(90.0).unwrap() - bearing_deg).to_radians()
}

/// Convert a mathematical angle (radians anticlockwise from the positive x axis) into a compass
/// bearing in degrees, in the range [0, 360).
pub fn rad_to_compass_deg<T>(angle_rad: T) -> T
where
    T: Float,
{
    wrap_360(T::from(90.0).unwrap() - angle_rad.to_degrees())
}

/// Wrap an angle in degrees into the range [0, 360).
pub fn wrap_360<T>(angle_deg: T) -> T
where
    T: Float,
{
    let full = T::from(360.0).unwrap();
    let r = rem_euclid(angle_deg, full);

    // rem_euclid can round up to exactly `full`
    if r >= full {
        T::zero()
    } else {
        r
    }
}

/// Wrap an angle in radians into the range [0, 2pi).
pub fn wrap_2pi<T>(angle_rad: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();
    let r = rem_euclid(angle_rad, tau_t);

    if r >= tau_t {
        T::zero()
    } else {
        r
    }
}

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance between a and b accounting for wrapping
/// between 0 and 2pi.
pub fn get_ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        -c
    } else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Map a value in the range [-pi, pi] to [0, 2pi]
pub fn map_pi_to_2pi<T>(value: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    if value < T::zero() {
        tau_t + value
    } else {
        value
    }
}
