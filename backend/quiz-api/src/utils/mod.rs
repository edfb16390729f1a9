pub mod time;

/// Rounds to `places` decimals, the precision scores are reported with.
pub fn to_fixed(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
