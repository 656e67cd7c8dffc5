//! Bounds checks for incoming reading values.

/// Per-reading ceiling for an energy type label. Types the system does not
/// know about get a generous default.
pub fn max_reading_value(energy_type: &str) -> f64 {
    match energy_type {
        "水" => 1000.0,
        "蒸汽" => 500.0,
        "天然气" => 2000.0,
        _ => 10_000.0,
    }
}

/// Whether `value` is acceptable for a reading of the given energy type:
/// non-negative and at most the per-type ceiling. Callers are responsible for
/// turning a `false` into a descriptive error.
pub fn verify_energy_value(energy_type: &str, value: f64) -> bool {
    value >= 0.0 && value <= max_reading_value(energy_type)
}
