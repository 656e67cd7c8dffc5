pub mod domain;
pub mod error;
pub mod ident;
pub mod tariff;
pub mod validate;

pub use error::EnergyError;

/// Round to two decimal places, the precision used for all stored report
/// figures (band totals, total, cost).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
