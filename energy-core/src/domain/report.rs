use serde::{Deserialize, Serialize};
use time::Date;

use super::EnergyType;

/// Daily peak/valley consumption summary for one factory and energy type.
///
/// Invariant: `total` equals the sum of the four band totals within rounding
/// tolerance (all figures are stored rounded to two decimals). At most one
/// report exists per `(factory_id, energy_type, stat_date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub energy_type: EnergyType,
    pub factory_id: String,
    pub stat_date: Date,
    pub peak_total: f64,
    pub high_total: f64,
    pub flat_total: f64,
    pub valley_total: f64,
    pub total: f64,
    /// Only the peak-band price is recorded; per-band prices are not stored
    /// on the report in the current design.
    pub unit_price_used: f64,
    pub cost: f64,
}

/// A factory whose daily total exceeded its energy-type group average by more
/// than the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub factory_id: String,
    pub energy_type: EnergyType,
    pub total: f64,
    pub group_avg: f64,
    pub exceed_rate: f64,
}
