//! Time-of-use tariff bands and pricing.

use serde::{Deserialize, Serialize};
use time::Time;

/// One of the four fixed daily tariff windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffBand {
    Peak,
    High,
    Flat,
    Valley,
}

/// Classify a time of day into its tariff band.
///
/// Band windows (half-open):
/// - peak:   10:00-12:00, 16:00-18:00
/// - high:   08:00-10:00, 12:00-16:00, 18:00-22:00
/// - flat:   06:00-08:00, 22:00-24:00
/// - valley: 00:00-06:00, plus anything unmatched
///
/// Pure and total over all 1440 minutes of a day.
pub fn classify(time_of_day: Time) -> TariffBand {
    let minute = u16::from(time_of_day.hour()) * 60 + u16::from(time_of_day.minute());
    match minute {
        600..=719 | 960..=1079 => TariffBand::Peak,
        480..=599 | 720..=959 | 1080..=1319 => TariffBand::High,
        360..=479 | 1320..=1439 => TariffBand::Flat,
        _ => TariffBand::Valley,
    }
}

/// Per-band unit prices, handed to the aggregation engine as an explicit
/// immutable value so alternate tariff schedules are testable.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub peak: f64,
    pub high: f64,
    pub flat: f64,
    pub valley: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            peak: 1.2,
            high: 0.9,
            flat: 0.6,
            valley: 0.3,
        }
    }
}

impl PricingConfig {
    pub fn price(&self, band: TariffBand) -> f64 {
        match band {
            TariffBand::Peak => self.peak,
            TariffBand::High => self.high,
            TariffBand::Flat => self.flat,
            TariffBand::Valley => self.valley,
        }
    }
}
