//! Daily peak/valley aggregation.

pub mod anomaly;

use std::sync::Arc;

use energy_core::domain::{AnomalyRecord, EnergyType, Report};
use energy_core::ident::record_id;
use energy_core::tariff::{classify, PricingConfig, TariffBand};
use energy_core::{round2, EnergyError};
use time::Date;

use crate::stores::{ReadingStore, ReportStore};

/// Aggregates a day's readings into one priced report per
/// `(factory_id, energy_type, stat_date)` key.
pub struct ReportEngine {
    readings: Arc<dyn ReadingStore>,
    reports: Arc<dyn ReportStore>,
    pricing: PricingConfig,
}

impl ReportEngine {
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        reports: Arc<dyn ReportStore>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            readings,
            reports,
            pricing,
        }
    }

    /// Generate the daily report for one key.
    ///
    /// Idempotent: if a report already exists for the key it is returned
    /// unchanged and nothing is written. An empty reading set is
    /// `EnergyError::NoData` and nothing is written either.
    pub async fn generate_daily_report(
        &self,
        energy_type: EnergyType,
        factory_id: &str,
        stat_date: Date,
    ) -> Result<Report, EnergyError> {
        if let Some(existing) = self
            .reports
            .find_report(factory_id, energy_type, stat_date)
            .await?
        {
            tracing::debug!(
                factory_id,
                energy_type = %energy_type,
                %stat_date,
                "report already exists, skipping generation"
            );
            return Ok(existing);
        }

        let readings = self
            .readings
            .find_for_day(factory_id, energy_type, stat_date)
            .await?;
        if readings.is_empty() {
            return Err(EnergyError::NoData {
                factory_id: factory_id.to_string(),
                energy_type,
                stat_date,
            });
        }

        let mut peak = 0.0;
        let mut high = 0.0;
        let mut flat = 0.0;
        let mut valley = 0.0;
        for reading in &readings {
            match classify(reading.collected_at.time()) {
                TariffBand::Peak => peak += reading.value,
                TariffBand::High => high += reading.value,
                TariffBand::Flat => flat += reading.value,
                TariffBand::Valley => valley += reading.value,
            }
        }

        // Round the band sums first and derive total and cost from the
        // rounded figures, so the stored total always equals the sum of the
        // stored bands.
        let peak = round2(peak);
        let high = round2(high);
        let flat = round2(flat);
        let valley = round2(valley);
        let p = &self.pricing;
        let cost = peak * p.peak + high * p.high + flat * p.flat + valley * p.valley;

        let report = Report {
            id: record_id("peak"),
            energy_type,
            factory_id: factory_id.to_string(),
            stat_date,
            peak_total: peak,
            high_total: high,
            flat_total: flat,
            valley_total: valley,
            total: round2(peak + high + flat + valley),
            // Only the peak-band price is recorded on the report.
            unit_price_used: round2(p.peak),
            cost: round2(cost),
        };

        let stored = self.reports.insert_report(report).await?;
        metrics::counter!("reports_generated_total").increment(1);
        tracing::info!(
            factory_id,
            energy_type = %energy_type,
            %stat_date,
            total = stored.total,
            cost = stored.cost,
            "daily peak/valley report generated"
        );
        Ok(stored)
    }

    /// Reports for one factory and day, optionally narrowed to one energy
    /// type.
    pub async fn daily_reports(
        &self,
        factory_id: &str,
        stat_date: Date,
        energy_type: Option<EnergyType>,
    ) -> Result<Vec<Report>, EnergyError> {
        let reports = self.reports.find_reports(stat_date).await?;
        Ok(reports
            .into_iter()
            .filter(|r| r.factory_id == factory_id)
            .filter(|r| energy_type.map_or(true, |t| r.energy_type == t))
            .collect())
    }

    /// Factories whose daily total exceeds their energy-type group average by
    /// more than `threshold_pct` percent.
    pub async fn locate_anomalies(
        &self,
        stat_date: Date,
        threshold_pct: f64,
    ) -> Result<Vec<AnomalyRecord>, EnergyError> {
        let reports = self.reports.find_reports(stat_date).await?;
        metrics::counter!("anomaly_queries_total").increment(1);
        Ok(anomaly::flag_high_consumers(&reports, threshold_pct))
    }
}
