//! Meter and reading management over the store traits, including the
//! post-ingestion aggregation trigger.

use std::sync::Arc;

use energy_core::domain::{
    AnomalyRecord, CommProtocol, EnergyType, Meter, MeterStatus, QualityGrade, Reading, Report,
};
use energy_core::ident::record_id;
use energy_core::validate::verify_energy_value;
use energy_core::EnergyError;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::engine::ReportEngine;
use crate::stores::{MeterStore, MeterUpdate, ReadingFilter, ReadingStore};

#[derive(Debug, Clone, Deserialize)]
pub struct NewMeter {
    pub id: String,
    pub factory_id: String,
    pub energy_type: EnergyType,
    pub install_location: String,
    pub pipe_spec: Option<String>,
    pub comm_protocol: CommProtocol,
    pub calib_cycle_months: i32,
    pub manufacturer: Option<String>,
    pub status: Option<MeterStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReading {
    pub meter_id: String,
    pub factory_id: String,
    pub collected_at: OffsetDateTime,
    pub value: f64,
    pub quality_grade: Option<QualityGrade>,
}

pub struct EnergyService {
    meters: Arc<dyn MeterStore>,
    readings: Arc<dyn ReadingStore>,
    engine: ReportEngine,
}

impl EnergyService {
    pub fn new(
        meters: Arc<dyn MeterStore>,
        readings: Arc<dyn ReadingStore>,
        engine: ReportEngine,
    ) -> Self {
        Self {
            meters,
            readings,
            engine,
        }
    }

    pub async fn add_meter(&self, new: NewMeter) -> Result<Meter, EnergyError> {
        let meter = Meter {
            id: new.id,
            factory_id: new.factory_id,
            energy_type: new.energy_type,
            status: new.status.unwrap_or(MeterStatus::Normal),
            install_location: new.install_location,
            pipe_spec: new.pipe_spec,
            comm_protocol: new.comm_protocol,
            calib_cycle_months: new.calib_cycle_months,
            manufacturer: new.manufacturer,
            created_at: OffsetDateTime::now_utc(),
        };
        let stored = self.meters.insert_meter(meter).await?;
        tracing::info!(meter_id = %stored.id, energy_type = %stored.energy_type, "meter registered");
        Ok(stored)
    }

    pub async fn update_meter(
        &self,
        meter_id: &str,
        update: MeterUpdate,
    ) -> Result<Meter, EnergyError> {
        self.meters.update_meter(meter_id, &update).await
    }

    /// Delete a meter and, first, every reading it owns.
    pub async fn delete_meter(&self, meter_id: &str) -> Result<(), EnergyError> {
        if self.meters.get_meter(meter_id).await?.is_none() {
            return Err(EnergyError::NotFound(format!("meter {meter_id}")));
        }
        let removed = self.readings.delete_for_meter(meter_id).await?;
        self.meters.delete_meter(meter_id).await?;
        tracing::info!(meter_id, readings_removed = removed, "meter deleted");
        Ok(())
    }

    pub async fn list_meters(
        &self,
        energy_type: Option<EnergyType>,
        status: Option<MeterStatus>,
    ) -> Result<Vec<Meter>, EnergyError> {
        self.meters.list_meters(energy_type, status).await
    }

    /// Ingest one reading: the meter must exist, the value must pass the
    /// bounds check, and the unit and verified flag derive from the meter's
    /// energy type and the quality grade. After commit, the daily report for
    /// the reading's key is generated unless one already exists.
    pub async fn add_reading(&self, new: NewReading) -> Result<Reading, EnergyError> {
        let meter = self
            .meters
            .get_meter(&new.meter_id)
            .await?
            .ok_or_else(|| EnergyError::NotFound(format!("meter {}", new.meter_id)))?;

        if !verify_energy_value(meter.energy_type.label(), new.value) {
            metrics::counter!("readings_rejected_total").increment(1);
            return Err(EnergyError::Validation(format!(
                "value {} out of range for {}",
                new.value, meter.energy_type
            )));
        }

        let grade = new.quality_grade.unwrap_or(QualityGrade::Good);
        let reading = Reading {
            id: record_id("monitor"),
            meter_id: new.meter_id,
            collected_at: new.collected_at,
            value: new.value,
            unit: meter.energy_type.unit().to_string(),
            quality_grade: grade,
            factory_id: new.factory_id,
            verified: grade.auto_verified(),
        };
        let stored = self.readings.insert_reading(reading).await?;
        metrics::counter!("readings_ingested_total").increment(1);

        // The reading is committed; a trigger failure is logged, not
        // propagated, since the report can still be generated explicitly.
        let stat_date = stored.collected_at.date();
        if let Err(e) = self
            .engine
            .generate_daily_report(meter.energy_type, &stored.factory_id, stat_date)
            .await
        {
            tracing::warn!(
                error = %e,
                factory_id = %stored.factory_id,
                %stat_date,
                "auto report generation failed, reading kept"
            );
        }

        Ok(stored)
    }

    pub async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, EnergyError> {
        self.readings.find_readings(filter).await
    }

    /// Manual confirmation of a reading's quality.
    pub async fn verify_reading(&self, reading_id: &str) -> Result<(), EnergyError> {
        self.readings.mark_verified(reading_id).await?;
        tracing::info!(reading_id, "reading verified");
        Ok(())
    }

    pub async fn generate_daily_report(
        &self,
        energy_type: EnergyType,
        factory_id: &str,
        stat_date: Date,
    ) -> Result<Report, EnergyError> {
        self.engine
            .generate_daily_report(energy_type, factory_id, stat_date)
            .await
    }

    pub async fn daily_reports(
        &self,
        factory_id: &str,
        stat_date: Date,
        energy_type: Option<EnergyType>,
    ) -> Result<Vec<Report>, EnergyError> {
        self.engine
            .daily_reports(factory_id, stat_date, energy_type)
            .await
    }

    pub async fn locate_anomalies(
        &self,
        stat_date: Date,
        threshold_pct: f64,
    ) -> Result<Vec<AnomalyRecord>, EnergyError> {
        self.engine.locate_anomalies(stat_date, threshold_pct).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{MemoryStore, ReportStore};
    use energy_core::tariff::PricingConfig;
    use time::macros::{date, datetime};

    fn service() -> (EnergyService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = ReportEngine::new(store.clone(), store.clone(), PricingConfig::default());
        (
            EnergyService::new(store.clone(), store.clone(), engine),
            store,
        )
    }

    fn new_meter(id: &str, energy_type: EnergyType) -> NewMeter {
        NewMeter {
            id: id.to_string(),
            factory_id: "F001".to_string(),
            energy_type,
            install_location: "一号车间".to_string(),
            pipe_spec: Some("DN50".to_string()),
            comm_protocol: CommProtocol::Rs485,
            calib_cycle_months: 12,
            manufacturer: Some("华仪".to_string()),
            status: None,
        }
    }

    fn new_reading(meter_id: &str, value: f64, grade: Option<QualityGrade>) -> NewReading {
        NewReading {
            meter_id: meter_id.to_string(),
            factory_id: "F001".to_string(),
            collected_at: datetime!(2025-03-01 10:30 UTC),
            value,
            quality_grade: grade,
        }
    }

    #[tokio::test]
    async fn reading_for_unknown_meter_is_not_found() {
        let (svc, _) = service();
        let err = svc.add_reading(new_reading("W-404", 10.0, None)).await.unwrap_err();
        assert!(matches!(err, EnergyError::NotFound(_)));
    }

    #[tokio::test]
    async fn out_of_range_value_is_rejected() {
        let (svc, _) = service();
        svc.add_meter(new_meter("S-001", EnergyType::Steam)).await.unwrap();

        let err = svc.add_reading(new_reading("S-001", -1.0, None)).await.unwrap_err();
        assert!(matches!(err, EnergyError::Validation(_)));

        // Steam ceiling is 500
        let err = svc.add_reading(new_reading("S-001", 500.01, None)).await.unwrap_err();
        assert!(matches!(err, EnergyError::Validation(_)));
        assert!(svc.add_reading(new_reading("S-001", 500.0, None)).await.is_ok());
    }

    #[tokio::test]
    async fn unit_and_verified_flag_are_derived() {
        let (svc, _) = service();
        svc.add_meter(new_meter("S-001", EnergyType::Steam)).await.unwrap();

        let good = svc
            .add_reading(new_reading("S-001", 10.0, Some(QualityGrade::Excellent)))
            .await
            .unwrap();
        assert_eq!(good.unit, "t");
        assert!(good.verified);
        assert!(good.id.starts_with("monitor_"));

        let poor = svc
            .add_reading(new_reading("S-001", 10.0, Some(QualityGrade::Poor)))
            .await
            .unwrap();
        assert!(!poor.verified);
    }

    #[tokio::test]
    async fn ingestion_triggers_exactly_one_report_per_day() {
        let (svc, store) = service();
        svc.add_meter(new_meter("W-001", EnergyType::Water)).await.unwrap();

        svc.add_reading(new_reading("W-001", 10.0, None)).await.unwrap();
        svc.add_reading(new_reading("W-001", 20.0, None)).await.unwrap();

        let reports = store.find_reports(date!(2025 - 03 - 01)).await.unwrap();
        assert_eq!(reports.len(), 1);
        // The report covers only what existed when it was first generated.
        assert_eq!(reports[0].total, 10.0);
    }

    #[tokio::test]
    async fn manual_verification_flips_the_flag() {
        let (svc, _) = service();
        svc.add_meter(new_meter("W-001", EnergyType::Water)).await.unwrap();
        let reading = svc
            .add_reading(new_reading("W-001", 10.0, Some(QualityGrade::Fair)))
            .await
            .unwrap();
        assert!(!reading.verified);

        svc.verify_reading(&reading.id).await.unwrap();
        let found = svc
            .find_readings(&ReadingFilter {
                meter_id: Some("W-001".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(found[0].verified);

        let err = svc.verify_reading("monitor_missing").await.unwrap_err();
        assert!(matches!(err, EnergyError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_meter_cascades_its_readings() {
        let (svc, _) = service();
        svc.add_meter(new_meter("W-001", EnergyType::Water)).await.unwrap();
        svc.add_reading(new_reading("W-001", 10.0, None)).await.unwrap();

        svc.delete_meter("W-001").await.unwrap();

        assert!(svc
            .find_readings(&ReadingFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(svc.list_meters(None, None).await.unwrap().is_empty());

        let err = svc.delete_meter("W-001").await.unwrap_err();
        assert!(matches!(err, EnergyError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_meter_id_is_a_duplicate_error() {
        let (svc, _) = service();
        let meter = svc.add_meter(new_meter("W-001", EnergyType::Water)).await.unwrap();
        assert_eq!(meter.pipe_spec.as_deref(), Some("DN50"));
        let err = svc.add_meter(new_meter("W-001", EnergyType::Gas)).await.unwrap_err();
        assert!(matches!(err, EnergyError::Duplicate(_)));
    }

    #[tokio::test]
    async fn meter_update_is_allow_listed() {
        let (svc, _) = service();
        svc.add_meter(new_meter("W-001", EnergyType::Water)).await.unwrap();

        let updated = svc
            .update_meter(
                "W-001",
                MeterUpdate {
                    status: Some(MeterStatus::Faulty),
                    install_location: Some("二号车间".to_string()),
                    pipe_spec: Some("DN80".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, MeterStatus::Faulty);
        assert_eq!(updated.install_location, "二号车间");
        assert_eq!(updated.pipe_spec.as_deref(), Some("DN80"));
        // Identity fields are untouched by construction.
        assert_eq!(updated.energy_type, EnergyType::Water);
        assert_eq!(updated.factory_id, "F001");
    }

    #[tokio::test]
    async fn anomaly_scenario_across_factories() {
        let store = Arc::new(MemoryStore::new());
        let engine = ReportEngine::new(store.clone(), store.clone(), PricingConfig::default());
        let svc = EnergyService::new(store.clone(), store.clone(), engine);

        for (i, (factory, value)) in [("F001", 100.0), ("F002", 100.0), ("F003", 400.0)]
            .iter()
            .enumerate()
        {
            let meter_id = format!("W-00{i}");
            let mut meter = new_meter(&meter_id, EnergyType::Water);
            meter.factory_id = factory.to_string();
            svc.add_meter(meter).await.unwrap();
            let mut reading = new_reading(&meter_id, *value, None);
            reading.factory_id = factory.to_string();
            svc.add_reading(reading).await.unwrap();
        }

        let anomalies = svc
            .locate_anomalies(date!(2025 - 03 - 01), 30.0)
            .await
            .unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].factory_id, "F003");
        assert_eq!(anomalies[0].group_avg, 200.0);
        assert_eq!(anomalies[0].exceed_rate, 100.0);
    }
}
