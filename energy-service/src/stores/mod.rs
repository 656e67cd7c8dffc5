pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use energy_core::domain::{CommProtocol, EnergyType, Meter, MeterStatus, QualityGrade, Reading, Report};
use energy_core::EnergyError;
use time::{Date, OffsetDateTime};

/// Filter for reading queries. All fields optional; unset fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub meter_id: Option<String>,
    pub factory_id: Option<String>,
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
    pub quality_grade: Option<QualityGrade>,
}

/// Allow-listed mutable meter fields. Identity fields (`id`, `factory_id`,
/// `energy_type`) are deliberately absent.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MeterUpdate {
    pub install_location: Option<String>,
    pub pipe_spec: Option<String>,
    pub comm_protocol: Option<CommProtocol>,
    pub status: Option<MeterStatus>,
    pub calib_cycle_months: Option<i32>,
    pub manufacturer: Option<String>,
}

impl MeterUpdate {
    pub fn apply(&self, meter: &mut Meter) {
        if let Some(loc) = &self.install_location {
            meter.install_location = loc.clone();
        }
        if let Some(spec) = &self.pipe_spec {
            meter.pipe_spec = Some(spec.clone());
        }
        if let Some(proto) = self.comm_protocol {
            meter.comm_protocol = proto;
        }
        if let Some(status) = self.status {
            meter.status = status;
        }
        if let Some(cycle) = self.calib_cycle_months {
            meter.calib_cycle_months = cycle;
        }
        if let Some(mfr) = &self.manufacturer {
            meter.manufacturer = Some(mfr.clone());
        }
    }
}

#[async_trait]
pub trait MeterStore: Send + Sync {
    /// Insert a meter; an existing id is an `EnergyError::Duplicate`.
    async fn insert_meter(&self, meter: Meter) -> Result<Meter, EnergyError>;

    async fn get_meter(&self, meter_id: &str) -> Result<Option<Meter>, EnergyError>;

    async fn list_meters(
        &self,
        energy_type: Option<EnergyType>,
        status: Option<MeterStatus>,
    ) -> Result<Vec<Meter>, EnergyError>;

    async fn update_meter(&self, meter_id: &str, update: &MeterUpdate)
        -> Result<Meter, EnergyError>;

    async fn delete_meter(&self, meter_id: &str) -> Result<(), EnergyError>;
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert_reading(&self, reading: Reading) -> Result<Reading, EnergyError>;

    /// Readings matching the filter, newest first.
    async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, EnergyError>;

    /// All readings collected in the given factory on the given day whose
    /// meter carries the given energy type.
    async fn find_for_day(
        &self,
        factory_id: &str,
        energy_type: EnergyType,
        stat_date: Date,
    ) -> Result<Vec<Reading>, EnergyError>;

    async fn mark_verified(&self, reading_id: &str) -> Result<(), EnergyError>;

    /// Remove all readings owned by a meter, returning how many were removed.
    async fn delete_for_meter(&self, meter_id: &str) -> Result<u64, EnergyError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Conflict-aware insert over the unique `(factory_id, energy_type,
    /// stat_date)` key: returns the stored row whether this call inserted it
    /// or a report already existed. This is the authoritative exactly-once
    /// guard; callers' existence checks are only a fast path.
    async fn insert_report(&self, report: Report) -> Result<Report, EnergyError>;

    async fn find_report(
        &self,
        factory_id: &str,
        energy_type: EnergyType,
        stat_date: Date,
    ) -> Result<Option<Report>, EnergyError>;

    async fn find_reports(&self, stat_date: Date) -> Result<Vec<Report>, EnergyError>;
}
