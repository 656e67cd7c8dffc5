//! In-memory store used by the test suite. Enforces the same composite-key
//! uniqueness for reports as the Postgres schema.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use energy_core::domain::{EnergyType, Meter, MeterStatus, Reading, Report};
use energy_core::EnergyError;
use time::Date;

use super::{MeterStore, MeterUpdate, ReadingFilter, ReadingStore, ReportStore};

type ReportKey = (String, EnergyType, Date);

#[derive(Default)]
struct Inner {
    meters: HashMap<String, Meter>,
    readings: Vec<Reading>,
    reports: HashMap<ReportKey, Report>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, EnergyError> {
        self.inner
            .lock()
            .map_err(|_| EnergyError::Store("memory store mutex poisoned".into()))
    }
}

#[async_trait]
impl MeterStore for MemoryStore {
    async fn insert_meter(&self, meter: Meter) -> Result<Meter, EnergyError> {
        let mut inner = self.lock()?;
        if inner.meters.contains_key(&meter.id) {
            return Err(EnergyError::Duplicate(format!("meter {}", meter.id)));
        }
        inner.meters.insert(meter.id.clone(), meter.clone());
        Ok(meter)
    }

    async fn get_meter(&self, meter_id: &str) -> Result<Option<Meter>, EnergyError> {
        Ok(self.lock()?.meters.get(meter_id).cloned())
    }

    async fn list_meters(
        &self,
        energy_type: Option<EnergyType>,
        status: Option<MeterStatus>,
    ) -> Result<Vec<Meter>, EnergyError> {
        let inner = self.lock()?;
        let mut meters: Vec<Meter> = inner
            .meters
            .values()
            .filter(|m| energy_type.map_or(true, |t| m.energy_type == t))
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect();
        meters.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(meters)
    }

    async fn update_meter(
        &self,
        meter_id: &str,
        update: &MeterUpdate,
    ) -> Result<Meter, EnergyError> {
        let mut inner = self.lock()?;
        let meter = inner
            .meters
            .get_mut(meter_id)
            .ok_or_else(|| EnergyError::NotFound(format!("meter {meter_id}")))?;
        update.apply(meter);
        Ok(meter.clone())
    }

    async fn delete_meter(&self, meter_id: &str) -> Result<(), EnergyError> {
        let mut inner = self.lock()?;
        inner
            .meters
            .remove(meter_id)
            .map(|_| ())
            .ok_or_else(|| EnergyError::NotFound(format!("meter {meter_id}")))
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, reading: Reading) -> Result<Reading, EnergyError> {
        self.lock()?.readings.push(reading.clone());
        Ok(reading)
    }

    async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, EnergyError> {
        let inner = self.lock()?;
        let mut readings: Vec<Reading> = inner
            .readings
            .iter()
            .filter(|r| filter.meter_id.as_deref().map_or(true, |m| r.meter_id == m))
            .filter(|r| filter.factory_id.as_deref().map_or(true, |f| r.factory_id == f))
            .filter(|r| filter.start.map_or(true, |s| r.collected_at >= s))
            .filter(|r| filter.end.map_or(true, |e| r.collected_at < e))
            .filter(|r| filter.quality_grade.map_or(true, |q| r.quality_grade == q))
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        Ok(readings)
    }

    async fn find_for_day(
        &self,
        factory_id: &str,
        energy_type: EnergyType,
        stat_date: Date,
    ) -> Result<Vec<Reading>, EnergyError> {
        let inner = self.lock()?;
        Ok(inner
            .readings
            .iter()
            .filter(|r| r.factory_id == factory_id && r.collected_at.date() == stat_date)
            .filter(|r| {
                inner
                    .meters
                    .get(&r.meter_id)
                    .map_or(false, |m| m.energy_type == energy_type)
            })
            .cloned()
            .collect())
    }

    async fn mark_verified(&self, reading_id: &str) -> Result<(), EnergyError> {
        let mut inner = self.lock()?;
        let reading = inner
            .readings
            .iter_mut()
            .find(|r| r.id == reading_id)
            .ok_or_else(|| EnergyError::NotFound(format!("reading {reading_id}")))?;
        reading.verified = true;
        Ok(())
    }

    async fn delete_for_meter(&self, meter_id: &str) -> Result<u64, EnergyError> {
        let mut inner = self.lock()?;
        let before = inner.readings.len();
        inner.readings.retain(|r| r.meter_id != meter_id);
        Ok((before - inner.readings.len()) as u64)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: Report) -> Result<Report, EnergyError> {
        let mut inner = self.lock()?;
        let key = (
            report.factory_id.clone(),
            report.energy_type,
            report.stat_date,
        );
        // First writer wins; a concurrent duplicate gets the stored row back.
        Ok(inner.reports.entry(key).or_insert(report).clone())
    }

    async fn find_report(
        &self,
        factory_id: &str,
        energy_type: EnergyType,
        stat_date: Date,
    ) -> Result<Option<Report>, EnergyError> {
        let key = (factory_id.to_string(), energy_type, stat_date);
        Ok(self.lock()?.reports.get(&key).cloned())
    }

    async fn find_reports(&self, stat_date: Date) -> Result<Vec<Report>, EnergyError> {
        let inner = self.lock()?;
        let mut reports: Vec<Report> = inner
            .reports
            .values()
            .filter(|r| r.stat_date == stat_date)
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.factory_id.cmp(&b.factory_id).then(a.id.cmp(&b.id)));
        Ok(reports)
    }
}
