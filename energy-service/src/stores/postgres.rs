//! Postgres-backed store. Domain enums are stored as their text labels; rows
//! come back through explicit row structs and are converted on the way out.

use async_trait::async_trait;
use energy_core::domain::{
    CommProtocol, EnergyType, Meter, MeterStatus, QualityGrade, Reading, Report,
};
use energy_core::EnergyError;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

use super::{MeterStore, MeterUpdate, ReadingFilter, ReadingStore, ReportStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS energy_meter (
    id                 TEXT PRIMARY KEY,
    factory_id         TEXT NOT NULL,
    energy_type        TEXT NOT NULL,
    status             TEXT NOT NULL,
    install_location   TEXT NOT NULL,
    pipe_spec          TEXT,
    comm_protocol      TEXT NOT NULL,
    calib_cycle_months INTEGER NOT NULL,
    manufacturer       TEXT,
    created_at         TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS energy_reading (
    id            TEXT PRIMARY KEY,
    meter_id      TEXT NOT NULL REFERENCES energy_meter (id),
    collected_at  TIMESTAMPTZ NOT NULL,
    value         DOUBLE PRECISION NOT NULL,
    unit          TEXT NOT NULL,
    quality_grade TEXT NOT NULL,
    factory_id    TEXT NOT NULL,
    verified      BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS peak_valley_report (
    id              TEXT PRIMARY KEY,
    energy_type     TEXT NOT NULL,
    factory_id      TEXT NOT NULL,
    stat_date       DATE NOT NULL,
    peak_total      DOUBLE PRECISION NOT NULL,
    high_total      DOUBLE PRECISION NOT NULL,
    flat_total      DOUBLE PRECISION NOT NULL,
    valley_total    DOUBLE PRECISION NOT NULL,
    total           DOUBLE PRECISION NOT NULL,
    unit_price_used DOUBLE PRECISION NOT NULL,
    cost            DOUBLE PRECISION NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS peak_valley_report_key
    ON peak_valley_report (factory_id, energy_type, stat_date);
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and the report uniqueness index if missing. The unique
    /// index is what makes report generation exactly-once under concurrency.
    pub async fn ensure_schema(&self) -> Result<(), EnergyError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> EnergyError {
    EnergyError::Store(e.to_string())
}

fn bad_label(column: &str, value: &str) -> EnergyError {
    EnergyError::Store(format!("unexpected {column} label in database: {value}"))
}

#[derive(sqlx::FromRow)]
struct MeterRow {
    id: String,
    factory_id: String,
    energy_type: String,
    status: String,
    install_location: String,
    pipe_spec: Option<String>,
    comm_protocol: String,
    calib_cycle_months: i32,
    manufacturer: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<MeterRow> for Meter {
    type Error = EnergyError;

    fn try_from(row: MeterRow) -> Result<Self, Self::Error> {
        Ok(Meter {
            energy_type: EnergyType::parse_label(&row.energy_type)
                .ok_or_else(|| bad_label("energy_type", &row.energy_type))?,
            status: MeterStatus::parse_label(&row.status)
                .ok_or_else(|| bad_label("status", &row.status))?,
            comm_protocol: CommProtocol::parse_label(&row.comm_protocol)
                .ok_or_else(|| bad_label("comm_protocol", &row.comm_protocol))?,
            id: row.id,
            factory_id: row.factory_id,
            install_location: row.install_location,
            pipe_spec: row.pipe_spec,
            calib_cycle_months: row.calib_cycle_months,
            manufacturer: row.manufacturer,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: String,
    meter_id: String,
    collected_at: OffsetDateTime,
    value: f64,
    unit: String,
    quality_grade: String,
    factory_id: String,
    verified: bool,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = EnergyError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        Ok(Reading {
            quality_grade: QualityGrade::parse_label(&row.quality_grade)
                .ok_or_else(|| bad_label("quality_grade", &row.quality_grade))?,
            id: row.id,
            meter_id: row.meter_id,
            collected_at: row.collected_at,
            value: row.value,
            unit: row.unit,
            factory_id: row.factory_id,
            verified: row.verified,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: String,
    energy_type: String,
    factory_id: String,
    stat_date: Date,
    peak_total: f64,
    high_total: f64,
    flat_total: f64,
    valley_total: f64,
    total: f64,
    unit_price_used: f64,
    cost: f64,
}

impl TryFrom<ReportRow> for Report {
    type Error = EnergyError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(Report {
            energy_type: EnergyType::parse_label(&row.energy_type)
                .ok_or_else(|| bad_label("energy_type", &row.energy_type))?,
            id: row.id,
            factory_id: row.factory_id,
            stat_date: row.stat_date,
            peak_total: row.peak_total,
            high_total: row.high_total,
            flat_total: row.flat_total,
            valley_total: row.valley_total,
            total: row.total,
            unit_price_used: row.unit_price_used,
            cost: row.cost,
        })
    }
}

#[async_trait]
impl MeterStore for PgStore {
    async fn insert_meter(&self, meter: Meter) -> Result<Meter, EnergyError> {
        let res = sqlx::query(
            r#"
            INSERT INTO energy_meter
                (id, factory_id, energy_type, status, install_location,
                 pipe_spec, comm_protocol, calib_cycle_months, manufacturer,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&meter.id)
        .bind(&meter.factory_id)
        .bind(meter.energy_type.label())
        .bind(meter.status.label())
        .bind(&meter.install_location)
        .bind(&meter.pipe_spec)
        .bind(meter.comm_protocol.label())
        .bind(meter.calib_cycle_months)
        .bind(&meter.manufacturer)
        .bind(meter.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if res.rows_affected() == 0 {
            return Err(EnergyError::Duplicate(format!("meter {}", meter.id)));
        }
        Ok(meter)
    }

    async fn get_meter(&self, meter_id: &str) -> Result<Option<Meter>, EnergyError> {
        let row = sqlx::query_as::<_, MeterRow>(
            "SELECT * FROM energy_meter WHERE id = $1",
        )
        .bind(meter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(Meter::try_from).transpose()
    }

    async fn list_meters(
        &self,
        energy_type: Option<EnergyType>,
        status: Option<MeterStatus>,
    ) -> Result<Vec<Meter>, EnergyError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT * FROM energy_meter WHERE TRUE");
        if let Some(t) = energy_type {
            builder.push(" AND energy_type = ").push_bind(t.label());
        }
        if let Some(s) = status {
            builder.push(" AND status = ").push_bind(s.label());
        }
        builder.push(" ORDER BY id");

        let rows: Vec<MeterRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(Meter::try_from).collect()
    }

    async fn update_meter(
        &self,
        meter_id: &str,
        update: &MeterUpdate,
    ) -> Result<Meter, EnergyError> {
        let row = sqlx::query_as::<_, MeterRow>(
            r#"
            UPDATE energy_meter SET
                install_location   = COALESCE($2, install_location),
                pipe_spec          = COALESCE($3, pipe_spec),
                comm_protocol      = COALESCE($4, comm_protocol),
                status             = COALESCE($5, status),
                calib_cycle_months = COALESCE($6, calib_cycle_months),
                manufacturer       = COALESCE($7, manufacturer)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(meter_id)
        .bind(&update.install_location)
        .bind(&update.pipe_spec)
        .bind(update.comm_protocol.map(CommProtocol::label))
        .bind(update.status.map(MeterStatus::label))
        .bind(update.calib_cycle_months)
        .bind(&update.manufacturer)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.ok_or_else(|| EnergyError::NotFound(format!("meter {meter_id}")))?
            .try_into()
    }

    async fn delete_meter(&self, meter_id: &str) -> Result<(), EnergyError> {
        let res = sqlx::query("DELETE FROM energy_meter WHERE id = $1")
            .bind(meter_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if res.rows_affected() == 0 {
            return Err(EnergyError::NotFound(format!("meter {meter_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert_reading(&self, reading: Reading) -> Result<Reading, EnergyError> {
        sqlx::query(
            r#"
            INSERT INTO energy_reading
                (id, meter_id, collected_at, value, unit, quality_grade,
                 factory_id, verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&reading.id)
        .bind(&reading.meter_id)
        .bind(reading.collected_at)
        .bind(reading.value)
        .bind(&reading.unit)
        .bind(reading.quality_grade.label())
        .bind(&reading.factory_id)
        .bind(reading.verified)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(reading)
    }

    async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, EnergyError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT * FROM energy_reading WHERE TRUE");
        if let Some(meter_id) = &filter.meter_id {
            builder.push(" AND meter_id = ").push_bind(meter_id);
        }
        if let Some(factory_id) = &filter.factory_id {
            builder.push(" AND factory_id = ").push_bind(factory_id);
        }
        if let Some(start) = filter.start {
            builder.push(" AND collected_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            builder.push(" AND collected_at < ").push_bind(end);
        }
        if let Some(grade) = filter.quality_grade {
            builder.push(" AND quality_grade = ").push_bind(grade.label());
        }
        builder.push(" ORDER BY collected_at DESC");

        let rows: Vec<ReadingRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(Reading::try_from).collect()
    }

    async fn find_for_day(
        &self,
        factory_id: &str,
        energy_type: EnergyType,
        stat_date: Date,
    ) -> Result<Vec<Reading>, EnergyError> {
        let start = stat_date.midnight().assume_utc();
        let end = start + time::Duration::days(1);

        let rows = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT r.*
            FROM energy_reading r
            JOIN energy_meter m ON r.meter_id = m.id
            WHERE r.factory_id = $1
              AND m.energy_type = $2
              AND r.collected_at >= $3
              AND r.collected_at <  $4
            ORDER BY r.collected_at
            "#,
        )
        .bind(factory_id)
        .bind(energy_type.label())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Reading::try_from).collect()
    }

    async fn mark_verified(&self, reading_id: &str) -> Result<(), EnergyError> {
        let res = sqlx::query("UPDATE energy_reading SET verified = TRUE WHERE id = $1")
            .bind(reading_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if res.rows_affected() == 0 {
            return Err(EnergyError::NotFound(format!("reading {reading_id}")));
        }
        Ok(())
    }

    async fn delete_for_meter(&self, meter_id: &str) -> Result<u64, EnergyError> {
        let res = sqlx::query("DELETE FROM energy_reading WHERE meter_id = $1")
            .bind(meter_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn insert_report(&self, report: Report) -> Result<Report, EnergyError> {
        // Insert-or-ignore over the unique composite key, then read back
        // whichever row won. A concurrent duplicate resolves to one row.
        sqlx::query(
            r#"
            INSERT INTO peak_valley_report
                (id, energy_type, factory_id, stat_date, peak_total, high_total,
                 flat_total, valley_total, total, unit_price_used, cost)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (factory_id, energy_type, stat_date) DO NOTHING
            "#,
        )
        .bind(&report.id)
        .bind(report.energy_type.label())
        .bind(&report.factory_id)
        .bind(report.stat_date)
        .bind(report.peak_total)
        .bind(report.high_total)
        .bind(report.flat_total)
        .bind(report.valley_total)
        .bind(report.total)
        .bind(report.unit_price_used)
        .bind(report.cost)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        self.find_report(&report.factory_id, report.energy_type, report.stat_date)
            .await?
            .ok_or_else(|| {
                EnergyError::Store("report missing immediately after insert".into())
            })
    }

    async fn find_report(
        &self,
        factory_id: &str,
        energy_type: EnergyType,
        stat_date: Date,
    ) -> Result<Option<Report>, EnergyError> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT * FROM peak_valley_report
            WHERE factory_id = $1 AND energy_type = $2 AND stat_date = $3
            "#,
        )
        .bind(factory_id)
        .bind(energy_type.label())
        .bind(stat_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(Report::try_from).transpose()
    }

    async fn find_reports(&self, stat_date: Date) -> Result<Vec<Report>, EnergyError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            "SELECT * FROM peak_valley_report WHERE stat_date = $1 ORDER BY factory_id",
        )
        .bind(stat_date)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Report::try_from).collect()
    }
}
