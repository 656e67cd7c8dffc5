use time::Date;

use crate::domain::EnergyType;

#[derive(thiserror::Error, Debug)]
pub enum EnergyError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("no readings for factory {factory_id}, {energy_type} on {stat_date}")]
    NoData {
        factory_id: String,
        energy_type: EnergyType,
        stat_date: Date,
    },
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("store error: {0}")]
    Store(String),
}
