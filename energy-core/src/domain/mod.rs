pub mod meter;
pub mod reading;
pub mod report;

pub use meter::{CommProtocol, EnergyType, Meter, MeterStatus};
pub use reading::{QualityGrade, Reading};
pub use report::{AnomalyRecord, Report};
