use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Energy carrier measured by a meter. Labels match the upstream data feed,
/// which reports types in Chinese.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyType {
    #[serde(rename = "水")]
    Water,
    #[serde(rename = "蒸汽")]
    Steam,
    #[serde(rename = "天然气")]
    Gas,
}

impl EnergyType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Water => "水",
            Self::Steam => "蒸汽",
            Self::Gas => "天然气",
        }
    }

    /// Measurement unit recorded on readings of this type.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Water | Self::Gas => "m³",
            Self::Steam => "t",
        }
    }

    pub fn parse_label(label: &str) -> Option<Self> {
        match label {
            "水" => Some(Self::Water),
            "蒸汽" => Some(Self::Steam),
            "天然气" => Some(Self::Gas),
            _ => None,
        }
    }
}

impl fmt::Display for EnergyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnergyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s).ok_or_else(|| format!("unknown energy type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterStatus {
    #[serde(rename = "正常")]
    Normal,
    #[serde(rename = "故障")]
    Faulty,
}

impl MeterStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "正常",
            Self::Faulty => "故障",
        }
    }

    pub fn parse_label(label: &str) -> Option<Self> {
        match label {
            "正常" => Some(Self::Normal),
            "故障" => Some(Self::Faulty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommProtocol {
    #[serde(rename = "RS485")]
    Rs485,
    #[serde(rename = "Lora")]
    Lora,
}

impl CommProtocol {
    pub fn label(self) -> &'static str {
        match self {
            Self::Rs485 => "RS485",
            Self::Lora => "Lora",
        }
    }

    pub fn parse_label(label: &str) -> Option<Self> {
        match label {
            "RS485" => Some(Self::Rs485),
            "Lora" => Some(Self::Lora),
            _ => None,
        }
    }
}

/// A metering device installed in a factory area. Owns its readings: deleting
/// a meter removes them as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meter {
    pub id: String,
    pub factory_id: String,
    pub energy_type: EnergyType,
    pub status: MeterStatus,
    pub install_location: String,
    pub pipe_spec: Option<String>,
    pub comm_protocol: CommProtocol,
    pub calib_cycle_months: i32,
    pub manufacturer: Option<String>,
    pub created_at: OffsetDateTime,
}
