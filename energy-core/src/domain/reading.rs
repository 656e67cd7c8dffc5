use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Data quality of a collected reading. Variants are declared worst-to-best
/// so the derived ordering matches the quality ordering
/// (excellent > good > fair > poor).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum QualityGrade {
    #[serde(rename = "差")]
    Poor,
    #[serde(rename = "中")]
    Fair,
    #[serde(rename = "良")]
    Good,
    #[serde(rename = "优")]
    Excellent,
}

impl QualityGrade {
    pub fn label(self) -> &'static str {
        match self {
            Self::Poor => "差",
            Self::Fair => "中",
            Self::Good => "良",
            Self::Excellent => "优",
        }
    }

    pub fn parse_label(label: &str) -> Option<Self> {
        match label {
            "差" => Some(Self::Poor),
            "中" => Some(Self::Fair),
            "良" => Some(Self::Good),
            "优" => Some(Self::Excellent),
            _ => None,
        }
    }

    /// High-grade readings are trusted without manual confirmation.
    pub fn auto_verified(self) -> bool {
        self >= Self::Good
    }
}

/// A single timestamped measurement from a meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub meter_id: String,
    pub collected_at: OffsetDateTime,
    pub value: f64,
    pub unit: String,
    pub quality_grade: QualityGrade,
    pub factory_id: String,
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_ordering_is_worst_to_best() {
        assert!(QualityGrade::Poor < QualityGrade::Fair);
        assert!(QualityGrade::Fair < QualityGrade::Good);
        assert!(QualityGrade::Good < QualityGrade::Excellent);
    }

    #[test]
    fn only_high_grades_auto_verify() {
        assert!(QualityGrade::Excellent.auto_verified());
        assert!(QualityGrade::Good.auto_verified());
        assert!(!QualityGrade::Fair.auto_verified());
        assert!(!QualityGrade::Poor.auto_verified());
    }
}
