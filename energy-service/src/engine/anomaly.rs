//! Cross-factory high-consumption detection.

use std::collections::HashMap;

use energy_core::domain::{AnomalyRecord, EnergyType, Report};
use energy_core::round2;

/// Default exceedance threshold, in percent over the group average.
pub const DEFAULT_THRESHOLD_PCT: f64 = 30.0;

/// Flag every report whose `total` exceeds its energy-type group average by
/// more than `threshold_pct` percent. Comparisons never cross energy types.
///
/// Groups with a mean of zero (or below) are skipped before any division: no
/// total can exceed a non-positive mean by a ratio, and skipping keeps the
/// arithmetic well-defined.
pub fn flag_high_consumers(reports: &[Report], threshold_pct: f64) -> Vec<AnomalyRecord> {
    let mut groups: HashMap<EnergyType, Vec<&Report>> = HashMap::new();
    for report in reports {
        groups.entry(report.energy_type).or_default().push(report);
    }

    let mut flagged = Vec::new();
    for group in groups.values() {
        let mean = group.iter().map(|r| r.total).sum::<f64>() / group.len() as f64;
        if mean <= 0.0 {
            continue;
        }
        let cutoff = mean * (1.0 + threshold_pct / 100.0);
        for report in group {
            if report.total > cutoff {
                flagged.push(AnomalyRecord {
                    factory_id: report.factory_id.clone(),
                    energy_type: report.energy_type,
                    total: report.total,
                    group_avg: round2(mean),
                    exceed_rate: round2((report.total - mean) / mean * 100.0),
                });
            }
        }
    }

    flagged.sort_by(|a, b| {
        a.energy_type
            .label()
            .cmp(b.energy_type.label())
            .then_with(|| a.factory_id.cmp(&b.factory_id))
    });
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn report(factory_id: &str, energy_type: EnergyType, total: f64) -> Report {
        Report {
            id: format!("peak_{factory_id}"),
            energy_type,
            factory_id: factory_id.to_string(),
            stat_date: date!(2025 - 03 - 01),
            peak_total: total,
            high_total: 0.0,
            flat_total: 0.0,
            valley_total: 0.0,
            total,
            unit_price_used: 1.2,
            cost: total * 1.2,
        }
    }

    #[test]
    fn flags_only_factories_over_the_cutoff() {
        let reports = vec![
            report("F001", EnergyType::Water, 100.0),
            report("F002", EnergyType::Water, 100.0),
            report("F003", EnergyType::Water, 400.0),
        ];
        // mean 200, 30% threshold -> cutoff 260
        let flagged = flag_high_consumers(&reports, 30.0);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].factory_id, "F003");
        assert_eq!(flagged[0].total, 400.0);
        assert_eq!(flagged[0].group_avg, 200.0);
        assert_eq!(flagged[0].exceed_rate, 100.0);
    }

    #[test]
    fn grouping_never_crosses_energy_types() {
        // The lone steam factory dwarfs the water group but is average within
        // its own (single-member) group.
        let reports = vec![
            report("F001", EnergyType::Water, 10.0),
            report("F002", EnergyType::Water, 10.0),
            report("F003", EnergyType::Steam, 5000.0),
        ];
        assert!(flag_high_consumers(&reports, 30.0).is_empty());
    }

    #[test]
    fn zero_mean_groups_flag_nothing() {
        let reports = vec![
            report("F001", EnergyType::Gas, 0.0),
            report("F002", EnergyType::Gas, 0.0),
        ];
        assert!(flag_high_consumers(&reports, 30.0).is_empty());
    }

    #[test]
    fn exactly_at_cutoff_is_not_flagged() {
        let reports = vec![
            report("F001", EnergyType::Water, 100.0),
            report("F002", EnergyType::Water, 100.0),
            report("F003", EnergyType::Water, 160.0),
        ];
        // mean 120, cutoff 156 -> F003 flagged at 160
        let flagged = flag_high_consumers(&reports, 30.0);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].exceed_rate, 33.33);

        // Raising the threshold so the cutoff lands exactly on the total
        // must not flag it (strict exceedance).
        let reports = vec![
            report("F001", EnergyType::Water, 100.0),
            report("F002", EnergyType::Water, 130.0),
        ];
        // mean 115, threshold ~13.0435% -> cutoff 130 exactly; no flag at 13.05
        assert!(flag_high_consumers(&reports, 13.05).is_empty());
    }

    #[test]
    fn results_are_sorted_and_complete() {
        let reports = vec![
            report("F009", EnergyType::Water, 400.0),
            report("F001", EnergyType::Water, 400.0),
            report("F002", EnergyType::Water, 10.0),
            report("F003", EnergyType::Water, 10.0),
        ];
        let flagged = flag_high_consumers(&reports, 30.0);
        let ids: Vec<&str> = flagged.iter().map(|a| a.factory_id.as_str()).collect();
        assert_eq!(ids, ["F001", "F009"]);
    }
}
