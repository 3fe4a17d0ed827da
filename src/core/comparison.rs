use crate::catalog::assemblies;
use crate::catalog::pricing::PriceBook;
use crate::catalog::systems;
use crate::core::takeoff::calculate_takeoff;
use crate::domain::estimate::{round2, SystemComparison};
use crate::domain::model::{RoofMeasurements, RoofSystemType};

/// 以同一組量測值估算多個屋面系統，並附上組合單價概算
pub fn compare_systems(
    m: &RoofMeasurements,
    systems: &[RoofSystemType],
    book: &PriceBook,
) -> Vec<SystemComparison> {
    systems
        .iter()
        .map(|&system| {
            let measurements = m.clone().with_system(system);
            let estimate = calculate_takeoff(&measurements, book);
            let bid = &estimate.bid_summary;
            let assembly = assemblies::for_system(system);

            tracing::debug!(
                "📊 {} total ${:.2} ({:.2}/sqft)",
                system,
                bid.total_estimate,
                bid.per_sqft
            );

            SystemComparison {
                roof_system_type: system,
                roof_system_name: systems::meta(system).display_name.to_string(),
                material_cost: round2(
                    bid.item_2_roofing_assembly_and_flashing.material_cost
                        + bid.item_3_mechanical_support.material_cost,
                ),
                total_estimate: bid.total_estimate,
                per_sqft: bid.per_sqft,
                assembly_key: assembly.map(|a| a.key.to_string()),
                budget_estimate: assembly
                    .map(|a| a.quick_estimate(measurements.total_roof_area_sqft).total_cost),
            }
        })
        .collect()
}

/// 總價最低的系統
pub fn cheapest(comparisons: &[SystemComparison]) -> Option<&SystemComparison> {
    comparisons
        .iter()
        .min_by(|a, b| a.total_estimate.total_cmp(&b.total_estimate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_all_systems() {
        let mut m = RoofMeasurements::new(10_000.0, 400.0);
        m.roof_drain_count = 4;
        m.mechanical_unit_count = 2;
        let book = PriceBook::builtin();

        let results = compare_systems(&m, &RoofSystemType::ALL, &book);

        assert_eq!(results.len(), 5);
        let sbs = &results[0];
        assert_eq!(sbs.roof_system_type, RoofSystemType::Sbs);
        assert!(sbs.assembly_key.is_none());
        assert!(sbs.budget_estimate.is_none());
        assert_eq!(sbs.total_estimate, calculate_takeoff(&m, &book).bid_summary.total_estimate);

        let tpo = results
            .iter()
            .find(|r| r.roof_system_type == RoofSystemType::TpoMechanicallyAttached)
            .unwrap();
        let assembly = assemblies::for_system(RoofSystemType::TpoMechanicallyAttached).unwrap();
        assert_eq!(tpo.assembly_key.as_deref(), Some(assembly.key));
        assert_eq!(
            tpo.budget_estimate,
            Some(assembly.quick_estimate(10_000.0).total_cost)
        );
        assert!(results.iter().all(|r| r.total_estimate > 0.0));
        assert!(cheapest(&results).is_some());
    }

    #[test]
    fn test_original_system_is_not_mutated() {
        let m = RoofMeasurements::new(5_000.0, 300.0);
        let results = compare_systems(&m, &[RoofSystemType::EpdmBallasted], &PriceBook::builtin());
        assert_eq!(m.roof_system_type, RoofSystemType::Sbs);
        assert_eq!(results[0].roof_system_type, RoofSystemType::EpdmBallasted);
        assert!(cheapest(&[]).is_none());
    }
}
