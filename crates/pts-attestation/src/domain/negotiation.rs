//! Selection policies for the capability exchange.
//!
//! Both negotiations follow the same rule: take the intersection of what the
//! responder supports and what the verifier offered, then pick the strongest
//! member under the fixed strength ordering. An empty intersection yields
//! `None` and the caller answers with the matching PA-TNC error attribute.

use super::entities::{DhGroup, DhGroupSet, MeasAlgorithmSet, MeasurementAlgorithm};

/// Picks the strongest measurement algorithm present in both sets
/// (SHA384 > SHA256 > SHA1).
pub fn select_measurement_algorithm(
    supported: MeasAlgorithmSet,
    offered: MeasAlgorithmSet,
) -> Option<MeasurementAlgorithm> {
    MeasurementAlgorithm::STRONGEST_FIRST
        .into_iter()
        .find(|&a| supported.contains(a) && offered.contains(a))
}

/// Picks the strongest DH group present in both sets
/// (IKE20 > IKE19 > IKE14 > IKE5 > IKE2).
pub fn select_dh_group(supported: DhGroupSet, offered: DhGroupSet) -> Option<DhGroup> {
    DhGroup::STRONGEST_FIRST
        .into_iter()
        .find(|&g| supported.contains(g) && offered.contains(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_strongest_common_algorithm() {
        let supported =
            MeasAlgorithmSet::of(&[MeasurementAlgorithm::Sha1, MeasurementAlgorithm::Sha256]);
        let offered = MeasAlgorithmSet::of(&[
            MeasurementAlgorithm::Sha1,
            MeasurementAlgorithm::Sha256,
            MeasurementAlgorithm::Sha384,
        ]);

        assert_eq!(
            select_measurement_algorithm(supported, offered),
            Some(MeasurementAlgorithm::Sha256)
        );
    }

    #[test]
    fn test_empty_intersection_selects_nothing() {
        let supported = MeasAlgorithmSet::only(MeasurementAlgorithm::Sha256);
        let offered = MeasAlgorithmSet::only(MeasurementAlgorithm::Sha1);

        assert_eq!(select_measurement_algorithm(supported, offered), None);
    }

    #[test]
    fn test_selection_ignores_unsupported_stronger_offer() {
        let supported = MeasAlgorithmSet::only(MeasurementAlgorithm::Sha1);
        let offered =
            MeasAlgorithmSet::of(&[MeasurementAlgorithm::Sha1, MeasurementAlgorithm::Sha384]);

        assert_eq!(
            select_measurement_algorithm(supported, offered),
            Some(MeasurementAlgorithm::Sha1)
        );
    }

    #[test]
    fn test_selects_strongest_common_dh_group() {
        let supported = DhGroupSet::of(&[DhGroup::Ike2, DhGroup::Ike14, DhGroup::Ike19]);
        let offered = DhGroupSet::of(&[DhGroup::Ike14, DhGroup::Ike19, DhGroup::Ike20]);

        assert_eq!(select_dh_group(supported, offered), Some(DhGroup::Ike19));
    }

    #[test]
    fn test_no_common_dh_group() {
        let supported = DhGroupSet::only(DhGroup::Ike20);
        let offered = DhGroupSet::only(DhGroup::Ike2);

        assert_eq!(select_dh_group(supported, offered), None);
    }
}
