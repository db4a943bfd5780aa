use crate::archive::model::{HistoryOutput, HistoryRegion};
use crate::archive::{ArchiveHandle, ResultArchive};
use crate::error::{ExtractError, Result};
use std::path::Path;

pub const J_INTEGRAL: &str = "J-integral";

/// Regions searched for contour integrals, in order.
pub const CRACK_REGIONS: [&str; 2] = ["ElementSet . PIBATCH", "ElementSet . ALL ELEMENTS"];

/// J-integral contours of one crack over one step.
#[derive(Debug, Clone, PartialEq)]
pub struct CrackHistory {
    pub step: String,
    pub crack: String,
    pub markers: Vec<f64>,
    /// e.g. `Contour_2`
    pub contour_labels: Vec<String>,
    /// e.g. `2`
    pub contour_numbers: Vec<String>,
    /// One row per marker, one column per contour.
    pub rows: Vec<Vec<f64>>,
}

impl CrackHistory {
    pub fn contour_count(&self) -> usize {
        self.contour_labels.len()
    }
}

pub fn fetch_j_integral<P: AsRef<Path>>(archive: P, step: &str, crack: &str) -> Result<CrackHistory> {
    let archive = ArchiveHandle::open(archive)?;
    fetch_j_integral_from(&*archive, step, crack)
}

pub fn fetch_j_integral_from<A: ResultArchive>(
    archive: &A,
    step: &str,
    crack: &str,
) -> Result<CrackHistory> {
    let crack = crack.trim().to_uppercase();
    let step_index = archive
        .step_index(step)
        .ok_or_else(|| ExtractError::StepNotFound {
            step: step.to_string(),
            archive: archive.name().to_string(),
        })?;

    let region = crack_region(archive, step_index).ok_or_else(|| {
        ExtractError::HistoryRegionNotFound {
            step: step.to_string(),
            tried: CRACK_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    })?;

    let contours: Vec<&HistoryOutput> = region
        .outputs
        .iter()
        .filter(|o| o.description.contains(J_INTEGRAL) && o.name.contains(&crack))
        .collect();

    let Some(first) = contours.first() else {
        return Err(ExtractError::CrackNotFound { crack });
    };
    let markers: Vec<f64> = first.data.iter().map(|(marker, _)| *marker).collect();

    let mut contour_labels = Vec::with_capacity(contours.len());
    let mut contour_numbers = Vec::with_capacity(contours.len());
    for contour in &contours {
        if contour.data.len() != markers.len() {
            tracing::warn!(
                contour = %contour.name,
                expected = markers.len(),
                found = contour.data.len(),
                "contour length differs from the first contour; missing values are written as 0.0"
            );
        }
        let (label, number) = contour_name(&contour.name);
        contour_labels.push(label);
        contour_numbers.push(number);
    }

    let rows = (0..markers.len())
        .map(|i| {
            contours
                .iter()
                .map(|c| c.data.get(i).map_or(0.0, |(_, value)| *value))
                .collect()
        })
        .collect();

    tracing::debug!(
        step,
        crack = %crack,
        contours = contours.len(),
        frames = markers.len(),
        "collected J-integral history"
    );

    Ok(CrackHistory {
        step: step.to_string(),
        crack,
        markers,
        contour_labels,
        contour_numbers,
        rows,
    })
}

fn crack_region<A: ResultArchive>(archive: &A, step: usize) -> Option<&HistoryRegion> {
    CRACK_REGIONS
        .iter()
        .find_map(|name| archive.history_region(step, name))
}

/// Splits `J at JINT_CRACK-1_Contour_3` into (`Contour_3`, `3`).
fn contour_name(name: &str) -> (String, String) {
    let parts: Vec<&str> = name.split('_').collect();
    let number = parts.last().copied().unwrap_or_default().to_string();
    let label = match parts.len() {
        0 | 1 => number.clone(),
        n => format!("{}_{}", parts[n - 2], parts[n - 1]),
    };
    (label, number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures;

    #[test]
    fn test_contours_of_one_crack() {
        let archive = fixtures::two_element_archive();
        let history = fetch_j_integral_from(&archive, "Step-2", "crack-1").unwrap();

        assert_eq!(history.crack, "CRACK-1");
        assert_eq!(history.markers, vec![1.0, 1.5, 2.0]);
        assert_eq!(history.contour_labels, vec!["Contour_1", "Contour_2"]);
        assert_eq!(history.contour_numbers, vec!["1", "2"]);
        assert_eq!(history.rows[0], vec![0.0, 0.0]);
        assert_eq!(history.rows[2], vec![2.0, 2.2]);
    }

    #[test]
    fn test_other_outputs_are_not_contours() {
        let archive = fixtures::two_element_archive();
        let history = fetch_j_integral_from(&archive, "Step-2", "CRACK-2").unwrap();
        assert_eq!(history.contour_count(), 1);
        assert_eq!(history.rows[1], vec![5.0]);
    }

    #[test]
    fn test_history_errors() {
        let archive = fixtures::two_element_archive();

        assert!(matches!(
            fetch_j_integral_from(&archive, "Step-9", "CRACK-1"),
            Err(ExtractError::StepNotFound { .. })
        ));
        assert!(matches!(
            fetch_j_integral_from(&archive, "Step-1", "CRACK-1"),
            Err(ExtractError::HistoryRegionNotFound { .. })
        ));
        assert!(matches!(
            fetch_j_integral_from(&archive, "Step-2", "CRACK-7"),
            Err(ExtractError::CrackNotFound { .. })
        ));
    }

    #[test]
    fn test_preferred_region_wins() {
        let mut data = fixtures::two_element_archive_data();
        let mut preferred = data.steps[1].history_regions["ElementSet . ALL ELEMENTS"].clone();
        preferred.outputs.retain(|o| o.name.ends_with("Contour_2"));
        data.steps[1]
            .history_regions
            .insert("ElementSet . PIBATCH".to_string(), preferred);
        let archive = crate::archive::JsonArchive::from_data("plate.odb", data);

        let history = fetch_j_integral_from(&archive, "Step-2", "CRACK-1").unwrap();
        assert_eq!(history.contour_labels, vec!["Contour_2"]);
    }

    #[test]
    fn test_short_contour_is_padded_to_first_contour() {
        let mut data = fixtures::two_element_archive_data();
        let region = data.steps[1]
            .history_regions
            .get_mut("ElementSet . ALL ELEMENTS")
            .unwrap();
        for output in &mut region.outputs {
            if output.name.ends_with("CRACK-1_Contour_2") {
                output.data.truncate(2);
            }
        }
        let archive = crate::archive::JsonArchive::from_data("plate.odb", data);

        let history = fetch_j_integral_from(&archive, "Step-2", "CRACK-1").unwrap();
        assert_eq!(history.markers, vec![1.0, 1.5, 2.0]);
        assert_eq!(history.rows[1], vec![1.0, 1.1]);
        assert_eq!(history.rows[2], vec![2.0, 0.0]);
    }

    #[test]
    fn test_contour_name_split() {
        assert_eq!(
            contour_name("J at JINT_CRACK-1_Contour_12"),
            ("Contour_12".to_string(), "12".to_string())
        );
        assert_eq!(contour_name("J"), ("J".to_string(), "J".to_string()));
    }
}
