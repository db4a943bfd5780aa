//! Small in-memory archives shared by the unit tests.
//!
//! Instance PART-1-1 holds two quads: element 1 = [10, 11, 21, 20] and
//! element 2 = [12, 10, 20, 22], so node 10 is shared and node 11 is not.
//! Steps: "Step-1" frames [0.0, 0.5, 1.0], "Step-2" frames [0.0, 1.0].
//! With `k` the global frame counter (0..5), element-nodal MISES is
//! 3 + k (node 10, element 1), 5 + k (node 10, element 2), 7 + k (node 11).

use crate::archive::model::*;
use crate::archive::reader::JsonArchive;
use std::collections::BTreeMap;

pub const ELEMENT_1: [i64; 4] = [10, 11, 21, 20];
pub const ELEMENT_2: [i64; 4] = [12, 10, 20, 22];

pub fn two_element_archive() -> JsonArchive {
    JsonArchive::from_data("plate.odb", two_element_archive_data())
}

pub fn two_element_archive_data() -> ArchiveData {
    let mut node_sets = BTreeMap::new();
    node_sets.insert("TIP".to_string(), vec![member("PART-1-1", &[11, 10])]);
    node_sets.insert(
        "ALL".to_string(),
        vec![member("PART-1-1", &[22, 10, 11, 12, 20, 21])],
    );
    node_sets.insert(
        "MIXED".to_string(),
        vec![member("PART-1-1", &[10]), member("PART-2-1", &[5])],
    );
    node_sets.insert("ORPHAN".to_string(), vec![member("PART-1-1", &[10, 99])]);

    let mut element_sets = BTreeMap::new();
    element_sets.insert("BODY".to_string(), vec![member("PART-1-1", &[2, 1])]);

    let assembly = Assembly {
        instances: vec![part_one(), part_two()],
        node_sets,
        element_sets,
    };

    let step_frames: [(&str, &[f64]); 2] = [("Step-1", &[0.0, 0.5, 1.0]), ("Step-2", &[0.0, 1.0])];
    let mut steps = Vec::new();
    let mut k = 0usize;
    for (name, values) in step_frames {
        let mut frames = Vec::new();
        for value in values {
            frames.push(frame(*value, k as f64));
            k += 1;
        }
        steps.push(Step {
            name: name.to_string(),
            time_period: Some(1.0),
            frames,
            history_regions: BTreeMap::new(),
        });
    }
    steps[1]
        .history_regions
        .insert("ElementSet . ALL ELEMENTS".to_string(), j_integral_region());

    ArchiveData {
        name: "plate".to_string(),
        assembly,
        steps,
    }
}

pub fn member(instance: &str, labels: &[i64]) -> SetMember {
    SetMember {
        instance: instance.to_string(),
        labels: labels.to_vec(),
    }
}

fn part_one() -> Instance {
    let coords = [
        (10, [0.0, 0.0]),
        (11, [1.0, 0.0]),
        (12, [-1.0, 0.0]),
        (20, [0.0, 1.0]),
        (21, [1.0, 1.0]),
        (22, [-1.0, 1.0]),
    ];
    Instance {
        name: "PART-1-1".to_string(),
        nodes: coords
            .iter()
            .map(|(label, xy)| MeshNode {
                label: *label,
                coordinates: vec![xy[0], xy[1]],
            })
            .collect(),
        elements: vec![
            MeshElement {
                label: 1,
                element_type: "CPE4".to_string(),
                connectivity: ELEMENT_1.to_vec(),
            },
            MeshElement {
                label: 2,
                element_type: "CPE4".to_string(),
                connectivity: ELEMENT_2.to_vec(),
            },
        ],
    }
}

fn part_two() -> Instance {
    Instance {
        name: "PART-2-1".to_string(),
        nodes: vec![MeshNode {
            label: 5,
            coordinates: vec![4.0, 4.0],
        }],
        elements: Vec::new(),
    }
}

fn corner_mises(element: i64, node: i64, k: f64) -> f64 {
    match (element, node) {
        (1, 10) => 3.0 + k,
        (2, 10) => 5.0 + k,
        (1, 11) => 7.0 + k,
        _ => 100.0 + node as f64 + k,
    }
}

fn stress_value(position: Position, element: i64, node: Option<i64>, ip: Option<u32>, mises: f64) -> FieldValue {
    FieldValue {
        instance: "PART-1-1".to_string(),
        position,
        node_label: node,
        element_label: Some(element),
        integration_point: ip,
        data: Some(Payload::Vector(vec![mises, 0.0, 0.0, 0.0])),
        data_double: None,
        mises: Some(mises),
        press: Some(-mises / 3.0),
        inv3: Some(2.0 * mises),
    }
}

fn nodal_value(instance: &str, node: i64, data: Vec<f64>) -> FieldValue {
    FieldValue {
        instance: instance.to_string(),
        position: Position::Nodal,
        node_label: Some(node),
        element_label: None,
        integration_point: None,
        data: None,
        data_double: Some(Payload::Vector(data)),
        mises: None,
        press: None,
        inv3: None,
    }
}

fn frame(frame_value: f64, k: f64) -> Frame {
    let mut stress = Vec::new();
    let mut peeq = Vec::new();
    for (element, nodes) in [(1, ELEMENT_1), (2, ELEMENT_2)] {
        for node in nodes {
            let mises = corner_mises(element, node, k);
            stress.push(stress_value(Position::ElementNodal, element, Some(node), None, mises));
            let mut p = stress_value(Position::ElementNodal, element, Some(node), None, mises);
            p.data = Some(Payload::Scalar(mises / 100.0));
            peeq.push(p);
        }
        let base: f64 = if element == 1 { 1.0 } else { 10.0 };
        for ip in 1..=4u32 {
            let mises = base * ip as f64 + k;
            stress.push(stress_value(Position::IntegrationPoint, element, None, Some(ip), mises));
            let mut p = stress_value(Position::IntegrationPoint, element, None, Some(ip), mises);
            p.data = Some(Payload::Scalar(mises / 100.0));
            peeq.push(p);
        }
    }
    // same labels, other instance: must never reach PART-1-1 results
    stress.push(FieldValue {
        instance: "PART-2-1".to_string(),
        ..stress_value(Position::ElementNodal, 1, Some(5), None, 999.0)
    });

    let mut displacement = Vec::new();
    let mut reaction = Vec::new();
    let mut coords = Vec::new();
    for node in part_one().nodes {
        let label = node.label as f64;
        displacement.push(nodal_value("PART-1-1", node.label, vec![0.01 * label * k, -0.001 * label * k]));
        reaction.push(nodal_value("PART-1-1", node.label, vec![label * k, 2.0 * label * k]));
        coords.push(nodal_value(
            "PART-1-1",
            node.label,
            vec![node.coordinates[0] + 0.01 * label * k, node.coordinates[1]],
        ));
    }
    displacement.push(nodal_value("PART-2-1", 5, vec![42.0, 42.0]));
    // reversed archive order: extraction must not depend on it
    displacement.reverse();

    let volume = [(1, 1.0 + k), (2, 2.0 + k)]
        .into_iter()
        .map(|(element, v)| FieldValue {
            instance: "PART-1-1".to_string(),
            position: Position::WholeElement,
            node_label: None,
            element_label: Some(element),
            integration_point: None,
            data: Some(Payload::Scalar(v)),
            data_double: None,
            mises: None,
            press: None,
            inv3: None,
        })
        .collect();

    let mut field_outputs = BTreeMap::new();
    field_outputs.insert("S".to_string(), output(&["S11", "S22", "S33", "S12"], stress));
    field_outputs.insert("PEEQ".to_string(), output(&[], peeq));
    field_outputs.insert("U".to_string(), output(&["U1", "U2"], displacement));
    field_outputs.insert("RF".to_string(), output(&["RF1", "RF2"], reaction));
    field_outputs.insert("COORD".to_string(), output(&["COOR1", "COOR2"], coords));
    field_outputs.insert("EVOL".to_string(), output(&[], volume));

    Frame {
        frame_value,
        field_outputs,
    }
}

fn output(components: &[&str], values: Vec<FieldValue>) -> FieldOutput {
    FieldOutput {
        component_labels: components.iter().map(|c| c.to_string()).collect(),
        values,
    }
}

fn j_integral_region() -> HistoryRegion {
    let contour = |name: &str, scale: f64| HistoryOutput {
        name: name.to_string(),
        description: format!("J-integral: {}", name),
        data: vec![(1.0, 0.0), (1.5, scale), (2.0, 2.0 * scale)],
    };
    HistoryRegion {
        outputs: vec![
            contour("J at JINT_CRACK-1_Contour_1", 1.0),
            HistoryOutput {
                name: "ALLSE".to_string(),
                description: "Strain energy: ALLSE for Whole Model".to_string(),
                data: vec![(1.0, 0.0), (2.0, 9.0)],
            },
            contour("J at JINT_CRACK-1_Contour_2", 1.1),
            contour("J at JINT_CRACK-2_Contour_1", 5.0),
        ],
    }
}
