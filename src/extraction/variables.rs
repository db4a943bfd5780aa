use crate::archive::{FieldValue, Position, SetKind};
use crate::error::{ExtractError, Result};
use std::fmt;
use std::str::FromStr;

/// Quantities the extractor knows how to locate in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    EquivalentPlasticStrain,
    VonMises,
    Pressure,
    ThirdInvariant,
    Coordinates,
    Displacement,
    ReactionForce,
    ElementVolume,
}

/// Physical nature of a quantity, which fixes how it may be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Computed at integration points, discontinuous across elements.
    IntegrationPoint,
    /// Single-valued per node in the archive.
    Nodal,
    /// Belongs to the element as a whole.
    ElementIntrinsic,
}

/// Where in a stored value the number lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    Data,
    Mises,
    Press,
    Inv3,
}

impl PayloadField {
    pub fn select<'a>(&self, value: &'a FieldValue) -> Option<&'a [f64]> {
        match self {
            PayloadField::Data => value.payload(),
            PayloadField::Mises => value.mises.as_ref().map(std::slice::from_ref),
            PayloadField::Press => value.press.as_ref().map(std::slice::from_ref),
            PayloadField::Inv3 => value.inv3.as_ref().map(std::slice::from_ref),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadField::Data => "data",
            PayloadField::Mises => "mises",
            PayloadField::Press => "press",
            PayloadField::Inv3 => "inv3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantitySpec {
    pub quantity: Quantity,
    /// Name used in file names and on the command line.
    pub name: &'static str,
    /// Field output key the value is filed under.
    pub key: &'static str,
    pub field: PayloadField,
    pub category: Category,
}

static QUANTITIES: [QuantitySpec; 8] = [
    QuantitySpec {
        quantity: Quantity::EquivalentPlasticStrain,
        name: "PEEQ",
        key: "PEEQ",
        field: PayloadField::Data,
        category: Category::IntegrationPoint,
    },
    QuantitySpec {
        quantity: Quantity::VonMises,
        name: "MISES",
        key: "S",
        field: PayloadField::Mises,
        category: Category::IntegrationPoint,
    },
    QuantitySpec {
        quantity: Quantity::Pressure,
        name: "PRESS",
        key: "S",
        field: PayloadField::Press,
        category: Category::IntegrationPoint,
    },
    QuantitySpec {
        quantity: Quantity::ThirdInvariant,
        name: "INV3",
        key: "S",
        field: PayloadField::Inv3,
        category: Category::IntegrationPoint,
    },
    QuantitySpec {
        quantity: Quantity::Coordinates,
        name: "COORD",
        key: "COORD",
        field: PayloadField::Data,
        category: Category::Nodal,
    },
    QuantitySpec {
        quantity: Quantity::Displacement,
        name: "U",
        key: "U",
        field: PayloadField::Data,
        category: Category::Nodal,
    },
    QuantitySpec {
        quantity: Quantity::ReactionForce,
        name: "RF",
        key: "RF",
        field: PayloadField::Data,
        category: Category::Nodal,
    },
    QuantitySpec {
        quantity: Quantity::ElementVolume,
        name: "EVOL",
        key: "EVOL",
        field: PayloadField::Data,
        category: Category::ElementIntrinsic,
    },
];

/// Looks a quantity up by its user-facing name. Case-insensitive.
pub fn lookup(name: &str) -> Result<&'static QuantitySpec> {
    let upper = name.trim().to_uppercase();
    let canonical = match upper.as_str() {
        "PRESSURE" => "PRESS",
        "COORDINATES" => "COORD",
        "VOLUME" => "EVOL",
        other => other,
    };

    QUANTITIES
        .iter()
        .find(|q| q.name == canonical)
        .ok_or(ExtractError::UnsupportedQuantity {
            name: name.to_string(),
        })
}

pub fn supported_quantities() -> impl Iterator<Item = &'static QuantitySpec> {
    QUANTITIES.iter()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Element-nodal samples averaged per node of a node set.
    NodalAverage,
    /// Integration point samples averaged per element of an element set.
    ElementAverage,
    /// Every element-corner value of an element set, unaveraged.
    NodalExtrapolated,
    /// Values already single-valued per node.
    Nodal,
    /// Whole-element values from the first frame only.
    InitialElement,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::NodalAverage => "nodal-average",
            ExtractionMode::ElementAverage => "element-average",
            ExtractionMode::NodalExtrapolated => "nodal-extrapolated",
            ExtractionMode::Nodal => "nodal",
            ExtractionMode::InitialElement => "initial-element",
        }
    }

    pub fn set_kind(&self) -> SetKind {
        match self {
            ExtractionMode::NodalAverage | ExtractionMode::Nodal => SetKind::Node,
            ExtractionMode::ElementAverage
            | ExtractionMode::NodalExtrapolated
            | ExtractionMode::InitialElement => SetKind::Element,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            ExtractionMode::NodalAverage | ExtractionMode::NodalExtrapolated => {
                Some(Position::ElementNodal)
            }
            ExtractionMode::ElementAverage => Some(Position::IntegrationPoint),
            ExtractionMode::Nodal | ExtractionMode::InitialElement => None,
        }
    }

    pub fn needs_connectivity(&self) -> bool {
        matches!(self, ExtractionMode::NodalExtrapolated)
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMode {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nodal-average" | "nodal_average" => Ok(ExtractionMode::NodalAverage),
            "element-average" | "element_average" => Ok(ExtractionMode::ElementAverage),
            "nodal-extrapolated" | "nodal_extrapolated" => Ok(ExtractionMode::NodalExtrapolated),
            "nodal" => Ok(ExtractionMode::Nodal),
            "initial-element" | "initial_element" | "element" => {
                Ok(ExtractionMode::InitialElement)
            }
            _ => Err(ExtractError::UnknownMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl QuantitySpec {
    pub fn default_mode(&self) -> ExtractionMode {
        match self.category {
            Category::IntegrationPoint => ExtractionMode::NodalAverage,
            Category::Nodal => ExtractionMode::Nodal,
            Category::ElementIntrinsic => ExtractionMode::InitialElement,
        }
    }

    /// Resolves the requested mode against what the quantity allows.
    pub fn mode(&self, requested: Option<ExtractionMode>) -> Result<ExtractionMode> {
        let mode = requested.unwrap_or_else(|| self.default_mode());

        let allowed = match self.category {
            Category::IntegrationPoint => matches!(
                mode,
                ExtractionMode::NodalAverage
                    | ExtractionMode::ElementAverage
                    | ExtractionMode::NodalExtrapolated
            ),
            Category::Nodal => mode == ExtractionMode::Nodal,
            Category::ElementIntrinsic => mode == ExtractionMode::InitialElement,
        };

        if allowed {
            Ok(mode)
        } else {
            Err(ExtractError::IncompatibleMode {
                mode: mode.to_string(),
                quantity: self.name.to_string(),
            })
        }
    }

    pub fn is_vector(&self) -> bool {
        self.category == Category::Nodal
    }
}
