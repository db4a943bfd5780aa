use crate::error::{ExtractError, Result};
use crate::extraction::assembler::ResultArray;
use crate::extraction::sets::EntityKey;
use crate::extraction::variables::ExtractionMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw value as it came out of the archive, already keyed to its entity.
#[derive(Debug, Clone, Copy)]
pub struct RawSample<'a> {
    pub key: EntityKey,
    pub values: &'a [f64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Arithmetic mean of every sample of the entity.
    Mean,
    /// The entity's single sample, unchanged.
    Identity,
}

impl From<ExtractionMode> for Aggregation {
    fn from(mode: ExtractionMode) -> Self {
        match mode {
            ExtractionMode::NodalAverage | ExtractionMode::ElementAverage => Aggregation::Mean,
            ExtractionMode::NodalExtrapolated
            | ExtractionMode::Nodal
            | ExtractionMode::InitialElement => Aggregation::Identity,
        }
    }
}

/// Collapse of the entity axis into a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    Sum,
    Mean,
}

impl Reduction {
    /// Prefix for the component labels of a reduced table.
    pub fn prefix(&self) -> &'static str {
        match self {
            Reduction::Sum => "summed",
            Reduction::Mean => "mean",
        }
    }
}

struct Accumulator {
    sums: Vec<f64>,
    count: usize,
}

/// Groups raw samples by entity and reduces each group to one value per
/// component.
pub struct AveragingEngine {
    aggregation: Aggregation,
    components: usize,
    source: String,
}

impl AveragingEngine {
    pub fn new(aggregation: Aggregation, components: usize) -> Self {
        Self {
            aggregation,
            components,
            source: String::new(),
        }
    }

    /// Archive name reported when a sample is malformed.
    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = source.into();
        self
    }

    pub fn aggregate<'a, I>(&self, samples: I) -> Result<HashMap<EntityKey, Vec<f64>>>
    where
        I: IntoIterator<Item = RawSample<'a>>,
    {
        let mut groups: HashMap<EntityKey, Accumulator> = HashMap::new();

        for sample in samples {
            if sample.values.len() < self.components {
                return Err(ExtractError::Archive {
                    archive: self.source.clone(),
                    message: format!(
                        "value at {} has {} components, expected {}",
                        sample.key,
                        sample.values.len(),
                        self.components
                    ),
                });
            }

            let values = &sample.values[..self.components];
            match groups.get_mut(&sample.key) {
                Some(group) => match self.aggregation {
                    Aggregation::Mean => {
                        for (sum, v) in group.sums.iter_mut().zip(values) {
                            *sum += v;
                        }
                        group.count += 1;
                    }
                    Aggregation::Identity => {
                        tracing::debug!(entity = %sample.key, "ignoring repeated sample");
                    }
                },
                None => {
                    groups.insert(
                        sample.key,
                        Accumulator {
                            sums: values.to_vec(),
                            count: 1,
                        },
                    );
                }
            }
        }

        Ok(groups
            .into_iter()
            .map(|(key, group)| {
                let count = group.count as f64;
                let values = match self.aggregation {
                    Aggregation::Mean => group.sums.into_iter().map(|s| s / count).collect(),
                    Aggregation::Identity => group.sums,
                };
                (key, values)
            })
            .collect())
    }
}

/// Collapses the entity axis of `array`, per frame and per component.
pub fn reduce_across_set(array: &ResultArray, reduction: Reduction) -> ResultArray {
    let (frames, entities, components) = array.shape();
    let mut reduced = ResultArray::zeros(frames, 1, components);

    for frame in 0..frames {
        for component in 0..components {
            let sum: f64 = (0..entities).map(|e| array.get(frame, e, component)).sum();
            let value = match reduction {
                Reduction::Sum => sum,
                Reduction::Mean if entities > 0 => sum / entities as f64,
                Reduction::Mean => 0.0,
            };
            reduced.set(frame, 0, component, value);
        }
    }

    reduced
}
