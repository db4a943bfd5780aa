use crate::archive::{FrameRef, PhaseInfo, ResultArchive};
use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};

/// How a frame's completion marker is derived from its step and frame value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerRule {
    /// Zero-based step index plus frame value.
    #[default]
    StepIndex,
    /// Sum of preceding step durations plus frame value.
    TotalTime,
}

impl MarkerRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerRule::StepIndex => "step-index",
            MarkerRule::TotalTime => "total-time",
        }
    }
}

/// One accepted frame and where its row lands in the result table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSlot {
    pub row: usize,
    pub frame: FrameRef,
    pub marker: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FrameAxis {
    pub slots: Vec<FrameSlot>,
    /// Frames dropped because their marker did not advance.
    pub skipped: Vec<(FrameRef, f64)>,
}

impl FrameAxis {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn markers(&self) -> Vec<f64> {
        self.slots.iter().map(|s| s.marker).collect()
    }
}

/// Strictly increasing filter over markers; the first occurrence wins.
#[derive(Default)]
struct MarkerGate {
    last: Option<f64>,
}

impl MarkerGate {
    fn accept(&mut self, marker: f64) -> bool {
        match self.last {
            Some(last) if marker <= last => false,
            _ => {
                self.last = Some(marker);
                true
            }
        }
    }
}

/// Walks every frame of every step in archive order.
pub struct FrameSequencer<'a, A: ResultArchive> {
    archive: &'a A,
    rule: MarkerRule,
    phases: Vec<PhaseInfo>,
}

impl<'a, A: ResultArchive> FrameSequencer<'a, A> {
    pub fn new(archive: &'a A, rule: MarkerRule) -> Self {
        Self {
            archive,
            rule,
            phases: archive.phases(),
        }
    }

    /// Checks that `key` exists in the last frame of the last step.
    pub fn check_key(&self, key: &str) -> Result<()> {
        let defined = self
            .last_frame()
            .is_some_and(|frame| self.archive.has_field(frame, key));

        if defined {
            Ok(())
        } else {
            Err(ExtractError::KeyNotDefined {
                key: key.to_string(),
                archive: self.archive.name().to_string(),
            })
        }
    }

    /// Number of rows the result table needs.
    pub fn count_distinct(&self) -> usize {
        let mut gate = MarkerGate::default();
        self.raw_markers().filter(|(_, marker)| gate.accept(*marker)).count()
    }

    /// The full, deduplicated frame axis.
    pub fn axis(&self) -> FrameAxis {
        let mut gate = MarkerGate::default();
        let mut axis = FrameAxis::default();

        for (frame, marker) in self.raw_markers() {
            if gate.accept(marker) {
                axis.slots.push(FrameSlot {
                    row: axis.slots.len(),
                    frame,
                    marker,
                });
            } else {
                tracing::debug!(
                    step = frame.step,
                    frame = frame.frame,
                    marker,
                    "skipping frame with repeated marker"
                );
                axis.skipped.push((frame, marker));
            }
        }

        if !axis.skipped.is_empty() {
            tracing::info!(skipped = axis.skipped.len(), "dropped frames with repeated markers");
        }

        axis
    }

    /// A one-row axis holding the first frame of the first step at marker 0.0.
    pub fn first_frame(&self, key: &str) -> Result<FrameAxis> {
        let frame = FrameRef { step: 0, frame: 0 };
        let present = self
            .phases
            .first()
            .is_some_and(|p| !p.frame_values.is_empty());

        if !present || !self.archive.has_field(frame, key) {
            return Err(ExtractError::KeyNotDefined {
                key: key.to_string(),
                archive: self.archive.name().to_string(),
            });
        }

        Ok(FrameAxis {
            slots: vec![FrameSlot {
                row: 0,
                frame,
                marker: 0.0,
            }],
            skipped: Vec::new(),
        })
    }

    fn last_frame(&self) -> Option<FrameRef> {
        let step = self.phases.len().checked_sub(1)?;
        let frame = self.phases[step].frame_values.len().checked_sub(1)?;
        Some(FrameRef { step, frame })
    }

    fn raw_markers(&self) -> impl Iterator<Item = (FrameRef, f64)> + '_ {
        let offsets = self.step_offsets();
        self.phases.iter().enumerate().flat_map(move |(step, phase)| {
            let offset = offsets[step];
            phase
                .frame_values
                .iter()
                .enumerate()
                .map(move |(frame, value)| (FrameRef { step, frame }, offset + value))
        })
    }

    fn step_offsets(&self) -> Vec<f64> {
        match self.rule {
            MarkerRule::StepIndex => (0..self.phases.len()).map(|i| i as f64).collect(),
            MarkerRule::TotalTime => {
                let mut elapsed = 0.0;
                self.phases
                    .iter()
                    .map(|phase| {
                        let offset = elapsed;
                        elapsed += phase
                            .time_period
                            .or_else(|| phase.frame_values.last().copied())
                            .unwrap_or(0.0);
                        offset
                    })
                    .collect()
            }
        }
    }
}
