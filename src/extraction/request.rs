use crate::archive::{ArchiveHandle, FieldValue, ResultArchive, SetKind};
use crate::error::{ExtractError, Result};
use crate::extraction::assembler::{ResultArray, ResultArrayAssembler};
use crate::extraction::averaging::{reduce_across_set, Aggregation, AveragingEngine, RawSample, Reduction};
use crate::extraction::frames::{FrameAxis, FrameSequencer, MarkerRule};
use crate::extraction::sets::{EntityKey, EntitySetResolver, ResolvedSet};
use crate::extraction::variables::{self, Category, ExtractionMode, QuantitySpec};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Everything needed to run one field extraction. Validated on construction,
/// never mutated by the extractor.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub archive: PathBuf,
    pub set: String,
    pub quantity: &'static QuantitySpec,
    pub mode: ExtractionMode,
    pub reduction: Option<Reduction>,
}

impl ExtractionRequest {
    pub fn new<P: Into<PathBuf>>(archive: P, set: &str, quantity: &str) -> Result<Self> {
        let quantity = variables::lookup(quantity)?;
        Ok(Self {
            archive: archive.into(),
            set: set.trim().to_uppercase(),
            quantity,
            mode: quantity.default_mode(),
            reduction: None,
        })
    }

    pub fn with_mode(mut self, mode: Option<ExtractionMode>) -> Result<Self> {
        self.mode = self.quantity.mode(mode)?;
        Ok(self)
    }

    pub fn with_reduction(mut self, reduction: Option<Reduction>) -> Result<Self> {
        if let Some(reduction) = reduction {
            if self.quantity.category != Category::Nodal {
                return Err(ExtractError::IncompatibleMode {
                    mode: reduction.prefix().to_string(),
                    quantity: self.quantity.name.to_string(),
                });
            }
        }
        self.reduction = reduction;
        Ok(self)
    }

    pub fn set_kind(&self) -> SetKind {
        self.mode.set_kind()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionOptions {
    pub marker_rule: MarkerRule,
    pub require_single_instance: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            marker_rule: MarkerRule::StepIndex,
            require_single_instance: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub frames_processed: usize,
    pub total_frames: usize,
    pub current_marker: Option<f64>,
    pub start_time: Instant,
}

impl ExtractionProgress {
    pub fn new(total_frames: usize) -> Self {
        Self {
            frames_processed: 0,
            total_frames,
            current_marker: None,
            start_time: Instant::now(),
        }
    }

    pub fn update_frame(&mut self, marker: f64) {
        self.frames_processed += 1;
        self.current_marker = Some(marker);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn estimated_remaining(&self) -> Duration {
        if self.frames_processed == 0 {
            return Duration::from_secs(0);
        }

        let rate = self.frames_processed as f64 / self.elapsed().as_secs_f64();
        let remaining = self.total_frames.saturating_sub(self.frames_processed);

        if rate > 0.0 && rate.is_finite() {
            Duration::from_secs_f64(remaining as f64 / rate)
        } else {
            Duration::from_secs(0)
        }
    }
}

/// Result of a field extraction, ready for export.
#[derive(Debug, Clone)]
pub struct FieldResult {
    pub archive: String,
    pub set: String,
    pub kind: SetKind,
    pub quantity: &'static str,
    pub mode: ExtractionMode,
    pub reduction: Option<Reduction>,
    pub markers: Vec<f64>,
    pub columns: Vec<EntityKey>,
    pub component_labels: Vec<String>,
    pub values: ResultArray,
    pub skipped_frames: usize,
}

impl FieldResult {
    /// What the column headers of the written table identify.
    pub fn column_heading(&self) -> &'static str {
        match (self.reduction, self.mode, self.kind) {
            (Some(_), _, _) => "component",
            (None, ExtractionMode::NodalExtrapolated, _) => "element:node",
            (None, _, SetKind::Node) => "node",
            (None, _, SetKind::Element) => "element",
        }
    }

    pub fn frame_count(&self) -> usize {
        self.markers.len()
    }
}

/// What a request would touch, without reading any field values.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub archive: String,
    pub set: String,
    pub kind: SetKind,
    pub entities: usize,
    pub frames: usize,
    pub key: &'static str,
    pub mode: ExtractionMode,
}

/// Runs the set → frames → aggregate → assemble pipeline.
pub struct FieldExtractor {
    options: ExtractionOptions,
}

impl FieldExtractor {
    pub fn new(options: ExtractionOptions) -> Self {
        Self { options }
    }

    /// Opens the request's archive, extracts, and closes the archive on every path.
    pub fn extract(
        &self,
        request: &ExtractionRequest,
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> Result<FieldResult> {
        let archive = ArchiveHandle::open(&request.archive)?;
        self.extract_from(&*archive, request, progress_callback)
    }

    pub fn plan(&self, request: &ExtractionRequest) -> Result<ExtractionPlan> {
        let archive = ArchiveHandle::open(&request.archive)?;
        self.plan_from(&*archive, request)
    }

    pub fn plan_from<A: ResultArchive>(
        &self,
        archive: &A,
        request: &ExtractionRequest,
    ) -> Result<ExtractionPlan> {
        let set = self.resolve_set(archive, request)?;
        let sequencer = FrameSequencer::new(archive, self.options.marker_rule);
        let frames = match request.mode {
            ExtractionMode::InitialElement => sequencer.first_frame(request.quantity.key)?.len(),
            _ => {
                sequencer.check_key(request.quantity.key)?;
                sequencer.count_distinct()
            }
        };

        Ok(ExtractionPlan {
            archive: archive.name().to_string(),
            set: set.name.clone(),
            kind: set.kind,
            entities: set.entity_keys().len(),
            frames,
            key: request.quantity.key,
            mode: request.mode,
        })
    }

    pub fn extract_from<A: ResultArchive>(
        &self,
        archive: &A,
        request: &ExtractionRequest,
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> Result<FieldResult> {
        let quantity = request.quantity;
        let set = self.resolve_set(archive, request)?;

        let sequencer = FrameSequencer::new(archive, self.options.marker_rule);
        let axis = match request.mode {
            ExtractionMode::InitialElement => sequencer.first_frame(quantity.key)?,
            _ => {
                sequencer.check_key(quantity.key)?;
                let rows = sequencer.count_distinct();
                let axis = sequencer.axis();
                debug_assert_eq!(rows, axis.len());
                axis
            }
        };

        let component_labels = self.component_labels(archive, request, &set, &axis)?;
        let components = component_labels.len();

        tracing::info!(
            archive = %archive.name(),
            set = %set.name,
            quantity = quantity.name,
            mode = %request.mode,
            frames = axis.len(),
            "extracting field output"
        );

        let engine = AveragingEngine::new(Aggregation::from(request.mode), components)
            .with_source(archive.name());
        let mut assembler = ResultArrayAssembler::new(set.entity_keys(), axis.len(), components);
        let mut progress = ExtractionProgress::new(axis.len());

        for slot in &axis.slots {
            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            let values = archive.field_values(
                slot.frame,
                quantity.key,
                set.kind,
                &set.members,
                request.mode.position(),
            )?;
            let samples = values
                .iter()
                .filter_map(|value| self.sample(request, &set, value));
            let aggregated = engine.aggregate(samples)?;

            assembler
                .write_frame(slot.row, &aggregated)
                .map_err(|missing| ExtractError::MissingSample {
                    kind: set.kind.to_string(),
                    label: missing.label,
                    key: quantity.key.to_string(),
                    frame: slot.row,
                    set: set.name.clone(),
                })?;

            progress.update_frame(slot.marker);
            tracing::trace!(row = slot.row, marker = slot.marker, "frame assembled");
        }

        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        let (columns, values) = assembler.finish();
        let mut result = FieldResult {
            archive: archive.name().to_string(),
            set: set.name.clone(),
            kind: set.kind,
            quantity: quantity.name,
            mode: request.mode,
            reduction: None,
            markers: axis.markers(),
            columns,
            component_labels,
            values,
            skipped_frames: axis.skipped.len(),
        };

        if let Some(reduction) = request.reduction {
            result.values = reduce_across_set(&result.values, reduction);
            result.columns = vec![EntityKey::new(0)];
            result.component_labels = result
                .component_labels
                .iter()
                .map(|label| format!("{}{}", reduction.prefix(), label))
                .collect();
            result.reduction = Some(reduction);
        }

        Ok(result)
    }

    fn resolve_set<A: ResultArchive>(
        &self,
        archive: &A,
        request: &ExtractionRequest,
    ) -> Result<ResolvedSet> {
        EntitySetResolver::new(archive)
            .with_single_instance(self.options.require_single_instance)
            .resolve(request.set_kind(), &request.set, request.mode.needs_connectivity())
    }

    /// Keys a raw value to its result column, selecting the payload the
    /// quantity reads. Values lacking the label the mode needs are dropped.
    fn sample<'v>(
        &self,
        request: &ExtractionRequest,
        set: &ResolvedSet,
        value: &'v FieldValue,
    ) -> Option<RawSample<'v>> {
        let key = match request.mode {
            ExtractionMode::NodalAverage | ExtractionMode::Nodal => EntityKey::new(value.node_label?),
            ExtractionMode::ElementAverage | ExtractionMode::InitialElement => {
                EntityKey::new(value.element_label?)
            }
            ExtractionMode::NodalExtrapolated => {
                let element = value.element_label?;
                let node = value.node_label?;
                let corners = set.connectivity.as_ref()?.get(&element)?;
                if !corners.contains(&node) {
                    return None;
                }
                EntityKey::corner(element, node)
            }
        };

        let values = request.quantity.field.select(value)?;
        Some(RawSample { key, values })
    }

    /// Scalars get one column named after the quantity; vectors use the
    /// archive's component labels.
    fn component_labels<A: ResultArchive>(
        &self,
        archive: &A,
        request: &ExtractionRequest,
        set: &ResolvedSet,
        axis: &FrameAxis,
    ) -> Result<Vec<String>> {
        let quantity = request.quantity;
        if !quantity.is_vector() {
            return Ok(vec![quantity.name.to_string()]);
        }

        let Some(first) = axis.slots.first() else {
            return Ok(Vec::new());
        };

        if let Some(labels) = archive.component_labels(first.frame, quantity.key) {
            if !labels.is_empty() {
                return Ok(labels.to_vec());
            }
        }

        let width = archive
            .field_values(first.frame, quantity.key, set.kind, &set.members, request.mode.position())?
            .iter()
            .find_map(|v| quantity.field.select(v).map(<[f64]>::len))
            .unwrap_or(1);

        Ok((1..=width).map(|i| format!("{}{}", quantity.name, i)).collect())
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(ExtractionOptions::default())
    }
}
