pub mod assembler;
pub mod averaging;
pub mod frames;
pub mod history;
pub mod request;
pub mod sets;
pub mod variables;

pub use assembler::{ResultArray, ResultArrayAssembler};
pub use averaging::{reduce_across_set, Aggregation, AveragingEngine, RawSample, Reduction};
pub use frames::{FrameAxis, FrameSequencer, FrameSlot, MarkerRule};
pub use history::{fetch_j_integral, fetch_j_integral_from, CrackHistory};
pub use request::{
    ExtractionOptions, ExtractionPlan, ExtractionProgress, ExtractionRequest, FieldExtractor,
    FieldResult,
};
pub use sets::{EntityKey, EntitySetResolver, ResolvedSet};
pub use variables::{lookup, Category, ExtractionMode, PayloadField, Quantity, QuantitySpec};
