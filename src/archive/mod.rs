pub mod model;
pub mod reader;

#[cfg(test)]
pub(crate) mod fixtures;

pub use model::{ArchiveData, FieldValue, Position, SetMember};
pub use reader::{ArchiveHandle, FrameRef, JsonArchive, PhaseInfo, ResultArchive, SetKind};
