mod definition;

pub use definition::{JobSpec, PipelineDefinition, DEFAULT_STAGE, RESERVED_KEYS};
