pub(crate) mod d3d11;
mod convert_pipeline;
mod duplication;
mod shaders;

pub use convert_pipeline::ConvertPipeline;
pub use duplication::{DuplicationSession, SessionConfig};
pub use shaders::ShaderSet;
