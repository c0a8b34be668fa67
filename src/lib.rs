//! GPU-resident desktop capture for streaming pipelines: DXGI desktop
//! duplication, hardware cursor compositing, and NV12/P010 conversion,
//! all issued as GPU commands with no CPU pixel copies.

pub mod color;
pub mod cursor;
pub mod error;
pub mod frame;
mod platform;
pub(crate) mod registry;

pub use color::{ColorMatrix, ColorRange, Colorspace, make_color_matrix};
pub use cursor::{CursorImage, CursorShape, CursorShapeKind, decode_cursor_shape};
pub use error::{CaptureError, CaptureErrorClass, CaptureResult};
pub use frame::{CursorPlacement, PlanarFormat, UpdateFlags, classify_update};

#[cfg(target_os = "windows")]
pub use platform::windows::{ConvertPipeline, DuplicationSession, SessionConfig, ShaderSet};
