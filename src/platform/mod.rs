//! Platform-specific capture and conversion. Only the Windows GPU path
//! exists; the cross-platform modules at the crate root compile and
//! test everywhere.

#[cfg(target_os = "windows")]
pub(crate) mod windows;
