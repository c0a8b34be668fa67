use anyhow::Context;
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_UNKNOWN, D3D_FEATURE_LEVEL_11_0,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_CREATE_DEVICE_SINGLETHREADED, D3D11_SDK_VERSION,
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext,
};
use windows::Win32::Graphics::Dxgi::IDXGIAdapter;

use crate::error::{CaptureError, CaptureResult};

/// Create the D3D11 device the capture session and its conversion
/// pipelines share.
///
/// The device is created with `D3D11_CREATE_DEVICE_SINGLETHREADED`,
/// removing internal driver locking: all command issuance for one
/// session (duplication copies and pipeline draws alike) must originate
/// from one logical thread, and the session model enforces exactly that.
pub(crate) fn create_device_for_adapter(
    adapter: &IDXGIAdapter,
) -> CaptureResult<(ID3D11Device, ID3D11DeviceContext)> {
    create_device(Some(adapter))
}

/// Create the device on the default hardware adapter.
#[allow(dead_code)]
pub(crate) fn create_device_default() -> CaptureResult<(ID3D11Device, ID3D11DeviceContext)> {
    create_device(None)
}

fn create_device(
    adapter: Option<&IDXGIAdapter>,
) -> CaptureResult<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    let feature_levels = [D3D_FEATURE_LEVEL_11_0];

    let flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT | D3D11_CREATE_DEVICE_SINGLETHREADED;

    unsafe {
        D3D11CreateDevice(
            adapter,
            if adapter.is_some() {
                D3D_DRIVER_TYPE_UNKNOWN
            } else {
                D3D_DRIVER_TYPE_HARDWARE
            },
            None,
            flags,
            Some(&feature_levels),
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
    }
    .context("D3D11CreateDevice failed")
    .map_err(CaptureError::ResourceCreation)?;

    let device = device
        .context("D3D11CreateDevice did not return a device")
        .map_err(CaptureError::ResourceCreation)?;
    let context = context
        .context("D3D11CreateDevice did not return a device context")
        .map_err(CaptureError::ResourceCreation)?;
    Ok((device, context))
}
