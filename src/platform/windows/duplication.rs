use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_BIND_SHADER_RESOURCE, D3D11_SUBRESOURCE_DATA, D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT,
    ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, DXGI_ERROR_ACCESS_LOST, DXGI_ERROR_NOT_FOUND, DXGI_ERROR_WAIT_TIMEOUT,
    DXGI_OUTDUPL_FRAME_INFO, DXGI_OUTDUPL_POINTER_SHAPE_INFO, IDXGIAdapter, IDXGIFactory1,
    IDXGIOutput, IDXGIOutput1, IDXGIOutput5, IDXGIOutputDuplication, IDXGIResource,
};
use windows::core::Interface;

use crate::cursor::{CursorShape, CursorShapeKind, decode_cursor_shape};
use crate::error::{CaptureError, CaptureResult};
use crate::frame::{PlanarFormat, UpdateFlags, classify_update};
use crate::registry::Registry;

use super::convert_pipeline::{ConvertPipeline, PipelineRegistry};
use super::d3d11::create_device_for_adapter;
use super::shaders::ShaderSet;

/// Session-level capture options.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Composite the pointer into converted output.
    pub show_cursor: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { show_cursor: true }
    }
}

/// The most recently decoded cursor shape, kept so pipelines created
/// after the shape arrived can still draw it.
struct CursorTexture {
    texture: ID3D11Texture2D,
    width: u32,
    height: u32,
}

/// Releases the acquired duplication frame when the acquisition path
/// unwinds, including on decode errors.
struct FrameGuard {
    duplication: IDXGIOutputDuplication,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        unsafe { self.duplication.ReleaseFrame() }.ok();
    }
}

fn create_duplication(
    output: &IDXGIOutput,
    device: &ID3D11Device,
) -> CaptureResult<IDXGIOutputDuplication> {
    if let Ok(output5) = output.cast::<IDXGIOutput5>() {
        let formats = [DXGI_FORMAT_B8G8R8A8_UNORM];
        if let Ok(duplication) = unsafe { output5.DuplicateOutput1(device, 0, &formats) } {
            return Ok(duplication);
        }
    }

    let output1: IDXGIOutput1 = output
        .cast()
        .context("failed to query IDXGIOutput1")
        .map_err(CaptureError::Platform)?;
    unsafe { output1.DuplicateOutput(device) }
        .context("DuplicateOutput failed")
        .map_err(CaptureError::Platform)
}

/// Owns the desktop duplication for one output and the D3D11 device all
/// conversion pipelines created from it share.
///
/// Single-threaded by construction: the device is created with the
/// single-threaded flag, so `acquire` and every pipeline's `convert`
/// must stay on the thread that created the session.
pub struct DuplicationSession {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    duplication: IDXGIOutputDuplication,
    /// Last captured desktop image, in duplication mode-desc dimensions.
    source: ID3D11Texture2D,
    width: u32,
    height: u32,
    shaders: ShaderSet,
    registry: PipelineRegistry,
    cursor: Option<CursorTexture>,
    config: SessionConfig,
}

impl DuplicationSession {
    pub fn new(
        adapter: &IDXGIAdapter,
        output: &IDXGIOutput,
        config: SessionConfig,
    ) -> CaptureResult<Self> {
        let (device, context) = create_device_for_adapter(adapter)?;
        let duplication = create_duplication(output, &device)?;

        let dup_desc = unsafe { duplication.GetDesc() };
        let width = dup_desc.ModeDesc.Width;
        let height = dup_desc.ModeDesc.Height;

        let source_desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            ..Default::default()
        };
        let mut source: Option<ID3D11Texture2D> = None;
        unsafe { device.CreateTexture2D(&source_desc, None, Some(&mut source)) }
            .context("CreateTexture2D for capture source failed")
            .map_err(CaptureError::ResourceCreation)?;
        let source = source
            .context("CreateTexture2D for capture source returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let shaders = ShaderSet::compile()?;

        tracing::info!(width, height, "duplication session ready");

        Ok(Self {
            device,
            context,
            duplication,
            source,
            width,
            height,
            shaders,
            registry: Arc::new(Mutex::new(Registry::new())),
            cursor: None,
            config,
        })
    }

    /// Open a session on the first output attached to the desktop.
    pub fn for_primary_output(config: SessionConfig) -> CaptureResult<Self> {
        let factory: IDXGIFactory1 = unsafe { CreateDXGIFactory1() }
            .context("CreateDXGIFactory1 failed")
            .map_err(CaptureError::Platform)?;

        let mut adapter_idx = 0u32;
        loop {
            let adapter = match unsafe { factory.EnumAdapters(adapter_idx) } {
                Ok(a) => a,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                Err(e) => {
                    return Err(CaptureError::Platform(
                        anyhow::Error::from(e)
                            .context(format!("EnumAdapters({adapter_idx}) failed")),
                    ));
                }
            };

            let mut output_idx = 0u32;
            loop {
                let output = match unsafe { adapter.EnumOutputs(output_idx) } {
                    Ok(o) => o,
                    Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                    Err(e) => {
                        return Err(CaptureError::Platform(anyhow::Error::from(e).context(
                            format!("EnumOutputs({output_idx}) on adapter {adapter_idx} failed"),
                        )));
                    }
                };

                let desc = unsafe { output.GetDesc() }
                    .context("IDXGIOutput::GetDesc failed")
                    .map_err(CaptureError::Platform)?;
                if desc.AttachedToDesktop.as_bool() {
                    return Self::new(&adapter, &output, config);
                }

                output_idx += 1;
            }

            adapter_idx += 1;
        }

        Err(CaptureError::Platform(anyhow::anyhow!(
            "no output attached to the desktop"
        )))
    }

    /// Wait up to `timeout` for the next desktop or pointer update and
    /// fold it into session state: pointer changes fan out to every
    /// pipeline, image changes are copied into the source texture.
    ///
    /// Wakes that carry neither an image nor a pointer change are
    /// reported as `Timeout`, same as no wake at all.
    pub fn acquire(&mut self, timeout: Duration) -> CaptureResult<UpdateFlags> {
        let mut info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;
        let acquired = unsafe {
            self.duplication
                .AcquireNextFrame(timeout.as_millis() as u32, &mut info, &mut resource)
        };
        if let Err(error) = acquired {
            if error.code() == DXGI_ERROR_WAIT_TIMEOUT {
                return Err(CaptureError::Timeout);
            }
            if error.code() == DXGI_ERROR_ACCESS_LOST {
                return Err(CaptureError::AccessLost);
            }
            return Err(CaptureError::Platform(
                anyhow::Error::from(error).context("AcquireNextFrame failed"),
            ));
        }

        let _guard = FrameGuard {
            duplication: self.duplication.clone(),
        };

        let flags = classify_update(
            info.AccumulatedFrames,
            info.LastPresentTime,
            info.LastMouseUpdateTime,
            info.PointerShapeBufferSize,
        );
        if !flags.any() {
            return Err(CaptureError::Timeout);
        }

        if info.PointerShapeBufferSize > 0 {
            self.refresh_cursor_shape(&info)?;
        }

        if info.LastMouseUpdateTime != 0 {
            let visible = info.PointerPosition.Visible.as_bool() && self.config.show_cursor;
            let x = info.PointerPosition.Position.x;
            let y = info.PointerPosition.Position.y;
            self.for_each_slot(|slot| slot.set_position(x, y, visible))?;
        }

        if flags.frame_update {
            let texture: ID3D11Texture2D = resource
                .context("AcquireNextFrame returned no resource for a frame update")
                .map_err(CaptureError::Platform)?
                .cast()
                .context("failed to cast acquired IDXGIResource to ID3D11Texture2D")
                .map_err(CaptureError::Platform)?;
            unsafe { self.context.CopyResource(&self.source, &texture) };
        }

        Ok(flags)
    }

    /// Create a conversion pipeline targeting this session's output. A
    /// previously captured cursor shape is installed into the new
    /// pipeline immediately.
    pub fn create_pipeline(
        &mut self,
        out_width: u32,
        out_height: u32,
        format: PlanarFormat,
    ) -> CaptureResult<ConvertPipeline> {
        let pipeline = ConvertPipeline::new(
            &self.device,
            &self.context,
            &self.shaders,
            self.width,
            self.height,
            out_width,
            out_height,
            format,
            &self.registry,
        )?;

        if let Some(cursor) = &self.cursor {
            pipeline
                .cursor_slot()
                .lock()
                .map_err(|_| CaptureError::Platform(anyhow::anyhow!("cursor slot poisoned")))?
                .set_texture(&cursor.texture, cursor.width, cursor.height)?;
        }

        Ok(pipeline)
    }

    pub fn source_texture(&self) -> &ID3D11Texture2D {
        &self.source
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    pub fn set_show_cursor(&mut self, show: bool) {
        self.config.show_cursor = show;
    }

    /// Fetch, decode, and upload a new pointer shape, then install it
    /// into every live pipeline.
    fn refresh_cursor_shape(&mut self, info: &DXGI_OUTDUPL_FRAME_INFO) -> CaptureResult<()> {
        let mut buf = vec![0u8; info.PointerShapeBufferSize as usize];
        let mut required = 0u32;
        let mut shape_info = DXGI_OUTDUPL_POINTER_SHAPE_INFO::default();
        unsafe {
            self.duplication.GetFramePointerShape(
                buf.len() as u32,
                buf.as_mut_ptr() as *mut _,
                &mut required,
                &mut shape_info,
            )
        }
        .context("GetFramePointerShape failed")
        .map_err(CaptureError::Platform)?;

        let kind = CursorShapeKind::from_dxgi(shape_info.Type).ok_or_else(|| {
            CaptureError::InvalidCursorShape(format!(
                "unknown pointer shape type {}",
                shape_info.Type
            ))
        })?;

        let image = decode_cursor_shape(CursorShape {
            width: shape_info.Width,
            height: shape_info.Height,
            pitch: shape_info.Pitch,
            kind,
            data: buf,
        })?;

        let texture_desc = D3D11_TEXTURE2D_DESC {
            Width: image.width,
            Height: image.height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            ..Default::default()
        };
        let init = D3D11_SUBRESOURCE_DATA {
            pSysMem: image.data.as_ptr() as *const _,
            SysMemPitch: image.pitch,
            ..Default::default()
        };
        let mut texture: Option<ID3D11Texture2D> = None;
        unsafe {
            self.device
                .CreateTexture2D(&texture_desc, Some(&init), Some(&mut texture))
        }
        .context("CreateTexture2D for cursor shape failed")
        .map_err(CaptureError::ResourceCreation)?;
        let texture = texture
            .context("CreateTexture2D for cursor shape returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let mut install_error = None;
        self.for_each_slot(|slot| {
            if let Err(e) = slot.set_texture(&texture, image.width, image.height) {
                install_error.get_or_insert(e);
            }
        })?;
        if let Some(e) = install_error {
            return Err(e);
        }

        tracing::debug!(
            width = image.width,
            height = image.height,
            kind = ?kind,
            "pointer shape updated"
        );

        self.cursor = Some(CursorTexture {
            texture,
            width: image.width,
            height: image.height,
        });
        Ok(())
    }

    fn for_each_slot(
        &self,
        mut f: impl FnMut(&mut super::convert_pipeline::CursorSlot),
    ) -> CaptureResult<()> {
        let mut registry = self
            .registry
            .lock()
            .map_err(|_| CaptureError::Platform(anyhow::anyhow!("pipeline registry poisoned")))?;
        registry.for_each(|shared| {
            if let Ok(mut slot) = shared.lock() {
                f(&mut slot);
            }
        });
        Ok(())
    }
}
