use std::sync::{Arc, Mutex};

use anyhow::Context;
use windows::Win32::Graphics::Direct3D::{
    D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP, D3D_SRV_DIMENSION_TEXTURE2D,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_RENDER_TARGET, D3D11_BIND_SHADER_RESOURCE,
    D3D11_BLEND_DESC, D3D11_BLEND_INV_SRC_ALPHA, D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD,
    D3D11_BLEND_SRC_ALPHA, D3D11_BLEND_ZERO, D3D11_BUFFER_DESC, D3D11_COLOR_WRITE_ENABLE_ALL,
    D3D11_COMPARISON_NEVER, D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_FLOAT32_MAX,
    D3D11_RENDER_TARGET_BLEND_DESC, D3D11_RENDER_TARGET_VIEW_DESC,
    D3D11_RENDER_TARGET_VIEW_DESC_0, D3D11_RTV_DIMENSION_TEXTURE2D, D3D11_SAMPLER_DESC,
    D3D11_SHADER_RESOURCE_VIEW_DESC, D3D11_SHADER_RESOURCE_VIEW_DESC_0, D3D11_SUBRESOURCE_DATA,
    D3D11_TEX2D_RTV, D3D11_TEX2D_SRV, D3D11_TEXTURE2D_DESC, D3D11_TEXTURE_ADDRESS_CLAMP,
    D3D11_TEXTURE_ADDRESS_WRAP, D3D11_USAGE_DEFAULT, D3D11_USAGE_IMMUTABLE, D3D11_VIEWPORT,
    ID3D11BlendState, ID3D11Buffer, ID3D11Device, ID3D11DeviceContext, ID3D11PixelShader,
    ID3D11RenderTargetView, ID3D11SamplerState, ID3D11ShaderResourceView, ID3D11Texture2D,
    ID3D11VertexShader,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_NV12, DXGI_FORMAT_P010,
    DXGI_FORMAT_R8_UNORM, DXGI_FORMAT_R8G8_UNORM, DXGI_FORMAT_R16_UNORM,
    DXGI_FORMAT_R16G16_UNORM, DXGI_SAMPLE_DESC,
};
use windows::core::Interface;

use crate::color::{ColorMatrix, ColorRange, Colorspace};
use crate::error::{CaptureError, CaptureResult};
use crate::frame::{CursorPlacement, PlanarFormat};
use crate::registry::{Registry, Token};

use super::shaders::ShaderSet;

/// Per-pipeline cursor state: the shape texture's shader resource view
/// plus the placement rectangle in this pipeline's output coordinates.
///
/// Shared between the owning pipeline (which reads it during `convert`)
/// and the capture session (which writes it when the duplication
/// interface reports pointer changes).
pub(crate) struct CursorSlot {
    device: ID3D11Device,
    srv: Option<ID3D11ShaderResourceView>,
    placement: CursorPlacement,
}

impl CursorSlot {
    fn new(device: ID3D11Device, in_width: u32, out_width: u32) -> Self {
        Self {
            device,
            srv: None,
            placement: CursorPlacement::new(in_width, out_width),
        }
    }

    /// Adopt a freshly decoded cursor shape texture. On failure the
    /// previously installed shape stays bound so the overlay keeps
    /// drawing the last good cursor.
    pub(crate) fn set_texture(
        &mut self,
        texture: &ID3D11Texture2D,
        width: u32,
        height: u32,
    ) -> CaptureResult<()> {
        let desc = D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            ViewDimension: D3D_SRV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                },
            },
        };

        let mut srv: Option<ID3D11ShaderResourceView> = None;
        let created = unsafe {
            self.device
                .CreateShaderResourceView(texture, Some(&desc), Some(&mut srv))
        }
        .context("CreateShaderResourceView for cursor shape failed")
        .map_err(CaptureError::ResourceCreation)
        .and_then(|()| {
            srv.context("CreateShaderResourceView for cursor shape returned None")
                .map_err(CaptureError::ResourceCreation)
        });
        let srv = match created {
            Ok(srv) => srv,
            Err(e) => {
                tracing::warn!(error = %e, "keeping previous cursor shape view");
                return Err(e);
            }
        };

        self.srv = Some(srv);
        self.placement.set_shape_size(width, height);
        Ok(())
    }

    pub(crate) fn set_position(&mut self, x: i32, y: i32, visible: bool) {
        self.placement.set_position(x, y, visible);
    }
}

pub(crate) type SharedCursorSlot = Arc<Mutex<CursorSlot>>;

/// Registry of live pipelines' cursor slots, shared with the session
/// so pointer updates fan out to every pipeline.
pub(crate) type PipelineRegistry = Arc<Mutex<Registry<SharedCursorSlot>>>;

/// Maps a planar output format to the texture format plus the per-plane
/// render target view formats.
fn planar_view_formats(format: PlanarFormat) -> (DXGI_FORMAT, DXGI_FORMAT, DXGI_FORMAT) {
    match format {
        PlanarFormat::Nv12 => (DXGI_FORMAT_NV12, DXGI_FORMAT_R8_UNORM, DXGI_FORMAT_R8G8_UNORM),
        PlanarFormat::P010 => (
            DXGI_FORMAT_P010,
            DXGI_FORMAT_R16_UNORM,
            DXGI_FORMAT_R16G16_UNORM,
        ),
    }
}

fn make_immutable_buffer<T>(
    device: &ID3D11Device,
    data: &T,
    label: &str,
) -> CaptureResult<ID3D11Buffer> {
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: size_of::<T>() as u32,
        Usage: D3D11_USAGE_IMMUTABLE,
        BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
        ..Default::default()
    };
    let init = D3D11_SUBRESOURCE_DATA {
        pSysMem: data as *const T as *const _,
        ..Default::default()
    };

    let mut buf: Option<ID3D11Buffer> = None;
    unsafe { device.CreateBuffer(&desc, Some(&init), Some(&mut buf)) }
        .context(format!("CreateBuffer ({label}) failed"))
        .map_err(CaptureError::ResourceCreation)?;
    buf.context(format!("CreateBuffer ({label}) returned None"))
        .map_err(CaptureError::ResourceCreation)
}

fn make_blend(device: &ID3D11Device, enable: bool) -> CaptureResult<ID3D11BlendState> {
    let mut desc = D3D11_BLEND_DESC::default();
    desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
        BlendEnable: enable.into(),
        SrcBlend: D3D11_BLEND_SRC_ALPHA,
        DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
        BlendOp: D3D11_BLEND_OP_ADD,
        SrcBlendAlpha: D3D11_BLEND_ONE,
        DestBlendAlpha: D3D11_BLEND_ZERO,
        BlendOpAlpha: D3D11_BLEND_OP_ADD,
        RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
    };

    let mut blend: Option<ID3D11BlendState> = None;
    unsafe { device.CreateBlendState(&desc, Some(&mut blend)) }
        .context("CreateBlendState failed")
        .map_err(CaptureError::ResourceCreation)?;
    blend
        .context("CreateBlendState returned None")
        .map_err(CaptureError::ResourceCreation)
}

/// Creates a BGRA texture usable both as a render target and as a
/// shader input, with views over it. Used for the scene-composite
/// surface the cursor is blended onto.
fn make_render_surface(
    device: &ID3D11Device,
    width: u32,
    height: u32,
) -> CaptureResult<(ID3D11RenderTargetView, ID3D11ShaderResourceView)> {
    let desc = D3D11_TEXTURE2D_DESC {
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
        BindFlags: (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
        ..Default::default()
    };

    let mut tex: Option<ID3D11Texture2D> = None;
    unsafe { device.CreateTexture2D(&desc, None, Some(&mut tex)) }
        .context("CreateTexture2D for scene surface failed")
        .map_err(CaptureError::ResourceCreation)?;
    let tex = tex
        .context("CreateTexture2D for scene surface returned None")
        .map_err(CaptureError::ResourceCreation)?;

    let mut rtv: Option<ID3D11RenderTargetView> = None;
    unsafe { device.CreateRenderTargetView(&tex, None, Some(&mut rtv)) }
        .context("CreateRenderTargetView for scene surface failed")
        .map_err(CaptureError::ResourceCreation)?;
    let rtv = rtv
        .context("CreateRenderTargetView for scene surface returned None")
        .map_err(CaptureError::ResourceCreation)?;

    let mut srv: Option<ID3D11ShaderResourceView> = None;
    unsafe { device.CreateShaderResourceView(&tex, None, Some(&mut srv)) }
        .context("CreateShaderResourceView for scene surface failed")
        .map_err(CaptureError::ResourceCreation)?;
    let srv = srv
        .context("CreateShaderResourceView for scene surface returned None")
        .map_err(CaptureError::ResourceCreation)?;

    Ok((rtv, srv))
}

fn make_plane_rtv(
    device: &ID3D11Device,
    texture: &ID3D11Texture2D,
    format: DXGI_FORMAT,
) -> CaptureResult<ID3D11RenderTargetView> {
    let desc = D3D11_RENDER_TARGET_VIEW_DESC {
        Format: format,
        ViewDimension: D3D11_RTV_DIMENSION_TEXTURE2D,
        Anonymous: D3D11_RENDER_TARGET_VIEW_DESC_0 {
            Texture2D: D3D11_TEX2D_RTV { MipSlice: 0 },
        },
    };

    let mut rtv: Option<ID3D11RenderTargetView> = None;
    unsafe { device.CreateRenderTargetView(texture, Some(&desc), Some(&mut rtv)) }
        .context("CreateRenderTargetView for output plane failed")
        .map_err(CaptureError::ResourceCreation)?;
    rtv.context("CreateRenderTargetView for output plane returned None")
        .map_err(CaptureError::ResourceCreation)
}

/// GPU conversion pipeline rendering a BGRA desktop texture into one
/// planar output texture, optionally compositing the cursor on the way.
///
/// Pipelines share the session's immediate context, so every `convert`
/// call rebinds the fixed state it relies on rather than assuming the
/// bindings survived since construction.
pub struct ConvertPipeline {
    device: ID3D11Device,
    context: ID3D11DeviceContext,

    scene_vs: ID3D11VertexShader,
    scene_ps: ID3D11PixelShader,
    luma_ps: ID3D11PixelShader,
    chroma_vs: ID3D11VertexShader,
    chroma_ps: ID3D11PixelShader,

    blend_enable: ID3D11BlendState,
    blend_disable: ID3D11BlendState,
    sampler_linear: ID3D11SamplerState,

    color_matrix: ID3D11Buffer,
    info_scene: ID3D11Buffer,

    scene_rt: ID3D11RenderTargetView,
    scene_srv: ID3D11ShaderResourceView,

    output: ID3D11Texture2D,
    luma_rt: ID3D11RenderTargetView,
    chroma_rt: ID3D11RenderTargetView,

    /// Cached SRV for the session's source texture. Reused while the
    /// source COM pointer stays the same across frames.
    source_srv: Option<ID3D11ShaderResourceView>,
    source_srv_key: usize,

    in_width: u32,
    in_height: u32,
    out_width: u32,
    out_height: u32,
    format: PlanarFormat,

    cursor: SharedCursorSlot,
    registry: PipelineRegistry,
    token: Token,
}

impl ConvertPipeline {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: &ID3D11Device,
        context: &ID3D11DeviceContext,
        shaders: &ShaderSet,
        in_width: u32,
        in_height: u32,
        out_width: u32,
        out_height: u32,
        format: PlanarFormat,
        registry: &PipelineRegistry,
    ) -> CaptureResult<Self> {
        let mut scene_vs: Option<ID3D11VertexShader> = None;
        unsafe { device.CreateVertexShader(&shaders.scene_vs, None, Some(&mut scene_vs)) }
            .context("CreateVertexShader (scene) failed")
            .map_err(CaptureError::ResourceCreation)?;
        let scene_vs = scene_vs
            .context("CreateVertexShader (scene) returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let mut scene_ps: Option<ID3D11PixelShader> = None;
        unsafe { device.CreatePixelShader(&shaders.scene_ps, None, Some(&mut scene_ps)) }
            .context("CreatePixelShader (scene) failed")
            .map_err(CaptureError::ResourceCreation)?;
        let scene_ps = scene_ps
            .context("CreatePixelShader (scene) returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let mut luma_ps: Option<ID3D11PixelShader> = None;
        unsafe { device.CreatePixelShader(&shaders.luma_ps, None, Some(&mut luma_ps)) }
            .context("CreatePixelShader (luma) failed")
            .map_err(CaptureError::ResourceCreation)?;
        let luma_ps = luma_ps
            .context("CreatePixelShader (luma) returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let mut chroma_vs: Option<ID3D11VertexShader> = None;
        unsafe { device.CreateVertexShader(&shaders.chroma_vs, None, Some(&mut chroma_vs)) }
            .context("CreateVertexShader (chroma) failed")
            .map_err(CaptureError::ResourceCreation)?;
        let chroma_vs = chroma_vs
            .context("CreateVertexShader (chroma) returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let mut chroma_ps: Option<ID3D11PixelShader> = None;
        unsafe { device.CreatePixelShader(&shaders.chroma_ps, None, Some(&mut chroma_ps)) }
            .context("CreatePixelShader (chroma) failed")
            .map_err(CaptureError::ResourceCreation)?;
        let chroma_ps = chroma_ps
            .context("CreatePixelShader (chroma) returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let blend_enable = make_blend(device, true)?;
        let blend_disable = make_blend(device, false)?;

        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_WRAP,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            MinLOD: 0.0,
            MaxLOD: D3D11_FLOAT32_MAX,
            ..Default::default()
        };
        let mut sampler_linear: Option<ID3D11SamplerState> = None;
        unsafe { device.CreateSamplerState(&sampler_desc, Some(&mut sampler_linear)) }
            .context("CreateSamplerState failed")
            .map_err(CaptureError::ResourceCreation)?;
        let sampler_linear = sampler_linear
            .context("CreateSamplerState returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let color_matrix =
            make_immutable_buffer(device, &ColorMatrix::default(), "color matrix")?;

        // Aligned to 16 bytes; only the first lane is read.
        let info_in: [f32; 4] = [1.0 / out_width as f32, 0.0, 0.0, 0.0];
        let info_scene = make_immutable_buffer(device, &info_in, "scene info")?;

        let (scene_rt, scene_srv) = make_render_surface(device, in_width, in_height)?;

        let (tex_format, luma_format, chroma_format) = planar_view_formats(format);
        let output_desc = D3D11_TEXTURE2D_DESC {
            Width: out_width,
            Height: out_height,
            MipLevels: 1,
            ArraySize: 1,
            Format: tex_format,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
            ..Default::default()
        };
        let mut output: Option<ID3D11Texture2D> = None;
        unsafe { device.CreateTexture2D(&output_desc, None, Some(&mut output)) }
            .context("CreateTexture2D for planar output failed")
            .map_err(CaptureError::ResourceCreation)?;
        let output = output
            .context("CreateTexture2D for planar output returned None")
            .map_err(CaptureError::ResourceCreation)?;

        let luma_rt = make_plane_rtv(device, &output, luma_format)?;
        let chroma_rt = make_plane_rtv(device, &output, chroma_format)?;

        let cursor: SharedCursorSlot = Arc::new(Mutex::new(CursorSlot::new(
            device.clone(),
            in_width,
            out_width,
        )));
        let token = registry
            .lock()
            .map_err(|_| CaptureError::Platform(anyhow::anyhow!("pipeline registry poisoned")))?
            .insert(cursor.clone());

        Ok(Self {
            device: device.clone(),
            context: context.clone(),
            scene_vs,
            scene_ps,
            luma_ps,
            chroma_vs,
            chroma_ps,
            blend_enable,
            blend_disable,
            sampler_linear,
            color_matrix,
            info_scene,
            scene_rt,
            scene_srv,
            output,
            luma_rt,
            chroma_rt,
            source_srv: None,
            source_srv_key: 0,
            in_width,
            in_height,
            out_width,
            out_height,
            format,
            cursor,
            registry: registry.clone(),
            token,
        })
    }

    pub fn output_format(&self) -> PlanarFormat {
        self.format
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.out_width, self.out_height)
    }

    pub(crate) fn cursor_slot(&self) -> &SharedCursorSlot {
        &self.cursor
    }

    /// Install a BGRA cursor shape texture for this pipeline's overlay.
    /// Normally driven by the session's pointer fan-out.
    pub fn set_cursor_texture(
        &self,
        texture: &ID3D11Texture2D,
        width: u32,
        height: u32,
    ) -> CaptureResult<()> {
        self.cursor
            .lock()
            .map_err(|_| CaptureError::Platform(anyhow::anyhow!("cursor slot poisoned")))?
            .set_texture(texture, width, height)
    }

    /// Update the cursor position in input (desktop) coordinates.
    pub fn set_cursor_position(&self, x: i32, y: i32, visible: bool) {
        if let Ok(mut slot) = self.cursor.lock() {
            slot.set_position(x, y, visible);
        }
    }

    /// Select the color conversion matrix. BT.2020 falls back to the
    /// BT.601 coefficients until a dedicated matrix exists. A constant
    /// buffer failure is non-fatal; the previous matrix stays active.
    pub fn set_colorspace(&mut self, colorspace: Colorspace, range: ColorRange) {
        let effective = colorspace.effective();
        if effective != colorspace {
            tracing::warn!(
                requested = ?colorspace,
                used = ?effective,
                "colorspace not yet supported, using fallback coefficients"
            );
        }

        let matrix = ColorMatrix::for_colorspace(effective, range);
        match make_immutable_buffer(&self.device, &matrix, "color matrix") {
            Ok(buffer) => self.color_matrix = buffer,
            Err(e) => tracing::warn!(error = %e, "keeping previous color matrix"),
        }
    }

    /// Render `source` into the planar output texture and return it.
    ///
    /// Two draws without a visible cursor; four with one (scene copy,
    /// blended cursor overlay, then the luma and chroma passes).
    pub fn convert(&mut self, source: &ID3D11Texture2D) -> CaptureResult<&ID3D11Texture2D> {
        self.ensure_source_srv(source)?;
        // Cached above. Clone keeps the borrow checker off the later
        // &mut-free context calls.
        let source_srv = self
            .source_srv
            .clone()
            .context("source SRV missing after ensure")
            .map_err(CaptureError::Platform)?;

        let (cursor_srv, placement) = {
            let slot = self
                .cursor
                .lock()
                .map_err(|_| CaptureError::Platform(anyhow::anyhow!("cursor slot poisoned")))?;
            (slot.srv.clone(), slot.placement)
        };

        self.bind_fixed_state();

        let mut input_srv = source_srv;
        if placement.visible {
            if let Some(cursor_srv) = cursor_srv {
                unsafe {
                    self.set_viewport(0.0, 0.0, self.in_width as f32, self.in_height as f32);
                    self.context
                        .OMSetRenderTargets(Some(&[Some(self.scene_rt.clone())]), None);
                    self.context.VSSetShader(&self.scene_vs, None);
                    self.context.PSSetShader(&self.scene_ps, None);
                    self.context
                        .PSSetShaderResources(0, Some(&[Some(input_srv.clone())]));
                    self.context.Draw(3, 0);

                    self.context
                        .OMSetBlendState(&self.blend_enable, None, u32::MAX);
                    self.set_viewport(
                        placement.x,
                        placement.y,
                        placement.width,
                        placement.height,
                    );
                    self.context
                        .PSSetShaderResources(0, Some(&[Some(cursor_srv)]));
                    self.context.Draw(3, 0);
                    self.context
                        .OMSetBlendState(&self.blend_disable, None, u32::MAX);
                }

                input_srv = self.scene_srv.clone();
            }
        }

        unsafe {
            self.set_viewport(0.0, 0.0, self.out_width as f32, self.out_height as f32);
            self.context
                .OMSetRenderTargets(Some(&[Some(self.luma_rt.clone())]), None);
            self.context.VSSetShader(&self.scene_vs, None);
            self.context.PSSetShader(&self.luma_ps, None);
            self.context
                .PSSetShaderResources(0, Some(&[Some(input_srv.clone())]));
            self.context.Draw(3, 0);

            self.set_viewport(
                0.0,
                0.0,
                (self.out_width / 2) as f32,
                (self.out_height / 2) as f32,
            );
            self.context
                .OMSetRenderTargets(Some(&[Some(self.chroma_rt.clone())]), None);
            self.context.VSSetShader(&self.chroma_vs, None);
            self.context.PSSetShader(&self.chroma_ps, None);
            self.context
                .PSSetShaderResources(0, Some(&[Some(input_srv)]));
            self.context.Draw(3, 0);

            // Unbind so the source texture is free for the next copy.
            self.context.PSSetShaderResources(0, Some(&[None]));
        }

        Ok(&self.output)
    }

    /// Bindings other pipelines (or the session) may have disturbed on
    /// the shared context.
    fn bind_fixed_state(&self) {
        unsafe {
            self.context
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP);
            self.context
                .OMSetBlendState(&self.blend_disable, None, u32::MAX);
            self.context
                .PSSetSamplers(0, Some(&[Some(self.sampler_linear.clone())]));
            self.context
                .PSSetConstantBuffers(0, Some(&[Some(self.color_matrix.clone())]));
            self.context
                .VSSetConstantBuffers(0, Some(&[Some(self.info_scene.clone())]));
        }
    }

    fn set_viewport(&self, x: f32, y: f32, width: f32, height: f32) {
        let view = D3D11_VIEWPORT {
            TopLeftX: x,
            TopLeftY: y,
            Width: width,
            Height: height,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        unsafe { self.context.RSSetViewports(Some(&[view])) };
    }

    fn ensure_source_srv(&mut self, source: &ID3D11Texture2D) -> CaptureResult<()> {
        let key = source.as_raw() as usize;
        if key == self.source_srv_key && self.source_srv.is_some() {
            return Ok(());
        }

        let desc = D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            ViewDimension: D3D_SRV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                },
            },
        };
        let mut srv: Option<ID3D11ShaderResourceView> = None;
        unsafe {
            self.device
                .CreateShaderResourceView(source, Some(&desc), Some(&mut srv))
        }
        .context("CreateShaderResourceView for source failed")
        .map_err(CaptureError::ResourceCreation)?;
        let srv = srv
            .context("CreateShaderResourceView for source returned None")
            .map_err(CaptureError::ResourceCreation)?;

        self.source_srv = Some(srv);
        self.source_srv_key = key;
        Ok(())
    }
}

impl Drop for ConvertPipeline {
    fn drop(&mut self) {
        // Deregister before any resource is released so a concurrent
        // pointer fan-out never observes a half-destroyed slot.
        if let Ok(mut registry) = self.registry.lock() {
            registry.remove(self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_formats_map_to_matching_plane_views() {
        let (tex, luma, chroma) = planar_view_formats(PlanarFormat::Nv12);
        assert_eq!(tex, DXGI_FORMAT_NV12);
        assert_eq!(luma, DXGI_FORMAT_R8_UNORM);
        assert_eq!(chroma, DXGI_FORMAT_R8G8_UNORM);

        let (tex, luma, chroma) = planar_view_formats(PlanarFormat::P010);
        assert_eq!(tex, DXGI_FORMAT_P010);
        assert_eq!(luma, DXGI_FORMAT_R16_UNORM);
        assert_eq!(chroma, DXGI_FORMAT_R16G16_UNORM);
    }
}
