use crate::error::{CaptureError, CaptureResult};

// Bytecode comes from build-time fxc.exe compilation when available
// (embedded via the *_CSO_PATH env vars from build.rs), otherwise from
// runtime D3DCompile of the HLSL source below.

/// HLSL source kept as fallback for runtime compilation when fxc.exe
/// was not available at build time.
#[cfg(not(has_precompiled_shaders))]
const HLSL_SOURCE: &str = include_str!("convert.hlsl");

#[cfg(has_precompiled_shaders)]
const SCENE_VS_CSO: &[u8] = include_bytes!(env!("SCENE_VS_CSO_PATH"));
#[cfg(has_precompiled_shaders)]
const SCENE_PS_CSO: &[u8] = include_bytes!(env!("SCENE_PS_CSO_PATH"));
#[cfg(has_precompiled_shaders)]
const LUMA_PS_CSO: &[u8] = include_bytes!(env!("LUMA_PS_CSO_PATH"));
#[cfg(has_precompiled_shaders)]
const CHROMA_VS_CSO: &[u8] = include_bytes!(env!("CHROMA_VS_CSO_PATH"));
#[cfg(has_precompiled_shaders)]
const CHROMA_PS_CSO: &[u8] = include_bytes!(env!("CHROMA_PS_CSO_PATH"));

/// The five compiled shader programs every conversion pipeline binds:
/// the full-surface triangle vertex stages, the scene pass-through
/// pixel stage for cursor compositing, and the luma/chroma conversion
/// pixel stages.
///
/// Built once at session start-up and lent to each pipeline's
/// constructor. Compilation failure of any program is fatal to capture
/// start-up.
pub struct ShaderSet {
    pub scene_vs: Vec<u8>,
    pub scene_ps: Vec<u8>,
    pub luma_ps: Vec<u8>,
    pub chroma_vs: Vec<u8>,
    pub chroma_ps: Vec<u8>,
}

impl ShaderSet {
    pub fn compile() -> CaptureResult<Self> {
        #[cfg(has_precompiled_shaders)]
        {
            Ok(Self {
                scene_vs: SCENE_VS_CSO.to_vec(),
                scene_ps: SCENE_PS_CSO.to_vec(),
                luma_ps: LUMA_PS_CSO.to_vec(),
                chroma_vs: CHROMA_VS_CSO.to_vec(),
                chroma_ps: CHROMA_PS_CSO.to_vec(),
            })
        }

        #[cfg(not(has_precompiled_shaders))]
        {
            tracing::info!("compiling conversion shaders");
            let set = Self {
                scene_vs: compile_runtime(b"scene_vs\0", b"vs_5_0\0")?,
                scene_ps: compile_runtime(b"scene_ps\0", b"ps_5_0\0")?,
                luma_ps: compile_runtime(b"luma_ps\0", b"ps_5_0\0")?,
                chroma_vs: compile_runtime(b"chroma_vs\0", b"vs_5_0\0")?,
                chroma_ps: compile_runtime(b"chroma_ps\0", b"ps_5_0\0")?,
            };
            tracing::info!("compiled conversion shaders");
            Ok(set)
        }
    }
}

#[cfg(not(has_precompiled_shaders))]
fn compile_runtime(entry: &'static [u8], target: &'static [u8]) -> CaptureResult<Vec<u8>> {
    use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
    use windows::core::PCSTR;

    let source = HLSL_SOURCE.as_bytes();
    let entry_pcstr = PCSTR::from_raw(entry.as_ptr());
    let target_pcstr = PCSTR::from_raw(target.as_ptr());
    let mut blob = None;
    let mut errors = None;

    let hr = unsafe {
        D3DCompile(
            source.as_ptr() as *const _,
            source.len(),
            None,
            None,
            None,
            entry_pcstr,
            target_pcstr,
            0,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };

    let entry_name = std::str::from_utf8(&entry[..entry.len() - 1]).unwrap_or("?");
    if let Err(e) = hr {
        let msg = errors
            .map(|b| {
                let ptr = unsafe { b.GetBufferPointer() } as *const u8;
                let len = unsafe { b.GetBufferSize() };
                let slice = unsafe { std::slice::from_raw_parts(ptr, len) };
                String::from_utf8_lossy(slice).to_string()
            })
            .unwrap_or_default();
        return Err(CaptureError::ShaderCompile(format!(
            "{entry_name}: {e} {msg}"
        )));
    }

    let blob = blob.ok_or_else(|| {
        CaptureError::ShaderCompile(format!("{entry_name}: D3DCompile returned no blob"))
    })?;
    let ptr = unsafe { blob.GetBufferPointer() } as *const u8;
    let len = unsafe { blob.GetBufferSize() };
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
}
