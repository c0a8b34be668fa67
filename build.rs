use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// The five fixed shader programs of the conversion pipeline:
/// entry point, fxc target profile, and the env var through which
/// `shaders.rs` locates the compiled bytecode for `include_bytes!`.
const PROGRAMS: [(&str, &str, &str); 5] = [
    ("scene_vs", "vs_5_0", "SCENE_VS_CSO_PATH"),
    ("scene_ps", "ps_5_0", "SCENE_PS_CSO_PATH"),
    ("luma_ps", "ps_5_0", "LUMA_PS_CSO_PATH"),
    ("chroma_vs", "vs_5_0", "CHROMA_VS_CSO_PATH"),
    ("chroma_ps", "ps_5_0", "CHROMA_PS_CSO_PATH"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/platform/windows/convert.hlsl");
    println!("cargo:rustc-check-cfg=cfg(has_precompiled_shaders)");
    println!("cargo:rerun-if-env-changed=VRAM_CAPTURE_FXC_PATH");
    println!("cargo:rerun-if-env-changed=VRAM_CAPTURE_PRECOMPILE_SHADER");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "windows" {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let hlsl_path = PathBuf::from("src/platform/windows/convert.hlsl");

    if !hlsl_path.exists() {
        return;
    }

    // Optional escape hatch:
    // VRAM_CAPTURE_PRECOMPILE_SHADER=0 disables build-time fxc compilation.
    let precompile_enabled = env::var("VRAM_CAPTURE_PRECOMPILE_SHADER")
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            !(v == "0" || v == "false" || v == "no" || v == "off")
        })
        .unwrap_or(true);
    if !precompile_enabled {
        println!(
            "cargo:warning=VRAM_CAPTURE_PRECOMPILE_SHADER is disabled; will use runtime D3DCompile fallback"
        );
        return;
    }

    // All five programs are required by the pipeline, so the precompiled
    // path is taken only when every one of them compiles. A partial set
    // would leave shaders.rs mixing build-time and runtime bytecode for
    // no benefit.
    let mut env_lines = Vec::new();
    for (entry, profile, env_name) in PROGRAMS {
        let cso_path = out_dir.join(format!("{entry}.cso"));
        match compile_with_fxc(&hlsl_path, &cso_path, entry, profile) {
            Ok(()) => env_lines.push(format!(
                "cargo:rustc-env={env_name}={}",
                cso_path.display()
            )),
            Err(detail) => {
                println!(
                    "cargo:warning=failed to precompile {entry} with fxc ({detail}); will use runtime D3DCompile fallback"
                );
                return;
            }
        }
    }

    for line in env_lines {
        println!("{line}");
    }
    println!("cargo:rustc-cfg=has_precompiled_shaders");
}

fn compile_with_fxc(
    hlsl_path: &Path,
    cso_path: &Path,
    entry_point: &str,
    profile: &str,
) -> Result<(), String> {
    let mut attempts = Vec::new();
    let mut attempted = false;
    for fxc in fxc_candidates() {
        if !is_path_lookup(&fxc) && !fxc.is_file() {
            continue;
        }
        attempted = true;
        match Command::new(&fxc)
            .args(["/T", profile, "/E", entry_point, "/O3", "/Fo"])
            .arg(cso_path)
            .arg(hlsl_path)
            .output()
        {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => {
                attempts.push(format!("{}: {}", fxc.display(), summarize_output(&output)))
            }
            Err(err) => attempts.push(format!("{}: {}", fxc.display(), err)),
        }
    }

    if !attempted {
        return Err(
            "no usable fxc.exe found (PATH/Windows SDK). set VRAM_CAPTURE_FXC_PATH to an explicit fxc path".to_string()
        );
    }

    Err(attempts.join(" | "))
}

fn is_path_lookup(path: &Path) -> bool {
    path.file_name().is_some()
        && path.parent().is_none()
        && path
            .file_name()
            .is_some_and(|name| name.eq_ignore_ascii_case("fxc.exe"))
}

fn summarize_output(output: &Output) -> String {
    let status = output
        .status
        .code()
        .map_or_else(|| "terminated".to_string(), |code| format!("exit {code}"));
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let mut diagnostic = if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        "no compiler diagnostic output".to_string()
    };
    if diagnostic.len() > 260 {
        diagnostic.truncate(260);
        diagnostic.push_str("...");
    }
    format!("{status}, {diagnostic}")
}

fn fxc_candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(path) = env::var("VRAM_CAPTURE_FXC_PATH") {
        let path = path.trim();
        if !path.is_empty() {
            out.push(PathBuf::from(path));
        }
    }

    out.push(PathBuf::from("fxc.exe"));

    if let Ok(bin_path) = env::var("WindowsSdkVerBinPath") {
        let bin = PathBuf::from(bin_path);
        out.push(bin.join("x64").join("fxc.exe"));
        out.push(bin.join("x86").join("fxc.exe"));
    }

    if let (Ok(sdk_dir), Ok(sdk_version)) =
        (env::var("WindowsSdkDir"), env::var("WindowsSDKVersion"))
    {
        let version = sdk_version.trim_matches(|c| c == '\\' || c == '/');
        if !version.is_empty() {
            let bin = PathBuf::from(sdk_dir).join("bin").join(version);
            out.push(bin.join("x64").join("fxc.exe"));
            out.push(bin.join("x86").join("fxc.exe"));
        }
    }

    out.extend(scan_windows_kits_fxc());

    dedup_paths(out)
}

fn scan_windows_kits_fxc() -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(program_files) = env::var("ProgramFiles(x86)") else {
        return out;
    };

    let kits_bin = PathBuf::from(program_files)
        .join("Windows Kits")
        .join("10")
        .join("bin");
    let Ok(entries) = std::fs::read_dir(&kits_bin) else {
        return out;
    };

    let mut versions: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    // Prefer the newest SDK version.
    versions.sort();
    versions.reverse();

    for version in versions {
        out.push(version.join("x64").join("fxc.exe"));
        out.push(version.join("x86").join("fxc.exe"));
    }
    out
}

fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = Vec::new();
    for path in paths {
        if !seen.contains(&path) {
            seen.push(path);
        }
    }
    seen
}
