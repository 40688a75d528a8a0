// build.rs
// Compiles the GLSL sources in resources/shaders into the SPIR-V binaries the
// engine loads at startup: shaders/vert.spv and shaders/frag.spv at the workspace root.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install Vulkan SDK and set VULKAN_SDK environment variable");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{vulkan_sdk}\\Bin\\glslc.exe")
    } else {
        format!("{vulkan_sdk}/bin/glslc")
    };

    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {glslc}");
        panic!("Shader compiler not found");
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let shader_dir = manifest_dir.join("resources/shaders");
    let target_dir = manifest_dir.join("../shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {}: {e}", target_dir.display());
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {}", shader_dir.display());
            return;
        }
    };

    let mut compiled_count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        // shader.vert -> vert.spv, shader.frag -> frag.spv
        let Some(stage) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if !matches!(stage, "vert" | "frag") {
            continue;
        }
        let out_file = target_dir.join(stage).with_extension("spv");

        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src_time), Ok(dst_time)) => src_time <= dst_time,
                _ => false,
            },
            _ => false,
        };
        if up_to_date {
            eprintln!("info: Shader {} is up to date", path.display());
            continue;
        }

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {}", path.display(), out_file.display());
                compiled_count += 1;
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {} with exit code: {}", path.display(), s.code().unwrap_or(-1));
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {}: {e}", path.display());
                panic!("Failed to execute shader compiler");
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {compiled_count} shader(s)");
    }
}
