fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_CUDA");

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if target_os != "linux" || std::env::var_os("CARGO_FEATURE_CUDA").is_some() {
        return;
    }

    let lib_cuda = if target_arch == "x86_64" {
        "/usr/lib/x86_64-linux-gnu/libcuda.so"
    } else if target_arch == "aarch64" {
        "/usr/lib/aarch64-linux-gnu/libcuda.so"
    } else {
        ""
    };

    if !lib_cuda.is_empty() && std::path::Path::new(lib_cuda).exists() {
        println!(
            "cargo:warning=found {} but the `cuda` feature is off; models will run on CPU",
            lib_cuda
        );
    }
}
