fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // The USDT shim is only built for the `usdt` feature.
    #[cfg(feature = "usdt")]
    compile_probe();
}

#[cfg(feature = "usdt")]
fn compile_probe() {
    use std::env;

    let mut build = cc::Build::new();

    build
        .file("native/btrace_probe.c")
        .flag_if_supported("-O2")
        // Keep the probe function out of line so the probe site survives.
        .flag_if_supported("-fno-inline");

    // Linux needs systemtap's <sys/sdt.h>; point here if it is not on the
    // default include path.
    if let Ok(include) = env::var("BTRACE_SDT_INCLUDE") {
        build.include(include);
    }

    build.compile("btrace_probe");

    println!("cargo:rerun-if-changed=native/btrace_probe.c");
    println!("cargo:rerun-if-env-changed=BTRACE_SDT_INCLUDE");
}
