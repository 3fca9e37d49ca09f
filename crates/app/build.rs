// Copyright 2025-2026 CEMAXECUTER LLC

fn main() {
    // liblitepcie outside the default search path: embed an rpath so the
    // binaries start without LD_LIBRARY_PATH.
    #[cfg(feature = "litepcie")]
    {
        if let Ok(dir) = std::env::var("LITEPCIE_LIB") {
            if std::path::Path::new(&dir).is_dir() {
                println!("cargo:rustc-link-arg=-Wl,-rpath,{}", dir);
            }
        }
        println!("cargo:rerun-if-env-changed=LITEPCIE_LIB");
    }
}
