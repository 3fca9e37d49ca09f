fn main() {
    #[cfg(feature = "litepcie")]
    {
        // liblitepcie headers/library from the board's software/user tree
        let include = std::env::var("LITEPCIE_INCLUDE")
            .unwrap_or_else(|_| "/usr/local/include/liblitepcie".to_string());

        cc::Build::new()
            .file("csrc/litepcie_shim.c")
            .include(&include)
            .flag("-Wno-unused-parameter")
            .flag("-O2")
            .compile("litepcie_shim");

        if let Ok(dir) = std::env::var("LITEPCIE_LIB") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
        println!("cargo:rustc-link-lib=litepcie");
        println!("cargo:rerun-if-changed=csrc/litepcie_shim.c");
        println!("cargo:rerun-if-env-changed=LITEPCIE_INCLUDE");
        println!("cargo:rerun-if-env-changed=LITEPCIE_LIB");
    }
}
