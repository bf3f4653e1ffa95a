use std::env;

fn main() {
    // gdal-sys exports the detected library version as `DEP_GDAL_VERSION_NUMBER`,
    // encoded as MAJOR * 1_000_000 + MINOR * 10_000 + PATCH * 100.
    let gdal_version_string = env::var("DEP_GDAL_VERSION_NUMBER")
        .expect("gdal-sys did not export DEP_GDAL_VERSION_NUMBER");
    let gdal_version = gdal_version_string
        .parse::<i64>()
        .expect("Could not convert gdal version string into number.");
    let major = gdal_version / 1_000_000;
    let minor = (gdal_version - major * 1_000_000) / 10_000;
    let patch = (gdal_version - major * 1_000_000 - minor * 10_000) / 100;

    if major < 3 {
        panic!("pog requires GDAL >= 3.1 (COG driver), found {major}.{minor}.{patch}");
    }

    println!("cargo:rustc-cfg=major_is_{major}");
    for m in 3..=major {
        println!("cargo:rustc-cfg=major_ge_{m}");
    }
    for m in 0..=minor {
        println!("cargo:rustc-cfg=minor_ge_{m}");
    }

    // 64-bit integer bands and their no-data accessors arrived in 3.5, Int8 in 3.7.
    if major > 3 || minor >= 5 {
        println!("cargo:rustc-cfg=gdal_has_int64");
    }
    if major > 3 || minor >= 7 {
        println!("cargo:rustc-cfg=gdal_has_int8");
    }
}
