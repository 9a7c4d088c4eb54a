//! Stamps the build date and time shown by `liquid-rib version`.
//!
//! Reproducible builds pin both by exporting `LIQUID_RIB_BUILD_DATE` and
//! `LIQUID_RIB_BUILD_TIME` before building.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=LIQUID_RIB_BUILD_DATE");
    println!("cargo:rerun-if-env-changed=LIQUID_RIB_BUILD_TIME");

    let now = time::OffsetDateTime::now_utc();
    let stamp = |var: &str, pattern: &str| {
        std::env::var(var).unwrap_or_else(|_| {
            time::format_description::parse(pattern)
                .ok()
                .and_then(|fmt| now.format(&fmt).ok())
                .unwrap_or_else(|| "unknown".to_string())
        })
    };

    let date = stamp("LIQUID_RIB_BUILD_DATE", "[year]-[month]-[day]");
    let time = stamp("LIQUID_RIB_BUILD_TIME", "[hour]:[minute]:[second] UTC");

    println!("cargo:rustc-env=LIQUID_RIB_BUILD_DATE={date}");
    println!("cargo:rustc-env=LIQUID_RIB_BUILD_TIME={time}");
}
