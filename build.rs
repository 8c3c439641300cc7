use std::process::Command;

fn main() {
    // Build timestamp and build ID shown by `energy-monitor --about`
    let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let build_id = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
    println!("cargo:rustc-env=ENERGY_MONITOR_BUILD_TIME={}", timestamp);
    println!("cargo:rustc-env=ENERGY_MONITOR_BUILD_ID={}", build_id);

    println!("cargo:rerun-if-changed=.git/HEAD");

    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=ENERGY_MONITOR_GIT_HASH={}", git_hash);
}
