use std::process::Command;

fn main() {
    let rustc_version = Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .unwrap_or_else(|| "unknown".to_string());

    println!(
        "cargo:rustc-env=DRUID_EKS_RUSTC_VERSION={}",
        rustc_version.trim()
    );

    // serde_yaml is the parser every template document goes through; surface
    // its resolved version in `--version` output.
    let yaml_version = read_dep_version("serde_yaml").unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=DRUID_EKS_SERDE_YAML_VERSION={yaml_version}");
}

fn read_dep_version(crate_name: &str) -> Option<String> {
    // Parse the lock file to find the exact resolved version
    let lock_contents = std::fs::read_to_string("Cargo.lock").ok()?;
    let mut found = false;
    for line in lock_contents.lines() {
        if line.starts_with("name = ") && line.trim_start_matches("name = ").trim_matches('"') == crate_name {
            found = true;
            continue;
        }
        if found && line.starts_with("version = ") {
            return Some(
                line.trim_start_matches("version = ")
                    .trim_matches('"')
                    .to_string(),
            );
        }
        if found && line.trim().is_empty() {
            break;
        }
    }
    None
}
