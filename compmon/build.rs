//! Stamps the binary with the source revision it was built from

use std::env;
use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    let revision = revision.trim();
    (!revision.is_empty()).then(|| revision.to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-env-changed=COMPMON_REVISION");

    // A packaged source tree has no git metadata; let the packager supply it
    let revision = env::var("COMPMON_REVISION")
        .ok()
        .or_else(git_revision)
        .unwrap_or_else(|| "unversioned".to_string());

    let stamps = [
        ("COMPMON_REVISION", revision),
        (
            "COMPMON_BUILT_AT",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ),
        (
            "COMPMON_PROFILE",
            env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
        ),
    ];
    for (key, value) in stamps {
        println!("cargo:rustc-env={}={}", key, value);
    }
}
