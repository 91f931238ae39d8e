// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=FRAME_CAPTURE_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("FRAME_CAPTURE_VERSION").unwrap_or_else(|_| {
        let package = env!("CARGO_PKG_VERSION");
        match short_commit() {
            Some(commit) => format!("{}-{}", package, commit),
            None => package.to_string(),
        }
    });

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Abbreviated hash of HEAD, if built from a git checkout
fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
