//! Stamps the `frontdesk --version` string at compile time.
//!
//! Release builds report the package version. Builds from a git checkout
//! append the short commit, plus `-dirty` for uncommitted changes.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let package = env!("CARGO_PKG_VERSION");
    let version = match commit_stamp() {
        Some(stamp) => format!("{package} ({stamp})"),
        None => package.to_string(),
    };

    println!("cargo:rustc-env=FRONTDESK_VERSION={version}");
}

/// Short commit hash, or `None` outside a git checkout.
fn commit_stamp() -> Option<String> {
    let commit = git(&["rev-parse", "--short", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|changes| !changes.is_empty());

    Some(if dirty {
        format!("{commit}-dirty")
    } else {
        commit
    })
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}
