use std::env;
use std::process::Command;

/// Short hash of the commit being built: `LOADSYNTH_GIT_SHA` when set, else asked to git
fn git_sha() -> Option<String> {
    let from_env = env::var("LOADSYNTH_GIT_SHA").ok().map(|s| s.trim().to_string());
    if from_env.is_some() {
        return from_env.filter(|s| !s.is_empty());
    }

    let output = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    for watched in ["env=LOADSYNTH_GIT_SHA", "changed=.git/HEAD", "changed=.git/refs"] {
        println!("cargo:rerun-if-{}", watched);
    }

    if let Some(sha) = git_sha() {
        println!("cargo:rustc-env=LOADSYNTH_GIT_SHA={}", sha);
    }
}
