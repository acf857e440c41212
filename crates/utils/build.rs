use std::process::Command;

fn main() {
    // Git commit (short hash); Docker builds pass it in through the environment
    let commit = std::env::var("KANBAN_GIT_COMMIT")
        .ok()
        .filter(|s| !s.is_empty() && s != "unknown")
        .or_else(|| git(&["rev-parse", "--short", "HEAD"]));
    if let Some(commit) = commit {
        println!("cargo:rustc-env=KANBAN_GIT_COMMIT={}", commit);
    }

    let branch = std::env::var("KANBAN_GIT_BRANCH")
        .ok()
        .filter(|s| !s.is_empty() && s != "unknown")
        .or_else(|| git(&["rev-parse", "--abbrev-ref", "HEAD"]));
    if let Some(branch) = branch {
        println!("cargo:rustc-env=KANBAN_GIT_BRANCH={}", branch);
    }

    // Build timestamp (ISO 8601 format)
    if let Ok(output) = Command::new("date")
        .args(["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .output()
        && output.status.success()
    {
        let timestamp = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=KANBAN_BUILD_TIMESTAMP={}", timestamp);
    }

    println!("cargo:rerun-if-env-changed=KANBAN_GIT_COMMIT");
    println!("cargo:rerun-if-env-changed=KANBAN_GIT_BRANCH");
}

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}
