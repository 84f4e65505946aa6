use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn main() {
    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let branch =
        git(&["branch", "--show-current"]).unwrap_or_else(|| "unknown".to_string());
    let tag = git(&["tag", "--points-at", "HEAD"]).filter(|s| !s.is_empty());

    println!("cargo:rustc-env=AUTONOMIX_GIT_COMMIT={}", commit);
    println!("cargo:rustc-env=AUTONOMIX_GIT_BRANCH={}", branch);

    if let Some(tag) = tag {
        println!("cargo:rustc-env=AUTONOMIX_GIT_TAG={}", tag);
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}
