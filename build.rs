use std::process::Command;

/// Stamps the commit the importer was built from into
/// `DATACENTER_IMPORT_GIT_COMMIT_HASH`.
///
/// CI passes `SOURCE_COMMIT_HASH` because release tarballs carry no `.git`.
fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_COMMIT_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let commit = std::env::var("SOURCE_COMMIT_HASH")
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(git_head)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=DATACENTER_IMPORT_GIT_COMMIT_HASH={commit}");
}

fn git_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!hash.is_empty()).then_some(hash)
}
