//! Version strings shown by `--version` and in the startup log line.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Full commit hash, or `unknown` for builds outside a git checkout.
pub const GIT_COMMIT_HASH: &str = env!("DATACENTER_IMPORT_GIT_COMMIT_HASH");
/// `0.1.0+<commit>`
pub const VERSION_WITH_COMMIT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+",
    env!("DATACENTER_IMPORT_GIT_COMMIT_HASH")
);

const SHORT_HASH_LEN: usize = 12;

/// First twelve characters of the commit hash.
pub fn short_commit_hash() -> &'static str {
    GIT_COMMIT_HASH
        .get(..SHORT_HASH_LEN)
        .unwrap_or(GIT_COMMIT_HASH)
}
