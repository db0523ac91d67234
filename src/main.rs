//! Git extension that externalizes large binary objects into a
//! content-addressed local store synced to remotes.
//!
//! Binary crate entry point. All CLI logic lives in the `git_lob` library
//! crate's `cli` module.

fn main() {
    git_lob::cli::run();
}
