//! Shade integration tests. The UI cases under `cases/` are compiled through
//! the whole pipeline, and the cache and session properties are checked on
//! top of real compilations.

mod properties;

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// Whether or not the UI tests should re-generate the output.
pub static REGENERATE_OUTPUT: Lazy<bool> = Lazy::new(|| {
    std::option_env!("REGENERATE_OUTPUT").and_then(|value| value.parse().ok()).unwrap_or(false)
});

/// The directory that holds the UI cases.
pub fn cases_directory() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("cases")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_regenerate_output_is_disabled() {
        assert!(
            !*REGENERATE_OUTPUT,
            "
        Verify that the `REGENERATE_OUTPUT` flag is not accidentally left
        on making all of the test cases that observe compiler output
        automatically overwrite old results with current ones.
        "
        );
    }

    #[test]
    fn cases_directory_exists() {
        assert!(cases_directory().is_dir());
    }
}
