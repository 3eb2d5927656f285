use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a unique temporary directory and points `TOKEN_FILE` at a file
/// inside it for the duration of the test. The directory is automatically
/// cleaned up when the returned `TempDir` is dropped.
///
/// Keep the returned `TempDir` in scope for as long as you need the file.
pub fn setup_test_token_file() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let abs = tmp
        .path()
        .canonicalize()
        .unwrap_or_else(|_| tmp.path().to_path_buf());
    let token_file = abs.join("credentials").join("token");
    unsafe {
        env::set_var("TOKEN_FILE", &token_file);
    }
    (tmp, token_file)
}
