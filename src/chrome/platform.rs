use std::path::{Path, PathBuf};

use super::ChromeError;

/// Find a Chrome or Chromium executable.
///
/// Checks the `CHROME_PATH` environment variable first, then falls back to
/// platform well-known paths.
///
/// # Errors
///
/// Returns `ChromeError::NotFound` if no executable can be located.
pub fn find_chrome_executable() -> Result<PathBuf, ChromeError> {
    let env_override = std::env::var("CHROME_PATH").ok().map(PathBuf::from);
    find_chrome_from(env_override.as_deref())
}

/// Testable core of [`find_chrome_executable`]: accepts the environment
/// override as a parameter instead of reading `CHROME_PATH` directly.
fn find_chrome_from(env_override: Option<&Path>) -> Result<PathBuf, ChromeError> {
    if let Some(p) = env_override {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
    }

    for candidate in chrome_candidates() {
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ChromeError::NotFound(
        "could not find a Chrome or Chromium executable. \
         Use --chrome-path to specify one"
            .into(),
    ))
}

/// Candidate executable paths for the current platform.
fn chrome_candidates() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        let mut candidates = Vec::new();
        for var in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(base) = std::env::var(var) {
                candidates.push(
                    PathBuf::from(base)
                        .join("Google")
                        .join("Chrome")
                        .join("Application")
                        .join("chrome.exe"),
                );
            }
        }
        candidates
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("my-chrome");
        std::fs::write(&exe, b"").unwrap();

        let found = find_chrome_from(Some(&exe)).unwrap();
        assert_eq!(found, exe);
    }

    #[test]
    fn missing_env_override_falls_through() {
        let ghost = Path::new("/definitely/not/a/real/chrome");
        // Either a system browser is found or NotFound is returned; the
        // override path itself must never be the answer.
        match find_chrome_from(Some(ghost)) {
            Ok(found) => assert_ne!(found, ghost),
            Err(ChromeError::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn candidates_are_absolute() {
        for candidate in chrome_candidates() {
            assert!(candidate.is_absolute(), "{}", candidate.display());
        }
    }
}
