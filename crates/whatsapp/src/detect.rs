//! Chromium executable discovery.

use std::path::{Path, PathBuf};

/// Environment variables consulted, in order, before well-known paths.
const PATH_ENV_VARS: &[&str] = &["PUPPETEER_EXECUTABLE_PATH", "CHROME_BIN", "CHROME"];

const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/nix/var/nix/profiles/default/bin/chromium",
    "/root/.nix-profile/bin/chromium",
    #[cfg(target_os = "macos")]
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    #[cfg(target_os = "macos")]
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Names looked up on `PATH` as a last resort.
const EXECUTABLE_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub path: Option<PathBuf>,
    /// Install guidance; empty when a browser was found.
    pub install_hint: String,
}

impl DetectionResult {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }

    fn found_at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            install_hint: String::new(),
        }
    }
}

/// Locate a Chromium executable.
///
/// Checks the configured path, then `PUPPETEER_EXECUTABLE_PATH`, `CHROME_BIN`
/// and `CHROME`, then a list of well-known install locations, then `PATH`.
pub fn detect_chrome(custom_path: Option<&Path>) -> DetectionResult {
    detect_chrome_with(
        custom_path,
        |name| std::env::var(name).ok(),
        |path| path.exists(),
        |name| which::which(name).ok(),
    )
}

/// [`detect_chrome`] with injectable environment, filesystem and `PATH` lookups.
pub fn detect_chrome_with(
    custom_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    exists: impl Fn(&Path) -> bool,
    which: impl Fn(&str) -> Option<PathBuf>,
) -> DetectionResult {
    let from_env = PATH_ENV_VARS
        .iter()
        .filter_map(|name| env(name))
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);
    let candidates = custom_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(from_env)
        .chain(WELL_KNOWN_PATHS.iter().map(PathBuf::from));

    for candidate in candidates {
        if exists(&candidate) {
            return DetectionResult::found_at(candidate);
        }
        tracing::debug!(path = %candidate.display(), "chromium candidate missing");
    }

    if let Some(path) = EXECUTABLE_NAMES.iter().find_map(|name| which(name)) {
        return DetectionResult::found_at(path);
    }

    DetectionResult {
        path: None,
        install_hint: install_instructions(),
    }
}

pub fn install_instructions() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "linux") {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:        sudo dnf install chromium\n  \
         Nix:           nix-env -iA nixpkgs.chromium"
    } else {
        "  Download from https://www.google.com/chrome/"
    };

    format!(
        "No Chromium-based browser found. Install one:\n\n\
         {instructions}\n\n\
         Or set the path manually:\n  \
         [channel]\n  \
         chrome_path = \"/path/to/chromium\"\n\n\
         Or set PUPPETEER_EXECUTABLE_PATH / CHROME_BIN."
    )
}
