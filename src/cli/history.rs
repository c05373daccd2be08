//! Location of the REPL history file.
//!
//! History lives in `~/.tablet_history` by default. The `TABLET_HISTORY`
//! environment variable overrides the location; setting it to an empty
//! string disables history persistence. rustyline handles the actual
//! file I/O.

use std::env;
use std::path::PathBuf;

const DEFAULT_HISTORY_FILE: &str = ".tablet_history";
const HISTORY_ENV_VAR: &str = "TABLET_HISTORY";

pub fn history_path() -> Option<PathBuf> {
    if let Ok(custom_path) = env::var(HISTORY_ENV_VAR) {
        if custom_path.is_empty() {
            return None;
        }
        return Some(PathBuf::from(custom_path));
    }

    home_dir().map(|home| home.join(DEFAULT_HISTORY_FILE))
}

fn home_dir() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}
