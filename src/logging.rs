use color_eyre::eyre::{eyre, Result};
use std::ffi::OsString;
use std::path::PathBuf;

/// Installs a global `tracing` subscriber appending to `<state dir>/<app>/debug.log`.
/// The terminal belongs to the TUI, so nothing is written to stderr.
pub fn setup_verbose_logging(app: &str) -> Result<PathBuf> {
    let state_dir = state_dir_from(
        std::env::var_os("XDG_STATE_HOME"),
        std::env::var_os("HOME"),
        app,
    );
    std::fs::create_dir_all(&state_dir)
        .map_err(|e| eyre!("Failed to create log directory {state_dir:?}: {e}"))?;
    let log_path = state_dir.join("debug.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| eyre!("Failed to open log file {log_path:?}: {e}"))?;
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install logger: {e}"))?;
    tracing::info!("{app} v{} starting with verbose logging", env!("CARGO_PKG_VERSION"));
    Ok(log_path)
}

/// `$XDG_STATE_HOME/<app>`, else `~/.local/state/<app>`, else `/tmp/<app>`.
pub fn state_dir_from(xdg_state: Option<OsString>, home: Option<OsString>, app: &str) -> PathBuf {
    if let Some(state) = xdg_state.filter(|s| !s.is_empty()) {
        PathBuf::from(state).join(app)
    } else if let Some(home) = home.filter(|h| !h.is_empty()) {
        PathBuf::from(home).join(".local").join("state").join(app)
    } else {
        PathBuf::from("/tmp").join(app)
    }
}
