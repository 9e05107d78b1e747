/// Resolved path of `terminal-notifier`, preferring Homebrew installs over a
/// bare PATH lookup. Resolved once per process.
#[cfg(target_os = "macos")]
pub fn notifier_path() -> &'static std::path::Path {
    use std::path::{Path, PathBuf};
    use std::sync::OnceLock;

    const CANDIDATES: &[&str] = &[
        "/opt/homebrew/bin/terminal-notifier",
        "/usr/local/bin/terminal-notifier",
    ];
    static NOTIFIER: OnceLock<PathBuf> = OnceLock::new();
    NOTIFIER.get_or_init(|| {
        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("terminal-notifier"))
    })
}

/// A `Command` that does not flash a console window.
#[cfg(target_os = "windows")]
pub fn hidden_command(program: &str) -> std::process::Command {
    use std::os::windows::process::CommandExt;

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    let mut command = std::process::Command::new(program);
    command.creation_flags(CREATE_NO_WINDOW);
    command
}
