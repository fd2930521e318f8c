//! [`ActionExecutor`] implementations.
//!
//! [`SystemExecutor`] performs actions for real by spawning processes: the
//! target program itself, the platform URL opener, and `xdotool` for
//! keystrokes and typing.  [`DryRunExecutor`] only logs what would happen.

use crate::action::Hotkey;
use crate::traits::ActionExecutor;
use log::{debug, info, warn};
use std::convert::Infallible;
use std::path::Path;
use std::process::{Command, ExitStatus};

/// Delay between typed characters, in milliseconds.
const TYPE_DELAY_MS: u32 = 50;

/// Errors from spawning helper processes.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Executes actions on the local desktop.
///
/// Programs and the URL opener are started detached; keystroke injection
/// waits for the helper to finish so failures can be reported.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    keystroke_tool: String,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self {
            keystroke_tool: "xdotool".into(),
        }
    }
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `xdotool`-compatible binary for key injection.
    pub fn with_keystroke_tool(mut self, tool: impl Into<String>) -> Self {
        self.keystroke_tool = tool.into();
        self
    }

    /// Start `command` without waiting for it.  A background thread reaps
    /// the child so a long-running host does not collect zombies.
    fn spawn_detached(&self, mut command: Command) -> Result<(), ExecutorError> {
        let program = command.get_program().to_string_lossy().into_owned();
        debug!("spawning {:?}", command);
        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            program: program.clone(),
            source,
        })?;
        let _handle = std::thread::spawn(move || match child.wait() {
            Ok(status) => debug!("{} exited with {}", program, status),
            Err(e) => warn!("failed to wait for {}: {}", program, e),
        });
        Ok(())
    }

    fn run_to_completion(&self, mut command: Command) -> Result<(), ExecutorError> {
        let program = command.get_program().to_string_lossy().into_owned();
        debug!("running {:?}", command);
        let status = command.status().map_err(|source| ExecutorError::Spawn {
            program: program.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ExecutorError::Failed { program, status })
        }
    }
}

impl ActionExecutor for SystemExecutor {
    type Error = ExecutorError;

    fn launch(&self, app_path: &Path) -> Result<(), ExecutorError> {
        info!("launching {}", app_path.display());
        self.spawn_detached(Command::new(app_path))
    }

    fn open_url(&self, url: &str) -> Result<(), ExecutorError> {
        info!("opening {}", url);
        self.spawn_detached(url_opener(url))
    }

    fn press_keys(&self, hotkey: &Hotkey) -> Result<(), ExecutorError> {
        let combo = xdotool_combo(hotkey);
        info!("pressing {}", combo);
        let mut command = Command::new(&self.keystroke_tool);
        command.args(["key", "--clearmodifiers", combo.as_str()]);
        self.run_to_completion(command)
    }

    fn type_text(&self, text: &str) -> Result<(), ExecutorError> {
        info!("typing {} character(s)", text.chars().count());
        let mut command = Command::new(&self.keystroke_tool);
        command
            .arg("type")
            .arg("--delay")
            .arg(TYPE_DELAY_MS.to_string())
            .arg("--")
            .arg(text);
        self.run_to_completion(command)
    }
}

#[cfg(target_os = "macos")]
fn url_opener(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(windows)]
fn url_opener(url: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", url]);
    command
}

#[cfg(not(any(target_os = "macos", windows)))]
fn url_opener(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}

/// Translate stored key names to `xdotool` keysyms.
fn xdotool_key(name: &str) -> String {
    let mapped = match name {
        "ctrl" | "control" => "ctrl",
        "alt" => "alt",
        "shift" => "shift",
        "win" | "super" | "cmd" | "meta" => "super",
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "space" => "space",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "insert" | "ins" => "Insert",
        "home" => "Home",
        "end" => "End",
        "pageup" | "page_up" | "prior" => "Page_Up",
        "pagedown" | "page_down" | "next" => "Page_Down",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        other => {
            if let Some(n) = other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                return format!("F{}", n);
            }
            other
        }
    };
    mapped.to_string()
}

fn xdotool_combo(hotkey: &Hotkey) -> String {
    hotkey
        .keys()
        .iter()
        .map(|k| xdotool_key(k))
        .collect::<Vec<_>>()
        .join("+")
}

/// Logs every action instead of performing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl ActionExecutor for DryRunExecutor {
    type Error = Infallible;

    fn launch(&self, app_path: &Path) -> Result<(), Infallible> {
        info!("[dry run] would launch {}", app_path.display());
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<(), Infallible> {
        info!("[dry run] would open {}", url);
        Ok(())
    }

    fn press_keys(&self, hotkey: &Hotkey) -> Result<(), Infallible> {
        info!("[dry run] would press {}", xdotool_combo(hotkey));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), Infallible> {
        info!("[dry run] would type {:?}", text);
        Ok(())
    }
}
