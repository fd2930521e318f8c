//! Button actions and the click dispatch table.
//!
//! A [`DispatchTable`] is built once from a [`Deck`] and maps every visible
//! `(button index, event)` pair to what should happen: run an [`Action`]
//! through an [`ActionExecutor`], open the customisation UI, or just report
//! a status line because the button has nothing configured.
//!
//! Hotkeys are stored as `+`-joined key names (`"Ctrl+Shift+T"`).  They are
//! matched case-insensitively, so [`Hotkey`] keeps the lower-cased tokens.

use crate::config::{ActionType, ButtonConfig, Deck};
use crate::traits::ActionExecutor;
use log::{error, info};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// URL pre-filled by the editor; treated as "no URL".
const URL_PLACEHOLDER: &str = "https://";
/// Typed text is shortened to this many characters in status lines.
const STATUS_TEXT_CHARS: usize = 30;

//  Hotkeys

/// The hotkey string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hotkey {0:?}")]
pub struct InvalidHotkey(String);

/// A key or key combination, e.g. `ctrl+shift+t`.
///
/// The last key is the main key; the others are held while it is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    keys: Vec<String>,
}

impl Hotkey {
    /// Parse `+`-separated key names.  Tokens are trimmed and lower-cased;
    /// an empty token (`"ctrl++"`, `""`) is an error.
    pub fn parse(s: &str) -> Result<Self, InvalidHotkey> {
        let keys: Vec<String> = s.split('+').map(|k| k.trim().to_lowercase()).collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(InvalidHotkey(s.to_string()));
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Whether more than one key is involved.
    pub fn is_chord(&self) -> bool {
        self.keys.len() > 1
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keys.join("+"))
    }
}

/// Map a toolkit key name to the name stored in hotkey strings.
///
/// Left/right modifier variants collapse to `Ctrl`, `Alt`, `Shift` and
/// `Win`; every other name is returned unchanged.
pub fn normalize_key_name(keysym: &str) -> &str {
    match keysym {
        "Control_L" | "Control_R" => "Ctrl",
        "Alt_L" | "Alt_R" => "Alt",
        "Shift_L" | "Shift_R" => "Shift",
        "Win_L" | "Win_R" | "Super_L" | "Super_R" => "Win",
        other => other,
    }
}

/// Build the stored form of a recorded key combination.
///
/// Names are normalised and de-duplicated, modifiers come first in the
/// order Ctrl, Alt, Shift, Win, and other keys follow in the order they
/// were pressed.
pub fn canonical_hotkey<'a>(pressed: impl IntoIterator<Item = &'a str>) -> String {
    fn rank(key: &str) -> u8 {
        match key {
            "Ctrl" => 0,
            "Alt" => 1,
            "Shift" => 2,
            "Win" => 3,
            _ => 4,
        }
    }
    let mut keys: Vec<&str> = Vec::new();
    for key in pressed.into_iter().map(normalize_key_name) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys.sort_by_key(|k| rank(k));
    keys.join("+")
}

//  Actions

/// Something a button press does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Launch(PathBuf),
    OpenUrl(String),
    PressKeys(Hotkey),
    TypeText(String),
}

/// Input event on a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonEvent {
    /// Primary click: run the bound action.
    Press,
    /// Secondary click: open the button editor.
    Customize,
}

/// What the shell should do for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Run `action` for the button labelled `label`.
    Run { label: String, action: Action },
    /// Open the editor for this button.
    Customize(u32),
    /// Nothing to run; show the status line.
    Idle(String),
}

/// A button's resolved binding: the action, or the status to show instead.
#[derive(Debug, Clone)]
struct Binding {
    label: String,
    action_type: ActionType,
    action: Result<Action, String>,
}

impl Binding {
    fn new(config: &ButtonConfig) -> Self {
        let label = config.text.clone();
        let action = match config.action_type {
            ActionType::Open => match &config.app_path {
                Some(path) if !path.as_os_str().is_empty() => Ok(Action::Launch(path.clone())),
                _ => Err(format!("{} clicked!", label)),
            },
            ActionType::Website => match config.url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() && url != URL_PLACEHOLDER => {
                    Ok(Action::OpenUrl(url.to_string()))
                }
                _ => Err("No URL configured".to_string()),
            },
            ActionType::Hotkey => match config.hotkey.as_deref() {
                Some(keys) if !keys.trim().is_empty() => Hotkey::parse(keys)
                    .map(Action::PressKeys)
                    .map_err(|e| format!("Hotkey error: {}", e)),
                _ => Err("No hotkey configured".to_string()),
            },
            ActionType::Text => match &config.type_text {
                Some(text) if !text.is_empty() => Ok(Action::TypeText(text.clone())),
                _ => Err("No text configured".to_string()),
            },
            ActionType::MultiAction => Err("Multi Action - Coming soon!".to_string()),
        };
        Self {
            label,
            action_type: config.action_type,
            action,
        }
    }
}

/// `(button index, event) -> Dispatch`, enumerated once per deck snapshot.
///
/// Rebuild the table after the deck changes.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    bindings: BTreeMap<u32, Binding>,
}

impl DispatchTable {
    /// Bind every button visible in `deck`'s layout.
    pub fn build(deck: &Deck) -> Self {
        let bindings = deck
            .visible_indices()
            .map(|index| (index, Binding::new(&deck.button(index))))
            .collect();
        Self { bindings }
    }

    /// Number of bound buttons.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Decide what `event` on button `index` does.
    ///
    /// A launch target that does not exist (any more) resolves to the
    /// button's plain "clicked" status instead.
    pub fn resolve(&self, index: u32, event: ButtonEvent) -> Dispatch {
        let Some(binding) = self.bindings.get(&index) else {
            return Dispatch::Idle(format!("No button {}", index));
        };
        if event == ButtonEvent::Customize {
            return Dispatch::Customize(index);
        }
        match &binding.action {
            Ok(Action::Launch(path)) if !path.exists() => {
                Dispatch::Idle(format!("{} clicked!", binding.label))
            }
            Ok(action) => Dispatch::Run {
                label: binding.label.clone(),
                action: action.clone(),
            },
            Err(status) => Dispatch::Idle(status.clone()),
        }
    }

    /// Resolve `event` and carry it out with `executor`, returning the
    /// status line to show.  Executor failures are reported in the status,
    /// never propagated.
    pub fn dispatch<E: ActionExecutor>(&self, index: u32, event: ButtonEvent, executor: &E) -> String {
        if let Some(binding) = self.bindings.get(&index) {
            info!(
                "button {} ({}) - action: {}",
                index, binding.label, binding.action_type
            );
        }
        match self.resolve(index, event) {
            Dispatch::Idle(status) => status,
            Dispatch::Customize(index) => format!("Configure Key {}", index),
            Dispatch::Run { label, action } => run(&label, &action, executor),
        }
    }
}

fn run<E: ActionExecutor>(label: &str, action: &Action, executor: &E) -> String {
    let (result, ok, err_prefix) = match action {
        Action::Launch(path) => (
            executor.launch(path),
            format!("Launched: {}", label),
            "Error",
        ),
        Action::OpenUrl(url) => (executor.open_url(url), format!("Opened: {}", url), "Error"),
        Action::PressKeys(hotkey) => (
            executor.press_keys(hotkey),
            format!("Pressed: {}", hotkey),
            "Hotkey error",
        ),
        Action::TypeText(text) => (
            executor.type_text(text),
            format!("Typed: {}...", text.chars().take(STATUS_TEXT_CHARS).collect::<String>()),
            "Type error",
        ),
    };
    match result {
        Ok(()) => ok,
        Err(e) => {
            error!("{} failed: {}", label, e);
            format!("{}: {}", err_prefix, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutSettings;
    use crate::traits::testing::{Call, RecordingExecutor};

    fn deck_with(index: u32, edit: impl FnOnce(&mut ButtonConfig)) -> Deck {
        let mut deck = Deck::default();
        let mut config = ButtonConfig::new(index);
        edit(&mut config);
        deck.set_button(index, config);
        deck
    }

    #[test]
    fn hotkey_parsing_lowercases_and_trims() {
        let hk = Hotkey::parse(" Ctrl + Shift+T ").unwrap();
        assert_eq!(hk.keys(), ["ctrl", "shift", "t"]);
        assert!(hk.is_chord());
        assert_eq!(hk.to_string(), "ctrl+shift+t");
        assert!(!Hotkey::parse("F5").unwrap().is_chord());
        assert!(Hotkey::parse("ctrl++").is_err());
        assert!(Hotkey::parse("").is_err());
    }

    #[test]
    fn recorded_keys_are_canonicalised() {
        assert_eq!(canonical_hotkey(["t", "Shift_L", "Control_R"]), "Ctrl+Shift+t");
        assert_eq!(canonical_hotkey(["Super_L", "Alt_R", "Alt_L", "d"]), "Alt+Win+d");
        assert_eq!(canonical_hotkey(["a", "b", "Control_L", "a"]), "Ctrl+a+b");
        assert_eq!(normalize_key_name("Return"), "Return");
    }

    #[test]
    fn table_covers_visible_grid_only() {
        let mut deck = Deck::default();
        deck.set_button(20, ButtonConfig::new(20));
        let table = DispatchTable::build(&deck);
        assert_eq!(table.len(), 12);
        assert_eq!(
            table.resolve(20, ButtonEvent::Press),
            Dispatch::Idle("No button 20".into())
        );

        let mut deck = deck.clone();
        deck.apply_layout(LayoutSettings { columns: 8, rows: 8, ..LayoutSettings::default() })
            .unwrap();
        assert_eq!(DispatchTable::build(&deck).len(), 64);
    }

    #[test]
    fn secondary_click_customizes() {
        let table = DispatchTable::build(&Deck::default());
        assert_eq!(table.resolve(3, ButtonEvent::Customize), Dispatch::Customize(3));
        let exec = RecordingExecutor::default();
        assert_eq!(table.dispatch(3, ButtonEvent::Customize, &exec), "Configure Key 3");
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn unconfigured_open_reports_click() {
        let table = DispatchTable::build(&Deck::default());
        let exec = RecordingExecutor::default();
        assert_eq!(table.dispatch(1, ButtonEvent::Press, &exec), "Button 1 clicked!");
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn open_launches_existing_program() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("app");
        std::fs::write(&app, b"").unwrap();
        let deck = deck_with(2, |c| {
            c.text = "Editor".into();
            c.app_path = Some(app.clone());
        });
        let table = DispatchTable::build(&deck);
        let exec = RecordingExecutor::default();
        assert_eq!(table.dispatch(2, ButtonEvent::Press, &exec), "Launched: Editor");
        assert_eq!(exec.calls(), vec![Call::Launch(app)]);
    }

    #[test]
    fn open_with_missing_program_does_not_launch() {
        let deck = deck_with(2, |c| {
            c.text = "Gone".into();
            c.app_path = Some(PathBuf::from("/definitely/not/here"));
        });
        let table = DispatchTable::build(&deck);
        assert_eq!(
            table.resolve(2, ButtonEvent::Press),
            Dispatch::Idle("Gone clicked!".into())
        );
    }

    #[test]
    fn website_requires_real_url() {
        let deck = deck_with(1, |c| {
            c.action_type = ActionType::Website;
            c.url = Some("https://".into());
        });
        let table = DispatchTable::build(&deck);
        assert_eq!(
            table.resolve(1, ButtonEvent::Press),
            Dispatch::Idle("No URL configured".into())
        );

        let deck = deck_with(1, |c| {
            c.action_type = ActionType::Website;
            c.url = Some("https://example.org".into());
        });
        let exec = RecordingExecutor::default();
        let status = DispatchTable::build(&deck).dispatch(1, ButtonEvent::Press, &exec);
        assert_eq!(status, "Opened: https://example.org");
        assert_eq!(exec.calls(), vec![Call::OpenUrl("https://example.org".into())]);
    }

    #[test]
    fn hotkey_and_text_actions() {
        let mut deck = deck_with(1, |c| {
            c.action_type = ActionType::Hotkey;
            c.hotkey = Some("Ctrl+Alt+T".into());
        });
        let mut typed = ButtonConfig::new(2);
        typed.action_type = ActionType::Text;
        typed.type_text = Some("x".repeat(40));
        deck.set_button(2, typed);
        let table = DispatchTable::build(&deck);
        let exec = RecordingExecutor::default();

        assert_eq!(table.dispatch(1, ButtonEvent::Press, &exec), "Pressed: ctrl+alt+t");
        assert_eq!(
            table.dispatch(2, ButtonEvent::Press, &exec),
            format!("Typed: {}...", "x".repeat(30))
        );
        assert_eq!(
            exec.calls(),
            vec![
                Call::PressKeys("ctrl+alt+t".into()),
                Call::TypeText("x".repeat(40)),
            ]
        );
    }

    #[test]
    fn missing_payloads_report_status() {
        let mut deck = Deck::default();
        for (index, action_type) in [
            (1, ActionType::Hotkey),
            (2, ActionType::Text),
            (3, ActionType::MultiAction),
        ] {
            let mut c = ButtonConfig::new(index);
            c.action_type = action_type;
            deck.set_button(index, c);
        }
        let table = DispatchTable::build(&deck);
        let exec = RecordingExecutor::default();
        assert_eq!(table.dispatch(1, ButtonEvent::Press, &exec), "No hotkey configured");
        assert_eq!(table.dispatch(2, ButtonEvent::Press, &exec), "No text configured");
        assert_eq!(
            table.dispatch(3, ButtonEvent::Press, &exec),
            "Multi Action - Coming soon!"
        );
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn malformed_hotkey_reports_error() {
        let deck = deck_with(1, |c| {
            c.action_type = ActionType::Hotkey;
            c.hotkey = Some("ctrl++".into());
        });
        match DispatchTable::build(&deck).resolve(1, ButtonEvent::Press) {
            Dispatch::Idle(status) => assert!(status.starts_with("Hotkey error"), "{}", status),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn executor_failure_becomes_status() {
        let deck = deck_with(1, |c| {
            c.action_type = ActionType::Website;
            c.url = Some("https://example.org".into());
        });
        let exec = RecordingExecutor::failing();
        let status = DispatchTable::build(&deck).dispatch(1, ButtonEvent::Press, &exec);
        assert_eq!(status, "Error: mock executor failure");
    }
}
