//! The seam between the deck and the operating system.
//!
//! Launching programs, opening URLs and injecting keystrokes are all
//! platform-specific and untestable in isolation, so the
//! [`DispatchTable`](crate::action::DispatchTable) only talks to an
//! [`ActionExecutor`].  Concrete implementations live in
//! [`executor`](crate::executor).

use crate::action::Hotkey;
use std::path::Path;

/// Carries out button actions.
///
/// Every call is synchronous and one-shot: implementations report failure
/// through their error type and never retry.
pub trait ActionExecutor {
    /// The error type produced by this executor.
    type Error: std::error::Error + Send + 'static;

    /// Start the program at `app_path` without waiting for it to exit.
    fn launch(&self, app_path: &Path) -> Result<(), Self::Error>;

    /// Open `url` in the user's default browser.
    fn open_url(&self, url: &str) -> Result<(), Self::Error>;

    /// Press `hotkey`.  A chord holds every key but the last while the last
    /// one is pressed.
    fn press_keys(&self, hotkey: &Hotkey) -> Result<(), Self::Error>;

    /// Type `text` as if entered on the keyboard.
    fn type_text(&self, text: &str) -> Result<(), Self::Error>;
}

/// Test doubles shared by the unit tests of several modules.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// One recorded executor call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Launch(PathBuf),
        OpenUrl(String),
        PressKeys(String),
        TypeText(String),
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock executor failure")]
    pub struct MockError;

    /// Records every call; optionally fails all of them.
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        log: RefCell<Vec<Call>>,
        fail: bool,
    }

    impl RecordingExecutor {
        pub fn failing() -> Self {
            Self {
                log: RefCell::default(),
                fail: true,
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.log.borrow().clone()
        }

        fn record(&self, call: Call) -> Result<(), MockError> {
            self.log.borrow_mut().push(call);
            if self.fail {
                Err(MockError)
            } else {
                Ok(())
            }
        }
    }

    impl ActionExecutor for RecordingExecutor {
        type Error = MockError;

        fn launch(&self, app_path: &Path) -> Result<(), MockError> {
            self.record(Call::Launch(app_path.to_path_buf()))
        }

        fn open_url(&self, url: &str) -> Result<(), MockError> {
            self.record(Call::OpenUrl(url.to_string()))
        }

        fn press_keys(&self, hotkey: &Hotkey) -> Result<(), MockError> {
            self.record(Call::PressKeys(hotkey.to_string()))
        }

        fn type_text(&self, text: &str) -> Result<(), MockError> {
            self.record(Call::TypeText(text.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingExecutor};
    use super::*;

    #[test]
    fn recording_executor_logs_calls_in_order() {
        let exec = RecordingExecutor::default();
        exec.open_url("https://example.org").unwrap();
        exec.press_keys(&Hotkey::parse("Ctrl+C").unwrap()).unwrap();
        exec.launch(Path::new("/bin/true")).unwrap();
        assert_eq!(
            exec.calls(),
            vec![
                Call::OpenUrl("https://example.org".into()),
                Call::PressKeys("ctrl+c".into()),
                Call::Launch("/bin/true".into()),
            ]
        );
    }

    #[test]
    fn failing_executor_still_records() {
        let exec = RecordingExecutor::failing();
        assert!(exec.type_text("hi").is_err());
        assert_eq!(exec.calls(), vec![Call::TypeText("hi".into())]);
    }
}
