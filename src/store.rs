//! On-disk persistence of the [`Deck`].
//!
//! A store root holds two things with fixed names:
//!
//! * `button_config.json` — the full deck snapshot, rewritten on every save;
//! * `icons/` — the managed [`IconLibrary`].
//!
//! Loading never fails: a missing file means "first run" and a corrupt one
//! is logged and replaced by defaults, so the launcher always starts.
//! Saving reports errors to the caller and leaves the in-memory deck as it
//! was before the call.

use crate::config::{ButtonConfig, ConfigError, Deck, LayoutSettings};
use crate::icons::{IconError, IconLibrary};
use log::{error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "button_config.json";
pub const ICONS_DIR_NAME: &str = "icons";

/// Error from an operation that touches both the config file and the icon
/// directory.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Icon(#[from] IconError),
}

/// Reads and writes a deck under one root directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    icons: IconLibrary,
}

impl ConfigStore {
    /// A store rooted at `root`.  Nothing is created until the first save
    /// or icon import.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_path: root.join(CONFIG_FILE_NAME),
            icons: IconLibrary::new(root.join(ICONS_DIR_NAME)),
        }
    }

    /// Resolve the default root (`$XDG_CONFIG_HOME/mangodeck`).
    pub fn default_root() -> PathBuf {
        let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{}/.config", home)
        });
        PathBuf::from(base).join("mangodeck")
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn icons(&self) -> &IconLibrary {
        &self.icons
    }

    /// Load the deck, or `None` when no config file exists yet.
    pub fn try_load(&self) -> Result<Option<Deck>, ConfigError> {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: self.config_path.clone(),
                    source: e,
                })
            }
        };
        Deck::from_json(&contents).map(Some)
    }

    /// Load the deck, substituting defaults for a missing or unreadable
    /// file.
    pub fn load(&self) -> Deck {
        match self.try_load() {
            Ok(Some(deck)) => {
                info!(
                    "loaded {} button(s) from {}",
                    deck.buttons().len(),
                    self.config_path.display()
                );
                deck
            }
            Ok(None) => {
                info!("no config at {}, using defaults", self.config_path.display());
                Deck::default()
            }
            Err(e) => {
                error!("{} ({}), using defaults", e, self.config_path.display());
                Deck::default()
            }
        }
    }

    /// Write the full snapshot.
    ///
    /// The document goes to a sibling temporary file that is then renamed
    /// over the config, so a crash mid-write leaves the old file intact.
    pub fn save(&self, deck: &Deck) -> Result<(), ConfigError> {
        let write_err = |path: &Path, source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = deck.to_json_pretty()?;
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
            }
        }
        let tmp = self.config_path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| write_err(tmp.as_path(), e))?;
        if let Err(e) = fs::rename(&tmp, &self.config_path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(self.config_path.as_path(), e));
        }
        info!("saved config to {}", self.config_path.display());
        Ok(())
    }

    /// Validate and persist a new layout.  On error `deck` is unchanged.
    pub fn apply_layout(&self, deck: &mut Deck, layout: LayoutSettings) -> Result<(), ConfigError> {
        let previous = deck.layout();
        deck.apply_layout(layout)?;
        if let Err(e) = self.save(deck) {
            deck.apply_layout(previous)?;
            return Err(e);
        }
        Ok(())
    }

    /// Store an edited button and persist the deck.
    ///
    /// Once the save succeeds, the button's previous icon is deleted if it
    /// changed and no other button uses it.  If the save fails, `deck` is
    /// restored and no file is touched.
    pub fn commit_button(
        &self,
        deck: &mut Deck,
        index: u32,
        config: ButtonConfig,
    ) -> Result<(), ConfigError> {
        let new_image = config.image_path.clone();
        let previous = deck.set_button(index, config);
        if let Err(e) = self.save(deck) {
            match previous {
                Some(p) => deck.set_button(index, p),
                None => deck.remove_button(index),
            };
            return Err(e);
        }

        let old_image = previous.and_then(|p| p.image_path);
        if let Err(e) = self.icons.reclaim_unused(
            old_image.as_deref(),
            new_image.as_deref(),
            deck.buttons(),
            index,
        ) {
            warn!("{}", e);
        }
        Ok(())
    }

    /// Import `source` into the icon directory and make it button `index`'s
    /// image.  Returns the managed path.
    ///
    /// If the import fails the button keeps its current image.
    pub fn set_button_icon(
        &self,
        deck: &mut Deck,
        index: u32,
        source: &Path,
    ) -> Result<PathBuf, StoreError> {
        let managed = self.icons.import(source)?;
        let mut config = deck.button(index);
        let old_image = config.image_path.replace(managed.clone());
        if let Err(e) = self.commit_button(deck, index, config) {
            if old_image.as_deref() != Some(managed.as_path()) {
                // Drop the orphaned copy again.
                if let Err(reclaim) =
                    self.icons
                        .reclaim_unused(Some(&managed), None, deck.buttons(), index)
                {
                    warn!("{}", reclaim);
                }
            }
            return Err(e.into());
        }
        Ok(managed)
    }

    /// Remove button `index`'s image, deleting the file if unused.
    pub fn clear_button_icon(&self, deck: &mut Deck, index: u32) -> Result<(), ConfigError> {
        let mut config = deck.button(index);
        if config.image_path.take().is_none() {
            return Ok(());
        }
        self.commit_button(deck, index, config)
    }

    /// Forget every button, restore the default layout and empty the icon
    /// directory.
    ///
    /// The defaults are saved first; if that fails nothing is changed.
    /// Icons that cannot be deleted are logged and skipped.
    pub fn reset_to_defaults(&self, deck: &mut Deck) -> Result<(), ConfigError> {
        self.save(&Deck::default())?;
        deck.reset();
        self.icons.clear();
        info!("reset to defaults");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionType, Theme};
    use tempfile::tempdir;

    fn write(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        assert!(store.try_load().unwrap().is_none());
        assert_eq!(store.load(), Deck::default());
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        write(store.config_path(), b"{ \"buttons\": { \"1\": ");
        assert!(store.try_load().is_err());
        assert_eq!(store.load(), Deck::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("nested/root"));
        let mut deck = Deck::with_layout(LayoutSettings {
            columns: 5,
            rows: 2,
            corner_radius: 0,
            theme: Theme::Light,
        })
        .unwrap();
        let mut b = ButtonConfig::new(3);
        b.action_type = ActionType::Hotkey;
        b.hotkey = Some("Ctrl+Alt+T".into());
        deck.set_button(3, b);

        store.save(&deck).unwrap();
        assert_eq!(store.load(), deck);
        assert!(!store.config_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn loads_legacy_file() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        write(store.config_path(), br#"{ "2": { "text": "Old" } }"#);
        let deck = store.load();
        assert_eq!(deck.layout(), LayoutSettings::default());
        assert_eq!(deck.button(2).text, "Old");
    }

    #[test]
    fn save_failure_is_reported_and_deck_unchanged() {
        let tmp = tempdir().unwrap();
        // The root is a regular file, so the config cannot be written below it.
        let root = tmp.path().join("not-a-dir");
        write(&root, b"");
        let store = ConfigStore::new(&root);
        let mut deck = Deck::default();

        let mut config = ButtonConfig::new(1);
        config.text = "New".into();
        assert!(store.commit_button(&mut deck, 1, config).is_err());
        assert!(deck.buttons().is_empty());

        let layout = LayoutSettings { columns: 2, ..LayoutSettings::default() };
        assert!(matches!(
            store.apply_layout(&mut deck, layout),
            Err(ConfigError::Write { .. })
        ));
        assert_eq!(deck.layout(), LayoutSettings::default());
    }

    #[test]
    fn apply_layout_persists_valid_and_rejects_invalid() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path());
        let mut deck = Deck::default();
        let layout = LayoutSettings { columns: 8, rows: 8, corner_radius: 50, theme: Theme::Light };
        store.apply_layout(&mut deck, layout).unwrap();
        assert_eq!(store.load().layout(), layout);

        let bad = LayoutSettings { rows: 0, ..layout };
        assert!(matches!(
            store.apply_layout(&mut deck, bad),
            Err(ConfigError::InvalidLayout { field: "rows", .. })
        ));
        assert_eq!(deck.layout(), layout);
    }

    #[test]
    fn shared_icon_survives_until_last_button_clears_it() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("deck"));
        let src = tmp.path().join("pictures/star.png");
        write(&src, b"star");
        let mut deck = Deck::default();

        let managed = store.set_button_icon(&mut deck, 1, &src).unwrap();
        let mut b = deck.button(2);
        b.image_path = Some(managed.clone());
        store.commit_button(&mut deck, 2, b).unwrap();

        store.clear_button_icon(&mut deck, 1).unwrap();
        assert!(managed.exists(), "button 2 still uses the icon");
        assert_eq!(deck.button(1).image_path, None);

        store.clear_button_icon(&mut deck, 2).unwrap();
        assert!(!managed.exists());
        assert_eq!(fs::read(&src).unwrap(), b"star");
    }

    #[test]
    fn replacing_icon_deletes_the_old_copy() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("deck"));
        let a = tmp.path().join("a/one.png");
        let b = tmp.path().join("b/two.png");
        write(&a, b"one");
        write(&b, b"two");
        let mut deck = Deck::default();

        let first = store.set_button_icon(&mut deck, 4, &a).unwrap();
        let second = store.set_button_icon(&mut deck, 4, &b).unwrap();
        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(store.load().button(4).image_path, Some(second));
    }

    #[test]
    fn failed_import_keeps_previous_image() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("deck"));
        let a = tmp.path().join("a/one.png");
        write(&a, b"one");
        let mut deck = Deck::default();
        let first = store.set_button_icon(&mut deck, 1, &a).unwrap();

        let err = store
            .set_button_icon(&mut deck, 1, &tmp.path().join("missing.png"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Icon(IconError::Copy { .. })));
        assert_eq!(deck.button(1).image_path, Some(first.clone()));
        assert!(first.exists());
    }

    #[test]
    fn failed_save_removes_the_imported_copy() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("deck"));
        // A directory in place of the config file makes the final rename fail.
        fs::create_dir_all(store.config_path()).unwrap();
        let src = tmp.path().join("pics/new.png");
        write(&src, b"new");
        let mut deck = Deck::default();

        let err = store.set_button_icon(&mut deck, 2, &src).unwrap_err();
        assert!(matches!(err, StoreError::Config(ConfigError::Write { .. })), "{}", err);
        assert!(deck.buttons().is_empty());
        assert_eq!(fs::read_dir(store.icons().dir()).unwrap().count(), 0);
        assert!(src.exists());
    }

    #[test]
    fn reset_clears_everything() {
        let tmp = tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("deck"));
        let src = tmp.path().join("x/logo.png");
        write(&src, b"logo");
        let mut deck = Deck::default();
        store.set_button_icon(&mut deck, 1, &src).unwrap();
        store
            .apply_layout(&mut deck, LayoutSettings { columns: 6, ..LayoutSettings::default() })
            .unwrap();

        store.reset_to_defaults(&mut deck).unwrap();
        assert_eq!(deck, Deck::default());
        assert_eq!(store.load(), Deck::default());
        assert_eq!(fs::read_dir(store.icons().dir()).unwrap().count(), 0);
        assert!(src.exists());
    }
}
