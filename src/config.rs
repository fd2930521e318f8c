//! Deck configuration model.
//!
//! A [`Deck`] is the whole persisted state of the launcher: the grid
//! [`LayoutSettings`] plus one [`ButtonConfig`] per customised button,
//! keyed by 1-based button index.  Buttons that were never customised are
//! not stored; [`Deck::button`] synthesises their defaults on demand.
//!
//! # File format
//!
//! ```json
//! {
//!   "grid_cols": 4,
//!   "grid_rows": 3,
//!   "corner_radius": 15,
//!   "theme": "dark",
//!   "buttons": {
//!     "1": {
//!       "text": "Terminal",
//!       "image_path": "icons/terminal.png",
//!       "app_path": "/usr/bin/alacritty",
//!       "color": "#2196F3",
//!       "text_color": "white",
//!       "text_size": 12,
//!       "color_opacity": 100,
//!       "image_opacity": 100,
//!       "action_type": "Open"
//!     }
//!   }
//! }
//! ```
//!
//! Older files contain only the `"buttons"` object's contents at the top
//! level.  [`Deck::from_json`] detects that shape once, by the absence of a
//! `"buttons"` key, and migrates it; nothing else in the crate needs to know
//! the legacy shape existed.

use crate::compositor::blend_over_background;
use log::warn;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Allowed range for both grid dimensions.
pub const GRID_RANGE: RangeInclusive<u32> = 1..=8;
/// Allowed range for the button corner radius.
pub const CORNER_RADIUS_RANGE: RangeInclusive<u32> = 0..=50;
/// Allowed range for the label font size.
pub const TEXT_SIZE_RANGE: RangeInclusive<u32> = 6..=72;
/// Opacities are percentages.
pub const MAX_OPACITY: u8 = 100;

pub const DEFAULT_COLOR: &str = "#2196F3";
pub const DEFAULT_TEXT_COLOR: &str = "white";
pub const DEFAULT_TEXT_SIZE: u32 = 12;

//  Theme

/// Colour scheme of the launcher window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Parse `"dark"` / `"light"` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    /// Background colour of the main window.
    pub fn window_background(self) -> &'static str {
        match self {
            Theme::Dark => "#1a1a1a",
            Theme::Light => "#ebebeb",
        }
    }

    /// Solid colour that translucent button backgrounds are blended against.
    ///
    /// The host toolkit has no per-widget alpha, so opacity is simulated by
    /// mixing with this colour (see
    /// [`blend_over_background`](crate::compositor::blend_over_background)).
    pub fn blend_background(self) -> (u8, u8, u8) {
        match self {
            Theme::Dark => (43, 43, 43),
            Theme::Light => (235, 235, 235),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

//  Layout

/// Grid dimensions and global button appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutSettings {
    pub columns: u32,
    pub rows: u32,
    pub corner_radius: u32,
    pub theme: Theme,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 3,
            corner_radius: 15,
            theme: Theme::Dark,
        }
    }
}

impl LayoutSettings {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("columns", self.columns, &GRID_RANGE)?;
        check_range("rows", self.rows, &GRID_RANGE)?;
        check_range("corner_radius", self.corner_radius, &CORNER_RADIUS_RANGE)?;
        Ok(())
    }

    /// Number of buttons shown by this layout.
    pub fn button_count(&self) -> u32 {
        self.columns * self.rows
    }
}

fn check_range(field: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidLayout {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

//  Action type

/// What a button does when pressed.
///
/// The payload lives in the matching [`ButtonConfig`] field; switching the
/// type does not discard the payloads of the other types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionType {
    /// Launch `app_path`.
    #[default]
    Open,
    /// Open `url` in the default browser.
    Website,
    /// Send the `hotkey` key combination.
    Hotkey,
    /// Type `type_text` literally.
    Text,
    /// Reserved; has no payload and does nothing.
    MultiAction,
}

impl ActionType {
    /// Name as written to the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Open => "Open",
            ActionType::Website => "Website",
            ActionType::Hotkey => "Hotkey",
            ActionType::Text => "Text",
            ActionType::MultiAction => "Multi Action",
        }
    }

    /// Parse an action name, ignoring case, whitespace, `-` and `_`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(|c| c.to_lowercase())
            .collect();
        match normalized.as_str() {
            "open" => Some(ActionType::Open),
            "website" | "url" => Some(ActionType::Website),
            "hotkey" => Some(ActionType::Hotkey),
            "text" => Some(ActionType::Text),
            "multiaction" => Some(ActionType::MultiAction),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for ActionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ActionType::parse(&s).unwrap_or_else(|| {
            warn!("unknown action type {:?}, treating as Open", s);
            ActionType::Open
        }))
    }
}

//  Button

/// Appearance and action of a single button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonConfig {
    /// Label drawn on the button.
    pub text: String,
    /// Icon inside the managed icon directory.  Several buttons may share
    /// one file.
    pub image_path: Option<PathBuf>,
    pub app_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `+`-joined key names, e.g. `"Ctrl+Shift+T"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_text: Option<String>,
    /// Background colour, `#RRGGBB`.
    pub color: String,
    /// Label colour, hex or a named colour.
    pub text_color: String,
    pub text_size: u32,
    pub color_opacity: u8,
    pub image_opacity: u8,
    pub action_type: ActionType,
}

impl ButtonConfig {
    /// The configuration of button `index` before it has been customised.
    pub fn new(index: u32) -> Self {
        Self {
            text: format!("Button {}", index),
            image_path: None,
            app_path: None,
            url: None,
            hotkey: None,
            type_text: None,
            color: DEFAULT_COLOR.into(),
            text_color: DEFAULT_TEXT_COLOR.into(),
            text_size: DEFAULT_TEXT_SIZE,
            color_opacity: MAX_OPACITY,
            image_opacity: MAX_OPACITY,
            action_type: ActionType::Open,
        }
    }

    /// Background colour to draw under `theme`, with `color_opacity`
    /// simulated by blending against the theme's backdrop.
    ///
    /// This is also what the button shows when its icon cannot be rendered.
    /// A colour that is not `#RRGGBB` is returned unblended.
    pub fn display_color(&self, theme: Theme) -> String {
        blend_over_background(&self.color, self.color_opacity, theme.blend_background())
            .unwrap_or_else(|e| {
                warn!("{}: {}", self.text, e);
                self.color.clone()
            })
    }
}

//  Deck

/// The complete launcher state: layout plus every customised button.
///
/// The layout can only be changed through [`apply_layout`](Self::apply_layout),
/// which keeps it within range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deck {
    layout: LayoutSettings,
    buttons: BTreeMap<u32, ButtonConfig>,
}

impl Deck {
    /// An empty deck with the given layout.
    pub fn with_layout(layout: LayoutSettings) -> Result<Self, ConfigError> {
        layout.validate()?;
        Ok(Self {
            layout,
            buttons: BTreeMap::new(),
        })
    }

    pub fn layout(&self) -> LayoutSettings {
        self.layout
    }

    /// Replace the layout after validating it.  On error nothing changes.
    ///
    /// Buttons outside the new grid keep their configuration so that
    /// growing the grid again restores them.
    pub fn apply_layout(&mut self, layout: LayoutSettings) -> Result<(), ConfigError> {
        layout.validate()?;
        self.layout = layout;
        Ok(())
    }

    /// Every stored (customised) button.
    pub fn buttons(&self) -> &BTreeMap<u32, ButtonConfig> {
        &self.buttons
    }

    /// Configuration of button `index`, falling back to its defaults.
    pub fn button(&self, index: u32) -> ButtonConfig {
        self.buttons
            .get(&index)
            .cloned()
            .unwrap_or_else(|| ButtonConfig::new(index))
    }

    /// Store `config` for button `index`, returning the previous entry.
    pub fn set_button(&mut self, index: u32, config: ButtonConfig) -> Option<ButtonConfig> {
        self.buttons.insert(index, config)
    }

    /// Forget the customisation of button `index`.
    pub fn remove_button(&mut self, index: u32) -> Option<ButtonConfig> {
        self.buttons.remove(&index)
    }

    /// Indices of the buttons shown by the current layout (1-based).
    pub fn visible_indices(&self) -> RangeInclusive<u32> {
        1..=self.layout.button_count()
    }

    /// Drop every button and restore the default layout.
    pub fn reset(&mut self) {
        *self = Deck::default();
    }

    /// Parse a config document, migrating the legacy shape if needed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(StoredDeck::detect(value)?.migrate())
    }

    /// Serialize the full snapshot, pretty-printed.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        let doc = DocumentRef {
            grid_cols: self.layout.columns,
            grid_rows: self.layout.rows,
            corner_radius: self.layout.corner_radius,
            theme: self.layout.theme,
            buttons: &self.buttons,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

//  On-disk schema

/// Borrowed view written by [`Deck::to_json_pretty`].  Integer map keys are
/// emitted as decimal strings by `serde_json`.
#[derive(Serialize)]
struct DocumentRef<'a> {
    grid_cols: u32,
    grid_rows: u32,
    corner_radius: u32,
    theme: Theme,
    buttons: &'a BTreeMap<u32, ButtonConfig>,
}

/// A button entry as read from disk.  Missing fields take the defaults of
/// the button's index.
///
/// A field holding a value of the wrong type is logged and treated as
/// missing, so one bad entry never discards the rest of the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredButton {
    #[serde(deserialize_with = "lenient")]
    text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    image_path: Option<PathBuf>,
    #[serde(deserialize_with = "lenient")]
    app_path: Option<PathBuf>,
    #[serde(deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    hotkey: Option<String>,
    #[serde(deserialize_with = "lenient")]
    type_text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    color: Option<String>,
    #[serde(deserialize_with = "lenient")]
    text_color: Option<String>,
    #[serde(deserialize_with = "lenient_integer")]
    text_size: Option<i64>,
    #[serde(deserialize_with = "lenient_integer")]
    color_opacity: Option<i64>,
    #[serde(deserialize_with = "lenient_integer")]
    image_opacity: Option<i64>,
    #[serde(deserialize_with = "lenient")]
    action_type: Option<ActionType>,
}

impl StoredButton {
    fn into_config(self, index: u32) -> ButtonConfig {
        let defaults = ButtonConfig::new(index);
        ButtonConfig {
            text: self.text.unwrap_or(defaults.text),
            image_path: self.image_path,
            app_path: self.app_path,
            url: self.url,
            hotkey: self.hotkey,
            type_text: self.type_text,
            color: self.color.unwrap_or(defaults.color),
            text_color: self.text_color.unwrap_or(defaults.text_color),
            text_size: self
                .text_size
                .map_or(defaults.text_size, |v| clamp_to(v, &TEXT_SIZE_RANGE)),
            color_opacity: self.color_opacity.map_or(defaults.color_opacity, clamp_opacity),
            image_opacity: self.image_opacity.map_or(defaults.image_opacity, clamp_opacity),
            action_type: self.action_type.unwrap_or(defaults.action_type),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentDocument {
    #[serde(default, deserialize_with = "lenient_integer")]
    grid_cols: Option<i64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    grid_rows: Option<i64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    corner_radius: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    theme: Option<String>,
    buttons: BTreeMap<String, StoredButton>,
}

/// Deserialize an optional field, treating a value of the wrong type as
/// absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            warn!("ignoring config value {} ({})", value, e);
            Ok(None)
        }
    }
}

/// Like [`lenient`], but any JSON number is accepted and rounded to the
/// nearest integer, so `14.0` reads as 14.
fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let integer = match &value {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        _ => None,
    };
    if integer.is_none() && !value.is_null() {
        warn!("ignoring non-numeric config value {}", value);
    }
    Ok(integer)
}

/// The two shapes a config file can have.
#[derive(Debug)]
enum StoredDeck {
    Current(CurrentDocument),
    /// A bare `index -> button` map, written before layout settings existed.
    Legacy(BTreeMap<String, StoredButton>),
}

impl StoredDeck {
    fn detect(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("buttons").is_some() {
            Ok(StoredDeck::Current(serde_json::from_value(value)?))
        } else if value.is_object() {
            Ok(StoredDeck::Legacy(serde_json::from_value(value)?))
        } else {
            Err(serde_json::Error::custom("config root must be a JSON object"))
        }
    }

    fn migrate(self) -> Deck {
        match self {
            StoredDeck::Current(doc) => {
                let defaults = LayoutSettings::default();
                let theme = match doc.theme {
                    Some(name) => Theme::parse(&name).unwrap_or_else(|| {
                        warn!("unknown theme {:?}, using {}", name, defaults.theme);
                        defaults.theme
                    }),
                    None => defaults.theme,
                };
                Deck {
                    layout: LayoutSettings {
                        columns: doc.grid_cols.map_or(defaults.columns, |v| clamp_to(v, &GRID_RANGE)),
                        rows: doc.grid_rows.map_or(defaults.rows, |v| clamp_to(v, &GRID_RANGE)),
                        corner_radius: doc
                            .corner_radius
                            .map_or(defaults.corner_radius, |v| clamp_to(v, &CORNER_RADIUS_RANGE)),
                        theme,
                    },
                    buttons: convert_buttons(doc.buttons),
                }
            }
            StoredDeck::Legacy(buttons) => Deck {
                layout: LayoutSettings::default(),
                buttons: convert_buttons(buttons),
            },
        }
    }
}

fn convert_buttons(stored: BTreeMap<String, StoredButton>) -> BTreeMap<u32, ButtonConfig> {
    stored
        .into_iter()
        .filter_map(|(key, button)| match key.trim().parse::<u32>() {
            Ok(index) if index >= 1 => Some((index, button.into_config(index))),
            _ => {
                warn!("ignoring button with invalid index {:?}", key);
                None
            }
        })
        .collect()
}

fn clamp_to(value: i64, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(i64::from(*range.start()), i64::from(*range.end())) as u32
}

fn clamp_opacity(value: i64) -> u8 {
    value.clamp(0, i64::from(MAX_OPACITY)) as u8
}

//  Errors

/// Error from reading, parsing, writing or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be between {min} and {max}, got {value}")]
    InvalidLayout {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}
