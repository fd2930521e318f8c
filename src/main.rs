//! Command-line front end for **mangodeck**.
//!
//! Operates on the deck stored under `$XDG_CONFIG_HOME/mangodeck` (or the
//! directory given with `--dir`) so buttons can be inspected, edited and
//! pressed without the graphical shell.

use image::{DynamicImage, RgbImage};
use log::error;
use mangodeck::action::{ButtonEvent, DispatchTable};
use mangodeck::compositor::{self, ButtonFace, Rgb, BUTTON_HEIGHT, BUTTON_WIDTH};
use mangodeck::config::{ActionType, ConfigError, Deck, LayoutSettings, Theme};
use mangodeck::executor::{DryRunExecutor, SystemExecutor};
use mangodeck::store::{ConfigStore, StoreError};
use std::path::{Path, PathBuf};

const USAGE: &str = "\
Usage: mangodeck [--dir <path>] <command>

Commands:
  list                                   show the grid and every button
  press <n> [--dry-run]                  run button n's action
  layout <cols> <rows> <radius> <theme>  change the grid (theme: dark|light)
  toggle-theme                           switch between dark and light
  set-icon <n> <image>                   copy an image in as button n's icon
  clear-icon <n>                         remove button n's icon
  render <n> <out.png> [<w> <h>]         write button n's face (icon or colour)
  reset                                  restore defaults and delete all icons";

/// Errors surfaced to the user by the CLI.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}\n\n{usage}", usage = USAGE)]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Composite(#[from] compositor::CompositeError),
    #[error("failed to write {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
}

fn main() {
    env_logger::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }
    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("mangodeck: {}", e);
        std::process::exit(1);
    }
}

fn run(mut args: Vec<String>) -> Result<(), CliError> {
    let root = match take_option(&mut args, "--dir")? {
        Some(dir) => PathBuf::from(dir),
        None => ConfigStore::default_root(),
    };
    let dry_run = take_flag(&mut args, "--dry-run");
    let store = ConfigStore::new(root);
    let mut deck = store.load();

    let (command, rest) = args
        .split_first()
        .ok_or_else(|| CliError::Usage("missing command".into()))?;
    match (command.as_str(), rest) {
        ("list", []) => list(&deck),
        ("press", [n]) => {
            let index = parse_index(n, &deck)?;
            let table = DispatchTable::build(&deck);
            let status = if dry_run {
                table.dispatch(index, ButtonEvent::Press, &DryRunExecutor)
            } else {
                table.dispatch(index, ButtonEvent::Press, &SystemExecutor::new())
            };
            println!("{}", status);
        }
        ("layout", [cols, rows, radius, theme]) => {
            let layout = LayoutSettings {
                columns: parse_number(cols, "cols")?,
                rows: parse_number(rows, "rows")?,
                corner_radius: parse_number(radius, "radius")?,
                theme: Theme::parse(theme)
                    .ok_or_else(|| CliError::Usage(format!("unknown theme {:?}", theme)))?,
            };
            store.apply_layout(&mut deck, layout)?;
            println!(
                "Settings applied: {}x{} grid, radius: {}, theme: {}",
                layout.columns, layout.rows, layout.corner_radius, layout.theme
            );
        }
        ("toggle-theme", []) => {
            let layout = LayoutSettings {
                theme: deck.layout().theme.toggled(),
                ..deck.layout()
            };
            store.apply_layout(&mut deck, layout)?;
            println!("Theme: {}", layout.theme);
        }
        ("set-icon", [n, image]) => {
            let index = parse_index(n, &deck)?;
            let managed = store.set_button_icon(&mut deck, index, Path::new(image))?;
            println!("Button {} icon: {}", index, managed.display());
        }
        ("clear-icon", [n]) => {
            let index = parse_index(n, &deck)?;
            store.clear_button_icon(&mut deck, index)?;
            println!("Button {} saved!", index);
        }
        ("render", [n, out, size @ ..]) if size.is_empty() || size.len() == 2 => {
            let index = parse_index(n, &deck)?;
            let (width, height) = match size {
                [w, h] => (parse_number(w, "width")?, parse_number(h, "height")?),
                _ => (BUTTON_WIDTH, BUTTON_HEIGHT),
            };
            render(&deck, index, Path::new(out), width, height)?;
        }
        ("reset", []) => {
            store.reset_to_defaults(&mut deck)?;
            println!("Settings reset to defaults");
        }
        (other, _) => {
            return Err(CliError::Usage(format!(
                "unknown command or wrong arguments: {}",
                other
            )))
        }
    }
    Ok(())
}

fn list(deck: &Deck) {
    let layout = deck.layout();
    println!(
        "{}x{} grid, radius {}, {} theme",
        layout.columns, layout.rows, layout.corner_radius, layout.theme
    );
    for index in deck.visible_indices() {
        let button = deck.button(index);
        let color = button.display_color(layout.theme);
        let payload = match button.action_type {
            ActionType::Open => button
                .app_path
                .as_ref()
                .map(|p| p.display().to_string()),
            ActionType::Website => button.url.clone(),
            ActionType::Hotkey => button.hotkey.clone(),
            ActionType::Text => button.type_text.clone(),
            ActionType::MultiAction => None,
        };
        let icon = button
            .image_path
            .as_ref()
            .map(|p| format!(" [{}]", p.display()))
            .unwrap_or_default();
        println!(
            "{:>2}  {:<20} {:<12} {:<30} {}{}",
            index,
            button.text,
            button.action_type,
            payload.unwrap_or_else(|| "-".into()),
            color,
            icon
        );
    }
}

fn render(deck: &Deck, index: u32, out: &Path, width: u32, height: u32) -> Result<(), CliError> {
    if width == 0 || height == 0 {
        return Err(CliError::Usage(format!("cannot render a {}x{} button", width, height)));
    }
    let button = deck.button(index);
    let image = match compositor::button_face(&button, deck.layout().theme, width, height) {
        ButtonFace::Icon(image) => image,
        ButtonFace::Color(color) => {
            let Rgb { r, g, b } = Rgb::from_hex(&color)?;
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([r, g, b])))
        }
    };
    image.save(out).map_err(|source| CliError::Encode {
        path: out.to_path_buf(),
        source,
    })?;
    println!("Wrote {}x{} button face to {}", width, height, out.display());
    Ok(())
}

//  Argument helpers

/// Remove `--name <value>` from `args`, returning the value.
fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>, CliError> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(CliError::Usage(format!("{} needs a value", name)));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

/// Remove every `name` flag from `args`, returning whether one was present.
fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != name);
    args.len() != before
}

fn parse_number(s: &str, what: &str) -> Result<u32, CliError> {
    s.trim()
        .parse()
        .map_err(|_| CliError::Usage(format!("{} must be a non-negative integer, got {:?}", what, s)))
}

fn parse_index(s: &str, deck: &Deck) -> Result<u32, CliError> {
    let index = parse_number(s, "button")?;
    if !deck.visible_indices().contains(&index) {
        return Err(CliError::Usage(format!(
            "button must be between 1 and {}, got {}",
            deck.layout().button_count(),
            index
        )));
    }
    Ok(index)
}
