//! **mangodeck** — the core of a "stream deck" style launcher.
//!
//! The launcher shows a `columns × rows` grid of buttons.  Each button has a
//! label, colours, an optional icon and an action: launch a program, open a
//! URL, press a hotkey or type some text.  This crate holds everything
//! except the window itself:
//!
//! * [`config`] — the [`Deck`](config::Deck) data model and its JSON schema,
//!   including migration of the older bare-button-map format.
//! * [`store`] — loading and saving the deck, plus the edit operations that
//!   must keep the config file and icon directory consistent.
//! * [`icons`] — the managed icon directory (import with collision-free
//!   names, delete-when-unreferenced).
//! * [`compositor`] — fitting icons into a button (scale-to-cover and
//!   center-crop), image opacity, and simulated background transparency.
//! * [`action`] — the `(button, event) -> action` dispatch table.
//!
//! # Architecture
//!
//! All operations are synchronous and run on the caller's thread.  The only
//! OS-facing seam is [`traits::ActionExecutor`], which the dispatch table
//! uses to actually launch programs or inject keystrokes; see
//! [`executor`] for the implementations.

pub mod action;
pub mod compositor;
pub mod config;
pub mod executor;
pub mod icons;
pub mod store;
pub mod traits;
