//! Tether Bridge library target.
//!
//! Exposes the front end's logic for integration tests. The binary entry
//! point is in `main.rs`; everything it does besides painting lives here.

pub mod app;
pub mod cli;
pub mod headless;
pub mod keyboard;
pub mod messages;
pub mod update;
pub mod util;
pub mod view_ui;
