//! Library crate for recon-rs: an interactive nmap front-end.
pub mod catalog;
pub mod display;
pub mod error;
pub mod executable;
pub mod logging;
pub mod menu;
pub mod state;
pub mod supervisor;
pub mod target;
pub mod types;
