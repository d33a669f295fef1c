//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Event rendering as text or JSON lines

pub mod exit_codes;
pub mod render;

pub use exit_codes::{exit_code_description, print_exit_codes, CliResult, ExitCodes};
pub use render::{render_event, render_snapshot, OutputFormat};
