// Library target exists so that integration tests and the xtask helper can
// reach the internal modules. The binary entry point is in main.rs.

pub mod cdp;
pub mod chrome;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod render;

/// Returns the clap command definition for the `rasterize` binary.
///
/// Used by the xtask helper to generate the man page.
#[must_use]
pub fn command() -> clap::Command {
    use clap::CommandFactory;
    cli::Cli::command()
}
