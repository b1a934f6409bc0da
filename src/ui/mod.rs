pub mod cli;
pub mod io;

use clap::ValueEnum;

/// How responses are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One JSON document per line
    Json,
    /// psql-style tables for humans
    Table,
}
