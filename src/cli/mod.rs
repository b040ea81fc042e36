//! CLI command definitions for task-cascade
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use clap::{Args, Parser, Subcommand};

/// Task hierarchy tool with cascade deletion
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Maximum hierarchy depth (overrides config)
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a task
    Add(AddArgs),

    /// List the direct children of a task, oldest first
    Children {
        /// Parent task id
        id: String,
    },

    /// Show a task and all of its descendants
    Tree {
        /// Root task id
        id: String,
    },

    /// List tasks that have no parent
    Roots,

    /// Move a task under a new parent
    Move {
        /// Task to move
        id: String,

        /// New parent id (omit to make the task a root)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Delete a task and its whole subtree
    Delete {
        /// Root task id
        id: String,

        /// Only list what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

/// Arguments for the add subcommand
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task title
    pub title: String,

    /// Parent task id
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Longer description
    #[arg(long)]
    pub description: Option<String>,

    /// Priority (higher = more important)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub priority: i32,

    /// Tag, may be repeated
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Project id
    #[arg(long)]
    pub project: Option<String>,
}
