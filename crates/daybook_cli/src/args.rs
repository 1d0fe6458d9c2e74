//! Command-line surface.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use daybook_core::EntityRef;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "daybook", version, about = "Day planner with migration, deferral and recurrence")]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, env = "DAYBOOK_DB", default_value = "daybook.db", global = true)]
    pub db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "DAYBOOK_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "DAYBOOK_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database and apply migrations.
    Init,
    /// Create a user with optional permanent sections.
    UserAdd {
        #[arg(long)]
        name: String,
        /// Comma-separated permanent section titles, in display order.
        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,
    },
    /// Find or create the day for a date and print its root.
    Day {
        #[arg(long)]
        user: i64,
        /// Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Add an item under a container such as Day#1 or Item#4.
    Add {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        owner: EntityRef,
        /// completable, section, reusable or trackable.
        #[arg(long = "type", default_value = "completable")]
        item_type: String,
        /// Insert at the front of the active list.
        #[arg(long)]
        front: bool,
        /// Raw JSON recurrence rule.
        #[arg(long)]
        rule: Option<String>,
        title: Vec<String>,
    },
    /// Mark an item done.
    Complete {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        item: i64,
        /// Date used for scheduling the next occurrence; defaults to today.
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Return a done or dropped item to todo.
    Restore {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        item: i64,
    },
    /// Migrate a day's open work onto another date.
    Migrate {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        day: i64,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Copy an item onto a later date and park the original.
    Defer {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        item: i64,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Undo a deferral.
    Undefer {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        item: i64,
    },
    /// Add configured permanent sections missing from a day.
    Reconcile {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        day: i64,
    },
    /// Compute the next date for a recurrence rule.
    NextDate {
        #[arg(long)]
        rule: String,
        #[arg(long)]
        from: NaiveDate,
    },
    /// Print the active and inactive children of a container.
    Show {
        #[arg(long)]
        owner: EntityRef,
    },
}
