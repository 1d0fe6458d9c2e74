//! Daybook command-line entry point.
//!
//! # Responsibility
//! - Map subcommands onto core services.
//! - Render every outcome as one JSON object with a `success` flag.

mod args;

use args::{Cli, Command};
use chrono::{Local, NaiveDate};
use clap::Parser;
use daybook_core::{
    default_log_level, init_logging, next_date, open_db, CollectionService, DayService,
    DeferService, ItemService, ItemType, MigrationService, Placement, SectionService,
    UserConfig, UserService,
};
use serde_json::{json, Value};
use std::error::Error;
use std::process;

type CliResult = Result<Value, Box<dyn Error>>;

fn main() {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("warning: {err}");
        }
    }

    let rendered = match run(cli) {
        Ok(payload) => with_success(payload),
        Err(err) => {
            println!("{}", json!({ "success": false, "error": err.to_string() }));
            process::exit(1);
        }
    };
    println!("{rendered}");
}

fn with_success(payload: Value) -> Value {
    match payload {
        Value::Object(mut fields) => {
            fields.insert("success".to_string(), Value::Bool(true));
            Value::Object(fields)
        }
        other => json!({ "success": true, "result": other }),
    }
}

fn run(cli: Cli) -> CliResult {
    // Pure calculation; no database needed.
    if let Command::NextDate { rule, from } = &cli.command {
        return Ok(next_date_payload(rule, *from));
    }

    let conn = open_db(&cli.db)?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Init => Ok(json!({ "db": cli.db.display().to_string() })),
        Command::UserAdd { name, sections } => {
            let config = UserConfig::with_sections(sections);
            let user = UserService::new(&conn).create_user(&name, &config)?;
            Ok(json!({ "user": user }))
        }
        Command::Day { user, date } => {
            let resolved = DayService::new(&conn).find_or_create(user, date.unwrap_or(today))?;
            let root = CollectionService::new(&conn).snapshot(resolved.day.reference())?;
            Ok(json!({
                "day": resolved.day,
                "created": resolved.created,
                "sections_added": resolved.sections_added,
                "root": root,
            }))
        }
        Command::Add {
            user,
            owner,
            item_type,
            front,
            rule,
            title,
        } => {
            let item_type = ItemType::parse(&item_type)
                .ok_or_else(|| format!("unknown item type `{item_type}`"))?;
            let placement = if front { Placement::Front } else { Placement::Back };
            let service = ItemService::new(&conn);
            let mut item =
                service.create_item(user, owner, &title.join(" "), item_type, placement)?;
            if rule.is_some() {
                item = service.set_recurrence_rule(user, item.id, rule)?;
            }
            Ok(json!({ "item": item }))
        }
        Command::Complete {
            user,
            item,
            today: on,
        } => {
            let item = ItemService::new(&conn).complete_item_on(user, item, on.unwrap_or(today))?;
            Ok(json!({ "item": item }))
        }
        Command::Restore { user, item } => {
            let item = ItemService::new(&conn).restore_item(user, item)?;
            Ok(json!({ "item": item }))
        }
        Command::Migrate { user, day, to } => {
            let outcome = MigrationService::new(&conn).migrate_day(user, day, to)?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Defer { user, item, to } => {
            let outcome = DeferService::new(&conn).defer_item(user, item, to)?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Undefer { user, item } => {
            let outcome = DeferService::new(&conn).undefer_item(user, item)?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Reconcile { user, day } => {
            let outcome = SectionService::new(&conn).reconcile(user, day)?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Show { owner } => {
            let snapshot = CollectionService::new(&conn).snapshot(owner)?;
            Ok(json!({ "owner": owner, "collection": snapshot }))
        }
        Command::NextDate { rule, from } => Ok(next_date_payload(&rule, from)),
    }
}

fn next_date_payload(rule: &str, from: NaiveDate) -> Value {
    json!({ "rule": rule, "from": from, "next_date": next_date(Some(rule), from) })
}
