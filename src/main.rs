//! task-cascade CLI
//!
//! Manages a task hierarchy stored in SQLite and deletes whole subtrees
//! atomically.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeSet;
use task_cascade::cli::{AddArgs, Cli, Command};
use task_cascade::config::Config;
use task_cascade::db::{Database, now_ms};
use task_cascade::format::{self, OutputFormat};
use task_cascade::hierarchy::{CascadeDeleter, HierarchyReader, load_tree, reparent};
use task_cascade::logging::{self, LogTarget};
use task_cascade::store::EntityStore;
use task_cascade::types::Task;
use tracing::{debug, error};
use uuid::Uuid;

fn print_tasks(tasks: &[Task], fmt: OutputFormat) -> Result<()> {
    match fmt {
        OutputFormat::Json => println!("{}", format::to_json(tasks)?),
        OutputFormat::Text => {
            if !tasks.is_empty() {
                println!("{}", format::format_task_list(tasks));
            }
        }
    }
    Ok(())
}

async fn add_task(db: &Database, args: AddArgs, fmt: OutputFormat) -> Result<()> {
    let mut task = Task::new(Uuid::now_v7().to_string(), args.title, now_ms());
    task.description = args.description;
    task.priority = args.priority;
    task.tags = args.tags.into_iter().collect::<BTreeSet<_>>();
    task.project_id = args.project;

    if let Some(parent) = args.parent {
        db.get(&parent)
            .await?
            .with_context(|| format!("parent task not found: {parent}"))?;
        task.parent_task_id = Some(parent);
    }

    db.create(&task).await?;
    match fmt {
        OutputFormat::Json => println!("{}", format::to_json(&task)?),
        OutputFormat::Text => println!("{}", task.id),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load(path)
                .with_context(|| format!("failed to load config from {path}"))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => Config::load_or_default()?,
    };

    // Override from CLI arguments
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }
    if let Some(max_depth) = cli.max_depth {
        config.hierarchy.max_depth = max_depth;
    }
    config.hierarchy.validate()?;
    config.ensure_db_dir()?;

    debug!(db = %config.store.db_path.display(), max_depth = config.hierarchy.max_depth, "Opening database");
    let db = Database::open(&config.store.db_path)?;
    let fmt = cli.format;
    let max_depth = config.hierarchy.max_depth;

    match cli.command {
        Command::Add(args) => add_task(&db, args, fmt).await?,

        Command::Children { id } => {
            let children = HierarchyReader::new(&db).find_children(&id).await?;
            print_tasks(&children, fmt)?;
        }

        Command::Roots => {
            let roots = HierarchyReader::new(&db).find_roots().await?;
            print_tasks(&roots, fmt)?;
        }

        Command::Tree { id } => {
            let tree = load_tree(&db, &id, max_depth)
                .await?
                .with_context(|| format!("task not found: {id}"))?;
            match fmt {
                OutputFormat::Json => println!("{}", format::to_json(&tree)?),
                OutputFormat::Text => println!("{}", format::format_tree(&tree)),
            }
        }

        Command::Move { id, parent } => {
            let task = reparent(&db, &id, parent.as_deref(), max_depth).await?;
            match fmt {
                OutputFormat::Json => println!("{}", format::to_json(&task)?),
                OutputFormat::Text => println!("{}", format::format_task_line(&task)),
            }
        }

        Command::Delete { id, dry_run } => {
            let cascade = CascadeDeleter::new(db, config.hierarchy);

            if dry_run {
                let subtree = cascade.preview(&id).await?;
                match fmt {
                    OutputFormat::Json => println!("{}", format::to_json(subtree.ids())?),
                    OutputFormat::Text => println!("{}", subtree.ids().join("\n")),
                }
                return Ok(());
            }

            match cascade.delete(&id).await {
                Ok(report) => match fmt {
                    OutputFormat::Json => println!("{}", format::to_json(&report)?),
                    OutputFormat::Text => println!("{}", format::format_delete_report(&report)),
                },
                Err(e) => {
                    if e.is_structural() {
                        error!(task = ?e.task_id(), "Task hierarchy is corrupted; repair it before retrying");
                    }
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
