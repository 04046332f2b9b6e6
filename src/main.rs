use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::{Result, bail};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use taskboard::{
    Board, Command, Config, FileStorage, Filter, HttpSeedSource, MemoryStorage, Mount, NewTask, NoSeed, Outcome,
    Priority, SeedSource, Status, Storage, Task, TaskPatch,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "TaskBoard CLI - Kanban task board with local persistence")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the config file (default: <config dir>/taskboard/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task file (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep tasks in memory only; nothing is read or written
    #[arg(long)]
    ephemeral: bool,

    /// Never fetch seed tasks for an empty board
    #[arg(long)]
    no_seed: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task in the New column
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
    },

    /// Edit title, description or priority of a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
    },

    /// Move a task to another column (new, "in progress", completed)
    Move { id: String, status: String },

    /// Delete a task
    Rm {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List tasks, optionally only one column
    List {
        #[arg(short, long)]
        status: Option<Status>,
    },

    /// Show all columns
    Board,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    let storage: Box<dyn Storage> = if cli.ephemeral {
        Box::new(MemoryStorage::new())
    } else {
        let dir = cli.data_dir.clone().unwrap_or_else(|| config.storage.dir.clone());
        Box::new(FileStorage::new(dir, &config.storage.key))
    };

    let seed: Box<dyn SeedSource> = if cli.no_seed || !config.seed.enabled {
        Box::new(NoSeed)
    } else {
        Box::new(HttpSeedSource::new(config.seed.url.clone(), config.seed.limit))
    };

    let mount = Mount::new();
    let mut board = Board::bootstrap(storage, seed.as_ref(), &mount);

    let command = match cli.command {
        Commands::Add {
            title,
            description,
            priority,
        } => Command::Create(NewTask {
            title,
            description,
            priority,
        }),
        Commands::Edit {
            id,
            title,
            description,
            priority,
        } => {
            let patch = TaskPatch {
                title,
                description,
                priority,
            };
            if patch.is_empty() {
                bail!("Nothing to edit: pass --title, --description or --priority");
            }
            Command::Edit { id, patch }
        }
        Commands::Move { id, status } => Command::Move { id, status },
        Commands::Rm { id, yes } => {
            let Some(task) = board.store().get(&id) else {
                bail!("Task not found: {}", id);
            };
            if !yes && !confirm(&format!("Delete \"{}\"?", task.title))? {
                println!("Cancelled");
                return Ok(());
            }
            Command::Remove { id }
        }
        Commands::List { status } => {
            print_list(&board, status.into());
            return Ok(());
        }
        Commands::Board => {
            print_board(&board);
            return Ok(());
        }
    };

    let outcome = board.dispatch(command)?;
    let verb = match &outcome {
        Outcome::Created(_) => "Created",
        Outcome::Edited(_) => "Updated",
        Outcome::Moved(_) => "Moved",
        Outcome::Removed(_) => "Deleted",
    };
    println!("{} {}", verb.bold(), format_task(outcome.task()));

    Ok(())
}

/// Ask a yes/no question on stdin
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_list(board: &Board, filter: Filter) {
    let mut empty = true;
    for task in board.store().list(filter) {
        println!("{}", format_task(task));
        empty = false;
    }
    if empty {
        println!("{}", "No tasks".dimmed());
    }
}

fn print_board(board: &Board) {
    for (status, tasks) in board.store().columns() {
        println!("{} ({})", status.as_str().bold().underline(), tasks.len());
        for task in tasks {
            println!("  {}", format_task(task));
            if let Some(description) = &task.description {
                println!("      {}", description.dimmed());
            }
        }
        println!();
    }
}

fn format_task(task: &Task) -> String {
    let mut line = format!(
        "{} {} {} [{}]",
        task.id.dimmed(),
        priority_badge(task.priority),
        task.title,
        task.status
    );
    line.push_str(&format!(" created {}", task.creation_date.format("%Y-%m-%d")));
    if let Some(done) = task.completion_date.filter(|_| task.is_completed()) {
        line.push_str(&format!(", completed {}", done.format("%Y-%m-%d")));
    }
    line
}

fn priority_badge(priority: Priority) -> ColoredString {
    let label = format!("{:<6}", priority.as_str());
    match priority {
        Priority::High => label.red().bold(),
        Priority::Medium => label.yellow(),
        Priority::Low => label.green(),
    }
}
