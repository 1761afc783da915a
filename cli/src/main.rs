use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use taprule_cli::CliContext;
use taprule_cli::commands;
use taprule_cli::logging;
use taprule_cli::readline;
use taprule_core::ActionKind;

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();

    let ctx = CliContext::open(cli.data_dir)?;
    let _log_guard = logging::init(ctx.data_dir());

    // One-shot mode: `taprule <command> ...`
    if let Some(command) = cli.command {
        run_command(command, &ctx).await?;
        ctx.engine.stop().await;
        return Ok(());
    }

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    ctx.engine.stop().await;
    Ok(())
}

#[derive(Parser)]
#[command(version, about = "taprule rule engine")]
struct Cli {
    /// Directory for subscriptions, click logs and the log file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    ClickCenter,
    ClickNode,
    Click,
}

impl From<Action> for ActionKind {
    fn from(action: Action) -> Self {
        match action {
            Action::ClickCenter => ActionKind::TapCenter,
            Action::ClickNode => ActionKind::TapNode,
            Action::Click => ActionKind::DispatchClick,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a subscription file
    Check { path: String },
    /// List loaded subscriptions
    List,
    Import {
        path: String,
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Create an empty local subscription
    NewLocal { name: String },
    /// Add an app or group payload to a local subscription
    AddGroup {
        #[arg(short, long)]
        subs: i64,
        #[arg(short, long)]
        app: String,
        path: String,
    },
    EditGroup {
        #[arg(short, long)]
        subs: i64,
        #[arg(short, long)]
        app: String,
        #[arg(short, long)]
        key: i32,
        path: String,
    },
    DeleteGroup {
        #[arg(short, long)]
        subs: i64,
        #[arg(short, long)]
        app: String,
        #[arg(short, long)]
        key: i32,
    },
    /// Override a group's enabled state (on, off, default)
    SetGroup {
        #[arg(short, long)]
        subs: i64,
        #[arg(short, long)]
        app: String,
        #[arg(short, long)]
        key: i32,
        state: String,
    },
    SetApp {
        #[arg(short, long)]
        subs: i64,
        #[arg(short, long)]
        app: String,
        state: Toggle,
    },
    SetSubscription { subs: i64, state: Toggle },
    Remove { subs: i64 },
    /// Fetch updates for remote subscriptions now
    Refresh,
    /// Re-read subscription files from disk
    Reload,
    /// Load a window snapshot (JSON) as the current window
    Tree { path: PathBuf },
    Query {
        selector: String,
        #[arg(long)]
        all: bool,
    },
    Exec {
        selector: String,
        #[arg(short, long, value_enum, default_value = "click-center")]
        action: Action,
    },
    /// Save a screen capture as PNG
    Screenshot { path: PathBuf },
    /// Run one evaluation pass over the current window
    Simulate,
    Start,
    /// Run the engine over the current window for a while
    Run {
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
    },
    Stop,
    Service { state: Toggle },
    Config,
    Logs {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "taprule".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    if let Some(dir) = cli.data_dir
        && dir != ctx.data_dir()
    {
        return Err(format!(
            "session already uses {}, restart to switch to {}",
            ctx.data_dir().display(),
            dir.display()
        ));
    }

    match cli.command {
        Some(command) => run_command(command, ctx).await,
        None => Ok(false),
    }
}

/// Returns true when the REPL should quit
async fn run_command(command: Commands, ctx: &CliContext) -> Result<bool, String> {
    match command {
        Commands::Check { path } => commands::check(&path)?,
        Commands::List => commands::list(ctx).await?,
        Commands::Import { path, url } => commands::import(ctx, &path, url).await?,
        Commands::NewLocal { name } => commands::new_local(ctx, &name).await?,
        Commands::AddGroup { subs, app, path } => {
            commands::add_group(ctx, subs, &app, &path).await?
        }
        Commands::EditGroup { subs, app, key, path } => {
            commands::edit_group(ctx, subs, &app, key, &path).await?
        }
        Commands::DeleteGroup { subs, app, key } => {
            commands::delete_group(ctx, subs, &app, key).await?
        }
        Commands::SetGroup { subs, app, key, state } => {
            commands::set_group(ctx, subs, &app, key, &state).await?
        }
        Commands::SetApp { subs, app, state } => {
            commands::set_app(ctx, subs, &app, state.enabled()).await?
        }
        Commands::SetSubscription { subs, state } => {
            commands::set_subscription(ctx, subs, state.enabled()).await?
        }
        Commands::Remove { subs } => commands::remove(ctx, subs).await?,
        Commands::Refresh => commands::refresh(ctx).await?,
        Commands::Reload => commands::reload(ctx).await?,
        Commands::Tree { path } => commands::load_tree(ctx, &path)?,
        Commands::Query { selector, all } => commands::query(ctx, &selector, all)?,
        Commands::Exec { selector, action } => {
            commands::exec(ctx, &selector, action.into())?
        }
        Commands::Screenshot { path } => commands::screenshot(ctx, &path).await?,
        Commands::Simulate => commands::simulate(ctx).await?,
        Commands::Start => commands::start(ctx).await?,
        Commands::Run { seconds } => commands::run(ctx, seconds).await?,
        Commands::Stop => commands::stop(ctx).await?,
        Commands::Service { state } => commands::set_service(ctx, state.enabled()).await?,
        Commands::Config => commands::show_settings(ctx).await?,
        Commands::Logs { limit } => commands::logs(ctx, limit)?,
        Commands::Exit => {
            commands::exit();
            return Ok(true);
        }
    }
    Ok(false)
}
