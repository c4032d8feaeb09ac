use clap::Parser;
use navtree::OutputFormat;
use navtree::core::dispatch::{self, Dispatcher};
use navtree::core::state::{self, Route};
use navtree::core::{Action, ActionMessage, NavError, Reducer, SceneRegistry, config, snapshot};
use simplelog::{ConfigBuilder, WriteLogger};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "navtree", about = "Replay navigation actions against a scene tree")]
struct Args {
    /// Scene description file (.toml or .json)
    #[arg(short, long)]
    scenes: Option<PathBuf>,

    /// JSON action log, one action per line (stdin if omitted)
    #[arg(short, long)]
    actions: Option<PathBuf>,

    /// Start from a saved snapshot instead of the initial state
    #[arg(long)]
    state: Option<PathBuf>,

    /// Save the final tree as a snapshot
    #[arg(long)]
    save: Option<PathBuf>,

    /// How to print trees
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Print the tree after every accepted action
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}; using defaults");
            Default::default()
        }
    };
    let resolved = config::resolve(&file_config, args.scenes.as_deref(), args.output);

    // Initialize file logger
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(resolved.log_level, log_config, log_file);
    }

    log::info!("navtree starting up with {:?}", resolved);

    let scenes_path = resolved
        .scenes_file
        .clone()
        .ok_or("no scene file given (--scenes, NAVTREE_SCENES or general.scenes_file)")?;
    let scene_file = config::load_scene_file(&scenes_path)?;
    let registry = Arc::new(SceneRegistry::from_file(scene_file)?);
    let reducer = Reducer::new(registry)?;

    let dispatcher = match &args.state {
        Some(path) => {
            let restored = snapshot::load_snapshot(path)?;
            // the snapshot must fit the scenes it will be reduced against
            state::validate_with(&restored.state, reducer.registry())?;
            Dispatcher::with_state(reducer, restored.state)
        }
        None => Dispatcher::new(reducer),
    };
    let (handle, task) = dispatch::spawn(dispatcher);

    let reader: Box<dyn BufRead> = match &args.actions {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = n + 1;

        let action = match parse_action(line) {
            Ok(action) => action,
            Err(e) => {
                eprintln!("line {line_no}: skipped: {e}");
                continue;
            }
        };
        let kind = action.kind();

        match handle.dispatch(action).await {
            Ok(true) => {
                eprintln!("line {line_no}: {kind} applied");
                if args.trace {
                    println!("{}", render(&handle.state(), resolved.output)?);
                }
            }
            Ok(false) => eprintln!("line {line_no}: {kind} left the state unchanged"),
            Err(NavError::DispatcherClosed) => return Err(NavError::DispatcherClosed.into()),
            Err(e) => eprintln!("line {line_no}: {kind} rejected: {e}"),
        }
    }

    drop(handle);
    let dispatcher = task.await?;
    println!("{}", render(dispatcher.state(), resolved.output)?);

    if let Some(path) = &args.save {
        let meta = snapshot::save_snapshot(path, dispatcher.state())?;
        eprintln!("snapshot saved to {} (focused {})", path.display(), meta.focused_key);
    }

    log::info!("navtree finished");
    Ok(())
}

fn parse_action(line: &str) -> Result<Action, Box<dyn Error>> {
    let msg: ActionMessage = serde_json::from_str(line)?;
    Ok(Action::try_from(msg)?)
}

fn render(state: &Route, format: OutputFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(state)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(state)?,
        OutputFormat::Outline => state::outline(state).trim_end().to_string(),
    })
}
