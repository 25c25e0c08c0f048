use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use tokio::{io::BufReader, sync::mpsc::UnboundedReceiver};

use crate::{
    db::{Database, WorkoutTotals},
    detection::DetectorConfig,
    pose::{JsonLinesPoseSource, PoseSource, SyntheticConfig, SyntheticPoseSource},
    settings::SettingsStore,
    store::{MockRemoteStore, WorkoutStore},
    utils::format::{format_duration, format_started_at},
    workout::{EventEmitter, WorkoutController, WorkoutEvent, WorkoutIdentity},
};

#[derive(Parser, Debug)]
#[command(name = "repcounter")]
#[command(version)]
#[command(about = "Counts push-ups from a stream of body-pose frames", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the workout database and settings
    #[arg(long, global = true, env = "REPCOUNTER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Where completed workouts are saved
    #[arg(long, global = true, value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a workout session and save it when it ends
    Workout(WorkoutArgs),

    /// List saved workouts, newest first
    History(HistoryArgs),

    /// Delete a saved workout
    Delete {
        /// Workout id as shown by `history`
        id: String,
    },

    /// Show or change persistent settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Local SQLite database in the data directory
    Sqlite,
    /// In-memory stand-in for a remote backend; nothing survives the process
    Mock,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Generated push-up motion
    Synthetic,
    /// JSON pose frames, one per line, on standard input
    Stdin,
    /// JSON pose frames, one per line, read from --file
    File,
}

#[derive(Args, Debug, Clone)]
pub struct WorkoutArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Synthetic)]
    pub source: SourceKind,

    /// Pose frame file for `--source file`
    #[arg(long, required_if_eq("source", "file"))]
    pub file: Option<PathBuf>,

    /// Reps the synthetic source performs; 0 keeps going until Ctrl-C
    #[arg(long, default_value_t = 10)]
    pub reps: u32,

    /// Synthetic frame rate
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    /// Seed for the synthetic motion noise
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Print every workout event as a JSON line instead of progress text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Only workouts recorded under this installation's owner id
    #[arg(long)]
    pub mine: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current settings
    Show,
    /// Update one or more settings
    Set {
        /// Minimum shoulder-over-elbow height (normalized) counted as "up"
        #[arg(long)]
        down_threshold: Option<f64>,

        /// Joints at or below this confidence are treated as missing
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Device name recorded on new workouts
        #[arg(long)]
        device: Option<String>,
    },
}

pub struct AppState {
    pub store: Arc<dyn WorkoutStore>,
    pub workouts: WorkoutController,
    pub settings: SettingsStore,
}

impl AppState {
    pub fn open(
        data_dir: &Path,
        store_kind: StoreKind,
    ) -> Result<(Self, UnboundedReceiver<WorkoutEvent>)> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!("Failed to create data directory {}", data_dir.display())
        })?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        let store: Arc<dyn WorkoutStore> = match store_kind {
            StoreKind::Sqlite => Arc::new(Database::new(data_dir.join("repcounter.sqlite3"))?),
            StoreKind::Mock => Arc::new(MockRemoteStore::new()),
        };

        let identity = WorkoutIdentity {
            owner_id: settings.owner_id(),
            device: settings.device(),
        };
        let (events, receiver) = EventEmitter::channel();
        let workouts = WorkoutController::new(
            store.clone(),
            events,
            identity,
            settings.detector_config(),
        );

        Ok((
            Self {
                store,
                workouts,
                settings,
            },
            receiver,
        ))
    }
}

/// Per-platform application data directory, e.g. `~/.local/share/repcounter`.
pub fn default_data_dir() -> Result<PathBuf> {
    resolve_data_dir(dirs::data_dir(), dirs::home_dir())
}

fn resolve_data_dir(data_dir: Option<PathBuf>, home_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir {
        return Ok(dir.join("repcounter"));
    }
    if let Some(home) = home_dir {
        return Ok(home.join(".repcounter"));
    }
    bail!("could not determine a data directory; pass --data-dir or set REPCOUNTER_DATA_DIR")
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    match cli.command {
        Commands::Config { action } => {
            let settings = open_settings(&data_dir)?;
            config(&settings, action)
        }
        Commands::Workout(args) => {
            let (state, receiver) = AppState::open(&data_dir, cli.store)?;
            workout(&state, receiver, args).await
        }
        Commands::History(args) => {
            let (state, _receiver) = AppState::open(&data_dir, cli.store)?;
            history(&state, args).await
        }
        Commands::Delete { id } => {
            let (state, _receiver) = AppState::open(&data_dir, cli.store)?;
            delete(&state, &id).await
        }
    }
}

fn open_settings(data_dir: &Path) -> Result<SettingsStore> {
    std::fs::create_dir_all(data_dir).with_context(|| {
        format!("Failed to create data directory {}", data_dir.display())
    })?;
    SettingsStore::new(data_dir.join("settings.json"))
}

async fn build_source(args: &WorkoutArgs) -> Result<Box<dyn PoseSource>> {
    let source: Box<dyn PoseSource> = match args.source {
        SourceKind::Synthetic => {
            let config = SyntheticConfig {
                reps: (args.reps > 0).then_some(args.reps),
                frame_interval: Duration::from_secs(1) / args.fps,
                seed: args.seed,
                ..SyntheticConfig::default()
            };
            Box::new(SyntheticPoseSource::new(config)?)
        }
        SourceKind::Stdin => Box::new(JsonLinesPoseSource::new(BufReader::new(tokio::io::stdin()))),
        SourceKind::File => {
            let Some(path) = args.file.as_ref() else {
                bail!("--file is required with --source file");
            };
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open pose file {}", path.display()))?;
            Box::new(JsonLinesPoseSource::new(BufReader::new(file)))
        }
    };
    Ok(source)
}

pub async fn workout(
    state: &AppState,
    mut receiver: UnboundedReceiver<WorkoutEvent>,
    args: WorkoutArgs,
) -> Result<()> {
    let source = build_source(&args).await?;
    let started = state.workouts.start_workout(source).await?;
    if !args.json {
        println!("Workout started. Press Ctrl-C to finish.");
    }
    let session_id = started.session_id.unwrap_or_default();

    let mut duration_secs = 0;
    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else { break };
                if args.json {
                    print_json(&event)?;
                }
                match event {
                    WorkoutEvent::Tick { duration_secs: elapsed, .. } => duration_secs = elapsed,
                    WorkoutEvent::RepCounted { total_reps, .. } if !args.json => {
                        println!("{:>4} reps  {}", total_reps, format_duration(duration_secs));
                    }
                    WorkoutEvent::PoseSourceEnded { session_id: ended } if ended == session_id => {
                        info!("Pose input finished; ending workout");
                        break;
                    }
                    _ => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!("Failed to listen for Ctrl-C: {err}");
                }
                break;
            }
        }
    }

    let workout = state.workouts.end_workout().await?;

    let mut persisted = false;
    while let Ok(event) = receiver.try_recv() {
        if args.json {
            print_json(&event)?;
        }
        if let WorkoutEvent::WorkoutCompleted { persisted: saved, .. } = event {
            persisted = saved;
        }
    }

    if !args.json {
        println!(
            "Workout complete: {} reps in {}",
            workout.total_reps,
            format_duration(workout.total_duration_seconds)
        );
        if !persisted {
            println!("Workout could not be saved; see the log for details.");
        }
    }
    Ok(())
}

fn print_json(event: &WorkoutEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub async fn history(state: &AppState, args: HistoryArgs) -> Result<()> {
    let (workouts, totals) = if args.mine {
        let owned = state.store.fetch_for_owner(&state.settings.owner_id()).await?;
        let mut totals = WorkoutTotals::default();
        for workout in &owned {
            totals.add(workout);
        }
        let page: Vec<_> = owned.into_iter().skip(args.offset).take(args.limit).collect();
        (page, totals)
    } else {
        let page = state.store.fetch_page(args.limit, args.offset).await?;
        (page, state.store.totals().await?)
    };
    if workouts.is_empty() {
        println!("No workouts yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<16}  {:>6}  {:>5}  DEVICE",
        "ID", "STARTED", "TIME", "REPS"
    );
    for workout in &workouts {
        println!(
            "{:<36}  {:<16}  {:>6}  {:>5}  {}",
            workout.id,
            format_started_at(workout.started_at),
            format_duration(workout.total_duration_seconds),
            workout.total_reps,
            workout.device
        );
    }

    println!(
        "\n{} workouts, {} reps, {} total",
        totals.workout_count,
        totals.total_reps,
        format_duration(totals.total_duration_seconds)
    );
    Ok(())
}

pub async fn delete(state: &AppState, workout_id: &str) -> Result<()> {
    if !state.store.delete_workout(workout_id).await? {
        bail!("no workout with id {workout_id}");
    }
    println!("Deleted workout {workout_id}");
    Ok(())
}

pub fn config(settings: &SettingsStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {}
        ConfigAction::Set {
            down_threshold,
            min_confidence,
            device,
        } => {
            if down_threshold.is_some() || min_confidence.is_some() {
                let current = settings.detector_config();
                settings.update_detector_config(DetectorConfig {
                    down_threshold: down_threshold.unwrap_or(current.down_threshold),
                    min_confidence: min_confidence.unwrap_or(current.min_confidence),
                })?;
            }
            if let Some(device) = device {
                settings.update_device(device)?;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&settings.snapshot())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    fn synthetic_args(reps: u32) -> WorkoutArgs {
        WorkoutArgs {
            source: SourceKind::Synthetic,
            file: None,
            reps,
            fps: 240,
            seed: 3,
            json: false,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn data_dir_prefers_platform_dir_then_home() {
        let data = PathBuf::from("/srv/data");
        let home = PathBuf::from("/home/athlete");

        assert_eq!(
            resolve_data_dir(Some(data.clone()), Some(home.clone())).unwrap(),
            data.join("repcounter")
        );
        assert_eq!(
            resolve_data_dir(None, Some(home.clone())).unwrap(),
            home.join(".repcounter")
        );
        assert!(resolve_data_dir(None, None).is_err());
    }

    #[test]
    fn default_data_dir_is_absolute() {
        if let Ok(dir) = default_data_dir() {
            assert!(dir.is_absolute(), "{}", dir.display());
            assert!(dir.ends_with("repcounter") || dir.ends_with(".repcounter"));
        }
    }

    #[test]
    fn parses_workout_flags() {
        let cli = Cli::try_parse_from([
            "repcounter",
            "--store",
            "mock",
            "workout",
            "--reps",
            "5",
            "--fps",
            "60",
        ])
        .unwrap();
        assert_eq!(cli.store, StoreKind::Mock);
        match cli.command {
            Commands::Workout(args) => {
                assert_eq!(args.reps, 5);
                assert_eq!(args.fps, 60);
                assert_eq!(args.source, SourceKind::Synthetic);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["repcounter", "workout", "--fps", "0"]).is_err());
        assert!(Cli::try_parse_from(["repcounter", "workout", "--source", "file"]).is_err());
    }

    #[tokio::test]
    async fn synthetic_workout_lands_in_history() {
        let dir = tempdir().unwrap();
        let (state, receiver) = AppState::open(dir.path(), StoreKind::Sqlite).unwrap();

        workout(&state, receiver, synthetic_args(2)).await.unwrap();

        let saved = state.store.fetch_workouts().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].total_reps, 2);
        assert_eq!(saved[0].user_id, state.settings.owner_id());

        delete(&state, &saved[0].id).await.unwrap();
        assert!(delete(&state, &saved[0].id).await.is_err());
        history(
            &state,
            HistoryArgs {
                limit: 5,
                offset: 0,
                mine: true,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn file_source_replays_recorded_frames() {
        let dir = tempdir().unwrap();
        let frames = dir.path().join("frames.jsonl");
        let up = r#"{"joints":{"leftShoulder":{"x":0.4,"y":0.75,"confidence":0.9},"rightShoulder":{"x":0.6,"y":0.75,"confidence":0.9},"leftElbow":{"x":0.3,"y":0.45,"confidence":0.9},"rightElbow":{"x":0.7,"y":0.45,"confidence":0.9}}}"#;
        let down = r#"{"joints":{"leftShoulder":{"x":0.4,"y":0.5,"confidence":0.9},"rightShoulder":{"x":0.6,"y":0.5,"confidence":0.9},"leftElbow":{"x":0.3,"y":0.45,"confidence":0.9},"rightElbow":{"x":0.7,"y":0.45,"confidence":0.9}}}"#;
        std::fs::write(&frames, [up, down, up, down, up].join("\n")).unwrap();

        let (state, receiver) = AppState::open(dir.path(), StoreKind::Sqlite).unwrap();
        let args = WorkoutArgs {
            source: SourceKind::File,
            file: Some(frames),
            ..synthetic_args(0)
        };
        workout(&state, receiver, args).await.unwrap();

        let saved = state.store.fetch_workouts().await.unwrap();
        assert_eq!(saved[0].total_reps, 2);
    }

    #[test]
    fn config_set_updates_only_given_fields() {
        let dir = tempdir().unwrap();
        let settings = open_settings(dir.path()).unwrap();

        config(
            &settings,
            ConfigAction::Set {
                down_threshold: Some(0.2),
                min_confidence: None,
                device: Some("iPhone".into()),
            },
        )
        .unwrap();

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.detector.down_threshold, 0.2);
        assert_eq!(snapshot.detector.min_confidence, 0.3);
        assert_eq!(snapshot.device, "iPhone");

        let rejected = config(
            &settings,
            ConfigAction::Set {
                down_threshold: None,
                min_confidence: Some(2.0),
                device: None,
            },
        );
        assert!(rejected.is_err());
    }
}
