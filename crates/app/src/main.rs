//! Runs bicycle balance episodes with the scripted pilot on the reference body.

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use bike_env::{Action, BicycleEnv, EnvConfig, LogPainter, TriggerZones};
use clap::Parser;
use control::{Pilot, PilotConfig};
use log::{info, warn, LevelFilter};
use serde::Serialize;
use simcore::{Model, ReferenceBody, RigidBody};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Radius of the goal trigger sphere (m)
const GOAL_RADIUS: f64 = 2.0;
/// Free floor around the spawn-goal segment before the walls (m)
const ARENA_MARGIN: f64 = 8.0;

/// Bicycle balance episode runner
#[derive(Parser, Debug)]
#[command(name = "bike-balance")]
#[command(about = "Runs bicycle balance episodes with a scripted pilot")]
#[command(version)]
struct Args {
    /// JSON configuration; omitted fields keep their defaults
    config: Option<PathBuf>,

    /// Number of episodes to run
    #[arg(long, default_value_t = 3)]
    episodes: usize,

    /// Step cap per episode
    #[arg(long, default_value_t = 6_000)]
    max_steps: usize,

    /// Send neutral actions instead of the pilot's
    #[arg(long)]
    neutral: bool,

    /// Write a per-step trace to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level.parse().map_err(|_| format!("unknown log level {level}"))
}

#[derive(Debug, Serialize)]
struct EpisodeSummary {
    episode: usize,
    outcome: String,
    steps: u64,
    elapsed: f64,
    total_reward: f64,
    checkpoints: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    TermLogger::init(args.log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let config = match &args.config {
        Some(path) => EnvConfig::load(path)?,
        None => EnvConfig::default(),
    };
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mode = config.episode.action_mode;
    let dt = config.episode.dt;
    let mut zones = TriggerZones::for_episode(&config.episode, GOAL_RADIUS, ARENA_MARGIN);
    let mut pilot = Pilot::new(PilotConfig::default(), config.episode.goal());
    let body = ReferenceBody::new(config.body.clone());
    let mut env = BicycleEnv::new(config, body)?;
    env.set_ground_painter(Box::new(LogPainter));

    let mut csv = match &args.csv {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            writeln!(file, "episode,t,x,z,speed,lean,threshold,steer,reward")?;
            Some(file)
        }
        None => None,
    };

    let mut summaries = Vec::with_capacity(args.episodes);
    for episode in 0..args.episodes {
        env.reset();
        zones.clear();
        pilot.reset();

        let mut outcome = None;
        for _ in 0..args.max_steps {
            let state = env.body().kinematic_state();
            let action = if args.neutral {
                Action::neutral(mode)
            } else {
                let input = pilot.command(&state, dt);
                Action::from_axes(input.horizontal, input.vertical, mode)
            };

            let result = env.step(action)?;

            if let Some(file) = csv.as_mut() {
                let state = env.body().kinematic_state();
                let obs = result.observation.as_slice();
                writeln!(
                    file,
                    "{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.6}",
                    episode,
                    result.info.elapsed,
                    state.position.x,
                    state.position.z,
                    obs[1],
                    obs[0],
                    obs[4],
                    obs[3],
                    result.reward
                )?;
            }

            if result.done {
                outcome = result.info.outcome;
                break;
            }
            for contact in zones.update(&env.body().kinematic_state().position) {
                env.notify_contact(contact);
            }
        }

        if outcome.is_none() {
            warn!("Episode {episode} hit the {} step cap without finishing", args.max_steps);
        }
        let record = env.episode();
        let summary = EpisodeSummary {
            episode,
            outcome: outcome.map_or_else(|| "Unfinished".to_string(), |o| format!("{o:?}")),
            steps: record.steps,
            elapsed: record.elapsed,
            total_reward: record.cumulative_reward,
            checkpoints: record.checkpoints.cursor(),
        };
        info!(
            "Episode {}: {} in {} steps, return {:.2}, checkpoints {}",
            summary.episode, summary.outcome, summary.steps, summary.total_reward, summary.checkpoints
        );
        summaries.push(summary);
    }

    if let Some(mut file) = csv {
        file.flush()?;
    }
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["bike-balance"]).unwrap();
        assert_eq!(args.episodes, 3);
        assert_eq!(args.max_steps, 6_000);
        assert_eq!(args.log_level, LevelFilter::Info);
        assert!(args.config.is_none() && args.csv.is_none());
        assert!(!args.neutral && !args.dump_config);
    }

    #[test]
    fn test_flags_and_config_path() {
        let args = Args::try_parse_from([
            "bike-balance",
            "run.json",
            "--episodes",
            "7",
            "--neutral",
            "--log-level",
            "debug",
            "--csv",
            "trace.csv",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("run.json")));
        assert_eq!(args.episodes, 7);
        assert!(args.neutral);
        assert_eq!(args.log_level, LevelFilter::Debug);
        assert_eq!(args.csv, Some(PathBuf::from("trace.csv")));
    }

    #[test]
    fn test_bad_input_is_rejected() {
        assert!(Args::try_parse_from(["bike-balance", "--log-level", "loud"]).is_err());
        assert!(Args::try_parse_from(["bike-balance", "--episodes"]).is_err());
        assert!(Args::try_parse_from(["bike-balance", "--frobnicate"]).is_err());
    }

    #[test]
    fn test_help_and_version_are_available() {
        let help = Args::try_parse_from(["bike-balance", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        let version = Args::try_parse_from(["bike-balance", "--version"]).unwrap_err();
        assert_eq!(version.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
