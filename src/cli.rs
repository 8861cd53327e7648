use crate::bracket::{build_from_roster, integrate_results};
use crate::client::HouseClient;
use crate::scoreboard::{fetch_scoreboard, Scoreboard};
use crate::terminal::{self, render_bracket};
use crate::types::{AppConfig, Match, Team};
use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Bracket auction client", long_about = None)]
pub enum Command {
    #[command(about = "Create a game and print its id", alias = "new")]
    Create { player: String },
    #[command(about = "Join an existing game")]
    Join { game_id: String, player: String },
    #[command(about = "Register as a viewer of a game")]
    View { game_id: String },
    #[command(about = "Bid in a live auction from the terminal", alias = "p")]
    Play { game_id: String, player: String },
    #[command(about = "Print a bracket from a roster file or the NCAA scoreboard")]
    Bracket {
        /// JSON array of teams, ordered by seed
        #[arg(long, conflicts_with = "year")]
        teams: Option<PathBuf>,
        #[arg(long, required_unless_present = "teams")]
        year: Option<u16>,
        #[arg(long, default_value_t = 3)]
        month: u8,
        /// First-round days, comma separated
        #[arg(long, value_delimiter = ',', default_values_t = [21u8, 22])]
        days: Vec<u8>,
    },
}

impl Command {
    pub fn run(self, config: &AppConfig) -> Result<(), String> {
        match self {
            Command::Create { player } => {
                let client = HouseClient::from_config(config);
                let id = client.create_game(&player)?;
                info!("Created game {id} for {player}");
                println!("{id}");
                Ok(())
            }
            Command::Join { game_id, player } => {
                HouseClient::from_config(config).join_game(&game_id, &player)?;
                println!("Joined game {game_id} as {player}");
                Ok(())
            }
            Command::View { game_id } => {
                HouseClient::from_config(config).view_game(&game_id)?;
                println!("Viewing game {game_id}");
                Ok(())
            }
            Command::Play { game_id, player } => terminal::play(config, &game_id, &player),
            Command::Bracket {
                teams,
                year,
                month,
                days,
            } => {
                let board = match (teams, year) {
                    (Some(path), _) => Scoreboard {
                        teams: load_roster(&path)?,
                        results: Vec::new(),
                    },
                    (None, Some(year)) => fetch_scoreboard(year, month, &days)?,
                    (None, None) => return Err("Pass --teams or --year".to_string()),
                };
                let bracket = bracket_for(&board)?;
                for line in render_bracket(&bracket, &[]) {
                    println!("{line}");
                }
                Ok(())
            }
        }
    }
}

pub fn load_roster(path: &Path) -> Result<Vec<Team>, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("read roster {}: {e}", path.display()))?;
    serde_json::from_str::<Vec<Team>>(&data).map_err(|e| format!("parse roster {}: {e}", path.display()))
}

/// One region or the full field, depending on how many teams arrived.
pub fn bracket_for(board: &Scoreboard) -> Result<Vec<Match>, String> {
    let bracket = build_from_roster(&board.sorted_teams())?;
    Ok(integrate_results(&bracket, &board.results))
}
