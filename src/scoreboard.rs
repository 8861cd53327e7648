//! Team roster and decided games from the NCAA scoreboard feed.

use crate::types::{Match, Region, Slot, Team};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const SCOREBOARD_BASE_URL: &str = "https://data.ncaa.com/casablanca/scoreboard/basketball-men/d1";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scoreboard {
    pub teams: Vec<Team>,
    /// Finished games with a winner. Ids are 0: they are matched to bracket
    /// matches by their participants.
    pub results: Vec<Match>,
}

impl Scoreboard {
    pub fn merge(&mut self, other: Scoreboard) {
        let mut known: HashSet<String> = self.teams.iter().map(|t| t.short_name.clone()).collect();
        for team in other.teams {
            if known.insert(team.short_name.clone()) {
                self.teams.push(team);
            }
        }
        self.results.extend(other.results);
    }

    /// Teams ordered by seed, then region, as the bracket builder expects them.
    pub fn sorted_teams(&self) -> Vec<Team> {
        let mut teams = self.teams.clone();
        teams.sort_by(|a, b| a.seed.cmp(&b.seed).then_with(|| a.region.cmp(&b.region)));
        teams
    }
}

pub fn scoreboard_url(year: u16, month: u8, day: u8) -> String {
    format!("{SCOREBOARD_BASE_URL}/{year}/{month:02}/{day:02}/scoreboard.json")
}

/// Fetches the first-round days of a tournament and merges them.
pub fn fetch_scoreboard(year: u16, month: u8, days: &[u8]) -> Result<Scoreboard, String> {
    let client = reqwest::blocking::Client::new();
    let mut merged = Scoreboard::default();
    for day in days {
        let url = scoreboard_url(year, month, *day);
        let resp = client.get(&url).send().map_err(|e| format!("fetch {url}: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("Scoreboard {url} returned {}", resp.status()));
        }
        let value: Value = resp.json().map_err(|e| format!("parse scoreboard {url}: {e}"))?;
        let board = parse_scoreboard(&value);
        info!(
            "Scoreboard {url}: {} teams, {} results",
            board.teams.len(),
            board.results.len()
        );
        merged.merge(board);
    }
    Ok(merged)
}

pub fn parse_scoreboard(value: &Value) -> Scoreboard {
    let mut board = Scoreboard::default();
    let games = match value.get("games").and_then(|g| g.as_array()) {
        Some(games) => games,
        None => {
            warn!("Scoreboard payload has no games array");
            return board;
        }
    };

    let mut seen = HashSet::new();
    for entry in games {
        let game = match entry.get("game") {
            Some(game) => game,
            None => continue,
        };
        let region_raw = game.get("bracketRegion").and_then(|v| v.as_str()).unwrap_or("");
        let region = match Region::parse(region_raw) {
            Some(region) => region,
            None => {
                debug!("Skipping game outside the four regions ({region_raw:?})");
                continue;
            }
        };
        let (away, home) = match (parse_side(game.get("away"), region), parse_side(game.get("home"), region)) {
            (Some(away), Some(home)) => (away, home),
            _ => continue,
        };

        for (team, _) in [&away, &home] {
            if seen.insert(team.short_name.clone()) {
                board.teams.push(team.clone());
            }
        }

        let finished = game
            .get("gameState")
            .and_then(|v| v.as_str())
            .map(|state| state.eq_ignore_ascii_case("final"))
            .unwrap_or(false);
        let winner = match (away.1, home.1) {
            (true, false) => Some(away.0.short_name.clone()),
            (false, true) => Some(home.0.short_name.clone()),
            _ => None,
        };
        if let (true, Some(winner)) = (finished, winner) {
            board.results.push(Match {
                id: 0,
                next_match_id: None,
                round_name: game
                    .get("bracketRound")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                participants: [Slot::Team(away.0), Slot::Team(home.0)],
                winner: Some(winner),
            });
        }
    }
    board
}

/// A team and whether the feed marks it as the winner.
fn parse_side(side: Option<&Value>, region: Region) -> Option<(Team, bool)> {
    let side = side?;
    let names = side.get("names");
    let short_name = names
        .and_then(|n| n.get("short"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())?
        .to_string();
    let url_name = names
        .and_then(|n| n.get("seo"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|seo| !seo.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&short_name));
    let seed = match side.get("seed") {
        Some(Value::String(raw)) => raw.trim().parse::<u8>().ok(),
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        _ => None,
    }
    .filter(|seed| (1..=16).contains(seed))?;
    let winner = side.get("winner").and_then(|v| v.as_bool()).unwrap_or(false);
    Some((
        Team {
            short_name,
            url_name,
            seed,
            region,
        },
        winner,
    ))
}

/// Fallback url name when the feed has no `seo` field.
fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{build_bracket, integrate_results};
    use serde_json::json;

    fn side(short: &str, seo: Option<&str>, seed: Value, winner: bool) -> Value {
        let mut names = json!({ "short": short });
        if let Some(seo) = seo {
            names["seo"] = json!(seo);
        }
        json!({ "names": names, "seed": seed, "winner": winner })
    }

    fn game(region: &str, state: &str, away: Value, home: Value) -> Value {
        json!({
            "game": {
                "bracketRegion": region,
                "bracketRound": "First Round",
                "gameState": state,
                "away": away,
                "home": home,
            }
        })
    }

    #[test]
    fn parses_teams_and_finished_games() {
        let payload = json!({
            "games": [
                game("South", "final", side("Houston", Some("houston"), json!("1"), true), side("Longwood", None, json!("16"), false)),
                game("East", "live", side("Duke", Some("duke"), json!(4), false), side("Vermont", Some("vermont"), json!("13"), false)),
                game("", "final", side("Wagner", None, json!("16"), true), side("Howard", None, json!("16"), false)),
            ]
        });
        let board = parse_scoreboard(&payload);

        assert_eq!(board.teams.len(), 4);
        assert_eq!(board.teams[1].url_name, "longwood");
        assert_eq!(board.teams[2].seed, 4);
        assert_eq!(board.results.len(), 1);
        assert_eq!(board.results[0].winner.as_deref(), Some("Houston"));
        assert!(board.results[0].winning_team().is_some());
    }

    #[test]
    fn missing_games_array_is_empty() {
        assert_eq!(parse_scoreboard(&json!({ "error": "nope" })), Scoreboard::default());
    }

    #[test]
    fn url_pads_month_and_day() {
        assert_eq!(
            scoreboard_url(2024, 3, 1),
            format!("{SCOREBOARD_BASE_URL}/2024/03/01/scoreboard.json")
        );
    }

    #[test]
    fn merged_days_do_not_duplicate_teams() {
        let day = |winner_away: bool| {
            parse_scoreboard(&json!({
                "games": [game("West", "final", side("Arizona", None, json!("2"), winner_away), side("Long Beach St.", None, json!("15"), !winner_away))]
            }))
        };
        let mut board = day(true);
        board.merge(day(true));
        assert_eq!(board.teams.len(), 2);
        assert_eq!(board.teams[1].url_name, "long-beach-st");
        assert_eq!(board.results.len(), 2);
    }

    #[test]
    fn scoreboard_results_feed_the_bracket() {
        let games: Vec<Value> = (1..=8u8)
            .map(|seed| {
                game(
                    "Midwest",
                    "final",
                    side(&format!("Team {seed}"), None, json!(seed.to_string()), true),
                    side(&format!("Team {}", 17 - seed), None, json!((17 - seed).to_string()), false),
                )
            })
            .collect();
        let board = parse_scoreboard(&json!({ "games": games }));
        let bracket = build_bracket(&board.sorted_teams()).unwrap();
        let updated = integrate_results(&bracket, &board.results);

        let second_round: Vec<&Match> = updated.iter().filter(|m| m.round_name == "Round 2").collect();
        assert!(second_round.iter().all(|m| m.is_determined()));
        assert_eq!(updated.iter().filter(|m| m.winner.is_some()).count(), 8);
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("Saint Mary's (CA)"), "saint-mary-s-ca");
        assert_eq!(slugify("  UConn  "), "uconn");
    }
}
