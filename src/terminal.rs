use crate::auction::{format_countdown, AuctionSnapshot, AuctionStore, FoldOutcome, Ingested};
use crate::bracket::group_by_round;
use crate::client::HouseClient;
use crate::connection::{FrameSource, LiveConnection};
use crate::error::AuctionError;
use crate::events::EventKind;
use crate::session::{AuctionSession, BidOutcome, SessionMode, SharedTransport};
use crate::types::{AppConfig, Match};
use std::{
    io::{self, BufRead},
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread::sleep,
    time::Duration,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Bid(String),
    /// `bid` with no amount: one above the highest bid.
    SuggestedBid,
    Quick(u32),
    Status,
    Standings,
    Bracket,
    Log,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Option<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(step) = trimmed.strip_prefix('+') {
        return Some(match step.trim().parse::<u32>() {
            Ok(step) => Input::Quick(step),
            Err(_) => Input::Help,
        });
    }
    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next();
    let input = match (head.as_str(), arg) {
        ("q" | "quit" | "exit", _) => Input::Quit,
        ("s" | "status", _) => Input::Status,
        ("standings" | "players", _) => Input::Standings,
        ("bracket", _) => Input::Bracket,
        ("log" | "history", _) => Input::Log,
        ("bid" | "b", Some(amount)) => Input::Bid(amount.to_string()),
        ("bid" | "b", None) => Input::SuggestedBid,
        ("quick", Some(step)) => match step.parse::<u32>() {
            Ok(step) => Input::Quick(step),
            Err(_) => Input::Help,
        },
        (amount, None) if amount.chars().all(|c| c.is_ascii_digit()) => Input::Bid(amount.to_string()),
        _ => Input::Help,
    };
    Some(input)
}

pub fn status_line(snapshot: &AuctionSnapshot, player: &str) -> String {
    let team = match &snapshot.current_team {
        Some(team) => format!("{} ({} {})", team.short_name, team.seed, team.region),
        None => "no team yet".to_string(),
    };
    let balance = snapshot
        .player(player)
        .map(|p| format!("${}", p.balance))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{team} | highest ${} | {} | your balance {balance} | {} teams left",
        snapshot.highest_bid,
        format_countdown(snapshot.countdown),
        snapshot.remaining.len()
    )
}

pub fn standings_lines(snapshot: &AuctionSnapshot) -> Vec<String> {
    if snapshot.players.is_empty() {
        return vec!["No players".to_string()];
    }
    let mut lines: Vec<String> = snapshot
        .standings()
        .into_iter()
        .enumerate()
        .map(|(idx, p)| {
            let teams = p
                .teams
                .iter()
                .map(|t| format!("{} ${}", t.team.short_name, t.purchase_price))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}. {} - {} pts - ${} left - [{teams}]", idx + 1, p.name, p.points, p.balance)
        })
        .collect();
    lines.push(format!("Best team so far: {} pts", snapshot.top_team_points()));
    lines
}

/// Announcements received this session, oldest first.
pub fn history_lines(store: &AuctionStore) -> Vec<String> {
    let lines: Vec<String> = store
        .history()
        .map(|a| format!("[{}] {}", a.received_at.format("%H:%M:%S"), a.text))
        .collect();
    if lines.is_empty() {
        return vec!["No announcements yet".to_string()];
    }
    lines
}

/// Rounds in bracket order. Matches listed in `marked` get a leading `*`.
pub fn render_bracket(bracket: &[Match], marked: &[&Match]) -> Vec<String> {
    let mut lines = Vec::new();
    for (round, matches) in group_by_round(bracket) {
        lines.push(format!("== {round} =="));
        for m in matches {
            let side = |idx: usize| match m.participants[idx].team() {
                Some(team) => format!("({}) {}", team.seed, team.short_name),
                None => "TBD".to_string(),
            };
            let winner = m.winner.as_deref().map(|w| format!("  -> {w}")).unwrap_or_default();
            let mark = if marked.iter().any(|h| h.id == m.id) { '*' } else { ' ' };
            lines.push(format!("{mark}#{:<3} {} vs {}{winner}", m.id, side(0), side(1)));
        }
    }
    lines
}

/// Interactive terminal session for one player.
pub fn play(config: &AppConfig, game_id: &str, player: &str) -> Result<(), String> {
    let client = HouseClient::from_config(config);
    let poll_interval = Duration::from_millis(config.socket_poll_interval_ms.max(10));
    let connection = LiveConnection::open(&client.socket_url(game_id), poll_interval).map_err(|e| e.to_string())?;
    let transport: SharedTransport = Arc::new(client);
    let mut session = AuctionSession::new(
        game_id,
        player,
        AuctionStore::from_config(config),
        connection,
        transport,
    );

    let commands = spawn_stdin_reader();
    println!("Joined game {game_id} as {player}. Waiting for bidding to open...");
    print_help(config);

    let mut shown_banner = false;
    loop {
        let (outcomes, frame) = session.poll();
        for outcome in outcomes {
            match outcome {
                BidOutcome::Accepted(request) => println!("Bid ${} on {} sent.", request.bid, request.team),
                BidOutcome::Rejected(_, err) => println!("{err}. Please try again."),
            }
        }

        match frame {
            Ok(Some(Ingested::GameStarted)) => println!("Bidding is open!"),
            Ok(Some(Ingested::Folded(FoldOutcome::Applied(kind)))) => render_change(&session, kind),
            Ok(_) => {}
            Err(AuctionError::ConnectionError(_)) => {
                if !shown_banner {
                    if let Some(banner) = session.banner() {
                        println!("!! {banner}. Showing the last known state.");
                    }
                    shown_banner = true;
                }
                sleep(poll_interval);
            }
            Err(err) => info!("Ignored push frame: {err}"),
        }

        if let Some(announcement) = session.take_announcement() {
            println!(">> {announcement}");
        }

        let input = match commands.try_recv() {
            Ok(input) => input,
            Err(TryRecvError::Empty) => continue,
            Err(TryRecvError::Disconnected) => Input::Quit,
        };
        match input {
            Input::Quit => break,
            Input::Help => print_help(config),
            Input::Status => println!("{}", status_line(session.snapshot(), player)),
            Input::Standings => {
                for line in standings_lines(session.snapshot()) {
                    println!("{line}");
                }
            }
            Input::Bracket => match session.bracket() {
                Some(bracket) => {
                    for line in render_bracket(bracket, &session.highlighted_matches()) {
                        println!("{line}");
                    }
                }
                None => println!("No bracket yet, the house has not sent the roster."),
            },
            Input::Log => {
                for line in history_lines(session.store()) {
                    println!("{line}");
                }
            }
            Input::Bid(raw) => report_submission(session.submit_bid(&raw)),
            Input::SuggestedBid => report_submission(session.submit_suggested()),
            Input::Quick(step) => report_submission(session.quick_bid(step)),
        }
    }

    session.close();
    Ok(())
}

fn render_change<S: FrameSource>(session: &AuctionSession<S>, kind: EventKind) {
    let snapshot = session.snapshot();
    match kind {
        EventKind::Team | EventKind::Bid => println!("{}", status_line(snapshot, session.player())),
        EventKind::Countdown if session.mode() == SessionMode::Auction && snapshot.countdown <= 3 => {
            println!("{} left", format_countdown(snapshot.countdown));
        }
        EventKind::Players => {
            if let Some(me) = snapshot.player(session.player()) {
                println!("Your balance: ${} ({} teams)", me.balance, me.teams.len());
            }
        }
        _ => {}
    }
}

fn report_submission(result: Result<u32, AuctionError>) {
    match result {
        Ok(amount) => println!("Submitting ${amount}..."),
        Err(err) if err.is_validation() => println!("{err}. Please try again."),
        Err(err) => println!("{err}."),
    }
}

fn print_help(config: &AppConfig) {
    let quick = config
        .quick_bid_increments
        .iter()
        .map(|step| format!("+{step}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("Commands: <amount> | bid [amount] | quick <n> | {quick} | status | standings | bracket | log | quit");
}

fn spawn_stdin_reader() -> Receiver<Input> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            if let Some(input) = parse_input(&line) {
                let quit = input == Input::Quit;
                if tx.send(input).is_err() || quit {
                    break;
                }
            }
        }
    });
    rx
}
