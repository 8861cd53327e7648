use crate::types::{Match, Region, Slot, Team, TEAMS_PER_REGION};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub const FINAL_FOUR_LABEL: &str = "Final Four";
pub const CHAMPIONSHIP_LABEL: &str = "Championship";

/// Builds the 15-match bracket of a single 16-team region.
pub fn build_bracket(teams: &[Team]) -> Result<Vec<Match>, String> {
    if teams.len() != TEAMS_PER_REGION {
        return Err(format!(
            "A region bracket needs exactly {TEAMS_PER_REGION} teams, got {}.",
            teams.len()
        ));
    }
    build_single_elimination(teams)
}

/// Builds a single-elimination tree for any power-of-two field of one region.
/// Round one pairs the strongest seed with the weakest (1v16, 2v15, ...) and
/// each later round joins adjacent matches of the previous one.
pub fn build_single_elimination(teams: &[Team]) -> Result<Vec<Match>, String> {
    let mut matches = Vec::new();
    let mut next_id = 1u32;
    build_region(teams, &mut matches, &mut next_id)?;
    Ok(matches)
}

/// Builds all four regions plus the Final Four and the championship (63 matches).
pub fn build_tournament(teams: &[Team]) -> Result<Vec<Match>, String> {
    let mut by_region: HashMap<Region, Vec<Team>> = HashMap::new();
    for team in teams {
        by_region.entry(team.region).or_default().push(team.clone());
    }

    let mut matches = Vec::new();
    let mut next_id = 1u32;
    let mut region_finals = Vec::with_capacity(Region::ALL.len());
    for region in Region::ALL {
        let region_teams = by_region
            .remove(&region)
            .ok_or_else(|| format!("No teams found for the {region} region."))?;
        if region_teams.len() != TEAMS_PER_REGION {
            return Err(format!(
                "The {region} region needs exactly {TEAMS_PER_REGION} teams, got {}.",
                region_teams.len()
            ));
        }
        region_finals.push(build_region(&region_teams, &mut matches, &mut next_id)?);
    }

    let mut semifinals = Vec::with_capacity(2);
    for pair in region_finals.chunks(2) {
        let semi = push_match(&mut matches, &mut next_id, FINAL_FOUR_LABEL.to_string(), empty_slots());
        link(&mut matches, pair, semi);
        semifinals.push(semi);
    }
    let championship = push_match(&mut matches, &mut next_id, CHAMPIONSHIP_LABEL.to_string(), empty_slots());
    link(&mut matches, &semifinals, championship);

    Ok(matches)
}

/// Skeleton for a pushed roster: one region when exactly 16 teams arrive,
/// the full field otherwise.
pub fn build_from_roster(teams: &[Team]) -> Result<Vec<Match>, String> {
    if teams.len() == TEAMS_PER_REGION {
      build_bracket(teams)
    } else {
      build_tournament(teams)
    }
}

/// Writes decided matches back into the bracket. Each winner is recorded on
/// its own match and carried into the slot of the match it advances to.
///
/// Results may arrive in any order; later-round results whose participants
/// are not known yet are retried once earlier rounds have been applied.
/// Applying the same results again leaves the bracket unchanged, and a slot
/// that already holds a different team is never overwritten.
pub fn integrate_results(bracket: &[Match], results: &[Match]) -> Vec<Match> {
    let mut matches = bracket.to_vec();
    let index: HashMap<u32, usize> = matches
        .iter()
        .enumerate()
        .map(|(idx, m)| (m.id, idx))
        .collect();

    let mut pending: Vec<&Match> = results.iter().collect();
    loop {
        let mut deferred: Vec<(&Match, String)> = Vec::new();
        let mut progressed = false;
        for result in pending {
            match apply_result(&mut matches, &index, result) {
                Ok(true) => progressed = true,
                Ok(false) => {}
                Err(reason) => deferred.push((result, reason)),
            }
        }
        if deferred.is_empty() || !progressed {
            for (result, reason) in deferred {
                warn!("Skipping result for match {}: {reason}", result.id);
            }
            break;
        }
        pending = deferred.into_iter().map(|(result, _)| result).collect();
    }
    matches
}

/// Matches the given team takes part in, in bracket order.
pub fn matches_for_team<'a>(bracket: &'a [Match], short_name: &str) -> Vec<&'a Match> {
    bracket.iter().filter(|m| m.involves(short_name)).collect()
}

/// Groups matches by round label, keeping the order rounds first appear in.
pub fn group_by_round(bracket: &[Match]) -> Vec<(String, Vec<&Match>)> {
    let mut rounds: Vec<(String, Vec<&Match>)> = Vec::new();
    for m in bracket {
        match rounds.iter_mut().find(|(label, _)| *label == m.round_name) {
            Some((_, round)) => round.push(m),
            None => rounds.push((m.round_name.clone(), vec![m])),
        }
    }
    rounds
}

/// Returns the index of the region final.
fn build_region(teams: &[Team], matches: &mut Vec<Match>, next_id: &mut u32) -> Result<usize, String> {
    let seeded = normalize_region(teams)?;
    let size = seeded.len();

    let mut previous = Vec::with_capacity(size / 2);
    for i in 0..size / 2 {
        let high = seeded[i].clone();
        let low = seeded[size - 1 - i].clone();
        previous.push(push_match(matches, next_id, round_label(1), [Slot::Team(high), Slot::Team(low)]));
    }

    let mut round = 2usize;
    while previous.len() > 1 {
        let mut current = Vec::with_capacity(previous.len() / 2);
        for pair in previous.chunks(2) {
            let idx = push_match(matches, next_id, round_label(round), empty_slots());
            link(matches, pair, idx);
            current.push(idx);
        }
        previous = current;
        round += 1;
    }

    previous
        .first()
        .copied()
        .ok_or_else(|| "Region bracket produced no final.".to_string())
}

fn normalize_region(teams: &[Team]) -> Result<Vec<Team>, String> {
    let size = teams.len();
    if size < 2 || !size.is_power_of_two() {
        return Err(format!("A bracket needs a power-of-two number of teams, got {size}."));
    }
    let region = teams[0].region;
    if let Some(stray) = teams.iter().find(|t| t.region != region) {
        return Err(format!(
            "{} belongs to the {} region, expected {region}.",
            stray.short_name, stray.region
        ));
    }

    let mut seen = HashSet::new();
    for team in teams {
        if team.seed == 0 || usize::from(team.seed) > size {
            return Err(format!("{} has seed {}, expected 1..={size}.", team.short_name, team.seed));
        }
        if !seen.insert(team.seed) {
            return Err(format!("Seed {} appears twice in the {region} region.", team.seed));
        }
    }

    let mut seeded = teams.to_vec();
    seeded.sort_by_key(|t| t.seed);
    Ok(seeded)
}

fn push_match(matches: &mut Vec<Match>, next_id: &mut u32, round_name: String, participants: [Slot; 2]) -> usize {
    let id = *next_id;
    *next_id += 1;
    matches.push(Match {
        id,
        next_match_id: None,
        round_name,
        participants,
        winner: None,
    });
    matches.len() - 1
}

fn link(matches: &mut [Match], feeders: &[usize], target: usize) {
    let target_id = matches[target].id;
    for &feeder in feeders {
        matches[feeder].next_match_id = Some(target_id);
    }
}

fn empty_slots() -> [Slot; 2] {
    [Slot::Undetermined, Slot::Undetermined]
}

fn round_label(round: usize) -> String {
    format!("Round {round}")
}

/// Ok(true) when the bracket changed, Ok(false) when the result was already applied.
fn apply_result(matches: &mut [Match], index: &HashMap<u32, usize>, result: &Match) -> Result<bool, String> {
    let winner = result
        .winning_team()
        .cloned()
        .ok_or_else(|| "a winner needs two determined participants and must be one of them".to_string())?;
    let position = locate(matches, index, result)
        .ok_or_else(|| "no bracket match with these participants yet".to_string())?;

    let decided = &matches[position];
    if let Some(existing) = decided.winner.as_deref() {
        if existing != winner.short_name {
            return Err(format!(
                "match {} already won by {existing}, not {}",
                decided.id, winner.short_name
            ));
        }
    }

    let decided_id = decided.id;
    let target = match decided.next_match_id {
        Some(next_id) => {
            let next_pos = *index
                .get(&next_id)
                .ok_or_else(|| format!("match {decided_id} points at missing match {next_id}"))?;
            let slot_index = feeder_slot(matches, next_id, decided_id);
            match &matches[next_pos].participants[slot_index] {
                Slot::Team(current) if current.short_name != winner.short_name => {
                    return Err(format!(
                        "match {next_id} already holds {} where {} should advance",
                        current.short_name, winner.short_name
                    ));
                }
                _ => Some((next_pos, slot_index)),
            }
        }
        None => None,
    };

    let mut changed = false;
    if matches[position].winner.is_none() {
        matches[position].winner = Some(winner.short_name.clone());
        changed = true;
    }
    if let Some((next_pos, slot_index)) = target {
        let slot = &mut matches[next_pos].participants[slot_index];
        if !slot.is_determined() {
            debug!("{} advances from match {decided_id}", winner.short_name);
            *slot = Slot::Team(winner);
            changed = true;
        }
    }
    Ok(changed)
}

/// Finds the bracket match a result refers to: by id when the pairing agrees,
/// otherwise by the pair of participants.
fn locate(matches: &[Match], index: &HashMap<u32, usize>, result: &Match) -> Option<usize> {
    if let Some(&idx) = index.get(&result.id) {
        if same_pairing(&matches[idx], result) {
            return Some(idx);
        }
    }
    matches.iter().position(|m| same_pairing(m, result))
}

fn same_pairing(a: &Match, b: &Match) -> bool {
    if !a.is_determined() || !b.is_determined() {
        return false;
    }
    let names = |m: &Match| -> HashSet<String> {
        m.participants
            .iter()
            .filter_map(Slot::team)
            .map(|t| t.short_name.clone())
            .collect()
    };
    names(a) == names(b)
}

/// The lower-id feeder fills slot 0 of the next match, the other slot 1.
fn feeder_slot(matches: &[Match], next_id: u32, feeder_id: u32) -> usize {
    let earlier_feeders = matches
        .iter()
        .filter(|m| m.next_match_id == Some(next_id) && m.id < feeder_id)
        .count();
    earlier_feeders.min(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_teams(region: Region, size: u8) -> Vec<Team> {
        (1..=size)
            .map(|seed| Team {
                short_name: format!("{region} {seed}"),
                url_name: format!("{}-{seed}", region.to_string().to_lowercase()),
                seed,
                region,
            })
            .collect()
    }

    fn all_teams() -> Vec<Team> {
        Region::ALL
            .iter()
            .flat_map(|region| region_teams(*region, 16))
            .collect()
    }

    fn decide(m: &Match, winner_seed: u8) -> Match {
        let mut decided = m.clone();
        let winner = decided
            .participants
            .iter()
            .filter_map(Slot::team)
            .find(|t| t.seed == winner_seed)
            .map(|t| t.short_name.clone());
        decided.winner = winner;
        decided
    }

    fn assert_single_rooted_tree(matches: &[Match]) {
        let ids: HashSet<u32> = matches.iter().map(|m| m.id).collect();
        let roots: Vec<&Match> = matches.iter().filter(|m| m.next_match_id.is_none()).collect();
        assert_eq!(roots.len(), 1);
        for m in matches {
            let mut steps = 0;
            let mut current = m;
            while let Some(next) = current.next_match_id {
                assert!(ids.contains(&next));
                assert!(next > current.id);
                current = matches.iter().find(|c| c.id == next).unwrap();
                steps += 1;
                assert!(steps <= matches.len());
            }
            assert_eq!(current.id, roots[0].id);
        }
        for m in matches.iter().filter(|m| m.round_name != "Round 1") {
            let feeders = matches.iter().filter(|f| f.next_match_id == Some(m.id)).count();
            assert_eq!(feeders, 2);
        }
    }

    #[test]
    fn region_has_fifteen_matches_with_standard_pairings() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        assert_eq!(bracket.len(), 15);

        let first_round: Vec<(u8, u8)> = bracket
            .iter()
            .filter(|m| m.round_name == "Round 1")
            .map(|m| {
                let a = m.participants[0].team().unwrap().seed;
                let b = m.participants[1].team().unwrap().seed;
                (a, b)
            })
            .collect();
        assert_eq!(
            first_round,
            vec![(1, 16), (2, 15), (3, 14), (4, 13), (5, 12), (6, 11), (7, 10), (8, 9)]
        );

        let sizes: Vec<usize> = group_by_round(&bracket).iter().map(|(_, r)| r.len()).collect();
        assert_eq!(sizes, vec![8, 4, 2, 1]);
        assert!(bracket.iter().skip(8).all(|m| !m.participants[0].is_determined()));
    }

    #[test]
    fn ids_strictly_increase() {
        let bracket = build_bracket(&region_teams(Region::West, 16)).unwrap();
        assert!(bracket.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut shuffled = region_teams(Region::South, 16);
        shuffled.reverse();
        shuffled.swap(3, 11);
        assert_eq!(
            build_bracket(&shuffled).unwrap(),
            build_bracket(&region_teams(Region::South, 16)).unwrap()
        );
    }

    #[test]
    fn next_match_ids_form_a_single_rooted_tree() {
        for size in [2u8, 4, 8, 16, 32] {
            let bracket = build_single_elimination(&region_teams(Region::Midwest, size)).unwrap();
            assert_eq!(bracket.len(), usize::from(size) - 1);
            assert_single_rooted_tree(&bracket);
        }
    }

    #[test]
    fn rejects_wrong_sizes_and_duplicate_seeds() {
        assert!(build_bracket(&region_teams(Region::East, 8)).is_err());
        assert!(build_single_elimination(&region_teams(Region::East, 12)[..12]).is_err());

        let mut teams = region_teams(Region::East, 16);
        teams[15].seed = 1;
        assert!(build_bracket(&teams).is_err());

        let mut teams = region_teams(Region::East, 16);
        teams[4].region = Region::West;
        assert!(build_bracket(&teams).is_err());
    }

    #[test]
    fn tournament_joins_region_winners() {
        let bracket = build_tournament(&all_teams()).unwrap();
        assert_eq!(bracket.len(), 63);
        assert_single_rooted_tree(&bracket);

        let final_four: Vec<&Match> = bracket.iter().filter(|m| m.round_name == FINAL_FOUR_LABEL).collect();
        assert_eq!(final_four.len(), 2);
        let championship = bracket.last().unwrap();
        assert_eq!(championship.round_name, CHAMPIONSHIP_LABEL);
        assert!(championship.next_match_id.is_none());
        assert!(final_four.iter().all(|m| m.next_match_id == Some(championship.id)));
    }

    #[test]
    fn tournament_needs_every_region() {
        let teams: Vec<Team> = all_teams().into_iter().filter(|t| t.region != Region::South).collect();
        assert!(build_tournament(&teams).is_err());
    }

    #[test]
    fn winners_advance_into_the_next_match() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let results = vec![decide(&bracket[0], 1), decide(&bracket[1], 15)];
        let updated = integrate_results(&bracket, &results);

        let next = updated.iter().find(|m| m.id == bracket[0].next_match_id.unwrap()).unwrap();
        assert_eq!(next.participants[0].team().unwrap().seed, 1);
        assert_eq!(next.participants[1].team().unwrap().seed, 15);
        assert_eq!(updated[0].winner.as_deref(), Some("East 1"));
    }

    #[test]
    fn integrating_twice_equals_integrating_once() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let results: Vec<Match> = bracket.iter().take(8).map(|m| decide(m, m.participants[0].team().unwrap().seed)).collect();
        let once = integrate_results(&bracket, &results);
        let twice = integrate_results(&once, &results);
        assert_eq!(once, twice);
    }

    #[test]
    fn later_rounds_may_arrive_first() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let after_first = integrate_results(&bracket, &[decide(&bracket[0], 1), decide(&bracket[1], 2)]);
        let second_round = after_first.iter().find(|m| m.id == bracket[0].next_match_id.unwrap()).unwrap();
        let results = vec![decide(second_round, 2), decide(&bracket[0], 1), decide(&bracket[1], 2)];

        let updated = integrate_results(&bracket, &results);
        let third_round_id = second_round.next_match_id.unwrap();
        let third = updated.iter().find(|m| m.id == third_round_id).unwrap();
        assert_eq!(third.participants[0].team().unwrap().seed, 2);
    }

    #[test]
    fn conflicting_result_does_not_overwrite() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let once = integrate_results(&bracket, &[decide(&bracket[0], 1)]);
        let conflicting = integrate_results(&once, &[decide(&bracket[0], 16)]);
        assert_eq!(once, conflicting);
    }

    #[test]
    fn undetermined_match_cannot_be_won() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let mut bogus = bracket[8].clone();
        bogus.winner = Some("East 1".to_string());
        assert_eq!(integrate_results(&bracket, &[bogus]), bracket);
    }

    #[test]
    fn results_are_found_by_pairing_when_ids_differ() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let mut external = decide(&bracket[3], 13);
        external.id = 9_000;
        external.participants.swap(0, 1);
        let updated = integrate_results(&bracket, &[external]);
        assert_eq!(updated[3].winner.as_deref(), Some("East 13"));
    }

    #[test]
    fn team_highlight_lists_its_matches() {
        let bracket = build_bracket(&region_teams(Region::East, 16)).unwrap();
        let updated = integrate_results(&bracket, &[decide(&bracket[0], 1)]);
        assert_eq!(matches_for_team(&updated, "East 1").len(), 2);
        assert_eq!(matches_for_team(&updated, "East 16").len(), 1);
    }

    #[test]
    fn roster_picks_region_or_tournament() {
        assert_eq!(build_from_roster(&region_teams(Region::West, 16)).unwrap().len(), 15);
        assert_eq!(build_from_roster(&all_teams()).unwrap().len(), 63);
        assert!(build_from_roster(&region_teams(Region::West, 8)).is_err());
    }
}
