//! Sealed-bid resolution and the color-pick rotation.
//!
//! Both players secretly offer to give up clock time; the lower offer
//! wins the right to choose a side and plays on a clock equal to its bid.
//! Equal offers void the round and bidding restarts.

use crate::config;
use crate::server::room::room::{Bid, Phase, PickerRole, Room};

/// Deterministic ordering: amount, then submission time, then player id.
pub fn bid_order<'a>(bids: &'a std::collections::HashMap<String, Bid>) -> Vec<(&'a str, &'a Bid)> {
    let mut ordered: Vec<(&str, &Bid)> = bids.iter().map(|(id, bid)| (id.as_str(), bid)).collect();
    ordered.sort_by(|a, b| {
        a.1.amount
            .cmp(&b.1.amount)
            .then(a.1.submitted_at.cmp(&b.1.submitted_at))
            .then(a.0.cmp(b.0))
    });
    ordered
}

/// Attempts to settle the bidding round. Returns true when the room
/// changed (either a tie restart or the move to COLOR_PICK).
///
/// Once the deadline passes, a missing bid counts as the full main time,
/// i.e. no willingness to give anything up.
pub fn try_resolve(room: &mut Room, now: u64) -> bool {
    if room.phase != Phase::Bidding {
        return false;
    }
    let deadline = match room.bid_deadline {
        Some(deadline) => deadline,
        None => return false,
    };
    let (p1, p2) = match (room.players.first(), room.players.get(1)) {
        (Some(a), Some(b)) => (a.id.clone(), b.id.clone()),
        _ => return false,
    };
    let deadline_passed = now > deadline;
    if (!room.bids.contains_key(&p1) || !room.bids.contains_key(&p2)) && !deadline_passed {
        return false;
    }
    for player_id in [&p1, &p2] {
        room.bids.entry(player_id.clone()).or_insert(Bid {
            amount: room.main_time_ms,
            submitted_at: now,
        });
    }

    let ordered = bid_order(&room.bids);
    let (low, high) = (ordered[0], ordered[1]);
    if low.1.amount == high.1.amount {
        room.bids.clear();
        room.bid_deadline = Some(now + room.bid_duration_ms);
        room.updated_at = now;
        return true;
    }

    room.winner_id = Some(low.0.to_string());
    room.loser_id = Some(high.0.to_string());
    room.winning_bid_ms = Some(low.1.amount);
    room.losing_bid_ms = Some(high.1.amount);
    room.phase = Phase::ColorPick;
    room.current_picker = Some(PickerRole::Winner);
    room.choice_attempts = 0;
    room.choice_deadline = Some(now + room.choice_duration_ms);
    room.bid_deadline = None;
    room.updated_at = now;
    true
}

/// Rotates the picker when a choice deadline is missed. After the
/// configured number of missed attempts the game is abandoned as a draw.
pub fn advance_color_pick(room: &mut Room, now: u64) -> bool {
    let mut changed = false;
    while room.phase == Phase::ColorPick {
        let deadline = match room.choice_deadline {
            Some(deadline) if now > deadline => deadline,
            _ => break,
        };
        room.choice_attempts += 1;
        if room.choice_attempts >= config::room::MAX_CHOICE_ATTEMPTS {
            room.finish(
                None,
                "draw",
                Some("color_pick_timeout"),
                config::room::REMATCH_WINDOW_MS,
                now,
            );
        } else {
            room.current_picker = Some(match room.current_picker {
                Some(PickerRole::Winner) => PickerRole::Loser,
                _ => PickerRole::Winner,
            });
            room.choice_deadline = Some(deadline + room.choice_duration_ms);
        }
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::room::room::RoomInit;

    fn bidding_room(now: u64) -> Room {
        let mut room = Room::new("r1", RoomInit::default(), now);
        room.join("p1", "Alice", now).expect("p1 joins");
        room.join("p2", "Bob", now).expect("p2 joins");
        room.start_bidding("p1", now).expect("stage");
        room.start_bidding("p2", now).expect("confirm");
        room
    }

    #[test]
    fn lower_bid_wins_and_picks_first() {
        let mut room = bidding_room(1_000);
        room.submit_bid("p1", 30_000, 1_100).expect("bid p1");
        room.submit_bid("p2", 45_000, 1_200).expect("bid p2");
        assert_eq!(room.phase, Phase::ColorPick);
        assert_eq!(room.winner_id.as_deref(), Some("p1"));
        assert_eq!(room.loser_id.as_deref(), Some("p2"));
        assert_eq!(room.winning_bid_ms, Some(30_000));
        assert_eq!(room.losing_bid_ms, Some(45_000));
        assert_eq!(room.current_picker, Some(PickerRole::Winner));
        assert_eq!(room.choice_deadline, Some(1_200 + room.choice_duration_ms));
        assert_eq!(room.choice_attempts, 0);
    }

    #[test]
    fn equal_bids_void_the_round() {
        let mut room = bidding_room(1_000);
        room.submit_bid("p1", 50_000, 1_100).expect("bid p1");
        room.submit_bid("p2", 50_000, 1_200).expect("bid p2");
        assert_eq!(room.phase, Phase::Bidding);
        assert!(room.bids.is_empty());
        assert_eq!(room.bid_deadline, Some(1_200 + room.bid_duration_ms));
    }

    #[test]
    fn deadline_fills_missing_bids_with_main_time() {
        let mut room = bidding_room(1_000);
        room.submit_bid("p1", 20_000, 1_100).expect("bid p1");
        let late = room.bid_deadline.expect("deadline") + 1;
        assert!(try_resolve(&mut room, late));
        assert_eq!(room.phase, Phase::ColorPick);
        assert_eq!(room.winner_id.as_deref(), Some("p1"));
        assert_eq!(room.losing_bid_ms, Some(room.main_time_ms));
    }

    #[test]
    fn no_bids_at_deadline_restarts_the_round() {
        let mut room = bidding_room(1_000);
        let late = room.bid_deadline.expect("deadline") + 1;
        // Both defaults are equal, which voids the round.
        assert!(try_resolve(&mut room, late));
        assert_eq!(room.phase, Phase::Bidding);
        assert!(room.bids.is_empty());
        assert_eq!(room.bid_deadline, Some(late + room.bid_duration_ms));
    }

    #[test]
    fn early_resolution_waits_for_both_bids() {
        let mut room = bidding_room(1_000);
        room.submit_bid("p1", 20_000, 1_100).expect("bid p1");
        assert_eq!(room.phase, Phase::Bidding);
        assert!(!try_resolve(&mut room, 1_200));
    }

    #[test]
    fn bid_order_breaks_ties_by_time_then_id() {
        let mut bids = std::collections::HashMap::new();
        bids.insert("pz".to_string(), Bid { amount: 10, submitted_at: 5 });
        bids.insert("pa".to_string(), Bid { amount: 10, submitted_at: 9 });
        bids.insert("pm".to_string(), Bid { amount: 10, submitted_at: 5 });
        let ordered: Vec<&str> = bid_order(&bids).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ordered, vec!["pm", "pz", "pa"]);
    }

    #[test]
    fn missed_choice_rotates_the_picker() {
        let mut room = bidding_room(1_000);
        room.submit_bid("p1", 30_000, 1_100).expect("bid p1");
        room.submit_bid("p2", 45_000, 1_200).expect("bid p2");
        let first_deadline = room.choice_deadline.expect("deadline");
        assert!(advance_color_pick(&mut room, first_deadline + 1));
        assert_eq!(room.choice_attempts, 1);
        assert_eq!(room.current_picker, Some(PickerRole::Loser));
        assert_eq!(
            room.choice_deadline,
            Some(first_deadline + room.choice_duration_ms)
        );
    }

    #[test]
    fn fourth_missed_choice_abandons_as_draw() {
        let mut room = bidding_room(1_000);
        room.submit_bid("p1", 30_000, 1_100).expect("bid p1");
        room.submit_bid("p2", 45_000, 1_200).expect("bid p2");
        let way_past = room.choice_deadline.expect("deadline")
            + 4 * room.choice_duration_ms
            + 1;
        assert!(advance_color_pick(&mut room, way_past));
        assert_eq!(room.phase, Phase::Finished);
        assert!(room.winner_id.is_none());
        assert_eq!(room.result.as_deref(), Some("draw"));
        assert_eq!(room.result_reason.as_deref(), Some("color_pick_timeout"));
    }
}
