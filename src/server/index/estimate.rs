//! Wait-time estimation per time control.
//!
//! The displayed ETA is anchored to one specific game so it counts down
//! steadily instead of jittering as new clock snapshots arrive. The
//! anchor survives restarts through the index store and is replaced only
//! when its game disappears.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::matchmaking::TIME_CONTROLS;
use crate::server::index::entry::{IndexEntry, QueueEntry};
use crate::server::room::room::Phase;
use crate::server::storage::KvStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateAnchor {
    pub game_id: String,
    pub start_time: u64,
    pub duration_ms: u64,
}

/// Either a label (`match_now`, `none`) or a millisecond countdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Estimate {
    Ms(u64),
    Status(&'static str),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateEntry {
    pub queue_length: usize,
    pub active_games: usize,
    pub estimate: Estimate,
}

fn anchor_key(time_control: u64) -> String {
    format!("estimate_anchor_{}", time_control)
}

/// A game's worst-case time to completion, from its clock snapshot. The
/// full time control stands in when no snapshot has arrived yet.
fn game_remaining(entry: &IndexEntry, time_control: u64) -> u64 {
    entry
        .clocks
        .as_ref()
        .map(|clocks| {
            clocks
                .white_remaining_ms
                .min(clocks.black_remaining_ms)
                .max(0) as u64
        })
        .unwrap_or(time_control)
}

pub fn compute(
    rooms: &HashMap<String, IndexEntry>,
    queues: &BTreeMap<u64, Vec<QueueEntry>>,
    store: &dyn KvStore,
    now: u64,
) -> BTreeMap<String, EstimateEntry> {
    let mut out = BTreeMap::new();
    for &time_control in TIME_CONTROLS.iter() {
        let active: Vec<&IndexEntry> = rooms
            .values()
            .filter(|entry| {
                entry.phase == Phase::Playing
                    && entry.main_time_ms == time_control
                    && entry.players.len() == 2
            })
            .collect();
        let queue_length = queues.get(&time_control).map_or(0, |bucket| bucket.len());

        let estimate = if queue_length >= 1 {
            Estimate::Status("match_now")
        } else if active.is_empty() {
            Estimate::Status("none")
        } else {
            let soonest = active
                .iter()
                .map(|entry| (entry.room_id.as_str(), game_remaining(entry, time_control)))
                .min_by_key(|(_, remaining)| *remaining);
            match soonest {
                Some((game_id, remaining)) => {
                    Estimate::Ms(anchored_remaining(store, time_control, game_id, remaining, &active, now))
                }
                None => Estimate::Status("none"),
            }
        };

        out.insert(
            time_control.to_string(),
            EstimateEntry {
                queue_length,
                active_games: active.len(),
                estimate,
            },
        );
    }
    out
}

/// Reads the persisted anchor; keeps it while its game is still running,
/// otherwise re-anchors to the game ending soonest.
fn anchored_remaining(
    store: &dyn KvStore,
    time_control: u64,
    game_id: &str,
    remaining: u64,
    active: &[&IndexEntry],
    now: u64,
) -> u64 {
    let key = anchor_key(time_control);
    let anchored = store
        .get(&key)
        .ok()
        .flatten()
        .and_then(|value| serde_json::from_value::<EstimateAnchor>(value).ok());
    if let Some(anchor) = anchored {
        if active.iter().any(|entry| entry.room_id == anchor.game_id) {
            return (anchor.start_time + anchor.duration_ms).saturating_sub(now);
        }
    }
    let fresh = EstimateAnchor {
        game_id: game_id.to_string(),
        start_time: now,
        duration_ms: remaining,
    };
    match serde_json::to_value(&fresh) {
        Ok(value) => {
            if let Err(err) = store.put(&key, value) {
                warn!("[Index] anchor write failed for {}: {}", time_control, err);
            }
        }
        Err(err) => warn!("[Index] anchor serialize failed: {}", err),
    }
    remaining
}
