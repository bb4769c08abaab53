use crate::model::{BulkItem, GameTrx, PlayerColor, Resource, TrxPayload};
use rand::RngCore;

/// One ordered pair of (payload, acting participant). The actor is an index into the run's
/// participant list rather than a handle, so scripts stay plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub payload: TrxPayload,
    pub actor: usize,
}

/// A complete scripted workload, built once per run. The label keys every metrics sample this
/// script produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub label: &'static str,
    pub steps: Vec<ScriptStep>,
}

const COLORS: [PlayerColor; 3] = [PlayerColor::Red, PlayerColor::Green, PlayerColor::Blue];
const RESOURCES: [Resource; 4] = [
    Resource::Camp,
    Resource::Hill,
    Resource::Pasture,
    Resource::Forest,
];

/// The main game workload: every participant joins, then `rounds` rounds in which each
/// participant rolls, trades with their neighbour and passes the turn. Steps must run in order;
/// later steps read ledger state written by earlier ones.
pub fn trade_game_script(participants: usize, rounds: usize) -> Script {
    let n = participants.min(COLORS.len());

    let mut steps = Vec::new();
    for (i, color) in COLORS.iter().take(n).enumerate() {
        steps.push(ScriptStep {
            payload: TrxPayload::Game(GameTrx::Join { color: *color }),
            actor: i,
        });
    }

    for round in 0..rounds {
        for i in 0..n {
            steps.push(ScriptStep {
                payload: TrxPayload::Game(GameTrx::Roll),
                actor: i,
            });
            steps.push(ScriptStep {
                payload: TrxPayload::Game(GameTrx::Trade {
                    from: COLORS[i],
                    to: COLORS[(i + 1) % n],
                    resource: RESOURCES[(round + i) % RESOURCES.len()],
                    amount: 2,
                }),
                actor: i,
            });
            steps.push(ScriptStep {
                payload: TrxPayload::Game(GameTrx::Advance),
                actor: i,
            });
        }
    }

    Script {
        label: "trade_game",
        steps,
    }
}

/// An opaque bulk-publish workload: `items` random payloads published round-robin across the
/// participants. None of these steps are alliance-relevant.
pub fn bulk_publish_script(items: usize, participants: usize) -> Script {
    let mut rng = rand::thread_rng();

    let steps = (0..items)
        .map(|i| {
            let mut item = vec![0u8; 8];
            rng.fill_bytes(&mut item);
            ScriptStep {
                payload: TrxPayload::Bulk(BulkItem {
                    author: format!("foo{i}"),
                    info: String::new(),
                    item,
                }),
                actor: i % participants.max(1),
            }
        })
        .collect();

    Script {
        label: "bulk_publish",
        steps,
    }
}
