use crate::alliance::GameObserver;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An actor identity able to submit transactions within one run.
///
/// Participants are created by the ledger client during bootstrap and dropped when the run ends.
/// The observer registry is the hand-off point between the main script and any alliances the
/// participant is part of: completed game steps are forwarded to every live observer registered
/// here.
pub struct Participant {
    label: String,
    endorser: String,
    observers: Mutex<Vec<Arc<GameObserver>>>,
}

impl Participant {
    pub fn new(label: impl Into<String>, endorser: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            endorser: endorser.into(),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn endorser(&self) -> &str {
        &self.endorser
    }

    pub fn register_observer(&self, observer: Arc<GameObserver>) {
        self.observers.lock().push(observer);
    }

    /// Every observer ever registered on this participant, terminated ones included.
    pub fn observers(&self) -> Vec<Arc<GameObserver>> {
        self.observers.lock().clone()
    }

    /// Forward a completed step to every observer registered on this participant that has not
    /// terminated yet.
    pub fn notify_observers(&self, event: &TrxCompleted) {
        for observer in self.observers.lock().iter() {
            if observer.is_terminated() {
                continue;
            }
            observer.notify(event.clone());
        }
    }

    /// Ask any still-running observers to stop. Cooperative: an observer mid-submission finishes
    /// its current transaction before it sees the signal.
    pub fn shutdown_observers(&self) {
        for observer in self.observers.lock().iter() {
            if !observer.is_terminated() {
                observer.shutdown();
            }
        }
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("label", &self.label)
            .field("endorser", &self.endorser)
            .finish()
    }
}

/// An immutable, ordered set of participant labels that together can run one script. A finite
/// catalog of groups exists for the lifetime of a session and each group is held by at most one
/// in-flight run at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantGroup {
    labels: Vec<String>,
}

impl ParticipantGroup {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Camp,
    Forest,
    Hill,
    Pasture,
}

/// One game transaction. These are the alliance-relevant payloads: their completions are
/// forwarded to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameTrx {
    Join {
        color: PlayerColor,
    },
    Roll,
    Trade {
        from: PlayerColor,
        to: PlayerColor,
        resource: Resource,
        amount: i32,
    },
    Advance,
}

/// One item of the opaque bulk-publish workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItem {
    pub author: String,
    pub info: String,
    pub item: Vec<u8>,
}

/// A script step payload. A tagged variant rather than opaque bytes, so deciding whether a step
/// is alliance-relevant is an explicit match instead of a runtime type assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrxPayload {
    Game(GameTrx),
    Bulk(BulkItem),
}

impl TrxPayload {
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    /// The completion notification for this payload, if observers care about it. Bulk payloads
    /// are not part of any game and produce no event.
    pub fn completion_event(&self) -> Option<TrxCompleted> {
        match self {
            TrxPayload::Game(trx) => Some(TrxCompleted {
                completed: trx.clone(),
                observer_id: 0,
            }),
            TrxPayload::Bulk(_) => None,
        }
    }
}

/// The phase of the game an alliance activates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Join,
    Roll,
    Trade,
    Develop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllianceState {
    Created,
    Active,
    Completed,
}

/// The INIT payload for a new alliance: how long it lives, the transactions it is obligated to
/// execute, and the id its side channel is addressed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllianceInit {
    pub lifespan: u32,
    pub start_phase: GamePhase,
    pub terms: Vec<GameTrx>,
    pub contract_id: u32,
}

/// A main-script completion forwarded to an alliance observer. The observer stamps its own id on
/// the event before submitting it on the alliance channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrxCompleted {
    pub completed: GameTrx,
    pub observer_id: u32,
}

/// A transaction on an alliance's own side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AllianceTrx {
    Init {
        init: AllianceInit,
        collection_id: String,
        allies: Vec<String>,
    },
    Invoke {
        completed: TrxCompleted,
        collection_id: String,
        allies: Vec<String>,
    },
}

/// Response returned by the alliance contract for INIT and INVOKE submissions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllianceAck {
    pub state: AllianceState,
}

/// The id of the private collection shared by exactly two allies.
pub fn collection_id(a: &str, b: &str) -> String {
    format!("al{}{}", a.to_lowercase(), b.to_lowercase())
}
