mod alliance;
mod cli;
mod executor;
mod init;
mod ledger;
mod model;
mod orchestrator;
mod pool;
mod script;
mod types;

pub mod prelude {
    pub use crate::alliance::{AllianceManager, GameObserver};
    pub use crate::cli::SquallCli;
    pub use crate::executor::{AllianceConfig, RunConfig, RunExecutor, StepFailurePolicy};
    pub use crate::init::init;
    pub use crate::ledger::LedgerClient;
    pub use crate::model::{
        collection_id, AllianceAck, AllianceInit, AllianceState, AllianceTrx, BulkItem, GamePhase,
        GameTrx, Participant, ParticipantGroup, PlayerColor, Resource, TrxCompleted, TrxPayload,
    };
    pub use crate::orchestrator::{Orchestrator, RunOutcome};
    pub use crate::pool::ParticipantPool;
    pub use crate::script::{bulk_publish_script, trade_game_script, Script, ScriptStep};
    pub use crate::types::SquallResult;
}
