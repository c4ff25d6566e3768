pub mod classifier;
pub mod config;
pub mod enforcement;
pub mod engine;
pub mod ledger;
pub mod policy;
pub mod scorer;
pub mod stats;
pub mod store;
pub mod transport;

pub use classifier::{ClassifierGateway, ScoringUnavailable, SpamScorer};
pub use config::Config;
pub use engine::{
    AutomatedVerdict, EngineError, ModerationEngine, ReportOutcome, ReportRequest, ResetPolicy,
    ViolationState,
};
pub use enforcement::EnforcementDispatcher;
pub use ledger::ViolationLedger;
pub use policy::{ChatPolicy, PolicyStore, Punishment};
pub use scorer::HeuristicScorer;
pub use store::Store;
pub use transport::{Authorizer, ChatTransport, MessageEvent};
