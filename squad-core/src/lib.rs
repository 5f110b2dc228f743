pub mod analysis;
pub mod archive;
pub mod config;
pub mod error;
pub mod plan;
pub mod predict;
pub mod ratings;
pub mod squad;
pub mod store;

pub use analysis::{
    find_duplicate, player_frequency, PlayerFrequency, SimilarityGraph, SquadEdge, SquadNode,
};
pub use archive::{ArchiveError, ArchiveOutcome, ArchiveResult, SquadArchive};
pub use config::{
    load_squad_config, EnumerationSection, PathsSection, PredictSection, RatingsSection,
    RulesSection, SearchSection, SquadConfig,
};
pub use error::{ConfigError, Result};
pub use plan::{
    audit_plan, verify_plan, GenerationStats, HorizonPlan, HorizonPlanner, HorizonRequest,
    PeriodSquad, PlanAuditFinding, PlanAuditKind, PlanDocument, SearchConfig, SearchOutcome,
    SequenceSearch,
};
pub use predict::{apply_matchups, predict_pool, top_clubs, Matchup, PredictedPool};
pub use ratings::{rate_players, PlayerRating};
pub use squad::{
    IlpSolver, Objective, ObjectiveKey, PositionBounds, RuleViolation, Squad, SquadEnumerator,
    SquadError, SquadOptimizer, SquadResult, SquadRules, SquadSolver, TransferLimit, Transfers,
};
pub use store::{
    ImportSummary, InMemoryPlayerStore, Player, PlayerImport, PlayerStore, PlayerTotals,
    Position, SqlitePlayerStore, SqlitePlayerStoreBuilder, StoreCounts, StoreError, StoreResult,
    Team,
};
