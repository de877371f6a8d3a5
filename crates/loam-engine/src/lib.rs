//! The Loam planning and execution engine.
//!
//! One tending cycle is scan, plan, execute: the scanner derives an
//! immutable [`loam_core::CorpusState`] from the files on disk, the
//! planner backward-chains goals into an ordered plan of actions, and
//! the executor runs them. Safe actions rewrite files (with backups);
//! proposal actions emit reviewable diffs through the patch store.

pub mod actions;
pub mod effects;
pub mod engine;
pub mod executor;
pub mod goals;
pub mod patch_apply;
pub mod patch_store;
pub mod planner;
pub mod scanner;

pub use actions::{action_catalog, Action, ActionContext, ActionOutcome, Safety};
pub use effects::{EffectTag, Precondition};
pub use engine::Engine;
pub use executor::{
    ActionRecord, ExecuteOptions, ExecutionResult, Executor, SKIP_PRECONDITIONS,
};
pub use goals::{goal_catalog, Goal, GoalStatus};
pub use patch_store::PatchStore;
pub use planner::{build_plan, Plan, PlanStep, ServiceAvailability, UnplannedGoal};
pub use scanner::Scanner;
