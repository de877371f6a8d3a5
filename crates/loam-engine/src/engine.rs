//! The programmatic surface consumed by the shell collaborator:
//! scan, plan, execute, and the proposal lifecycle.

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use loam_config::LoamConfig;
use loam_core::{
    ChatService, CorpusState, EmbeddingCache, LoamError, Proposal, ProposalStatus, Result,
    SemanticService,
};

use crate::actions::{action_catalog, Action, ActionContext};
use crate::executor::{ExecuteOptions, ExecutionResult, Executor};
use crate::goals::{goal_catalog, Goal};
use crate::patch_apply;
use crate::patch_store::PatchStore;
use crate::planner::{build_plan, Plan, ServiceAvailability};
use crate::scanner::Scanner;

pub struct Engine {
    config: Arc<LoamConfig>,
    scanner: Arc<Scanner>,
    patches: Arc<PatchStore>,
    goals: Vec<Arc<dyn Goal>>,
    actions: Vec<Arc<dyn Action>>,
    semantic: Option<Arc<dyn SemanticService>>,
    chat: Option<Arc<dyn ChatService>>,
}

impl Engine {
    /// Wire up the engine with its collaborators. Gateways are optional;
    /// the planner filters actions whose service is absent or down.
    pub fn new(
        config: LoamConfig,
        semantic: Option<Arc<dyn SemanticService>>,
        chat: Option<Arc<dyn ChatService>>,
        cache: Arc<dyn EmbeddingCache>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let scanner = Arc::new(Scanner::new(Arc::clone(&config)));
        let patches = Arc::new(PatchStore::open(&config.internal_root())?);
        let ctx = ActionContext {
            config: Arc::clone(&config),
            scanner: Arc::clone(&scanner),
            patches: Arc::clone(&patches),
            semantic: semantic.clone(),
            chat: chat.clone(),
            cache,
        };
        Ok(Self {
            goals: goal_catalog(&config),
            actions: action_catalog(&ctx),
            config,
            scanner,
            patches,
            semantic,
            chat,
        })
    }

    pub fn config(&self) -> &LoamConfig {
        &self.config
    }

    /// Take a fresh snapshot of the corpus.
    pub async fn scan(&self) -> Result<CorpusState> {
        let mut state = self.scanner.scan().await?;
        state.pending_proposals = self.patches.count_pending()?;
        Ok(state)
    }

    /// Plan against a snapshot. Service reachability is probed once here.
    pub async fn plan(&self, state: &CorpusState) -> Plan {
        let availability = ServiceAvailability {
            semantic: match &self.semantic {
                Some(service) => service.is_available().await,
                None => false,
            },
            chat: match &self.chat {
                Some(service) => service.is_available().await,
                None => false,
            },
        };
        debug!(
            "service availability: semantic={}, chat={}",
            availability.semantic, availability.chat
        );
        build_plan(&self.goals, &self.actions, state, &self.config, availability)
    }

    /// Execute a plan from the given snapshot.
    pub async fn execute(
        &self,
        plan: &Plan,
        state: CorpusState,
        options: ExecuteOptions,
    ) -> ExecutionResult {
        let executor = Executor::new(
            Arc::clone(&self.config),
            self.actions.clone(),
            self.semantic.clone(),
        );
        let result = executor.run(plan, state, options).await;
        info!("execution finished: {}", result.summary());
        result
    }

    /// One full tending cycle: scan, plan, execute.
    pub async fn cycle(&self, options: ExecuteOptions) -> Result<(Plan, ExecutionResult)> {
        let state = self.scan().await?;
        let plan = self.plan(&state).await;
        let result = self.execute(&plan, state, options).await;
        Ok((plan, result))
    }

    pub fn list_proposals(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>> {
        self.patches.list(status)
    }

    pub fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        self.patches.get(id)
    }

    /// Apply a proposal's stored diff to the current file content and
    /// record the `Applied` transition. Fails with `StaleProposal` when
    /// the diff no longer applies; the proposal then stays Pending.
    pub fn mark_applied(&self, id: &str) -> Result<Proposal> {
        let proposal = self.get_proposal(id)?.ok_or_else(|| LoamError::PreconditionFailed {
            action: "mark_applied".to_string(),
            predicate: format!("proposal {id} exists"),
        })?;
        if !matches!(
            proposal.status,
            ProposalStatus::Pending | ProposalStatus::Approved
        ) {
            return Err(LoamError::PreconditionFailed {
                action: "mark_applied".to_string(),
                predicate: "proposal is pending or approved".to_string(),
            });
        }

        let current = if proposal.path.exists() {
            std::fs::read_to_string(&proposal.path)
                .map_err(|e| LoamError::io(&proposal.path, e))?
        } else {
            String::new()
        };

        let revised = patch_apply::apply(&current, &proposal.patch).map_err(|detail| {
            debug!("proposal {id} is stale: {detail}");
            LoamError::StaleProposal { id: id.to_string() }
        })?;

        if proposal.path.exists() {
            self.patches.backup(&proposal.path)?;
        }
        write_raw(&proposal.path, &revised)?;
        self.patches.update_status(id, ProposalStatus::Applied)
    }

    /// Record a rejection; note files are untouched.
    pub fn mark_rejected(&self, id: &str) -> Result<Proposal> {
        let proposal = self.get_proposal(id)?.ok_or_else(|| LoamError::PreconditionFailed {
            action: "mark_rejected".to_string(),
            predicate: format!("proposal {id} exists"),
        })?;
        if proposal.status != ProposalStatus::Pending {
            return Err(LoamError::PreconditionFailed {
                action: "mark_rejected".to_string(),
                predicate: "proposal is pending".to_string(),
            });
        }
        self.patches.update_status(id, ProposalStatus::Rejected)
    }
}

/// Temp-file-and-rename write for raw content.
fn write_raw(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| LoamError::io(parent, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| LoamError::io(path, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| LoamError::io(path, e))?;
    tmp.persist(path).map_err(|e| LoamError::io(path, e.error))?;
    Ok(())
}
