//! Goal-oriented planning via depth-bounded backward chaining.
//!
//! Unsatisfied goals are resolved highest priority first. For each
//! required effect the planner picks the cheapest producing action whose
//! preconditions hold against the state plus the effects accumulated so
//! far, recursing into unmet-but-plannable preconditions. Chains are
//! cycle-checked on the effect being sought and capped at the
//! configured depth; exhaustion downgrades to an unplanned-goal entry.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use loam_config::LoamConfig;
use loam_core::{CorpusState, ServiceKind};

use crate::actions::{preconditions_hold, Action, Safety};
use crate::effects::EffectTag;
use crate::goals::{Goal, GoalStatus};

/// One planned action with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub action: String,
    pub cost: f64,
    pub safety: Safety,
    pub rationale: String,
}

/// A goal the planner could not serve this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct UnplannedGoal {
    pub goal: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub unplanned: Vec<UnplannedGoal>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Reachability probe results, taken once per planning cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAvailability {
    pub semantic: bool,
    pub chat: bool,
}

impl ServiceAvailability {
    /// With no external services configured, nothing is reachable.
    pub fn allows(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Semantic => self.semantic,
            ServiceKind::Chat => self.chat,
        }
    }
}

struct Chain<'a> {
    state: &'a CorpusState,
    config: &'a LoamConfig,
    pool: &'a [Arc<dyn Action>],
    accumulated: BTreeSet<EffectTag>,
    steps: Vec<Arc<dyn Action>>,
    depth_exhausted: bool,
}

impl<'a> Chain<'a> {
    fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|a| a.name() == name)
    }

    /// Append actions until `effect` is produced. Returns false when no
    /// viable chain exists; the partial plan is left unchanged then.
    fn plan_effect(
        &mut self,
        effect: EffectTag,
        depth: usize,
        seeking: &mut Vec<EffectTag>,
    ) -> bool {
        if self.accumulated.contains(&effect) {
            return true;
        }
        if depth == 0 {
            self.depth_exhausted = true;
            return false;
        }

        let mut candidates: Vec<&Arc<dyn Action>> = self
            .pool
            .iter()
            .filter(|a| a.effects().contains(&effect))
            .collect();
        // Ground candidates (preconditions already satisfied) outrank
        // ones that need sub-planning; cost breaks ties.
        candidates.sort_by(|a, b| {
            let a_ready = preconditions_hold(a.as_ref(), self.state, &self.accumulated, self.config);
            let b_ready = preconditions_hold(b.as_ref(), self.state, &self.accumulated, self.config);
            b_ready
                .cmp(&a_ready)
                .then_with(|| {
                    a.cost(self.state)
                        .partial_cmp(&b.cost(self.state))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.name().cmp(b.name()))
        });

        for candidate in candidates {
            let steps_before = self.steps.len();
            let accumulated_before = self.accumulated.clone();
            if self.try_action(candidate, depth, seeking) {
                return true;
            }
            self.steps.truncate(steps_before);
            self.accumulated = accumulated_before;
        }
        false
    }

    /// Plan one action, sub-planning its unmet preconditions first.
    fn try_action(
        &mut self,
        action: &Arc<dyn Action>,
        depth: usize,
        seeking: &mut Vec<EffectTag>,
    ) -> bool {
        if self.contains(action.name()) {
            // Already planned; its effects are in `accumulated`.
            return true;
        }
        for precondition in action.preconditions() {
            if precondition.holds(self.state, &self.accumulated, self.config) {
                continue;
            }
            let Some(effect) = precondition.satisfiable_by() else {
                debug!(
                    "candidate {} dropped: {} and no action can change that",
                    action.name(),
                    precondition.describe()
                );
                return false;
            };
            if seeking.contains(&effect) {
                debug!("cycle on {:?} while planning {}", effect, action.name());
                return false;
            }
            seeking.push(effect);
            let satisfied = self.plan_effect(effect, depth - 1, seeking);
            seeking.pop();
            if !satisfied {
                return false;
            }
        }
        self.steps.push(Arc::clone(action));
        self.accumulated.extend(action.effects().iter().copied());
        true
    }
}

/// Resolve unsatisfied goals into an ordered plan.
pub fn build_plan(
    goals: &[Arc<dyn Goal>],
    actions: &[Arc<dyn Action>],
    state: &CorpusState,
    config: &LoamConfig,
    availability: ServiceAvailability,
) -> Plan {
    let mut plan = Plan::default();

    // Filter the candidate pool once: zero-cost actions would loop
    // forever, and actions needing an unreachable service cannot run.
    let pool: Vec<Arc<dyn Action>> = actions
        .iter()
        .filter(|action| {
            if action.cost(state) <= 0.0 {
                warn!("action {} has non-positive cost, ignoring", action.name());
                return false;
            }
            if let Some(kind) = action.required_service() {
                if !availability.allows(kind) {
                    warn!(
                        "action {} needs the unreachable {} service, ignoring",
                        action.name(),
                        kind.name()
                    );
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();

    let mut unsatisfied: Vec<&Arc<dyn Goal>> = Vec::new();
    for goal in goals {
        match goal.evaluate(state, config) {
            GoalStatus::Unsatisfied => unsatisfied.push(goal),
            GoalStatus::Blocked => {
                debug!("goal {} is blocked this cycle", goal.name());
                plan.unplanned.push(UnplannedGoal {
                    goal: goal.name().to_string(),
                    reason: "blocked by a prerequisite goal".to_string(),
                });
            }
            GoalStatus::Satisfied | GoalStatus::NotApplicable => {}
        }
    }
    unsatisfied.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.name().cmp(b.name()))
    });

    let mut chain = Chain {
        state,
        config,
        pool: &pool,
        accumulated: BTreeSet::new(),
        steps: Vec::new(),
        depth_exhausted: false,
    };
    let mut rationales: Vec<String> = Vec::new();

    for goal in unsatisfied {
        let before = chain.steps.len();
        chain.depth_exhausted = false;
        let mut produced_any = false;
        for effect in goal.required_effects() {
            if chain.accumulated.contains(effect) {
                produced_any = true;
                continue;
            }
            let mut seeking = vec![*effect];
            if chain.plan_effect(*effect, config.max_chain_depth, &mut seeking) {
                produced_any = true;
            }
        }
        for _ in before..chain.steps.len() {
            rationales.push(format!("required by goal {}", goal.name()));
        }
        if !produced_any {
            let reason = if chain.depth_exhausted {
                format!("no plan within depth {}", config.max_chain_depth)
            } else {
                "no viable action produces the required effects".to_string()
            };
            debug!("goal {} unplanned: {reason}", goal.name());
            plan.unplanned.push(UnplannedGoal {
                goal: goal.name().to_string(),
                reason,
            });
        }
    }

    // Stable partition: Safe actions first, preserving chain order
    // within each group. Safe actions often establish the very
    // preconditions the proposal actions rely on.
    let mut ordered: Vec<(Arc<dyn Action>, String)> = Vec::new();
    for safety in [Safety::Safe, Safety::Proposal] {
        for (action, rationale) in chain.steps.iter().zip(&rationales) {
            if action.safety() == safety {
                ordered.push((Arc::clone(action), rationale.clone()));
            }
        }
    }

    plan.steps = ordered
        .into_iter()
        .map(|(action, rationale)| PlanStep {
            action: action.name().to_string(),
            cost: action.cost(state),
            safety: action.safety(),
            rationale,
        })
        .collect();
    plan
}
