//! Command implementations: human-readable views over engine results.

use anyhow::{bail, Result};
use colored::Colorize;

use loam_core::ProposalStatus;
use loam_engine::{Engine, ExecuteOptions, Safety};

use crate::cli::ProposalsCommand;

pub async fn scan(engine: &Engine) -> Result<()> {
    let state = engine.scan().await?;
    println!("{}", "Garden health".bold());
    println!("  notes:             {}", state.total_notes);
    println!(
        "  mean health:       {:.1} (target {})",
        state.mean_health_score,
        engine.config().target_health
    );
    println!(
        "  embeddings:        {} present, {} stale",
        state.notes_with_embeddings, state.notes_with_stale_embeddings
    );
    println!("  format issues:     {}", state.notes_with_format_issues);
    println!(
        "  orphans:           {} ({:.0}%)",
        state.orphan_notes,
        state.orphan_percentage()
    );
    println!("  stale notes:       {}", state.stale_notes);
    println!("  pending proposals: {}", state.pending_proposals);
    if !state.warnings.is_empty() {
        println!("{}", format!("  {} files skipped:", state.warnings.len()).yellow());
        for warning in &state.warnings {
            println!("    {warning}");
        }
    }
    Ok(())
}

pub async fn plan(engine: &Engine) -> Result<()> {
    let state = engine.scan().await?;
    let plan = engine.plan(&state).await;
    if plan.is_empty() {
        println!("{}", "Nothing to do; the garden is healthy.".green());
    } else {
        println!("{}", "Tending plan".bold());
        for (index, step) in plan.steps.iter().enumerate() {
            let badge = match step.safety {
                Safety::Safe => "safe".green(),
                Safety::Proposal => "proposal".yellow(),
            };
            println!(
                "  {}. {} [{}] cost {:.0} ({})",
                index + 1,
                step.action,
                badge,
                step.cost,
                step.rationale
            );
        }
    }
    for unplanned in &plan.unplanned {
        println!(
            "  {} {}: {}",
            "unplanned".red(),
            unplanned.goal,
            unplanned.reason
        );
    }
    Ok(())
}

pub async fn tend(engine: &Engine, safe_only: bool) -> Result<()> {
    let (plan, result) = engine.cycle(ExecuteOptions { safe_only }).await?;
    if plan.is_empty() {
        println!("{}", "Nothing to do; the garden is healthy.".green());
        return Ok(());
    }
    for record in &result.records {
        let status = if record.success {
            "ok".green()
        } else if record.skipped {
            "skipped".yellow()
        } else {
            "failed".red()
        };
        println!("  {} {}: {}", status, record.action, record.message);
    }
    println!("{}", result.summary().bold());
    println!(
        "  mean health now {:.1}, {} proposals pending review",
        result.state.mean_health_score, result.state.pending_proposals
    );
    Ok(())
}

pub fn proposals(engine: &Engine, command: ProposalsCommand) -> Result<()> {
    match command {
        ProposalsCommand::List { all } => {
            let status = if all { None } else { Some(ProposalStatus::Pending) };
            let proposals = engine.list_proposals(status)?;
            if proposals.is_empty() {
                println!("No proposals.");
                return Ok(());
            }
            for proposal in proposals {
                println!(
                    "  {} {} {} ({:?})",
                    proposal.id.dimmed(),
                    proposal.action_name.bold(),
                    proposal.note_id,
                    proposal.status
                );
            }
        }
        ProposalsCommand::Show { id } => {
            let Some(proposal) = engine.get_proposal(&id)? else {
                bail!("no proposal with id {id}");
            };
            println!("{} {}", proposal.action_name.bold(), proposal.note_id);
            println!("  status:    {:?}", proposal.status);
            println!("  file:      {}", proposal.path.display());
            println!("  proposed:  {}", proposal.proposed_at.to_rfc3339());
            println!("  rationale: {}", proposal.rationale);
            println!();
            print!("{}", proposal.patch);
        }
        ProposalsCommand::Apply { id } => {
            let proposal = engine.mark_applied(&id)?;
            println!(
                "{} applied {} to {}",
                "ok".green(),
                proposal.id,
                proposal.path.display()
            );
        }
        ProposalsCommand::Reject { id } => {
            let proposal = engine.mark_rejected(&id)?;
            println!("{} rejected {}", "ok".green(), proposal.id);
        }
    }
    Ok(())
}
