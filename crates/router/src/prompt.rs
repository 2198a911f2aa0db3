// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt text for each agent kind the router spawns.
//!
//! `AgentSpawnRequest::prompt` is written to `PROMPT.md` verbatim by the ALM
//! (spec §4.3 step 5); building that text from a Task and the event that
//! triggered the spawn is the router's job, since it's the one holding both.

use wfe_core::event::{AuditRequested, BugReport, DeployCompleted, DeployRequested, ExecutionPlan, Finding, PrChangesRequested};
use wfe_core::Task;

pub fn triage(task: &Task) -> String {
    format!(
        "You are triaging a new task.\n\n\
         ## {title}\n\n\
         {description}\n\n\
         Investigate the repository, decide whether this needs code changes, and \
         produce an execution plan (summary, affected files, steps, testing strategy).",
        title = task.title,
        description = task.description,
    )
}

pub fn coding_from_plan(task: &Task, plan: &ExecutionPlan) -> String {
    let files = if plan.affected_files.is_empty() {
        "(none listed)".to_string()
    } else {
        plan.affected_files
            .iter()
            .map(|f| format!("- {} ({:?}): {}", f.path, f.action, f.description))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let steps = plan.steps.iter().enumerate().map(|(i, s)| format!("{}. {s}", i + 1)).collect::<Vec<_>>().join("\n");

    format!(
        "Implement the following plan for **{title}**.\n\n\
         ## Summary\n{summary}\n\n\
         ## Affected files\n{files}\n\n\
         ## Steps\n{steps}\n\n\
         ## Testing strategy\n{testing}\n",
        title = task.title,
        summary = plan.summary,
        testing = plan.testing_strategy,
    )
}

pub fn coding_fixup(task: &Task, changes: &PrChangesRequested) -> String {
    format!(
        "Address review feedback on the open pull request for **{title}**.\n\n\
         ## Review feedback\n{feedback}\n\n\
         Continue work on branch `{branch}` rather than creating a new one.",
        title = task.title,
        feedback = changes.review_comments,
    )
}

pub fn reviewer(task: &Task, repo: &str, pr_number: u64, pr_url: &str) -> String {
    format!(
        "Review pull request #{pr_number} for **{title}** in `{repo}`.\n\n\
         PR: {pr_url}\n\n\
         Check the diff against the task description below and leave review comments.\n\n\
         ## Task\n{description}",
        title = task.title,
        description = task.description,
    )
}

pub fn deployer_requested(task: &Task, req: &DeployRequested) -> String {
    let commit = req.commit.as_deref().unwrap_or("(head of default branch)");
    format!(
        "Deploy **{title}** in `{repo}`.\n\nReason: {reason}\nCommit: {commit}",
        title = task.title,
        repo = req.repo,
        reason = req.reason,
    )
}

pub fn deployer_merged(task: &Task, repo: &str, merge_commit: &str) -> String {
    format!("Deploy **{title}** in `{repo}` following the merge of commit {merge_commit}.", title = task.title)
}

pub fn verifier(task: &Task, deployed: &DeployCompleted) -> String {
    format!(
        "Verify the deployment of **{title}** in `{repo}` at {url}.\n\nDeploy status: {status}",
        title = task.title,
        repo = deployed.repo,
        url = deployed.url,
        status = deployed.status,
    )
}

pub fn auditor(task: &Task, req: &AuditRequested) -> String {
    let focus = req
        .focus_areas
        .as_ref()
        .filter(|areas| !areas.is_empty())
        .map(|areas| areas.join(", "))
        .unwrap_or_else(|| "(no specific focus areas; audit broadly)".to_string());
    format!(
        "Audit **{title}** in `{repo}` at {url}.\n\nFocus areas: {focus}",
        title = task.title,
        repo = req.repo,
        url = req.url,
    )
}

/// Structured reproduction text for a `verify.failed` bug Task's description.
pub fn bug_from_verify_failure(repo: &str, bug: &BugReport) -> String {
    format!(
        "Verification failed in `{repo}`.\n\n\
         ## Description\n{description}\n\n\
         ## Steps to reproduce\n{steps}\n\n\
         ## Expected\n{expected}\n\n\
         ## Actual\n{actual}",
        description = bug.description,
        steps = bug.steps,
        expected = bug.expected,
        actual = bug.actual,
    )
}

/// Structured description for a bug Task opened from an audit finding.
pub fn bug_from_audit_finding(repo: &str, finding: &Finding) -> String {
    let mut body = format!(
        "Audit finding in `{repo}`.\n\n\
         Severity: {severity:?}\nCategory: {category:?}\n\n\
         ## {title}\n{description}",
        severity = finding.severity,
        category = finding.category,
        title = finding.title,
        description = finding.description,
    );
    if let Some(steps) = &finding.steps {
        body.push_str(&format!("\n\n## Steps to reproduce\n{steps}"));
    }
    body
}
