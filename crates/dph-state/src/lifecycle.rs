//! # Lifecycle Transitions
//!
//! ## Guard Table
//!
//! | Trigger     | From      | To        | Authority |
//! |-------------|-----------|-----------|-----------|
//! | `publish`   | `draft`   | `pending` | owner     |
//! | `approve`   | `pending` | `live`    | staff     |
//! | `reject`    | `pending` | `draft`   | staff     |
//! | `withdraw`  | `pending` | `draft`   | owner     |
//! | `unpublish` | `live`    | `draft`   | owner     |
//! | `takedown`  | `live`    | `draft`   | staff     |
//! | `redraft`   | `live`    | `draft`   | owner     |
//!
//! `redraft` is never requested directly. It fires when the owner edits the
//! content of a live project, forcing it back through review.
//!
//! Entering `draft` clears any featured window. A trigger whose guard fails
//! leaves the subject untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dph_core::{Operation, ProjectStatus, UserId};

// ─── Triggers ────────────────────────────────────────────────────────

/// Who may fire a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    Owner,
    Staff,
}

impl Authority {
    /// The policy operation class that enforces this authority.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Owner => Operation::OwnerMutation,
            Self::Staff => Operation::StaffAction,
        }
    }
}

/// A named lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Publish,
    Approve,
    Reject,
    Withdraw,
    Unpublish,
    Takedown,
    Redraft,
}

impl Trigger {
    /// The only state this trigger may fire from.
    pub fn from_status(&self) -> ProjectStatus {
        match self {
            Self::Publish => ProjectStatus::Draft,
            Self::Approve | Self::Reject | Self::Withdraw => ProjectStatus::Pending,
            Self::Unpublish | Self::Takedown | Self::Redraft => ProjectStatus::Live,
        }
    }

    /// The state this trigger moves to.
    pub fn to_status(&self) -> ProjectStatus {
        match self {
            Self::Publish => ProjectStatus::Pending,
            Self::Approve => ProjectStatus::Live,
            Self::Reject | Self::Withdraw | Self::Unpublish | Self::Takedown | Self::Redraft => {
                ProjectStatus::Draft
            }
        }
    }

    pub fn authority(&self) -> Authority {
        match self {
            Self::Publish | Self::Withdraw | Self::Unpublish | Self::Redraft => Authority::Owner,
            Self::Approve | Self::Reject | Self::Takedown => Authority::Staff,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Withdraw => "withdraw",
            Self::Unpublish => "unpublish",
            Self::Takedown => "takedown",
            Self::Redraft => "redraft",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Rejected lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No trigger connects the two states.
    #[error("invalid project transition: {from} -> {to}")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    /// The project is already in the requested state.
    #[error("project is already {status}")]
    AlreadyInStatus { status: ProjectStatus },
}

// ─── Transition Record ───────────────────────────────────────────────

/// Record of one applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: ProjectStatus,
    pub to: ProjectStatus,
    pub trigger: Trigger,
    /// The principal that fired the trigger.
    pub actor: UserId,
    pub at: DateTime<Utc>,
}

// ─── Subject ─────────────────────────────────────────────────────────

/// Anything carrying a project lifecycle.
pub trait Lifecycle {
    fn status(&self) -> ProjectStatus;
    fn set_status(&mut self, status: ProjectStatus);
    fn featured_until(&self) -> Option<DateTime<Utc>>;
    fn set_featured_until(&mut self, until: Option<DateTime<Utc>>);
    /// Stamp the last-modified time.
    fn touch(&mut self, at: DateTime<Utc>);
}

/// Map a requested target status to the trigger that reaches it.
///
/// `actor_is_owner` selects between the owner and staff variants of the
/// transitions into `draft`. Authority is not checked here; the caller
/// evaluates [`Trigger::authority`] through the access policy.
pub fn resolve_trigger(
    current: ProjectStatus,
    target: ProjectStatus,
    actor_is_owner: bool,
) -> Result<Trigger, LifecycleError> {
    use ProjectStatus::{Draft, Live, Pending};

    if current == target {
        return Err(LifecycleError::AlreadyInStatus { status: current });
    }
    match (current, target) {
        (Draft, Pending) => Ok(Trigger::Publish),
        (Pending, Live) => Ok(Trigger::Approve),
        (Pending, Draft) if actor_is_owner => Ok(Trigger::Withdraw),
        (Pending, Draft) => Ok(Trigger::Reject),
        (Live, Draft) if actor_is_owner => Ok(Trigger::Unpublish),
        (Live, Draft) => Ok(Trigger::Takedown),
        (from, to) => Err(LifecycleError::InvalidTransition { from, to }),
    }
}

/// Apply `trigger` to `subject`.
///
/// Verifies the guard against the subject's *current* status before
/// touching anything, so a caller holding a stale copy gets a rejection
/// rather than a double transition.
pub fn fire<L: Lifecycle + ?Sized>(
    subject: &mut L,
    trigger: Trigger,
    actor: UserId,
    at: DateTime<Utc>,
) -> Result<TransitionRecord, LifecycleError> {
    let from = subject.status();
    let to = trigger.to_status();
    if from == to {
        return Err(LifecycleError::AlreadyInStatus { status: from });
    }
    if from != trigger.from_status() {
        return Err(LifecycleError::InvalidTransition { from, to });
    }

    subject.set_status(to);
    if to == ProjectStatus::Draft {
        subject.set_featured_until(None);
    }
    subject.touch(at);

    Ok(TransitionRecord {
        from,
        to,
        trigger,
        actor,
        at,
    })
}

/// Demote a live project to draft after its content changed.
///
/// Returns the redraft record, or `None` when the project was not live.
pub fn on_content_edit<L: Lifecycle + ?Sized>(
    subject: &mut L,
    actor: UserId,
    at: DateTime<Utc>,
) -> Option<TransitionRecord> {
    if subject.status() == ProjectStatus::Live {
        fire(subject, Trigger::Redraft, actor, at).ok()
    } else {
        subject.touch(at);
        None
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
