//! Ownership rules for records that users author.
//!
//! A non-owner is told the record does not exist; an anonymous actor is sent
//! to log in before anything is looked up.

use shared::{
    domain::{Actor, Comment, Note, User, UserId},
    error::ApiError,
};
use tracing::info;

/// A record with a fixed author.
pub trait Authored {
    fn author_id(&self) -> UserId;
}

impl Authored for Comment {
    fn author_id(&self) -> UserId {
        self.author.id
    }
}

impl Authored for Note {
    fn author_id(&self) -> UserId {
        self.author.id
    }
}

pub trait AccessPolicy<R> {
    fn can_modify(&self, actor: &User, record: &R) -> bool;
}

/// Only the author may view privately, edit or delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerOnly;

impl<R: Authored> AccessPolicy<R> for OwnerOnly {
    fn can_modify(&self, actor: &User, record: &R) -> bool {
        actor.id == record.author_id()
    }
}

pub fn can_modify<R: Authored>(actor: &User, record: &R) -> bool {
    OwnerOnly.can_modify(actor, record)
}

pub fn require_user(actor: &Actor) -> Result<&User, ApiError> {
    actor.user().ok_or_else(ApiError::unauthenticated)
}

/// Resolves a looked-up record against the policy. A missing record and a
/// foreign record produce the same `NotFound`.
pub fn authorize<R, P>(
    policy: &P,
    user: &User,
    record: Option<R>,
    what: &str,
) -> Result<R, ApiError>
where
    P: AccessPolicy<R>,
{
    match record {
        Some(record) if policy.can_modify(user, &record) => Ok(record),
        Some(_) => {
            info!(user_id = user.id.0, record = what, "access denied to non-owner");
            Err(ApiError::not_found(what))
        }
        None => Err(ApiError::not_found(what)),
    }
}

#[cfg(test)]
#[path = "tests/policy_tests.rs"]
mod tests;
