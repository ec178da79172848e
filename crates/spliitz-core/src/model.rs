//! # Users and Groups

use crate::primitives::MAX_GROUP_MEMBERS;
use crate::{GroupId, Result, SpliitzError, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// A group of users sharing expenses.
///
/// The creator is inserted into `members` on creation and can never be
/// removed, so a group always has at least one member able to add others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_by: UserId,
    pub members: BTreeSet<UserId>,
}

impl Group {
    /// Create a group whose only member is its creator.
    #[must_use]
    pub fn new(id: GroupId, name: impl Into<String>, created_by: UserId) -> Self {
        let mut members = BTreeSet::new();
        members.insert(created_by);
        Self {
            id,
            name: name.into(),
            created_by,
            members,
        }
    }

    #[must_use]
    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Fail with `NotGroupMember` unless `user` belongs to the group.
    pub fn require_member(&self, user: UserId) -> Result<()> {
        if self.is_member(user) {
            Ok(())
        } else {
            Err(SpliitzError::NotGroupMember {
                group: self.id,
                user,
            })
        }
    }

    /// Add a member, enforcing the group size limit.
    pub fn add_member(&mut self, user: UserId) -> Result<()> {
        if self.is_member(user) {
            return Err(SpliitzError::AlreadyMember {
                group: self.id,
                user,
            });
        }
        if self.members.len() >= MAX_GROUP_MEMBERS {
            return Err(SpliitzError::GroupFull(self.id));
        }
        self.members.insert(user);
        Ok(())
    }

    /// Remove a member other than the creator. Busy-checks live in the
    /// session, which can see expenses and dues.
    pub fn remove_member(&mut self, user: UserId) -> Result<()> {
        if user == self.created_by {
            return Err(SpliitzError::Forbidden(format!(
                "{} created {} and cannot leave it",
                user, self.id
            )));
        }
        if !self.members.remove(&user) {
            return Err(SpliitzError::NotGroupMember {
                group: self.id,
                user,
            });
        }
        Ok(())
    }
}
