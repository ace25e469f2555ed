//! Capability table.
//!
//! What a caller may do with a complaint depends only on their current role
//! and their relationship to the record. Both are read fresh from the
//! directory and the repository on every call, never from token claims.

use shared_types::{Complaint, Role, User};

/// How a caller relates to one complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// Linked reporter of a non-anonymous complaint.
    Reporter,
    AssignedOfficer,
    Unrelated,
}

impl Relationship {
    pub fn of(user: &User, complaint: &Complaint) -> Self {
        if complaint.assigned_officer_id == Some(user.id) {
            Relationship::AssignedOfficer
        } else if !complaint.anonymous && complaint.reporter_id == Some(user.id) {
            Relationship::Reporter
        } else {
            Relationship::Unrelated
        }
    }
}

/// Operations permitted on one complaint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub edit: bool,
    pub withdraw: bool,
    pub append_update: bool,
    pub admin_note: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        read: false,
        edit: false,
        withdraw: false,
        append_update: false,
        admin_note: false,
    };
}

pub fn capabilities(role: Role, relationship: Relationship) -> Capabilities {
    match (role, relationship) {
        (Role::Admin, _) => Capabilities {
            read: true,
            append_update: true,
            admin_note: true,
            ..Capabilities::NONE
        },
        (Role::Officer, Relationship::AssignedOfficer) => Capabilities {
            read: true,
            append_update: true,
            ..Capabilities::NONE
        },
        (Role::User, Relationship::Reporter) => Capabilities {
            read: true,
            edit: true,
            withdraw: true,
            ..Capabilities::NONE
        },
        _ => Capabilities::NONE,
    }
}

/// Capabilities of `user` on `complaint`.
pub fn capabilities_for(user: &User, complaint: &Complaint) -> Capabilities {
    capabilities(user.role, Relationship::of(user, complaint))
}
