//! Access policy for attendance rows and user management.
//!
//! [`authorize`] is the only place role decisions are made. Handlers pass it
//! whatever `teacher_id` the client asked for and act on the returned
//! [`EffectiveScope`], never on the raw request value.

use std::fmt;

use crate::models::{Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateAttendance,
    ReadAttendance,
    DeleteAttendance,
    ManageUsers,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateAttendance => "create_attendance",
            Action::ReadAttendance => "read_attendance",
            Action::DeleteAttendance => "delete_attendance",
            Action::ManageUsers => "manage_users",
        }
    }
}

/// Rows an operation may touch, keyed by owning teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveScope {
    /// Rows owned by the caller.
    Own(i64),
    /// Every row.
    All,
    /// Rows owned by the given teacher (admin only).
    Specific(i64),
}

impl EffectiveScope {
    /// Owning teacher id the scope is restricted to, `None` for [`EffectiveScope::All`].
    pub fn owner(&self) -> Option<i64> {
        match *self {
            EffectiveScope::Own(id) | EffectiveScope::Specific(id) => Some(id),
            EffectiveScope::All => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denied {
    pub action: Action,
    pub role: Role,
}

impl fmt::Display for Denied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "role `{}` may not perform `{}`",
            self.role,
            self.action.as_str()
        )
    }
}

pub fn authorize(
    identity: &Identity,
    action: Action,
    target: Option<i64>,
) -> Result<EffectiveScope, Denied> {
    match (identity.role, action) {
        (_, Action::CreateAttendance) => Ok(EffectiveScope::Own(identity.id)),
        (Role::Admin, Action::ReadAttendance | Action::DeleteAttendance) => Ok(match target {
            Some(teacher_id) => EffectiveScope::Specific(teacher_id),
            None => EffectiveScope::All,
        }),
        // a teacher's requested target is dropped, not rejected
        (Role::Teacher, Action::ReadAttendance | Action::DeleteAttendance) => {
            Ok(EffectiveScope::Own(identity.id))
        }
        (Role::Admin, Action::ManageUsers) => Ok(EffectiveScope::All),
        (Role::Teacher, Action::ManageUsers) => Err(Denied {
            action,
            role: identity.role,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Identity {
        Identity {
            id: 1,
            username: "root".to_string(),
            role: Role::Admin,
        }
    }

    fn teacher(id: i64) -> Identity {
        Identity {
            id,
            username: format!("T{}", id),
            role: Role::Teacher,
        }
    }

    #[test]
    fn create_always_owned_by_caller() {
        assert_eq!(
            authorize(&admin(), Action::CreateAttendance, Some(9)),
            Ok(EffectiveScope::Own(1))
        );
        assert_eq!(
            authorize(&teacher(4), Action::CreateAttendance, Some(9)),
            Ok(EffectiveScope::Own(4))
        );
    }

    #[test]
    fn admin_reads_all_or_target() {
        assert_eq!(
            authorize(&admin(), Action::ReadAttendance, None),
            Ok(EffectiveScope::All)
        );
        assert_eq!(
            authorize(&admin(), Action::ReadAttendance, Some(7)),
            Ok(EffectiveScope::Specific(7))
        );
        assert_eq!(
            authorize(&admin(), Action::DeleteAttendance, None),
            Ok(EffectiveScope::All)
        );
        assert_eq!(
            authorize(&admin(), Action::DeleteAttendance, Some(7)),
            Ok(EffectiveScope::Specific(7))
        );
    }

    #[test]
    fn teacher_never_escapes_own_rows() {
        let me = teacher(5);
        for target in [None, Some(1), Some(5), Some(6), Some(-1), Some(i64::MAX)] {
            for action in [Action::ReadAttendance, Action::DeleteAttendance] {
                assert_eq!(
                    authorize(&me, action, target),
                    Ok(EffectiveScope::Own(5)),
                    "{:?} with target {:?}",
                    action,
                    target
                );
            }
        }
    }

    #[test]
    fn only_admin_manages_users() {
        assert_eq!(
            authorize(&admin(), Action::ManageUsers, None),
            Ok(EffectiveScope::All)
        );
        let denied = authorize(&teacher(2), Action::ManageUsers, Some(2)).unwrap_err();
        assert_eq!(denied.role, Role::Teacher);
        assert_eq!(denied.action, Action::ManageUsers);
        assert_eq!(
            denied.to_string(),
            "role `teacher` may not perform `manage_users`"
        );
    }

    #[test]
    fn scope_owner() {
        assert_eq!(EffectiveScope::Own(3).owner(), Some(3));
        assert_eq!(EffectiveScope::Specific(8).owner(), Some(8));
        assert_eq!(EffectiveScope::All.owner(), None);
    }
}
