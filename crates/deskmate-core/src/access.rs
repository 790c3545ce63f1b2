//! Chat session access rules.
//!
//! Ownership is plain id equality. Sharing never grants write access: a
//! shared session is viewable by users whose role is listed in
//! `shared_with_roles`, and only the owner may edit it or send to it.

use crate::entities::{ChatSession, User};
use crate::error::CoreError;

pub const VIEW_DENIED: &str = "Anda tidak memiliki akses untuk melihat sesi chat ini.";
pub const EDIT_DENIED: &str = "Anda tidak memiliki akses untuk mengubah sesi chat ini.";
pub const SEND_DENIED: &str =
    "Anda tidak dapat mengirim pesan ke sesi chat ini. Sesi yang dibagikan hanya dapat dibaca.";

pub fn is_owner(session: &ChatSession, user: &User) -> bool {
    session.user_id == user.id
}

pub fn can_view(session: &ChatSession, user: &User) -> bool {
    is_owner(session, user) || (session.is_shared && session.shared_with_roles.contains(&user.role))
}

pub fn can_edit(session: &ChatSession, user: &User) -> bool {
    is_owner(session, user)
}

pub fn ensure_can_view(session: &ChatSession, user: &User) -> Result<(), CoreError> {
    if can_view(session, user) {
        Ok(())
    } else {
        tracing::warn!(session_id = session.id, user_id = user.id, "chat session view denied");
        Err(CoreError::Forbidden(VIEW_DENIED.to_owned()))
    }
}

pub fn ensure_can_edit(session: &ChatSession, user: &User) -> Result<(), CoreError> {
    if can_edit(session, user) {
        Ok(())
    } else {
        tracing::warn!(session_id = session.id, user_id = user.id, "chat session edit denied");
        Err(CoreError::Forbidden(EDIT_DENIED.to_owned()))
    }
}

pub fn ensure_can_send(session: &ChatSession, user: &User) -> Result<(), CoreError> {
    if is_owner(session, user) {
        Ok(())
    } else {
        tracing::warn!(
            session_id = session.id,
            user_id = user.id,
            shared = session.is_shared,
            "chat send denied for non-owner"
        );
        Err(CoreError::Forbidden(SEND_DENIED.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ChatType, Role};
    use chrono::Utc;
    use tracing_test::traced_test;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            name: format!("u{id}"),
            email: format!("u{id}@example.com"),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn session(owner: i64, shared: bool, roles: Vec<Role>) -> ChatSession {
        ChatSession {
            id: 1,
            user_id: owner,
            title: "t".into(),
            chat_type: ChatType::Global,
            persona: None,
            is_shared: shared,
            shared_with_roles: roles,
            last_activity_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_has_full_access() {
        let owner = user(7, Role::Engineer);
        let s = session(7, false, vec![]);
        assert!(can_view(&s, &owner));
        assert!(ensure_can_edit(&s, &owner).is_ok());
        assert!(ensure_can_send(&s, &owner).is_ok());
    }

    #[test]
    fn shared_session_is_read_only_for_matching_role() {
        let peer = user(8, Role::Engineer);
        let s = session(7, true, vec![Role::Engineer]);
        assert!(ensure_can_view(&s, &peer).is_ok());
        assert!(matches!(ensure_can_edit(&s, &peer), Err(CoreError::Forbidden(_))));
        assert!(matches!(ensure_can_send(&s, &peer), Err(CoreError::Forbidden(_))));
    }

    #[test]
    fn shared_session_hidden_from_other_roles() {
        let drafter = user(9, Role::Drafter);
        assert!(!can_view(&session(7, true, vec![Role::Engineer]), &drafter));
        // Role list alone is not enough without the shared flag.
        assert!(!can_view(&session(7, false, vec![Role::Drafter]), &drafter));
    }

    #[test]
    #[traced_test]
    fn denied_send_is_logged() {
        let peer = user(8, Role::Engineer);
        let _ = ensure_can_send(&session(7, true, vec![Role::Engineer]), &peer);
        assert!(logs_contain("chat send denied for non-owner"));
    }
}
