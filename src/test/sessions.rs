#[cfg(test)]
mod tests {
    use crate::auth::{Identity, Role, SessionStore};
    use chrono::Duration;

    #[test]
    fn test_create_and_get_session() {
        let sessions = SessionStore::new(Duration::minutes(30));
        let session = sessions.create();

        assert_eq!(session.token.len(), 32);
        assert!(session.identity.is_none());
        assert!(!session.pin_verified);

        let fetched = sessions.get(&session.token).expect("Session should exist");
        assert_eq!(fetched.token, session.token);
        assert!(fetched.last_seen >= session.last_seen);
    }

    #[test]
    fn test_tokens_are_unique() {
        let sessions = SessionStore::new(Duration::minutes(30));
        let a = sessions.create();
        let b = sessions.create();
        assert_ne!(a.token, b.token);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_get_nonexistent_session() {
        let sessions = SessionStore::new(Duration::minutes(30));
        assert!(sessions.get("missing").is_none());
        assert!(sessions.update("missing", |s| s.pin_verified = true).is_none());
    }

    #[test]
    fn test_update_sets_identity() {
        let sessions = SessionStore::new(Duration::minutes(30));
        let session = sessions.create();

        sessions.update(&session.token, |s| {
            s.identity = Some(Identity {
                user_id: 7,
                email: "a@example.com".to_string(),
                role: Role::Admin,
            })
        });

        let identity = sessions.get(&session.token).unwrap().identity.unwrap();
        assert_eq!(identity.user_id, 7);
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn test_invalidate_session() {
        let sessions = SessionStore::new(Duration::minutes(30));
        let session = sessions.create();

        assert!(sessions.invalidate(&session.token));
        assert!(!sessions.invalidate(&session.token));
        assert!(sessions.get(&session.token).is_none());
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let sessions = SessionStore::new(Duration::seconds(-1));
        let session = sessions.create();

        assert!(sessions.get(&session.token).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_clean_expired_sessions() {
        let expired = SessionStore::new(Duration::seconds(-1));
        expired.create();
        expired.create();
        assert_eq!(expired.clean_expired(), 2);
        assert!(expired.is_empty());

        let live = SessionStore::new(Duration::minutes(30));
        live.create();
        assert_eq!(live.clean_expired(), 0);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_clones_share_sessions() {
        let sessions = SessionStore::new(Duration::minutes(30));
        let handle = sessions.clone();
        let session = sessions.create();
        assert!(handle.get(&session.token).is_some());
    }
}
