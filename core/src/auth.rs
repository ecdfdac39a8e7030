//! Session resolution and role checks.
//!
//! The session cookie carries `{"id": .., "email": ..}` as JSON. The role is
//! never trusted from the cookie; it is read from the users table.

use crate::{
    error::{HolderError, HolderResult},
    store::HolderStore,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SESSION_COOKIE: &str = "cgm_session";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Superusuario,
    CoordinadorRegional,
    Administrador,
    Analista,
    MedicoAuditor,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        match raw.trim() {
            "Superusuario" => Role::Superusuario,
            "Coordinador Regional" => Role::CoordinadorRegional,
            "Administrador" => Role::Administrador,
            "Analista" => Role::Analista,
            "Médico Auditor" => Role::MedicoAuditor,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Superusuario => "Superusuario",
            Role::CoordinadorRegional => "Coordinador Regional",
            Role::Administrador => "Administrador",
            Role::Analista => "Analista",
            Role::MedicoAuditor => "Médico Auditor",
            Role::Other(s) => s,
        }
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Role::Superusuario | Role::CoordinadorRegional)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a request is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Summary,
    Overview,
    View,
    Lookup,
    Companies,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::Summary => "summary",
            Action::Overview => "overview",
            Action::View => "view",
            Action::Lookup => "lookup",
            Action::Companies => "companies",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Action::Create | Action::Update | Action::Delete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionCookie {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl SessionCookie {
    /// Parse a cookie value. Accepts raw JSON or its percent-encoded form.
    pub fn parse(raw: &str) -> Option<SessionCookie> {
        let raw = raw.trim();
        serde_json::from_str(raw)
            .ok()
            .or_else(|| {
                let decoded = urlencoding::decode(raw).ok()?;
                serde_json::from_str(&decoded).ok()
            })
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

/// Resolve a cookie value to a session. Unknown or inactive users, an email
/// that disagrees with the stored one and malformed cookies are all
/// `Unauthenticated`.
pub fn resolve_session(store: &HolderStore, cookie: Option<&str>) -> HolderResult<Session> {
    let cookie = cookie
        .and_then(SessionCookie::parse)
        .ok_or(HolderError::Unauthenticated)?;
    let user = store
        .find_user(&cookie.id)?
        .filter(|u| u.is_active)
        .filter(|u| cookie.email.as_deref().map_or(true, |e| e == u.email))
        .ok_or(HolderError::Unauthenticated)?;
    Ok(Session {
        user_id: user.id,
        email: user.email,
        role: Role::parse(&user.role),
    })
}

/// Reads are open to every authenticated role. Mutations need a write role.
pub fn authorize(action: Action, role: &Role) -> HolderResult<()> {
    if action.is_mutation() && !role.can_write() {
        return Err(HolderError::Forbidden {
            role: role.to_string(),
            action: action.as_str(),
        });
    }
    Ok(())
}

/// Extract one cookie from a `Cookie:` header value.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UserRow;

    fn store_with(role: &str, active: bool) -> HolderStore {
        let s = HolderStore::in_memory().unwrap();
        s.insert_user(&UserRow {
            id: "u1".into(),
            email: "a@b.c".into(),
            name: "A".into(),
            role: role.into(),
            is_active: active,
        })
        .unwrap();
        s
    }

    #[test]
    fn only_write_roles_mutate() {
        for action in [Action::Create, Action::Update, Action::Delete] {
            assert!(authorize(action, &Role::Superusuario).is_ok());
            assert!(authorize(action, &Role::CoordinadorRegional).is_ok());
            let err = authorize(action, &Role::Analista).unwrap_err();
            assert_eq!(err.status_code(), 403);
        }
        assert!(authorize(Action::List, &Role::Other("Invitado".into())).is_ok());
    }

    #[test]
    fn roles_parse_exact_names() {
        assert_eq!(Role::parse("Médico Auditor"), Role::MedicoAuditor);
        assert_eq!(Role::parse("Coordinador Regional"), Role::CoordinadorRegional);
        assert_eq!(Role::parse("root"), Role::Other("root".into()));
    }

    #[test]
    fn session_resolves_role_from_users_table() {
        let s = store_with("Superusuario", true);
        let session = resolve_session(&s, Some(r#"{"id":"u1","email":"a@b.c"}"#)).unwrap();
        assert_eq!(session.role, Role::Superusuario);
        assert_eq!(session.user_id, "u1");
        let spoofed = resolve_session(&s, Some(r#"{"id":"u1","email":"spoof@x"}"#));
        assert!(matches!(spoofed, Err(HolderError::Unauthenticated)));
    }

    #[test]
    fn encoded_cookie_is_accepted() {
        let s = store_with("Analista", true);
        let session = resolve_session(&s, Some("%7B%22id%22%3A%22u1%22%7D")).unwrap();
        assert_eq!(session.role, Role::Analista);
        let encoded = urlencoding::encode(r#"{"id":"u1","email":"a@b.c"}"#);
        assert!(resolve_session(&s, Some(encoded.as_ref())).is_ok());
        assert!(resolve_session(&s, Some("%7B%22id%22%3A%2")).is_err());
    }

    #[test]
    fn missing_bad_or_inactive_sessions_are_unauthenticated() {
        let s = store_with("Superusuario", false);
        for cookie in [None, Some("not json"), Some(r#"{"id":"u1"}"#), Some(r#"{"id":"zz"}"#)] {
            let err = resolve_session(&s, cookie).unwrap_err();
            assert_eq!(err.status_code(), 401, "cookie {cookie:?}");
        }
    }

    #[test]
    fn cookie_header_is_split_by_name() {
        let header = "theme=dark; cgm_session={\"id\":\"u1\"}; x=1";
        assert_eq!(cookie_value(header, SESSION_COOKIE), Some("{\"id\":\"u1\"}"));
        assert_eq!(cookie_value(header, "missing"), None);
    }
}
