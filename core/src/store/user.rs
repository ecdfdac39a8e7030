use super::HolderStore;
use crate::error::HolderResult;
use rusqlite::{params, OptionalExtension};

/// A dashboard user as stored. The role is kept raw; `auth::Role`
/// interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
}

impl HolderStore {
    pub fn find_user(&self, id: &str) -> HolderResult<Option<UserRow>> {
        self.conn
            .query_row(
                "SELECT id, email, name, role, isActive FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        name: row.get(2)?,
                        role: row.get(3)?,
                        is_active: row.get::<_, i64>(4)? != 0,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn insert_user(&self, user: &UserRow) -> HolderResult<()> {
        self.conn.execute(
            "INSERT INTO users (id, email, name, role, isActive) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.email,
                user.name,
                user.role,
                user.is_active as i64
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_round_trip() {
        let s = HolderStore::in_memory().unwrap();
        let u = UserRow {
            id: "u1".into(),
            email: "coord@example.com".into(),
            name: "Coordinación".into(),
            role: "Coordinador Regional".into(),
            is_active: true,
        };
        s.insert_user(&u).unwrap();
        assert_eq!(s.find_user("u1").unwrap(), Some(u));
        assert_eq!(s.find_user("nobody").unwrap(), None);
    }
}
