//! SQLite implementation of the [`Directory`] collaborator trait.

use identra_model::{
    Directory, DirectoryError, DirectoryResult, DynSlot, Entity, Group, Membership,
    MembershipOrigin,
};
use identra_types::{AnyTypeKey, EntityKey, EntityKind, RealmPath};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Directory backed by a single SQLite database.
#[derive(Clone)]
pub struct SqliteDirectory {
    conn: Arc<Mutex<Connection>>,
}

fn db_err(e: rusqlite::Error) -> DirectoryError {
    DirectoryError::Database(format!("{e}"))
}

impl SqliteDirectory {
    /// Opens (or creates) a directory database at the given path.
    pub fn open(path: &Path) -> DirectoryResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DirectoryError::Database(format!("failed to open directory: {e}")))?;
        let dir = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        dir.init_schema()?;
        Ok(dir)
    }

    /// Opens an in-memory directory (for testing).
    pub fn open_in_memory() -> DirectoryResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DirectoryError::Database(format!("failed to open in-memory directory: {e}"))
        })?;
        let dir = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        dir.init_schema()?;
        Ok(dir)
    }

    fn init_schema(&self) -> DirectoryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS realms (
                path TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS entities (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                any_type TEXT,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS groups (
                key TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memberships (
                member TEXT NOT NULL,
                grp TEXT NOT NULL,
                origin TEXT NOT NULL,
                slot_any_type TEXT,
                UNIQUE(member, grp, origin)
            );
            ",
        )
        .map_err(|e| DirectoryError::Database(format!("failed to init directory schema: {e}")))?;
        Ok(())
    }

    fn row_to_membership(
        member: String,
        grp: String,
        origin: String,
        slot_any_type: Option<String>,
    ) -> DirectoryResult<Membership> {
        let member: EntityKey = member
            .parse()
            .map_err(|e| DirectoryError::InvalidData(format!("bad member key: {e}")))?;
        let group: EntityKey = grp
            .parse()
            .map_err(|e| DirectoryError::InvalidData(format!("bad group key: {e}")))?;
        let origin = match (origin.as_str(), slot_any_type) {
            ("static", _) => MembershipOrigin::Static,
            ("dynamic", None) => MembershipOrigin::Dynamic(DynSlot::Users),
            ("dynamic", Some(t)) => {
                MembershipOrigin::Dynamic(DynSlot::AnyObjects(AnyTypeKey::new(t)))
            }
            (other, _) => {
                return Err(DirectoryError::InvalidData(format!(
                    "unknown membership origin: {other}"
                )));
            }
        };
        Ok(Membership {
            member,
            group,
            origin,
        })
    }

    fn query_memberships(&self, column: &str, key: &EntityKey) -> DirectoryResult<Vec<Membership>> {
        let conn = self.conn.lock().unwrap();
        let sql =
            format!("SELECT member, grp, origin, slot_any_type FROM memberships WHERE {column} = ?1");
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![key.to_string()], |row| {
                let member: String = row.get(0)?;
                let grp: String = row.get(1)?;
                let origin: String = row.get(2)?;
                let slot: Option<String> = row.get(3)?;
                Ok((member, grp, origin, slot))
            })
            .map_err(db_err)?;

        let mut result = Vec::new();
        for row in rows {
            let (member, grp, origin, slot) = row.map_err(db_err)?;
            result.push(Self::row_to_membership(member, grp, origin, slot)?);
        }
        Ok(result)
    }
}

fn slot_any_type(slot: &DynSlot) -> Option<String> {
    match slot {
        DynSlot::Users => None,
        DynSlot::AnyObjects(t) => Some(t.to_string()),
    }
}

impl Directory for SqliteDirectory {
    fn entity(&self, key: &EntityKey) -> DirectoryResult<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT doc FROM entities WHERE key = ?1")
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![key.to_string()], |row| {
                let doc: String = row.get(0)?;
                Ok(doc)
            })
            .map_err(db_err)?;
        match rows.next() {
            Some(row) => {
                let doc = row.map_err(db_err)?;
                Ok(Some(serde_json::from_str(&doc)?))
            }
            None => Ok(None),
        }
    }

    fn group(&self, key: &EntityKey) -> DirectoryResult<Option<Group>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT doc FROM groups WHERE key = ?1")
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![key.to_string()], |row| {
                let doc: String = row.get(0)?;
                Ok(doc)
            })
            .map_err(db_err)?;
        match rows.next() {
            Some(row) => {
                let doc = row.map_err(db_err)?;
                Ok(Some(serde_json::from_str(&doc)?))
            }
            None => Ok(None),
        }
    }

    fn has_realm(&self, realm: &RealmPath) -> DirectoryResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM realms WHERE path = ?1",
                params![realm.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    fn select(
        &self,
        kind: EntityKind,
        any_type: Option<&AnyTypeKey>,
        filter: &dyn Fn(&Entity) -> bool,
    ) -> DirectoryResult<BTreeSet<EntityKey>> {
        let conn = self.conn.lock().unwrap();
        let docs: Vec<String> = match any_type {
            Some(t) => {
                let mut stmt = conn
                    .prepare("SELECT doc FROM entities WHERE kind = ?1 AND any_type = ?2")
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![kind.as_str(), t.as_str()], |row| row.get(0))
                    .map_err(db_err)?;
                rows.collect::<Result<_, _>>().map_err(db_err)?
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT doc FROM entities WHERE kind = ?1")
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![kind.as_str()], |row| row.get(0))
                    .map_err(db_err)?;
                rows.collect::<Result<_, _>>().map_err(db_err)?
            }
        };

        let mut result = BTreeSet::new();
        for doc in docs {
            let entity: Entity = serde_json::from_str(&doc)?;
            if filter(&entity) {
                result.insert(entity.key);
            }
        }
        Ok(result)
    }

    fn memberships_of(&self, member: &EntityKey) -> DirectoryResult<Vec<Membership>> {
        self.query_memberships("member", member)
    }

    fn members_of(&self, group: &EntityKey) -> DirectoryResult<Vec<Membership>> {
        self.query_memberships("grp", group)
    }

    fn add_realm(&self, realm: &RealmPath) -> DirectoryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO realms (path) VALUES (?1)",
            params![realm.as_str()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn save_entity(&self, entity: &Entity) -> DirectoryResult<()> {
        let doc = serde_json::to_string(entity)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO entities (key, kind, any_type, doc) VALUES (?1, ?2, ?3, ?4)",
            params![
                entity.key.to_string(),
                entity.kind.as_str(),
                entity.any_type.as_ref().map(|t| t.to_string()),
                doc,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn save_group(&self, group: &Group) -> DirectoryResult<()> {
        let doc = serde_json::to_string(group)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO groups (key, doc) VALUES (?1, ?2)",
            params![group.key.to_string(), doc],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn delete_group(&self, key: &EntityKey) -> DirectoryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM groups WHERE key = ?1", params![key.to_string()])
            .map_err(db_err)?;
        conn.execute(
            "DELETE FROM memberships WHERE grp = ?1",
            params![key.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn add_membership(&self, membership: &Membership) -> DirectoryResult<()> {
        let (origin, slot) = match &membership.origin {
            MembershipOrigin::Static => ("static", None),
            MembershipOrigin::Dynamic(slot) => ("dynamic", slot_any_type(slot)),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO memberships (member, grp, origin, slot_any_type) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                membership.member.to_string(),
                membership.group.to_string(),
                origin,
                slot,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn remove_membership(
        &self,
        member: &EntityKey,
        group: &EntityKey,
        origin: &MembershipOrigin,
    ) -> DirectoryResult<()> {
        let conn = self.conn.lock().unwrap();
        match origin {
            MembershipOrigin::Static => {
                conn.execute(
                    "DELETE FROM memberships \
                     WHERE member = ?1 AND grp = ?2 AND origin = 'static'",
                    params![member.to_string(), group.to_string()],
                )
                .map_err(db_err)?;
            }
            MembershipOrigin::Dynamic(slot) => match slot_any_type(slot) {
                None => {
                    conn.execute(
                        "DELETE FROM memberships \
                         WHERE member = ?1 AND grp = ?2 AND origin = 'dynamic' \
                         AND slot_any_type IS NULL",
                        params![member.to_string(), group.to_string()],
                    )
                    .map_err(db_err)?;
                }
                Some(t) => {
                    conn.execute(
                        "DELETE FROM memberships \
                         WHERE member = ?1 AND grp = ?2 AND origin = 'dynamic' \
                         AND slot_any_type = ?3",
                        params![member.to_string(), group.to_string(), t],
                    )
                    .map_err(db_err)?;
                }
            },
        }
        Ok(())
    }

    fn replace_dynamic_members(
        &self,
        group: &EntityKey,
        slot: &DynSlot,
        members: &BTreeSet<EntityKey>,
    ) -> DirectoryResult<()> {
        self.clear_dynamic_members(group, slot)?;
        let slot_col = slot_any_type(slot);
        let conn = self.conn.lock().unwrap();
        for member in members {
            conn.execute(
                "INSERT OR REPLACE INTO memberships (member, grp, origin, slot_any_type) \
                 VALUES (?1, ?2, 'dynamic', ?3)",
                params![member.to_string(), group.to_string(), slot_col],
            )
            .map_err(db_err)?;
        }
        Ok(())
    }

    fn clear_dynamic_members(&self, group: &EntityKey, slot: &DynSlot) -> DirectoryResult<()> {
        let conn = self.conn.lock().unwrap();
        match slot_any_type(slot) {
            None => {
                conn.execute(
                    "DELETE FROM memberships \
                     WHERE grp = ?1 AND origin = 'dynamic' AND slot_any_type IS NULL",
                    params![group.to_string()],
                )
                .map_err(db_err)?;
            }
            Some(t) => {
                conn.execute(
                    "DELETE FROM memberships \
                     WHERE grp = ?1 AND origin = 'dynamic' AND slot_any_type = ?2",
                    params![group.to_string(), t],
                )
                .map_err(db_err)?;
            }
        }
        Ok(())
    }
}
