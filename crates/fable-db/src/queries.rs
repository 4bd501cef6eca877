use crate::models::{AddContributor, ContributorRow, Guarded, StoryRow, UserRow, UserUpdate};
use crate::{Database, OptionalExt, is_unique_violation};
use anyhow::Result;
use rusqlite::Connection;

const STORY_SELECT: &str = "SELECT s.id, s.title, s.content, s.author_id, u.username, u.email, s.created_at, s.updated_at
     FROM stories s
     JOIN users u ON s.author_id = u.id";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the username or email is taken.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, username, email, password_hash FROM users ORDER BY id")?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Change a user's username and/or email. Absent fields are left as-is.
    pub fn update_user(
        &self,
        id: i64,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserUpdate> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET username = COALESCE(?2, username), email = COALESCE(?3, email)
                 WHERE id = ?1",
                rusqlite::params![id, username, email],
            );
            let changed = match updated {
                Ok(n) => n,
                Err(e) if is_unique_violation(&e) => return Ok(UserUpdate::Duplicate),
                Err(e) => return Err(e.into()),
            };
            if changed == 0 {
                return Ok(UserUpdate::NotFound);
            }
            Ok(query_user_by_id(conn, id)?.map_or(UserUpdate::NotFound, UserUpdate::Updated))
        })
    }

    /// Delete a user together with their stories and contributor edges.
    /// Returns false when no such user existed.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Stories --

    pub fn create_story(&self, title: &str, content: &str, author_id: i64) -> Result<StoryRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO stories (title, content, author_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![title, content, author_id],
            )?;
            let id = conn.last_insert_rowid();
            query_story(conn, id)?.ok_or_else(|| anyhow::anyhow!("story {} vanished after insert", id))
        })
    }

    pub fn get_story(&self, id: i64) -> Result<Option<StoryRow>> {
        self.with_conn(|conn| query_story(conn, id))
    }

    pub fn list_stories_by_author(&self, author_id: i64) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let sql = format!("{STORY_SELECT} WHERE s.author_id = ?1 ORDER BY s.created_at DESC, s.id DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([author_id], map_story)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Stories the user wrote or contributes to, newest first.
    pub fn list_stories_visible_to(&self, user_id: i64) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{STORY_SELECT}
                 WHERE s.author_id = ?1
                    OR EXISTS (SELECT 1 FROM contributors c WHERE c.story_id = s.id AND c.user_id = ?1)
                 ORDER BY s.created_at DESC, s.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_story)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update a story on behalf of `actor`, re-checking in the same
    /// transaction that the actor is still its author or a contributor.
    pub fn update_story_as(
        &self,
        story_id: i64,
        actor: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Guarded<StoryRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE stories
                 SET title = COALESCE(?3, title),
                     content = COALESCE(?4, content),
                     updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
                 WHERE id = ?1
                   AND (author_id = ?2
                        OR EXISTS (SELECT 1 FROM contributors WHERE story_id = ?1 AND user_id = ?2))",
                rusqlite::params![story_id, actor, title, content],
            )?;

            if changed == 0 {
                return Ok(refusal(&tx, story_id)?);
            }

            let row = query_story(&tx, story_id)?;
            tx.commit()?;
            Ok(row.map_or(Guarded::NotFound, Guarded::Done))
        })
    }

    /// Delete a story on behalf of its author. Contributor edges go with it.
    pub fn delete_story_as(&self, story_id: i64, actor: i64) -> Result<Guarded<()>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "DELETE FROM stories WHERE id = ?1 AND author_id = ?2",
                [story_id, actor],
            )?;

            if changed == 0 {
                return Ok(refusal(&tx, story_id)?);
            }

            tx.commit()?;
            Ok(Guarded::Done(()))
        })
    }

    // -- Contributors --

    pub fn list_contributors(&self, story_id: i64) -> Result<Vec<ContributorRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.story_id, c.user_id, u.username, u.email
                 FROM contributors c
                 JOIN users u ON c.user_id = u.id
                 WHERE c.story_id = ?1
                 ORDER BY c.id",
            )?;
            let rows = stmt
                .query_map([story_id], map_contributor)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Contributors of every story `user_id` can see, in one query. Uses the
    /// same visibility predicate as `list_stories_visible_to`, so the result
    /// does not depend on how many stories that is.
    pub fn list_contributors_visible_to(&self, user_id: i64) -> Result<Vec<ContributorRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.story_id, c.user_id, u.username, u.email
                 FROM contributors c
                 JOIN users u ON c.user_id = u.id
                 JOIN stories s ON c.story_id = s.id
                 WHERE s.author_id = ?1
                    OR EXISTS (SELECT 1 FROM contributors mine
                               WHERE mine.story_id = s.id AND mine.user_id = ?1)
                 ORDER BY c.id",
            )?;
            let rows = stmt
                .query_map([user_id], map_contributor)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Grant `user_id` contributor access to a story on behalf of `actor`,
    /// who must be the story's author at the moment of the insert.
    pub fn add_contributor_as(
        &self,
        story_id: i64,
        actor: i64,
        user_id: i64,
    ) -> Result<AddContributor> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(author_id) = query_story_author(&tx, story_id)? else {
                return Ok(AddContributor::StoryNotFound);
            };
            if author_id != actor {
                return Ok(AddContributor::Forbidden);
            }
            if user_id == author_id {
                return Ok(AddContributor::AuthorIsContributor);
            }
            if query_user_by_id(&tx, user_id)?.is_none() {
                return Ok(AddContributor::UserNotFound);
            }

            let inserted = tx.execute(
                "INSERT INTO contributors (story_id, user_id) VALUES (?1, ?2)",
                [story_id, user_id],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(AddContributor::Duplicate),
                Err(e) => return Err(e.into()),
            }

            let id = tx.last_insert_rowid();
            let row = query_contributor(&tx, id)?;
            tx.commit()?;
            Ok(row.map_or(AddContributor::StoryNotFound, AddContributor::Added))
        })
    }

    /// Remove contributor edge `edge_id` from `story_id` on behalf of the
    /// story's author. An edge that belongs to another story is `NotFound`.
    pub fn remove_contributor_as(
        &self,
        edge_id: i64,
        story_id: i64,
        actor: i64,
    ) -> Result<Guarded<()>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(author_id) = query_story_author(&tx, story_id)? else {
                return Ok(Guarded::NotFound);
            };
            if author_id != actor {
                return Ok(Guarded::Forbidden);
            }

            let changed = tx.execute(
                "DELETE FROM contributors WHERE id = ?1 AND story_id = ?2",
                [edge_id, story_id],
            )?;
            if changed == 0 {
                return Ok(Guarded::NotFound);
            }

            tx.commit()?;
            Ok(Guarded::Done(()))
        })
    }
}

/// Explain why a guarded write touched no rows.
fn refusal<T>(conn: &Connection, story_id: i64) -> Result<Guarded<T>> {
    Ok(match query_story_author(conn, story_id)? {
        Some(_) => Guarded::Forbidden,
        None => Guarded::NotFound,
    })
}

pub(crate) fn query_story_author(conn: &Connection, story_id: i64) -> Result<Option<i64>> {
    conn.query_row("SELECT author_id FROM stories WHERE id = ?1", [story_id], |row| row.get(0))
        .optional()
}

pub(crate) fn query_edge(conn: &Connection, story_id: i64, user_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM contributors WHERE story_id = ?1 AND user_id = ?2",
        [story_id, user_id],
        |row| row.get(0),
    )
    .optional()
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, username, email, password_hash FROM users WHERE username = ?1",
        [username],
        map_user,
    )
    .optional()
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, username, email, password_hash FROM users WHERE id = ?1",
        [id],
        map_user,
    )
    .optional()
}

fn query_story(conn: &Connection, id: i64) -> Result<Option<StoryRow>> {
    let sql = format!("{STORY_SELECT} WHERE s.id = ?1");
    conn.query_row(&sql, [id], map_story).optional()
}

fn query_contributor(conn: &Connection, id: i64) -> Result<Option<ContributorRow>> {
    conn.query_row(
        "SELECT c.id, c.story_id, c.user_id, u.username, u.email
         FROM contributors c
         JOIN users u ON c.user_id = u.id
         WHERE c.id = ?1",
        [id],
        map_contributor,
    )
    .optional()
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

fn map_story(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        author_email: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_contributor(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContributorRow> {
    Ok(ContributorRow {
        id: row.get(0)?,
        story_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        email: row.get(4)?,
    })
}
