use anyhow::Result;
use tracing::info;

use crate::Database;

const DEMO_USERS: &[(i64, &str, &str)] = &[
    (1, "alice", "alice@example.com"),
    (2, "bob", "bob@example.com"),
    (3, "charlie", "charlie@example.com"),
];

const DEMO_STORIES: &[(i64, &str, &str, i64)] = &[
    (1, "The Mysterious Forest", "Once upon a time, deep in the forest...", 1),
    (2, "Space Adventures", "Captain Nova entered the wormhole...", 2),
];

/// (edge id, story id, user id)
const DEMO_CONTRIBUTORS: &[(i64, i64, i64)] = &[(1, 1, 2), (2, 1, 3), (3, 2, 1)];

impl Database {
    /// Load the demo users, stories and contributor edges into an empty
    /// database. All demo users share `password_hash`. Returns false and
    /// leaves the data alone when any user already exists.
    pub fn seed_demo(&self, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let users: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            if users > 0 {
                return Ok(false);
            }

            for (id, username, email) in DEMO_USERS {
                tx.execute(
                    "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, username, email, password_hash],
                )?;
            }
            for (id, title, content, author_id) in DEMO_STORIES {
                tx.execute(
                    "INSERT INTO stories (id, title, content, author_id) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, title, content, author_id],
                )?;
            }
            for (id, story_id, user_id) in DEMO_CONTRIBUTORS {
                tx.execute(
                    "INSERT INTO contributors (id, story_id, user_id) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, story_id, user_id],
                )?;
            }

            tx.commit()?;
            info!(
                "Seeded {} demo users, {} stories, {} contributor edges",
                DEMO_USERS.len(),
                DEMO_STORIES.len(),
                DEMO_CONTRIBUTORS.len()
            );
            Ok(true)
        })
    }
}
