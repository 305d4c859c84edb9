//! Conversation turns, owned by their session.

use sqlx::FromRow;

use super::{SqliteStore, parse_timestamp};
use crate::error::StoreError;
use crate::types::{ChunkRef, ConversationTurn, TurnRole};

#[derive(Debug, FromRow)]
struct TurnRow {
    session_id: String,
    repository_id: String,
    branch: String,
    role: String,
    content: String,
    sources: String,
    created_at: String,
}

impl TurnRow {
    fn into_turn(self) -> Result<ConversationTurn, StoreError> {
        let sources: Vec<ChunkRef> = serde_json::from_str(&self.sources)?;
        Ok(ConversationTurn {
            session_id: self.session_id,
            repository_id: self.repository_id,
            branch: self.branch,
            role: TurnRole::parse(&self.role),
            content: self.content,
            sources,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl SqliteStore {
    /// Append a turn to its session, returning the row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn append_turn(&self, turn: &ConversationTurn) -> Result<i64, StoreError> {
        let sources = serde_json::to_string(&turn.sources)?;

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO conversation_turns \
             (session_id, repository_id, branch, role, content, sources, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&turn.session_id)
        .bind(&turn.repository_id)
        .bind(&turn.branch)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(sources)
        .bind(turn.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// The most recent turns of a session, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn recent_turns(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            "SELECT session_id, repository_id, branch, role, content, sources, created_at \
             FROM conversation_turns WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TurnRow::into_turn).collect()
    }

    /// Delete every turn of a session, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_session(&self, session_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(session: &str, role: TurnRole, content: &str) -> ConversationTurn {
        ConversationTurn {
            session_id: session.into(),
            repository_id: "repo-1".into(),
            branch: "main".into(),
            role,
            content: content.into(),
            sources: vec![],
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn recent_turns_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.append_turn(&turn("s1", TurnRole::User, "first")).await.unwrap();
        store.append_turn(&turn("s1", TurnRole::Assistant, "second")).await.unwrap();
        store.append_turn(&turn("s1", TurnRole::User, "third")).await.unwrap();

        let turns = store.recent_turns("s1", 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "third");
        assert_eq!(turns[1].content, "second");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.append_turn(&turn("s1", TurnRole::User, "mine")).await.unwrap();
        store.append_turn(&turn("s2", TurnRole::User, "theirs")).await.unwrap();

        let turns = store.recent_turns("s1", 10).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "mine");
    }

    #[tokio::test]
    async fn clear_session_removes_only_that_session() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.append_turn(&turn("s1", TurnRole::User, "a")).await.unwrap();
        store.append_turn(&turn("s1", TurnRole::Assistant, "b")).await.unwrap();
        store.append_turn(&turn("s2", TurnRole::User, "c")).await.unwrap();

        let removed = store.clear_session("s1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.recent_turns("s1", 10).await.unwrap().is_empty());
        assert_eq!(store.recent_turns("s2", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sources_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut t = turn("s1", TurnRole::Assistant, "answer");
        t.sources = vec![ChunkRef {
            chunk_id: "c1".into(),
            file_path: "src/lib.rs".into(),
            line_range: (10, 20),
        }];
        store.append_turn(&t).await.unwrap();

        let turns = store.recent_turns("s1", 1).await.unwrap();
        assert_eq!(turns[0].sources.len(), 1);
        assert_eq!(turns[0].sources[0].chunk_id, "c1");
    }
}
