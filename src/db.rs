//! Todo store accessor — one relational operation per CRUD call.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::models::{CreateTodoRequest, Todo, UpdateTodoRequest};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Storage interface for todos. Implemented by [`PgStore`] in production and
/// by an in-memory store in tests.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Todo>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Todo>, StoreError>;

    async fn insert(&self, req: CreateTodoRequest) -> Result<Todo, StoreError>;

    /// Applies a partial overwrite, then re-reads the row. The re-read, not
    /// the write's affected count, signals absence.
    async fn update(&self, id: i64, req: UpdateTodoRequest) -> Result<Option<Todo>, StoreError>;

    /// Returns whether a row was actually removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and make sure the todos table exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT FALSE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("database schema ready");
        Ok(())
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        let todos = sqlx::query_as::<_, Todo>("SELECT id, title, completed FROM todos ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(todos)
    }

    async fn get(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        let todo =
            sqlx::query_as::<_, Todo>("SELECT id, title, completed FROM todos WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(todo)
    }

    async fn insert(&self, req: CreateTodoRequest) -> Result<Todo, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            "INSERT INTO todos (title, completed) VALUES ($1, COALESCE($2, FALSE)) \
             RETURNING id, title, completed",
        )
        .bind(req.title)
        .bind(req.completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn update(&self, id: i64, req: UpdateTodoRequest) -> Result<Option<Todo>, StoreError> {
        // For a missing id this matches zero rows and writes nothing.
        sqlx::query(
            "UPDATE todos SET title = COALESCE($2, title), completed = COALESCE($3, completed) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(req.title)
        .bind(req.completed)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store mirroring the SQL semantics, for handler tests.
#[cfg(test)]
pub(crate) struct MemStore {
    rows: std::sync::Mutex<Vec<Todo>>,
    next_id: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl MemStore {
    pub(crate) fn new() -> Self {
        Self {
            rows: std::sync::Mutex::new(Vec::new()),
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TodoStore for MemStore {
    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn get(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|t| t.id == id).cloned())
    }

    async fn insert(&self, req: CreateTodoRequest) -> Result<Todo, StoreError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let todo = Todo {
            id,
            title: req.title,
            completed: req.completed.unwrap_or(false),
        };
        self.rows.lock().unwrap().push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: i64, req: UpdateTodoRequest) -> Result<Option<Todo>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(todo) = rows.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            todo.title = title;
        }
        if let Some(completed) = req.completed {
            todo.completed = completed;
        }
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|t| t.id != id);
        Ok(rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: &str) -> CreateTodoRequest {
        CreateTodoRequest {
            title: title.to_string(),
            completed: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = MemStore::new();

        let first = store.insert(create("a")).await.unwrap();
        let second = store.insert(create("b")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(!first.completed);
    }

    #[tokio::test]
    async fn update_overwrites_only_supplied_fields() {
        let store = MemStore::new();
        let todo = store.insert(create("a")).await.unwrap();

        let updated = store
            .update(
                todo.id,
                UpdateTodoRequest {
                    title: None,
                    completed: Some(true),
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "a");
        assert!(updated.completed);
    }

    #[tokio::test]
    async fn update_missing_id_writes_nothing() {
        let store = MemStore::new();
        store.insert(create("a")).await.unwrap();

        let result = store
            .update(
                99,
                UpdateTodoRequest {
                    title: Some("b".to_string()),
                    completed: None,
                },
            )
            .await
            .unwrap();

        assert!(result.is_none());
        let todos = store.list().await.unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "a");
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let store = MemStore::new();
        let todo = store.insert(create("a")).await.unwrap();

        assert!(store.delete(todo.id).await.unwrap());
        assert!(!store.delete(todo.id).await.unwrap());
        assert!(store.get(todo.id).await.unwrap().is_none());
    }
}
