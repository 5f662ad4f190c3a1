//! PostgreSQL-backed user repository

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use crate::models::{Role, User};
use crate::repositories::UserRepository;

const SELECT_USERS: &str = r#"
    SELECT u.id, u.version, u.email, u.password, u.age, u.firstname, u.lastname,
           u.created_at, u.updated_at,
           COALESCE(
               array_agg(r.name ORDER BY ur.position) FILTER (WHERE r.name IS NOT NULL),
               '{}'
           ) AS roles
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

/// User repository over a PostgreSQL pool
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn user_from_row(row: &PgRow) -> User {
        let mut user = User::with_profile(
            row.get::<String, _>("email"),
            row.get::<String, _>("password"),
            row.get("age"),
            row.get("firstname"),
            row.get("lastname"),
        );
        user.id = Some(row.get("id"));
        user.version = row.get("version");
        user.created_at = Some(row.get("created_at"));
        user.updated_at = Some(row.get("updated_at"));
        user.set_roles(
            row.get::<Vec<String>, _>("roles")
                .into_iter()
                .map(Role::new),
        );
        user
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn save(&self, user: &User) -> Result<User> {
        info!("Saving user: {}", user.email);

        let mut tx = self.pool.begin().await?;

        let id: i64 = match user.id {
            None => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO users (email, password, age, firstname, lastname)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(&user.email)
                .bind(&user.password)
                .bind(user.age)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .fetch_one(&mut *tx)
                .await?;

                row.get("id")
            }
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET email = $1, password = $2, age = $3, firstname = $4, lastname = $5,
                        version = version + 1, updated_at = now()
                    WHERE id = $6 AND version = $7
                    "#,
                )
                .bind(&user.email)
                .bind(&user.password)
                .bind(user.age)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(id)
                .bind(user.version)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    anyhow::bail!("optimistic lock conflict saving user id={id}");
                }

                id
            }
        };

        // Role associations are replaced wholesale, never diffed
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (position, role) in user.roles().iter().enumerate() {
            sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(&role.name)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role_id, position)
                SELECT $1, id, $2 FROM roles WHERE name = $3
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(&role.name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user id={id} missing after save"))
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!("{SELECT_USERS} GROUP BY u.id ORDER BY u.id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(Self::user_from_row).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        info!("Finding user by ID: {}", id);

        let row = sqlx::query(&format!("{SELECT_USERS} WHERE u.id = $1 GROUP BY u.id"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::user_from_row))
    }

    async fn delete(&self, user: &User) -> Result<()> {
        info!("Deleting user: {}", user.email);

        // Join rows go with the user via ON DELETE CASCADE
        match user.id {
            Some(id) => {
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("DELETE FROM users WHERE email = $1")
                    .bind(&user.email)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        info!("Finding user by email: {}", email);

        let row = sqlx::query(&format!("{SELECT_USERS} WHERE u.email = $1 GROUP BY u.id"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::user_from_row))
    }
}
