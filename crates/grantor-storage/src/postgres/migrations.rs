use sqlx::PgPool;

/// Creates the five tables and their lookup indexes. Idempotent, so the
/// CLI can run it against a live database.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id             BIGSERIAL PRIMARY KEY,
            name           TEXT NOT NULL UNIQUE,
            credential     TEXT NOT NULL,
            salt           TEXT NOT NULL,
            created_at     TIMESTAMPTZ NOT NULL,
            last_modified  TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id             BIGSERIAL PRIMARY KEY,
            name           TEXT NOT NULL UNIQUE,
            created_at     TIMESTAMPTZ NOT NULL,
            last_modified  TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permissions (
            id             BIGSERIAL PRIMARY KEY,
            name           TEXT NOT NULL UNIQUE,
            created_at     TIMESTAMPTZ NOT NULL,
            last_modified  TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id        BIGINT NOT NULL REFERENCES users(id),
            role_id        BIGINT NOT NULL REFERENCES roles(id),
            created_at     TIMESTAMPTZ NOT NULL,
            last_modified  TIMESTAMPTZ NOT NULL,
            UNIQUE (user_id, role_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS role_permissions (
            role_id        BIGINT NOT NULL REFERENCES roles(id),
            permission_id  BIGINT NOT NULL REFERENCES permissions(id),
            created_at     TIMESTAMPTZ NOT NULL,
            last_modified  TIMESTAMPTZ NOT NULL,
            UNIQUE (role_id, permission_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_user_roles_role
        ON user_roles (role_id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_role_permissions_permission
        ON role_permissions (permission_id)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
