use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use grantor_core::entity::{
    EntityKind, PermissionId, PermissionRecord, PermissionWrite, RoleId, RolePermission,
    RoleRecord, RoleWrite, Stamp, UserId, UserRecord, UserRole, UserView, UserWrite,
};
use grantor_core::page::PageRequest;

use crate::traits::StorageError;

pub(crate) fn to_storage_error(e: sqlx::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn map_unique_violation(kind: EntityKind) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return StorageError::DuplicateKey(kind);
        }
        to_storage_error(e)
    }
}

type UserRow = (i64, String, String, String, DateTime<Utc>, DateTime<Utc>);
type NamedRow = (i64, String, DateTime<Utc>, DateTime<Utc>);

fn user_from_row(row: UserRow) -> UserRecord {
    let (id, name, credential, salt, created_at, last_modified) = row;
    UserRecord {
        id: UserId::new(id),
        name,
        credential,
        salt,
        stamp: Stamp {
            created_at,
            last_modified,
        },
    }
}

pub async fn insert_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    write: &UserWrite,
) -> Result<UserId, StorageError> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (name, credential, salt, created_at, last_modified)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&write.name)
    .bind(&write.credential)
    .bind(&write.salt)
    .bind(write.stamp.created_at)
    .bind(write.stamp.last_modified)
    .fetch_one(executor)
    .await
    .map_err(map_unique_violation(EntityKind::User))?;

    Ok(UserId::new(row.0))
}

pub async fn user_by_name<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    name: &str,
) -> Result<Option<UserRecord>, StorageError> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        SELECT id, name, credential, salt, created_at, last_modified
        FROM users
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(row.map(user_from_row))
}

pub async fn update_user_credential<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: UserId,
    credential: &str,
    salt: &str,
    last_modified: DateTime<Utc>,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        UPDATE users
        SET credential = $2, salt = $3, last_modified = $4
        WHERE id = $1
        "#,
    )
    .bind(id.value())
    .bind(credential)
    .bind(salt)
    .bind(last_modified)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(())
}

pub async fn delete_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: UserId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn count_users<'e>(executor: impl sqlx::PgExecutor<'e>) -> Result<u64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.0 as u64)
}

pub async fn list_users<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    page: PageRequest,
) -> Result<Vec<UserView>, StorageError> {
    let rows: Vec<NamedRow> = sqlx::query_as(
        r#"
        SELECT id, name, created_at, last_modified
        FROM users
        ORDER BY id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, name, created_at, last_modified)| UserView {
            id: UserId::new(id),
            name,
            created_at,
            last_modified,
        })
        .collect())
}

pub async fn insert_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    write: &RoleWrite,
) -> Result<RoleId, StorageError> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO roles (name, created_at, last_modified)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&write.name)
    .bind(write.stamp.created_at)
    .bind(write.stamp.last_modified)
    .fetch_one(executor)
    .await
    .map_err(map_unique_violation(EntityKind::Role))?;

    Ok(RoleId::new(row.0))
}

pub async fn role_by_name<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    name: &str,
) -> Result<Option<RoleRecord>, StorageError> {
    let row: Option<NamedRow> = sqlx::query_as(
        r#"
        SELECT id, name, created_at, last_modified
        FROM roles
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(row.map(|(id, name, created_at, last_modified)| RoleRecord {
        id: RoleId::new(id),
        name,
        stamp: Stamp {
            created_at,
            last_modified,
        },
    }))
}

pub async fn rename_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: RoleId,
    new_name: &str,
    last_modified: DateTime<Utc>,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        UPDATE roles
        SET name = $2, last_modified = $3
        WHERE id = $1
        "#,
    )
    .bind(id.value())
    .bind(new_name)
    .bind(last_modified)
    .execute(executor)
    .await
    .map_err(map_unique_violation(EntityKind::Role))?;

    Ok(())
}

pub async fn delete_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: RoleId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn count_roles<'e>(executor: impl sqlx::PgExecutor<'e>) -> Result<u64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles")
        .fetch_one(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.0 as u64)
}

pub async fn list_roles<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    page: PageRequest,
) -> Result<Vec<RoleRecord>, StorageError> {
    let rows: Vec<NamedRow> = sqlx::query_as(
        r#"
        SELECT id, name, created_at, last_modified
        FROM roles
        ORDER BY id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, name, created_at, last_modified)| RoleRecord {
            id: RoleId::new(id),
            name,
            stamp: Stamp {
                created_at,
                last_modified,
            },
        })
        .collect())
}

pub async fn insert_permission<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    write: &PermissionWrite,
) -> Result<PermissionId, StorageError> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO permissions (name, created_at, last_modified)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&write.name)
    .bind(write.stamp.created_at)
    .bind(write.stamp.last_modified)
    .fetch_one(executor)
    .await
    .map_err(map_unique_violation(EntityKind::Permission))?;

    Ok(PermissionId::new(row.0))
}

pub async fn permission_by_name<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    name: &str,
) -> Result<Option<PermissionRecord>, StorageError> {
    let row: Option<NamedRow> = sqlx::query_as(
        r#"
        SELECT id, name, created_at, last_modified
        FROM permissions
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(
        row.map(|(id, name, created_at, last_modified)| PermissionRecord {
            id: PermissionId::new(id),
            name,
            stamp: Stamp {
                created_at,
                last_modified,
            },
        }),
    )
}

pub async fn rename_permission<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: PermissionId,
    new_name: &str,
    last_modified: DateTime<Utc>,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        UPDATE permissions
        SET name = $2, last_modified = $3
        WHERE id = $1
        "#,
    )
    .bind(id.value())
    .bind(new_name)
    .bind(last_modified)
    .execute(executor)
    .await
    .map_err(map_unique_violation(EntityKind::Permission))?;

    Ok(())
}

pub async fn delete_permission<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: PermissionId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM permissions WHERE id = $1")
        .bind(id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn count_permissions<'e>(
    executor: impl sqlx::PgExecutor<'e>,
) -> Result<u64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM permissions")
        .fetch_one(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.0 as u64)
}

pub async fn list_permissions<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    page: PageRequest,
) -> Result<Vec<PermissionRecord>, StorageError> {
    let rows: Vec<NamedRow> = sqlx::query_as(
        r#"
        SELECT id, name, created_at, last_modified
        FROM permissions
        ORDER BY id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page.limit() as i64)
    .bind(page.offset() as i64)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, name, created_at, last_modified)| PermissionRecord {
            id: PermissionId::new(id),
            name,
            stamp: Stamp {
                created_at,
                last_modified,
            },
        })
        .collect())
}

pub async fn insert_user_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    relation: &UserRole,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id, created_at, last_modified)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(relation.user_id.value())
    .bind(relation.role_id.value())
    .bind(relation.stamp.created_at)
    .bind(relation.stamp.last_modified)
    .execute(executor)
    .await
    .map_err(map_unique_violation(EntityKind::UserRole))?;

    Ok(())
}

pub async fn delete_user_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: UserId,
    role_id: RoleId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id.value())
        .bind(role_id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_user_roles_by_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: UserId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_user_roles_by_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    role_id: RoleId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM user_roles WHERE role_id = $1")
        .bind(role_id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn insert_role_permission<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    relation: &RolePermission,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id, created_at, last_modified)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(relation.role_id.value())
    .bind(relation.permission_id.value())
    .bind(relation.stamp.created_at)
    .bind(relation.stamp.last_modified)
    .execute(executor)
    .await
    .map_err(map_unique_violation(EntityKind::RolePermission))?;

    Ok(())
}

pub async fn delete_role_permission<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    role_id: RoleId,
    permission_id: PermissionId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
        .bind(role_id.value())
        .bind(permission_id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_role_permissions_by_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    role_id: RoleId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn delete_role_permissions_by_permission<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    permission_id: PermissionId,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM role_permissions WHERE permission_id = $1")
        .bind(permission_id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn role_names_for_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: UserId,
) -> Result<BTreeSet<String>, StorageError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT r.name
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = $1
        "#,
    )
    .bind(user_id.value())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

pub async fn permission_names_for_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    role_id: RoleId,
) -> Result<BTreeSet<String>, StorageError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT p.name
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = $1
        "#,
    )
    .bind(role_id.value())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}
