use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use drivelane_application::{
    CreateRoleInput, DirectoryRepository, DirectoryUser, NewDirectoryUser, PermissionDescriptor,
    PermissionLookup, RoleAssignment, RoleDefinition,
};
use drivelane_core::{AccountType, AppError, AppResult};
use drivelane_domain::{EmailAddress, Permission};


/// PostgreSQL-backed directory store for roles, users, and assignments.
///
/// Used when this service is the system of record; the `http` provider
/// covers deployments where an external identity service owns the graph.
#[derive(Clone)]
pub struct PostgresDirectoryRepository {
    pool: PgPool,
}

impl PostgresDirectoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: uuid::Uuid,
    role_name: String,
    description: Option<String>,
    permission: Option<String>,
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: uuid::Uuid,
    email: String,
    username: String,
    account_type: Option<String>,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_id: uuid::Uuid,
    email: String,
    role_id: uuid::Uuid,
    role_name: String,
}

#[async_trait]
impl DirectoryRepository for PostgresDirectoryRepository {
    async fn list_catalog(&self) -> AppResult<Vec<PermissionDescriptor>> {
        // The catalog is the closed permission universe, not a table.
        Ok(Permission::all()
            .iter()
            .map(|permission| PermissionDescriptor {
                key: *permission,
                name: permission.display_name().to_owned(),
            })
            .collect())
    }

    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.description,
                grants.permission
            FROM roles
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            ORDER BY roles.name, grants.permission
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn find_role(&self, role_id: &str) -> AppResult<Option<RoleDefinition>> {
        let role_id = parse_role_id(role_id)?;

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.description,
                grants.permission
            FROM roles
            LEFT JOIN role_grants AS grants
                ON grants.role_id = roles.id
            WHERE roles.id = $1
            ORDER BY grants.permission
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let role_id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_role_conflict(error, input.name.as_str()))?;

        Ok(RoleDefinition {
            role_id: role_id.to_string(),
            name: input.name,
            description: input.description,
            permissions: Vec::new(),
        })
    }

    async fn delete_role(&self, role_id: &str) -> AppResult<()> {
        let role_id = parse_role_id(role_id)?;

        // role_grants and user_roles cascade through their foreign keys.
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' was not found"
            )));
        }

        Ok(())
    }

    async fn add_role_permission(&self, role_id: &str, permission: Permission) -> AppResult<()> {
        let role_id = parse_role_id(role_id)?;

        sqlx::query(
            r#"
            INSERT INTO role_grants (role_id, permission)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to link permission: {error}")))?;

        Ok(())
    }

    async fn remove_role_permission(
        &self,
        role_id: &str,
        permission: Permission,
    ) -> AppResult<()> {
        let role_id = parse_role_id(role_id)?;

        sqlx::query(
            r#"
            DELETE FROM role_grants
            WHERE role_id = $1 AND permission = $2
            "#,
        )
        .bind(role_id)
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unlink permission: {error}")))?;

        Ok(())
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> AppResult<Option<DirectoryUser>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id AS user_id, email, username, account_type
            FROM directory_users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up user: {error}")))?;

        row.map(user_from_row).transpose()
    }

    async fn create_user(&self, input: NewDirectoryUser) -> AppResult<DirectoryUser> {
        let user_id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO directory_users (email, display_name, username)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(input.email.as_str())
        .bind(input.display_name.as_str())
        .bind(input.username.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_user_conflict(error, input.email.as_str()))?;

        Ok(DirectoryUser {
            user_id: user_id.to_string(),
            email: input.email,
            username: input.username,
            account_type: None,
        })
    }

    async fn assign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        let user_id = parse_user_id(user_id)?;
        let role_id = parse_role_id(role_id)?;

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        Ok(())
    }

    async fn unassign_role(&self, user_id: &str, role_id: &str) -> AppResult<()> {
        let user_id = parse_user_id(user_id)?;
        let role_id = parse_role_id(role_id)?;

        sqlx::query(
            r#"
            DELETE FROM user_roles
            WHERE user_id = $1 AND role_id = $2
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove role assignment: {error}"))
        })?;

        Ok(())
    }

    async fn list_role_assignments(&self) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                users.id AS user_id,
                users.email,
                roles.id AS role_id,
                roles.name AS role_name
            FROM user_roles
            INNER JOIN directory_users AS users
                ON users.id = user_roles.user_id
            INNER JOIN roles
                ON roles.id = user_roles.role_id
            ORDER BY users.email, roles.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list role assignments: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(RoleAssignment {
                    user_id: row.user_id.to_string(),
                    email: EmailAddress::new(row.email)?,
                    role_id: row.role_id.to_string(),
                    role_name: row.role_name,
                })
            })
            .collect()
    }

    async fn lookup_permissions_by_email(
        &self,
        email: &EmailAddress,
    ) -> AppResult<PermissionLookup> {
        // This is the resolver's hot path: connection-level failures must
        // surface as Unavailable so the caller can degrade to the last
        // confirmed set instead of treating the user as unconfigured.
        let user_exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM directory_users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("permission lookup failed: {error}"))
        })?;

        if user_exists == 0 {
            return Ok(PermissionLookup::NotConfigured);
        }

        let grants = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT grants.permission
            FROM directory_users AS users
            INNER JOIN user_roles
                ON user_roles.user_id = users.id
            INNER JOIN role_grants AS grants
                ON grants.role_id = user_roles.role_id
            WHERE users.email = $1
            ORDER BY grants.permission
            "#,
        )
        .bind(email.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("permission lookup failed: {error}"))
        })?;

        let permissions = grants
            .iter()
            .map(|value| {
                Permission::from_str(value).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid stored permission '{value}': {error}"
                    ))
                })
            })
            .collect::<AppResult<Vec<Permission>>>()?;

        Ok(PermissionLookup::Configured(permissions))
    }
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<RoleDefinition>> {
    let mut by_id: HashMap<uuid::Uuid, RoleDefinition> = HashMap::new();

    for row in rows {
        let role = by_id.entry(row.role_id).or_insert_with(|| RoleDefinition {
            role_id: row.role_id.to_string(),
            name: row.role_name.clone(),
            description: row.description.clone(),
            permissions: Vec::new(),
        });

        if let Some(permission_value) = row.permission {
            let permission =
                Permission::from_str(permission_value.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid stored permission '{permission_value}': {error}"
                    ))
                })?;

            role.permissions.push(permission);
        }
    }

    let mut roles = by_id.into_values().collect::<Vec<_>>();
    roles.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(roles)
}

fn user_from_row(row: UserRow) -> AppResult<DirectoryUser> {
    let account_type = row
        .account_type
        .as_deref()
        .map(AccountType::from_str)
        .transpose()
        .map_err(|error| {
            AppError::Internal(format!(
                "invalid stored account type for user '{}': {error}",
                row.email
            ))
        })?;

    Ok(DirectoryUser {
        user_id: row.user_id.to_string(),
        email: EmailAddress::new(row.email)?,
        username: row.username,
        account_type,
    })
}

fn parse_role_id(role_id: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(role_id)
        .map_err(|_| AppError::NotFound(format!("role '{role_id}' was not found")))
}

fn parse_user_id(user_id: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(user_id)
        .map_err(|_| AppError::NotFound(format!("user '{user_id}' was not found")))
}

fn map_role_conflict(error: sqlx::Error, role_name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to create role: {error}"))
}

fn map_user_conflict(error: sqlx::Error, email: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("user '{email}' already exists"));
    }

    AppError::Internal(format!("failed to create user: {error}"))
}
