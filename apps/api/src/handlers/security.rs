use super::*;

use drivelane_application::CreateRoleInput;

use crate::dto::{
    AssignRoleRequest, CreateRoleRequest, PermissionDescriptorResponse,
    PermissionSyncReportResponse, RemoveRoleAssignmentRequest, ResolvedPermissionsResponse,
    RoleAssignmentResponse, RoleResponse, SetRolePermissionsRequest,
};

pub async fn list_permission_catalog_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<PermissionDescriptorResponse>>> {
    let catalog = state
        .role_admin_service
        .list_permission_catalog(&user)
        .await?
        .into_iter()
        .map(PermissionDescriptorResponse::from)
        .collect();

    Ok(Json(catalog))
}

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .role_admin_service
        .list_roles(&user)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = state
        .role_admin_service
        .create_role(
            &user,
            CreateRoleInput {
                name: payload.name,
                description: payload.description,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .role_admin_service
        .delete_role(&user, role_id.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_role_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<String>,
    Json(payload): Json<SetRolePermissionsRequest>,
) -> ApiResult<Json<PermissionSyncReportResponse>> {
    let desired = payload
        .permissions
        .iter()
        .map(|value| Permission::from_transport(value.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let report = state
        .role_admin_service
        .set_role_permissions(&user, role_id.as_str(), desired)
        .await?;

    Ok(Json(PermissionSyncReportResponse::from(report)))
}

pub async fn list_role_assignments_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<RoleAssignmentResponse>>> {
    let assignments = state
        .role_admin_service
        .list_role_assignments(&user)
        .await?
        .into_iter()
        .map(RoleAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .role_admin_service
        .assign_role_to_user(&user, payload.email.as_str(), payload.role_id.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<RemoveRoleAssignmentRequest>,
) -> ApiResult<StatusCode> {
    state
        .role_admin_service
        .unassign_role_from_user(&user, payload.email.as_str(), payload.role_id.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Resolution is fail-soft: this handler never surfaces a lookup error, it
/// reports the degraded source instead so navigation can keep rendering.
pub async fn my_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<ResolvedPermissionsResponse>> {
    let resolution = state.resolver.resolve(&user).await;
    Ok(Json(ResolvedPermissionsResponse::from(resolution)))
}
