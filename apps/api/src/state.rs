use drivelane_application::{PermissionResolver, RoleAdminService, TargetService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub role_admin_service: RoleAdminService,
    pub target_service: TargetService,
    pub resolver: PermissionResolver,
    pub frontend_url: String,
}
