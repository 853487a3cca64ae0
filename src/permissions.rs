/// Role-Based Access Control tables.
///
/// The role -> permission mapping is a static, read-only table built once at
/// process start. Authorization checks are pure set-membership tests against
/// the permissions embedded in verified token claims; they never touch
/// storage.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::auth::Claims;

pub const ROLE_SUPER_ADMIN: &str = "Super Admin";
pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_PROJECT_MANAGER: &str = "Project Manager";
pub const ROLE_TEAM_MEMBER: &str = "Team Member";
pub const ROLE_VIEWER: &str = "Viewer";

/// The global permission catalog. No permission outside this list is ever
/// granted, regardless of what a token claims.
pub const PERMISSION_CATALOG: &[&str] = &[
    "projects.view",
    "projects.create",
    "projects.edit",
    "projects.delete",
    "tasks.view",
    "tasks.create",
    "tasks.edit",
    "tasks.delete",
    "tasks.assign",
    "sprints.view",
    "sprints.manage",
    "budgets.view",
    "budgets.manage",
    "assets.view",
    "assets.manage",
    "documents.view",
    "documents.upload",
    "documents.delete",
    "users.view",
    "users.manage",
    "users.delete",
    "reports.view",
];

lazy_static! {
    static ref ROLE_PERMISSIONS: HashMap<&'static str, Vec<&'static str>> = {
        let mut map = HashMap::new();
        // Super Admin holds the entire catalog.
        map.insert(ROLE_SUPER_ADMIN, PERMISSION_CATALOG.to_vec());
        map.insert(
            ROLE_ADMIN,
            vec![
                "projects.view",
                "projects.create",
                "projects.edit",
                "projects.delete",
                "tasks.view",
                "tasks.create",
                "tasks.edit",
                "tasks.delete",
                "tasks.assign",
                "sprints.view",
                "sprints.manage",
                "budgets.view",
                "budgets.manage",
                "assets.view",
                "assets.manage",
                "documents.view",
                "documents.upload",
                "documents.delete",
                "users.view",
                "users.manage",
                "reports.view",
            ],
        );
        map.insert(
            ROLE_PROJECT_MANAGER,
            vec![
                "projects.view",
                "projects.create",
                "projects.edit",
                "tasks.view",
                "tasks.create",
                "tasks.edit",
                "tasks.assign",
                "sprints.view",
                "sprints.manage",
                "budgets.view",
                "documents.view",
                "documents.upload",
                "users.view",
                "reports.view",
            ],
        );
        map.insert(
            ROLE_TEAM_MEMBER,
            vec![
                "projects.view",
                "tasks.view",
                "tasks.create",
                "tasks.edit",
                "sprints.view",
                "documents.view",
                "documents.upload",
            ],
        );
        map.insert(
            ROLE_VIEWER,
            vec!["projects.view", "tasks.view", "sprints.view", "documents.view"],
        );
        map
    };
}

/// Permissions granted to a role. Unknown roles get nothing.
pub fn permissions_for_role(role: &str) -> Vec<String> {
    ROLE_PERMISSIONS
        .get(role)
        .map(|perms| perms.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default()
}

pub fn is_known_permission(permission: &str) -> bool {
    PERMISSION_CATALOG.contains(&permission)
}

/// Drop anything outside the catalog, preserving order and deduplicating.
/// Applied at token issuance so a forged or stale permission string never
/// survives re-issuance.
pub fn sanitize_permissions(permissions: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for permission in permissions {
        if is_known_permission(permission) && !seen.contains(permission) {
            seen.push(permission.clone());
        }
    }
    seen
}

pub fn has_permission(claims: &Claims, permission: &str) -> bool {
    claims.permissions.iter().any(|p| p == permission)
}

pub fn has_any(claims: &Claims, permissions: &[String]) -> bool {
    permissions.iter().any(|p| has_permission(claims, p))
}

pub fn has_all(claims: &Claims, permissions: &[String]) -> bool {
    permissions.iter().all(|p| has_permission(claims, p))
}
