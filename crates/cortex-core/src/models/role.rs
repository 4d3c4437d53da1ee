//! Role and permission catalogue.
//!
//! Both sets are closed: the mapping from role to permissions is part
//! of the system contract, not tenant data. User-defined roles are not
//! supported.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    TenantAdmin,
    AgentManager,
    Analyst,
    Operator,
    Viewer,
    ApiUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "tenant.read")]
    TenantRead,
    #[serde(rename = "tenant.write")]
    TenantWrite,
    #[serde(rename = "user.manage")]
    UserManage,
    #[serde(rename = "agent.submit")]
    AgentSubmit,
    #[serde(rename = "agent.control")]
    AgentControl,
    #[serde(rename = "task.view.own")]
    TaskViewOwn,
    #[serde(rename = "task.view.any")]
    TaskViewAny,
    #[serde(rename = "collab.initiate")]
    CollabInitiate,
    #[serde(rename = "insight.read")]
    InsightRead,
    #[serde(rename = "cache.clear")]
    CacheClear,
    #[serde(rename = "audit.read")]
    AuditRead,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::TenantRead => "tenant.read",
            Permission::TenantWrite => "tenant.write",
            Permission::UserManage => "user.manage",
            Permission::AgentSubmit => "agent.submit",
            Permission::AgentControl => "agent.control",
            Permission::TaskViewOwn => "task.view.own",
            Permission::TaskViewAny => "task.view.any",
            Permission::CollabInitiate => "collab.initiate",
            Permission::InsightRead => "insight.read",
            Permission::CacheClear => "cache.clear",
            Permission::AuditRead => "audit.read",
        }
    }
}

pub const ALL_PERMISSIONS: &[Permission] = &[
    Permission::TenantRead,
    Permission::TenantWrite,
    Permission::UserManage,
    Permission::AgentSubmit,
    Permission::AgentControl,
    Permission::TaskViewOwn,
    Permission::TaskViewAny,
    Permission::CollabInitiate,
    Permission::InsightRead,
    Permission::CacheClear,
    Permission::AuditRead,
];

impl Role {
    /// The fixed permission set for each role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => ALL_PERMISSIONS,
            Role::TenantAdmin => &[
                Permission::TenantRead,
                Permission::TenantWrite,
                Permission::UserManage,
                Permission::AgentSubmit,
                Permission::AgentControl,
                Permission::TaskViewAny,
                Permission::CollabInitiate,
                Permission::InsightRead,
                Permission::CacheClear,
                Permission::AuditRead,
            ],
            Role::AgentManager => &[
                Permission::TenantRead,
                Permission::AgentSubmit,
                Permission::AgentControl,
                Permission::TaskViewAny,
                Permission::CollabInitiate,
                Permission::InsightRead,
            ],
            Role::Analyst => &[
                Permission::TenantRead,
                Permission::TaskViewAny,
                Permission::InsightRead,
                Permission::AuditRead,
            ],
            Role::Operator => &[
                Permission::TenantRead,
                Permission::AgentSubmit,
                Permission::AgentControl,
                Permission::TaskViewOwn,
            ],
            Role::Viewer => &[
                Permission::TenantRead,
                Permission::TaskViewOwn,
                Permission::InsightRead,
            ],
            Role::ApiUser => &[Permission::AgentSubmit, Permission::TaskViewOwn],
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::TenantAdmin => "tenant_admin",
            Role::AgentManager => "agent_manager",
            Role::Analyst => "analyst",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
            Role::ApiUser => "api_user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "tenant_admin" => Some(Role::TenantAdmin),
            "agent_manager" => Some(Role::AgentManager),
            "analyst" => Some(Role::Analyst),
            "operator" => Some(Role::Operator),
            "viewer" => Some(Role::Viewer),
            "api_user" => Some(Role::ApiUser),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_has_everything() {
        for p in ALL_PERMISSIONS {
            assert!(Role::SuperAdmin.has(*p));
        }
    }

    #[test]
    fn viewer_cannot_submit() {
        assert!(!Role::Viewer.has(Permission::AgentSubmit));
        assert!(Role::Viewer.has(Permission::TaskViewOwn));
    }

    #[test]
    fn permissions_never_attach_to_users_directly() {
        // The only path to a permission is through a role.
        assert!(Role::ApiUser.has(Permission::AgentSubmit));
        assert!(!Role::ApiUser.has(Permission::AgentControl));
        assert!(!Role::ApiUser.has(Permission::CacheClear));
    }

    #[test]
    fn role_parse_roundtrip() {
        for role in [
            Role::SuperAdmin,
            Role::TenantAdmin,
            Role::AgentManager,
            Role::Analyst,
            Role::Operator,
            Role::Viewer,
            Role::ApiUser,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn permission_serde_uses_tag_names() {
        let json = serde_json::to_string(&Permission::AgentSubmit).unwrap();
        assert_eq!(json, "\"agent.submit\"");
    }
}
