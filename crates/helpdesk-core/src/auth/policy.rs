//! Static tool-authorization policy tables
//!
//! Evaluated by [`Principal::can_access_tool`](crate::auth::Principal::can_access_tool)
//! in a fixed precedence order, first match wins. The tables are process-wide
//! constants; per-tenant policy belongs to the permission sets carried on the
//! Principal itself.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Role granted unrestricted access
pub const ROLE_ADMIN: &str = "admin";
/// Role granted unrestricted access
pub const ROLE_SUPER_ADMIN: &str = "super_admin";
/// Role granted broad access except highly sensitive tools
pub const ROLE_MANAGER: &str = "manager";
/// Role granted access to tools absent from the permission table
pub const ROLE_DEVELOPER: &str = "developer";
/// Baseline end-user role
pub const ROLE_USER: &str = "user";

/// Permission letting managers use highly sensitive tools
pub const PERMISSION_ADMIN_OVERRIDE: &str = "admin.override";
/// Permission granting access to tools absent from the permission table
pub const PERMISSION_TOOL_ALL: &str = "tool.all";

/// Sentinels that match any permission or scope
pub const WILDCARDS: [&str; 2] = ["*", "all"];

/// Tools that remain gated behind `admin.override` even for managers
pub static SENSITIVE_TOOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "delete_user",
        "delete_organization",
        "system_shutdown",
        "admin_override",
        "security_bypass",
    ])
});

/// Tool name → permissions that grant it (holding ANY one suffices)
pub static TOOL_PERMISSIONS: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        HashMap::from([
            (
                "create_ticket",
                &["ticket.create", "ticket.write"] as &[&str],
            ),
            ("update_ticket", &["ticket.update", "ticket.write"]),
            ("delete_ticket", &["ticket.delete"]),
            ("get_ticket", &["ticket.read"]),
            ("search_tickets", &["ticket.read", "ticket.search"]),
            ("assign_ticket", &["ticket.assign", "ticket.write"]),
            ("list_threads", &["thread.read"]),
            ("close_thread", &["thread.write"]),
            ("send_notification", &["notification.send"]),
            ("jira_create_issue", &["integration.jira"]),
            ("jira_search_issues", &["integration.jira"]),
            ("slack_post_message", &["integration.slack"]),
            ("delete_user", &["user.delete"]),
            ("delete_organization", &["organization.delete"]),
        ])
    });

/// Tools the baseline `user` role may use without explicit permissions
pub static BASIC_TOOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "create_ticket",
        "get_ticket",
        "search_tickets",
        "list_threads",
    ])
});

/// Whether a permission set contains a wildcard sentinel
pub fn has_wildcard<'a>(permissions: impl IntoIterator<Item = &'a str>) -> bool {
    permissions
        .into_iter()
        .any(|p| WILDCARDS.contains(&p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_tools_are_in_nobody_elses_reach() {
        for tool in SENSITIVE_TOOLS.iter() {
            assert!(!BASIC_TOOLS.contains(tool));
        }
    }

    #[test]
    fn test_basic_tools_are_read_or_create_only() {
        assert!(BASIC_TOOLS.contains("create_ticket"));
        assert!(!BASIC_TOOLS.contains("delete_ticket"));
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(has_wildcard(["*"]));
        assert!(has_wildcard(["ticket.read", "all"]));
        assert!(!has_wildcard(["ticket.read"]));
    }
}
