//! Route table and navigation guard.
//!
//! Mirrors the application's path-based navigation surface: each route
//! carries metadata flags (`public`, `requires_auth`, `requires_admin`), a
//! display title applied after navigation, and an active-nav hint for
//! detail pages. The guard gates every navigation on the session state.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMeta {
    pub public: bool,
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl RouteMeta {
    const PUBLIC: RouteMeta = RouteMeta {
        public: true,
        requires_auth: false,
        requires_admin: false,
    };
    const AUTH: RouteMeta = RouteMeta {
        public: false,
        requires_auth: true,
        requires_admin: false,
    };
    const ADMIN: RouteMeta = RouteMeta {
        public: false,
        requires_auth: true,
        requires_admin: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub meta: RouteMeta,
    /// Nav entry highlighted when this route is active; detail routes point
    /// back at their list page.
    pub active_nav: Option<&'static str>,
}

/// Outcome of guarding a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    RedirectToLogin,
    RedirectToDashboard,
    Forbidden,
}

const ROUTES: &[Route] = &[
    Route {
        path: "/login",
        name: "login",
        title: "Login",
        meta: RouteMeta::PUBLIC,
        active_nav: None,
    },
    Route {
        path: "/dashboard",
        name: "dashboard",
        title: "Dashboard",
        meta: RouteMeta::AUTH,
        active_nav: None,
    },
    Route {
        path: "/clients",
        name: "clients",
        title: "Clients",
        meta: RouteMeta::AUTH,
        active_nav: None,
    },
    Route {
        path: "/clients/:client_id",
        name: "client-detail",
        title: "Client Detail",
        meta: RouteMeta::AUTH,
        active_nav: Some("clients"),
    },
    Route {
        path: "/jobs",
        name: "jobs",
        title: "Jobs",
        meta: RouteMeta::AUTH,
        active_nav: None,
    },
    Route {
        path: "/jobs/:job_id",
        name: "job-detail",
        title: "Job Detail",
        meta: RouteMeta::AUTH,
        active_nav: Some("jobs"),
    },
    Route {
        path: "/reports",
        name: "reports",
        title: "Reports",
        meta: RouteMeta::AUTH,
        active_nav: None,
    },
    Route {
        path: "/timesheet",
        name: "timesheet",
        title: "Weekly Timesheet",
        meta: RouteMeta::AUTH,
        active_nav: None,
    },
    Route {
        path: "/admin",
        name: "admin",
        title: "Administration",
        meta: RouteMeta::ADMIN,
        active_nav: None,
    },
];

pub fn route_table() -> &'static [Route] {
    ROUTES
}

/// Resolves a concrete path against the route table. `:param` segments
/// match any single path segment; the bare root resolves to the dashboard.
pub fn find_route(path: &str) -> Option<&'static Route> {
    let path = if path == "/" { "/dashboard" } else { path };
    ROUTES.iter().find(|route| path_matches(route.path, path))
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p.starts_with(':') || p == s => continue,
            _ => return false,
        }
    }
}

/// Gates a navigation attempt on the current session state.
pub fn guard(route: &Route, authenticated: bool, is_admin: bool) -> NavigationDecision {
    if !route.meta.public && !authenticated {
        return NavigationDecision::RedirectToLogin;
    }
    if authenticated && route.name == "login" {
        return NavigationDecision::RedirectToDashboard;
    }
    if route.meta.requires_admin && !is_admin {
        return NavigationDecision::Forbidden;
    }
    NavigationDecision::Proceed
}

/// Document title applied after each successful navigation.
pub fn page_title(route: &Route) -> String {
    format!("{} | Timekeeper", route.title)
}
