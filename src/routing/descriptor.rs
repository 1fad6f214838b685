use serde::Serialize;

pub const HOME_ROUTE: &str = "/";
pub const SIGN_IN_ROUTE: &str = "/FireLogin";
/// Query parameter carrying the originally requested path to the sign-in page.
pub const RETURN_PARAM: &str = "redirect";

/// Access requirement attached to a route. A role requirement also demands a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Access {
    pub requires_auth: bool,
    pub role: Option<String>,
}

impl Access {
    pub fn public() -> Self { Self::default() }

    pub fn signed_in() -> Self { Self { requires_auth: true, role: None } }

    pub fn role<S: Into<String>>(role: S) -> Self { Self { requires_auth: true, role: Some(role.into()) } }

    pub fn needs_principal(&self) -> bool {
        self.requires_auth || self.role.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescriptor {
    pub path: String,
    pub name: String,
    pub view: String,
    pub access: Access,
}

impl RouteDescriptor {
    pub fn new(path: &str, name: &str, view: &str, access: Access) -> Self {
        Self { path: path.to_string(), name: name.to_string(), view: view.to_string(), access }
    }
}

/// Immutable route list plus the two redirect targets.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    pub sign_in: String,
    pub home: String,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes, sign_in: SIGN_IN_ROUTE.to_string(), home: HOME_ROUTE.to_string() }
    }

    /// Pages served by the portal frontend.
    pub fn portal() -> Self {
        Self::new(vec![
            RouteDescriptor::new("/", "Home", "HomeView", Access::public()),
            RouteDescriptor::new("/about", "About", "AboutView", Access::public()),
            RouteDescriptor::new("/FireLogin", "FireLogin", "FirebaseSigninView", Access::public()),
            RouteDescriptor::new("/FireRegister", "FireRegister", "FirebaseRegisterView", Access::public()),
            RouteDescriptor::new("/admin", "Admin", "AdminView", Access::role("admin")),
            RouteDescriptor::new("/addbook", "AddBook", "AddBookView", Access::public()),
            RouteDescriptor::new("/GetBookCount", "GetBookCount", "GetBookCountView", Access::public()),
            RouteDescriptor::new("/BooksTable", "BooksTable", "BooksTableView", Access::public()),
            RouteDescriptor::new("/AuthorsTable", "AuthorsTable", "AuthorsTableView", Access::public()),
            RouteDescriptor::new("/Geo", "Geo", "GeoLocationView", Access::public()),
            RouteDescriptor::new("/Email", "Email", "EmailView", Access::public()),
        ])
    }

    /// Find the route for a request path. Query and fragment are ignored, matching is
    /// case-insensitive and tolerates one trailing slash.
    pub fn resolve(&self, full_path: &str) -> Option<&RouteDescriptor> {
        let path = path_only(full_path);
        self.routes.iter().find(|r| r.path.eq_ignore_ascii_case(path))
    }
}

fn path_only(full_path: &str) -> &str {
    let end = full_path.find(|c| c == '?' || c == '#').unwrap_or(full_path.len());
    let p = &full_path[..end];
    if p.len() > 1 { p.strip_suffix('/').unwrap_or(p) } else if p.is_empty() { "/" } else { p }
}
