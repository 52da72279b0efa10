//! Password login page.

use askama::Template;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    /// Original query string with its leading `?`, so the POST sees the same parameters.
    query: String,
    client_id: Option<&'a str>,
}

/// Render the login form for an authorization request carried in `query`.
pub fn render_login(query: Option<&str>, client_id: Option<&str>) -> Result<String, askama::Error> {
    let query = match query {
        Some(q) if !q.is_empty() => format!("?{q}"),
        _ => String::new(),
    };
    LoginTemplate { query, client_id }.render()
}
