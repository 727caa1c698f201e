/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `auth` and `store`.)
*/
use std::{
    fmt::Debug,
    path::Path,
    sync::Arc,
};

use axum::{
    extract::{Extension, Request},
    http::{header, StatusCode},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use handlebars::Handlebars;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::services::ServeDir;

use crate::{
    announcement::Announcement,
    auth::Session,
    config::Glob,
    donation::{self, Donation},
    event::{Event, RsvpStatus},
    gate::{self, Verdict},
    opportunity::Opportunity,
    sourcing::SourcedAlumni,
    user::{Profile, Role},
    DATE_FMT, DATETIME_FMT,
};

pub mod admin;
pub mod alumni;
pub mod auth;
pub mod student;

pub const SESSION_COOKIE: &str = "alma-session";

static TEMPLATES: OnceCell<Handlebars> = OnceCell::new();

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>alma | Error</title>
<link rel="stylesheet" href="/static/alma.css">
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
<p>Something went wrong on our end. No further or more
helpful information is available about the problem.</p>
</body>
</html>"#;

trait AddHeaders: IntoResponse + Sized {
    fn add_headers(self, mut new_headers: Vec<(HeaderName, HeaderValue)>) -> Response {
        let mut r = self.into_response();
        let r_headers = r.headers_mut();
        for (name, value) in new_headers.drain(..) {
            r_headers.append(name, value);
        }

        r
    }
}

impl<T: IntoResponse + Sized> AddHeaders for T {}

/**
Initializes the resources used in this module. This function should be called
before any functionality of this module or any of its submodules is used.

Currently the only thing that happens here is loading the templates used by
`serve_template()`.

The argument is the path to the directory where the templates used by
`serve_template()` can be found.
*/
pub fn init<P: AsRef<Path>>(template_dir: P) -> Result<(), String> {
    if TEMPLATES.get().is_some() {
        log::warn!("Templates directory already initialized; ignoring.");
        return Ok(())
    }

    let template_dir = template_dir.as_ref();

    let mut h = Handlebars::new();
    #[cfg(debug_assertions)]
    h.set_dev_mode(true);
    h.register_templates_directory(".html", template_dir)
        .map_err(|e| format!(
            "Error registering templates directory {}: {}",
            template_dir.display(), &e
        ))?;

    TEMPLATES.set(h)
        .map_err(|old_h| {
            let mut estr = String::from("Templates directory already registered w/templates:");
            for template_name in old_h.get_templates().keys() {
                estr.push('\n');
                estr.push_str(template_name.as_str());
            }
            estr
        })?;

    Ok(())
}

/**
Return an HTML response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)
*/
pub fn html_500() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(HTML_500)
    ).into_response()
}

pub fn serve_template<S>(
    code: StatusCode,
    template_name: &str,
    data: &S,
    addl_headers: Vec<(HeaderName, HeaderValue)>
) -> Response
where
    S: Serialize + Debug
{
    log::trace!("serve_template( {}, {:?}, ... ) called.", &code, template_name);

    let templates = match TEMPLATES.get() {
        Some(t) => t,
        None => {
            log::error!("serve_template() called before inter::init().");
            return html_500();
        },
    };

    match templates.render(template_name, data) {
        Ok(response_body) => (
            code,
            Html(response_body)
        ).add_headers(addl_headers),
        Err(e) => {
            log::error!(
                "Error rendering template {:?} with data {:?}:\n{}",
                template_name, data, &e
            );
            html_500()
        },
    }
}

pub fn respond_bad_request(msg: String) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", &msg);

    (
        StatusCode::BAD_REQUEST,
        msg
    ).into_response()
}

pub fn respond_not_found(what: &str) -> Response {
    log::trace!("respond_not_found( {:?} ) called.", what);

    serve_template(
        StatusCode::NOT_FOUND,
        "not_found",
        &json!({ "what": what }),
        vec![]
    )
}

/// A `303 See Other` to `to`.
pub fn see_other(to: &str) -> Response {
    Redirect::to(to).into_response()
}

/// The value of our session cookie in `headers`, if there is one.
pub fn session_key(headers: &HeaderMap) -> Option<String> {
    for val in headers.get_all(header::COOKIE).iter() {
        let val = match val.to_str() {
            Ok(s) => s,
            Err(_) => { continue; },
        };
        for pair in val.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == SESSION_COOKIE && !value.is_empty() {
                    return Some(value.to_owned());
                }
            }
        }
    }

    None
}

fn session_cookie(key: &str, max_age: std::time::Duration) -> Option<HeaderValue> {
    let s = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, key, max_age.as_secs()
    );
    HeaderValue::from_str(&s).ok()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("alma-session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Look up whoever's session cookie came with `headers`.
pub async fn current_session(headers: &HeaderMap, glob: &Arc<RwLock<Glob>>) -> Option<Session> {
    let key = session_key(headers)?;
    let sessions = glob.read().await.sessions();
    let session = sessions.write().await.get(&key);
    session
}

/**
Middleware that runs every request past `gate::check()`.

Requests that may proceed get the requester's `Session` (if any) added to
their extensions for the handlers to pick up.
*/
pub async fn gate_middleware(mut req: Request, next: Next) -> Response {
    let glob: Arc<RwLock<Glob>> = match req.extensions().get::<Arc<RwLock<Glob>>>() {
        Some(glob) => glob.clone(),
        None => {
            log::error!("gate_middleware(): no global state in request extensions.");
            return html_500();
        },
    };

    let path = req.uri().path().to_owned();
    let session = current_session(req.headers(), &glob).await;
    let domains = glob.read().await.domains.clone();

    let verdict = gate::check(
        &path,
        session.as_ref().map(|s| s.viewer()).as_ref(),
        &domains
    );

    match verdict {
        Verdict::Redirect(to) => {
            log::debug!("Gate redirects {:?} to {:?}.", &path, &to);
            see_other(&to)
        },
        Verdict::Proceed => {
            if let Some(session) = session {
                req.extensions_mut().insert(session);
            }
            next.run(req).await
        },
    }
}

/// Sidebar links for each role.
fn nav_links(role: Role) -> &'static [(&'static str, &'static str)] {
    match role {
        Role::Student => &[
            ("/student", "Dashboard"),
            ("/student/opportunities", "Opportunity Board"),
            ("/student/find-alumni", "Find Alumni"),
        ],
        Role::Alumni => &[
            ("/alumni", "Dashboard"),
            ("/alumni/opportunities", "Opportunity Board"),
            ("/alumni/announcements", "Announcements"),
            ("/alumni/donate", "Donate"),
            ("/alumni/events", "Events"),
            ("/alumni/profile", "My Profile"),
        ],
        Role::Admin => &[
            ("/admin", "Dashboard"),
            ("/admin/opportunities", "Opportunities"),
            ("/admin/announcements", "Announcements"),
            ("/admin/events", "Events"),
            ("/admin/donations", "Donations"),
            ("/admin/users", "Users"),
        ],
    }
}

/// Template data for the navigation partial, with the link for `current`
/// marked active.
pub(crate) fn nav(session: &Session, current: &str) -> Value {
    let links: Vec<Value> = nav_links(session.role).iter()
        .map(|(href, label)| json!({
            "href": href,
            "label": label,
            "active": *href == current,
        }))
        .collect();

    json!({
        "email": &session.email,
        "role": session.role.to_string(),
        "role_label": session.role.label(),
        "dashboard": session.role.dashboard(),
        "links": links,
    })
}

/// `<option>`s for a `<select>`, with `selected` marked.
pub(crate) fn select_options<'a, I>(pairs: I, selected: &str) -> Vec<Value>
where
    I: Iterator<Item = (&'a str, &'a str)>
{
    pairs.map(|(value, label)| json!({
        "value": value,
        "label": label,
        "selected": value == selected,
    })).collect()
}

fn fmt_date(d: time::OffsetDateTime) -> String {
    d.format(DATE_FMT).unwrap_or_default()
}

pub(crate) fn opportunity_view(o: &Opportunity) -> Value {
    json!({
        "id": o.id,
        "title": &o.title,
        "description": &o.description,
        "type": o.kind.token(),
        "type_label": o.kind.label(),
        "company": &o.company,
        "location": &o.location,
        "is_remote": o.is_remote,
        "link": &o.link,
        "tags": &o.tags,
        "status": o.status.label(),
        "author_name": &o.author_name,
        "posted": fmt_date(o.created_at),
    })
}

pub(crate) fn event_view(e: &Event, rsvp: Option<RsvpStatus>) -> Value {
    json!({
        "id": e.id,
        "title": &e.title,
        "description": &e.description,
        "event_type": e.event_type.label(),
        "date": e.date.format(DATETIME_FMT).unwrap_or_default(),
        "location": &e.location,
        "is_virtual": e.is_virtual,
        "virtual_link": &e.virtual_link,
        "max_attendees": e.max_attendees,
        "status": e.status.token(),
        "status_label": e.status.label(),
        "is_pending": e.status == crate::event::EventStatus::Pending,
        "is_approved": e.status == crate::event::EventStatus::Approved,
        "admin_notes": &e.admin_notes,
        "organizer_name": &e.organizer_name,
        "requested": fmt_date(e.created_at),
        "rsvp": rsvp.map(|r| r.label()),
    })
}

pub(crate) fn announcement_view(a: &Announcement) -> Value {
    json!({
        "id": a.id,
        "title": &a.title,
        "content": &a.content,
        "audience": a.audience.label(),
        "pinned": a.pinned,
        "author_name": &a.author_name,
        "posted": fmt_date(a.created_at),
    })
}

pub(crate) fn donation_view(d: &Donation) -> Value {
    json!({
        "id": d.id,
        "amount": donation::dollars(d.amount),
        "purpose": d.purpose.label(),
        "message": &d.message,
        "is_anonymous": d.is_anonymous,
        "donor": d.donor_label(),
        "given": fmt_date(d.created_at),
    })
}

pub(crate) fn profile_view(p: &Profile) -> Value {
    json!({
        "id": p.id,
        "email": &p.email,
        "name": p.display_name(),
        "initials": p.initials(),
        "role": p.role.to_string(),
        "role_label": p.role.label(),
        "onboarding_complete": p.onboarding_complete,
        "graduation_year": p.graduation_year,
        "major": &p.major,
        "location": &p.location,
        "current_title": &p.current_title,
        "current_company": &p.current_company,
        "headline": p.headline(),
        "industry": &p.industry,
        "skills": &p.skills,
        "linkedin_url": &p.linkedin_url,
        "open_to_mentor": p.open_to_mentor,
        "open_to_contact": p.open_to_contact,
        "bio": &p.bio,
        "joined": fmt_date(p.created_at),
    })
}

pub(crate) fn sourced_view(a: &SourcedAlumni, alumni_domain: &str, favorite: bool) -> Value {
    json!({
        "id": &a.id,
        "full_name": &a.full_name,
        "headline": &a.headline,
        "current_title": &a.current_title,
        "current_company": &a.current_company,
        "location": &a.location,
        "about": &a.about_snippet,
        "skills": a.card_skills(),
        "linkedin_url": &a.linkedin_url,
        "photo": &a.photo,
        "email": a.mock_email(alumni_domain),
        "favorite": favorite,
        // Round-tripped through a hidden form field when saving a favorite.
        "json": serde_json::to_string(a).unwrap_or_default(),
    })
}

async fn landing(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("landing() called.");

    let session = current_session(&headers, &glob).await;
    let data = json!({
        "signed_in": session.is_some(),
        "dashboard": session.as_ref().map(|s| s.role.dashboard()),
    });

    serve_template(StatusCode::OK, "index", &data, vec![])
}

/// The whole application.
pub fn router<P: AsRef<Path>>(glob: Arc<RwLock<Glob>>, static_dir: P) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/signup", get(auth::signup_page).post(auth::signup))
        .route("/logout", post(auth::logout))
        .route("/student", get(student::dashboard))
        .route("/student/opportunities", get(student::opportunities))
        .route("/student/find-alumni", get(student::find_alumni).post(student::search_alumni))
        .route("/student/favorites", post(student::add_favorite))
        .route("/student/favorites/remove", post(student::remove_favorite))
        .route("/alumni", get(alumni::dashboard))
        .route("/alumni/onboarding", get(alumni::onboarding).post(alumni::onboarding_step))
        .route("/alumni/opportunities", get(alumni::opportunities).post(alumni::post_opportunity))
        .route("/alumni/announcements", get(alumni::announcements).post(alumni::post_announcement))
        .route("/alumni/events", get(alumni::events).post(alumni::request_event))
        .route("/alumni/events/:id/rsvp", post(alumni::rsvp))
        .route("/alumni/donate", get(alumni::donate_page).post(alumni::donate))
        .route("/alumni/profile", get(alumni::profile))
        .route("/admin", get(admin::dashboard))
        .route("/admin/opportunities", get(admin::opportunities))
        .route("/admin/announcements", get(admin::announcements).post(admin::post_announcement))
        .route("/admin/announcements/:id/pin", post(admin::toggle_pin))
        .route("/admin/events", get(admin::events))
        .route("/admin/events/:id/review", post(admin::review_event))
        .route("/admin/donations", get(admin::donations))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/:id", get(admin::user_detail))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(middleware::from_fn(gate_middleware))
        .layer(Extension(glob))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Cfg;
    use crate::tests::ensure_logging;
    use crate::user::tests::profile;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// An app with no working database behind it.
    pub fn test_app() -> (Router, Arc<RwLock<Glob>>) {
        ensure_logging();
        init("templates").unwrap();

        let mut cfg = Cfg::default();
        cfg.data_db_connect_string = "host=localhost port=1 user=nobody dbname=nothing".to_owned();
        cfg.auth_db_connect_string = cfg.data_db_connect_string.clone();
        let glob = Arc::new(RwLock::new(Glob::new(&cfg).unwrap()));
        (router(glob.clone(), "static"), glob)
    }

    /// Sign in `p` directly, returning a `Cookie` header value.
    pub async fn sign_in(glob: &Arc<RwLock<Glob>>, p: &Profile) -> String {
        let sessions = glob.read().await.sessions();
        let key = sessions.write().await.issue(p, std::time::Duration::from_secs(60));
        format!("{}={}", SESSION_COOKIE, key)
    }

    pub fn location(r: &Response) -> Option<&str> {
        r.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    pub async fn body_string(r: Response) -> String {
        let bytes = r.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn get_page(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().uri(uri);
        if let Some(c) = cookie {
            b = b.header(header::COOKIE, c);
        }
        b.body(Body::empty()).unwrap()
    }

    pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut b = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            b = b.header(header::COOKIE, c);
        }
        b.body(Body::from(body.to_owned())).unwrap()
    }

    #[test]
    fn cookies() {
        let mut h = HeaderMap::new();
        assert_eq!(session_key(&h), None);
        h.append(header::COOKIE, HeaderValue::from_static("theme=dark; alma-session=abc123"));
        assert_eq!(session_key(&h).as_deref(), Some("abc123"));

        let mut h = HeaderMap::new();
        h.append(header::COOKIE, HeaderValue::from_static("alma-session="));
        assert_eq!(session_key(&h), None);
    }

    #[tokio::test]
    async fn anonymous_visitors() {
        let (app, _) = test_app();

        let r = app.clone().oneshot(get_page("/", None)).await.unwrap();
        assert_eq!(r.status(), StatusCode::OK);

        let r = app.clone().oneshot(get_page("/login", None)).await.unwrap();
        assert_eq!(r.status(), StatusCode::OK);
        assert!(body_string(r).await.contains("name=\"password\""));

        let r = app.clone().oneshot(get_page("/student", None)).await.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&r), Some("/login?redirect=%2Fstudent"));

        let r = app.clone().oneshot(get_page("/admin/users/3", Some("alma-session=forged"))).await.unwrap();
        assert_eq!(location(&r), Some("/login?redirect=%2Fadmin%2Fusers%2F3"));
    }

    #[tokio::test]
    async fn gate_redirects_signed_in_users() {
        let (app, glob) = test_app();

        let grad = profile(1, "grad@alum.fisk.edu", Role::Alumni, false);
        let cookie = sign_in(&glob, &grad).await;

        let r = app.clone().oneshot(get_page("/alumni", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/alumni/onboarding"));
        let r = app.clone().oneshot(get_page("/alumni/donate", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/alumni/onboarding"));
        let r = app.clone().oneshot(get_page("/student/find-alumni", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/alumni"));
        let r = app.clone().oneshot(get_page("/admin", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/alumni"));

        // The wizard itself is reachable.
        let r = app.clone().oneshot(get_page("/alumni/onboarding", Some(&cookie))).await.unwrap();
        assert_eq!(r.status(), StatusCode::OK);
        assert!(body_string(r).await.contains("Graduation year"));

        let kid = profile(2, "kid@my.fisk.edu", Role::Student, true);
        let cookie = sign_in(&glob, &kid).await;
        let r = app.clone().oneshot(get_page("/alumni/events", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/student"));

        // A profile whose role disagrees with its admin-domain email.
        let odd = profile(3, "odd@fisk.edu", Role::Student, true);
        let cookie = sign_in(&glob, &odd).await;
        let r = app.clone().oneshot(get_page("/admin", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/login"));
    }

    #[tokio::test]
    async fn static_files() {
        let (app, _) = test_app();
        let r = app.oneshot(get_page("/static/alma.css", None)).await.unwrap();
        assert_eq!(r.status(), StatusCode::OK);
    }

    #[test]
    fn options() {
        let opts = select_options(
            crate::opportunity::OpportunityType::ALL.iter().map(|t| (t.token(), t.label())),
            "research"
        );
        assert_eq!(opts.len(), 6);
        assert_eq!(opts[2]["selected"], true);
        assert_eq!(opts[0]["selected"], false);
    }
}
