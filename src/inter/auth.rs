/*!
Signing up, logging in, and logging out.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Query},
    http::header::{self, HeaderMap},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    auth::AuthResult,
    config::Glob,
    gate,
    user::{Profile, SignupData},
};
use super::*;

/// Data type to read the form data from a login request.
#[derive(Deserialize, Debug)]
pub struct LoginData {
    pub email: String,
    pub password: String,
    pub redirect: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

fn login_form(code: StatusCode, email: &str, redirect: Option<&str>, error: Option<&str>) -> Response {
    let data = json!({
        "email": email,
        "redirect": redirect.and_then(gate::sanitize_redirect),
        "error_message": error,
    });

    serve_template(code, "login", &data, vec![])
}

pub fn respond_bad_password(email: &str, redirect: Option<&str>) -> Response {
    log::trace!("respond_bad_password( {:?} ) called.", email);

    login_form(
        StatusCode::UNAUTHORIZED,
        email,
        redirect,
        Some("Invalid email or password.")
    )
}

fn signup_form(code: StatusCode, full_name: &str, email: &str, error: Option<&str>) -> Response {
    let data = json!({
        "full_name": full_name,
        "email": email,
        "error_message": error,
    });

    serve_template(code, "signup", &data, vec![])
}

pub async fn login_page(Query(q): Query<LoginQuery>) -> Response {
    log::trace!("login_page( {:?} ) called.", &q);

    login_form(StatusCode::OK, "", q.redirect.as_deref(), None)
}

pub async fn signup_page() -> Response {
    log::trace!("signup_page() called.");

    signup_form(StatusCode::OK, "", "", None)
}

/// Start a session for `p` and send them on to `destination` with the
/// cookie set.
async fn start_session(glob: &Arc<RwLock<Glob>>, p: &Profile, destination: &str) -> Response {
    let (sessions, ttl) = {
        let mut glob = glob.write().await;
        glob.purge_expired().await;
        (glob.sessions(), glob.session_ttl)
    };
    let key = sessions.write().await.issue(p, ttl);
    log::info!("{} {:?} signed in.", &p.role, &p.email);

    let mut r = see_other(destination);
    match super::session_cookie(&key, ttl) {
        Some(cookie) => { r.headers_mut().append(header::SET_COOKIE, cookie); },
        None => {
            log::error!("Unable to make a cookie header from session key {:?}.", &key);
            return html_500();
        },
    }
    r
}

pub async fn login(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<LoginData>,
) -> Response {
    log::trace!("login( {:?}, [ password ] ) called.", &form.email);

    let email = form.email.trim();
    let redirect = form.redirect.as_deref();

    let auth_response = {
        glob.read().await.auth().read().await.check_password(
            email,
            &form.password
        ).await
    };

    match auth_response {
        Err(e) => {
            log::error!("auth::Db::check_password( {:?}, ... ) returned error: {}", email, &e);
            return html_500();
        },
        Ok(AuthResult::Ok) => { /* Good; carry on. */ },
        Ok(AuthResult::BadPassword) | Ok(AuthResult::NoSuchUser) => {
            return respond_bad_password(email, redirect);
        },
    }

    let profile = {
        glob.read().await.data().read().await.get_profile_by_email(email).await
    };
    let profile = match profile {
        Err(e) => {
            log::error!("Error retrieving profile for {:?}: {}", email, &e);
            return html_500();
        },
        Ok(None) => {
            log::warn!("{:?} has credentials but no profile.", email);
            return respond_bad_password(email, redirect);
        },
        Ok(Some(p)) => p,
    };

    let destination = gate::login_destination(
        profile.role,
        profile.onboarding_complete,
        redirect
    );
    start_session(&glob, &profile, &destination).await
}

pub async fn signup(
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<SignupData>,
) -> Response {
    log::trace!("signup( {:?}, {:?}, [ passwords ] ) called.", &form.full_name, &form.email);

    let (domains, min_len) = {
        let glob = glob.read().await;
        (glob.domains.clone(), glob.min_password_length)
    };

    let np = match form.validate(&domains, min_len) {
        Ok(np) => np,
        Err(msg) => {
            return signup_form(StatusCode::BAD_REQUEST, &form.full_name, &form.email, Some(&msg));
        },
    };

    let (auth_db, data_db) = {
        let glob = glob.read().await;
        (glob.auth(), glob.data())
    };

    match data_db.read().await.get_profile_by_email(&np.email).await {
        Err(e) => {
            log::error!("Error checking for existing profile {:?}: {}", &np.email, &e);
            return html_500();
        },
        Ok(Some(_)) => {
            return signup_form(
                StatusCode::BAD_REQUEST,
                &form.full_name,
                &form.email,
                Some("An account with this email already exists. Try logging in.")
            );
        },
        Ok(None) => {},
    }

    let profile = match data_db.read().await.insert_profile(&np).await {
        Ok(p) => p,
        Err(e) => {
            log::error!("Error inserting profile {:?}: {}", &np, &e);
            return html_500();
        },
    };

    if let Err(e) = auth_db.read().await.add_user(&profile.email, &form.password).await {
        log::error!("Error adding credentials for {:?}: {}", &profile.email, &e);
        if let Err(e) = data_db.read().await.delete_profile(&profile.email).await {
            log::error!("Also unable to remove orphaned profile {:?}: {}", &profile.email, &e);
        }
        return html_500();
    }

    start_session(&glob, &profile, gate::signup_destination(profile.role)).await
}

pub async fn logout(
    headers: HeaderMap,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("logout() called.");

    if let Some(key) = session_key(&headers) {
        let sessions = glob.read().await.sessions();
        let revoked = sessions.write().await.revoke(&key);
        if let Some(s) = revoked {
            log::info!("{:?} signed out.", &s.email);
            glob.write().await.purge_expired().await;
        }
    }

    let mut r = see_other("/");
    r.headers_mut().append(header::SET_COOKIE, clear_session_cookie());
    r
}
