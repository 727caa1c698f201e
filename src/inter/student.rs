/*!
Pages for students: the dashboard, the opportunity board, and finding
alumni mentors through the search service.
*/
use std::{
    collections::HashSet,
    sync::Arc,
};

use axum::{
    extract::{Extension, Form, Query},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    auth::Session,
    config::Glob,
    opportunity::{OpportunityFilter, OpportunityType},
    sourcing::{SourcedAlumni, SourcingError, SUGGESTED_PROMPTS},
};
use super::*;

#[derive(Deserialize, Debug, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// Posted from a search result card; `alumni` is the card's JSON.
#[derive(Deserialize, Debug)]
pub struct FavoriteForm {
    pub alumni: String,
    pub query: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct UnfavoriteForm {
    pub alumni_id: String,
    pub query: Option<String>,
}

/// Where to go after changing favorites: back to the search that was
/// showing, if there was one.
fn find_alumni_location(query: Option<&str>) -> String {
    match crate::blank_means_none(query) {
        Some(q) => {
            let q: String = url::form_urlencoded::byte_serialize(q.as_bytes()).collect();
            format!("/student/find-alumni?query={}", &q)
        },
        None => "/student/find-alumni".to_owned(),
    }
}

pub async fn dashboard(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("student::dashboard( {:?} ) called.", &session.email);

    let data = glob.read().await.data();
    let data = data.read().await;
    let (profile, opps, featured) = match tokio::try_join!(
        data.get_profile(session.profile_id),
        data.get_open_opportunities(Some(3)),
        data.featured_alumni(3),
    ) {
        Ok(x) => x,
        Err(e) => {
            log::error!("Error gathering student dashboard for {:?}: {}", &session.email, &e);
            return html_500();
        },
    };

    let name = match &profile {
        Some(p) => p.display_name().to_owned(),
        None => {
            log::warn!("Student {:?} is signed in with no profile.", &session.email);
            session.email.clone()
        },
    };

    let opps: Vec<Value> = opps.iter().map(opportunity_view).collect();
    let featured: Vec<Value> = featured.iter()
        .map(|p| {
            let mut v = profile_view(p);
            let card = SourcedAlumni::from_profile(p, 1.0);
            v["json"] = json!(serde_json::to_string(&card).unwrap_or_default());
            v
        })
        .collect();

    let data = json!({
        "nav": nav(&session, "/student"),
        "name": name,
        "opportunities": opps,
        "featured": featured,
    });

    serve_template(StatusCode::OK, "student_dashboard", &data, vec![])
}

pub async fn opportunities(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(filter): Query<OpportunityFilter>,
) -> Response {
    log::trace!("student::opportunities( {:?}, {:?} ) called.", &session.email, &filter);

    let opps = {
        let data = glob.read().await.data();
        let opps = data.read().await.get_open_opportunities(None).await;
        opps
    };
    let opps = match opps {
        Ok(opps) => opps,
        Err(e) => {
            log::error!("Error retrieving open opportunities: {}", &e);
            return html_500();
        },
    };

    let shown: Vec<Value> = filter.apply(&opps).into_iter()
        .map(opportunity_view)
        .collect();

    let kind = if filter.kind.is_empty() { "all" } else { filter.kind.as_str() };
    let type_options = select_options(
        std::iter::once(("all", "All types"))
            .chain(OpportunityType::ALL.iter().map(|t| (t.token(), t.label()))),
        kind
    );

    let data = json!({
        "nav": nav(&session, "/student/opportunities"),
        "search": &filter.search,
        "location": &filter.location,
        "type_options": type_options,
        "total": opps.len(),
        "opportunities": shown,
    });

    serve_template(StatusCode::OK, "student_opportunities", &data, vec![])
}

/**
Render the "find alumni" page, running a search first if `query` has
anything in it.

A failed search is shown on the page rather than failing the request.
*/
async fn find_alumni_page(
    session: &Session,
    glob: &Arc<RwLock<Glob>>,
    query: Option<&str>,
) -> Response {
    let (data_db, sourcing, alumni_domain) = {
        let glob = glob.read().await;
        (glob.data(), glob.sourcing.clone(), glob.domains.alumni.clone())
    };

    let favorites = data_db.read().await.get_favorites(session.profile_id).await;
    let favorites = match favorites {
        Ok(favs) => favs,
        Err(e) => {
            log::error!("Error retrieving favorites for {:?}: {}", &session.email, &e);
            return html_500();
        },
    };
    let favorite_ids: HashSet<&str> = favorites.iter().map(|a| a.id.as_str()).collect();

    let query = crate::blank_means_none(query);
    let mut code = StatusCode::OK;
    let mut error_message: Option<String> = None;
    let mut results: Vec<Value> = Vec::new();

    if let Some(q) = &query {
        match sourcing.search(q).await {
            Ok(found) => {
                results = found.iter()
                    .map(|a| sourced_view(a, &alumni_domain, favorite_ids.contains(a.id.as_str())))
                    .collect();
            },
            Err(e) => {
                log::warn!("Search for {:?} failed: {}", q, &e);
                if matches!(e, SourcingError::Transport(_) | SourcingError::Upstream(_)) {
                    code = StatusCode::BAD_GATEWAY;
                }
                error_message = Some(e.to_string());
            },
        }
    }

    let favorites: Vec<Value> = favorites.iter()
        .map(|a| sourced_view(a, &alumni_domain, true))
        .collect();

    let data = json!({
        "nav": nav(session, "/student/find-alumni"),
        "configured": sourcing.is_configured(),
        "prompts": SUGGESTED_PROMPTS,
        "query": &query,
        "searched": query.is_some() && error_message.is_none(),
        "results": results,
        "error_message": error_message,
        "favorites": favorites,
    });

    serve_template(code, "find_alumni", &data, vec![])
}

pub async fn find_alumni(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(q): Query<SearchQuery>,
) -> Response {
    log::trace!("student::find_alumni( {:?}, {:?} ) called.", &session.email, &q);

    find_alumni_page(&session, &glob, q.query.as_deref()).await
}

pub async fn search_alumni(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<SearchQuery>,
) -> Response {
    log::trace!("student::search_alumni( {:?}, {:?} ) called.", &session.email, &form);

    match crate::blank_means_none(form.query.as_deref()) {
        Some(q) => find_alumni_page(&session, &glob, Some(&q)).await,
        None => respond_bad_request(SourcingError::EmptyQuery.to_string()),
    }
}

pub async fn add_favorite(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<FavoriteForm>,
) -> Response {
    log::trace!("student::add_favorite( {:?}, ... ) called.", &session.email);

    let alumni: SourcedAlumni = match serde_json::from_str(&form.alumni) {
        Ok(a) => a,
        Err(e) => {
            return respond_bad_request(format!("Unable to read alumni data: {}", &e));
        },
    };

    let data = glob.read().await.data();
    if let Err(e) = data.read().await.add_favorite(session.profile_id, &alumni).await {
        log::error!(
            "Error saving favorite {:?} for {:?}: {}",
            &alumni.id, &session.email, &e
        );
        return html_500();
    }

    see_other(&find_alumni_location(form.query.as_deref()))
}

pub async fn remove_favorite(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<UnfavoriteForm>,
) -> Response {
    log::trace!("student::remove_favorite( {:?}, {:?} ) called.", &session.email, &form.alumni_id);

    let data = glob.read().await.data();
    if let Err(e) = data.read().await.remove_favorite(session.profile_id, &form.alumni_id).await {
        log::error!(
            "Error removing favorite {:?} for {:?}: {}",
            &form.alumni_id, &session.email, &e
        );
        return html_500();
    }

    see_other(&find_alumni_location(form.query.as_deref()))
}
