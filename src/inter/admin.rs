/*!
Pages for administrators: site-wide numbers, moderation of events, pinning
announcements, and the user directory.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Form, Path, Query},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    announcement::{AnnouncementForm, Audience, NewAnnouncement},
    auth::Session,
    config::Glob,
    donation,
    event::{self, EventStatus, Review, ReviewForm},
    user::{Profile, Role},
};
use super::*;

#[derive(Deserialize, Debug, Default)]
pub struct StatusFilter {
    #[serde(default)]
    pub status: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct RoleFilter {
    #[serde(default)]
    pub role: String,
}

/// `None` means everybody.
fn parse_role_filter(s: &str) -> Result<Option<Role>, String> {
    match s.trim() {
        "" | "all" => Ok(None),
        x => x.parse().map(Some),
    }
}

/// Labelled values for the user detail page; blank fields are left out.
fn detail_fields(p: &Profile) -> Vec<Value> {
    let year = p.graduation_year.map(|y| y.to_string());
    let skills = if p.skills.is_empty() { None } else { Some(p.skills.join(", ")) };
    let yes_no = |b: bool| (if b { "Yes" } else { "No" }).to_owned();

    let mut fields: Vec<(&str, Option<String>)> = vec![
        ("Email", Some(p.email.clone())),
        ("Role", Some(p.role.label().to_owned())),
        ("Graduation year", year),
        ("Major", p.major.clone()),
        ("Location", p.location.clone()),
        ("Current title", p.current_title.clone()),
        ("Current company", p.current_company.clone()),
        ("Industry", p.industry.clone()),
        ("Skills", skills),
        ("LinkedIn", p.linkedin_url.clone()),
        ("Bio", p.bio.clone()),
    ];
    if p.role == Role::Alumni {
        fields.push(("Onboarding complete", Some(yes_no(p.onboarding_complete))));
        fields.push(("Open to mentoring", Some(yes_no(p.open_to_mentor))));
        fields.push(("Open to contact", Some(yes_no(p.open_to_contact))));
    }
    fields.push(("Joined", Some(fmt_date(p.created_at))));

    fields.into_iter()
        .filter_map(|(label, value)| {
            value.filter(|v| !v.trim().is_empty())
                .map(|v| json!({ "label": label, "value": v }))
        })
        .collect()
}

pub async fn dashboard(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("admin::dashboard( {:?} ) called.", &session.email);

    let data = glob.read().await.data();
    let stats = data.read().await.admin_stats().await;
    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("Error gathering admin dashboard numbers: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "nav": nav(&session, "/admin"),
        "stats": &stats,
        "donation_total": donation::dollars(stats.donation_total),
    });

    serve_template(StatusCode::OK, "admin_dashboard", &data, vec![])
}

pub async fn opportunities(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("admin::opportunities( {:?} ) called.", &session.email);

    let data = glob.read().await.data();
    let opps = data.read().await.get_opportunities().await;
    let opps = match opps {
        Ok(opps) => opps,
        Err(e) => {
            log::error!("Error retrieving opportunities: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "nav": nav(&session, "/admin/opportunities"),
        "opportunities": opps.iter().map(opportunity_view).collect::<Vec<_>>(),
    });

    serve_template(StatusCode::OK, "admin_opportunities", &data, vec![])
}

async fn announcements_page(
    session: &Session,
    glob: &Arc<RwLock<Glob>>,
    code: StatusCode,
    form: Value,
    error: Option<&str>,
) -> Response {
    let data = glob.read().await.data();
    let anns = data.read().await.get_announcements().await;
    let anns = match anns {
        Ok(anns) => anns,
        Err(e) => {
            log::error!("Error retrieving announcements: {}", &e);
            return html_500();
        },
    };

    let selected = form.get("audience").and_then(|v| v.as_str()).unwrap_or("all").to_owned();
    let data = json!({
        "nav": nav(session, "/admin/announcements"),
        "announcements": anns.iter().map(announcement_view).collect::<Vec<_>>(),
        "audience_options": select_options(
            Audience::ALL.iter().map(|a| (a.token(), a.label())),
            &selected
        ),
        "form": form,
        "error_message": error,
    });

    serve_template(code, "admin_announcements", &data, vec![])
}

pub async fn announcements(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("admin::announcements( {:?} ) called.", &session.email);

    announcements_page(&session, &glob, StatusCode::OK, json!({}), None).await
}

pub async fn post_announcement(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<AnnouncementForm>,
) -> Response {
    log::trace!("admin::post_announcement( {:?}, {:?} ) called.", &session.email, &form);

    let n = match NewAnnouncement::from_form(&form) {
        Ok(n) => n,
        Err(msg) => {
            let echo = json!({
                "title": &form.title,
                "content": &form.content,
                "audience": &form.audience,
            });
            return announcements_page(&session, &glob, StatusCode::BAD_REQUEST, echo, Some(&msg)).await;
        },
    };

    let data = glob.read().await.data();
    let res = data.read().await.insert_announcement(session.profile_id, &n).await;
    match res {
        Ok(a) => {
            log::info!("{:?} announced {:?} to {}.", &session.email, &a.title, &a.audience);
            see_other("/admin/announcements")
        },
        Err(e) => {
            log::error!("Error inserting announcement {:?}: {}", &n, &e);
            html_500()
        },
    }
}

pub async fn toggle_pin(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Path(id): Path<i64>,
) -> Response {
    log::trace!("admin::toggle_pin( {:?}, {} ) called.", &session.email, id);

    let data = glob.read().await.data();
    let res = data.read().await.toggle_announcement_pin(id).await;
    match res {
        Ok(pinned) => {
            log::debug!("Announcement {} pinned: {}", id, pinned);
            see_other("/admin/announcements")
        },
        Err(e) => {
            log::error!("Error toggling pin on announcement {}: {}", id, &e);
            html_500()
        },
    }
}

pub async fn events(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(filter): Query<StatusFilter>,
) -> Response {
    log::trace!("admin::events( {:?}, {:?} ) called.", &session.email, &filter);

    let status = match filter.status.trim() {
        "" => "all",
        x => x,
    };
    if status != "all" {
        if let Err(e) = status.parse::<EventStatus>() {
            return respond_bad_request(e);
        }
    }

    let data = glob.read().await.data();
    let evts = data.read().await.get_events_newest().await;
    let evts = match evts {
        Ok(evts) => evts,
        Err(e) => {
            log::error!("Error retrieving events: {}", &e);
            return html_500();
        },
    };

    let pending = evts.iter().filter(|e| e.status == EventStatus::Pending).count();
    let shown: Vec<Value> = evts.iter()
        .filter(|e| event::status_matches(status, e.status))
        .map(|e| event_view(e, None))
        .collect();

    let data = json!({
        "nav": nav(&session, "/admin/events"),
        "status_options": select_options(
            std::iter::once(("all", "All"))
                .chain(EventStatus::ALL.iter().map(|s| (s.token(), s.label()))),
            status
        ),
        "pending": pending,
        "events": shown,
    });

    serve_template(StatusCode::OK, "admin_events", &data, vec![])
}

pub async fn review_event(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Path(id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Response {
    log::trace!("admin::review_event( {:?}, {}, {:?} ) called.", &session.email, id, &form);

    let review = match Review::from_form(&form) {
        Ok(r) => r,
        Err(e) => { return respond_bad_request(e); },
    };

    let data = glob.read().await.data();
    let data = data.read().await;

    match data.get_event(id).await {
        Err(e) => {
            log::error!("Error retrieving event {}: {}", id, &e);
            return html_500();
        },
        Ok(None) => { return respond_not_found("event"); },
        Ok(Some(e)) if e.status != EventStatus::Pending => {
            return respond_bad_request(format!(
                "Event {:?} has already been {}.", &e.title, e.status.token()
            ));
        },
        Ok(Some(_)) => {},
    }

    if let Err(e) = data.review_event(id, &review).await {
        log::error!("Error recording review {:?} of event {}: {}", &review, id, &e);
        return html_500();
    }
    log::info!("{:?} marked event {} {}.", &session.email, id, &review.decision);

    see_other("/admin/events")
}

pub async fn donations(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("admin::donations( {:?} ) called.", &session.email);

    let data = glob.read().await.data();
    let dons = data.read().await.get_donations().await;
    let dons = match dons {
        Ok(dons) => dons,
        Err(e) => {
            log::error!("Error retrieving donations: {}", &e);
            return html_500();
        },
    };

    let data = json!({
        "nav": nav(&session, "/admin/donations"),
        "donations": dons.iter().map(donation_view).collect::<Vec<_>>(),
        "count": dons.len(),
        "total": donation::dollars(donation::total(&dons)),
    });

    serve_template(StatusCode::OK, "admin_donations", &data, vec![])
}

pub async fn users(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(filter): Query<RoleFilter>,
) -> Response {
    log::trace!("admin::users( {:?}, {:?} ) called.", &session.email, &filter);

    let role = match parse_role_filter(&filter.role) {
        Ok(role) => role,
        Err(e) => { return respond_bad_request(e); },
    };

    let data = glob.read().await.data();
    let profiles = data.read().await.get_profiles().await;
    let profiles = match profiles {
        Ok(profiles) => profiles,
        Err(e) => {
            log::error!("Error retrieving profiles: {}", &e);
            return html_500();
        },
    };

    let shown: Vec<Value> = profiles.iter()
        .filter(|p| role.map(|r| p.role == r).unwrap_or(true))
        .map(profile_view)
        .collect();
    let selected = role.map(|r| r.token()).unwrap_or("all");

    let data = json!({
        "nav": nav(&session, "/admin/users"),
        "role_options": select_options(
            std::iter::once(("all", "All roles"))
                .chain(Role::ALL.iter().map(|r| (r.token(), r.label()))),
            selected
        ),
        "total": profiles.len(),
        "users": shown,
    });

    serve_template(StatusCode::OK, "admin_users", &data, vec![])
}

pub async fn user_detail(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Path(id): Path<i64>,
) -> Response {
    log::trace!("admin::user_detail( {:?}, {} ) called.", &session.email, id);

    let data = glob.read().await.data();
    let p = data.read().await.get_profile(id).await;
    let p = match p {
        Ok(Some(p)) => p,
        Ok(None) => { return respond_not_found("user"); },
        Err(e) => {
            log::error!("Error retrieving profile {}: {}", id, &e);
            return html_500();
        },
    };

    let data = json!({
        "nav": nav(&session, "/admin/users"),
        "user": profile_view(&p),
        "fields": detail_fields(&p),
    });

    serve_template(StatusCode::OK, "admin_user", &data, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inter::tests::*;
    use crate::user::tests::profile;

    use tower::ServiceExt;

    #[test]
    fn role_filters() {
        assert_eq!(parse_role_filter(""), Ok(None));
        assert_eq!(parse_role_filter("all"), Ok(None));
        assert_eq!(parse_role_filter("alumni"), Ok(Some(Role::Alumni)));
        assert!(parse_role_filter("dean").is_err());
    }

    #[test]
    fn blank_details_are_left_out() {
        let mut p = profile(4, "grad@alum.fisk.edu", Role::Alumni, true);
        p.major = Some("  ".to_owned());
        p.skills = vec!["Chemistry".to_owned(), "Writing".to_owned()];
        p.graduation_year = Some(1999);

        let fields = detail_fields(&p);
        let labels: Vec<&str> = fields.iter()
            .map(|f| f["label"].as_str().unwrap())
            .collect();
        assert!(labels.contains(&"Graduation year"));
        assert!(labels.contains(&"Open to mentoring"));
        assert!(!labels.contains(&"Major"));
        assert!(!labels.contains(&"Bio"));

        let skills = fields.iter().find(|f| f["label"] == "Skills").unwrap();
        assert_eq!(skills["value"], "Chemistry, Writing");

        let kid = profile(5, "kid@my.fisk.edu", Role::Student, true);
        assert!(detail_fields(&kid).iter().all(|f| f["label"] != "Open to mentoring"));
    }

    #[tokio::test]
    async fn bad_filters_and_reviews_are_refused() {
        let (app, glob) = test_app();
        let boss = profile(1, "boss@fisk.edu", Role::Admin, true);
        let cookie = sign_in(&glob, &boss).await;

        let r = app.clone().oneshot(get_page("/admin/users?role=dean", Some(&cookie))).await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        let r = app.clone().oneshot(get_page("/admin/events?status=lost", Some(&cookie))).await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        let r = app.oneshot(post_form(
            "/admin/events/7/review", Some(&cookie),
            "decision=pending&admin_notes="
        )).await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(r).await, "A review must approve or reject.");
    }
}
