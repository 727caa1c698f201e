/*!
Pages for alumni: the onboarding wizard, the opportunity board,
announcements, events, donations, and their own profile.

Every page here but the wizard is only reachable once onboarding is
complete; `gate::check()` sees to that.
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
    donation::{self, DonationForm, NewDonation, Purpose},
    event::{EventForm, EventStatus, EventType, NewEvent},
    onboarding::{self, Action, Step, Wizard, WizardForm, INDUSTRIES},
    opportunity::{NewOpportunity, OpportunityForm, OpportunityType},
    user::Role,
};
use super::*;

pub async fn dashboard(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("alumni::dashboard( {:?} ) called.", &session.email);

    let data = glob.read().await.data();
    let data = data.read().await;
    let (profile, stats) = match tokio::try_join!(
        data.get_profile(session.profile_id),
        data.alumni_stats(session.profile_id),
    ) {
        Ok(x) => x,
        Err(e) => {
            log::error!("Error gathering alumni dashboard for {:?}: {}", &session.email, &e);
            return html_500();
        },
    };

    let data = json!({
        "nav": nav(&session, "/alumni"),
        "name": profile.as_ref().and_then(|p| p.full_name.as_deref()),
        "stats": stats,
    });

    serve_template(StatusCode::OK, "alumni_dashboard", &data, vec![])
}

fn wizard_view(session: &Session, w: &Wizard, error: Option<&str>) -> Value {
    let years: Vec<String> = onboarding::graduation_years().map(|y| y.to_string()).collect();
    let selected_year = w.graduation_year.map(|y| y.to_string()).unwrap_or_default();
    let year_options = select_options(
        years.iter().map(|y| (y.as_str(), y.as_str())),
        &selected_year
    );
    let industry_options = select_options(
        INDUSTRIES.iter().map(|i| (*i, *i)),
        &w.industry
    );

    let steps: Vec<Value> = Step::ALL.iter()
        .map(|s| json!({
            "number": s.number(),
            "label": s.label(),
            "current": *s == w.step,
            "done": s.number() < w.step.number(),
        }))
        .collect();

    json!({
        "nav": nav(session, "/alumni/onboarding"),
        "step": w.step.token(),
        "step_number": w.step.number(),
        "step_count": Step::ALL.len(),
        "step_label": w.step.label(),
        "steps": steps,
        "is_basic": w.step == Step::Basic,
        "is_professional": w.step == Step::Professional,
        "is_preferences": w.step == Step::Preferences,
        "year_options": year_options,
        "major": &w.major,
        "location": &w.location,
        "current_title": &w.current_title,
        "current_company": &w.current_company,
        "industry_options": industry_options,
        "linkedin_url": &w.linkedin_url,
        "skills": &w.skills,
        "skill_input": &w.skill_input,
        "import_label": w.import.label(),
        "imported": w.import == onboarding::ImportState::Fetched,
        "open_to_mentor": w.open_to_mentor,
        "open_to_contact": w.open_to_contact,
        "bio": &w.bio,
        "error_message": error,
    })
}

pub async fn onboarding(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("alumni::onboarding( {:?} ) called.", &session.email);

    if session.onboarding_complete {
        return see_other(Role::Alumni.dashboard());
    }

    let wizard = {
        let mut glob = glob.write().await;
        glob.wizards.entry(session.profile_id).or_default().clone()
    };

    serve_template(
        StatusCode::OK,
        "onboarding",
        &wizard_view(&session, &wizard, None),
        vec![]
    )
}

async fn save_wizard(glob: &Arc<RwLock<Glob>>, profile_id: i64, wizard: Wizard) {
    glob.write().await.wizards.insert(profile_id, wizard);
}

/**
Handle one button press in the wizard.

The values on the current step are always taken first, so nothing typed is
lost when moving back and forth. Every outcome but finishing lands back on
the wizard page.
*/
pub async fn onboarding_step(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<WizardForm>,
) -> Response {
    log::trace!("alumni::onboarding_step( {:?}, {:?} ) called.", &session.email, &form.action);

    if session.onboarding_complete {
        return see_other(Role::Alumni.dashboard());
    }

    let action: Action = match form.action.parse() {
        Ok(a) => a,
        Err(e) => { return respond_bad_request(e); },
    };

    let id = session.profile_id;
    let mut wizard = glob.read().await.wizards.get(&id).cloned().unwrap_or_default();

    if let Err(msg) = wizard.apply(&form) {
        let r = serve_template(
            StatusCode::BAD_REQUEST,
            "onboarding",
            &wizard_view(&session, &wizard, Some(&msg)),
            vec![]
        );
        save_wizard(&glob, id, wizard).await;
        return r;
    }

    match action {
        Action::Next => { wizard.next(); },
        Action::Back => { wizard.back(); },
        Action::AddSkill => { wizard.add_skill(); },
        Action::RemoveSkill(skill) => { wizard.remove_skill(&skill); },
        Action::Connect => {
            wizard.begin_import();
            save_wizard(&glob, id, wizard.clone()).await;
            let importer = glob.read().await.importer.clone();
            let imported = importer.fetch().await;
            wizard.complete_import(imported);
        },
        Action::Finish => {
            let update = wizard.finish();
            let data = glob.read().await.data();
            let res = data.read().await.update_profile(id, &update).await;
            if let Err(e) = res {
                log::error!("Error saving onboarding for {:?}: {}", &session.email, &e);
                save_wizard(&glob, id, wizard).await;
                return html_500();
            }

            let sessions = {
                let mut glob = glob.write().await;
                glob.wizards.remove(&id);
                glob.sessions()
            };
            sessions.write().await.set_onboarding_complete(id);
            log::info!("{:?} finished onboarding.", &session.email);
            return see_other(Role::Alumni.dashboard());
        },
    }

    save_wizard(&glob, id, wizard).await;
    see_other("/alumni/onboarding")
}

async fn opportunities_page(
    session: &Session,
    glob: &Arc<RwLock<Glob>>,
    code: StatusCode,
    form: Value,
    error: Option<&str>,
) -> Response {
    let data = glob.read().await.data();
    let opps = data.read().await.get_opportunities().await;
    let opps = match opps {
        Ok(opps) => opps,
        Err(e) => {
            log::error!("Error retrieving opportunities: {}", &e);
            return html_500();
        },
    };
    let opps: Vec<Value> = opps.iter().map(opportunity_view).collect();

    let selected = form.get("type").and_then(|v| v.as_str()).unwrap_or("job").to_owned();
    let data = json!({
        "nav": nav(session, "/alumni/opportunities"),
        "opportunities": opps,
        "type_options": select_options(
            OpportunityType::ALL.iter().map(|t| (t.token(), t.label())),
            &selected
        ),
        "form": form,
        "error_message": error,
    });

    serve_template(code, "alumni_opportunities", &data, vec![])
}

pub async fn opportunities(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("alumni::opportunities( {:?} ) called.", &session.email);

    opportunities_page(&session, &glob, StatusCode::OK, json!({}), None).await
}

pub async fn post_opportunity(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<OpportunityForm>,
) -> Response {
    log::trace!("alumni::post_opportunity( {:?}, {:?} ) called.", &session.email, &form);

    let n = match NewOpportunity::from_form(&form) {
        Ok(n) => n,
        Err(msg) => {
            let echo = json!({
                "title": &form.title,
                "description": &form.description,
                "type": &form.kind,
                "company": &form.company,
                "location": &form.location,
                "is_remote": form.is_remote.is_some(),
                "link": &form.link,
                "tags": &form.tags,
            });
            return opportunities_page(&session, &glob, StatusCode::BAD_REQUEST, echo, Some(&msg)).await;
        },
    };

    let data = glob.read().await.data();
    let res = data.read().await.insert_opportunity(session.profile_id, &n).await;
    match res {
        Ok(o) => {
            log::info!("{:?} posted opportunity {} ({:?}).", &session.email, o.id, &o.title);
            see_other("/alumni/opportunities")
        },
        Err(e) => {
            log::error!("Error inserting opportunity {:?}: {}", &n, &e);
            html_500()
        },
    }
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
    let anns: Vec<Value> = anns.iter()
        .filter(|a| a.visible_to(session.role))
        .map(announcement_view)
        .collect();

    let selected = form.get("audience").and_then(|v| v.as_str()).unwrap_or("all").to_owned();
    let data = json!({
        "nav": nav(session, "/alumni/announcements"),
        "announcements": anns,
        "audience_options": select_options(
            Audience::ALL.iter().map(|a| (a.token(), a.label())),
            &selected
        ),
        "form": form,
        "error_message": error,
    });

    serve_template(code, "alumni_announcements", &data, vec![])
}

pub async fn announcements(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("alumni::announcements( {:?} ) called.", &session.email);

    announcements_page(&session, &glob, StatusCode::OK, json!({}), None).await
}

pub async fn post_announcement(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<AnnouncementForm>,
) -> Response {
    log::trace!("alumni::post_announcement( {:?}, {:?} ) called.", &session.email, &form);

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
        Ok(_) => see_other("/alumni/announcements"),
        Err(e) => {
            log::error!("Error inserting announcement {:?}: {}", &n, &e);
            html_500()
        },
    }
}

async fn events_page(
    session: &Session,
    glob: &Arc<RwLock<Glob>>,
    code: StatusCode,
    form: Value,
    error: Option<&str>,
) -> Response {
    let data = glob.read().await.data();
    let data = data.read().await;
    let (events, rsvps) = match tokio::try_join!(
        data.get_events_by_date(),
        data.get_rsvps_for_user(session.profile_id),
    ) {
        Ok(x) => x,
        Err(e) => {
            log::error!("Error retrieving events for {:?}: {}", &session.email, &e);
            return html_500();
        },
    };

    let events: Vec<Value> = events.iter()
        .map(|e| event_view(e, rsvps.get(&e.id).copied()))
        .collect();

    let selected = form.get("event_type").and_then(|v| v.as_str()).unwrap_or("event").to_owned();
    let data = json!({
        "nav": nav(session, "/alumni/events"),
        "events": events,
        "type_options": select_options(
            EventType::ALL.iter().map(|t| (t.token(), t.label())),
            &selected
        ),
        "form": form,
        "error_message": error,
    });

    serve_template(code, "alumni_events", &data, vec![])
}

pub async fn events(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("alumni::events( {:?} ) called.", &session.email);

    events_page(&session, &glob, StatusCode::OK, json!({}), None).await
}

pub async fn request_event(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<EventForm>,
) -> Response {
    log::trace!("alumni::request_event( {:?}, {:?} ) called.", &session.email, &form);

    let n = match NewEvent::from_form(&form, crate::now()) {
        Ok(n) => n,
        Err(msg) => {
            let echo = json!({
                "title": &form.title,
                "description": &form.description,
                "event_type": &form.event_type,
                "date": &form.date,
                "time": &form.time,
                "location": &form.location,
                "is_virtual": form.is_virtual.is_some(),
                "virtual_link": &form.virtual_link,
                "max_attendees": &form.max_attendees,
            });
            return events_page(&session, &glob, StatusCode::BAD_REQUEST, echo, Some(&msg)).await;
        },
    };

    let data = glob.read().await.data();
    let res = data.read().await.insert_event(session.profile_id, &n).await;
    match res {
        Ok(e) => {
            log::info!("{:?} requested event {} ({:?}).", &session.email, e.id, &e.title);
            see_other("/alumni/events")
        },
        Err(e) => {
            log::error!("Error inserting event {:?}: {}", &n, &e);
            html_500()
        },
    }
}

pub async fn rsvp(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Path(event_id): Path<i64>,
) -> Response {
    log::trace!("alumni::rsvp( {:?}, {} ) called.", &session.email, event_id);

    let data = glob.read().await.data();
    let data = data.read().await;

    match data.get_event(event_id).await {
        Err(e) => {
            log::error!("Error retrieving event {}: {}", event_id, &e);
            return html_500();
        },
        Ok(None) => { return respond_not_found("event"); },
        Ok(Some(e)) if e.status != EventStatus::Approved => {
            return respond_bad_request(format!(
                "Event {:?} is {} and not taking RSVPs.", &e.title, e.status.label()
            ));
        },
        Ok(Some(_)) => {},
    }

    if let Err(e) = data.rsvp(event_id, session.profile_id).await {
        log::error!("Error recording RSVP of {:?} to event {}: {}", &session.email, event_id, &e);
        return html_500();
    }

    see_other("/alumni/events")
}

#[derive(Deserialize, Debug, Default)]
pub struct DonateQuery {
    pub given: Option<String>,
}

async fn donate_form(
    session: &Session,
    glob: &Arc<RwLock<Glob>>,
    code: StatusCode,
    form: Value,
    error: Option<&str>,
    thanks: bool,
) -> Response {
    let data = glob.read().await.data();
    let mine = data.read().await.get_donations_by(session.profile_id).await;
    let mine = match mine {
        Ok(mine) => mine,
        Err(e) => {
            log::error!("Error retrieving donations of {:?}: {}", &session.email, &e);
            return html_500();
        },
    };

    let selected = form.get("purpose").and_then(|v| v.as_str()).unwrap_or("general").to_owned();
    let data = json!({
        "nav": nav(session, "/alumni/donate"),
        "purpose_options": select_options(
            Purpose::ALL.iter().map(|p| (p.token(), p.label())),
            &selected
        ),
        "donations": mine.iter().map(donation_view).collect::<Vec<_>>(),
        "total": donation::dollars(donation::total(&mine)),
        "thanks": thanks,
        "form": form,
        "error_message": error,
    });

    serve_template(code, "donate", &data, vec![])
}

pub async fn donate_page(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Query(q): Query<DonateQuery>,
) -> Response {
    log::trace!("alumni::donate_page( {:?} ) called.", &session.email);

    donate_form(&session, &glob, StatusCode::OK, json!({}), None, q.given.is_some()).await
}

pub async fn donate(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
    Form(form): Form<DonationForm>,
) -> Response {
    log::trace!("alumni::donate( {:?}, {:?} ) called.", &session.email, &form);

    let n = match NewDonation::from_form(&form) {
        Ok(n) => n,
        Err(msg) => {
            let echo = json!({
                "amount": &form.amount,
                "purpose": &form.purpose,
                "message": &form.message,
                "is_anonymous": form.is_anonymous.is_some(),
            });
            return donate_form(&session, &glob, StatusCode::BAD_REQUEST, echo, Some(&msg), false).await;
        },
    };

    let data = glob.read().await.data();
    let res = data.read().await.insert_donation(session.profile_id, &n).await;
    match res {
        Ok(d) => {
            log::info!("{:?} donated {} ({}).", &session.email, donation::dollars(d.amount), &d.purpose);
            see_other("/alumni/donate?given=1")
        },
        Err(e) => {
            log::error!("Error inserting donation {:?}: {}", &n, &e);
            html_500()
        },
    }
}

pub async fn profile(
    Extension(session): Extension<Session>,
    Extension(glob): Extension<Arc<RwLock<Glob>>>,
) -> Response {
    log::trace!("alumni::profile( {:?} ) called.", &session.email);

    let data = glob.read().await.data();
    let p = data.read().await.get_profile(session.profile_id).await;
    let p = match p {
        Ok(Some(p)) => p,
        Ok(None) => { return respond_not_found("profile"); },
        Err(e) => {
            log::error!("Error retrieving profile of {:?}: {}", &session.email, &e);
            return html_500();
        },
    };

    let data = json!({
        "nav": nav(&session, "/alumni/profile"),
        "profile": profile_view(&p),
    });

    serve_template(StatusCode::OK, "alumni_profile", &data, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inter::tests::*;
    use crate::user::tests::profile;

    use tower::ServiceExt;

    async fn wizard_of(glob: &Arc<RwLock<Glob>>, id: i64) -> Wizard {
        glob.read().await.wizards.get(&id).cloned().unwrap()
    }

    #[tokio::test]
    async fn wizard_walkthrough() {
        let (app, glob) = test_app();
        let grad = profile(11, "walker@alum.fisk.edu", Role::Alumni, false);
        let cookie = sign_in(&glob, &grad).await;

        let r = app.clone().oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=next&graduation_year=2012&major=Physics&location=Nashville"
        )).await.unwrap();
        assert_eq!(location(&r), Some("/alumni/onboarding"));
        let w = wizard_of(&glob, 11).await;
        assert_eq!(w.step, Step::Professional);
        assert_eq!(w.graduation_year, Some(2012));
        assert_eq!(&w.major, "Physics");

        let r = app.clone().oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=add-skill&current_title=Engineer&industry=Technology&skill=Optics"
        )).await.unwrap();
        assert_eq!(location(&r), Some("/alumni/onboarding"));
        let w = wizard_of(&glob, 11).await;
        assert_eq!(w.skills, vec!["Optics".to_owned()]);
        assert_eq!(&w.current_title, "Engineer");

        let r = app.clone().oneshot(get_page("/alumni/onboarding", Some(&cookie))).await.unwrap();
        let body = body_string(r).await;
        assert!(body.contains("Optics"));
        assert!(body.contains("remove-skill:Optics"));

        app.clone().oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=remove-skill%3AOptics&current_title=Engineer&industry=Technology"
        )).await.unwrap();
        assert!(wizard_of(&glob, 11).await.skills.is_empty());

        app.clone().oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=back&current_title=Engineer&industry=Technology"
        )).await.unwrap();
        let w = wizard_of(&glob, 11).await;
        assert_eq!(w.step, Step::Basic);
        assert_eq!(&w.current_title, "Engineer");
    }

    #[tokio::test]
    async fn finished_alumni_skip_the_wizard() {
        let (app, glob) = test_app();
        let grad = profile(13, "done@alum.fisk.edu", Role::Alumni, true);
        let cookie = sign_in(&glob, &grad).await;

        let r = app.clone().oneshot(get_page("/alumni/onboarding", Some(&cookie))).await.unwrap();
        assert_eq!(location(&r), Some("/alumni"));
        let r = app.oneshot(post_form(
            "/alumni/onboarding", Some(&cookie), "action=next&graduation_year=2010"
        )).await.unwrap();
        assert_eq!(location(&r), Some("/alumni"));

        assert!(glob.read().await.wizards.is_empty());
    }

    #[tokio::test]
    async fn signing_out_discards_the_wizard() {
        let (app, glob) = test_app();
        let grad = profile(14, "quitter@alum.fisk.edu", Role::Alumni, false);
        let cookie = sign_in(&glob, &grad).await;

        let r = app.clone().oneshot(get_page("/alumni/onboarding", Some(&cookie))).await.unwrap();
        assert_eq!(r.status(), StatusCode::OK);
        assert!(glob.read().await.wizards.contains_key(&14));

        let r = app.oneshot(post_form("/logout", Some(&cookie), "")).await.unwrap();
        assert_eq!(location(&r), Some("/"));
        assert!(glob.read().await.wizards.is_empty());
    }

    #[tokio::test]
    async fn wizard_refuses_bad_values() {
        let (app, glob) = test_app();
        let grad = profile(12, "early@alum.fisk.edu", Role::Alumni, false);
        let cookie = sign_in(&glob, &grad).await;

        let r = app.clone().oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=next&graduation_year=1901"
        )).await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(r).await.contains("Graduation year must be between 1970 and 2025."));
        assert_eq!(wizard_of(&glob, 12).await.step, Step::Basic);

        let r = app.oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=teleport"
        )).await.unwrap();
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wizard_import() {
        let (app, glob) = test_app();
        let grad = profile(13, "linked@alum.fisk.edu", Role::Alumni, false);
        let cookie = sign_in(&glob, &grad).await;

        app.clone().oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=next&graduation_year=2001"
        )).await.unwrap();
        let r = app.oneshot(post_form(
            "/alumni/onboarding", Some(&cookie),
            "action=connect&current_title=Intern"
        )).await.unwrap();
        assert_eq!(location(&r), Some("/alumni/onboarding"));

        let w = wizard_of(&glob, 13).await;
        assert_eq!(w.import, onboarding::ImportState::Fetched);
        assert_eq!(&w.current_title, "Senior Software Engineer");
        assert_eq!(&w.industry, "Technology");
        assert_eq!(w.skills.len(), 3);
    }
}
