/*!
Events that alumni propose and administrators approve or reject.
*/
use serde::Deserialize;
use time::{
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, Time,
};

use crate::blank_means_none;

token_enum! {
    pub enum EventType {
        Event => ("event", "Event"),
        Opportunity => ("opportunity", "Opportunity"),
        Survey => ("survey", "Survey"),
        Workshop => ("workshop", "Workshop"),
        Other => ("other", "Other"),
    }
}

token_enum! {
    pub enum EventStatus {
        Pending => ("pending", "Pending Approval"),
        Approved => ("approved", "Approved"),
        Rejected => ("rejected", "Rejected"),
    }
}

token_enum! {
    pub enum RsvpStatus {
        Going => ("going", "You're going"),
        Interested => ("interested", "Interested"),
    }
}

#[derive(Clone, Debug)]
pub struct Event {
    pub id: i64,
    pub organizer_id: i64,
    /// Joined in from the organizer's profile.
    pub organizer_name: Option<String>,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    /// Wall-clock time of the event, as entered by the organizer.
    pub date: PrimitiveDateTime,
    pub location: Option<String>,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub max_attendees: Option<i32>,
    pub status: EventStatus,
    pub admin_notes: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Form data from the "request an event" form.
#[derive(Deserialize, Debug, Default)]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub event_type: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `HH:MM`
    pub time: Option<String>,
    pub location: Option<String>,
    pub is_virtual: Option<String>,
    pub virtual_link: Option<String>,
    pub max_attendees: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub date: PrimitiveDateTime,
    pub location: Option<String>,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub max_attendees: Option<i32>,
}

/**
Work out when an event happens from the date and time fields.

A date with a time is just that; a date without one means noon; no date at
all means right `now`. A time without a date is ignored.
*/
fn event_datetime(
    date: Option<&str>,
    time: Option<&str>,
    now: OffsetDateTime,
) -> Result<PrimitiveDateTime, String> {
    let date_fmt = format_description!("[year]-[month]-[day]");
    let time_fmt = format_description!("[hour]:[minute]");

    let date = match blank_means_none(date) {
        Some(s) => Date::parse(&s, &date_fmt)
            .map_err(|e| format!("Unable to understand {:?} as a date: {}", &s, &e))?,
        None => { return Ok(PrimitiveDateTime::new(now.date(), now.time())); },
    };

    let time = match blank_means_none(time) {
        Some(s) => Time::parse(&s, &time_fmt)
            .map_err(|e| format!("Unable to understand {:?} as a time: {}", &s, &e))?,
        None => Time::MIDNIGHT + time::Duration::hours(12),
    };

    Ok(PrimitiveDateTime::new(date, time))
}

impl NewEvent {
    pub fn from_form(form: &EventForm, now: OffsetDateTime) -> Result<NewEvent, String> {
        let title = match blank_means_none(Some(&form.title)) {
            Some(s) => s,
            None => { return Err("An event needs a title.".to_owned()); },
        };
        let description = match blank_means_none(Some(&form.description)) {
            Some(s) => s,
            None => { return Err("An event needs a description.".to_owned()); },
        };
        let event_type = match blank_means_none(form.event_type.as_deref()) {
            Some(s) => s.parse()?,
            None => EventType::Event,
        };
        let date = event_datetime(form.date.as_deref(), form.time.as_deref(), now)?;

        let is_virtual = form.is_virtual.is_some();
        let virtual_link = if is_virtual {
            blank_means_none(form.virtual_link.as_deref())
        } else {
            None
        };

        let max_attendees = match blank_means_none(form.max_attendees.as_deref()) {
            Some(s) => match s.parse::<i32>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(format!(
                        "Maximum attendees must be a positive whole number, not {:?}.", &s
                    ));
                },
            },
            None => None,
        };

        Ok(NewEvent {
            title,
            description,
            event_type,
            date,
            location: blank_means_none(form.location.as_deref()),
            is_virtual,
            virtual_link,
            max_attendees,
        })
    }
}

/// An administrator's decision on a pending event.
#[derive(Clone, Debug, PartialEq)]
pub struct Review {
    pub decision: EventStatus,
    pub notes: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ReviewForm {
    pub decision: String,
    pub admin_notes: Option<String>,
}

impl Review {
    pub fn from_form(form: &ReviewForm) -> Result<Review, String> {
        let decision: EventStatus = form.decision.parse()?;
        if decision == EventStatus::Pending {
            return Err("A review must approve or reject.".to_owned());
        }

        Ok(Review {
            decision,
            notes: blank_means_none(form.admin_notes.as_deref()),
        })
    }
}

/// Whether an event with `status` passes the admin list's status filter
/// (an `EventStatus` token, or `"all"`).
pub fn status_matches(filter: &str, status: EventStatus) -> bool {
    match filter {
        "" | "all" => true,
        token => status.token() == token,
    }
}
