/*!
`Store` methods for event requests, reviews, and RSVPs.
*/
use std::collections::HashMap;

use tokio_postgres::Row;

use super::{DbError, Store};
use crate::event::*;

const SELECT: &str = "SELECT e.*, p.full_name AS organizer_name
    FROM events e LEFT JOIN profiles p ON p.id = e.organizer_id";

fn event_from_row(row: &Row) -> Result<Event, DbError> {
    let event_type: &str = row.try_get("event_type")?;
    let status: &str = row.try_get("status")?;

    let e = Event {
        id: row.try_get("id")?,
        organizer_id: row.try_get("organizer_id")?,
        organizer_name: row.try_get("organizer_name")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        event_type: event_type.parse()?,
        date: row.try_get("date")?,
        location: row.try_get("location")?,
        is_virtual: row.try_get("is_virtual")?,
        virtual_link: row.try_get("virtual_link")?,
        max_attendees: row.try_get("max_attendees")?,
        status: status.parse()?,
        admin_notes: row.try_get("admin_notes")?,
        created_at: row.try_get("created_at")?,
    };

    Ok(e)
}

impl Store {
    /// New events always start out pending approval.
    pub async fn insert_event(
        &self,
        organizer_id: i64,
        n: &NewEvent,
    ) -> Result<Event, DbError> {
        log::trace!("Store::insert_event( {}, {:?} ) called.", organizer_id, n);

        let client = self.connect().await?;
        let row = client.query_one(
            "WITH e AS (
                INSERT INTO events (
                    organizer_id, title, description, event_type, date,
                    location, is_virtual, virtual_link, max_attendees, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending')
                RETURNING *
            )
            SELECT e.*, p.full_name AS organizer_name
                FROM e LEFT JOIN profiles p ON p.id = e.organizer_id",
            &[
                &organizer_id, &n.title, &n.description, &n.event_type.token(),
                &n.date, &n.location, &n.is_virtual, &n.virtual_link,
                &n.max_attendees,
            ]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting event"))?;

        event_from_row(&row)
    }

    /// All events, soonest first.
    pub async fn get_events_by_date(&self) -> Result<Vec<Event>, DbError> {
        log::trace!("Store::get_events_by_date() called.");

        let client = self.connect().await?;
        let rows = client.query(
            &format!("{} ORDER BY e.date ASC, e.id ASC", SELECT),
            &[]
        ).await?;

        rows.iter().map(event_from_row).collect()
    }

    /// All events, most recently requested first.
    pub async fn get_events_newest(&self) -> Result<Vec<Event>, DbError> {
        log::trace!("Store::get_events_newest() called.");

        let client = self.connect().await?;
        let rows = client.query(
            &format!("{} ORDER BY e.created_at DESC, e.id DESC", SELECT),
            &[]
        ).await?;

        rows.iter().map(event_from_row).collect()
    }

    pub async fn get_event(&self, id: i64) -> Result<Option<Event>, DbError> {
        log::trace!("Store::get_event( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt(
            &format!("{} WHERE e.id = $1", SELECT),
            &[&id]
        ).await? {
            Some(row) => Ok(Some(event_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Approve or reject event `id`, which must still be pending.
    pub async fn review_event(&self, id: i64, review: &Review) -> Result<(), DbError> {
        log::trace!("Store::review_event( {}, {:?} ) called.", id, review);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE events SET status = $1, admin_notes = $2
                WHERE id = $3 AND status = 'pending'",
            &[&review.decision.token(), &review.notes, &id]
        ).await?;

        match n {
            0 => Err(DbError(format!("There is no pending event with id {}.", id))),
            _ => Ok(()),
        }
    }

    /// Map of event id to `user_id`'s RSVP for that event.
    pub async fn get_rsvps_for_user(
        &self,
        user_id: i64,
    ) -> Result<HashMap<i64, RsvpStatus>, DbError> {
        log::trace!("Store::get_rsvps_for_user( {} ) called.", user_id);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT event_id, status FROM event_rsvps WHERE user_id = $1",
            &[&user_id]
        ).await?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows.iter() {
            let event_id: i64 = row.try_get("event_id")?;
            let status: &str = row.try_get("status")?;
            map.insert(event_id, status.parse()?);
        }

        Ok(map)
    }

    /// Record that `user_id` is going to `event_id`. Only approved events
    /// take RSVPs; doing it twice is harmless.
    pub async fn rsvp(&self, event_id: i64, user_id: i64) -> Result<(), DbError> {
        log::trace!("Store::rsvp( {}, {} ) called.", event_id, user_id);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        let status: String = match t.query_opt(
            "SELECT status FROM events WHERE id = $1",
            &[&event_id]
        ).await? {
            Some(row) => row.try_get("status")?,
            None => {
                return Err(DbError(format!("There is no event with id {}.", event_id)));
            },
        };
        if status.parse::<EventStatus>()? != EventStatus::Approved {
            return Err(DbError(format!(
                "Event {} is not open for RSVPs ({}).", event_id, &status
            )));
        }

        t.execute(
            "INSERT INTO event_rsvps (event_id, user_id, status)
                VALUES ($1, $2, $3)
                ON CONFLICT (event_id, user_id) DO UPDATE SET status = EXCLUDED.status",
            &[&event_id, &user_id, &RsvpStatus::Going.token()]
        ).await?;

        t.commit().await?;
        Ok(())
    }

    pub async fn count_pending_events(&self) -> Result<i64, DbError> {
        log::trace!("Store::count_pending_events() called.");

        let client = self.connect().await?;
        let row = client.query_one(
            "SELECT COUNT(*) FROM events WHERE status = 'pending'",
            &[]
        ).await?;
        Ok(row.try_get(0)?)
    }

    pub async fn count_events_by(&self, organizer_id: i64) -> Result<i64, DbError> {
        log::trace!("Store::count_events_by( {} ) called.", organizer_id);

        let client = self.connect().await?;
        let row = client.query_one(
            "SELECT COUNT(*) FROM events WHERE organizer_id = $1",
            &[&organizer_id]
        ).await?;
        Ok(row.try_get(0)?)
    }
}
