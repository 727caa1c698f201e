/*!
`Store` methods for announcements.
*/
use tokio_postgres::Row;

use super::{DbError, Store};
use crate::announcement::*;

fn announcement_from_row(row: &Row) -> Result<Announcement, DbError> {
    let audience: &str = row.try_get("audience")?;

    let a = Announcement {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        audience: audience.parse()?,
        pinned: row.try_get("pinned")?,
        created_at: row.try_get("created_at")?,
    };

    Ok(a)
}

impl Store {
    pub async fn insert_announcement(
        &self,
        author_id: i64,
        n: &NewAnnouncement,
    ) -> Result<Announcement, DbError> {
        log::trace!("Store::insert_announcement( {}, {:?} ) called.", author_id, n);

        let client = self.connect().await?;
        let row = client.query_one(
            "WITH a AS (
                INSERT INTO announcements (author_id, title, content, audience)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
            )
            SELECT a.*, p.full_name AS author_name
                FROM a LEFT JOIN profiles p ON p.id = a.author_id",
            &[&author_id, &n.title, &n.content, &n.audience.token()]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting announcement"))?;

        announcement_from_row(&row)
    }

    /// Every announcement, pinned ones first, then newest first.
    pub async fn get_announcements(&self) -> Result<Vec<Announcement>, DbError> {
        log::trace!("Store::get_announcements() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT a.*, p.full_name AS author_name
                FROM announcements a LEFT JOIN profiles p ON p.id = a.author_id
                ORDER BY a.pinned DESC, a.created_at DESC, a.id DESC",
            &[]
        ).await?;

        rows.iter().map(announcement_from_row).collect()
    }

    /// Flip whether announcement `id` is pinned; returns the new state.
    pub async fn toggle_announcement_pin(&self, id: i64) -> Result<bool, DbError> {
        log::trace!("Store::toggle_announcement_pin( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt(
            "UPDATE announcements SET pinned = NOT pinned
                WHERE id = $1 RETURNING pinned",
            &[&id]
        ).await? {
            Some(row) => Ok(row.try_get("pinned")?),
            None => Err(DbError(format!("There is no announcement with id {}.", id))),
        }
    }
}
