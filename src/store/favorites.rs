/*!
`Store` methods for the alumni students have saved from searches.

The sourced alumni records come from the search service and aren't
profiles here, so they are stored whole as JSON.
*/
use super::{DbError, Store};
use crate::sourcing::SourcedAlumni;

impl Store {
    /// Save `alumni` to `student_id`'s favorites. Saving somebody twice
    /// changes nothing.
    pub async fn add_favorite(
        &self,
        student_id: i64,
        alumni: &SourcedAlumni,
    ) -> Result<(), DbError> {
        log::trace!("Store::add_favorite( {}, {:?} ) called.", student_id, &alumni.id);

        let data = serde_json::to_value(alumni)
            .map_err(|e| DbError(format!("Unable to serialize favorite: {}", &e)))?;

        let client = self.connect().await?;
        client.execute(
            "INSERT INTO favorite_alumni (student_id, alumni_id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (student_id, alumni_id) DO NOTHING",
            &[&student_id, &alumni.id, &data]
        ).await?;

        Ok(())
    }

    pub async fn remove_favorite(
        &self,
        student_id: i64,
        alumni_id: &str,
    ) -> Result<(), DbError> {
        log::trace!("Store::remove_favorite( {}, {:?} ) called.", student_id, alumni_id);

        let client = self.connect().await?;
        client.execute(
            "DELETE FROM favorite_alumni WHERE student_id = $1 AND alumni_id = $2",
            &[&student_id, &alumni_id]
        ).await?;

        Ok(())
    }

    /// `student_id`'s favorites in the order they were saved.
    pub async fn get_favorites(&self, student_id: i64) -> Result<Vec<SourcedAlumni>, DbError> {
        log::trace!("Store::get_favorites( {} ) called.", student_id);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT data FROM favorite_alumni WHERE student_id = $1 ORDER BY id",
            &[&student_id]
        ).await?;

        let mut favs = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let data: serde_json::Value = row.try_get("data")?;
            match serde_json::from_value(data) {
                Ok(a) => favs.push(a),
                Err(e) => {
                    log::error!("Unreadable favorite for student {}: {}", student_id, &e);
                },
            }
        }

        Ok(favs)
    }
}
