/*!
`Store` methods for the opportunity board.
*/
use tokio_postgres::Row;

use super::{DbError, Store};
use crate::opportunity::*;

/// Every opportunity query selects these columns, with the author's name
/// joined in from `profiles`.
const SELECT: &str = "SELECT o.*, p.full_name AS author_name
    FROM opportunities o LEFT JOIN profiles p ON p.id = o.author_id";

fn opportunity_from_row(row: &Row) -> Result<Opportunity, DbError> {
    let kind: &str = row.try_get("type")?;
    let status: &str = row.try_get("status")?;
    let tags: Option<Vec<String>> = row.try_get("tags")?;

    let o = Opportunity {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        kind: kind.parse()?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        is_remote: row.try_get("is_remote")?,
        link: row.try_get("link")?,
        tags: tags.unwrap_or_default(),
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
    };

    Ok(o)
}

impl Store {
    pub async fn insert_opportunity(
        &self,
        author_id: i64,
        n: &NewOpportunity,
    ) -> Result<Opportunity, DbError> {
        log::trace!("Store::insert_opportunity( {}, {:?} ) called.", author_id, n);

        let client = self.connect().await?;
        let row = client.query_one(
            "WITH o AS (
                INSERT INTO opportunities (
                    author_id, title, description, type, company,
                    location, is_remote, link, tags
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            )
            SELECT o.*, p.full_name AS author_name
                FROM o LEFT JOIN profiles p ON p.id = o.author_id",
            &[
                &author_id, &n.title, &n.description, &n.kind.token(),
                &n.company, &n.location, &n.is_remote, &n.link, &n.tags,
            ]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting opportunity"))?;

        opportunity_from_row(&row)
    }

    /// Every opportunity, newest first.
    pub async fn get_opportunities(&self) -> Result<Vec<Opportunity>, DbError> {
        log::trace!("Store::get_opportunities() called.");

        let client = self.connect().await?;
        let rows = client.query(
            &format!("{} ORDER BY o.created_at DESC, o.id DESC", SELECT),
            &[]
        ).await?;

        rows.iter().map(opportunity_from_row).collect()
    }

    /// Open opportunities, newest first; at most `limit` if one is given.
    pub async fn get_open_opportunities(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<Opportunity>, DbError> {
        log::trace!("Store::get_open_opportunities( {:?} ) called.", &limit);

        let client = self.connect().await?;
        let rows = client.query(
            &format!(
                "{} WHERE o.status = 'open' ORDER BY o.created_at DESC, o.id DESC LIMIT $1",
                SELECT
            ),
            &[&limit]
        ).await?;

        rows.iter().map(opportunity_from_row).collect()
    }

    pub async fn count_opportunities(&self) -> Result<i64, DbError> {
        log::trace!("Store::count_opportunities() called.");

        let client = self.connect().await?;
        let row = client.query_one("SELECT COUNT(*) FROM opportunities", &[]).await?;
        Ok(row.try_get(0)?)
    }

    pub async fn count_opportunities_by(&self, author_id: i64) -> Result<i64, DbError> {
        log::trace!("Store::count_opportunities_by( {} ) called.", author_id);

        let client = self.connect().await?;
        let row = client.query_one(
            "SELECT COUNT(*) FROM opportunities WHERE author_id = $1",
            &[&author_id]
        ).await?;
        Ok(row.try_get(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    use crate::store::tests::{insert_test_profiles, TEST_CONNECTION};
    use crate::tests::ensure_logging;

    fn new_opp(title: &str) -> NewOpportunity {
        NewOpportunity {
            title: title.to_owned(),
            description: "Details.".to_owned(),
            kind: OpportunityType::Internship,
            company: Some("Acme".to_owned()),
            location: None,
            is_remote: true,
            link: None,
            tags: Some(vec!["paid".to_owned()]),
        }
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn post_and_list_opportunities() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();
        let (_, grad, _) = insert_test_profiles(&db).await;

        let first = db.insert_opportunity(grad.id, &new_opp("First")).await.unwrap();
        assert_eq!(first.author_name.as_deref(), Some("Grace Grad"));
        assert_eq!(first.status, OpportunityStatus::Open);
        assert_eq!(first.tags, vec!["paid".to_owned()]);

        for title in ["Second", "Third"] {
            db.insert_opportunity(grad.id, &new_opp(title)).await.unwrap();
        }

        let all = db.get_opportunities().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "Third");

        let recent = db.get_open_opportunities(Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(db.get_open_opportunities(None).await.unwrap().len(), 3);

        assert_eq!(db.count_opportunities().await.unwrap(), 3);
        assert_eq!(db.count_opportunities_by(grad.id).await.unwrap(), 3);
        assert_eq!(db.count_opportunities_by(grad.id + 1000).await.unwrap(), 0);

        db.nuke_database().await.unwrap();
    }
}
