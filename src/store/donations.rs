/*!
`Store` methods for donations.
*/
use tokio_postgres::Row;

use super::{DbError, Store};
use crate::donation::*;

const SELECT: &str = "SELECT d.*, p.full_name AS donor_name, p.email AS donor_email
    FROM donations d LEFT JOIN profiles p ON p.id = d.donor_id";

fn donation_from_row(row: &Row) -> Result<Donation, DbError> {
    let purpose: &str = row.try_get("purpose")?;

    let d = Donation {
        id: row.try_get("id")?,
        donor_id: row.try_get("donor_id")?,
        donor_name: row.try_get("donor_name")?,
        donor_email: row.try_get("donor_email")?,
        amount: row.try_get("amount")?,
        purpose: purpose.parse()?,
        message: row.try_get("message")?,
        is_anonymous: row.try_get("is_anonymous")?,
        created_at: row.try_get("created_at")?,
    };

    Ok(d)
}

impl Store {
    pub async fn insert_donation(
        &self,
        donor_id: i64,
        n: &NewDonation,
    ) -> Result<Donation, DbError> {
        log::trace!("Store::insert_donation( {}, {:?} ) called.", donor_id, n);

        let client = self.connect().await?;
        let row = client.query_one(
            "WITH d AS (
                INSERT INTO donations (donor_id, amount, purpose, message, is_anonymous)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
            )
            SELECT d.*, p.full_name AS donor_name, p.email AS donor_email
                FROM d LEFT JOIN profiles p ON p.id = d.donor_id",
            &[&donor_id, &n.amount, &n.purpose.token(), &n.message, &n.is_anonymous]
        ).await.map_err(|e| DbError::from(e).annotate("Error inserting donation"))?;

        donation_from_row(&row)
    }

    /// `donor_id`'s donations, newest first.
    pub async fn get_donations_by(&self, donor_id: i64) -> Result<Vec<Donation>, DbError> {
        log::trace!("Store::get_donations_by( {} ) called.", donor_id);

        let client = self.connect().await?;
        let rows = client.query(
            &format!("{} WHERE d.donor_id = $1 ORDER BY d.created_at DESC, d.id DESC", SELECT),
            &[&donor_id]
        ).await?;

        rows.iter().map(donation_from_row).collect()
    }

    /// All donations, newest first.
    pub async fn get_donations(&self) -> Result<Vec<Donation>, DbError> {
        log::trace!("Store::get_donations() called.");

        let client = self.connect().await?;
        let rows = client.query(
            &format!("{} ORDER BY d.created_at DESC, d.id DESC", SELECT),
            &[]
        ).await?;

        rows.iter().map(donation_from_row).collect()
    }

    pub async fn donation_total(&self) -> Result<f64, DbError> {
        log::trace!("Store::donation_total() called.");

        let client = self.connect().await?;
        let row = client.query_one(
            "SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION FROM donations",
            &[]
        ).await?;
        Ok(row.try_get(0)?)
    }

    pub async fn count_donations_by(&self, donor_id: i64) -> Result<i64, DbError> {
        log::trace!("Store::count_donations_by( {} ) called.", donor_id);

        let client = self.connect().await?;
        let row = client.query_one(
            "SELECT COUNT(*) FROM donations WHERE donor_id = $1",
            &[&donor_id]
        ).await?;
        Ok(row.try_get(0)?)
    }
}
