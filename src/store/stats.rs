/*!
Summary numbers for the dashboards.
*/
use std::collections::HashMap;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use super::{DbError, Store};
use crate::user::Role;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AdminStats {
    pub students: i64,
    pub alumni: i64,
    pub admins: i64,
    pub opportunities: i64,
    pub pending_events: i64,
    pub donation_total: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AlumniStats {
    pub opportunities: i64,
    pub donations: i64,
    pub events: i64,
}

impl Store {
    /// How many profiles there are of each role. Every role gets an entry.
    pub async fn count_profiles_by_role(&self) -> Result<HashMap<Role, i64>, DbError> {
        log::trace!("Store::count_profiles_by_role() called.");

        let client = self.connect().await?;
        let stmt = client.prepare("SELECT COUNT(*) FROM profiles WHERE role = $1").await?;
        let tokens: Vec<String> = Role::ALL.iter().map(|r| r.to_string()).collect();

        let mut counts: HashMap<Role, i64> = HashMap::with_capacity(Role::ALL.len());
        {
            let client = &client;
            let stmt = &stmt;
            let mut queries = FuturesUnordered::new();
            for (role, token) in Role::ALL.iter().zip(tokens.iter()) {
                queries.push(async move {
                    client.query_one(stmt, &[token]).await.map(|row| (*role, row))
                });
            }

            while let Some(res) = queries.next().await {
                let (role, row) = res?;
                counts.insert(role, row.try_get(0)?);
            }
        }

        Ok(counts)
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, DbError> {
        log::trace!("Store::admin_stats() called.");

        let (by_role, opportunities, pending_events, donation_total) = tokio::try_join!(
            self.count_profiles_by_role(),
            self.count_opportunities(),
            self.count_pending_events(),
            self.donation_total(),
        )?;
        let count = |role: Role| by_role.get(&role).copied().unwrap_or(0);

        Ok(AdminStats {
            students: count(Role::Student),
            alumni: count(Role::Alumni),
            admins: count(Role::Admin),
            opportunities,
            pending_events,
            donation_total,
        })
    }

    /// How much alumnus `id` has posted, given, and organized.
    pub async fn alumni_stats(&self, id: i64) -> Result<AlumniStats, DbError> {
        log::trace!("Store::alumni_stats( {} ) called.", id);

        let (opportunities, donations, events) = tokio::try_join!(
            self.count_opportunities_by(id),
            self.count_donations_by(id),
            self.count_events_by(id),
        )?;

        Ok(AlumniStats { opportunities, donations, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::approx_eq;
    use serial_test::serial;

    use crate::donation::{NewDonation, Purpose};
    use crate::store::tests::{insert_test_profiles, TEST_CONNECTION};
    use crate::tests::ensure_logging;

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn dashboard_numbers() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();
        assert_eq!(db.admin_stats().await.unwrap(), AdminStats::default());

        let (_, grad, _) = insert_test_profiles(&db).await;
        let n = NewDonation {
            amount: 40.0,
            purpose: Purpose::General,
            message: None,
            is_anonymous: false,
        };
        db.insert_donation(grad.id, &n).await.unwrap();

        let s = db.admin_stats().await.unwrap();
        assert_eq!((s.students, s.alumni, s.admins), (1, 1, 1));
        assert_eq!((s.opportunities, s.pending_events), (0, 0));
        assert!(approx_eq!(f64, s.donation_total, 40.0));

        assert_eq!(
            db.alumni_stats(grad.id).await.unwrap(),
            AlumniStats { opportunities: 0, donations: 1, events: 0 }
        );

        db.nuke_database().await.unwrap();
    }
}
