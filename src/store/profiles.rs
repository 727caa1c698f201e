/*!
`Store` methods for dealing with user profiles.
*/
use tokio_postgres::{Row, Transaction};

use super::{DbError, Store};
use crate::user::*;

pub(crate) fn profile_from_row(row: &Row) -> Result<Profile, DbError> {
    log::trace!("profile_from_row( {:?} ) called", row);

    let role_str: &str = row.try_get("role")?;
    let skills: Option<Vec<String>> = row.try_get("skills")?;
    let p = Profile {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        role: role_str.parse()?,
        onboarding_complete: row.try_get("onboarding_complete")?,
        graduation_year: row.try_get("graduation_year")?,
        major: row.try_get("major")?,
        location: row.try_get("location")?,
        current_title: row.try_get("current_title")?,
        current_company: row.try_get("current_company")?,
        industry: row.try_get("industry")?,
        skills: skills.unwrap_or_default(),
        linkedin_url: row.try_get("linkedin_url")?,
        open_to_mentor: row.try_get("open_to_mentor")?,
        open_to_contact: row.try_get("open_to_contact")?,
        bio: row.try_get("bio")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    };

    Ok(p)
}

/// Return the role of the extant profile with `email`, if there is one.
///
/// Used when inserting new profiles to give a good error message when an
/// address is already in use.
async fn check_existing_email_role(
    t: &Transaction<'_>,
    email: &str,
) -> Result<Option<Role>, DbError> {
    log::trace!("check_existing_email_role( T, {:?} ) called.", email);

    match t.query_opt(
        "SELECT role FROM profiles WHERE lower(email) = lower($1)",
        &[&email]
    ).await.map_err(|e|
        DbError::from(e).annotate("Error querying for preexisting email")
    )? {
        None => Ok(None),
        Some(row) => {
            let role_str: &str = row.try_get("role")?;
            let role: Role = role_str.parse()?;
            Ok(Some(role))
        },
    }
}

impl Store {
    pub async fn insert_profile(&self, np: &NewProfile) -> Result<Profile, DbError> {
        log::trace!("Store::insert_profile( {:?} ) called.", np);

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        if let Some(role) = check_existing_email_role(&t, &np.email).await? {
            return Err(DbError(format!(
                "An account for {} already exists ({}).",
                &np.email, &role
            )));
        }

        let row = t.query_one(
            "INSERT INTO profiles (email, full_name, role, onboarding_complete)
                VALUES ($1, $2, $3, $4)
                RETURNING *",
            &[&np.email, &np.full_name, &np.role.to_string(), &np.onboarding_complete]
        ).await?;
        let p = profile_from_row(&row)?;

        t.commit().await?;
        log::trace!("Inserted {} profile {:?} (id {}).", &p.role, &p.email, p.id);
        Ok(p)
    }

    pub async fn get_profile(&self, id: i64) -> Result<Option<Profile>, DbError> {
        log::trace!("Store::get_profile( {} ) called.", id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM profiles WHERE id = $1",
            &[&id]
        ).await? {
            Some(row) => Ok(Some(profile_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>, DbError> {
        log::trace!("Store::get_profile_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM profiles WHERE lower(email) = lower($1)",
            &[&email.trim()]
        ).await? {
            Some(row) => Ok(Some(profile_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// All profiles, newest first.
    pub async fn get_profiles(&self) -> Result<Vec<Profile>, DbError> {
        log::trace!("Store::get_profiles() called.");

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM profiles ORDER BY created_at DESC, id DESC",
            &[]
        ).await?;

        rows.iter().map(profile_from_row).collect()
    }

    /// Alumni who have finished onboarding and said they'd mentor.
    pub async fn featured_alumni(&self, limit: i64) -> Result<Vec<Profile>, DbError> {
        log::trace!("Store::featured_alumni( {} ) called.", limit);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT * FROM profiles
                WHERE role = 'alumni'
                    AND onboarding_complete
                    AND open_to_mentor
                ORDER BY updated_at DESC
                LIMIT $1",
            &[&limit]
        ).await?;

        rows.iter().map(profile_from_row).collect()
    }

    pub async fn update_profile(
        &self,
        id: i64,
        u: &ProfileUpdate,
    ) -> Result<(), DbError> {
        log::trace!("Store::update_profile( {}, {:?} ) called.", id, u);

        let client = self.connect().await?;
        let n = client.execute(
            "UPDATE profiles SET
                graduation_year = $1, major = $2, location = $3,
                current_title = $4, current_company = $5, industry = $6,
                skills = $7, linkedin_url = $8, open_to_mentor = $9,
                open_to_contact = $10, bio = $11, onboarding_complete = $12,
                updated_at = now()
            WHERE id = $13",
            &[
                &u.graduation_year, &u.major, &u.location,
                &u.current_title, &u.current_company, &u.industry,
                &u.skills, &u.linkedin_url, &u.open_to_mentor,
                &u.open_to_contact, &u.bio, &u.onboarding_complete,
                &id,
            ]
        ).await?;

        match n {
            0 => Err(DbError(format!("There is no profile with id {}.", id))),
            _ => Ok(()),
        }
    }

    pub async fn delete_profile(&self, email: &str) -> Result<(), DbError> {
        log::trace!("Store::delete_profile( {:?} ) called.", email);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM profiles WHERE lower(email) = lower($1)",
            &[&email]
        ).await?;

        match n {
            0 => Err(DbError(format!("There is no profile for {:?}.", email))),
            1 => Ok(()),
            n => {
                log::warn!("Deleting profile {:?} affected {} rows.", email, &n);
                Ok(())
            },
        }
    }
}
