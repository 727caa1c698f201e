/*!
Database interaction module.

The Postgres database to which this connects holds the profiles of everyone
who has signed up along with everything they post. Credentials live
elsewhere (see `crate::auth`).

```sql
CREATE TABLE profiles (
    id                  BIGSERIAL PRIMARY KEY,
    email               TEXT UNIQUE NOT NULL,
    full_name           TEXT,
    role                TEXT NOT NULL,  /* one of { 'student', 'alumni', 'admin' } */
    onboarding_complete BOOL NOT NULL DEFAULT FALSE,
    graduation_year     SMALLINT,
    major               TEXT,
    location            TEXT,
    current_title       TEXT,
    current_company     TEXT,
    industry            TEXT,
    skills              TEXT[],
    linkedin_url        TEXT,
    open_to_mentor      BOOL NOT NULL DEFAULT FALSE,
    open_to_contact     BOOL NOT NULL DEFAULT TRUE,
    bio                 TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);
```

The other tables are documented in the submodules that deal with them.
*/
use std::fmt::Write;

use tokio_postgres::{Client, NoTls};

pub mod announcements;
pub mod donations;
pub mod events;
pub mod favorites;
pub mod opportunities;
pub mod profiles;
pub mod stats;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'profiles'",
        "CREATE TABLE profiles (
            id                  BIGSERIAL PRIMARY KEY,
            email               TEXT UNIQUE NOT NULL,
            full_name           TEXT,
            role                TEXT NOT NULL,
            onboarding_complete BOOL NOT NULL DEFAULT FALSE,
            graduation_year     SMALLINT,
            major               TEXT,
            location            TEXT,
            current_title       TEXT,
            current_company     TEXT,
            industry            TEXT,
            skills              TEXT[],
            linkedin_url        TEXT,
            open_to_mentor      BOOL NOT NULL DEFAULT FALSE,
            open_to_contact     BOOL NOT NULL DEFAULT TRUE,
            bio                 TEXT,
            created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE profiles",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'opportunities'",
        "CREATE TABLE opportunities (
            id          BIGSERIAL PRIMARY KEY,
            author_id   BIGINT REFERENCES profiles(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            type        TEXT NOT NULL,
            company     TEXT,
            location    TEXT,
            is_remote   BOOL NOT NULL DEFAULT FALSE,
            link        TEXT,
            tags        TEXT[],
            status      TEXT NOT NULL DEFAULT 'open',
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE opportunities",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'events'",
        "CREATE TABLE events (
            id              BIGSERIAL PRIMARY KEY,
            organizer_id    BIGINT REFERENCES profiles(id) ON DELETE CASCADE,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            event_type      TEXT NOT NULL,
            date            TIMESTAMP NOT NULL,
            location        TEXT,
            is_virtual      BOOL NOT NULL DEFAULT FALSE,
            virtual_link    TEXT,
            max_attendees   INTEGER,
            status          TEXT NOT NULL DEFAULT 'pending',
            admin_notes     TEXT,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE events",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'event_rsvps'",
        "CREATE TABLE event_rsvps (
            event_id    BIGINT REFERENCES events(id) ON DELETE CASCADE,
            user_id     BIGINT REFERENCES profiles(id) ON DELETE CASCADE,
            status      TEXT NOT NULL,
            PRIMARY KEY (event_id, user_id)
        )",
        "DROP TABLE event_rsvps",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'announcements'",
        "CREATE TABLE announcements (
            id          BIGSERIAL PRIMARY KEY,
            author_id   BIGINT REFERENCES profiles(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            audience    TEXT NOT NULL DEFAULT 'all',
            pinned      BOOL NOT NULL DEFAULT FALSE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE announcements",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'donations'",
        "CREATE TABLE donations (
            id              BIGSERIAL PRIMARY KEY,
            donor_id        BIGINT REFERENCES profiles(id) ON DELETE SET NULL,
            amount          DOUBLE PRECISION NOT NULL CHECK (amount > 0),
            purpose         TEXT NOT NULL,
            message         TEXT,
            is_anonymous    BOOL NOT NULL DEFAULT FALSE,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE donations",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'favorite_alumni'",
        "CREATE TABLE favorite_alumni (
            id          BIGSERIAL PRIMARY KEY,
            student_id  BIGINT REFERENCES profiles(id) ON DELETE CASCADE,
            alumni_id   TEXT NOT NULL,
            data        JSONB NOT NULL,
            UNIQUE (student_id, alumni_id)
        )",
        "DROP TABLE favorite_alumni",
    ),
];

#[derive(Debug, PartialEq)]
pub struct DbError(String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    pub(crate) fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Data DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            // Writing to a String can't fail.
            let _ = write!(&mut s, "; {}", dbe);
        }
        DbError(s)
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

/**
Open a connection with `connection_string` and spawn its driver task.

Both the data store and the auth database connect this way, once per
operation.
*/
pub(crate) async fn connect(
    connection_string: &str,
    which: &str,
) -> Result<Client, DbError> {
    log::trace!("connect( [ {} connection string ] ) called.", which);

    match tokio_postgres::connect(connection_string, NoTls).await {
        Ok((client, connection)) => {
            log::trace!("    ...connection successful.");
            let which = which.to_owned();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    log::error!("{} connection error: {}", &which, &e);
                } else {
                    log::trace!("tokio connection runtime drops.");
                }
            });
            Ok(client)
        },
        Err(e) => {
            let dberr = DbError::from(e);
            log::trace!("    ...connection failed: {:?}", &dberr);
            Err(dberr.annotate("Unable to connect"))
        }
    }
}

/// Create every table in `schema` whose existence check comes back empty,
/// all in one transaction.
pub(crate) async fn ensure_schema(
    client: &mut Client,
    schema: &[(&str, &str, &str)],
) -> Result<(), DbError> {
    let t = client.transaction().await
        .map_err(|e| DbError::from(e)
            .annotate("Unable to begin transaction"))?;

    for (test_stmt, create_stmt, _) in schema.iter() {
        if t.query_opt(*test_stmt, &[]).await?.is_none() {
            log::info!(
                "{:?} returned no results; attempting to insert table.",
                test_stmt
            );
            t.execute(*create_stmt, &[]).await?;
        }
    }

    t.commit().await
        .map_err(|e| DbError::from(e)
            .annotate("Error committing transaction"))
}

pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( [ connection string ] ) called.");

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        connect(&self.connection_string, "Data DB").await
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        ensure_schema(&mut client, SCHEMA).await
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(*drop_stmt, &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ....nuking complete.");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    /*!
    These tests assume you have a Postgres instance running on your local
    machine with resources named according to what you see in the
    `static TEST_CONNECTION &str`:

    ```text
    user: alma_test
    password: alma_test

    with write access to:

    database: alma_store_test
    ```

    They are ignored by default; run them with

    ```bash
    cargo test -- --ignored --test-threads=1
    ```
    */
    use super::*;
    use crate::tests::ensure_logging;
    use crate::user::{NewProfile, Profile, Role};

    use serial_test::serial;

    pub static TEST_CONNECTION: &str = "host=localhost user=alma_test password='alma_test' dbname=alma_store_test";

    /// Insert an admin, an alumnus, and a student (returned in that order).
    pub async fn insert_test_profiles(db: &Store) -> (Profile, Profile, Profile) {
        let mut inserted = Vec::new();
        for (email, name, role) in [
            ("dean@fisk.edu", "Dean Jones", Role::Admin),
            ("grad@alum.fisk.edu", "Grace Grad", Role::Alumni),
            ("kid@my.fisk.edu", "Kay Kid", Role::Student),
        ] {
            let np = NewProfile {
                email: email.to_owned(),
                full_name: Some(name.to_owned()),
                role,
                onboarding_complete: true,
            };
            inserted.push(db.insert_profile(&np).await.unwrap());
        }

        let kid = inserted.pop().unwrap();
        let grad = inserted.pop().unwrap();
        let dean = inserted.pop().unwrap();
        (dean, grad, kid)
    }

    /**
    This function is for getting the database back in a blank slate state if
    a test panics partway through and leaves it munged.

    ```bash
    cargo test reset_store -- --ignored
    ```
    */
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn reset_store() {
        ensure_logging();
        let db = Store::new(TEST_CONNECTION.to_owned());
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn create_store() {
        ensure_logging();

        let db = Store::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();
        db.nuke_database().await.unwrap();
    }

    #[test]
    fn errors_annotate() {
        let e = DbError::from("no such row".to_owned()).annotate("Fetching profile 7");
        assert_eq!(e.display(), "Fetching profile 7: no such row");
    }
}
