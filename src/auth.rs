/*!
Authentication: password hashes and login sessions.

Password hashes are kept in a separate database from everything else:

```sql
CREATE TABLE credentials (
    email   TEXT PRIMARY KEY,   /* always lowercase */
    hash    TEXT NOT NULL       /* argon2 PHC string */
);
```

Sessions are held in memory and don't survive a restart.
*/
use std::collections::HashMap;
use std::time::{Duration, Instant};

use argon2::{
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};
use tokio_postgres::Client;

use crate::gate::Viewer;
use crate::store::{self, DbError};
use crate::user::{Profile, Role};

/// Length of the random session keys handed out in cookies.
const KEY_LENGTH: usize = 32;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'credentials'",
        "CREATE TABLE credentials (
            email   TEXT PRIMARY KEY,
            hash    TEXT NOT NULL
        )",
        "DROP TABLE credentials",
    ),
];

#[derive(Debug, PartialEq)]
pub enum AuthResult {
    Ok,
    BadPassword,
    NoSuchUser,
}

fn hash_password(password: &str) -> Result<String, DbError> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| DbError::from(format!("Error encoding salt: {}", &e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::from(format!("Error hashing password: {}", &e)))?;

    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, DbError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| DbError::from(format!("Stored hash unreadable: {}", &e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::from(format!("Error verifying password: {}", &e))),
    }
}

pub struct Db {
    connection_string: String,
}

impl Db {
    pub fn new(connection_string: String) -> Self {
        log::trace!("auth::Db::new( [ connection string ] ) called.");

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        store::connect(&self.connection_string, "Auth DB").await
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("auth::Db::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        store::ensure_schema(&mut client, SCHEMA).await
    }

    pub async fn add_user(&self, email: &str, password: &str) -> Result<(), DbError> {
        log::trace!("auth::Db::add_user( {:?}, [ password ] ) called.", email);

        let email = email.trim().to_lowercase();
        let hash = hash_password(password)?;

        let client = self.connect().await?;
        let n = client.execute(
            "INSERT INTO credentials (email, hash) VALUES ($1, $2)
                ON CONFLICT (email) DO NOTHING",
            &[&email, &hash]
        ).await?;

        match n {
            0 => Err(DbError::from(format!(
                "Credentials for {:?} already exist.", &email
            ))),
            _ => Ok(()),
        }
    }

    pub async fn check_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResult, DbError> {
        log::trace!("auth::Db::check_password( {:?}, [ password ] ) called.", email);

        let email = email.trim().to_lowercase();
        let client = self.connect().await?;
        let hash: String = match client.query_opt(
            "SELECT hash FROM credentials WHERE email = $1",
            &[&email]
        ).await? {
            None => { return Ok(AuthResult::NoSuchUser); },
            Some(row) => row.try_get("hash")?,
        };

        if verify_password(password, &hash)? {
            Ok(AuthResult::Ok)
        } else {
            Ok(AuthResult::BadPassword)
        }
    }

    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("auth::Db::nuke_database() called.");

        let client = self.connect().await?;
        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(*drop_stmt, &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        Ok(())
    }
}

/// What we remember about a signed-in user between requests.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub profile_id: i64,
    pub email: String,
    pub role: Role,
    pub onboarding_complete: bool,
    pub expires: Instant,
}

impl Session {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            email: &self.email,
            profile_role: self.role,
            onboarding_complete: self.onboarding_complete,
        }
    }
}

#[derive(Debug, Default)]
pub struct Sessions {
    map: HashMap<String, Session>,
}

fn new_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

impl Sessions {
    pub fn new() -> Self { Self::default() }

    /// Start a session for `profile` lasting `ttl`; returns the key.
    pub fn issue(&mut self, profile: &Profile, ttl: Duration) -> String {
        log::trace!("Sessions::issue( {:?}, {:?} ) called.", &profile.email, &ttl);

        self.purge_expired();

        let mut key = new_key();
        while self.map.contains_key(&key) {
            key = new_key();
        }

        let session = Session {
            profile_id: profile.id,
            email: profile.email.clone(),
            role: profile.role,
            onboarding_complete: profile.onboarding_complete,
            expires: Instant::now() + ttl,
        };
        self.map.insert(key.clone(), session);
        key
    }

    pub fn get(&mut self, key: &str) -> Option<Session> {
        let expired = match self.map.get(key) {
            None => { return None; },
            Some(s) => s.expires <= Instant::now(),
        };

        if expired {
            log::trace!("Session for {:?} has expired.", &self.map[key].email);
            self.map.remove(key);
            None
        } else {
            self.map.get(key).cloned()
        }
    }

    pub fn revoke(&mut self, key: &str) -> Option<Session> {
        self.map.remove(key)
    }

    /// Mark every session belonging to `profile_id` as having finished
    /// onboarding.
    pub fn set_onboarding_complete(&mut self, profile_id: i64) {
        for s in self.map.values_mut().filter(|s| s.profile_id == profile_id) {
            s.onboarding_complete = true;
        }
    }

    pub fn purge_expired(&mut self) {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, s| s.expires > now);
        let purged = before - self.map.len();
        if purged > 0 {
            log::debug!("Purged {} expired sessions.", purged);
        }
    }

    /// Whether `profile_id` has any session that hasn't expired.
    pub fn signed_in(&self, profile_id: i64) -> bool {
        let now = Instant::now();
        self.map.values().any(|s| s.profile_id == profile_id && s.expires > now)
    }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;
    use crate::user::tests::profile;

    use serial_test::serial;

    static TEST_CONNECTION: &str = "host=localhost user=alma_test password='alma_test' dbname=alma_auth_test";

    #[test]
    fn hashes_verify() {
        let h = hash_password("frogs are cool").unwrap();
        assert!(h.starts_with("$argon2"));
        assert!(verify_password("frogs are cool", &h).unwrap());
        assert!(!verify_password("toads are cool", &h).unwrap());
        assert!(verify_password("frogs are cool", "not a hash").is_err());
        // Salted, so the same password hashes differently each time.
        assert_ne!(h, hash_password("frogs are cool").unwrap());
    }

    #[test]
    fn sessions() {
        ensure_logging();

        let mut sessions = Sessions::new();
        let grad = profile(7, "grad@alum.fisk.edu", Role::Alumni, false);
        let key = sessions.issue(&grad, Duration::from_secs(60));
        assert_eq!(key.len(), KEY_LENGTH);

        let s = sessions.get(&key).unwrap();
        assert_eq!((s.profile_id, s.role), (7, Role::Alumni));
        assert!(!s.onboarding_complete);
        assert!(sessions.get("nope").is_none());

        sessions.set_onboarding_complete(7);
        assert!(sessions.get(&key).unwrap().onboarding_complete);

        assert!(sessions.revoke(&key).is_some());
        assert!(sessions.get(&key).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn sessions_expire() {
        let mut sessions = Sessions::new();
        let kid = profile(3, "kid@my.fisk.edu", Role::Student, true);

        let stale = sessions.issue(&kid, Duration::ZERO);
        assert!(sessions.get(&stale).is_none());
        assert_eq!(sessions.len(), 0);

        let _ = sessions.issue(&kid, Duration::ZERO);
        let fresh = sessions.issue(&kid, Duration::from_secs(60));
        // Issuing purges the stale one.
        assert_eq!(sessions.len(), 1);
        assert!(sessions.get(&fresh).is_some());
        assert!(sessions.signed_in(3));
        assert!(!sessions.signed_in(4));

        sessions.revoke(&fresh);
        assert!(!sessions.signed_in(3));
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn credentials() {
        ensure_logging();

        let db = Db::new(TEST_CONNECTION.to_owned());
        db.ensure_db_schema().await.unwrap();

        db.add_user("Grad@alum.fisk.edu", "hunter22").await.unwrap();
        assert!(db.add_user("grad@alum.fisk.edu", "other").await.is_err());

        assert_eq!(
            db.check_password("grad@alum.fisk.edu", "hunter22").await.unwrap(),
            AuthResult::Ok
        );
        assert_eq!(
            db.check_password("GRAD@alum.fisk.edu", "hunter2").await.unwrap(),
            AuthResult::BadPassword
        );
        assert_eq!(
            db.check_password("nobody@alum.fisk.edu", "hunter22").await.unwrap(),
            AuthResult::NoSuchUser
        );

        db.nuke_database().await.unwrap();
    }
}
