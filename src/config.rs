/*!
Structs to hold configuration data and global variables.
*/
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{
    auth, auth::{AuthResult, Sessions},
    onboarding::{MockImporter, Wizard},
    sourcing::SourcingClient,
    store::Store,
    user::{Domains, NewProfile, Role},
};

/// Environment variable consulted for the config file path when none is
/// given on the command line.
pub const CONFIG_ENV_VAR: &str = "ALMA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Deserialize)]
struct ConfigFile {
    auth_db_connect_string: Option<String>,
    data_db_connect_string: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,
    admin_name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    templates_dir: Option<String>,
    static_dir: Option<String>,
    student_domain: Option<String>,
    alumni_domain: Option<String>,
    admin_domain: Option<String>,
    sourcing_api_url: Option<String>,
    session_hours: Option<u64>,
    import_delay_ms: Option<u64>,
    min_password_length: Option<usize>,
}

#[derive(Debug)]
pub struct Cfg {
    pub auth_db_connect_string: String,
    pub data_db_connect_string: String,
    pub default_admin_email: String,
    pub default_admin_password: String,
    pub default_admin_name: String,
    pub addr: SocketAddr,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    pub domains: Domains,
    pub sourcing_api_url: Option<String>,
    pub session_ttl: Duration,
    pub import_delay: Duration,
    pub min_password_length: usize,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            auth_db_connect_string: "host=localhost user=alma_test password='alma_test' dbname=alma_auth_test".to_owned(),
            data_db_connect_string: "host=localhost user=alma_test password='alma_test' dbname=alma_store_test".to_owned(),
            default_admin_email: "admin@fisk.edu".to_owned(),
            default_admin_password: "changeme".to_owned(),
            default_admin_name: "Administrator".to_owned(),
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8001),
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            domains: Domains::default(),
            sourcing_api_url: None,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            import_delay: Duration::from_millis(2000),
            min_password_length: 6,
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!(
                "Unable to read config file {}: {}", path.display(), &e
            ))?;

        Self::from_toml(&file_contents)
    }

    /// Overlay whatever is set in `toml_str` on top of the defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(toml_str)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.auth_db_connect_string {
            c.auth_db_connect_string = s;
        }
        if let Some(s) = cf.data_db_connect_string {
            c.data_db_connect_string = s;
        }
        if let Some(s) = cf.admin_email {
            c.default_admin_email = s;
        }
        if let Some(s) = cf.admin_password {
            c.default_admin_password = s;
        }
        if let Some(s) = cf.admin_name {
            c.default_admin_name = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.templates_dir {
            c.templates_dir = PathBuf::from(s);
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = PathBuf::from(s);
        }
        if let Some(s) = cf.student_domain {
            c.domains.student = s.to_lowercase();
        }
        if let Some(s) = cf.alumni_domain {
            c.domains.alumni = s.to_lowercase();
        }
        if let Some(s) = cf.admin_domain {
            c.domains.admin = s.to_lowercase();
        }
        if let Some(s) = cf.sourcing_api_url {
            c.sourcing_api_url = crate::blank_means_none(Some(&s));
        }
        if let Some(n) = cf.session_hours {
            c.session_ttl = Duration::from_secs(n * 60 * 60);
        }
        if let Some(n) = cf.import_delay_ms {
            c.import_delay = Duration::from_millis(n);
        }
        if let Some(n) = cf.min_password_length {
            c.min_password_length = n;
        }

        Ok(c)
    }
}

/// The config file path: the first command-line argument if there is one,
/// else `$ALMA_CONFIG`, else `config.toml`.
pub fn config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    match arg.or(env) {
        Some(s) => PathBuf::from(s),
        None => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/**
This guy will haul around some global variables and be passed in an
`axum::Extension` to the handlers who need him.
*/
pub struct Glob {
    auth: Arc<RwLock<auth::Db>>,
    data: Arc<RwLock<Store>>,
    sessions: Arc<RwLock<Sessions>>,
    /// Onboarding wizards in progress, by profile id.
    pub wizards: HashMap<i64, Wizard>,
    pub importer: MockImporter,
    pub sourcing: SourcingClient,
    pub domains: Domains,
    pub min_password_length: usize,
    pub session_ttl: Duration,
}

impl Glob {
    /// Assemble global state from `cfg` without touching either database.
    pub fn new(cfg: &Cfg) -> Result<Glob, String> {
        let sourcing = SourcingClient::new(cfg.sourcing_api_url.clone())?;
        if !sourcing.is_configured() {
            log::warn!("No sourcing_api_url configured; alumni search is disabled.");
        }

        let glob = Glob {
            auth: Arc::new(RwLock::new(auth::Db::new(cfg.auth_db_connect_string.clone()))),
            data: Arc::new(RwLock::new(Store::new(cfg.data_db_connect_string.clone()))),
            sessions: Arc::new(RwLock::new(Sessions::new())),
            wizards: HashMap::new(),
            importer: MockImporter::new(cfg.import_delay),
            sourcing,
            domains: cfg.domains.clone(),
            min_password_length: cfg.min_password_length,
            session_ttl: cfg.session_ttl,
        };

        Ok(glob)
    }

    pub fn auth(&self) -> Arc<RwLock<auth::Db>> { self.auth.clone() }

    pub fn data(&self) -> Arc<RwLock<Store>> { self.data.clone() }

    pub fn sessions(&self) -> Arc<RwLock<Sessions>> { self.sessions.clone() }

    /// Drop expired sessions, and the onboarding wizards of anybody who no
    /// longer has a session.
    pub async fn purge_expired(&mut self) {
        let sessions = self.sessions.clone();
        let mut sessions = sessions.write().await;
        sessions.purge_expired();

        let before = self.wizards.len();
        self.wizards.retain(|id, _| sessions.signed_in(*id));
        let dropped = before - self.wizards.len();
        if dropped > 0 {
            log::debug!("Discarded {} abandoned onboarding wizards.", dropped);
        }
    }
}

/// Make sure the default admin has both a profile and credentials.
async fn ensure_default_admin(
    cfg: &Cfg,
    auth_db: &auth::Db,
    data_db: &Store,
) -> Result<(), String> {
    log::trace!("Checking existence of default Admin in data DB...");

    if Role::from_email(&cfg.default_admin_email, &cfg.domains) != Some(Role::Admin) {
        log::warn!(
            "Default Admin email {:?} is not in the admin domain ({}); they won't get past the gate.",
            &cfg.default_admin_email, &cfg.domains.admin
        );
    }

    match data_db.get_profile_by_email(&cfg.default_admin_email).await {
        Err(e) => {
            return Err(format!(
                "Error attempting to check existence of default Admin ({}) in data DB: {}",
                &cfg.default_admin_email, &e
            ));
        },
        Ok(None) => {
            log::info!(
                "Default Admin ({}) doesn't exist in data DB; inserting.",
                &cfg.default_admin_email
            );
            let np = NewProfile {
                email: cfg.default_admin_email.clone(),
                full_name: Some(cfg.default_admin_name.clone()),
                role: Role::Admin,
                onboarding_complete: true,
            };
            data_db.insert_profile(&np).await
                .map_err(|e| format!("Error inserting default Admin into data DB: {}", &e))?;
        },
        Ok(Some(p)) => {
            if p.role != Role::Admin {
                log::warn!(
                    "Default Admin ({}) exists in data DB as {}.",
                    &cfg.default_admin_email, &p.role
                );
            }
        },
    }
    log::trace!("Default Admin OK in data DB.");

    log::trace!("Checking existence of default Admin in auth DB...");
    match auth_db.check_password(
        &cfg.default_admin_email,
        &cfg.default_admin_password,
    ).await {
        Err(e) => {
            return Err(format!(
                "Error checking existence of default Admin in auth DB: {}", &e
            ));
        },
        Ok(AuthResult::BadPassword) => {
            log::warn!(
                "Default Admin ({}) not using default password.",
                &cfg.default_admin_email
            );
        },
        Ok(AuthResult::NoSuchUser) => {
            log::info!(
                "Default Admin ({}) doesn't exist in auth DB; inserting.",
                &cfg.default_admin_email
            );
            auth_db.add_user(&cfg.default_admin_email, &cfg.default_admin_password).await
                .map_err(|e| format!("Error inserting default Admin into auth DB: {}", &e))?;
        },
        Ok(AuthResult::Ok) => {
            log::trace!("Default Admin password check OK.");
        },
    }
    log::trace!("Default Admin OK in auth DB.");

    Ok(())
}

/// Loads system configuration and ensures all appropriate database tables
/// exist.
///
/// Also assures existence of default admin.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<(Cfg, Glob), String> {
    let cfg = Cfg::from_file(path.as_ref())?;
    log::info!("Configuration file read:\n{:#?}", &cfg);

    log::trace!("Checking state of auth DB...");
    let auth_db = auth::Db::new(cfg.auth_db_connect_string.clone());
    if let Err(e) = auth_db.ensure_db_schema().await {
        return Err(format!("Unable to ensure state of auth DB: {}", &e));
    }
    log::trace!("...auth DB okay.");

    log::trace!("Checking state of data DB...");
    let data_db = Store::new(cfg.data_db_connect_string.clone());
    if let Err(e) = data_db.ensure_db_schema().await {
        return Err(format!("Unable to ensure state of data DB: {}", &e));
    }
    log::trace!("...data DB okay.");

    ensure_default_admin(&cfg, &auth_db, &data_db).await?;

    let glob = Glob::new(&cfg)?;
    if glob.sourcing.is_configured() {
        match glob.sourcing.health().await {
            Ok(h) => log::info!(
                "Search service is {:?} with {} profiles indexed.",
                &h.status, h.profiles_indexed
            ),
            Err(e) => log::warn!("Search service isn't answering yet: {}", &e),
        }
    }

    Ok((cfg, glob))
}
