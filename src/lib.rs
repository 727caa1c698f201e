/*!
A small community server for the students, alumni, and staff of a
university: opportunity boards, event requests, announcements, donations,
and a search-assisted way for students to find alumni mentors.

Everybody signs up with an institutional email address, and the domain of
that address decides which part of the site they get to see.
*/
use time::{
    format_description::FormatItem,
    macros::format_description,
    OffsetDateTime,
};

/**
Declares a fieldless enum whose variants are stored in the database and
submitted in forms as short lowercase tokens, along with a human-readable
label for each.
*/
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => ($token:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub fn token(&self) -> &'static str {
                match self {
                    $( $name::$variant => $token ),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.token())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $token => Ok($name::$variant), )+
                    _ => Err(format!(
                        "{:?} is not a valid {}.", s, stringify!($name)
                    )),
                }
            }
        }
    };
}

pub mod announcement;
pub mod auth;
pub mod config;
pub mod donation;
pub mod event;
pub mod gate;
pub mod inter;
pub mod onboarding;
pub mod opportunity;
pub mod sourcing;
pub mod store;
pub mod user;

/// Display format for dates (`Mar 4, 2025`).
pub const DATE_FMT: &[FormatItem] = format_description!(
    "[month repr:short] [day padding:none], [year]"
);

/// Display format for dates with times (`Mar 4, 2025, 6:30 PM`).
pub const DATETIME_FMT: &[FormatItem] = format_description!(
    "[month repr:short] [day padding:none], [year], [hour repr:12 padding:none]:[minute] [period]"
);

pub fn log_level_from_env() -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => { return LevelFilter::Warn; },
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    match level_string.as_str() {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Trims `s`, and returns `None` if nothing is left.
///
/// Optional form fields come in as empty strings rather than missing, and
/// they should be stored as NULL.
pub fn blank_means_none(s: Option<&str>) -> Option<String> {
    match s {
        Some(s) => match s.trim() {
            "" => None,
            x => Some(x.to_owned()),
        },
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn ensure_logging() {
        use simplelog::{TermLogger, TerminalMode, ColorChoice};
        let log_cfg = simplelog::ConfigBuilder::new()
            .add_filter_allow_str("alma")
            .build();
        let res = TermLogger::init(
            log_level_from_env(),
            log_cfg,
            TerminalMode::Stdout,
            ColorChoice::Auto
        );

        match res {
            Ok(_) => { log::info!("Test logging started."); },
            Err(_) => { log::info!("Test logging already started."); },
        }
    }

    #[test]
    fn blanks_become_none() {
        assert_eq!(blank_means_none(None), None);
        assert_eq!(blank_means_none(Some("")), None);
        assert_eq!(blank_means_none(Some("   \t")), None);
        assert_eq!(blank_means_none(Some("  Nashville, TN ")), Some("Nashville, TN".to_owned()));
    }

    #[test]
    fn dates_format() {
        let d = time::macros::datetime!(2025-03-04 18:30 UTC);
        assert_eq!(d.format(DATE_FMT).unwrap(), "Mar 4, 2025");
        assert_eq!(d.format(DATETIME_FMT).unwrap(), "Mar 4, 2025, 6:30 PM");
    }
}
