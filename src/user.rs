/*!
Users, their roles, and their profiles.
*/
use serde::Deserialize;
use time::OffsetDateTime;

use crate::blank_means_none;

token_enum! {
    pub enum Role {
        Student => ("student", "Student"),
        Alumni => ("alumni", "Alumni"),
        Admin => ("admin", "Admin"),
    }
}

impl Role {
    /**
    Determine a role from the domain of an institutional email address.

    Only exact domain matches count; `someone@cs.my.fisk.edu` is nobody.
    */
    pub fn from_email(email: &str, domains: &Domains) -> Option<Role> {
        let email = email.trim().to_lowercase();
        let domain = email.split('@').nth(1).unwrap_or("");

        if domain.is_empty() {
            None
        } else if domain == domains.student {
            Some(Role::Student)
        } else if domain == domains.alumni {
            Some(Role::Alumni)
        } else if domain == domains.admin {
            Some(Role::Admin)
        } else {
            None
        }
    }

    /// Every route belonging to this role lives under this path.
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Alumni  => "/alumni",
            Role::Admin   => "/admin",
        }
    }

    /// Path of the landing page for users of this role.
    pub fn dashboard(&self) -> &'static str {
        self.prefix()
    }
}

/// The email domains that map to each `Role`.
#[derive(Clone, Debug, PartialEq)]
pub struct Domains {
    pub student: String,
    pub alumni: String,
    pub admin: String,
}

impl Default for Domains {
    fn default() -> Self {
        Self {
            student: "my.fisk.edu".to_owned(),
            alumni: "alum.fisk.edu".to_owned(),
            admin: "fisk.edu".to_owned(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    /// Alumni are sent through the onboarding wizard until this is set.
    pub onboarding_complete: bool,
    pub graduation_year: Option<i16>,
    pub major: Option<String>,
    pub location: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub industry: Option<String>,
    pub skills: Vec<String>,
    pub linkedin_url: Option<String>,
    pub open_to_mentor: bool,
    pub open_to_contact: bool,
    pub bio: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        match &self.full_name {
            Some(name) => name.as_str(),
            None => self.email.as_str(),
        }
    }

    /// Up to two characters for an avatar placeholder.
    pub fn initials(&self) -> String {
        self.display_name()
            .chars()
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }

    /// `"Title @ Company"`, or whichever half is present.
    pub fn headline(&self) -> Option<String> {
        headline(self.current_title.as_deref(), self.current_company.as_deref())
    }
}

pub fn headline(title: Option<&str>, company: Option<&str>) -> Option<String> {
    match (title, company) {
        (Some(t), Some(c)) => Some(format!("{} @ {}", t, c)),
        (Some(t), None) => Some(t.to_owned()),
        (None, Some(c)) => Some(c.to_owned()),
        (None, None) => None,
    }
}

/// Data required to insert a brand-new profile.
#[derive(Clone, Debug, PartialEq)]
pub struct NewProfile {
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub onboarding_complete: bool,
}

/// Everything the alumni onboarding wizard writes back to a profile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileUpdate {
    pub graduation_year: Option<i16>,
    pub major: Option<String>,
    pub location: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub industry: Option<String>,
    pub skills: Option<Vec<String>>,
    pub linkedin_url: Option<String>,
    pub open_to_mentor: bool,
    pub open_to_contact: bool,
    pub bio: Option<String>,
    pub onboarding_complete: bool,
}

/// Form data from the signup page.
#[derive(Deserialize, Debug)]
pub struct SignupData {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupData {
    /**
    Check the submitted signup information and produce the profile that
    should be inserted for it.

    The checks happen in the order a person filling out the form would
    want to hear about them: wrong kind of email first, then mismatched
    passwords, then a too-short password.
    */
    pub fn validate(
        &self,
        domains: &Domains,
        min_password_length: usize,
    ) -> Result<NewProfile, String> {
        let role = match Role::from_email(&self.email, domains) {
            Some(role) => role,
            None => {
                return Err("Please use your university email to sign up.".to_owned());
            },
        };

        if self.password != self.confirm_password {
            return Err("Passwords do not match.".to_owned());
        }
        if self.password.chars().count() < min_password_length {
            return Err(format!(
                "Password must be at least {} characters.",
                min_password_length
            ));
        }

        Ok(NewProfile {
            email: self.email.trim().to_owned(),
            full_name: blank_means_none(Some(&self.full_name)),
            role,
            onboarding_complete: role != Role::Alumni,
        })
    }
}
