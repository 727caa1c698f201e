/*!
The wizard newly-registered alumni step through to fill out their profiles.

A `Wizard` lives in memory (keyed by profile id in the `Glob`) from the
first visit to the onboarding page until it is finished, at which point its
contents become a `ProfileUpdate` and it is thrown away.
*/
use std::time::Duration;

use serde::Deserialize;

use crate::{blank_means_none, user::ProfileUpdate};

pub const LATEST_GRADUATION_YEAR: i16 = 2025;
pub const EARLIEST_GRADUATION_YEAR: i16 = 1970;

pub static INDUSTRIES: &[&str] = &[
    "Technology",
    "Healthcare",
    "Finance",
    "Education",
    "Government",
    "Nonprofit",
    "Consulting",
    "Media",
    "Other",
];

/// Graduation years offered on the form, most recent first.
pub fn graduation_years() -> impl Iterator<Item = i16> {
    (EARLIEST_GRADUATION_YEAR..=LATEST_GRADUATION_YEAR).rev()
}

token_enum! {
    pub enum Step {
        Basic => ("basic", "Basic info"),
        Professional => ("professional", "Professional info"),
        Preferences => ("preferences", "Preferences"),
    }
}

impl Step {
    /// 1-based position, for "Step n of 3".
    pub fn number(&self) -> usize {
        match self {
            Step::Basic => 1,
            Step::Professional => 2,
            Step::Preferences => 3,
        }
    }

    fn next(&self) -> Step {
        match self {
            Step::Basic => Step::Professional,
            _ => Step::Preferences,
        }
    }

    fn prev(&self) -> Step {
        match self {
            Step::Preferences => Step::Professional,
            _ => Step::Basic,
        }
    }
}

token_enum! {
    /// Progress of the (pretend) import from a professional network.
    pub enum ImportState {
        Idle => ("idle", "Not connected"),
        Connecting => ("connecting", "Connecting..."),
        Fetched => ("fetched", "Profile imported"),
    }
}

/// What an import from a professional network provides.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedProfile {
    pub current_title: String,
    pub current_company: String,
    pub industry: String,
    pub skills: Vec<String>,
    pub linkedin_url: String,
}

/**
Stands in for a real professional-network integration: waits a moment, then
always returns the same profile.
*/
#[derive(Clone, Debug)]
pub struct MockImporter {
    delay: Duration,
}

impl MockImporter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn fetch(&self) -> ImportedProfile {
        log::trace!("MockImporter::fetch() called; waiting {:?}.", &self.delay);

        tokio::time::sleep(self.delay).await;

        ImportedProfile {
            current_title: "Senior Software Engineer".to_owned(),
            current_company: "Tech Corp".to_owned(),
            industry: "Technology".to_owned(),
            skills: vec![
                "JavaScript".to_owned(),
                "React".to_owned(),
                "Leadership".to_owned(),
            ],
            linkedin_url: "https://linkedin.com/in/example".to_owned(),
        }
    }
}

/// What the wizard's buttons ask for.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Next,
    Back,
    Connect,
    AddSkill,
    RemoveSkill(String),
    Finish,
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Action::Next),
            "back" => Ok(Action::Back),
            "connect" => Ok(Action::Connect),
            "add-skill" => Ok(Action::AddSkill),
            "finish" => Ok(Action::Finish),
            x => match x.strip_prefix("remove-skill:") {
                Some(skill) => Ok(Action::RemoveSkill(skill.to_owned())),
                None => Err(format!("{:?} is not a wizard action.", x)),
            },
        }
    }
}

/// Everything the wizard page can submit. Only the fields for the step
/// being shown will be present.
#[derive(Deserialize, Debug, Default)]
pub struct WizardForm {
    pub action: String,
    pub graduation_year: Option<String>,
    pub major: Option<String>,
    pub location: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub industry: Option<String>,
    pub linkedin_url: Option<String>,
    pub skill: Option<String>,
    pub open_to_mentor: Option<String>,
    pub open_to_contact: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Wizard {
    pub step: Step,
    pub import: ImportState,
    pub graduation_year: Option<i16>,
    pub major: String,
    pub location: String,
    pub current_title: String,
    pub current_company: String,
    pub industry: String,
    pub skills: Vec<String>,
    /// Text typed into the "add a skill" box but not yet added.
    pub skill_input: String,
    pub linkedin_url: String,
    pub open_to_mentor: bool,
    pub open_to_contact: bool,
    pub bio: String,
}

impl Default for Wizard {
    fn default() -> Self {
        Self {
            step: Step::Basic,
            import: ImportState::Idle,
            graduation_year: None,
            major: String::new(),
            location: String::new(),
            current_title: String::new(),
            current_company: String::new(),
            industry: String::new(),
            skills: Vec::new(),
            skill_input: String::new(),
            linkedin_url: String::new(),
            open_to_mentor: false,
            open_to_contact: true,
            bio: String::new(),
        }
    }
}

fn text(s: &Option<String>) -> String {
    s.as_deref().map(|s| s.trim()).unwrap_or("").to_owned()
}

impl Wizard {
    pub fn new() -> Self { Self::default() }

    /**
    Copy the submitted values for the current step into the wizard.

    Checkboxes are only sent when checked, so on the preferences step a
    missing checkbox means "no".
    */
    pub fn apply(&mut self, form: &WizardForm) -> Result<(), String> {
        log::trace!("Wizard::apply( {:?} ) called on step {}.", form, &self.step);

        match self.step {
            Step::Basic => {
                self.graduation_year = match blank_means_none(form.graduation_year.as_deref()) {
                    None => None,
                    Some(s) => {
                        let year: i16 = s.parse().map_err(|_| format!(
                            "{:?} is not a graduation year.", &s
                        ))?;
                        if !(EARLIEST_GRADUATION_YEAR..=LATEST_GRADUATION_YEAR).contains(&year) {
                            return Err(format!(
                                "Graduation year must be between {} and {}.",
                                EARLIEST_GRADUATION_YEAR, LATEST_GRADUATION_YEAR
                            ));
                        }
                        Some(year)
                    },
                };
                self.major = text(&form.major);
                self.location = text(&form.location);
            },
            Step::Professional => {
                let industry = text(&form.industry);
                if !industry.is_empty() && !INDUSTRIES.contains(&industry.as_str()) {
                    return Err(format!("{:?} is not one of the listed industries.", &industry));
                }
                self.industry = industry;
                self.current_title = text(&form.current_title);
                self.current_company = text(&form.current_company);
                self.linkedin_url = text(&form.linkedin_url);
                self.skill_input = text(&form.skill);
            },
            Step::Preferences => {
                self.open_to_mentor = form.open_to_mentor.is_some();
                self.open_to_contact = form.open_to_contact.is_some();
                self.bio = text(&form.bio);
            },
        }

        Ok(())
    }

    pub fn next(&mut self) { self.step = self.step.next(); }

    pub fn back(&mut self) { self.step = self.step.prev(); }

    /// Add whatever is in the skill box, unless it's empty or already there.
    /// Returns whether anything was added.
    pub fn add_skill(&mut self) -> bool {
        let skill = self.skill_input.trim().to_owned();
        if skill.is_empty() || self.skills.contains(&skill) {
            return false;
        }

        self.skills.push(skill);
        self.skill_input.clear();
        true
    }

    pub fn remove_skill(&mut self, skill: &str) {
        self.skills.retain(|s| s != skill);
    }

    pub fn begin_import(&mut self) {
        self.import = ImportState::Connecting;
    }

    /// Overwrite the professional fields with what the import found.
    pub fn complete_import(&mut self, imported: ImportedProfile) {
        log::trace!("Wizard::complete_import( {:?} ) called.", &imported);

        self.current_title = imported.current_title;
        self.current_company = imported.current_company;
        self.industry = imported.industry;
        self.skills = imported.skills;
        self.linkedin_url = imported.linkedin_url;
        self.import = ImportState::Fetched;
    }

    pub fn finish(&self) -> ProfileUpdate {
        log::trace!("Wizard::finish() called.");

        ProfileUpdate {
            graduation_year: self.graduation_year,
            major: blank_means_none(Some(&self.major)),
            location: blank_means_none(Some(&self.location)),
            current_title: blank_means_none(Some(&self.current_title)),
            current_company: blank_means_none(Some(&self.current_company)),
            industry: blank_means_none(Some(&self.industry)),
            skills: if self.skills.is_empty() { None } else { Some(self.skills.clone()) },
            linkedin_url: blank_means_none(Some(&self.linkedin_url)),
            open_to_mentor: self.open_to_mentor,
            open_to_contact: self.open_to_contact,
            bio: blank_means_none(Some(&self.bio)),
            onboarding_complete: true,
        }
    }
}
