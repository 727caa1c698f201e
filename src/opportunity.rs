/*!
Opportunities: internships, jobs, and the like, posted by alumni for
students.
*/
use serde::Deserialize;
use time::OffsetDateTime;

use crate::blank_means_none;

token_enum! {
    pub enum OpportunityType {
        Internship => ("internship", "Internship"),
        Job => ("job", "Job"),
        Research => ("research", "Research"),
        Volunteer => ("volunteer", "Volunteer"),
        Project => ("project", "Project"),
        Other => ("other", "Other"),
    }
}

token_enum! {
    pub enum OpportunityStatus {
        Open => ("open", "Open"),
        Closed => ("closed", "Closed"),
    }
}

#[derive(Clone, Debug)]
pub struct Opportunity {
    pub id: i64,
    pub author_id: i64,
    /// Joined in from the author's profile.
    pub author_name: Option<String>,
    pub title: String,
    pub description: String,
    pub kind: OpportunityType,
    pub company: Option<String>,
    pub location: Option<String>,
    pub is_remote: bool,
    pub link: Option<String>,
    pub tags: Vec<String>,
    pub status: OpportunityStatus,
    pub created_at: OffsetDateTime,
}

/// Form data from the "post an opportunity" form.
#[derive(Deserialize, Debug, Default)]
pub struct OpportunityForm {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub is_remote: Option<String>,
    pub link: Option<String>,
    pub tags: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewOpportunity {
    pub title: String,
    pub description: String,
    pub kind: OpportunityType,
    pub company: Option<String>,
    pub location: Option<String>,
    pub is_remote: bool,
    pub link: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Comma-separated tags, with blanks dropped.
fn split_tags(s: Option<&str>) -> Option<Vec<String>> {
    let tags: Vec<String> = s.unwrap_or("")
        .split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_owned())
        .collect();

    if tags.is_empty() { None } else { Some(tags) }
}

impl NewOpportunity {
    pub fn from_form(form: &OpportunityForm) -> Result<NewOpportunity, String> {
        let title = match blank_means_none(Some(&form.title)) {
            Some(s) => s,
            None => { return Err("An opportunity needs a title.".to_owned()); },
        };
        let description = match blank_means_none(Some(&form.description)) {
            Some(s) => s,
            None => { return Err("An opportunity needs a description.".to_owned()); },
        };
        let kind = match blank_means_none(form.kind.as_deref()) {
            Some(s) => s.parse()?,
            None => OpportunityType::Job,
        };

        Ok(NewOpportunity {
            title,
            description,
            kind,
            company: blank_means_none(form.company.as_deref()),
            location: blank_means_none(form.location.as_deref()),
            // Checkboxes are only submitted when checked.
            is_remote: form.is_remote.is_some(),
            link: blank_means_none(form.link.as_deref()),
            tags: split_tags(form.tags.as_deref()),
        })
    }
}

/// Query parameters for narrowing down the opportunity board.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct OpportunityFilter {
    #[serde(default)]
    pub search: String,
    /// An `OpportunityType` token, or `"all"`.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub location: String,
}

fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    match haystack {
        Some(h) => h.to_lowercase().contains(needle_lower),
        None => false,
    }
}

impl OpportunityFilter {
    pub fn matches(&self, o: &Opportunity) -> bool {
        let search = self.search.trim().to_lowercase();
        let matches_search = search.is_empty()
            || contains_ci(Some(&o.title), &search)
            || contains_ci(Some(&o.description), &search)
            || contains_ci(o.company.as_deref(), &search);

        let matches_type = match self.kind.as_str() {
            "" | "all" => true,
            token => o.kind.token() == token,
        };

        let location = self.location.trim().to_lowercase();
        let matches_location = location.is_empty()
            || contains_ci(o.location.as_deref(), &location);

        matches_search && matches_type && matches_location
    }

    pub fn apply<'a>(&self, opps: &'a [Opportunity]) -> Vec<&'a Opportunity> {
        opps.iter().filter(|o| self.matches(o)).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn opportunity(
        id: i64,
        title: &str,
        kind: OpportunityType,
        company: Option<&str>,
        location: Option<&str>,
    ) -> Opportunity {
        Opportunity {
            id,
            author_id: 1,
            author_name: Some("Grace Grad".to_owned()),
            title: title.to_owned(),
            description: format!("All about {}.", title),
            kind,
            company: company.map(String::from),
            location: location.map(String::from),
            is_remote: false,
            link: None,
            tags: vec![],
            status: OpportunityStatus::Open,
            created_at: crate::now(),
        }
    }

    fn board() -> Vec<Opportunity> {
        vec![
            opportunity(1, "Data Analyst", OpportunityType::Job, Some("Acme"), Some("Nashville, TN")),
            opportunity(2, "Summer Research", OpportunityType::Research, None, Some("Remote")),
            opportunity(3, "Campus Cleanup", OpportunityType::Volunteer, Some("Fisk"), None),
        ]
    }

    fn ids(filter: &OpportunityFilter) -> Vec<i64> {
        let b = board();
        filter.apply(&b).iter().map(|o| o.id).collect()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(ids(&OpportunityFilter::default()), vec![1, 2, 3]);
        let f = OpportunityFilter { kind: "all".to_owned(), ..Default::default() };
        assert_eq!(ids(&f), vec![1, 2, 3]);
    }

    #[test]
    fn search_looks_at_title_description_and_company() {
        let f = OpportunityFilter { search: "ANALYST".to_owned(), ..Default::default() };
        assert_eq!(ids(&f), vec![1]);
        let f = OpportunityFilter { search: "about summer".to_owned(), ..Default::default() };
        assert_eq!(ids(&f), vec![2]);
        let f = OpportunityFilter { search: "fisk".to_owned(), ..Default::default() };
        assert_eq!(ids(&f), vec![3]);
    }

    #[test]
    fn type_and_location_narrow() {
        let f = OpportunityFilter { kind: "research".to_owned(), ..Default::default() };
        assert_eq!(ids(&f), vec![2]);

        // Opportunities without a location never match a location filter.
        let f = OpportunityFilter { location: "n".to_owned(), ..Default::default() };
        assert_eq!(ids(&f), vec![1]);

        let f = OpportunityFilter {
            search: "a".to_owned(),
            kind: "job".to_owned(),
            location: "nashville".to_owned(),
        };
        assert_eq!(ids(&f), vec![1]);
    }

    #[test]
    fn new_opportunity_from_form() {
        let form = OpportunityForm {
            title: "  Intern  ".to_owned(),
            description: "Fetch coffee.".to_owned(),
            kind: Some("internship".to_owned()),
            company: Some("".to_owned()),
            location: Some(" Atlanta ".to_owned()),
            is_remote: Some("on".to_owned()),
            link: None,
            tags: Some(" rust, ,web ,".to_owned()),
        };
        let n = NewOpportunity::from_form(&form).unwrap();
        assert_eq!(n.title, "Intern");
        assert_eq!(n.kind, OpportunityType::Internship);
        assert_eq!(n.company, None);
        assert_eq!(n.location.as_deref(), Some("Atlanta"));
        assert!(n.is_remote);
        assert_eq!(n.tags, Some(vec!["rust".to_owned(), "web".to_owned()]));
    }

    #[test]
    fn new_opportunity_defaults_and_errors() {
        let form = OpportunityForm {
            title: "Job".to_owned(),
            description: "Work.".to_owned(),
            ..Default::default()
        };
        let n = NewOpportunity::from_form(&form).unwrap();
        assert_eq!(n.kind, OpportunityType::Job);
        assert_eq!(n.tags, None);
        assert!(!n.is_remote);

        let form = OpportunityForm { title: " ".to_owned(), ..Default::default() };
        assert!(NewOpportunity::from_form(&form).is_err());

        let form = OpportunityForm {
            title: "Job".to_owned(),
            description: "Work.".to_owned(),
            kind: Some("gig".to_owned()),
            ..Default::default()
        };
        assert!(NewOpportunity::from_form(&form).is_err());
    }
}
