/*!
Client for the external alumni-sourcing search service behind the
"find a mentor" page.

The service takes a free-text description of the help a student wants and
answers with a list of alumni who might provide it:

```text
POST {base}/search
{ "query": "I want to be a data analyst" }

200 OK
{ "alumni": [ { "id": "...", "fullName": "...", ... }, ... ] }
```

Failures come back with a non-2xx status and possibly `{ "detail": "..." }`.
`GET {base}/health` answers `{ "status": "ok", "profiles_indexed": N }`.
*/
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::user::Profile;

/// How many skills fit on a result card.
const CARD_SKILLS: usize = 5;
/// How much of a bio makes it into `about_snippet`.
const SNIPPET_CHARS: usize = 200;

const TIMEOUT: Duration = Duration::from_secs(30);

pub static SUGGESTED_PROMPTS: &[&str] = &[
    "I really want to work as a law consultant",
    "I want to be a data analyst and I need some career advice",
    "I need help with my resume review.",
    "I am having hard time managing my finances and I need some help from my network.",
];

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourcedAlumni {
    pub id: String,
    pub full_name: String,
    pub headline: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub location: Option<String>,
    pub about_snippet: Option<String>,
    pub skills: Option<Vec<String>>,
    pub linkedin_url: Option<String>,
    pub photo: Option<String>,
    pub relevance_score: Option<f64>,
}

impl SourcedAlumni {
    /**
    Describe one of our own alumni the way the search service describes its
    results, so they can be saved as favorites alongside them.

    Ids are prefixed with `profile-` to keep them apart from the service's.
    */
    pub fn from_profile(p: &Profile, score: f64) -> SourcedAlumni {
        let about_snippet = p.bio.as_deref().map(|bio| {
            if bio.chars().count() > SNIPPET_CHARS {
                let mut snip: String = bio.chars().take(SNIPPET_CHARS).collect();
                snip.push('…');
                snip
            } else {
                bio.to_owned()
            }
        });

        SourcedAlumni {
            id: format!("profile-{}", p.id),
            full_name: p.display_name().to_owned(),
            headline: p.headline(),
            current_title: p.current_title.clone(),
            current_company: p.current_company.clone(),
            location: p.location.clone(),
            about_snippet,
            skills: if p.skills.is_empty() { None } else { Some(p.skills.clone()) },
            linkedin_url: p.linkedin_url.clone(),
            photo: None,
            relevance_score: Some((score * 10_000.0).round() / 10_000.0),
        }
    }

    /// The first few skills, for display on a card.
    pub fn card_skills(&self) -> &[String] {
        match &self.skills {
            Some(skills) => &skills[..skills.len().min(CARD_SKILLS)],
            None => &[],
        }
    }

    /**
    A made-up address in the alumni `domain` for contacting this person.

    First initial, then the last name with anything but letters, digits
    and underscores removed, then a digit taken from the last hex digit of
    the id (zero or unreadable becomes 1).
    */
    pub fn mock_email(&self, domain: &str) -> String {
        let parts: Vec<&str> = self.full_name.split_whitespace().collect();
        let first = parts.first().copied().unwrap_or("");
        let last = parts.last().copied().unwrap_or("");

        let initial: String = first.chars().take(1).collect::<String>().to_lowercase();
        let last: String = last.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        let n = self.id.chars().last()
            .and_then(|c| c.to_digit(16))
            .map(|d| d % 10)
            .filter(|d| *d != 0)
            .unwrap_or(1);

        format!("{}{}{}@{}", &initial, &last, n, domain)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    alumni: Vec<SourcedAlumni>,
}

/// What the service says about itself.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub profiles_indexed: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Option<serde_json::Value>,
}

#[derive(Debug, PartialEq)]
pub enum SourcingError {
    NotConfigured,
    EmptyQuery,
    Transport(String),
    Upstream(String),
}

impl std::fmt::Display for SourcingError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SourcingError::NotConfigured => write!(f, "Search is not configured."),
            SourcingError::EmptyQuery => write!(f, "Describe the help you need."),
            SourcingError::Transport(s) => write!(f, "{}", s),
            SourcingError::Upstream(s) => write!(f, "{}", s),
        }
    }
}

impl From<reqwest::Error> for SourcingError {
    fn from(e: reqwest::Error) -> Self {
        SourcingError::Transport(format!("Search failed: {}", &e))
    }
}

/// Pull a message out of an error response body.
fn error_detail(body: &str, status: reqwest::StatusCode) -> String {
    let detail = serde_json::from_str::<ErrorResponse>(body).ok()
        .and_then(|r| r.detail)
        .and_then(|v| match v {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Null => None,
            serde_json::Value::String(_) => None,
            other => Some(other.to_string()),
        });

    match detail {
        Some(s) => s,
        None => match status.canonical_reason() {
            Some(reason) => reason.to_owned(),
            None => "Search failed".to_owned(),
        },
    }
}

#[derive(Clone, Debug)]
pub struct SourcingClient {
    base: Option<String>,
    http: reqwest::Client,
}

impl SourcingClient {
    /// `base` is the service's URL; `None` means there isn't one, and every
    /// search fails with `SourcingError::NotConfigured`.
    pub fn new(base: Option<String>) -> Result<Self, String> {
        let base = base
            .map(|s| s.trim().trim_end_matches('/').to_owned())
            .filter(|s| !s.is_empty());
        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| format!("Unable to build HTTP client: {}", &e))?;

        Ok(Self { base, http })
    }

    pub fn is_configured(&self) -> bool {
        self.base.is_some()
    }

    pub async fn health(&self) -> Result<Health, SourcingError> {
        log::trace!("SourcingClient::health() called.");

        let base = match &self.base {
            Some(base) => base,
            None => { return Err(SourcingError::NotConfigured); },
        };

        let response = self.http
            .get(format!("{}/health", base))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourcingError::Upstream(error_detail(&body, status)));
        }

        Ok(response.json().await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SourcedAlumni>, SourcingError> {
        log::trace!("SourcingClient::search( {:?} ) called.", query);

        let base = match &self.base {
            Some(base) => base,
            None => { return Err(SourcingError::NotConfigured); },
        };
        let query = query.trim();
        if query.is_empty() {
            return Err(SourcingError::EmptyQuery);
        }

        let response = self.http
            .post(format!("{}/search", base))
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body, status);
            log::warn!("Search service returned {}: {}", &status, &detail);
            return Err(SourcingError::Upstream(detail));
        }

        let data: SearchResponse = response.json().await?;
        log::debug!("Search for {:?} found {} alumni.", query, data.alumni.len());
        Ok(data.alumni)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    use crate::user::{tests::profile, Role};

    use axum::{http::StatusCode, routing::{get, post}, Json, Router};

    pub fn sourced(id: &str, full_name: &str) -> SourcedAlumni {
        SourcedAlumni {
            id: id.to_owned(),
            full_name: full_name.to_owned(),
            headline: None,
            current_title: Some("Analyst".to_owned()),
            current_company: None,
            location: None,
            about_snippet: None,
            skills: None,
            linkedin_url: None,
            photo: None,
            relevance_score: None,
        }
    }

    #[test]
    fn mock_emails() {
        let d = "alum.fisk.edu";
        assert_eq!(sourced("abc7", "Ada Lovelace").mock_email(d), "alovelace7@alum.fisk.edu");
        // f = 15 -> 5
        assert_eq!(sourced("9f", "W. E. B. Du Bois").mock_email(d), "wbois5@alum.fisk.edu");
        // 0 and non-hex both become 1
        assert_eq!(sourced("a0", "Nikki Giovanni").mock_email(d), "ngiovanni1@alum.fisk.edu");
        assert_eq!(sourced("xyz", "Nikki Giovanni").mock_email(d), "ngiovanni1@alum.fisk.edu");
        assert_eq!(sourced("", "Ida B. Wells-Barnett").mock_email(d), "iwellsbarnett1@alum.fisk.edu");
        assert_eq!(sourced("3", "Cher").mock_email(d), "ccher3@alum.fisk.edu");
    }

    #[test]
    fn from_our_own_profiles() {
        let mut p = profile(42, "grace@alum.fisk.edu", Role::Alumni, true);
        p.full_name = Some("Grace Hopper".to_owned());
        p.current_title = Some("Rear Admiral".to_owned());
        p.current_company = Some("US Navy".to_owned());
        p.skills = vec!["COBOL".to_owned(), "Compilers".to_owned()];
        p.bio = Some("x".repeat(250));

        let a = SourcedAlumni::from_profile(&p, 0.123456);
        assert_eq!(&a.id, "profile-42");
        assert_eq!(&a.full_name, "Grace Hopper");
        assert_eq!(a.headline.as_deref(), Some("Rear Admiral @ US Navy"));
        assert_eq!(a.card_skills(), &["COBOL".to_owned(), "Compilers".to_owned()]);
        assert_eq!(a.relevance_score, Some(0.1235));
        let about = a.about_snippet.as_deref().unwrap();
        assert_eq!(about.chars().count(), 201);
        assert!(about.ends_with('…'));
        assert_eq!(a.mock_email("alum.fisk.edu"), "ghopper2@alum.fisk.edu");

        // Survives the trip through a favorites form field.
        let json = serde_json::to_string(&a).unwrap();
        let back: SourcedAlumni = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);

        p.skills.clear();
        p.bio = Some("Short.".to_owned());
        p.full_name = None;
        let a = SourcedAlumni::from_profile(&p, 1.0);
        assert_eq!(&a.full_name, "grace@alum.fisk.edu");
        assert_eq!(a.skills, None);
        assert_eq!(a.about_snippet.as_deref(), Some("Short."));
    }

    #[test]
    fn card_skills() {
        let mut a = sourced("1", "A B");
        assert!(a.card_skills().is_empty());
        a.skills = Some((1..=7).map(|n| format!("skill {}", n)).collect());
        assert_eq!(a.card_skills().len(), 5);
        assert_eq!(a.card_skills()[4], "skill 5");
        a.skills = Some(vec!["one".to_owned()]);
        assert_eq!(a.card_skills(), &["one".to_owned()]);
    }

    #[test]
    fn wire_format() {
        let body = r#"{"alumni": [{
            "id": "rec1", "fullName": "Ada Lovelace", "currentTitle": "Analyst",
            "linkedinUrl": "https://linkedin.com/in/ada", "skills": ["math"],
            "relevanceScore": 0.9
        }]}"#;
        let r: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(r.alumni[0].full_name, "Ada Lovelace");
        assert_eq!(r.alumni[0].linkedin_url.as_deref(), Some("https://linkedin.com/in/ada"));

        let r: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(r.alumni.is_empty());

        let v = serde_json::to_value(sourced("1", "A B")).unwrap();
        assert_eq!(v["fullName"], "A B");
    }

    #[test]
    fn error_details() {
        let s = reqwest::StatusCode::BAD_GATEWAY;
        assert_eq!(error_detail(r#"{"detail": "Index not loaded"}"#, s), "Index not loaded");
        assert_eq!(error_detail("<html>oops</html>", s), "Bad Gateway");
        assert_eq!(error_detail(r#"{"detail": ""}"#, s), "Bad Gateway");
        let odd = reqwest::StatusCode::from_u16(599).unwrap();
        assert_eq!(error_detail("", odd), "Search failed");
    }

    #[tokio::test]
    async fn refuses_without_url_or_query() {
        let c = SourcingClient::new(None).unwrap();
        assert!(!c.is_configured());
        assert_eq!(c.search("help").await, Err(SourcingError::NotConfigured));
        assert_eq!(c.health().await, Err(SourcingError::NotConfigured));

        let c = SourcingClient::new(Some("http://127.0.0.1:9/".to_owned())).unwrap();
        assert_eq!(c.search("   ").await, Err(SourcingError::EmptyQuery));
        assert_eq!(SourcingError::EmptyQuery.to_string(), "Describe the help you need.");
    }

    async fn fake_search(Json(body): Json<serde_json::Value>) -> (StatusCode, Json<serde_json::Value>) {
        match body["query"].as_str() {
            Some("break") => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": "Index not loaded" })),
            ),
            Some(q) => (
                StatusCode::OK,
                Json(json!({ "alumni": [
                    { "id": "1", "fullName": format!("Match For {}", q) },
                ]})),
            ),
            None => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({}))),
        }
    }

    #[tokio::test]
    async fn searches_service() {
        ensure_logging();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/search", post(fake_search))
            .route("/health", get(|| async {
                Json(json!({ "status": "ok", "profiles_indexed": 3 }))
            }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let c = SourcingClient::new(Some(format!("http://{}/", addr))).unwrap();

        assert_eq!(
            c.health().await.unwrap(),
            Health { status: "ok".to_owned(), profiles_indexed: 3 }
        );

        let found = c.search("  resume  ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "Match For resume");

        assert_eq!(
            c.search("break").await,
            Err(SourcingError::Upstream("Index not loaded".to_owned()))
        );
    }
}
