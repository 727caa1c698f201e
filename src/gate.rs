/*!
Deciding who gets to see what.

Every route under `/student`, `/alumni`, or `/admin` belongs to the role of
the same name. A request for one of those routes is checked against the
signed-in user (if any) and either allowed through or redirected somewhere
more appropriate. `inter::gate_middleware()` applies [`check`] to every
request before it reaches a handler.
*/
use crate::user::{Domains, Role};

const LOGIN: &str = "/login";
const ONBOARDING: &str = "/alumni/onboarding";

/// What the gate knows about whoever is making the request.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewer<'a> {
    pub email: &'a str,
    /// The role stored on the profile, which may in principle disagree with
    /// the role implied by the email domain.
    pub profile_role: Role,
    pub onboarding_complete: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Proceed,
    Redirect(String),
}

/// Whether `path` is `prefix` or a path underneath it.
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The role whose subtree `path` falls under, if any.
pub fn path_role(path: &str) -> Option<Role> {
    Role::ALL.iter()
        .find(|r| under(path, r.prefix()))
        .copied()
}

fn login_with_return(path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", path)
        .finish();
    format!("{}?{}", LOGIN, &query)
}

/**
Decide whether the request for `path` by `viewer` may proceed.

The rules are applied in order:

  1. Paths outside the role subtrees are open to everyone.
  2. Nobody signed in: off to the login page, remembering where they were
     headed.
  3. An email that maps to no role: off to the login page.
  4. A user in somebody else's subtree: back to their own dashboard.
  5. The admin subtree additionally requires an admin profile.
  6. Alumni who haven't finished onboarding get sent to the onboarding
     wizard from anywhere in their subtree except the wizard itself.
*/
pub fn check(path: &str, viewer: Option<&Viewer>, domains: &Domains) -> Verdict {
    log::trace!("gate::check( {:?}, {:?} ) called.", path, &viewer);

    let path_role = match path_role(path) {
        Some(role) => role,
        None => { return Verdict::Proceed; },
    };

    let viewer = match viewer {
        Some(v) if !v.email.is_empty() => v,
        _ => { return Verdict::Redirect(login_with_return(path)); },
    };

    let email_role = match Role::from_email(viewer.email, domains) {
        Some(role) => role,
        None => { return Verdict::Redirect(LOGIN.to_owned()); },
    };

    if email_role != path_role {
        return Verdict::Redirect(email_role.dashboard().to_owned());
    }

    match path_role {
        Role::Admin => {
            if viewer.profile_role != Role::Admin {
                return Verdict::Redirect(LOGIN.to_owned());
            }
        },
        Role::Alumni => {
            if viewer.profile_role == Role::Alumni
                && !viewer.onboarding_complete
                && !path.ends_with("/onboarding")
            {
                return Verdict::Redirect(ONBOARDING.to_owned());
            }
        },
        Role::Student => {},
    }

    Verdict::Proceed
}

/// Accept `redirect` only if it's a path on this site.
pub fn sanitize_redirect(redirect: &str) -> Option<&str> {
    let redirect = redirect.trim();
    if redirect.starts_with('/')
        && !redirect.starts_with("//")
        && !redirect.contains('\\')
    {
        Some(redirect)
    } else {
        None
    }
}

/**
Where to send somebody who has just logged in.

Unfinished alumni always land in the onboarding wizard. Otherwise a
requested (local) redirect wins, falling back to the dashboard for the
profile's role.
*/
pub fn login_destination(
    profile_role: Role,
    onboarding_complete: bool,
    redirect: Option<&str>,
) -> String {
    if profile_role == Role::Alumni && !onboarding_complete {
        return ONBOARDING.to_owned();
    }

    match redirect.and_then(sanitize_redirect) {
        Some(path) => path.to_owned(),
        None => profile_role.dashboard().to_owned(),
    }
}

/// Where to send somebody who has just signed up.
///
/// New alumni will get bounced from here into onboarding by [`check`].
pub fn signup_destination(role: Role) -> &'static str {
    role.dashboard()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn viewer(email: &str, profile_role: Role, onboarding_complete: bool) -> Viewer {
        Viewer { email, profile_role, onboarding_complete }
    }

    fn redirect(s: &str) -> Verdict {
        Verdict::Redirect(s.to_owned())
    }

    #[test]
    fn path_roles() {
        assert_eq!(path_role("/student"), Some(Role::Student));
        assert_eq!(path_role("/student/find-alumni"), Some(Role::Student));
        assert_eq!(path_role("/alumni/events/3/rsvp"), Some(Role::Alumni));
        assert_eq!(path_role("/admin/users"), Some(Role::Admin));
        assert_eq!(path_role("/administrivia"), None);
        assert_eq!(path_role("/"), None);
        assert_eq!(path_role("/login"), None);
        assert_eq!(path_role("/static/alma.css"), None);
        assert_eq!(path_role("/signup"), None);
    }

    #[test]
    fn open_paths_proceed() {
        ensure_logging();
        let d = Domains::default();
        assert_eq!(check("/", None, &d), Verdict::Proceed);
        assert_eq!(check("/login", None, &d), Verdict::Proceed);
        let v = viewer("who@gmail.com", Role::Student, true);
        assert_eq!(check("/signup", Some(&v), &d), Verdict::Proceed);
    }

    #[test]
    fn anonymous_goes_to_login() {
        let d = Domains::default();
        assert_eq!(
            check("/student/opportunities", None, &d),
            redirect("/login?redirect=%2Fstudent%2Fopportunities")
        );
        let v = viewer("", Role::Student, true);
        assert_eq!(check("/admin", Some(&v), &d), redirect("/login?redirect=%2Fadmin"));
    }

    #[test]
    fn unknown_domain_goes_to_login() {
        let d = Domains::default();
        let v = viewer("someone@gmail.com", Role::Student, true);
        assert_eq!(check("/student", Some(&v), &d), redirect("/login"));
    }

    #[test]
    fn wrong_subtree_goes_home() {
        let d = Domains::default();

        let s = viewer("kid@my.fisk.edu", Role::Student, true);
        assert_eq!(check("/admin/users", Some(&s), &d), redirect("/student"));
        assert_eq!(check("/alumni", Some(&s), &d), redirect("/student"));
        assert_eq!(check("/student/find-alumni", Some(&s), &d), Verdict::Proceed);

        let a = viewer("grad@alum.fisk.edu", Role::Alumni, true);
        assert_eq!(check("/student", Some(&a), &d), redirect("/alumni"));
        assert_eq!(check("/alumni/donate", Some(&a), &d), Verdict::Proceed);

        let m = viewer("dean@fisk.edu", Role::Admin, true);
        assert_eq!(check("/alumni/events", Some(&m), &d), redirect("/admin"));
        assert_eq!(check("/admin/events", Some(&m), &d), Verdict::Proceed);
    }

    #[test]
    fn admin_subtree_requires_admin_profile() {
        let d = Domains::default();
        let v = viewer("dean@fisk.edu", Role::Student, true);
        assert_eq!(check("/admin", Some(&v), &d), redirect("/login"));
    }

    #[test]
    fn unfinished_alumni_onboard_first() {
        let d = Domains::default();
        let v = viewer("grad@alum.fisk.edu", Role::Alumni, false);

        assert_eq!(check("/alumni", Some(&v), &d), redirect("/alumni/onboarding"));
        assert_eq!(check("/alumni/events", Some(&v), &d), redirect("/alumni/onboarding"));
        assert_eq!(check("/alumni/onboarding", Some(&v), &d), Verdict::Proceed);
        // The wrong-subtree rule still comes first.
        assert_eq!(check("/student", Some(&v), &d), redirect("/alumni"));
        // Open paths stay open.
        assert_eq!(check("/", Some(&v), &d), Verdict::Proceed);
    }

    #[test]
    fn redirect_sanitizing() {
        assert_eq!(sanitize_redirect("/student/opportunities"), Some("/student/opportunities"));
        assert_eq!(sanitize_redirect("//evil.example.com"), None);
        assert_eq!(sanitize_redirect("https://evil.example.com"), None);
        assert_eq!(sanitize_redirect("/\\evil.example.com"), None);
        assert_eq!(sanitize_redirect(""), None);
    }

    #[test]
    fn login_destinations() {
        assert_eq!(login_destination(Role::Alumni, false, Some("/alumni/events")), "/alumni/onboarding");
        assert_eq!(login_destination(Role::Alumni, true, None), "/alumni");
        assert_eq!(login_destination(Role::Alumni, true, Some("/alumni/events")), "/alumni/events");
        assert_eq!(login_destination(Role::Student, true, None), "/student");
        assert_eq!(login_destination(Role::Student, true, Some("//evil.example.com")), "/student");
        assert_eq!(login_destination(Role::Admin, true, Some("")), "/admin");
        assert_eq!(signup_destination(Role::Alumni), "/alumni");
    }
}
