/*!
Announcements posted to the community.
*/
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{blank_means_none, user::Role};

token_enum! {
    pub enum Audience {
        All => ("all", "All"),
        Students => ("students", "Students"),
        Alumni => ("alumni", "Alumni"),
        Admin => ("admin", "Admin"),
    }
}

impl Audience {
    /// Whether somebody with `role` is meant to see announcements addressed
    /// to this audience. Administrators see everything.
    pub fn includes(&self, role: Role) -> bool {
        match (self, role) {
            (Audience::All, _) => true,
            (_, Role::Admin) => true,
            (Audience::Students, Role::Student) => true,
            (Audience::Alumni, Role::Alumni) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Announcement {
    pub id: i64,
    pub author_id: i64,
    pub author_name: Option<String>,
    pub title: String,
    pub content: String,
    pub audience: Audience,
    pub pinned: bool,
    pub created_at: OffsetDateTime,
}

impl Announcement {
    pub fn visible_to(&self, role: Role) -> bool {
        self.audience.includes(role)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AnnouncementForm {
    pub title: String,
    pub content: String,
    pub audience: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub audience: Audience,
}

impl NewAnnouncement {
    pub fn from_form(form: &AnnouncementForm) -> Result<NewAnnouncement, String> {
        let title = match blank_means_none(Some(&form.title)) {
            Some(s) => s,
            None => { return Err("An announcement needs a title.".to_owned()); },
        };
        let content = match blank_means_none(Some(&form.content)) {
            Some(s) => s,
            None => { return Err("An announcement needs some content.".to_owned()); },
        };
        let audience = match blank_means_none(form.audience.as_deref()) {
            Some(s) => s.parse()?,
            None => Audience::All,
        };

        Ok(NewAnnouncement { title, content, audience })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn ann(id: i64, pinned: bool, created_at: OffsetDateTime) -> Announcement {
        Announcement {
            id,
            author_id: 1,
            author_name: None,
            title: format!("Announcement {}", id),
            content: "Hear ye.".to_owned(),
            audience: Audience::All,
            pinned,
            created_at,
        }
    }

    #[test]
    fn who_sees_what() {
        let mut a = ann(1, false, datetime!(2025-01-01 0:00 UTC));
        assert!(a.visible_to(Role::Alumni));

        a.audience = Audience::Students;
        assert!(a.visible_to(Role::Student));
        assert!(a.visible_to(Role::Admin));
        assert!(!a.visible_to(Role::Alumni));
    }

    #[test]
    fn audiences() {
        assert!(Audience::All.includes(Role::Student));
        assert!(Audience::Students.includes(Role::Student));
        assert!(!Audience::Students.includes(Role::Alumni));
        assert!(Audience::Alumni.includes(Role::Admin));
        assert!(!Audience::Admin.includes(Role::Alumni));
    }

    #[test]
    fn from_form() {
        let n = NewAnnouncement::from_form(&AnnouncementForm {
            title: " Reunion ".to_owned(),
            content: "Class of 2005!".to_owned(),
            audience: Some("alumni".to_owned()),
        }).unwrap();
        assert_eq!(n.title, "Reunion");
        assert_eq!(n.audience, Audience::Alumni);

        let n = NewAnnouncement::from_form(&AnnouncementForm {
            title: "Reunion".to_owned(),
            content: "Class of 2005!".to_owned(),
            audience: None,
        }).unwrap();
        assert_eq!(n.audience, Audience::All);

        assert!(NewAnnouncement::from_form(&AnnouncementForm {
            title: "Reunion".to_owned(),
            content: "".to_owned(),
            audience: None,
        }).is_err());
    }
}
