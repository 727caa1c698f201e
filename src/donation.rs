/*!
Donations from alumni.
*/
use serde::Deserialize;
use time::OffsetDateTime;

use crate::blank_means_none;

token_enum! {
    pub enum Purpose {
        Scholarships => ("scholarships", "Scholarships"),
        CampusImprovements => ("campus improvements", "Campus Improvements"),
        StudentEmergencyFund => ("student emergency fund", "Student Emergency Fund"),
        General => ("general", "General"),
        Other => ("other", "Other"),
    }
}

#[derive(Clone, Debug)]
pub struct Donation {
    pub id: i64,
    pub donor_id: Option<i64>,
    /// Joined in from the donor's profile.
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub amount: f64,
    pub purpose: Purpose,
    pub message: Option<String>,
    pub is_anonymous: bool,
    pub created_at: OffsetDateTime,
}

impl Donation {
    /// How the donor should be shown on the administrators' list.
    pub fn donor_label(&self) -> &str {
        if self.is_anonymous {
            "Anonymous"
        } else if let Some(name) = &self.donor_name {
            name.as_str()
        } else if let Some(email) = &self.donor_email {
            email.as_str()
        } else {
            "—"
        }
    }
}

pub fn total(donations: &[Donation]) -> f64 {
    donations.iter().map(|d| d.amount).sum()
}

/// Format a dollar amount with two decimal places.
pub fn dollars(amount: f64) -> String {
    format!("${:.2}", amount)
}

#[derive(Deserialize, Debug, Default)]
pub struct DonationForm {
    pub amount: String,
    pub purpose: Option<String>,
    pub message: Option<String>,
    pub is_anonymous: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewDonation {
    pub amount: f64,
    pub purpose: Purpose,
    pub message: Option<String>,
    pub is_anonymous: bool,
}

impl NewDonation {
    pub fn from_form(form: &DonationForm) -> Result<NewDonation, String> {
        let amount: f64 = match form.amount.trim().parse() {
            Ok(x) => x,
            Err(_) => {
                return Err(format!("{:?} is not an amount of money.", form.amount.trim()));
            },
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err("A donation must be more than nothing.".to_owned());
        }

        let purpose = match blank_means_none(form.purpose.as_deref()) {
            Some(s) => s.parse()?,
            None => Purpose::General,
        };

        Ok(NewDonation {
            amount,
            purpose,
            message: blank_means_none(form.message.as_deref()),
            is_anonymous: form.is_anonymous.is_some(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use float_cmp::approx_eq;

    pub fn donation(amount: f64, name: Option<&str>, anonymous: bool) -> Donation {
        Donation {
            id: 0,
            donor_id: Some(1),
            donor_name: name.map(String::from),
            donor_email: Some("grad@alum.fisk.edu".to_owned()),
            amount,
            purpose: Purpose::General,
            message: None,
            is_anonymous: anonymous,
            created_at: crate::now(),
        }
    }

    #[test]
    fn totals() {
        let v = vec![
            donation(25.0, Some("Grace"), false),
            donation(100.10, None, true),
            donation(0.2, None, false),
        ];
        assert!(approx_eq!(f64, total(&v), 125.3, epsilon = 1e-9));
        assert!(approx_eq!(f64, total(&[]), 0.0));
        assert_eq!(dollars(total(&v)), "$125.30");
    }

    #[test]
    fn donor_labels() {
        assert_eq!(donation(1.0, Some("Grace"), false).donor_label(), "Grace");
        assert_eq!(donation(1.0, Some("Grace"), true).donor_label(), "Anonymous");
        assert_eq!(donation(1.0, None, false).donor_label(), "grad@alum.fisk.edu");

        let mut d = donation(1.0, None, false);
        d.donor_email = None;
        assert_eq!(d.donor_label(), "—");
    }

    #[test]
    fn from_form() {
        let d = NewDonation::from_form(&DonationForm {
            amount: " 50.25 ".to_owned(),
            purpose: Some("student emergency fund".to_owned()),
            message: Some("Go Bulldogs".to_owned()),
            is_anonymous: Some("on".to_owned()),
        }).unwrap();
        assert!(approx_eq!(f64, d.amount, 50.25));
        assert_eq!(d.purpose, Purpose::StudentEmergencyFund);
        assert!(d.is_anonymous);

        let d = NewDonation::from_form(&DonationForm {
            amount: "10".to_owned(),
            ..Default::default()
        }).unwrap();
        assert_eq!(d.purpose, Purpose::General);
        assert_eq!(d.message, None);

        for bad in ["", "0", "-5", "NaN", "inf", "ten"] {
            let f = DonationForm { amount: bad.to_owned(), ..Default::default() };
            assert!(NewDonation::from_form(&f).is_err(), "{:?} accepted", bad);
        }
    }
}
