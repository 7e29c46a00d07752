//! Student records.
//!
//! Field names on the wire follow the backend's `alunos` table.

use crate::error::RosterError;
use chrono::{Months, NaiveDate};
use gymdesk_core::{StudentId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days before the end date at which a membership counts as expiring.
pub const EXPIRY_WARNING_DAYS: i64 = 5;

/// Membership plan. Stored under its Portuguese name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    #[serde(rename = "Mensal")]
    Monthly,
    #[serde(rename = "Trimestral")]
    Quarterly,
    #[serde(rename = "Anual")]
    Annual,
}

impl Plan {
    /// All plans, in the order the form offers them.
    pub const ALL: [Self; 3] = [Self::Monthly, Self::Quarterly, Self::Annual];

    /// How long one term of the plan lasts.
    #[must_use]
    pub fn term(self) -> Months {
        match self {
            Self::Monthly => Months::new(1),
            Self::Quarterly => Months::new(3),
            Self::Annual => Months::new(12),
        }
    }

    /// The stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "Mensal",
            Self::Quarterly => "Trimestral",
            Self::Annual => "Anual",
        }
    }

    /// Last day of a term starting on `start`.
    ///
    /// Month arithmetic clamps to the end of a shorter month, so a monthly
    /// plan starting on 31 January ends on the last day of February.
    #[must_use]
    pub fn end_date(self, start: NaiveDate) -> NaiveDate {
        start
            .checked_add_months(self.term())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = RosterError;

    /// Accepts the stored names and their English equivalents, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mensal" | "monthly" => Ok(Self::Monthly),
            "trimestral" | "quarterly" => Ok(Self::Quarterly),
            "anual" | "annual" | "yearly" => Ok(Self::Annual),
            _ => Err(RosterError::InvalidPlan {
                value: s.to_string(),
            }),
        }
    }
}

/// Where a membership stands relative to its end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    /// Ends within `EXPIRY_WARNING_DAYS` days, today included.
    Expiring,
    /// The end date has passed.
    Expired,
}

impl MembershipStatus {
    /// Classifies a membership ending on `end` as seen on `today`.
    #[must_use]
    pub fn on(end: NaiveDate, today: NaiveDate) -> Self {
        let days_left = end.signed_duration_since(today).num_days();
        if days_left < 0 {
            Self::Expired
        } else if days_left <= EXPIRY_WARNING_DAYS {
            Self::Expiring
        } else {
            Self::Active
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Active => "active",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
        })
    }
}

/// Validated student data, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFields {
    /// Full name.
    #[serde(rename = "nome")]
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone.
    #[serde(rename = "telefone", default)]
    pub phone: Option<String>,
    /// Photo as a data URI. Opaque to gymdesk.
    #[serde(rename = "foto", default)]
    pub photo: Option<String>,
    /// Training modality.
    #[serde(rename = "modalidade")]
    pub modality: String,
    /// Membership plan.
    #[serde(rename = "plano")]
    pub plan: Plan,
    /// First day of membership.
    #[serde(rename = "data_inicio")]
    pub start_date: NaiveDate,
}

/// A stored student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Store-assigned id.
    pub id: StudentId,
    /// Student data.
    #[serde(flatten)]
    pub fields: StudentFields,
    /// Instructor who registered the student, if any.
    #[serde(rename = "professor_id", default)]
    pub instructor_id: Option<UserId>,
}

impl Student {
    /// Last day of the current membership term.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.fields.plan.end_date(self.fields.start_date)
    }

    /// Membership status as seen on `today`.
    #[must_use]
    pub fn status(&self, today: NaiveDate) -> MembershipStatus {
        MembershipStatus::on(self.end_date(), today)
    }
}

/// Which students a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentFilter {
    /// Every student.
    All,
    /// Students registered by this instructor.
    Instructor(UserId),
}

impl StudentFilter {
    /// Returns true if the student passes the filter.
    #[must_use]
    pub fn matches(&self, student: &Student) -> bool {
        match self {
            Self::All => true,
            Self::Instructor(id) => student.instructor_id.as_ref() == Some(id),
        }
    }
}

/// Unvalidated student form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo: Option<String>,
    pub modality: String,
    pub plan: String,
    /// `DD-MM-YYYY` or `YYYY-MM-DD`.
    pub start_date: String,
}

impl StudentDraft {
    /// Pre-fills a draft from a stored student, for editing.
    #[must_use]
    pub fn from_student(student: &Student) -> Self {
        let fields = &student.fields;
        Self {
            name: fields.name.clone(),
            email: fields.email.clone().unwrap_or_default(),
            phone: fields.phone.clone().unwrap_or_default(),
            photo: fields.photo.clone(),
            modality: fields.modality.clone(),
            plan: fields.plan.to_string(),
            start_date: fields.start_date.format("%d-%m-%Y").to_string(),
        }
    }

    /// Checks required fields and parses the start date.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for the first empty required field,
    /// `InvalidPlan` for an unknown plan, or `InvalidDate` if the start date
    /// does not parse.
    pub fn validate(&self) -> Result<StudentFields, RosterError> {
        let name = required("name", &self.name)?;
        let modality = required("modality", &self.modality)?;
        let plan = required("plan", &self.plan)?.parse::<Plan>()?;
        let start_date = parse_start_date(required("start_date", &self.start_date)?)?;

        Ok(StudentFields {
            name: name.to_string(),
            email: optional(&self.email),
            phone: optional(&self.phone),
            photo: self.photo.as_deref().and_then(optional),
            modality: modality.to_string(),
            plan,
            start_date,
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, RosterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterError::MissingField { field });
    }
    Ok(trimmed)
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parses a start date typed as `DD-MM-YYYY`, also accepting ISO dates.
///
/// # Errors
///
/// Returns `InvalidDate` if neither format matches.
pub fn parse_start_date(value: &str) -> Result<NaiveDate, RosterError> {
    NaiveDate::parse_from_str(value, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| RosterError::InvalidDate {
            value: value.to_string(),
        })
}
