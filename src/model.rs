// Request and response shapes for the patient endpoints.

use crate::error::{PmsError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A patient as returned by the service. Every field is optional because
/// the backend owns the record; we only display what it sends. `id` is
/// kept as a raw JSON value since deployments disagree on UUID vs integer.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_date: Option<String>,
}

impl Patient {
    /// `id` rendered without JSON quoting, empty when absent.
    pub fn id_text(&self) -> String {
        match &self.id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Body sent on create and update.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PatientPayload {
    pub name: String,
    pub email: String,
    pub address: String,
    pub date_of_birth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_date: Option<String>,
}

/// Fields the operator supplies for a new patient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub email: String,
    pub address: String,
    pub date_of_birth: String,
}

impl NewPatient {
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("address", &self.address),
        ] {
            if value.trim().is_empty() {
                return Err(PmsError::invalid(format!("{label} must not be empty")));
            }
        }
        parse_date(&self.date_of_birth)?;
        Ok(())
    }

    /// Build the wire body, stamping `registeredDate` with `registered`.
    pub fn into_payload(self, registered: NaiveDate) -> PatientPayload {
        PatientPayload {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            address: self.address.trim().to_string(),
            date_of_birth: self.date_of_birth.trim().to_string(),
            registered_date: Some(format_date(registered)),
        }
    }
}

/// Edits to an existing patient. A blank field keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientUpdate {
    pub name: String,
    pub email: String,
    pub address: String,
    pub date_of_birth: String,
}

impl PatientUpdate {
    pub fn merge_onto(&self, existing: &Patient) -> PatientPayload {
        fn pick(edit: &str, current: &Option<String>) -> String {
            let edit = edit.trim();
            if edit.is_empty() {
                current.clone().unwrap_or_default()
            } else {
                edit.to_string()
            }
        }
        PatientPayload {
            name: pick(&self.name, &existing.name),
            email: pick(&self.email, &existing.email),
            address: pick(&self.address, &existing.address),
            date_of_birth: pick(&self.date_of_birth, &existing.date_of_birth),
            registered_date: None,
        }
    }
}

/// Exactly one search criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    Name(String),
    Email(String),
}

impl SearchFilter {
    /// Blank values count as not supplied.
    pub fn from_options(name: Option<&str>, email: Option<&str>) -> Result<Self> {
        fn given(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }
        match (given(name), given(email)) {
            (Some(n), None) => Ok(SearchFilter::Name(n.to_string())),
            (None, Some(e)) => Ok(SearchFilter::Email(e.to_string())),
            (Some(_), Some(_)) => Err(PmsError::invalid(
                "search by name or by email, not both",
            )),
            (None, None) => Err(PmsError::invalid("search needs a name or an email")),
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            SearchFilter::Name(_) => "name",
            SearchFilter::Email(_) => "email",
        }
    }

    pub fn query(&self) -> &str {
        match self {
            SearchFilter::Name(q) | SearchFilter::Email(q) => q,
        }
    }
}

/// Today's date on the local clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        PmsError::invalid(format!("date `{}` is not in YYYY-MM-DD form", raw.trim()))
    })
}
