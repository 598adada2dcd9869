use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// Forms the application can queue while offline. Each one is delivered to
/// its own fixed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Registration,
    Volunteer,
    Contact,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Registration => "registration",
            FormType::Volunteer => "volunteer",
            FormType::Contact => "contact",
        }
    }

    /// Remote path the submission is POSTed to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            FormType::Registration => "/api/registration",
            FormType::Volunteer => "/api/volunteer",
            FormType::Contact => "/api/contact",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(FormType::Registration),
            "volunteer" => Ok(FormType::Volunteer),
            "contact" => Ok(FormType::Contact),
            _ => Err(ParseError::new("form type", s)),
        }
    }
}

/// Payload stored for a `form-submission` record.
///
/// The form type is kept as a plain string so a record written with a type
/// this build does not know still loads and can be failed explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    #[serde(rename = "formType")]
    pub form_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl FormSubmission {
    pub fn new(form_type: FormType, data: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            form_type: form_type.as_str().to_string(),
            data,
            timestamp,
        }
    }

    pub fn form_type(&self) -> Result<FormType, ParseError> {
        self.form_type.parse()
    }
}
