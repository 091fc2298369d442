//! Listing form structures and submission outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Filter values for one report request, keyed by form field name.
///
/// Built per (program, term) combination and consumed by one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    fields: BTreeMap<String, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a filter value, replacing any previous value for the field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A plain input field extracted from the listing form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputField {
    /// The `type` attribute (defaults to "text")
    pub kind: String,

    /// The `value` attribute (may be empty)
    pub value: String,
}

/// One option of a select field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// The `value` attribute submitted to the server
    pub value: String,

    /// Visible option text
    pub text: String,

    /// Whether the option is marked as selected by default
    pub selected: bool,
}

/// Structure of the listing form as extracted from one page fetch.
///
/// Anti-forgery tokens are single-use in the portal's security model, so a
/// descriptor is discarded after one submission.
#[derive(Debug, Clone, Default)]
pub struct FormDescriptor {
    /// Submission target URL (possibly relative)
    pub action: String,

    /// HTTP method, lowercased
    pub method: String,

    /// Input fields by name
    pub inputs: BTreeMap<String, InputField>,

    /// Select fields by name, options in document order
    pub selects: BTreeMap<String, Vec<SelectOption>>,

    /// Token from the `authenticity_token` hidden input
    pub authenticity_token: Option<String>,

    /// Token from the `csrf-token` meta tag
    pub csrf_token: Option<String>,
}

/// Result of submitting the listing form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The portal accepted the request and queued a report job.
    Accepted {
        report_id: String,
        redirect_url: String,
    },

    /// The portal rejected the request.
    Rejected { reason: String },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Report id if the submission was accepted.
    pub fn report_id(&self) -> Option<&str> {
        match self {
            Self::Accepted { report_id, .. } => Some(report_id),
            Self::Rejected { .. } => None,
        }
    }
}
