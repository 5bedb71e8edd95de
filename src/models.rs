use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// Remote ids arrive as either JSON numbers or strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

// Saved-job rows reference their job by id or by a nested job object.
fn deserialize_job_ref<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRef {
        Number(i64),
        Text(String),
        Object {
            #[serde(deserialize_with = "deserialize_id")]
            id: String,
        },
    }

    Ok(match RawRef::deserialize(deserializer)? {
        RawRef::Number(n) => n.to_string(),
        RawRef::Text(s) => s,
        RawRef::Object { id } => id,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default, alias = "company_name")]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary: Option<String>, // free-text compensation, e.g. "$90k - $120k"
    #[serde(default)]
    pub job_type: Option<String>, // "FT", "PT", "CT", "IN", ...
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "apply_url", alias = "url")]
    pub apply_link: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Job {
    /// Builds a job snapshot for an application the user tracks by hand.
    /// The id is derived from title and company so the same posting maps to
    /// the same job id.
    pub fn manual(title: &str, company: Option<&str>, apply_link: Option<&str>) -> Self {
        let mut key = title.to_string();
        if let Some(company) = company {
            key.push(' ');
            key.push_str(company);
        }
        let slug = key
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        Job {
            id: format!("manual-{}", slug),
            title: title.to_string(),
            company: company.map(str::to_string),
            location: None,
            salary: None,
            job_type: None,
            description: None,
            apply_link: apply_link.map(str::to_string),
            created_at: Some(Utc::now().to_rfc3339()),
            updated_at: None,
        }
    }

    pub fn employment_label(&self) -> Option<&'static str> {
        self.job_type.as_deref().map(employment_label)
    }

    /// Description with any HTML markup stripped and whitespace collapsed.
    pub fn plain_description(&self) -> Option<String> {
        let raw = self.description.as_deref()?;
        let fragment = Html::parse_fragment(raw);
        let text = fragment
            .root_element()
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() { None } else { Some(text) }
    }
}

pub fn employment_label(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "FT" | "FULL_TIME" | "FULL-TIME" => "Full-time",
        "PT" | "PART_TIME" | "PART-TIME" => "Part-time",
        "CT" | "CONTRACT" => "Contract",
        "IN" | "INTERNSHIP" => "Internship",
        "TP" | "TEMPORARY" => "Temporary",
        "RM" | "REMOTE" => "Remote",
        _ => "Other",
    }
}

/// Paginated envelope used by the external job API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedJob {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "job", alias = "job_id", deserialize_with = "deserialize_job_ref")]
    pub job_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Basic-auth credentials for the external job API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Applied,
    Viewed,
    Interviewed,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Viewed,
        ApplicationStatus::Interviewed,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Viewed => "viewed",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::validation(format!(
                    "unknown application status '{}' (expected applied, viewed, interviewed, accepted or rejected)",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedJob {
    pub id: String,
    pub job_id: String,
    pub user_id: String,
    pub job: Job, // snapshot at application time
    pub applied_at: DateTime<Utc>,
    pub application_status: ApplicationStatus,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Account record issued by the bespoke backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default, alias = "photoURL", alias = "photo_url")]
    pub avatar: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

/// User as reported by the identity provider's session events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// Response envelope of the bespoke backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    New,
    Read,
    Replied,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(ContactStatus::New),
            "read" => Ok(ContactStatus::Read),
            "replied" => Ok(ContactStatus::Replied),
            _ => Err(Error::validation(format!(
                "unknown contact status '{}' (expected new, read or replied)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    pub status: ContactStatus,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// Uniform result shape for calls that must not fail past their boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}
