use serde_json::json;
use tracing::info;

use crate::auth::validate_email;
use crate::backend::{into_data, Backend, Method};
use crate::error::{Error, Result};
use crate::models::{Contact, ContactDraft, ContactStatus};

const MAX_MESSAGE_CHARS: usize = 2000;

impl ContactDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        validate_email(&self.email)?;
        if self.message.trim().is_empty() {
            return Err(Error::validation("message is required"));
        }
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::validation(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(())
    }
}

/// Contact-form messages on the backend. Submitting is public; reading and
/// managing messages needs a session token.
pub struct ContactClient<'a, B: Backend> {
    backend: B,
    token: Option<&'a str>,
}

impl<'a, B: Backend> ContactClient<'a, B> {
    pub fn new(backend: B, token: Option<&'a str>) -> Self {
        Self { backend, token }
    }

    pub fn submit(&self, draft: &ContactDraft) -> Result<Contact> {
        draft.validate()?;
        let body = serde_json::to_value(draft)?;
        let envelope = self.backend.send(Method::Post, "/contacts", Some(&body), None)?;
        let contact: Contact = into_data(envelope)?;
        info!(id = %contact.id, "contact message submitted");
        Ok(contact)
    }

    pub fn list(&self) -> Result<Vec<Contact>> {
        let envelope = self.backend.send(Method::Get, "/contacts", None, Some(self.token()?))?;
        into_data(envelope)
    }

    pub fn get(&self, id: &str) -> Result<Contact> {
        let path = format!("/contacts/{}", id);
        let envelope = self.backend.send(Method::Get, &path, None, Some(self.token()?))?;
        into_data::<Option<Contact>>(envelope)?
            .ok_or_else(|| Error::not_found(format!("contact {}", id)))
    }

    pub fn update_status(&self, id: &str, status: ContactStatus) -> Result<Contact> {
        let path = format!("/contacts/{}/status", id);
        let body = json!({ "status": status });
        let envelope = self.backend.send(Method::Patch, &path, Some(&body), Some(self.token()?))?;
        into_data(envelope)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = format!("/contacts/{}", id);
        self.backend.send(Method::Delete, &path, None, Some(self.token()?))?;
        info!(id, "contact message deleted");
        Ok(())
    }

    fn token(&self) -> Result<&'a str> {
        self.token.ok_or_else(|| Error::auth("log in to manage contact messages"))
    }
}
