use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::models::AppliedJob;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const IDENTITY_USER_KEY: &str = "identityUser";
pub const API_CREDENTIALS_KEY: &str = "jobApiCredentials";

pub fn applied_jobs_key(user_id: &str) -> String {
    format!("appliedJobs_{}", user_id)
}

/// String slots addressed by key, last write wins.
pub trait KeyValueStore {
    fn get_value(&self, key: &str) -> Result<Option<String>>;
    fn set_value(&self, key: &str, value: &str) -> Result<()>;
    fn remove_value(&self, key: &str) -> Result<()>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get_value(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set_value(key, &raw)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        (**self).get_value(key)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_value(key, value)
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        (**self).remove_value(key)
    }
}

/// Per-user application state. The tracker only talks to this trait, so
/// the persistence mechanism behind it can change freely.
pub trait ApplicationStore {
    fn get(&self, user_id: &str) -> Result<Vec<AppliedJob>>;
    fn put(&self, user_id: &str, applications: &[AppliedJob]) -> Result<()>;
}

impl<S: KeyValueStore> ApplicationStore for S {
    fn get(&self, user_id: &str) -> Result<Vec<AppliedJob>> {
        Ok(self.get_json(&applied_jobs_key(user_id))?.unwrap_or_default())
    }

    fn put(&self, user_id: &str, applications: &[AppliedJob]) -> Result<()> {
        self.put_json(&applied_jobs_key(user_id), applications)
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::KeyValueStore;
    use crate::error::Result;

    /// Process-local store, used where nothing should touch disk.
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        slots: RefCell<HashMap<String, String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl KeyValueStore for MemoryStore {
        fn get_value(&self, key: &str) -> Result<Option<String>> {
            Ok(self.slots.borrow().get(key).cloned())
        }

        fn set_value(&self, key: &str, value: &str) -> Result<()> {
            self.slots.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_value(&self, key: &str) -> Result<()> {
            self.slots.borrow_mut().remove(key);
            Ok(())
        }
    }
}
