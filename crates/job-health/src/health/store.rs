use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::{info, warn};

use super::domain::{HealthProfile, JobId, ProfileId};
use super::repository::{JobAssignments, ProfileStore, ProfileStoreError};
use super::validation::validate_profile;

/// Accepts either a single profile document or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileDocument {
    Many(Vec<HealthProfile>),
    One(HealthProfile),
}

/// Parse profile JSON in the persistence format.
pub fn parse_profiles(raw: &str) -> Result<Vec<HealthProfile>, ProfileStoreError> {
    let document: ProfileDocument =
        serde_json::from_str(raw).map_err(|err| ProfileStoreError::Parse(err.to_string()))?;

    Ok(match document {
        ProfileDocument::Many(profiles) => profiles,
        ProfileDocument::One(profile) => vec![profile],
    })
}

pub fn load_profiles(path: impl AsRef<Path>) -> Result<Vec<HealthProfile>, ProfileStoreError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|err| {
        ProfileStoreError::Unavailable(format!("failed to read {}: {err}", path.display()))
    })?;
    parse_profiles(&raw)
}

struct StoredProfile {
    version: u64,
    profile: Arc<HealthProfile>,
}

/// Versioned, copy-on-write profile store held in memory.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<ProfileId, StoredProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles<I>(profiles: I) -> Result<Self, ProfileStoreError>
    where
        I: IntoIterator<Item = HealthProfile>,
    {
        let store = Self::new();
        for profile in profiles {
            store.save(profile)?;
        }
        Ok(store)
    }

    /// Build a store from every profile that passes validation.
    ///
    /// Invalid profiles are logged and returned alongside the store rather than
    /// rejecting the whole set.
    pub fn with_valid_profiles<I>(profiles: I) -> (Self, Vec<(ProfileId, ProfileStoreError)>)
    where
        I: IntoIterator<Item = HealthProfile>,
    {
        let store = Self::new();
        let mut rejected = Vec::new();
        for profile in profiles {
            let profile_id = profile.id.clone();
            if let Err(error) = store.save(profile) {
                warn!(profile_id = %profile_id, %error, "skipping invalid health profile");
                rejected.push((profile_id, error));
            }
        }
        (store, rejected)
    }

    /// Validate and store a profile, returning its new version.
    ///
    /// Readers holding the previous `Arc` keep seeing the previous rule set.
    pub fn save(&self, profile: HealthProfile) -> Result<u64, ProfileStoreError> {
        validate_profile(&profile)?;

        let mut guard = self
            .profiles
            .write()
            .map_err(|_| ProfileStoreError::Unavailable("profile lock poisoned".to_string()))?;

        let version = guard
            .get(&profile.id)
            .map(|stored| stored.version + 1)
            .unwrap_or(1);
        let id = profile.id.clone();

        info!(profile_id = %id, version, rules = profile.rules.len(), "health profile saved");
        guard.insert(
            id,
            StoredProfile {
                version,
                profile: Arc::new(profile),
            },
        );
        Ok(version)
    }

    pub fn remove(&self, id: &ProfileId) -> Result<Option<Arc<HealthProfile>>, ProfileStoreError> {
        let mut guard = self
            .profiles
            .write()
            .map_err(|_| ProfileStoreError::Unavailable("profile lock poisoned".to_string()))?;
        Ok(guard.remove(id).map(|stored| stored.profile))
    }

    pub fn version(&self, id: &ProfileId) -> Result<Option<u64>, ProfileStoreError> {
        let guard = self
            .profiles
            .read()
            .map_err(|_| ProfileStoreError::Unavailable("profile lock poisoned".to_string()))?;
        Ok(guard.get(id).map(|stored| stored.version))
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn fetch(&self, id: &ProfileId) -> Result<Option<Arc<HealthProfile>>, ProfileStoreError> {
        let guard = self
            .profiles
            .read()
            .map_err(|_| ProfileStoreError::Unavailable("profile lock poisoned".to_string()))?;
        Ok(guard.get(id).map(|stored| Arc::clone(&stored.profile)))
    }

    fn list(&self) -> Result<Vec<Arc<HealthProfile>>, ProfileStoreError> {
        let guard = self
            .profiles
            .read()
            .map_err(|_| ProfileStoreError::Unavailable("profile lock poisoned".to_string()))?;
        let mut profiles: Vec<_> = guard
            .values()
            .map(|stored| Arc::clone(&stored.profile))
            .collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }
}

/// Job-to-profile assignments held in memory.
#[derive(Default)]
pub struct InMemoryJobAssignments {
    assignments: RwLock<HashMap<JobId, ProfileId>>,
}

impl InMemoryJobAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, job_id: JobId, profile_id: ProfileId) {
        if let Ok(mut guard) = self.assignments.write() {
            guard.insert(job_id, profile_id);
        }
    }
}

impl JobAssignments for InMemoryJobAssignments {
    fn profile_for(&self, job_id: &JobId) -> Option<ProfileId> {
        self.assignments.read().ok()?.get(job_id).cloned()
    }
}
