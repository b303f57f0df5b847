//! In-memory implementations of the generated petstore traits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use oasgen_runtime::security::{AuthError, Credential, Principal};
use oasgen_runtime::HandlerError;
use tokio::sync::Mutex;

use crate::petstore::security::SecurityHandler;
use crate::petstore::server::*;
use crate::petstore::types::*;

/// Pets kept in a map, ids assigned from 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pets: Mutex<BTreeMap<i64, Pet>>,
    next_id: AtomicI64,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose pet operations always fail, for exercising 500s.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Seed the store with `name` and return its id.
    pub async fn insert(&self, name: &str, status: PetStatus) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let pet = Pet {
            id,
            name: name.to_string(),
            status: Some(status),
            tag: None,
            born: None,
            updated_at: None,
        };
        self.pets.lock().await.insert(id, pet);
        id
    }

    fn check(&self) -> Result<(), HandlerError> {
        if self.failing {
            return Err("pet storage unavailable".into());
        }
        Ok(())
    }
}

impl Handler for MemoryStore {
    async fn health(&self, _request: HealthRequest) -> Result<HealthResponse, HandlerError> {
        Ok(HealthResponse::Status200(HealthResponse200 {
            status: "ok".to_string(),
        }))
    }

    async fn list_pets(&self, request: ListPetsRequest) -> Result<ListPetsResponse, HandlerError> {
        self.check()?;
        let limit = request.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        let pets = self
            .pets
            .lock()
            .await
            .values()
            .filter(|pet| request.status.is_none() || pet.status == request.status)
            .take(limit)
            .cloned()
            .collect();
        Ok(ListPetsResponse::Status200(pets))
    }

    async fn create_pet(&self, request: CreatePetRequest) -> Result<CreatePetResponse, HandlerError> {
        self.check()?;
        let new_pet = request.body;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let pet = Pet {
            id,
            name: new_pet.name,
            status: Some(new_pet.status.unwrap_or(PetStatusAvailable)),
            tag: new_pet.tag,
            born: None,
            updated_at: Some(chrono::Utc::now()),
        };
        self.pets.lock().await.insert(id, pet.clone());
        Ok(CreatePetResponse::Status201(pet))
    }

    async fn get_pets(&self, request: GetPetsRequest) -> Result<GetPetsResponse, HandlerError> {
        self.check()?;
        Ok(match self.pets.lock().await.get(&request.pet_id) {
            Some(pet) => GetPetsResponse::Status200(pet.clone()),
            None => GetPetsResponse::Status404,
        })
    }

    async fn delete_pet(&self, request: DeletePetRequest) -> Result<DeletePetResponse, HandlerError> {
        self.check()?;
        Ok(match self.pets.lock().await.remove(&request.pet_id) {
            Some(_) => DeletePetResponse::Status204,
            None => DeletePetResponse::Status404,
        })
    }
}

/// Fixed API keys and bearer tokens with granted scopes.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    api_keys: Vec<String>,
    tokens: BTreeMap<String, Vec<String>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.push(key.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>, scopes: &[&str]) -> Self {
        self.tokens
            .insert(token.into(), scopes.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl SecurityHandler for StaticCredentials {
    async fn authenticate_api_key(
        &self,
        credential: Credential,
        _scopes: &[String],
    ) -> Result<Principal, AuthError> {
        match credential {
            Credential::ApiKey(key) if self.api_keys.contains(&key) => {
                Ok(Principal::new("api-key").with_attribute("key", key))
            }
            _ => Err(AuthError::Rejected("unknown api key".to_string())),
        }
    }

    async fn authenticate_bearer_auth(
        &self,
        credential: Credential,
        scopes: &[String],
    ) -> Result<Principal, AuthError> {
        let Credential::Bearer(token) = credential else {
            return Err(AuthError::Rejected("expected a bearer token".to_string()));
        };
        let granted = self
            .tokens
            .get(&token)
            .ok_or_else(|| AuthError::Rejected("unknown token".to_string()))?;
        if !scopes.iter().all(|s| granted.contains(s)) {
            return Err(AuthError::Rejected("insufficient scope".to_string()));
        }
        Ok(Principal::new(format!("token:{token}")).with_attribute("scopes", granted.join(" ")))
    }
}
