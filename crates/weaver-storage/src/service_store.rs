use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use weaver_contracts::Service;

use crate::error::StoreError;

/// Durable, shared registered-provider store. Updates are last-write-wins
/// per `name`, per the Service ownership rule in the data model.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn register_service(&self, service: Service) -> Result<(), StoreError>;
    async fn fetch_by_name(&self, name: &str) -> Result<Service, StoreError>;
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;
    async fn delete_service(&self, name: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryServiceStore {
    by_name: Arc<RwLock<HashMap<String, Service>>>,
}

impl InMemoryServiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceStore for InMemoryServiceStore {
    async fn register_service(&self, service: Service) -> Result<(), StoreError> {
        let mut by_name = self.by_name.write().await;
        if let Some(existing) = by_name.values().find(|s| s.url == service.url && s.name != service.name) {
            return Err(StoreError::ServiceUrlConflict(existing.url.clone()));
        }
        by_name.insert(service.name.clone(), service);
        Ok(())
    }

    async fn fetch_by_name(&self, name: &str) -> Result<Service, StoreError> {
        self.by_name
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_string()))
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        Ok(self.by_name.read().await.values().cloned().collect())
    }

    async fn delete_service(&self, name: &str) -> Result<(), StoreError> {
        self.by_name
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_contracts::{AuthMode, ServiceType, Visibility};

    fn svc(name: &str, url: &str) -> Service {
        Service {
            name: name.to_string(),
            url: url.to_string(),
            kind: ServiceType::Wps,
            visibility: Visibility::Public,
            auth_mode: AuthMode::None,
        }
    }

    #[tokio::test]
    async fn register_then_fetch_round_trips() {
        let store = InMemoryServiceStore::new();
        store.register_service(svc("ades1", "https://ades.example.com")).await.unwrap();
        let fetched = store.fetch_by_name("ades1").await.unwrap();
        assert_eq!(fetched.url, "https://ades.example.com");
    }

    #[tokio::test]
    async fn register_rejects_duplicate_url_under_a_new_name() {
        let store = InMemoryServiceStore::new();
        store.register_service(svc("ades1", "https://ades.example.com")).await.unwrap();
        let err = store
            .register_service(svc("ades2", "https://ades.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ServiceUrlConflict(_)));
    }

    #[tokio::test]
    async fn register_is_last_write_wins_per_name() {
        let store = InMemoryServiceStore::new();
        store.register_service(svc("ades1", "https://a.example.com")).await.unwrap();
        store.register_service(svc("ades1", "https://b.example.com")).await.unwrap();
        let fetched = store.fetch_by_name("ades1").await.unwrap();
        assert_eq!(fetched.url, "https://b.example.com");
    }
}
