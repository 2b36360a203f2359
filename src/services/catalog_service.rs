// src/services/catalog_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{GrievanceError, GrievanceResult},
    models::{
        account::Officer,
        department::{Department, DepartmentRequest, DepartmentUpdate, Service, ServiceRequest, ServiceUpdate},
    },
    services::store_service::{StoreKeys, StoreService, WriteBatch},
    utils::id_generator::{IdType, WithGeneratedId},
};

#[async_trait]
pub trait CatalogOperations: Send + Sync {
    async fn create_department(&self, request: DepartmentRequest) -> GrievanceResult<Department>;
    async fn list_departments(&self) -> GrievanceResult<Vec<Department>>;
    async fn get_department(&self, department_id: &str) -> GrievanceResult<Department>;
    async fn update_department(&self, department_id: &str, update: DepartmentUpdate) -> GrievanceResult<Department>;
    async fn delete_department(&self, department_id: &str) -> GrievanceResult<()>;
    async fn assign_in_charge(&self, department_id: &str, officer_id: Option<String>) -> GrievanceResult<Department>;
    async fn create_service(&self, request: ServiceRequest) -> GrievanceResult<Service>;
    async fn update_service(&self, service_id: &str, update: ServiceUpdate) -> GrievanceResult<Service>;
    async fn delete_service(&self, service_id: &str) -> GrievanceResult<()>;
    async fn list_services(&self, department_id: Option<&str>) -> GrievanceResult<Vec<Service>>;
}

pub struct CatalogService {
    store_service: Arc<StoreService>,
}

impl CatalogService {
    pub fn new(store_service: Arc<StoreService>) -> Self {
        Self { store_service }
    }

    fn department_not_found(department_id: &str) -> GrievanceError {
        GrievanceError::DepartmentNotFound(department_id.to_string())
    }
}

#[async_trait]
impl CatalogOperations for CatalogService {
    async fn create_department(&self, request: DepartmentRequest) -> GrievanceResult<Department> {
        request.validate()?;

        let name_key = StoreKeys::department_by_name(&request.name);
        let existing: Option<String> = self.store_service.get(&name_key).await?;
        if existing.is_some() {
            return Err(GrievanceError::conflict(format!(
                "Department {} already exists",
                request.name.trim()
            )));
        }

        let department = Department::new(request, Utc::now()).with_generated_id(IdType::Department);

        let mut batch = WriteBatch::new();
        batch.expect_absent(&name_key);
        batch.set(&name_key, &department.id)?;
        batch.set(&StoreKeys::department(&department.id), &department)?;
        batch.sadd(&StoreKeys::departments_all(), &department.id);
        self.store_service.commit(batch).await?;

        tracing::info!("Department {} created: {}", department.id, department.name);
        Ok(department)
    }

    async fn list_departments(&self) -> GrievanceResult<Vec<Department>> {
        self.store_service
            .collect(&StoreKeys::departments_all(), StoreKeys::department)
            .await
    }

    async fn get_department(&self, department_id: &str) -> GrievanceResult<Department> {
        self.store_service
            .get(&StoreKeys::department(department_id))
            .await?
            .ok_or_else(|| Self::department_not_found(department_id))
    }

    async fn update_department(&self, department_id: &str, update: DepartmentUpdate) -> GrievanceResult<Department> {
        let snapshot = self
            .store_service
            .require::<Department>(&StoreKeys::department(department_id), || {
                Self::department_not_found(department_id)
            })
            .await?;

        let mut department = snapshot.value.clone();
        if let Some(description) = update.description {
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err(GrievanceError::validation_error("description", "description is required"));
            }
            department.description = description;
        }
        if let Some(is_active) = update.is_active {
            department.is_active = is_active;
        }
        department.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &department)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Department {} updated", department.id);
        Ok(department)
    }

    async fn delete_department(&self, department_id: &str) -> GrievanceResult<()> {
        let snapshot = self
            .store_service
            .require::<Department>(&StoreKeys::department(department_id), || {
                Self::department_not_found(department_id)
            })
            .await?;
        snapshot.value.ensure_deletable()?;

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.delete(snapshot.key());
        batch.delete(&StoreKeys::department_by_name(&snapshot.value.name));
        batch.srem(&StoreKeys::departments_all(), department_id);
        self.store_service.commit(batch).await?;

        tracing::info!("Department {} deleted", department_id);
        Ok(())
    }

    async fn assign_in_charge(&self, department_id: &str, officer_id: Option<String>) -> GrievanceResult<Department> {
        let snapshot = self
            .store_service
            .require::<Department>(&StoreKeys::department(department_id), || {
                Self::department_not_found(department_id)
            })
            .await?;

        if let Some(officer_id) = &officer_id {
            let officer: Option<Officer> = self.store_service.get(&StoreKeys::officer(officer_id)).await?;
            if officer.is_none() {
                return Err(GrievanceError::officer_not_found(officer_id));
            }
        }

        let mut department = snapshot.value.clone();
        department.in_charge = officer_id;
        department.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());
        batch.set(snapshot.key(), &department)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Department {} in charge: {:?}", department.id, department.in_charge);
        Ok(department)
    }

    async fn create_service(&self, request: ServiceRequest) -> GrievanceResult<Service> {
        request.validate()?;

        let department = self
            .store_service
            .require::<Department>(&StoreKeys::department(&request.department_id), || {
                Self::department_not_found(&request.department_id)
            })
            .await?;

        let name_key = StoreKeys::service_by_name(&department.value.id, &request.name);
        let existing: Option<String> = self.store_service.get(&name_key).await?;
        if existing.is_some() {
            return Err(GrievanceError::conflict(format!(
                "Service {} already exists in {}",
                request.name.trim(),
                department.value.name
            )));
        }

        let now = Utc::now();
        let service = Service::new(request, now).with_generated_id(IdType::Service);
        let mut updated = department.value.clone();
        updated.services.push(service.id.clone());
        updated.updated_at = now;

        // The department guard also catches a concurrent delete
        let mut batch = WriteBatch::new();
        batch.guard(department.guard());
        batch.expect_absent(&name_key);
        batch.set(&name_key, &service.id)?;
        batch.set(&StoreKeys::service(&service.id), &service)?;
        batch.sadd(&StoreKeys::services_by_department(&updated.id), &service.id);
        batch.set(department.key(), &updated)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Service {} added to department {}", service.id, updated.id);
        Ok(service)
    }

    /// A rename moves the per-department name index along with it.
    async fn update_service(&self, service_id: &str, update: ServiceUpdate) -> GrievanceResult<Service> {
        update.validate()?;
        let snapshot = self
            .store_service
            .require::<Service>(&StoreKeys::service(service_id), || {
                GrievanceError::not_found(format!("Service {} not found", service_id))
            })
            .await?;

        let mut service = snapshot.value.clone();
        let mut batch = WriteBatch::new();
        batch.guard(snapshot.guard());

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            let old_key = StoreKeys::service_by_name(&service.department_id, &service.name);
            let new_key = StoreKeys::service_by_name(&service.department_id, &name);
            if old_key.to_string() != new_key.to_string() {
                let taken: Option<String> = self.store_service.get(&new_key).await?;
                if taken.is_some() {
                    return Err(GrievanceError::conflict(format!(
                        "Service {} already exists in this department",
                        name
                    )));
                }
                batch.delete(&old_key);
                batch.expect_absent(&new_key);
                batch.set(&new_key, &service.id)?;
            }
            service.name = name;
        }
        if let Some(description) = update.description {
            let description = description.trim().to_string();
            service.description = (!description.is_empty()).then_some(description);
        }
        if let Some(sub_in_charge) = update.sub_in_charge {
            service.sub_in_charge = (!sub_in_charge.trim().is_empty()).then_some(sub_in_charge);
        }
        if let Some(is_active) = update.is_active {
            service.is_active = is_active;
        }
        service.updated_at = Utc::now();

        batch.set(snapshot.key(), &service)?;
        self.store_service.commit(batch).await?;

        tracing::info!("Service {} updated", service.id);
        Ok(service)
    }

    async fn delete_service(&self, service_id: &str) -> GrievanceResult<()> {
        let service = self
            .store_service
            .require::<Service>(&StoreKeys::service(service_id), || {
                GrievanceError::not_found(format!("Service {} not found", service_id))
            })
            .await?;

        let mut batch = WriteBatch::new();
        batch.guard(service.guard());
        batch.delete(service.key());
        batch.delete(&StoreKeys::service_by_name(&service.value.department_id, &service.value.name));
        batch.srem(&StoreKeys::services_by_department(&service.value.department_id), service_id);

        let department = self
            .store_service
            .load::<Department>(&StoreKeys::department(&service.value.department_id))
            .await?;
        if let Some(department) = department {
            let mut updated = department.value.clone();
            updated.services.retain(|id| id != service_id);
            updated.updated_at = Utc::now();
            batch.guard(department.guard());
            batch.set(department.key(), &updated)?;
        }

        self.store_service.commit(batch).await?;
        tracing::info!("Service {} deleted", service_id);
        Ok(())
    }

    async fn list_services(&self, department_id: Option<&str>) -> GrievanceResult<Vec<Service>> {
        let department_ids = match department_id {
            Some(id) => vec![id.to_string()],
            None => self.store_service.members(&StoreKeys::departments_all()).await?,
        };

        let mut services = Vec::new();
        for id in department_ids {
            let mut found: Vec<Service> = self
                .store_service
                .collect(&StoreKeys::services_by_department(&id), StoreKeys::service)
                .await?;
            services.append(&mut found);
        }
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogService {
        CatalogService::new(Arc::new(StoreService::memory()))
    }

    fn voirie() -> DepartmentRequest {
        DepartmentRequest {
            name: "Voirie".to_string(),
            description: "Routes et chaussées".to_string(),
        }
    }

    fn service_request(department_id: &str, name: &str) -> ServiceRequest {
        ServiceRequest {
            name: name.to_string(),
            department_id: department_id.to_string(),
            description: None,
            sub_in_charge: None,
        }
    }

    #[tokio::test]
    async fn test_department_names_are_unique() {
        let catalog = catalog();
        catalog.create_department(voirie()).await.unwrap();

        let mut duplicate = voirie();
        duplicate.name = "  VOIRIE ".to_string();
        let err = catalog.create_department(duplicate).await.unwrap_err();
        assert!(matches!(err, GrievanceError::Conflict(_)));
        assert_eq!(catalog.list_departments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_services_block_department_deletion() {
        let catalog = catalog();
        let department = catalog.create_department(voirie()).await.unwrap();
        let service = catalog
            .create_service(service_request(&department.id, "Nids de poule"))
            .await
            .unwrap();

        assert!(matches!(
            catalog.create_service(service_request(&department.id, "nids de poule")).await,
            Err(GrievanceError::Conflict(_))
        ));

        let err = catalog.delete_department(&department.id).await.unwrap_err();
        assert!(err.is_bad_request());

        catalog.delete_service(&service.id).await.unwrap();
        assert!(catalog.get_department(&department.id).await.unwrap().services.is_empty());
        catalog.delete_department(&department.id).await.unwrap();
        assert!(catalog.get_department(&department.id).await.unwrap_err().is_not_found());

        // The name is free again
        catalog.create_department(voirie()).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_charge_must_exist() {
        let catalog = catalog();
        let department = catalog.create_department(voirie()).await.unwrap();
        let err = catalog
            .assign_in_charge(&department.id, Some("off-250101-zzzzz".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, GrievanceError::OfficerNotFound(_)));

        let cleared = catalog.assign_in_charge(&department.id, None).await.unwrap();
        assert!(cleared.in_charge.is_none());
    }

    #[tokio::test]
    async fn test_list_services_by_department() {
        let catalog = catalog();
        let voirie = catalog.create_department(voirie()).await.unwrap();
        let sante = catalog
            .create_department(DepartmentRequest {
                name: "Santé".to_string(),
                description: "Centres de santé".to_string(),
            })
            .await
            .unwrap();
        catalog.create_service(service_request(&voirie.id, "Éclairage")).await.unwrap();
        catalog.create_service(service_request(&sante.id, "Vaccination")).await.unwrap();

        assert_eq!(catalog.list_services(Some(&voirie.id)).await.unwrap().len(), 1);
        assert_eq!(catalog.list_services(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_service_rename_moves_name_index() {
        let catalog = catalog();
        let department = catalog.create_department(voirie()).await.unwrap();
        let lights = catalog
            .create_service(service_request(&department.id, "Éclairage"))
            .await
            .unwrap();
        catalog
            .create_service(service_request(&department.id, "Caniveaux"))
            .await
            .unwrap();

        let err = catalog
            .update_service(
                &lights.id,
                ServiceUpdate {
                    name: Some("caniveaux".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GrievanceError::Conflict(_)));

        // Case-only change keeps the same index entry
        let renamed = catalog
            .update_service(
                &lights.id,
                ServiceUpdate {
                    name: Some("ÉCLAIRAGE".to_string()),
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "ÉCLAIRAGE");
        assert!(!renamed.is_active);

        let renamed = catalog
            .update_service(
                &lights.id,
                ServiceUpdate {
                    name: Some("Éclairage public".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Éclairage public");

        // The old name is free again
        catalog
            .create_service(service_request(&department.id, "Éclairage"))
            .await
            .unwrap();
        assert!(catalog
            .update_service("srv-250101-zzzzz", ServiceUpdate::default())
            .await
            .unwrap_err()
            .is_not_found());
    }
}
