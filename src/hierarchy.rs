//! Demo hierarchy: Company > Building > Department > Employee.

use crate::entities::{building, company, department, employee};
use crate::errors::IndexError;
use crate::index::ResourceIndex;
use crate::path::ParentSpec;
use crate::registry::ResourceRegistry;
use crate::repository::Repository;
use crate::sync::ResourceSync;
use base64ct::Encoding;
use rand::RngCore;
use std::sync::Arc;

pub const COMPANY: &str = "Company";
pub const BUILDING: &str = "Building";
pub const DEPARTMENT: &str = "Department";
pub const EMPLOYEE: &str = "Employee";

/// Registered demo types with one synchronized repository per entity.
pub struct Hierarchy {
    pub registry: Arc<ResourceRegistry>,
    pub companies: Repository<company::Entity>,
    pub buildings: Repository<building::Entity>,
    pub departments: Repository<department::Entity>,
    pub employees: Repository<employee::Entity>,
}

impl Hierarchy {
    /// Register every demo type into `index`.
    ///
    /// Departments may exist without a building and are then indexed at the
    /// root; buildings and employees need their parent indexed first.
    pub fn register(index: ResourceIndex) -> Result<Self, IndexError> {
        let db = index.connection().clone();
        let mut registry = ResourceRegistry::new(index);

        let companies = registry.register::<company::Entity>(COMPANY, None)?;
        let buildings = registry
            .register::<building::Entity>(BUILDING, Some(ParentSpec::required(COMPANY, "company")))?;
        let departments = registry.register::<department::Entity>(
            DEPARTMENT,
            Some(ParentSpec::optional(BUILDING, "building")),
        )?;
        let employees = registry.register::<employee::Entity>(
            EMPLOYEE,
            Some(ParentSpec::required(DEPARTMENT, "department")),
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            companies: repository(&db, companies),
            buildings: repository(&db, buildings),
            departments: repository(&db, departments),
            employees: repository(&db, employees),
        })
    }

    pub fn index(&self) -> &ResourceIndex {
        self.registry.index()
    }
}

fn repository<E>(db: &sea_orm::DatabaseConnection, sync: Arc<ResourceSync<E>>) -> Repository<E>
where
    E: sea_orm::EntityTrait,
    E::Model: sea_orm::IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: sea_orm::ActiveModelBehavior + Send,
{
    Repository::new(db.clone()).with_hooks(sync)
}

/// Random URL-safe identifier for demo rows.
pub fn new_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}
