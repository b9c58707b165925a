// Integration tests for keeping the resource index in step with entity
// mutations made through the repositories.

mod helpers;

use async_trait::async_trait;
use helpers::{setup, BuildingBuilder, CompanyBuilder, DepartmentBuilder, EmployeeBuilder};
use resource_index::entities::{building, company, department};
use resource_index::hierarchy::{BUILDING, COMPANY, DEPARTMENT, EMPLOYEE};
use resource_index::settings::{IndexConfig, UserResourceOverrides};
use resource_index::{
    IndexError, LifecycleHooks, ParentSpec, Repository, ResourceCriteria, ResourceIndexEntry,
    ResourceRegistry, ResourceSync, SyncReport,
};
use sea_orm::{ColumnTrait, Condition, EntityTrait, IntoActiveModel, Set};
use std::sync::Arc;

// ============================================================================
// Single entity lifecycle
// ============================================================================

#[tokio::test]
async fn test_save_indexes_root_entity() {
    let (_db, h) = setup().await;

    let company = CompanyBuilder::new("C1").create(&h.companies).await;

    let entry = h
        .index()
        .find(&company.id, COMPANY)
        .await
        .expect("Failed to query index")
        .expect("Company entry not found");
    assert_eq!(entry, ResourceIndexEntry::new("C1", COMPANY, "/Company/C1"));
}

#[tokio::test]
async fn test_save_with_changes_keeps_single_entry() {
    let (_db, h) = setup().await;
    let company = CompanyBuilder::new("C1").create(&h.companies).await;

    let mut active = company.into_active_model();
    active.name = Set("Renamed".to_string());
    let saved = h.companies.save(active).await.expect("Failed to save company");
    assert_eq!(saved.name, "Renamed");

    let entries = h
        .index()
        .find_many(&ResourceCriteria::new().resource_type(COMPANY))
        .await
        .expect("Failed to query index");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/Company/C1");
}

#[tokio::test]
async fn test_hierarchy_paths() {
    let (_db, h) = setup().await;

    CompanyBuilder::new("C1").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;
    DepartmentBuilder::new("D1")
        .with_building("B1")
        .create(&h.departments)
        .await;
    EmployeeBuilder::new("E1")
        .with_department("D1")
        .create(&h.employees)
        .await;

    let index = h.index();
    let path = |reference: &'static str, resource_type: &'static str| {
        let index = index.clone();
        async move {
            index
                .find(reference, resource_type)
                .await
                .expect("Failed to query index")
                .expect("Entry not found")
                .path
        }
    };

    assert_eq!(path("B1", BUILDING).await, "/Company/C1/Building/B1");
    assert_eq!(
        path("D1", DEPARTMENT).await,
        "/Company/C1/Building/B1/Department/D1"
    );
    assert_eq!(
        path("E1", EMPLOYEE).await,
        "/Company/C1/Building/B1/Department/D1/Employee/E1"
    );
}

#[tokio::test]
async fn test_required_parent_missing_fails_without_entry() {
    let (test_db, h) = setup().await;

    let err = h
        .buildings
        .insert(BuildingBuilder::new("B1").with_company("C404").active_model())
        .await
        .expect_err("Missing parent must fail");

    match err {
        IndexError::ParentNotFound {
            resource_type,
            parent_resource_type,
            parent_reference,
        } => {
            assert_eq!(resource_type, BUILDING);
            assert_eq!(parent_resource_type, COMPANY);
            assert_eq!(parent_reference.as_deref(), Some("C404"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(h
        .index()
        .find("B1", BUILDING)
        .await
        .expect("Failed to query index")
        .is_none());

    // The row itself was written before the index was consulted
    let row = building::Entity::find_by_id("B1".to_string())
        .one(test_db.connection())
        .await
        .expect("Failed to query buildings");
    assert!(row.is_some());
}

#[tokio::test]
async fn test_required_parent_unset_fails() {
    let (_db, h) = setup().await;

    let err = h
        .buildings
        .insert(BuildingBuilder::new("B1").active_model())
        .await
        .expect_err("Unset required parent must fail");

    assert!(err.is_parent_not_found());
}

#[tokio::test]
async fn test_optional_parent_missing_floats_at_root() {
    let (_db, h) = setup().await;

    DepartmentBuilder::new("D2")
        .create(&h.departments)
        .await;
    DepartmentBuilder::new("D3")
        .with_building("B404")
        .create(&h.departments)
        .await;

    let index = h.index();
    let d2 = index.find("D2", DEPARTMENT).await.expect("Failed to query index");
    let d3 = index.find("D3", DEPARTMENT).await.expect("Failed to query index");
    assert_eq!(d2.map(|e| e.path).as_deref(), Some("/Department/D2"));
    assert_eq!(d3.map(|e| e.path).as_deref(), Some("/Department/D3"));
}

// ============================================================================
// Targeted updates and deletes
// ============================================================================

#[tokio::test]
async fn test_update_one_reparents_entry() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    CompanyBuilder::new("C2").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;

    let updated = h
        .buildings
        .update_one(
            Condition::all().add(building::Column::Id.eq("B1")),
            building::ActiveModel {
                company: Set(Some("C2".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update building")
        .expect("Building not matched");
    assert_eq!(updated.company.as_deref(), Some("C2"));

    let entry = h
        .index()
        .find("B1", BUILDING)
        .await
        .expect("Failed to query index")
        .expect("Building entry not found");
    assert_eq!(entry.path, "/Company/C2/Building/B1");
}

#[tokio::test]
async fn test_update_one_filter_on_changed_field() {
    // The filter no longer matches after the update; the entry must still move
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    CompanyBuilder::new("C2").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;

    h.buildings
        .update_one(
            Condition::all().add(building::Column::Company.eq("C1")),
            building::ActiveModel {
                company: Set(Some("C2".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update building")
        .expect("Building not matched");

    let entry = h
        .index()
        .find("B1", BUILDING)
        .await
        .expect("Failed to query index")
        .expect("Building entry not found");
    assert_eq!(entry.path, "/Company/C2/Building/B1");
}

#[tokio::test]
async fn test_update_one_without_match() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;

    let updated = h
        .companies
        .update_one(
            Condition::all().add(company::Column::Name.eq("Nobody")),
            company::ActiveModel {
                name: Set("Somebody".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to run update");

    assert!(updated.is_none());
    let count = h
        .index()
        .count(&ResourceCriteria::new())
        .await
        .expect("Failed to count entries");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_update_one_to_missing_parent_keeps_old_entry() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;

    let err = h
        .buildings
        .update_one(
            Condition::all().add(building::Column::Id.eq("B1")),
            building::ActiveModel {
                company: Set(Some("C404".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect_err("Missing parent must fail");
    assert!(err.is_parent_not_found());

    // Failure does not corrupt what was indexed before
    let entry = h
        .index()
        .find("B1", BUILDING)
        .await
        .expect("Failed to query index")
        .expect("Building entry not found");
    assert_eq!(entry.path, "/Company/C1/Building/B1");
}

#[tokio::test]
async fn test_update_rejects_key_change() {
    let (test_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;

    let one = h
        .companies
        .update_one(
            Condition::all().add(company::Column::Id.eq("C1")),
            company::ActiveModel {
                id: Set("C9".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(one, Err(IndexError::Configuration(_))));

    let many = h
        .buildings
        .update_many(
            Condition::all().add(building::Column::Id.eq("B1")),
            building::ActiveModel {
                id: Set("B7".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(many, Err(IndexError::Configuration(_))));

    // Nothing was written, rows and entries still agree
    let db = test_db.connection();
    assert!(company::Entity::find_by_id("C1".to_string())
        .one(db)
        .await
        .expect("Failed to query companies")
        .is_some());
    assert!(building::Entity::find_by_id("B7".to_string())
        .one(db)
        .await
        .expect("Failed to query buildings")
        .is_none());

    let index = h.index();
    let company = index
        .find("C1", COMPANY)
        .await
        .expect("Failed to query index")
        .expect("Company entry not found");
    assert_eq!(company.path, "/Company/C1");
    assert!(index
        .find("C9", COMPANY)
        .await
        .expect("Failed to query index")
        .is_none());
    assert!(index
        .find("B1", BUILDING)
        .await
        .expect("Failed to query index")
        .is_some());
}

#[tokio::test]
async fn test_delete_one_removes_entry() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    CompanyBuilder::new("C2").create(&h.companies).await;

    let deleted = h
        .companies
        .delete_one(Condition::all().add(company::Column::Id.eq("C1")))
        .await
        .expect("Failed to delete company");
    assert_eq!(deleted, 1);

    let index = h.index();
    assert!(index
        .find("C1", COMPANY)
        .await
        .expect("Failed to query index")
        .is_none());
    assert!(!index
        .check_access("C1", COMPANY, &["/"])
        .await
        .expect("Failed to check access"));
    assert!(index
        .find("C2", COMPANY)
        .await
        .expect("Failed to query index")
        .is_some());
}

#[tokio::test]
async fn test_delete_one_without_match() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;

    let deleted = h
        .companies
        .delete_one(Condition::all().add(company::Column::Id.eq("C404")))
        .await
        .expect("Failed to run delete");

    assert_eq!(deleted, 0);
    assert!(h
        .index()
        .find("C1", COMPANY)
        .await
        .expect("Failed to query index")
        .is_some());
}

// ============================================================================
// Bulk operations
// ============================================================================

async fn insert_companies(h: &resource_index::hierarchy::Hierarchy, n: usize) -> Vec<String> {
    let models: Vec<company::ActiveModel> = (0..n)
        .map(|i| CompanyBuilder::new(&format!("C{}", i)).active_model())
        .collect();
    let (inserted, report) = h
        .companies
        .insert_many(models)
        .await
        .expect("Failed to insert companies");
    assert!(report.is_clean());
    inserted.into_iter().map(|c| c.id).collect()
}

#[tokio::test]
async fn test_insert_many_indexes_every_entity() {
    let (_db, h) = setup().await;

    let ids = insert_companies(&h, 10).await;
    assert_eq!(ids.len(), 10);

    let entries = h
        .index()
        .find_many(&ResourceCriteria::new().resource_type(COMPANY))
        .await
        .expect("Failed to query index");
    assert_eq!(entries.len(), 10);

    let mut paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    paths.dedup();
    assert_eq!(paths.len(), 10);
    for entry in &entries {
        assert!(entry.path.contains(&entry.reference));
        assert_eq!(entry.path, format!("/Company/{}", entry.reference));
    }
}

#[tokio::test]
async fn test_insert_many_empty_is_noop() {
    let (_db, h) = setup().await;

    let (inserted, report) = h
        .companies
        .insert_many(Vec::new())
        .await
        .expect("Empty insert must succeed");

    assert!(inserted.is_empty());
    assert_eq!(report.indexed, 0);
}

#[tokio::test]
async fn test_insert_many_isolates_missing_parents() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;

    let mut models: Vec<building::ActiveModel> = (0..4)
        .map(|i| {
            BuildingBuilder::new(&format!("B{}", i))
                .with_company("C1")
                .active_model()
        })
        .collect();
    models.push(BuildingBuilder::new("B9").with_company("C404").active_model());

    let (inserted, report) = h
        .buildings
        .insert_many(models)
        .await
        .expect("Bulk insert must not abort on a missing parent");

    assert_eq!(inserted.len(), 5);
    assert_eq!(report.indexed, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reference, "B9");
    assert!(report.failures[0].error.is_parent_not_found());

    let count = h
        .index()
        .count(&ResourceCriteria::new().resource_type(BUILDING))
        .await
        .expect("Failed to count entries");
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_delete_many_removes_matching_entries() {
    let (_db, h) = setup().await;
    let ids = insert_companies(&h, 10).await;

    let doomed: Vec<String> = ids.iter().take(3).cloned().collect();
    let (deleted, report) = h
        .companies
        .delete_many(Condition::all().add(company::Column::Id.is_in(doomed.clone())))
        .await
        .expect("Failed to delete companies");
    assert_eq!(deleted, 3);
    assert_eq!(report.removed, 3);

    let index = h.index();
    let remaining = index
        .count(&ResourceCriteria::new().resource_type(COMPANY))
        .await
        .expect("Failed to count entries");
    assert_eq!(remaining, 7);
    for id in &doomed {
        assert!(!index
            .check_access(id, COMPANY, &["/"])
            .await
            .expect("Failed to check access"));
    }
}

#[tokio::test]
async fn test_update_many_reparents_all_matches() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    CompanyBuilder::new("C2").create(&h.companies).await;
    for i in 0..5 {
        BuildingBuilder::new(&format!("B{}", i))
            .with_company("C1")
            .create(&h.buildings)
            .await;
    }

    // Filter on the field being rewritten
    let (updated, report) = h
        .buildings
        .update_many(
            Condition::all().add(building::Column::Company.eq("C1")),
            building::ActiveModel {
                company: Set(Some("C2".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update buildings");
    assert_eq!(updated, 5);
    assert_eq!(report.indexed, 5);

    let entries = h
        .index()
        .find_many(
            &ResourceCriteria::new()
                .resource_type(BUILDING)
                .path_prefix("/Company/C2/"),
        )
        .await
        .expect("Failed to query index");
    assert_eq!(entries.len(), 5);
}

#[tokio::test]
async fn test_update_many_isolates_missing_parents() {
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;
    BuildingBuilder::new("B2")
        .with_company("C1")
        .create(&h.buildings)
        .await;

    let (updated, report) = h
        .buildings
        .update_many(
            Condition::all().add(building::Column::Id.is_in(["B1", "B2"])),
            building::ActiveModel {
                company: Set(Some("C404".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("Bulk update must not abort on a missing parent");

    assert_eq!(updated, 2);
    assert_eq!(report.indexed, 0);
    assert_eq!(report.failures.len(), 2);
}

#[tokio::test]
async fn test_update_many_without_match() {
    let (_db, h) = setup().await;

    let (updated, report) = h
        .companies
        .update_many(
            Condition::all().add(company::Column::Name.eq("Nobody")),
            company::ActiveModel {
                name: Set("Somebody".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to run update");

    assert_eq!(updated, 0);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_reparent_does_not_cascade_to_descendants() {
    // Known limitation: descendants keep the stale ancestor path until recreate
    let (_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;
    CompanyBuilder::new("C2").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;
    DepartmentBuilder::new("D1")
        .with_building("B1")
        .create(&h.departments)
        .await;

    h.buildings
        .update_one(
            Condition::all().add(building::Column::Id.eq("B1")),
            building::ActiveModel {
                company: Set(Some("C2".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update building");

    let index = h.index();
    let stale = index
        .find("D1", DEPARTMENT)
        .await
        .expect("Failed to query index")
        .expect("Department entry not found");
    assert_eq!(stale.path, "/Company/C1/Building/B1/Department/D1");

    h.registry.recreate_all(100).await.expect("Failed to recreate");

    let fresh = index
        .find("D1", DEPARTMENT)
        .await
        .expect("Failed to query index")
        .expect("Department entry not found");
    assert_eq!(fresh.path, "/Company/C2/Building/B1/Department/D1");
}

// ============================================================================
// Hooks and registration
// ============================================================================

struct RefuseDeletes;

#[async_trait]
impl LifecycleHooks<company::Entity> for RefuseDeletes {
    async fn after_save(&self, _model: company::Model) -> Result<(), IndexError> {
        Ok(())
    }

    async fn after_insert_many(
        &self,
        _models: Vec<company::Model>,
    ) -> Result<SyncReport, IndexError> {
        Ok(SyncReport::default())
    }

    async fn after_update_one(&self, _filter: Condition) -> Result<(), IndexError> {
        Ok(())
    }

    async fn after_update_many(&self, _filter: Condition) -> Result<SyncReport, IndexError> {
        Ok(SyncReport::default())
    }

    async fn before_delete_one(&self, _filter: Condition) -> Result<(), IndexError> {
        Err(IndexError::Other("deletes are refused".to_string()))
    }

    async fn before_delete_many(&self, _filter: Condition) -> Result<SyncReport, IndexError> {
        Err(IndexError::Other("deletes are refused".to_string()))
    }
}

#[tokio::test]
async fn test_before_delete_failure_keeps_row() {
    let (test_db, h) = setup().await;
    CompanyBuilder::new("C1").create(&h.companies).await;

    let guarded = h.companies.clone().with_hooks(Arc::new(RefuseDeletes));
    let result = guarded
        .delete_one(Condition::all().add(company::Column::Id.eq("C1")))
        .await;
    assert!(result.is_err());

    let row = company::Entity::find_by_id("C1".to_string())
        .one(test_db.connection())
        .await
        .expect("Failed to query companies");
    assert!(row.is_some());
}

#[tokio::test]
async fn test_registration_rejects_bad_configuration() {
    let (test_db, _h) = setup().await;
    let index = test_db.index();

    let empty = ResourceSync::<company::Entity>::register(index.clone(), " ", None);
    assert!(matches!(empty, Err(IndexError::Configuration(_))));

    let bad_field = ResourceSync::<building::Entity>::register(
        index.clone(),
        BUILDING,
        Some(ParentSpec::required(COMPANY, "owner")),
    );
    assert!(matches!(bad_field, Err(IndexError::Configuration(_))));

    let mut registry = ResourceRegistry::new(index);
    registry
        .register::<company::Entity>(COMPANY, None)
        .expect("Failed to register company");
    let duplicate = registry.register::<company::Entity>(COMPANY, None);
    assert!(matches!(duplicate, Err(IndexError::Configuration(_))));
}

#[tokio::test]
async fn test_user_resource_index_coexists() {
    let (test_db, h) = setup().await;
    let config = IndexConfig {
        user_resource: Some(UserResourceOverrides {
            collection: "user_resources".to_string(),
            reference_field: Some("user_reference".to_string()),
            path_field: None,
            resource_type_field: None,
        }),
        ..IndexConfig::default()
    };
    let users = test_db
        .index_with(config)
        .user_resources()
        .expect("User variant configured");
    users.ensure_schema().await.expect("Failed to create user index");

    // Same entity type, synchronized into both indexes
    let sync = Arc::new(
        ResourceSync::<department::Entity>::register(users.clone(), DEPARTMENT, None)
            .expect("Failed to register user index"),
    );
    let departments: Repository<department::Entity> = h.departments.clone().with_hooks(sync);

    CompanyBuilder::new("C1").create(&h.companies).await;
    BuildingBuilder::new("B1")
        .with_company("C1")
        .create(&h.buildings)
        .await;
    DepartmentBuilder::new("D1")
        .with_building("B1")
        .create(&departments)
        .await;

    let primary = h
        .index()
        .find("D1", DEPARTMENT)
        .await
        .expect("Failed to query index")
        .expect("Primary entry not found");
    let secondary = users
        .find("D1", DEPARTMENT)
        .await
        .expect("Failed to query user index")
        .expect("User entry not found");

    assert_eq!(primary.path, "/Company/C1/Building/B1/Department/D1");
    assert_eq!(secondary.path, "/Department/D1");
    assert_eq!(
        users
            .count(&ResourceCriteria::new())
            .await
            .expect("Failed to count user entries"),
        1
    );
}
