use resource_index::entities::{building, company, department, employee};
use resource_index::hierarchy::new_id;
use resource_index::Repository;
use sea_orm::Set;

/// Builder for creating test companies
pub struct CompanyBuilder {
    id: String,
    name: String,
    founded: Option<String>,
}

impl CompanyBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Company {}", id),
            founded: Some("2020-01-01".to_string()),
        }
    }

    pub fn random() -> Self {
        Self::new(&new_id())
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn active_model(self) -> company::ActiveModel {
        company::ActiveModel {
            id: Set(self.id),
            name: Set(self.name),
            founded: Set(self.founded),
        }
    }

    pub async fn create(self, repo: &Repository<company::Entity>) -> company::Model {
        repo.insert(self.active_model())
            .await
            .expect("Failed to create test company")
    }
}

/// Builder for creating test buildings
pub struct BuildingBuilder {
    id: String,
    name: String,
    address: Option<String>,
    company: Option<String>,
}

impl BuildingBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Building {}", id),
            address: Some("1 Main St".to_string()),
            company: None,
        }
    }

    pub fn random() -> Self {
        Self::new(&new_id())
    }

    pub fn with_company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn active_model(self) -> building::ActiveModel {
        building::ActiveModel {
            id: Set(self.id),
            name: Set(self.name),
            address: Set(self.address),
            company: Set(self.company),
        }
    }

    pub async fn create(self, repo: &Repository<building::Entity>) -> building::Model {
        repo.insert(self.active_model())
            .await
            .expect("Failed to create test building")
    }
}

/// Builder for creating test departments
pub struct DepartmentBuilder {
    id: String,
    name: String,
    building: Option<String>,
}

impl DepartmentBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Department {}", id),
            building: None,
        }
    }

    pub fn with_building(mut self, building: &str) -> Self {
        self.building = Some(building.to_string());
        self
    }

    pub fn active_model(self) -> department::ActiveModel {
        department::ActiveModel {
            id: Set(self.id),
            name: Set(self.name),
            building: Set(self.building),
        }
    }

    pub async fn create(self, repo: &Repository<department::Entity>) -> department::Model {
        repo.insert(self.active_model())
            .await
            .expect("Failed to create test department")
    }
}

/// Builder for creating test employees
pub struct EmployeeBuilder {
    id: String,
    name: String,
    surname: String,
    department: Option<String>,
}

impl EmployeeBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            department: None,
        }
    }

    pub fn with_department(mut self, department: &str) -> Self {
        self.department = Some(department.to_string());
        self
    }

    pub fn active_model(self) -> employee::ActiveModel {
        employee::ActiveModel {
            id: Set(self.id),
            name: Set(self.name),
            surname: Set(self.surname),
            title: Set(None),
            department: Set(self.department),
        }
    }

    pub async fn create(self, repo: &Repository<employee::Entity>) -> employee::Model {
        repo.insert(self.active_model())
            .await
            .expect("Failed to create test employee")
    }
}
