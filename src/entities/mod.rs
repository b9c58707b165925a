pub mod building;
pub mod company;
pub mod department;
pub mod employee;
pub mod job_execution;

pub use building::Entity as Building;
pub use company::Entity as Company;
pub use department::Entity as Department;
pub use employee::Entity as Employee;
pub use job_execution::Entity as JobExecution;
