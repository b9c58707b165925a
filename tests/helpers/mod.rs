#![allow(dead_code)]

pub mod builders;
pub mod db;

pub use builders::{BuildingBuilder, CompanyBuilder, DepartmentBuilder, EmployeeBuilder};
pub use db::{setup, TestDb};
