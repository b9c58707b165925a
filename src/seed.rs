use crate::entities::{building, company, department, employee};
use crate::errors::IndexError;
use crate::hierarchy::{new_id, Hierarchy};
use crate::sync::SyncReport;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use sea_orm::Set;

/// Rows per multi-row insert, well below SQLite's bind parameter limit.
const CHUNK: usize = 200;

const COMPANY_WORDS: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Stark", "Wayne", "Hooli", "Vehement", "Soylent",
];
const COMPANY_SUFFIXES: &[&str] = &["Inc", "LLC", "Group", "Holdings", "and Sons"];
const BUILDING_WORDS: &[&str] = &["North", "South", "Harbor", "River", "Summit", "Park"];
const BUILDING_SUFFIXES: &[&str] = &["Tower", "Plaza", "Court", "House", "Center"];
const STREETS: &[&str] = &["Main St", "Elm St", "Oak Ave", "Market St", "Station Rd"];
const DEPARTMENTS: &[&str] = &[
    "Sales", "Engineering", "Finance", "Legal", "Support", "Marketing", "Operations",
];
const FIRST_NAMES: &[&str] = &["Ada", "Grace", "Linus", "Ken", "Barbara", "Alan", "Edsger"];
const LAST_NAMES: &[&str] = &["Lovelace", "Hopper", "Torvalds", "Thompson", "Liskov", "Turing"];
const TITLES: &[&str] = &["Mr.", "Ms.", "Dr.", "Prof."];

/// Number of rows to generate per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSizes {
    pub companies: usize,
    pub buildings: usize,
    pub departments: usize,
    pub employees: usize,
}

impl Default for SeedSizes {
    fn default() -> Self {
        Self {
            companies: 5,
            buildings: 20,
            departments: 50,
            employees: 200,
        }
    }
}

/// Identifiers of the generated rows and the merged sync outcome.
#[derive(Debug, Default)]
pub struct SeedOutcome {
    pub companies: Vec<String>,
    pub buildings: Vec<String>,
    pub departments: Vec<String>,
    pub employees: Vec<String>,
    pub report: SyncReport,
}

fn pick<'a, R: Rng>(rng: &mut R, words: &[&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

fn pick_parent<R: Rng>(rng: &mut R, ids: &[String]) -> Option<String> {
    ids.choose(rng).cloned()
}

fn founded<R: Rng>(rng: &mut R) -> Option<String> {
    NaiveDate::from_ymd_opt(rng.gen_range(1900..2024), rng.gen_range(1..=12), rng.gen_range(1..=28))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Insert random rows level by level through the synchronized repositories.
///
/// Each child points at a random row of the level above. A level with no
/// rows above it gets unset parents, so with required parents its rows are
/// reported as skipped rather than indexed.
pub async fn feed(hierarchy: &Hierarchy, sizes: SeedSizes) -> Result<SeedOutcome, IndexError> {
    let mut outcome = SeedOutcome::default();

    let companies = {
        let mut rng = rand::thread_rng();
        (0..sizes.companies)
            .map(|_| company::ActiveModel {
                id: Set(new_id()),
                name: Set(format!(
                    "{} {}",
                    pick(&mut rng, COMPANY_WORDS),
                    pick(&mut rng, COMPANY_SUFFIXES)
                )),
                founded: Set(founded(&mut rng)),
            })
            .collect::<Vec<_>>()
    };
    for chunk in chunks(companies) {
        let (models, report) = hierarchy.companies.insert_many(chunk).await?;
        outcome.companies.extend(models.into_iter().map(|m| m.id));
        outcome.report.merge(report);
    }

    let buildings = {
        let mut rng = rand::thread_rng();
        (0..sizes.buildings)
            .map(|_| building::ActiveModel {
                id: Set(new_id()),
                name: Set(format!(
                    "{} {}",
                    pick(&mut rng, BUILDING_WORDS),
                    pick(&mut rng, BUILDING_SUFFIXES)
                )),
                address: Set(Some(format!(
                    "{} {}",
                    rng.gen_range(1..2000),
                    pick(&mut rng, STREETS)
                ))),
                company: Set(pick_parent(&mut rng, &outcome.companies)),
            })
            .collect::<Vec<_>>()
    };
    for chunk in chunks(buildings) {
        let (models, report) = hierarchy.buildings.insert_many(chunk).await?;
        outcome.buildings.extend(models.into_iter().map(|m| m.id));
        outcome.report.merge(report);
    }

    let departments = {
        let mut rng = rand::thread_rng();
        (0..sizes.departments)
            .map(|_| department::ActiveModel {
                id: Set(new_id()),
                name: Set(pick(&mut rng, DEPARTMENTS).to_string()),
                building: Set(pick_parent(&mut rng, &outcome.buildings)),
            })
            .collect::<Vec<_>>()
    };
    for chunk in chunks(departments) {
        let (models, report) = hierarchy.departments.insert_many(chunk).await?;
        outcome.departments.extend(models.into_iter().map(|m| m.id));
        outcome.report.merge(report);
    }

    let employees = {
        let mut rng = rand::thread_rng();
        (0..sizes.employees)
            .map(|_| employee::ActiveModel {
                id: Set(new_id()),
                name: Set(pick(&mut rng, FIRST_NAMES).to_string()),
                surname: Set(pick(&mut rng, LAST_NAMES).to_string()),
                title: Set(Some(pick(&mut rng, TITLES).to_string())),
                department: Set(pick_parent(&mut rng, &outcome.departments)),
            })
            .collect::<Vec<_>>()
    };
    for chunk in chunks(employees) {
        let (models, report) = hierarchy.employees.insert_many(chunk).await?;
        outcome.employees.extend(models.into_iter().map(|m| m.id));
        outcome.report.merge(report);
    }

    tracing::info!(
        companies = outcome.companies.len(),
        buildings = outcome.buildings.len(),
        departments = outcome.departments.len(),
        employees = outcome.employees.len(),
        indexed = outcome.report.indexed,
        skipped = outcome.report.failures.len(),
        "Seeded demo hierarchy"
    );
    Ok(outcome)
}

fn chunks<T>(mut rows: Vec<T>) -> Vec<Vec<T>> {
    let mut out = Vec::with_capacity(rows.len().div_ceil(CHUNK));
    while !rows.is_empty() {
        let rest = rows.split_off(rows.len().min(CHUNK));
        out.push(rows);
        rows = rest;
    }
    out
}
