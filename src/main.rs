use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use miette::{IntoDiagnostic, Result};
use resource_index::entities::{building, company, department};
use resource_index::hierarchy::{new_id, Hierarchy, BUILDING, COMPANY, DEPARTMENT};
use resource_index::seed::{self, SeedSizes};
use resource_index::settings::Settings;
use resource_index::{jobs, Annotated, ResourceIndex};
use sea_orm::{Database, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "resource-index",
    version,
    about = "Materialized-path resource index for hierarchical entities"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply database migrations
    Migrate,
    /// Insert random demo data through the index synchronizer
    Seed {
        #[arg(long, default_value_t = SeedSizes::default().companies)]
        companies: usize,
        #[arg(long, default_value_t = SeedSizes::default().buildings)]
        buildings: usize,
        #[arg(long, default_value_t = SeedSizes::default().departments)]
        departments: usize,
        #[arg(long, default_value_t = SeedSizes::default().employees)]
        employees: usize,
    },
    /// Rebuild every index entry from the entity tables, parents first
    Recreate,
    /// Check whether any of the keys grants access to a resource
    Check {
        #[arg(long)]
        reference: String,
        #[arg(long)]
        resource_type: String,
        /// Authorized path prefix; repeat for several keys
        #[arg(long = "key", required = true)]
        keys: Vec<String>,
    },
    /// Walk through a small company hierarchy and print the access results
    Demo,
    /// Run the scheduled backfill job until interrupted
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    let db = Database::connect(&settings.database.url)
        .await
        .into_diagnostic()?;

    if let Command::Migrate = cli.command {
        Migrator::up(&db, None).await.into_diagnostic()?;
        tracing::info!("Applied migrations");
        return Ok(());
    }

    let index = prepare_index(&db, &settings).await?;
    let hierarchy = Hierarchy::register(index)?;

    match cli.command {
        Command::Migrate => {}
        Command::Seed {
            companies,
            buildings,
            departments,
            employees,
        } => {
            let sizes = SeedSizes {
                companies,
                buildings,
                departments,
                employees,
            };
            let outcome = seed::feed(&hierarchy, sizes).await?;
            println!(
                "seeded {} companies, {} buildings, {} departments, {} employees ({} indexed, {} skipped)",
                outcome.companies.len(),
                outcome.buildings.len(),
                outcome.departments.len(),
                outcome.employees.len(),
                outcome.report.indexed,
                outcome.report.failures.len()
            );
        }
        Command::Recreate => {
            tracing::info!(
                types = ?hierarchy.registry.resource_types(),
                batch_size = settings.backfill.batch_size,
                "Recreating resource index"
            );
            let reports = hierarchy
                .registry
                .recreate_all(settings.backfill.batch_size)
                .await?;
            for report in &reports {
                for skipped in &report.skipped {
                    tracing::warn!(reference = %skipped.reference, error = %skipped.error, "Not indexed");
                }
            }
            let summaries: Vec<_> = reports.iter().map(|r| r.summary()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).into_diagnostic()?
            );
        }
        Command::Check {
            reference,
            resource_type,
            keys,
        } => {
            match hierarchy
                .index()
                .get_resource(&reference, &resource_type, &keys[..])
                .await?
            {
                Some(entry) => println!(
                    "{}",
                    serde_json::to_string_pretty(&entry).into_diagnostic()?
                ),
                None => println!("access denied: {resource_type} {reference}"),
            }
        }
        Command::Demo => demo(&hierarchy).await?,
        Command::Schedule => {
            let mut sched =
                jobs::init_scheduler(db.clone(), hierarchy.registry.clone(), &settings.backfill)
                    .await?;
            tokio::signal::ctrl_c().await.into_diagnostic()?;
            tracing::info!("Shutting down scheduler");
            sched
                .shutdown()
                .await
                .map_err(|e| miette::miette!("Failed to stop job scheduler: {e}"))?;
        }
    }

    Ok(())
}

/// Make sure the configured index tables exist; the default layout comes
/// from the migrations, renamed layouts are created here.
async fn prepare_index(db: &DatabaseConnection, settings: &Settings) -> Result<ResourceIndex> {
    let index = ResourceIndex::new(db.clone(), settings.index.clone());
    index.ensure_schema().await?;
    if let Some(users) = index.user_resources() {
        users.ensure_schema().await?;
    }
    Ok(index)
}

async fn demo(hierarchy: &Hierarchy) -> Result<()> {
    let company = hierarchy
        .companies
        .insert(company::ActiveModel {
            id: Set(new_id()),
            name: Set("Company 1".to_string()),
            founded: Set(Some("2020-01-01".to_string())),
        })
        .await?;

    let building = hierarchy
        .buildings
        .insert(building::ActiveModel {
            id: Set(new_id()),
            name: Set("Building 1".to_string()),
            address: Set(Some("Address 1".to_string())),
            company: Set(Some(company.id.clone())),
        })
        .await?;

    let department = hierarchy
        .departments
        .insert(department::ActiveModel {
            id: Set(new_id()),
            name: Set("Department 1".to_string()),
            building: Set(Some(building.id.clone())),
        })
        .await?;

    let floating = hierarchy
        .departments
        .insert(department::ActiveModel {
            id: Set(new_id()),
            name: Set("Department 2".to_string()),
            building: Set(None),
        })
        .await?;

    let key = format!(
        "/{}/{}/{}/{}",
        COMPANY,
        company.id,
        BUILDING,
        building.id
    );
    let keys = [key.as_str()];
    let index = hierarchy.index();

    println!("key: {key}");
    for dept in [&department, &floating] {
        let granted = index
            .check_access(&dept.id, DEPARTMENT, &keys)
            .await?;
        println!("{} ({}): {}", dept.name, dept.id, granted);
    }

    let filter = index.filter(DEPARTMENT, &keys);
    let rows = filter
        .annotate(department::Entity::find())
        .filter(filter.matched())
        .into_model::<Annotated<department::Model>>()
        .all(index.connection())
        .await
        .into_diagnostic()?;

    println!("departments under {key}:");
    for row in rows {
        if let Some(resource) = row.resource {
            println!("  {} {}", row.candidate.name, resource.path);
        }
    }

    Ok(())
}
