use resource_index::hierarchy::Hierarchy;
use resource_index::settings::IndexConfig;
use resource_index::ResourceIndex;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Index over the default `resources` table
    pub fn index(&self) -> ResourceIndex {
        self.index_with(IndexConfig::default())
    }

    pub fn index_with(&self, config: IndexConfig) -> ResourceIndex {
        ResourceIndex::new(self.connection.clone(), config)
    }
}

/// Fresh database with the demo hierarchy registered on the default index
pub async fn setup() -> (TestDb, Hierarchy) {
    let test_db = TestDb::new().await;
    let hierarchy = Hierarchy::register(test_db.index()).expect("Failed to register hierarchy");
    (test_db, hierarchy)
}
