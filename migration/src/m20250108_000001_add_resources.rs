use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Default layout of the resource index; one row per (reference, resource_type)
        manager
            .create_table(
                Table::create()
                    .table(Resources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Resources::Reference).string().not_null())
                    .col(ColumnDef::new(Resources::ResourceType).string().not_null())
                    .col(ColumnDef::new(Resources::Path).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(Resources::Reference)
                            .col(Resources::ResourceType),
                    )
                    .to_owned(),
            )
            .await?;

        // Prefix scans over the subtree of an authorized key
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_resources_path")
                    .table(Resources::Table)
                    .col(Resources::Path)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_resources_type")
                    .table(Resources::Table)
                    .col(Resources::ResourceType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Resources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Resources {
    Table,
    Reference,
    ResourceType,
    Path,
}
