use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Brand).string())
                    .col(ColumnDef::new(Products::Barcode).string())
                    .col(ColumnDef::new(Products::Category).string())
                    .col(ColumnDef::new(Products::IsFood).boolean().not_null())
                    .col(ColumnDef::new(Products::Nutrition).text())
                    .col(ColumnDef::new(Products::Tags).text().not_null())
                    .col(
                        ColumnDef::new(Products::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Products::DiscontinuedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Products::Version).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_products_barcode")
                    .table(Products::Table)
                    .col(Products::Barcode)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Brand,
    Barcode,
    Category,
    IsFood,
    Nutrition,
    Tags,
    CreatedAt,
    UpdatedAt,
    DiscontinuedAt,
    Version,
}
