use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Recipes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Recipes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Recipes::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Recipes::Name).string().not_null())
                    .col(ColumnDef::new(Recipes::Description).text())
                    .col(ColumnDef::new(Recipes::Instructions).text().not_null())
                    .col(ColumnDef::new(Recipes::TotalTime).big_integer())
                    .col(ColumnDef::new(Recipes::Privacy).string().not_null())
                    .col(
                        ColumnDef::new(Recipes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Recipes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Recipes::Version).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeTags::RecipeId).uuid().not_null())
                    .col(ColumnDef::new(RecipeTags::Category).string().not_null())
                    .col(ColumnDef::new(RecipeTags::Name).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(RecipeTags::RecipeId)
                            .col(RecipeTags::Category)
                            .col(RecipeTags::Name),
                    )
                    .foreign_key(&mut owner_fk(
                        RecipeTags::Table,
                        RecipeTags::RecipeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeIngredients::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeIngredients::RecipeId).uuid().not_null())
                    .col(
                        ColumnDef::new(RecipeIngredients::Position)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecipeIngredients::Name).string().not_null())
                    .col(ColumnDef::new(RecipeIngredients::Quantity).double())
                    .col(ColumnDef::new(RecipeIngredients::Unit).string())
                    .col(ColumnDef::new(RecipeIngredients::ProductId).uuid())
                    .primary_key(
                        Index::create()
                            .col(RecipeIngredients::RecipeId)
                            .col(RecipeIngredients::Position),
                    )
                    .foreign_key(&mut owner_fk(
                        RecipeIngredients::Table,
                        RecipeIngredients::RecipeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeRatings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeRatings::RecipeId).uuid().not_null())
                    .col(ColumnDef::new(RecipeRatings::UserId).uuid().not_null())
                    .col(ColumnDef::new(RecipeRatings::Taste).big_integer().not_null())
                    .col(
                        ColumnDef::new(RecipeRatings::Convenience)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecipeRatings::Comment).text())
                    .primary_key(
                        Index::create()
                            .col(RecipeRatings::RecipeId)
                            .col(RecipeRatings::UserId),
                    )
                    .foreign_key(&mut owner_fk(
                        RecipeRatings::Table,
                        RecipeRatings::RecipeId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeNutrition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecipeNutrition::RecipeId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecipeNutrition::Calories).double().not_null())
                    .col(ColumnDef::new(RecipeNutrition::Protein).double().not_null())
                    .col(
                        ColumnDef::new(RecipeNutrition::Carbohydrate)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecipeNutrition::TotalFat).double().not_null())
                    .foreign_key(&mut owner_fk(
                        RecipeNutrition::Table,
                        RecipeNutrition::RecipeId,
                    ))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecipeNutrition::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeRatings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeIngredients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Recipes::Table).to_owned())
            .await
    }
}

fn owner_fk<T, C>(table: T, column: C) -> ForeignKeyCreateStatement
where
    T: IntoIden + 'static,
    C: IntoIden + 'static,
{
    ForeignKey::create()
        .from(table, column)
        .to(Recipes::Table, Recipes::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

#[derive(DeriveIden)]
enum Recipes {
    Table,
    Id,
    AuthorId,
    Name,
    Description,
    Instructions,
    TotalTime,
    Privacy,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(DeriveIden)]
enum RecipeTags {
    Table,
    RecipeId,
    Category,
    Name,
}

#[derive(DeriveIden)]
enum RecipeIngredients {
    Table,
    RecipeId,
    Position,
    Name,
    Quantity,
    Unit,
    ProductId,
}

#[derive(DeriveIden)]
enum RecipeRatings {
    Table,
    RecipeId,
    UserId,
    Taste,
    Convenience,
    Comment,
}

#[derive(DeriveIden)]
enum RecipeNutrition {
    Table,
    RecipeId,
    Calories,
    Protein,
    Carbohydrate,
    TotalFat,
}
