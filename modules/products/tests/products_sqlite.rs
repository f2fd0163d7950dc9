#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg(feature = "db-sqlite")]

use std::sync::Arc;

use anyhow::Result;
use larder_db::{
    DbConfig, ErrorKind, FilterClause, FilterSpecification, LimitCfg, Operator, QueryRequest,
    RepoError, SortKey,
};
use larder_products::{
    DomainError, Migrator, Nutrition, Product, ProductFields, ProductRepository, Service,
    product_repository,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

async fn setup() -> Result<(DatabaseConnection, Service)> {
    let db = DbConfig::default().connect().await?;
    Migrator::up(&db, None).await?;
    let repo: ProductRepository = product_repository(LimitCfg::default())?;
    let service = Service::new(db.clone(), Arc::new(repo));
    Ok((db, service))
}

fn product(name: &str, brand: Option<&str>, is_food: bool) -> Product {
    let mut p = Product::new(name).unwrap();
    p.brand = brand.map(str::to_owned);
    p.is_food = is_food;
    p
}

fn names(items: &[Product]) -> Vec<&str> {
    items.iter().map(|p| p.name.as_str()).collect()
}

#[tokio::test]
async fn json_columns_survive_storage() -> Result<()> {
    let (_db, service) = setup().await?;
    let mut oats = product("Rolled oats", Some("Mill"), true);
    oats.set_barcode("5000 1590 0123 4")?;
    oats.add_tag("breakfast");
    oats.add_tag("whole grain");
    oats.set_nutrition(Some(Nutrition {
        calories: 379.0,
        protein: 13.2,
        carbohydrate: 67.7,
        sugar: 1.0,
        total_fat: 6.5,
        saturated_fat: 1.1,
        sodium: 0.006,
    }))?;

    let created = service.create(oats.clone()).await?;
    let loaded = service.get(created.id).await?;

    assert_eq!(loaded, oats);
    Ok(())
}

#[tokio::test]
async fn discontinued_products_vanish_from_every_read() -> Result<()> {
    let (db, service) = setup().await?;
    let kept = service.create(product("Rice", None, true)).await?;
    let gone = service.create(product("Old rice", None, true)).await?;

    service.discontinue(gone.id).await?;

    let err = service.get(gone.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Repo(RepoError::NotFound { .. })));

    let page = service
        .search(
            &QueryRequest::new()
                .filter(FilterSpecification::new(ProductFields::NAME, Operator::Like, "rice"))
                .with_total(),
        )
        .await?;
    assert_eq!(names(&page.items), ["Rice"]);
    assert_eq!(page.total, Some(1));

    let err = service.save(gone.clone()).await.unwrap_err();
    assert!(matches!(err, DomainError::Repo(RepoError::NotFound { .. })));
    let err = service.discontinue(gone.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Repo(RepoError::NotFound { .. })));

    // The row is still stored, only flagged.
    let stamped = db
        .query_one(sea_orm::Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM products WHERE discontinued_at IS NOT NULL",
        ))
        .await?
        .expect("count row");
    assert_eq!(stamped.try_get::<i64>("", "n")?, 1);
    assert_eq!(service.get(kept.id).await?.name, "Rice");
    Ok(())
}

#[tokio::test]
async fn barcode_filter_accepts_formatted_input() -> Result<()> {
    let (_db, service) = setup().await?;
    let mut soda = product("Soda", Some("Fizz"), true);
    soda.set_barcode("4006381333931")?;
    service.create(soda).await?;
    service.create(product("Water", Some("Fizz"), true)).await?;

    let page = service
        .search(&QueryRequest::new().filter(FilterSpecification::new(
            ProductFields::BARCODE,
            Operator::Eq,
            "4006381-333931",
        )))
        .await?;

    assert_eq!(names(&page.items), ["Soda"]);
    Ok(())
}

#[tokio::test]
async fn brand_nullability_and_food_flag_combine() -> Result<()> {
    let (_db, service) = setup().await?;
    for p in [
        product("Apple", None, true),
        product("Soap", Some("Clean"), false),
        product("Bread", Some("Bakery"), true),
        product("Sponge", None, false),
    ] {
        service.create(p).await?;
    }

    let request = QueryRequest::new()
        .filter(FilterSpecification::new(ProductFields::IS_FOOD, Operator::Eq, true))
        .filter(FilterClause::any_of([
            FilterClause::from(FilterSpecification::null_check(
                ProductFields::BRAND,
                Operator::IsNull,
            )),
            FilterClause::from(FilterSpecification::new(
                ProductFields::BRAND,
                Operator::StartsWith,
                "Bak",
            )),
        ]))
        .sort(SortKey::asc(ProductFields::NAME));
    let page = service.search(&request).await?;

    assert_eq!(names(&page.items), ["Apple", "Bread"]);

    let non_food = service
        .count(&[FilterClause::from(FilterSpecification::new(
            ProductFields::IS_FOOD,
            Operator::Eq,
            false,
        ))])
        .await?;
    assert_eq!(non_food, 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_saves_keep_the_first_writer() -> Result<()> {
    let (_db, service) = setup().await?;
    let created = service.create(product("Milk", None, true)).await?;

    let mut first = service.get(created.id).await?;
    let mut second = first.clone();
    first.category = Some("dairy".to_owned());
    second.category = Some("drinks".to_owned());

    let saved = service.save(first).await?;
    assert_eq!(saved.version, 2);
    let err = service.save(second).await.unwrap_err();

    match err {
        DomainError::Repo(e) => assert_eq!(e.kind(), ErrorKind::Concurrency),
        DomainError::Product(e) => panic!("unexpected product error: {e}"),
    }
    assert_eq!(
        service.get(created.id).await?.category.as_deref(),
        Some("dairy")
    );
    Ok(())
}

#[tokio::test]
async fn invalid_product_never_reaches_storage() -> Result<()> {
    let (_db, service) = setup().await?;
    let mut p = product("Cheese", None, true);
    p.barcode = Some("12".to_owned());

    let err = service.create(p.clone()).await.unwrap_err();

    assert!(matches!(err, DomainError::Product(_)));
    assert!(matches!(
        service.get(p.id).await.unwrap_err(),
        DomainError::Repo(RepoError::NotFound { .. })
    ));
    Ok(())
}
