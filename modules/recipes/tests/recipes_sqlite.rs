#![allow(clippy::unwrap_used, clippy::expect_used)]

#[cfg(feature = "db-sqlite")]
mod sqlite_recipe_tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use larder_db::{
        DbConfig, ErrorKind, FilterError, FilterSpecification, LimitCfg, Operator, QueryRequest,
        RepoError, SortKey,
    };
    use larder_recipes::{
        DomainError, Ingredient, Migrator, NutriFacts, Privacy, Rating, Recipe, RecipeFields,
        RecipeParts, RecipePatch, RecipeRepository, Service, Tag, recipe_repository,
    };
    use sea_orm::DatabaseConnection;
    use sea_orm_migration::MigratorTrait;
    use tracing_test::traced_test;
    use uuid::Uuid;

    async fn setup() -> (DatabaseConnection, RecipeRepository) {
        let db = DbConfig::default().connect().await.expect("connect sqlite");
        Migrator::up(&db, None).await.expect("migrate");
        let repo = recipe_repository(LimitCfg {
            default: 20,
            max: 50,
        })
        .unwrap();
        (db, repo)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn recipe(name: &str, total_time: Option<i64>, tags: &[&str], minutes: i64) -> Recipe {
        let at = base_time() + Duration::minutes(minutes);
        Recipe::from_parts(RecipeParts {
            id: Uuid::new_v4(),
            author_id: Uuid::from_u128(7),
            name: name.to_owned(),
            description: None,
            instructions: "Mix and cook.".to_owned(),
            total_time,
            privacy: Privacy::Public,
            created_at: at,
            updated_at: at,
            tags: tags.iter().map(|t| Tag::new("diet", t)).collect(),
            ingredients: Vec::new(),
            ratings: Vec::new(),
            nutri_facts: None,
            version: 1,
        })
        .unwrap()
    }

    fn with_calories(recipe: Recipe, calories: f64) -> Recipe {
        let mut parts = recipe.into_parts();
        parts.nutri_facts = Some(NutriFacts {
            calories,
            protein: 10.0,
            carbohydrate: 30.0,
            total_fat: 5.0,
        });
        Recipe::from_parts(parts).unwrap()
    }

    async fn seed(db: &DatabaseConnection, repo: &RecipeRepository, recipes: &[Recipe]) {
        for r in recipes {
            repo.add(db, r).await.expect("seed recipe");
        }
    }

    fn names(recipes: &[Recipe]) -> Vec<&str> {
        recipes.iter().map(Recipe::name).collect()
    }

    #[tokio::test]
    async fn full_aggregate_round_trips_through_storage() {
        let (db, repo) = setup().await;
        let mut parts = recipe("Chili", Some(90), &["vegan", "spicy"], 0).into_parts();
        parts.description = Some("Smoky".to_owned());
        parts.ingredients = vec![
            Ingredient {
                name: "beans".to_owned(),
                quantity: Some(400.0),
                unit: Some("g".to_owned()),
                product_id: Some(Uuid::new_v4()),
            },
            Ingredient::named("salt"),
        ];
        parts.ratings = vec![Rating {
            user_id: Uuid::new_v4(),
            taste: 5,
            convenience: 2,
            comment: Some("great".to_owned()),
        }];
        let chili = with_calories(Recipe::from_parts(parts).unwrap(), 512.5);

        repo.add(&db, &chili).await.unwrap();
        let loaded = repo.get(&db, chili.id()).await.unwrap();

        assert_eq!(loaded, chili);
        assert_eq!(loaded.ingredients()[1].name, "salt");
        assert_eq!(loaded.average_taste_rating(), Some(5.0));
    }

    #[tokio::test]
    async fn quick_recipes_newest_first() {
        let (db, repo) = setup().await;
        seed(
            &db,
            &repo,
            &[
                recipe("Toast", Some(5), &[], 0),
                recipe("Stew", Some(120), &[], 10),
                recipe("Salad", Some(15), &[], 20),
                recipe("Mystery", None, &[], 30),
                recipe("Omelette", Some(30), &[], 40),
            ],
        )
        .await;

        let request = QueryRequest::new()
            .filter(FilterSpecification::new(
                RecipeFields::TOTAL_TIME,
                Operator::Lte,
                30,
            ))
            .sort(SortKey::desc(RecipeFields::CREATED_AT))
            .limit(10);
        let page = repo.query(&db, &request).await.unwrap();

        assert_eq!(names(&page.items), ["Omelette", "Salad", "Toast"]);
        assert_eq!(page.total, None);
    }

    #[tokio::test]
    async fn tag_fan_out_returns_each_recipe_once() {
        let (db, repo) = setup().await;
        seed(
            &db,
            &repo,
            &[
                recipe("Both", None, &["vegan", "quick"], 0),
                recipe("Vegan", None, &["vegan"], 1),
                recipe("Neither", None, &["slow"], 2),
            ],
        )
        .await;

        let request = QueryRequest::new()
            .filter(FilterSpecification::new(
                RecipeFields::TAG_NAME,
                Operator::In,
                ["Vegan", "quick"],
            ))
            .sort(SortKey::asc(RecipeFields::NAME))
            .with_total();
        let page = repo.query(&db, &request).await.unwrap();

        assert_eq!(names(&page.items), ["Both", "Vegan"]);
        assert_eq!(page.total, Some(2));
        let tags: BTreeSet<&str> = page.items[0].tags().iter().map(Tag::name).collect();
        assert_eq!(tags, BTreeSet::from(["quick", "vegan"]));
    }

    #[tokio::test]
    async fn unknown_key_fails_before_touching_storage() {
        let db = DbConfig::default().connect().await.unwrap();
        let repo = recipe_repository(LimitCfg::default()).unwrap();

        let request =
            QueryRequest::new().filter(FilterSpecification::new("nonexistent_field", Operator::Eq, 1));
        let err = repo.query(&db, &request).await.unwrap_err();

        assert!(matches!(
            err,
            RepoError::Validation(FilterError::UnknownFilterKey { ref key }) if key == "nonexistent_field"
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn zero_limit_reports_only_the_total() {
        let (db, repo) = setup().await;
        seed(
            &db,
            &repo,
            &[
                recipe("A", Some(10), &["vegan"], 0),
                recipe("B", Some(20), &["vegan"], 1),
                recipe("C", Some(30), &[], 2),
            ],
        )
        .await;

        let request = QueryRequest::new()
            .filter(FilterSpecification::new(RecipeFields::TAG_NAME, Operator::Eq, "vegan"))
            .limit(0)
            .with_total();
        let page = repo.query(&db, &request).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(2));
    }

    #[tokio::test]
    async fn tag_negations_are_refused() {
        let (db, repo) = setup().await;
        seed(
            &db,
            &repo,
            &[
                recipe("Both", None, &["vegan", "quick"], 0),
                recipe("Vegan only", None, &["vegan"], 1),
                recipe("Untagged", None, &[], 2),
            ],
        )
        .await;

        for spec in [
            FilterSpecification::new(RecipeFields::TAG_NAME, Operator::Ne, "vegan"),
            FilterSpecification::new(RecipeFields::TAG_NAME, Operator::NotIn, ["vegan"]),
        ] {
            let err = repo
                .query(&db, &QueryRequest::new().filter(spec))
                .await
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    RepoError::Validation(FilterError::OperatorNotAllowed { ref key, .. })
                        if key == RecipeFields::TAG_NAME
                ),
                "{err:?}"
            );
        }
    }

    #[tokio::test]
    async fn paging_past_the_last_tagged_recipe_is_empty() {
        let (db, repo) = setup().await;
        seed(
            &db,
            &repo,
            &[
                recipe("A", None, &["vegan"], 0),
                recipe("B", None, &["vegan", "quick"], 1),
                recipe("C", None, &[], 2),
            ],
        )
        .await;

        let request = QueryRequest::new()
            .filter(FilterSpecification::new(RecipeFields::TAG_NAME, Operator::Eq, "vegan"))
            .offset(100)
            .limit(5)
            .with_total();
        let page = repo.query(&db, &request).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(2));
    }

    #[tokio::test]
    async fn one_to_one_nutrition_is_sortable() {
        let (db, repo) = setup().await;
        seed(
            &db,
            &repo,
            &[
                with_calories(recipe("Rich", None, &[], 0), 900.0),
                with_calories(recipe("Light", None, &[], 1), 150.0),
                recipe("Unknown", None, &[], 2),
                with_calories(recipe("Medium", None, &[], 3), 450.0),
            ],
        )
        .await;

        let request = QueryRequest::new()
            .filter(FilterSpecification::new(RecipeFields::CALORIES, Operator::Lt, 600.0))
            .sort(SortKey::asc(RecipeFields::CALORIES));
        let page = repo.query(&db, &request).await.unwrap();

        assert_eq!(names(&page.items), ["Light", "Medium"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn stale_copy_cannot_overwrite_a_newer_version() {
        let (db, repo) = setup().await;
        let original = recipe("Soup", Some(40), &[], 0);
        repo.add(&db, &original).await.unwrap();

        let mut first = repo.get(&db, original.id()).await.unwrap();
        let mut second = first.clone();
        first
            .update_properties(RecipePatch {
                total_time: Some(Some(35)),
                ..RecipePatch::default()
            })
            .unwrap();
        second
            .update_properties(RecipePatch {
                name: Some("Cold soup".to_owned()),
                ..RecipePatch::default()
            })
            .unwrap();

        assert_eq!(repo.update(&db, &first).await.unwrap(), 2);
        let err = repo.update(&db, &second).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Concurrency);
        let stored = repo.get(&db, original.id()).await.unwrap();
        assert_eq!(stored.name(), "Soup");
        assert_eq!(stored.total_time(), Some(35));
        assert!(logs_contain("stale update rejected"));
    }

    #[tokio::test]
    async fn service_rates_and_patches_with_version_checks() {
        let (db, repo) = setup().await;
        let service = Service::new(db.clone(), Arc::new(repo));
        let soup = recipe("Soup", Some(40), &[], 0);
        service.create(&soup).await.unwrap();

        let (alice, bob) = (Uuid::from_u128(1), Uuid::from_u128(2));
        for (user_id, taste) in [(alice, 4), (bob, 2)] {
            service
                .rate(
                    soup.id(),
                    Rating {
                        user_id,
                        taste,
                        convenience: 3,
                        comment: None,
                    },
                )
                .await
                .unwrap();
        }
        let rated = service.get(soup.id()).await.unwrap();
        assert_eq!(rated.version(), 3);
        assert_eq!(rated.average_taste_rating(), Some(3.0));

        let patched = service
            .update_properties(
                soup.id(),
                3,
                RecipePatch {
                    name: Some("Hearty soup".to_owned()),
                    ..RecipePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.version(), 4);

        let err = service
            .update_properties(soup.id(), 3, RecipePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Repo(RepoError::ConcurrentModification {
                expected_version: 3,
                ..
            })
        ));

        service.delete(soup.id()).await.unwrap();
        assert!(matches!(
            service.get(soup.id()).await.unwrap_err(),
            DomainError::Repo(RepoError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_rating_leaves_the_stored_recipe_untouched() {
        let (db, repo) = setup().await;
        let service = Service::new(db.clone(), Arc::new(repo));
        let soup = recipe("Soup", None, &[], 0);
        service.create(&soup).await.unwrap();

        let err = service
            .rate(
                soup.id(),
                Rating {
                    user_id: Uuid::new_v4(),
                    taste: 9,
                    convenience: 1,
                    comment: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Recipe(_)));
        let stored = service.get(soup.id()).await.unwrap();
        assert!(stored.ratings().is_empty());
        assert_eq!(stored.version(), 1);
    }
}
