use recipe_core::{
    ChangeNotifier, Database, Ingredient, Locator, ObserverScope, Operation, ProviderError,
    Recipe, RecipeProvider, Step, Target,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

const AUTHORITY: &str = "com.example.recipe";
const COLLECTION: &str = "content://com.example.recipe/recipes";

fn setup() -> (Arc<Database>, RecipeProvider) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let provider =
        RecipeProvider::new(Arc::clone(&db), Arc::new(ChangeNotifier::new()), AUTHORITY).unwrap();
    (db, provider)
}

fn count_rows(db: &Database, table: &str) -> i64 {
    let conn = db.lock().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

fn nutella_pie() -> Recipe {
    Recipe::new("Nutella Pie", 8)
        .with_image("https://example.com/nutella-pie.jpg")
        .with_ingredient(Ingredient::new(2.0, "CUP", "Graham Cracker crumbs"))
        .with_ingredient(Ingredient::new(6.0, "TBLSP", "unsalted butter, melted"))
        .with_ingredient(Ingredient::new(0.5, "CUP", "granulated sugar"))
        .with_step(Step::new("Recipe Introduction", "Recipe Introduction"))
        .with_step(
            Step::new("Starting prep", "1. Preheat the oven to 350°F.")
                .with_video("https://example.com/prep.mp4")
                .with_thumbnail("https://example.com/prep.jpg"),
        )
}

#[test]
fn create_then_read_item_returns_children_in_submitted_order() {
    let (db, provider) = setup();
    let payload = nutella_pie();

    let created = provider.insert(COLLECTION, &payload).unwrap();
    let id: i64 = created
        .as_str()
        .rsplit('/')
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(created, provider.item_locator(id));

    let query = provider.query(&created).unwrap();
    assert_eq!(query.target, Target::Item(id));
    assert_eq!(query.notification_locator, created);
    let recipe = query.into_single().unwrap();

    assert_eq!(recipe.id, id);
    assert!(recipe.is_persisted());
    assert_eq!(recipe.name, "Nutella Pie");
    assert_eq!(recipe.image, "https://example.com/nutella-pie.jpg");
    let names: Vec<&str> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
    let expected: Vec<&str> = payload.ingredients.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, expected);
    let shorts: Vec<&str> = recipe
        .steps
        .iter()
        .map(|s| s.short_description.as_str())
        .collect();
    assert_eq!(shorts, vec!["Recipe Introduction", "Starting prep"]);
    assert!(recipe.ingredients.iter().all(|i| i.recipe_id == id));
    assert!(recipe.steps.iter().all(|s| s.recipe_id == id));
    assert_eq!(
        recipe.steps[1].video_url.as_deref(),
        Some("https://example.com/prep.mp4")
    );
    assert_eq!(
        recipe.steps[1].thumbnail_url.as_deref(),
        Some("https://example.com/prep.jpg")
    );

    assert_eq!(count_rows(&db, "recipes"), 1);
    assert_eq!(count_rows(&db, "ingredients"), 3);
    assert_eq!(count_rows(&db, "steps"), 2);
}

#[test]
fn failed_recipe_insert_writes_no_children() {
    let (db, provider) = setup();
    let mut payload = nutella_pie();
    payload.name = "   ".to_string();

    let err = provider.insert(COLLECTION, &payload).unwrap_err();
    assert!(matches!(
        err,
        ProviderError::StorageWriteFailed { source: Some(_), .. }
    ));

    assert_eq!(count_rows(&db, "recipes"), 0);
    assert_eq!(count_rows(&db, "ingredients"), 0);
    assert_eq!(count_rows(&db, "steps"), 0);
}

#[test]
fn rejected_child_rows_do_not_fail_create() {
    let (db, provider) = setup();
    let payload = Recipe::new("Brownies", 8)
        .with_ingredient(Ingredient::new(350.0, "G", "Bittersweet chocolate"))
        .with_ingredient(Ingredient::new(-1.0, "G", "impossible butter"))
        .with_ingredient(Ingredient::new(3.0, "UNIT", "eggs"));

    let created = provider.insert(COLLECTION, &payload).unwrap();

    let recipe = provider.query(&created).unwrap().into_single().unwrap();
    let names: Vec<&str> = recipe.ingredients.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Bittersweet chocolate", "eggs"]);
    assert_eq!(count_rows(&db, "ingredients"), 2);
}

#[test]
fn read_collection_returns_every_recipe_with_children() {
    let (_db, provider) = setup();
    provider.insert(COLLECTION, &nutella_pie()).unwrap();
    provider
        .insert(COLLECTION, &Recipe::new("Yellow Cake", 8))
        .unwrap();

    let query = provider.query(COLLECTION).unwrap();
    assert_eq!(query.target, Target::Collection);
    assert_eq!(query.recipes.len(), 2);
    assert_eq!(query.recipes[0].ingredients.len(), 3);
    assert!(query.recipes[1].ingredients.is_empty());
}

#[test]
fn read_missing_item_is_empty() {
    let (_db, provider) = setup();
    let query = provider.query(format!("{COLLECTION}/42")).unwrap();
    assert!(query.is_empty());
}

#[test]
fn delete_removes_recipe_and_children_and_missing_id_counts_zero() {
    let (db, provider) = setup();
    let keep = provider.insert(COLLECTION, &nutella_pie()).unwrap();
    let doomed = provider.insert(COLLECTION, &nutella_pie()).unwrap();

    assert_eq!(provider.delete(&doomed).unwrap(), 1);
    assert_eq!(provider.delete(&doomed).unwrap(), 0);
    assert_eq!(provider.delete(format!("{COLLECTION}/9999")).unwrap(), 0);

    assert!(provider.query(&doomed).unwrap().is_empty());
    assert!(!provider.query(&keep).unwrap().is_empty());
    assert_eq!(count_rows(&db, "recipes"), 1);
    assert_eq!(count_rows(&db, "ingredients"), 3);
    assert_eq!(count_rows(&db, "steps"), 2);
}

#[test]
fn unrecognized_locators_fail_every_operation() {
    let (db, provider) = setup();
    let recipe = nutella_pie();

    for locator in [
        "content://com.example.recipe/ingredients",
        "content://com.example.recipe/recipes/abc",
        "content://com.example.recipe/recipes/1/steps",
        "content://elsewhere/recipes",
        "recipes/1",
    ] {
        assert!(matches!(
            provider.query(locator),
            Err(ProviderError::InvalidLocator(_))
        ));
        assert!(matches!(
            provider.insert(locator, &recipe),
            Err(ProviderError::InvalidLocator(_))
        ));
        assert!(matches!(
            provider.bulk_insert(locator, std::slice::from_ref(&recipe)),
            Err(ProviderError::InvalidLocator(_))
        ));
        assert!(matches!(
            provider.delete(locator),
            Err(ProviderError::InvalidLocator(_))
        ));
        assert!(matches!(
            provider.update(locator, &recipe),
            Err(ProviderError::InvalidLocator(_))
        ));
        assert!(matches!(
            provider.content_type(locator),
            Err(ProviderError::InvalidLocator(_))
        ));
    }

    assert_eq!(count_rows(&db, "recipes"), 0);
}

#[test]
fn verb_target_mismatches_are_rejected_without_mutation() {
    let (db, provider) = setup();
    let existing = provider.insert(COLLECTION, &nutella_pie()).unwrap();

    let err = provider.insert(&existing, &nutella_pie()).unwrap_err();
    assert!(matches!(
        err,
        ProviderError::UnsupportedTarget {
            operation: Operation::Create,
            ..
        }
    ));

    let err = provider
        .bulk_insert(&existing, &[nutella_pie()])
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::UnsupportedTarget {
            operation: Operation::BulkCreate,
            ..
        }
    ));

    let err = provider.delete(COLLECTION).unwrap_err();
    assert!(matches!(
        err,
        ProviderError::UnsupportedTarget {
            operation: Operation::Delete,
            ..
        }
    ));

    for locator in [COLLECTION, existing.as_str()] {
        let err = provider.update(locator, &nutella_pie()).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::NotImplemented {
                operation: Operation::Update,
                ..
            }
        ));
    }

    assert_eq!(count_rows(&db, "recipes"), 1);
    assert_eq!(count_rows(&db, "ingredients"), 3);
}

#[test]
fn bulk_insert_skips_children_of_rejected_parents() {
    let (db, provider) = setup();
    let mut broken = nutella_pie();
    broken.name = String::new();

    let created = provider
        .bulk_insert(COLLECTION, &[nutella_pie(), broken, Recipe::new("Yellow Cake", 8)])
        .unwrap();

    assert_eq!(created, 2);
    assert_eq!(count_rows(&db, "recipes"), 2);
    assert_eq!(count_rows(&db, "ingredients"), 3);
    assert_eq!(count_rows(&db, "steps"), 2);

    let names: Vec<String> = provider
        .query(COLLECTION)
        .unwrap()
        .recipes
        .into_iter()
        .map(|recipe| recipe.name)
        .collect();
    assert_eq!(names, vec!["Nutella Pie", "Yellow Cake"]);
}

#[test]
fn catalog_json_payload_deserializes_and_imports() {
    let (_db, provider) = setup();
    let payload = r#"[
        {
            "id": 1,
            "name": "Nutella Pie",
            "ingredients": [
                {"quantity": 2, "measure": "CUP", "ingredient": "Graham Cracker crumbs"},
                {"quantity": 6, "measure": "TBLSP", "ingredient": "unsalted butter, melted"}
            ],
            "steps": [
                {"id": 0, "shortDescription": "Recipe Introduction", "description": "Recipe Introduction", "videoURL": "https://example.com/intro.mp4", "thumbnailURL": ""},
                {"id": 1, "shortDescription": "Starting prep", "description": "1. Preheat the oven.", "videoURL": "", "thumbnailURL": ""}
            ],
            "servings": 8,
            "image": ""
        }
    ]"#;
    let recipes: Vec<Recipe> = serde_json::from_str(payload).unwrap();
    assert_eq!(recipes[0].ingredients[0].name, "Graham Cracker crumbs");
    assert!(recipes[0].steps[1].video_url.is_none());

    assert_eq!(provider.bulk_insert(COLLECTION, &recipes).unwrap(), 1);
    let stored = provider.query(COLLECTION).unwrap().into_single().unwrap();
    assert_eq!(stored.servings, 8);
    assert_eq!(stored.steps.len(), 2);
    assert_eq!(
        stored.steps[0].video_url.as_deref(),
        Some("https://example.com/intro.mp4")
    );
    assert!(stored.steps[0].thumbnail_url.is_none());
}

#[test]
fn content_type_distinguishes_collection_and_item() {
    let (_db, provider) = setup();
    assert_eq!(
        provider.content_type(COLLECTION).unwrap(),
        "vnd.recipe.dir/com.example.recipe.recipes"
    );
    assert_eq!(
        provider.content_type(format!("{COLLECTION}/3")).unwrap(),
        "vnd.recipe.item/com.example.recipe.recipes"
    );
}

#[test]
fn writes_notify_observers_of_the_call_locator() {
    let (_db, provider) = setup();
    let seen: Arc<Mutex<Vec<Locator>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    provider.notifier().subscribe(
        provider.collection_locator(),
        ObserverScope::Descendants,
        move |changed| sink.lock().unwrap().push(changed.clone()),
    );

    let created = provider.insert(COLLECTION, &nutella_pie()).unwrap();

    let item_hits = Arc::new(AtomicUsize::new(0));
    let item_sink = Arc::clone(&item_hits);
    let query = provider.query(&created).unwrap();
    provider.notifier().subscribe(
        query.notification_locator.clone(),
        ObserverScope::Exact,
        move |_| {
            item_sink.fetch_add(1, Ordering::SeqCst);
        },
    );

    provider.bulk_insert(COLLECTION, &[nutella_pie()]).unwrap();
    provider.delete(&created).unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            Locator::new(COLLECTION),
            Locator::new(COLLECTION),
            created.clone()
        ]
    );
    // Collection-wide bulk create plus the item delete.
    assert_eq!(item_hits.load(Ordering::SeqCst), 2);
}

#[test]
fn rejected_calls_do_not_notify() {
    let (_db, provider) = setup();
    let hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&hits);
    provider.notifier().subscribe(
        provider.collection_locator(),
        ObserverScope::Descendants,
        move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        },
    );

    let mut broken = nutella_pie();
    broken.name = String::new();
    let _ = provider.insert(COLLECTION, &broken);
    let _ = provider.delete(COLLECTION);
    let _ = provider.update(format!("{COLLECTION}/1"), &nutella_pie());
    let _ = provider.insert("content://nowhere/recipes", &nutella_pie());

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn concurrent_reads_see_whole_recipes_during_creates() {
    let (_db, provider) = setup();
    let provider = Arc::new(provider);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let provider = Arc::clone(&provider);
            thread::spawn(move || {
                for _ in 0..50 {
                    let query = provider.query(COLLECTION).unwrap();
                    for recipe in &query.recipes {
                        assert_eq!(recipe.ingredients.len(), 3);
                        assert_eq!(recipe.steps.len(), 2);
                    }
                }
            })
        })
        .collect();

    for _ in 0..20 {
        provider.insert(COLLECTION, &nutella_pie()).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(provider.query(COLLECTION).unwrap().recipes.len(), 20);
}

#[test]
fn bulk_insert_keeps_going_and_notifies_when_a_fan_out_fails() {
    let (db, provider) = setup();
    db.lock().unwrap().execute_batch("DROP TABLE steps;").unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&hits);
    provider.notifier().subscribe(
        provider.collection_locator(),
        ObserverScope::Exact,
        move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        },
    );

    let created = provider
        .bulk_insert(COLLECTION, &[nutella_pie(), nutella_pie()])
        .unwrap();

    assert_eq!(created, 2);
    assert_eq!(count_rows(&db, "recipes"), 2);
    assert_eq!(count_rows(&db, "ingredients"), 6);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn bulk_insert_without_new_rows_does_not_notify() {
    let (_db, provider) = setup();
    let hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&hits);
    provider.notifier().subscribe(
        provider.collection_locator(),
        ObserverScope::Exact,
        move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        },
    );

    assert_eq!(provider.bulk_insert(COLLECTION, &[]).unwrap(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn item_delete_reaches_exact_collection_observer() {
    let (_db, provider) = setup();
    let created = provider.insert(COLLECTION, &nutella_pie()).unwrap();

    let list = provider.query(COLLECTION).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&hits);
    provider.notifier().subscribe(
        list.notification_locator,
        ObserverScope::Exact,
        move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        },
    );

    assert_eq!(provider.delete(&created).unwrap(), 1);

    assert!(provider.query(COLLECTION).unwrap().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn zero_padded_ids_announce_on_the_canonical_item_locator() {
    let (_db, provider) = setup();
    let created = provider.insert(COLLECTION, &nutella_pie()).unwrap();
    let id: i64 = created.as_str().rsplit('/').next().unwrap().parse().unwrap();
    let padded = format!("{COLLECTION}/0{id}");

    let query = provider.query(&padded).unwrap();
    assert_eq!(query.notification_locator, created);

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&hits);
    provider
        .notifier()
        .subscribe(created.clone(), ObserverScope::Exact, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

    assert_eq!(provider.delete(&padded).unwrap(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
