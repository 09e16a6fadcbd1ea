use bson::doc;
use docops::Database;
use docops::catalog::{
    self, OPERATIONS, OperationId, Outcome, add_core_skills, add_skills_field, add_tag_b,
    average_by_student, average_homework, delete_support_users, find_tagged_articles, get_users,
    pull_tag_c, replace_john_in_ca, seed_articles, worst_homework, youngest_users,
};
use docops::model::ArticleType;
use docops::query::FindOptions;
use docops::seed;

async fn seeded() -> Database {
    let db = Database::in_memory();
    seed::seed_users(&db, 0).await.unwrap();
    seed::seed_students(&db).await.unwrap();
    db
}

#[tokio::test]
async fn get_users_returns_all_and_first() {
    let db = seeded().await;
    let (all, first) = get_users(&db).await.unwrap();
    assert_eq!(all.len(), seed::fixture_users().len());
    assert_eq!(first, Some(all[0].clone()));
    assert_eq!(all[0].first_name.as_deref(), Some("John"));
}

#[tokio::test]
async fn youngest_users_are_sorted_limited_and_projected() {
    let db = seeded().await;
    let rows = youngest_users(&db).await.unwrap();
    let ages: Vec<i32> = rows.iter().map(|r| r.age).collect();
    assert_eq!(ages, vec![19, 22, 26, 28, 29]);

    // The raw documents carry exactly the three projected fields
    let raw = db
        .users()
        .find(
            doc! {},
            FindOptions {
                sort: Some(doc! { "age": 1 }),
                limit: Some(5),
                projection: Some(doc! { "firstName": 1, "lastName": 1, "age": 1, "_id": 0 }),
                skip: None,
            },
        )
        .await
        .unwrap();
    for d in raw {
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["firstName", "lastName", "age"]);
    }
}

#[tokio::test]
async fn skills_field_is_added_once() {
    let db = seeded().await;
    let (first, users) = add_skills_field(&db).await.unwrap();
    assert_eq!(first.matched, 5);
    assert_eq!(first.modified, 5);
    assert_eq!(users.iter().filter(|u| u.skills == Some(vec![])).count(), 5);
    assert!(users.iter().any(|u| u.first_name.as_deref() == Some("Alice") && u.skills.is_none()));

    let (second, again) = add_skills_field(&db).await.unwrap();
    assert_eq!(second.matched, 5);
    assert_eq!(second.modified, 0);
    assert_eq!(users, again);
}

#[tokio::test]
async fn core_skills_are_a_set() {
    let db = seeded().await;
    assert!(add_core_skills(&db).await.unwrap().is_none());

    add_skills_field(&db).await.unwrap();
    let once = add_core_skills(&db).await.unwrap().unwrap();
    let twice = add_core_skills(&db).await.unwrap().unwrap();
    assert_eq!(once.skills, Some(vec!["js".to_string(), "git".to_string()]));
    assert_eq!(once, twice);
}

#[tokio::test]
async fn jason_wood_lifecycle() {
    let db = seeded().await;
    let jason = replace_john_in_ca(&db).await.unwrap().unwrap();
    assert_eq!(jason.first_name.as_deref(), Some("Jason"));
    assert_eq!(jason.tags, vec!["a", "b", "c"]);
    assert_eq!(jason.department.as_deref(), Some("Support"));
    assert!(jason.email.is_none() && jason.age.is_none() && jason.address.is_none());
    // The replaced user no longer matches, and John Doe lives in WA
    assert!(replace_john_in_ca(&db).await.unwrap().is_none());

    let pulled = pull_tag_c(&db).await.unwrap().unwrap();
    assert_eq!(pulled.tags, vec!["a", "b"]);
    assert_eq!(pulled.id, jason.id);
    assert_eq!(pull_tag_c(&db).await.unwrap().unwrap().tags, vec!["a", "b"]);

    let added = add_tag_b(&db).await.unwrap().unwrap();
    assert_eq!(added.tags, vec!["a", "b"]);

    let (report, left) = delete_support_users(&db).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(left.len(), seed::fixture_users().len() - 1);
    assert!(left.iter().all(|u| u.department.is_none()));
    assert!(pull_tag_c(&db).await.unwrap().is_none());
}

#[tokio::test]
async fn seed_articles_is_repeatable() {
    let db = Database::in_memory();
    db.articles()
        .insert_one(doc! { "name": "stale", "type": "a", "description": "" })
        .await
        .unwrap();
    for _ in 0..2 {
        let (report, articles) = seed_articles(&db).await.unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(articles.len(), 3);
        for a in &articles {
            match a.kind {
                ArticleType::A => assert_eq!(a.tags, vec!["tag2-a", "tag3"]),
                _ => assert_eq!(a.tags, vec!["tag3", "super"]),
            }
        }
    }
    let tagged = find_tagged_articles(&db).await.unwrap();
    assert_eq!(tagged.len(), 3);
}

#[tokio::test]
async fn student_statistics() {
    let db = seeded().await;
    let worst = worst_homework(&db).await.unwrap();
    assert_eq!(worst.len(), 1);
    assert_eq!(worst[0].name, "Bob Lee");
    assert!((worst[0].worst_homework_score - 62.5).abs() < f64::EPSILON);

    let avg = average_homework(&db).await.unwrap();
    assert_eq!(avg.len(), 1);
    assert!((avg[0].avg_score - 79.5).abs() < 1e-9);

    let per_student = average_by_student(&db).await.unwrap();
    let names: Vec<&str> = per_student.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Charlie Diaz", "Alice Moore", "Bob Lee"]);
    assert!(per_student.windows(2).all(|w| w[0].avg_score > w[1].avg_score));
}

#[tokio::test]
async fn empty_collections_are_not_errors() {
    for op in &OPERATIONS {
        let db = Database::in_memory();
        let outcome = catalog::run(&db, op.id).await.unwrap();
        if op.id != OperationId::SeedArticles {
            assert!(outcome.is_empty(), "{} produced rows on an empty store", op.name);
        }
    }
    let db = Database::in_memory();
    assert!(matches!(
        catalog::run(&db, OperationId::PullTagC).await.unwrap(),
        Outcome::User(None)
    ));
}

#[tokio::test]
async fn run_logged_hands_back_typed_errors() {
    let db = Database::in_memory();
    db.users().insert_one(doc! { "skills": "not-a-list" }).await.unwrap();
    let err = catalog::run_logged(&db, OperationId::AddCoreSkills).await.unwrap_err();
    assert!(matches!(err, docops::DbError::Query(_)));
}

#[tokio::test]
async fn outcomes_serialize_with_kind_and_result() {
    let db = seeded().await;
    let outcome = catalog::run(&db, OperationId::AverageHomework).await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["kind"], "average_homework");
    assert_eq!(json["result"][0]["avg_score"], 79.5);
}
