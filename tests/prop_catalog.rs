use bson::doc;
use docops::Database;
use docops::catalog::{add_tag_b, pull_tag_c, youngest_users};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #[test]
    fn prop_youngest_users_sorted_and_capped(ages in proptest::collection::vec(0i32..120, 0..40)) {
        let rows = runtime().block_on(async {
            let db = Database::in_memory();
            for (i, age) in ages.iter().enumerate() {
                let user = doc! {
                    "firstName": format!("f{i}"),
                    "lastName": "x",
                    "age": *age,
                    "email": "e",
                };
                db.users().insert_one(user).await.unwrap();
            }
            youngest_users(&db).await.unwrap()
        });
        prop_assert!(rows.len() <= 5);
        prop_assert_eq!(rows.len(), ages.len().min(5));
        for w in rows.windows(2) {
            prop_assert!(w[0].age <= w[1].age);
        }
        let mut sorted = ages.clone();
        sorted.sort_unstable();
        let got: Vec<i32> = rows.iter().map(|r| r.age).collect();
        prop_assert_eq!(got, sorted.into_iter().take(5).collect::<Vec<_>>());
    }

    #[test]
    fn prop_pull_and_add_to_set_behave_as_set_ops(
        tags in proptest::collection::vec("[a-d]", 0..8)
    ) {
        let (pulled, pulled_again, added, added_again) = runtime().block_on(async {
            let db = Database::in_memory();
            db.users()
                .insert_one(doc! { "firstName": "Jason", "lastName": "Wood", "tags": tags.clone() })
                .await
                .unwrap();
            let pulled = pull_tag_c(&db).await.unwrap().unwrap().tags;
            let pulled_again = pull_tag_c(&db).await.unwrap().unwrap().tags;
            let added = add_tag_b(&db).await.unwrap().unwrap().tags;
            let added_again = add_tag_b(&db).await.unwrap().unwrap().tags;
            (pulled, pulled_again, added, added_again)
        });
        let expected: Vec<String> = tags.iter().filter(|t| t.as_str() != "c").cloned().collect();
        prop_assert_eq!(&pulled, &expected);
        prop_assert_eq!(&pulled_again, &pulled);
        let count_b = |v: &[String]| v.iter().filter(|t| t.as_str() == "b").count();
        prop_assert_eq!(count_b(&added), count_b(&expected).max(1));
        prop_assert_eq!(added_again, added);
    }
}
