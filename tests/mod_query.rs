use bson::{Bson, doc};
use docops::document::Document;
use docops::query::{
    FindOptions, ReturnDocument, WriteModel, bulk_write, count_docs, delete_many, eval_filter,
    find_docs, find_one_and_replace, find_one_and_update, parse_filter, update_many,
};

fn docs(items: Vec<bson::Document>) -> Vec<Document> {
    items.into_iter().map(Document::new).collect()
}

fn people() -> Vec<Document> {
    docs(vec![
        doc! {
            "_id": 1,
            "name": "ann",
            "age": 30,
            "tags": ["Engineering", "x"],
            "address": { "state": "CA" },
        },
        doc! {
            "_id": 2,
            "name": "bob",
            "age": 24,
            "tags": ["Sales"],
            "address": { "state": "NY" },
        },
        doc! { "_id": 3, "name": "cyd", "age": 27.5, "email": "john@x.io" },
    ])
}

#[test]
fn or_of_range_and_array_membership() {
    let f = parse_filter(&doc! {
        "$or": [{ "age": { "$gte": 25, "$lt": 30 } }, { "tags": "Engineering" }]
    })
    .unwrap();
    let hits: Vec<i32> = people()
        .iter()
        .filter(|d| eval_filter(&d.data, &f))
        .map(|d| d.data.get_i32("_id").unwrap())
        .collect();
    assert_eq!(hits, vec![1, 3]);
}

#[test]
fn dotted_paths_regex_and_missing_fields() {
    let data = people();
    assert_eq!(count_docs(&data, &doc! { "address.state": "CA" }).unwrap(), 1);
    assert_eq!(count_docs(&data, &doc! { "email": { "$regex": "^john" } }).unwrap(), 1);
    let insensitive = doc! { "email": { "$regex": "^JOHN", "$options": "i" } };
    assert_eq!(count_docs(&data, &insensitive).unwrap(), 1);
    assert_eq!(count_docs(&data, &doc! { "email": { "$exists": false } }).unwrap(), 2);
    assert_eq!(count_docs(&data, &doc! { "email": Bson::Null }).unwrap(), 2);
    assert_eq!(count_docs(&data, &doc! { "tags": { "$nin": ["Sales"] } }).unwrap(), 2);
}

#[test]
fn find_sorts_limits_and_projects() {
    let opts = FindOptions {
        sort: Some(doc! { "age": 1 }),
        limit: Some(2),
        projection: Some(doc! { "name": 1, "age": 1, "_id": 0 }),
        skip: None,
    };
    let out = find_docs(&people(), &doc! {}, &opts).unwrap();
    assert_eq!(out, vec![doc! { "name": "bob", "age": 24 }, doc! { "name": "cyd", "age": 27.5 }]);
}

#[test]
fn unknown_operators_are_query_errors() {
    assert!(parse_filter(&doc! { "a": { "$near": [0, 0] } }).is_err());
    assert!(parse_filter(&doc! { "$where": "true" }).is_err());
    let mut data = people();
    assert!(update_many(&mut data, &doc! {}, &doc! { "$rename": { "a": "b" } }).is_err());
}

#[test]
fn update_many_counts_matched_and_modified() {
    let mut data = people();
    let set_skills = doc! { "$set": { "skills": [] } };
    let first = update_many(&mut data, &doc! { "age": { "$gte": 25 } }, &set_skills).unwrap();
    assert_eq!((first.matched, first.modified), (2, 2));
    let again = update_many(&mut data, &doc! { "age": { "$gte": 25 } }, &set_skills).unwrap();
    assert_eq!((again.matched, again.modified), (2, 0));
}

#[test]
fn find_one_and_update_returns_requested_image() {
    let mut data = people();
    let upd = doc! { "$addToSet": { "tags": { "$each": ["x", "y"] } } };
    let before = find_one_and_update(&mut data, &doc! { "_id": 1 }, &upd, ReturnDocument::Before)
        .unwrap()
        .unwrap();
    assert_eq!(before.get_array("tags").unwrap().len(), 2);
    let after = find_one_and_update(&mut data, &doc! { "_id": 1 }, &upd, ReturnDocument::After)
        .unwrap()
        .unwrap();
    assert_eq!(
        after.get_array("tags").unwrap(),
        &vec![Bson::from("Engineering"), "x".into(), "y".into()]
    );
    assert!(
        find_one_and_update(&mut data, &doc! { "_id": 99 }, &upd, ReturnDocument::After)
            .unwrap()
            .is_none()
    );
}

#[test]
fn failed_update_leaves_document_untouched() {
    let mut data = docs(vec![doc! { "_id": 1, "n": 1, "tags": "flat" }]);
    let upd = doc! { "$inc": { "n": 1 }, "$push": { "tags": "x" } };
    assert!(find_one_and_update(&mut data, &doc! {}, &upd, ReturnDocument::After).is_err());
    assert_eq!(data[0].data.get_i32("n").unwrap(), 1);
}

#[test]
fn replace_keeps_id_and_drops_other_fields() {
    let mut data = people();
    let out = find_one_and_replace(
        &mut data,
        &doc! { "$and": [{ "email": { "$regex": "^john" } }] },
        &doc! { "firstName": "Jason", "department": "Support" },
        ReturnDocument::After,
    )
    .unwrap()
    .unwrap();
    assert_eq!(out, doc! { "_id": 3, "firstName": "Jason", "department": "Support" });
    let operators = doc! { "$set": { "a": 1 } };
    assert!(find_one_and_replace(&mut data, &doc! {}, &operators, ReturnDocument::After).is_err());
}

#[test]
fn ordered_bulk_steps_see_earlier_steps() {
    let mut data = Vec::new();
    let report = bulk_write(
        &mut data,
        &[
            WriteModel::InsertOne { document: doc! { "type": "a" } },
            WriteModel::InsertOne { document: doc! { "type": "b" } },
            WriteModel::UpdateMany {
                filter: doc! { "type": "a" },
                update: doc! { "$set": { "tags": ["t1", "t2"] } },
            },
            WriteModel::UpdateMany {
                filter: doc! {},
                update: doc! { "$pull": { "tags": { "$in": ["t1"] } } },
            },
            WriteModel::DeleteOne { filter: doc! { "type": "b" } },
        ],
    )
    .unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].data.get_array("tags").unwrap(), &vec![Bson::from("t2")]);
}

#[test]
fn delete_many_reports_count() {
    let mut data = people();
    assert_eq!(delete_many(&mut data, &doc! { "age": { "$lt": 28 } }).unwrap().deleted, 2);
    assert_eq!(data.len(), 1);
}

#[test]
fn oversized_update_is_rejected_without_partial_writes() {
    let mut store = people();
    let mut fields = bson::Document::new();
    for i in 0..130 {
        fields.insert(format!("f{i}"), i);
    }
    let res = update_many(&mut store, &doc! { "_id": 1 }, &doc! { "$set": fields });
    assert!(matches!(res, Err(docops::DbError::Query(_))));
    assert!(!store[0].data.contains_key("f0"));
    assert!(!store[0].data.contains_key("f129"));
}

#[test]
fn zero_limit_is_unbounded_and_negative_limit_uses_magnitude() {
    let with_limit = |limit| FindOptions { limit: Some(limit), ..FindOptions::default() };
    assert_eq!(find_docs(&people(), &doc! {}, &with_limit(0)).unwrap().len(), 3);
    assert_eq!(find_docs(&people(), &doc! {}, &with_limit(-2)).unwrap().len(), 2);
    assert_eq!(find_docs(&people(), &doc! {}, &with_limit(2)).unwrap().len(), 2);
}
