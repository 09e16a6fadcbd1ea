use bson::{Bson, doc};
use docops::catalog::{
    average_by_student_pipeline, average_homework_pipeline, worst_homework_pipeline,
};
use docops::DbError;
use docops::document::Document;
use docops::query::{Order, SortSpec, aggregate, is_sorted_by, parse_pipeline, run_pipeline};

fn students() -> Vec<bson::Document> {
    vec![
        doc! {
            "_id": 1,
            "name": "a",
            "scores": [{ "type": "homework", "score": 70 }, { "type": "exam", "score": 90 }],
        },
        doc! {
            "_id": 2,
            "name": "b",
            "scores": [{ "type": "homework", "score": 55.5 }, { "type": "quiz", "score": 99 }],
        },
        doc! {
            "_id": 3,
            "name": "c",
            "scores": [{ "type": "homework", "score": 80 }, { "type": "homework", "score": 60 }],
        },
    ]
}

fn run(docs: Vec<bson::Document>, pipeline: &[bson::Document]) -> Vec<bson::Document> {
    run_pipeline(docs, &parse_pipeline(pipeline).unwrap())
}

#[test]
fn worst_homework_is_a_single_projected_row() {
    let out = run(students(), &worst_homework_pipeline());
    assert_eq!(out, vec![doc! { "name": "b", "worst_homework_score": 55.5 }]);
}

#[test]
fn average_homework_spans_all_students() {
    let out = run(students(), &average_homework_pipeline());
    let expected = (70.0 + 55.5 + 80.0 + 60.0) / 4.0;
    assert_eq!(out.len(), 1);
    assert!((out[0].get_f64("avg_score").unwrap() - expected).abs() < 1e-9);
    assert!(!out[0].contains_key("_id"));
}

#[test]
fn averages_by_student_sorted_descending() {
    let out = run(students(), &average_by_student_pipeline());
    let names: Vec<&str> = out.iter().map(|d| d.get_str("_id").unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(is_sorted_by(&out, &[SortSpec { field: "avg_score".into(), order: Order::Desc }]));
}

#[test]
fn equal_averages_keep_first_encounter_order() {
    let docs = vec![
        doc! { "name": "late", "scores": [{ "type": "quiz", "score": 50 }] },
        doc! { "name": "top", "scores": [{ "type": "quiz", "score": 90 }] },
        doc! { "name": "early", "scores": [{ "type": "quiz", "score": 50 }] },
    ];
    let out = run(docs, &average_by_student_pipeline());
    let names: Vec<&str> = out.iter().map(|d| d.get_str("_id").unwrap()).collect();
    assert_eq!(names, vec!["top", "late", "early"]);
}

#[test]
fn avg_of_no_numbers_is_null_and_count_counts() {
    let docs = vec![doc! { "k": 1, "v": "x" }, doc! { "k": 1 }];
    let out = run(docs.clone(), &[doc! { "$group": { "_id": "$k", "m": { "$avg": "$v" } } }]);
    assert_eq!(out, vec![doc! { "_id": 1, "m": Bson::Null }]);
    let counted = run(docs, &[doc! { "$match": { "k": 1 } }, doc! { "$count": "n" }]);
    assert_eq!(counted, vec![doc! { "n": 2_i32 }]);
}

#[test]
fn skip_limit_and_min_max() {
    let out = run(
        students(),
        &[
            doc! { "$unwind": "$scores" },
            doc! { "$group": {
                "_id": null,
                "lo": { "$min": "$scores.score" },
                "hi": { "$max": "$scores.score" },
                "n": { "$sum": 1 },
            } },
        ],
    );
    assert_eq!(out, vec![doc! { "_id": Bson::Null, "lo": 55.5, "hi": 99, "n": 6 }]);
    let sliced = run(students(), &[doc! { "$skip": 1 }, doc! { "$limit": 1 }]);
    assert_eq!(sliced[0].get_i32("_id").unwrap(), 2);
}

#[test]
fn unsupported_expression_operators_are_rejected() {
    let docs: Vec<Document> = vec![Document::new(doc! { "a": 1 })];
    let add = doc! { "$project": { "x": { "$add": ["$a", 1] }, "_id": 0 } };
    let projected = aggregate(&docs, &[add]);
    assert!(matches!(projected, Err(DbError::Query(_))));

    let multiply = doc! { "$group": { "_id": null, "m": { "$avg": { "$multiply": ["$a", 2] } } } };
    let grouped = aggregate(&docs, &[multiply]);
    assert!(matches!(grouped, Err(DbError::Query(_))));

    let nested = aggregate(&docs, &[doc! { "$group": { "_id": { "k": { "$toUpper": "$a" } } } }]);
    assert!(matches!(nested, Err(DbError::Query(_))));

    // $literal still passes an operator-looking value through untouched
    let quoted = doc! { "$project": { "x": { "$literal": { "$add": 1 } }, "_id": 0 } };
    let literal = aggregate(&docs, &[quoted]).unwrap();
    assert_eq!(literal, vec![doc! { "x": { "$add": 1 } }]);
}

#[test]
fn count_narrows_to_int32() {
    let out = run(students(), &[doc! { "$count": "total" }]);
    assert_eq!(out, vec![doc! { "total": Bson::Int32(3) }]);
}
