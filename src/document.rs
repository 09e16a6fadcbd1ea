use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

/// A document held by the in-memory store. Always carries an `_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub data: BsonDocument,
}

impl Document {
    /// Wraps `data`, assigning an `ObjectId` under `_id` when none is present.
    pub fn new(mut data: BsonDocument) -> Self {
        if !data.contains_key("_id") {
            let mut with_id = BsonDocument::new();
            with_id.insert("_id", ObjectId::new());
            for (k, v) in data {
                with_id.insert(k, v);
            }
            data = with_id;
        }
        Self { data }
    }

    pub fn id(&self) -> Option<&Bson> {
        self.data.get("_id")
    }

    /// Swaps the body for `replacement`, keeping the existing `_id`.
    pub fn replace(&mut self, replacement: BsonDocument) {
        let mut body = BsonDocument::new();
        if let Some(id) = self.data.get("_id") {
            body.insert("_id", id.clone());
        }
        for (k, v) in replacement {
            if k != "_id" {
                body.insert(k, v);
            }
        }
        self.data = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn new_puts_generated_id_first() {
        let d = Document::new(doc! { "name": "Ann" });
        assert_eq!(d.data.keys().next().map(String::as_str), Some("_id"));
        assert!(matches!(d.id(), Some(Bson::ObjectId(_))));
    }

    #[test]
    fn replace_keeps_the_original_id() {
        let mut d = Document::new(doc! { "_id": 7, "name": "Ann" });
        d.replace(doc! { "_id": 9, "firstName": "Jason" });
        assert_eq!(d.data, doc! { "_id": 7, "firstName": "Jason" });
    }
}
