// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Documents produced by the serializer read back through the deserializer.

use jsonapi_serde_client::{
    Cardinality, Deserializer, DeserializerOptions, IncludedShape, RelationshipShape,
};
use jsonapi_serde_core::json_api::Attributes;
use jsonapi_serde_core::schema::{self, object, string};
use jsonapi_serde_core::{
    EntitySerializer, IncludableIdentifier, IncludableRelationship, SerializeBuilder,
    SerializeOptions, SerializedEntity,
};
use proptest::prelude::*;
use serde_json::{json, Value};

struct Record {
    id: String,
    attributes: Attributes,
}

struct RecordSerializer;

impl EntitySerializer for RecordSerializer {
    type Entity = Record;
    type Context = ();

    fn id(&self, record: &Record) -> String {
        record.id.clone()
    }

    fn serialize<'a>(&self, record: &'a Record, _: Option<&()>) -> SerializedEntity<'a> {
        SerializedEntity::new().attributes(record.attributes.clone())
    }
}

struct Author {
    id: String,
    name: String,
}

struct Article {
    id: String,
    title: String,
    author: Author,
}

struct AuthorSerializer;

impl EntitySerializer for AuthorSerializer {
    type Entity = Author;
    type Context = ();

    fn id(&self, author: &Author) -> String {
        author.id.clone()
    }

    fn serialize<'a>(&self, author: &'a Author, _: Option<&()>) -> SerializedEntity<'a> {
        SerializedEntity::new().attribute("name", author.name.as_str())
    }
}

struct ArticleSerializer;

impl EntitySerializer for ArticleSerializer {
    type Entity = Article;
    type Context = ();

    fn id(&self, article: &Article) -> String {
        article.id.clone()
    }

    fn serialize<'a>(&self, article: &'a Article, _: Option<&()>) -> SerializedEntity<'a> {
        SerializedEntity::new()
            .attribute("title", article.title.as_str())
            .relationship(
                "author",
                IncludableRelationship::one(
                    IncludableIdentifier::new("user", article.author.id.as_str())
                        .with_entity(&article.author),
                ),
            )
    }
}

#[test]
fn compound_document_round_trip() {
    let registry = SerializeBuilder::new()
        .add("post", ArticleSerializer)
        .add("user", AuthorSerializer)
        .build();
    let article = Article {
        id: "2".into(),
        title: "hello".into(),
        author: Author {
            id: "1".into(),
            name: "Alice".into(),
        },
    };

    let body = registry
        .serialize_one(
            "post",
            &article,
            &SerializeOptions::new().with_include(["author"]),
        )
        .expect("serialize")
        .body();

    let deserializer = Deserializer::new(
        DeserializerOptions::new("post", Cardinality::One)
            .attributes(object().field("title", string()))
            .relationship(
                "author",
                RelationshipShape::new("user", Cardinality::One)
                    .included(IncludedShape::new().attributes(object().field("name", string()))),
            ),
    );

    let document = deserializer.deserialize(&body).expect("deserialize");
    assert_eq!(
        document.to_value(),
        json!({
            "data": {
                "id": "2",
                "title": "hello",
                "author": { "id": "1", "name": "Alice" }
            }
        })
    );
}

fn attribute_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,12}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn attributes_survive_serialize_then_deserialize(
        id in "[a-z0-9]{1,8}",
        attributes in prop::collection::btree_map("[a-z]{1,6}", attribute_value(), 1..6)
    ) {
        // `id` is reserved in the flattened object.
        let attributes: Attributes = attributes
            .into_iter()
            .filter(|(name, _)| name != "id")
            .collect();
        prop_assume!(!attributes.is_empty());

        let registry = SerializeBuilder::new().add("thing", RecordSerializer).build();
        let record = Record { id: id.clone(), attributes: attributes.clone() };
        let body = registry
            .serialize_one("thing", &record, &SerializeOptions::new())
            .expect("serialize")
            .body();

        let deserializer = Deserializer::new(
            DeserializerOptions::new("thing", Cardinality::One)
                .attributes(schema::record()),
        );
        let document = deserializer.deserialize(&body).expect("deserialize");
        let resource = document.data.as_one().expect("single resource");

        prop_assert_eq!(&resource.id, &id);
        prop_assert_eq!(&resource.attributes, &attributes);
    }
}

#[test]
fn any_schema_accepts_whatever_the_serializer_wrote() {
    let registry = SerializeBuilder::new().add("thing", RecordSerializer).build();
    let mut attributes = Attributes::new();
    attributes.insert("nested".into(), json!({ "deep": [1, 2, { "x": null }] }));
    let record = Record {
        id: "t1".into(),
        attributes,
    };

    let body = registry
        .serialize_one("thing", &record, &SerializeOptions::new())
        .expect("serialize")
        .body();
    let document = Deserializer::new(
        DeserializerOptions::new("thing", Cardinality::One).attributes(schema::any()),
    )
    .deserialize(&body)
    .expect("deserialize");

    assert_eq!(
        document.to_value()["data"]["nested"],
        json!({ "deep": [1, 2, { "x": null }] })
    );
}
