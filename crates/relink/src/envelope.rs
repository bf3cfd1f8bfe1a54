//! The JSON envelope: a human-readable rendering of IR trees.
//!
//! Every node maps to a JSON value:
//!
//! | node | JSON |
//! |------|------|
//! | null, booleans, integers, finite floats, strings | themselves |
//! | not-applicable | `{"na": null}` |
//! | `NaN`, `±inf` | `{"float": "NaN" \| "inf" \| "-inf"}` |
//! | byte string | `{"bytes": [0, 255, ...]}` |
//! | list without an id | a bare array |
//! | other collections | `{"kind": "tuple", "id": 3, "items": [...]}` |
//! | mappings | as above, items are `[key, value]` pairs |
//! | reference | `{"ref": 3}` |
//! | tagged | `{"type": "...", "handler": "...", "id": 3, "state": ...}` |
//!
//! `id` is omitted when the node has none. Integer and float nodes stay
//! distinct: a float is always written with a fractional part or exponent.
//!
//! Parsing text goes through `serde_json`, which refuses documents nested
//! deeper than 128 levels; [`from_json`] additionally enforces
//! [`Config::max_depth`].

use std::sync::Arc;

use serde_json::{Map, Number, Value as Json, json};

use crate::{
    config::{Config, DefaultConfig},
    diagnostic::{self, Breadcrumb, Path},
    error::{Error, ErrorKind, Result},
    ir::{CollectionKind, Elements, Id, Node, NodeKind, Primitive},
};

/// Renders `node` as a JSON value.
#[must_use]
pub fn to_json(node: &Node) -> Json {
    match node.kind() {
        NodeKind::Primitive(primitive) => primitive_to_json(primitive),
        NodeKind::Reference(id) => json!({ "ref": id.get() }),
        NodeKind::Collection(collection) => {
            let items = match &collection.elements {
                Elements::Items(items) => items.iter().map(to_json).collect(),
                Elements::Entries(entries) => entries
                    .iter()
                    .map(|(key, value)| json!([to_json(key), to_json(value)]))
                    .collect(),
            };

            if collection.kind == CollectionKind::List
                && collection.id.is_none()
            {
                return Json::Array(items);
            }

            let mut object = Map::new();
            object.insert("kind".into(), collection.kind.name().into());
            if let Some(id) = collection.id {
                object.insert("id".into(), id.get().into());
            }
            object.insert("items".into(), Json::Array(items));
            Json::Object(object)
        }
        NodeKind::Tagged(tagged) => {
            let mut object = Map::new();
            object.insert("type".into(), Json::from(&*tagged.type_name));
            object.insert("handler".into(), Json::from(&*tagged.handler));
            if let Some(id) = tagged.id {
                object.insert("id".into(), id.get().into());
            }
            object.insert("state".into(), to_json(&tagged.state));
            Json::Object(object)
        }
    }
}

fn primitive_to_json(primitive: &Primitive) -> Json {
    match primitive {
        Primitive::Null => Json::Null,
        Primitive::NotApplicable => json!({ "na": null }),
        Primitive::Bool(b) => Json::Bool(*b),
        Primitive::Int(i) => Json::from(*i),
        Primitive::Float(f) => Number::from_f64(*f).map_or_else(
            || {
                let name = if f.is_nan() {
                    "NaN"
                } else if f.is_sign_positive() {
                    "inf"
                } else {
                    "-inf"
                };
                json!({ "float": name })
            },
            Json::Number,
        ),
        Primitive::Str(s) => Json::String(s.to_string()),
        Primitive::Bytes(bytes) => json!({ "bytes": bytes.to_vec() }),
    }
}

/// Renders `node` as compact JSON text.
#[must_use]
pub fn to_string(node: &Node) -> String { to_json(node).to_string() }

/// Parses a JSON value produced by [`to_json`].
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedNode`] for anything that is not a valid
/// envelope, and [`ErrorKind::DepthExceeded`] for envelopes nested deeper
/// than the default depth limit.
pub fn from_json(json: &Json) -> Result<Node> {
    from_json_with::<DefaultConfig>(json)
}

/// Like [`from_json`], with the limits of `C`.
///
/// # Errors
///
/// See [`from_json`].
pub fn from_json_with<C: Config>(json: &Json) -> Result<Node> {
    Parser::<C>::new().node(json, &mut Path::root())
}

/// Parses JSON text produced by [`to_string`].
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedNode`] if the text is not JSON or not a
/// valid envelope.
pub fn from_str(text: &str) -> Result<Node> {
    from_str_with::<DefaultConfig>(text)
}

/// Like [`from_str`], with the limits of `C`.
///
/// # Errors
///
/// See [`from_str`].
pub fn from_str_with<C: Config>(text: &str) -> Result<Node> {
    let json: Json = serde_json::from_str(text).map_err(|error| {
        Error::new(
            ErrorKind::MalformedNode,
            &Path::root(),
            format!("invalid JSON: {error}"),
        )
        .with_snapshot(diagnostic::snapshot(
            format_args!("{text}"),
            C::snapshot_limit(),
        ))
        .with_source(Box::new(error))
    })?;
    from_json_with::<C>(&json)
}

struct Parser<C> {
    _config: std::marker::PhantomData<C>,
}

impl<C: Config> Parser<C> {
    const fn new() -> Self { Self { _config: std::marker::PhantomData } }

    fn node(&self, json: &Json, path: &mut Path) -> Result<Node> {
        if path.depth() > C::max_depth() {
            return Err(Error::new(
                ErrorKind::DepthExceeded,
                path,
                format!("envelope nests deeper than {}", C::max_depth()),
            )
            .with_snapshot(self.snapshot(json)));
        }

        match json {
            Json::Null => Ok(Node::primitive(Primitive::Null)),
            Json::Bool(b) => Ok(Node::primitive(Primitive::Bool(*b))),
            Json::Number(number) => self.number(number, json, path),
            Json::String(s) => {
                Ok(Node::primitive(Primitive::Str(Arc::from(s.as_str()))))
            }
            Json::Array(items) => Ok(Node::collection(
                CollectionKind::List,
                None,
                Elements::Items(self.items(items, path)?),
            )),
            Json::Object(fields) => self.object(fields, json, path),
        }
    }

    fn number(
        &self,
        number: &Number,
        json: &Json,
        path: &Path,
    ) -> Result<Node> {
        if let Some(i) = number.as_i64() {
            return Ok(Node::primitive(Primitive::Int(i)));
        }
        if number.is_f64()
            && let Some(f) = number.as_f64()
        {
            return Ok(Node::primitive(Primitive::Float(f)));
        }
        Err(self.malformed(
            path,
            "integer does not fit in 64 signed bits",
            json,
        ))
    }

    fn items(&self, items: &[Json], path: &mut Path) -> Result<Vec<Node>> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                path.scoped(Breadcrumb::Index(index), |path| {
                    self.node(item, path)
                })
            })
            .collect()
    }

    fn object(
        &self,
        fields: &Map<String, Json>,
        json: &Json,
        path: &mut Path,
    ) -> Result<Node> {
        if fields.contains_key("ref") {
            self.allow(fields, &["ref"], json, path)?;
            let id = self.id(&fields["ref"], json, path)?;
            return Ok(Node::reference(id));
        }

        if fields.contains_key("na") {
            self.allow(fields, &["na"], json, path)?;
            if !fields["na"].is_null() {
                return Err(self.malformed(path, "`na` must be null", json));
            }
            return Ok(Node::primitive(Primitive::NotApplicable));
        }

        if let Some(name) = fields.get("float") {
            self.allow(fields, &["float"], json, path)?;
            let value = match name.as_str() {
                Some("NaN") => f64::NAN,
                Some("inf") => f64::INFINITY,
                Some("-inf") => f64::NEG_INFINITY,
                _ => {
                    return Err(self.malformed(
                        path,
                        "`float` must be \"NaN\", \"inf\" or \"-inf\"",
                        json,
                    ));
                }
            };
            return Ok(Node::primitive(Primitive::Float(value)));
        }

        if let Some(bytes) = fields.get("bytes") {
            self.allow(fields, &["bytes"], json, path)?;
            let bytes = bytes
                .as_array()
                .and_then(|bytes| {
                    bytes
                        .iter()
                        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                        .collect::<Option<Vec<u8>>>()
                })
                .ok_or_else(|| {
                    self.malformed(
                        path,
                        "`bytes` must be an array of bytes",
                        json,
                    )
                })?;
            return Ok(Node::primitive(Primitive::Bytes(bytes.into())));
        }

        if fields.contains_key("kind") {
            return self.collection(fields, json, path);
        }

        if fields.contains_key("handler") {
            return self.tagged(fields, json, path);
        }

        Err(self.malformed(path, "object is not a known node form", json))
    }

    fn collection(
        &self,
        fields: &Map<String, Json>,
        json: &Json,
        path: &mut Path,
    ) -> Result<Node> {
        self.allow(fields, &["kind", "id", "items"], json, path)?;

        let kind = fields["kind"]
            .as_str()
            .and_then(CollectionKind::from_name)
            .ok_or_else(|| {
                self.malformed(path, "unknown collection kind", json)
            })?;
        let id = self.optional_id(fields, json, path)?;
        let Some(items) = fields.get("items").and_then(Json::as_array) else {
            return Err(self.malformed(path, "`items` must be an array", json));
        };

        let elements = if kind == CollectionKind::Map {
            let mut entries = Vec::with_capacity(items.len());
            for (index, entry) in items.iter().enumerate() {
                let Some([key, value]) = entry.as_array().and_then(|pair| {
                    <&[Json; 2]>::try_from(pair.as_slice()).ok()
                }) else {
                    return Err(self.malformed(
                        path,
                        "map items must be [key, value] pairs",
                        json,
                    ));
                };
                let key = path.scoped(Breadcrumb::KeyOf(index), |path| {
                    self.node(key, path)
                })?;
                let value = path.scoped(Breadcrumb::Index(index), |path| {
                    self.node(value, path)
                })?;
                entries.push((key, value));
            }
            Elements::Entries(entries)
        } else {
            Elements::Items(self.items(items, path)?)
        };

        Ok(Node::collection(kind, id, elements))
    }

    fn tagged(
        &self,
        fields: &Map<String, Json>,
        json: &Json,
        path: &mut Path,
    ) -> Result<Node> {
        self.allow(fields, &["type", "handler", "id", "state"], json, path)?;

        let text = |name: &str| {
            fields.get(name).and_then(Json::as_str).map(Arc::<str>::from)
        };
        let Some(type_name) = text("type") else {
            return Err(self.malformed(path, "`type` must be a string", json));
        };
        let Some(handler) = text("handler") else {
            return Err(
                self.malformed(path, "`handler` must be a string", json)
            );
        };
        let id = self.optional_id(fields, json, path)?;
        let Some(state) = fields.get("state") else {
            return Err(
                self.malformed(path, "tagged node has no `state`", json)
            );
        };

        let crumb = Breadcrumb::State(Arc::clone(&type_name));
        let state = path.scoped(crumb, |path| self.node(state, path))?;

        Ok(Node::tagged(type_name, handler, id, state))
    }

    fn allow(
        &self,
        fields: &Map<String, Json>,
        allowed: &[&str],
        json: &Json,
        path: &Path,
    ) -> Result<()> {
        match fields.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(self.malformed(
                path,
                &format!("unexpected field `{key}`"),
                json,
            )),
            None => Ok(()),
        }
    }

    fn id(&self, id: &Json, json: &Json, path: &Path) -> Result<Id> {
        id.as_u64().map(Id::new).ok_or_else(|| {
            self.malformed(path, "ids must be unsigned integers", json)
        })
    }

    fn optional_id(
        &self,
        fields: &Map<String, Json>,
        json: &Json,
        path: &Path,
    ) -> Result<Option<Id>> {
        fields.get("id").map(|id| self.id(id, json, path)).transpose()
    }

    fn malformed(&self, path: &Path, message: &str, json: &Json) -> Error {
        Error::new(ErrorKind::MalformedNode, path, message)
            .with_snapshot(self.snapshot(json))
    }

    fn snapshot(&self, json: &Json) -> String {
        diagnostic::snapshot(format_args!("{json}"), C::snapshot_limit())
    }
}
