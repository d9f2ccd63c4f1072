//! Conversion between service payloads and backup records.
//!
//! The service wraps every optional field as `{"set": bool, "value": ..}` and
//! ships raw byte payloads as arrays of integers. Backups are meant to be
//! read and diffed by people, so both are removed on the way to disk. The
//! envelopes are rebuilt by construction when a record is submitted again.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value};

use entigraph_shared::{
    record::{DefinitionRecord, EntityMetadata, EntityRecord, RelationRecord},
    reference::{self, EntityReference},
    wire::{
        CreateDefinitionRequest, CreateEntityMetadata, CreateEntityRequest,
        CreateRelationRequest, EntityRoute, Optional,
    },
};

enum Envelope<'a> {
    Set(&'a Value),
    Unset,
    Plain,
}

fn envelope(map: &Map<String, Value>) -> Envelope<'_> {
    match map.get("set") {
        Some(Value::Bool(true)) => match map.get("value") {
            Some(v) => Envelope::Set(v),
            None => Envelope::Plain,
        },
        Some(Value::Bool(false)) if map.keys().all(|k| k == "set" || k == "value") => {
            Envelope::Unset
        }
        _ => Envelope::Plain,
    }
}

/// Strips optional envelopes and turns integer byte arrays back into strings.
///
/// Only `set: true` envelopes are unwrapped. A `set: false` map is data like
/// any other and keeps its members. Applying the function twice gives the
/// same result as once.
pub fn clean_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => clean_object(map),
        Value::Array(items) => match bytes_to_string(items) {
            Some(s) => Value::String(s),
            None => Value::Array(items.iter().map(clean_value).collect()),
        },
        other => other.clone(),
    }
}

fn clean_object(map: &Map<String, Value>) -> Value {
    if let Envelope::Set(inner) = envelope(map) {
        return clean_value(inner);
    }

    let out: Map<String, Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), clean_value(v)))
        .collect();

    // cleaning the members can itself produce an envelope shape
    match envelope(&out) {
        Envelope::Set(_) => clean_object(&out),
        _ => Value::Object(out),
    }
}

fn bytes_to_string(items: &[Value]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let bytes = items
        .iter()
        .map(|item| {
            let f = item.as_f64()?;
            if f.fract() == 0.0 && (0.0..=255.0).contains(&f) {
                Some(f as u8)
            } else {
                None
            }
        })
        .collect::<Option<Vec<u8>>>()?;

    Some(match String::from_utf8(bytes) {
        Ok(s) => s,
        // not UTF-8: keep one char per byte so the length is preserved
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    })
}

/// Object behind an optional top-level envelope.
fn unwrap_object<'a>(raw: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    let mut current = raw;
    loop {
        match current {
            Value::Object(map) => match envelope(map) {
                Envelope::Set(inner) => current = inner,
                Envelope::Unset => bail!("{what} payload is empty"),
                Envelope::Plain => return Ok(map),
            },
            other => bail!("{what} payload is not an object: {other}"),
        }
    }
}

/// Member lookup that sees through envelopes and treats `null` as absent.
fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut current = map.get(key)?;
    loop {
        match current {
            Value::Null => return None,
            Value::Object(inner) => match envelope(inner) {
                Envelope::Set(v) => current = v,
                Envelope::Unset => return None,
                Envelope::Plain => return Some(current),
            },
            _ => return Some(current),
        }
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match clean_value(field(map, key)?) {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> Option<bool> {
    field(map, key).and_then(Value::as_bool)
}

fn required_str(map: &Map<String, Value>, key: &str, what: &str) -> Result<String> {
    str_field(map, key).ok_or_else(|| anyhow!("{what} is missing `{key}`"))
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value.map(clean_value) else {
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            Value::Null => None,
            Value::Object(ref m) if matches!(envelope(m), Envelope::Unset) => None,
            other => Some((k, other.to_string())),
        })
        .collect()
}

fn cleaned(map: &Map<String, Value>, key: &str) -> Option<Value> {
    field(map, key).map(clean_value).filter(|v| !v.is_null())
}

pub fn filter_entity(raw: &Value) -> Result<EntityRecord> {
    let obj = unwrap_object(raw, "entity")?;
    let api_version = required_str(obj, "apiVersion", "entity")?;
    let kind = required_str(obj, "kind", "entity")?;
    let meta = field(obj, "metadata")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("entity {kind} is missing `metadata`"))?;

    let name = required_str(meta, "name", "entity metadata")?;
    let namespace = required_str(meta, "namespace", "entity metadata")
        .with_context(|| format!("entity {kind} {name}"))?;

    Ok(EntityRecord {
        api_version,
        kind,
        metadata: EntityMetadata {
            name,
            namespace,
            labels: string_map(field(meta, "labels")),
            annotations: string_map(field(meta, "annotations")),
        },
        spec: cleaned(obj, "spec"),
        status: cleaned(obj, "status"),
    })
}

pub fn filter_definition(raw: &Value) -> Result<DefinitionRecord> {
    let obj = unwrap_object(raw, "definition")?;
    let group = required_str(obj, "group", "definition")?;
    let kind = required_str(obj, "kind", "definition")?;

    Ok(DefinitionRecord {
        list_kind: str_field(obj, "listKind").unwrap_or_else(|| format!("{kind}List")),
        plural: str_field(obj, "plural"),
        singular: str_field(obj, "singular").unwrap_or_else(|| kind.to_lowercase()),
        name: str_field(obj, "name"),
        description: str_field(obj, "description"),
        spec: cleaned(obj, "spec").unwrap_or_else(|| Value::Object(Map::new())),
        storage: bool_field(obj, "storage"),
        served: bool_field(obj, "served"),
        group,
        kind,
    })
}

/// Relation endpoints arrive either as reference objects or as id strings;
/// both are stored as the canonical unprefixed id.
fn reference_string(map: &Map<String, Value>, key: &str) -> Result<String> {
    let value = field(map, key).ok_or_else(|| anyhow!("relation is missing `{key}`"))?;
    match clean_value(value) {
        Value::String(s) => Ok(reference::parse(&s)?.to_string()),
        obj @ Value::Object(_) => {
            let r: EntityReference = serde_json::from_value(obj)
                .with_context(|| format!("relation `{key}` is not an entity reference"))?;
            Ok(r.to_id().to_string())
        }
        other => bail!("relation `{key}` has unexpected shape: {other}"),
    }
}

pub fn filter_relation(raw: &Value) -> Result<RelationRecord> {
    let obj = unwrap_object(raw, "relation")?;
    Ok(RelationRecord {
        relation: required_str(obj, "relation", "relation")?,
        source: reference_string(obj, "source")?,
        target: reference_string(obj, "target")?,
        namespace: str_field(obj, "namespace"),
    })
}

fn optional_map(map: &BTreeMap<String, String>) -> Optional<BTreeMap<String, String>> {
    if map.is_empty() {
        Optional::unset()
    } else {
        Optional::some(map.clone())
    }
}

pub fn definition_create_request(record: &DefinitionRecord) -> CreateDefinitionRequest {
    CreateDefinitionRequest {
        group: record.group.clone(),
        kind: record.kind.clone(),
        list_kind: record.list_kind.clone(),
        plural: record.plural.clone().filter(|p| !p.is_empty()).into(),
        singular: record.singular.clone(),
        name: record.name.clone().into(),
        description: record.description.clone().into(),
        spec: record.spec.clone(),
        storage: record.storage.into(),
        served: record.served.into(),
    }
}

/// Builds the create call for an entity. `plural` is the routing kind,
/// resolved by the caller from the restored definitions.
pub fn entity_create_request(
    record: &EntityRecord,
    plural: &str,
) -> Result<(EntityRoute, CreateEntityRequest)> {
    let meta = &record.metadata;
    if meta.name.is_empty() {
        bail!("entity {} is missing metadata.name", record.kind);
    }
    if meta.namespace.is_empty() {
        bail!("entity {} {} is missing metadata.namespace", record.kind, meta.name);
    }
    let (group, version) = record.group_version();
    let route = EntityRoute {
        group: group.clone(),
        version: version.clone(),
        namespace: meta.namespace.clone(),
        plural: plural.to_string(),
    };
    let body = CreateEntityRequest {
        api_version: format!("{group}/{version}"),
        kind: record.kind.clone(),
        metadata: CreateEntityMetadata {
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            labels: optional_map(&meta.labels),
            annotations: optional_map(&meta.annotations),
        },
        spec: record.spec.clone().into(),
        status: record.status.clone().into(),
    };
    Ok((route, body))
}

/// The relation is always created in the source entity's namespace,
/// whatever namespace the record carries.
pub fn relation_create_request(record: &RelationRecord) -> Result<(String, CreateRelationRequest)> {
    let source = reference::parse(&record.source)
        .with_context(|| format!("relation {} source", record.relation))?;
    let target = reference::parse(&record.target)
        .with_context(|| format!("relation {} target", record.relation))?;
    let namespace = source.namespace.clone();
    let body = CreateRelationRequest {
        relation: record.relation.clone(),
        source: source.to_reference(),
        target: target.to_reference(),
        namespace: namespace.clone(),
    };
    Ok((namespace, body))
}
