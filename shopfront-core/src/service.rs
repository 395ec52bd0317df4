//! The get/update/delete access protocol over the profile store.
//!
//! Single entry point for the tool layer: validates caller input before any
//! I/O, then runs every mutation as one load-transform-save sequence inside
//! the store's scoped lock. Absence of a record or a field is a routine
//! outcome here, never an error.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::record::{self, FieldPath};
use crate::store::ProfileStore;

/// Operation set accepted at the protocol boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileOperation {
    Get,
    Update,
    Delete,
}

impl FromStr for ProfileOperation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(CoreError::ValidationError(format!(
                "unknown operation: {other}"
            ))),
        }
    }
}

/// One protocol request, as received from the tool layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileRequest {
    pub operation: String,
    pub field: Option<String>,
    pub value: Option<Value>,
    pub shipping_address: Option<Map<String, Value>>,
    pub billing_address: Option<Map<String, Value>>,
    pub custom_fields: Option<Map<String, Value>>,
}

impl ProfileRequest {
    fn has_structured_args(&self) -> bool {
        self.shipping_address.is_some()
            || self.billing_address.is_some()
            || self.custom_fields.is_some()
    }
}

/// Typed result of a protocol operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProfileOutcome {
    /// The whole record (`get` without a field).
    Record { record: Value },
    /// A single field lookup; `set` is `false` when the field is absent.
    Field {
        field: String,
        set: bool,
        value: Value,
    },
    /// Record state after a successful update.
    Updated { record: Value },
    /// Result of a delete; `removed` is `false` for an absent field.
    Deleted {
        field: Option<String>,
        removed: bool,
    },
}

/// Profile access protocol over one [`ProfileStore`].
pub struct ProfileService {
    store: ProfileStore,
}

impl ProfileService {
    pub fn new(store: ProfileStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Single protocol entry point: validates the request, then dispatches.
    pub async fn handle(&self, request: ProfileRequest) -> CoreResult<ProfileOutcome> {
        let operation = request.operation.parse::<ProfileOperation>()?;
        match operation {
            ProfileOperation::Get => {
                if request.value.is_some() || request.has_structured_args() {
                    return Err(CoreError::ValidationError(
                        "get accepts only an optional field".to_string(),
                    ));
                }
                self.get(request.field.as_deref()).await
            }
            ProfileOperation::Update => self.update(request).await,
            ProfileOperation::Delete => {
                if request.value.is_some() || request.has_structured_args() {
                    return Err(CoreError::ValidationError(
                        "delete accepts only an optional field".to_string(),
                    ));
                }
                self.delete(request.field.as_deref()).await
            }
        }
    }

    /// Read the whole record or a single resolved field. Needs no exclusive
    /// lock: the atomic-rename write discipline guarantees a fully-written
    /// document.
    pub async fn get(&self, field: Option<&str>) -> CoreResult<ProfileOutcome> {
        let record = self.store.load().await?;
        match field {
            None => Ok(ProfileOutcome::Record { record }),
            Some(raw) => {
                let path = FieldPath::parse(raw)?;
                let value = resolve(&record, &path).cloned();
                Ok(ProfileOutcome::Field {
                    field: raw.to_string(),
                    set: value.is_some(),
                    value: value.unwrap_or(Value::Null),
                })
            }
        }
    }

    async fn update(&self, request: ProfileRequest) -> CoreResult<ProfileOutcome> {
        let ProfileRequest {
            field,
            value,
            shipping_address,
            billing_address,
            custom_fields,
            ..
        } = request;

        // Validate the argument shape before touching storage.
        let field_write = match (field, value) {
            (Some(field), Some(value)) => {
                let path = FieldPath::parse(&field)?;
                Some((write_path(&path), value))
            }
            (Some(field), None) => {
                return Err(CoreError::ValidationError(format!(
                    "update of field '{field}' requires a value"
                )));
            }
            (None, Some(_)) => {
                return Err(CoreError::ValidationError(
                    "value provided without a field".to_string(),
                ));
            }
            (None, None) => None,
        };
        if field_write.is_none()
            && shipping_address.is_none()
            && billing_address.is_none()
            && custom_fields.is_none()
        {
            return Err(CoreError::ValidationError(
                "no updates provided".to_string(),
            ));
        }

        self.store
            .with_lock(move || async move {
                let mut record = self.store.load().await?;
                if let Some((path, value)) = field_write {
                    record::write(&mut record, &path, value);
                }
                if let Some(incoming) = shipping_address {
                    merge_address(&mut record, "shipping_address", incoming);
                }
                if let Some(incoming) = billing_address {
                    merge_address(&mut record, "billing_address", incoming);
                }
                if let Some(incoming) = custom_fields {
                    merge_into(&mut record, "custom_fields", incoming);
                }
                self.store.save(&record).await?;
                log::debug!("profile record updated");
                Ok(ProfileOutcome::Updated { record })
            })
            .await
    }

    async fn delete(&self, field: Option<&str>) -> CoreResult<ProfileOutcome> {
        match field {
            None => {
                self.store
                    .with_lock(|| async {
                        self.store.reset().await?;
                        log::debug!("profile record reset");
                        Ok(ProfileOutcome::Deleted {
                            field: None,
                            removed: true,
                        })
                    })
                    .await
            }
            Some(raw) => {
                let path = FieldPath::parse(raw)?;
                self.store
                    .with_lock(move || async move {
                        let mut record = self.store.load().await?;
                        let removed = remove_resolved(&mut record, &path);
                        if removed {
                            self.store.save(&record).await?;
                        }
                        Ok(ProfileOutcome::Deleted {
                            field: Some(raw.to_string()),
                            removed,
                        })
                    })
                    .await
            }
        }
    }
}

/// Where a write for `path` lands: rooted paths stay at the record root,
/// everything else is scoped under `custom_fields`.
fn write_path(path: &FieldPath) -> FieldPath {
    if path.is_rooted() {
        path.clone()
    } else {
        path.scoped_to_custom_fields()
    }
}

/// Read resolution: try the record root first (known keys and unknown
/// round-tripped top-level keys), then the `custom_fields` scope.
fn resolve<'a>(record: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    record::read(record, path).or_else(|| {
        if path.is_rooted() {
            None
        } else {
            record::read(record, &path.scoped_to_custom_fields())
        }
    })
}

fn remove_resolved(record: &mut Value, path: &FieldPath) -> bool {
    if record::remove(record, path) {
        return true;
    }
    if path.is_rooted() {
        false
    } else {
        record::remove(record, &path.scoped_to_custom_fields())
    }
}

/// Merge an incoming object into a top-level sub-tree of the record.
fn merge_into(record: &mut Value, key: &str, incoming: Map<String, Value>) {
    if !record.is_object() {
        *record = Value::Object(Map::new());
    }
    if let Some(map) = record.as_object_mut() {
        let slot = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        record::merge(slot, incoming);
    }
}

/// Address merge with the legacy `street` carry: an existing `street` key
/// becomes `address1` when the incoming object does not set one itself.
fn merge_address(record: &mut Value, key: &str, mut incoming: Map<String, Value>) {
    if !incoming.contains_key("address1") {
        let street = record
            .get(key)
            .and_then(|address| address.get("street"))
            .cloned();
        if let Some(street) = street {
            incoming.insert("address1".to_string(), street);
        }
    }
    merge_into(record, key, incoming);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn service(tmp: &tempfile::TempDir) -> ProfileService {
        ProfileService::new(ProfileStore::new(tmp.path().join("customer.json")))
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    async fn update_field(service: &ProfileService, field: &str, value: Value) {
        service
            .handle(ProfileRequest {
                operation: "update".to_string(),
                field: Some(field.to_string()),
                value: Some(value),
                ..ProfileRequest::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_on_fresh_deployment_is_empty_record() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = service(&tmp).get(None).await.unwrap();
        assert_eq!(outcome, ProfileOutcome::Record { record: json!({}) });
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected_before_io() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        let err = svc
            .handle(ProfileRequest {
                operation: "upsert".to_string(),
                ..ProfileRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        // No document may appear as a side effect of the rejected call.
        assert!(!svc.store().path().exists());
    }

    #[tokio::test]
    async fn operation_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = service(&tmp)
            .handle(ProfileRequest {
                operation: "GET".to_string(),
                ..ProfileRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome, ProfileOutcome::Record { record: json!({}) });
    }

    #[tokio::test]
    async fn update_then_get_scalar_field() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        update_field(&svc, "name", json!("Jane Doe")).await;

        let outcome = svc.get(Some("name")).await.unwrap();
        assert_eq!(
            outcome,
            ProfileOutcome::Field {
                field: "name".to_string(),
                set: true,
                value: json!("Jane Doe"),
            }
        );
    }

    #[tokio::test]
    async fn get_of_absent_field_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = service(&tmp).get(Some("email")).await.unwrap();
        assert_eq!(
            outcome,
            ProfileOutcome::Field {
                field: "email".to_string(),
                set: false,
                value: Value::Null,
            }
        );
    }

    #[tokio::test]
    async fn update_requires_something_to_update() {
        let tmp = tempfile::tempdir().unwrap();
        let err = service(&tmp)
            .handle(ProfileRequest {
                operation: "update".to_string(),
                ..ProfileRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn value_without_field_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = service(&tmp)
            .handle(ProfileRequest {
                operation: "update".to_string(),
                value: Some(json!("x")),
                ..ProfileRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn unrooted_fields_scope_into_custom_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        update_field(&svc, "preferences.theme", json!("dark")).await;

        let record = svc.store().load().await.unwrap();
        assert_eq!(
            record,
            json!({"custom_fields": {"preferences": {"theme": "dark"}}})
        );

        // Readable both bare and fully qualified.
        let bare = svc.get(Some("preferences.theme")).await.unwrap();
        let qualified = svc
            .get(Some("custom_fields.preferences.theme"))
            .await
            .unwrap();
        for outcome in [bare, qualified] {
            match outcome {
                ProfileOutcome::Field { set, value, .. } => {
                    assert!(set);
                    assert_eq!(value, json!("dark"));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn custom_fields_merge_preserves_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            custom_fields: Some(object(json!({"a": 1}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();
        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            custom_fields: Some(object(json!({"b": 2}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();

        let record = svc.store().load().await.unwrap();
        assert_eq!(record, json!({"custom_fields": {"a": 1, "b": 2}}));
    }

    #[tokio::test]
    async fn nested_custom_fields_merge_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            custom_fields: Some(object(json!({"preferences": {"theme": "dark", "lang": "en"}}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();
        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            custom_fields: Some(object(json!({"preferences": {"theme": "light"}}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();

        let record = svc.store().load().await.unwrap();
        assert_eq!(
            record["custom_fields"]["preferences"],
            json!({"theme": "light", "lang": "en"})
        );
    }

    #[tokio::test]
    async fn address_merge_keeps_unmentioned_sub_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            shipping_address: Some(object(json!({"address1": "1 Main St", "city": "Springfield"}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();
        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            shipping_address: Some(object(json!({"city": "Shelbyville"}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();

        let record = svc.store().load().await.unwrap();
        assert_eq!(
            record["shipping_address"],
            json!({"address1": "1 Main St", "city": "Shelbyville"})
        );
    }

    #[tokio::test]
    async fn legacy_street_is_carried_into_address1() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        svc.store()
            .save(&json!({"billing_address": {"street": "9 Old Rd"}}))
            .await
            .unwrap();

        svc.handle(ProfileRequest {
            operation: "update".to_string(),
            billing_address: Some(object(json!({"city": "Springfield"}))),
            ..ProfileRequest::default()
        })
        .await
        .unwrap();

        let record = svc.store().load().await.unwrap();
        assert_eq!(record["billing_address"]["address1"], json!("9 Old Rd"));
        assert_eq!(record["billing_address"]["city"], json!("Springfield"));
    }

    #[tokio::test]
    async fn delete_of_absent_field_succeeds_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        update_field(&svc, "name", json!("Jane Doe")).await;
        let before = svc.store().load().await.unwrap();

        let outcome = svc.delete(Some("phone")).await.unwrap();
        assert_eq!(
            outcome,
            ProfileOutcome::Deleted {
                field: Some("phone".to_string()),
                removed: false,
            }
        );
        assert_eq!(svc.store().load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn delete_twice_matches_delete_once() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        update_field(&svc, "phone", json!("555-0100")).await;

        svc.delete(Some("phone")).await.unwrap();
        let after_first = svc.store().load().await.unwrap();
        svc.delete(Some("phone")).await.unwrap();
        assert_eq!(svc.store().load().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn delete_without_field_resets_the_record() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        update_field(&svc, "name", json!("Jane Doe")).await;

        svc.delete(None).await.unwrap();
        assert_eq!(svc.get(None).await.unwrap(), ProfileOutcome::Record {
            record: json!({}),
        });
    }

    #[tokio::test]
    async fn unknown_top_level_keys_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(&tmp);
        svc.store()
            .save(&json!({"future_key": {"x": 1}}))
            .await
            .unwrap();

        update_field(&svc, "name", json!("Jane Doe")).await;

        let record = svc.store().load().await.unwrap();
        assert_eq!(record["future_key"], json!({"x": 1}));
    }

    #[tokio::test]
    async fn concurrent_updates_lose_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = Arc::new(service(&tmp));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let svc = Arc::clone(&svc);
            tasks.push(tokio::spawn(async move {
                svc.handle(ProfileRequest {
                    operation: "update".to_string(),
                    field: Some(format!("slot{i}")),
                    value: Some(json!(i)),
                    ..ProfileRequest::default()
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = svc.store().load().await.unwrap();
        for i in 0..8 {
            assert_eq!(
                record["custom_fields"][format!("slot{i}")],
                json!(i),
                "update {i} was lost"
            );
        }
    }
}
