mod common;

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};

use common::{Call, FakeApi, RecordingReporter};
use entigraph_client::entity::{
    backup::{BackupOptions, backup},
    layout::BackupFormat,
    restore::{RestoreError, RestoreOptions, restore},
};
use entigraph_shared::record::RelationRecord;

fn widget_definition() -> Value {
    json!({
        "id": "def-1",
        "createdAt": "2024-01-01T00:00:00Z",
        "group": "acme.io",
        "kind": "Widget",
        "description": {"set": true, "value": "A widget"}
    })
}

fn widget(name: &str, namespace: &str) -> Value {
    json!({
        "apiVersion": "acme.io/v1",
        "kind": "Widget",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": "0b7c",
            "labels": {"set": true, "value": {"tier": "web"}}
        },
        "spec": {"replicas": {"set": true, "value": 3}, "owner": {"set": false}}
    })
}

fn write_json(path: &Path, value: &Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn restore_opts(dir: &Path) -> RestoreOptions {
    RestoreOptions {
        input_dir: dir.to_path_buf(),
        dry_run: false,
        workers: 4,
    }
}

#[tokio::test]
async fn backup_writes_three_directory_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let api = FakeApi {
        definitions: vec![widget_definition()],
        entities: vec![widget("w1", "ns1")],
        relations: vec![json!({
            "relation": "owns",
            "source": "entity://acme.io/v1/widgets/ns1/w1",
            "target": {"apiVersion": "acme.io/v1", "kind": "widgets", "namespace": "ns1", "name": "w2"}
        })],
        ..Default::default()
    };
    let reporter = RecordingReporter::default();
    let opts = BackupOptions {
        output_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };

    let summary = backup(&api, &reporter, &opts).await.unwrap();
    assert_eq!(summary.definitions, 1);
    assert_eq!(summary.entities, 1);
    assert_eq!(summary.relations, 1);

    let definition_file = tmp.path().join("definitions/acme.io_widget.yaml");
    let entity_file = tmp.path().join("entities/acme.io_v1_ns1_widget_w1.yaml");
    let relations_file = tmp.path().join("relations/relations.yaml");
    assert!(definition_file.is_file());
    assert!(entity_file.is_file());
    assert!(relations_file.is_file());

    let entity: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&entity_file).unwrap()).unwrap();
    assert_eq!(entity["spec"]["replicas"].as_u64(), Some(3));
    assert_eq!(entity["spec"]["owner"]["set"].as_bool(), Some(false));
    assert!(entity["metadata"].get("uid").is_none());
    assert_eq!(entity["metadata"]["labels"]["tier"].as_str(), Some("web"));

    let definition: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&definition_file).unwrap()).unwrap();
    assert!(definition.get("id").is_none());
    assert_eq!(definition["description"].as_str(), Some("A widget"));

    let relations: Vec<RelationRecord> =
        serde_yaml::from_str(&std::fs::read_to_string(&relations_file).unwrap()).unwrap();
    assert_eq!(relations[0].source, "acme.io/v1/widgets/ns1/w1");
    assert_eq!(relations[0].target, "acme.io/v1/widgets/ns1/w2");
}

#[tokio::test]
async fn backup_pages_through_entities() {
    let tmp = tempfile::tempdir().unwrap();
    let api = FakeApi {
        entities: (0..501).map(|i| widget(&format!("w{i}"), "ns1")).collect(),
        ..Default::default()
    };
    let reporter = RecordingReporter::default();
    let opts = BackupOptions {
        output_dir: tmp.path().to_path_buf(),
        format: BackupFormat::Json,
        ..Default::default()
    };

    let summary = backup(&api, &reporter, &opts).await.unwrap();
    assert_eq!(summary.entities, 501);

    let offsets: Vec<u64> = api
        .queries()
        .iter()
        .filter(|q| !q.include_relations)
        .map(|q| q.offset)
        .collect();
    assert_eq!(offsets, vec![0, 500]);
    assert!(tmp.path().join("entities/acme.io_v1_ns1_widget_w500.json").is_file());
}

#[tokio::test]
async fn backup_survives_relation_fetch_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let api = FakeApi {
        entities: vec![widget("w1", "ns1")],
        fail_relation_list: true,
        ..Default::default()
    };
    let reporter = RecordingReporter::default();
    let opts = BackupOptions {
        output_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };

    let summary = backup(&api, &reporter, &opts).await.unwrap();
    assert_eq!(summary.entities, 1);
    assert_eq!(summary.relations, 0);
    assert!(reporter.warnings().iter().any(|w| w.contains("gateway timeout")));

    let relations: Vec<RelationRecord> = serde_yaml::from_str(
        &std::fs::read_to_string(tmp.path().join("relations/relations.yaml")).unwrap(),
    )
    .unwrap();
    assert!(relations.is_empty());
}

#[tokio::test]
async fn backup_fails_when_definitions_cannot_be_listed() {
    let tmp = tempfile::tempdir().unwrap();
    let api = FakeApi {
        fail_definition_list: true,
        ..Default::default()
    };
    let reporter = RecordingReporter::default();
    let opts = BackupOptions {
        output_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };

    let err = backup(&api, &reporter, &opts).await.unwrap_err();
    assert!(format!("{err:#}").contains("connection refused"));
}

#[tokio::test]
async fn backup_fails_when_entities_cannot_be_listed() {
    let tmp = tempfile::tempdir().unwrap();
    let api = FakeApi {
        definitions: vec![widget_definition()],
        fail_entity_list: true,
        ..Default::default()
    };
    let reporter = RecordingReporter::default();
    let opts = BackupOptions {
        output_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };

    let err = backup(&api, &reporter, &opts).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to list entities");
    assert!(format!("{err:#}").contains("503 service unavailable"));
    assert!(
        api.queries().iter().all(|q| !q.include_relations),
        "relations are not fetched after a fatal entity fetch"
    );
}

#[tokio::test]
async fn backup_then_restore_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let source = FakeApi {
        definitions: vec![widget_definition()],
        entities: vec![widget("w1", "ns1"), widget("w2", "ns1")],
        relations: vec![json!({
            "relation": "owns",
            "source": "acme.io/v1/widgets/ns1/w1",
            "target": "acme.io/v1/widgets/ns1/w2"
        })],
        ..Default::default()
    };
    let opts = BackupOptions {
        output_dir: tmp.path().to_path_buf(),
        ..Default::default()
    };
    backup(&source, &RecordingReporter::default(), &opts)
        .await
        .unwrap();

    let target = Arc::new(FakeApi::default());
    let reporter = Arc::new(RecordingReporter::default());
    let summary = restore(target.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap();
    assert_eq!(summary.definitions.succeeded, 1);
    assert_eq!(summary.entities.succeeded, 2);
    assert_eq!(summary.relations.succeeded, 1);
    assert!(!summary.has_failures());

    let mut restored: Vec<_> = target
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Entity(route, body) => Some((route, body)),
            _ => None,
        })
        .collect();
    restored.sort_by(|a, b| a.1.metadata.name.cmp(&b.1.metadata.name));
    let (route, body) = &restored[0];
    assert_eq!(route.group, "acme.io");
    assert_eq!(route.version, "v1");
    assert_eq!(route.namespace, "ns1");
    assert_eq!(route.plural, "widgets");
    assert_eq!(body.api_version, "acme.io/v1");
    assert_eq!(body.kind, "Widget");
    assert_eq!(body.metadata.name, "w1");
    assert_eq!(
        body.spec.clone().into_option(),
        Some(json!({"replicas": 3, "owner": {"set": false}}))
    );
    assert_eq!(
        body.metadata.labels.clone().into_option().unwrap().get("tier").map(String::as_str),
        Some("web")
    );
}

#[tokio::test]
async fn restore_runs_phases_in_order_with_plurals_from_definitions() {
    let tmp = tempfile::tempdir().unwrap();
    write_json(
        &tmp.path().join("definitions/acme.io_widget.json"),
        &json!({"group": "acme.io", "kind": "Widget"}),
    );
    write_json(
        &tmp.path().join("definitions/acme.io_mouse.json"),
        &json!({"group": "acme.io", "kind": "Mouse", "plural": "mice"}),
    );
    write_json(
        &tmp.path().join("entities/acme.io_v1_ns1_widget_w1.json"),
        &json!({"apiVersion": "acme.io/v1", "kind": "Widget", "metadata": {"name": "w1", "namespace": "ns1"}}),
    );
    write_json(
        &tmp.path().join("entities/acme.io_v1_ns1_mouse_m1.json"),
        &json!({"apiVersion": "acme.io/v1", "kind": "Mouse", "metadata": {"name": "m1", "namespace": "ns1"}}),
    );
    write_json(
        &tmp.path().join("relations/relations.json"),
        &json!([{"relation": "chases", "source": "acme.io/v1/mice/ns1/m1", "target": "acme.io/v1/widgets/ns1/w1"}]),
    );

    let api = Arc::new(FakeApi::default());
    let reporter = Arc::new(RecordingReporter::default());
    restore(api.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap();

    let calls = api.calls();
    let phase: Vec<u8> = calls
        .iter()
        .map(|c| match c {
            Call::Definition(_) => 0,
            Call::Entity(..) => 1,
            Call::Relation(..) => 2,
        })
        .collect();
    assert_eq!(phase, vec![0, 0, 1, 1, 2]);

    let mut plurals: Vec<(String, String)> = calls
        .iter()
        .filter_map(|c| match c {
            Call::Entity(route, body) => Some((body.kind.clone(), route.plural.clone())),
            _ => None,
        })
        .collect();
    plurals.sort();
    assert_eq!(
        plurals,
        vec![
            ("Mouse".to_string(), "mice".to_string()),
            ("Widget".to_string(), "widgets".to_string())
        ]
    );
}

#[tokio::test]
async fn restore_counts_partial_failures_and_still_runs_relations() {
    let tmp = tempfile::tempdir().unwrap();
    for (file, metadata) in [
        ("a.json", json!({"name": "a", "namespace": "ns1"})),
        ("b.json", json!({"name": "b", "namespace": "ns1"})),
        ("c.json", json!({"namespace": "ns1"})),
    ] {
        write_json(
            &tmp.path().join("entities").join(file),
            &json!({"apiVersion": "acme.io/v1", "kind": "Widget", "metadata": metadata}),
        );
    }
    write_json(
        &tmp.path().join("relations/relations.json"),
        &json!([{"relation": "owns", "source": "acme.io/v1/widgets/ns1/a", "target": "acme.io/v1/widgets/ns1/b"}]),
    );

    let api = Arc::new(FakeApi::default());
    let reporter = Arc::new(RecordingReporter::default());
    let err = restore(api.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<RestoreError>(),
        Some(&RestoreError::Failures {
            definitions: 0,
            entities: 1,
            relations: 0
        })
    );
    let calls = api.calls();
    assert_eq!(calls.iter().filter(|c| matches!(c, Call::Entity(..))).count(), 2);
    assert_eq!(calls.iter().filter(|c| matches!(c, Call::Relation(..))).count(), 1);

    let errors = reporter.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("missing metadata.name"));
    assert!(
        reporter
            .infos_starting_with("entities:")
            .contains(&"entities: 2 restored, 1 failed".to_string())
    );
}

#[tokio::test]
async fn restore_treats_conflicts_as_failures() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["a", "b"] {
        write_json(
            &tmp.path().join(format!("entities/{name}.json")),
            &json!({"apiVersion": "acme.io/v1", "kind": "Widget", "metadata": {"name": name, "namespace": "ns1"}}),
        );
    }

    let api = Arc::new(FakeApi {
        conflicting: vec!["a".to_string()],
        ..Default::default()
    });
    let reporter = Arc::new(RecordingReporter::default());
    let err = restore(api.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "restore finished with failures: 0 definitions, 1 entities, 0 relations failed"
    );
    assert!(reporter.errors()[0].contains("already exists: a exists"));
}

#[tokio::test]
async fn restore_counts_a_panicking_create_as_failed() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["a", "b", "c"] {
        write_json(
            &tmp.path().join(format!("entities/{name}.json")),
            &json!({"apiVersion": "acme.io/v1", "kind": "Widget", "metadata": {"name": name, "namespace": "ns1"}}),
        );
    }

    let api = Arc::new(FakeApi {
        panicking: vec!["b".to_string()],
        ..Default::default()
    });
    let reporter = Arc::new(RecordingReporter::default());
    let err = restore(api.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<RestoreError>(),
        Some(&RestoreError::Failures {
            definitions: 0,
            entities: 1,
            relations: 0
        })
    );
    assert_eq!(api.calls().len(), 2);
    assert!(reporter.errors().iter().any(|e| e.contains("task aborted")));
    assert!(
        reporter
            .infos_starting_with("entities:")
            .contains(&"entities: 2 restored, 1 failed".to_string())
    );
}

#[tokio::test]
async fn restore_uses_source_namespace_for_relations() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("entities")).unwrap();
    write_json(
        &tmp.path().join("relations/relations.json"),
        &json!([{
            "relation": "owns",
            "source": "acme.io/v1/widgets/ns1/a",
            "target": "acme.io/v1/widgets/ns2/b",
            "namespace": "other"
        }]),
    );

    let api = Arc::new(FakeApi::default());
    let reporter = Arc::new(RecordingReporter::default());
    restore(api.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap();

    match api.calls().as_slice() {
        [Call::Relation(namespace, body)] => {
            assert_eq!(namespace, "ns1");
            assert_eq!(body.namespace, "ns1");
            assert_eq!(body.source.api_version, "acme.io/v1");
            assert_eq!(body.source.kind, "widgets");
            assert_eq!(body.target.namespace, "ns2");
        }
        other => panic!("expected one relation call, got {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_makes_no_calls() {
    let tmp = tempfile::tempdir().unwrap();
    for kind in ["Widget", "Gadget"] {
        write_json(
            &tmp.path().join(format!("definitions/acme.io_{}.json", kind.to_lowercase())),
            &json!({"group": "acme.io", "kind": kind}),
        );
    }
    for name in ["a", "b", "c"] {
        write_json(
            &tmp.path().join(format!("entities/{name}.yaml")),
            &json!({"apiVersion": "acme.io/v1", "kind": "Widget", "metadata": {"name": name, "namespace": "ns1"}}),
        );
    }
    write_json(
        &tmp.path().join("relations/relations.json"),
        &json!([{"relation": "owns", "source": "acme.io/v1/widgets/ns1/a", "target": "acme.io/v1/widgets/ns1/b"}]),
    );

    let api = Arc::new(FakeApi::default());
    let reporter = Arc::new(RecordingReporter::default());
    let opts = RestoreOptions {
        dry_run: true,
        ..restore_opts(tmp.path())
    };
    let summary = restore(api.clone(), reporter.clone(), &opts).await.unwrap();

    assert!(api.calls().is_empty());
    assert_eq!(summary.entities.succeeded, 0);
    let planned = reporter.infos_starting_with("would restore");
    assert_eq!(planned.len(), 6);
    assert!(planned.contains(&"would restore entity Widget ns1/b".to_string()));
    assert!(planned.contains(
        &"would restore relation acme.io/v1/widgets/ns1/a -[owns]-> acme.io/v1/widgets/ns1/b"
            .to_string()
    ));
}

#[tokio::test]
async fn restore_reads_legacy_flat_layout() {
    let tmp = tempfile::tempdir().unwrap();
    write_json(
        &tmp.path().join("acme.io_v1_ns1_widget_w1.json"),
        &json!({"apiVersion": "acme.io/v1", "kind": "Widget", "metadata": {"name": "w1", "namespace": "ns1"}}),
    );
    write_json(
        &tmp.path().join("core_v1_ns1_config_c1.json"),
        &json!({"apiVersion": "v1", "kind": "Config", "metadata": {"name": "c1", "namespace": "ns1"}}),
    );

    let api = Arc::new(FakeApi::default());
    let reporter = Arc::new(RecordingReporter::default());
    let summary = restore(api.clone(), reporter.clone(), &restore_opts(tmp.path()))
        .await
        .unwrap();
    assert_eq!(summary.entities.succeeded, 2);

    let mut routes: Vec<_> = api
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Entity(route, body) => Some((route.group, route.plural, body.api_version)),
            _ => None,
        })
        .collect();
    routes.sort();
    assert_eq!(
        routes,
        vec![
            ("acme.io".to_string(), "widgets".to_string(), "acme.io/v1".to_string()),
            ("core".to_string(), "configs".to_string(), "core/v1".to_string()),
        ]
    );
}
