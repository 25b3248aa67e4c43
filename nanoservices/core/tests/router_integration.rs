use eltflow_core::config::types::RouterConfig;
use eltflow_core::router::store::FsObjectStore;
use eltflow_core::router::{route, RouteEvent, RouteOutcome};

fn land(root: &std::path::Path, bucket: &str, name: &str) {
    let path = root.join(bucket).join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, name.as_bytes()).unwrap();
}

#[tokio::test]
async fn routes_a_batch_of_landed_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig::default();
    let store = FsObjectStore::new(dir.path());
    let names = ["raw/q1.XLSX", "raw/scan.jpg", "raw/ledger.csv", "archive/old.png"];
    for name in names {
        land(dir.path(), "finance", name);
    }

    let mut outcomes = Vec::new();
    for name in names {
        let event = RouteEvent { bucket: "finance".to_string(), object_name: name.to_string() };
        outcomes.push(route(&store, &config, &event).await.unwrap());
    }

    let moved: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            RouteOutcome::Moved { to, .. } => Some(to.as_str()),
            RouteOutcome::Ignored => None,
        })
        .collect();
    assert_eq!(moved, vec!["processed/excel/q1.XLSX", "processed/images/scan.jpg", "processed/other/ledger.csv"]);
    assert_eq!(outcomes[3], RouteOutcome::Ignored);

    let bucket = dir.path().join("finance");
    assert!(bucket.join("processed/excel/q1.XLSX").exists());
    assert!(bucket.join("archive/old.png").exists());
    assert_eq!(std::fs::read_dir(bucket.join("raw")).unwrap().count(), 0);
}

#[tokio::test]
async fn custom_prefixes_are_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig {
        intake_prefix: "landing/".to_string(),
        spreadsheet_prefix: "sheets/".to_string(),
        image_prefix: "img/".to_string(),
        other_prefix: "misc/".to_string(),
    };
    land(dir.path(), "b", "landing/photo.png");
    let store = FsObjectStore::new(dir.path());

    let event = RouteEvent { bucket: "b".to_string(), object_name: "landing/photo.png".to_string() };
    let outcome = route(&store, &config, &event).await.unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::Moved { from: "landing/photo.png".to_string(), to: "img/photo.png".to_string() }
    );

    let skipped = RouteEvent { bucket: "b".to_string(), object_name: "raw/photo.png".to_string() };
    assert_eq!(route(&store, &config, &skipped).await.unwrap(), RouteOutcome::Ignored);
}
