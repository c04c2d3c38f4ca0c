mod common;

use std::collections::HashSet;

use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

use common::{PIXEL_PNG, TestApp};

#[tokio::test]
async fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestApp::with_retention(1).await;
    let request = json!({ "compositionId": "Intro", "compositionCache": true });

    // miss, then hit
    app.post_json("/render/still", request.clone()).await;
    app.post_json("/render/still", request).await;
    // retention drops the first still
    app.post_json(
        "/render/still",
        json!({ "compositionId": "Intro", "inputProps": { "title": "Second" } }),
    )
    .await;
    app.post_json(
        "/render/still",
        json!({ "compositionId": "Intro", "inputProps": { "crash": "boom" } }),
    )
    .await;
    app.post_json(
        "/upload/image",
        json!({ "base64Data": format!("data:image/png;base64,{PIXEL_PNG}") }),
    )
    .await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "framehouse_render_cache_hit_total",
        "framehouse_render_cache_miss_total",
        "framehouse_render_engine_ms",
        "framehouse_render_failed_total",
        "framehouse_retention_deleted_total",
        "framehouse_upload_saved_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
