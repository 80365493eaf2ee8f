use super::*;
use crate::model::keyframe::KeyframeValue;
use crate::model::scene::LayerKind;
use crate::timeline::ops;
use crate::timeline::track::SequentialIds;

fn seeded() -> (InMemoryProjectStore, SceneId) {
    let mut store = InMemoryProjectStore::new();
    let scene = store
        .add_scene("intro", Canvas::new(1280, 720).unwrap())
        .unwrap();
    (store, scene)
}

fn commit(store: &mut InMemoryProjectStore, scene: SceneId, f: impl FnOnce(&mut Timeline, &mut SequentialIds)) {
    let before = Timeline::load(&*store, scene).unwrap();
    let mut after = before.clone();
    let mut ids = SequentialIds::after(store.high_water_id());
    f(&mut after, &mut ids);
    store.apply(scene, Transaction::diff(&before, &after)).unwrap();
}

#[test]
fn diff_of_identical_timelines_is_empty() {
    let (mut store, scene) = seeded();
    commit(&mut store, scene, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
    });
    let tl = Timeline::load(&store, scene).unwrap();
    assert!(Transaction::diff(&tl, &tl).is_empty());
}

#[test]
fn committed_edits_round_trip_through_load() {
    let (mut store, scene) = seeded();
    commit(&mut store, scene, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
        let a = ops::insert_at_main_track(tl, ids, None, 2.0, 0.0, Default::default()).unwrap();
        ops::add_keyframe(tl, ids, a, 1.0, KeyframeValue::Opacity { value: 0.5 }).unwrap();
    });

    let tl = Timeline::load(&store, scene).unwrap();
    assert_eq!(tl.layers.len(), 1);
    assert_eq!(tl.layers[0].blocks.len(), 1);
    assert_eq!(tl.layers[0].blocks[0].keyframes.len(), 1);
    assert_eq!(store.get_keyframes(None).unwrap().len(), 1);
    assert!(store.high_water_id() >= 4);
}

#[test]
fn shifted_keyframes_are_persisted_with_their_block() {
    let (mut store, scene) = seeded();
    commit(&mut store, scene, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
        ops::insert_at_main_track(tl, ids, None, 5.0, 0.0, Default::default()).unwrap();
        let b = ops::insert_at_main_track(tl, ids, None, 3.0, 5.0, Default::default()).unwrap();
        ops::add_keyframe(tl, ids, b, 6.0, KeyframeValue::Blur { value: 4.0 }).unwrap();
    });
    let a = Timeline::load(&store, scene).unwrap().layers[0].blocks[0].id();
    commit(&mut store, scene, |tl, _| {
        ops::resize_with_cascade(tl, a, 7.0).unwrap();
    });

    let kfs = store.get_keyframes(None).unwrap();
    assert_eq!(kfs.len(), 1);
    assert_eq!(kfs[0].time, 8.0);
}

#[test]
fn deleting_a_layer_cascades_rows() {
    let (mut store, scene) = seeded();
    commit(&mut store, scene, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
        ops::insert_at_audio_track(tl, ids, None, 0.0, 1.0).unwrap();
    });
    let audio = Timeline::load(&store, scene)
        .unwrap()
        .layers
        .iter()
        .find(|t| t.layer.kind == LayerKind::Audio)
        .map(|t| t.layer.id)
        .unwrap();

    let before = Timeline::load(&store, scene).unwrap();
    let mut after = before.clone();
    ops::delete_layer(&mut after, audio).unwrap();
    let tx = Transaction::diff(&before, &after);
    assert_eq!(tx.mutations, vec![Mutation::DeleteLayer { layer: audio }]);
    store.apply(scene, tx).unwrap();

    assert!(store.get_blocks(audio).is_err());
    assert_eq!(store.snapshot().blocks.len(), 0);
}

#[test]
fn failed_transaction_leaves_store_untouched() {
    let (mut store, scene) = seeded();
    commit(&mut store, scene, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
        ops::insert_at_main_track(tl, ids, None, 1.0, 0.0, Default::default()).unwrap();
    });
    let before = store.clone();

    let tx = Transaction {
        mutations: vec![
            Mutation::DeleteBlock {
                block: store.snapshot().blocks[0].id,
            },
            Mutation::DeleteBlock {
                block: BlockId(9_999),
            },
        ],
    };
    assert!(matches!(
        store.apply(scene, tx),
        Err(CutlineError::NotFound(_))
    ));
    assert_eq!(store, before);
}

#[test]
fn blocks_cannot_be_written_into_another_scene() {
    let (mut store, scene) = seeded();
    let other = store
        .add_scene("outro", Canvas::new(640, 360).unwrap())
        .unwrap();
    commit(&mut store, other, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
    });
    let foreign = store.get_layers(other).unwrap()[0].id;

    let block = AnimatedBlock::new(Block::new(BlockId(500), foreign, None, 0.0, 1.0));
    let err = store
        .apply(scene, Transaction {
            mutations: vec![Mutation::PutBlock { block }],
        })
        .unwrap_err();
    assert!(matches!(err, CutlineError::Validation(_)));
}

#[test]
fn snapshot_json_round_trip_and_version_gate() {
    let (mut store, scene) = seeded();
    commit(&mut store, scene, |tl, ids| {
        ops::ensure_main_layer(tl, ids).unwrap();
        ops::insert_at_main_track(tl, ids, None, 1.0, 0.0, Default::default()).unwrap();
    });

    let json = serde_json::to_string(&store.snapshot()).unwrap();
    let back = InMemoryProjectStore::from_json_str(&json).unwrap();
    assert_eq!(back, store);

    let mut snapshot = store.snapshot();
    snapshot.schema_version = 99;
    let err = InMemoryProjectStore::from_snapshot(snapshot).unwrap_err();
    assert!(err.to_string().contains("schema_version"));
}

#[test]
fn snapshot_with_dangling_rows_is_rejected() {
    let json = r#"{
        "schema_version": 1,
        "scenes": [{"id": 1, "canvas": {"width": 100, "height": 100}}],
        "layers": [{"id": 2, "scene": 3, "name": "x", "position": 0, "kind": "audio"}]
    }"#;
    assert!(matches!(
        InMemoryProjectStore::from_json_str(json),
        Err(CutlineError::NotFound(_))
    ));
}

#[test]
fn json_files_round_trip() {
    let (store, _) = seeded();
    let dir = std::env::temp_dir().join(format!(
        "cutline_store_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("project.json");
    store.save_json(&path).unwrap();
    let back = InMemoryProjectStore::load_json(&path).unwrap();
    assert_eq!(back.scene_ids(), store.scene_ids());
    let _ = std::fs::remove_dir_all(&dir);
}
