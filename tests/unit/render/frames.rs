use super::*;

fn scratch_parent() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cutline_frames_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn frame(w: u32, h: u32) -> image::RgbaImage {
    image::RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]))
}

#[test]
fn file_names_are_zero_padded() {
    assert_eq!(frame_file_name(0), "frame_000000.png");
    assert_eq!(frame_file_name(1234), "frame_001234.png");
}

#[test]
fn frames_are_written_in_order_then_cleaned() {
    let parent = scratch_parent();
    let mut store = DirFrameStore::create_in(&parent).unwrap();
    let dir = store.dir().unwrap().to_path_buf();
    assert!(
        dir.file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".cutline-frames-")
    );

    store.write_frame(0, &frame(4, 2)).unwrap();
    store.write_frame(1, &frame(4, 2)).unwrap();
    assert!(store.write_frame(3, &frame(4, 2)).is_err());
    assert!(store.write_frame(2, &frame(2, 2)).is_err());

    let seq = store.sequence().unwrap();
    assert_eq!(seq.count, 2);
    assert_eq!((seq.width, seq.height), (4, 2));
    assert!(seq.frame_path(1).is_file());
    let back = image::open(seq.frame_path(0)).unwrap().to_rgba8();
    assert_eq!(back.get_pixel(0, 0).0, [1, 2, 3, 255]);

    store.cleanup().unwrap();
    assert!(!dir.exists());
    store.cleanup().unwrap();
    assert!(store.sequence().is_err());
    let _ = std::fs::remove_dir_all(&parent);
}

#[test]
fn dropping_the_store_removes_its_directory() {
    let parent = scratch_parent();
    let dir = {
        let mut store = DirFrameStore::create_in(&parent).unwrap();
        store.write_frame(0, &frame(2, 2)).unwrap();
        store.dir().unwrap().to_path_buf()
    };
    assert!(!dir.exists());
    let _ = std::fs::remove_dir_all(&parent);
}
