use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CutlineError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        CutlineError::invalid_timeline("x")
            .to_string()
            .contains("invalid timeline:")
    );
    assert!(
        CutlineError::structural("x")
            .to_string()
            .contains("structural invariant violation:")
    );
    assert!(
        CutlineError::encoding("x")
            .to_string()
            .contains("encoding failure:")
    );
    assert!(
        CutlineError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CutlineError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn serde_json_errors_map_to_serde_variant() {
    let err: CutlineError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, CutlineError::Serde(_)));
}
