use voice_isolation::core::engine::{validate_window, Device};

#[test]
fn validate_window_rejects_len_mismatch() {
    let left = vec![0.0f32; 1000];
    let right = vec![0.0f32; 999];
    let _ = validate_window(&left, &right).unwrap_err();
}

#[test]
fn validate_window_rejects_wrong_t() {
    // any T ≠ the Demucs window should error
    let left = vec![0.0f32; 1024];
    let right = vec![0.0f32; 1024];
    let _ = validate_window(&left, &right).unwrap_err();
}

#[test]
fn validate_window_accepts_demucs_window() {
    let left = vec![0.0f32; 343_980];
    let right = vec![0.0f32; 343_980];
    assert_eq!(validate_window(&left, &right).unwrap(), 343_980);
}

#[test]
fn device_parses_lowercase() {
    let d: Device = serde_json::from_str("\"cuda\"").unwrap();
    assert_eq!(d, Device::Cuda);
    assert_eq!(Device::default().to_string(), "auto");
}
