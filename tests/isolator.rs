mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use approx::assert_abs_diff_eq;
use voice_isolation::{
    decode_audio, decode_base64, encode_wav_base64, IsolationError, IsolationService,
    IsolationSettings, Separator,
};

use common::{sine, wav_frames, StubSeparator};

fn stub_service() -> IsolationService {
    IsolationService::with_separator(
        IsolationSettings::default(),
        Arc::new(StubSeparator::default()),
    )
}

#[test]
fn vocals_and_accompaniment_add_up_to_the_mix() {
    let svc = stub_service();
    assert_eq!(svc.settings().vocals_stem, "vocals");
    let mix = sine(2, 8_000, 44_100, 440.0);
    let out = svc.isolate_audio(mix.clone()).unwrap();

    assert_eq!(out.sample_rate, 44_100);
    let sum = &out.vocals.samples + &out.accompaniment.samples;
    for (a, b) in sum.iter().zip(mix.samples.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
    for (a, b) in out.vocals.samples.iter().zip(mix.samples.iter()) {
        assert_abs_diff_eq!(*a, *b * 0.5, epsilon = 1e-6);
    }
}

#[test]
fn two_second_tone_end_to_end() {
    let svc = stub_service();
    let tone = sine(2, 88_200, 44_100, 440.0);
    let payload = encode_wav_base64(&tone).unwrap();

    let out = svc.isolate_base64(&payload, false).unwrap();
    assert_eq!(out.duration_seconds, 2.0);
    assert!(out.accompaniment_base64.is_none());

    let vocals = decode_base64(&out.vocals_base64).unwrap();
    assert_eq!(wav_frames(&vocals), (2, 44_100, 88_200));
}

#[test]
fn mono_low_rate_input_comes_back_stereo_at_model_rate() {
    let svc = stub_service();
    let mono = sine(1, 16_000, 16_000, 440.0);
    let payload = encode_wav_base64(&mono).unwrap();

    let out = svc.isolate_base64(&payload, true).unwrap();
    assert_abs_diff_eq!(out.duration_seconds, 1.0, epsilon = 1e-9);

    let acc = decode_audio(decode_base64(out.accompaniment_base64.as_deref().unwrap()).unwrap())
        .unwrap();
    assert_eq!(acc.num_channels(), 2);
    assert_eq!(acc.sample_rate, 44_100);
    assert_eq!(acc.num_frames(), 44_100);
}

#[test]
fn garbage_payloads_fail_with_decode_errors() {
    let svc = stub_service();

    let err = svc.isolate_base64("not base64 !!!", false).unwrap_err();
    assert_eq!(err.kind(), "decode");

    // valid base64, not audio
    let err = svc.isolate_base64("aGVsbG8gd29ybGQ=", false).unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[test]
fn model_is_loaded_once_under_concurrent_first_use() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let svc = Arc::new(IsolationService::new(IsolationSettings::default(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Ok(Arc::new(StubSeparator::default()) as Arc<dyn Separator>)
    }));
    assert!(!svc.is_ready());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = svc.clone();
            thread::spawn(move || svc.isolate_audio(sine(2, 512, 44_100, 220.0)).is_ok())
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(svc.is_ready());
}

#[test]
fn failed_load_is_reported_and_retried() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let svc = IsolationService::new(IsolationSettings::default(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(IsolationError::ModelLoad("weights unavailable".into()))
    });

    let err = svc.isolate_audio(sine(2, 512, 44_100, 220.0)).unwrap_err();
    assert_eq!(err.kind(), "model_load");
    assert!(svc.warm_up().is_err());
    assert!(!svc.is_ready());
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}
