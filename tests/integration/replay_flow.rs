//! Integration tests for the reconstruct-and-replay flow
//!
//! Tests the flow: manifest on disk -> Reconstruction -> descriptor seen by
//! the runtime -> launch -> unregistration.

use std::path::Path;

use super::common::record_fixtures::{FixtureImage, RecordFixture};
use super::common::recording_runtime::RecordingRuntime;
use kernel_replay::error::RuntimeError;
use kernel_replay::{decode_manifest, replay_manifest, ReplayError, REPLAY_MAGIC};

/// Replay `fixture` through `runtime`, returning the result and the report
fn replay(
    fixture: &RecordFixture,
    runtime: &RecordingRuntime,
) -> (Result<kernel_replay::ReplayOutcome, ReplayError>, String) {
    let mut out = Vec::new();
    let runtime = runtime.clone();
    let result = replay_manifest(&fixture.manifest, move || Ok(runtime), &mut out);
    (result, String::from_utf8(out).unwrap())
}

/// Replay that must fail before the runtime is even loaded
fn replay_without_runtime(fixture: &RecordFixture) -> ReplayError {
    let loaded = std::cell::Cell::new(false);
    let result = replay_manifest(
        &fixture.manifest,
        || {
            loaded.set(true);
            Ok(RecordingRuntime::new())
        },
        std::io::sink(),
    );
    assert!(!loaded.get(), "runtime must not be loaded for a bad record");
    result.unwrap_err()
}

/// Test the single-kernel scenario end to end
#[test]
fn test_single_kernel_is_relocated_and_launched() {
    let fixture = RecordFixture::single_kernel();
    let runtime = RecordingRuntime::new();

    let (result, _) = replay(&fixture, &runtime);
    let outcome = result.expect("replay should succeed");
    assert_eq!(outcome.kernel, "foo");

    let log = runtime.log.borrow();
    assert_eq!(log.calls, ["register", "init", "launch", "unregister"]);

    let registered = log.registered.as_ref().unwrap();
    assert_eq!(registered.num_device_images, 1);
    assert_eq!(registered.image_lengths, [16]);
    assert_eq!(registered.host_entries.len(), 1);
    assert_eq!(registered.host_entries[0].name, "foo");
    assert_eq!(registered.host_entries[0].image_offset, 4);

    let launched = log.launched.as_ref().unwrap();
    assert_eq!(launched.device_id, 0);
    assert_eq!(launched.host_ptr, registered.first_entry_addr);
    assert_eq!(launched.arg_num, 0);
    assert_eq!(launched.magic, REPLAY_MAGIC);
    assert!(launched.null_base_and_types);
    assert_eq!((launched.num_teams, launched.thread_limit), (0, 0));
    assert_eq!(
        Path::new(&launched.payload),
        fixture.dir.path().join("foo")
    );
}

/// Test that the host entry table keeps image order, then entry order
#[test]
fn test_host_entry_order_spans_images() {
    let fixture = RecordFixture::write(&[
        FixtureImage::new("img0.bin", 0x10_0000, 64)
            .entry(0x10_0020, "img0_e0")
            .entry(0x10_0000, "img0_e1"),
        FixtureImage::new("img1.bin", 0x20_0000, 32)
            .entry(0x20_0008, "img1_e0")
            .entry(0x20_001f, "img1_e1"),
    ]);
    let runtime = RecordingRuntime::new();

    let (result, _) = replay(&fixture, &runtime);
    result.expect("replay should succeed");

    let log = runtime.log.borrow();
    let registered = log.registered.as_ref().unwrap();
    assert_eq!(registered.num_device_images, 2);
    assert_eq!(registered.image_lengths, [64, 32]);

    let names: Vec<_> = registered.host_entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["img0_e0", "img0_e1", "img1_e0", "img1_e1"]);
    let offsets: Vec<_> = registered.host_entries.iter().map(|e| e.image_offset).collect();
    assert_eq!(offsets, [0x20, 0, 0x8, 0x1f]);

    // The first host entry is the kernel
    assert!(log.launched.as_ref().unwrap().payload.ends_with("img0_e0"));
}

/// Test that a blob shorter than declared never reaches the runtime
#[test]
fn test_short_blob_fails_before_runtime() {
    let fixture = RecordFixture::write(&[FixtureImage::new("k.bin", 0x1000, 16)
        .entry(0x1004, "foo")
        .with_blob_len(8)]);

    let err = replay_without_runtime(&fixture);
    assert!(matches!(err, ReplayError::Consistency(_)), "{err}");
}

/// Test that a short blob is still reported before the record is rejected
#[test]
fn test_short_blob_is_reported_before_failing() {
    let fixture = RecordFixture::write(&[
        FixtureImage::new("a.bin", 0x1000, 16).entry(0x1004, "foo"),
        FixtureImage::new("b.bin", 0x9000, 16)
            .entry(0x9000, "bar")
            .with_blob_len(8),
    ]);

    let (result, report) = replay(&fixture, &RecordingRuntime::new());
    assert!(matches!(result, Err(ReplayError::Consistency(_))));

    let lines: Vec<&str> = report.lines().skip(2).collect();
    assert_eq!(
        lines,
        [
            "Found device image a.bin!",
            "Length:16",
            "Found device image b.bin!",
            "Length:8",
        ]
    );
}

/// Test that an entry outside its image never reaches the runtime
#[test]
fn test_entry_outside_image_fails_before_runtime() {
    let fixture =
        RecordFixture::write(&[FixtureImage::new("k.bin", 0x1000, 16).entry(0x1010, "foo")]);

    let err = replay_without_runtime(&fixture);
    assert!(matches!(err, ReplayError::Consistency(_)), "{err}");
}

/// Test that a missing blob aborts the whole record
#[test]
fn test_missing_blob_fails_before_runtime() {
    let fixture = RecordFixture::single_kernel();
    std::fs::remove_file(fixture.dir.path().join("k.bin")).unwrap();

    let err = replay_without_runtime(&fixture);
    assert!(matches!(err, ReplayError::Io { .. }), "{err}");
}

/// Test that a manifest without DeviceImages is a decode error
#[test]
fn test_missing_device_images_is_decode_error() {
    let fixture = RecordFixture::raw(r#"{ "NumDeviceImages": 1 }"#);

    let err = replay_without_runtime(&fixture);
    assert!(matches!(err, ReplayError::Decode { .. }), "{err}");
}

/// Test that decoding the same manifest twice gives equal records
#[test]
fn test_decode_is_idempotent() {
    let fixture = RecordFixture::write(&[
        FixtureImage::new("a.bin", 0x1000, 16).entry(0x1004, "foo"),
        FixtureImage::new("b.bin", 0x9000, 8).entry(0x9000, "bar"),
    ]);

    let first = decode_manifest(&fixture.manifest).unwrap();
    let second = decode_manifest(&fixture.manifest).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.base_dir, fixture.dir.path());
}

/// Test that a failed launch is reported and still unregisters
#[test]
fn test_failed_launch_still_unregisters() {
    let fixture = RecordFixture::single_kernel();
    let runtime = RecordingRuntime::new().failing_launch(-1);

    let (result, _) = replay(&fixture, &runtime);
    let err = result.unwrap_err();
    assert!(
        matches!(err, ReplayError::Runtime(RuntimeError::Launch { code: -1 })),
        "{err}"
    );
    assert_eq!(runtime.calls(), ["register", "init", "launch", "unregister"]);
}

/// Test that a declining backend does not stop the replay
#[test]
fn test_declined_backend_is_not_fatal() {
    let fixture = RecordFixture::single_kernel();
    let runtime = RecordingRuntime::new().declining("amdgpu");

    let (result, _) = replay(&fixture, &runtime);
    let outcome = result.expect("replay should succeed");
    assert_eq!(outcome.declined_backends, ["amdgpu"]);
    assert_eq!(runtime.calls(), ["register", "init", "launch", "unregister"]);
}

/// Test that a runtime that cannot be loaded fails after reconstruction
#[test]
fn test_runtime_load_failure_is_reported() {
    let fixture = RecordFixture::single_kernel();

    let mut out = Vec::new();
    let result = replay_manifest(
        &fixture.manifest,
        || -> Result<RecordingRuntime, RuntimeError> {
            Err(RuntimeError::Load("libomptarget.so: not found".into()))
        },
        &mut out,
    );

    assert!(matches!(result, Err(ReplayError::Runtime(RuntimeError::Load(_)))));
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("BinDesc.HostEntry.name:foo"));
}

/// Test the progress report of a successful replay
#[test]
fn test_report_lines() {
    let fixture = RecordFixture::single_kernel();

    let (result, report) = replay(&fixture, &RecordingRuntime::new());
    result.expect("replay should succeed");

    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], format!("Reading {}", fixture.manifest.display()));
    assert_eq!(
        lines[1],
        format!("Replay directory is {}", fixture.dir.path().display())
    );
    assert_eq!(lines[2], "Found device image k.bin!");
    assert_eq!(lines[3], "Length:16");
    assert_eq!(lines[4], "NumDeviceImages:1");
    assert!(lines.contains(&"BinDesc.DeviceImage.Entry.name:foo"));
    assert!(lines.contains(&"BinDesc.HostEntry.size:4"));
}
