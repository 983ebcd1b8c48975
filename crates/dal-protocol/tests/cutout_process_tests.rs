//! Tests running the engine with a real cutout program.
//!
//! The program is a small shell script written to a temporary directory.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dal_protocol::{
    CutoutRequest, CutoutTask, DalError, ParamSet, ProcessCutoutTask, ProductKind, Protocol,
    QueryEngine,
};
use test_utils::{image_context, image_row, MemoryExecutor, StaticLocator};

// Scripts are executed right after being written; running one test at a
// time keeps another test's fork from holding the file open.
static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn params() -> ParamSet {
    ParamSet::parse(
        Protocol::Image,
        [("POS", "180,0"), ("SIZE", "0.2"), ("MODE", "cutout")],
    )
    .unwrap()
}

#[test]
fn test_successful_program_rewrites_virtual_record() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "cutout.sh",
        r##"# Last argument is the archival file.
for last; do :; done
echo "# virtual dataset"
echo "[image]"
echo "MDFILE = cut-$(basename "$last" .fits).md"
echo "im_naxis = 72 72"
echo "obs_title = Cutout of $(basename "$last")""##,
    );

    let locator = StaticLocator::new().with_file("9", "/archive/m31.fits");
    let task = ProcessCutoutTask::new(&script).with_staging_dir(dir.path());
    let ctx = image_context();
    let executor = MemoryExecutor::new(vec![image_row("9", 180.0, 0.0)]);

    let response = QueryEngine::new(Protocol::Image, &ctx)
        .with_virtual_images(&locator, &task)
        .run(&params(), &executor)
        .unwrap();

    assert_eq!(response.len(), 2);
    let cutout = &response.records[1];
    assert_eq!(cutout.product, ProductKind::Virtual);
    assert_eq!(cutout.text("im_naxis"), Some("72 72"));
    assert_eq!(cutout.text("obs_title"), Some("Cutout of m31.fits"));
    assert!(cutout
        .text("access_url")
        .unwrap()
        .ends_with("%23cut-m31.md"));
}

#[test]
fn test_failing_program_drops_only_virtual_record() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "fail.sh", "echo 'no overlap' >&2\nexit 3");

    let locator = StaticLocator::new().with_file("9", "/archive/m31.fits");
    let task = ProcessCutoutTask::new(&script);

    // Called directly, the failure surfaces as a task error.
    let err = task
        .compute("/archive/m31.fits", &CutoutRequest::default())
        .unwrap_err();
    assert!(matches!(err, DalError::ExternalTask(_)));
    assert!(err.to_string().contains("no overlap"));

    let ctx = image_context();
    let executor = MemoryExecutor::new(vec![image_row("9", 180.0, 0.0)]);
    let response = QueryEngine::new(Protocol::Image, &ctx)
        .with_virtual_images(&locator, &task)
        .run(&params(), &executor)
        .unwrap();

    assert_eq!(response.len(), 1);
    assert_eq!(response.records[0].product, ProductKind::Archival);
    assert_eq!(response.stats.virtual_discarded, 1);
}

#[test]
fn test_program_without_mdfile_is_no_result() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "quiet.sh", "echo 'im_naxis = 10 10'");

    let task = ProcessCutoutTask::new(&script);
    let result = task
        .compute("/archive/m31.fits", &CutoutRequest::default())
        .unwrap();
    assert!(result.is_none());
}
