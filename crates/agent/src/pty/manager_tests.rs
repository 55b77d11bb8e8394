use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::output_delegate::OutputSink;

struct CollectSink {
    buf: parking_lot::Mutex<Vec<u8>>,
}

impl CollectSink {
    fn new() -> Arc<Self> {
        Arc::new(Self { buf: parking_lot::Mutex::new(Vec::new()) })
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl OutputSink for CollectSink {
    fn send(&self, data: &[u8]) -> Result<(), String> {
        self.buf.lock().extend_from_slice(data);
        Ok(())
    }
}

fn manager() -> (Arc<PtyManager>, Arc<AtomicBool>) {
    let exited = Arc::new(AtomicBool::new(false));
    let flag = exited.clone();
    let mgr = Arc::new(PtyManager::new(4096, Arc::new(move |_id, _code| flag.store(true, Ordering::Release))));
    (mgr, exited)
}

#[tokio::test]
async fn create_rejects_disallowed_shell() {
    let (mgr, _) = manager();
    let err = mgr
        .create("s1", CreateOptions { shell: Some("/bin/evil".to_owned()), ..Default::default() })
        .unwrap_err();
    assert_eq!(err.message(), "Shell not allowed");
}

#[tokio::test]
async fn create_spawns_and_reports_pid() {
    let (mgr, _) = manager();
    let pid = mgr.create("s1", CreateOptions { shell: Some("/bin/sh".to_owned()), ..Default::default() }).unwrap();
    assert!(pid > 0);
    assert!(mgr.has_session("s1"));
    assert_eq!(mgr.get_pid("s1"), Some(pid));
    mgr.destroy("s1");
}

#[tokio::test]
async fn write_and_capture_round_trips_through_output_delegate() {
    let (mgr, _) = manager();
    mgr.create("s1", CreateOptions { shell: Some("/bin/sh".to_owned()), ..Default::default() }).unwrap();

    let sink = CollectSink::new();
    mgr.attach_output("s1", sink.clone());

    mgr.write("s1", b"echo hi-from-shell\n").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(sink.text().contains("hi-from-shell"), "got: {:?}", sink.text());
    mgr.destroy("s1");
}

#[tokio::test]
async fn destroy_is_idempotent_for_absent_session() {
    let (mgr, _) = manager();
    mgr.destroy("never-existed");
    mgr.destroy("never-existed");
}

#[tokio::test]
async fn exit_handler_fires_once_when_shell_exits() {
    let (mgr, exited_flag) = manager();
    mgr.create("s1", CreateOptions { shell: Some("/bin/sh".to_owned()), ..Default::default() }).unwrap();
    mgr.write("s1", b"exit 0\n").unwrap();

    for _ in 0..50 {
        if mgr.is_exited("s1") == Some(true) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(mgr.is_exited("s1"), Some(true));
    assert!(exited_flag.load(Ordering::Acquire));
    assert_eq!(mgr.exit_code("s1"), Some(0));
}

#[tokio::test]
async fn get_cwd_never_panics_for_unknown_session() {
    let (mgr, _) = manager();
    assert_eq!(mgr.get_cwd("nope").await, None);
}
