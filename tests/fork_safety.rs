//! A forked child inherits socket appenders whose worker threads stayed in
//! the parent. It must still log and exit cleanly.
#![cfg(all(unix, feature = "fork-handlers"))]

use std::net::{IpAddr, Ipv4Addr};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use femtologging_core::{
    CollectorServer, FemtoLevel, ListeningChannel, SocketAppenderBuilder, default_hierarchy,
    initialize, shared_appender,
};
use serial_test::serial;

fn wait_for_child(pid: libc::pid_t, limit: Duration) -> Option<libc::c_int> {
    let deadline = Instant::now() + limit;
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: `pid` is our own child and `status` is a valid out pointer.
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        if rc == pid {
            return Some(status);
        }
        if Instant::now() >= deadline {
            // SAFETY: as above; the child is killed and reaped.
            unsafe {
                libc::kill(pid, libc::SIGKILL);
                libc::waitpid(pid, &mut status, 0);
            }
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
#[serial]
fn child_logs_and_exits_after_fork() {
    let listener =
        ListeningChannel::listen_on(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).expect("bind loopback");
    let port = listener.local_port().expect("bound port");
    let (tx, rx) = unbounded();
    let server = CollectorServer::spawn(listener, move |record| {
        let _ = tx.send(record);
    })
    .expect("spawn collector");

    initialize();
    let hierarchy = default_hierarchy().expect("context allocated");
    let appender = SocketAppenderBuilder::new()
        .with_tcp("127.0.0.1", port)
        .with_io_timeout(Duration::from_millis(500))
        .build()
        .expect("build appender");
    let root = hierarchy.root().get().expect("root");
    root.add_appender(shared_appender(appender));
    assert!(root.log(FemtoLevel::Info, "from parent"));
    assert!(root.flush());
    let parent_record = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("parent record arrives");
    assert_eq!(parent_record.record.message, "from parent");

    // SAFETY: the child only logs and exits through the registered hooks.
    let pid = unsafe { libc::fork() };
    assert!(pid >= 0, "fork failed");
    if pid == 0 {
        let logged = catch_unwind(AssertUnwindSafe(|| root.log(FemtoLevel::Info, "from child")));
        if !matches!(logged, Ok(true)) {
            // SAFETY: leave without running hooks after a failure.
            unsafe { libc::_exit(2) };
        }
        std::process::exit(0);
    }

    let status = wait_for_child(pid, Duration::from_secs(10)).expect("child exits in time");
    assert!(libc::WIFEXITED(status), "child did not exit normally: {status:#x}");
    assert_eq!(libc::WEXITSTATUS(status), 0);

    let child_record = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("child record arrives");
    assert_eq!(child_record.record.message, "from child");
    server.shutdown();
}
