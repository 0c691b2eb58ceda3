//! Default factories registered with the context.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crossbeam_channel::unbounded;
use femtologging_core::spi::Properties;
use femtologging_core::{
    CollectorServer, FemtoAppender, FemtoLevel, FemtoLogRecord, ListeningChannel, get_context,
    initialize,
};
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[serial]
fn context_knows_the_built_in_types() {
    initialize();
    let context = get_context(false).expect("initialized");
    assert!(context.appender_factories().contains("SocketAppender"));
    assert!(context.appender_factories().contains("NullAppender"));
    assert!(context.layout_factories().contains("DefaultFormatter"));
    assert!(context.filter_factories().contains("LevelRangeFilter"));
    assert!(context.locale_factories().contains("EncodingLocale"));
}

#[rstest]
#[serial]
fn socket_appender_from_properties_reaches_a_collector() {
    initialize();
    let listener =
        ListeningChannel::listen_on(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).expect("bind loopback");
    let port = listener.local_port().expect("bound port");
    let (tx, rx) = unbounded();
    let server = CollectorServer::spawn(listener, move |record| {
        let _ = tx.send(record);
    })
    .expect("spawn collector");

    let mut properties = Properties::new();
    properties.insert("host".into(), "127.0.0.1".into());
    properties.insert("port".into(), port.to_string());
    properties.insert("server_name".into(), "from-properties".into());
    let context = get_context(false).expect("initialized");
    let appender = context
        .appender_factories()
        .create("SocketAppender", &properties)
        .expect("factory builds appender");
    let target = appender.get().expect("target present");
    target
        .append(&FemtoLogRecord::new("factory", FemtoLevel::Warn, "configured"))
        .expect("queue record");

    let decoded = rx.recv_timeout(Duration::from_secs(2)).expect("record arrives");
    assert_eq!(decoded.server_name, "from-properties");
    assert_eq!(decoded.record.message, "configured");
    target.close();
    server.shutdown();
}

#[rstest]
#[serial]
fn unknown_type_is_reported() {
    initialize();
    let context = get_context(false).expect("initialized");
    assert!(context
        .appender_factories()
        .create("SyslogAppender", &Properties::new())
        .is_err());
}
