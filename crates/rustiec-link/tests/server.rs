use rustiec_core::apci::{frame_len, Apci, UFunction};
use rustiec_core::asdu::{Asdu, AsduParams, InformationObject};
use rustiec_core::element::InformationElement;
use rustiec_core::encoding::{reader::Reader, writer::Writer};
use rustiec_core::types::{Cause, Quality, TypeId};
use rustiec_link::{
    LinkError, Server, ServerConfig, Session, SessionConfig, SessionEvent, SessionHandler,
    SessionState,
};
use std::net::SocketAddr;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

fn loopback() -> SocketAddr {
    let _ = env_logger::builder().is_test(true).try_init();
    "127.0.0.1:0".parse().unwrap()
}

/// Records every ASDU a server-side session receives.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Asdu>>,
}

impl SessionHandler for Recorder {
    fn on_asdu(&self, _session: &Session, asdu: Asdu) {
        self.seen.lock().push(asdu);
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}

async fn client(addr: SocketAddr) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::new(SessionConfig::default(), Arc::new(tx));
    session.connect(addr).await.unwrap();
    (session, rx)
}

async fn read_raw_frame(stream: &mut TcpStream) -> Option<(Apci, Vec<u8>)> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.ok()?;
    let len = frame_len(&header).unwrap().unwrap();
    let mut frame = header.to_vec();
    frame.resize(len, 0);
    stream.read_exact(&mut frame[2..]).await.ok()?;
    let mut r = Reader::new(&frame);
    let (apci, asdu) = Apci::decode(&mut r).unwrap();
    Some((apci, asdu.to_vec()))
}

async fn write_raw_frame(stream: &mut TcpStream, apci: Apci) {
    let mut buf = [0u8; 6];
    let mut w = Writer::new(&mut buf);
    apci.encode(&mut w, &[]).unwrap();
    stream.write_all(&buf).await.unwrap();
}

fn measurement(value: f32) -> Asdu {
    Asdu::new(TypeId::MeasuredFloat, Cause::Spontaneous, 1).with_object(InformationObject::new(
        100,
        InformationElement::Float {
            value,
            quality: Quality::GOOD,
        },
    ))
}

#[tokio::test]
async fn client_and_server_exchange_asdus() {
    let recorder = Arc::new(Recorder::default());
    let handler = recorder.clone();
    let server = Server::bind(ServerConfig::new(loopback()), move |_| {
        handler.clone() as Arc<dyn SessionHandler>
    })
    .await
    .unwrap();

    let (session, mut events) = client(server.local_addr()).await;
    assert_eq!(session.state(), SessionState::Active);

    session.interrogation(1, 20).await.unwrap();
    wait_until(|| !recorder.seen.lock().is_empty()).await;
    assert_eq!(
        recorder.seen.lock()[0],
        Asdu::station_interrogation(1)
    );

    wait_until(|| server.active_sessions().len() == 1).await;
    assert_eq!(server.broadcast(&measurement(21.5)), 1);
    match timeout(Duration::from_secs(2), events.recv()).await.unwrap() {
        Some(SessionEvent::Asdu(asdu)) => assert_eq!(asdu, measurement(21.5)),
        other => panic!("unexpected event {other:?}"),
    }

    session.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn connections_beyond_limit_are_closed() {
    let server = Server::bind(
        ServerConfig::new(loopback()).with_max_connections(1),
        |_| Arc::new(Recorder::default()) as Arc<dyn SessionHandler>,
    )
    .await
    .unwrap();

    let (_first, _events) = client(server.local_addr()).await;
    wait_until(|| server.connection_count() == 1).await;

    let mut second = TcpStream::connect(server.local_addr()).await.unwrap();
    let mut byte = [0u8; 1];
    let read = timeout(Duration::from_secs(2), second.read(&mut byte))
        .await
        .expect("excess connection should be closed promptly");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(server.connection_count(), 1);
    server.stop().await;
}

#[tokio::test]
async fn broadcast_skips_connections_without_startdt() {
    let server = Server::bind(ServerConfig::new(loopback()), |_| {
        Arc::new(Recorder::default()) as Arc<dyn SessionHandler>
    })
    .await
    .unwrap();

    let mut silent = TcpStream::connect(server.local_addr()).await.unwrap();
    wait_until(|| server.connection_count() == 1).await;
    assert_eq!(server.broadcast(&measurement(1.0)), 0);

    write_raw_frame(&mut silent, Apci::U(UFunction::StartDtAct)).await;
    let (apci, _) = read_raw_frame(&mut silent).await.unwrap();
    assert_eq!(apci, Apci::U(UFunction::StartDtCon));
    wait_until(|| server.active_sessions().len() == 1).await;
    assert_eq!(server.broadcast(&measurement(2.0)), 1);

    let (apci, asdu) = read_raw_frame(&mut silent).await.unwrap();
    assert!(matches!(apci, Apci::I { send_seq: 0, .. }));
    let decoded = Asdu::decode(&mut Reader::new(&asdu), &AsduParams::IEC104).unwrap();
    assert_eq!(decoded, measurement(2.0));
    server.stop().await;
}

#[tokio::test]
async fn stop_closes_every_connection() {
    let server = Server::bind(
        ServerConfig::new(loopback()).with_stop_grace(Duration::from_millis(500)),
        |_| Arc::new(Recorder::default()) as Arc<dyn SessionHandler>,
    )
    .await
    .unwrap();
    let (a, mut a_events) = client(server.local_addr()).await;
    let (b, _b_events) = client(server.local_addr()).await;
    wait_until(|| server.active_sessions().len() == 2).await;

    let started = Instant::now();
    server.stop().await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(server.connection_count(), 0);

    match timeout(Duration::from_secs(2), a_events.recv()).await.unwrap() {
        Some(SessionEvent::Closed(Some(_))) => {}
        other => panic!("unexpected event {other:?}"),
    }
    wait_until(|| b.state() == SessionState::Closed).await;
    assert!(matches!(
        a.send(&measurement(0.0)).await,
        Err(LinkError::Closed)
    ));
    assert!(TcpStream::connect(server.local_addr()).await.is_err());
}

#[tokio::test]
async fn concurrent_writers_never_interleave_frames() {
    let listener = tokio::net::TcpListener::bind(loopback()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 25;

    let peer = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (apci, _) = read_raw_frame(&mut stream).await.unwrap();
        assert_eq!(apci, Apci::U(UFunction::StartDtAct));
        write_raw_frame(&mut stream, Apci::U(UFunction::StartDtCon)).await;

        let mut values = Vec::new();
        while values.len() < WRITERS * PER_WRITER {
            let (apci, asdu) = read_raw_frame(&mut stream).await.unwrap();
            let Apci::I { send_seq, .. } = apci else {
                panic!("unexpected frame {apci:?}");
            };
            assert_eq!(usize::from(send_seq), values.len());
            let decoded = Asdu::decode(&mut Reader::new(&asdu), &AsduParams::IEC104).unwrap();
            values.push(decoded.objects[0].address);
            write_raw_frame(
                &mut stream,
                Apci::S {
                    recv_seq: send_seq + 1,
                },
            )
            .await;
        }
        values
    });

    let (tx, _rx) = mpsc::unbounded_channel();
    let session = Session::new(SessionConfig::default(), Arc::new(tx));
    session.connect(addr).await.unwrap();

    let mut writers = Vec::new();
    for writer in 0..WRITERS {
        let session = session.clone();
        writers.push(tokio::spawn(async move {
            for n in 0..PER_WRITER {
                session
                    .single_command(1, (writer * 1000 + n) as u32, n % 2 == 0, false)
                    .await
                    .unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    let mut values = timeout(Duration::from_secs(10), peer)
        .await
        .unwrap()
        .unwrap();
    values.sort_unstable();
    values.dedup();
    assert_eq!(values.len(), WRITERS * PER_WRITER);
    session.disconnect().await;
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = tokio::net::TcpListener::bind(loopback()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (tx, _rx) = mpsc::unbounded_channel();
    let session = Session::new(SessionConfig::default(), Arc::new(tx));
    assert!(session.connect(addr).await.is_err());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.connect(addr).await,
        Err(LinkError::Closed)
    ));
}
