//! Talks to a fake camera on a loopback UDP socket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ptzlink_core::config::ControlConfig;
use ptzlink_core::{Framing, PanDirection, TiltDirection};
use ptzlink_transport::{Delivery, Dispatch, Lane, SessionManager, UdpViscaLink, ViscaLink};
use ptzlink_visca::{ViscaCommand, ViscaMessage, ViscaReply};
use tokio::net::UdpSocket;

#[derive(Clone, Copy)]
enum Camera {
    Replies,
    Silent,
}

/// Spawn a fake camera. Returns its address and every datagram it received.
async fn fake_camera(mode: Camera, framing: Framing) -> (String, Arc<Mutex<Vec<Vec<u8>>>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap().to_string();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 256];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else { return };
            let datagram = buf[..n].to_vec();
            log.lock().unwrap().push(datagram.clone());
            if let Camera::Silent = mode {
                continue;
            }
            for payload in [[0x90, 0x41, 0xFF], [0x90, 0x51, 0xFF]] {
                let reply = match framing {
                    Framing::Raw => payload.to_vec(),
                    Framing::ViscaOverIp => {
                        let mut framed = vec![0x01, 0x11, 0x00, 0x03];
                        framed.extend_from_slice(&datagram[4..8]);
                        framed.extend_from_slice(&payload);
                        framed
                    }
                };
                let _ = socket.send_to(&reply, from).await;
            }
        }
    });
    (addr, received)
}

fn control(timeout_ms: u64) -> ControlConfig {
    ControlConfig { timeout_ms, queue_depth: 8 }
}

#[tokio::test]
async fn ack_is_reported_and_bytes_are_exact() {
    let (addr, received) = fake_camera(Camera::Replies, Framing::Raw).await;
    let link = UdpViscaLink::connect(&addr, Framing::Raw).await.unwrap();

    let mv = ViscaCommand::pan_tilt(PanDirection::Right, TiltDirection::Stop, 10, 10).unwrap();
    let delivery = link.send(&mv.encode(), Duration::from_millis(500)).await.unwrap();
    assert_eq!(delivery, Delivery::Acked { reply: ViscaReply::Ack { socket: 1 } });

    // The completion of the first command is drained, not mistaken for this ack.
    let home = ViscaCommand::Home.encode();
    let delivery = link.send(&home, Duration::from_millis(500)).await.unwrap();
    assert!(matches!(delivery, Delivery::Acked { .. }));

    let received = received.lock().unwrap().clone();
    assert_eq!(received[0], vec![0x81, 0x01, 0x06, 0x01, 0x0A, 0x00, 0x01, 0x03, 0xFF]);
    assert_eq!(received[1], vec![0x81, 0x01, 0x06, 0x04, 0xFF]);
}

#[tokio::test]
async fn silent_camera_times_out_without_error() {
    let (addr, received) = fake_camera(Camera::Silent, Framing::Raw).await;
    let link = UdpViscaLink::connect(&addr, Framing::Raw).await.unwrap();

    let started = std::time::Instant::now();
    let delivery = link.send(&ViscaCommand::Home.encode(), Duration::from_millis(100)).await;
    assert_eq!(delivery, Ok(Delivery::TimedOut));
    assert!(started.elapsed() >= Duration::from_millis(100));

    let delivery = link.send(&ViscaCommand::Home.encode(), Duration::ZERO).await;
    assert_eq!(delivery, Ok(Delivery::TimedOut));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(received.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn visca_over_ip_frames_carry_increasing_sequence() {
    let (addr, received) = fake_camera(Camera::Replies, Framing::ViscaOverIp).await;
    let link = UdpViscaLink::connect(&addr, Framing::ViscaOverIp).await.unwrap();

    for _ in 0..3 {
        let delivery = link.send(&ViscaCommand::Home.encode(), Duration::from_millis(500)).await;
        assert!(matches!(delivery, Ok(Delivery::Acked { .. })));
    }
    let inquiry = link.send(&ViscaMessage::version_inquiry(), Duration::from_millis(500)).await;
    assert!(matches!(inquiry, Ok(Delivery::Acked { .. })));

    let received = received.lock().unwrap().clone();
    assert_eq!(received[0], vec![0x01, 0x00, 0x00, 0x05, 0, 0, 0, 0, 0x81, 0x01, 0x06, 0x04, 0xFF]);
    assert_eq!(&received[2][4..8], &[0, 0, 0, 2]);
    assert_eq!(&received[3][..4], &[0x01, 0x10, 0x00, 0x05]);
}

#[tokio::test]
async fn fifty_concurrent_moves_never_interleave() {
    let (addr, received) = fake_camera(Camera::Replies, Framing::Raw).await;
    let link = Arc::new(UdpViscaLink::connect(&addr, Framing::Raw).await.unwrap());
    let session = Arc::new(SessionManager::spawn(link.clone(), &control(200)));

    let mut handles = Vec::new();
    for i in 0..50u8 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            let pan = if i % 2 == 0 { PanDirection::Right } else { PanDirection::Left };
            let msg = ViscaCommand::pan_tilt(pan, TiltDirection::Up, i % 24 + 1, 3).unwrap().encode();
            session.send(Lane::PanTilt, msg).await
        }));
    }
    // The raw link is shared too; its own lock keeps these whole as well.
    for _ in 0..10 {
        let link = link.clone();
        handles.push(tokio::spawn(async move {
            match link.send(&ViscaCommand::Home.encode(), Duration::from_millis(200)).await {
                Ok(delivery) => Dispatch::Delivered(delivery),
                Err(e) => Dispatch::Failed(e),
            }
        }));
    }

    let mut delivered = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Dispatch::Delivered(_) => delivered += 1,
            Dispatch::Superseded => {}
            Dispatch::Failed(e) => panic!("send failed: {e}"),
        }
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), delivered);
    assert!(received.len() >= 11);
    for datagram in &received {
        match datagram.len() {
            5 => assert_eq!(datagram, &vec![0x81, 0x01, 0x06, 0x04, 0xFF]),
            9 => {
                let cmd = ViscaCommand::decode(datagram).expect("well-formed move");
                assert!(matches!(cmd, ViscaCommand::PanTilt(_)));
            }
            n => panic!("corrupted datagram of {n} bytes: {datagram:02X?}"),
        }
    }
    session.shutdown().await;
}

#[tokio::test]
async fn ping_reports_reachability() {
    let (addr, _) = fake_camera(Camera::Replies, Framing::Raw).await;
    let link = Arc::new(UdpViscaLink::connect(&addr, Framing::Raw).await.unwrap());
    let session = SessionManager::spawn(link, &control(300));

    let report = session.ping().await;
    assert!(report.reachable);
    assert!(report.rtt_ms.is_some());
    assert_eq!(session.health().reachable, Some(true));
    session.shutdown().await;

    let (addr, _) = fake_camera(Camera::Silent, Framing::Raw).await;
    let link = Arc::new(UdpViscaLink::connect(&addr, Framing::Raw).await.unwrap());
    let session = SessionManager::spawn(link, &control(100));

    let report = session.ping().await;
    assert!(!report.reachable);
    assert!(report.udp_sent);
    assert!(report.last_error.is_some());
    session.shutdown().await;
}

#[tokio::test]
async fn closed_port_does_not_break_the_session() {
    // Reserve a port, then free it so nothing listens there.
    let addr = {
        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().to_string()
    };
    let link = Arc::new(UdpViscaLink::connect(&addr, Framing::Raw).await.unwrap());
    let session = SessionManager::spawn(link, &control(100));

    for _ in 0..3 {
        let outcome = session.send(Lane::Ordered, ViscaCommand::Home.encode()).await;
        assert!(
            matches!(
                outcome,
                Dispatch::Delivered(Delivery::TimedOut) | Dispatch::Failed(_)
            ),
            "unexpected {outcome:?}"
        );
    }
    assert_ne!(session.health().reachable, Some(true));
    session.shutdown().await;
}
