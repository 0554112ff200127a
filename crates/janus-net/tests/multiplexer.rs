//! Multiplexer command handling over a real loopback socket: dead-session
//! commands, close-notification convergence, and the session cipher driven
//! through the frame protocol.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use aes::Aes128;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, generic_array::GenericArray};
use janus_codec::WireWrite;
use janus_link::{Frame, MainLink};
use janus_net::NetworkService;

const DEADLINE: Duration = Duration::from_secs(5);

fn spawn_service() -> (MainLink, NetworkService) {
    let (main_link, net_link) = janus_link::link();
    let service = NetworkService::spawn("127.0.0.1:0".parse().unwrap(), net_link).unwrap();
    (main_link, service)
}

fn wait_frame(link: &MainLink) -> Frame {
    let deadline = Instant::now() + DEADLINE;
    loop {
        if let Some(frame) = link.poll() {
            return frame.unwrap();
        }
        assert!(Instant::now() < deadline, "timed out waiting for a frame");
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Asserts nothing further arrives across several multiplexer poll cycles.
fn assert_quiet(link: &MainLink) {
    std::thread::sleep(Duration::from_millis(200));
    assert!(link.poll().is_none(), "unexpected extra frame");
}

fn open_client(link: &MainLink, service: &NetworkService) -> (TcpStream, u32) {
    let stream = TcpStream::connect(service.local_addr()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(10)))
        .unwrap();
    let Frame::OpenSession { session, .. } = wait_frame(link) else {
        panic!("expected an open notification");
    };
    (stream, session)
}

#[test]
fn command_for_a_dead_session_replies_with_exactly_one_close() {
    let (main_link, service) = spawn_service();

    main_link.send(&Frame::SendPacket {
        session: 99,
        body: vec![1, 2, 3],
    });
    assert_eq!(wait_frame(&main_link), Frame::CloseSession { session: 99 });
    assert_quiet(&main_link);

    main_link.send(&Frame::SetCompression {
        session: 42,
        threshold: 64,
    });
    assert_eq!(wait_frame(&main_link), Frame::CloseSession { session: 42 });

    main_link.send(&Frame::EnableEncryption {
        session: 7,
        secret: vec![0u8; 16],
    });
    assert_eq!(wait_frame(&main_link), Frame::CloseSession { session: 7 });
    assert_quiet(&main_link);

    main_link.send(&Frame::Shutdown);
    service.join();
}

#[test]
fn peer_close_notifies_exactly_once() {
    let (main_link, service) = spawn_service();
    let (stream, session) = open_client(&main_link, &service);

    drop(stream);
    assert_eq!(wait_frame(&main_link), Frame::CloseSession { session });
    assert_quiet(&main_link);

    // A late close command for the already-removed id converges on one echo
    // and nothing else.
    main_link.send(&Frame::CloseSession { session });
    assert_eq!(wait_frame(&main_link), Frame::CloseSession { session });
    assert_quiet(&main_link);

    main_link.send(&Frame::Shutdown);
    service.join();
}

#[test]
fn enable_encryption_ciphers_both_directions() {
    type Cfb8Encryptor = cfb8::Encryptor<Aes128>;
    type Cfb8Decryptor = cfb8::Decryptor<Aes128>;

    let (main_link, service) = spawn_service();
    let (mut stream, session) = open_client(&main_link, &service);

    let secret = [0x42u8; 16];
    let mut encryptor = Cfb8Encryptor::new_from_slices(&secret, &secret).unwrap();
    let mut decryptor = Cfb8Decryptor::new_from_slices(&secret, &secret).unwrap();

    main_link.send(&Frame::EnableEncryption {
        session,
        secret: secret.to_vec(),
    });

    // Server to client: the framed packet arrives ciphered and decrypts
    // back to the plaintext body.
    let body = vec![0x0F, b'h', b'i'];
    main_link.send(&Frame::SendPacket {
        session,
        body: body.clone(),
    });

    let mut expected = Vec::new();
    expected.put_varint(body.len() as u32);
    expected.extend_from_slice(&body);

    let mut wire = vec![0u8; expected.len()];
    let deadline = Instant::now() + DEADLINE;
    let mut filled = 0;
    while filled < wire.len() {
        assert!(Instant::now() < deadline, "timed out reading the packet");
        match stream.read(&mut wire[filled..]) {
            Ok(0) => panic!("server closed the connection"),
            Ok(n) => filled += n,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => panic!("read failed: {e}"),
        }
    }
    assert_ne!(wire, expected);
    for byte in &mut wire {
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
    }
    assert_eq!(wire, expected);

    // Client to server: a ciphered frame comes back as a plaintext body.
    let inbound = vec![0x02, 9, 9, 9];
    let mut frame = Vec::new();
    frame.put_varint(inbound.len() as u32);
    frame.extend_from_slice(&inbound);
    for byte in &mut frame {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
    }
    stream.write_all(&frame).unwrap();

    assert_eq!(
        wait_frame(&main_link),
        Frame::RecvPacket {
            session,
            body: inbound,
        }
    );

    main_link.send(&Frame::Shutdown);
    service.join();
}
