use std::{
    io::{ErrorKind, Read, Write},
    net::{SocketAddr, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use ember_server::{Config, Server};

fn spawn_server(mut cfg: Config) -> (SocketAddr, Arc<AtomicBool>, thread::JoinHandle<()>) {
    cfg.bind = SocketAddr::from(([127, 0, 0, 1], 0));
    cfg.loop_timeout_ms = 10;
    let mut server = Server::bind(&cfg).expect("failed to bind server");
    let addr = server.local_addr().expect("failed to fetch local addr");
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let handle = thread::spawn(move || server.run(&flag));
    (addr, shutdown, handle)
}

fn encode_cmd(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", parts.len()).into_bytes();
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part);
        out.extend_from_slice(b"\r\n");
    }
    out
}

#[test]
fn oversized_outbound_buffer_closes_the_connection() {
    let cfg = Config { max_outbound_bytes: 1024, ..Config::default() };
    let (addr, shutdown, handle) = spawn_server(cfg);

    let mut client = TcpStream::connect(addr).expect("failed to connect");
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    // Build a list whose full LRANGE reply far exceeds the 1 KiB cap.
    let item = vec![b'x'; 64];
    let mut parts: Vec<&[u8]> = vec![b"RPUSH", b"big"];
    for _ in 0..200 {
        parts.push(&item);
    }
    client.write_all(&encode_cmd(&parts)).unwrap();
    let mut reply = [0u8; 6];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b":200\r\n");

    // The reply to this would be ~14 KiB of bulk strings; the server must
    // drop the connection rather than queue it.
    client.write_all(&encode_cmd(&[b"LRANGE", b"big", b"0", b"-1"])).unwrap();

    let mut buf = [0u8; 4096];
    let closed = loop {
        match client.read(&mut buf) {
            Ok(0) => break true,
            Ok(_) => {}
            Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                break false;
            }
            Err(_) => break true,
        }
    };
    assert!(closed, "server kept a connection whose outbound exceeded the cap");

    // The keyspace survives; a fresh connection still works.
    let mut fresh = TcpStream::connect(addr).expect("failed to reconnect");
    fresh.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    fresh.write_all(&encode_cmd(&[b"LLEN", b"big"])).unwrap();
    let mut reply = [0u8; 6];
    fresh.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b":200\r\n");

    shutdown.store(true, Ordering::Relaxed);
    handle.join().expect("server thread panicked");
}

#[test]
fn generous_limit_lets_large_replies_through() {
    let (addr, shutdown, handle) = spawn_server(Config::default());

    let mut client = TcpStream::connect(addr).expect("failed to connect");
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let item = vec![b'y'; 64];
    let mut parts: Vec<&[u8]> = vec![b"RPUSH", b"big"];
    for _ in 0..200 {
        parts.push(&item);
    }
    client.write_all(&encode_cmd(&parts)).unwrap();
    let mut reply = [0u8; 6];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b":200\r\n");

    client.write_all(&encode_cmd(&[b"LRANGE", b"big", b"0", b"-1"])).unwrap();
    // 200 entries of `$64\r\n<64 bytes>\r\n` behind the `*200\r\n` header.
    let expected_len = "*200\r\n".len() + 200 * ("$64\r\n".len() + 64 + 2);
    let mut body = vec![0u8; expected_len];
    client.read_exact(&mut body).expect("large reply was cut short");
    assert!(body.starts_with(b"*200\r\n"));
    assert!(body.ends_with(b"\r\n"));

    shutdown.store(true, Ordering::Relaxed);
    handle.join().expect("server thread panicked");
}
