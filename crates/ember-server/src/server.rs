use std::{
    io,
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use ember_store::Keyspace;
use mio::{Events, Interest, Poll, Token, event::Event, net::TcpListener};
use tracing::{debug, error, info, warn};

use crate::{
    Config,
    conn::{ConnState, Connection},
    dispatch,
    listener::bind_reuseport,
    repeater::Repeater,
};

const LISTENER: Token = Token(0);

/// The single-threaded reactor.
///
/// One poll multiplexes the listener and every client connection; all
/// keyspace mutation happens on the thread driving [`run`]. The only
/// blocking point is the bounded readiness wait, which doubles as the
/// active-expiration cadence.
///
/// [`run`]: Server::run
pub struct Server {
    events: Events,
    loop_timeout: Duration,
    reactor: Reactor,
}

struct Reactor {
    poll: Poll,
    listener: TcpListener,
    conns: Vec<Connection>,
    next_token: usize,
    keyspace: Keyspace,
    ttl_sample_size: usize,
    max_outbound_bytes: usize,
    expire_pass: Repeater,
}

impl Server {
    /// Binds the listener and registers it with a fresh poll.
    pub fn bind(cfg: &Config) -> io::Result<Self> {
        let mut listener = bind_reuseport(cfg.bind)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            events: Events::with_capacity(128),
            reactor: Reactor {
                poll,
                listener,
                conns: Vec::new(),
                next_token: LISTENER.0 + 1,
                keyspace: Keyspace::with_node_cap(cfg.quicklist_node_cap),
                ttl_sample_size: cfg.ttl_sample_size,
                max_outbound_bytes: cfg.max_outbound_bytes,
                expire_pass: Repeater::every(Duration::from_millis(cfg.loop_timeout_ms)),
            },
            loop_timeout: Duration::from_millis(cfg.loop_timeout_ms),
        })
    }

    /// Actual bound address, for callers that bound port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.reactor.listener.local_addr()
    }

    /// Drives the loop until `shutdown` is raised. Poll failures other than
    /// EINTR are fatal.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(err) = self.turn() {
                error!(%err, "poll failed");
                break;
            }
        }
        info!("reactor stopped");
    }

    fn turn(&mut self) -> io::Result<()> {
        match self.reactor.poll.poll(&mut self.events, Some(self.loop_timeout)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            self.reactor.handle_event(event);
        }

        self.reactor.maybe_expire();
        Ok(())
    }
}

impl Reactor {
    fn handle_event(&mut self, event: &Event) {
        if event.token() == LISTENER {
            self.accept_ready();
            return;
        }

        // Events may straggle in for a token closed earlier in this batch.
        let Some(i) = self.conns.iter().position(|c| c.token() == event.token()) else {
            debug!(token = ?event.token(), "event for unknown token");
            return;
        };
        self.service(i, event);
    }

    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!(%err, "set_nodelay");
                    }
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(err) =
                        self.poll.registry().register(&mut stream, token, Interest::READABLE)
                    {
                        error!(%err, "couldn't register client");
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                        continue;
                    }
                    info!(%addr, "client connected");
                    self.conns.push(Connection::new(stream, token, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) => {
                    warn!(%err, "accept failed");
                    return;
                }
            }
        }
    }

    fn service(&mut self, i: usize, event: &Event) {
        let conn = &mut self.conns[i];
        let keyspace = &mut self.keyspace;
        let registry = self.poll.registry();
        let mut state = ConnState::Alive;

        if event.is_readable() {
            state = conn.read_ready(&mut |command, outbound| {
                dispatch::execute(&command, keyspace, Instant::now(), outbound);
            });
        }

        // Back-pressure: a consumer that let this many reply bytes pile up
        // is cut off before the buffer grows further.
        if state == ConnState::Alive && conn.pending_bytes() > self.max_outbound_bytes {
            warn!(
                peer = %conn.peer_addr(),
                pending = conn.pending_bytes(),
                limit = self.max_outbound_bytes,
                "outbound buffer over limit, closing"
            );
            state = ConnState::Disconnected;
        }

        // Replies are written eagerly; WRITABLE stays armed only while a
        // remainder is queued.
        if state == ConnState::Alive && (event.is_writable() || conn.pending_bytes() > 0) {
            state = conn.flush(registry);
        }

        if state == ConnState::Disconnected {
            self.close_at(i);
        }
    }

    fn close_at(&mut self, i: usize) {
        let mut conn = self.conns.swap_remove(i);
        conn.close(self.poll.registry());
    }

    fn maybe_expire(&mut self) {
        if self.expire_pass.fired() {
            self.keyspace.active_expire(self.ttl_sample_size, Instant::now());
        }
    }
}
