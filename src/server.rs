//! # UDP Command Server
//!
//! Socket loop for the text protocol in [`crate::command`]. Runs on its own
//! thread, answering each datagram from the sampler's accessors. The `stop`
//! command raises the process-wide shutdown flag instead of exiting from
//! the server thread, so the owning process tears everything down in order.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::command::{self, Command};
use crate::sampler::SamplerHandle;

/// Default protocol port.
pub const DEFAULT_PORT: u16 = 12345;

/// Receive timeout; bounds how long shutdown can go unnoticed.
const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// A running UDP command server.
pub struct CommandServer {
    local_addr: SocketAddr,
    worker: Option<thread::JoinHandle<()>>,
}

impl CommandServer {
    /// Bind `0.0.0.0:port` and spawn the request loop.
    ///
    /// The loop exits once `shutdown` becomes true, whether raised by the
    /// `stop` command or by the owning process.
    pub fn spawn(
        port: u16,
        sampler: SamplerHandle,
        shutdown: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(POLL_TIMEOUT))?;
        let local_addr = socket.local_addr()?;

        let worker = thread::Builder::new()
            .name("udp-server".to_string())
            .spawn(move || serve(socket, sampler, shutdown))?;

        Ok(Self {
            local_addr,
            worker: Some(worker),
        })
    }

    /// The bound address; useful when spawned on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the request loop to exit.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn serve(socket: UdpSocket, sampler: SamplerHandle, shutdown: Arc<AtomicBool>) {
    let mut buffer = [0u8; 1024];
    let mut last_command: Option<Command> = None;

    while !shutdown.load(Ordering::SeqCst) {
        let (len, peer) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => {
                eprintln!("udp server: receive failed: {err}");
                continue;
            }
        };

        let text = String::from_utf8_lossy(&buffer[..len]);
        let mut cmd = command::parse(&text);

        if cmd == Command::Repeat {
            match last_command {
                Some(previous) => cmd = previous,
                None => {
                    send(&socket, peer, command::UNKNOWN_TEXT);
                    continue;
                }
            }
        } else if cmd != Command::Unknown {
            last_command = Some(cmd);
        }

        match cmd {
            Command::Help => send(&socket, peer, command::HELP_TEXT),
            Command::Count => send(&socket, peer, &command::count_reply(sampler.get_total_count())),
            Command::Length => send(
                &socket,
                peer,
                &command::length_reply(sampler.get_history_length()),
            ),
            Command::Dips => send(&socket, peer, &command::dips_reply(sampler.get_dip_count())),
            Command::History => {
                for packet in command::history_reply(&sampler.get_history()) {
                    send(&socket, peer, &packet);
                }
            }
            Command::Stop => {
                send(&socket, peer, command::STOPPING_TEXT);
                shutdown.store(true, Ordering::SeqCst);
            }
            Command::Unknown => send(&socket, peer, command::UNKNOWN_TEXT),
            Command::Repeat => unreachable!("repeat resolved above"),
        }
    }
}

fn send(socket: &UdpSocket, peer: SocketAddr, text: &str) {
    if let Err(err) = socket.send_to(text.as_bytes(), peer) {
        eprintln!("udp server: send to {peer} failed: {err}");
    }
}
