// src/interface/position.rs
// Position feed from the localization subsystem. Fixes arrive as text
// datagrams `x, y, z[, yaw]`; a pump thread forwards them into the guidance
// session and leaves the last known fix in place when none arrives.

use crate::guidance::{PositionFix, PositionHandle, StopSignal};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Source of position fixes
#[cfg_attr(test, mockall::automock)]
pub trait PositionFeed {
    /// Wait up to `timeout` for the next fix; `None` if none arrived
    fn next_fix(&mut self, timeout: Duration) -> Option<PositionFix>;
}

/// Parse `x, y, z[, yaw]` (commas and/or whitespace, optional parentheses)
pub fn parse_fix(text: &str) -> Option<PositionFix> {
    let values: Vec<f64> = text
        .split(|c: char| c == ',' || c.is_whitespace() || c == '(' || c == ')')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;

    let fix = match values.as_slice() {
        [x, y, z] => PositionFix::new(*x, *y, *z, 0.0),
        [x, y, z, yaw] => PositionFix::new(*x, *y, *z, *yaw),
        _ => return None,
    };
    fix.is_finite().then_some(fix)
}

/// In-process feed backed by a channel
pub struct ChannelPositionFeed {
    rx: Receiver<PositionFix>,
}

impl ChannelPositionFeed {
    /// Wrap a receiver of fixes
    pub fn new(rx: Receiver<PositionFix>) -> Self {
        ChannelPositionFeed { rx }
    }
}

impl PositionFeed for ChannelPositionFeed {
    fn next_fix(&mut self, timeout: Duration) -> Option<PositionFix> {
        match self.rx.recv_timeout(timeout) {
            Ok(fix) => Some(fix),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // Keep the caller's cadence instead of spinning on a dead channel
                std::thread::sleep(timeout);
                None
            }
        }
    }
}

/// Feed reading text datagrams from a UDP socket
pub struct UdpPositionFeed {
    socket: UdpSocket,
    buf: [u8; 1024],
}

impl UdpPositionFeed {
    /// Bind to `address`, e.g. `127.0.0.1:5000`
    pub fn bind(address: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(address)?;
        info!("Waiting for position fixes on {}", socket.local_addr()?);
        Ok(UdpPositionFeed {
            socket,
            buf: [0; 1024],
        })
    }

    /// Bound local address
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }
}

impl PositionFeed for UdpPositionFeed {
    fn next_fix(&mut self, timeout: Duration) -> Option<PositionFix> {
        // A zero timeout would make the socket block forever
        let timeout = timeout.max(Duration::from_millis(1));
        if let Err(e) = self.socket.set_read_timeout(Some(timeout)) {
            warn!("Cannot set position socket timeout: {}", e);
            return None;
        }

        let len = match self.socket.recv_from(&mut self.buf) {
            Ok((len, _)) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return None
            }
            Err(e) => {
                warn!("Position socket error: {}", e);
                return None;
            }
        };

        let text = String::from_utf8_lossy(&self.buf[..len]);
        let fix = parse_fix(&text);
        if fix.is_none() {
            warn!("Ignoring malformed position datagram {:?}", text.trim());
        }
        fix
    }
}

/// Forward fixes from `feed` into the session until `stop` fires.
///
/// A missing fix leaves the session's last known position untouched.
pub fn spawn_position_pump<F>(
    mut feed: F,
    handle: PositionHandle,
    stop: Arc<StopSignal>,
    timeout: Duration,
) -> JoinHandle<()>
where
    F: PositionFeed + Send + 'static,
{
    std::thread::spawn(move || {
        while !stop.is_stopped() {
            match feed.next_fix(timeout) {
                Some(fix) => {
                    debug!(
                        "Position fix ({:.2}, {:.2}, {:.2}) heading {:.1}",
                        fix.position.x, fix.position.y, fix.position.z, fix.orientation
                    );
                    handle.update(fix);
                }
                None => debug!("No position fix within {:?}", timeout),
            }
        }
        debug!("Position pump stopped");
    })
}
