use futures::future::BoxFuture;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpSocket, TcpStream};

/// Future returned by [`Connect::connect`].
pub type Connecting = BoxFuture<'static, io::Result<TcpStream>>;

/// The raw stream-connect primitive under the dialer.
///
/// One call is one connection attempt to one socket address. The dialer
/// owns deadlines and cancellation: it drops the returned future when the
/// attempt is abandoned, and dropping must release any half-open socket.
pub trait Connect: Send + Sync {
    fn connect(&self, addr: SocketAddr, local: Option<IpAddr>) -> Connecting;
}

impl<C: Connect + ?Sized> Connect for Arc<C> {
    fn connect(&self, addr: SocketAddr, local: Option<IpAddr>) -> Connecting {
        (**self).connect(addr, local)
    }
}

/// Plain TCP connect through the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    fn connect(&self, addr: SocketAddr, local: Option<IpAddr>) -> Connecting {
        Box::pin(async move {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            if let Some(ip) = local {
                socket.bind(SocketAddr::new(ip, 0))?;
            }
            socket.connect(addr).await
        })
    }
}
