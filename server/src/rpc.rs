//! Outbound side of the RPC channel.
//!
//! Handlers never touch sockets. They push [`Outbound`] work items and the
//! network layer delivers them, so a slow peer cannot stall the server loop.

use log::error;
use shared::ClientBound;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Send { to: u32, message: ClientBound },
    Broadcast { message: ClientBound },
    /// Drop the peer from the transport once earlier items are delivered.
    Terminate { id: u32 },
}

pub trait RpcChannel {
    fn push(&mut self, outbound: Outbound);

    fn send(&mut self, to: u32, message: ClientBound) {
        self.push(Outbound::Send { to, message });
    }

    fn broadcast(&mut self, message: ClientBound) {
        self.push(Outbound::Broadcast { message });
    }

    fn terminate(&mut self, id: u32) {
        self.push(Outbound::Terminate { id });
    }
}

impl RpcChannel for mpsc::UnboundedSender<Outbound> {
    fn push(&mut self, outbound: Outbound) {
        if let Err(e) = mpsc::UnboundedSender::send(self, outbound) {
            error!("Failed to queue outbound message: {}", e);
        }
    }
}

/// Collects outbound work in memory; handy for driving the server headless.
impl RpcChannel for Vec<Outbound> {
    fn push(&mut self, outbound: Outbound) {
        Vec::push(self, outbound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_channel_records_in_order() {
        let mut channel: Vec<Outbound> = Vec::new();
        channel.send(4, ClientBound::BeginAuth);
        channel.broadcast(ClientBound::BeginAuth);
        channel.terminate(4);

        assert_eq!(
            channel,
            vec![
                Outbound::Send {
                    to: 4,
                    message: ClientBound::BeginAuth
                },
                Outbound::Broadcast {
                    message: ClientBound::BeginAuth
                },
                Outbound::Terminate { id: 4 },
            ]
        );
    }

    #[test]
    fn test_mpsc_channel_forwards() {
        let (mut tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
        tx.terminate(2);

        assert_eq!(rx.try_recv().unwrap(), Outbound::Terminate { id: 2 });
    }

    #[test]
    fn test_closed_mpsc_channel_does_not_panic() {
        let (mut tx, rx) = mpsc::unbounded_channel::<Outbound>();
        drop(rx);
        RpcChannel::send(&mut tx, 1, ClientBound::BeginAuth);
    }
}
