use async_trait::async_trait;
use tokio::sync::{
    Mutex,
    mpsc::{Receiver, Sender, channel},
};

use crate::helpers::{Error, Message, Role, Transport};

/// In-memory implementation of [`Transport`] backed by Tokio mpsc channels.
/// Dropping one end makes every pending and future `receive` on the other end fail with
/// [`Error::PeerDisconnected`].
#[derive(Debug)]
pub struct InMemoryTransport {
    identity: Role,
    tx: Sender<Message>,
    rx: Mutex<Receiver<Message>>,
}

impl InMemoryTransport {
    /// Creates two connected transports, indexed by [`Role`].
    #[must_use]
    pub fn pair(capacity: usize) -> [InMemoryTransport; 2] {
        let (publisher_tx, partner_rx) = channel(capacity);
        let (partner_tx, publisher_rx) = channel(capacity);

        [
            InMemoryTransport {
                identity: Role::Publisher,
                tx: publisher_tx,
                rx: Mutex::new(publisher_rx),
            },
            InMemoryTransport {
                identity: Role::Partner,
                tx: partner_tx,
                rx: Mutex::new(partner_rx),
            },
        ]
    }

    fn check_peer(&self, peer: Role) -> Result<(), Error> {
        if peer == self.identity {
            Err(Error::SelfAddressed {
                from: self.identity,
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn identity(&self) -> Role {
        self.identity
    }

    async fn send(&self, to: Role, message: Message) -> Result<(), Error> {
        self.check_peer(to)?;
        tracing::trace!("{:?} sending {} to {to:?}", self.identity, message.tag);
        self.tx
            .send(message)
            .await
            .map_err(|_| Error::PeerDisconnected)
    }

    async fn receive(&self, from: Role) -> Result<Message, Error> {
        self.check_peer(from)?;
        let message = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::PeerDisconnected)?;
        tracing::trace!("{:?} received {} from {from:?}", self.identity, message.tag);
        Ok(message)
    }
}
