use std::{future::Future, sync::Arc};

use crate::{
    config::AttributionConfig,
    helpers::{InMemoryTransport, Role, Transport},
    protocol::engine::EngineSetup,
    test_fixture::logging,
};

#[derive(Clone, Debug)]
pub struct TestWorldConfig {
    /// Capacity of the in-memory channel in each direction, in messages.
    pub channel_capacity: usize,
}

impl Default for TestWorldConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
        }
    }
}

impl From<&AttributionConfig> for TestWorldConfig {
    fn from(config: &AttributionConfig) -> Self {
        Self {
            channel_capacity: config.channel_capacity,
        }
    }
}

/// Two parties connected by an in-memory channel. Every run gets a fresh channel, so a world can
/// be reused for several runs.
#[derive(Debug, Default)]
pub struct TestWorld {
    config: TestWorldConfig,
}

impl TestWorld {
    #[must_use]
    pub fn new_with(config: TestWorldConfig) -> Self {
        Self { config }
    }

    /// Runs `f` for both parties, each on its own task with its own transport. Results are
    /// indexed by [`Role`].
    ///
    /// ## Panics
    /// If either task panics.
    pub async fn run_with_transport<F, Fut, R>(&self, f: F) -> [R; 2]
    where
        F: Fn(Arc<dyn Transport>, Role) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        logging::setup();
        let [publisher, partner] =
            InMemoryTransport::pair(self.config.channel_capacity).map(|transport| {
                let f = f.clone();
                tokio::spawn(async move {
                    let role = transport.identity();
                    f(Arc::new(transport) as Arc<dyn Transport>, role).await
                })
            });
        let (publisher, partner) = tokio::join!(publisher, partner);
        [publisher.unwrap(), partner.unwrap()]
    }

    /// Sets up an engine of type `E` for both parties and runs `f` with it.
    ///
    /// ## Panics
    /// If engine setup fails or either task panics.
    pub async fn run<E, F, Fut, R>(&self, f: F) -> [R; 2]
    where
        E: EngineSetup + 'static,
        F: Fn(E, Role) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.run_with_transport(move |transport, role| {
            let f = f.clone();
            async move {
                let engine = E::setup(transport).await.unwrap();
                f(engine, role).await
            }
        })
        .await
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use super::{TestWorld, TestWorldConfig};
    use crate::{
        config::AttributionConfig,
        helpers::Role,
        protocol::engine::{EagerEngine, LazyEngine, SecureEngine},
        secret_sharing::Lanes,
    };

    #[tokio::test]
    async fn small_channels() {
        let config = AttributionConfig {
            channel_capacity: 1,
            ..AttributionConfig::default()
        };
        let world = TestWorld::new_with(TestWorldConfig::from(&config));
        assert_eq!(1, world.config.channel_capacity);
        // every message waits for the peer, nothing can be buffered ahead
        let opened = world
            .run(|engine: EagerEngine, role| async move {
                let input = if role == Role::Publisher {
                    vec![Lanes::repeat(true, 3); 4]
                } else {
                    Vec::new()
                };
                let shared = engine.share(Role::Publisher, &input, 4, 3).await.unwrap();
                let and = engine.multiply(&shared[..2], &shared[2..]).await.unwrap();
                engine.open_to_party(&and, Role::Partner).await.unwrap()
            })
            .await;
        assert_eq!(Some(vec![Lanes::repeat(true, 3); 2]), opened[1]);
    }

    #[tokio::test]
    async fn roles() {
        let roles = TestWorld::default()
            .run(|engine: LazyEngine, role| async move {
                assert_eq!(role, engine.role());
                role
            })
            .await;
        assert_eq!([Role::Publisher, Role::Partner], roles);
    }
}
