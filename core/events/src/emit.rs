//! Interfaces to emit events to a notification sink.
use std::sync::Arc;

use anyhow::Result;

use authcore_context::Context;

use super::Event;

/// Emit events to the backing notification sink.
#[derive(Clone)]
pub struct Events(Arc<dyn EventsBackend>);

impl Events {
    /// Emit an event about a change to an element in the system.
    pub async fn change(&self, context: &Context, event: Event) -> Result<()> {
        self.0.change(context, event).await
    }

    /// Emit an event about a change but only log failures to do so.
    ///
    /// Change events report mutations that are already committed.
    /// Failing to report them must not fail the operation that caused them.
    pub async fn change_or_log(&self, context: &Context, event: Event) {
        let code = event.code.clone();
        if let Err(error) = self.0.change(context, event).await {
            slog::error!(
                context.logger,
                "Failed to emit change event";
                "code" => code,
                "error" => format!("{:#}", error),
            );
        }
    }
}

impl<T> From<T> for Events
where
    T: EventsBackend + 'static,
{
    fn from(value: T) -> Self {
        Events(Arc::new(value))
    }
}

/// Operations implemented by notification sinks supported by authcore.
#[async_trait::async_trait]
pub trait EventsBackend: Send + Sync {
    /// Emit an event about a change to an element in the system.
    async fn change(&self, context: &Context, event: Event) -> Result<()>;
}

/// Events emit implementation that drops all events.
///
/// Intended for embedding authcore where no events sink is available.
pub struct EventsNull;

#[async_trait::async_trait]
impl EventsBackend for EventsNull {
    async fn change(&self, _: &Context, _: Event) -> Result<()> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::{EventsFixture, EventsFixtureBackend};

#[cfg(any(test, feature = "test-fixture"))]
mod fixture {
    use std::time::Duration;

    use anyhow::Result;
    use tokio::sync::broadcast;

    use authcore_context::Context;

    use super::Event;
    use super::EventsBackend;

    /// Capacity of the fixture channel, larger than the events any single test emits.
    const FIXTURE_CAPACITY: usize = 64;

    /// Capture events emitted during unit tests so they can be inspected.
    pub struct EventsFixture {
        received: broadcast::Receiver<Event>,
        sender: broadcast::Sender<Event>,
    }

    impl EventsFixture {
        /// Create a backend that will send events to this fixture.
        pub fn backend(&self) -> EventsFixtureBackend {
            EventsFixtureBackend {
                sender: self.sender.clone(),
            }
        }

        /// Initialise an events fixture for unit tests.
        pub fn new() -> EventsFixture {
            let (sender, received) = broadcast::channel(FIXTURE_CAPACITY);
            EventsFixture { received, sender }
        }

        /// Wait for the next change [`Event`], failing if none arrives before the timeout.
        pub async fn pop_change_timeout(&mut self, timeout: Duration) -> Result<Event> {
            let event = tokio::time::timeout(timeout, self.received.recv()).await??;
            Ok(event)
        }
    }

    impl Default for EventsFixture {
        fn default() -> Self {
            EventsFixture::new()
        }
    }

    /// Events backend forwarding events to an [`EventsFixture`].
    pub struct EventsFixtureBackend {
        sender: broadcast::Sender<Event>,
    }

    #[async_trait::async_trait]
    impl EventsBackend for EventsFixtureBackend {
        async fn change(&self, context: &Context, event: Event) -> Result<()> {
            slog::trace!(context.logger, "Captured change event"; "code" => &event.code);
            self.sender.send(event)?;
            Ok(())
        }
    }
}
