use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted by the services. Consumed by a background task
/// that currently only logs them; downstream integrations hang off here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        total_amount: Decimal,
    },
    PaymentRecorded {
        payment_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },
    PaymentSucceeded {
        order_id: Uuid,
    },
    PaymentFailed {
        order_id: Uuid,
    },
    CartUpdated {
        cart_id: Uuid,
    },
    ReviewCreated {
        product_id: Uuid,
        rating: i16,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Delivery is best-effort; callers
    /// log and continue on failure.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {}", e))
    }
}

/// Creates a connected sender/processor pair.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Background consumer for domain events.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "domain event");
    }
    info!("event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = channel(8);
        sender
            .send(Event::PaymentSucceeded {
                order_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Event::PaymentSucceeded { .. })
        ));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (sender, rx) = channel(1);
        drop(rx);
        let result = sender
            .send(Event::CartUpdated {
                cart_id: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_err());
    }
}
