//! Eventos de ruta para notificaciones
//!
//! Las transiciones publican eventos "fire-and-forget" en un canal; el envío
//! real (email, push) es de un colaborador externo. El worker incluido solo
//! los registra en el log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouteEvent {
    Started {
        route_id: Uuid,
        at: DateTime<Utc>,
    },
    Completed {
        route_id: Uuid,
        at: DateTime<Utc>,
        actual_duration_seconds: i64,
    },
    Cancelled {
        route_id: Uuid,
        at: DateTime<Utc>,
    },
    Optimized {
        route_id: Uuid,
        at: DateTime<Utc>,
        distance_saved: Decimal,
    },
}

impl RouteEvent {
    pub fn route_id(&self) -> Uuid {
        match self {
            RouteEvent::Started { route_id, .. }
            | RouteEvent::Completed { route_id, .. }
            | RouteEvent::Cancelled { route_id, .. }
            | RouteEvent::Optimized { route_id, .. } => *route_id,
        }
    }
}

/// Publicador de eventos; clonarlo es barato
#[derive(Clone, Debug)]
pub struct EventPublisher {
    sender: mpsc::UnboundedSender<RouteEvent>,
}

impl EventPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RouteEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Nunca bloquea ni falla hacia el llamador
    pub fn publish(&self, event: RouteEvent) {
        let route_id = event.route_id();
        if self.sender.send(event).is_err() {
            tracing::warn!("⚠️ Canal de notificaciones cerrado, evento de ruta {} descartado", route_id);
        }
    }
}

/// Worker que consume los eventos de ruta
pub fn spawn_notification_worker(mut receiver: mpsc::UnboundedReceiver<RouteEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("📨 Worker de notificaciones iniciado");
        while let Some(event) = receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => tracing::info!("📨 Evento de ruta: {}", payload),
                Err(e) => tracing::error!("❌ No se pudo serializar evento {:?}: {}", event, e),
            }
        }
        tracing::info!("📭 Worker de notificaciones detenido");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_receiver() {
        let (publisher, mut receiver) = EventPublisher::channel();
        let route_id = Uuid::new_v4();
        let at = Utc::now();

        publisher.publish(RouteEvent::Started { route_id, at });

        let event = receiver.recv().await.unwrap();
        assert_eq!(event, RouteEvent::Started { route_id, at });
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped_does_not_panic() {
        let (publisher, receiver) = EventPublisher::channel();
        drop(receiver);
        publisher.publish(RouteEvent::Cancelled {
            route_id: Uuid::new_v4(),
            at: Utc::now(),
        });
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = RouteEvent::Cancelled {
            route_id: Uuid::nil(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "cancelled");
    }
}
