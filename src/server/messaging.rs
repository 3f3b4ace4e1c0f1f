use std::sync::Arc;

use tokio::sync::mpsc;

use super::GameServer;
use crate::metrics::ServerMetrics;
use crate::protocol::{AckFrame, ConnId, Outbound, ServerEvent};
use crate::room::Room;

impl GameServer {
    /// Queue a frame on a connection's writer. Non-blocking: a full queue
    /// drops the frame for that connection and counts it; a slow client
    /// never stalls a room operation.
    pub(crate) fn send_to_sender(&self, sender: &mpsc::Sender<Outbound>, frame: Outbound) {
        if sender.try_send(frame).is_err() {
            ServerMetrics::increment(&self.metrics.frames_dropped);
            tracing::warn!("Outbound queue full or closed; frame dropped");
        }
    }

    pub(crate) fn send_ack(&self, conn_id: ConnId, ack: AckFrame) {
        if let Some(handle) = self.handle_of(conn_id) {
            self.send_to_sender(&handle.sender, Outbound::Ack(ack));
        }
    }

    /// Out-of-band error for frames that carry no ack correlation.
    pub(crate) fn send_error_to_conn(&self, conn_id: ConnId, message: &str) {
        if let Some(handle) = self.handle_of(conn_id) {
            self.send_to_sender(
                &handle.sender,
                Outbound::Event(Arc::new(ServerEvent::RoomError {
                    message: message.to_string(),
                })),
            );
        }
    }

    /// Deliver an event to every live connection of one user (multi-tab
    /// fan-out).
    pub(crate) fn send_event_to_user(&self, user_id: &str, event: Arc<ServerEvent>) {
        for conn_id in self.presence().connections_of(user_id) {
            if let Some(handle) = self.handle_of(conn_id) {
                self.send_to_sender(&handle.sender, Outbound::Event(Arc::clone(&event)));
            }
        }
    }

    /// Fan an event out to both seats of a room. Callers hold the room lock,
    /// which fixes the delivery order all subscribers observe.
    pub(crate) fn broadcast_to_room(&self, room: &Room, event: Arc<ServerEvent>) {
        for seat in room.players() {
            self.send_event_to_user(&seat.user_id, Arc::clone(&event));
        }
    }

    /// Push the current global online list to every connection.
    pub(crate) fn broadcast_online(&self) {
        let event = Arc::new(ServerEvent::PresenceOnline(self.presence().online_users()));
        for entry in self.connections.iter() {
            self.send_to_sender(&entry.value().sender, Outbound::Event(Arc::clone(&event)));
        }
    }
}
