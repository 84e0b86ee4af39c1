//! Room registry: room id → running room actor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use skirmish_engine::{ConnectionId, MatchConfig};
use skirmish_protocol::{PlayerId, RoomId};

use crate::actor::spawn_room;
use crate::{PlayerSender, ResultSink, RoomError, RoomHandle, RoomInfo};

/// Settings applied to every room the registry spawns.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub match_config: MatchConfig,
    /// Upper bound on the random offset of each room's first sweep.
    pub sweep_jitter: Duration,
    /// Command channel capacity per room.
    pub channel_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::default(),
            sweep_jitter: Duration::from_millis(50),
            channel_size: 64,
        }
    }
}

/// Tracks every live room.
///
/// Rooms are created by the first join to an unknown id and close
/// themselves once every seat is permanently vacated; the registry drops
/// their handles lazily.
pub struct RoomRegistry<S: ResultSink> {
    rooms: HashMap<RoomId, RoomHandle>,
    config: RegistryConfig,
    sink: Arc<S>,
}

impl<S: ResultSink> RoomRegistry<S> {
    pub fn new(config: RegistryConfig, sink: S) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            sink: Arc::new(sink),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the live room for `room_id`, spawning one if needed.
    ///
    /// Handles of rooms that have stopped since the last call are dropped
    /// first, so the map only outgrows the live rooms until the next join.
    pub fn get_or_create(&mut self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        if !room_id.is_valid() {
            return Err(RoomError::InvalidRoomId(room_id.as_str().to_owned()));
        }
        self.prune();
        if let Some(handle) = self.rooms.get(room_id) {
            return Ok(handle.clone());
        }

        let handle = spawn_room(
            room_id.clone(),
            self.config.match_config.clone(),
            self.config.sweep_jitter,
            Arc::clone(&self.sink),
            self.config.channel_size,
        );
        self.rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        Ok(handle)
    }

    /// Seats `player_id` in `room_id`, creating the room on first use.
    ///
    /// A room that stops between lookup and join is replaced once.
    pub async fn join(
        &mut self,
        room_id: &RoomId,
        player_id: PlayerId,
        connection: ConnectionId,
        name: Option<String>,
        team: Option<String>,
        sender: PlayerSender,
    ) -> Result<RoomHandle, RoomError> {
        let handle = self.get_or_create(room_id)?;
        match handle
            .join(player_id, connection, name.clone(), team.clone(), sender.clone())
            .await
        {
            Err(RoomError::Unavailable(_)) => {
                self.rooms.remove(room_id);
                let handle = self.get_or_create(room_id)?;
                handle.join(player_id, connection, name, team, sender).await?;
                Ok(handle)
            }
            Err(err) => Err(err),
            Ok(()) => Ok(handle),
        }
    }

    /// The live room for `room_id`, if any.
    pub fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).filter(|h| !h.is_closed()).cloned()
    }

    pub async fn info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        handle.get_info().await
    }

    /// Drops handles of rooms whose actor has stopped. Returns how many.
    pub fn prune(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, h| !h.is_closed());
        let pruned = before - self.rooms.len();
        if pruned > 0 {
            tracing::debug!(pruned, rooms = self.rooms.len(), "pruned closed rooms");
        }
        pruned
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.values().filter(|h| !h.is_closed()).count()
    }

    /// Ids of live rooms, sorted.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, h)| !h.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Stops every room and forgets them all.
    pub async fn shutdown_all(&mut self) {
        let count = self.rooms.len();
        for (_, handle) in self.rooms.drain() {
            let _ = handle.shutdown().await;
        }
        tracing::info!(rooms = count, "all rooms shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::MemorySink;

    fn registry() -> RoomRegistry<MemorySink> {
        RoomRegistry::new(
            RegistryConfig {
                sweep_jitter: Duration::ZERO,
                ..RegistryConfig::default()
            },
            MemorySink::new(),
        )
    }

    async fn seat(registry: &mut RoomRegistry<MemorySink>, id: &str, player: u64) -> RoomHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        registry
            .join(&RoomId::new(id), PlayerId(player), ConnectionId(player), None, None, tx)
            .await
            .unwrap()
    }

    async fn join_and_leave(registry: &mut RoomRegistry<MemorySink>, id: &str, player: u64) {
        let handle = seat(registry, id, player).await;
        handle
            .leave(PlayerId(player), ConnectionId(player))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_rooms_are_dropped_on_next_lookup() {
        let mut registry = registry();
        let mut seated = Vec::new();
        for (player, id) in [(1, "a"), (2, "b"), (3, "c")] {
            seated.push((player, seat(&mut registry, id, player).await));
        }
        for (player, handle) in seated {
            handle
                .leave(PlayerId(player), ConnectionId(player))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(registry.room_count(), 0);
        assert_eq!(registry.rooms.len(), 3);

        registry.get_or_create(&RoomId::new("d")).unwrap();
        assert_eq!(registry.rooms.len(), 1);
        assert_eq!(registry.room_ids(), vec![RoomId::new("d")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_forgets_every_stopped_room() {
        let mut registry = registry();
        join_and_leave(&mut registry, "solo", 7).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(registry.prune(), 1);
        assert!(registry.rooms.is_empty());
        assert_eq!(registry.prune(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_room_id_is_reusable() {
        let mut registry = registry();
        join_and_leave(&mut registry, "again", 1).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = registry
            .join(&RoomId::new("again"), PlayerId(2), ConnectionId(2), None, None, tx)
            .await
            .unwrap();
        assert!(!handle.is_closed());
        assert_eq!(registry.rooms.len(), 1);
    }
}
