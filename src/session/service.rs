//! Session service - routes connection events to lobbies

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::error::LobbyError;
use crate::game::registry::{LobbyRegistry, SharedLobby};
use crate::game::respawn::RespawnQueue;
use crate::game::snapshot::SnapshotBuilder;
use crate::util::time::unix_millis;
use crate::ws::hub::Hub;
use crate::ws::protocol::{
    ClientMsg, GameStateSnapshot, LobbyReply, LobbyState, PlayerUpdate, ServerMsg, ShootRequest,
    StartRaceRequest, StateUpdate,
};

use super::directory::{SessionDirectory, SessionEntry};

/// Handles every inbound client event
pub struct SessionService {
    registry: Arc<LobbyRegistry>,
    directory: SessionDirectory,
    hub: Arc<Hub>,
    respawns: Arc<RespawnQueue>,
}

impl SessionService {
    pub fn new(registry: Arc<LobbyRegistry>, hub: Arc<Hub>, respawns: Arc<RespawnQueue>) -> Self {
        Self {
            registry,
            directory: SessionDirectory::new(),
            hub,
            respawns,
        }
    }

    /// Number of connections currently in a lobby
    pub fn active_sessions(&self) -> usize {
        self.directory.len()
    }

    /// Dispatch one client message and send any replies
    pub fn handle(&self, conn_id: Uuid, msg: ClientMsg) {
        match msg {
            ClientMsg::CreateLobby(req) => {
                let reply = match self.create_lobby(conn_id, &req.player_name) {
                    Ok(state) => LobbyReply::ok(state),
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Create lobby refused");
                        LobbyReply::failed(&e)
                    }
                };
                self.hub.send_to(conn_id, ServerMsg::LobbyCreated(reply));
            }
            ClientMsg::JoinLobby(req) => {
                match self.join_lobby(conn_id, &req.code, &req.player_name) {
                    Ok(state) => {
                        let code = state.code.clone();
                        self.hub
                            .send_to(conn_id, ServerMsg::LobbyJoined(LobbyReply::ok(state.clone())));
                        self.hub.broadcast(
                            &code,
                            ServerMsg::PlayerJoined(StateUpdate { game_state: state }),
                        );
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, code = %req.code, error = %e, "Join lobby refused");
                        self.hub
                            .send_to(conn_id, ServerMsg::LobbyJoined(LobbyReply::failed(&e)));
                    }
                }
            }
            ClientMsg::StartRace(req) => {
                if let Err(e) = self.start_race(conn_id, &req) {
                    self.report(conn_id, e);
                }
            }
            ClientMsg::PlayerUpdate(update) => {
                if let Err(e) = self.player_update(conn_id, &update) {
                    self.report(conn_id, e);
                }
            }
            ClientMsg::Shoot(shot) => {
                if let Err(e) = self.shoot(conn_id, &shot) {
                    self.report(conn_id, e);
                }
            }
            ClientMsg::LeaveLobby => {
                self.leave(conn_id);
            }
        }
    }

    fn report(&self, conn_id: Uuid, err: LobbyError) {
        if err.is_silent() {
            debug!(conn_id = %conn_id, error = %err, "Ignoring event");
            return;
        }
        warn!(conn_id = %conn_id, error = %err, "Request refused");
        self.hub.send_to(conn_id, ServerMsg::Error((&err).into()));
    }

    /// Create a lobby hosted by `conn_id`
    pub fn create_lobby(&self, conn_id: Uuid, name: &str) -> Result<GameStateSnapshot, LobbyError> {
        if self.directory.contains(conn_id) {
            return Err(LobbyError::AlreadyInLobby);
        }
        let name = validate_name(name)?;

        let now = unix_millis();
        let (code, lobby) = self.registry.create(conn_id, name.to_string(), now)?;
        self.bind(conn_id, &code);
        self.hub.join_group(&code, conn_id);

        let state = SnapshotBuilder::build(&lobby.lock(), now);
        info!(code = %code, conn_id = %conn_id, host = %name, "Lobby created");
        Ok(state)
    }

    /// Add `conn_id` to the lobby with `code`
    pub fn join_lobby(
        &self,
        conn_id: Uuid,
        code: &str,
        name: &str,
    ) -> Result<GameStateSnapshot, LobbyError> {
        if self.directory.contains(conn_id) {
            return Err(LobbyError::AlreadyInLobby);
        }
        let name = validate_name(name)?;
        let code = code.trim();
        let lobby = self.registry.get(code).ok_or(LobbyError::LobbyNotFound)?;

        let now = unix_millis();
        let state = {
            let mut lobby = lobby.lock();
            if lobby.closed {
                return Err(LobbyError::LobbyNotFound);
            }
            if lobby.state != LobbyState::Lobby {
                return Err(LobbyError::GameInProgress);
            }
            if lobby.name_taken(name) {
                return Err(LobbyError::NameTaken);
            }
            lobby.add_player(conn_id, name.to_string(), false, now);
            SnapshotBuilder::build(&lobby, now)
        };

        self.bind(conn_id, code);
        self.hub.join_group(code, conn_id);
        info!(
            code = %code,
            conn_id = %conn_id,
            player = %name,
            player_count = state.players.len(),
            "Player joined lobby"
        );
        Ok(state)
    }

    /// Host starts or restarts the race
    pub fn start_race(&self, conn_id: Uuid, req: &StartRaceRequest) -> Result<(), LobbyError> {
        let (entry, lobby) = self.resolve(conn_id)?;

        let now = unix_millis();
        let state = {
            let mut lobby = lobby.lock();
            lobby.start_race(entry.player_id, req.race_distance, req.game_mode, now)?;
            SnapshotBuilder::build(&lobby, now)
        };

        // a respawn from the previous race must not touch the new one
        self.respawns.cancel_lobby(&entry.lobby_code);
        info!(
            code = %entry.lobby_code,
            race_distance = req.race_distance,
            game_mode = ?req.game_mode,
            "Race started"
        );
        self.hub.broadcast(
            &entry.lobby_code,
            ServerMsg::RaceStarted(StateUpdate { game_state: state }),
        );
        Ok(())
    }

    /// Merge a client state report
    pub fn player_update(&self, conn_id: Uuid, update: &PlayerUpdate) -> Result<(), LobbyError> {
        let (entry, lobby) = self.resolve(conn_id)?;

        let now = unix_millis();
        let finished = {
            let mut lobby = lobby.lock();
            if lobby.state != LobbyState::Racing {
                return Err(LobbyError::NotRacing);
            }
            lobby.update_player(entry.player_id, update, now);
            // the tick driver stops at Finished, so push the final standings here
            (lobby.state == LobbyState::Finished).then(|| SnapshotBuilder::build(&lobby, now))
        };

        if let Some(state) = finished {
            info!(code = %entry.lobby_code, "Race finished");
            self.hub.broadcast(
                &entry.lobby_code,
                ServerMsg::GameUpdate(StateUpdate { game_state: state }),
            );
        }
        Ok(())
    }

    /// Fire a bullet
    pub fn shoot(&self, conn_id: Uuid, shot: &ShootRequest) -> Result<u64, LobbyError> {
        let (entry, lobby) = self.resolve(conn_id)?;
        let mut lobby = lobby.lock();
        if lobby.state != LobbyState::Racing {
            return Err(LobbyError::NotRacing);
        }
        lobby.add_projectile(entry.player_id, shot, unix_millis())
    }

    /// Remove `conn_id` from its lobby, destroying the lobby if it empties.
    /// Returns false if the connection was not in a lobby.
    pub fn leave(&self, conn_id: Uuid) -> bool {
        let Some(entry) = self.directory.unbind(conn_id) else {
            return false;
        };
        let SessionEntry {
            lobby_code: code,
            player_id,
        } = entry;
        self.hub.leave_group(&code, conn_id);
        self.respawns.cancel(&code, player_id);

        let Some(lobby) = self.registry.get(&code) else {
            return true;
        };

        let now = unix_millis();
        let remaining = {
            let mut lobby = lobby.lock();
            lobby.remove_player(player_id);
            if lobby.is_empty() {
                lobby.closed = true;
                None
            } else {
                Some(SnapshotBuilder::build(&lobby, now))
            }
        };

        match remaining {
            None => {
                self.registry.remove(&code);
                self.respawns.cancel_lobby(&code);
                info!(code = %code, "Lobby removed");
            }
            Some(state) => {
                info!(code = %code, conn_id = %conn_id, "Player left lobby");
                self.hub
                    .broadcast(&code, ServerMsg::PlayerLeft(StateUpdate { game_state: state }));
            }
        }
        true
    }

    /// Connection closed
    pub fn disconnect(&self, conn_id: Uuid) {
        self.leave(conn_id);
        self.hub.unregister(conn_id);
    }

    fn bind(&self, conn_id: Uuid, code: &str) {
        if !self.directory.bind(conn_id, code) {
            warn!(conn_id = %conn_id, code = %code, "Connection already bound to a lobby");
            debug_assert!(false, "double bind for {conn_id}");
        }
    }

    fn resolve(&self, conn_id: Uuid) -> Result<(SessionEntry, SharedLobby), LobbyError> {
        let entry = self
            .directory
            .lookup(conn_id)
            .ok_or(LobbyError::UnknownConnection)?;
        let lobby = self
            .registry
            .get(&entry.lobby_code)
            .ok_or(LobbyError::LobbyNotFound)?;
        Ok((entry, lobby))
    }
}

fn validate_name(name: &str) -> Result<&str, LobbyError> {
    if name.trim().is_empty() {
        Err(LobbyError::InvalidName)
    } else {
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::registry::tests::FixedCode;
    use crate::ws::protocol::{
        ActivePowerUp, CreateLobbyRequest, GameMode, JoinLobbyRequest, PowerUpKind,
    };
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        service: SessionService,
        registry: Arc<LobbyRegistry>,
        hub: Arc<Hub>,
        respawns: Arc<RespawnQueue>,
    }

    fn harness() -> Harness {
        let registry = Arc::new(LobbyRegistry::with_codes(Box::new(FixedCode("123456"))));
        let hub = Arc::new(Hub::new());
        let respawns = Arc::new(RespawnQueue::new());
        let service = SessionService::new(registry.clone(), hub.clone(), respawns.clone());
        Harness {
            service,
            registry,
            hub,
            respawns,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<ServerMsg>>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(serde_json::to_value(msg.as_ref()).unwrap());
        }
        out
    }

    fn create(name: &str) -> ClientMsg {
        ClientMsg::CreateLobby(CreateLobbyRequest {
            player_name: name.into(),
        })
    }

    fn join(code: &str, name: &str) -> ClientMsg {
        ClientMsg::JoinLobby(JoinLobbyRequest {
            code: code.into(),
            player_name: name.into(),
        })
    }

    fn start() -> ClientMsg {
        ClientMsg::StartRace(StartRaceRequest {
            race_distance: 1000.0,
            game_mode: GameMode::Land,
        })
    }

    fn move_to(x: f32) -> ClientMsg {
        ClientMsg::PlayerUpdate(PlayerUpdate {
            x: Some(x),
            ..Default::default()
        })
    }

    #[test]
    fn full_race_flow() {
        let h = harness();
        let host = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut host_rx = h.hub.register(host);
        let mut bob_rx = h.hub.register(bob);

        h.service.handle(host, create("host"));
        let msgs = drain(&mut host_rx);
        assert_eq!(msgs[0]["event"], "lobbyCreated");
        assert_eq!(msgs[0]["data"]["success"], true);
        assert_eq!(msgs[0]["data"]["code"], "123456");

        h.service.handle(bob, join("123456", "Bob"));
        let bob_msgs = drain(&mut bob_rx);
        assert_eq!(bob_msgs[0]["event"], "lobbyJoined");
        assert_eq!(bob_msgs[0]["data"]["success"], true);
        assert_eq!(bob_msgs[1]["event"], "playerJoined");
        let host_msgs = drain(&mut host_rx);
        assert_eq!(host_msgs.len(), 1);
        assert_eq!(host_msgs[0]["event"], "playerJoined");
        assert_eq!(host_msgs[0]["data"]["gameState"]["players"].as_array().unwrap().len(), 2);

        h.service.handle(host, start());
        let started = drain(&mut bob_rx);
        assert_eq!(started[0]["event"], "raceStarted");
        let state = &started[0]["data"]["gameState"];
        assert_eq!(state["state"], "racing");
        for p in state["players"].as_array().unwrap() {
            assert_eq!(p["progress"], 0.0);
        }

        h.service.handle(host, move_to(10_000.0));
        {
            let lobby = h.registry.get("123456").unwrap();
            let lobby = lobby.lock();
            let p = lobby.player(host).unwrap();
            assert_eq!(p.progress, 1.0);
            assert!(p.finish_time.is_some());
            assert_eq!(lobby.players_finished, 1);
            assert_eq!(lobby.state, LobbyState::Racing);
        }

        h.service.handle(bob, move_to(10_000.0));
        let finished = drain(&mut host_rx);
        let last = finished.last().unwrap();
        assert_eq!(last["event"], "gameUpdate");
        let state = &last["data"]["gameState"];
        assert_eq!(state["state"], "finished");
        assert_eq!(state["playersFinishedCount"], 2);
        assert_eq!(state["leaderboard"][0]["id"], host.to_string());
        assert_eq!(state["leaderboard"][1]["id"], bob.to_string());
    }

    #[test]
    fn join_errors() {
        let h = harness();
        let host = Uuid::new_v4();
        let _host_rx = h.hub.register(host);
        h.service.create_lobby(host, "host").unwrap();

        assert_eq!(
            h.service.join_lobby(Uuid::new_v4(), "999999", "Bob").err(),
            Some(LobbyError::LobbyNotFound)
        );
        assert_eq!(
            h.service.join_lobby(Uuid::new_v4(), "123456", "host").err(),
            Some(LobbyError::NameTaken)
        );
        // names are case-sensitive
        assert_ok!(h.service.join_lobby(Uuid::new_v4(), "123456", "Host"));

        h.service.handle(host, start());
        assert_eq!(
            h.service.join_lobby(Uuid::new_v4(), "123456", "Late").err(),
            Some(LobbyError::GameInProgress)
        );
    }

    #[test]
    fn failed_join_is_reported_to_sender_only() {
        let h = harness();
        let host = Uuid::new_v4();
        let late = Uuid::new_v4();
        let mut host_rx = h.hub.register(host);
        let mut late_rx = h.hub.register(late);
        h.service.handle(host, create("host"));
        drain(&mut host_rx);

        h.service.handle(late, join("123456", "host"));
        let msgs = drain(&mut late_rx);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["data"]["success"], false);
        assert_eq!(msgs[0]["data"]["error"], "Player name already taken");
        assert!(drain(&mut host_rx).is_empty());
        assert!(!h.service.directory.contains(late));
    }

    #[test]
    fn non_host_cannot_start() {
        let h = harness();
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let _host_rx = h.hub.register(host);
        let mut guest_rx = h.hub.register(guest);
        h.service.create_lobby(host, "host").unwrap();
        h.service.join_lobby(guest, "123456", "guest").unwrap();

        h.service.handle(guest, start());
        let msgs = drain(&mut guest_rx);
        assert_eq!(msgs[0]["event"], "error");
        assert_eq!(msgs[0]["data"]["code"], "not_host");
        assert_eq!(
            h.registry.get("123456").unwrap().lock().state,
            LobbyState::Lobby
        );
    }

    #[test]
    fn unknown_connection_is_ignored() {
        let h = harness();
        let stranger = Uuid::new_v4();
        let mut rx = h.hub.register(stranger);
        h.service.handle(stranger, move_to(5.0));
        h.service.handle(stranger, start());
        assert!(drain(&mut rx).is_empty());
        assert!(!h.service.leave(stranger));
    }

    #[test]
    fn one_lobby_per_connection() {
        let h = harness();
        let host = Uuid::new_v4();
        h.service.create_lobby(host, "host").unwrap();
        assert_eq!(
            h.service.create_lobby(host, "again").err(),
            Some(LobbyError::AlreadyInLobby)
        );
        assert_err!(h.service.create_lobby(Uuid::new_v4(), "   "));
        assert_eq!(h.registry.active_lobbies(), 1);
    }

    #[test]
    fn host_disconnect_reassigns_and_last_leave_removes_lobby() {
        let h = harness();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let _rx_a = h.hub.register(a);
        let mut rx_b = h.hub.register(b);
        let _rx_c = h.hub.register(c);
        h.service.create_lobby(a, "a").unwrap();
        h.service.join_lobby(b, "123456", "b").unwrap();
        h.service.join_lobby(c, "123456", "c").unwrap();
        drain(&mut rx_b);

        h.service.disconnect(a);
        {
            let lobby = h.registry.get("123456").unwrap();
            let lobby = lobby.lock();
            let hosts: Vec<Uuid> = lobby.players.iter().filter(|p| p.is_host).map(|p| p.id).collect();
            assert_eq!(hosts.len(), 1);
            assert_eq!(lobby.host_id, hosts[0]);
            assert_eq!(lobby.host_id, b);
        }
        let msgs = drain(&mut rx_b);
        assert_eq!(msgs[0]["event"], "playerLeft");
        assert_eq!(msgs[0]["data"]["gameState"]["players"].as_array().unwrap().len(), 2);

        h.service.disconnect(b);
        h.service.disconnect(c);
        assert!(h.registry.get("123456").is_none());
        assert_eq!(h.registry.active_lobbies(), 0);
        assert_eq!(h.service.active_sessions(), 0);
        assert!(h.hub.members("123456").is_empty());
    }

    #[test]
    fn disconnect_cancels_pending_respawn() {
        let h = harness();
        let host = Uuid::new_v4();
        let bob = Uuid::new_v4();
        h.service.create_lobby(host, "host").unwrap();
        h.service.join_lobby(bob, "123456", "Bob").unwrap();
        h.respawns.schedule("123456", bob, 10);

        h.service.disconnect(bob);
        assert!(h.respawns.is_empty());
    }

    #[test]
    fn shooting_needs_running_race_and_weapon() {
        let h = harness();
        let host = Uuid::new_v4();
        let mut rx = h.hub.register(host);
        h.service.create_lobby(host, "host").unwrap();
        let shot = ShootRequest {
            x: 0.0,
            y: 0.0,
            speed: None,
        };
        assert_eq!(h.service.shoot(host, &shot), Err(LobbyError::NotRacing));

        h.service.handle(host, start());
        assert_eq!(h.service.shoot(host, &shot), Err(LobbyError::NoWeapon));

        h.service.handle(
            host,
            ClientMsg::PlayerUpdate(PlayerUpdate {
                active_power_up: Some(ActivePowerUp {
                    kind: Some(PowerUpKind::Gun),
                    time_left: 600.0,
                }),
                ..Default::default()
            }),
        );
        assert_ok!(h.service.shoot(host, &shot));
        h.service.handle(
            host,
            ClientMsg::Shoot(ShootRequest {
                x: 10.0,
                y: 0.0,
                speed: Some(20.0),
            }),
        );
        assert_eq!(h.registry.get("123456").unwrap().lock().projectiles.len(), 2);
        // no error frames for shots
        assert!(drain(&mut rx).iter().all(|m| m["event"] != "error"));
    }

    #[test]
    fn restart_after_finish_is_allowed() {
        let h = harness();
        let host = Uuid::new_v4();
        let mut rx = h.hub.register(host);
        h.service.create_lobby(host, "host").unwrap();
        h.service.handle(host, start());
        h.service.handle(host, move_to(10_000.0));
        assert_eq!(
            h.registry.get("123456").unwrap().lock().state,
            LobbyState::Finished
        );

        h.service.handle(host, start());
        let msgs = drain(&mut rx);
        let last = msgs.last().unwrap();
        assert_eq!(last["event"], "raceStarted");
        assert_eq!(last["data"]["gameState"]["state"], "racing");
        assert_eq!(last["data"]["gameState"]["playersFinishedCount"], 0);
    }
}
