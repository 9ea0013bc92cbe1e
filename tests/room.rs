//! Async room host behaviour

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use party_room_server::game::{
    Command, Event, GameRoom, PlayerProfile, RoomError, RoomInput, RoomRegistry, SessionId,
    SimulationConfig,
};
use party_room_server::session::ServerMsg;

fn join(id: u32) -> RoomInput {
    RoomInput::Join {
        session: SessionId(id),
        profile: PlayerProfile {
            nickname: format!("p{id}"),
            ..Default::default()
        },
    }
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<ServerMsg>, mut pred: F) -> ServerMsg
where
    F: FnMut(&ServerMsg) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let msg = rx.recv().await.expect("room output closed");
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("timed out waiting for room output")
}

/// Everything the room broadcasts within `window`
async fn collect(rx: &mut broadcast::Receiver<ServerMsg>, window: Duration) -> Vec<ServerMsg> {
    let mut msgs = Vec::new();
    let _ = timeout(window, async {
        while let Ok(msg) = rx.recv().await {
            msgs.push(msg);
        }
    })
    .await;
    msgs
}

#[tokio::test]
async fn join_is_broadcast_and_empty_room_closes() {
    let id = Uuid::new_v4();
    let (room, handle) = GameRoom::new(id, 1, SimulationConfig::default(), 30);
    let mut rx = handle.subscribe();
    let task = tokio::spawn(room.run());

    assert_ok!(handle.send(join(1)).await);
    let msg = wait_for(&mut rx, |m| {
        matches!(
            m,
            ServerMsg::Event {
                event: Event::HostChanged { .. },
                ..
            }
        )
    })
    .await;
    match msg {
        ServerMsg::Event { room_id, event, .. } => {
            assert_eq!(room_id, id);
            assert_eq!(event, Event::HostChanged { host: SessionId(1) });
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(handle.player_count(), 1);

    handle
        .send(RoomInput::Leave {
            session: SessionId(1),
        })
        .await
        .unwrap();
    wait_for(&mut rx, |m| matches!(m, ServerMsg::RoomClosed { .. })).await;
    assert_ok!(task.await);

    let err = assert_err!(handle.send(join(2)).await);
    assert!(matches!(err, RoomError::Closed(_)));
}

#[tokio::test]
async fn full_room_rejects_joins() {
    let config = SimulationConfig {
        max_players: 1,
        ..Default::default()
    };
    let (room, handle) = GameRoom::new(Uuid::new_v4(), 1, config, 30);
    let mut rx = handle.subscribe();
    tokio::spawn(room.run());

    handle.send(join(1)).await.unwrap();
    handle.send(join(2)).await.unwrap();

    let msg = wait_for(&mut rx, |m| matches!(m, ServerMsg::Error { .. })).await;
    match msg {
        ServerMsg::Error { code, .. } => assert_eq!(code, "room_full"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(handle.player_count(), 1);
}

#[tokio::test]
async fn command_floods_are_rate_limited() {
    let (room, handle) = GameRoom::new(Uuid::new_v4(), 1, SimulationConfig::default(), 1);
    let mut rx = handle.subscribe();

    // Queue everything before the first tick drains it
    handle.send(join(1)).await.unwrap();
    for _ in 0..5 {
        handle
            .send(RoomInput::Command {
                session: SessionId(1),
                command: Command::ToggleReady,
            })
            .await
            .unwrap();
    }
    tokio::spawn(room.run());

    let msgs = collect(&mut rx, Duration::from_millis(300)).await;
    let data_changes = msgs
        .iter()
        .filter(|m| {
            matches!(
                m,
                ServerMsg::Event {
                    event: Event::PlayerDataChanged { .. },
                    ..
                }
            )
        })
        .count();
    // One from the join, one from the single command let through
    assert_eq!(data_changes, 2);
}

#[tokio::test]
async fn registry_tracks_rooms() {
    let registry = RoomRegistry::new();
    let (_room_a, a) = GameRoom::new(Uuid::new_v4(), 1, SimulationConfig::default(), 30);
    let (_room_b, b) = GameRoom::new(Uuid::new_v4(), 2, SimulationConfig::default(), 30);
    let (a_id, b_id) = (a.id, b.id);

    registry.insert(a);
    registry.insert(b);
    assert_eq!(registry.active_rooms(), 2);
    assert_eq!(registry.total_players(), 0);
    assert_eq!(registry.require(&a_id).unwrap().seed, 1);

    registry.remove(&b_id);
    assert!(matches!(
        registry.require(&b_id),
        Err(RoomError::NotFound(id)) if id == b_id
    ));
}
