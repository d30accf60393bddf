//! UseCase: 受信メッセージのルーティング（ブロードキャストルーター）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RouteMessageUseCase::execute() メソッド
//! - 図形操作をルームのスナップショットに適用してから送信者以外へ配信すること
//! - state_sync によるスナップショット全体の置き換え
//! - カーソル位置の中継（保存しない）、ping への pong 応答
//!
//! ### なぜこのテストが必要か
//! - 後から参加したクライアントが最新のスナップショットを受け取れることを保証
//! - 別のルームのメンバーや送信者自身に配信されないことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：N 人のルームで N-1 人に配信される
//! - 異常系：未参加のルームへの操作
//! - エッジケース：同じ図形への連続更新（後勝ち）、追加直後の削除

use std::sync::Arc;

use tegaki_shared::{
    canvas::{CanvasData, Point, Shape, ShapeOp},
    time::Clock,
};

use crate::domain::{
    BroadcastReport, Departure, Identity, MessagePusher, Participant, RoomCommand, RoomId,
    RoomRepository, Timestamp,
};

use super::{
    error::RouteError, join_room::JoinRoomUseCase, leave_room::LeaveRoomUseCase, notification,
    room_lock::RoomLocks, send_message::SendMessageUseCase,
};

/// ルーティング結果
#[derive(Debug)]
pub enum RouteOutcome {
    Joined { member_count: usize },
    Left(Option<Departure>),
    Relayed(BroadcastReport),
    Ponged,
}

/// 受信メッセージをコマンドの種類ごとに処理するユースケース
pub struct RouteMessageUseCase {
    repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    join_room: Arc<JoinRoomUseCase>,
    leave_room: Arc<LeaveRoomUseCase>,
    send_message: Arc<SendMessageUseCase>,
    room_locks: Arc<RoomLocks>,
    clock: Arc<dyn Clock>,
}

impl RouteMessageUseCase {
    /// 新しい RouteMessageUseCase を作成
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        join_room: Arc<JoinRoomUseCase>,
        leave_room: Arc<LeaveRoomUseCase>,
        send_message: Arc<SendMessageUseCase>,
        room_locks: Arc<RoomLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            join_room,
            leave_room,
            send_message,
            room_locks,
            clock,
        }
    }

    /// 1 件のコマンドを処理する
    ///
    /// 受信のたびに接続の最終アクティビティ時刻を更新する。
    pub async fn execute(
        &self,
        sender: &Participant,
        command: RoomCommand,
    ) -> Result<RouteOutcome, RouteError> {
        let now = Timestamp::new(self.clock.now_millis());
        self.repository.touch(&sender.key, now).await?;

        match command {
            RoomCommand::Join(room_id) => {
                let outcome = self.join_room.execute(sender, room_id).await?;
                Ok(RouteOutcome::Joined {
                    member_count: outcome.room.member_count(),
                })
            }
            RoomCommand::Leave(room_id) => {
                let departure = self.leave_room.execute(sender, room_id).await?;
                Ok(RouteOutcome::Left(departure))
            }
            RoomCommand::Chat { room_id, text } => {
                let dispatch = self.send_message.execute(sender, room_id, &text).await?;
                Ok(RouteOutcome::Relayed(dispatch.report))
            }
            RoomCommand::Shape { room_id, op } => {
                self.apply_shape_op(sender, room_id, op, now).await
            }
            RoomCommand::ReplaceCanvas { room_id, data } => {
                self.replace_canvas(sender, room_id, data, now).await
            }
            RoomCommand::Cursor { room_id, position } => {
                self.relay_cursor(sender, room_id, position).await
            }
            RoomCommand::Ping { .. } => {
                let pong = notification::pong(now.value()).to_json()?;
                if let Err(e) = self.message_pusher.push_to(sender.identity(), &pong).await {
                    tracing::warn!("Failed to send pong to '{}': {}", sender.identity(), e);
                }
                Ok(RouteOutcome::Ponged)
            }
        }
    }

    /// 図形操作をスナップショットに適用してから配信
    async fn apply_shape_op(
        &self,
        sender: &Participant,
        room_id: RoomId,
        op: ShapeOp,
        now: Timestamp,
    ) -> Result<RouteOutcome, RouteError> {
        let _guard = self.room_locks.lock(&room_id).await;
        self.require_member(sender, &room_id).await?;

        // 追加・更新された図形の作者は接続の Identity
        let author = sender.identity().as_str().to_string();
        let op = match op {
            ShapeOp::Add(shape) => ShapeOp::Add(Shape {
                user_id: author,
                ..shape
            }),
            ShapeOp::Update(shape) => ShapeOp::Update(Shape {
                user_id: author,
                ..shape
            }),
            remove @ ShapeOp::Remove(_) => remove,
        };

        self.repository
            .apply_shape_op(&room_id, op.clone(), now)
            .await?;
        let json = notification::shape(&room_id, sender, op).to_json()?;
        let report = self.broadcast_except_sender(&room_id, sender, &json).await;
        Ok(RouteOutcome::Relayed(report))
    }

    /// スナップショット全体を置き換えてから配信
    async fn replace_canvas(
        &self,
        sender: &Participant,
        room_id: RoomId,
        data: CanvasData,
        now: Timestamp,
    ) -> Result<RouteOutcome, RouteError> {
        let _guard = self.room_locks.lock(&room_id).await;
        self.require_member(sender, &room_id).await?;

        let data = CanvasData {
            viewport: data.viewport.clamped(),
            ..data
        };
        self.repository
            .replace_canvas(&room_id, data.clone(), now)
            .await?;
        let json = notification::state_sync(&room_id, sender, data).to_json()?;
        let report = self.broadcast_except_sender(&room_id, sender, &json).await;
        Ok(RouteOutcome::Relayed(report))
    }

    /// カーソル位置の中継（サーバー側には保存しない）
    async fn relay_cursor(
        &self,
        sender: &Participant,
        room_id: RoomId,
        position: Point,
    ) -> Result<RouteOutcome, RouteError> {
        self.require_member(sender, &room_id).await?;
        let json = notification::cursor(&room_id, sender, position).to_json()?;
        let report = self.broadcast_except_sender(&room_id, sender, &json).await;
        Ok(RouteOutcome::Relayed(report))
    }

    async fn require_member(&self, sender: &Participant, room_id: &RoomId) -> Result<(), RouteError> {
        if self.repository.is_member(&sender.key, room_id).await {
            Ok(())
        } else {
            Err(RouteError::NotAMember {
                identity: sender.identity().to_string(),
                room_id: room_id.to_string(),
            })
        }
    }

    async fn broadcast_except_sender(
        &self,
        room_id: &RoomId,
        sender: &Participant,
        json: &str,
    ) -> BroadcastReport {
        let targets: Vec<Identity> = self
            .repository
            .members(room_id)
            .await
            .into_iter()
            .filter(|id| id != sender.identity())
            .collect();
        match self.message_pusher.broadcast(targets, json).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Failed to broadcast to room '{}': {}", room_id, e);
                BroadcastReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::test_support::{Harness, drain, room_id};
    use tegaki_shared::{
        canvas::{FillColor, Shape, ShapeKind, Viewport},
        protocol::ProtocolMessage,
    };

    fn rect(id: &str, end: (f64, f64), color: FillColor) -> Shape {
        Shape {
            id: id.to_string(),
            kind: ShapeKind::Rectangle,
            color,
            start_point: Point::new(10.0, 10.0),
            end_point: Point::new(end.0, end.1),
            user_id: "spoofed".to_string(),
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn test_shape_added_reaches_all_but_sender_in_same_room_only() {
        // テスト項目: N 人のルームへの shape_added は送信者以外の N-1 人にのみ届く
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, mut alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        let (carol, mut carol_rx) = harness.connect("carol").await;
        let (dave, mut dave_rx) = harness.connect("dave").await;
        for p in [&alice, &bob, &carol] {
            router.execute(p, RoomCommand::Join(room_id("demo"))).await.unwrap();
        }
        router.execute(&dave, RoomCommand::Join(room_id("other"))).await.unwrap();
        for rx in [&mut alice_rx, &mut bob_rx, &mut carol_rx, &mut dave_rx] {
            drain(rx);
        }

        // when (操作):
        let outcome = router
            .execute(
                &alice,
                RoomCommand::Shape {
                    room_id: room_id("demo"),
                    op: ShapeOp::Add(rect("s1", (50.0, 40.0), FillColor::Red)),
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert!(matches!(outcome, RouteOutcome::Relayed(BroadcastReport { delivered: 2, .. })));
        assert!(drain(&mut alice_rx).is_empty());
        assert!(drain(&mut dave_rx).is_empty());
        for rx in [&mut bob_rx, &mut carol_rx] {
            match drain(rx).as_slice() {
                [ProtocolMessage::ShapeAdded { user_id, data, .. }] => {
                    assert_eq!(user_id.as_deref(), Some("alice"));
                    assert_eq!(data.user_id, "alice");
                    assert_eq!(data.end_point, Point::new(50.0, 40.0));
                }
                other => panic!("unexpected messages: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_shape_update_is_stamped_with_sender_identity() {
        // テスト項目: shape_updated の作者は送信者の Identity で上書きされ、保存・配信の両方に反映される
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        for p in [&alice, &bob] {
            router.execute(p, RoomCommand::Join(room_id("demo"))).await.unwrap();
        }
        router
            .execute(
                &alice,
                RoomCommand::Shape {
                    room_id: room_id("demo"),
                    op: ShapeOp::Add(rect("s1", (50.0, 40.0), FillColor::Red)),
                },
            )
            .await
            .unwrap();
        drain(&mut bob_rx);

        // when (操作):
        router
            .execute(
                &alice,
                RoomCommand::Shape {
                    room_id: room_id("demo"),
                    op: ShapeOp::Update(rect("s1", (80.0, 80.0), FillColor::Green)),
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        match drain(&mut bob_rx).as_slice() {
            [ProtocolMessage::ShapeUpdated { user_id, data, .. }] => {
                assert_eq!(user_id.as_deref(), Some("alice"));
                assert_eq!(data.user_id, "alice");
                assert_eq!(data.end_point, Point::new(80.0, 80.0));
            }
            other => panic!("unexpected messages: {:?}", other),
        }
        let room = harness.repository.get_room(&room_id("demo")).await.unwrap();
        let stored = room.shapes.get("s1").unwrap();
        assert_eq!(stored.user_id, "alice");
        assert_eq!(stored.color, FillColor::Green);
    }

    #[tokio::test]
    async fn test_shape_ops_update_snapshot_for_late_joiners() {
        // テスト項目: 図形操作がスナップショットに反映され、後から参加した人が受け取る
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (late, mut late_rx) = harness.connect("late").await;
        router.execute(&alice, RoomCommand::Join(room_id("demo"))).await.unwrap();
        let ops = vec![
            ShapeOp::Add(rect("keep", (20.0, 20.0), FillColor::Blue)),
            ShapeOp::Add(rect("gone", (30.0, 30.0), FillColor::Green)),
            ShapeOp::Update(rect("keep", (60.0, 60.0), FillColor::Yellow)),
            ShapeOp::Remove("gone".to_string()),
        ];

        // when (操作):
        for op in ops {
            router
                .execute(&alice, RoomCommand::Shape { room_id: room_id("demo"), op })
                .await
                .unwrap();
        }
        router.execute(&late, RoomCommand::Join(room_id("demo"))).await.unwrap();

        // then (期待する結果):
        match drain(&mut late_rx).as_slice() {
            [ProtocolMessage::RoomState { shapes, .. }] => {
                assert_eq!(shapes.len(), 1);
                assert_eq!(shapes[0].id, "keep");
                assert_eq!(shapes[0].color, FillColor::Yellow);
                assert_eq!(shapes[0].end_point, Point::new(60.0, 60.0));
            }
            other => panic!("unexpected messages: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_state_sync_replaces_snapshot() {
        // テスト項目: state_sync でスナップショット全体が置き換えられる
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        router.execute(&alice, RoomCommand::Join(room_id("demo"))).await.unwrap();
        router.execute(&bob, RoomCommand::Join(room_id("demo"))).await.unwrap();
        router
            .execute(
                &alice,
                RoomCommand::Shape {
                    room_id: room_id("demo"),
                    op: ShapeOp::Add(rect("s1", (50.0, 40.0), FillColor::Red)),
                },
            )
            .await
            .unwrap();
        drain(&mut bob_rx);

        // when (操作): 空のキャンバスで置き換え（リセット）
        router
            .execute(
                &alice,
                RoomCommand::ReplaceCanvas {
                    room_id: room_id("demo"),
                    data: CanvasData {
                        shapes: vec![],
                        viewport: Viewport { x: 1.0, y: 2.0, zoom: 0.0 },
                    },
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        let room = harness.repository.get_room(&room_id("demo")).await.unwrap();
        assert!(room.shapes.is_empty());
        assert_eq!(room.viewport.zoom, 0.1);
        assert!(matches!(
            drain(&mut bob_rx).as_slice(),
            [ProtocolMessage::StateSync { .. }]
        ));
    }

    #[tokio::test]
    async fn test_cursor_is_relayed_with_display_name() {
        // テスト項目: カーソル位置が表示名付きで中継される
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        router.execute(&alice, RoomCommand::Join(room_id("demo"))).await.unwrap();
        router.execute(&bob, RoomCommand::Join(room_id("demo"))).await.unwrap();
        drain(&mut bob_rx);

        // when (操作):
        router
            .execute(
                &alice,
                RoomCommand::Cursor {
                    room_id: room_id("demo"),
                    position: Point::new(3.0, 4.0),
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            drain(&mut bob_rx),
            vec![ProtocolMessage::CursorMove {
                room_id: "demo".to_string(),
                user_id: Some("alice".to_string()),
                display_name: Some("alice".to_string()),
                data: Point::new(3.0, 4.0),
            }]
        );
    }

    #[tokio::test]
    async fn test_non_member_shape_op_is_dropped() {
        // テスト項目: 参加していないルームへの図形操作は適用も配信もされない
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        router.execute(&bob, RoomCommand::Join(room_id("demo"))).await.unwrap();
        drain(&mut bob_rx);

        // when (操作):
        let result = router
            .execute(
                &alice,
                RoomCommand::Shape {
                    room_id: room_id("demo"),
                    op: ShapeOp::Add(rect("intruder", (50.0, 40.0), FillColor::Red)),
                },
            )
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(RouteError::NotAMember { .. })));
        assert!(drain(&mut bob_rx).is_empty());
        let room = harness.repository.get_room(&room_id("demo")).await.unwrap();
        assert!(room.shapes.is_empty());
    }

    #[tokio::test]
    async fn test_ping_gets_pong_with_server_time() {
        // テスト項目: ping に対してサーバー時刻付きの pong が返る
        // given (前提条件):
        let harness = Harness::new();
        let router = harness.route_message();
        let (alice, mut alice_rx) = harness.connect("alice").await;

        // when (操作):
        let outcome = router
            .execute(&alice, RoomCommand::Ping { timestamp: Some(1) })
            .await
            .unwrap();

        // then (期待する結果):
        assert!(matches!(outcome, RouteOutcome::Ponged));
        assert_eq!(
            drain(&mut alice_rx),
            vec![ProtocolMessage::Pong {
                timestamp: Some(Harness::NOW)
            }]
        );
    }

    #[tokio::test]
    async fn test_broadcast_failure_does_not_fail_the_route() {
        // テスト項目: 配信に失敗しても送信者へのエラーにはならない
        // given (前提条件):
        use crate::domain::{
            ConnectionId, ConnectionKey, DisplayName, MessagePushError, MockMessagePusher,
            MockRoomRepository,
        };
        use crate::infrastructure::chat_store::InMemoryChatStore;
        use tegaki_shared::time::FixedClock;

        let mut repository = MockRoomRepository::new();
        repository.expect_touch().returning(|_, _| Ok(()));
        repository.expect_is_member().returning(|_, _| true);
        repository.expect_members().returning(|_| {
            vec![
                Identity::new("alice".to_string()).unwrap(),
                Identity::new("bob".to_string()).unwrap(),
            ]
        });
        let mut pusher = MockMessagePusher::new();
        pusher
            .expect_broadcast()
            .withf(|targets, _| targets.len() == 1 && targets[0].as_str() == "bob")
            .times(1)
            .returning(|_, _| Err(MessagePushError::PushFailed("socket gone".to_string())));

        let repository: Arc<dyn RoomRepository> = Arc::new(repository);
        let pusher: Arc<dyn MessagePusher> = Arc::new(pusher);
        let locks = Arc::new(RoomLocks::new());
        let clock = Arc::new(FixedClock::new(Harness::NOW));
        let leave_room = Arc::new(LeaveRoomUseCase::new(
            repository.clone(),
            pusher.clone(),
            locks.clone(),
        ));
        let router = RouteMessageUseCase::new(
            repository.clone(),
            pusher.clone(),
            Arc::new(JoinRoomUseCase::new(
                repository.clone(),
                pusher.clone(),
                locks.clone(),
                clock.clone(),
            )),
            leave_room,
            Arc::new(SendMessageUseCase::new(
                repository.clone(),
                pusher.clone(),
                Arc::new(InMemoryChatStore::default()),
                clock.clone(),
                1000,
            )),
            locks,
            clock,
        );
        let alice = Participant::new(
            ConnectionKey::new(
                Identity::new("alice".to_string()).unwrap(),
                ConnectionId::generate(),
            ),
            DisplayName::new("Alice"),
        );

        // when (操作):
        let outcome = router
            .execute(
                &alice,
                RoomCommand::Cursor {
                    room_id: room_id("demo"),
                    position: Point::new(1.0, 2.0),
                },
            )
            .await;

        // then (期待する結果):
        assert!(matches!(
            outcome,
            Ok(RouteOutcome::Relayed(BroadcastReport { delivered: 0, .. }))
        ));
    }
}
