mod helpers {
    include!("helpers/mod.rs");
}

use embassy_time::Duration;
use helpers::{wire_frame, MockController};
use ronin_can::bus::{CanRouter, Event, PortConfig};
use ronin_can::core::{PortId, RxFifo};
use ronin_can::error::ReceiveError;
use ronin_can::transport::frame::{FrameKind, Mtu};
use ronin_can::transport::RX_BURST_LIMIT;
use static_cell::StaticCell;

fn bus_with_port(port: PortId) -> (CanRouter<MockController>, MockController) {
    let controller = MockController::new(3);
    let router = CanRouter::new();
    router
        .init(port, controller.clone(), PortConfig { mtu: Mtu::Fd })
        .expect("fresh port must initialize");
    (router, controller)
}

#[tokio::test]
async fn per_key_fifo_order_is_preserved() {
    let (router, controller) = bus_with_port(PortId::Can1);
    router.register_key(PortId::Can1, 0x205, 8).await.unwrap();

    for seq in 0..5u8 {
        controller.inject(
            RxFifo::Fifo0,
            wire_frame(FrameKind::StandardData, 0x205, &[seq, 0xAA, 0xBB, 0xCC]),
        );
    }
    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));

    for seq in 0..5u8 {
        let message = router
            .receive(PortId::Can1, 0x205, Some(Duration::from_millis(0)))
            .await
            .expect("queued message must be available");
        assert_eq!(message.data[0], seq);
        assert_eq!(message.raw_id(), 0x205);
        assert_eq!(message.kind(), FrameKind::StandardData);
    }
}

#[tokio::test]
async fn full_queue_keeps_the_oldest_messages() {
    let (router, controller) = bus_with_port(PortId::Can1);
    router.register_key(PortId::Can1, 0x205, 3).await.unwrap();

    for seq in [b'A', b'B', b'C', b'D', b'E'] {
        controller.inject(
            RxFifo::Fifo0,
            wire_frame(FrameKind::StandardData, 0x205, &[seq; 4]),
        );
    }
    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));

    // Exactly A, B, C are retrievable; D and E were dropped on arrival.
    for expected in [b'A', b'B', b'C'] {
        let message = router
            .receive(PortId::Can1, 0x205, Some(Duration::from_millis(0)))
            .await
            .expect("retained message must be available");
        assert_eq!(message.data[0], expected);
    }
    assert!(matches!(
        router
            .receive(PortId::Can1, 0x205, Some(Duration::from_millis(0)))
            .await,
        Err(ReceiveError::Timeout)
    ));
    assert_eq!(router.dropped_count(PortId::Can1, 0x205).await, Ok(2));
}

#[tokio::test]
async fn identity_normalizer_routes_by_raw_id() {
    let (router, controller) = bus_with_port(PortId::Can1);
    router
        .register_key(PortId::Can1, 0x1234_567, 4)
        .await
        .unwrap();

    controller.inject(
        RxFifo::Fifo0,
        wire_frame(FrameKind::ExtendedData, 0x1234_567, &[0xFE; 8]),
    );
    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));

    let message = router
        .receive(PortId::Can1, 0x1234_567, Some(Duration::from_millis(0)))
        .await
        .expect("message must route under its raw id");
    assert_eq!(message.key, message.raw_id());
}

#[tokio::test]
async fn custom_normalizer_collapses_many_raw_ids() {
    // Vendor feedback ids carry the device address in the low byte; every
    // one of them belongs to the same logical subscriber.
    fn by_device_page(raw_id: u32, kind: FrameKind) -> u32 {
        if kind.is_remote() {
            raw_id
        } else {
            raw_id & !0xFF
        }
    }

    let (router, controller) = bus_with_port(PortId::Can1);
    router
        .register_normalizer(PortId::Can1, by_device_page)
        .expect("live port must accept a normalizer");
    router
        .register_key(PortId::Can1, 0x0205_1100, 8)
        .await
        .unwrap();

    controller.inject(
        RxFifo::Fifo0,
        wire_frame(FrameKind::ExtendedData, 0x0205_1101, &[1; 4]),
    );
    controller.inject(
        RxFifo::Fifo0,
        wire_frame(FrameKind::ExtendedData, 0x0205_11FE, &[2; 4]),
    );
    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));

    // Both frames land in the one queue, raw ids intact.
    let first = router
        .receive(PortId::Can1, 0x0205_1100, Some(Duration::from_millis(0)))
        .await
        .expect("first collapsed frame");
    let second = router
        .receive(PortId::Can1, 0x0205_1100, Some(Duration::from_millis(0)))
        .await
        .expect("second collapsed frame");
    assert_eq!(first.raw_id(), 0x0205_1101);
    assert_eq!(second.raw_id(), 0x0205_11FE);
    assert_eq!(first.key, 0x0205_1100);
    assert_eq!(second.key, 0x0205_1100);
}

#[tokio::test]
async fn unmatched_frames_are_discarded() {
    let (router, controller) = bus_with_port(PortId::Can1);
    router.register_key(PortId::Can1, 0x205, 4).await.unwrap();

    controller.inject(
        RxFifo::Fifo0,
        wire_frame(FrameKind::StandardData, 0x300, &[0; 4]),
    );
    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));

    assert_eq!(controller.fifo_len(RxFifo::Fifo0), 0);
    assert_eq!(router.queue_depth(PortId::Can1, 0x205).await, Ok(0));
}

#[tokio::test]
async fn fifos_are_drained_independently() {
    let (router, controller) = bus_with_port(PortId::Can1);
    router.register_key(PortId::Can1, 0x205, 8).await.unwrap();

    controller.inject(
        RxFifo::Fifo0,
        wire_frame(FrameKind::StandardData, 0x205, &[0; 4]),
    );
    controller.inject(
        RxFifo::Fifo1,
        wire_frame(FrameKind::StandardData, 0x205, &[1; 4]),
    );

    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));
    assert_eq!(controller.fifo_len(RxFifo::Fifo0), 0);
    assert_eq!(controller.fifo_len(RxFifo::Fifo1), 1);

    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo1));
    assert_eq!(controller.fifo_len(RxFifo::Fifo1), 0);
    assert_eq!(router.queue_depth(PortId::Can1, 0x205).await, Ok(2));
}

#[tokio::test]
async fn drain_is_bounded_per_notification() {
    let (router, controller) = bus_with_port(PortId::Can1);
    router
        .register_key(PortId::Can1, 0x205, RX_BURST_LIMIT + 8)
        .await
        .unwrap();

    for seq in 0..(RX_BURST_LIMIT + 8) {
        controller.inject(
            RxFifo::Fifo0,
            wire_frame(FrameKind::StandardData, 0x205, &[seq as u8; 4]),
        );
    }

    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));
    assert_eq!(controller.fifo_len(RxFifo::Fifo0), 8);

    // The pending flag stays up, so the next notification finishes the job.
    router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));
    assert_eq!(controller.fifo_len(RxFifo::Fifo0), 0);
}

#[tokio::test]
async fn zero_timeout_polls_without_waiting() {
    let (router, _controller) = bus_with_port(PortId::Can1);
    router.register_key(PortId::Can1, 0x205, 4).await.unwrap();

    assert!(matches!(
        router
            .receive(PortId::Can1, 0x205, Some(Duration::from_millis(0)))
            .await,
        Err(ReceiveError::Timeout)
    ));
    assert!(matches!(
        router.receive(PortId::Can1, 0x999, None).await,
        Err(ReceiveError::NotFound)
    ));
}

#[tokio::test]
async fn finite_timeout_elapses_on_an_empty_queue() {
    let (router, _controller) = bus_with_port(PortId::Can1);
    router.register_key(PortId::Can1, 0x205, 4).await.unwrap();

    let started = std::time::Instant::now();
    let result = router
        .receive(PortId::Can1, 0x205, Some(Duration::from_millis(50)))
        .await;
    assert!(matches!(result, Err(ReceiveError::Timeout)));
    assert!(started.elapsed() >= std::time::Duration::from_millis(40));
}

static FOREVER_BUS: StaticCell<CanRouter<MockController>> = StaticCell::new();

#[tokio::test]
async fn unbounded_receive_wakes_on_delivery() {
    let controller = MockController::new(3);
    let router: &'static CanRouter<MockController> = FOREVER_BUS.init(CanRouter::new());
    router
        .init(PortId::Can1, controller.clone(), PortConfig::default())
        .expect("fresh port must initialize");
    router.register_key(PortId::Can1, 0x205, 4).await.unwrap();

    let producer = {
        let controller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            controller.inject(
                RxFifo::Fifo0,
                wire_frame(FrameKind::StandardData, 0x205, &[0x5A; 4]),
            );
            router.notify(PortId::Can1, Event::ReceivePending(RxFifo::Fifo0));
        })
    };

    let message = router
        .receive(PortId::Can1, 0x205, None)
        .await
        .expect("delivery must wake the parked receiver");
    assert_eq!(message.data[0], 0x5A);
    producer.await.expect("producer task must finish");
}

static CLOSED_BUS: StaticCell<CanRouter<MockController>> = StaticCell::new();

#[tokio::test]
async fn unregister_wakes_a_parked_receiver_with_closed() {
    let controller = MockController::new(3);
    let router: &'static CanRouter<MockController> = CLOSED_BUS.init(CanRouter::new());
    router
        .init(PortId::Can1, controller, PortConfig::default())
        .expect("fresh port must initialize");
    router.register_key(PortId::Can1, 0x205, 4).await.unwrap();

    let waiter = tokio::spawn(async move { router.receive(PortId::Can1, 0x205, None).await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    router
        .unregister_key(PortId::Can1, 0x205)
        .await
        .expect("live registration must unregister");

    let result = waiter.await.expect("waiter task must finish");
    assert!(matches!(result, Err(ReceiveError::Closed)));
}
