// ABOUTME: End-to-end scenarios from spec.md section 8, driven through ConnectionHandler over an in-memory duplex stream
// ABOUTME: Mirrors the teacher crate's examples/long_running_client.rs style of running a protocol against a real transport

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use fleetlink::bus::{BusError, Event, EventBus, EventPayload, Subscriber};
use fleetlink::detector::DetectorProtocol;
use fleetlink::egts::{AltitudeSign, EgtsProtocol, Hemisphere, Packet as EgtsPacket, ServiceDataRecord, SrPosData};
use fleetlink::position::Position;
use fleetlink::wialonips::WialonIpsProtocol;
use fleetlink::{ConnectionHandler, Protocol};

/// Captures every position it receives, for assertions after the handler
/// has run to completion.
struct CapturingSubscriber {
    positions: Mutex<Vec<Position>>,
}

impl CapturingSubscriber {
    fn new() -> Self {
        CapturingSubscriber { positions: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Subscriber for CapturingSubscriber {
    fn name(&self) -> &str {
        "capture"
    }

    fn topics(&self) -> &[&str] {
        &[fleetlink::bus::TOPIC_POSITION_RECEIVED, fleetlink::bus::TOPIC_CLOSE_CONNECTION]
    }

    async fn handle(&self, event: &Event) -> Result<(), BusError> {
        if let EventPayload::Position(position) = &event.payload {
            self.positions.lock().unwrap().push(position.clone());
        }
        Ok(())
    }
}

fn sample_pos_data() -> SrPosData {
    SrPosData {
        navigation_time: 500_000,
        latitude: 55.7,
        lahs: Hemisphere::North,
        longitude: 37.6,
        lohs: Hemisphere::East,
        valid: true,
        altitude: None,
        altitude_sign: AltitudeSign::AboveSea,
        speed: 60.0,
        direction: 90,
        odometer: 0,
        digital_inputs: 0,
        source: 0,
        movement: true,
    }
}

async fn drive<P: Protocol + 'static>(
    protocol: Arc<P>,
    bus: Arc<EventBus>,
    frames: &[&[u8]],
) -> Vec<u8> {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let handler = ConnectionHandler::new(protocol, bus, Duration::from_millis(200));

    let server_task = tokio::spawn(async move {
        handler.handle(server, "test".to_owned()).await;
    });

    let (mut read_half, mut write_half) = tokio::io::split(client);
    for frame in frames {
        tokio::io::AsyncWriteExt::write_all(&mut write_half, frame).await.unwrap();
    }
    drop(write_half);

    let mut response = Vec::new();
    let _ = read_half.read_to_end(&mut response).await;
    let _ = server_task.await;
    response
}

#[tokio::test]
async fn egts_happy_path_acks_and_publishes_position() {
    let record = ServiceDataRecord::encode_position(1, 42, &sample_pos_data());
    let frame = EgtsPacket::encode_appdata(7, &[record]);

    let subscriber = Arc::new(CapturingSubscriber::new());
    let mut bus = EventBus::new();
    bus.register(subscriber.clone());

    let response = drive(Arc::new(EgtsProtocol::new()), Arc::new(bus), &[&frame]).await;

    assert!(!response.is_empty(), "expected an EGTS ack response");
    let ack = EgtsPacket::decode(&response).expect("ack should itself be a valid EGTS frame");
    assert_eq!(ack.header.packet_id, 8, "ack should echo packet id 7 as the next sequence value");

    let positions = subscriber.positions.lock().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].device_id, "42");
    assert!((positions[0].location.x - 37.6).abs() < 1e-6);
    assert!((positions[0].location.y - 55.7).abs() < 1e-6);
}

#[tokio::test]
async fn egts_bad_crc_closes_connection_without_response() {
    let record = ServiceDataRecord::encode_position(1, 42, &sample_pos_data());
    let mut frame = EgtsPacket::encode_appdata(7, &[record]).to_vec();
    let last = frame.len() - 1;
    frame[last] ^= 0xFF; // flip the body checksum

    let bus = EventBus::new();
    let response = drive(Arc::new(EgtsProtocol::new()), Arc::new(bus), &[&frame]).await;

    assert!(response.is_empty(), "a malformed frame must not be acknowledged");
}

#[tokio::test]
async fn wialonips_login_then_data_yields_position_for_imei() {
    let subscriber = Arc::new(CapturingSubscriber::new());
    let mut bus = EventBus::new();
    bus.register(subscriber.clone());

    let login = b"#L#123456789012345;secret\r\n";
    let data = b"#SD#010124;120000;55.7;N;37.6;E;60;90;100;8\r\n";

    let response = drive(Arc::new(WialonIpsProtocol::new()), Arc::new(bus), &[login, data]).await;
    assert!(response.starts_with(b"#AL#"));

    let positions = subscriber.positions.lock().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].device_id, "123456789012345");
}

#[tokio::test]
async fn wialonips_unknown_packet_closes_session_without_event() {
    let subscriber = Arc::new(CapturingSubscriber::new());
    let mut bus = EventBus::new();
    bus.register(subscriber.clone());

    let response = drive(Arc::new(WialonIpsProtocol::new()), Arc::new(bus), &[b"#XX#garbage\r\n"]).await;
    assert!(response.is_empty());
    assert!(subscriber.positions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn detector_classifies_egts_stream_by_leading_byte() {
    let record = ServiceDataRecord::encode_position(1, 42, &sample_pos_data());
    let frame = EgtsPacket::encode_appdata(7, &[record]);
    assert_eq!(frame[0], 0x01);

    let bus = EventBus::new();
    let detector = Arc::new(DetectorProtocol::new(b"ack".to_vec()));
    let response = drive(detector, Arc::new(bus), &[&frame]).await;

    assert_eq!(response, b"ack".to_vec());
}

#[tokio::test]
async fn subscriber_receives_one_callback_per_position_per_publish() {
    let subscriber = Arc::new(CapturingSubscriber::new());
    let mut bus = EventBus::new();
    bus.register(subscriber.clone());
    let bus = Arc::new(bus);

    let position = Position::new("egts", "42", fleetlink::position::Location::xy(1.0, 2.0, true));
    bus.publish(Event::position(position.clone()), Duration::from_secs(1));
    bus.publish(Event::position(position.clone()), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let positions = subscriber.positions.lock().unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0], positions[1]);
}
