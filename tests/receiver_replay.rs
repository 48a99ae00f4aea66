mod common;

use std::time::Duration;

use tokio::sync::mpsc;

use common::{co2_frame, fixture};
use enocean_rx::enocean::FramerOptions;
use enocean_rx::pipeline::Pipeline;
use enocean_rx::profile::ProfileRegistry;
use enocean_rx::receiver::{ReadingSink, Receiver, ReceiverOptions};
use enocean_rx::source::ReplaySource;
use enocean_rx::Reading;

#[derive(Default)]
struct Collect(Vec<Reading>);

impl ReadingSink for Collect {
    fn on_reading(&mut self, reading: Reading) {
        self.0.push(reading);
    }
}

fn replay_opts() -> ReceiverOptions {
    ReceiverOptions {
        stop_when_exhausted: true,
        ..ReceiverOptions::default()
    }
}

fn pipeline() -> Pipeline {
    Pipeline::new(FramerOptions::default(), ProfileRegistry::with_defaults())
}

#[tokio::test]
async fn capture_file_end_to_end() {
    let source = ReplaySource::load(fixture("capture.hex")).await.unwrap();
    let (receiver, sink) =
        Receiver::start_with_sink(source, pipeline(), Collect::default(), replay_opts()).unwrap();
    let stats = receiver.stats();

    tokio::task::spawn_blocking(move || receiver.join())
        .await
        .unwrap()
        .unwrap();
    let Collect(readings) = sink.await.unwrap();

    let lines: Vec<String> = readings.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "[040189B8] 250ppm / 25.6°C / 25.0% (-74 dBm)",
            "[040189B8] 450ppm / 38.4°C / 50.0% (-61 dBm)",
        ]
    );
    assert!(readings[0].timestamp() <= readings[1].timestamp());

    let snap = stats.snapshot();
    assert_eq!(snap.bytes_received, 74);
    assert_eq!(snap.frames, 3);
    assert_eq!(snap.readings, 2);
    assert_eq!(snap.unknown_senders, 1);
    assert_eq!(snap.type_mismatches, 1);
    assert_eq!(snap.noise_bytes, 20);
}

#[tokio::test]
async fn small_reads_deliver_in_order() {
    let mut stream = Vec::new();
    for conc in 1..=20u8 {
        stream.extend_from_slice(&co2_frame(0x32, conc, 0x80));
    }
    let source = ReplaySource::from_stream(&stream, 5);
    let (receiver, sink) =
        Receiver::start_with_sink(source, pipeline(), Collect::default(), replay_opts()).unwrap();

    tokio::task::spawn_blocking(move || receiver.join())
        .await
        .unwrap()
        .unwrap();
    let Collect(readings) = sink.await.unwrap();

    let ppm: Vec<f64> = readings.iter().map(|r| r.value(0)).collect();
    let expected: Vec<f64> = (1..=20).map(|c| f64::from(c) * 10.0).collect();
    assert_eq!(ppm, expected);
}

#[tokio::test]
async fn close_stops_a_live_receiver() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let source = ReplaySource::new([co2_frame(0x32, 0x19, 0x80)]);
    let receiver = Receiver::start(source, pipeline(), tx, ReceiverOptions::default()).unwrap();

    let reading = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("reading within timeout")
        .expect("channel open");
    assert_eq!(reading.source_id(), "040189B8");

    // Source is drained but not finished; the reader idles until closed.
    let handle = receiver.handle();
    assert!(handle.is_running());
    handle.close();
    tokio::task::spawn_blocking(move || receiver.join())
        .await
        .unwrap()
        .unwrap();

    // Sender dropped with the thread.
    assert!(rx.recv().await.is_none());
}
