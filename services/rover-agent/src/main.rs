//! A scriptable rover launcher: opens one MissionLink session to push a message or file
//! to Mother Ship, and/or pushes a file to Mother Ship's TelemetryStream server. Intended
//! to be invoked once per reported event (by a cron job, a shell script, or a real rover's
//! own control loop), mirroring how `NMS_Agent` drove the two protocols from its own
//! command loop.

use clap::{App, Arg};
use groundlink::logging;
use mission_link::{Limits, MissionLink, Op, Payload};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

fn parse_op(raw: &str) -> Option<Op> {
    match raw {
        "register" => Some(Op::Register),
        "task" => Some(Op::Task),
        "metrics" => Some(Op::Metrics),
        "request" => Some(Op::Request),
        "progress" => Some(Op::Progress),
        "none" => None,
        other => panic!("unknown op: {}", other),
    }
}

pub fn main() {
    let matches = App::new("Rover Agent")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Sends one message or file to Mother Ship over MissionLink, and/or pushes a file over TelemetryStream.")
        .arg(Arg::with_name("server").long("server").takes_value(true).required(true).help("Mother Ship MissionLink address, e.g. 10.0.0.1:8080"))
        .arg(Arg::with_name("rover-id").long("rover-id").takes_value(true).required(true))
        .arg(Arg::with_name("mission-id").long("mission-id").takes_value(true).required(true))
        .arg(Arg::with_name("op").long("op").takes_value(true).default_value("none"))
        .arg(Arg::with_name("message").long("message").takes_value(true).conflicts_with("file"))
        .arg(Arg::with_name("file").long("file").takes_value(true).conflicts_with("message"))
        .arg(Arg::with_name("ts-server").long("ts-server").takes_value(true).requires("ts-file"))
        .arg(Arg::with_name("ts-file").long("ts-file").takes_value(true).requires("ts-server"))
        .get_matches();

    let log = logging::init_default();

    let server: SocketAddr = matches.value_of("server").unwrap().parse().expect("invalid --server address");
    let rover_id = matches.value_of("rover-id").unwrap().to_string();
    let mission_id = matches.value_of("mission-id").unwrap().to_string();
    let op = parse_op(matches.value_of("op").unwrap());

    if matches.value_of("message").is_some() || matches.value_of("file").is_some() {
        let payload = match matches.value_of("file") {
            Some(path) => Payload::File(PathBuf::from(path)),
            None => Payload::Inline(matches.value_of("message").unwrap_or("").as_bytes().to_vec()),
        };

        let ml = MissionLink::new(
            "0.0.0.0:0".parse().unwrap(),
            std::env::temp_dir(),
            Limits::default(),
            log.new(logging::o!("component" => "mission-link")),
        )
        .expect("failed to open mission-link socket");

        ml.send(server, op, &rover_id, &mission_id, payload).expect("mission-link send failed");
        logging::info!(log, "message sent"; "server" => server.to_string(), "rover_id" => &rover_id, "mission_id" => &mission_id);
    }

    if let (Some(ts_server), Some(ts_file)) = (matches.value_of("ts-server"), matches.value_of("ts-file")) {
        let ts_addr: SocketAddr = ts_server.parse().expect("invalid --ts-server address");
        let path = Path::new(ts_file);
        let filename = path.file_name().and_then(|f| f.to_str()).expect("--ts-file has no utf-8 filename");
        telemetry_stream::send_file(ts_addr, path, filename, Limits::default().buffer_size).expect("telemetry-stream send failed");
        logging::info!(log, "file pushed"; "ts_server" => ts_addr.to_string(), "filename" => filename);
    }
}
