use clap::{App, Arg};
use groundlink::logging;
use mission_control::{Config, RosterCallbacks};
use mission_link::MissionLink;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use telemetry_stream::TsServer;

pub fn main() {
    let matches = App::new("Mission Control")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Runs the Mother Ship: MissionLink accept loop, TelemetryStream server, observation endpoint placeholder.")
        .arg(Arg::with_name("CONFIG_FILE").help("Path to an optional TOML config file overriding the defaults").index(1))
        .get_matches();

    let config: Config = match matches.value_of("CONFIG_FILE") {
        Some(path) => groundlink::config::load(Some(Path::new(path))).expect("failed to load config file"),
        None => Config::default(),
    };

    let log = logging::init_default();
    logging::info!(log, "starting mission control";
        "ml_bind" => config.ml_bind.to_string(),
        "ts_bind" => config.ts_bind.to_string(),
        "observation_bind" => config.observation_bind.to_string());

    let roster = Arc::new(RosterCallbacks::new(log.new(logging::o!("component" => "roster"))));

    let ml = Arc::new(
        MissionLink::new(config.ml_bind, config.store_dir.clone(), config.limits.clone(), log.new(logging::o!("component" => "mission-link")))
            .expect("failed to bind mission-link socket"),
    );
    let ml_log = log.new(logging::o!("component" => "mission-link"));
    let ml_handle = {
        let ml = ml.clone();
        let roster = roster.clone();
        thread::spawn(move || loop {
            match ml.recv(roster.as_ref()) {
                Ok(received) => {
                    logging::debug!(ml_log, "session completed"; "rover_id" => &received.rover_id, "mission_id" => &received.mission_id);
                }
                Err(err) => {
                    logging::warn!(ml_log, "session failed"; "error" => err.to_string());
                }
            }
        })
    };

    let ts = Arc::new(
        TsServer::bind(config.ts_bind, config.store_dir.clone(), config.limits.buffer_size, log.new(logging::o!("component" => "telemetry-stream")))
            .expect("failed to bind telemetry-stream listener"),
    );
    let ts_handle = {
        let ts = ts.clone();
        let ts_log = log.new(logging::o!("component" => "telemetry-stream"));
        thread::spawn(move || {
            if let Err(err) = ts.run() {
                logging::warn!(ts_log, "telemetry-stream server stopped"; "error" => err.to_string());
            }
        })
    };

    // Observation HTTP API is out of scope for now; this placeholder just keeps the
    // "three long-running tasks" shape visible on the process.
    let observation_log = log.new(logging::o!("component" => "observation"));
    let observation_handle = thread::spawn(move || {
        logging::info!(observation_log, "observation endpoint not implemented, parking"; "bind" => config.observation_bind.to_string());
        loop {
            thread::park();
        }
    });

    ml_handle.join().expect("mission-link accept loop panicked");
    ts_handle.join().expect("telemetry-stream server panicked");
    observation_handle.join().expect("observation placeholder panicked");
}
