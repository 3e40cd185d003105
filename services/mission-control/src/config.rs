use mission_link::Limits;
use serde_derive::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ml_bind: SocketAddr,
    pub ts_bind: SocketAddr,
    pub observation_bind: SocketAddr,
    pub store_dir: PathBuf,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            ml_bind: "0.0.0.0:8080".parse().unwrap(),
            ts_bind: "0.0.0.0:8081".parse().unwrap(),
            observation_bind: "0.0.0.0:8082".parse().unwrap(),
            store_dir: PathBuf::from("./mission-control-data"),
            limits: Limits::default(),
        }
    }
}
