use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Chaque option vient d'un flag ou de sa variable d'environnement
/// (`main` charge d'abord un éventuel `.env`).
#[derive(Debug, Clone, Parser)]
#[command(name = "nscapi-kernel", version, about = "Passive check cache with custom fields REST API")]
pub struct KernelConfig {
    /// IP d'écoute de l'API
    #[arg(long, env = "NSCAPI_API_IP", default_value = "0.0.0.0")]
    pub api_ip: IpAddr,

    /// Port d'écoute de l'API
    #[arg(long, env = "NSCAPI_API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    /// Broker MQTT qui publie les checks passifs
    #[arg(long, env = "NSCAPI_MQTT_HOST", default_value = "localhost")]
    pub mqtt_host: String,

    #[arg(long, env = "NSCAPI_MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    /// Topic : un check JSON par message
    #[arg(long, env = "NSCAPI_MQTT_TOPIC", default_value = "nscapi/checks@v1")]
    pub mqtt_topic: String,

    /// Racine des champs custom (common.yaml + service/<hostgroup>/<check>.yaml)
    #[arg(long, env = "NSCAPI_CUSTOM_FIELDS_ROOT", default_value = "./custom")]
    pub custom_fields_root: PathBuf,

    /// Dossier contenant root.html, servi sur GET /
    #[arg(long, env = "NSCAPI_TEMPLATES_ROOT", default_value = "./templates")]
    pub templates_root: PathBuf,
}

impl KernelConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.api_ip, self.api_port)
    }
}
