use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Dernier résultat connu d'un check (host, service).
/// Immuable une fois construit : le cache remplace des `Arc` entiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub timestamp: u32,
    /// Début de l'état courant (pas la création de l'entrée)
    pub status_first_seen: u32,
    pub state: i16,
    pub output: String,
}

/// Check passif décodé, tel que livré par la couche protocole
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckPacket {
    pub host: String,
    pub service: String,
    #[serde(default)]
    pub output: String,
    #[serde(default = "now_epoch")]
    pub timestamp: u32,
    pub state: i16,
}

fn now_epoch() -> u32 {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    u32::try_from(now).unwrap_or(u32::MAX)
}

pub type ServiceMap = HashMap<String, Arc<CheckResult>>;
pub type HostsMap = HashMap<String, ServiceMap>;

/// Champs custom d'un classifier, ou résultat d'un resolve
pub type FieldSet = BTreeMap<String, serde_json::Value>;

/// Libellé Nagios d'un code de statut
pub fn status_label(state: i16) -> &'static str {
    match state {
        0 => "OK",
        1 => "Warning",
        2 => "Critical",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_label() {
        assert_eq!(status_label(0), "OK");
        assert_eq!(status_label(1), "Warning");
        assert_eq!(status_label(2), "Critical");
        assert_eq!(status_label(3), "Unknown");
        assert_eq!(status_label(-1), "Unknown");
    }

    #[test]
    fn test_packet_from_json() {
        let p: CheckPacket = serde_json::from_str(
            r#"{"host":"web01","service":"disk","output":"DISK OK","timestamp":1484527962,"state":0}"#,
        )
        .unwrap();
        assert_eq!(p.host, "web01");
        assert_eq!(p.timestamp, 1484527962);

        // pas de timestamp -> heure de réception
        let p: CheckPacket =
            serde_json::from_str(r#"{"host":"web01","service":"disk","state":2}"#).unwrap();
        assert!(p.timestamp > 1_484_527_962);
        assert_eq!(p.output, "");
    }

    #[test]
    fn test_packet_rejects_out_of_range_state() {
        let res = serde_json::from_str::<CheckPacket>(
            r#"{"host":"web01","service":"disk","state":70000}"#,
        );
        assert!(res.is_err());
    }
}
