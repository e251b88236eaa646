use crate::config::KernelConfig;
use crate::health::HealthTracker;
use crate::queue::CheckQueue;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::task;
use tracing::{debug, error, info};

/// S'abonne au topic des checks et pousse chaque payload brut dans la file.
/// Le décodage se fait côté worker, l'event loop ne bloque jamais.
pub fn spawn_mqtt_listener(cfg: &KernelConfig, queue: CheckQueue, health: HealthTracker) {
    let topic = cfg.mqtt_topic.clone();
    let mut opts = MqttOptions::new("nscapi-kernel", &cfg.mqtt_host, cfg.mqtt_port);
    opts.set_keep_alive(Duration::from_secs(15));

    task::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(opts, 10);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    // clean session : on se réabonne à chaque (re)connexion
                    if let Err(e) = client.try_subscribe(&topic, QoS::AtLeastOnce) {
                        error!("[mqtt] subscribe {} failed: {:?}", topic, e);
                        continue;
                    }
                    health.mark_mqtt_connected();
                    info!("[mqtt] connected, listening on {}", topic);
                }
                // un seul abonnement : tout publish est un check (wildcards acceptés)
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    debug!("[mqtt] {} bytes on {}", p.payload.len(), p.topic);
                    queue.enqueue(p.payload.to_vec());
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[mqtt] connection error: {:?}", e);
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
