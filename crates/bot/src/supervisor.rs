use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{error, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Keeps the long-running services alive: every registered actor sends
/// heartbeats, and one that goes quiet is aborted and rebuilt from its
/// factory.
pub struct Supervisor {
    factories: HashMap<ActorType, ActorFactory>,
    ids: HashMap<Uuid, ActorType>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            ids: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.factories.insert(actor_type, factory);
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        let timeout_duration = Duration::from_secs(3);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let registered: Vec<ActorType> = self.factories.keys().copied().collect();
        for actor_type in registered {
            self.spawn_actor(actor_type, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(id) => {
                            if let Some(&actor_type) = self.ids.get(&id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(id) => {
                            if let Some(actor_type) = self.ids.remove(&id) {
                                warn!("{:?} is shutting down gracefully", actor_type);
                                self.pulses.remove(&actor_type);
                                if let Some(handle) = self.handles.remove(&actor_type) {
                                    handle.abort();
                                }
                            }
                        }
                        ControlMessage::Error(id, error_msg) => {
                            error!("actor {} reported: {}", id, error_msg);
                            if let Some(&actor_type) = self.ids.get(&id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let dead_cutoff = Instant::now() - timeout_duration;
                    let dead: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|&(_, &pulse)| pulse < dead_cutoff)
                        .map(|(&actor_type, _)| actor_type)
                        .collect();

                    for actor_type in dead {
                        warn!("{:?} is unresponsive, restarting", actor_type);
                        if let Some(handle) = self.handles.remove(&actor_type) {
                            handle.abort();
                        }
                        self.ids.retain(|_, t| *t != actor_type);
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let mut actor = self.factories[&actor_type]();
        self.ids.insert(actor.id(), actor_type);
        let handle = tokio::spawn(async move {
            if let Err(e) = actor.run(tx).await {
                error!("actor {:?} crashed: {}", actor_type, e);
            }
        });
        self.handles.insert(actor_type, handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}
