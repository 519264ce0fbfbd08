extern crate redis;

use redis::{Client, Commands};
use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration as STDDuration;

use serde::Serialize;
use uuid::Uuid;

use crate::publisher::RedisMessage;
use crate::storage::storage::ThreadedDataStorage;
use crate::vision::team::Team;
use crate::vision::types::{BoundingBox, TypeFlags};

pub struct RedisConnection {
    pub channel_name: String,
    pub client: Arc<Client>,
}

impl RedisConnection {
    pub fn new(host: String, port: i32, db_index: i32) -> RedisConnection {
        let client = Client::open(format!("redis://{}:{}/{}", host, port, db_index)).unwrap();
        RedisConnection {
            channel_name: "PITCHTRACK_OBJECTS".to_string(),
            client: Arc::new(client),
        }
    }

    pub fn new_with_password(host: String, port: i32, db_index: i32, password: String) -> RedisConnection {
        let client = Client::open(format!("redis://:{}@{}:{}/{}", password, host, port, db_index)).unwrap();
        RedisConnection {
            channel_name: "PITCHTRACK_OBJECTS".to_string(),
            client: Arc::new(client),
        }
    }

    pub fn set_channel(&mut self, channel_name: String) {
        self.channel_name = channel_name;
    }

    pub fn publish(&self, msg: &dyn RedisMessage) -> Result<(), Box<dyn Error>> {
        println!("Trying to send data...");
        let mut redis_conn = match self.client.get_connection() {
            Ok(conn) => conn,
            Err(err) => {
                return Err(err.into());
            }
        };
        let msg_string = msg.prepare_string()?;
        redis_conn.publish(self.channel_name.to_owned(), msg_string)?;
        println!("\t...Success");
        Ok(())
    }

    /// Publishes the current tracked-object snapshot every `millis` milliseconds.
    pub fn start_worker(&self, data: ThreadedDataStorage, millis: u64) {
        thread::sleep(STDDuration::from_millis(millis));
        loop {
            let data_guard = data.read().expect("DataStorage is poisoned [RWLock]");
            let objects_guard = data_guard.objects.read().expect("DataStorage.objects poisoned [RWLock]");
            let teams_guard = data_guard.teams.read().expect("DataStorage.teams poisoned [RWLock]");
            let frame_index = *data_guard.frame_index.read().expect("DataStorage.frame_index poisoned [RWLock]");

            let message = TrackedObjectsMessage {
                equipment_id: data_guard.id.clone(),
                frame_index,
                objects: objects_guard
                    .iter()
                    .map(|obj| TrackedObjectMessage {
                        id: obj.id,
                        bbox: obj.bbox,
                        type_flags: obj.type_flags,
                        team: obj.team.or_else(|| teams_guard.get(&obj.id).copied()),
                    })
                    .collect(),
            };
            drop(teams_guard);
            drop(objects_guard);
            drop(data_guard);

            if let Err(err) = self.publish(&message) {
                println!("Errors while sending data to Redis: {}", err);
            }
            thread::sleep(STDDuration::from_millis(millis));
        }
    }
}

/// Per-frame summary published to Redis: the equipment id plus the current
/// tracked-object list, matching the REST API's `/api/objects` shape.
#[derive(Debug, Serialize)]
pub struct TrackedObjectsMessage {
    pub equipment_id: String,
    pub frame_index: u64,
    pub objects: Vec<TrackedObjectMessage>,
}

#[derive(Debug, Serialize)]
pub struct TrackedObjectMessage {
    pub id: Uuid,
    pub bbox: BoundingBox,
    pub type_flags: TypeFlags,
    pub team: Option<Team>,
}

impl RedisMessage for TrackedObjectsMessage {
    fn prepare_string(&self) -> Result<String, Box<dyn Error>> {
        let json = serde_json::to_string(self)?;
        Ok(json)
    }
}
