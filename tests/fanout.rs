use peachy_social::server::*;
use peachy_social::settings::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    server: Server,
    broker: Arc<LocalBroker>,
    wire: LocalSubscription,
}

fn seed(id: &str, name: &str, phone: &str) -> SeedUser {
    SeedUser {
        id: id.to_owned(),
        user_name: name.to_owned(),
        real_name: String::new(),
        avatar: String::new(),
        phone: phone.to_owned(),
        email: String::new(),
    }
}

async fn start() -> Harness {
    let settings = Settings {
        log: Log {
            filter: "info".to_owned(),
        },
        store: Store {
            backend: "memory".to_owned(),
            dsn: String::new(),
            seed_users: vec![
                seed("u1", "alice", "100"),
                seed("u2", "bob", "200"),
                seed("u3", "carol", "300"),
            ],
        },
        broker: Broker {
            backend: "local".to_owned(),
            dsn: String::new(),
            topic_prefix: "social".to_owned(),
            client_id: "it".to_owned(),
        },
    };
    let server = Server::try_new(&settings).await.unwrap();
    let broker = server.local_broker.clone().unwrap();
    let wire = broker.subscribe("#");
    Harness {
        server,
        broker,
        wire,
    }
}

struct Answer {
    ok: bool,
    body: Vec<u8>,
    events: Vec<BrokerMessage>,
}

impl Answer {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    fn event_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.events.iter().map(|m| m.topic.clone()).collect();
        topics.sort();
        topics
    }
}

impl Harness {
    /// Publishes one request and collects everything up to its reply.
    async fn call(&mut self, caller: &str, action: &str, rid: &str, body: &[u8]) -> Answer {
        let topic = format!("social/{action}/{caller}/{rid}");
        self.broker.publish(&topic, body).await.unwrap();

        let success = format!("{caller}/reply/success/{rid}");
        let failure = format!("{caller}/reply/error/{rid}");
        let mut events = Vec::new();
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), self.wire.recv())
                .await
                .expect("no reply in time")
                .expect("broker closed");
            if message.topic.starts_with("social/") {
                continue;
            }
            if message.topic == success || message.topic == failure {
                return Answer {
                    ok: message.topic == success,
                    body: message.payload,
                    events,
                };
            }
            events.push(message);
        }
    }

    async fn call_json(&mut self, caller: &str, action: &str, rid: &str, body: Value) -> Answer {
        self.call(caller, action, rid, body.to_string().as_bytes()).await
    }
}

#[tokio::test]
async fn friend_request_round_trip() {
    let mut h = start().await;

    let found = h.call("u1", "friend/search", "1", b"bob").await;
    assert!(found.ok);
    assert_eq!(found.json()["id"], "u2");

    let sent = h
        .call_json("u1", "friend/add", "2", json!({"fromUserId": "u1", "toUserId": "u2"}))
        .await;
    assert!(sent.ok);
    assert_eq!(sent.json()["id"], "u2u1");
    assert_eq!(sent.event_topics().len(), 2);
    let to_bob = sent
        .events
        .iter()
        .find(|m| m.topic.starts_with("u2/friend/change/"))
        .unwrap();
    let body: Value = serde_json::from_slice(&to_bob.payload).unwrap();
    assert_eq!(body["info"]["id"], "u1");
    assert_eq!(body["status"]["statusB"], 1);

    let pending = h.call("u2", "friend/quasiFriends", "3", b"").await;
    assert_eq!(pending.json().as_array().unwrap().len(), 1);

    let accepted = h
        .call_json("u2", "friend/add", "4", json!({"fromUserId": "u2", "toUserId": "u1"}))
        .await;
    assert_eq!(accepted.json()["statusA"], 1);
    assert_eq!(accepted.json()["statusB"], 1);

    let friends = h.call("u1", "friend/myFriends", "5", b"").await;
    assert_eq!(friends.json()[0]["userName"], "bob");

    h.server.shutdown().await;
}

#[tokio::test]
async fn forged_sender_is_rejected_without_side_effects() {
    let mut h = start().await;

    let forged = h
        .call_json("u3", "friend/add", "1", json!({"fromUserId": "u1", "toUserId": "u2"}))
        .await;
    assert!(!forged.ok);
    assert!(forged.events.is_empty());

    let pending = h.call("u2", "friend/quasiFriends", "2", b"").await;
    assert_eq!(pending.json(), json!([]));

    let garbage = h.call("u1", "friend/add", "3", b"{not json").await;
    assert!(!garbage.ok);
    assert!(garbage.text().starts_with("bad request"));

    h.server.shutdown().await;
}

#[tokio::test]
async fn group_lifecycle_notifies_every_affected_member() {
    let mut h = start().await;

    let created = h
        .call_json("u1", "group/create", "1", json!({"name": "hikers", "memberIds": ["u2"]}))
        .await;
    assert!(created.ok);
    let group_id = created.json()["id"].as_str().unwrap().to_owned();
    assert_eq!(
        created.event_topics(),
        [
            format!("u1/group/create/{group_id}"),
            format!("u2/group/create/{group_id}"),
        ]
    );

    // u2 is swapped for u3; u2 must still hear about it
    let updated = h
        .call_json(
            "u1",
            "group/update",
            "2",
            json!({"id": group_id, "name": "climbers", "memberIds": ["u1", "u3"]}),
        )
        .await;
    assert!(updated.ok);
    assert_eq!(
        updated.event_topics(),
        [
            format!("u1/group/update/{group_id}"),
            format!("u2/group/update/{group_id}"),
            format!("u3/group/update/{group_id}"),
        ]
    );

    let denied = h
        .call("u3", "group/delete", "3", group_id.as_bytes())
        .await;
    assert!(!denied.ok);
    assert_eq!(denied.text(), "not an owner");

    let exited = h
        .call_json(
            "u3",
            "group/exitGroup",
            "4",
            json!({"groupId": group_id, "list": [{"id": "u3", "name": "carol"}]}),
        )
        .await;
    assert!(exited.ok);
    assert_eq!(exited.events.len(), 2);

    let fetched = h.call("u1", "group/get", "5", group_id.as_bytes()).await;
    assert_eq!(fetched.json()["memberIds"], json!(["u1"]));
    assert_eq!(fetched.json()["name"], "climbers");

    let deleted = h
        .call("u1", "group/delete", "6", group_id.as_bytes())
        .await;
    assert!(deleted.ok);
    assert_eq!(deleted.events.len(), 1);

    let missing = h.call("u1", "group/get", "7", group_id.as_bytes()).await;
    assert_eq!(missing.text(), "group not found");

    h.server.shutdown().await;
}

#[tokio::test]
async fn unknown_users_get_an_error_reply_and_no_fan_out() {
    let mut h = start().await;

    let unfriend = h
        .call_json("u1", "friend/delete", "1", json!({"fromUserId": "u1", "toUserId": "ghost"}))
        .await;
    assert!(!unfriend.ok);
    assert!(unfriend.text().starts_with("bad request"));
    assert!(unfriend.events.is_empty());

    let created = h
        .call_json("u1", "group/create", "2", json!({"name": "hikers", "memberIds": ["u2", "ghost"]}))
        .await;
    assert!(!created.ok);
    assert!(created.events.is_empty());

    let groups = h.call("u2", "group/query", "3", b"").await;
    assert_eq!(groups.json(), json!([]));

    h.server.shutdown().await;
}
