//! Walks two users through a friend request and a group over the in-process
//! broker, printing every message each client receives.
//!
//! $ cargo run --bin fanout_demo

use peachy_social::logger::*;
use peachy_social::server::*;
use peachy_social::settings::*;
use serde_json::json;
use std::time::Duration;

fn seed(id: &str, name: &str) -> SeedUser {
    SeedUser {
        id: id.to_owned(),
        user_name: name.to_owned(),
        real_name: name.to_uppercase(),
        avatar: String::new(),
        phone: String::new(),
        email: String::new(),
    }
}

async fn print_inbox(name: &str, inbox: &mut LocalSubscription) {
    // give the router a moment to fan out
    tokio::time::sleep(Duration::from_millis(50)).await;
    for message in inbox.drain() {
        println!(
            "[{name}] {} {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "warn".to_owned(),
    })?;

    let settings = Settings {
        log: Log {
            filter: "warn".to_owned(),
        },
        store: Store {
            backend: "memory".to_owned(),
            dsn: String::new(),
            seed_users: vec![seed("u1", "alice"), seed("u2", "bob")],
        },
        broker: Broker {
            backend: "local".to_owned(),
            dsn: String::new(),
            topic_prefix: "social".to_owned(),
            client_id: "demo".to_owned(),
        },
    };

    let server = Server::try_new(&settings).await?;
    let broker = server
        .local_broker
        .clone()
        .ok_or_else(|| anyhow::anyhow!("demo needs the local broker"))?;

    let mut alice = broker.subscribe("u1/#");
    let mut bob = broker.subscribe("u2/#");

    println!("-- alice sends a friend request");
    let body = json!({"fromUserId": "u1", "toUserId": "u2"}).to_string();
    broker.publish("social/friend/add/u1/1", body.as_bytes()).await?;
    print_inbox("alice", &mut alice).await;
    print_inbox("bob", &mut bob).await;

    println!("-- bob accepts");
    let body = json!({"fromUserId": "u2", "toUserId": "u1"}).to_string();
    broker.publish("social/friend/add/u2/1", body.as_bytes()).await?;
    print_inbox("alice", &mut alice).await;
    print_inbox("bob", &mut bob).await;

    println!("-- alice creates a group with bob");
    let body = json!({"name": "hikers", "memberIds": ["u2"]}).to_string();
    broker.publish("social/group/create/u1/2", body.as_bytes()).await?;
    print_inbox("alice", &mut alice).await;
    print_inbox("bob", &mut bob).await;

    println!("-- bob tries to delete it");
    broker.publish("social/group/delete/u2/2", b"no-such-group").await?;
    print_inbox("bob", &mut bob).await;

    server.shutdown().await;
    Ok(())
}
