use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::server::topic::Action;
use crate::server::*;
use crate::settings::Settings;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Request topics this server answers.
pub const ROUTES: [Action; 15] = [
    Action::FriendSearch,
    Action::FriendMyFriends,
    Action::FriendQuasiFriends,
    Action::FriendAdd,
    Action::FriendIgnore,
    Action::FriendRefuse,
    Action::FriendDelete,
    Action::GroupQuery,
    Action::GroupGet,
    Action::GroupCreate,
    Action::GroupUpdate,
    Action::GroupDelete,
    Action::GroupAddMembers,
    Action::GroupDelMembers,
    Action::GroupExitGroup,
];

const LOCAL_BROKER_CAPACITY: usize = 1024;

struct Repos {
    user_repo: Arc<dyn UserRepo>,
    friendship_repo: Arc<dyn FriendshipRepo>,
    group_repo: Arc<dyn GroupRepo>,
    group_member_repo: Arc<dyn GroupMemberRepo>,
    tx_manager: Arc<dyn TxManager>,
}

pub struct Server {
    pub friend_service: Arc<dyn FriendService>,
    pub group_service: Arc<dyn GroupService>,
    /// Set for the `local` broker backend so clients in the same process
    /// can publish requests and subscribe to their namespace.
    pub local_broker: Option<Arc<LocalBroker>>,
    consumer_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);
        let cancel = CancellationToken::new();

        // region store
        let (repos, pool) = match settings.store.backend.as_str() {
            "memory" => {
                let store = MemoryStore::new();
                for seed in &settings.store.seed_users {
                    store.insert_user(seed.clone().into()).await;
                }
                let repos = Repos {
                    user_repo: Arc::new(MemoryUserRepo::new(store.clone())),
                    friendship_repo: Arc::new(MemoryFriendshipRepo::new(store.clone())),
                    group_repo: Arc::new(MemoryGroupRepo::new(store.clone())),
                    group_member_repo: Arc::new(MemoryGroupMemberRepo::new(store.clone())),
                    tx_manager: Arc::new(MemoryTxManager::new(store)),
                };
                (repos, None)
            }
            "mysql" => {
                let pool = Pool::<MySql>::connect(&settings.store.dsn).await?;
                let repos = Repos {
                    user_repo: Arc::new(MySqlUserRepo::new(pool.clone())),
                    friendship_repo: Arc::new(MySqlFriendshipRepo::new(pool.clone())),
                    group_repo: Arc::new(MySqlGroupRepo::new(pool.clone())),
                    group_member_repo: Arc::new(MySqlGroupMemberRepo::new(pool.clone())),
                    tx_manager: Arc::new(MySqlTxManager::new(pool.clone())),
                };
                (repos, Some(pool))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };
        // endregion

        let friend_service: Arc<dyn FriendService> = Arc::new(RealFriendService::new(
            repos.user_repo.clone(),
            repos.friendship_repo,
            repos.tx_manager.clone(),
        ));
        let group_service: Arc<dyn GroupService> = Arc::new(RealGroupService::new(
            repos.user_repo.clone(),
            repos.group_repo,
            repos.group_member_repo,
            repos.tx_manager,
        ));

        // region transport
        let (publisher, consumer, local_broker): (
            Arc<dyn EventPublisher>,
            Arc<dyn EventConsumer>,
            Option<Arc<LocalBroker>>,
        ) = match settings.broker.backend.as_str() {
            "local" => {
                let broker = Arc::new(LocalBroker::new(LOCAL_BROKER_CAPACITY, cancel.clone()));
                let publisher: Arc<dyn EventPublisher> = broker.clone();
                let consumer: Arc<dyn EventConsumer> = broker.clone();
                (publisher, consumer, Some(broker))
            }
            "redis" => {
                let publisher = RedisPublisher::connect(&settings.broker.dsn).await?;
                let consumer = RedisConsumer::new(
                    &settings.broker.dsn,
                    &format!("{}-{}", settings.broker.client_id, run_id),
                    cancel.clone(),
                )?;
                let publisher: Arc<dyn EventPublisher> = Arc::new(publisher);
                let consumer: Arc<dyn EventConsumer> = Arc::new(consumer);
                (publisher, consumer, None)
            }
            other => return Err(anyhow::anyhow!("Unknown broker backend: {}", other)),
        };

        let notifier = Arc::new(Notifier::new(publisher));
        let router = Arc::new(TopicRouter::new(
            &settings.broker.topic_prefix,
            &ROUTES,
            friend_service.clone(),
            group_service.clone(),
            notifier,
        ));
        let patterns = router.patterns();

        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(&patterns, router).await {
                error!("consumer stopped: {e:#}");
            }
        });

        if let Some(broker) = &local_broker {
            // the local consumer subscribes from inside its task
            tokio::time::timeout(Duration::from_secs(5), broker.consumer_ready())
                .await
                .map_err(|_| anyhow::anyhow!("local consumer did not subscribe"))?;
        }
        // endregion

        info!(%run_id, store = %settings.store.backend, broker = %settings.broker.backend, "server started");

        Ok(Self {
            friend_service,
            group_service,
            local_broker,
            consumer_handle: Mutex::new(Some(consumer_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self
            .consumer_handle
            .lock()
            .ok()
            .and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("consumer handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
