use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::document::from_document;
use crate::database::pipeline::{Filter, Lookup, SortKey, Stage};
use crate::database::table_names::SUBSCRIPTION_TABLE_NAME;
use crate::database::transaction::with_timeout;
use crate::entities::association::{RelationKind, ToggleResult};
use crate::entities::user::{self, UserView};
use crate::interfaces::document_store::DocumentStore;
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::get_str_id;
use crate::services::toggle_service::ToggleService;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSubscribers {
    pub count: usize,
    pub subscribers: Vec<UserView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribedChannels {
    pub count: usize,
    pub channels: Vec<UserView>,
}

pub struct SubscriptionService<'a> {
    store: &'a dyn DocumentStore,
    toggle: ToggleService<'a>,
    timeout: Duration,
}

impl<'a> SubscriptionService<'a> {
    pub fn new(store: &'a dyn DocumentStore, timeout: Duration) -> Self {
        Self {
            store,
            toggle: ToggleService::new(store, timeout),
            timeout,
        }
    }

    pub async fn toggle_subscription(&self, actor_id: &str, channel_id: &str) -> AppResult<ToggleResult> {
        self.toggle
            .toggle(actor_id, channel_id, RelationKind::Subscription)
            .await
    }

    pub async fn channel_subscribers(&self, channel_id: &str) -> AppResult<ChannelSubscribers> {
        let channel = get_str_id(channel_id, user::TABLE_NAME)?;
        let subscribers = self.joined_users(&channel, "subject", "actor").await?;
        Ok(ChannelSubscribers {
            count: subscribers.len(),
            subscribers,
        })
    }

    /// Channels `subscriber_id` follows. Only visible to that user.
    pub async fn subscribed_channels(
        &self,
        actor_id: &str,
        subscriber_id: &str,
    ) -> AppResult<SubscribedChannels> {
        let subscriber = get_str_id(subscriber_id, user::TABLE_NAME)?;
        if actor_id != subscriber {
            return Err(AppError::Forbidden);
        }
        let channels = self.joined_users(&subscriber, "actor", "subject").await?;
        Ok(SubscribedChannels {
            count: channels.len(),
            channels,
        })
    }

    /// Users on the `join_field` side of every subscription whose `match_field` is `user_id`.
    async fn joined_users(
        &self,
        user_id: &str,
        match_field: &str,
        join_field: &str,
    ) -> AppResult<Vec<UserView>> {
        with_timeout(self.timeout, self.load_joined_users(user_id, match_field, join_field)).await
    }

    async fn load_joined_users(
        &self,
        user_id: &str,
        match_field: &str,
        join_field: &str,
    ) -> AppResult<Vec<UserView>> {
        if self.store.find_by_id(user::TABLE_NAME, user_id).await?.is_none() {
            return Err(AppError::SubjectNotFound {
                ident: user_id.to_string(),
            });
        }
        let stages = vec![
            Stage::Match(Filter::eq(match_field, user_id)),
            Stage::Sort(vec![SortKey::desc("created_at"), SortKey::asc("id")]),
            Stage::Lookup(Lookup::new(user::TABLE_NAME, join_field, "user", user::PUBLIC_FIELDS)),
            Stage::Project(vec!["user".to_string()]),
        ];
        self.store
            .aggregate(SUBSCRIPTION_TABLE_NAME, &stages)
            .await?
            .into_iter()
            .filter_map(|mut row| match row.remove("user") {
                Some(Value::Object(user)) => Some(from_document(user)),
                _ => None,
            })
            .collect()
    }
}
