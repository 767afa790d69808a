//! PostgREST-style HTTP implementation of [`CaptionStore`] and [`VoteStore`].
//!
//! Every request carries the project `apikey` header.  Reads authenticate with
//! the session bearer when there is one and fall back to the anon key; writes
//! require a session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::StoreConfig;
use crate::session::Session;

use super::model::{Caption, CaptionRow, NewVote, VoteChange, VoteRow, VoteValue};
use super::{CaptionStore, StoreError, VoteStore};

const CAPTION_COLUMNS: &str = "id,content,created_datetime_utc,like_count,images(url)";

/// Data store client over the REST interface.
pub struct RestStore {
    client: reqwest::Client,
    config: StoreConfig,
    session: Arc<dyn Session>,
}

impl RestStore {
    pub fn from_config(config: &StoreConfig, session: Arc<dyn Session>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            session,
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{name}", self.config.base_url.trim_end_matches('/'))
    }

    fn authed(&self, builder: reqwest::RequestBuilder, bearer: &str) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    /// Bearer for reads: the session token, or the anon key when signed out.
    async fn read_bearer(&self) -> String {
        match self.session.bearer_token().await {
            Ok(token) => token,
            Err(_) => self.config.anon_key.clone(),
        }
    }

    fn latest_captions_request(&self, bearer: &str, limit: usize) -> reqwest::RequestBuilder {
        self.authed(self.client.get(self.table("captions")), bearer)
            .query(&[
                ("select", CAPTION_COLUMNS.to_string()),
                ("image_id", "not.is.null".to_string()),
                ("order", "created_datetime_utc.desc".to_string()),
                ("limit", limit.to_string()),
            ])
    }

    fn votes_by_request(
        &self,
        bearer: &str,
        voter_id: &str,
        caption_ids: &[String],
    ) -> reqwest::RequestBuilder {
        self.authed(self.client.get(self.table("caption_votes")), bearer)
            .query(&[
                ("select", "caption_id,vote_value".to_string()),
                ("profile_id", format!("eq.{voter_id}")),
                ("caption_id", format!("in.({})", caption_ids.join(","))),
            ])
    }

    fn insert_request(
        &self,
        bearer: &str,
        caption_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> reqwest::RequestBuilder {
        let now = Utc::now();
        self.authed(self.client.post(self.table("caption_votes")), bearer)
            .header("Prefer", "return=minimal")
            .json(&NewVote {
                vote_value: value,
                profile_id: voter_id,
                caption_id,
                created_datetime_utc: now,
                modified_datetime_utc: now,
            })
    }

    fn update_request(
        &self,
        bearer: &str,
        caption_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> reqwest::RequestBuilder {
        self.authed(self.client.patch(self.table("caption_votes")), bearer)
            .header("Prefer", "return=minimal")
            .query(&vote_filter(caption_id, voter_id))
            .json(&VoteChange {
                vote_value: value,
                modified_datetime_utc: Utc::now(),
            })
    }

    fn delete_request(&self, bearer: &str, caption_id: &str, voter_id: &str) -> reqwest::RequestBuilder {
        self.authed(self.client.delete(self.table("caption_votes")), bearer)
            .query(&vote_filter(caption_id, voter_id))
    }
}

fn vote_filter(caption_id: &str, voter_id: &str) -> [(&'static str, String); 2] {
    [
        ("caption_id", format!("eq.{caption_id}")),
        ("profile_id", format!("eq.{voter_id}")),
    ]
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

#[async_trait]
impl CaptionStore for RestStore {
    async fn latest_captions(&self, limit: usize) -> Result<Vec<Caption>, StoreError> {
        let bearer = self.read_bearer().await;
        let response = self.latest_captions_request(&bearer, limit).send().await?;
        let rows: Vec<CaptionRow> = ensure_success(response).await?.json().await?;
        Ok(rows.into_iter().map(Caption::from).collect())
    }

    async fn votes_by(
        &self,
        voter_id: &str,
        caption_ids: &[String],
    ) -> Result<HashMap<String, VoteValue>, StoreError> {
        if caption_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let bearer = self.read_bearer().await;
        let response = self
            .votes_by_request(&bearer, voter_id, caption_ids)
            .send()
            .await?;
        let rows: Vec<VoteRow> = ensure_success(response).await?.json().await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.caption_id, row.vote_value))
            .collect())
    }
}

#[async_trait]
impl VoteStore for RestStore {
    async fn insert_vote(
        &self,
        caption_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> Result<(), StoreError> {
        let bearer = self.session.bearer_token().await?;
        let response = self
            .insert_request(&bearer, caption_id, voter_id, value)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn update_vote(
        &self,
        caption_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> Result<(), StoreError> {
        let bearer = self.session.bearer_token().await?;
        let response = self
            .update_request(&bearer, caption_id, voter_id, value)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_vote(&self, caption_id: &str, voter_id: &str) -> Result<(), StoreError> {
        let bearer = self.session.bearer_token().await?;
        let response = self
            .delete_request(&bearer, caption_id, voter_id)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AuthError, StaticSession};
    use reqwest::header::AUTHORIZATION;

    fn store(session: StaticSession) -> RestStore {
        RestStore::from_config(
            &StoreConfig {
                base_url: "https://db.example/".into(),
                anon_key: "anon".into(),
                feed_limit: 20,
                timeout_secs: 5,
            },
            Arc::new(session),
        )
    }

    fn query(request: &reqwest::Request) -> HashMap<String, String> {
        request.url().query_pairs().into_owned().collect()
    }

    fn body_json(request: &reqwest::Request) -> serde_json::Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).expect("buffered body");
        serde_json::from_slice(bytes).expect("json body")
    }

    #[test]
    fn latest_captions_query() {
        let store = store(StaticSession::anonymous());
        let request = store.latest_captions_request("anon", 20).build().unwrap();

        assert_eq!(request.url().path(), "/rest/v1/captions");
        let q = query(&request);
        assert_eq!(q["select"], CAPTION_COLUMNS);
        assert_eq!(q["image_id"], "not.is.null");
        assert_eq!(q["order"], "created_datetime_utc.desc");
        assert_eq!(q["limit"], "20");
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer anon");
    }

    #[test]
    fn votes_by_query_filters_voter_and_captions() {
        let store = store(StaticSession::anonymous());
        let ids = vec!["c1".to_string(), "c2".to_string()];
        let request = store.votes_by_request("tok", "u1", &ids).build().unwrap();

        let q = query(&request);
        assert_eq!(q["profile_id"], "eq.u1");
        assert_eq!(q["caption_id"], "in.(c1,c2)");
        assert_eq!(q["select"], "caption_id,vote_value");
    }

    #[test]
    fn insert_body_carries_vote_and_timestamps() {
        let store = store(StaticSession::anonymous());
        let request = store
            .insert_request("tok", "c1", "u1", VoteValue::Down)
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/rest/v1/caption_votes");
        let body = body_json(&request);
        assert_eq!(body["vote_value"], -1);
        assert_eq!(body["caption_id"], "c1");
        assert_eq!(body["profile_id"], "u1");
        assert_eq!(body["created_datetime_utc"], body["modified_datetime_utc"]);
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn update_and_delete_filter_by_caption_and_voter() {
        let store = store(StaticSession::anonymous());

        let update = store
            .update_request("tok", "c9", "u1", VoteValue::Up)
            .build()
            .unwrap();
        assert_eq!(update.method(), reqwest::Method::PATCH);
        let q = query(&update);
        assert_eq!(q["caption_id"], "eq.c9");
        assert_eq!(q["profile_id"], "eq.u1");
        let body = body_json(&update);
        assert_eq!(body["vote_value"], 1);
        assert!(body.get("created_datetime_utc").is_none());

        let delete = store.delete_request("tok", "c9", "u1").build().unwrap();
        assert_eq!(delete.method(), reqwest::Method::DELETE);
        assert_eq!(query(&delete), q);
    }

    #[tokio::test]
    async fn reads_fall_back_to_anon_key() {
        let signed_out = store(StaticSession::anonymous());
        assert_eq!(signed_out.read_bearer().await, "anon");

        let signed_in = store(StaticSession::new(Some("u1".into()), Some("tok".into())));
        assert_eq!(signed_in.read_bearer().await, "tok");
    }

    #[tokio::test]
    async fn writes_require_a_session() {
        let store = store(StaticSession::anonymous());
        let err = store.delete_vote("c1", "u1").await.unwrap_err();
        assert_eq!(err, StoreError::Auth(AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn empty_caption_list_skips_request() {
        let store = store(StaticSession::anonymous());
        assert!(store.votes_by("u1", &[]).await.unwrap().is_empty());
    }
}
