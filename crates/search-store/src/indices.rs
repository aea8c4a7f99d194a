use models::ReindexOptions;
use serde_json::{json, Value};

use crate::{Error, SearchStore};

#[derive(serde::Deserialize)]
struct ReindexResponse {
    #[serde(default)]
    failures: Vec<Value>,
}

impl SearchStore {
    /// True when an index or alias of this name exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool, Error> {
        let path = format!("/{name}");
        let response = self.http.head(self.url(&path)?).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check("HEAD", &path, response).await?;
        Ok(true)
    }

    /// Create a physical index carrying `mapping`, optionally aliased in the
    /// same call so the alias never observes a half-created index.
    pub async fn create_index(
        &self,
        name: &str,
        mapping: &Value,
        alias: Option<&str>,
    ) -> Result<(), Error> {
        let mut body = mapping.clone();
        if let (Some(alias), Some(object)) = (alias, body.as_object_mut()) {
            object.insert("aliases".to_string(), json!({alias: {}}));
        }

        let path = format!("/{name}");
        let response = self.http.put(self.url(&path)?).json(&body).send().await?;
        Self::check("PUT", &path, response).await?;
        Ok(())
    }

    /// Delete a physical index. Deleting an index that's already gone is not
    /// an error.
    pub async fn delete_index(&self, name: &str) -> Result<(), Error> {
        let path = format!("/{name}?ignore_unavailable=true");
        let response = self.http.delete(self.url(&path)?).send().await?;
        Self::check("DELETE", &path, response).await?;
        Ok(())
    }

    /// The physical indexes currently backing an alias; empty when the alias
    /// does not exist.
    pub async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, Error> {
        let path = format!("/_alias/{alias}");
        let response = self.http.get(self.url(&path)?).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::check("GET", &path, response).await?;

        let body: serde_json::Map<String, Value> = response.json().await?;
        let mut targets: Vec<String> = body.into_iter().map(|(index, _)| index).collect();
        targets.sort();
        Ok(targets)
    }

    /// Atomically retarget an alias: every `remove` index is detached and
    /// `add` is attached in one engine call, so a search through the alias
    /// always observes exactly one consistent index.
    pub async fn swap_alias(
        &self,
        alias: &str,
        remove: &[String],
        add: &str,
    ) -> Result<(), Error> {
        let body = alias_actions(alias, remove, add);
        let path = "/_aliases";
        let response = self.http.post(self.url(path)?).json(&body).send().await?;
        Self::check("POST", path, response).await?;
        Ok(())
    }

    /// Copy every document of `source` into `dest`. Per-document failures
    /// reported by the engine fail the whole operation.
    pub async fn reindex(
        &self,
        source: &str,
        dest: &str,
        options: ReindexOptions,
    ) -> Result<(), Error> {
        let body = reindex_body(source, dest, options);
        let path = format!(
            "/_reindex?refresh=true&wait_for_completion={}",
            options.wait_for_completion
        );
        let response = self.http.post(self.url(&path)?).json(&body).send().await?;
        let response = Self::check("POST", &path, response).await?;

        let reindexed: ReindexResponse = response.json().await?;
        if !reindexed.failures.is_empty() {
            return Err(Error::ReindexFailures {
                source_index: source.to_string(),
                dest: dest.to_string(),
                failures: serde_json::to_string(&reindexed.failures).unwrap_or_default(),
            });
        }
        Ok(())
    }
}

pub(crate) fn alias_actions(alias: &str, remove: &[String], add: &str) -> Value {
    let mut actions: Vec<Value> = remove
        .iter()
        .map(|index| json!({"remove": {"index": index, "alias": alias}}))
        .collect();
    actions.push(json!({"add": {"index": add, "alias": alias}}));
    json!({"actions": actions})
}

pub(crate) fn reindex_body(source: &str, dest: &str, options: ReindexOptions) -> Value {
    json!({
        "source": {"index": source},
        "dest": {"index": dest},
        "conflicts": options.conflicts,
    })
}

#[cfg(test)]
mod test {
    use models::Conflicts;

    use super::*;

    #[test]
    fn alias_swap_is_one_atomic_action_list() {
        let body = alias_actions(
            "orders",
            &["orders_old_a".to_string(), "orders_old_b".to_string()],
            "orders_new",
        );
        assert_eq!(
            body,
            json!({
                "actions": [
                    {"remove": {"index": "orders_old_a", "alias": "orders"}},
                    {"remove": {"index": "orders_old_b", "alias": "orders"}},
                    {"add": {"index": "orders_new", "alias": "orders"}},
                ]
            })
        );
    }

    #[test]
    fn reindex_body_carries_conflict_mode() {
        let body = reindex_body("orders", "orders_new", ReindexOptions::default());
        assert_eq!(
            body,
            json!({
                "source": {"index": "orders"},
                "dest": {"index": "orders_new"},
                "conflicts": "proceed",
            })
        );

        let body = reindex_body(
            "orders",
            "orders_new",
            ReindexOptions {
                wait_for_completion: true,
                conflicts: Conflicts::Abort,
            },
        );
        assert_eq!(body["conflicts"], json!("abort"));
    }
}
