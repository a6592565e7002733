//! End-to-end demo driver: seeds roles/phases/a project/users, streams the
//! `carbon_fiber_demo` scenario through the running server, prints each
//! user's digest, changes the project phase and prints the reshuffle, then
//! exercises the feedback loop. Mirrors `original_source/app/sim/demo_runbook.py`
//! and `sim/client.py`, but drives everything over HTTP — this binary has no
//! access to the server's database, by design (§1 "out of scope" boundary
//! between core and outer surfaces applies to demo tooling too).

use std::time::Duration;

use digestline::model::DigestViewItem;
use serde_json::{json, Value};

struct SimClient {
    base_url: String,
    http: reqwest::Client,
}

impl SimClient {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

fn format_digest(items: &[DigestViewItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            format!(
                "{}. {} | why: {} | score: {:.3}",
                idx + 1,
                item.title,
                item.why_shown,
                item.score_breakdown.final_score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn diff_ranks(before: &[DigestViewItem], after: &[DigestViewItem]) -> String {
    let before_rank: std::collections::HashMap<&str, usize> = before
        .iter()
        .enumerate()
        .map(|(i, item)| (item.title.as_str(), i + 1))
        .collect();
    after
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            before_rank
                .get(item.title.as_str())
                .map(|prior| format!("- {} (rank {prior} -> {})", item.title, i + 1))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn find_thread<'a>(items: &'a [Value], contains: &str) -> anyhow::Result<&'a str> {
    items
        .iter()
        .find(|item| {
            item.get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_lowercase()
                .contains(&contains.to_lowercase())
        })
        .and_then(|item| item.get("thread_ts").and_then(|v| v.as_str()))
        .ok_or_else(|| anyhow::anyhow!("thread not found: {contains}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("SIM_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    let client = SimClient::new(base_url);

    client
        .post(
            "/roles",
            json!({"role_id": "role-me", "name": "ME", "description": "materials structures weight manufacturability"}),
        )
        .await?;
    client
        .post(
            "/roles",
            json!({"role_id": "role-supply", "name": "Supply", "description": "vendors lead times MOQ sourcing risk"}),
        )
        .await?;
    client
        .post(
            "/roles",
            json!({"role_id": "role-pm", "name": "PM", "description": "timeline decisions owners milestones"}),
        )
        .await?;

    client
        .post(
            "/phases",
            json!({"phase_key": "EVT", "description": "early prototype build, unblock near-term decisions"}),
        )
        .await?;
    client
        .post(
            "/phases",
            json!({"phase_key": "DVT", "description": "validation testing focus, reliability risks"}),
        )
        .await?;

    client
        .post(
            "/projects",
            json!({"project_id": "proj-drone", "name": "DroneV2", "current_phase": "EVT"}),
        )
        .await?;
    client
        .post("/projects/proj-drone/channels", json!({"channel_id": "C_DRONE_STRUCT"}))
        .await?;
    client
        .post("/projects/proj-drone/channels", json!({"channel_id": "C_DRONE_SUPPLY"}))
        .await?;

    client
        .post("/users", json!({"user_id": "U_MAYA", "name": "Maya", "role_id": "role-me"}))
        .await?;
    client
        .post("/users", json!({"user_id": "U_SAM", "name": "Sam", "role_id": "role-supply"}))
        .await?;
    client
        .post("/users", json!({"user_id": "U_PRIYA", "name": "Priya", "role_id": "role-pm"}))
        .await?;

    for user_id in ["U_MAYA", "U_SAM", "U_PRIYA"] {
        client
            .post(&format!("/users/{user_id}/channels"), json!({"channel_id": "C_DRONE_STRUCT"}))
            .await?;
        client
            .post(&format!("/users/{user_id}/channels"), json!({"channel_id": "C_DRONE_SUPPLY"}))
            .await?;
    }

    client
        .post("/simulate/start", json!({"scenario_id": "carbon_fiber_demo", "speed_multiplier": 5}))
        .await?;

    loop {
        let status = client.get("/simulate/status", &[]).await?;
        let emitted = status.get("emitted_count").and_then(Value::as_u64).unwrap_or(0);
        let running = status.get("running").and_then(Value::as_bool).unwrap_or(false);
        if !running && emitted > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    client.post("/simulate/stop", json!({})).await?;

    let digest_me: Vec<DigestViewItem> = serde_json::from_value(
        client
            .get("/digest", &[("user_id", "U_MAYA".into()), ("project_id", "proj-drone".into()), ("n", "5".into())])
            .await?,
    )?;
    let digest_supply: Vec<DigestViewItem> = serde_json::from_value(
        client
            .get("/digest", &[("user_id", "U_SAM".into()), ("project_id", "proj-drone".into()), ("n", "5".into())])
            .await?,
    )?;
    let digest_pm: Vec<DigestViewItem> = serde_json::from_value(
        client
            .get("/digest", &[("user_id", "U_PRIYA".into()), ("project_id", "proj-drone".into()), ("n", "5".into())])
            .await?,
    )?;

    println!("=== Digest: EVT (U_MAYA) ===\n{}", format_digest(&digest_me));
    println!("\n=== Digest: EVT (U_SAM) ===\n{}", format_digest(&digest_supply));
    println!("\n=== Digest: EVT (U_PRIYA) ===\n{}", format_digest(&digest_pm));

    client.post("/projects/proj-drone/phase", json!({"key": "DVT"})).await?;
    let digest_me_dvt: Vec<DigestViewItem> = serde_json::from_value(
        client
            .get("/digest", &[("user_id", "U_MAYA".into()), ("project_id", "proj-drone".into()), ("n", "5".into())])
            .await?,
    )?;
    let digest_supply_dvt: Vec<DigestViewItem> = serde_json::from_value(
        client
            .get("/digest", &[("user_id", "U_SAM".into()), ("project_id", "proj-drone".into()), ("n", "5".into())])
            .await?,
    )?;

    println!("\n=== Phase Change: EVT -> DVT ===");
    println!("U_MAYA\n{}", diff_ranks(&digest_me, &digest_me_dvt));
    println!("U_SAM\n{}", diff_ranks(&digest_supply, &digest_supply_dvt));

    let items = client.get("/items", &[("limit", "20".into())]).await?;
    let items = items.as_array().cloned().unwrap_or_default();
    let supply_thread = find_thread(&items, "Vendor A lead time")?.to_string();
    let rf_thread = find_thread(&items, "RF test risk")?.to_string();

    let score_before = digest_supply_dvt
        .iter()
        .find(|i| i.thread_ts == supply_thread)
        .map(|i| i.score_breakdown.final_score);

    client
        .post(
            "/feedback",
            json!({"user_id": "U_SAM", "project_id": "proj-drone", "thread_ts": supply_thread, "action": "thumbs_up"}),
        )
        .await?;
    client
        .post(
            "/feedback",
            json!({"user_id": "U_SAM", "project_id": "proj-drone", "thread_ts": rf_thread, "action": "dismiss"}),
        )
        .await?;

    let digest_supply_after: Vec<DigestViewItem> = serde_json::from_value(
        client
            .get("/digest", &[("user_id", "U_SAM".into()), ("project_id", "proj-drone".into()), ("n", "5".into())])
            .await?,
    )?;
    let score_after = digest_supply_after
        .iter()
        .find(|i| i.thread_ts == supply_thread)
        .map(|i| i.score_breakdown.final_score);

    println!("\n=== Feedback Learning ===");
    println!(
        "U_SAM score(vendor thread) before: {} after: {}",
        score_before.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".into()),
        score_after.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".into()),
    );

    Ok(())
}
