//! 流水线集成测试：四个 Agent 串联，覆盖后端禁用 / 出错 / 输出畸形 / 限流退避

use std::sync::Arc;

use resq::config::{AppConfig, PlannerSection};
use resq::core::{Content, Envelope, Pipeline, PipelineBuilder, USER_SENDER};
use resq::llm::{LlmError, ManualClock, MockLlmClient};
use resq::memory::Session;
use resq::planner::{Availability, DISPLAY_LIMIT};
use serde_json::{json, Value};

fn config() -> AppConfig {
    AppConfig {
        planner: PlannerSection {
            seed: Some(11),
            ..PlannerSection::default()
        },
        ..AppConfig::default()
    }
}

fn pipeline_with(mock: Arc<MockLlmClient>, config: AppConfig) -> Pipeline {
    PipelineBuilder::new(config)
        .with_client(mock)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .unwrap()
}

fn fire_incident() -> Content {
    json!({
        "id": "inc-100",
        "type": "Fire",
        "location": "Sector 7",
        "urgency": "CRITICAL",
        "details": "warehouse, two floors"
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn assert_complete(env: &Envelope) {
    for key in ["summary", "recommendation", "resource_summary", "display_summary"] {
        let text = env.content[key].as_str().unwrap_or_default();
        assert!(!text.is_empty(), "{} should not be empty", key);
    }
    assert!(env.content["resources"].is_array());
    let shown = env.content["display_summary"].as_str().unwrap();
    assert!(shown.chars().count() <= DISPLAY_LIMIT);

    let agents: Vec<_> = env.trace.iter().map(|t| t.agent.as_str()).collect();
    assert_eq!(
        agents,
        vec!["ResQ-Agent", "Resource-Agent", "Summary-Agent", "Decision-Agent"]
    );
}

#[tokio::test]
async fn test_disabled_backend_still_completes() {
    let mut cfg = config();
    cfg.llm.enabled = false;
    let mock = Arc::new(MockLlmClient::replying("unused"));
    let pipeline = pipeline_with(mock.clone(), cfg);

    let mut session = Session::default();
    let env = pipeline
        .orchestrator
        .run_incident(fire_incident(), Some(&mut session))
        .await;

    assert_complete(&env);
    assert_eq!(mock.call_count(), 0);
    for entry in &env.trace[..3] {
        assert_eq!(entry.message["fallback_reason"], "disabled");
    }
    assert!(env.content["recommendation"]
        .as_str()
        .unwrap()
        .starts_with("Dispatch Fire-"));
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn test_erroring_backend_still_completes() {
    let mock = Arc::new(MockLlmClient::failing(LlmError::Api("503 service unavailable".into())));
    let pipeline = pipeline_with(mock.clone(), config());

    let env = pipeline.orchestrator.run_incident(fire_incident(), None).await;

    assert_complete(&env);
    assert_eq!(env.trace[0].message["fallback_reason"], "backend_error");
    // 三条链各三个模型，每个模型只尝试一次
    assert_eq!(mock.call_count(), 9);
    assert!(pipeline.invoker.is_available());
}

#[tokio::test]
async fn test_malformed_output_still_completes() {
    let mock = Arc::new(MockLlmClient::replying("I think you should send everyone."));
    let pipeline = pipeline_with(mock, config());

    let env = pipeline.orchestrator.run_incident(fire_incident(), None).await;

    assert_complete(&env);
    assert_eq!(env.trace[0].message["fallback_reason"], "malformed");
    assert_eq!(env.trace[1].message["fallback_reason"], "malformed");
    assert_eq!(
        env.content["summary"],
        "Fire at Sector 7 - urgency CRITICAL. Details: warehouse, two floors"
    );
    // 纯文本对显示屏告警是合法输出
    assert_eq!(env.content["display_summary"], "I think you should send everyone.");
    assert_eq!(env.trace[2].message["source"], "llm");
}

#[tokio::test]
async fn test_rate_limit_backoff_is_shared_across_agents() {
    let mock = Arc::new(MockLlmClient::failing(LlmError::RateLimited(
        "429 Too Many Requests".into(),
    )));
    let pipeline = pipeline_with(mock.clone(), config());

    let env = pipeline.orchestrator.run_incident(fire_incident(), None).await;

    assert_complete(&env);
    assert_eq!(env.trace[0].message["fallback_reason"], "rate_limited");
    assert_eq!(env.trace[1].message["fallback_reason"], "disabled");
    assert_eq!(env.trace[2].message["fallback_reason"], "disabled");
    // 只有 Dispatch 的链被调用过
    assert_eq!(mock.call_count(), 3);
    assert!(!pipeline.invoker.is_available());
}

#[tokio::test]
async fn test_llm_answers_are_used_when_well_formed() {
    let reply = r#"{"summary": "Warehouse fire", "recommendation": "Send Fire-2 now", "resources": ["Fire-2", "Fire-1"]}"#;
    let mock = Arc::new(MockLlmClient::replying(reply));
    let pipeline = pipeline_with(mock, config());

    let env = pipeline.orchestrator.run_incident(fire_incident(), None).await;

    assert_complete(&env);
    assert_eq!(env.content["summary"], "Warehouse fire");
    assert_eq!(env.content["recommendation"], "Send Fire-2 now");
    assert_eq!(env.content["resources"], json!(["Fire-2", "Fire-1"]));
    assert_eq!(env.content["resource_summary"], "Warehouse fire");
    assert_eq!(env.trace[0].message["source"], "llm");
    assert_eq!(env.trace[1].message["source"], "llm");
}

#[tokio::test]
async fn test_send_decision_dispatches_units() {
    let mut cfg = config();
    cfg.llm.enabled = false;
    let pipeline = pipeline_with(Arc::new(MockLlmClient::new()), cfg);

    let mut content = Content::new();
    content.insert("incident".into(), Value::Object(fire_incident()));
    content.insert("action".into(), json!("SEND"));
    content.insert("incident_id".into(), json!("inc-100"));
    let env = pipeline
        .orchestrator
        .orchestrate(Envelope::new(content).with_sender(USER_SENDER), None)
        .await;

    assert_eq!(env.content["decision_status"], "success");
    let dispatched = env.content["dispatched_units"].as_array().unwrap();
    assert_eq!(dispatched.len(), 2);
    for id in dispatched {
        let status = pipeline.units.status(id.as_str().unwrap()).unwrap();
        assert_eq!(status.status, Availability::Assigned);
        assert_eq!(status.incident_id.as_deref(), Some("inc-100"));
    }

    // 已出动的单位不再出现在下一次规划中
    let next = pipeline.orchestrator.run_incident(fire_incident(), None).await;
    let resources = next.content["resources"].as_array().unwrap();
    assert!(resources.iter().all(|r| !dispatched.contains(r)));
    assert_eq!(pipeline.decision.history().len(), 2);
}

#[tokio::test]
async fn test_invalid_decision_is_recorded() {
    let pipeline = pipeline_with(Arc::new(MockLlmClient::new()), config());
    let mut content = Content::new();
    content.insert("action".into(), json!("MAYBE"));
    content.insert("incident_id".into(), json!("inc-1"));

    let env = pipeline
        .orchestrator
        .orchestrate(Envelope::new(content), None)
        .await;

    assert_eq!(env.content["decision_status"], "error");
    assert!(env.content["decision_message"].as_str().unwrap().contains("MAYBE"));
    let history = pipeline.decision.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action.as_deref(), Some("MAYBE"));
}

#[tokio::test]
async fn test_submit_incident_registers_and_saves_session() {
    let mut cfg = config();
    cfg.llm.enabled = false;
    let pipeline = pipeline_with(Arc::new(MockLlmClient::new()), cfg);

    let mut incident = fire_incident();
    incident.remove("id");
    let (env, session) = pipeline.submit_incident(incident, Some("desk-1")).await;

    assert_complete(&env);
    let registered = pipeline.incidents.latest().await.unwrap();
    assert!(registered["id"].is_string());
    assert_eq!(env.content["incident"]["id"], registered["id"]);
    assert_eq!(session.session_id, "desk-1");
    assert_eq!(pipeline.sessions.get("desk-1").await.unwrap().len(), 2);
    assert_eq!(pipeline.incidents.metrics().await.incidents, 1);
}

#[tokio::test]
async fn test_decide_defaults_to_latest_incident() {
    let mut cfg = config();
    cfg.llm.enabled = false;
    let pipeline = pipeline_with(Arc::new(MockLlmClient::new()), cfg);

    pipeline.submit_incident(fire_incident(), None).await;
    let env = pipeline.decide("HOLD", None, Some("desk-2")).await;

    assert_eq!(env.content["decision_status"], "success");
    assert_eq!(env.content["incident_id"], "inc-100");
    let history = pipeline.decision.history();
    assert_eq!(history.last().unwrap().incident_id.as_deref(), Some("inc-100"));
    assert_eq!(pipeline.incidents.metrics().await.decisions, 1);
    assert!(pipeline.sessions.get("desk-2").await.is_some());

    // 没有登记过的事件时决策仍被记录
    let empty = pipeline_with(Arc::new(MockLlmClient::new()), config());
    let env = empty.decide("SEND", None, None).await;
    assert_eq!(env.content["decision_status"], "success");
    assert!(env.content.get("incident_id").is_none());
    assert_eq!(empty.incidents.metrics().await.decisions, 1);
}
