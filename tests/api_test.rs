use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crmserver::contacts::ContactFilter;
use crmserver::core::shared::state::AppState;
use crmserver::core::shared::test_utils::{
    test_config, test_state, test_state_with_config, MockLlm, MockWhatsAppSender,
};
use crmserver::core::storage::{CrmStore, MemoryStore};
use crmserver::llm::{LLMProvider, LlmError};
use crmserver::main_module::build_router;
use crmserver::whatsapp::NoThrottle;

fn app(state: AppState) -> Router {
    build_router(Arc::new(state))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn create_contact(app: &Router, body: Value) -> Value {
    let (status, contact) = call(app, Method::POST, "/api/contacts", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "{contact}");
    contact
}

#[tokio::test]
async fn test_invalid_contact_is_rejected_and_not_stored() {
    let app = app(test_state());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/contacts",
        Some(json!({
            "firstName": "Budi",
            "lastName": "Santoso",
            "email": "budi@example.com",
            "leadScore": 150
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert!(body["details"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["field"] == "leadScore"));

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/contacts",
        Some(json!({ "firstName": "Budi", "lastName": "Santoso" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["field"] == "email"));

    let (status, body) = call(&app, Method::GET, "/api/contacts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let app = app(test_state());

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/contacts",
        Some(json!({ "firstName": "   ", "lastName": "Santoso", "email": "b@example.com" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["field"] == "firstName" && d["message"] == "must not be blank"));

    let contact = create_contact(
        &app,
        json!({ "firstName": "Budi", "lastName": "Santoso", "email": "budi@example.com" }),
    )
    .await;
    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/contacts/{}", contact["id"].as_str().unwrap()),
        Some(json!({ "lastName": " " })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_path_and_query_values_return_json_errors() {
    let app = app(test_state());

    let (status, body) = call(&app, Method::GET, "/api/contacts/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"][0]["field"], "path");

    let (status, body) = call(&app, Method::GET, "/api/contacts?status=bogus", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"][0]["field"], "query");
}

#[tokio::test]
async fn test_contact_lifecycle() {
    let app = app(test_state());

    let contact = create_contact(
        &app,
        json!({
            "firstName": "Siti",
            "lastName": "Rahayu",
            "email": "Siti@Example.com",
            "leadScore": 85,
            "tags": ["vip", "vip", " retail "]
        }),
    )
    .await;
    assert_eq!(contact["email"], "siti@example.com");
    assert_eq!(contact["tier"], "Hot");
    let id = contact["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &format!("/api/contacts/{id}"),
        Some(json!({ "leadScore": 40 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["leadScore"], 40);
    assert_eq!(updated["tier"], "Cold");
    assert_eq!(updated["firstName"], "Siti");

    let (status, _) = call(&app, Method::DELETE, &format!("/api/contacts/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::GET, &format!("/api/contacts/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_ids_return_not_found() {
    let app = app(test_state());
    let missing = uuid::Uuid::new_v4();

    for uri in [
        format!("/api/contacts/{missing}"),
        format!("/api/deals/{missing}"),
        format!("/api/tasks/{missing}"),
        format!("/api/email-templates/{missing}"),
        format!("/api/whatsapp-templates/{missing}"),
    ] {
        let (status, body) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_deal_for_missing_contact_is_rejected() {
    let app = app(test_state());

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/deals",
        Some(json!({
            "title": "Ghost deal",
            "contactId": uuid::Uuid::new_v4(),
            "value": 1000.0
        })),
        None,
    )
    .await;
    assert!(status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND);

    let (_, deals) = call(&app, Method::GET, "/api/deals", None, None).await;
    assert_eq!(deals.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_dashboard_stats_reflect_pipeline() {
    let app = app(test_state());

    let first = create_contact(
        &app,
        json!({ "firstName": "A", "lastName": "One", "email": "a@example.com", "leadScore": 90 }),
    )
    .await;
    create_contact(
        &app,
        json!({ "firstName": "B", "lastName": "Two", "email": "b@example.com", "leadScore": 10 }),
    )
    .await;
    let contact_id = first["id"].clone();

    let (status, won) = call(
        &app,
        Method::POST,
        "/api/deals",
        Some(json!({
            "title": "Annual plan",
            "contactId": contact_id,
            "value": 5000000.0,
            "stage": "closed-won"
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{won}");

    let (status, open) = call(
        &app,
        Method::POST,
        "/api/deals",
        Some(json!({
            "title": "Add-on",
            "contactId": contact_id,
            "value": 1000000.0
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let open_id = open["id"].as_str().unwrap().to_string();

    let (status, moved) = call(
        &app,
        Method::PATCH,
        &format!("/api/deals/{open_id}/stage"),
        Some(json!({ "stage": "negotiation" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["stage"], "negotiation");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/tasks",
        Some(json!({ "title": "Send proposal", "contactId": contact_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = call(&app, Method::GET, "/api/dashboard/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalContacts"], 2);
    assert_eq!(stats["activeLeads"], 2);
    assert_eq!(stats["totalRevenue"], 5000000.0);
    assert_eq!(stats["conversionRate"], 50.0);
    assert_eq!(stats["pipelineValue"], 1000000.0);
    assert_eq!(stats["pendingTasks"], 1);
    assert_eq!(stats["leadScoreDistribution"]["hot"], 1);
    assert_eq!(stats["dealsByStage"].as_array().unwrap().len(), 6);
    assert_eq!(stats["topLeads"][0]["email"], "a@example.com");

    let (status, pipeline) = call(&app, Method::GET, "/api/deals/pipeline", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pipeline.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_template_render_fills_contact_fields() {
    let app = app(test_state());
    let contact = create_contact(
        &app,
        json!({ "firstName": "Dewi", "lastName": "Lestari", "email": "dewi@example.com" }),
    )
    .await;

    let (status, template) = call(
        &app,
        Method::POST,
        "/api/email-templates",
        Some(json!({
            "name": "Welcome",
            "subject": "Hello {{firstName}}",
            "body": "Hi {{firstName}}, your code is {{code}}."
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let template_id = template["id"].as_str().unwrap().to_string();

    let (status, rendered) = call(
        &app,
        Method::POST,
        &format!("/api/email-templates/{template_id}/render"),
        Some(json!({ "contactId": contact["id"], "variables": { "code": "WELCOME10" } })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rendered["subject"], "Hello Dewi");
    assert_eq!(rendered["body"], "Hi Dewi, your code is WELCOME10.");
}

#[tokio::test]
async fn test_whatsapp_unconfigured_returns_service_unavailable() {
    let app = app(test_state());
    let contact = create_contact(
        &app,
        json!({
            "firstName": "Rina",
            "lastName": "Wati",
            "email": "rina@example.com",
            "phone": "081234567890"
        }),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/send",
        Some(json!({
            "contactId": contact["id"],
            "content": { "kind": "text", "body": "Halo" }
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["available"], false);
}

#[tokio::test]
async fn test_broadcast_reports_partial_failure() {
    let sender = Arc::new(MockWhatsAppSender::new().failing_for("6282200000002"));
    let app = app(test_state().with_whatsapp(sender.clone()));

    let mut ids = Vec::new();
    for (i, phone) in ["082200000001", "082200000002", "082200000003"]
        .iter()
        .enumerate()
    {
        let contact = create_contact(
            &app,
            json!({
                "firstName": format!("Customer{i}"),
                "lastName": "Test",
                "email": format!("c{i}@example.com"),
                "phone": phone
            }),
        )
        .await;
        ids.push(contact["id"].clone());
    }
    let no_phone = create_contact(
        &app,
        json!({ "firstName": "No", "lastName": "Phone", "email": "nophone@example.com" }),
    )
    .await;
    ids.push(no_phone["id"].clone());

    let (status, summary) = call(
        &app,
        Method::POST,
        "/api/whatsapp/broadcast",
        Some(json!({
            "contactIds": ids,
            "content": { "kind": "follow_up", "topic": "your recent order" }
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["sent"], 2);
    assert_eq!(summary["failed"], 2);

    let results = summary["results"].as_array().unwrap();
    assert_eq!(results[0]["status"], "sent");
    assert_eq!(results[1]["status"], "failed");
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["status"], "sent");
    assert_eq!(results[3]["status"], "failed");
    assert_eq!(sender.sent().len(), 2);

    let first_id = results[0]["contactId"].as_str().unwrap().to_string();
    let (_, activities) = call(
        &app,
        Method::GET,
        &format!("/api/contacts/{first_id}/activities"),
        None,
        None,
    )
    .await;
    let activities = activities.as_array().unwrap();
    assert_eq!(activities.len(), 2);
    assert!(activities
        .iter()
        .any(|a| a["type"] == "whatsapp" && a["title"] == "WhatsApp follow up sent"));
}

#[tokio::test]
async fn test_out_of_range_amounts_are_rejected() {
    let sender = Arc::new(MockWhatsAppSender::new());
    let app = app(test_state().with_whatsapp(sender.clone()));
    let contact = create_contact(
        &app,
        json!({
            "firstName": "Tari",
            "lastName": "Putri",
            "email": "tari@example.com",
            "phone": "081298765432"
        }),
    )
    .await;
    let order = json!({ "kind": "order_confirmation", "orderId": "INV-9", "total": -1e30 });

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/whatsapp/send",
        Some(json!({ "contactId": contact["id"], "content": order })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "content.total");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/broadcast",
        Some(json!({ "contactIds": [contact["id"]], "content": order })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_broadcast_rejects_empty_recipient_list() {
    let app = app(test_state().with_whatsapp(Arc::new(MockWhatsAppSender::new())));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/whatsapp/broadcast",
        Some(json!({ "contactIds": [], "content": { "kind": "text", "body": "Hi" } })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_verification() {
    let app = app(test_state());

    let (status, body) = call(
        &app,
        Method::GET,
        "/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(1158201444));

    let (status, _) = call(
        &app,
        Method::GET,
        "/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inbound_webhook_records_activity() {
    let app = app(test_state());
    let contact = create_contact(
        &app,
        json!({
            "firstName": "Agus",
            "lastName": "Salim",
            "email": "agus@example.com",
            "phone": "0812-3456-7890"
        }),
    )
    .await;
    let id = contact["id"].as_str().unwrap().to_string();

    let payload = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1234",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{ "wa_id": "6281234567890", "profile": { "name": "Agus" } }],
                    "messages": [{
                        "id": "wamid.in1",
                        "from": "6281234567890",
                        "timestamp": "1717000000",
                        "type": "text",
                        "text": { "body": "Is the promo still on?" }
                    }]
                }
            }]
        }]
    });

    let (status, _) = call(&app, Method::POST, "/webhook/whatsapp", Some(payload), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, activities) = call(
        &app,
        Method::GET,
        &format!("/api/contacts/{id}/activities"),
        None,
        None,
    )
    .await;
    let inbound = activities
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["title"] == "WhatsApp message received")
        .cloned()
        .unwrap();
    assert_eq!(inbound["type"], "whatsapp");
    assert_eq!(inbound["description"], "Is the promo still on?");
}

#[tokio::test]
async fn test_malformed_webhook_is_acknowledged() {
    let app = app(test_state());

    for body in ["not json", r#"{"object": 42}"#, ""] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhook/whatsapp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "body {body:?}");
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhook/whatsapp")
        .body(Body::from(r#"{"object":"page","entry":[]}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_guards_api_routes() {
    let mut config = test_config();
    config.auth.required = true;
    let app = app(test_state_with_config(config));

    let (status, _) = call(&app, Method::GET, "/api/contacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, registered) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        Some(json!({
            "email": "owner@example.com",
            "name": "Owner",
            "password": "correct horse battery"
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{registered}");
    assert_eq!(registered["user"]["role"], "admin");
    assert!(registered["user"].get("passwordHash").is_none());

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        Some(json!({ "email": "owner@example.com", "password": "wrong password" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        Some(json!({ "email": "owner@example.com", "password": "correct horse battery" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::GET, "/api/contacts", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, me) = call(&app, Method::GET, "/api/auth/me", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "owner@example.com");

    let (status, _) = call(&app, Method::POST, "/api/auth/logout", None, Some(&token)).await;
    assert!(status.is_success());

    let (status, _) = call(&app, Method::GET, "/api/contacts", None, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invitation_flow() {
    let mut config = test_config();
    config.auth.required = true;
    let app = app(test_state_with_config(config));

    let (_, admin) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        Some(json!({ "email": "admin@example.com", "name": "Admin", "password": "admin-password" })),
        None,
    )
    .await;
    let admin_token = admin["token"].as_str().unwrap().to_string();

    let (status, invitation) = call(
        &app,
        Method::POST,
        "/api/invitations",
        Some(json!({ "email": "sales@example.com", "role": "manager" })),
        Some(&admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{invitation}");
    let invite_token = invitation["token"].as_str().unwrap().to_string();

    let (status, accepted) = call(
        &app,
        Method::POST,
        "/api/invitations/accept",
        Some(json!({ "token": invite_token, "name": "Sales Lead", "password": "sales-password" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{accepted}");
    assert_eq!(accepted["user"]["email"], "sales@example.com");
    assert_eq!(accepted["user"]["role"], "manager");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/invitations/accept",
        Some(json!({ "token": invite_token, "name": "Again", "password": "sales-password" })),
        None,
    )
    .await;
    assert!(status.is_client_error());

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/invitations",
        Some(json!({ "email": "x@example.com" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, login) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        Some(json!({ "email": "sales@example.com", "password": "sales-password" })),
        None,
    )
    .await;
    let manager_token = login["token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/invitations",
        Some(json!({ "email": "boss@example.com", "role": "admin" })),
        Some(&manager_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/invitations",
        Some(json!({ "email": "rep@example.com", "role": "member" })),
        Some(&manager_token),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_ai_unconfigured_returns_service_unavailable() {
    let app = app(test_state());

    let (_, status_body) = call(&app, Method::GET, "/api/ai/status", None, None).await;
    assert_eq!(status_body["available"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/ai/sentiment",
        Some(json!({ "text": "Great service, thanks!" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["available"], false);
}

#[tokio::test]
async fn test_ai_lead_score_persists_score() {
    let llm = Arc::new(MockLlm::replying(
        r#"Here you go: {"score": 82, "rationale": "Engaged buyer", "recommendations": ["Call this week"]}"#,
    ));
    let app = app(test_state().with_llm(llm.clone()));
    let contact = create_contact(
        &app,
        json!({ "firstName": "Joko", "lastName": "Widodo", "email": "joko@example.com", "leadScore": 20 }),
    )
    .await;
    let id = contact["id"].as_str().unwrap().to_string();

    let (status, scored) = call(
        &app,
        Method::POST,
        &format!("/api/ai/lead-score/{id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{scored}");
    assert_eq!(scored["previousScore"], 20);
    assert_eq!(scored["score"], 82);
    assert_eq!(scored["tier"], "Hot");
    assert!(llm.prompts()[0].contains("Joko Widodo"));

    let (_, stored) = call(&app, Method::GET, &format!("/api/contacts/{id}"), None, None).await;
    assert_eq!(stored["leadScore"], 82);
}

/// Edits the contact's notes while the score is being computed.
struct EditingLlm {
    store: Arc<dyn CrmStore>,
}

#[async_trait]
impl LLMProvider for EditingLlm {
    async fn generate(&self, _prompt: &str, _config: &Value) -> Result<String, LlmError> {
        let mut contact = self
            .store
            .list_contacts(&ContactFilter::default())
            .await
            .unwrap()
            .remove(0);
        contact.notes = Some("Asked for a quote by phone".into());
        self.store.update_contact(contact).await.unwrap();
        Ok(r#"{"score": 64, "rationale": "Warm", "recommendations": []}"#.into())
    }
}

#[tokio::test]
async fn test_ai_lead_score_keeps_concurrent_edits() {
    let store: Arc<dyn CrmStore> = Arc::new(MemoryStore::new());
    let state = AppState::from_config(store.clone(), test_config())
        .with_throttle(Arc::new(NoThrottle))
        .with_llm(Arc::new(EditingLlm {
            store: store.clone(),
        }));
    let app = app(state);
    let contact = create_contact(
        &app,
        json!({ "firstName": "Wulan", "lastName": "Sari", "email": "wulan@example.com" }),
    )
    .await;
    let id = contact["id"].as_str().unwrap().to_string();

    let (status, scored) = call(
        &app,
        Method::POST,
        &format!("/api/ai/lead-score/{id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{scored}");

    let (_, stored) = call(&app, Method::GET, &format!("/api/contacts/{id}"), None, None).await;
    assert_eq!(stored["leadScore"], 64);
    assert_eq!(stored["notes"], "Asked for a quote by phone");
}
