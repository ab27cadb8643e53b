use imified::{ApiMethod, BotClient, ClientError, Config, Recipient};
use mockito::{Matcher, Mock, ServerGuard};

/// `bot:secret` in base64.
const AUTH_HEADER: &str = "Basic Ym90OnNlY3JldA==";
const OK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><rsp stat="ok"></rsp>"#;
const THREE_USERS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rsp stat="ok">
  <users>
    <user><userkey>u1</userkey><network>Jabber</network></user>
    <user><userkey>u2</userkey><network>AIM</network></user>
    <user><userkey>u3</userkey><network>SMS</network></user>
  </users>
  <count>3</count>
</rsp>"#;

fn config_for(server: &ServerGuard) -> Config {
    let mut config = Config::default();
    config
        .set("botkey", "BOTKEY")
        .set("username", "bot")
        .set("password", "secret")
        .set("endpoint", format!("{}/api/bot/", server.url()));
    config
}

fn param(key: &str, value: &str) -> Matcher {
    Matcher::UrlEncoded(key.to_string(), value.to_string())
}

async fn mock_api(server: &mut ServerGuard, params: Vec<Matcher>, body: &str) -> Mock {
    server
        .mock("POST", "/api/bot/")
        .match_header("authorization", AUTH_HEADER)
        .match_body(Matcher::AllOf(params))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

#[tokio::test]
async fn send_message_posts_form_with_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_api(
        &mut server,
        vec![
            param("apimethod", "send"),
            param("botkey", "BOTKEY"),
            param("msg", "hello"),
            param("userkey", "user1,user2"),
        ],
        OK_XML,
    )
    .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let result = client
        .send_message("hello", Some(&Recipient::from("user1,user2")))
        .await
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(result.status.as_deref(), Some("ok"));
    mock.assert_async().await;
}

#[tokio::test]
async fn send_message_falls_back_to_configured_recipient() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_api(
        &mut server,
        vec![param("apimethod", "send"), param("msg", "hi"), param("userkey", "alice")],
        OK_XML,
    )
    .await;

    let mut client = BotClient::new(config_for(&server)).unwrap();
    client.set_config("recipient", "alice");
    client.send_message("hi", None).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn empty_recipient_also_falls_back() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_api(&mut server, vec![param("userkey", "alice")], OK_XML).await;

    let mut client = BotClient::new(config_for(&server)).unwrap();
    client.set_config("recipient", "alice");
    client
        .send_message("hi", Some(&Recipient::from("")))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn network_target_is_merged_and_cannot_override_auth_params() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_api(
        &mut server,
        vec![
            param("apimethod", "send"),
            param("botkey", "BOTKEY"),
            param("user", "bob@example.com"),
            param("network", "Jabber"),
        ],
        OK_XML,
    )
    .await;

    let mut target = std::collections::BTreeMap::new();
    target.insert("user".to_string(), "bob@example.com".to_string());
    target.insert("network".to_string(), "Jabber".to_string());
    target.insert("botkey".to_string(), "OTHER".to_string());
    target.insert("apimethod".to_string(), "getAllUsers".to_string());

    let client = BotClient::new(config_for(&server)).unwrap();
    client
        .send_message("hi", Some(&Recipient::NetworkTarget(target)))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn configured_network_target_recipient_is_used() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_api(
        &mut server,
        vec![param("user", "bob"), param("network", "Twitter")],
        OK_XML,
    )
    .await;

    let mut config = config_for(&server);
    let target: toml::Table = toml::from_str("user = \"bob\"\nnetwork = \"Twitter\"").unwrap();
    config.set("recipient", target);

    let client = BotClient::new(config).unwrap();
    client.send_message("hi", None).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn missing_recipient_fails_without_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/bot/")
        .expect(0)
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let err = client.send_message("hi", None).await.unwrap_err();

    assert!(matches!(err, ClientError::NoRecipient));
    mock.assert_async().await;
}

#[tokio::test]
async fn api_fault_is_returned_in_result() {
    let mut server = mockito::Server::new_async().await;
    let _mock = mock_api(
        &mut server,
        vec![param("apimethod", "send")],
        r#"<rsp stat="fail"><err code="2" msg="Invalid userkey"/></rsp>"#,
    )
    .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let result = client
        .send_message("hi", Some(&Recipient::from("nobody")))
        .await
        .unwrap();

    assert!(!result.is_ok());
    assert_eq!(
        result.fault.unwrap().message.as_deref(),
        Some("Invalid userkey")
    );
}

#[tokio::test]
async fn get_all_users_scoped_to_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_api(
        &mut server,
        vec![
            param("apimethod", "getAllUsers"),
            param("botkey", "BOTKEY"),
            param("network", "Twitter"),
        ],
        THREE_USERS_XML,
    )
    .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let users = client.get_all_users(Some("Twitter")).await.unwrap();

    assert_eq!(users.count, 3);
    assert_eq!(users.userkeys(), vec!["u1", "u2", "u3"]);
    assert_eq!(users.users[1].network.as_deref(), Some("AIM"));
    mock.assert_async().await;
}

#[tokio::test]
async fn get_all_users_without_network_sends_no_network_param() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/bot/")
        .match_body(Matcher::Exact(
            "apimethod=getAllUsers&botkey=BOTKEY".to_string(),
        ))
        .with_body(THREE_USERS_XML)
        .expect(1)
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    client.get_all_users(None).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_joins_all_userkeys_into_one_send() {
    let mut server = mockito::Server::new_async().await;
    let users_mock = mock_api(
        &mut server,
        vec![param("apimethod", "getAllUsers")],
        THREE_USERS_XML,
    )
    .await;
    let send_mock = mock_api(
        &mut server,
        vec![
            param("apimethod", "send"),
            param("msg", "broadcast"),
            param("userkey", "u1,u2,u3"),
        ],
        OK_XML,
    )
    .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    client.send_message_to_all_users("broadcast").await.unwrap();

    users_mock.assert_async().await;
    send_mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_to_no_users_uses_default_recipient() {
    let mut server = mockito::Server::new_async().await;
    let users_mock = mock_api(
        &mut server,
        vec![param("apimethod", "getAllUsers")],
        r#"<rsp stat="ok"><users/><count>0</count></rsp>"#,
    )
    .await;
    let send_mock = mock_api(
        &mut server,
        vec![
            param("apimethod", "send"),
            param("msg", "anyone?"),
            param("userkey", "alice"),
        ],
        OK_XML,
    )
    .await;

    let mut client = BotClient::new(config_for(&server)).unwrap();
    client.set_config("recipient", "alice");
    client.send_message_to_all_users("anyone?").await.unwrap();

    users_mock.assert_async().await;
    send_mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_to_no_users_without_default_recipient_fails() {
    let mut server = mockito::Server::new_async().await;
    let _users_mock = mock_api(
        &mut server,
        vec![param("apimethod", "getAllUsers")],
        r#"<rsp stat="ok"><users/></rsp>"#,
    )
    .await;
    let send_mock = server
        .mock("POST", "/api/bot/")
        .match_body(param("apimethod", "send"))
        .expect(0)
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let err = client.send_message_to_all_users("anyone?").await.unwrap_err();

    assert!(matches!(err, ClientError::NoRecipient));
    send_mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_fails_when_user_listing_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _users_mock = mock_api(
        &mut server,
        vec![param("apimethod", "getAllUsers")],
        r#"<rsp stat="fail"><err code="100" msg="Invalid botkey"/></rsp>"#,
    )
    .await;
    let send_mock = server
        .mock("POST", "/api/bot/")
        .match_body(param("apimethod", "send"))
        .expect(0)
        .create_async()
        .await;

    let mut client = BotClient::new(config_for(&server)).unwrap();
    client.set_config("recipient", "alice");
    let err = client.send_message_to_all_users("hi").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Rejected {
            method: ApiMethod::GetAllUsers,
            ..
        }
    ));
    assert!(err.to_string().contains("Invalid botkey"));
    send_mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_fails_when_users_element_is_missing() {
    let mut server = mockito::Server::new_async().await;
    let _users_mock = mock_api(
        &mut server,
        vec![param("apimethod", "getAllUsers")],
        r#"<rsp stat="ok"/>"#,
    )
    .await;
    let send_mock = server
        .mock("POST", "/api/bot/")
        .match_body(param("apimethod", "send"))
        .expect(0)
        .create_async()
        .await;

    let mut client = BotClient::new(config_for(&server)).unwrap();
    client.set_config("recipient", "alice");
    let err = client.send_message_to_all_users("hi").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::InvalidResponse {
            method: ApiMethod::GetAllUsers,
            ..
        }
    ));
    send_mock.assert_async().await;
}

#[tokio::test]
async fn broadcast_fails_when_send_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _users_mock = mock_api(
        &mut server,
        vec![param("apimethod", "getAllUsers")],
        THREE_USERS_XML,
    )
    .await;
    let _send_mock = mock_api(
        &mut server,
        vec![param("apimethod", "send"), param("userkey", "u1,u2,u3")],
        r#"<rsp stat="fail"><err code="3" msg="Message too long"/></rsp>"#,
    )
    .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let err = client.send_message_to_all_users("hi").await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Rejected {
            method: ApiMethod::Send,
            ..
        }
    ));
    assert!(err.to_string().contains("Message too long"));
}

#[tokio::test]
async fn error_status_with_xml_envelope_is_decoded() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/bot/")
        .with_status(401)
        .with_body(r#"<rsp stat="fail"><err code="401" msg="Not authorized"/></rsp>"#)
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let result = client
        .send_message("hi", Some(&Recipient::from("u1")))
        .await
        .unwrap();

    assert!(!result.is_ok());
    assert_eq!(
        result.fault.unwrap().message.as_deref(),
        Some("Not authorized")
    );
}

#[tokio::test]
async fn server_error_status_is_request_failed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/bot/")
        .with_status(401)
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let err = client.get_all_users(None).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::RequestFailed {
            method: ApiMethod::GetAllUsers,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "API getAllUsers request failed, API may be offline"
    );
}

#[tokio::test]
async fn unreachable_endpoint_is_request_failed() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = Config::default();
    config
        .set("botkey", "BOTKEY")
        .set("username", "bot")
        .set("password", "secret")
        .set("endpoint", format!("http://127.0.0.1:{port}/api/bot/"));

    let client = BotClient::new(config).unwrap();
    let err = client
        .send_message("hello", Some(&Recipient::from("u1")))
        .await
        .unwrap_err();

    assert_eq!(err.method(), Some(ApiMethod::Send));
    assert!(matches!(err, ClientError::RequestFailed { .. }));
}

#[tokio::test]
async fn broadcast_fails_when_user_listing_fails() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/bot/")
        .with_status(503)
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let err = client.send_message_to_all_users("hi").await.unwrap_err();

    assert_eq!(err.method(), Some(ApiMethod::GetAllUsers));
}

#[tokio::test]
async fn malformed_xml_is_invalid_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/bot/")
        .with_body("<html><body>Service Unavailable</html>")
        .create_async()
        .await;

    let client = BotClient::new(config_for(&server)).unwrap();
    let err = client.get_all_users(None).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::InvalidResponse {
            method: ApiMethod::GetAllUsers,
            ..
        }
    ));
}
