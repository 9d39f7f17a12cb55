//! テンプレートとメールの一連の流れの統合テスト
//!
//! モックの書き込みストア・読み取りストア・バスで、コマンドから投影までを通して検証する。
//!
//! ## テストケース
//!
//! - テンプレート作成 → メール送信で本文がレンダリングされ Complete になる
//! - 送信失敗でも Failed として保存され、再送で Complete になる
//! - Complete のメールは再送できない
//! - 件名の重複する更新は書き込みストアに触れない
//! - data の欠落は送信も保存もしない
//! - 発行されたイベントを投影すると、読み取り結果が公開射影と一致する
//! - send-mail イベントからメールが作成される

use postman_domain::{
    email::{EmailData, EmailState},
    event::{SendMailEvent, names},
};
use postman_infra::bus::EventBus;
use postman_service::{
    error::CoreError,
    test_utils::TestContext,
    usecase::{CreateEmail, CreateTemplate, ResendEmail, UpdateTemplate},
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn welcome() -> CreateTemplate {
    CreateTemplate {
        subject:      "Welcome".to_string(),
        content:      "Hello {{name}}".to_string(),
        placeholders: vec!["name".to_string()],
    }
}

fn email_for(template_id: &str) -> CreateEmail {
    CreateEmail {
        recipient: "a@b.com".to_string(),
        sender:    None,
        data:      EmailData::from([("name".to_string(), json!("Ada"))]),
        template:  template_id.to_string(),
        from:      "x@y.com".to_string(),
    }
}

#[tokio::test]
async fn test_テンプレートからメールを送信するとcompleteになる() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();

    // Act
    let email = ctx.email_app.create(email_for(&template.id)).await.unwrap();

    // Assert
    assert_eq!(email.status, EmailState::Complete);
    assert_eq!(email.message, "Hello Ada");
    assert_eq!(email.subject, "Welcome");
    assert_eq!(email.version, 1);
    let sent = ctx.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@b.com");
    assert_eq!(sent[0].html_body, "Hello Ada");
}

#[tokio::test]
async fn test_送信失敗はfailedで保存され再送でcompleteになる() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();
    ctx.sender.fail_sends(true);

    // Act: 初回は送信失敗
    let failed = ctx.email_app.create(email_for(&template.id)).await.unwrap();

    // Assert
    assert_eq!(failed.status, EmailState::Failed);
    assert_eq!(ctx.emails.emails().len(), 1);
    assert_eq!(
        ctx.bus.published_subjects(),
        vec![names::TEMPLATE_CREATED, names::EMAIL_CREATED]
    );

    // Act: 送信が回復してから再送
    ctx.sender.fail_sends(false);
    let resent = ctx
        .email_app
        .resend(ResendEmail {
            id: failed.id.clone(),
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(resent.status, EmailState::Complete);
    assert_eq!(resent.version, 2);
    assert_eq!(resent.message, failed.message);
    assert_eq!(ctx.sender.attempts(), 2);
}

#[tokio::test]
async fn test_completeのメールの再送は拒否され送信されない() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();
    let email = ctx.email_app.create(email_for(&template.id)).await.unwrap();

    // Act
    let result = ctx
        .email_app
        .resend(ResendEmail {
            id: email.id.clone(),
        })
        .await;

    // Assert
    assert!(matches!(result, Err(CoreError::AlreadyComplete(_))));
    assert_eq!(ctx.sender.attempts(), 1);
    assert_eq!(ctx.emails.update_calls(), 0);
}

#[tokio::test]
async fn test_件名が重複する更新はconflictで書き込まない() {
    // Arrange
    let ctx = TestContext::new().await;
    ctx.template_app.create(welcome()).await.unwrap();
    let reminder = ctx
        .template_app
        .create(CreateTemplate {
            subject: "Reminder".to_string(),
            ..welcome()
        })
        .await
        .unwrap();

    // Act
    let result = ctx
        .template_app
        .update(UpdateTemplate {
            id: reminder.id.clone(),
            subject: Some("Welcome".to_string()),
            ..Default::default()
        })
        .await;

    // Assert
    assert!(matches!(result, Err(CoreError::Conflict(_))));
    assert_eq!(ctx.templates.update_calls(), 0);
}

#[tokio::test]
async fn test_dataが欠けていれば送信も保存もしない() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();

    // Act
    let result = ctx
        .email_app
        .create(CreateEmail {
            data: EmailData::new(),
            ..email_for(&template.id)
        })
        .await;

    // Assert
    assert!(matches!(result, Err(CoreError::Validation(msg)) if msg.contains("name")));
    assert_eq!(ctx.sender.attempts(), 0);
    assert_eq!(ctx.emails.insert_calls(), 0);
}

#[tokio::test]
async fn test_投影後の読み取り結果は公開射影と一致する() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();
    let email = ctx.email_app.create(email_for(&template.id)).await.unwrap();

    // Act
    let delivered = ctx.bus.deliver_published().await.unwrap();

    // Assert
    assert_eq!(delivered, 2);
    assert_eq!(
        ctx.template_app.read_one(&template.id).await.unwrap(),
        template
    );
    assert_eq!(ctx.email_app.read_one(&email.id).await.unwrap(), email);
}

#[tokio::test]
async fn test_更新と削除の投影が読み取りストアに反映される() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();
    let updated = ctx
        .template_app
        .update(UpdateTemplate {
            id: template.id.clone(),
            content: Some("Hi {{name}}".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    ctx.bus.deliver_published().await.unwrap();
    assert_eq!(
        ctx.template_app.read_one(&template.id).await.unwrap(),
        updated
    );

    // Act
    ctx.template_app
        .delete(postman_service::usecase::DeleteTemplate {
            id: template.id.clone(),
        })
        .await
        .unwrap();
    ctx.bus.deliver_published().await.unwrap();

    // Assert
    assert!(ctx.template_views.is_empty());
    assert!(matches!(
        ctx.template_app.read_one(&template.id).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_send_mailイベントからメールが作成される() {
    // Arrange
    let ctx = TestContext::new().await;
    let template = ctx.template_app.create(welcome()).await.unwrap();
    let event = SendMailEvent {
        recipient: "ada@example.com".to_string(),
        sender:    Some("Postman".to_string()),
        data:      EmailData::from([("name".to_string(), json!("Ada"))]),
        template:  template.id.clone(),
        from:      "noreply@example.com".to_string(),
    };
    ctx.bus
        .publish(names::SEND_MAIL, &serde_json::to_value(&event).unwrap())
        .await
        .unwrap();

    // Act: send-mail → Email Created → 投影
    ctx.bus.deliver_published().await.unwrap();
    ctx.bus.deliver_published().await.unwrap();

    // Assert
    let emails = ctx.emails.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].recipient(), "ada@example.com");
    assert_eq!(emails[0].sender(), Some("Postman"));
    assert_eq!(ctx.sender.sent()[0].from_header(), "Postman <noreply@example.com>");
    assert_eq!(ctx.email_views.len(), 1);
}
