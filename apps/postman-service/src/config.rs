//! # Postman Service 設定
//!
//! 環境変数からサーバー・データベース・メッセージバス・メール送信の設定を読み込む。
//!
//! | 変数名 | 必須 | デフォルト |
//! |--------|------|-----------|
//! | `DATABASE_URL` | **Yes** | - |
//! | `POSTMAN_HOST` | No | `0.0.0.0` |
//! | `POSTMAN_PORT` | No | `13010` |
//! | `NATS_URL` | No | `nats://localhost:4222`（カンマ区切りで複数可） |
//! | `NATS_CLIENT_NAME` | No | `postman-service` |
//! | `POSTMAN_CONSUMER_GROUP` | No | `postman` |
//! | `MAIL_BACKEND` | No | `noop`（`smtp` / `ses` / `noop`） |
//! | `SMTP_HOST` / `SMTP_PORT` | No | `localhost` / `1025` |

use std::{env, str::FromStr, time::Duration};

use postman_infra::bus::NatsConfig;
use strum::{Display, EnumString};
use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// メール送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MailBackend {
    /// Mailpit（開発）/ SMTP リレー経由
    Smtp,
    /// Amazon SES v2 経由（本番）
    Ses,
    /// 送信しない（ログ出力のみ）
    Noop,
}

/// Postman Service の設定
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// バインドアドレス
    pub host:           String,
    /// ポート番号
    pub port:           u16,
    /// データベース接続 URL（書き込みストア・読み取りストア共通）
    pub database_url:   String,
    pub nats:           NatsConfig,
    /// 購読に使うキューグループ名
    pub consumer_group: String,
    pub mail:           MailConfig,
}

/// メール送信の設定
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend:   MailBackend,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host: String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port: u16,
}

impl ServiceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let servers = var("NATS_URL", "nats://localhost:4222")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if servers.is_empty() {
            return Err(ConfigError::Invalid {
                name:  "NATS_URL",
                value: String::new(),
            });
        }

        Ok(Self {
            host: var("POSTMAN_HOST", "0.0.0.0"),
            port: parse("POSTMAN_PORT", &var("POSTMAN_PORT", "13010"))?,
            database_url,
            nats: NatsConfig {
                servers,
                name: var("NATS_CLIENT_NAME", "postman-service"),
                connect_timeout: Duration::from_secs(10),
            },
            consumer_group: var("POSTMAN_CONSUMER_GROUP", "postman"),
            mail: MailConfig {
                backend:   parse("MAIL_BACKEND", &var("MAIL_BACKEND", "noop"))?,
                smtp_host: var("SMTP_HOST", "localhost"),
                smtp_port: parse("SMTP_PORT", &var("SMTP_PORT", "1025"))?,
            },
        })
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_database_urlのみでデフォルト値が使われる() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/postman")]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 13010);
        assert_eq!(config.nats.servers, vec!["nats://localhost:4222"]);
        assert_eq!(config.consumer_group, "postman");
        assert_eq!(config.mail.backend, MailBackend::Noop);
        assert_eq!(config.mail.smtp_port, 1025);
    }

    #[test]
    fn test_database_url未設定はエラー() {
        let result = load(&[("POSTMAN_PORT", "8080")]);

        assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_不正なポート番号はエラー() {
        let result = load(&[("DATABASE_URL", "postgres://x"), ("POSTMAN_PORT", "abc")]);

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "POSTMAN_PORT",
                ..
            })
        ));
    }

    #[test]
    fn test_nats_urlはカンマ区切りで複数指定できる() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("NATS_URL", "nats://a:4222, nats://b:4222"),
            ("MAIL_BACKEND", "smtp"),
        ])
        .unwrap();

        assert_eq!(config.nats.servers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.mail.backend, MailBackend::Smtp);
    }

    #[test]
    fn test_未知のメールバックエンドはエラー() {
        let result = load(&[("DATABASE_URL", "postgres://x"), ("MAIL_BACKEND", "sendgrid")]);

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "MAIL_BACKEND",
                ..
            })
        ));
    }
}
