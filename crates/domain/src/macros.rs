/// UUID v7 ベースの集約 ID 型を定義する宣言型マクロ
///
/// 以下を一括生成する:
/// - Newtype 構造体（`Uuid` をラップ）
/// - `derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)`
/// - `new()`: UUID v7 を生成
/// - `from_uuid()` / `as_uuid()`
/// - `parse()`: 文字列表現から復元（不正な形式は `DomainError::Validation`）
/// - `Default` impl（`new()` に委譲）
///
/// # 使用例
///
/// ```rust
/// use postman_domain::template::TemplateId;
///
/// let id = TemplateId::new();
/// let restored = TemplateId::parse(&id.to_string()).unwrap();
/// assert_eq!(id, restored);
/// assert!(TemplateId::parse("not-a-uuid").is_err());
/// ```
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize,
            derive_more::Display,
        )]
        #[display("{_0}")]
        #[serde(transparent)]
        $vis struct $Name(uuid::Uuid);

        impl $Name {
            /// 新しい ID を生成する（UUID v7）
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// 既存の UUID から ID を作成する
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// 内部の UUID 参照を取得する
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// 文字列表現から ID を復元する
            pub fn parse(value: &str) -> Result<Self, $crate::DomainError> {
                uuid::Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|_| {
                        $crate::DomainError::Validation(format!(
                            "{} の形式が不正です: {value}",
                            stringify!($Name)
                        ))
                    })
            }
        }

        impl Default for $Name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}
