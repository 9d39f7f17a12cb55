//! # 集約メタデータ
//!
//! Template / Email に共通する識別子・バージョン・タイムスタンプを保持する値オブジェクト。
//! 各集約はフィールドとして [`AggregateMeta`] を保持し、変更操作の内部でのみ
//! [`AggregateMeta::touch`] を呼ぶ。`updated_at` を外部から書き換える経路は存在しない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DomainError;

// =========================================================================
// Version（バージョン番号）
// =========================================================================

/// バージョン番号
///
/// 生成時に 1 から始まり、集約が変更されるたびにインクリメントされる。
/// 読み取りストアへの投影では、古いバージョンのイベントを無視する判定に使う。
///
/// ```rust
/// use postman_domain::aggregate::Version;
///
/// let v1 = Version::initial();
/// assert_eq!(v1.next().as_u32(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Version(u32);

impl Version {
    pub fn initial() -> Self {
        Self(1)
    }

    /// 指定した値からバージョンを作成する（0 は無効）
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::Validation(
                "version は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 次のバージョンを返す（上限で飽和する）
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// DB の INTEGER 列との相互変換用
    pub fn as_i32(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl TryFrom<u32> for Version {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for Version {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let value = u32::try_from(value).map_err(|_| {
            DomainError::Validation("version は 1 以上である必要があります".to_string())
        })?;
        Self::new(value)
    }
}

impl From<Version> for u32 {
    fn from(version: Version) -> Self {
        version.0
    }
}

// =========================================================================
// AggregateMeta
// =========================================================================

/// 集約の識別子・バージョン・ライフサイクルタイムスタンプ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateMeta<Id> {
    id:         Id,
    version:    Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<Id> AggregateMeta<Id> {
    /// 新規生成用。`created_at = updated_at = now`、version は 1。
    pub fn new(id: Id, now: DateTime<Utc>) -> Self {
        Self {
            id,
            version: Version::initial(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// 永続化済み・イベント由来の値から復元する。タイムスタンプは呼び出し元の値を信頼する。
    pub fn existing(
        id: Id,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            version,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    /// 変更を記録する: バージョンを進め、`updated_at` を更新する
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version = self.version.next();
        self.updated_at = now;
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}
