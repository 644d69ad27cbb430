use crate::entities::dream_entity as dreams;
use crate::error::AppResult;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TranslatedText {
    pub title: String,
    pub description: String,
}

/// 梦想文案翻译，只在展示时使用
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, dream: &dreams::Model, language: &str) -> AppResult<TranslatedText>;
}

/// 直接返回原文（翻译缓存由外部服务维护）
#[derive(Clone, Default)]
pub struct StoredTextTranslator;

#[async_trait]
impl Translator for StoredTextTranslator {
    async fn translate(&self, dream: &dreams::Model, _language: &str) -> AppResult<TranslatedText> {
        Ok(TranslatedText {
            title: dream.title.clone(),
            description: dream.description.clone(),
        })
    }
}
