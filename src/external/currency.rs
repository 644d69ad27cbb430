use crate::entities::{currency_entity as currencies, user_entity as users};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, EntityTrait};

/// 汇率查询: 发送方货币 -> 接收用户当前货币
#[async_trait]
pub trait CurrencyRates: Send + Sync {
    async fn ratio(
        &self,
        txn: &DatabaseTransaction,
        source_currency_id: i32,
        target_user_id: i32,
    ) -> AppResult<f64>;
}

/// 基于 currencies.course 的默认实现: ratio = 目标 course / 源 course
#[derive(Clone, Default)]
pub struct CurrencyTableRates;

#[async_trait]
impl CurrencyRates for CurrencyTableRates {
    async fn ratio(
        &self,
        txn: &DatabaseTransaction,
        source_currency_id: i32,
        target_user_id: i32,
    ) -> AppResult<f64> {
        let target = users::Entity::find_by_id(target_user_id)
            .one(txn)
            .await?
            .ok_or_else(|| AppError::DataIntegrity(format!("recipient {target_user_id} missing")))?;

        let source_course = course_of(txn, source_currency_id).await?;
        let target_course = course_of(txn, target.currency_id).await?;
        Ok(target_course as f64 / source_course as f64)
    }
}

async fn course_of(txn: &DatabaseTransaction, currency_id: i32) -> AppResult<i32> {
    let currency = currencies::Entity::find_by_id(currency_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::DataIntegrity(format!("currency {currency_id} missing")))?;
    if currency.course <= 0 {
        return Err(AppError::DataIntegrity(format!(
            "currency {} has non-positive course {}",
            currency.code, currency.course
        )));
    }
    Ok(currency.course)
}

/// 按汇率换算金额；非法汇率直接报错，金额绝不能算成 0 或垃圾值
pub fn convert_amount(first_amount: i64, ratio: f64) -> AppResult<i64> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(AppError::ExternalApiError(format!(
            "currency ratio unavailable: {ratio}"
        )));
    }
    let amount = (first_amount as f64 * ratio).round();
    if amount < 1.0 || amount > i64::MAX as f64 {
        return Err(AppError::ExternalApiError(format!(
            "converted amount out of range: {first_amount} x {ratio}"
        )));
    }
    Ok(amount as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_amount_rounds() {
        assert_eq!(convert_amount(1000, 1.0).unwrap(), 1000);
        assert_eq!(convert_amount(1000, 0.3333).unwrap(), 333);
        assert_eq!(convert_amount(150, 7.5).unwrap(), 1125);
    }

    #[test]
    fn test_convert_amount_rejects_bad_ratio() {
        assert!(convert_amount(1000, 0.0).is_err());
        assert!(convert_amount(1000, -2.0).is_err());
        assert!(convert_amount(1000, f64::NAN).is_err());
        assert!(convert_amount(1000, f64::INFINITY).is_err());
        assert!(convert_amount(1, 0.1).is_err());
    }
}
