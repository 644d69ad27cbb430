use crate::entities::{donate_size_entity as donate_sizes, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::{CurrencyRates, convert_amount};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter};

/// 指定货币、指定级别的固定捐赠额
pub async fn donate_size<C: ConnectionTrait>(
    conn: &C,
    currency_id: i32,
    level: i32,
) -> AppResult<i64> {
    donate_sizes::Entity::find()
        .filter(donate_sizes::Column::CurrencyId.eq(currency_id))
        .filter(donate_sizes::Column::Level.eq(level))
        .one(conn)
        .await?
        .map(|s| s.size)
        .ok_or_else(|| {
            AppError::DataIntegrity(format!(
                "no donate size for currency {currency_id} level {level}"
            ))
        })
}

/// 发送方金额换算成接收方当前货币金额，返回 (金额, 接收方货币)
///
/// 两者必须一起写回捐赠，否则接收方中途换货币后金额与货币对不上。
pub async fn recipient_amount(
    rates: &dyn CurrencyRates,
    txn: &DatabaseTransaction,
    first_amount: i64,
    source_currency_id: i32,
    recipient_id: i32,
) -> AppResult<(i64, i32)> {
    let recipient = users::Entity::find_by_id(recipient_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::DataIntegrity(format!("recipient {recipient_id} missing")))?;
    let ratio = rates.ratio(txn, source_currency_id, recipient.id).await?;
    Ok((convert_amount(first_amount, ratio)?, recipient.currency_id))
}
