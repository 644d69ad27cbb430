use crate::entities::user_entity as users;
use crate::error::AppResult;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

pub const REFER_CODE_LEN: usize = 18;

/// 生成18位字母数字推荐码
pub fn generate_refer_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFER_CODE_LEN)
        .map(char::from)
        .collect()
}

/// 生成唯一推荐码
pub async fn generate_unique_refer_code<C: ConnectionTrait>(conn: &C) -> AppResult<String> {
    loop {
        let code = generate_refer_code();

        // 检查是否已存在
        let exists = users::Entity::find()
            .filter(users::Column::ReferCode.eq(code.as_str()))
            .count(conn)
            .await?;

        if exists == 0 {
            return Ok(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_refer_code() {
        let code = generate_refer_code();
        assert_eq!(code.len(), REFER_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
