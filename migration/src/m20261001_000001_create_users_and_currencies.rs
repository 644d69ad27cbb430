use sea_orm_migration::prelude::*;

/// 货币表（course 为相对平台基准货币的整数汇率）
#[derive(DeriveIden)]
enum Currencies {
    Table,
    Id,
    Code,
    Symbol,
    Course,
    DreamLimit,
    IsActive,
}

/// 各货币各级别的固定捐赠额
#[derive(DeriveIden)]
enum DonateSizes {
    Table,
    Id,
    CurrencyId,
    Level,
    Size,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    Language,
    ReferCode,
    Referer,
    ReferCount,
    CurrencyId,
    IsVip,
    IsActive,
    PaidTill,
    TrialTill,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Currencies::Code).string_len(10).not_null())
                    .col(ColumnDef::new(Currencies::Symbol).string_len(5).not_null())
                    .col(ColumnDef::new(Currencies::Course).integer().not_null())
                    .col(
                        ColumnDef::new(Currencies::DreamLimit)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Currencies::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DonateSizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DonateSizes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DonateSizes::CurrencyId).integer().not_null())
                    .col(ColumnDef::new(DonateSizes::Level).integer().not_null())
                    .col(ColumnDef::new(DonateSizes::Size).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_donate_sizes_currency")
                            .from(DonateSizes::Table, DonateSizes::CurrencyId)
                            .to(Currencies::Table, Currencies::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 每种货币每个级别只有一条
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_donate_sizes_currency_level")
                    .table(DonateSizes::Table)
                    .col(DonateSizes::CurrencyId)
                    .col(DonateSizes::Level)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Users::Email).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Users::Language)
                            .string_len(8)
                            .not_null()
                            .default("en"),
                    )
                    .col(ColumnDef::new(Users::ReferCode).string_len(32).null())
                    .col(ColumnDef::new(Users::Referer).string_len(32).null())
                    .col(
                        ColumnDef::new(Users::ReferCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Users::CurrencyId).integer().not_null())
                    .col(
                        ColumnDef::new(Users::IsVip)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::PaidTill).date().null())
                    .col(ColumnDef::new(Users::TrialTill).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // refer_code 唯一，referer 用于向下查找
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_refer_code_unique")
                    .table(Users::Table)
                    .col(Users::ReferCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_referer")
                    .table(Users::Table)
                    .col(Users::Referer)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(DonateSizes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Currencies::Table).to_owned())
            .await?;
        Ok(())
    }
}
