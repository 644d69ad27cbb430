use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Dreams {
    Table,
    Id,
    UserId,
    Status,
    TypeDream,
    Title,
    Description,
    Language,
    Goal,
    Collected,
    CurrencyId,
    RefDonations,
    DonationsCount,
    CreatedAt,
    UpdatedAt,
    ClosedAt,
}

/// 捐赠记录
/// - level_number 为空表示自由捐赠
/// - sponsor_dream_id 指向 ref_donations 中包含本捐赠的发起方梦想
#[derive(DeriveIden)]
enum Donations {
    Table,
    Id,
    DreamId,
    SponsorDreamId,
    RecipientId,
    SenderId,
    LevelNumber,
    Amount,
    CurrencyId,
    FirstAmount,
    FirstCurrencyId,
    Status,
    Receipt,
    ConfirmedAt,
    SubAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Achievements {
    Table,
    Id,
    UserId,
    TypeName,
    ReceivedAt,
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
                    .table(Dreams::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Dreams::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Dreams::UserId).integer().not_null())
                    .col(ColumnDef::new(Dreams::Status).integer().not_null())
                    .col(
                        ColumnDef::new(Dreams::TypeDream)
                            .string_len(32)
                            .not_null()
                            .default("user"),
                    )
                    .col(ColumnDef::new(Dreams::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Dreams::Description).text().not_null())
                    .col(ColumnDef::new(Dreams::Language).string_len(8).not_null())
                    .col(ColumnDef::new(Dreams::Goal).big_integer().not_null())
                    .col(
                        ColumnDef::new(Dreams::Collected)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Dreams::CurrencyId).integer().not_null())
                    .col(ColumnDef::new(Dreams::RefDonations).json().not_null())
                    .col(
                        ColumnDef::new(Dreams::DonationsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Dreams::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Dreams::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Dreams::ClosedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        // 候选池与状态机都按 (user_id, status) 查询
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_dreams_user_status")
                    .table(Dreams::Table)
                    .col(Dreams::UserId)
                    .col(Dreams::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Donations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Donations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Donations::DreamId).integer().not_null())
                    .col(ColumnDef::new(Donations::SponsorDreamId).integer().null())
                    .col(ColumnDef::new(Donations::RecipientId).integer().not_null())
                    .col(ColumnDef::new(Donations::SenderId).integer().null())
                    .col(ColumnDef::new(Donations::LevelNumber).integer().null())
                    .col(ColumnDef::new(Donations::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Donations::CurrencyId).integer().not_null())
                    .col(ColumnDef::new(Donations::FirstAmount).big_integer().not_null())
                    .col(ColumnDef::new(Donations::FirstCurrencyId).integer().not_null())
                    .col(ColumnDef::new(Donations::Status).integer().not_null())
                    .col(ColumnDef::new(Donations::Receipt).string_len(512).null())
                    .col(
                        ColumnDef::new(Donations::ConfirmedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Donations::SubAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Donations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Donations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_donations_dream")
                    .table(Donations::Table)
                    .col(Donations::DreamId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_donations_sponsor_dream")
                    .table(Donations::Table)
                    .col(Donations::SponsorDreamId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Achievements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Achievements::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Achievements::UserId).integer().not_null())
                    .col(ColumnDef::new(Achievements::TypeName).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Achievements::ReceivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Achievements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个用户每种成就一条
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_achievements_user_type_unique")
                    .table(Achievements::Table)
                    .col(Achievements::UserId)
                    .col(Achievements::TypeName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Achievements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Donations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().if_exists().table(Dreams::Table).to_owned())
            .await?;
        Ok(())
    }
}
