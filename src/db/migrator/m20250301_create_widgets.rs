use crate::entities::prelude::*;
use crate::entities::widgets;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Widgets)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Every widget read filters on the owner and the soft-delete flag.
        manager
            .create_index(
                Index::create()
                    .name("idx_widgets_user_id_is_deleted")
                    .table(Widgets)
                    .col(widgets::Column::UserId)
                    .col(widgets::Column::IsDeleted)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Widgets).to_owned())
            .await
    }
}
