use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alert_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub alert_config_id: String,
    /// fired / resolved
    pub event_type: String,
    pub metric_key: String,
    #[sea_orm(column_type = "Double")]
    pub metric_value: f64,
    #[sea_orm(column_type = "Double")]
    pub threshold: f64,
    pub message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::alert_config::Entity",
        from = "Column::AlertConfigId",
        to = "super::alert_config::Column::Id",
        on_delete = "Cascade"
    )]
    AlertConfig,
}

impl Related<super::alert_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertConfig.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
