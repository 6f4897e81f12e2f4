use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alert_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub metric_key: String,
    pub condition: String,
    #[sea_orm(column_type = "Double")]
    pub threshold: f64,
    pub consecutive_breaches: i32,
    pub cooldown_seconds: i64,
    pub slack_channel: Option<String>,
    pub enabled: bool,
    pub current_breach_count: i32,
    pub last_fired_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::alert_history::Entity")]
    AlertHistory,
}

impl Related<super::alert_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
