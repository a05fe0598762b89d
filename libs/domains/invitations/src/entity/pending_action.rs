use crate::error::InvitationError;
use crate::models::{ActionType, Decision, PendingAction, PendingStatus, SourceType};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pending_actions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub owner_user_id: Uuid,
    pub thread_id: Option<Uuid>,
    pub action_type: ActionType,
    pub source_type: SourceType,
    pub payload: Json,
    pub summary: Json,
    #[sea_orm(unique)]
    pub confirm_token: String,
    pub decision: Option<Decision>,
    pub status: PendingStatus,
    pub result: Option<Json>,
    pub request_id: Option<String>,
    pub execute_request_id: Option<String>,
    pub expires_at: DateTimeWithTimeZone,
    pub decided_at: Option<DateTimeWithTimeZone>,
    pub executed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PendingAction {
    type Error = InvitationError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let corrupt = |column: &str, e: serde_json::Error| {
            InvitationError::Internal(format!(
                "pending action {} has unreadable {}: {}",
                model.id, column, e
            ))
        };

        let payload = serde_json::from_value(model.payload.clone()).map_err(|e| corrupt("payload", e))?;
        let summary = serde_json::from_value(model.summary.clone()).map_err(|e| corrupt("summary", e))?;
        let result = model
            .result
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| corrupt("result", e))?;

        Ok(Self {
            id: model.id,
            workspace_id: model.workspace_id,
            owner_user_id: model.owner_user_id,
            thread_id: model.thread_id,
            action_type: model.action_type,
            source_type: model.source_type,
            payload,
            summary,
            confirm_token: model.confirm_token,
            decision: model.decision,
            status: model.status,
            result,
            request_id: model.request_id,
            execute_request_id: model.execute_request_id,
            expires_at: model.expires_at.into(),
            decided_at: model.decided_at.map(Into::into),
            executed_at: model.executed_at.map(Into::into),
            created_at: model.created_at.into(),
        })
    }
}
